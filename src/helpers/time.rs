use chrono::Utc;
use tokio::time::Instant;

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// Time left until `deadline`, zero once it has passed.
pub fn remaining_until(deadline: Instant) -> std::time::Duration {
    deadline.saturating_duration_since(Instant::now())
}
