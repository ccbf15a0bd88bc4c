//! Tool contract: definitions, registry, invoker and the backend they call.

pub mod backend;
pub mod catalog;
pub mod definition;
pub mod error;
pub mod invoker;
pub mod registry;
pub mod schema;

pub use definition::{ToolContext, ToolDefinition, ToolDescriptor, ToolHandler};
pub use error::{ErrorEnvelope, ErrorKind, ToolError, ToolInvocationResult};
pub use invoker::{InvokerSettings, ToolInvocationRequest, ToolInvoker};
pub use registry::{RegistryError, ToolRegistry};
