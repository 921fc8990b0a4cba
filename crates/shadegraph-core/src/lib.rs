pub mod attr;
pub mod document;
pub mod edge;
pub mod function;
pub mod node;
pub mod types;

// Re-export commonly used types
pub use attr::AttrValue;
pub use document::{
    filter_code, format_code, is_single_channel, wrap_code, GlobalInput, IrDocument,
    Persistence, Resource, ResourceKind, Sampler,
};
pub use edge::{ports, Edge, EdgeKind};
pub use function::{Function, FunctionKind, LocalVar, Output, Param};
pub use node::{Node, OpClass};
pub use types::{StructDef, StructMember, ValueType};
