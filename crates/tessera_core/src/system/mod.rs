//! # Systems
//!
//! Systems are plain functions. Their arguments declare what they read and
//! write; the scheduler uses those declarations to run non-conflicting
//! systems side by side.

pub mod access;
pub mod function;
pub mod param;

pub use access::{Access, AccessKey, AccessKind};
pub use function::{
    BoxedSystem, FunctionSystem, IntoSystem, System, SystemKey, SystemParamFunction,
};
pub use param::{
    Commands, EventReader, EventWriter, Local, NonSend, NonSendMut, Res, ResMut, SystemContext,
    SystemMeta, SystemParam, SystemParamItem,
};
