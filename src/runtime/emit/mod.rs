//! Thunk synthesis, one emitter per operation kind.
//!
//! Each emitter resolves its descriptor against the registry once and
//! composes the registered accessors into a closure with the signature the
//! operation needs. Nothing is resolved when the thunk runs, apart from the
//! upcast path for instances of a registered subtype.

mod array;
mod invocation;
mod map;
mod member;
mod target;

use std::sync::Arc;

pub use array::{ArrayGetEmitter, ArraySetEmitter};
pub use invocation::{ConstructorInvocationEmitter, MethodInvocationEmitter};
pub use map::MapEmitter;
pub use member::{MemberGetEmitter, MemberSetEmitter};

use super::{CallInfo, Thunk};
use crate::error::{ReflectError, Result};
use crate::types::{MemberKind, TypeRegistry};

/// Turns one descriptor into one thunk.
pub trait Emitter {
    fn call_info(&self) -> &CallInfo;

    fn emit(&self) -> Result<Thunk>;
}

/// Picks the emitter for `info` from its member kind and read/write
/// direction.
pub fn emitter_for(info: &CallInfo, registry: &Arc<TypeRegistry>) -> Box<dyn Emitter> {
    let info = info.clone();
    let registry = Arc::clone(registry);
    match (info.kind(), info.is_read_operation()) {
        (MemberKind::Field | MemberKind::Property, true) => {
            Box::new(MemberGetEmitter::new(info, registry))
        }
        (MemberKind::Field | MemberKind::Property, false) => {
            Box::new(MemberSetEmitter::new(info, registry))
        }
        (MemberKind::Method, _) => Box::new(MethodInvocationEmitter::new(info, registry)),
        (MemberKind::Constructor, _) => Box::new(ConstructorInvocationEmitter::new(info, registry)),
        (MemberKind::ArrayElement, true) => Box::new(ArrayGetEmitter::new(info, registry)),
        (MemberKind::ArrayElement, false) => Box::new(ArraySetEmitter::new(info, registry)),
        (MemberKind::Mapping, _) => Box::new(MapEmitter::new(info, registry)),
    }
}

fn check_static(info: &CallInfo, member_is_static: bool) -> Result<()> {
    if info.is_static() == member_is_static {
        return Ok(());
    }
    Err(ReflectError::InvalidDescriptor(format!(
        "{info} refers to {} member",
        if member_is_static { "a static" } else { "an instance" }
    )))
}
