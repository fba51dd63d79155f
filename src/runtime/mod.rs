// Thunk synthesis and caching
pub mod call_info;
mod context;
mod delegate_cache;
pub mod emit;
pub(crate) mod lookup;
mod thunk;

pub use call_info::{CallInfo, MapSpec};
pub use context::ReflectContext;
pub use delegate_cache::{DelegateCache, DelegateCacheStats};
pub use thunk::{
    ArrayElementGetter, ArrayElementSetter, ConstructorInvoker, MemberCopier, MemberGetter,
    MemberSetter, MethodInvoker, StaticMemberGetter, StaticMemberSetter, StaticMethodInvoker,
    Thunk,
};
