//! Reflecta: cached, strongly-typed accessor thunks over a registered
//! reflection model.
//!
//! Types are described once with a [`TypeBuilder`] and registered with a
//! [`ReflectContext`]. A [`CallInfo`] names one operation on a registered
//! type (a field or property access, a method or constructor call, an array
//! element access or a member-to-member copy); the context resolves it,
//! composes a [`Thunk`] for it and caches the result, so later requests for
//! an equal descriptor return the same thunk without resolving anything.

pub mod config;
pub mod error;
pub mod runtime;
pub mod types;

pub use config::{ConfigError, ReflectConfig};
pub use error::{Accessor, ReflectError, Result};
pub use reflecta_cache::{CacheStrategy, LockStrategy};
pub use runtime::{
    ArrayElementGetter, ArrayElementSetter, CallInfo, ConstructorInvoker, DelegateCache,
    DelegateCacheStats, MapSpec, MemberCopier, MemberGetter, MemberSetter, MethodInvoker,
    ReflectContext, StaticMemberGetter, StaticMemberSetter, StaticMethodInvoker, Thunk,
};
pub use types::{
    DataKinds, Flags, MemberKind, MemberRef, ParamInfo, TypeBuilder, TypeHandle, TypeInfo,
    TypeRegistry, Value, ValueHolder, Visibility, arg,
};
