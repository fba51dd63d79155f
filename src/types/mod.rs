//! Runtime type metadata that thunks are emitted from.

mod builder;
mod flags;
mod handle;
mod members;
mod registry;
mod value;

pub use builder::TypeBuilder;
pub use flags::Flags;
pub use handle::{TypeHandle, signature};
pub use members::{
    ArrayOps, ConstructorBody, ConstructorInfo, DataKinds, DataMember, GetAccess, InstanceGetFn,
    InstanceSetFn, MemberKind, MemberRef, MethodBody, MethodInfo, ParamInfo, SetAccess,
    StaticGetFn, StaticSetFn, Visibility,
};
pub use registry::{BaseLink, TypeInfo, TypeKind, TypeRegistry};
pub(crate) use registry::{upcast, upcast_mut};
pub use value::{DynValue, ObjectRef, Value, ValueHolder, arg, boxed};
