use std::sync::Arc;

use crate::error::{ReflectError, Result};
use crate::types::Value;

pub type MemberGetter = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;
pub type StaticMemberGetter = Arc<dyn Fn() -> Result<Value> + Send + Sync>;
pub type MemberSetter = Arc<dyn Fn(&Value, Value) -> Result<()> + Send + Sync>;
pub type StaticMemberSetter = Arc<dyn Fn(Value) -> Result<()> + Send + Sync>;
/// Invokes an instance method; by-ref arguments are updated in place.
pub type MethodInvoker = Arc<dyn Fn(&Value, &mut [Value]) -> Result<Value> + Send + Sync>;
pub type StaticMethodInvoker = Arc<dyn Fn(&mut [Value]) -> Result<Value> + Send + Sync>;
pub type ConstructorInvoker = Arc<dyn Fn(&mut [Value]) -> Result<Value> + Send + Sync>;
pub type ArrayElementGetter = Arc<dyn Fn(&Value, usize) -> Result<Value> + Send + Sync>;
pub type ArrayElementSetter = Arc<dyn Fn(&Value, usize, Value) -> Result<()> + Send + Sync>;
/// Copies mapped members from the first argument into the second.
pub type MemberCopier = Arc<dyn Fn(&Value, &Value) -> Result<()> + Send + Sync>;

/// A synthesized accessor, tagged with its signature.
#[derive(Clone)]
pub enum Thunk {
    Getter(MemberGetter),
    StaticGetter(StaticMemberGetter),
    Setter(MemberSetter),
    StaticSetter(StaticMemberSetter),
    Method(MethodInvoker),
    StaticMethod(StaticMethodInvoker),
    Constructor(ConstructorInvoker),
    ArrayGet(ArrayElementGetter),
    ArraySet(ArrayElementSetter),
    Copier(MemberCopier),
}

macro_rules! thunk_accessor {
    ($($fn_name:ident => $variant:ident($ty:ty), $label:literal;)*) => {
        impl Thunk {
            /// Human-readable signature name.
            pub fn signature_name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $label,)*
                }
            }

            $(
                #[doc = concat!("The thunk as a ", $label, ".")]
                pub fn $fn_name(&self) -> Result<$ty> {
                    match self {
                        Self::$variant(thunk) => Ok(Arc::clone(thunk)),
                        other => Err(ReflectError::SignatureMismatch {
                            expected: $label,
                            found: other.signature_name(),
                        }),
                    }
                }
            )*
        }
    };
}

thunk_accessor! {
    getter => Getter(MemberGetter), "member getter";
    static_getter => StaticGetter(StaticMemberGetter), "static member getter";
    setter => Setter(MemberSetter), "member setter";
    static_setter => StaticSetter(StaticMemberSetter), "static member setter";
    method => Method(MethodInvoker), "method invoker";
    static_method => StaticMethod(StaticMethodInvoker), "static method invoker";
    constructor => Constructor(ConstructorInvoker), "constructor invoker";
    array_get => ArrayGet(ArrayElementGetter), "array element getter";
    array_set => ArraySet(ArrayElementSetter), "array element setter";
    copier => Copier(MemberCopier), "member copier";
}

impl std::fmt::Debug for Thunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Thunk({})", self.signature_name())
    }
}
