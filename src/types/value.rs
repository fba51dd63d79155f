//! The universal boxed representation that flows through generated thunks.

use std::any::Any;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use super::TypeHandle;
use crate::error::{ReflectError, Result};

/// A value-type instance that can be copied out of a box.
pub trait DynValue: Send + Sync {
    fn clone_value(&self) -> Box<dyn DynValue>;
    fn type_handle(&self) -> TypeHandle;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

struct Slot<T>(T);

impl<T: Any + Clone + Send + Sync> DynValue for Slot<T> {
    fn clone_value(&self) -> Box<dyn DynValue> {
        Box::new(Slot(self.0.clone()))
    }

    fn type_handle(&self) -> TypeHandle {
        TypeHandle::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.0
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        Box::new(self.0)
    }
}

/// Boxes a value-type instance.
pub fn boxed<T: Clone + Send + Sync + 'static>(value: T) -> Box<dyn DynValue> {
    Box::new(Slot(value))
}

/// Shared handle to a reference-type instance.
///
/// Clones alias the same instance. Readers take a shared lock and mutators an
/// exclusive one, so a member body that re-enters a thunk on its own
/// instance will deadlock.
#[derive(Clone)]
pub struct ObjectRef {
    ty: TypeHandle,
    cell: Arc<RwLock<Box<dyn Any + Send + Sync>>>,
}

impl ObjectRef {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            ty: TypeHandle::of::<T>(),
            cell: Arc::new(RwLock::new(Box::new(value))),
        }
    }

    pub fn type_handle(&self) -> TypeHandle {
        self.ty
    }

    pub fn read<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> R {
        let guard = self.cell.read();
        f(&**guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut dyn Any) -> R) -> R {
        let mut guard = self.cell.write();
        f(&mut **guard)
    }

    /// Runs `f` on the instance if it is a `T`.
    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.read(|any| any.downcast_ref::<T>().map(f))
    }

    pub fn with_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.write(|any| any.downcast_mut::<T>().map(f))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{:p}", self.ty, Arc::as_ptr(&self.cell))
    }
}

/// Mutable box around a value-type instance.
///
/// Passing a plain boxed struct through a reference-typed call site hands the
/// callee a copy, so mutations would be lost. A holder is shared instead:
/// generated thunks copy the instance out, mutate the copy and store it back.
#[derive(Clone)]
pub struct ValueHolder {
    ty: TypeHandle,
    cell: Arc<Mutex<Box<dyn DynValue>>>,
}

impl ValueHolder {
    pub fn new<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        Self::from_boxed(boxed(value))
    }

    pub fn from_boxed(value: Box<dyn DynValue>) -> Self {
        Self {
            ty: value.type_handle(),
            cell: Arc::new(Mutex::new(value)),
        }
    }

    pub fn type_handle(&self) -> TypeHandle {
        self.ty
    }

    /// Copy of the held instance if it is a `T`.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.cell.lock().as_any().downcast_ref::<T>().cloned()
    }

    /// Copy of the held instance as a detached boxed value.
    pub fn snapshot(&self) -> Value {
        Value::Boxed(self.cell.lock().clone_value())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn DynValue>> {
        self.cell.lock()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl std::fmt::Debug for ValueHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Holder<{}>", self.ty)
    }
}

/// Dynamically typed value passed to and returned from thunks.
pub enum Value {
    Null,
    /// Detached value-type instance; cloning copies it.
    Boxed(Box<dyn DynValue>),
    /// Reference-type instance; cloning aliases it.
    Object(ObjectRef),
    /// Shared, mutable value-type instance.
    Holder(ValueHolder),
}

impl Value {
    /// Boxes `value`. A `Value`, `ObjectRef` or `ValueHolder` argument is
    /// passed through rather than boxed a second time.
    pub fn new<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        let mut slot = Some(value);
        let any = &mut slot as &mut dyn Any;
        if let Some(value) = any.downcast_mut::<Option<Self>>() {
            return value.take().unwrap_or(Self::Null);
        }
        if let Some(object) = any.downcast_mut::<Option<ObjectRef>>() {
            return object.take().map_or(Self::Null, Self::Object);
        }
        if let Some(holder) = any.downcast_mut::<Option<ValueHolder>>() {
            return holder.take().map_or(Self::Null, Self::Holder);
        }
        slot.map_or(Self::Null, |value| Self::Boxed(boxed(value)))
    }

    /// Wraps a reference-type instance.
    pub fn object<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Object(ObjectRef::new(value))
    }

    /// Wraps a value-type instance in a fresh holder.
    pub fn holder<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        Self::Holder(ValueHolder::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Runtime type of the carried instance; `None` for null.
    pub fn type_handle(&self) -> Option<TypeHandle> {
        match self {
            Self::Null => None,
            Self::Boxed(value) => Some(value.type_handle()),
            Self::Object(object) => Some(object.type_handle()),
            Self::Holder(holder) => Some(holder.type_handle()),
        }
    }

    /// Moves a detached value-type instance into a holder so that mutating
    /// thunks can write back into it. Other variants are returned unchanged.
    #[must_use]
    pub fn into_holder(self) -> Self {
        match self {
            Self::Boxed(value) => Self::Holder(ValueHolder::from_boxed(value)),
            other => other,
        }
    }

    /// Detaches a held value-type instance into a plain boxed copy.
    #[must_use]
    pub fn unwrap_holder(self) -> Self {
        match self {
            Self::Holder(holder) => holder.snapshot(),
            other => other,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_holder(&self) -> Option<&ValueHolder> {
        match self {
            Self::Holder(holder) => Some(holder),
            _ => None,
        }
    }

    /// Copy of the carried instance as a `T`.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.clone().extract()
    }

    /// Converts into a `T`, unboxing value types and unwrapping holders.
    ///
    /// `T = Value` accepts anything including null, `T = ObjectRef` accepts
    /// any reference-type instance, and any other `T` requires the instance to
    /// be exactly a `T`.
    pub fn extract<T: Clone + 'static>(self) -> Option<T> {
        let mut slot = Some(self);
        if let Some(value) = (&mut slot as &mut dyn Any).downcast_mut::<Option<T>>() {
            return value.take();
        }
        match slot? {
            Self::Null => None,
            Self::Boxed(value) => value.into_any().downcast::<T>().ok().map(|boxed| *boxed),
            Self::Holder(holder) => holder.get::<T>(),
            Self::Object(object) => {
                let mut slot = Some(object);
                if let Some(object) = (&mut slot as &mut dyn Any).downcast_mut::<Option<T>>() {
                    return object.take();
                }
                slot?.with::<T, _>(T::clone)
            }
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Boxed(value) => Self::Boxed(value.clone_value()),
            Self::Object(object) => Self::Object(object.clone()),
            Self::Holder(holder) => Self::Holder(holder.clone()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Boxed(value) => write!(f, "Boxed<{}>", value.type_handle()),
            Self::Object(object) => write!(f, "Object({object:?})"),
            Self::Holder(holder) => write!(f, "{holder:?}"),
        }
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

impl From<ValueHolder> for Value {
    fn from(holder: ValueHolder) -> Self {
        Self::Holder(holder)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Boxed(boxed(value.to_string()))
    }
}

impl<T: Clone + Send + Sync + 'static> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::new)
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Boxed(boxed(value))
                }
            }
        )*
    };
}

impl_from_primitive!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, String,
);

/// Reads argument `index` as a `T`, for use inside registered member bodies.
pub fn arg<T: Clone + 'static>(args: &[Value], index: usize) -> Result<T> {
    let value = args.get(index).ok_or_else(|| ReflectError::ArgumentCount {
        member: "argument list".to_string(),
        expected: index + 1,
        found: args.len(),
    })?;
    value.get::<T>().ok_or_else(|| {
        ReflectError::value_mismatch(
            &format!("argument {index}"),
            TypeHandle::of::<T>(),
            value.type_handle(),
        )
    })
}
