use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{
    BaseLink, ConstructorInfo, DataMember, GetAccess, MemberKind, MethodInfo, ParamInfo, SetAccess,
    TypeHandle, TypeInfo, TypeKind, Value, Visibility,
};
use crate::error::{ReflectError, Result};

/// Describes the members of `T` for registration in a [`super::TypeRegistry`].
///
/// Every accessor is a plain function over the concrete type; the builder
/// wraps each one in a type-erased closure once, at registration time.
pub struct TypeBuilder<T> {
    info: TypeInfo,
    wrap: fn(T) -> Value,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeBuilder<T> {
    /// A type whose instances are shared through [`Value::Object`].
    pub fn reference() -> Self {
        Self::with_kind(TypeKind::Reference, Value::object::<T>)
    }

    fn with_kind(kind: TypeKind, wrap: fn(T) -> Value) -> Self {
        Self {
            info: TypeInfo {
                handle: TypeHandle::of::<T>(),
                kind,
                base: None,
                data_members: Vec::new(),
                methods: Vec::new(),
                constructors: Vec::new(),
                array: None,
            },
            wrap,
            _marker: PhantomData,
        }
    }

    /// Declares `B` as the base type; `T` must embed a `B`.
    #[must_use]
    pub fn inherits<B: 'static>(mut self) -> Self
    where
        T: AsRef<B> + AsMut<B>,
    {
        self.info.base = Some(BaseLink {
            ty: TypeHandle::of::<B>(),
            upcast: upcast_ref::<T, B>,
            upcast_mut: upcast_mut::<T, B>,
        });
        self
    }

    #[must_use]
    pub fn field<F: Clone + Send + Sync + 'static>(
        self,
        name: &str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        self.add_field(name, Visibility::Public, get, get_mut)
    }

    #[must_use]
    pub fn private_field<F: Clone + Send + Sync + 'static>(
        self,
        name: &str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        self.add_field(name, Visibility::Private, get, get_mut)
    }

    fn add_field<F: Clone + Send + Sync + 'static>(
        self,
        name: &str,
        visibility: Visibility,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        let name: Arc<str> = Arc::from(name);
        let read = GetAccess::Instance(Arc::new(move |owner: &dyn Any| -> Result<Value> {
            Ok(Value::new(get(downcast::<T>(owner)?).clone()))
        }));
        let member = Arc::clone(&name);
        let write = SetAccess::Instance(Arc::new(
            move |owner: &mut dyn Any, value: Value| -> Result<()> {
                *get_mut(downcast_mut::<T>(owner)?) = convert::<F>(&member, value)?;
                Ok(())
            },
        ));
        self.push_data(MemberKind::Field, name, TypeHandle::of::<F>(), visibility, false)
            .with_access(Some(read), Some(write))
    }

    /// A property with an optional getter and setter.
    #[must_use]
    pub fn property<F: Clone + Send + Sync + 'static>(
        self,
        name: &str,
        get: Option<fn(&T) -> F>,
        set: Option<fn(&mut T, F)>,
    ) -> Self {
        let name: Arc<str> = Arc::from(name);
        let read = get.map(|get| {
            GetAccess::Instance(Arc::new(move |owner: &dyn Any| -> Result<Value> {
                Ok(Value::new(get(downcast::<T>(owner)?)))
            }))
        });
        let member = Arc::clone(&name);
        let write = set.map(|set| {
            SetAccess::Instance(Arc::new(
                move |owner: &mut dyn Any, value: Value| -> Result<()> {
                    let value = convert::<F>(&member, value)?;
                    set(downcast_mut::<T>(owner)?, value);
                    Ok(())
                },
            ))
        });
        self.push_data(MemberKind::Property, name, TypeHandle::of::<F>(), Visibility::Public, false)
            .with_access(read, write)
    }

    /// A static field stored in a `static` cell.
    #[must_use]
    pub fn static_field<F: Clone + Send + Sync + 'static>(
        self,
        name: &str,
        cell: &'static RwLock<F>,
    ) -> Self {
        self.add_static_field(name, Visibility::Public, cell)
    }

    #[must_use]
    pub fn private_static_field<F: Clone + Send + Sync + 'static>(
        self,
        name: &str,
        cell: &'static RwLock<F>,
    ) -> Self {
        self.add_static_field(name, Visibility::Private, cell)
    }

    fn add_static_field<F: Clone + Send + Sync + 'static>(
        self,
        name: &str,
        visibility: Visibility,
        cell: &'static RwLock<F>,
    ) -> Self {
        let name: Arc<str> = Arc::from(name);
        let read = GetAccess::Static(Arc::new(move || -> Result<Value> {
            Ok(Value::new(cell.read().clone()))
        }));
        let member = Arc::clone(&name);
        let write = SetAccess::Static(Arc::new(move |value: Value| -> Result<()> {
            *cell.write() = convert::<F>(&member, value)?;
            Ok(())
        }));
        self.push_data(MemberKind::Field, name, TypeHandle::of::<F>(), visibility, true)
            .with_access(Some(read), Some(write))
    }

    #[must_use]
    pub fn static_property<F: Clone + Send + Sync + 'static>(
        self,
        name: &str,
        get: Option<fn() -> F>,
        set: Option<fn(F)>,
    ) -> Self {
        let name: Arc<str> = Arc::from(name);
        let read = get.map(|get| {
            GetAccess::Static(Arc::new(move || -> Result<Value> { Ok(Value::new(get())) }))
        });
        let member = Arc::clone(&name);
        let write = set.map(|set| {
            SetAccess::Static(Arc::new(move |value: Value| -> Result<()> {
                set(convert::<F>(&member, value)?);
                Ok(())
            }))
        });
        self.push_data(MemberKind::Property, name, TypeHandle::of::<F>(), Visibility::Public, true)
            .with_access(read, write)
    }

    /// An instance method. The body receives arguments already converted to
    /// the declared parameter types; by-ref slots it writes are copied back
    /// to the caller.
    #[must_use]
    pub fn method(
        self,
        name: &str,
        params: impl IntoIterator<Item = ParamInfo>,
        return_type: TypeHandle,
        body: fn(&mut T, &mut [Value]) -> Result<Value>,
    ) -> Self {
        self.add_method(name, Visibility::Public, params, return_type, body)
    }

    #[must_use]
    pub fn private_method(
        self,
        name: &str,
        params: impl IntoIterator<Item = ParamInfo>,
        return_type: TypeHandle,
        body: fn(&mut T, &mut [Value]) -> Result<Value>,
    ) -> Self {
        self.add_method(name, Visibility::Private, params, return_type, body)
    }

    fn add_method(
        mut self,
        name: &str,
        visibility: Visibility,
        params: impl IntoIterator<Item = ParamInfo>,
        return_type: TypeHandle,
        body: fn(&mut T, &mut [Value]) -> Result<Value>,
    ) -> Self {
        let method = MethodInfo {
            name: Arc::from(name),
            declaring_type: self.info.handle,
            params: params.into_iter().collect(),
            return_type,
            visibility,
            is_static: false,
            body: Arc::new(
                move |receiver: Option<&mut dyn Any>, args: &mut [Value]| -> Result<Value> {
                    let receiver = receiver.ok_or_else(|| {
                        ReflectError::NullTarget(TypeHandle::of::<T>().to_string())
                    })?;
                    body(downcast_mut::<T>(receiver)?, args)
                },
            ),
        };
        self.info.methods.push(method);
        self
    }

    #[must_use]
    pub fn static_method(
        mut self,
        name: &str,
        params: impl IntoIterator<Item = ParamInfo>,
        return_type: TypeHandle,
        body: fn(&mut [Value]) -> Result<Value>,
    ) -> Self {
        let method = MethodInfo {
            name: Arc::from(name),
            declaring_type: self.info.handle,
            params: params.into_iter().collect(),
            return_type,
            visibility: Visibility::Public,
            is_static: true,
            body: Arc::new(
                move |_: Option<&mut dyn Any>, args: &mut [Value]| -> Result<Value> { body(args) },
            ),
        };
        self.info.methods.push(method);
        self
    }

    #[must_use]
    pub fn constructor(
        mut self,
        params: impl IntoIterator<Item = ParamInfo>,
        body: fn(&mut [Value]) -> Result<T>,
    ) -> Self {
        let wrap = self.wrap;
        let constructor = ConstructorInfo {
            declaring_type: self.info.handle,
            params: params.into_iter().collect(),
            visibility: Visibility::Public,
            body: Arc::new(move |args: &mut [Value]| -> Result<Value> { body(args).map(wrap) }),
        };
        self.info.constructors.push(constructor);
        self
    }

    pub fn build(self) -> TypeInfo {
        self.info
    }

    fn push_data(
        mut self,
        kind: MemberKind,
        name: Arc<str>,
        declared_type: TypeHandle,
        visibility: Visibility,
        is_static: bool,
    ) -> Self {
        self.info.data_members.push(DataMember {
            kind,
            name,
            declared_type,
            declaring_type: self.info.handle,
            visibility,
            is_static,
            get: None,
            set: None,
        });
        self
    }

    fn with_access(mut self, get: Option<GetAccess>, set: Option<SetAccess>) -> Self {
        if let Some(member) = self.info.data_members.last_mut() {
            member.get = get;
            member.set = set;
        }
        self
    }
}

impl<T: Clone + Send + Sync + 'static> TypeBuilder<T> {
    /// A type whose instances are copied: boxed detached, or shared mutably
    /// through a [`super::ValueHolder`].
    pub fn value_type() -> Self {
        Self::with_kind(TypeKind::Value, Value::new::<T>)
    }
}

/// Converts `value` to a member's declared type `F`.
///
/// A member declared as [`Value`] accepts anything, null included; every
/// other declared type requires an instance of exactly that type.
pub(crate) fn convert<F: Clone + 'static>(member: &str, value: Value) -> Result<F> {
    let found = value.type_handle();
    value
        .extract::<F>()
        .ok_or_else(|| ReflectError::value_mismatch(member, TypeHandle::of::<F>(), found))
}

fn downcast<T: 'static>(owner: &dyn Any) -> Result<&T> {
    owner.downcast_ref::<T>().ok_or_else(owner_mismatch::<T>)
}

fn downcast_mut<T: 'static>(owner: &mut dyn Any) -> Result<&mut T> {
    owner.downcast_mut::<T>().ok_or_else(owner_mismatch::<T>)
}

fn owner_mismatch<T: 'static>() -> ReflectError {
    ReflectError::TargetMismatch {
        expected: TypeHandle::of::<T>().to_string(),
        found: "an instance of another type".to_string(),
    }
}

fn upcast_ref<D: AsRef<B> + 'static, B: 'static>(derived: &dyn Any) -> Option<&dyn Any> {
    let derived = derived.downcast_ref::<D>()?;
    Some(AsRef::<B>::as_ref(derived))
}

fn upcast_mut<D: AsMut<B> + 'static, B: 'static>(derived: &mut dyn Any) -> Option<&mut dyn Any> {
    let derived = derived.downcast_mut::<D>()?;
    Some(AsMut::<B>::as_mut(derived))
}
