use std::any::Any;
use std::sync::Arc;

use super::{TypeHandle, Value, signature};
use crate::error::Result;

/// Kind of member a descriptor addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Field,
    Property,
    Method,
    Constructor,
    ArrayElement,
    /// Member-to-member copy between two types.
    Mapping,
}

impl MemberKind {
    pub fn is_data(self) -> bool {
        matches!(self, Self::Field | Self::Property)
    }
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Field => "field",
            Self::Property => "property",
            Self::Method => "method",
            Self::Constructor => "constructor",
            Self::ArrayElement => "array element",
            Self::Mapping => "mapping",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

/// Which data members a mapping reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataKinds {
    Fields,
    Properties,
    #[default]
    FieldsAndProperties,
}

impl DataKinds {
    pub fn admits(self, kind: MemberKind) -> bool {
        match self {
            Self::Fields => kind == MemberKind::Field,
            Self::Properties => kind == MemberKind::Property,
            Self::FieldsAndProperties => kind.is_data(),
        }
    }
}

pub type InstanceGetFn = Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
pub type InstanceSetFn = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;
pub type StaticGetFn = Arc<dyn Fn() -> Result<Value> + Send + Sync>;
pub type StaticSetFn = Arc<dyn Fn(Value) -> Result<()> + Send + Sync>;
/// Method body; the receiver is `None` for static methods.
pub type MethodBody = Arc<dyn Fn(Option<&mut dyn Any>, &mut [Value]) -> Result<Value> + Send + Sync>;
pub type ConstructorBody = Arc<dyn Fn(&mut [Value]) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub enum GetAccess {
    Instance(InstanceGetFn),
    Static(StaticGetFn),
}

#[derive(Clone)]
pub enum SetAccess {
    Instance(InstanceSetFn),
    Static(StaticSetFn),
}

/// A field or property: a named slot with optional read and write access.
#[derive(Clone)]
pub struct DataMember {
    pub(crate) kind: MemberKind,
    pub(crate) name: Arc<str>,
    pub(crate) declared_type: TypeHandle,
    pub(crate) declaring_type: TypeHandle,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) get: Option<GetAccess>,
    pub(crate) set: Option<SetAccess>,
}

impl DataMember {
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> TypeHandle {
        self.declared_type
    }

    pub fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn can_read(&self) -> bool {
        self.get.is_some()
    }

    pub fn can_write(&self) -> bool {
        self.set.is_some()
    }

    pub fn getter(&self) -> Option<&GetAccess> {
        self.get.as_ref()
    }

    pub fn setter(&self) -> Option<&SetAccess> {
        self.set.as_ref()
    }
}

impl std::fmt::Debug for DataMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataMember")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("declared_type", &self.declared_type)
            .field("declaring_type", &self.declaring_type)
            .field("is_static", &self.is_static)
            .field("readable", &self.can_read())
            .field("writable", &self.can_write())
            .finish()
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    name: Arc<str>,
    ty: TypeHandle,
}

impl ParamInfo {
    pub fn of<T: 'static>(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            ty: TypeHandle::of::<T>(),
        }
    }

    /// A parameter whose value is written back to the caller's argument slot.
    pub fn by_ref<T: 'static>(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            ty: TypeHandle::of::<T>().by_ref(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> TypeHandle {
        self.ty
    }

    pub fn is_by_ref(&self) -> bool {
        self.ty.is_by_ref()
    }
}

#[derive(Clone)]
pub struct MethodInfo {
    pub(crate) name: Arc<str>,
    pub(crate) declaring_type: TypeHandle,
    pub(crate) params: Arc<[ParamInfo]>,
    pub(crate) return_type: TypeHandle,
    pub(crate) visibility: Visibility,
    pub(crate) is_static: bool,
    pub(crate) body: MethodBody,
}

impl MethodInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    pub fn param_types(&self) -> Vec<TypeHandle> {
        self.params.iter().map(ParamInfo::param_type).collect()
    }

    pub fn return_type(&self) -> TypeHandle {
        self.return_type
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn accepts(&self, param_types: &[TypeHandle]) -> bool {
        self.params.len() == param_types.len()
            && self
                .params
                .iter()
                .zip(param_types)
                .all(|(param, ty)| param.ty == *ty)
    }
}

impl std::fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}::{}({}) -> {}",
            if self.is_static { "static " } else { "" },
            self.declaring_type,
            self.name,
            signature(&self.param_types()),
            self.return_type
        )
    }
}

#[derive(Clone)]
pub struct ConstructorInfo {
    pub(crate) declaring_type: TypeHandle,
    pub(crate) params: Arc<[ParamInfo]>,
    pub(crate) visibility: Visibility,
    pub(crate) body: ConstructorBody,
}

impl ConstructorInfo {
    pub fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    pub fn param_types(&self) -> Vec<TypeHandle> {
        self.params.iter().map(ParamInfo::param_type).collect()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn accepts(&self, param_types: &[TypeHandle]) -> bool {
        self.params.len() == param_types.len()
            && self
                .params
                .iter()
                .zip(param_types)
                .all(|(param, ty)| param.ty == *ty)
    }
}

impl std::fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({})",
            self.declaring_type,
            signature(&self.param_types())
        )
    }
}

/// Element access for a registered `Vec<T>` array type.
#[derive(Clone, Copy)]
pub struct ArrayOps {
    pub(crate) element: TypeHandle,
    pub(crate) len: fn(&dyn Any) -> Option<usize>,
    pub(crate) get: fn(&dyn Any, usize) -> Option<Value>,
    pub(crate) set: fn(&mut dyn Any, usize, Value) -> Option<()>,
}

impl ArrayOps {
    pub fn of<T: Clone + Send + Sync + 'static>() -> Self {
        Self {
            element: TypeHandle::of::<T>(),
            len: array_len::<T>,
            get: array_get::<T>,
            set: array_set::<T>,
        }
    }

    pub fn element_type(&self) -> TypeHandle {
        self.element
    }
}

impl std::fmt::Debug for ArrayOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ArrayOps<{}>", self.element)
    }
}

fn array_len<T: 'static>(array: &dyn Any) -> Option<usize> {
    array.downcast_ref::<Vec<T>>().map(Vec::len)
}

fn array_get<T: Clone + Send + Sync + 'static>(array: &dyn Any, index: usize) -> Option<Value> {
    let element = array.downcast_ref::<Vec<T>>()?.get(index)?;
    Some(Value::new(element.clone()))
}

fn array_set<T: Clone + 'static>(array: &mut dyn Any, index: usize, value: Value) -> Option<()> {
    let slot = array.downcast_mut::<Vec<T>>()?.get_mut(index)?;
    *slot = value.extract::<T>()?;
    Some(())
}

/// Stable reference to a registered member: the declaring type, the member
/// kind and its index in that type's declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub(crate) declaring_type: TypeHandle,
    pub(crate) kind: MemberKind,
    pub(crate) index: usize,
}

impl MemberRef {
    pub fn declaring_type(&self) -> TypeHandle {
        self.declaring_type
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }
}
