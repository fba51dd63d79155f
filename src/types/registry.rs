use std::any::Any;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{
    ArrayOps, ConstructorInfo, DataMember, MemberKind, MemberRef, MethodInfo, TypeHandle,
};
use crate::error::{ReflectError, Result};

/// Longest base chain walked before a hierarchy is treated as cyclic.
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Whether instances are shared by reference or copied by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Reference,
    Value,
}

/// Link from a derived type to its base, with accessors that project a
/// derived instance onto its embedded base instance.
#[derive(Clone, Copy)]
pub struct BaseLink {
    pub(crate) ty: TypeHandle,
    pub(crate) upcast: fn(&dyn Any) -> Option<&dyn Any>,
    pub(crate) upcast_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
}

impl BaseLink {
    pub fn base_type(&self) -> TypeHandle {
        self.ty
    }
}

impl std::fmt::Debug for BaseLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BaseLink({})", self.ty)
    }
}

/// Registered metadata for one type.
#[derive(Debug)]
pub struct TypeInfo {
    pub(crate) handle: TypeHandle,
    pub(crate) kind: TypeKind,
    pub(crate) base: Option<BaseLink>,
    pub(crate) data_members: Vec<DataMember>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) constructors: Vec<ConstructorInfo>,
    pub(crate) array: Option<ArrayOps>,
}

impl TypeInfo {
    pub fn handle(&self) -> TypeHandle {
        self.handle
    }

    pub fn name(&self) -> String {
        self.handle.name()
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_value_type(&self) -> bool {
        self.kind == TypeKind::Value
    }

    pub fn base(&self) -> Option<&BaseLink> {
        self.base.as_ref()
    }

    /// Fields and properties in declaration order.
    pub fn data_members(&self) -> &[DataMember] {
        &self.data_members
    }

    pub fn fields(&self) -> impl Iterator<Item = &DataMember> {
        self.data_members
            .iter()
            .filter(|member| member.kind == MemberKind::Field)
    }

    pub fn properties(&self) -> impl Iterator<Item = &DataMember> {
        self.data_members
            .iter()
            .filter(|member| member.kind == MemberKind::Property)
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    pub fn array_ops(&self) -> Option<&ArrayOps> {
        self.array.as_ref()
    }

    pub fn data_member(&self, index: usize) -> Option<&DataMember> {
        self.data_members.get(index)
    }

    pub fn method(&self, index: usize) -> Option<&MethodInfo> {
        self.methods.get(index)
    }

    pub fn constructor(&self, index: usize) -> Option<&ConstructorInfo> {
        self.constructors.get(index)
    }

    /// Reference to the data member named `name`, if declared on this type.
    pub fn data_member_ref(&self, name: &str) -> Option<MemberRef> {
        let index = self
            .data_members
            .iter()
            .position(|member| &*member.name == name)?;
        Some(MemberRef {
            declaring_type: self.handle,
            kind: self.data_members[index].kind,
            index,
        })
    }

    /// References to every method named `name` declared on this type.
    pub fn method_refs(&self, name: &str) -> Vec<MemberRef> {
        self.methods
            .iter()
            .enumerate()
            .filter(|(_, method)| &*method.name == name)
            .map(|(index, _)| MemberRef {
                declaring_type: self.handle,
                kind: MemberKind::Method,
                index,
            })
            .collect()
    }

    pub fn constructor_ref(&self, index: usize) -> Option<MemberRef> {
        self.constructors.get(index).map(|_| MemberRef {
            declaring_type: self.handle,
            kind: MemberKind::Constructor,
            index,
        })
    }

    /// Whether `member` names an existing member of this type.
    pub fn declares(&self, member: &MemberRef) -> bool {
        if member.declaring_type != self.handle {
            return false;
        }
        match member.kind {
            MemberKind::Field | MemberKind::Property => self
                .data_members
                .get(member.index)
                .is_some_and(|data| data.kind == member.kind),
            MemberKind::Method => member.index < self.methods.len(),
            MemberKind::Constructor => member.index < self.constructors.len(),
            MemberKind::ArrayElement | MemberKind::Mapping => false,
        }
    }

    /// All member names, used for "did you mean" suggestions.
    pub(crate) fn member_names(&self, kind: MemberKind) -> Vec<String> {
        match kind {
            MemberKind::Method => self.methods.iter().map(|m| m.name.to_string()).collect(),
            _ => self
                .data_members
                .iter()
                .filter(|member| member.kind == kind)
                .map(|member| member.name.to_string())
                .collect(),
        }
    }
}

/// Registry of reflected types.
///
/// Registrations are immutable once added; re-registering a type replaces the
/// previous metadata for later lookups but does not touch thunks already
/// emitted from it.
#[derive(Default)]
pub struct TypeRegistry {
    types: RwLock<AHashMap<TypeHandle, Arc<TypeInfo>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, info: TypeInfo) -> Arc<TypeInfo> {
        let info = Arc::new(info);
        debug!(
            type_name = %info.handle,
            members = info.data_members.len(),
            methods = info.methods.len(),
            "type registered"
        );
        self.types.write().insert(info.handle, Arc::clone(&info));
        info
    }

    /// Registers `Vec<T>` as an array type with element type `T`.
    pub fn register_array<T: Clone + Send + Sync + 'static>(&self) -> Arc<TypeInfo> {
        self.register(TypeInfo {
            handle: TypeHandle::of::<Vec<T>>(),
            kind: TypeKind::Reference,
            base: None,
            data_members: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            array: Some(ArrayOps::of::<T>()),
        })
    }

    pub fn get(&self, handle: TypeHandle) -> Option<Arc<TypeInfo>> {
        self.types.read().get(&handle.element()).cloned()
    }

    pub fn require(&self, handle: TypeHandle) -> Result<Arc<TypeInfo>> {
        self.get(handle)
            .ok_or_else(|| ReflectError::UnregisteredType(handle.element().to_string()))
    }

    pub fn contains(&self, handle: TypeHandle) -> bool {
        self.types.read().contains_key(&handle.element())
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    pub fn handles(&self) -> Vec<TypeHandle> {
        self.types.read().keys().copied().collect()
    }

    /// The type followed by its registered bases, most derived first.
    pub fn hierarchy(&self, handle: TypeHandle) -> Result<Vec<Arc<TypeInfo>>> {
        let mut chain = vec![self.require(handle)?];
        while let Some(link) = chain.last().and_then(|info| info.base) {
            if chain.len() >= MAX_HIERARCHY_DEPTH
                || chain.iter().any(|info| info.handle == link.ty)
            {
                return Err(ReflectError::InvalidDescriptor(format!(
                    "base chain of `{handle}` does not terminate"
                )));
            }
            chain.push(self.require(link.ty)?);
        }
        Ok(chain)
    }

    /// Upcast links leading from `derived` to `base`, or `None` when `base`
    /// is not an ancestor.
    pub fn upcast_path(&self, derived: TypeHandle, base: TypeHandle) -> Option<Vec<BaseLink>> {
        let chain = self.hierarchy(derived).ok()?;
        let depth = chain.iter().position(|info| info.handle == base.element())?;
        Some(chain[..depth].iter().filter_map(|info| info.base).collect())
    }

    pub fn data_member(&self, member: &MemberRef) -> Result<DataMember> {
        let info = self.require(member.declaring_type)?;
        info.data_member(member.index)
            .filter(|data| data.kind == member.kind)
            .cloned()
            .ok_or_else(|| stale_reference(member))
    }

    pub fn method(&self, member: &MemberRef) -> Result<MethodInfo> {
        let info = self.require(member.declaring_type)?;
        info.method(member.index)
            .filter(|_| member.kind == MemberKind::Method)
            .cloned()
            .ok_or_else(|| stale_reference(member))
    }

    pub fn constructor(&self, member: &MemberRef) -> Result<ConstructorInfo> {
        let info = self.require(member.declaring_type)?;
        info.constructor(member.index)
            .filter(|_| member.kind == MemberKind::Constructor)
            .cloned()
            .ok_or_else(|| stale_reference(member))
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .finish()
    }
}

fn stale_reference(member: &MemberRef) -> ReflectError {
    ReflectError::InvalidDescriptor(format!(
        "{} #{} does not exist on `{}`",
        member.kind, member.index, member.declaring_type
    ))
}

/// Applies a chain of upcast links to a shared instance.
pub(crate) fn upcast<'a>(path: &[BaseLink], mut instance: &'a dyn Any) -> Option<&'a dyn Any> {
    for link in path {
        instance = (link.upcast)(instance)?;
    }
    Some(instance)
}

pub(crate) fn upcast_mut<'a>(
    path: &[BaseLink],
    mut instance: &'a mut dyn Any,
) -> Option<&'a mut dyn Any> {
    for link in path {
        instance = (link.upcast_mut)(instance)?;
    }
    Some(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeBuilder;

    #[derive(Default)]
    struct Animal {
        name: String,
    }

    #[derive(Default)]
    struct Dog {
        animal: Animal,
        good: bool,
    }

    impl AsRef<Animal> for Dog {
        fn as_ref(&self) -> &Animal {
            &self.animal
        }
    }

    impl AsMut<Animal> for Dog {
        fn as_mut(&mut self) -> &mut Animal {
            &mut self.animal
        }
    }

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeBuilder::<Animal>::reference()
                .field("name", |a| &a.name, |a| &mut a.name)
                .build(),
        );
        registry.register(
            TypeBuilder::<Dog>::reference()
                .inherits::<Animal>()
                .field("good", |d| &d.good, |d| &mut d.good)
                .build(),
        );
        registry
    }

    #[test]
    fn hierarchy_lists_most_derived_first() {
        let registry = registry();
        let chain = registry.hierarchy(TypeHandle::of::<Dog>()).expect("chain");
        let names: Vec<String> = chain.iter().map(|info| info.name()).collect();
        assert_eq!(names, vec!["Dog", "Animal"]);
    }

    #[test]
    fn upcast_path_reaches_base_instance() {
        let registry = registry();
        let path = registry
            .upcast_path(TypeHandle::of::<Dog>(), TypeHandle::of::<Animal>())
            .expect("path");
        assert_eq!(path.len(), 1);
        let dog = Dog {
            animal: Animal { name: "rex".into() },
            good: true,
        };
        let animal = upcast(&path, &dog).and_then(|any| any.downcast_ref::<Animal>());
        assert_eq!(animal.map(|a| a.name.as_str()), Some("rex"));
        assert!(
            registry
                .upcast_path(TypeHandle::of::<Animal>(), TypeHandle::of::<Dog>())
                .is_none()
        );
    }

    #[test]
    fn unregistered_types_are_reported() {
        let registry = registry();
        let err = registry.require(TypeHandle::of::<u8>()).unwrap_err();
        assert!(matches!(err, ReflectError::UnregisteredType(name) if name == "u8"));
    }

    #[test]
    fn stale_member_refs_are_rejected() {
        let registry = registry();
        let info = registry.require(TypeHandle::of::<Dog>()).expect("dog");
        let good = info.data_member_ref("good").expect("good");
        assert!(info.declares(&good));
        assert!(registry.data_member(&good).is_ok());
        let bogus = MemberRef { index: 7, ..good };
        assert!(!info.declares(&bogus));
        assert!(matches!(
            registry.data_member(&bogus),
            Err(ReflectError::InvalidDescriptor(_))
        ));
    }
}
