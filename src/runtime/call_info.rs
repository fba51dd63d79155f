use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHasher;

use super::lookup;
use crate::error::{ReflectError, Result};
use crate::types::{DataKinds, Flags, MemberKind, MemberRef, TypeHandle, TypeRegistry, signature};

/// Member pairs copied by a mapping thunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapSpec {
    pub(crate) source_type: TypeHandle,
    pub(crate) source_kinds: DataKinds,
    pub(crate) target_kinds: DataKinds,
    pub(crate) pairs: Arc<[(Arc<str>, Arc<str>)]>,
}

impl MapSpec {
    /// Copies each `(source, target)` name pair, in order.
    pub fn new<'a>(
        source_type: TypeHandle,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            source_type,
            source_kinds: DataKinds::default(),
            target_kinds: DataKinds::default(),
            pairs: pairs
                .into_iter()
                .map(|(source, target)| (Arc::from(source), Arc::from(target)))
                .collect(),
        }
    }

    /// Copies members that share a name on both sides.
    pub fn same_names<'a>(source_type: TypeHandle, names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(source_type, names.into_iter().map(|name| (name, name)))
    }

    #[must_use]
    pub fn source_kinds(mut self, kinds: DataKinds) -> Self {
        self.source_kinds = kinds;
        self
    }

    #[must_use]
    pub fn target_kinds(mut self, kinds: DataKinds) -> Self {
        self.target_kinds = kinds;
        self
    }

    pub fn source_type(&self) -> TypeHandle {
        self.source_type
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(source, target)| (&**source, &**target))
    }
}

/// Immutable description of one reflective operation; the delegate cache key.
///
/// Two descriptors are equal when every field matches, parameter types
/// compared in order by exact identity (by-ref markers included). The hash is
/// a wrapping sum of per-field hashes.
///
/// A descriptor built by name and one built from the resolved member address
/// the same operation but are distinct keys; [`CallInfo::canonicalize`]
/// rewrites the former into the latter.
#[derive(Clone, PartialEq, Eq)]
pub struct CallInfo {
    target_type: TypeHandle,
    kind: MemberKind,
    name: Option<Arc<str>>,
    param_types: Arc<[TypeHandle]>,
    is_static: bool,
    flags: Flags,
    member: Option<MemberRef>,
    is_read_operation: bool,
    mapping: Option<Arc<MapSpec>>,
}

impl CallInfo {
    /// A descriptor whose member is looked up by name.
    ///
    /// The static flag is derived from `flags`: `STATIC` without `INSTANCE`.
    pub fn new(
        target_type: TypeHandle,
        flags: Flags,
        kind: MemberKind,
        name: &str,
        param_types: &[TypeHandle],
    ) -> Self {
        Self {
            target_type,
            kind,
            name: (!name.is_empty()).then(|| Arc::from(name)),
            param_types: Arc::from(param_types),
            is_static: flags.is_static_lookup(),
            flags,
            member: None,
            is_read_operation: true,
            mapping: None,
        }
    }

    pub fn field(target_type: TypeHandle, name: &str) -> Self {
        Self::new(target_type, Flags::INSTANCE_ANY_VISIBILITY, MemberKind::Field, name, &[])
    }

    pub fn static_field(target_type: TypeHandle, name: &str) -> Self {
        Self::new(target_type, Flags::STATIC_ANY_VISIBILITY, MemberKind::Field, name, &[])
    }

    pub fn property(target_type: TypeHandle, name: &str) -> Self {
        Self::new(target_type, Flags::INSTANCE_ANY_VISIBILITY, MemberKind::Property, name, &[])
    }

    pub fn static_property(target_type: TypeHandle, name: &str) -> Self {
        Self::new(target_type, Flags::STATIC_ANY_VISIBILITY, MemberKind::Property, name, &[])
    }

    pub fn method(target_type: TypeHandle, name: &str, param_types: &[TypeHandle]) -> Self {
        Self::new(
            target_type,
            Flags::INSTANCE_ANY_VISIBILITY,
            MemberKind::Method,
            name,
            param_types,
        )
    }

    pub fn static_method(target_type: TypeHandle, name: &str, param_types: &[TypeHandle]) -> Self {
        Self::new(
            target_type,
            Flags::STATIC_ANY_VISIBILITY,
            MemberKind::Method,
            name,
            param_types,
        )
    }

    pub fn constructor(target_type: TypeHandle, param_types: &[TypeHandle]) -> Self {
        Self::new(
            target_type,
            Flags::INSTANCE_ANY_VISIBILITY,
            MemberKind::Constructor,
            "",
            param_types,
        )
    }

    /// Element access on the registered array type `array_type`.
    pub fn array_element(array_type: TypeHandle) -> Self {
        Self::new(array_type, Flags::INSTANCE, MemberKind::ArrayElement, "", &[])
    }

    /// A copy from `spec.source_type` members into `target_type` members.
    pub fn mapping(target_type: TypeHandle, spec: MapSpec) -> Self {
        Self {
            mapping: Some(Arc::new(spec)),
            is_read_operation: false,
            ..Self::new(target_type, Flags::INSTANCE_ANY_VISIBILITY, MemberKind::Mapping, "", &[])
        }
    }

    /// A descriptor for an already resolved member.
    ///
    /// Name, kind, static flag, parameter types and declaring type come from
    /// the member itself; flags are normalized to the member's canonical
    /// flags.
    pub fn from_member(registry: &TypeRegistry, member: MemberRef) -> Result<Self> {
        let (name, param_types, is_static, visibility) = match member.kind() {
            MemberKind::Field | MemberKind::Property => {
                let data = registry.data_member(&member)?;
                (
                    Some(Arc::clone(&data.name)),
                    Vec::new(),
                    data.is_static,
                    data.visibility,
                )
            }
            MemberKind::Method => {
                let method = registry.method(&member)?;
                (
                    Some(Arc::clone(&method.name)),
                    method.param_types(),
                    method.is_static,
                    method.visibility,
                )
            }
            MemberKind::Constructor => {
                let constructor = registry.constructor(&member)?;
                (None, constructor.param_types(), false, constructor.visibility)
            }
            kind @ (MemberKind::ArrayElement | MemberKind::Mapping) => {
                return Err(ReflectError::InvalidDescriptor(format!(
                    "a {kind} has no member reference"
                )));
            }
        };
        Ok(Self {
            target_type: member.declaring_type(),
            kind: member.kind(),
            name,
            param_types: Arc::from(param_types),
            is_static,
            flags: Flags::canonical(is_static, visibility),
            member: Some(member),
            is_read_operation: true,
            mapping: None,
        })
    }

    /// Resolves a by-name descriptor into the equivalent member-based one,
    /// keeping the target type and read/write direction. Descriptors that
    /// already carry a member, and array or mapping descriptors, are
    /// returned unchanged.
    pub fn canonicalize(&self, registry: &TypeRegistry) -> Result<Self> {
        if self.member.is_some()
            || matches!(self.kind, MemberKind::ArrayElement | MemberKind::Mapping)
        {
            return Ok(self.clone());
        }
        let resolved = match self.kind {
            MemberKind::Field | MemberKind::Property => lookup::data_member(registry, self)?,
            MemberKind::Method => lookup::method(registry, self)?,
            _ => lookup::constructor(registry, self)?,
        };
        Ok(Self::from_member(registry, resolved.member)?
            .with_target(self.target_type)
            .with_read_operation(self.is_read_operation))
    }

    #[must_use]
    pub fn with_target(&self, target_type: TypeHandle) -> Self {
        Self {
            target_type,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_flags(&self, flags: Flags) -> Self {
        Self {
            flags,
            is_static: flags.is_static_lookup(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_read_operation(&self, is_read_operation: bool) -> Self {
        Self {
            is_read_operation,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn for_read(&self) -> Self {
        self.with_read_operation(true)
    }

    #[must_use]
    pub fn for_write(&self) -> Self {
        self.with_read_operation(false)
    }

    #[must_use]
    pub fn with_mapping(&self, spec: MapSpec) -> Self {
        Self {
            mapping: Some(Arc::new(spec)),
            ..self.clone()
        }
    }

    pub fn target_type(&self) -> TypeHandle {
        self.target_type
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn param_types(&self) -> &[TypeHandle] {
        &self.param_types
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn member(&self) -> Option<MemberRef> {
        self.member
    }

    pub fn is_read_operation(&self) -> bool {
        self.is_read_operation
    }

    pub fn mapping_spec(&self) -> Option<&MapSpec> {
        self.mapping.as_deref()
    }

    /// Wrapping sum of the hashes of every field.
    pub fn summed_hash(&self) -> u64 {
        let mut hash = field_hash(&self.target_type)
            .wrapping_add(field_hash(&self.kind))
            .wrapping_add(field_hash(&self.name))
            .wrapping_add(field_hash(&self.is_static))
            .wrapping_add(field_hash(&self.flags))
            .wrapping_add(field_hash(&self.member))
            .wrapping_add(field_hash(&self.is_read_operation))
            .wrapping_add(field_hash(&self.mapping));
        // Positional, so that reordered parameters hash differently.
        for (position, ty) in self.param_types.iter().enumerate() {
            hash = hash.wrapping_add(field_hash(&(position, ty)));
        }
        hash
    }

    pub(crate) fn member_label(&self) -> String {
        let owner = self.target_type.name();
        match (self.kind, self.name.as_deref()) {
            (MemberKind::Method, Some(name)) => {
                format!("{owner}::{name}({})", signature(&self.param_types))
            }
            (MemberKind::Constructor, _) => format!("{owner}({})", signature(&self.param_types)),
            (_, Some(name)) => format!("{owner}::{name}"),
            (kind, None) => format!("{owner} {kind}"),
        }
    }
}

fn field_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = AHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

impl Hash for CallInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.summed_hash());
    }
}

impl std::fmt::Debug for CallInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("CallInfo");
        debug
            .field("target", &self.target_type)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("params", &signature(&self.param_types))
            .field("static", &self.is_static)
            .field("flags", &self.flags)
            .field("read", &self.is_read_operation);
        if let Some(member) = &self.member {
            debug.field("member", member);
        }
        if let Some(mapping) = &self.mapping {
            debug.field("mapping", mapping);
        }
        debug.finish()
    }
}

impl std::fmt::Display for CallInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{} {}",
            if self.is_static { "static " } else { "" },
            self.kind,
            self.member_label()
        )
    }
}
