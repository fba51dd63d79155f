//! Member resolution against the type registry.
//!
//! Candidates are collected while walking from the target type up its base
//! chain. The winner is the one declared closest to the target; ties go to
//! an exact-case name match, then to declaration order. Ambiguity is never
//! an error.

use std::sync::Arc;

use reflecta_utils::find_best_match;

use super::CallInfo;
use crate::error::{Accessor, ReflectError, Result};
use crate::types::{
    BaseLink, DataKinds, DataMember, Flags, MemberKind, MemberRef, TypeHandle, TypeInfo,
    TypeRegistry, signature,
};

/// A member selected for a descriptor.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub owner: Arc<TypeInfo>,
    pub member: MemberRef,
    /// Base links from the descriptor's target type to `owner`.
    pub path: Vec<BaseLink>,
}

impl Resolved {
    pub fn data(&self) -> &DataMember {
        &self.owner.data_members[self.member.index]
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    depth: usize,
    inexact: bool,
    index: usize,
}

struct Search {
    chain: Vec<Arc<TypeInfo>>,
}

impl Search {
    fn new(registry: &TypeRegistry, target: TypeHandle, flags: Flags) -> Result<Self> {
        let mut chain = registry.hierarchy(target)?;
        if flags.contains(Flags::DECLARED_ONLY) {
            chain.truncate(1);
        }
        Ok(Self { chain })
    }

    fn best<T>(
        &self,
        members: impl Fn(&TypeInfo) -> &[T],
        wanted: &str,
        flags: Flags,
        name_of: impl Fn(&T) -> &str,
        accept: impl Fn(&T) -> bool,
    ) -> Option<(usize, usize)> {
        let mut best: Option<(Rank, usize, usize)> = None;
        for (depth, info) in self.chain.iter().enumerate() {
            for (index, member) in members(info).iter().enumerate() {
                let name = name_of(member);
                if !flags.matches_name(wanted, name) || !accept(member) {
                    continue;
                }
                let rank = Rank {
                    depth,
                    inexact: name != wanted,
                    index,
                };
                if best.is_none_or(|(current, _, _)| rank < current) {
                    best = Some((rank, depth, index));
                }
            }
        }
        best.map(|(_, depth, index)| (depth, index))
    }

    fn suggest(&self, wanted: &str, kind: MemberKind) -> Option<String> {
        find_best_match(
            wanted,
            self.chain.iter().flat_map(|info| info.member_names(kind)),
        )
    }

    fn resolved(&self, depth: usize, kind: MemberKind, index: usize) -> Resolved {
        let owner = Arc::clone(&self.chain[depth]);
        Resolved {
            member: MemberRef {
                declaring_type: owner.handle,
                kind,
                index,
            },
            path: self.chain[..depth].iter().filter_map(|info| info.base).collect(),
            owner,
        }
    }

    fn target(&self) -> &TypeInfo {
        &self.chain[0]
    }
}

fn required_name(info: &CallInfo) -> Result<&str> {
    info.name()
        .ok_or_else(|| ReflectError::InvalidDescriptor(format!("{info} has no member name")))
}

/// Resolves the field or property a data-member descriptor addresses and
/// checks that it has the accessor the operation needs.
pub(crate) fn data_member(registry: &TypeRegistry, info: &CallInfo) -> Result<Resolved> {
    let resolved = match info.member() {
        Some(member) => by_reference(registry, info, member)?,
        None => {
            let name = required_name(info)?;
            let kinds = match info.kind() {
                MemberKind::Field => DataKinds::Fields,
                MemberKind::Property => DataKinds::Properties,
                kind => {
                    return Err(ReflectError::InvalidDescriptor(format!(
                        "a {kind} is not a data member"
                    )));
                }
            };
            find_data(registry, info.target_type(), kinds, name, info.flags(), info.is_static())?
                .ok_or_else(|| missing_data(registry, info, name))?
        }
    };
    let data = resolved.data();
    let accessor = if info.is_read_operation() {
        Accessor::Get
    } else {
        Accessor::Set
    };
    let available = match accessor {
        Accessor::Get => data.can_read(),
        Accessor::Set => data.can_write(),
    };
    if !available {
        return Err(ReflectError::MissingProperty {
            type_name: info.target_type().name(),
            name: data.name().to_string(),
            accessor,
            suggestion: None,
        });
    }
    Ok(resolved)
}

/// Looks up a data member of any of `kinds` by name; `None` when nothing
/// matches.
pub(crate) fn find_data(
    registry: &TypeRegistry,
    target: TypeHandle,
    kinds: DataKinds,
    name: &str,
    flags: Flags,
    is_static: bool,
) -> Result<Option<Resolved>> {
    let search = Search::new(registry, target, flags)?;
    let found = search.best(
        |info| info.data_members.as_slice(),
        name,
        flags,
        DataMember::name,
        |member| {
            kinds.admits(member.kind)
                && member.is_static == is_static
                && flags.admits_visibility(member.visibility)
        },
    );
    Ok(found.map(|(depth, index)| {
        let kind = search.chain[depth].data_members[index].kind;
        search.resolved(depth, kind, index)
    }))
}

fn missing_data(registry: &TypeRegistry, info: &CallInfo, name: &str) -> ReflectError {
    let suggestion = Search::new(registry, info.target_type(), info.flags())
        .ok()
        .and_then(|search| search.suggest(name, info.kind()));
    let type_name = info.target_type().name();
    match info.kind() {
        MemberKind::Property => ReflectError::MissingProperty {
            type_name,
            name: name.to_string(),
            accessor: if info.is_read_operation() {
                Accessor::Get
            } else {
                Accessor::Set
            },
            suggestion,
        },
        _ => ReflectError::MissingField {
            type_name,
            name: name.to_string(),
            suggestion,
        },
    }
}

pub(crate) fn method(registry: &TypeRegistry, info: &CallInfo) -> Result<Resolved> {
    if let Some(member) = info.member() {
        return by_reference(registry, info, member);
    }
    let name = required_name(info)?;
    let search = Search::new(registry, info.target_type(), info.flags())?;
    let found = search.best(
        |info| info.methods.as_slice(),
        name,
        info.flags(),
        |method| method.name(),
        |method| {
            method.is_static == info.is_static()
                && info.flags().admits_visibility(method.visibility)
                && method.accepts(info.param_types())
        },
    );
    match found {
        Some((depth, index)) => Ok(search.resolved(depth, MemberKind::Method, index)),
        None => Err(ReflectError::MissingMethod {
            type_name: info.target_type().name(),
            name: name.to_string(),
            signature: signature(info.param_types()),
            suggestion: search.suggest(name, MemberKind::Method),
        }),
    }
}

/// Constructors are never inherited; only the target type is searched.
pub(crate) fn constructor(registry: &TypeRegistry, info: &CallInfo) -> Result<Resolved> {
    if let Some(member) = info.member() {
        return by_reference(registry, info, member);
    }
    let search = Search::new(registry, info.target_type(), Flags::DECLARED_ONLY)?;
    let index = search
        .target()
        .constructors
        .iter()
        .position(|constructor| {
            info.flags().admits_visibility(constructor.visibility)
                && constructor.accepts(info.param_types())
        })
        .ok_or_else(|| ReflectError::MissingConstructor {
            type_name: info.target_type().name(),
            signature: signature(info.param_types()),
        })?;
    Ok(search.resolved(0, MemberKind::Constructor, index))
}

/// Validates a descriptor that already names its member.
fn by_reference(registry: &TypeRegistry, info: &CallInfo, member: MemberRef) -> Result<Resolved> {
    if member.kind != info.kind() {
        return Err(ReflectError::InvalidDescriptor(format!(
            "{info} refers to a {}",
            member.kind
        )));
    }
    let owner = registry.require(member.declaring_type)?;
    if !owner.declares(&member) {
        return Err(ReflectError::InvalidDescriptor(format!(
            "{} #{} does not exist on `{}`",
            member.kind, member.index, member.declaring_type
        )));
    }
    let path = registry
        .upcast_path(info.target_type(), member.declaring_type)
        .ok_or_else(|| {
            ReflectError::target_mismatch(member.declaring_type, Some(info.target_type()))
        })?;
    Ok(Resolved {
        owner,
        member,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParamInfo, TypeBuilder, Value};

    #[derive(Default)]
    struct Shape {
        sides: u32,
        tag: String,
    }

    #[derive(Default)]
    struct Square {
        shape: Shape,
        tag: String,
    }

    impl AsRef<Shape> for Square {
        fn as_ref(&self) -> &Shape {
            &self.shape
        }
    }

    impl AsMut<Shape> for Square {
        fn as_mut(&mut self) -> &mut Shape {
            &mut self.shape
        }
    }

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::new();
        registry.register(
            TypeBuilder::<Shape>::reference()
                .field("sides", |s| &s.sides, |s| &mut s.sides)
                .property("Tag", Some(|s: &Shape| s.tag.clone()), None)
                .method("area", [], TypeHandle::of::<f64>(), |_, _| {
                    Ok(Value::from(0.0_f64))
                })
                .build(),
        );
        registry.register(
            TypeBuilder::<Square>::reference()
                .inherits::<Shape>()
                .property(
                    "Tag",
                    Some(|s: &Square| s.tag.clone()),
                    Some(|s: &mut Square, tag: String| s.tag = tag),
                )
                .property("tag", Some(|s: &Square| s.tag.to_lowercase()), None)
                .method(
                    "area",
                    [ParamInfo::of::<f64>("side")],
                    TypeHandle::of::<f64>(),
                    |_, args| Ok(Value::from(args[0].get::<f64>().unwrap_or_default().powi(2))),
                )
                .constructor([], |_| Ok(Square::default()))
                .build(),
        );
        registry
    }

    #[test]
    fn most_derived_declaration_wins() {
        let registry = registry();
        let info = CallInfo::property(TypeHandle::of::<Square>(), "Tag");
        let resolved = data_member(&registry, &info).expect("resolve");
        assert_eq!(resolved.member.declaring_type, TypeHandle::of::<Square>());
        assert!(resolved.path.is_empty());
    }

    #[test]
    fn exact_case_beats_declaration_order_when_ignoring_case() {
        let registry = registry();
        let info = CallInfo::property(TypeHandle::of::<Square>(), "tag")
            .with_flags(Flags::INSTANCE_ANY_VISIBILITY | Flags::IGNORE_CASE);
        let resolved = data_member(&registry, &info).expect("resolve");
        assert_eq!(resolved.data().name(), "tag");
    }

    #[test]
    fn inherited_members_carry_an_upcast_path() {
        let registry = registry();
        let info = CallInfo::field(TypeHandle::of::<Square>(), "sides");
        let resolved = data_member(&registry, &info).expect("resolve");
        assert_eq!(resolved.member.declaring_type, TypeHandle::of::<Shape>());
        assert_eq!(resolved.path.len(), 1);

        let declared_only = info.with_flags(Flags::INSTANCE | Flags::DECLARED_ONLY);
        assert!(matches!(
            data_member(&registry, &declared_only),
            Err(ReflectError::MissingField { .. })
        ));
    }

    #[test]
    fn methods_match_exact_signatures() {
        let registry = registry();
        let square = TypeHandle::of::<Square>();
        let derived = CallInfo::method(square, "area", &[TypeHandle::of::<f64>()]);
        let inherited = CallInfo::method(square, "area", &[]);
        assert_eq!(
            method(&registry, &derived).expect("derived").member.declaring_type,
            square
        );
        assert_eq!(
            method(&registry, &inherited).expect("base").member.declaring_type,
            TypeHandle::of::<Shape>()
        );
        let err = method(&registry, &CallInfo::method(square, "area", &[TypeHandle::of::<i32>()]))
            .unwrap_err();
        assert_eq!(err.to_string(), "no method `area(i32)` on `Square`");
    }

    #[test]
    fn read_only_property_rejects_writes() {
        let registry = registry();
        let info = CallInfo::property(TypeHandle::of::<Shape>(), "Tag").for_write();
        let err = data_member(&registry, &info).unwrap_err();
        assert!(matches!(
            err,
            ReflectError::MissingProperty {
                accessor: Accessor::Set,
                ..
            }
        ));
    }

    #[test]
    fn constructors_are_not_inherited() {
        let registry = registry();
        assert!(constructor(&registry, &CallInfo::constructor(TypeHandle::of::<Square>(), &[])).is_ok());
        assert!(matches!(
            constructor(&registry, &CallInfo::constructor(TypeHandle::of::<Shape>(), &[])),
            Err(ReflectError::MissingConstructor { .. })
        ));
    }

    #[test]
    fn member_references_are_validated_against_target() {
        let registry = registry();
        let shape = registry.require(TypeHandle::of::<Shape>()).expect("shape");
        let sides = shape.data_member_ref("sides").expect("sides");
        let from_member = CallInfo::from_member(&registry, sides).expect("descriptor");
        let on_square = from_member.with_target(TypeHandle::of::<Square>());
        assert_eq!(data_member(&registry, &on_square).expect("resolve").path.len(), 1);

        registry.register(TypeBuilder::<u64>::value_type().build());
        let unrelated = from_member.with_target(TypeHandle::of::<u64>());
        assert!(matches!(
            data_member(&registry, &unrelated),
            Err(ReflectError::TargetMismatch { .. })
        ));
    }
}
