use std::sync::Arc;

use tracing::trace;

use super::Emitter;
use super::target::TargetLoader;
use crate::error::{Accessor, ReflectError, Result};
use crate::runtime::lookup::{self, Resolved};
use crate::runtime::{CallInfo, Thunk};
use crate::types::{
    BaseLink, DataKinds, Flags, GetAccess, InstanceGetFn, InstanceSetFn, SetAccess, TypeHandle,
    TypeRegistry, Value, upcast, upcast_mut,
};

/// Emits a copier that reads each mapped source member and writes it to the
/// paired target member, in pair order.
///
/// All source values are read before the target is locked, so copying an
/// instance onto itself does not deadlock.
pub struct MapEmitter {
    info: CallInfo,
    registry: Arc<TypeRegistry>,
}

impl MapEmitter {
    pub fn new(info: CallInfo, registry: Arc<TypeRegistry>) -> Self {
        Self { info, registry }
    }

    fn resolve(
        &self,
        owner: TypeHandle,
        kinds: DataKinds,
        name: &str,
        accessor: Accessor,
    ) -> Result<Resolved> {
        let found = lookup::find_data(
            &self.registry,
            owner,
            kinds,
            name,
            Flags::INSTANCE_ANY_VISIBILITY,
            false,
        )?;
        let usable = found.filter(|resolved| match accessor {
            Accessor::Get => resolved.data().can_read(),
            Accessor::Set => resolved.data().can_write(),
        });
        usable.ok_or_else(|| match kinds {
            DataKinds::Fields => ReflectError::MissingField {
                type_name: owner.name(),
                name: name.to_string(),
                suggestion: None,
            },
            DataKinds::Properties | DataKinds::FieldsAndProperties => {
                ReflectError::MissingProperty {
                    type_name: owner.name(),
                    name: name.to_string(),
                    accessor,
                    suggestion: None,
                }
            }
        })
    }
}

struct Read {
    path: Vec<BaseLink>,
    get: InstanceGetFn,
}

struct Write {
    path: Vec<BaseLink>,
    set: InstanceSetFn,
}

impl Emitter for MapEmitter {
    fn call_info(&self) -> &CallInfo {
        &self.info
    }

    fn emit(&self) -> Result<Thunk> {
        let spec = self.info.mapping_spec().ok_or_else(|| {
            ReflectError::InvalidDescriptor(format!("{} has no member pairs", self.info))
        })?;
        let source_type = spec.source_type;
        let target_type = self.info.target_type();

        let mut reads = Vec::with_capacity(spec.pairs.len());
        let mut writes = Vec::with_capacity(spec.pairs.len());
        for (source_name, target_name) in spec.pairs() {
            let source = self.resolve(source_type, spec.source_kinds, source_name, Accessor::Get)?;
            let target = self.resolve(target_type, spec.target_kinds, target_name, Accessor::Set)?;
            let (from, to) = (source.data(), target.data());
            if from.declared_type() != to.declared_type() {
                return Err(ReflectError::MappingMismatch {
                    source_member: format!("{}::{}", source_type.name(), from.name()),
                    source_type: from.declared_type().to_string(),
                    target_member: format!("{}::{}", target_type.name(), to.name()),
                    target_type: to.declared_type().to_string(),
                });
            }
            let (Some(GetAccess::Instance(get)), Some(SetAccess::Instance(set))) =
                (from.getter().cloned(), to.setter().cloned())
            else {
                return Err(ReflectError::InvalidDescriptor(format!(
                    "{} maps a static member",
                    self.info
                )));
            };
            reads.push(Read {
                path: source.path,
                get,
            });
            writes.push(Write {
                path: target.path,
                set,
            });
        }
        trace!(
            source = %source_type,
            target = %target_type,
            members = reads.len(),
            "emitting member copier"
        );

        let source_loader = TargetLoader::new(&self.registry, source_type, source_type.name());
        let target_loader = TargetLoader::new(&self.registry, target_type, target_type.name());
        Ok(Thunk::Copier(Arc::new(
            move |source: &Value, target: &Value| -> Result<()> {
                let values = source_loader.read(source, &[], |instance| {
                    reads
                        .iter()
                        .map(|read| {
                            let owner = upcast(&read.path, instance)
                                .ok_or_else(|| ReflectError::target_mismatch(source_type, source.type_handle()))?;
                            (read.get)(owner)
                        })
                        .collect::<Result<Vec<Value>>>()
                })?;
                target_loader.write(target, &[], |instance| {
                    for (write, value) in writes.iter().zip(values) {
                        let owner = upcast_mut(&write.path, &mut *instance)
                            .ok_or_else(|| ReflectError::target_mismatch(target_type, target.type_handle()))?;
                        (write.set)(owner, value)?;
                    }
                    Ok(())
                })
            },
        )))
    }
}
