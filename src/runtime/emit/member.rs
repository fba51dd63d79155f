use std::sync::Arc;

use tracing::trace;

use super::target::TargetLoader;
use super::{Emitter, check_static};
use crate::error::{ReflectError, Result};
use crate::runtime::{CallInfo, Thunk, lookup};
use crate::types::{GetAccess, SetAccess, TypeRegistry, Value};

/// Emits a getter for a field or property.
pub struct MemberGetEmitter {
    info: CallInfo,
    registry: Arc<TypeRegistry>,
}

impl MemberGetEmitter {
    pub fn new(info: CallInfo, registry: Arc<TypeRegistry>) -> Self {
        Self { info, registry }
    }
}

impl Emitter for MemberGetEmitter {
    fn call_info(&self) -> &CallInfo {
        &self.info
    }

    fn emit(&self) -> Result<Thunk> {
        let resolved = lookup::data_member(&self.registry, &self.info)?;
        let data = resolved.data();
        check_static(&self.info, data.is_static())?;
        trace!(member = %self.info, owner = %data.declaring_type(), "emitting getter");

        let access = data.getter().cloned();
        match access {
            Some(GetAccess::Static(get)) => Ok(Thunk::StaticGetter(get)),
            Some(GetAccess::Instance(get)) => {
                let loader =
                    TargetLoader::new(&self.registry, self.info.target_type(), self.info.member_label());
                let path = resolved.path;
                Ok(Thunk::Getter(Arc::new(move |target: &Value| -> Result<Value> {
                    loader.read(target, &path, |instance| get(instance))
                })))
            }
            None => missing_accessor(&self.info),
        }
    }
}

/// Emits a setter for a field or property.
pub struct MemberSetEmitter {
    info: CallInfo,
    registry: Arc<TypeRegistry>,
}

impl MemberSetEmitter {
    pub fn new(info: CallInfo, registry: Arc<TypeRegistry>) -> Self {
        Self { info, registry }
    }
}

impl Emitter for MemberSetEmitter {
    fn call_info(&self) -> &CallInfo {
        &self.info
    }

    fn emit(&self) -> Result<Thunk> {
        let resolved = lookup::data_member(&self.registry, &self.info)?;
        let data = resolved.data();
        check_static(&self.info, data.is_static())?;
        trace!(member = %self.info, owner = %data.declaring_type(), "emitting setter");

        let access = data.setter().cloned();
        match access {
            Some(SetAccess::Static(set)) => Ok(Thunk::StaticSetter(set)),
            Some(SetAccess::Instance(set)) => {
                let loader =
                    TargetLoader::new(&self.registry, self.info.target_type(), self.info.member_label());
                let path = resolved.path;
                Ok(Thunk::Setter(Arc::new(
                    move |target: &Value, value: Value| -> Result<()> {
                        loader.write(target, &path, |instance| set(instance, value))
                    },
                )))
            }
            None => missing_accessor(&self.info),
        }
    }
}

// Lookup rejects members without the requested accessor first.
fn missing_accessor(info: &CallInfo) -> Result<Thunk> {
    Err(ReflectError::InvalidDescriptor(format!(
        "{info} has no accessor for this direction"
    )))
}

#[cfg(test)]
mod tests {
    use parking_lot::RwLock;

    use super::*;
    use crate::error::Accessor;
    use crate::types::{Flags, MemberKind, TypeBuilder, TypeHandle};

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Account {
        balance: i64,
        owner: String,
    }

    static RATE: RwLock<f64> = RwLock::new(0.5);

    fn registry() -> Arc<TypeRegistry> {
        let registry = Arc::new(TypeRegistry::new());
        registry.register(
            TypeBuilder::<Account>::value_type()
                .private_field("balance", |a| &a.balance, |a| &mut a.balance)
                .property(
                    "Owner",
                    Some(|a: &Account| a.owner.clone()),
                    Some(|a: &mut Account, owner: String| a.owner = owner),
                )
                .private_static_field("rate", &RATE)
                .build(),
        );
        registry
    }

    fn emit(info: CallInfo) -> Result<Thunk> {
        super::super::emitter_for(&info, &registry()).emit()
    }

    #[test]
    fn value_type_round_trip_through_holder() -> Result<()> {
        let account = TypeHandle::of::<Account>();
        let getter = emit(CallInfo::field(account, "balance"))?.getter()?;
        let setter = emit(CallInfo::field(account, "balance").for_write())?.setter()?;

        let held = Value::holder(Account::default());
        setter(&held, Value::from(250_i64))?;
        assert_eq!(getter(&held)?.get::<i64>(), Some(250));
        assert_eq!(held.get::<Account>().map(|a| a.balance), Some(250));
        Ok(())
    }

    #[test]
    fn setter_rejects_wrong_types_and_null() -> Result<()> {
        let setter = emit(
            CallInfo::property(TypeHandle::of::<Account>(), "Owner").for_write(),
        )?
        .setter()?;
        let held = Value::holder(Account::default());
        assert!(matches!(
            setter(&held, Value::from(5_i32)),
            Err(ReflectError::ValueMismatch { .. })
        ));
        assert!(matches!(
            setter(&held, Value::Null),
            Err(ReflectError::ValueMismatch { .. })
        ));
        setter(&held, Value::from("ada"))?;
        assert_eq!(held.get::<Account>().map(|a| a.owner), Some("ada".to_string()));
        Ok(())
    }

    #[test]
    fn static_members_emit_static_thunks() -> Result<()> {
        let account = TypeHandle::of::<Account>();
        let info = CallInfo::new(account, Flags::STATIC | Flags::NON_PUBLIC, MemberKind::Field, "rate", &[]);
        let get = emit(info.clone())?.static_getter()?;
        let set = emit(info.for_write())?.static_setter()?;
        set(Value::from(0.75_f64))?;
        assert_eq!(get()?.get::<f64>(), Some(0.75));
        assert!(matches!(
            emit(CallInfo::field(account, "rate")),
            Err(ReflectError::MissingField { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_property_accessor_is_named() {
        let registry = Arc::new(TypeRegistry::new());
        registry.register(
            TypeBuilder::<Account>::value_type()
                .property("Owner", Some(|a: &Account| a.owner.clone()), None)
                .build(),
        );
        let info = CallInfo::property(TypeHandle::of::<Account>(), "Owner").for_write();
        let err = MemberSetEmitter::new(info, registry).emit().unwrap_err();
        assert!(matches!(
            err,
            ReflectError::MissingProperty {
                accessor: Accessor::Set,
                ..
            }
        ));
    }
}
