use std::any::Any;
use std::sync::Arc;

use crate::error::{ReflectError, Result};
use crate::types::{
    BaseLink, DynValue, ObjectRef, ParamInfo, TypeHandle, TypeRegistry, Value, upcast, upcast_mut,
};

/// Loads the instance a thunk operates on.
///
/// The instance's runtime type must be the descriptor's target type or a
/// registered subtype of it. Reference types are locked in place: shared for
/// reads, exclusive for writes. Value types held in a [`crate::ValueHolder`]
/// are copied into a local, the local is mutated, and the local is stored
/// back only if the operation succeeds. A bare boxed value type is accepted
/// for reads only, since a write to it would be lost.
#[derive(Clone)]
pub(crate) struct TargetLoader {
    expected: TypeHandle,
    registry: Arc<TypeRegistry>,
    label: Arc<str>,
}

impl TargetLoader {
    pub fn new(registry: &Arc<TypeRegistry>, expected: TypeHandle, label: String) -> Self {
        Self {
            expected,
            registry: Arc::clone(registry),
            label: Arc::from(label),
        }
    }

    /// Runs `f` on the instance projected through `path`.
    pub fn read<R>(
        &self,
        target: &Value,
        path: &[BaseLink],
        f: impl FnOnce(&dyn Any) -> Result<R>,
    ) -> Result<R> {
        let prefix = self.subtype_prefix(target)?;
        let project = |instance: &dyn Any| -> Result<R> {
            let instance = upcast(&prefix, instance)
                .and_then(|instance| upcast(path, instance))
                .ok_or_else(|| self.mismatch(target))?;
            f(instance)
        };
        match target {
            Value::Null => Err(ReflectError::NullTarget(self.label.to_string())),
            Value::Object(object) => object.read(project),
            Value::Holder(holder) => project(holder.lock().as_any()),
            Value::Boxed(boxed) => project(boxed.as_any()),
        }
    }

    /// Runs `f` on the instance projected through `path` with exclusive
    /// access.
    pub fn write<R>(
        &self,
        target: &Value,
        path: &[BaseLink],
        f: impl FnOnce(&mut dyn Any) -> Result<R>,
    ) -> Result<R> {
        let prefix = self.subtype_prefix(target)?;
        let project = |instance: &mut dyn Any| -> Result<R> {
            let instance = upcast_mut(&prefix, instance)
                .and_then(|instance| upcast_mut(path, instance))
                .ok_or_else(|| self.mismatch(target))?;
            f(instance)
        };
        match target {
            Value::Null => Err(ReflectError::NullTarget(self.label.to_string())),
            Value::Object(object) => object.write(project),
            Value::Holder(holder) => {
                let mut slot = holder.lock();
                let mut local: Box<dyn DynValue> = slot.clone_value();
                let result = project(local.as_any_mut())?;
                *slot = local;
                Ok(result)
            }
            Value::Boxed(_) => Err(ReflectError::ImmutableTarget(self.expected.to_string())),
        }
    }

    /// Base links from a subtype instance to the expected type; empty when
    /// the instance is exactly the expected type.
    fn subtype_prefix(&self, target: &Value) -> Result<Vec<BaseLink>> {
        let Some(found) = target.type_handle() else {
            return Err(ReflectError::NullTarget(self.label.to_string()));
        };
        if found == self.expected {
            return Ok(Vec::new());
        }
        self.registry
            .upcast_path(found, self.expected)
            .ok_or_else(|| ReflectError::target_mismatch(self.expected, Some(found)))
    }

    fn mismatch(&self, target: &Value) -> ReflectError {
        ReflectError::target_mismatch(self.expected, target.type_handle())
    }
}

/// Converts caller arguments into locals of the declared parameter types.
///
/// A parameter declared as [`Value`] takes any argument, null included; one
/// declared as [`ObjectRef`] takes any reference-type instance. Every other
/// parameter needs an argument of exactly its type; a held value type is
/// copied out of its holder.
pub(crate) fn prepare_arguments(
    label: &str,
    params: &[ParamInfo],
    args: &[Value],
) -> Result<Vec<Value>> {
    if args.len() != params.len() {
        return Err(ReflectError::ArgumentCount {
            member: label.to_string(),
            expected: params.len(),
            found: args.len(),
        });
    }
    params
        .iter()
        .zip(args)
        .map(|(param, arg)| convert_argument(label, param, arg))
        .collect()
}

fn convert_argument(label: &str, param: &ParamInfo, arg: &Value) -> Result<Value> {
    let declared = param.param_type().element();
    if declared == TypeHandle::of::<Value>() {
        return Ok(arg.clone());
    }
    if declared == TypeHandle::of::<ObjectRef>() && arg.as_object().is_some() {
        return Ok(arg.clone());
    }
    if arg.type_handle() != Some(declared) {
        return Err(ReflectError::value_mismatch(
            &format!("{label} parameter `{}`", param.name()),
            declared,
            arg.type_handle(),
        ));
    }
    Ok(arg.clone().unwrap_holder())
}

/// Copies by-ref locals back into the caller's argument slots.
pub(crate) fn write_back(params: &[ParamInfo], locals: Vec<Value>, args: &mut [Value]) {
    for ((param, local), slot) in params.iter().zip(locals).zip(args.iter_mut()) {
        if param.is_by_ref() {
            *slot = local;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeBuilder, ValueHolder};

    #[derive(Clone, Debug, PartialEq)]
    struct Cell {
        value: i32,
    }

    fn loader() -> TargetLoader {
        let registry = Arc::new(TypeRegistry::new());
        registry.register(TypeBuilder::<Cell>::value_type().build());
        TargetLoader::new(&registry, TypeHandle::of::<Cell>(), "Cell::value".to_string())
    }

    fn bump(instance: &mut dyn Any) -> Result<()> {
        let cell = instance
            .downcast_mut::<Cell>()
            .ok_or_else(|| ReflectError::invocation("not a cell"))?;
        cell.value += 1;
        Ok(())
    }

    #[test]
    fn holder_writes_are_stored_back() {
        let loader = loader();
        let holder = ValueHolder::new(Cell { value: 1 });
        let target = Value::Holder(holder.clone());
        loader.write(&target, &[], bump).expect("write");
        assert_eq!(holder.get::<Cell>(), Some(Cell { value: 2 }));
    }

    #[test]
    fn failed_writes_leave_holder_untouched() {
        let loader = loader();
        let holder = ValueHolder::new(Cell { value: 1 });
        let target = Value::Holder(holder.clone());
        let outcome: Result<()> = loader.write(&target, &[], |instance| {
            bump(instance)?;
            Err(ReflectError::invocation("rollback"))
        });
        assert!(outcome.is_err());
        assert_eq!(holder.get::<Cell>(), Some(Cell { value: 1 }));
    }

    #[test]
    fn boxed_value_types_are_read_only() {
        let loader = loader();
        let target = Value::new(Cell { value: 5 });
        let read = loader.read(&target, &[], |instance| {
            Ok(instance.downcast_ref::<Cell>().map(|cell| cell.value))
        });
        assert_eq!(read.expect("read"), Some(5));
        assert!(matches!(
            loader.write(&target, &[], bump),
            Err(ReflectError::ImmutableTarget(_))
        ));
    }

    #[test]
    fn null_and_foreign_targets_are_rejected() {
        let loader = loader();
        assert!(matches!(
            loader.read(&Value::Null, &[], |_| Ok(())),
            Err(ReflectError::NullTarget(_))
        ));
        assert!(matches!(
            loader.read(&Value::from(3_i32), &[], |_| Ok(())),
            Err(ReflectError::TargetMismatch { .. })
        ));
    }

    #[test]
    fn arguments_are_checked_and_copied() {
        let params = [
            ParamInfo::of::<i32>("count"),
            ParamInfo::of::<Value>("anything"),
            ParamInfo::by_ref::<Cell>("cell"),
        ];
        let holder = Value::holder(Cell { value: 3 });
        let mut args = vec![Value::from(1_i32), Value::Null, holder];
        let mut locals = prepare_arguments("f", &params, &args).expect("prepare");
        assert!(matches!(locals[2], Value::Boxed(_)));
        locals[2] = Value::new(Cell { value: 4 });
        write_back(&params, locals, &mut args);
        assert_eq!(args[2].get::<Cell>(), Some(Cell { value: 4 }));

        let err = prepare_arguments("f", &params, &args[..2]).unwrap_err();
        assert!(matches!(err, ReflectError::ArgumentCount { expected: 3, found: 2, .. }));
        let wrong = [Value::from("one"), Value::Null, Value::new(Cell { value: 0 })];
        assert!(matches!(
            prepare_arguments("f", &params, &wrong),
            Err(ReflectError::ValueMismatch { .. })
        ));
    }
}
