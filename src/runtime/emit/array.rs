use std::sync::Arc;

use tracing::trace;

use super::Emitter;
use super::target::TargetLoader;
use crate::error::{ReflectError, Result};
use crate::runtime::{CallInfo, Thunk};
use crate::types::{ArrayOps, TypeRegistry, Value};

fn array_ops(registry: &TypeRegistry, info: &CallInfo) -> Result<ArrayOps> {
    let array_type = info.target_type();
    registry
        .get(array_type)
        .and_then(|array| array.array_ops().copied())
        .ok_or_else(|| ReflectError::MissingArrayElement(array_type.to_string()))
}

fn not_an_array(info: &CallInfo) -> ReflectError {
    ReflectError::MissingArrayElement(info.target_type().to_string())
}

/// Emits a bounds-checked element reader for a registered array type.
pub struct ArrayGetEmitter {
    info: CallInfo,
    registry: Arc<TypeRegistry>,
}

impl ArrayGetEmitter {
    pub fn new(info: CallInfo, registry: Arc<TypeRegistry>) -> Self {
        Self { info, registry }
    }
}

impl Emitter for ArrayGetEmitter {
    fn call_info(&self) -> &CallInfo {
        &self.info
    }

    fn emit(&self) -> Result<Thunk> {
        let ops = array_ops(&self.registry, &self.info)?;
        trace!(array = %self.info.target_type(), "emitting array element getter");
        let loader =
            TargetLoader::new(&self.registry, self.info.target_type(), self.info.member_label());
        let info = self.info.clone();
        Ok(Thunk::ArrayGet(Arc::new(
            move |target: &Value, index: usize| -> Result<Value> {
                loader.read(target, &[], |array| {
                    let len = (ops.len)(array).ok_or_else(|| not_an_array(&info))?;
                    if index >= len {
                        return Err(ReflectError::IndexOutOfRange { index, len });
                    }
                    (ops.get)(array, index).ok_or_else(|| not_an_array(&info))
                })
            },
        )))
    }
}

/// Emits a bounds-checked element writer for a registered array type.
pub struct ArraySetEmitter {
    info: CallInfo,
    registry: Arc<TypeRegistry>,
}

impl ArraySetEmitter {
    pub fn new(info: CallInfo, registry: Arc<TypeRegistry>) -> Self {
        Self { info, registry }
    }
}

impl Emitter for ArraySetEmitter {
    fn call_info(&self) -> &CallInfo {
        &self.info
    }

    fn emit(&self) -> Result<Thunk> {
        let ops = array_ops(&self.registry, &self.info)?;
        trace!(array = %self.info.target_type(), "emitting array element setter");
        let loader =
            TargetLoader::new(&self.registry, self.info.target_type(), self.info.member_label());
        let info = self.info.clone();
        Ok(Thunk::ArraySet(Arc::new(
            move |target: &Value, index: usize, value: Value| -> Result<()> {
                let found = value.type_handle();
                if found != Some(ops.element) {
                    return Err(ReflectError::value_mismatch(
                        &format!("{} element", info.target_type()),
                        ops.element,
                        found,
                    ));
                }
                loader.write(target, &[], |array| {
                    let len = (ops.len)(array).ok_or_else(|| not_an_array(&info))?;
                    if index >= len {
                        return Err(ReflectError::IndexOutOfRange { index, len });
                    }
                    (ops.set)(array, index, value).ok_or_else(|| not_an_array(&info))
                })
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeHandle;

    fn registry() -> Arc<TypeRegistry> {
        let registry = Arc::new(TypeRegistry::new());
        registry.register_array::<String>();
        registry
    }

    #[test]
    fn elements_read_and_write_in_place() -> Result<()> {
        let registry = registry();
        let info = CallInfo::array_element(TypeHandle::of::<Vec<String>>());
        let get = ArrayGetEmitter::new(info.clone(), Arc::clone(&registry))
            .emit()?
            .array_get()?;
        let set = ArraySetEmitter::new(info.for_write(), registry)
            .emit()?
            .array_set()?;

        let names = Value::object(vec!["a".to_string(), "b".to_string()]);
        set(&names, 1, Value::from("z"))?;
        assert_eq!(get(&names, 1)?.get::<String>().as_deref(), Some("z"));
        assert!(matches!(
            get(&names, 2),
            Err(ReflectError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            set(&names, 0, Value::from(1_i32)),
            Err(ReflectError::ValueMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn unregistered_element_types_are_reported() {
        let info = CallInfo::array_element(TypeHandle::of::<Vec<u8>>());
        let err = ArrayGetEmitter::new(info, registry()).emit().unwrap_err();
        assert_eq!(err.to_string(), "`Vec<u8>` is not a registered array type");
    }
}
