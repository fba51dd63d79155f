use std::sync::Arc;

use tracing::trace;

use super::target::{TargetLoader, prepare_arguments, write_back};
use super::{Emitter, check_static};
use crate::error::Result;
use crate::runtime::{CallInfo, Thunk, lookup};
use crate::types::{TypeRegistry, Value};

/// Emits an invoker for an instance or static method.
///
/// The thunk checks the argument count, converts every argument into a
/// local of its declared type, calls the body with the locals, copies by-ref
/// locals back into the caller's slots and returns the boxed result, or
/// [`Value::Null`] for a method without a return type.
pub struct MethodInvocationEmitter {
    info: CallInfo,
    registry: Arc<TypeRegistry>,
}

impl MethodInvocationEmitter {
    pub fn new(info: CallInfo, registry: Arc<TypeRegistry>) -> Self {
        Self { info, registry }
    }
}

impl Emitter for MethodInvocationEmitter {
    fn call_info(&self) -> &CallInfo {
        &self.info
    }

    fn emit(&self) -> Result<Thunk> {
        let resolved = lookup::method(&self.registry, &self.info)?;
        let method = resolved.owner.methods[resolved.member.index].clone();
        check_static(&self.info, method.is_static)?;
        trace!(member = %self.info, owner = %method.declaring_type, "emitting method invoker");

        let label = self.info.member_label();
        let params = Arc::clone(&method.params);
        let body = Arc::clone(&method.body);
        let returns_void = method.return_type.is_void();

        if method.is_static {
            return Ok(Thunk::StaticMethod(Arc::new(
                move |args: &mut [Value]| -> Result<Value> {
                    let mut locals = prepare_arguments(&label, &params, args)?;
                    let result = body(None, locals.as_mut_slice())?;
                    write_back(&params, locals, args);
                    Ok(if returns_void { Value::Null } else { result })
                },
            )));
        }

        let loader = TargetLoader::new(&self.registry, self.info.target_type(), label.clone());
        let path = resolved.path;
        Ok(Thunk::Method(Arc::new(
            move |target: &Value, args: &mut [Value]| -> Result<Value> {
                let mut locals = prepare_arguments(&label, &params, args)?;
                let result =
                    loader.write(target, &path, |instance| body(Some(instance), locals.as_mut_slice()))?;
                write_back(&params, locals, args);
                Ok(if returns_void { Value::Null } else { result })
            },
        )))
    }
}

/// Emits an invoker for a constructor of the descriptor's target type.
pub struct ConstructorInvocationEmitter {
    info: CallInfo,
    registry: Arc<TypeRegistry>,
}

impl ConstructorInvocationEmitter {
    pub fn new(info: CallInfo, registry: Arc<TypeRegistry>) -> Self {
        Self { info, registry }
    }
}

impl Emitter for ConstructorInvocationEmitter {
    fn call_info(&self) -> &CallInfo {
        &self.info
    }

    fn emit(&self) -> Result<Thunk> {
        let resolved = lookup::constructor(&self.registry, &self.info)?;
        let constructor = resolved.owner.constructors[resolved.member.index].clone();
        trace!(member = %self.info, "emitting constructor invoker");

        let label = self.info.member_label();
        let params = constructor.params;
        let body = constructor.body;
        Ok(Thunk::Constructor(Arc::new(
            move |args: &mut [Value]| -> Result<Value> {
                let mut locals = prepare_arguments(&label, &params, args)?;
                let instance = body(locals.as_mut_slice())?;
                write_back(&params, locals, args);
                Ok(instance)
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReflectError;
    use crate::types::{ParamInfo, TypeBuilder, TypeHandle, arg};

    #[derive(Debug, Default)]
    struct Stack {
        items: Vec<i32>,
    }

    fn registry() -> Arc<TypeRegistry> {
        let registry = Arc::new(TypeRegistry::new());
        registry.register(
            TypeBuilder::<Stack>::reference()
                .method(
                    "push",
                    [ParamInfo::of::<i32>("item")],
                    TypeHandle::void(),
                    |stack, args| {
                        stack.items.push(arg(args, 0)?);
                        Ok(Value::from(stack.items.len()))
                    },
                )
                .method(
                    "pop_into",
                    [ParamInfo::by_ref::<i32>("slot")],
                    TypeHandle::of::<bool>(),
                    |stack, args| match stack.items.pop() {
                        Some(item) => {
                            args[0] = Value::from(item);
                            Ok(Value::from(true))
                        }
                        None => Ok(Value::from(false)),
                    },
                )
                .static_method(
                    "swap",
                    [ParamInfo::by_ref::<i32>("a"), ParamInfo::by_ref::<i32>("b")],
                    TypeHandle::void(),
                    |args| {
                        args.swap(0, 1);
                        Ok(Value::Null)
                    },
                )
                .constructor([ParamInfo::of::<i32>("first")], |args| {
                    Ok(Stack {
                        items: vec![arg(args, 0)?],
                    })
                })
                .build(),
        );
        registry
    }

    fn stack_len(stack: &Value) -> Option<usize> {
        stack.as_object()?.with(|stack: &Stack| stack.items.len())
    }

    #[test]
    fn void_methods_return_null() -> Result<()> {
        let registry = registry();
        let stack = TypeHandle::of::<Stack>();
        let push = MethodInvocationEmitter::new(
            CallInfo::method(stack, "push", &[TypeHandle::of::<i32>()]),
            Arc::clone(&registry),
        )
        .emit()?
        .method()?;
        let target = Value::object(Stack::default());
        let result = push(&target, &mut [Value::from(4_i32)])?;
        assert!(result.is_null());
        assert_eq!(stack_len(&target), Some(1));
        Ok(())
    }

    #[test]
    fn by_ref_arguments_flow_back() -> Result<()> {
        let registry = registry();
        let stack = TypeHandle::of::<Stack>();
        let swap = MethodInvocationEmitter::new(
            CallInfo::static_method(stack, "swap", &[
                TypeHandle::of::<i32>().by_ref(),
                TypeHandle::of::<i32>().by_ref(),
            ]),
            Arc::clone(&registry),
        )
        .emit()?
        .static_method()?;
        let mut args = [Value::from(1_i32), Value::from(2_i32)];
        swap(&mut args)?;
        assert_eq!(args[0].get::<i32>(), Some(2));
        assert_eq!(args[1].get::<i32>(), Some(1));

        let pop = MethodInvocationEmitter::new(
            CallInfo::method(stack, "pop_into", &[TypeHandle::of::<i32>().by_ref()]),
            registry,
        )
        .emit()?
        .method()?;
        let target = Value::object(Stack { items: vec![9] });
        let mut slot = [Value::from(0_i32)];
        assert_eq!(pop(&target, &mut slot)?.get::<bool>(), Some(true));
        assert_eq!(slot[0].get::<i32>(), Some(9));
        Ok(())
    }

    #[test]
    fn argument_errors_are_reported() -> Result<()> {
        let registry = registry();
        let push = MethodInvocationEmitter::new(
            CallInfo::method(TypeHandle::of::<Stack>(), "push", &[TypeHandle::of::<i32>()]),
            registry,
        )
        .emit()?
        .method()?;
        let target = Value::object(Stack::default());
        assert!(matches!(
            push(&target, &mut []),
            Err(ReflectError::ArgumentCount { expected: 1, found: 0, .. })
        ));
        assert!(matches!(
            push(&target, &mut [Value::from(1_u8)]),
            Err(ReflectError::ValueMismatch { .. })
        ));
        assert!(matches!(
            push(&Value::Null, &mut [Value::from(1_i32)]),
            Err(ReflectError::NullTarget(_))
        ));
        Ok(())
    }

    #[test]
    fn constructors_build_instances() -> Result<()> {
        let registry = registry();
        let stack = TypeHandle::of::<Stack>();
        let create = ConstructorInvocationEmitter::new(
            CallInfo::constructor(stack, &[TypeHandle::of::<i32>()]),
            Arc::clone(&registry),
        )
        .emit()?
        .constructor()?;
        let built = create(&mut [Value::from(5_i32)])?;
        assert_eq!(built.type_handle(), Some(stack));
        assert_eq!(stack_len(&built), Some(1));

        let missing = ConstructorInvocationEmitter::new(CallInfo::constructor(stack, &[]), registry)
            .emit()
            .unwrap_err();
        assert_eq!(missing.to_string(), "no constructor `Stack()`");
        Ok(())
    }
}
