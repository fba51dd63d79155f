use std::sync::Arc;

use reflecta_cache::{CacheStrategy, LockStrategy};
use tracing::debug;

use super::delegate_cache::{DelegateCache, DelegateCacheStats};
use super::emit::emitter_for;
use super::thunk::{
    ArrayElementGetter, ArrayElementSetter, ConstructorInvoker, MemberCopier, MemberGetter,
    MemberSetter, MethodInvoker, StaticMemberGetter, StaticMemberSetter, StaticMethodInvoker,
};
use super::{CallInfo, Thunk};
use crate::config::ReflectConfig;
use crate::error::Result;
use crate::types::{TypeInfo, TypeRegistry};

/// Owns the type registry and the delegate cache shared by every thunk
/// request.
///
/// Requests made through the `delegate_for_*` methods are cached under the
/// configured default retention and fixed to the direction the signature
/// implies, so a getter and a setter for the same member never collide.
pub struct ReflectContext {
    registry: Arc<TypeRegistry>,
    cache: DelegateCache,
    config: ReflectConfig,
}

impl ReflectContext {
    pub fn new() -> Self {
        Self::with_config(ReflectConfig::default())
    }

    pub fn with_config(config: ReflectConfig) -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new()), config)
    }

    /// A context over an existing registry, for sharing registrations
    /// between contexts.
    pub fn with_registry(registry: Arc<TypeRegistry>, config: ReflectConfig) -> Self {
        debug!(
            lock_strategy = config.lock_strategy.as_str(),
            retention = ?config.default_retention,
            temporary_capacity = config.temporary_capacity,
            "reflection context created"
        );
        Self {
            cache: DelegateCache::from_config(&config),
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn register(&self, info: TypeInfo) -> Arc<TypeInfo> {
        self.registry.register(info)
    }

    pub fn config(&self) -> &ReflectConfig {
        &self.config
    }

    pub fn cache(&self) -> &DelegateCache {
        &self.cache
    }

    /// Cached thunk for `info`, synthesized by the matching emitter on a miss.
    pub fn delegate(&self, info: &CallInfo, retention: CacheStrategy) -> Result<Arc<Thunk>> {
        self.cache.get_or_create(info, retention, || {
            emitter_for(info, &self.registry).emit()
        })
    }

    fn delegate_default(&self, info: &CallInfo) -> Result<Arc<Thunk>> {
        self.delegate(info, self.config.default_retention)
    }

    pub fn delegate_for_getter(&self, info: &CallInfo) -> Result<MemberGetter> {
        self.delegate_default(&info.for_read())?.getter()
    }

    pub fn delegate_for_static_getter(&self, info: &CallInfo) -> Result<StaticMemberGetter> {
        self.delegate_default(&info.for_read())?.static_getter()
    }

    pub fn delegate_for_setter(&self, info: &CallInfo) -> Result<MemberSetter> {
        self.delegate_default(&info.for_write())?.setter()
    }

    pub fn delegate_for_static_setter(&self, info: &CallInfo) -> Result<StaticMemberSetter> {
        self.delegate_default(&info.for_write())?.static_setter()
    }

    pub fn delegate_for_method(&self, info: &CallInfo) -> Result<MethodInvoker> {
        self.delegate_default(info)?.method()
    }

    pub fn delegate_for_static_method(&self, info: &CallInfo) -> Result<StaticMethodInvoker> {
        self.delegate_default(info)?.static_method()
    }

    pub fn delegate_for_constructor(&self, info: &CallInfo) -> Result<ConstructorInvoker> {
        self.delegate_default(info)?.constructor()
    }

    pub fn delegate_for_array_get(&self, info: &CallInfo) -> Result<ArrayElementGetter> {
        self.delegate_default(&info.for_read())?.array_get()
    }

    pub fn delegate_for_array_set(&self, info: &CallInfo) -> Result<ArrayElementSetter> {
        self.delegate_default(&info.for_write())?.array_set()
    }

    pub fn delegate_for_copier(&self, info: &CallInfo) -> Result<MemberCopier> {
        self.delegate_default(&info.for_write())?.copier()
    }

    pub fn clear(&self) {
        self.cache.clear();
        debug!("delegate cache cleared");
    }

    pub fn count(&self) -> usize {
        self.cache.count()
    }

    pub fn reclaim(&self) -> usize {
        self.cache.reclaim()
    }

    pub fn stats(&self) -> DelegateCacheStats {
        self.cache.stats()
    }

    pub fn lock_strategy(&self) -> LockStrategy {
        self.cache.lock_strategy()
    }

    pub fn set_lock_strategy(&mut self, strategy: LockStrategy) {
        let previous = self.cache.lock_strategy();
        self.cache.set_lock_strategy(strategy);
        self.config.lock_strategy = strategy;
        debug!(
            from = previous.as_str(),
            to = strategy.as_str(),
            "delegate cache lock strategy switched"
        );
    }

    /// Swaps in a different cache and returns the old one. The config takes
    /// over the new cache's lock strategy and temporary capacity.
    pub fn replace_cache(&mut self, cache: DelegateCache) -> DelegateCache {
        debug!(entries = cache.count(), "delegate cache replaced");
        self.config.lock_strategy = cache.lock_strategy();
        self.config.temporary_capacity = cache.temporary_capacity();
        std::mem::replace(&mut self.cache, cache)
    }
}

impl Default for ReflectContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReflectContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectContext")
            .field("types", &self.registry.len())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReflectError;
    use crate::types::{TypeBuilder, TypeHandle, Value};

    #[derive(Debug, Default)]
    struct Lamp {
        lit: bool,
    }

    fn context() -> ReflectContext {
        let context = ReflectContext::new();
        context.register(
            TypeBuilder::<Lamp>::reference()
                .field("lit", |lamp| &lamp.lit, |lamp| &mut lamp.lit)
                .build(),
        );
        context
    }

    #[test]
    fn getter_and_setter_are_cached_separately() -> Result<()> {
        let context = context();
        let info = CallInfo::field(TypeHandle::of::<Lamp>(), "lit");
        let set = context.delegate_for_setter(&info)?;
        let get = context.delegate_for_getter(&info)?;
        let lamp = Value::object(Lamp::default());
        set(&lamp, Value::from(true))?;
        assert_eq!(get(&lamp)?.get::<bool>(), Some(true));
        assert_eq!(context.count(), 2);

        context.delegate_for_getter(&info)?;
        assert_eq!(context.stats().hits, 1);
        Ok(())
    }

    #[test]
    fn static_requests_for_instance_members_are_rejected() -> Result<()> {
        let context = context();
        let lamp = TypeHandle::of::<Lamp>();
        assert!(matches!(
            context.delegate_for_static_getter(&CallInfo::static_field(lamp, "lit")),
            Err(ReflectError::MissingField { .. })
        ));
        assert_eq!(context.count(), 0);

        let info = CallInfo::field(lamp, "lit");
        assert!(matches!(
            context.delegate_for_static_getter(&info),
            Err(ReflectError::SignatureMismatch { expected: "static member getter", .. })
        ));
        context.delegate_for_getter(&info)?;
        assert_eq!(context.count(), 1);
        Ok(())
    }

    #[test]
    fn replacing_the_cache_hands_back_the_old_one() -> Result<()> {
        let mut context = context();
        let info = CallInfo::field(TypeHandle::of::<Lamp>(), "lit");
        context.delegate_for_getter(&info)?;
        let old = context.replace_cache(DelegateCache::new(LockStrategy::Monitor, 8));
        assert_eq!(old.count(), 1);
        assert_eq!(context.count(), 0);
        assert_eq!(context.config().lock_strategy, LockStrategy::Monitor);
        assert_eq!(context.config().temporary_capacity, 8);

        context.set_lock_strategy(LockStrategy::ReaderWriter);
        assert_eq!(context.config().lock_strategy, LockStrategy::ReaderWriter);
        Ok(())
    }
}
