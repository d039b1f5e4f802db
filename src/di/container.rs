use crate::di::Injectable;
use crate::error::{FemurError, Result};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

type AnyArc = Arc<dyn Any + Send + Sync>;

/// Casts the stored implementation into an `Arc<Arc<dyn Trait>>` hidden behind `dyn Any`.
type CasterFn = Arc<dyn Fn(AnyArc) -> Option<AnyArc> + Send + Sync>;

/// Builds a fresh instance every time the service is resolved.
type FactoryFn = Arc<dyn Fn(&Container) -> Result<AnyArc> + Send + Sync>;

/// Thread-safe dependency injection container.
///
/// Services are either singletons (registered as a ready instance) or
/// transient (registered as a factory and rebuilt on every [`resolve`]).
/// Endpoint components are usually transient so that every request gets its
/// own instance.
///
/// [`resolve`]: Container::resolve
pub struct Container {
    services: DashMap<TypeId, ServiceEntry>,
    trait_mappings: DashMap<TypeId, TypeId>,
    casters: DashMap<TypeId, CasterFn>,
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            trait_mappings: self.trait_mappings.clone(),
            casters: self.casters.clone(),
        }
    }
}

#[derive(Clone)]
enum ServiceEntry {
    Singleton(AnyArc),
    Transient(FactoryFn),
}

impl Container {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            trait_mappings: DashMap::new(),
            casters: DashMap::new(),
        }
    }

    pub fn register<T: 'static + Send + Sync>(&mut self, instance: T) -> &mut Self {
        self.services
            .insert(TypeId::of::<T>(), ServiceEntry::Singleton(Arc::new(instance)));
        self
    }

    /// Register a transient service built by `factory` on every resolution.
    pub fn register_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn =
            Arc::new(move |container: &Container| Ok(Arc::new(factory(container)?) as AnyArc));
        self.services
            .insert(TypeId::of::<T>(), ServiceEntry::Transient(factory));
        self
    }

    /// Register `T` as transient, building it through [`Injectable::inject`].
    pub fn register_injectable<T: Injectable>(&mut self) -> &mut Self {
        self.register_factory(T::inject)
    }

    pub fn register_trait<Trait, Impl, F>(&mut self, caster_fn: F) -> &mut Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        let trait_id = TypeId::of::<Trait>();
        self.trait_mappings.insert(trait_id, TypeId::of::<Impl>());

        let caster: CasterFn = Arc::new(move |instance: AnyArc| {
            let concrete = instance.downcast::<Impl>().ok()?;
            let trait_obj: Arc<Trait> = caster_fn(concrete);
            Some(Arc::new(trait_obj) as AnyArc)
        });
        self.casters.insert(trait_id, caster);
        self
    }

    pub fn resolve<T: 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        self.instantiate(TypeId::of::<T>(), std::any::type_name::<T>())?
            .downcast::<T>()
            .map_err(|_| FemurError::DowncastFailed {
                type_name: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn resolve_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Result<Arc<T>> {
        let trait_name = std::any::type_name::<T>();
        let requested_type_id = TypeId::of::<T>();

        let caster = self
            .casters
            .get(&requested_type_id)
            .map(|caster| Arc::clone(caster.value()))
            .ok_or_else(|| FemurError::DependencyNotFound {
                type_name: trait_name.to_string(),
            })?;
        let impl_type_id = self
            .trait_mappings
            .get(&requested_type_id)
            .map(|id| *id.value())
            .ok_or_else(|| FemurError::DependencyNotFound {
                type_name: format!("No implementation mapping found for trait '{}'", trait_name),
            })?;

        let instance = self.instantiate(impl_type_id, trait_name)?;
        let wrapper = caster(instance)
            .and_then(|cast| cast.downcast::<Arc<T>>().ok())
            .ok_or_else(|| FemurError::DowncastFailed {
                type_name: trait_name.to_string(),
            })?;
        Ok(wrapper.as_ref().clone())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.services.contains_key(&type_id) || self.trait_mappings.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    fn instantiate(&self, type_id: TypeId, type_name: &str) -> Result<AnyArc> {
        // Factories may resolve their own dependencies, so the shard guard
        // must be released before one runs.
        let entry = self
            .services
            .get(&type_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FemurError::DependencyNotFound {
                type_name: type_name.to_string(),
            })?;
        match entry {
            ServiceEntry::Singleton(instance) => Ok(instance),
            ServiceEntry::Transient(factory) => factory(self),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestService {
        value: i32,
    }

    trait MyTrait: Send + Sync {
        fn get_value(&self) -> i32;
    }

    struct MyTraitImpl {
        value: i32,
    }

    impl MyTrait for MyTraitImpl {
        fn get_value(&self) -> i32 {
            self.value
        }
    }

    struct Counter(AtomicUsize);

    struct PerRequest {
        serial: usize,
    }

    impl Injectable for PerRequest {
        fn inject(container: &Container) -> Result<Self> {
            let counter = container.resolve::<Counter>()?;
            Ok(Self {
                serial: counter.0.fetch_add(1, Ordering::SeqCst),
            })
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut container = Container::new();
        container.register(TestService { value: 42 });
        let service = container.resolve::<TestService>().unwrap();
        assert_eq!(service.value, 42);
    }

    #[test]
    fn test_register_and_resolve_trait() {
        let mut container = Container::new();
        container.register(MyTraitImpl { value: 99 });
        container.register_trait::<dyn MyTrait, MyTraitImpl, _>(|i| i as Arc<dyn MyTrait>);
        let trait_instance = container.resolve_trait::<dyn MyTrait>().unwrap();
        assert_eq!(trait_instance.get_value(), 99);
    }

    #[test]
    fn test_transient_builds_a_new_instance_per_resolve() {
        let mut container = Container::new();
        container.register(Counter(AtomicUsize::new(0)));
        container.register_injectable::<PerRequest>();

        let first = container.resolve::<PerRequest>().unwrap();
        let second = container.resolve::<PerRequest>().unwrap();
        assert_eq!(first.serial, 0);
        assert_eq!(second.serial, 1);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_transient_propagates_missing_dependency() {
        let mut container = Container::new();
        container.register_injectable::<PerRequest>();

        let err = container.resolve::<PerRequest>().err().unwrap();
        assert!(matches!(err, FemurError::DependencyNotFound { .. }));
    }

    #[test]
    fn test_resolve_unknown_service() {
        let container = Container::new();
        assert!(!container.contains::<TestService>());
        assert!(container.resolve::<TestService>().is_err());
    }
}
