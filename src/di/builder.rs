use crate::di::{Container, Injectable};
use crate::error::Result;
use std::sync::Arc;

/// Builder for constructing a dependency injection container
///
/// # Example
/// ```
/// use femur::ContainerBuilder;
///
/// struct Greeting(&'static str);
///
/// let container = ContainerBuilder::new()
///     .register(Greeting("hello"))
///     .build();
/// assert!(container.contains::<Greeting>());
/// ```
pub struct ContainerBuilder {
    container: Container,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            container: Container::new(),
        }
    }

    /// Register a singleton instance
    pub fn register<T: 'static + Send + Sync>(mut self, instance: T) -> Self {
        self.container.register(instance);
        self
    }

    /// Register a transient service built by `factory` on every resolution
    pub fn factory<T, F>(mut self, factory: F) -> Self
    where
        T: 'static + Send + Sync,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        self.container.register_factory(factory);
        self
    }

    /// Register an [`Injectable`] type as transient
    ///
    /// This is how endpoint components are usually registered: each request
    /// resolves a fresh instance with its dependencies injected.
    pub fn injectable<T: Injectable>(mut self) -> Self {
        self.container.register_injectable::<T>();
        self
    }

    /// Bind a trait to a concrete implementation
    ///
    /// This enables resolving `Arc<dyn Trait>` to the registered implementation.
    pub fn bind<Trait, Impl, F>(mut self, caster: F) -> Self
    where
        Trait: ?Sized + 'static + Send + Sync,
        Impl: 'static + Send + Sync,
        F: Fn(Arc<Impl>) -> Arc<Trait> + 'static + Send + Sync,
    {
        self.container.register_trait::<Trait, Impl, F>(caster);
        self
    }

    pub fn build(self) -> Container {
        self.container
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
