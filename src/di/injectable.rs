use crate::di::Container;
use crate::error::Result;

/// Trait for types that can be built from the DI container
///
/// Usually derived with `#[derive(Injectable)]`. Endpoint components are
/// registered through [`Container::register_injectable`] so that each
/// request gets a fresh instance.
///
/// # Example
/// ```ignore
/// #[derive(Injectable)]
/// pub struct MyEndpoint {
///     // Resolved from the container
///     greeter: Arc<Greeter>,
///     // Built with `Default::default()`
///     #[inject(default)]
///     hits: AtomicUsize,
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies from the container
    ///
    /// # Errors
    /// Returns an error if any required dependency is not found in the container.
    fn inject(container: &Container) -> Result<Self>;
}
