use crate::endpoint::descriptor::{MethodDescriptor, Receiver};
use crate::endpoint::invoker::InstanceMethod;
use crate::error::{FemurError, Result};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Names one instance method of `T` without binding an instance.
///
/// Produced by `select!(Type::method)` on types whose impl block carries
/// `#[endpoints]`. Pairs the method's [`MethodDescriptor`] with a function
/// that runs the method given an `Arc<T>`.
pub struct MethodSelector<T, F, Args> {
    descriptor: MethodDescriptor,
    method: F,
    _marker: PhantomData<fn(Arc<T>, Args)>,
}

impl<T, F, Args> MethodSelector<T, F, Args>
where
    F: InstanceMethod<T, Args>,
{
    pub fn new(descriptor: MethodDescriptor, method: F) -> Self {
        Self {
            descriptor,
            method,
            _marker: PhantomData,
        }
    }
}

impl<T, F, Args> MethodSelector<T, F, Args> {
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Check that the selector names exactly one top-level instance method.
    pub fn validate(&self) -> Result<()> {
        let descriptor = &self.descriptor;
        let selector = descriptor.qualified_name();

        if descriptor.name.trim().is_empty() {
            return Err(FemurError::invalid_selector(selector, "does not name a method"));
        }
        if descriptor.name.contains("::") || descriptor.name.contains('.') {
            return Err(FemurError::invalid_selector(
                selector,
                "must name a method declared directly on the type",
            ));
        }
        if descriptor.receiver == Receiver::None {
            return Err(FemurError::invalid_selector(
                selector,
                "names an associated function, not an instance method",
            ));
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (MethodDescriptor, F) {
        (self.descriptor, self.method)
    }
}

impl<T, F, Args> fmt::Debug for MethodSelector<T, F, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSelector")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    fn selector(
        descriptor: MethodDescriptor,
    ) -> MethodSelector<Clock, impl InstanceMethod<Clock, ()>, ()> {
        MethodSelector::new(descriptor, |_: Arc<Clock>| 12)
    }

    #[test]
    fn test_instance_method_is_valid() {
        let selector = selector(MethodDescriptor::new("now").declared_by::<Clock>());
        assert!(selector.validate().is_ok());
        assert_eq!(selector.descriptor().name, "now");
    }

    #[test]
    fn test_associated_function_is_rejected() {
        let selector = selector(
            MethodDescriptor::new("new")
                .declared_by::<Clock>()
                .receiver(Receiver::None),
        );
        assert!(matches!(
            selector.validate(),
            Err(FemurError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_nested_and_empty_names_are_rejected() {
        for name in ["", "  ", "inner::now", "field.now"] {
            let selector = selector(MethodDescriptor::new(name).declared_by::<Clock>());
            assert!(
                matches!(selector.validate(), Err(FemurError::InvalidSelector { .. })),
                "{:?} should be rejected",
                name
            );
        }
    }
}
