use crate::config::ConfigService;
use crate::endpoint::annotation::{AnnotationCatalog, AnnotationTarget, BindingSource};
use crate::endpoint::descriptor::{InvokerParameter, InvokerSignature, MethodDescriptor, TypeName};
use crate::endpoint::invoker::{InstanceMethod, SynthesizedInvoker};
use crate::endpoint::selector::MethodSelector;
use crate::error::{FemurError, Result};
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The callable shape of an invoker: its parameter types and return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegateShape {
    pub name: String,
    pub parameter_types: Vec<String>,
    pub return_type: String,
}

impl DelegateShape {
    fn same_shape(&self, parameter_types: &[String], return_type: &str) -> bool {
        self.parameter_types == parameter_types && self.return_type == return_type
    }
}

struct CachedInvoker {
    descriptor: MethodDescriptor,
    invoker: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct RegistryState {
    signatures: Vec<Arc<InvokerSignature>>,
    by_name: HashMap<String, usize>,
    delegates: HashMap<String, Arc<DelegateShape>>,
    cache: HashMap<(TypeId, TypeId, TypeId), CachedInvoker>,
}

impl RegistryState {
    fn lookup(&self, name: &str) -> Option<&Arc<InvokerSignature>> {
        self.by_name.get(name).map(|&index| &self.signatures[index])
    }
}

/// Picks `base`, or `base_2`, `base_3`, ... whichever is free first.
fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Synthesizes invokers and keeps track of every name handed out.
///
/// Owned by application bootstrap and shared as `Arc<InvokerRegistry>`. All
/// bookkeeping sits behind one lock, so concurrent synthesis never hands the
/// same name out twice.
pub struct InvokerRegistry {
    catalog: AnnotationCatalog,
    cache_invokers: bool,
    state: Mutex<RegistryState>,
}

impl InvokerRegistry {
    pub fn new() -> Self {
        Self::with_catalog(AnnotationCatalog::default())
    }

    pub fn with_catalog(catalog: AnnotationCatalog) -> Self {
        Self {
            catalog,
            cache_invokers: true,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Read `FEMUR_CACHE_INVOKERS` (default: on).
    pub fn from_config(config: &ConfigService) -> Self {
        Self::new().cache_invokers(config.get_bool("FEMUR_CACHE_INVOKERS").unwrap_or(true))
    }

    /// When enabled, synthesizing the same stateless method twice returns the
    /// first invoker instead of a new, suffixed one.
    pub fn cache_invokers(mut self, enabled: bool) -> Self {
        self.cache_invokers = enabled;
        self
    }

    pub fn catalog(&self) -> &AnnotationCatalog {
        &self.catalog
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the static invoker for the method named by `selector`.
    ///
    /// # Errors
    /// - [`FemurError::InvalidDescriptor`] when the declaring type is missing,
    ///   is not `T`, or the parameter list does not match the method's arity
    /// - [`FemurError::MissingConstructor`] / [`FemurError::MalformedAnnotation`]
    ///   when an annotation cannot be re-attached
    ///
    /// Nothing is recorded unless synthesis succeeds.
    pub fn create_invoker<T, F, Args>(
        &self,
        selector: MethodSelector<T, F, Args>,
    ) -> Result<SynthesizedInvoker<T, F, Args>>
    where
        T: Send + Sync + 'static,
        F: InstanceMethod<T, Args>,
        Args: 'static,
    {
        let (descriptor, method) = selector.into_parts();
        let declaring_type = declaring_type_of::<T>(&descriptor)?;

        if descriptor.parameters.len() != F::ARITY {
            return Err(FemurError::invalid_descriptor(
                descriptor.qualified_name(),
                format!(
                    "describes {} parameters but the method takes {}",
                    descriptor.parameters.len(),
                    F::ARITY
                ),
            ));
        }

        let parameters = self.invoker_parameters(&declaring_type, &descriptor)?;
        let annotations = descriptor
            .annotations
            .iter()
            .map(|raw| self.catalog.construct(raw, AnnotationTarget::Method))
            .collect::<Result<Vec<_>>>()?;

        // Stateless method items are interchangeable, so one invoker serves
        // every registration of the same method.
        let cache_key = (TypeId::of::<T>(), TypeId::of::<F>(), TypeId::of::<Args>());
        let cacheable = self.cache_invokers && std::mem::size_of::<F>() == 0;

        let mut state = self.state();
        if cacheable {
            if let Some(cached) = state.cache.get(&cache_key) {
                if cached.descriptor == descriptor {
                    if let Some(invoker) =
                        cached.invoker.downcast_ref::<SynthesizedInvoker<T, F, Args>>()
                    {
                        tracing::debug!(invoker = invoker.name(), "reusing cached invoker");
                        return Ok(invoker.clone());
                    }
                }
            }
        }

        let base = format!("{}_{}_Invoker", declaring_type.name, descriptor.name);
        let name = unique_name(&base, |candidate| state.by_name.contains_key(candidate));
        let signature = InvokerSignature {
            name: name.clone(),
            declaring_type,
            method: descriptor.name.clone(),
            parameters,
            return_type: descriptor.return_type.clone(),
            annotations,
        };

        let signature = Arc::new(signature);
        let index = state.signatures.len();
        state.signatures.push(Arc::clone(&signature));
        state.by_name.insert(name, index);
        let delegate = delegate_shape_locked(&mut state, &signature);
        let invoker = SynthesizedInvoker::new(signature, delegate, method);

        if cacheable {
            state.cache.insert(
                cache_key,
                CachedInvoker {
                    descriptor,
                    invoker: Box::new(invoker.clone()),
                },
            );
        }

        tracing::debug!(
            invoker = invoker.name(),
            parameters = invoker.signature().parameters.len(),
            delegate = %invoker.delegate().name,
            "synthesized invoker"
        );
        Ok(invoker)
    }

    /// Derive the callable shape of an invoker.
    ///
    /// Shapes are named `{Type}_{method}_Delegate`. Asking twice for an
    /// identical shape returns the first one; a different shape under a
    /// taken name gets a numeric suffix.
    pub fn create_delegate_type(&self, signature: &InvokerSignature) -> Result<Arc<DelegateShape>> {
        if signature.declaring_type.name.is_empty() {
            return Err(FemurError::invalid_descriptor(
                &signature.method,
                "declaring type cannot be empty",
            ));
        }
        let mut state = self.state();
        Ok(delegate_shape_locked(&mut state, signature))
    }

    pub fn signature(&self, name: &str) -> Option<Arc<InvokerSignature>> {
        self.state().lookup(name).cloned()
    }

    /// Every invoker signature, in creation order.
    pub fn signatures(&self) -> Vec<Arc<InvokerSignature>> {
        self.state().signatures.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state().by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.state().signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().signatures.is_empty()
    }

    fn invoker_parameters(
        &self,
        declaring_type: &TypeName,
        descriptor: &MethodDescriptor,
    ) -> Result<Vec<InvokerParameter>> {
        let mut parameters = Vec::with_capacity(descriptor.parameters.len() + 1);
        parameters.push(InvokerParameter {
            name: "instance".to_string(),
            type_name: declaring_type.name.clone(),
            annotations: vec![BindingSource::Services.annotation()],
        });
        for parameter in &descriptor.parameters {
            let annotations = parameter
                .annotations
                .iter()
                .map(|raw| self.catalog.construct(raw, AnnotationTarget::Parameter))
                .collect::<Result<Vec<_>>>()?;
            parameters.push(InvokerParameter {
                name: parameter.name.clone(),
                type_name: parameter.type_name.clone(),
                annotations,
            });
        }
        Ok(parameters)
    }
}

impl Default for InvokerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn declaring_type_of<T>(descriptor: &MethodDescriptor) -> Result<TypeName> {
    let declaring_type = match &descriptor.declaring_type {
        Some(ty) if !ty.name.is_empty() => ty.clone(),
        _ => {
            return Err(FemurError::invalid_descriptor(
                &descriptor.name,
                "declaring type cannot be empty",
            ));
        }
    };
    let target = std::any::type_name::<T>();
    if declaring_type.path != target {
        return Err(FemurError::invalid_descriptor(
            descriptor.qualified_name(),
            format!("declared by `{}`, not `{}`", declaring_type.path, target),
        ));
    }
    Ok(declaring_type)
}

fn delegate_shape_locked(
    state: &mut RegistryState,
    signature: &InvokerSignature,
) -> Arc<DelegateShape> {
    let parameter_types: Vec<String> = signature
        .parameters
        .iter()
        .map(|p| p.type_name.clone())
        .collect();
    let return_type = signature.return_type.call_type();
    let base = format!("{}_{}_Delegate", signature.declaring_type.name, signature.method);

    let mut candidate = base.clone();
    let mut suffix = 1;
    while let Some(existing) = state.delegates.get(&candidate) {
        if existing.same_shape(&parameter_types, &return_type) {
            return Arc::clone(existing);
        }
        suffix += 1;
        candidate = format!("{}_{}", base, suffix);
    }

    let shape = Arc::new(DelegateShape {
        name: candidate.clone(),
        parameter_types,
        return_type,
    });
    tracing::debug!(delegate = %shape.name, "derived delegate shape");
    state.delegates.insert(candidate, Arc::clone(&shape));
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::annotation::{AnnotationValue, RawAnnotation, Scalar, TypedArgument};
    use crate::endpoint::descriptor::{ParameterDescriptor, Receiver, ReturnDescriptor};
    use std::thread;

    struct Shop;

    impl Shop {
        fn price(&self, item: String, quantity: u32) -> String {
            format!("{} x{}", item, quantity)
        }
    }

    mod elsewhere {
        #[allow(dead_code)]
        pub struct Shop;
    }

    fn price_descriptor() -> MethodDescriptor {
        MethodDescriptor::new("price")
            .declared_by::<Shop>()
            .receiver(Receiver::Ref)
            .parameter(
                ParameterDescriptor::new("item", "String").annotated(
                    RawAnnotation::new("from_route").arg(TypedArgument::str("item").named("name")),
                ),
            )
            .parameter(
                ParameterDescriptor::new("quantity", "u32")
                    .annotated(RawAnnotation::new("from_query"))
                    .annotated(RawAnnotation::new("from_header").arg(TypedArgument::str("x-qty"))),
            )
            .returns(ReturnDescriptor::value("String"))
            .annotated(
                RawAnnotation::new("tags").arg(TypedArgument::list(
                    "[&str]",
                    vec![TypedArgument::str("shop"), TypedArgument::str("pricing")],
                )),
            )
    }

    fn price_selector() -> MethodSelector<
        Shop,
        impl InstanceMethod<Shop, (String, u32), Output = String>,
        (String, u32),
    > {
        price_selector_for(price_descriptor())
    }

    fn price_selector_for(
        descriptor: MethodDescriptor,
    ) -> MethodSelector<
        Shop,
        impl InstanceMethod<Shop, (String, u32), Output = String>,
        (String, u32),
    > {
        MethodSelector::new(descriptor, |this: Arc<Shop>, item: String, quantity: u32| {
            this.price(item, quantity)
        })
    }

    #[test]
    fn test_recorded_signature_is_the_one_handed_out() {
        let registry = InvokerRegistry::new();
        let invoker = registry.create_invoker(price_selector()).unwrap();
        let recorded = registry.signature("Shop_price_Invoker").unwrap();
        assert!(Arc::ptr_eq(&recorded, invoker.signature()));
        assert_eq!(registry.signatures().len(), 1);
    }

    #[test]
    fn test_signature_mirrors_parameters_and_annotations() {
        let registry = InvokerRegistry::new();
        let invoker = registry.create_invoker(price_selector()).unwrap();
        let signature = invoker.signature();

        assert_eq!(signature.name, "Shop_price_Invoker");
        assert_eq!(signature.parameters.len(), 3);

        let instance = signature.instance();
        assert_eq!(instance.name, "instance");
        assert_eq!(instance.type_name, "Shop");
        assert_eq!(instance.annotations, vec![BindingSource::Services.annotation()]);

        let forwarded = signature.forwarded();
        assert_eq!(forwarded[0].name, "item");
        assert_eq!(forwarded[0].annotations.len(), 1);
        assert_eq!(forwarded[0].annotations[0].binding_source(), Some(BindingSource::Route));
        assert_eq!(
            forwarded[0].annotations[0].arg("name"),
            Some(&AnnotationValue::Scalar(Scalar::Str("item".into())))
        );
        assert_eq!(forwarded[1].name, "quantity");
        let names: Vec<_> = forwarded[1].annotations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["from_query", "from_header"]);

        let tags = signature.annotation("tags").unwrap();
        assert_eq!(
            tags.args[0].value,
            AnnotationValue::Array(vec![Scalar::Str("shop".into()), Scalar::Str("pricing".into())])
        );

        assert_eq!(invoker.invoke(Arc::new(Shop), ("apple".into(), 3)), "apple x3");
    }

    #[test]
    fn test_missing_declaring_type_is_rejected() {
        let registry = InvokerRegistry::new();
        let mut descriptor = price_descriptor();
        descriptor.declaring_type = None;

        let err = registry
            .create_invoker(price_selector_for(descriptor))
            .unwrap_err();
        assert!(matches!(err, FemurError::InvalidDescriptor { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_foreign_declaring_type_is_rejected() {
        let registry = InvokerRegistry::new();
        let descriptor = price_descriptor().declared_by::<elsewhere::Shop>();

        let err = registry
            .create_invoker(price_selector_for(descriptor))
            .unwrap_err();
        assert!(matches!(err, FemurError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        let registry = InvokerRegistry::new();
        let err = registry
            .create_invoker(MethodSelector::new(
                price_descriptor(),
                |this: Arc<Shop>, item: String| this.price(item, 1),
            ))
            .unwrap_err();
        assert!(matches!(err, FemurError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_unknown_annotation_aborts_without_recording() {
        let registry = InvokerRegistry::new();
        let descriptor = price_descriptor().annotated(RawAnnotation::new("cache_for"));

        let err = registry
            .create_invoker(price_selector_for(descriptor))
            .unwrap_err();
        assert!(matches!(err, FemurError::MissingConstructor { .. }));
        assert!(registry.is_empty());
        assert!(!registry.contains("Shop_price_Invoker"));
    }

    #[test]
    fn test_colliding_names_get_suffixes() {
        let registry = InvokerRegistry::new();
        let first = registry.create_invoker(price_selector()).unwrap();
        // Same short type name and method name, different method.
        let second = registry
            .create_invoker(MethodSelector::new(
                price_descriptor(),
                |_: Arc<Shop>, item: String, quantity: u32| format!("{} at {}", item, quantity),
            ))
            .unwrap();
        let third = registry
            .create_invoker(MethodSelector::new(
                price_descriptor(),
                |_: Arc<Shop>, item: String, _: u32| item,
            ))
            .unwrap();

        assert_eq!(first.name(), "Shop_price_Invoker");
        assert_eq!(second.name(), "Shop_price_Invoker_2");
        assert_eq!(third.name(), "Shop_price_Invoker_3");
        assert_eq!(registry.len(), 3);

        assert_eq!(first.invoke(Arc::new(Shop), ("pear".into(), 2)), "pear x2");
        assert_eq!(second.invoke(Arc::new(Shop), ("pear".into(), 2)), "pear at 2");
        assert_eq!(third.invoke(Arc::new(Shop), ("pear".into(), 2)), "pear");
    }

    #[test]
    fn test_resynthesis_reuses_stateless_invoker() {
        fn price(this: Arc<Shop>, item: String, quantity: u32) -> String {
            this.price(item, quantity)
        }

        let registry = InvokerRegistry::new();
        let first = registry
            .create_invoker(MethodSelector::new(price_descriptor(), price))
            .unwrap();
        let again = registry
            .create_invoker(MethodSelector::new(price_descriptor(), price))
            .unwrap();

        assert_eq!(first.name(), again.name());
        assert!(Arc::ptr_eq(first.signature(), again.signature()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resynthesis_without_cache_keeps_the_first_invoker() {
        fn price(this: Arc<Shop>, item: String, quantity: u32) -> String {
            this.price(item, quantity)
        }

        let registry = InvokerRegistry::new().cache_invokers(false);
        let first = registry
            .create_invoker(MethodSelector::new(price_descriptor(), price))
            .unwrap();
        let again = registry
            .create_invoker(MethodSelector::new(price_descriptor(), price))
            .unwrap();

        assert_eq!(first.name(), "Shop_price_Invoker");
        assert_eq!(again.name(), "Shop_price_Invoker_2");
        assert_eq!(
            registry.signature("Shop_price_Invoker").unwrap().name,
            "Shop_price_Invoker"
        );
        // Both invokers describe the same shape.
        assert!(Arc::ptr_eq(first.delegate(), again.delegate()));
        assert_eq!(first.invoke(Arc::new(Shop), ("fig".into(), 1)), "fig x1");
    }

    #[test]
    fn test_capturing_closures_are_never_cached() {
        let registry = InvokerRegistry::new();
        let suffix = String::from("!");
        let make = |suffix: String| {
            move |_: Arc<Shop>, item: String, _: u32| format!("{}{}", item, suffix)
        };

        let first = registry
            .create_invoker(MethodSelector::new(price_descriptor(), make(suffix.clone())))
            .unwrap();
        let second = registry
            .create_invoker(MethodSelector::new(price_descriptor(), make("?".into())))
            .unwrap();

        assert_ne!(first.name(), second.name());
        assert_eq!(first.invoke(Arc::new(Shop), ("kiwi".into(), 0)), "kiwi!");
        assert_eq!(second.invoke(Arc::new(Shop), ("kiwi".into(), 0)), "kiwi?");
    }

    #[test]
    fn test_delegate_type_mirrors_signature() {
        let registry = InvokerRegistry::new();
        let invoker = registry.create_invoker(price_selector()).unwrap();

        let shape = registry.create_delegate_type(invoker.signature()).unwrap();
        assert_eq!(shape.name, "Shop_price_Delegate");
        assert_eq!(shape.parameter_types, ["Shop", "String", "u32"]);
        assert_eq!(shape.return_type, "String");
        assert!(Arc::ptr_eq(&shape, invoker.delegate()));
    }

    #[test]
    fn test_delegate_type_suffixes_different_shapes() {
        let registry = InvokerRegistry::new();
        let invoker = registry.create_invoker(price_selector()).unwrap();

        let mut other = (**invoker.signature()).clone();
        other.return_type = ReturnDescriptor::asynchronous("String");
        let shape = registry.create_delegate_type(&other).unwrap();
        assert_eq!(shape.name, "Shop_price_Delegate_2");
        assert_eq!(shape.return_type, "impl Future<Output = String>");

        let mut unnamed = other.clone();
        unnamed.declaring_type = TypeName::new("", "");
        assert!(registry.create_delegate_type(&unnamed).is_err());
    }

    #[test]
    fn test_concurrent_synthesis_hands_out_distinct_names() {
        let registry = Arc::new(InvokerRegistry::new().cache_invokers(false));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry
                        .create_invoker(price_selector())
                        .map(|invoker| invoker.name().to_string())
                })
            })
            .collect();

        let mut names: Vec<String> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
        assert_eq!(registry.len(), 8);
    }
}
