use crate::config::ConfigService;
use crate::di::HasContainer;
use crate::endpoint::descriptor::InvokerSignature;
use crate::endpoint::invoker::{InstanceMethod, IntoMethodRouter, SynthesizedInvoker};
use crate::endpoint::registry::InvokerRegistry;
use crate::endpoint::selector::MethodSelector;
use crate::endpoint::verb::{self, IntoVerb, Verb};
use crate::error::{FemurError, Result};
use axum::Router;
use axum::routing::MethodRouter;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct RegistrarOptions {
    /// Reject unsupported verbs instead of dropping them.
    pub strict_verbs: bool,
}

impl RegistrarOptions {
    /// Read `FEMUR_STRICT_VERBS` (default: off).
    pub fn from_config(config: &ConfigService) -> Self {
        Self {
            strict_verbs: config.get_bool("FEMUR_STRICT_VERBS").unwrap_or(false),
        }
    }
}

/// One endpoint handed to the router.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub id: Uuid,
    pub pattern: String,
    pub verbs: Vec<Verb>,
    pub invoker: Arc<InvokerSignature>,
}

/// Returned by [`EndpointRouteBuilder::map`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationHandle {
    id: Uuid,
    pattern: String,
    verbs: Vec<Verb>,
    invoker: String,
}

impl RegistrationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The verbs actually registered, after unsupported ones were dropped.
    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn invoker_name(&self) -> &str {
        &self.invoker
    }
}

/// Maps instance methods of container-managed components onto an axum router.
///
/// ```ignore
/// let registry = Arc::new(InvokerRegistry::new());
/// let mut endpoints = EndpointRouteBuilder::<AppState>::new(registry);
/// endpoints.map("/instance", [Method::GET], select!(MyEndpoint::handle_async))?;
/// let app = endpoints.into_router().with_state(state);
/// ```
pub struct EndpointRouteBuilder<S> {
    router: Router<S>,
    registry: Arc<InvokerRegistry>,
    options: RegistrarOptions,
    registrations: Vec<Registration>,
}

impl<S> EndpointRouteBuilder<S>
where
    S: HasContainer + Clone + Send + Sync + 'static,
{
    pub fn new(registry: Arc<InvokerRegistry>) -> Self {
        Self::with_router(Router::new(), registry)
    }

    /// Add endpoints to an existing router.
    pub fn with_router(router: Router<S>, registry: Arc<InvokerRegistry>) -> Self {
        Self {
            router,
            registry,
            options: RegistrarOptions::default(),
            registrations: Vec::new(),
        }
    }

    pub fn options(mut self, options: RegistrarOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Arc<InvokerRegistry> {
        &self.registry
    }

    /// Route `pattern` for `verbs` to the method named by `selector`.
    ///
    /// The method runs on an instance resolved from the container for each
    /// request. Nothing is added to the router if any step fails. When every
    /// verb was dropped the route is still registered and answers `405` to
    /// every request.
    ///
    /// Conflicts are only detected against routes mapped through this
    /// builder; axum still panics on a clash with a route of the router
    /// passed to [`EndpointRouteBuilder::with_router`].
    ///
    /// # Errors
    /// - [`FemurError::InvalidSelector`] if the selector is not a top-level
    ///   instance method, or the pattern is malformed or clashes with an
    ///   earlier registration
    /// - [`FemurError::UnsupportedVerb`] / [`FemurError::EmptyVerbSet`] in
    ///   strict mode
    /// - any synthesis error from [`InvokerRegistry::create_invoker`]
    pub fn map<T, F, Args, M, I, V>(
        &mut self,
        pattern: &str,
        verbs: I,
        selector: MethodSelector<T, F, Args>,
    ) -> Result<RegistrationHandle>
    where
        T: Send + Sync + 'static,
        F: InstanceMethod<T, Args>,
        Args: 'static,
        SynthesizedInvoker<T, F, Args>: IntoMethodRouter<S, M>,
        I: IntoIterator<Item = V>,
        V: IntoVerb,
    {
        selector.validate()?;
        let verbs = verb::resolve_verbs(pattern, verbs, self.options.strict_verbs)?;
        self.check_route(pattern, &verbs).map_err(|reason| {
            FemurError::invalid_selector(selector.descriptor().qualified_name(), reason)
        })?;

        let invoker = self.registry.create_invoker(selector)?;
        let signature = Arc::clone(invoker.signature());
        let method_router = match verb::method_filter(&verbs) {
            Some(filter) => invoker.into_method_router(filter),
            None => MethodRouter::new(),
        };

        let router = std::mem::take(&mut self.router);
        self.router = router.route(pattern, method_router);

        let registration = Registration {
            id: Uuid::new_v4(),
            pattern: pattern.to_string(),
            verbs,
            invoker: signature,
        };
        tracing::info!(
            pattern,
            verbs = ?registration.verbs,
            invoker = %registration.invoker.name,
            "mapped endpoint"
        );
        let handle = RegistrationHandle {
            id: registration.id,
            pattern: registration.pattern.clone(),
            verbs: registration.verbs.clone(),
            invoker: registration.invoker.name.clone(),
        };
        self.registrations.push(registration);
        Ok(handle)
    }

    /// Reject what `Router::route` would panic on.
    fn check_route(&self, pattern: &str, verbs: &[Verb]) -> std::result::Result<(), String> {
        if !pattern.starts_with('/') {
            return Err(format!("route pattern `{}` must start with `/`", pattern));
        }
        if let Some(segment) = pattern
            .split('/')
            .find(|segment| segment.starts_with(':') || segment.starts_with('*'))
        {
            return Err(format!(
                "segment `{}` of `{}` uses the old capture syntax; write `{{name}}` or `{{*name}}`",
                segment, pattern
            ));
        }

        let shape = route_shape(pattern);
        for registration in &self.registrations {
            if registration.pattern == pattern {
                if let Some(verb) = verbs.iter().find(|&&verb| registration.verbs.contains(&verb)) {
                    return Err(format!(
                        "`{} {}` is already mapped to `{}`",
                        verb, pattern, registration.invoker.name
                    ));
                }
            } else if route_shape(&registration.pattern) == shape {
                return Err(format!(
                    "`{}` conflicts with `{}`, which captures the same segments under other names",
                    pattern, registration.pattern
                ));
            }
        }
        Ok(())
    }

    pub fn map_get<T, F, Args, M>(
        &mut self,
        pattern: &str,
        selector: MethodSelector<T, F, Args>,
    ) -> Result<RegistrationHandle>
    where
        T: Send + Sync + 'static,
        F: InstanceMethod<T, Args>,
        Args: 'static,
        SynthesizedInvoker<T, F, Args>: IntoMethodRouter<S, M>,
    {
        self.map(pattern, [Verb::Get], selector)
    }

    pub fn map_post<T, F, Args, M>(
        &mut self,
        pattern: &str,
        selector: MethodSelector<T, F, Args>,
    ) -> Result<RegistrationHandle>
    where
        T: Send + Sync + 'static,
        F: InstanceMethod<T, Args>,
        Args: 'static,
        SynthesizedInvoker<T, F, Args>: IntoMethodRouter<S, M>,
    {
        self.map(pattern, [Verb::Post], selector)
    }

    pub fn map_put<T, F, Args, M>(
        &mut self,
        pattern: &str,
        selector: MethodSelector<T, F, Args>,
    ) -> Result<RegistrationHandle>
    where
        T: Send + Sync + 'static,
        F: InstanceMethod<T, Args>,
        Args: 'static,
        SynthesizedInvoker<T, F, Args>: IntoMethodRouter<S, M>,
    {
        self.map(pattern, [Verb::Put], selector)
    }

    pub fn map_patch<T, F, Args, M>(
        &mut self,
        pattern: &str,
        selector: MethodSelector<T, F, Args>,
    ) -> Result<RegistrationHandle>
    where
        T: Send + Sync + 'static,
        F: InstanceMethod<T, Args>,
        Args: 'static,
        SynthesizedInvoker<T, F, Args>: IntoMethodRouter<S, M>,
    {
        self.map(pattern, [Verb::Patch], selector)
    }

    pub fn map_delete<T, F, Args, M>(
        &mut self,
        pattern: &str,
        selector: MethodSelector<T, F, Args>,
    ) -> Result<RegistrationHandle>
    where
        T: Send + Sync + 'static,
        F: InstanceMethod<T, Args>,
        Args: 'static,
        SynthesizedInvoker<T, F, Args>: IntoMethodRouter<S, M>,
    {
        self.map(pattern, [Verb::Delete], selector)
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn registration(&self, handle: &RegistrationHandle) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.id == handle.id)
    }

    /// Every registration as JSON, for diagnostics endpoints and logs.
    pub fn describe(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.registrations)
            .map_err(|e| FemurError::Internal(format!("failed to describe endpoints: {}", e)))
    }

    pub fn into_router(self) -> Router<S> {
        self.router
    }
}

/// `pattern` with every capture name erased: `/users/{id}` -> `/users/{}`.
fn route_shape(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| {
            if segment.starts_with("{*") && segment.ends_with('}') {
                "{*}"
            } else if segment.starts_with('{') && segment.ends_with('}') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
