use proc_macro::TokenStream;

mod annotation;
mod endpoints;
mod injectable;
mod select;

/// Derive macro for making a struct injectable into the DI container
///
/// `Arc<T>` fields are resolved with `resolve`, `Arc<dyn Trait>` fields with
/// `resolve_trait`; fields marked `#[inject(default)]` use `Default::default()`.
///
/// # Example
/// ```ignore
/// use femur::DeriveInjectable as Injectable;
///
/// #[derive(Injectable)]
/// pub struct MyEndpoint {
///     greeter: Arc<dyn Greeter>,
///     #[inject(default)]
///     hits: AtomicUsize,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Attribute macro that makes the methods of an impl block selectable as
/// endpoints.
///
/// For every `&self` or `self: Arc<Self>` method it records a method
/// descriptor (parameters, return type and annotations) and generates the
/// static forwarding function used by `select!`. Annotation attributes are
/// recorded and then removed from the emitted code.
///
/// Parameter annotations: `from_query`, `from_route`, `from_header`,
/// `from_body`, `from_form`, `from_services`. Method annotations: `tags`,
/// `summary`, `description`, `endpoint_name`, `produces`, `accepts`,
/// `allow_anonymous`, `authorize`, `exclude_from_description`. Anything else
/// can be attached with `#[annotation(name, args...)]`.
///
/// # Example
/// ```ignore
/// #[endpoints]
/// impl MyEndpoint {
///     #[summary("Greets the caller")]
///     pub async fn handle_async(&self, #[from_query] filter: Query<Filter>) -> String {
///         // ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn endpoints(attr: TokenStream, item: TokenStream) -> TokenStream {
    endpoints::endpoints_attribute(attr, item)
}

/// Select an instance method of a type carrying `#[endpoints]`
///
/// # Example
/// ```ignore
/// builder.map("/instance", [Method::GET], select!(MyEndpoint::handle_async))?;
/// ```
#[proc_macro]
pub fn select(input: TokenStream) -> TokenStream {
    select::select_macro(input)
}
