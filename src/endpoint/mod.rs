//! Instance-method endpoints.
//!
//! The flow is selector, then invoker, then route: `select!(Type::method)`
//! yields a [`MethodSelector`], [`InvokerRegistry::create_invoker`] turns it
//! into a [`SynthesizedInvoker`] plus its [`InvokerSignature`], and
//! [`EndpointRouteBuilder::map`] hands the invoker to axum.

pub mod annotation;
pub mod descriptor;
pub mod invoker;
pub mod registrar;
pub mod registry;
pub mod selector;
pub mod verb;

pub use annotation::{
    Annotation, AnnotationArg, AnnotationCatalog, AnnotationTarget, AnnotationValue,
    BindingSource, RawAnnotation, Scalar, TypedArgument, TypedValue,
};
pub use descriptor::{
    InvokerParameter, InvokerSignature, MethodDescriptor, ParameterDescriptor, Receiver,
    ReturnDescriptor, TypeName,
};
pub use invoker::{InstanceMethod, IntoMethodRouter, SynthesizedInvoker};
pub use registrar::{EndpointRouteBuilder, RegistrarOptions, Registration, RegistrationHandle};
pub use registry::{DelegateShape, InvokerRegistry};
pub use selector::MethodSelector;
pub use verb::{IntoVerb, Verb};
