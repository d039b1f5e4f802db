//! # Femur
//!
//! Register instance methods of per-request components as axum route handlers.
//!
//! axum binds handler arguments by looking at free-standing functions only.
//! Femur synthesizes, once at start-up, a static invoker for a selected
//! instance method: its first argument resolves the component from the DI
//! container for every request, the remaining arguments mirror the method's
//! own parameters (annotations included), and its result is whatever the
//! method returns.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use femur::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Filter {
//!     f: Option<String>,
//! }
//!
//! #[derive(Injectable)]
//! struct MyEndpoint;
//!
//! #[endpoints]
//! impl MyEndpoint {
//!     #[summary("Greets the caller")]
//!     async fn handle_async(&self, #[from_query] filter: Query<Filter>) -> String {
//!         format!("Hello there tomatos and {}", filter.f.as_deref().unwrap_or("{{empty}}"))
//!     }
//! }
//!
//! #[derive(Clone)]
//! struct AppState {
//!     container: Arc<Container>,
//! }
//!
//! impl HasContainer for AppState {
//!     fn get_container(&self) -> &Container {
//!         &self.container
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> femur::Result<()> {
//!     let container = ContainerBuilder::new().injectable::<MyEndpoint>().build();
//!     let state = AppState {
//!         container: Arc::new(container),
//!     };
//!
//!     let mut endpoints = EndpointRouteBuilder::new(Arc::new(InvokerRegistry::new()));
//!     endpoints.map("/instance", [Method::GET], select!(MyEndpoint::handle_async))?;
//!     let app: Router = endpoints.into_router().with_state(state);
//!
//!     // Serve your app...
//!     Ok(())
//! }
//! ```

extern crate self as femur;

pub mod config;
pub mod di;
pub mod endpoint;
pub mod error;

// Re-export core types
pub use config::ConfigService;
pub use di::{Container, ContainerBuilder, HasContainer, Inject, Injectable};
pub use endpoint::{
    EndpointRouteBuilder, InvokerRegistry, InvokerSignature, MethodDescriptor, MethodSelector,
    RegistrarOptions, Registration, RegistrationHandle, SynthesizedInvoker, Verb,
};
pub use error::{FemurError, Result};

// Re-export macros
pub use femur_macro::{Injectable as DeriveInjectable, endpoints, select};

// Re-export commonly used types from dependencies
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use femur::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ConfigService;
    pub use crate::di::{Container, ContainerBuilder, HasContainer, Inject, Injectable};
    pub use crate::endpoint::{
        EndpointRouteBuilder, InvokerRegistry, MethodSelector, RegistrarOptions,
        RegistrationHandle, Verb,
    };
    pub use crate::error::{FemurError, Result};
    pub use crate::{DeriveInjectable as Injectable, endpoints, select};
    pub use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::{Method, StatusCode},
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
