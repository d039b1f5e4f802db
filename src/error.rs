use thiserror::Error;

pub type Result<T> = std::result::Result<T, FemurError>;

#[derive(Debug, Error)]
pub enum FemurError {
    #[error("Dependency not found: {type_name}")]
    DependencyNotFound { type_name: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Invalid method descriptor for `{method}`: {message}")]
    InvalidDescriptor { method: String, message: String },

    #[error("Invalid method selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("No annotation constructor `{annotation}` is registered for {target}")]
    MissingConstructor { annotation: String, target: String },

    #[error("Malformed annotation `{annotation}`: {message}")]
    MalformedAnnotation { annotation: String, message: String },

    /// Never returned by [`InvokerRegistry`](crate::InvokerRegistry): names are
    /// recorded and read back under a single lock.
    #[error("Invoker `{name}` could not be resolved after synthesis")]
    NullInvoker { name: String },

    #[error("Route `{pattern}` has no supported HTTP verbs")]
    EmptyVerbSet { pattern: String },

    #[error("Unsupported HTTP verb `{verb}` for route `{pattern}`")]
    UnsupportedVerb { pattern: String, verb: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FemurError {
    pub(crate) fn invalid_descriptor(
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidDescriptor {
            method: method.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_selector(
        selector: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }

    pub(crate) fn malformed(annotation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedAnnotation {
            annotation: annotation.into(),
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for FemurError {
    fn into_response(self) -> axum::response::Response {
        // Every variant is a server-side misconfiguration.
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            self.to_string(),
        )
            .into_response()
    }
}
