use crate::error::{FemurError, Result};
use axum::http::Method;
use axum::routing::MethodFilter;
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// The HTTP verbs an endpoint can be registered for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Verb {
    Trace,
    Head,
    Options,
    Connect,
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Verb {
    pub fn from_method(method: &Method) -> Option<Self> {
        // Extension methods are never supported, so matching the canonical
        // upper-case text is enough.
        match method.as_str() {
            "TRACE" => Some(Verb::Trace),
            "HEAD" => Some(Verb::Head),
            "OPTIONS" => Some(Verb::Options),
            "CONNECT" => Some(Verb::Connect),
            "GET" => Some(Verb::Get),
            "POST" => Some(Verb::Post),
            "PATCH" => Some(Verb::Patch),
            "PUT" => Some(Verb::Put),
            "DELETE" => Some(Verb::Delete),
            _ => None,
        }
    }

    pub fn method_filter(self) -> MethodFilter {
        match self {
            Verb::Trace => MethodFilter::TRACE,
            Verb::Head => MethodFilter::HEAD,
            Verb::Options => MethodFilter::OPTIONS,
            Verb::Connect => MethodFilter::CONNECT,
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Patch => MethodFilter::PATCH,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

/// Anything that names an HTTP verb: [`Verb`], [`Method`], or its text.
///
/// Conversion fails with the rejected token when the verb is not supported.
pub trait IntoVerb {
    fn into_verb(self) -> std::result::Result<Verb, String>;
}

impl IntoVerb for Verb {
    fn into_verb(self) -> std::result::Result<Verb, String> {
        Ok(self)
    }
}

impl IntoVerb for &Method {
    fn into_verb(self) -> std::result::Result<Verb, String> {
        Verb::from_method(self).ok_or_else(|| self.as_str().to_string())
    }
}

impl IntoVerb for Method {
    fn into_verb(self) -> std::result::Result<Verb, String> {
        (&self).into_verb()
    }
}

impl IntoVerb for &str {
    fn into_verb(self) -> std::result::Result<Verb, String> {
        self.trim().parse().map_err(|_| self.to_string())
    }
}

impl IntoVerb for String {
    fn into_verb(self) -> std::result::Result<Verb, String> {
        self.as_str().into_verb()
    }
}

impl IntoVerb for &String {
    fn into_verb(self) -> std::result::Result<Verb, String> {
        self.as_str().into_verb()
    }
}

/// Convert `verbs` into the effective verb list for `pattern`.
///
/// Unsupported verbs are dropped unless `strict` is set; duplicates collapse
/// and the order of first appearance is kept. The result may be empty in
/// lenient mode. In strict mode an empty result is [`FemurError::EmptyVerbSet`].
pub(crate) fn resolve_verbs<I, V>(pattern: &str, verbs: I, strict: bool) -> Result<Vec<Verb>>
where
    I: IntoIterator<Item = V>,
    V: IntoVerb,
{
    let mut resolved = Vec::new();
    for verb in verbs {
        match verb.into_verb() {
            Ok(verb) if resolved.contains(&verb) => {}
            Ok(verb) => resolved.push(verb),
            Err(token) if strict => {
                return Err(FemurError::UnsupportedVerb {
                    pattern: pattern.to_string(),
                    verb: token,
                });
            }
            Err(token) => {
                tracing::warn!(pattern, verb = %token, "dropping unsupported HTTP verb");
            }
        }
    }
    if strict && resolved.is_empty() {
        return Err(FemurError::EmptyVerbSet {
            pattern: pattern.to_string(),
        });
    }
    Ok(resolved)
}

/// Combine verbs into one filter; `None` for an empty slice.
pub(crate) fn method_filter(verbs: &[Verb]) -> Option<MethodFilter> {
    verbs
        .iter()
        .map(|verb| verb.method_filter())
        .reduce(MethodFilter::or)
}
