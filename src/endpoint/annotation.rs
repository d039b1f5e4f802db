//! Annotation model shared by method descriptors and synthesized invokers.
//!
//! Annotations come in two shapes. [`RawAnnotation`] is what the method
//! author wrote: every argument carries its declared type and list arguments
//! are wrapped, element by element, in further [`TypedArgument`]s.
//! [`Annotation`] is the normalized shape attached to invokers: arguments are
//! a scalar or a flat array of scalars, nothing else.

use crate::error::{FemurError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A single annotation argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
}

impl Scalar {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Str(_) => "str",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Bool(_) => "bool",
            Scalar::Char(_) => "char",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => write!(f, "{:?}", s),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Char(c) => write!(f, "{:?}", c),
        }
    }
}

/// Value of a [`TypedArgument`] as written at the attachment site.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Scalar(Scalar),
    /// Each element keeps its own declared type, which is how list arguments
    /// are represented before normalization.
    List(Vec<TypedArgument>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedArgument {
    pub name: Option<String>,
    pub type_name: String,
    pub value: TypedValue,
}

impl TypedArgument {
    pub fn scalar(type_name: impl Into<String>, value: Scalar) -> Self {
        Self {
            name: None,
            type_name: type_name.into(),
            value: TypedValue::Scalar(value),
        }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::scalar("&str", Scalar::Str(value.into()))
    }

    pub fn int(value: i64) -> Self {
        Self::scalar("i64", Scalar::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::scalar("f64", Scalar::Float(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::scalar("bool", Scalar::Bool(value))
    }

    pub fn char(value: char) -> Self {
        Self::scalar("char", Scalar::Char(value))
    }

    pub fn list(type_name: impl Into<String>, items: Vec<TypedArgument>) -> Self {
        Self {
            name: None,
            type_name: type_name.into(),
            value: TypedValue::List(items),
        }
    }

    /// Turn a positional argument into a `name = value` argument.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn normalize(&self, annotation: &str) -> Result<AnnotationArg> {
        let value = match &self.value {
            TypedValue::Scalar(scalar) => AnnotationValue::Scalar(scalar.clone()),
            TypedValue::List(items) => {
                let mut flat = Vec::with_capacity(items.len());
                flatten_into(items, &mut flat);
                if let Some(first) = flat.first() {
                    if let Some(odd) = flat.iter().find(|s| s.kind() != first.kind()) {
                        return Err(FemurError::malformed(
                            annotation,
                            format!(
                                "array argument mixes `{}` and `{}` values",
                                first.kind(),
                                odd.kind()
                            ),
                        ));
                    }
                }
                AnnotationValue::Array(flat)
            }
        };
        Ok(AnnotationArg {
            name: self.name.clone(),
            value,
        })
    }
}

fn flatten_into(items: &[TypedArgument], out: &mut Vec<Scalar>) {
    for item in items {
        match &item.value {
            TypedValue::Scalar(scalar) => out.push(scalar.clone()),
            TypedValue::List(nested) => flatten_into(nested, out),
        }
    }
}

/// An annotation exactly as it was attached to a method or parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnnotation {
    pub name: String,
    pub args: Vec<TypedArgument>,
}

impl RawAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: TypedArgument) -> Self {
        self.args.push(arg);
        self
    }

    pub fn normalize(&self) -> Result<Annotation> {
        let args = self
            .args
            .iter()
            .map(|arg| arg.normalize(&self.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Annotation {
            name: self.name.clone(),
            args,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Scalar(Scalar),
    Array(Vec<Scalar>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationArg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: AnnotationValue,
}

/// A normalized annotation attached to a synthesized invoker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<AnnotationArg>,
}

impl Annotation {
    /// An annotation without arguments.
    pub fn marker(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Look up a named argument.
    pub fn arg(&self, name: &str) -> Option<&AnnotationValue> {
        self.args
            .iter()
            .find(|arg| arg.name.as_deref() == Some(name))
            .map(|arg| &arg.value)
    }

    pub fn binding_source(&self) -> Option<BindingSource> {
        self.name.parse().ok()
    }
}

/// Where a parameter's value comes from at request time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumString, EnumIter,
)]
pub enum BindingSource {
    #[strum(serialize = "from_query")]
    Query,
    #[strum(serialize = "from_route")]
    Route,
    #[strum(serialize = "from_header")]
    Header,
    #[strum(serialize = "from_body")]
    Body,
    #[strum(serialize = "from_form")]
    Form,
    #[strum(serialize = "from_services")]
    Services,
}

impl BindingSource {
    pub fn annotation(self) -> Annotation {
        Annotation::marker(self.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AnnotationTarget {
    #[strum(serialize = "parameters")]
    Parameter,
    #[strum(serialize = "methods")]
    Method,
}

/// Names the annotation kinds that may be re-attached to an invoker and
/// where they may go.
#[derive(Debug, Clone)]
pub struct AnnotationCatalog {
    constructors: HashMap<String, Vec<AnnotationTarget>>,
}

/// Method-level annotations known out of the box.
const ENDPOINT_ANNOTATIONS: &[&str] = &[
    "tags",
    "summary",
    "description",
    "endpoint_name",
    "produces",
    "accepts",
    "allow_anonymous",
    "authorize",
    "exclude_from_description",
];

impl AnnotationCatalog {
    /// A catalog that knows nothing.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, target: AnnotationTarget) -> &mut Self {
        let targets = self.constructors.entry(name.into()).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
        self
    }

    pub fn contains(&self, name: &str, target: AnnotationTarget) -> bool {
        self.constructors
            .get(name)
            .is_some_and(|targets| targets.contains(&target))
    }

    /// Normalize `raw` after checking it may be attached at `target`.
    pub fn construct(&self, raw: &RawAnnotation, target: AnnotationTarget) -> Result<Annotation> {
        if !self.contains(&raw.name, target) {
            return Err(FemurError::MissingConstructor {
                annotation: raw.name.clone(),
                target: target.to_string(),
            });
        }
        raw.normalize()
    }
}

impl Default for AnnotationCatalog {
    fn default() -> Self {
        use strum::IntoEnumIterator;

        let mut catalog = Self::empty();
        for source in BindingSource::iter() {
            catalog.register(source.as_ref(), AnnotationTarget::Parameter);
        }
        for name in ENDPOINT_ANNOTATIONS {
            catalog.register(*name, AnnotationTarget::Method);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_arguments_flatten_to_plain_scalars() {
        let raw = RawAnnotation::new("authorize").arg(
            TypedArgument::list(
                "[&str]",
                vec![
                    TypedArgument::str("admin"),
                    TypedArgument::list("[&str]", vec![TypedArgument::str("ops")]),
                ],
            )
            .named("roles"),
        );

        let annotation = raw.normalize().unwrap();
        assert_eq!(
            annotation.arg("roles"),
            Some(&AnnotationValue::Array(vec![
                Scalar::Str("admin".into()),
                Scalar::Str("ops".into()),
            ]))
        );
    }

    #[test]
    fn test_mixed_array_is_malformed() {
        let raw = RawAnnotation::new("tags").arg(TypedArgument::list(
            "[&str]",
            vec![TypedArgument::str("a"), TypedArgument::int(1)],
        ));

        let err = raw.normalize().unwrap_err();
        assert!(matches!(err, FemurError::MalformedAnnotation { .. }));
    }

    #[test]
    fn test_scalar_arguments_keep_order_and_names() {
        let raw = RawAnnotation::new("produces")
            .arg(TypedArgument::int(200))
            .arg(TypedArgument::str("text/plain").named("content_type"));

        let annotation = raw.normalize().unwrap();
        assert_eq!(annotation.args.len(), 2);
        assert_eq!(annotation.args[0].name, None);
        assert_eq!(annotation.args[0].value, AnnotationValue::Scalar(Scalar::Int(200)));
        assert_eq!(
            annotation.arg("content_type"),
            Some(&AnnotationValue::Scalar(Scalar::Str("text/plain".into())))
        );
    }

    #[test]
    fn test_scalar_text_access() {
        assert_eq!(Scalar::Str("text/plain".into()).as_str(), Some("text/plain"));
        assert_eq!(Scalar::Char('x').as_str(), None);
        assert_eq!(Scalar::Int(200).kind(), "int");
        assert_eq!(Scalar::Str("a\"b".into()).to_string(), r#""a\"b""#);
    }

    #[test]
    fn test_catalog_rejects_unknown_and_misplaced_annotations() {
        let catalog = AnnotationCatalog::default();

        let unknown = catalog
            .construct(&RawAnnotation::new("from_cookie"), AnnotationTarget::Parameter)
            .unwrap_err();
        assert!(matches!(unknown, FemurError::MissingConstructor { .. }));

        let misplaced = catalog
            .construct(&RawAnnotation::new("from_query"), AnnotationTarget::Method)
            .unwrap_err();
        assert!(matches!(misplaced, FemurError::MissingConstructor { .. }));

        let ok = catalog
            .construct(&RawAnnotation::new("from_query"), AnnotationTarget::Parameter)
            .unwrap();
        assert_eq!(ok.binding_source(), Some(BindingSource::Query));
    }

    #[test]
    fn test_catalog_accepts_registered_custom_annotations() {
        let mut catalog = AnnotationCatalog::default();
        catalog.register("rate_limit", AnnotationTarget::Method);

        let annotation = catalog
            .construct(
                &RawAnnotation::new("rate_limit").arg(TypedArgument::int(10)),
                AnnotationTarget::Method,
            )
            .unwrap();
        assert_eq!(annotation.name, "rate_limit");
    }
}
