use crate::endpoint::annotation::{Annotation, RawAnnotation};
use serde::Serialize;

/// Name of a Rust type, both short (`MyEndpoint`) and fully qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeName {
    pub name: String,
    pub path: String,
}

impl TypeName {
    pub fn of<T: ?Sized>() -> Self {
        let path = std::any::type_name::<T>();
        Self {
            name: short_name(path).to_string(),
            path: path.to_string(),
        }
    }

    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// `my_app::endpoints::Greeter<my_app::Json>` -> `Greeter`
fn short_name(path: &str) -> &str {
    let base = path.split('<').next().unwrap_or(path);
    base.rsplit("::").next().unwrap_or(base)
}

/// How the described method takes its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Receiver {
    /// `&self`
    Ref,
    /// `self: Arc<Self>`
    Arc,
    /// An associated function without a receiver.
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub type_name: String,
    pub annotations: Vec<RawAnnotation>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            annotations: Vec::new(),
        }
    }

    pub fn annotated(mut self, annotation: RawAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnDescriptor {
    pub type_name: String,
    /// `true` for `async fn`, whose caller receives a future of `type_name`.
    pub asynchronous: bool,
}

impl ReturnDescriptor {
    pub fn value(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            asynchronous: false,
        }
    }

    pub fn asynchronous(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            asynchronous: true,
        }
    }

    /// The type an immediate call hands back.
    pub fn call_type(&self) -> String {
        if self.asynchronous {
            format!("impl Future<Output = {}>", self.type_name)
        } else {
            self.type_name.clone()
        }
    }
}

impl Default for ReturnDescriptor {
    fn default() -> Self {
        Self::value("()")
    }
}

/// Instance-independent description of an endpoint method.
///
/// Normally produced by `#[endpoints]`; building one by hand is mostly
/// useful in tests.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub declaring_type: Option<TypeName>,
    pub name: String,
    pub receiver: Receiver,
    pub parameters: Vec<ParameterDescriptor>,
    pub return_type: ReturnDescriptor,
    pub annotations: Vec<RawAnnotation>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            declaring_type: None,
            name: name.into(),
            receiver: Receiver::Ref,
            parameters: Vec::new(),
            return_type: ReturnDescriptor::default(),
            annotations: Vec::new(),
        }
    }

    pub fn declared_by<T: ?Sized>(self) -> Self {
        self.declaring_type(TypeName::of::<T>())
    }

    pub fn declaring_type(mut self, declaring_type: TypeName) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }

    pub fn receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, return_type: ReturnDescriptor) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn annotated(mut self, annotation: RawAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// `Type::method`, or just the method name without a declaring type.
    pub fn qualified_name(&self) -> String {
        match &self.declaring_type {
            Some(ty) => format!("{}::{}", ty.name, self.name),
            None => self.name.clone(),
        }
    }
}

/// A parameter of a synthesized invoker, with normalized annotations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvokerParameter {
    pub name: String,
    pub type_name: String,
    pub annotations: Vec<Annotation>,
}

/// Metadata side table of a synthesized invoker.
///
/// `parameters[0]` is the instance parameter; `parameters[k + 1]` mirrors
/// parameter `k` of the target method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvokerSignature {
    pub name: String,
    pub declaring_type: TypeName,
    pub method: String,
    pub parameters: Vec<InvokerParameter>,
    pub return_type: ReturnDescriptor,
    pub annotations: Vec<Annotation>,
}

impl InvokerSignature {
    pub fn instance(&self) -> &InvokerParameter {
        &self.parameters[0]
    }

    /// The parameters forwarded to the target method.
    pub fn forwarded(&self) -> &[InvokerParameter] {
        &self.parameters[1..]
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    #[allow(dead_code)]
    struct Generic<T>(T);

    #[test]
    fn test_type_name_strips_module_path_and_generics() {
        assert_eq!(TypeName::of::<Plain>().name, "Plain");
        assert_eq!(TypeName::of::<Generic<Plain>>().name, "Generic");
        assert!(TypeName::of::<Plain>().path.ends_with("::Plain"));
    }

    #[test]
    fn test_qualified_name() {
        let descriptor = MethodDescriptor::new("handle").declared_by::<Plain>();
        assert_eq!(descriptor.qualified_name(), "Plain::handle");
        assert_eq!(MethodDescriptor::new("handle").qualified_name(), "handle");
    }

    #[test]
    fn test_call_type_wraps_async_returns() {
        assert_eq!(ReturnDescriptor::value("String").call_type(), "String");
        assert_eq!(
            ReturnDescriptor::asynchronous("String").call_type(),
            "impl Future<Output = String>"
        );
    }
}
