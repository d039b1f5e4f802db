//! Parsing of annotation attributes into `RawAnnotation` builder code.

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    Attribute, Expr, ExprArray, Ident, Lit, LitStr, Meta, Token, UnOp,
};

pub const PARAMETER_ANNOTATIONS: &[&str] = &[
    "from_query",
    "from_route",
    "from_header",
    "from_body",
    "from_form",
    "from_services",
];

pub const METHOD_ANNOTATIONS: &[&str] = &[
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

/// `#[annotation(name, args...)]` attaches an arbitrary annotation.
const GENERIC_ANNOTATION: &str = "annotation";

pub fn is_parameter_annotation(attr: &Attribute) -> bool {
    has_name(attr, PARAMETER_ANNOTATIONS)
}

pub fn is_method_annotation(attr: &Attribute) -> bool {
    has_name(attr, METHOD_ANNOTATIONS)
}

fn has_name(attr: &Attribute, names: &[&str]) -> bool {
    attr.path().get_ident().is_some_and(|ident| {
        ident == GENERIC_ANNOTATION || names.contains(&ident.to_string().as_str())
    })
}

/// One argument as written: `value` or `name = value`.
struct ArgSyntax {
    name: Option<Ident>,
    value: Expr,
}

impl Parse for ArgSyntax {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name = if input.peek(Ident) && input.peek2(Token![=]) {
            let name: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            Some(name)
        } else {
            None
        };
        Ok(ArgSyntax {
            name,
            value: input.parse()?,
        })
    }
}

/// Body of `#[annotation(...)]`: the annotation name, then its arguments.
struct GenericSyntax {
    name: String,
    args: Punctuated<ArgSyntax, Token![,]>,
}

impl Parse for GenericSyntax {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name = if input.peek(LitStr) {
            input.parse::<LitStr>()?.value()
        } else {
            input.parse::<Ident>()?.to_string()
        };
        let args = if input.is_empty() {
            Punctuated::new()
        } else {
            input.parse::<Token![,]>()?;
            Punctuated::parse_terminated(input)?
        };
        Ok(GenericSyntax { name, args })
    }
}

/// Build `RawAnnotation` construction code from an annotation attribute.
pub fn raw_annotation(attr: &Attribute) -> syn::Result<TokenStream2> {
    let ident = attr
        .path()
        .get_ident()
        .ok_or_else(|| syn::Error::new_spanned(attr.path(), "expected an annotation name"))?;

    let (name, args): (String, Vec<ArgSyntax>) = if ident == GENERIC_ANNOTATION {
        let syntax: GenericSyntax = attr.parse_args()?;
        (syntax.name, syntax.args.into_iter().collect())
    } else {
        let args = match &attr.meta {
            Meta::Path(_) => Vec::new(),
            Meta::List(_) => attr
                .parse_args_with(Punctuated::<ArgSyntax, Token![,]>::parse_terminated)?
                .into_iter()
                .collect(),
            Meta::NameValue(nv) => vec![ArgSyntax {
                name: None,
                value: nv.value.clone(),
            }],
        };
        (ident.to_string(), args)
    };

    let args = args
        .iter()
        .map(|arg| {
            let value = typed_argument(&arg.value)?;
            Ok(match &arg.name {
                Some(name) => {
                    let name = name.to_string();
                    quote! { #value.named(#name) }
                }
                None => value,
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        ::femur::endpoint::RawAnnotation::new(#name)
            #(.arg(#args))*
    })
}

fn typed_argument(expr: &Expr) -> syn::Result<TokenStream2> {
    match expr {
        Expr::Lit(lit) => literal(&lit.lit, false),
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => match &*unary.expr {
            Expr::Lit(lit) => literal(&lit.lit, true),
            other => Err(unsupported(other)),
        },
        Expr::Group(group) => typed_argument(&group.expr),
        Expr::Paren(paren) => typed_argument(&paren.expr),
        Expr::Array(array) => list(array),
        other => Err(unsupported(other)),
    }
}

fn literal(lit: &Lit, negative: bool) -> syn::Result<TokenStream2> {
    let tokens = match lit {
        Lit::Str(s) if !negative => {
            let value = s.value();
            quote! { ::femur::endpoint::TypedArgument::str(#value) }
        }
        Lit::Int(i) => {
            let value: i64 = i.base10_parse()?;
            let value = if negative { -value } else { value };
            quote! { ::femur::endpoint::TypedArgument::int(#value) }
        }
        Lit::Float(f) => {
            let value: f64 = f.base10_parse()?;
            let value = if negative { -value } else { value };
            quote! { ::femur::endpoint::TypedArgument::float(#value) }
        }
        Lit::Bool(b) if !negative => {
            let value = b.value;
            quote! { ::femur::endpoint::TypedArgument::bool(#value) }
        }
        Lit::Char(c) if !negative => {
            let value = c.value();
            quote! { ::femur::endpoint::TypedArgument::char(#value) }
        }
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "annotation arguments must be string, integer, float, bool or char literals",
            ))
        }
    };
    Ok(tokens)
}

fn list(array: &ExprArray) -> syn::Result<TokenStream2> {
    let items = array
        .elems
        .iter()
        .map(typed_argument)
        .collect::<syn::Result<Vec<_>>>()?;
    let type_name = format!("[{}]", element_type(array));
    Ok(quote! {
        ::femur::endpoint::TypedArgument::list(#type_name, vec![#(#items),*])
    })
}

/// Declared element type of an array argument, taken from its first element.
fn element_type(array: &ExprArray) -> String {
    fn of(expr: &Expr) -> String {
        match expr {
            Expr::Lit(lit) => match &lit.lit {
                Lit::Str(_) => "&str".into(),
                Lit::Int(_) => "i64".into(),
                Lit::Float(_) => "f64".into(),
                Lit::Bool(_) => "bool".into(),
                Lit::Char(_) => "char".into(),
                _ => "_".into(),
            },
            Expr::Unary(unary) => of(&unary.expr),
            Expr::Group(group) => of(&group.expr),
            Expr::Paren(paren) => of(&paren.expr),
            Expr::Array(inner) => format!("[{}]", element_type(inner)),
            _ => "_".into(),
        }
    }
    array.elems.first().map(of).unwrap_or_else(|| "_".into())
}

fn unsupported(expr: &Expr) -> syn::Error {
    syn::Error::new_spanned(
        expr,
        "annotation arguments must be literals or arrays of literals",
    )
}
