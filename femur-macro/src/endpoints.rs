use crate::annotation::{is_method_annotation, is_parameter_annotation, raw_annotation};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, ToTokens};
use syn::{
    parse_macro_input, FnArg, ImplItem, ImplItemFn, ItemImpl, Pat, PatType, ReturnType, Type,
};

enum ReceiverKind {
    Ref,
    Arc,
    None,
}

struct ParamInfo {
    name: String,
    ty: Type,
    annotations: Vec<TokenStream2>,
}

struct EndpointInfo {
    method: ImplItemFn,
    receiver: ReceiverKind,
    params: Vec<ParamInfo>,
    annotations: Vec<TokenStream2>,
}

pub fn endpoints_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[endpoints] takes no arguments",
        )
        .to_compile_error()
        .into();
    }
    let input = parse_macro_input!(item as ItemImpl);
    generate_endpoints_impl(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn generate_endpoints_impl(mut input: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[endpoints] belongs on an inherent impl block",
        ));
    }

    let mut endpoints = Vec::new();
    let mut errors: Option<syn::Error> = None;

    for item in input.items.iter_mut() {
        if let ImplItem::Fn(method) = item {
            match extract_endpoint(method) {
                Ok(Some(info)) => endpoints.push(info),
                Ok(None) => {}
                Err(e) => match &mut errors {
                    Some(all) => all.combine(e),
                    None => errors = Some(e),
                },
            }
            strip_annotations(method);
        }
    }
    if let Some(errors) = errors {
        return Err(errors);
    }

    let generated = endpoints.iter().map(generate_endpoint_items);
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let self_ty = &input.self_ty;

    Ok(quote! {
        #input

        impl #impl_generics #self_ty #where_clause {
            #(#generated)*
        }
    })
}

/// Record a method, or `None` when it cannot be served as an endpoint and
/// carries no annotations asking for it.
fn extract_endpoint(method: &ImplItemFn) -> syn::Result<Option<EndpointInfo>> {
    let annotated = method.attrs.iter().any(is_method_annotation)
        || method.sig.inputs.iter().any(|input| match input {
            FnArg::Typed(pat_type) => pat_type.attrs.iter().any(is_parameter_annotation),
            FnArg::Receiver(_) => false,
        });

    if let Err(e) = check_supported(method) {
        return if annotated { Err(e) } else { Ok(None) };
    }

    let receiver = match method.sig.inputs.first() {
        Some(FnArg::Receiver(receiver)) => {
            if receiver.colon_token.is_some() && !is_reference(&receiver.ty) {
                ReceiverKind::Arc
            } else {
                ReceiverKind::Ref
            }
        }
        _ => ReceiverKind::None,
    };

    let mut params = Vec::new();
    for input in method.sig.inputs.iter() {
        if let FnArg::Typed(pat_type) = input {
            params.push(ParamInfo {
                name: param_name(pat_type, params.len()),
                ty: (*pat_type.ty).clone(),
                annotations: pat_type
                    .attrs
                    .iter()
                    .filter(|attr| is_parameter_annotation(attr))
                    .map(raw_annotation)
                    .collect::<syn::Result<_>>()?,
            });
        }
    }

    let annotations = method
        .attrs
        .iter()
        .filter(|attr| is_method_annotation(attr))
        .map(raw_annotation)
        .collect::<syn::Result<_>>()?;

    Ok(Some(EndpointInfo {
        method: method.clone(),
        receiver,
        params,
        annotations,
    }))
}

fn check_supported(method: &ImplItemFn) -> syn::Result<()> {
    let sig = &method.sig;
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "generic methods cannot be endpoints",
        ));
    }
    for input in &sig.inputs {
        match input {
            FnArg::Receiver(receiver) => {
                if receiver.mutability.is_some() && receiver.reference.is_some() {
                    return Err(syn::Error::new_spanned(
                        receiver,
                        "endpoint methods take `&self` or `self: Arc<Self>`, not `&mut self`",
                    ));
                }
                if receiver.reference.is_none() && receiver.colon_token.is_none() {
                    return Err(syn::Error::new_spanned(
                        receiver,
                        "endpoint methods take `&self` or `self: Arc<Self>`, not `self`",
                    ));
                }
                if receiver.colon_token.is_some()
                    && !is_reference(&receiver.ty)
                    && !is_arc(&receiver.ty)
                {
                    return Err(syn::Error::new_spanned(
                        &receiver.ty,
                        "endpoint methods take `&self` or `self: Arc<Self>`",
                    ));
                }
                if let Type::Reference(reference) = &*receiver.ty {
                    if reference.mutability.is_some() {
                        return Err(syn::Error::new_spanned(
                            receiver,
                            "endpoint methods take `&self` or `self: Arc<Self>`, not `&mut self`",
                        ));
                    }
                }
            }
            FnArg::Typed(pat_type) => match &*pat_type.ty {
                Type::ImplTrait(_) => {
                    return Err(syn::Error::new_spanned(
                        &pat_type.ty,
                        "endpoint parameters cannot be `impl Trait`",
                    ));
                }
                Type::Reference(_) => {
                    return Err(syn::Error::new_spanned(
                        &pat_type.ty,
                        "endpoint parameters must be owned values",
                    ));
                }
                _ => {}
            },
        }
    }
    if let ReturnType::Type(_, ty) = &sig.output {
        let borrowed = match &**ty {
            Type::Reference(reference) => reference
                .lifetime
                .as_ref()
                .is_none_or(|lifetime| lifetime.ident != "static"),
            _ => false,
        };
        let opaque = matches!(**ty, Type::ImplTrait(_)) && sig.asyncness.is_none();
        if borrowed || opaque {
            return Err(syn::Error::new_spanned(
                ty,
                "endpoint methods cannot return borrowed or `impl Trait` values",
            ));
        }
    }
    Ok(())
}

fn is_reference(ty: &Type) -> bool {
    matches!(ty, Type::Reference(_))
}

fn is_arc(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Arc"),
        _ => false,
    }
}

/// `filter: T` -> `filter`, `Query(filter): Query<T>` -> `filter`, else `arg{index}`.
fn param_name(pat_type: &PatType, index: usize) -> String {
    fn single_ident(pat: &Pat) -> Option<String> {
        match pat {
            Pat::Ident(pat_ident) => Some(pat_ident.ident.to_string()),
            Pat::TupleStruct(tuple) if tuple.elems.len() == 1 => single_ident(&tuple.elems[0]),
            Pat::Reference(reference) => single_ident(&reference.pat),
            _ => None,
        }
    }
    single_ident(&pat_type.pat)
        .map(|name| name.trim_start_matches('_').to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("arg{}", index))
}

/// Render a type the way it reads in source: `Query<Filter>`, not `Query < Filter >`.
fn type_string(ty: &impl ToTokens) -> String {
    let mut text = ty.to_token_stream().to_string();
    for (from, to) in [
        (" <", "<"),
        ("< ", "<"),
        (" >", ">"),
        (" ::", "::"),
        (":: ", "::"),
        (" ,", ","),
        ("& ", "&"),
        ("( ", "("),
        (" )", ")"),
        ("[ ", "["),
        (" ]", "]"),
    ] {
        text = text.replace(from, to);
    }
    text
}

fn strip_annotations(method: &mut ImplItemFn) {
    method.attrs.retain(|attr| !is_method_annotation(attr));
    for input in method.sig.inputs.iter_mut() {
        if let FnArg::Typed(pat_type) = input {
            pat_type.attrs.retain(|attr| !is_parameter_annotation(attr));
        }
    }
}

fn generate_endpoint_items(info: &EndpointInfo) -> TokenStream2 {
    let sig = &info.method.sig;
    let fn_name = &sig.ident;
    let method_name = fn_name.to_string();
    let invoke_fn = format_ident!("__femur_invoke_{}", fn_name);
    let select_fn = format_ident!("__femur_select_{}", fn_name);

    let arg_idents: Vec<_> = (0..info.params.len())
        .map(|i| format_ident!("__arg{}", i))
        .collect();
    let arg_types: Vec<_> = info.params.iter().map(|p| &p.ty).collect();
    let output = &sig.output;

    let call = match info.receiver {
        ReceiverKind::Ref | ReceiverKind::Arc => quote! { this.#fn_name(#(#arg_idents),*) },
        ReceiverKind::None => quote! { Self::#fn_name(#(#arg_idents),*) },
    };
    let this = match info.receiver {
        ReceiverKind::None => quote! { _this },
        _ => quote! { this },
    };
    let invoke = if sig.asyncness.is_some() {
        quote! {
            #[doc(hidden)]
            #[allow(non_snake_case)]
            pub async fn #invoke_fn(
                #this: ::std::sync::Arc<Self>,
                #(#arg_idents: #arg_types),*
            ) #output {
                #call.await
            }
        }
    } else {
        quote! {
            #[doc(hidden)]
            #[allow(non_snake_case)]
            pub fn #invoke_fn(
                #this: ::std::sync::Arc<Self>,
                #(#arg_idents: #arg_types),*
            ) #output {
                #call
            }
        }
    };

    let receiver = match info.receiver {
        ReceiverKind::Ref => quote! { ::femur::endpoint::Receiver::Ref },
        ReceiverKind::Arc => quote! { ::femur::endpoint::Receiver::Arc },
        ReceiverKind::None => quote! { ::femur::endpoint::Receiver::None },
    };

    let parameters = info.params.iter().map(|param| {
        let name = &param.name;
        let ty = type_string(&param.ty);
        let annotations = &param.annotations;
        quote! {
            .parameter(
                ::femur::endpoint::ParameterDescriptor::new(#name, #ty)
                    #(.annotated(#annotations))*
            )
        }
    });

    let return_type = match &sig.output {
        ReturnType::Default => "()".to_string(),
        ReturnType::Type(_, ty) => type_string(ty),
    };
    let returns = if sig.asyncness.is_some() {
        quote! { ::femur::endpoint::ReturnDescriptor::asynchronous(#return_type) }
    } else {
        quote! { ::femur::endpoint::ReturnDescriptor::value(#return_type) }
    };
    let annotations = &info.annotations;

    quote! {
        #invoke

        #[doc(hidden)]
        #[allow(non_snake_case)]
        pub fn #select_fn<__F>(
            method: __F,
        ) -> ::femur::endpoint::MethodSelector<Self, __F, (#(#arg_types,)*)>
        where
            __F: ::femur::endpoint::InstanceMethod<Self, (#(#arg_types,)*)>,
        {
            ::femur::endpoint::MethodSelector::new(
                ::femur::endpoint::MethodDescriptor::new(#method_name)
                    .declared_by::<Self>()
                    .receiver(#receiver)
                    #(#parameters)*
                    .returns(#returns)
                    #(.annotated(#annotations))*,
                method,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_type_string_is_compact() {
        let ty: Type = parse_quote!(axum::extract::Query<Filter>);
        assert_eq!(type_string(&ty), "axum::extract::Query<Filter>");
        let ty: Type = parse_quote!(Result<Vec<u8>, (StatusCode, String)>);
        assert_eq!(type_string(&ty), "Result<Vec<u8>, (StatusCode, String)>");
    }

    #[test]
    fn test_param_names_follow_patterns() {
        let method: ImplItemFn = parse_quote! {
            async fn handle(&self, filter: Query<Filter>, Path(id): Path<u32>, (a, b): (u8, u8)) {}
        };
        let info = extract_endpoint(&method).unwrap().unwrap();
        let names: Vec<_> = info.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["filter", "id", "arg2"]);
    }

    #[test]
    fn test_unannotated_helpers_are_skipped() {
        let method: ImplItemFn = parse_quote! {
            fn bump(&mut self) {}
        };
        assert!(extract_endpoint(&method).unwrap().is_none());

        let method: ImplItemFn = parse_quote! {
            #[summary("bumps")]
            fn bump(&mut self) {}
        };
        assert!(extract_endpoint(&method).is_err());
    }

    #[test]
    fn test_receivers_are_classified() {
        let method: ImplItemFn = parse_quote! {
            fn shared(self: Arc<Self>) -> u8 { 1 }
        };
        let info = extract_endpoint(&method).unwrap().unwrap();
        assert!(matches!(info.receiver, ReceiverKind::Arc));

        let method: ImplItemFn = parse_quote! {
            fn create(name: String) -> Self { todo!() }
        };
        let info = extract_endpoint(&method).unwrap().unwrap();
        assert!(matches!(info.receiver, ReceiverKind::None));
        assert_eq!(info.params[0].name, "name");
    }

    #[test]
    fn test_annotations_are_stripped() {
        let mut method: ImplItemFn = parse_quote! {
            #[summary("hi")]
            #[doc = "kept"]
            async fn handle(&self, #[from_query] filter: Query<Filter>) {}
        };
        let info = extract_endpoint(&method).unwrap().unwrap();
        assert_eq!(info.annotations.len(), 1);
        assert_eq!(info.params[0].annotations.len(), 1);

        strip_annotations(&mut method);
        assert_eq!(method.attrs.len(), 1);
        match &method.sig.inputs[1] {
            FnArg::Typed(pat_type) => assert!(pat_type.attrs.is_empty()),
            FnArg::Receiver(_) => unreachable!(),
        }
    }
}
