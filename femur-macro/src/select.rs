use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, punctuated::Punctuated, Path, PathArguments};

pub fn select_macro(input: TokenStream) -> TokenStream {
    let path = parse_macro_input!(input as Path);
    generate_select(path)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// `Type::method` -> `Type::__femur_select_method(Type::__femur_invoke_method)`
fn generate_select(path: Path) -> syn::Result<TokenStream2> {
    if path.segments.len() < 2 {
        return Err(syn::Error::new_spanned(
            &path,
            "select! expects `Type::method`",
        ));
    }

    let mut segments = path.segments.clone();
    let method = segments
        .pop()
        .map(|pair| pair.into_value())
        .ok_or_else(|| syn::Error::new_spanned(&path, "select! expects `Type::method`"))?;
    if !matches!(method.arguments, PathArguments::None) {
        return Err(syn::Error::new_spanned(
            &method.arguments,
            "the selected method cannot take generic arguments",
        ));
    }

    let type_path = Path {
        leading_colon: path.leading_colon,
        segments: segments.into_pairs().map(|pair| pair.into_value()).collect::<Punctuated<_, _>>(),
    };
    let select_fn = format_ident!("__femur_select_{}", method.ident);
    let invoke_fn = format_ident!("__femur_invoke_{}", method.ident);

    Ok(quote! {
        #type_path::#select_fn(#type_path::#invoke_fn)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_expands_to_the_generated_selector() {
        let expanded = generate_select(parse_quote!(endpoints::MyEndpoint::handle_async)).unwrap();
        let expected = quote! {
            endpoints::MyEndpoint::__femur_select_handle_async(
                endpoints::MyEndpoint::__femur_invoke_handle_async
            )
        };
        assert_eq!(expanded.to_string(), expected.to_string());
    }

    #[test]
    fn test_bare_names_are_rejected() {
        assert!(generate_select(parse_quote!(handle_async)).is_err());
        assert!(generate_select(parse_quote!(MyEndpoint::handle<u8>)).is_err());
    }
}
