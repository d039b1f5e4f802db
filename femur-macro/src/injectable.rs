use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, Field, Fields, GenericArgument, PathArguments, Type,
};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    generate_injectable_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn generate_injectable_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] can only be applied to structs",
            ))
        }
    };

    let body = match fields {
        Fields::Named(named) => {
            let injections = named
                .named
                .iter()
                .map(|field| {
                    let field_name = &field.ident;
                    let value = field_injection(field)?;
                    Ok(quote! { #field_name: #value })
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! { Self { #(#injections),* } }
        }
        Fields::Unit => quote! { Self },
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] only supports structs with named fields",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::femur::Injectable for #struct_name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn inject(
                container: &::femur::Container
            ) -> ::femur::Result<Self> {
                Ok(#body)
            }
        }
    })
}

fn field_injection(field: &Field) -> syn::Result<TokenStream2> {
    if is_default(field)? {
        return Ok(quote! { ::std::default::Default::default() });
    }

    let inner = arc_inner(&field.ty).ok_or_else(|| {
        syn::Error::new_spanned(
            &field.ty,
            "injected fields must be `Arc<T>` or `Arc<dyn Trait>`; \
             use #[inject(default)] otherwise",
        )
    })?;

    Ok(match inner {
        Type::TraitObject(_) => quote! { container.resolve_trait::<#inner>()? },
        _ => quote! { container.resolve::<#inner>()? },
    })
}

/// `#[inject(default)]`
fn is_default(field: &Field) -> syn::Result<bool> {
    let mut default = false;
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("inject")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = true;
                Ok(())
            } else {
                Err(meta.error("expected `default`"))
            }
        })?;
    }
    Ok(default)
}

/// Extract the inner type from Arc<T> or Arc<dyn Trait>
fn arc_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Arc" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first()? {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_fields_resolve_by_kind() {
        let input: DeriveInput = parse_quote! {
            struct MyEndpoint {
                greeter: Arc<Greeter>,
                clock: std::sync::Arc<dyn Clock>,
                #[inject(default)]
                hits: AtomicUsize,
            }
        };
        let expanded = generate_injectable_impl(&input).unwrap().to_string();
        assert!(expanded.contains(&quote!(container.resolve::<Greeter>()?).to_string()));
        assert!(expanded.contains(&quote!(container.resolve_trait::<dyn Clock>()?).to_string()));
        assert!(expanded.contains(&quote!(::std::default::Default::default()).to_string()));
    }

    #[test]
    fn test_plain_fields_need_a_default() {
        let input: DeriveInput = parse_quote! {
            struct MyEndpoint {
                hits: usize,
            }
        };
        assert!(generate_injectable_impl(&input).is_err());
    }

    #[test]
    fn test_enums_are_rejected() {
        let input: DeriveInput = parse_quote! {
            enum NotAService { A }
        };
        assert!(generate_injectable_impl(&input).is_err());
    }
}
