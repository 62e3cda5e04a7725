//! Procedural macros used by `handctl`.
//!
//! Do not use this crate directly, use `handctl` instead.

use proc_macro::{Span, TokenStream};
use quote::quote;
use syn::{parse::Error, ItemFn};

/// Turns `main` into a `handctl` application entry point.
///
/// The annotated function is run on a background thread after logging has been initialized. The
/// main thread is handed to the preview window's event loop, which some platforms require.
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    match expand_main(args, item.clone()) {
        Ok(tokens) => tokens,
        Err(err) => {
            // Keep the original item next to the error so that IDEs can still analyze it.
            let mut error = item;
            error.extend(TokenStream::from(err.to_compile_error()));
            error
        }
    }
}

fn expand_main(args: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    if !args.is_empty() {
        return Err(Error::new(
            Span::call_site().into(),
            "`#[handctl::main]` does not accept arguments",
        ));
    }

    let item = syn::parse::<ItemFn>(item)?;

    if item.sig.ident != "main" {
        return Err(Error::new(
            item.sig.ident.span(),
            "`#[handctl::main]` must be applied to a function called `main`",
        ));
    }
    if let Some(asyncness) = &item.sig.asyncness {
        return Err(Error::new(
            asyncness.span,
            "`#[handctl::main]` cannot be applied to an `async fn`",
        ));
    }
    if !item.sig.inputs.is_empty() {
        return Err(Error::new(
            item.sig.ident.span(),
            "`main` must not take any arguments",
        ));
    }
    Ok(quote! {
        fn main() {
            #item

            ::handctl::init_logger!();

            ::handctl::run(main);
        }
    }
    .into())
}
