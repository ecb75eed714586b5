use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature};

/// Turn an async function taking a `rocket::local::asynchronous::Client`
/// and a `mongodb::Database` into an integration test running against a
/// freshly ignited instance on a throwaway, randomly-named database.
///
/// The database is dropped when the test passes; a failing test leaves
/// its database behind for inspection, which is harmless since names
/// never collide.
///
/// Tests are generated `#[ignore]`d, since they need a reachable MongoDB
/// server (configured via `db_uri`); run them with
/// `cargo test -- --ignored` where one is available.
///
/// Note: this attribute expects `crate::client_and_db()` to exist.
#[proc_macro_attribute]
pub fn db_test(_: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    if let Err(err) = check_sig(&item_fn.sig) {
        return err.into_compile_error().into();
    }

    // Rename the inner function so the test can have the original name.
    let name = item_fn.sig.ident.clone();
    let inner_name = format_ident!("{}_inner", name);
    item_fn.sig.ident = inner_name.clone();

    quote! {
        #[rocket::async_test]
        #[ignore = "requires a MongoDB server configured via `db_uri`"]
        async fn #name() {
            let (client, db) = crate::client_and_db().await;

            #item_fn

            #inner_name(client, db.clone()).await;

            db.drop(None).await.unwrap();
        }
    }
    .into()
}

/// The wrapped function must be async and take exactly two (typed)
/// arguments: the local client and the database, in that order.
fn check_sig(sig: &Signature) -> Result<(), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    if sig.inputs.len() != 2 {
        return Err(syn::Error::new(
            sig.inputs.span(),
            "Test must accept a `rocket::local::asynchronous::Client` and a `mongodb::Database`",
        ));
    }

    for input in &sig.inputs {
        match input {
            FnArg::Typed(pat_type) if matches!(*pat_type.pat, Pat::Ident(_)) => {}
            _ => {
                return Err(syn::Error::new(
                    input.span(),
                    "Arguments must be plain identifiers with types",
                ));
            }
        }
    }

    Ok(())
}
