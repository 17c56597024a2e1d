use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, Data, DeriveInput, ImplItem, ImplItemFn, ItemImpl, Stmt,
    Variant, Visibility,
};

/// Procedural macro that turns an enum into a govboot error type.
///
/// This macro automatically:
/// 1. Adds `#[derive(Debug, thiserror::Error)]`
/// 2. Adds a `Generic { message: String }` variant if not already present
/// 3. Implements `From<anyhow::Error>` for the error type, keeping the cause chain in the message
/// 4. Provides helper methods for converting `anyhow::Result`s
///
/// # Usage
///
/// ```rust,ignore
/// #[govboot_error]
/// pub enum MyError {
///     #[error("contract {name} not found")]
///     NotFound { name: String },
/// }
/// ```
#[proc_macro_attribute]
pub fn govboot_error(_args: TokenStream, input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(
            &input,
            "govboot_error can only be applied to enums",
        )
        .to_compile_error()
        .into();
    };

    let enum_name = &input.ident;
    let visibility = &input.vis;
    let generics = &input.generics;

    // Existing derives are dropped so the generated derive list is the only one.
    let attrs: Vec<_> = input
        .attrs
        .iter()
        .filter(|attr| !attr.path().is_ident("derive"))
        .collect();

    let mut variants = data_enum.variants.clone();
    if !variants.iter().any(|variant| variant.ident == "Generic") {
        let generic_variant: Variant = syn::parse_quote! {
            /// A generic error that wraps an `anyhow` error chain.
            #[error("{message}")]
            Generic {
                /// The flattened error chain.
                message: String
            }
        };
        variants.push(generic_variant);
    }

    quote! {
        #[derive(Debug, thiserror::Error)]
        #(#attrs)*
        #visibility enum #enum_name #generics {
            #variants
        }

        impl #generics From<anyhow::Error> for #enum_name #generics {
            fn from(err: anyhow::Error) -> Self {
                Self::Generic {
                    message: crate::error::AnyhowErrorExt::to_generic_message(err),
                }
            }
        }

        impl #generics #enum_name #generics {
            /// Convert an `anyhow::Result` to a `Result` with this error type.
            ///
            /// # Errors
            /// Returns the `Generic` variant when `result` is an error.
            pub fn from_anyhow_result<T>(result: anyhow::Result<T>) -> Result<T, Self> {
                result.map_err(Self::from)
            }

            /// Convert an `anyhow::Result` to a `Result` with this error type, prefixing the message.
            ///
            /// # Errors
            /// Returns the `Generic` variant when `result` is an error.
            pub fn from_anyhow_result_with_prefix<T>(
                result: anyhow::Result<T>,
                prefix: &str,
            ) -> Result<T, Self> {
                result.map_err(|err| Self::Generic {
                    message: crate::error::AnyhowErrorExt::to_generic_message_with_prefix(
                        err, prefix,
                    ),
                })
            }
        }
    }
    .into()
}

/// Injects a logging context into every public method of an impl block.
///
/// `const fn`s are left untouched.
///
/// Each `pub fn` gets `let _govboot_logger_ctx = crate::primitives::logger::LogContext::new("TypeName");`
/// as its first statement, so log lines emitted inside it are prefixed with `[govboot][TypeName]`.
///
/// # Usage
///
/// ```rust,ignore
/// #[log_context]
/// impl Deployer {
///     pub async fn run(&self) -> Result<DeploymentReport, DeployError> {
///         info!("starting"); // "[govboot][Deployer] starting"
///         # todo!()
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn log_context(args: TokenStream, input: TokenStream) -> TokenStream {
    let input_impl = parse_macro_input!(input as ItemImpl);
    let args = proc_macro2::TokenStream::from(args);

    let type_name = if args.is_empty() {
        impl_type_name(&input_impl)
    } else {
        match syn::parse2::<syn::LitStr>(args) {
            Ok(name) => name.value(),
            Err(err) => return err.to_compile_error().into(),
        }
    };

    let items = input_impl
        .items
        .iter()
        .map(|item| match item {
            ImplItem::Fn(method) if wants_context(method) => {
                let mut method = method.clone();
                inject_logging_context(&mut method, &type_name);
                ImplItem::Fn(method)
            }
            other => other.clone(),
        })
        .collect();

    let new_impl = ItemImpl {
        items,
        ..input_impl
    };

    quote! { #new_impl }.into()
}

/// Extracts the last path segment of the impl's self type, ignoring generics.
fn impl_type_name(input_impl: &ItemImpl) -> String {
    match &*input_impl.self_ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map_or_else(|| "Unknown".to_string(), |segment| segment.ident.to_string()),
        _ => "Unknown".to_string(),
    }
}

fn wants_context(method: &ImplItemFn) -> bool {
    matches!(method.vis, Visibility::Public(_)) && method.sig.constness.is_none()
}

fn inject_logging_context(method: &mut ImplItemFn, type_name: &str) {
    let context_stmt: Stmt = syn::parse_quote! {
        let _govboot_logger_ctx = crate::primitives::logger::LogContext::new(#type_name);
    };
    method.block.stmts.insert(0, context_stmt);
}
