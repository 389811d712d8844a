//! Procedural macros for steps-lang native functions
//!
//! Provides the `#[native]` attribute macro for defining native functions
//! callable from Steps code. The macro emits the function unchanged plus a
//! `register_*` hook that pushes a `NativeDef` (name, parameter names,
//! function pointer) into the native registry.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Parse native attribute arguments: name = "...", params(a, b, c)
fn parse_native_args(attr_stream: TokenStream) -> (String, Vec<String>) {
    let attr_str = attr_stream.to_string();

    let mut name = String::new();
    let mut params = Vec::new();

    // Parse name
    if let Some(start) = attr_str.find("name = \"") {
        let rest = &attr_str[start + 8..];
        if let Some(end) = rest.find('"') {
            name = rest[..end].to_string();
        }
    }

    // Parse parameter names
    if let Some(start) = attr_str.find("params") {
        let rest = &attr_str[start..];
        if let Some(paren_start) = rest.find('(') {
            if let Some(paren_end) = rest.find(')') {
                let params_str = &rest[paren_start + 1..paren_end];
                params = params_str
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }
    }

    (name, params)
}

/// Attribute macro for defining Steps native functions
///
/// # Attribute Arguments
///
/// - `name`: The Steps name for this native (e.g., "random_int")
/// - `params`: Parameter names, in order; their count is the arity the
///   dispatcher enforces before the function is invoked
///
/// # Example
///
/// ```ignore
/// #[native(name = "lowercase", params(text))]
/// pub fn native_lowercase(args: &[Value]) -> Result<Value, StepsError> {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn native(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    let (steps_name, params) = parse_native_args(attr);

    let fn_name = func.sig.ident.clone();
    let fn_ident_str = fn_name.to_string();

    // Use provided name or fall back to function name
    let name_to_use = if !steps_name.is_empty() {
        steps_name
    } else {
        fn_ident_str.clone()
    };

    let register_fn_name = quote::format_ident!("register_{}", fn_name);
    let param_strs = params;

    let expanded = quote! {
        #func

        /// Register this native function in the registry
        #[allow(dead_code)]
        pub fn #register_fn_name(registry: &mut crate::registry::NativeRegistry) {
            registry.register(crate::registry::NativeDef {
                name: #name_to_use,
                params: &[#(#param_strs),*],
                func: #fn_name,
            });
        }
    };

    TokenStream::from(expanded)
}
