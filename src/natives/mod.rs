//! # Native Functions
//!
//! Host-provided routines callable through the ordinary `call` statement,
//! dispatched before user steps. Organized into four categories:
//!
//! - **[random]**: random_int, random_choice
//! - **[text]**: lowercase, uppercase, trim, slice, index_of, replace, characters
//! - **[files]**: read_file, write_file, append_file, file_exists, read_csv, write_csv
//! - **[drawing]**: box, line, banner, center_text, pad_text, progress_bar
//!
//! Each function carries the `#[native]` attribute, which generates its
//! registration hook; the category modules sum those hooks in a `register`
//! function called from `register_natives`.

use crate::error::{codes, StepsError};
use crate::registry::NativeRegistry;
use crate::sandbox::Sandbox;
use crate::value::Value;
use std::cell::RefCell;

// ============================================================================
// Sandbox Storage for File Natives
// ============================================================================

thread_local! {
    static SANDBOX: RefCell<Option<Sandbox>> = const { RefCell::new(None) };
}

/// Install the sandbox the file natives operate in. Called once per run,
/// before execution starts.
pub fn set_sandbox_storage(sandbox: Sandbox) {
    SANDBOX.with(|s| {
        *s.borrow_mut() = Some(sandbox);
    });
}

/// Run a closure against the installed sandbox.
pub(crate) fn with_sandbox<T>(
    f: impl FnOnce(&Sandbox) -> Result<T, StepsError>,
) -> Result<T, StepsError> {
    SANDBOX.with(|s| match s.borrow().as_ref() {
        Some(sandbox) => f(sandbox),
        None => Err(StepsError::internal("file sandbox is not initialized")),
    })
}

// ============================================================================
// Argument helpers shared by the categories
// ============================================================================

pub(crate) fn text_arg<'a>(
    function: &str,
    args: &'a [Value],
    pos: usize,
    param: &str,
) -> Result<&'a str, StepsError> {
    match &args[pos] {
        Value::Text(s) => Ok(s),
        other => Err(StepsError::type_error(
            codes::WRONG_OPERAND,
            format!(
                "`{}` expected text for `{}`, got {}",
                function,
                param,
                other.type_name()
            ),
        )
        .with_hint("convert with `as text`")),
    }
}

pub(crate) fn number_arg(
    function: &str,
    args: &[Value],
    pos: usize,
    param: &str,
) -> Result<f64, StepsError> {
    match &args[pos] {
        Value::Number(n) => Ok(*n),
        other => Err(StepsError::type_error(
            codes::WRONG_OPERAND,
            format!(
                "`{}` expected a number for `{}`, got {}",
                function,
                param,
                other.type_name()
            ),
        )
        .with_hint("convert with `as number`")),
    }
}

pub(crate) fn int_arg(
    function: &str,
    args: &[Value],
    pos: usize,
    param: &str,
) -> Result<i64, StepsError> {
    let n = number_arg(function, args, pos, param)?;
    if n.fract() != 0.0 {
        return Err(StepsError::type_error(
            codes::NON_INTEGER_INDEX,
            format!("`{}` needs a whole number for `{}`, got {}", function, param, n),
        ));
    }
    Ok(n as i64)
}

pub(crate) fn list_arg(
    function: &str,
    args: &[Value],
    pos: usize,
    param: &str,
) -> Result<Vec<Value>, StepsError> {
    match &args[pos] {
        Value::List(items) => Ok(items.borrow().clone()),
        other => Err(StepsError::type_error(
            codes::WRONG_OPERAND,
            format!(
                "`{}` expected a list for `{}`, got {}",
                function,
                param,
                other.type_name()
            ),
        )),
    }
}

// ============================================================================
// Sub-modules
// ============================================================================

pub mod drawing;
pub mod files;
pub mod random;
pub mod text;

// ============================================================================
// Main Registration Function
// ============================================================================

/// Register every native function in the registry.
pub fn register_natives(registry: &mut NativeRegistry) {
    random::register(registry);
    text::register(registry);
    files::register(registry);
    drawing::register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_categories_registered() {
        let mut registry = NativeRegistry::default();
        register_natives(&mut registry);
        for name in [
            "random_int",
            "random_choice",
            "lowercase",
            "uppercase",
            "trim",
            "slice",
            "index_of",
            "replace",
            "characters",
            "read_file",
            "write_file",
            "append_file",
            "file_exists",
            "read_csv",
            "write_csv",
            "box",
            "line",
            "banner",
            "center_text",
            "pad_text",
            "progress_bar",
        ] {
            assert!(registry.contains(name), "missing native `{}`", name);
        }
    }
}
