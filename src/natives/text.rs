//! Text manipulation natives.

use super::{int_arg, text_arg};
use crate::error::{codes, StepsError};
use crate::registry::NativeRegistry;
use crate::value::Value;
use steps_macros::native;

#[native(name = "lowercase", params(text))]
pub fn native_lowercase(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("lowercase", args, 0, "text")?;
    Ok(Value::Text(text.to_lowercase()))
}

#[native(name = "uppercase", params(text))]
pub fn native_uppercase(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("uppercase", args, 0, "text")?;
    Ok(Value::Text(text.to_uppercase()))
}

#[native(name = "trim", params(text))]
pub fn native_trim(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("trim", args, 0, "text")?;
    Ok(Value::Text(text.trim().to_string()))
}

/// Half-open substring by character position.
#[native(name = "slice", params(text, start, end))]
pub fn native_slice(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("slice", args, 0, "text")?;
    let start = int_arg("slice", args, 1, "start")?;
    let end = int_arg("slice", args, 2, "end")?;

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    if start < 0 || end < start || end > len {
        return Err(StepsError::runtime(
            codes::NATIVE_ARG,
            format!(
                "`slice` range {}..{} does not fit text of length {}",
                start, end, len
            ),
        )
        .with_hint("0 <= start <= end <= length of the text"));
    }
    let result: String = chars[start as usize..end as usize].iter().collect();
    Ok(Value::Text(result))
}

/// 0-based position of the first occurrence, or -1.
#[native(name = "index_of", params(text, search))]
pub fn native_index_of(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("index_of", args, 0, "text")?;
    let search = text_arg("index_of", args, 1, "search")?;
    match text.find(search) {
        Some(byte_pos) => {
            let char_pos = text[..byte_pos].chars().count();
            Ok(Value::Number(char_pos as f64))
        }
        None => Ok(Value::Number(-1.0)),
    }
}

#[native(name = "replace", params(text, old, new))]
pub fn native_replace(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("replace", args, 0, "text")?;
    let old = text_arg("replace", args, 1, "old")?;
    let new = text_arg("replace", args, 2, "new")?;
    if old.is_empty() {
        return Err(StepsError::runtime(
            codes::NATIVE_ARG,
            "`replace` cannot replace empty text",
        ));
    }
    Ok(Value::Text(text.replace(old, new)))
}

/// Explode text into a list of one-character texts.
#[native(name = "characters", params(text))]
pub fn native_characters(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("characters", args, 0, "text")?;
    let items = text
        .chars()
        .map(|c| Value::Text(c.to_string()))
        .collect::<Vec<_>>();
    Ok(Value::list(items))
}

pub fn register(registry: &mut NativeRegistry) {
    register_native_lowercase(registry);
    register_native_uppercase(registry);
    register_native_trim(registry);
    register_native_slice(registry);
    register_native_index_of(registry);
    register_native_replace(registry);
    register_native_characters(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_case_changes() {
        assert_eq!(native_lowercase(&[text("AbC")]).unwrap().to_text(), "abc");
        assert_eq!(native_uppercase(&[text("AbC")]).unwrap().to_text(), "ABC");
    }

    #[test]
    fn test_trim() {
        assert_eq!(native_trim(&[text("  hi  ")]).unwrap().to_text(), "hi");
    }

    #[test]
    fn test_slice_half_open() {
        assert_eq!(
            native_slice(&[text("hello"), Value::Number(1.0), Value::Number(3.0)])
                .unwrap()
                .to_text(),
            "el"
        );
        assert_eq!(
            native_slice(&[text("hello"), Value::Number(0.0), Value::Number(0.0)])
                .unwrap()
                .to_text(),
            ""
        );
    }

    #[test]
    fn test_slice_out_of_range() {
        assert!(
            native_slice(&[text("hi"), Value::Number(0.0), Value::Number(5.0)]).is_err()
        );
    }

    #[test]
    fn test_index_of() {
        assert_eq!(
            native_index_of(&[text("banana"), text("na")]).unwrap().to_text(),
            "2"
        );
        assert_eq!(
            native_index_of(&[text("banana"), text("xy")]).unwrap().to_text(),
            "-1"
        );
    }

    #[test]
    fn test_replace_all_occurrences() {
        assert_eq!(
            native_replace(&[text("a-b-c"), text("-"), text("+")])
                .unwrap()
                .to_text(),
            "a+b+c"
        );
    }

    #[test]
    fn test_characters() {
        let result = native_characters(&[text("ab")]).unwrap();
        assert_eq!(result.to_text(), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_wrong_kind_has_hint() {
        let err = native_lowercase(&[Value::Number(3.0)]).unwrap_err();
        assert_eq!(err.code, codes::WRONG_OPERAND);
        assert!(err.hint.is_some());
    }
}
