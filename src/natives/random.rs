//! Randomness natives: uniform integers and uniform list choice.

use super::{int_arg, list_arg};
use crate::error::{codes, StepsError};
use crate::registry::NativeRegistry;
use crate::value::Value;
use rand::Rng;
use steps_macros::native;

#[native(name = "random_int", params(min, max))]
pub fn native_random_int(args: &[Value]) -> Result<Value, StepsError> {
    let min = int_arg("random_int", args, 0, "min")?;
    let max = int_arg("random_int", args, 1, "max")?;
    if min > max {
        return Err(StepsError::runtime(
            codes::NATIVE_ARG,
            format!("`random_int` needs min <= max, got {} and {}", min, max),
        ));
    }
    let picked = rand::thread_rng().gen_range(min..=max);
    Ok(Value::Number(picked as f64))
}

#[native(name = "random_choice", params(choices))]
pub fn native_random_choice(args: &[Value]) -> Result<Value, StepsError> {
    let items = list_arg("random_choice", args, 0, "choices")?;
    if items.is_empty() {
        return Err(StepsError::runtime(
            codes::NATIVE_ARG,
            "`random_choice` cannot pick from an empty list",
        )
        .with_hint("add at least one element first"));
    }
    let index = rand::thread_rng().gen_range(0..items.len());
    Ok(items[index].clone())
}

pub fn register(registry: &mut NativeRegistry) {
    register_native_random_int(registry);
    register_native_random_choice(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_int_stays_in_range() {
        for _ in 0..50 {
            let result =
                native_random_int(&[Value::Number(1.0), Value::Number(6.0)]).unwrap();
            match result {
                Value::Number(n) => assert!((1.0..=6.0).contains(&n) && n.fract() == 0.0),
                other => panic!("expected number, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_random_int_single_point() {
        let result = native_random_int(&[Value::Number(3.0), Value::Number(3.0)]).unwrap();
        assert_eq!(result.to_text(), "3");
    }

    #[test]
    fn test_random_int_rejects_inverted_range() {
        assert!(native_random_int(&[Value::Number(6.0), Value::Number(1.0)]).is_err());
    }

    #[test]
    fn test_random_int_rejects_fractions() {
        let err =
            native_random_int(&[Value::Number(1.5), Value::Number(6.0)]).unwrap_err();
        assert_eq!(err.code, codes::NON_INTEGER_INDEX);
    }

    #[test]
    fn test_random_choice() {
        let list = Value::list(vec![Value::Text("only".into())]);
        assert_eq!(native_random_choice(&[list]).unwrap().to_text(), "only");
    }

    #[test]
    fn test_random_choice_empty() {
        let err = native_random_choice(&[Value::list(vec![])]).unwrap_err();
        assert_eq!(err.code, codes::NATIVE_ARG);
    }
}
