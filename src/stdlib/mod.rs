// ABOUTME: Bundled standard library, embedded at build time and loaded first

use crate::error::StepsError;
use crate::parser;
use crate::registry::Registry;
use std::rc::Rc;

/// The bundled floor and its steps, written in Steps itself. Loaded before
/// project floors so same-named project steps shadow them.
const TOOLBOX: &[(&str, &str)] = &[
    (
        "absolute_value",
        include_str!("steps/toolbox/absolute_value.step"),
    ),
    ("maximum", include_str!("steps/toolbox/maximum.step")),
    ("minimum", include_str!("steps/toolbox/minimum.step")),
    (
        "round_number",
        include_str!("steps/toolbox/round_number.step"),
    ),
    ("sum_of", include_str!("steps/toolbox/sum_of.step")),
    ("join_with", include_str!("steps/toolbox/join_with.step")),
    (
        "repeat_text",
        include_str!("steps/toolbox/repeat_text.step"),
    ),
];

/// Parse and register every bundled step. A stdlib source that fails to
/// parse is a packaging bug, reported as an internal error.
pub fn load_into(registry: &mut Registry) -> Vec<StepsError> {
    let mut problems = Vec::new();
    for (name, source) in TOOLBOX {
        let file = format!("<stdlib>/toolbox/{}.step", name);
        let (step, errors) = parser::parse_step(source, &file);
        if !errors.is_empty() {
            log::warn!("stdlib step `{}` failed to parse", name);
            problems.push(StepsError::internal(format!(
                "bundled step `{}` does not parse: {}",
                name, errors[0]
            )));
            continue;
        }
        match step {
            Some(step) => registry.register_stdlib_step(Rc::new(step)),
            None => problems.push(StepsError::internal(format!(
                "bundled step `{}` produced no definition",
                name
            ))),
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdlib_parses_clean() {
        let mut registry = Registry::new();
        let problems = load_into(&mut registry);
        assert!(problems.is_empty(), "{:?}", problems);
        assert_eq!(registry.step_count(), TOOLBOX.len());
        for (name, _) in TOOLBOX {
            let step = registry.lookup_step(name).unwrap();
            assert_eq!(step.floor, "toolbox");
        }
    }
}
