// ABOUTME: Step and native-function registries populated by the loader

use crate::ast::Step;
use crate::error::{codes, StepsError};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub type NativeFn = fn(&[Value]) -> Result<Value, StepsError>;

/// One registered native function: its Steps name, the parameter names the
/// dispatcher checks arity against, and the implementation.
#[derive(Clone, Copy)]
pub struct NativeDef {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub func: NativeFn,
}

#[derive(Default)]
pub struct NativeRegistry {
    entries: HashMap<&'static str, NativeDef>,
}

impl NativeRegistry {
    pub fn register(&mut self, def: NativeDef) {
        self.entries.insert(def.name, def);
    }

    pub fn get(&self, name: &str) -> Option<&NativeDef> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flat, name-keyed registries. Fully populated before execution begins, so
/// a `call` that parsed can never fail to resolve at runtime.
#[derive(Default)]
pub struct Registry {
    steps: HashMap<String, Rc<Step>>,
    stdlib_names: HashSet<String>,
    pub natives: NativeRegistry,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bundled stdlib step. Project steps with the same name
    /// shadow these.
    pub fn register_stdlib_step(&mut self, step: Rc<Step>) {
        self.stdlib_names.insert(step.name.clone());
        self.steps.insert(step.name.clone(), step);
    }

    /// Register a project step. Overwriting a stdlib entry is shadowing;
    /// overwriting another project step is a structure error, and colliding
    /// with a native function name is too.
    pub fn register_step(&mut self, step: Rc<Step>) -> Result<(), StepsError> {
        if self.natives.contains(&step.name) {
            return Err(StepsError::structure(
                codes::NATIVE_COLLISION,
                format!(
                    "step `{}` has the same name as a native function",
                    step.name
                ),
            )
            .at(step.location.clone())
            .with_hint("pick a different step name"));
        }
        if let Some(existing) = self.steps.get(&step.name) {
            if !self.stdlib_names.contains(&step.name) {
                return Err(StepsError::structure(
                    codes::DUPLICATE_STEP,
                    format!(
                        "step `{}` is declared on floor `{}` and again on floor `{}`",
                        step.name, existing.floor, step.floor
                    ),
                )
                .at(step.location.clone())
                .with_hint("step names must be unique across all floors"));
            }
            self.stdlib_names.remove(&step.name);
        }
        self.steps.insert(step.name.clone(), step);
        Ok(())
    }

    pub fn lookup_step(&self, name: &str) -> Option<&Rc<Step>> {
        self.steps.get(name)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Whether a step came from the bundled stdlib (and was not shadowed).
    pub fn is_stdlib(&self, name: &str) -> bool {
        self.stdlib_names.contains(name)
    }

    pub fn all_steps(&self) -> impl Iterator<Item = &Rc<Step>> {
        self.steps.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceLocation;

    fn make_step(name: &str, floor: &str) -> Rc<Step> {
        Rc::new(Step {
            name: name.to_string(),
            floor: floor.to_string(),
            params: Vec::new(),
            returns: None,
            declares: Vec::new(),
            risers: Vec::new(),
            body: Vec::new(),
            location: SourceLocation::synthetic(),
        })
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let mut registry = Registry::new();
        registry.register_step(make_step("mix", "kitchen")).unwrap();
        let err = registry
            .register_step(make_step("mix", "garage"))
            .unwrap_err();
        assert_eq!(err.code, codes::DUPLICATE_STEP);
    }

    #[test]
    fn test_project_step_shadows_stdlib() {
        let mut registry = Registry::new();
        registry.register_stdlib_step(make_step("maximum", "toolbox"));
        registry
            .register_step(make_step("maximum", "mymath"))
            .unwrap();
        assert_eq!(registry.lookup_step("maximum").unwrap().floor, "mymath");
        // Shadowing consumed the stdlib slot: a second project `maximum`
        // is now a duplicate.
        let err = registry
            .register_step(make_step("maximum", "other"))
            .unwrap_err();
        assert_eq!(err.code, codes::DUPLICATE_STEP);
    }

    #[test]
    fn test_native_collision() {
        let mut registry = Registry::new();
        fn dummy(_: &[Value]) -> Result<Value, StepsError> {
            Ok(Value::Nothing)
        }
        registry.natives.register(NativeDef {
            name: "lowercase",
            params: &["text"],
            func: dummy,
        });
        let err = registry
            .register_step(make_step("lowercase", "kitchen"))
            .unwrap_err();
        assert_eq!(err.code, codes::NATIVE_COLLISION);
    }
}
