// ABOUTME: Scope stack, call stack, iteration counter, and the console seam

use crate::ast::Declaration;
use crate::config::Limits;
use crate::error::{codes, StepsError};
use crate::location::SourceLocation;
use crate::value::{TypeTag, Value};
use std::collections::HashMap;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// The I/O seam. The core never touches process streams directly; embedding
/// hosts (CLI, IDE, tests) inject an implementation of these three handlers.
pub trait Console {
    fn read_line(&mut self) -> io::Result<String>;
    fn write_line(&mut self, s: &str);
    fn write_no_newline(&mut self, s: &str);
}

/// Console wired to the process stdin/stdout, used by the CLI.
#[derive(Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of input",
            ));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    fn write_line(&mut self, s: &str) {
        println!("{}", s);
    }

    fn write_no_newline(&mut self, s: &str) {
        print!("{}", s);
        let _ = io::stdout().flush();
    }
}

/// Scripted console for tests and embedding: input lines are queued up
/// front, output lines are captured in order.
#[derive(Default)]
pub struct BufferConsole {
    inputs: VecDeque<String>,
    lines: Vec<String>,
    pending: String,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BufferConsole {
            inputs: inputs.into_iter().map(Into::into).collect(),
            lines: Vec::new(),
            pending: String::new(),
        }
    }

    /// Output lines written so far; a trailing `indicate` without a final
    /// newline shows up as a last partial line.
    pub fn output(&self) -> Vec<String> {
        let mut lines = self.lines.clone();
        if !self.pending.is_empty() {
            lines.push(self.pending.clone());
        }
        lines
    }
}

impl Console for BufferConsole {
    fn read_line(&mut self) -> io::Result<String> {
        self.inputs.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted input left")
        })
    }

    fn write_line(&mut self, s: &str) {
        let mut line = std::mem::take(&mut self.pending);
        line.push_str(s);
        self.lines.push(line);
    }

    fn write_no_newline(&mut self, s: &str) {
        self.pending.push_str(s);
    }
}

/// One frame of name bindings plus the fixed-type tags recorded by
/// `declare ... fixed`.
#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Value>,
    fixed_types: HashMap<String, TypeTag>,
}

/// Opaque handle to a suspended scope stack, returned by `swap_scopes`.
pub struct SavedScopes(Vec<Scope>);

/// One call-stack frame, used for recursion bounding and diagnostics. A
/// riser runs under its parent step's identity so sibling risers stay
/// callable.
#[derive(Debug, Clone)]
pub struct Frame {
    pub step_name: String,
    pub riser_name: Option<String>,
    pub call_site: SourceLocation,
}

/// Execution state threaded through the interpreter: the scope stack
/// (innermost last), the call stack, the global iteration counter, and the
/// injected console.
pub struct Environment<'io> {
    scopes: Vec<Scope>,
    call_stack: Vec<Frame>,
    recursion_limit: usize,
    iteration_count: u64,
    iteration_limit: u64,
    console: &'io mut dyn Console,
}

impl<'io> Environment<'io> {
    pub fn new(console: &'io mut dyn Console, limits: Limits) -> Self {
        Environment {
            scopes: vec![Scope::default()],
            call_stack: Vec::new(),
            recursion_limit: limits.recursion,
            iteration_count: 0,
            iteration_limit: limits.iterations,
            console,
        }
    }

    // ===== Scope stack =====

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Swap in an isolated scope stack for a step call; the caller keeps the
    /// returned handle and restores it afterwards. Step bodies see only
    /// their parameters and their own bindings.
    pub fn swap_scopes(&mut self) -> SavedScopes {
        SavedScopes(std::mem::replace(&mut self.scopes, vec![Scope::default()]))
    }

    pub fn restore_scopes(&mut self, saved: SavedScopes) {
        self.scopes = saved.0;
    }

    /// Bind straight into the innermost scope, shadowing outer bindings.
    /// Used for parameters, loop variables, and `problem_message`.
    pub fn define(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.to_string(), value);
        }
    }

    /// Apply a `declare:` line: binds nothing-initialised storage in the
    /// innermost scope and records the fixed tag when present.
    pub fn declare(&mut self, decl: &Declaration) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(decl.name.clone(), Value::Nothing);
            if decl.fixed {
                scope.fixed_types.insert(decl.name.clone(), decl.type_tag);
            }
        }
    }

    pub fn get(&self, name: &str, location: &SourceLocation) -> Result<Value, StepsError> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.bindings.get(name) {
                return Ok(value.clone());
            }
        }
        Err(StepsError::runtime(
            codes::UNDEFINED_NAME,
            format!("`{}` has no value here", name),
        )
        .with_hint(format!("did you `set {} to ...` first?", name))
        .at(location.clone()))
    }

    /// Assign in the nearest enclosing scope that already has the name, else
    /// create it in the innermost scope. Fixed bindings reject values of a
    /// different kind.
    pub fn set(
        &mut self,
        name: &str,
        value: Value,
        location: &SourceLocation,
    ) -> Result<(), StepsError> {
        for scope in self.scopes.iter_mut().rev() {
            if scope.bindings.contains_key(name) {
                if let Some(tag) = scope.fixed_types.get(name) {
                    let incoming = value.type_tag();
                    if incoming != *tag {
                        return Err(StepsError::type_error(
                            codes::FIXED_VIOLATION,
                            format!(
                                "`{}` is fixed as {} and cannot hold {}",
                                name, tag, incoming
                            ),
                        )
                        .with_hint(format!("convert the value with `as {}` first", tag))
                        .at(location.clone()));
                    }
                }
                scope.bindings.insert(name.to_string(), value);
                return Ok(());
            }
        }
        self.define(name, value);
        Ok(())
    }

    // ===== Call stack =====

    pub fn push_frame(&mut self, frame: Frame) -> Result<(), StepsError> {
        if self.call_stack.len() >= self.recursion_limit {
            let name = frame.step_name.clone();
            return Err(StepsError::new(
                crate::error::ErrorKind::RecursionLimit,
                codes::RECURSION_LIMIT,
                format!(
                    "`{}` exceeded the call depth limit of {}",
                    name, self.recursion_limit
                ),
            )
            .with_hint("a step is probably calling itself without a stopping condition")
            .at(frame.call_site.clone()));
        }
        self.call_stack.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) {
        self.call_stack.pop();
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.call_stack.last()
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    // ===== Iteration counter =====

    /// Count one loop iteration, shared by every loop in the program.
    pub fn tick(&mut self, location: &SourceLocation) -> Result<(), StepsError> {
        self.iteration_count += 1;
        if self.iteration_count > self.iteration_limit {
            return Err(StepsError::new(
                crate::error::ErrorKind::IterationLimit,
                codes::ITERATION_LIMIT,
                format!(
                    "the program exceeded the iteration limit of {}",
                    self.iteration_limit
                ),
            )
            .with_hint("a `repeat while` condition may never become false")
            .at(location.clone()));
        }
        Ok(())
    }

    pub fn set_iteration_limit(&mut self, limit: u64) {
        self.iteration_limit = limit;
    }

    // ===== Console =====

    pub fn read_line(&mut self) -> Result<String, StepsError> {
        self.console
            .read_line()
            .map_err(|e| StepsError::internal(format!("input is unavailable: {}", e)))
    }

    pub fn write_line(&mut self, s: &str) {
        self.console.write_line(s);
    }

    pub fn write_no_newline(&mut self, s: &str) {
        self.console.write_no_newline(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::synthetic()
    }

    fn env(console: &mut BufferConsole) -> Environment<'_> {
        Environment::new(console, Limits::default())
    }

    #[test]
    fn test_get_unset_is_runtime_error() {
        let mut console = BufferConsole::new();
        let env = env(&mut console);
        let err = env.get("missing", &loc()).unwrap_err();
        assert_eq!(err.code, codes::UNDEFINED_NAME);
        assert!(err.hint.as_deref().unwrap_or("").contains("set missing"));
    }

    #[test]
    fn test_set_assigns_in_nearest_enclosing_scope() {
        let mut console = BufferConsole::new();
        let mut env = env(&mut console);
        env.set("x", Value::Number(1.0), &loc()).unwrap();
        env.push_scope();
        env.set("x", Value::Number(2.0), &loc()).unwrap();
        env.pop_scope();
        assert_eq!(env.get("x", &loc()).unwrap().to_text(), "2");
    }

    #[test]
    fn test_define_shadows() {
        let mut console = BufferConsole::new();
        let mut env = env(&mut console);
        env.set("x", Value::Number(1.0), &loc()).unwrap();
        env.push_scope();
        env.define("x", Value::Number(9.0));
        assert_eq!(env.get("x", &loc()).unwrap().to_text(), "9");
        env.pop_scope();
        assert_eq!(env.get("x", &loc()).unwrap().to_text(), "1");
    }

    #[test]
    fn test_fixed_binding_rejects_other_kind() {
        let mut console = BufferConsole::new();
        let mut env = env(&mut console);
        env.declare(&Declaration {
            name: "score".to_string(),
            type_tag: TypeTag::Number,
            fixed: true,
            location: loc(),
        });
        env.set("score", Value::Number(10.0), &loc()).unwrap();
        let err = env
            .set("score", Value::Text("high".to_string()), &loc())
            .unwrap_err();
        assert_eq!(err.code, codes::FIXED_VIOLATION);
        assert!(err.message.contains("score"));
        assert!(err.message.contains("number"));
        assert!(err.message.contains("text"));
    }

    #[test]
    fn test_recursion_ceiling() {
        let mut console = BufferConsole::new();
        let mut env = Environment::new(
            &mut console,
            Limits {
                recursion: 3,
                ..Limits::default()
            },
        );
        for _ in 0..3 {
            env.push_frame(Frame {
                step_name: "loop_forever".to_string(),
                riser_name: None,
                call_site: loc(),
            })
            .unwrap();
        }
        let err = env
            .push_frame(Frame {
                step_name: "loop_forever".to_string(),
                riser_name: None,
                call_site: loc(),
            })
            .unwrap_err();
        assert_eq!(err.code, codes::RECURSION_LIMIT);
        assert!(err.message.contains("loop_forever"));
        assert_eq!(env.call_depth(), 3);
    }

    #[test]
    fn test_iteration_ceiling() {
        let mut console = BufferConsole::new();
        let mut env = Environment::new(
            &mut console,
            Limits {
                iterations: 5,
                ..Limits::default()
            },
        );
        for _ in 0..5 {
            env.tick(&loc()).unwrap();
        }
        let err = env.tick(&loc()).unwrap_err();
        assert_eq!(err.code, codes::ITERATION_LIMIT);
    }

    #[test]
    fn test_buffer_console_captures_order() {
        let mut console = BufferConsole::with_inputs(["100"]);
        console.write_no_newline("Tip: ");
        console.write_line("$15.0");
        console.write_line("done");
        assert_eq!(console.read_line().unwrap(), "100");
        assert!(console.read_line().is_err());
        assert_eq!(console.output(), vec!["Tip: $15.0", "done"]);
    }

    #[test]
    fn test_scope_swap_isolates() {
        let mut console = BufferConsole::new();
        let mut env = env(&mut console);
        env.set("caller_var", Value::Number(1.0), &loc()).unwrap();
        let saved = env.swap_scopes();
        assert!(env.get("caller_var", &loc()).is_err());
        env.restore_scopes(saved);
        assert!(env.get("caller_var", &loc()).is_ok());
    }
}
