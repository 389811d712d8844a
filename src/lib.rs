// ABOUTME: Library root: module exports and the embedding façade

pub mod ast;
pub mod config;
pub mod diagram;
pub mod env;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod loader;
pub mod location;
pub mod natives;
pub mod parser;
pub mod registry;
pub mod sandbox;
pub mod stdlib;
pub mod token;
pub mod value;

use crate::config::{FsConfig, Limits};
use crate::env::Console;
use crate::error::StepsError;

pub use loader::{load_project, LoadResult, Program};
pub use parser::parse_fragment;

/// Execute a loaded program with injected I/O. This is the whole contract
/// embedding hosts need: a project root goes into `load_project`, the result
/// comes here with console handlers, and an exit code comes back - the
/// ordered output trace lives in whatever the console captured.
pub fn execute(
    program: &Program,
    console: &mut dyn Console,
    limits: Limits,
) -> Result<i32, StepsError> {
    let sandbox = sandbox::Sandbox::new(FsConfig {
        root: program.root.clone(),
        ..Default::default()
    })?;
    natives::set_sandbox_storage(sandbox);
    interp::run_building(program, console, limits)
}
