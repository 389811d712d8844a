// ABOUTME: The steps CLI: run, check, run-step, repl, and diagram

mod ast;
mod config;
mod diagram;
mod env;
mod error;
mod interp;
mod lexer;
mod loader;
mod location;
mod natives;
mod parser;
mod registry;
mod sandbox;
mod stdlib;
mod token;
mod value;

use clap::{Parser, Subcommand};
use config::{FsConfig, Limits};
use env::{Console, StdConsole};
use error::StepsError;
use interp::{CallOutcome, Interpreter};
use loader::load_project;
use location::SourceLocation;
use log::LevelFilter;
use registry::Registry;
use sandbox::Sandbox;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use value::Value;

/// The Steps language: buildings, floors, and steps
#[derive(Parser, Debug)]
#[command(name = "steps")]
#[command(version = config::VERSION)]
#[command(about = "Interpreter for the Steps educational language")]
struct Cli {
    /// Verbose logging (loader and interpreter internals)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a project and execute its building
    Run {
        /// Project directory (contains <name>.building)
        project: PathBuf,

        /// Call-stack ceiling
        #[arg(long, default_value_t = config::DEFAULT_RECURSION_LIMIT)]
        recursion_limit: usize,

        /// Total loop-iteration ceiling
        #[arg(long, default_value_t = config::DEFAULT_ITERATION_LIMIT)]
        iteration_limit: u64,
    },
    /// Load and validate a project without executing it
    Check {
        project: PathBuf,

        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse one .step file and execute it with the given arguments
    RunStep {
        /// Path to a .step file
        file: PathBuf,

        /// Arguments for the step, in order (numbers and booleans are
        /// recognized, everything else is text)
        #[arg(long = "args", value_name = "VALUE", num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Interactive shell over the fragment parser
    Repl,
    /// Print an ASCII view of the project architecture
    Diagram { project: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = simple_logger::SimpleLogger::new().with_level(level).init();

    let code = match cli.command {
        Command::Run {
            project,
            recursion_limit,
            iteration_limit,
        } => run(
            &project,
            Limits {
                recursion: recursion_limit,
                iterations: iteration_limit,
            },
        ),
        Command::Check { project, json } => check(&project, json),
        Command::RunStep { file, args } => run_step(&file, &args),
        Command::Repl => repl(),
        Command::Diagram { project } => show_diagram(&project),
    };
    ExitCode::from(code)
}

fn run(project: &Path, limits: Limits) -> u8 {
    let result = load_project(project);
    if !result.is_clean() {
        report_errors(project, &result.errors);
        return 1;
    }
    let program = match result.program {
        Some(program) => program,
        None => return 1,
    };

    let mut console = StdConsole;
    match execute_program(&program, &mut console, limits) {
        Ok(_) => 0,
        Err(e) => {
            report_errors(project, &[e]);
            1
        }
    }
}

fn execute_program(
    program: &loader::Program,
    console: &mut dyn Console,
    limits: Limits,
) -> Result<i32, StepsError> {
    let sandbox = Sandbox::new(FsConfig {
        root: program.root.clone(),
        ..Default::default()
    })?;
    natives::set_sandbox_storage(sandbox);
    interp::run_building(program, console, limits)
}

fn check(project: &Path, json: bool) -> u8 {
    let result = load_project(project);
    if json {
        let diagnostics: Vec<_> = result.errors.iter().map(|e| e.to_diagnostic()).collect();
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => {
                eprintln!("cannot render diagnostics: {}", e);
                return 1;
            }
        }
    } else if result.is_clean() {
        println!("ok");
    } else {
        report_errors(project, &result.errors);
    }
    u8::from(!result.is_clean())
}

fn run_step(file: &Path, raw_args: &[String]) -> u8 {
    let source = match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("cannot read {}: {}", file.display(), e);
            return 1;
        }
    };
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let (step, errors) = parser::parse_step(&source, &file_name);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}", error.pretty(Some(&source)));
        }
        return 1;
    }
    let step = match step {
        Some(step) => step,
        None => return 1,
    };
    let step_name = step.name.clone();

    let mut registry = Registry::new();
    for problem in stdlib::load_into(&mut registry) {
        eprintln!("{}", problem);
    }
    natives::register_natives(&mut registry.natives);
    if let Err(e) = registry.register_step(Rc::new(step)) {
        eprintln!("{}", e.pretty(Some(&source)));
        return 1;
    }

    // Sandbox the file natives next to the step being exercised.
    let root = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    match Sandbox::new(FsConfig {
        root,
        ..Default::default()
    }) {
        Ok(sandbox) => natives::set_sandbox_storage(sandbox),
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    }

    let args: Vec<Value> = raw_args.iter().map(|raw| coerce_argument(raw)).collect();
    let call_site = SourceLocation::synthetic();

    let mut console = StdConsole;
    let mut interp = Interpreter::new(&registry, &mut console, Limits::default());
    match interp.call_entry(&step_name, args, &call_site) {
        Ok(CallOutcome::Value(Value::Nothing)) | Ok(CallOutcome::Exited) => 0,
        Ok(CallOutcome::Value(result)) => {
            println!("=> {}", result);
            0
        }
        Err(e) => {
            eprintln!("{}", e.pretty(Some(&source)));
            1
        }
    }
}

/// `--args` values: numbers and booleans are recognized, everything else
/// arrives as text.
fn coerce_argument(raw: &str) -> Value {
    match raw {
        "true" => return Value::Boolean(true),
        "false" => return Value::Boolean(false),
        "nothing" => return Value::Nothing,
        _ => {}
    }
    if Value::Text(raw.to_string()).to_number().is_ok() {
        Value::Number(raw.trim().parse().unwrap_or(0.0))
    } else {
        Value::Text(raw.to_string())
    }
}

/// Fallback shell over the fragment façade. The full-featured REPL ships as
/// a separate front-end; this one reads statements from stdin, runs a block
/// when a blank line closes it, and keeps one environment alive throughout.
fn repl() -> u8 {
    let mut registry = Registry::new();
    for problem in stdlib::load_into(&mut registry) {
        eprintln!("{}", problem);
    }
    natives::register_natives(&mut registry.natives);
    match Sandbox::new(FsConfig::default()) {
        Ok(sandbox) => natives::set_sandbox_storage(sandbox),
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    }

    println!("Steps {}", config::VERSION);
    println!("End a block with a blank line. Ctrl-D or `exit` leaves.");

    let mut console = StdConsole;
    let mut interp = Interpreter::new(&registry, &mut console, Limits::default());

    let stdin = io::stdin();
    let mut buffer = String::new();
    loop {
        print!("{}", if buffer.is_empty() { "steps> " } else { "  ...> " });
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                println!();
                return 0;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}", e);
                return 1;
            }
        }
        let trimmed_end = line.trim_end();

        // Block headers keep collecting until a blank line.
        let collecting = !buffer.is_empty();
        if trimmed_end.ends_with(':') || (collecting && !trimmed_end.is_empty()) {
            buffer.push_str(trimmed_end);
            buffer.push('\n');
            continue;
        }
        if collecting && trimmed_end.is_empty() {
            let fragment = std::mem::take(&mut buffer);
            if run_fragment(&mut interp, &fragment) {
                return 0;
            }
            continue;
        }
        if trimmed_end.is_empty() {
            continue;
        }

        let fragment = format!("{}\n", trimmed_end);
        if run_fragment(&mut interp, &fragment) {
            return 0;
        }
    }
}

/// Returns true when the fragment executed an `exit`.
fn run_fragment(interp: &mut Interpreter<'_, '_>, fragment: &str) -> bool {
    let (statements, errors) = parser::parse_fragment(fragment, "<repl>");
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("{}", error.pretty(Some(fragment)));
        }
        return false;
    }
    match interp.exec_statements(&statements) {
        Ok(interp::Flow::Exit) => true,
        Ok(_) => false,
        Err(e) => {
            eprintln!("{}", e.pretty(Some(fragment)));
            false
        }
    }
}

fn show_diagram(project: &Path) -> u8 {
    let result = load_project(project);
    match &result.program {
        Some(program) => print!("{}", diagram::render(program)),
        None => {
            report_errors(project, &result.errors);
            return 1;
        }
    }
    if result.is_clean() {
        0
    } else {
        report_errors(project, &result.errors);
        1
    }
}

/// Print every diagnostic in the conventional terminal form, pulling in the
/// offending source line when the file is still readable.
fn report_errors(project: &Path, errors: &[StepsError]) {
    for error in errors {
        let source = error
            .location
            .as_ref()
            .and_then(|loc| std::fs::read_to_string(project.join(&*loc.file)).ok());
        eprintln!("{}", error.pretty(source.as_deref()));
    }
}
