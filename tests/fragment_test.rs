// ABOUTME: Statement-level semantics through the fragment-parsing facade

use steps_lang::config::Limits;
use steps_lang::env::BufferConsole;
use steps_lang::error::{codes, StepsError};
use steps_lang::interp::Interpreter;
use steps_lang::natives;
use steps_lang::parse_fragment;
use steps_lang::registry::Registry;
use steps_lang::stdlib;

fn full_registry() -> Registry {
    let mut registry = Registry::new();
    let problems = stdlib::load_into(&mut registry);
    assert!(problems.is_empty(), "{:?}", problems);
    natives::register_natives(&mut registry.natives);
    registry
}

fn run(source: &str) -> Result<Vec<String>, StepsError> {
    let (statements, errors) = parse_fragment(source, "<fragment>");
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    let registry = full_registry();
    let mut console = BufferConsole::new();
    {
        let mut interp = Interpreter::new(&registry, &mut console, Limits::default());
        interp.exec_statements(&statements)?;
    }
    Ok(console.output())
}

#[test]
fn test_catchable_conversion_message() {
    let source = concat!(
        "attempt:\n",
        "    set n to \"abc\" as number\n",
        "if unsuccessful:\n",
        "    display \"Caught: \" added to problem_message\n",
        "then continue:\n",
        "    display \"done\"\n",
    );
    assert_eq!(
        run(source).unwrap(),
        vec!["Caught: cannot convert \"abc\" to number", "done"]
    );
}

#[test]
fn test_iteration_cap_stops_endless_loop() {
    let source = concat!(
        "set iteration limit to 1000\n",
        "repeat while true:\n",
        "    set x to 1\n",
    );
    let err = run(source).unwrap_err();
    assert_eq!(err.code, codes::ITERATION_LIMIT);
}

#[test]
fn test_native_dispatch_through_call() {
    let source = concat!(
        "call uppercase with \"abc\" storing result in u\n",
        "display u\n",
        "call trim with \"  pad  \" storing result in t\n",
        "display t\n",
        "call slice with \"stairway\", 0, 5 storing result in s\n",
        "display s\n",
        "call index_of with \"banana\", \"na\" storing result in i\n",
        "display i\n",
        "call replace with \"a-b\", \"-\", \"+\" storing result in r\n",
        "display r\n",
        "call characters with \"ok\" storing result in cs\n",
        "display cs\n",
    );
    assert_eq!(
        run(source).unwrap(),
        vec!["ABC", "pad", "stair", "2", "a+b", "[\"o\", \"k\"]"]
    );
}

#[test]
fn test_drawing_natives_compose_text() {
    let source = concat!(
        "call banner with \"Scores\" storing result in b\n",
        "display b\n",
        "call line with 5, \"=\" storing result in l\n",
        "display l\n",
        "call center_text with \"hi\", 6 storing result in c\n",
        "display c\n",
        "call pad_text with \"hi\", 4 storing result in p\n",
        "display p added to \"|\"\n",
        "call progress_bar with 1, 2, 8 storing result in bar\n",
        "display bar\n",
    );
    assert_eq!(
        run(source).unwrap(),
        vec!["=== Scores ===", "=====", "  hi  ", "hi  |", "[####----]"]
    );
}

#[test]
fn test_box_native_draws_border() {
    let source = concat!(
        "call box with \"hi\" storing result in framed\n",
        "display framed\n",
    );
    // The box arrives as one text value with embedded newlines.
    assert_eq!(run(source).unwrap(), vec!["+----+\n| hi |\n+----+"]);
}

#[test]
fn test_random_natives_from_steps_code() {
    let source = concat!(
        "call random_int with 4, 4 storing result in n\n",
        "display n\n",
        "call random_choice with [\"only\"] storing result in c\n",
        "display c\n",
    );
    assert_eq!(run(source).unwrap(), vec!["4", "only"]);
}

#[test]
fn test_native_arity_checked_before_invocation() {
    let err = run("call uppercase with \"a\", \"b\"\n").unwrap_err();
    assert_eq!(err.code, codes::WRONG_ARG_COUNT);
    assert!(err.hint.as_deref().unwrap_or("").contains("text"));
}

#[test]
fn test_step_arity_checked() {
    let err = run("call maximum with 1\n").unwrap_err();
    assert_eq!(err.code, codes::WRONG_ARG_COUNT);
    assert!(err.message.contains("maximum"));
}

#[test]
fn test_native_errors_carry_call_site() {
    let err = run("call random_choice with []\n").unwrap_err();
    assert_eq!(err.code, codes::NATIVE_ARG);
    let location = err.location.expect("native errors are anchored");
    assert_eq!(&*location.file, "<fragment>");
    assert_eq!(location.line, 1);
}

#[test]
fn test_unknown_call_target() {
    let err = run("call nonexistent_step\n").unwrap_err();
    assert_eq!(err.code, codes::UNDEFINED_NAME);
}

#[test]
fn test_natives_win_over_stdlib_names() {
    // `maximum` is a step, `uppercase` a native; both dispatch through the
    // same statement and the native registry is consulted first.
    let source = concat!(
        "call maximum with 2, 5 storing result in m\n",
        "call uppercase with \"m\" storing result in u\n",
        "display m\n",
        "display u\n",
    );
    assert_eq!(run(source).unwrap(), vec!["5", "M"]);
}

#[test]
fn test_nested_attempt_rethrows_uncaught_kind() {
    // The inner attempt catches; the outer sees a clean run.
    let source = concat!(
        "attempt:\n",
        "    attempt:\n",
        "        display 1 / 0\n",
        "    if unsuccessful:\n",
        "        display \"inner\"\n",
        "    then continue:\n",
        "        display \"inner-finally\"\n",
        "if unsuccessful:\n",
        "    display \"outer\"\n",
        "then continue:\n",
        "    display \"outer-finally\"\n",
    );
    assert_eq!(
        run(source).unwrap(),
        vec!["inner", "inner-finally", "outer-finally"]
    );
}

#[test]
fn test_error_in_catch_body_propagates() {
    let source = concat!(
        "attempt:\n",
        "    display 1 / 0\n",
        "if unsuccessful:\n",
        "    display ghost\n",
        "then continue:\n",
        "    display \"finally\"\n",
    );
    let err = run(source).unwrap_err();
    assert_eq!(err.code, codes::UNDEFINED_NAME);
}

#[test]
fn test_scoped_loop_variable() {
    let source = concat!(
        "repeat for each x in [1, 2]:\n",
        "    set doubled to x * 2\n",
        "display type of x is equal to \"nothing\"\n",
    );
    // The loop variable does not leak out of its iteration scope.
    let err = run(source).unwrap_err();
    assert_eq!(err.code, codes::UNDEFINED_NAME);
}

#[test]
fn test_table_iteration_order_is_insertion_order() {
    let source = concat!(
        "set t to [\"zebra\": 1, \"apple\": 2, \"mango\": 3]\n",
        "repeat for each k in t:\n",
        "    display k\n",
    );
    assert_eq!(run(source).unwrap(), vec!["zebra", "apple", "mango"]);
}
