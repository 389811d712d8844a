// ABOUTME: Tree-walking interpreter threading control signals through the AST

use crate::ast::*;
use crate::config::Limits;
use crate::env::{Console, Environment, Frame};
use crate::error::{codes, StepsError};
use crate::loader::Program;
use crate::location::SourceLocation;
use crate::registry::Registry;
use crate::value::{TypeTag, Value};
use indexmap::IndexMap;
use std::rc::Rc;

/// Non-local control signal. Statements complete `Normal`ly, rewind to the
/// nearest step frame with `Return`, or end the program with `Exit`; errors
/// travel separately in `Result::Err` so `attempt` can test catchability.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
    Exit,
}

/// Outcome of dispatching a `call`.
pub enum CallOutcome {
    Value(Value),
    Exited,
}

type Exec = Result<Flow, StepsError>;

/// Execute a loaded program. Returns the process exit code.
pub fn run_building(
    program: &Program,
    console: &mut dyn Console,
    limits: Limits,
) -> Result<i32, StepsError> {
    let mut interp = Interpreter::new(&program.registry, console, limits);
    for decl in &program.building.declares {
        interp.env.declare(decl);
    }
    log::debug!("executing building `{}`", program.building.name);
    interp.exec_block(&program.building.body)?;
    Ok(0)
}

pub struct Interpreter<'p, 'io> {
    registry: &'p Registry,
    env: Environment<'io>,
}

impl<'p, 'io> Interpreter<'p, 'io> {
    pub fn new(registry: &'p Registry, console: &'io mut dyn Console, limits: Limits) -> Self {
        Interpreter {
            registry,
            env: Environment::new(console, limits),
        }
    }

    /// Run a statement list in the current scope - the REPL entry point.
    pub fn exec_statements(&mut self, statements: &[Statement]) -> Exec {
        self.exec_block(statements)
    }

    /// Call a step or native by name with already-evaluated arguments - the
    /// `run-step` entry point.
    pub fn call_entry(
        &mut self,
        name: &str,
        args: Vec<Value>,
        location: &SourceLocation,
    ) -> Result<CallOutcome, StepsError> {
        self.dispatch_call(name, args, location)
    }

    // ===== Statements =====

    fn exec_block(&mut self, statements: &[Statement]) -> Exec {
        for statement in statements {
            match self.exec_statement(statement)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// Run a block in a fresh scope that is popped however the block ends.
    fn exec_scoped(&mut self, statements: &[Statement]) -> Exec {
        self.env.push_scope();
        let result = self.exec_block(statements);
        self.env.pop_scope();
        result
    }

    fn exec_statement(&mut self, statement: &Statement) -> Exec {
        match statement {
            Statement::Display { value, .. } => {
                let value = self.eval(value)?;
                let shown = value.to_text();
                self.env.write_line(&shown);
                Ok(Flow::Normal)
            }
            Statement::Indicate { value, .. } => {
                let value = self.eval(value)?;
                let shown = value.to_text();
                self.env.write_no_newline(&shown);
                Ok(Flow::Normal)
            }
            Statement::Set {
                target,
                value,
                location,
            } => {
                let value = self.eval(value)?;
                self.assign(target, value, location)?;
                Ok(Flow::Normal)
            }
            Statement::Call {
                name,
                args,
                store_in,
                location,
            } => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval(arg)?);
                }
                match self.dispatch_call(name, evaluated, location)? {
                    CallOutcome::Exited => Ok(Flow::Exit),
                    CallOutcome::Value(result) => {
                        if let Some(target) = store_in {
                            self.env.set(target, result, location)?;
                        }
                        Ok(Flow::Normal)
                    }
                }
            }
            Statement::Return { value, location } => {
                if self.env.call_depth() == 0 {
                    return Err(StepsError::runtime(
                        codes::RETURN_OUTSIDE_STEP,
                        "`return` only makes sense inside a step or riser",
                    )
                    .at(location.clone()));
                }
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nothing,
                };
                Ok(Flow::Return(value))
            }
            Statement::Exit { .. } => Ok(Flow::Exit),
            Statement::If {
                branches,
                otherwise,
                ..
            } => {
                for (condition, body) in branches {
                    if self.eval_condition(condition)? {
                        return self.exec_scoped(body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_scoped(body);
                }
                Ok(Flow::Normal)
            }
            Statement::RepeatTimes {
                count,
                body,
                location,
            } => {
                let count = self.eval(count)?;
                let times = match count {
                    Value::Number(n) if n.fract() == 0.0 && n >= 0.0 => n as u64,
                    Value::Number(n) => {
                        return Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!("`repeat ... times` needs a whole non-negative count, got {}", n),
                        )
                        .at(location.clone()))
                    }
                    other => {
                        return Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!(
                                "`repeat ... times` needs a number, got {}",
                                other.type_name()
                            ),
                        )
                        .at(location.clone()))
                    }
                };
                for _ in 0..times {
                    self.env.tick(location)?;
                    match self.exec_scoped(body)? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::RepeatForEach {
                var,
                collection,
                body,
                location,
            } => {
                let collection = self.eval(collection)?;
                let items: Vec<Value> = match &collection {
                    Value::List(items) => items.borrow().clone(),
                    Value::Text(s) => s.chars().map(|c| Value::Text(c.to_string())).collect(),
                    Value::Table(entries) => entries
                        .borrow()
                        .keys()
                        .map(|k| Value::Text(k.clone()))
                        .collect(),
                    other => {
                        return Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!("cannot loop over {}", other.type_name()),
                        )
                        .with_hint("`for each` walks lists, text, and table keys")
                        .at(location.clone()))
                    }
                };
                for item in items {
                    self.env.tick(location)?;
                    self.env.push_scope();
                    self.env.define(var, item);
                    let result = self.exec_block(body);
                    self.env.pop_scope();
                    match result? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }
            Statement::RepeatWhile {
                condition,
                body,
                location,
            } => {
                loop {
                    if !self.eval_condition(condition)? {
                        return Ok(Flow::Normal);
                    }
                    self.env.tick(location)?;
                    match self.exec_scoped(body)? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
            }
            Statement::Attempt {
                try_body,
                rescue_body,
                always_body,
                ..
            } => self.exec_attempt(try_body, rescue_body, always_body),
            Statement::Note { .. } => Ok(Flow::Normal),
            Statement::AddToList {
                value,
                list,
                location,
            } => {
                let value = self.eval(value)?;
                let list = self.eval(list)?;
                match list {
                    Value::List(items) => {
                        items.borrow_mut().push(value);
                        Ok(Flow::Normal)
                    }
                    other => Err(StepsError::type_error(
                        codes::WRONG_OPERAND,
                        format!("can only `add ... to` a list, got {}", other.type_name()),
                    )
                    .at(location.clone())),
                }
            }
            Statement::RemoveFromList {
                value,
                list,
                location,
            } => {
                let value = self.eval(value)?;
                let list = self.eval(list)?;
                match list {
                    Value::List(items) => {
                        // First match by equality; absent is a silent no-op.
                        let mut items = items.borrow_mut();
                        if let Some(pos) =
                            items.iter().position(|item| item.loosely_equals(&value))
                        {
                            items.remove(pos);
                        }
                        Ok(Flow::Normal)
                    }
                    other => Err(StepsError::type_error(
                        codes::WRONG_OPERAND,
                        format!(
                            "can only `remove ... from` a list, got {}",
                            other.type_name()
                        ),
                    )
                    .at(location.clone())),
                }
            }
            Statement::ClearConsole { .. } => {
                self.env.write_no_newline("\x1b[2J\x1b[H");
                Ok(Flow::Normal)
            }
            Statement::SetIterationLimit { value, location } => {
                let value = self.eval(value)?;
                match value {
                    Value::Number(n) if n.fract() == 0.0 && n >= 0.0 => {
                        self.env.set_iteration_limit(n as u64);
                        Ok(Flow::Normal)
                    }
                    other => Err(StepsError::type_error(
                        codes::WRONG_OPERAND,
                        format!(
                            "the iteration limit must be a whole non-negative number, got {}",
                            other.to_text()
                        ),
                    )
                    .at(location.clone())),
                }
            }
        }
    }

    /// TRY -> CATCH? -> FINALLY. Uncatchable errors skip both the catch and
    /// the finally body; `problem_message` exists only while the catch body
    /// runs.
    fn exec_attempt(
        &mut self,
        try_body: &[Statement],
        rescue_body: &[Statement],
        always_body: &[Statement],
    ) -> Exec {
        let tried = self.exec_scoped(try_body);

        let primary: Exec = match tried {
            Err(e) if e.kind.catchable() => {
                self.env.push_scope();
                self.env
                    .define("problem_message", Value::Text(e.message.clone()));
                let rescued = self.exec_block(rescue_body);
                self.env.pop_scope();
                rescued
            }
            Err(e) => return Err(e),
            Ok(flow) => Ok(flow),
        };

        match self.exec_scoped(always_body)? {
            Flow::Normal => primary,
            other => Ok(other),
        }
    }

    fn assign(
        &mut self,
        target: &AssignTarget,
        value: Value,
        location: &SourceLocation,
    ) -> Result<(), StepsError> {
        match target {
            AssignTarget::Name(name) => self.env.set(name, value, location),
            AssignTarget::Index { name, index } => {
                let container = self.env.get(name, location)?;
                let index = self.eval(index)?;
                match container {
                    Value::List(items) => {
                        let i = list_index(&index, items.borrow().len(), location)?;
                        items.borrow_mut()[i] = value;
                        Ok(())
                    }
                    Value::Table(entries) => {
                        let key = table_key(&index, location)?;
                        entries.borrow_mut().insert(key, value);
                        Ok(())
                    }
                    other => Err(StepsError::type_error(
                        codes::WRONG_OPERAND,
                        format!("`{}` is {}, not a list or table", name, other.type_name()),
                    )
                    .at(location.clone())),
                }
            }
        }
    }

    // ===== Call dispatch =====

    /// Natives first, then the current frame's risers, then global steps.
    fn dispatch_call(
        &mut self,
        name: &str,
        args: Vec<Value>,
        location: &SourceLocation,
    ) -> Result<CallOutcome, StepsError> {
        if let Some(def) = self.registry.natives.get(name) {
            if args.len() != def.params.len() {
                return Err(arity_error(name, def.params, args.len(), location));
            }
            let result = (def.func)(&args).map_err(|e| e.anchored(location))?;
            return Ok(CallOutcome::Value(result));
        }

        if let Some(frame) = self.env.current_frame() {
            let parent = self.registry.lookup_step(&frame.step_name).cloned();
            if let Some(parent) = parent {
                if let Some(pos) = parent.risers.iter().position(|r| r.name == name) {
                    return self.invoke_riser(parent.clone(), pos, args, location);
                }
            }
        }

        if let Some(step) = self.registry.lookup_step(name).cloned() {
            return self.invoke_step(step, args, location);
        }

        Err(StepsError::runtime(
            codes::UNDEFINED_NAME,
            format!("nothing named `{}` can be called here", name),
        )
        .with_hint("check the step name and its floor's `.floor` file")
        .at(location.clone()))
    }

    fn invoke_step(
        &mut self,
        step: Rc<Step>,
        args: Vec<Value>,
        location: &SourceLocation,
    ) -> Result<CallOutcome, StepsError> {
        if args.len() != step.params.len() {
            return Err(arity_error_owned(
                &step.name,
                &step.params,
                args.len(),
                location,
            ));
        }
        self.env.push_frame(Frame {
            step_name: step.name.clone(),
            riser_name: None,
            call_site: location.clone(),
        })?;

        let saved = self.env.swap_scopes();
        for (param, arg) in step.params.iter().zip(args) {
            self.env.define(param, arg);
        }
        for decl in &step.declares {
            self.env.declare(decl);
        }

        let result = self.exec_block(&step.body);

        self.env.restore_scopes(saved);
        self.env.pop_frame();

        self.finish_call(result, &step.name, step.returns.as_deref(), location)
    }

    fn invoke_riser(
        &mut self,
        parent: Rc<Step>,
        riser_index: usize,
        args: Vec<Value>,
        location: &SourceLocation,
    ) -> Result<CallOutcome, StepsError> {
        let riser = &parent.risers[riser_index];
        if args.len() != riser.params.len() {
            return Err(arity_error_owned(
                &riser.name,
                &riser.params,
                args.len(),
                location,
            ));
        }
        // The frame keeps the parent step's identity so sibling risers
        // remain callable from inside this one.
        self.env.push_frame(Frame {
            step_name: parent.name.clone(),
            riser_name: Some(riser.name.clone()),
            call_site: location.clone(),
        })?;

        let saved = self.env.swap_scopes();
        for (param, arg) in riser.params.iter().zip(args) {
            self.env.define(param, arg);
        }
        for decl in &riser.declares {
            self.env.declare(decl);
        }

        let result = self.exec_block(&riser.body);

        self.env.restore_scopes(saved);
        self.env.pop_frame();

        self.finish_call(result, &riser.name, riser.returns.as_deref(), location)
    }

    fn finish_call(
        &mut self,
        result: Exec,
        name: &str,
        returns: Option<&str>,
        location: &SourceLocation,
    ) -> Result<CallOutcome, StepsError> {
        match result? {
            Flow::Return(value) => Ok(CallOutcome::Value(value)),
            Flow::Exit => Ok(CallOutcome::Exited),
            Flow::Normal => {
                if let Some(returned) = returns {
                    Err(StepsError::runtime(
                        codes::MISSING_RETURN,
                        format!(
                            "`{}` promises `returns: {}` but finished without `return`",
                            name, returned
                        ),
                    )
                    .with_hint("end every path through the step with a `return`")
                    .at(location.clone()))
                } else {
                    Ok(CallOutcome::Value(Value::Nothing))
                }
            }
        }
    }

    // ===== Expressions =====

    fn eval_condition(&mut self, condition: &Expr) -> Result<bool, StepsError> {
        match self.eval(condition)? {
            Value::Boolean(b) => Ok(b),
            other => Err(StepsError::type_error(
                codes::WRONG_OPERAND,
                format!("the condition must be a boolean, got {}", other.type_name()),
            )
            .with_hint("convert with `as boolean`")
            .at(condition.location().clone())),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, StepsError> {
        match expr {
            Expr::NumberLit { value, .. } => Ok(Value::Number(*value)),
            Expr::TextLit { value, .. } => Ok(Value::Text(value.clone())),
            Expr::BooleanLit { value, .. } => Ok(Value::Boolean(*value)),
            Expr::NothingLit { .. } => Ok(Value::Nothing),
            Expr::ListLit { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::list(values))
            }
            Expr::TableLit { entries, .. } => {
                let mut table = IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key = self.eval(key_expr)?;
                    let key = table_key(&key, key_expr.location())?;
                    let value = self.eval(value_expr)?;
                    table.insert(key, value);
                }
                Ok(Value::table(table))
            }
            Expr::Identifier { name, location } => self.env.get(name, location),
            Expr::Input { as_type, location } => {
                let line = self.env.read_line()?;
                let value = Value::Text(line);
                match as_type {
                    None => Ok(value),
                    Some(tag) => convert(&value, *tag, location),
                }
            }
            Expr::Binary {
                op,
                lhs,
                rhs,
                location,
            } => self.eval_binary(*op, lhs, rhs, location),
            Expr::Unary {
                op,
                operand,
                location,
            } => {
                let value = self.eval(operand)?;
                match op {
                    UnOp::Negate => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!("cannot negate {}", other.type_name()),
                        )
                        .at(location.clone())),
                    },
                    UnOp::Not => match value {
                        Value::Boolean(b) => Ok(Value::Boolean(!b)),
                        other => Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!("`not` needs a boolean, got {}", other.type_name()),
                        )
                        .with_hint("convert with `as boolean`")
                        .at(location.clone())),
                    },
                }
            }
            Expr::Convert {
                operand,
                to,
                location,
            } => {
                let value = self.eval(operand)?;
                convert(&value, *to, location)
            }
            Expr::FormatDecimal {
                operand,
                places,
                location,
            } => {
                let value = self.eval(operand)?;
                let places = self.eval(places)?;
                let places = match places {
                    Value::Number(n) if n.fract() == 0.0 && n >= 0.0 => n as usize,
                    other => {
                        return Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!(
                                "`as decimal` needs a whole non-negative place count, got {}",
                                other.to_text()
                            ),
                        )
                        .at(location.clone()))
                    }
                };
                value
                    .format_decimal(places)
                    .map(Value::Text)
                    .map_err(|e| e.anchored(location))
            }
            Expr::Index {
                target,
                index,
                location,
            } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                match target {
                    Value::List(items) => {
                        let items = items.borrow();
                        let i = list_index(&index, items.len(), location)?;
                        Ok(items[i].clone())
                    }
                    Value::Table(entries) => {
                        let key = table_key(&index, location)?;
                        entries.borrow().get(&key).cloned().ok_or_else(|| {
                            StepsError::runtime(
                                codes::KEY_NOT_FOUND,
                                format!("the table has no key \"{}\"", key),
                            )
                            .with_hint("assign `set t[key] to ...` before reading it")
                            .at(location.clone())
                        })
                    }
                    other => Err(StepsError::type_error(
                        codes::WRONG_OPERAND,
                        format!("cannot index into {}", other.type_name()),
                    )
                    .with_hint("use `character at N of text` for text")
                    .at(location.clone())),
                }
            }
            Expr::LengthOf { operand, location } => {
                let value = self.eval(operand)?;
                let length = match &value {
                    Value::Text(s) => s.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Table(entries) => entries.borrow().len(),
                    other => {
                        return Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!("{} has no length", other.type_name()),
                        )
                        .at(location.clone()))
                    }
                };
                Ok(Value::Number(length as f64))
            }
            Expr::CharacterAt {
                index,
                text,
                location,
            } => {
                let index = self.eval(index)?;
                let text = self.eval(text)?;
                let s = match &text {
                    Value::Text(s) => s,
                    other => {
                        return Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!("`character at` needs text, got {}", other.type_name()),
                        )
                        .at(location.clone()))
                    }
                };
                let chars: Vec<char> = s.chars().collect();
                let i = list_index(&index, chars.len(), location)?;
                Ok(Value::Text(chars[i].to_string()))
            }
            Expr::TypeOf { operand, .. } => {
                let value = self.eval(operand)?;
                Ok(Value::Text(value.type_name().to_string()))
            }
            Expr::IsA { operand, tag, .. } => {
                let value = self.eval(operand)?;
                Ok(Value::Boolean(value.type_tag() == *tag))
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        location: &SourceLocation,
    ) -> Result<Value, StepsError> {
        // Short-circuit forms first.
        if matches!(op, BinOp::And | BinOp::Or) {
            let left = self.eval(lhs)?;
            let left = boolean_operand(&left, op, location)?;
            return match (op, left) {
                (BinOp::And, false) => Ok(Value::Boolean(false)),
                (BinOp::Or, true) => Ok(Value::Boolean(true)),
                _ => {
                    let right = self.eval(rhs)?;
                    Ok(Value::Boolean(boolean_operand(&right, op, location)?))
                }
            };
        }

        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;

        match op {
            BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide => {
                let (a, b) = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => (*a, *b),
                    _ => {
                        return Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!(
                                "arithmetic needs two numbers, got {} and {}",
                                left.type_name(),
                                right.type_name()
                            ),
                        )
                        .with_hint("convert with `as number`, or join text with `added to`")
                        .at(location.clone()))
                    }
                };
                match op {
                    BinOp::Add => Ok(Value::Number(a + b)),
                    BinOp::Subtract => Ok(Value::Number(a - b)),
                    BinOp::Multiply => Ok(Value::Number(a * b)),
                    BinOp::Divide => {
                        if b == 0.0 {
                            Err(StepsError::runtime(
                                codes::DIVISION_BY_ZERO,
                                "division by zero",
                            )
                            .at(location.clone()))
                        } else {
                            Ok(Value::Number(a / b))
                        }
                    }
                    _ => unreachable!(),
                }
            }
            BinOp::AddedTo => match (&left, &right) {
                (Value::Text(a), Value::Text(b)) => {
                    let mut joined = a.clone();
                    joined.push_str(b);
                    Ok(Value::Text(joined))
                }
                _ => Err(StepsError::type_error(
                    codes::WRONG_OPERAND,
                    format!(
                        "`added to` joins two texts, got {} and {}",
                        left.type_name(),
                        right.type_name()
                    ),
                )
                .with_hint("convert with `as text`, or add numbers with `+`")
                .at(location.clone())),
            },
            BinOp::Equal => Ok(Value::Boolean(left.loosely_equals(&right))),
            BinOp::NotEqual => Ok(Value::Boolean(!left.loosely_equals(&right))),
            BinOp::Less | BinOp::LessOrEqual | BinOp::Greater | BinOp::GreaterOrEqual => {
                let ordering = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
                    _ => {
                        return Err(StepsError::type_error(
                            codes::WRONG_OPERAND,
                            format!(
                                "cannot order {} against {}",
                                left.type_name(),
                                right.type_name()
                            ),
                        )
                        .with_hint("ordered comparison works on two numbers or two texts")
                        .at(location.clone()))
                    }
                };
                let ordering = ordering.ok_or_else(|| {
                    StepsError::runtime(codes::NATIVE_ARG, "comparison is undefined here")
                        .at(location.clone())
                })?;
                let result = match op {
                    BinOp::Less => ordering.is_lt(),
                    BinOp::LessOrEqual => ordering.is_le(),
                    BinOp::Greater => ordering.is_gt(),
                    BinOp::GreaterOrEqual => ordering.is_ge(),
                    _ => unreachable!(),
                };
                Ok(Value::Boolean(result))
            }
            BinOp::Contains | BinOp::StartsWith | BinOp::EndsWith => {
                match (&left, &right) {
                    (Value::Text(a), Value::Text(b)) => {
                        let result = match op {
                            BinOp::Contains => a.contains(b.as_str()),
                            BinOp::StartsWith => a.starts_with(b.as_str()),
                            BinOp::EndsWith => a.ends_with(b.as_str()),
                            _ => unreachable!(),
                        };
                        Ok(Value::Boolean(result))
                    }
                    _ => Err(StepsError::type_error(
                        codes::WRONG_OPERAND,
                        format!(
                            "this text check needs two texts, got {} and {}",
                            left.type_name(),
                            right.type_name()
                        ),
                    )
                    .at(location.clone())),
                }
            }
            BinOp::SplitBy => match (&left, &right) {
                (Value::Text(a), Value::Text(b)) => {
                    if b.is_empty() {
                        return Err(StepsError::runtime(
                            codes::NATIVE_ARG,
                            "`split by` needs a non-empty separator",
                        )
                        .with_hint("call `characters` to split into single characters")
                        .at(location.clone()));
                    }
                    let parts = a
                        .split(b.as_str())
                        .map(|part| Value::Text(part.to_string()))
                        .collect();
                    Ok(Value::list(parts))
                }
                _ => Err(StepsError::type_error(
                    codes::WRONG_OPERAND,
                    format!(
                        "`split by` needs two texts, got {} and {}",
                        left.type_name(),
                        right.type_name()
                    ),
                )
                .at(location.clone())),
            },
            BinOp::IsIn => match &right {
                Value::List(items) => Ok(Value::Boolean(
                    items.borrow().iter().any(|item| item.loosely_equals(&left)),
                )),
                Value::Table(entries) => match &left {
                    Value::Text(key) => Ok(Value::Boolean(entries.borrow().contains_key(key))),
                    other => Err(StepsError::type_error(
                        codes::WRONG_OPERAND,
                        format!("table keys are text, got {}", other.type_name()),
                    )
                    .at(location.clone())),
                },
                other => Err(StepsError::type_error(
                    codes::WRONG_OPERAND,
                    format!("`is in` searches a list or table, got {}", other.type_name()),
                )
                .at(location.clone())),
            },
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }
}

// ===== Shared helpers =====

fn boolean_operand(value: &Value, op: BinOp, location: &SourceLocation) -> Result<bool, StepsError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        other => {
            let name = if op == BinOp::And { "and" } else { "or" };
            Err(StepsError::type_error(
                codes::WRONG_OPERAND,
                format!("`{}` needs booleans, got {}", name, other.type_name()),
            )
            .with_hint("convert with `as boolean`")
            .at(location.clone()))
        }
    }
}

/// Check a list/text index: must be an integer-valued number inside bounds.
fn list_index(
    index: &Value,
    len: usize,
    location: &SourceLocation,
) -> Result<usize, StepsError> {
    let n = match index {
        Value::Number(n) => *n,
        other => {
            return Err(StepsError::type_error(
                codes::WRONG_OPERAND,
                format!("the index must be a number, got {}", other.type_name()),
            )
            .at(location.clone()))
        }
    };
    if n.fract() != 0.0 {
        return Err(StepsError::type_error(
            codes::NON_INTEGER_INDEX,
            format!("the index must be a whole number, got {}", n),
        )
        .at(location.clone()));
    }
    if n < 0.0 || n >= len as f64 {
        return Err(StepsError::runtime(
            codes::INDEX_OUT_OF_RANGE,
            format!(
                "index {} is out of range for length {}",
                crate::value::format_number(n),
                len
            ),
        )
        .with_hint("positions start at 0")
        .at(location.clone()));
    }
    Ok(n as usize)
}

fn table_key(index: &Value, location: &SourceLocation) -> Result<String, StepsError> {
    match index {
        Value::Text(key) => Ok(key.clone()),
        other => Err(StepsError::type_error(
            codes::WRONG_OPERAND,
            format!("table keys are text, got {}", other.type_name()),
        )
        .with_hint("convert with `as text`")
        .at(location.clone())),
    }
}

/// `as` conversions: text-to-number is strict, anything goes to text or
/// boolean, identity conversions pass through, everything else is an error.
fn convert(value: &Value, to: TypeTag, location: &SourceLocation) -> Result<Value, StepsError> {
    if value.type_tag() == to {
        return Ok(value.clone());
    }
    match to {
        TypeTag::Number => value
            .to_number()
            .map(Value::Number)
            .map_err(|e| e.anchored(location)),
        TypeTag::Text => Ok(Value::Text(value.to_text())),
        TypeTag::Boolean => Ok(Value::Boolean(value.to_boolean())),
        TypeTag::List | TypeTag::Table | TypeTag::Nothing => Err(StepsError::type_error(
            codes::FAILED_CONVERSION,
            format!("cannot convert {} to {}", value.type_name(), to),
        )
        .at(location.clone())),
    }
}

fn arity_error(
    name: &str,
    params: &[&str],
    got: usize,
    location: &SourceLocation,
) -> StepsError {
    StepsError::runtime(
        codes::WRONG_ARG_COUNT,
        format!(
            "`{}` expects {} argument{}, got {}",
            name,
            params.len(),
            if params.len() == 1 { "" } else { "s" },
            got
        ),
    )
    .with_hint(format!("call {} with ({})", name, params.join(", ")))
    .at(location.clone())
}

fn arity_error_owned(
    name: &str,
    params: &[String],
    got: usize,
    location: &SourceLocation,
) -> StepsError {
    let borrowed: Vec<&str> = params.iter().map(|s| s.as_str()).collect();
    arity_error(name, &borrowed, got, location)
}
