// ABOUTME: Runtime value representation and the conversion rules between kinds

use crate::error::{codes, StepsError};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Type tag used by `declare ... fixed`, `is a`, and `as` conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Number,
    Text,
    Boolean,
    List,
    Table,
    Nothing,
}

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Number => "number",
            TypeTag::Text => "text",
            TypeTag::Boolean => "boolean",
            TypeTag::List => "list",
            TypeTag::Table => "table",
            TypeTag::Nothing => "nothing",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Steps runtime value.
///
/// Lists and tables are shared references: `add 3 to scores` mutates the
/// underlying container through whichever binding reached it. Tables keep
/// insertion order, which `repeat for each` and `write_csv` rely on.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    List(Rc<RefCell<Vec<Value>>>),
    Table(Rc<RefCell<IndexMap<String, Value>>>),
    Nothing,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn table(entries: IndexMap<String, Value>) -> Self {
        Value::Table(Rc::new(RefCell::new(entries)))
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Number(_) => TypeTag::Number,
            Value::Text(_) => TypeTag::Text,
            Value::Boolean(_) => TypeTag::Boolean,
            Value::List(_) => TypeTag::List,
            Value::Table(_) => TypeTag::Table,
            Value::Nothing => TypeTag::Nothing,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_tag().name()
    }

    /// Equality across values. Values of different kinds are never equal;
    /// lists and tables compare by contents.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Nothing, Value::Nothing) => true,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.loosely_equals(y))
            }
            (Value::Table(a), Value::Table(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.loosely_equals(w)).unwrap_or(false))
            }
            _ => false,
        }
    }

    /// Conversion to number: strict parse of trimmed text, identity on
    /// numbers, a type error for everything else.
    pub fn to_number(&self) -> Result<f64, StepsError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Text(s) => {
                let trimmed = s.trim();
                if is_strict_number(trimmed) {
                    trimmed.parse::<f64>().map_err(|_| conversion_error(self))
                } else {
                    Err(conversion_error(self))
                }
            }
            _ => Err(conversion_error(self)),
        }
    }

    /// Conversion to text: the display form of any value.
    pub fn to_text(&self) -> String {
        format!("{}", self)
    }

    /// Conversion to boolean: number is true when nonzero, text when
    /// non-empty, containers when non-empty, nothing is false.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::List(items) => !items.borrow().is_empty(),
            Value::Table(entries) => !entries.borrow().is_empty(),
            Value::Nothing => false,
        }
    }

    /// Fixed-precision formatting for `as decimal(N)`.
    pub fn format_decimal(&self, places: usize) -> Result<String, StepsError> {
        match self {
            Value::Number(n) => Ok(format!("{:.*}", places, n)),
            _ => Err(StepsError::type_error(
                codes::WRONG_OPERAND,
                format!("`as decimal` needs a number, got {}", self.type_name()),
            )
            .with_hint("convert with `as number` first")),
        }
    }
}

/// `-?\d+(\.\d+)?` - the only shapes the strict text-to-number parse accepts.
fn is_strict_number(s: &str) -> bool {
    let rest = s.strip_prefix('-').unwrap_or(s);
    if rest.is_empty() {
        return false;
    }
    let mut parts = rest.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match parts.next() {
        None => true,
        Some(frac) => !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()),
    }
}

fn conversion_error(value: &Value) -> StepsError {
    let shown = match value {
        Value::Text(s) => format!("\"{}\"", s),
        other => other.to_text(),
    };
    StepsError::type_error(
        codes::FAILED_CONVERSION,
        format!("cannot convert {} to number", shown),
    )
    .with_hint("numbers look like 42 or -3.5")
}

/// Display a number: integer form when the value is mathematically integral,
/// otherwise the shortest round-trip decimal.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    fmt_nested(item, f)?;
                }
                write!(f, "]")
            }
            Value::Table(entries) => {
                let entries = entries.borrow();
                if entries.is_empty() {
                    return write!(f, "[:]");
                }
                write!(f, "[")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": ", key)?;
                    fmt_nested(value, f)?;
                }
                write!(f, "]")
            }
            Value::Nothing => f.write_str("nothing"),
        }
    }
}

/// Inside containers, text is quoted so `["a", "b"]` round-trips visually.
fn fmt_nested(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Text(s) => write!(f, "\"{}\"", s),
        other => write!(f, "{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(Value::Number(42.0).to_text(), "42");
        assert_eq!(Value::Number(-2.5).to_text(), "-2.5");
        assert_eq!(Value::Number(0.0).to_text(), "0");
        assert_eq!(Value::Number(115.0).to_text(), "115");
    }

    #[test]
    fn test_text_display_is_bare() {
        assert_eq!(Value::Text("Hello".into()).to_text(), "Hello");
    }

    #[test]
    fn test_container_display() {
        let list = Value::list(vec![
            Value::Number(1.0),
            Value::Text("a".into()),
            Value::Boolean(true),
        ]);
        assert_eq!(list.to_text(), "[1, \"a\", true]");

        let mut entries = IndexMap::new();
        entries.insert("score".to_string(), Value::Number(7.0));
        assert_eq!(Value::table(entries).to_text(), "[\"score\": 7]");
        assert_eq!(Value::table(IndexMap::new()).to_text(), "[:]");
    }

    #[test]
    fn test_strict_number_parse() {
        assert_eq!(Value::Text(" 42 ".into()).to_number().unwrap(), 42.0);
        assert_eq!(Value::Text("-3.5".into()).to_number().unwrap(), -3.5);
        assert!(Value::Text("abc".into()).to_number().is_err());
        assert!(Value::Text("1.".into()).to_number().is_err());
        assert!(Value::Text(".5".into()).to_number().is_err());
        assert!(Value::Text("1e3".into()).to_number().is_err());
        assert!(Value::Text("".into()).to_number().is_err());
    }

    #[test]
    fn test_conversion_error_message() {
        let err = Value::Text("abc".into()).to_number().unwrap_err();
        assert_eq!(err.message, "cannot convert \"abc\" to number");
        assert_eq!(err.code, codes::FAILED_CONVERSION);
    }

    #[test]
    fn test_number_text_round_trip() {
        for n in [0.0, 7.0, -12.0, 2.5, -0.125, 1234567.0] {
            let text = Value::Number(n).to_text();
            assert_eq!(Value::Text(text).to_number().unwrap(), n);
        }
    }

    #[test]
    fn test_to_boolean() {
        assert!(Value::Number(1.5).to_boolean());
        assert!(!Value::Number(0.0).to_boolean());
        assert!(Value::Text("x".into()).to_boolean());
        assert!(!Value::Text("".into()).to_boolean());
        assert!(!Value::list(vec![]).to_boolean());
        assert!(!Value::Nothing.to_boolean());
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Number(1.0).loosely_equals(&Value::Number(1.0)));
        assert!(!Value::Number(1.0).loosely_equals(&Value::Text("1".into())));
        let a = Value::list(vec![Value::Number(1.0), Value::Number(2.0)]);
        let b = Value::list(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert!(a.loosely_equals(&b));
    }

    #[test]
    fn test_list_reference_semantics() {
        let list = Value::list(vec![Value::Number(1.0)]);
        let alias = list.clone();
        if let Value::List(items) = &list {
            items.borrow_mut().push(Value::Number(2.0));
        }
        assert_eq!(alias.to_text(), "[1, 2]");
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(Value::Number(15.0).format_decimal(1).unwrap(), "15.0");
        assert_eq!(Value::Number(2.346).format_decimal(2).unwrap(), "2.35");
        assert_eq!(Value::Number(7.0).format_decimal(0).unwrap(), "7");
        assert!(Value::Text("x".into()).format_decimal(1).is_err());
    }
}
