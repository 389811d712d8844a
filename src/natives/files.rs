//! File and CSV natives, routed through the capability sandbox.

use super::{text_arg, with_sandbox};
use crate::error::{codes, StepsError};
use crate::registry::NativeRegistry;
use crate::value::Value;
use indexmap::IndexMap;
use steps_macros::native;

#[native(name = "read_file", params(path))]
pub fn native_read_file(args: &[Value]) -> Result<Value, StepsError> {
    let path = text_arg("read_file", args, 0, "path")?;
    with_sandbox(|sandbox| sandbox.read_file(path)).map(Value::Text)
}

#[native(name = "write_file", params(path, content))]
pub fn native_write_file(args: &[Value]) -> Result<Value, StepsError> {
    let path = text_arg("write_file", args, 0, "path")?;
    let content = text_arg("write_file", args, 1, "content")?;
    with_sandbox(|sandbox| sandbox.write_file(path, content))?;
    Ok(Value::Nothing)
}

#[native(name = "append_file", params(path, content))]
pub fn native_append_file(args: &[Value]) -> Result<Value, StepsError> {
    let path = text_arg("append_file", args, 0, "path")?;
    let content = text_arg("append_file", args, 1, "content")?;
    with_sandbox(|sandbox| sandbox.append_file(path, content))?;
    Ok(Value::Nothing)
}

#[native(name = "file_exists", params(path))]
pub fn native_file_exists(args: &[Value]) -> Result<Value, StepsError> {
    let path = text_arg("file_exists", args, 0, "path")?;
    with_sandbox(|sandbox| sandbox.file_exists(path)).map(Value::Boolean)
}

/// Read a CSV file into a list of tables keyed by the header row.
#[native(name = "read_csv", params(path))]
pub fn native_read_csv(args: &[Value]) -> Result<Value, StepsError> {
    let path = text_arg("read_csv", args, 0, "path")?;
    let content = with_sandbox(|sandbox| sandbox.read_file(path))?;
    let mut records = parse_csv(&content);
    records.retain(|fields| !(fields.len() == 1 && fields[0].is_empty()));
    if records.is_empty() {
        return Ok(Value::list(Vec::new()));
    }
    let header = records.remove(0);
    let rows = records
        .into_iter()
        .map(|fields| {
            let mut table = IndexMap::new();
            for (i, key) in header.iter().enumerate() {
                let field = fields.get(i).cloned().unwrap_or_default();
                table.insert(key.clone(), Value::Text(field));
            }
            Value::table(table)
        })
        .collect();
    Ok(Value::list(rows))
}

/// Write a list of tables as CSV; the first table's keys become the header,
/// in insertion order.
#[native(name = "write_csv", params(path, rows))]
pub fn native_write_csv(args: &[Value]) -> Result<Value, StepsError> {
    let path = text_arg("write_csv", args, 0, "path")?;
    let rows = match &args[1] {
        Value::List(items) => items.borrow().clone(),
        other => {
            return Err(StepsError::type_error(
                codes::WRONG_OPERAND,
                format!(
                    "`write_csv` expected a list of tables for `rows`, got {}",
                    other.type_name()
                ),
            ))
        }
    };

    let mut out = String::new();
    let mut header: Vec<String> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let table = match row {
            Value::Table(entries) => entries.borrow().clone(),
            other => {
                return Err(StepsError::type_error(
                    codes::WRONG_OPERAND,
                    format!(
                        "`write_csv` expected every row to be a table, row {} is {}",
                        i,
                        other.type_name()
                    ),
                ))
            }
        };
        if i == 0 {
            header = table.keys().cloned().collect();
            out.push_str(&format_csv_row(&header));
            out.push('\n');
        }
        let fields: Vec<String> = header
            .iter()
            .map(|key| table.get(key).map(|v| v.to_text()).unwrap_or_default())
            .collect();
        out.push_str(&format_csv_row(&fields));
        out.push('\n');
    }

    with_sandbox(|sandbox| sandbox.write_file(path, &out))?;
    Ok(Value::Nothing)
}

pub fn register(registry: &mut NativeRegistry) {
    register_native_read_file(registry);
    register_native_write_file(registry);
    register_native_append_file(registry);
    register_native_file_exists(registry);
    register_native_read_csv(registry);
    register_native_write_csv(registry);
}

// ============================================================================
// CSV plumbing
// ============================================================================

/// Parse CSV content into records of fields. Quoted fields may contain
/// commas, doubled quotes, and newlines.
fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();
    let mut saw_anything = false;

    while let Some(c) = chars.next() {
        saw_anything = true;
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => {
                    fields.push(std::mem::take(&mut field));
                }
                '\r' => {}
                '\n' => {
                    fields.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut fields));
                }
                _ => field.push(c),
            }
        }
    }

    if saw_anything && (!field.is_empty() || !fields.is_empty()) {
        fields.push(field);
        records.push(fields);
    }
    records
}

fn format_csv_row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| {
            if field.contains(',') || field.contains('"') || field.contains('\n') {
                format!("\"{}\"", field.replace('"', "\"\""))
            } else {
                field.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::natives::set_sandbox_storage;
    use crate::sandbox::Sandbox;
    use serial_test::serial;
    use std::fs;
    use std::path::PathBuf;

    fn setup_sandbox() -> PathBuf {
        let dir = PathBuf::from("./steps_files_test");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let sandbox = Sandbox::new(FsConfig {
            root: dir.clone(),
            ..Default::default()
        })
        .unwrap();
        set_sandbox_storage(sandbox);
        dir
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_parse_csv_quoting() {
        let records = parse_csv("name,motto\nAda,\"first, always\"\nBob,\"say \"\"hi\"\"\"\n");
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], vec!["Ada", "first, always"]);
        assert_eq!(records[2], vec!["Bob", "say \"hi\""]);
    }

    #[test]
    fn test_format_csv_row_quotes_when_needed() {
        let row = format_csv_row(&["plain".into(), "a,b".into(), "q\"q".into()]);
        assert_eq!(row, "plain,\"a,b\",\"q\"\"q\"");
    }

    #[test]
    fn test_parse_csv_empty() {
        assert!(parse_csv("").is_empty());
    }

    #[test]
    #[serial]
    fn test_file_round_trip() {
        let dir = setup_sandbox();
        native_write_file(&[text("out.txt"), text("data")]).unwrap();
        let read = native_read_file(&[text("out.txt")]).unwrap();
        assert_eq!(read.to_text(), "data");
        assert_eq!(
            native_file_exists(&[text("out.txt")]).unwrap().to_text(),
            "true"
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    #[serial]
    fn test_csv_round_trip() {
        let dir = setup_sandbox();

        let mut row = indexmap::IndexMap::new();
        row.insert("name".to_string(), text("Ada"));
        row.insert("score".to_string(), Value::Number(10.0));
        let rows = Value::list(vec![Value::table(row)]);

        native_write_csv(&[text("scores.csv"), rows]).unwrap();
        let back = native_read_csv(&[text("scores.csv")]).unwrap();
        match back {
            Value::List(items) => {
                let items = items.borrow();
                assert_eq!(items.len(), 1);
                match &items[0] {
                    Value::Table(entries) => {
                        let entries = entries.borrow();
                        assert_eq!(entries.get("name").unwrap().to_text(), "Ada");
                        assert_eq!(entries.get("score").unwrap().to_text(), "10");
                        // Header order preserved.
                        let keys: Vec<&String> = entries.keys().collect();
                        assert_eq!(keys, vec!["name", "score"]);
                    }
                    other => panic!("expected table, got {:?}", other),
                }
            }
            other => panic!("expected list, got {:?}", other),
        }
        let _ = fs::remove_dir_all(dir);
    }
}
