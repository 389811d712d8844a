//! Text-drawing natives: boxes, rules, banners, padding, progress bars.
//!
//! These return plain text the program can `display`; nothing here touches
//! the console directly.

use super::{int_arg, number_arg, text_arg};
use crate::error::{codes, StepsError};
use crate::registry::NativeRegistry;
use crate::value::Value;
use steps_macros::native;

fn width_arg(function: &str, args: &[Value], pos: usize) -> Result<usize, StepsError> {
    let width = int_arg(function, args, pos, "width")?;
    if width < 0 {
        return Err(StepsError::runtime(
            codes::NATIVE_ARG,
            format!("`{}` needs a non-negative width, got {}", function, width),
        ));
    }
    Ok(width as usize)
}

/// Draw text inside a one-line border box.
#[native(name = "box", params(text))]
pub fn native_box(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("box", args, 0, "text")?;
    let width = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let horizontal = "-".repeat(width + 2);
    let mut out = format!("+{}+", horizontal);
    for line in text.lines() {
        let pad = width - line.chars().count();
        out.push('\n');
        out.push_str(&format!("| {}{} |", line, " ".repeat(pad)));
    }
    if text.is_empty() {
        out.push_str("\n|  |");
    }
    out.push('\n');
    out.push_str(&format!("+{}+", horizontal));
    Ok(Value::Text(out))
}

/// A horizontal rule of `width` copies of `style`.
#[native(name = "line", params(width, style))]
pub fn native_line(args: &[Value]) -> Result<Value, StepsError> {
    let width = width_arg("line", args, 0)?;
    let style = text_arg("line", args, 1, "style")?;
    if style.chars().count() != 1 {
        return Err(StepsError::runtime(
            codes::NATIVE_ARG,
            "`line` needs a single-character style",
        )
        .with_hint("try \"-\" or \"=\""));
    }
    Ok(Value::Text(style.repeat(width)))
}

/// `=== text ===` headline.
#[native(name = "banner", params(text))]
pub fn native_banner(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("banner", args, 0, "text")?;
    Ok(Value::Text(format!("=== {} ===", text)))
}

#[native(name = "center_text", params(text, width))]
pub fn native_center_text(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("center_text", args, 0, "text")?;
    let width = width_arg("center_text", args, 1)?;
    let len = text.chars().count();
    if len >= width {
        return Ok(Value::Text(text.to_string()));
    }
    let left = (width - len) / 2;
    let right = width - len - left;
    Ok(Value::Text(format!(
        "{}{}{}",
        " ".repeat(left),
        text,
        " ".repeat(right)
    )))
}

/// Right-pad text with spaces to `width`.
#[native(name = "pad_text", params(text, width))]
pub fn native_pad_text(args: &[Value]) -> Result<Value, StepsError> {
    let text = text_arg("pad_text", args, 0, "text")?;
    let width = width_arg("pad_text", args, 1)?;
    let len = text.chars().count();
    if len >= width {
        return Ok(Value::Text(text.to_string()));
    }
    Ok(Value::Text(format!("{}{}", text, " ".repeat(width - len))))
}

/// `[####----]` bar showing current/total across `width` cells.
#[native(name = "progress_bar", params(current, total, width))]
pub fn native_progress_bar(args: &[Value]) -> Result<Value, StepsError> {
    let current = number_arg("progress_bar", args, 0, "current")?;
    let total = number_arg("progress_bar", args, 1, "total")?;
    let width = width_arg("progress_bar", args, 2)?;
    if total <= 0.0 {
        return Err(StepsError::runtime(
            codes::NATIVE_ARG,
            "`progress_bar` needs a positive total",
        ));
    }
    let ratio = (current / total).clamp(0.0, 1.0);
    let filled = (ratio * width as f64).round() as usize;
    Ok(Value::Text(format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(width - filled)
    )))
}

pub fn register(registry: &mut NativeRegistry) {
    register_native_box(registry);
    register_native_line(registry);
    register_native_banner(registry);
    register_native_center_text(registry);
    register_native_pad_text(registry);
    register_native_progress_bar(registry);
}
