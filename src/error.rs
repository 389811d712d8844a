// ABOUTME: Error model for the Steps pipeline, with stable codes and hints

use crate::location::SourceLocation;
use serde::Serialize;
use thiserror::Error;

/// Broad category an error belongs to. Catchability of a runtime error by
/// `attempt` is a property of its kind, not of the individual message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Bad project layout (missing files, name mismatches)
    Structure,
    Lex,
    Parse,
    Type,
    Runtime,
    /// Call-stack ceiling exceeded (E408)
    RecursionLimit,
    /// Iteration ceiling exceeded (E410)
    IterationLimit,
    /// Invariant violation or host I/O failure - an implementation bug,
    /// never a recoverable condition in Steps code
    Internal,
}

impl ErrorKind {
    /// Whether an `attempt` block may catch errors of this kind.
    pub fn catchable(self) -> bool {
        matches!(self, ErrorKind::Type | ErrorKind::Runtime)
    }
}

/// A single diagnostic from any stage of the pipeline.
///
/// Formatting for terminals is the caller's concern; `pretty` renders the
/// conventional `Error [E###] at file:line:col` form with a caret excerpt
/// when the caller can supply the source text.
#[derive(Error, Debug, Clone)]
#[error("[{code}] {message}")]
pub struct StepsError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    pub hint: Option<String>,
    pub location: Option<SourceLocation>,
}

impl StepsError {
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        StepsError {
            kind,
            code,
            message: message.into(),
            hint: None,
            location: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach a location only if the error does not already carry one.
    /// Natives raise errors without positions; the interpreter anchors them
    /// at the call site on the way out.
    pub fn anchored(mut self, location: &SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }

    // ===== Constructors for the common kinds =====

    pub fn structure(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structure, code, message)
    }

    pub fn lex(code: &'static str, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(ErrorKind::Lex, code, message).at(location)
    }

    pub fn parse(code: &'static str, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(ErrorKind::Parse, code, message).at(location)
    }

    pub fn type_error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, code, message)
    }

    pub fn runtime(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, codes::INTERNAL, message)
    }

    /// Render the error the way the CLI presents it, with the offending
    /// source line and a caret when `source` is available.
    pub fn pretty(&self, source: Option<&str>) -> String {
        let mut out = String::new();
        match &self.location {
            Some(loc) => out.push_str(&format!("Error [{}] at {} - {}", self.code, loc, self.message)),
            None => out.push_str(&format!("Error [{}] - {}", self.code, self.message)),
        }
        if let Some(hint) = &self.hint {
            out.push_str(&format!("\n  Hint: {}", hint));
        }
        if let (Some(loc), Some(text)) = (&self.location, source) {
            if let Some(line) = text.lines().nth(loc.line.saturating_sub(1)) {
                out.push_str(&format!("\n  {}", line));
                out.push_str(&format!("\n  {}^", " ".repeat(loc.column.saturating_sub(1))));
            }
        }
        out
    }

    /// Serializable view for `check --json`.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            code: self.code,
            kind: self.kind,
            message: self.message.clone(),
            hint: self.hint.clone(),
            file: self.location.as_ref().map(|l| l.file.to_string()),
            line: self.location.as_ref().map(|l| l.line),
            column: self.location.as_ref().map(|l| l.column),
        }
    }
}

/// Machine-readable diagnostic emitted by `check --json`.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

/// Stable error codes. The numbering bands are part of the language contract:
/// E1xx lex/parse, E2xx type, E3xx runtime, E4xx structure and ceilings,
/// E5xx internal.
pub mod codes {
    pub const UNKNOWN_CHAR: &str = "E101";
    pub const TAB_INDENT: &str = "E102";
    pub const INCONSISTENT_INDENT: &str = "E103";
    pub const UNTERMINATED_TEXT: &str = "E104";
    pub const UNKNOWN_ESCAPE: &str = "E105";
    pub const INDENT_NOT_FOUR: &str = "E106";
    pub const UNTERMINATED_NOTE_BLOCK: &str = "E107";
    pub const RESERVED_WORD: &str = "E108";

    pub const UNEXPECTED_TOKEN: &str = "E150";
    pub const MISSING_CLAUSE: &str = "E151";
    pub const BAD_ASSIGN_TARGET: &str = "E152";

    pub const WRONG_OPERAND: &str = "E201";
    pub const FAILED_CONVERSION: &str = "E202";
    pub const FIXED_VIOLATION: &str = "E203";
    pub const NON_INTEGER_INDEX: &str = "E204";

    pub const UNDEFINED_NAME: &str = "E301";
    pub const DIVISION_BY_ZERO: &str = "E302";
    pub const INDEX_OUT_OF_RANGE: &str = "E303";
    pub const KEY_NOT_FOUND: &str = "E304";
    pub const WRONG_ARG_COUNT: &str = "E305";
    pub const MISSING_RETURN: &str = "E306";
    pub const RETURN_OUTSIDE_STEP: &str = "E307";
    pub const NATIVE_ARG: &str = "E308";

    pub const DUPLICATE_STEP: &str = "E401";
    pub const MISSING_BUILDING: &str = "E402";
    pub const FLOOR_MISMATCH: &str = "E403";
    pub const STEP_NAME_MISMATCH: &str = "E404";
    pub const NATIVE_COLLISION: &str = "E405";
    pub const MISSING_STEP_FILE: &str = "E406";
    pub const FLOOR_DECL_MISMATCH: &str = "E407";
    pub const RECURSION_LIMIT: &str = "E408";
    pub const ITERATION_LIMIT: &str = "E410";

    pub const INTERNAL: &str = "E501";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_catchability() {
        assert!(ErrorKind::Type.catchable());
        assert!(ErrorKind::Runtime.catchable());
        assert!(!ErrorKind::RecursionLimit.catchable());
        assert!(!ErrorKind::IterationLimit.catchable());
        assert!(!ErrorKind::Structure.catchable());
        assert!(!ErrorKind::Internal.catchable());
    }

    #[test]
    fn test_pretty_with_source() {
        let file: Rc<str> = Rc::from("main.building");
        let err = StepsError::lex(
            codes::TAB_INDENT,
            "tabs cannot be used for indentation",
            SourceLocation::new(&file, 2, 1),
        )
        .with_hint("indent with four spaces per level");
        let rendered = err.pretty(Some("building: demo\n\tdisplay 1\n"));
        assert!(rendered.contains("Error [E102] at main.building:2:1"));
        assert!(rendered.contains("Hint: indent with four spaces"));
        assert!(rendered.ends_with("^"));
    }

    #[test]
    fn test_anchored_does_not_overwrite() {
        let file: Rc<str> = Rc::from("a.step");
        let original = SourceLocation::new(&file, 1, 1);
        let other = SourceLocation::new(&file, 9, 9);
        let err = StepsError::runtime(codes::DIVISION_BY_ZERO, "division by zero")
            .at(original.clone())
            .anchored(&other);
        assert_eq!(err.location, Some(original));
    }
}
