// ABOUTME: Indentation-aware lexer: multi-word keywords, INDENT/DEDENT, notes

use crate::error::{codes, StepsError};
use crate::location::SourceLocation;
use crate::token::{self, Token, TokenKind};
use std::rc::Rc;

/// Spaces per indentation level.
const INDENT_WIDTH: usize = 4;

/// Token stream plus every lex error encountered. The lexer recovers and
/// keeps scanning so the parser can surface several problems at once.
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub errors: Vec<StepsError>,
}

pub fn lex(source: &str, file: &str) -> LexOutput {
    Lexer::new(source, file).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    file: Rc<str>,
    indent_stack: Vec<usize>,
    tokens: Vec<Token>,
    errors: Vec<StepsError>,
}

impl Lexer {
    fn new(source: &str, file: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            file: Rc::from(file),
            indent_stack: vec![0],
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> LexOutput {
        while !self.at_end() {
            self.lex_line();
        }

        // Close any open line, then unwind the indentation stack.
        if self
            .tokens
            .last()
            .map(|t| {
                !matches!(
                    t.kind,
                    TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
                )
            })
            .unwrap_or(false)
        {
            self.push(TokenKind::Newline, "");
        }
        while *self.indent_stack.last().unwrap_or(&0) > 0 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, "");
        }
        self.push(TokenKind::Eof, "");

        LexOutput {
            tokens: self.tokens,
            errors: self.errors,
        }
    }

    // ===== Character plumbing =====

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn here(&self) -> SourceLocation {
        SourceLocation::new(&self.file, self.line, self.col)
    }

    fn push(&mut self, kind: TokenKind, lexeme: &str) {
        let location = self.here();
        self.tokens.push(Token {
            kind,
            lexeme: lexeme.to_string(),
            location,
        });
    }

    fn push_at(&mut self, kind: TokenKind, lexeme: String, location: SourceLocation) {
        self.tokens.push(Token {
            kind,
            lexeme,
            location,
        });
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, location: SourceLocation) {
        self.errors.push(StepsError::lex(code, message, location));
    }

    fn skip_to_line_end(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn consume_newline(&mut self) {
        if self.peek() == Some('\r') {
            self.advance();
        }
        if self.peek() == Some('\n') {
            self.advance();
        }
    }

    // ===== Line structure =====

    /// Lex one physical line: measure indentation, adjust the indent stack,
    /// then scan tokens to the end of the line.
    fn lex_line(&mut self) {
        let indent_loc = self.here();
        let mut col = 0usize;
        let mut saw_tab = false;
        while let Some(c) = self.peek() {
            match c {
                ' ' => {
                    col += 1;
                    self.advance();
                }
                '\t' => {
                    saw_tab = true;
                    self.advance();
                }
                _ => break,
            }
        }

        if saw_tab {
            self.error(
                codes::TAB_INDENT,
                "tabs cannot be used for indentation",
                indent_loc,
            );
            self.skip_to_line_end();
            self.consume_newline();
            return;
        }

        // Blank lines never touch the indentation stack.
        match self.peek() {
            None => return,
            Some('\n') | Some('\r') => {
                self.consume_newline();
                return;
            }
            _ => {}
        }

        // Note lines do not touch the stack either. A full-line `note:`
        // sitting exactly at the current statement indent survives as a
        // Note statement; every other comment form is consumed here.
        if self.line_is_note() {
            self.lex_note_line(col);
            return;
        }

        self.apply_indent(col, indent_loc);
        self.lex_tokens_until_newline();
    }

    fn apply_indent(&mut self, col: usize, location: SourceLocation) {
        if col % INDENT_WIDTH != 0 {
            self.error(
                codes::INDENT_NOT_FOUR,
                format!("indentation of {} spaces is not a multiple of four", col),
                location.clone(),
            );
        }
        let top = *self.indent_stack.last().unwrap_or(&0);
        if col > top {
            self.indent_stack.push(col);
            self.push_at(TokenKind::Indent, String::new(), location);
        } else if col < top {
            while *self.indent_stack.last().unwrap_or(&0) > col {
                self.indent_stack.pop();
                self.push_at(TokenKind::Dedent, String::new(), location.clone());
            }
            if *self.indent_stack.last().unwrap_or(&0) != col {
                self.error(
                    codes::INCONSISTENT_INDENT,
                    "inconsistent indentation: no enclosing block at this depth",
                    location,
                );
            }
        }
    }

    /// True when the rest of the line starts with `note:` or `note block:`.
    fn line_is_note(&self) -> bool {
        self.word_at(0) == Some("note")
            && match self.char_after_word(0) {
                Some(':') => true,
                Some(' ') => {
                    self.word_at(5) == Some("block") && self.char_after_word(5) == Some(':')
                }
                _ => false,
            }
    }

    fn word_at(&self, offset: usize) -> Option<&'static str> {
        // Only used for "note" / "block" detection; compares in place.
        for candidate in ["note", "block"] {
            let mut matches = true;
            for (i, expected) in candidate.chars().enumerate() {
                if self.peek_at(offset + i) != Some(expected) {
                    matches = false;
                    break;
                }
            }
            if matches {
                let next = self.peek_at(offset + candidate.len());
                if !next.map(is_ident_char).unwrap_or(false) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn char_after_word(&self, offset: usize) -> Option<char> {
        let word = self.word_at(offset)?;
        self.peek_at(offset + word.len())
    }

    fn lex_note_line(&mut self, col: usize) {
        let start = self.here();
        if self.word_at(0) == Some("note") && self.char_after_word(0) == Some(' ') {
            // note block: ... end note
            self.skip_note_block(start);
            return;
        }

        // Single-line note. Keep it as a statement when it sits at the
        // current indent; otherwise it is trivia.
        for _ in 0.."note:".len() {
            self.advance();
        }
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.advance();
        }
        self.consume_newline();

        if col == *self.indent_stack.last().unwrap_or(&0) {
            self.push_at(TokenKind::Note, text.trim().to_string(), start.clone());
            self.push_at(TokenKind::Newline, String::new(), start);
        }
    }

    /// Consume `note block:` through the `end note` line, inclusive.
    fn skip_note_block(&mut self, start: SourceLocation) {
        self.skip_to_line_end();
        self.consume_newline();
        loop {
            if self.at_end() {
                self.error(
                    codes::UNTERMINATED_NOTE_BLOCK,
                    "`note block:` was never closed with `end note`",
                    start,
                );
                return;
            }
            // Examine the next line without structural effects.
            let mut idx = self.pos;
            while self.chars.get(idx) == Some(&' ') {
                idx += 1;
            }
            let rest: String = self.chars[idx..]
                .iter()
                .take_while(|c| **c != '\n')
                .collect();
            self.skip_to_line_end();
            self.consume_newline();
            if rest.trim_end() == "end note" {
                return;
            }
        }
    }

    // ===== In-line token scanning =====

    fn lex_tokens_until_newline(&mut self) {
        loop {
            match self.peek() {
                None => return,
                Some('\n') | Some('\r') => {
                    self.push(TokenKind::Newline, "");
                    self.consume_newline();
                    return;
                }
                Some(' ') => {
                    self.advance();
                }
                Some('"') => self.lex_text_literal(),
                Some(c) if c.is_ascii_digit() => self.lex_number(),
                Some(c) if is_ident_start(c) => {
                    if self.line_is_note() {
                        // Inline trailing comment: discard to end of line.
                        self.skip_to_line_end();
                        continue;
                    }
                    self.lex_word();
                }
                Some(c) => self.lex_punct(c),
            }
        }
    }

    fn lex_punct(&mut self, c: char) {
        let location = self.here();
        let kind = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        self.advance();
        match kind {
            Some(kind) => self.push_at(kind, c.to_string(), location),
            None => self.error(
                codes::UNKNOWN_CHAR,
                format!("unknown character `{}`", c),
                location,
            ),
        }
    }

    fn lex_number(&mut self) {
        let location = self.here();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.push_at(TokenKind::NumberLit, text, location);
    }

    fn lex_text_literal(&mut self) {
        let location = self.here();
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.error(
                        codes::UNTERMINATED_TEXT,
                        "text literal is missing its closing quote",
                        location.clone(),
                    );
                    break;
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    let escape_loc = self.here();
                    self.advance();
                    match self.peek() {
                        Some('n') => {
                            text.push('\n');
                            self.advance();
                        }
                        Some('t') => {
                            text.push('\t');
                            self.advance();
                        }
                        Some('r') => {
                            text.push('\r');
                            self.advance();
                        }
                        Some('"') => {
                            text.push('"');
                            self.advance();
                        }
                        Some('\\') => {
                            text.push('\\');
                            self.advance();
                        }
                        Some(other) => {
                            self.error(
                                codes::UNKNOWN_ESCAPE,
                                format!("unknown escape sequence `\\{}`", other),
                                escape_loc,
                            );
                            text.push(other);
                            self.advance();
                        }
                        None => {}
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        self.push_at(TokenKind::TextLit, text, location);
    }

    /// Keyword phrases are tried longest-first before the single-word
    /// keyword and identifier rules, so `is greater than or equal to`
    /// arrives as one token.
    fn lex_word(&mut self) {
        let location = self.here();

        if let Some((phrase, kind)) = self.match_phrase() {
            for _ in 0..phrase.chars().count() {
                self.advance();
            }
            self.push_at(kind, phrase.to_string(), location);
            return;
        }

        let mut word = String::new();
        while let Some(c) = self.peek() {
            if is_ident_char(c) {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if let Some(kind) = token::keyword(&word) {
            self.push_at(kind, word, location);
        } else if token::is_reserved_fragment(&word) {
            self.error(
                codes::RESERVED_WORD,
                format!("`{}` is a reserved word and cannot stand alone", word),
                location,
            );
        } else {
            self.push_at(TokenKind::Identifier, word, location);
        }
    }

    /// Attempt a multi-word phrase match at the current position. A phrase
    /// matches only when its words appear separated by single spaces and the
    /// character after it is not part of an identifier.
    fn match_phrase(&self) -> Option<(&'static str, TokenKind)> {
        'phrases: for (phrase, kind) in token::PHRASES {
            for (i, expected) in phrase.chars().enumerate() {
                if self.peek_at(i) != Some(expected) {
                    continue 'phrases;
                }
            }
            let after = self.peek_at(phrase.chars().count());
            if !after.map(is_ident_char).unwrap_or(false) {
                return Some((phrase, *kind));
            }
        }
        None
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let out = lex(source, "test.step");
        assert!(out.errors.is_empty(), "unexpected errors: {:?}", out.errors);
        out.tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_hello_building() {
        let source = "building: hello\n    display \"Hello, World!\"\n    exit\n";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Building,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Display,
                TokenKind::TextLit,
                TokenKind::Newline,
                TokenKind::Exit,
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_phrase_wins() {
        let toks = lex("x is greater than or equal to y\n", "t");
        let phrase: Vec<TokenKind> = toks.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            phrase,
            vec![
                TokenKind::Identifier,
                TokenKind::IsGreaterOrEqual,
                TokenKind::Identifier,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_phrase_requires_boundary() {
        // `is inside` must not match `is in`.
        let out = lex("x is in y\n", "t");
        assert_eq!(out.tokens[1].kind, TokenKind::IsIn);
        let out = lex("x is inside\n", "t");
        // No phrase matches; `is` alone is reserved.
        assert!(!out.errors.is_empty());
    }

    #[test]
    fn test_indent_dedent_pairing() {
        let source = "a\n    b\n        c\n    d\ne\n";
        let toks = lex(source, "t").tokens;
        let indents = toks.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = toks.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
    }

    #[test]
    fn test_dedent_at_eof() {
        let toks = lex("a\n    b", "t").tokens;
        let dedents = toks.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(dedents, 1);
        assert_eq!(toks.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_tab_indentation_is_error() {
        let out = lex("a\n\tb\n", "t");
        assert_eq!(out.errors[0].code, codes::TAB_INDENT);
    }

    #[test]
    fn test_non_multiple_of_four() {
        let out = lex("a\n   b\n", "t");
        assert_eq!(out.errors[0].code, codes::INDENT_NOT_FOUR);
    }

    #[test]
    fn test_inconsistent_dedent() {
        let out = lex("a\n        b\n    c\n", "t");
        assert!(out
            .errors
            .iter()
            .any(|e| e.code == codes::INCONSISTENT_INDENT));
    }

    #[test]
    fn test_blank_lines_ignored() {
        let source = "a\n\n    b\n\n";
        let out = lex(source, "t");
        assert!(out.errors.is_empty());
        let newlines = out
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Newline)
            .count();
        assert_eq!(newlines, 2);
    }

    #[test]
    fn test_note_line_at_statement_indent() {
        let source = "    display 1\n    note: remember this\n    display 2\n";
        // Indent of 4 from column zero: first line pushes a level.
        let out = lex(source, "t");
        assert!(out.errors.is_empty());
        assert!(out.tokens.iter().any(|t| t.kind == TokenKind::Note
            && t.lexeme == "remember this"));
    }

    #[test]
    fn test_note_block_discarded() {
        let source = "a\nnote block:\n   anything at all\nend note\nb\n";
        let out = lex(source, "t");
        assert!(out.errors.is_empty());
        let ids: Vec<&str> = out
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_unterminated_note_block() {
        let out = lex("note block:\nno end in sight\n", "t");
        assert_eq!(out.errors[0].code, codes::UNTERMINATED_NOTE_BLOCK);
    }

    #[test]
    fn test_inline_note_discarded() {
        let out = lex("display 1 note: trailing\n", "t");
        assert!(out.errors.is_empty());
        assert_eq!(
            out.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Display,
                TokenKind::NumberLit,
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_text_escapes() {
        let out = lex("\"a\\nb\\\"c\\\\d\"\n", "t");
        assert!(out.errors.is_empty());
        assert_eq!(out.tokens[0].lexeme, "a\nb\"c\\d");
    }

    #[test]
    fn test_unknown_escape() {
        let out = lex("\"a\\qb\"\n", "t");
        assert_eq!(out.errors[0].code, codes::UNKNOWN_ESCAPE);
    }

    #[test]
    fn test_unterminated_text() {
        let out = lex("display \"oops\n", "t");
        assert_eq!(out.errors[0].code, codes::UNTERMINATED_TEXT);
    }

    #[test]
    fn test_number_literals() {
        let out = lex("12 3.75\n", "t");
        assert_eq!(out.tokens[0].lexeme, "12");
        assert_eq!(out.tokens[1].lexeme, "3.75");
    }

    #[test]
    fn test_locations_are_one_based() {
        let out = lex("set x to 1\n", "t");
        let tok = &out.tokens[0];
        assert_eq!(tok.location.line, 1);
        assert_eq!(tok.location.column, 1);
        assert_eq!(out.tokens[1].location.column, 5);
    }

    #[test]
    fn test_reserved_fragment_rejected() {
        let out = lex("set greater to 1\n", "t");
        assert!(out.errors.iter().any(|e| e.code == codes::RESERVED_WORD));
    }
}
