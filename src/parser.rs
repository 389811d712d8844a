// ABOUTME: Recursive-descent parser: building, floor, and step files

use crate::ast::*;
use crate::error::{codes, StepsError};
use crate::lexer;
use crate::location::SourceLocation;
use crate::token::{Token, TokenKind};
use crate::value::TypeTag;

/// Parse a `.building` file. Returns the node (possibly partial) together
/// with every lex and parse error collected along the way.
pub fn parse_building(source: &str, file: &str) -> (Option<Building>, Vec<StepsError>) {
    let lexed = lexer::lex(source, file);
    let mut parser = Parser::new(lexed.tokens, lexed.errors);
    let node = parser.building();
    (node, parser.errors)
}

/// Parse a `.floor` file.
pub fn parse_floor(source: &str, file: &str) -> (Option<Floor>, Vec<StepsError>) {
    let lexed = lexer::lex(source, file);
    let mut parser = Parser::new(lexed.tokens, lexed.errors);
    let node = parser.floor();
    (node, parser.errors)
}

/// Parse a `.step` file.
pub fn parse_step(source: &str, file: &str) -> (Option<Step>, Vec<StepsError>) {
    let lexed = lexer::lex(source, file);
    let mut parser = Parser::new(lexed.tokens, lexed.errors);
    let node = parser.step_file();
    (node, parser.errors)
}

/// Parse an isolated fragment as a statement list - the validation and REPL
/// entry point.
pub fn parse_fragment(source: &str, file: &str) -> (Vec<Statement>, Vec<StepsError>) {
    let lexed = lexer::lex(source, file);
    let mut parser = Parser::new(lexed.tokens, lexed.errors);
    let statements = parser.fragment();
    (statements, parser.errors)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<StepsError>,
}

type ParseResult<T> = Result<T, StepsError>;

impl Parser {
    fn new(tokens: Vec<Token>, errors: Vec<StepsError>) -> Self {
        Parser {
            tokens,
            pos: 0,
            errors,
        }
    }

    // ===== Token plumbing =====

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            let found = self.peek();
            Err(StepsError::parse(
                codes::UNEXPECTED_TOKEN,
                format!("expected {}, found {}", kind, found.kind),
                found.location.clone(),
            ))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<(String, SourceLocation)> {
        if self.peek_kind() == TokenKind::Identifier {
            let token = self.advance();
            Ok((token.lexeme, token.location))
        } else {
            let found = self.peek();
            Err(StepsError::parse(
                codes::UNEXPECTED_TOKEN,
                format!("expected {}, found {}", what, found.kind),
                found.location.clone(),
            ))
        }
    }

    /// Identifier in a binding position. `problem_message` arrives as its
    /// own keyword token and gets a pointed diagnostic here; everywhere an
    /// identifier is expected it is already not one.
    fn expect_binding_name(&mut self, what: &str) -> ParseResult<(String, SourceLocation)> {
        if self.peek_kind() == TokenKind::ProblemMessage {
            let token = self.advance();
            return Err(StepsError::parse(
                codes::BAD_ASSIGN_TARGET,
                "`problem_message` is bound by `if unsuccessful:` and cannot be assigned",
                token.location,
            ));
        }
        self.expect_identifier(what)
    }

    /// Consume note lines sitting between clauses, where no statement list
    /// collects them.
    fn skip_notes(&mut self) {
        while self.peek_kind() == TokenKind::Note {
            self.advance();
            self.eat(TokenKind::Newline);
        }
    }

    /// Record an error and skip to the start of the next statement at the
    /// current block depth.
    fn recover(&mut self, error: StepsError) {
        self.errors.push(error);
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Indent => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Dedent => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Newline => {
                    self.advance();
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ===== File-kind entry points =====

    fn building(&mut self) -> Option<Building> {
        let header = (|| -> ParseResult<(String, SourceLocation)> {
            let kw = self.expect(TokenKind::Building)?;
            self.expect(TokenKind::Colon)?;
            let (name, _) = self.expect_identifier("the building name")?;
            self.expect(TokenKind::Newline)?;
            Ok((name, kw.location))
        })();
        let (name, location) = match header {
            Ok(pair) => pair,
            Err(e) => {
                self.errors.push(e);
                return None;
            }
        };

        let mut declares = Vec::new();
        let mut body = Vec::new();

        if self.eat(TokenKind::Indent) {
            // Building bodies accept `declare:`/`do:` sections or bare
            // statements directly under the header.
            while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                match self.peek_kind() {
                    TokenKind::Declare => match self.declare_block() {
                        Ok(mut lines) => declares.append(&mut lines),
                        Err(e) => self.recover(e),
                    },
                    TokenKind::Do => {
                        self.advance();
                        match self.block_after_colon() {
                            Ok(mut statements) => body.append(&mut statements),
                            Err(e) => self.recover(e),
                        }
                    }
                    _ => match self.statement() {
                        Ok(statement) => body.push(statement),
                        Err(e) => self.recover(e),
                    },
                }
            }
            self.eat(TokenKind::Dedent);
        }

        Some(Building {
            name,
            declares,
            body,
            location,
        })
    }

    fn floor(&mut self) -> Option<Floor> {
        let header = (|| -> ParseResult<(String, SourceLocation)> {
            let kw = self.expect(TokenKind::Floor)?;
            self.expect(TokenKind::Colon)?;
            let (name, _) = self.expect_identifier("the floor name")?;
            self.expect(TokenKind::Newline)?;
            Ok((name, kw.location))
        })();
        let (name, location) = match header {
            Ok(pair) => pair,
            Err(e) => {
                self.errors.push(e);
                return None;
            }
        };

        let mut steps = Vec::new();
        if self.eat(TokenKind::Indent) {
            while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                self.skip_notes();
                if matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                    break;
                }
                let decl = (|| -> ParseResult<StepDecl> {
                    let kw = self.expect(TokenKind::Step)?;
                    self.expect(TokenKind::Colon)?;
                    let (name, _) = self.expect_identifier("a step name")?;
                    self.expect(TokenKind::Newline)?;
                    Ok(StepDecl {
                        name,
                        location: kw.location,
                    })
                })();
                match decl {
                    Ok(decl) => steps.push(decl),
                    Err(e) => self.recover(e),
                }
            }
            self.eat(TokenKind::Dedent);
        }

        if steps.is_empty() {
            self.errors.push(StepsError::parse(
                codes::MISSING_CLAUSE,
                format!("floor `{}` declares no steps", name),
                location.clone(),
            ));
        }

        Some(Floor {
            name,
            steps,
            location,
        })
    }

    fn step_file(&mut self) -> Option<Step> {
        let header = (|| -> ParseResult<(String, SourceLocation)> {
            let kw = self.expect(TokenKind::Step)?;
            self.expect(TokenKind::Colon)?;
            let (name, _) = self.expect_identifier("the step name")?;
            self.expect(TokenKind::Newline)?;
            Ok((name, kw.location))
        })();
        let (name, location) = match header {
            Ok(pair) => pair,
            Err(e) => {
                self.errors.push(e);
                return None;
            }
        };

        if !self.eat(TokenKind::Indent) {
            self.errors.push(StepsError::parse(
                codes::MISSING_CLAUSE,
                format!("step `{}` has an empty body", name),
                location.clone(),
            ));
            return None;
        }

        self.skip_notes();
        let floor = match self.belongs_to_clause() {
            Ok(floor) => floor,
            Err(e) => {
                self.recover(e);
                String::new()
            }
        };

        self.skip_notes();
        let (params, returns) = self.signature_clauses();
        self.skip_notes();

        let mut risers = Vec::new();
        while self.peek_kind() == TokenKind::Riser {
            match self.riser() {
                Ok(riser) => risers.push(riser),
                Err(e) => self.recover(e),
            }
            self.skip_notes();
        }

        let declares = if self.peek_kind() == TokenKind::Declare {
            match self.declare_block() {
                Ok(lines) => lines,
                Err(e) => {
                    self.recover(e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        self.skip_notes();
        let body = match self.do_block(&name, &location) {
            Ok(body) => body,
            Err(e) => {
                self.recover(e);
                Vec::new()
            }
        };

        self.eat(TokenKind::Dedent);

        Some(Step {
            name,
            floor,
            params,
            returns,
            declares,
            risers,
            body,
            location,
        })
    }

    fn fragment(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Newline | TokenKind::Dedent => {
                    self.advance();
                }
                _ => match self.statement() {
                    Ok(statement) => statements.push(statement),
                    Err(e) => self.recover(e),
                },
            }
        }
        statements
    }

    // ===== Step clauses =====

    fn belongs_to_clause(&mut self) -> ParseResult<String> {
        if self.peek_kind() != TokenKind::BelongsTo {
            let found = self.peek();
            return Err(StepsError::parse(
                codes::MISSING_CLAUSE,
                "step files must declare `belongs to:` first",
                found.location.clone(),
            )
            .with_hint("add a line like `belongs to: kitchen`"));
        }
        self.advance();
        self.expect(TokenKind::Colon)?;
        let (floor, _) = self.expect_identifier("the floor name")?;
        self.expect(TokenKind::Newline)?;
        Ok(floor)
    }

    fn signature_clauses(&mut self) -> (Vec<String>, Option<String>) {
        let mut params = Vec::new();
        let mut returns = None;

        if self.peek_kind() == TokenKind::Expects {
            let result = (|| -> ParseResult<Vec<String>> {
                self.advance();
                self.expect(TokenKind::Colon)?;
                let mut names = Vec::new();
                loop {
                    let (name, _) = self.expect_binding_name("a parameter name")?;
                    names.push(name);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::Newline)?;
                Ok(names)
            })();
            match result {
                Ok(names) => params = names,
                Err(e) => self.recover(e),
            }
        }

        self.skip_notes();
        if self.peek_kind() == TokenKind::Returns {
            let result = (|| -> ParseResult<String> {
                self.advance();
                self.expect(TokenKind::Colon)?;
                let (name, _) = self.expect_binding_name("the returned name")?;
                self.expect(TokenKind::Newline)?;
                Ok(name)
            })();
            match result {
                Ok(name) => returns = Some(name),
                Err(e) => self.recover(e),
            }
        }

        (params, returns)
    }

    fn riser(&mut self) -> ParseResult<Riser> {
        let kw = self.expect(TokenKind::Riser)?;
        self.expect(TokenKind::Colon)?;
        let (name, _) = self.expect_identifier("the riser name")?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;

        self.skip_notes();
        let (params, returns) = self.signature_clauses();
        self.skip_notes();

        let declares = if self.peek_kind() == TokenKind::Declare {
            self.declare_block()?
        } else {
            Vec::new()
        };

        self.skip_notes();
        let body = self.do_block(&name, &kw.location)?;
        self.expect(TokenKind::Dedent)?;

        Ok(Riser {
            name,
            params,
            returns,
            declares,
            body,
            location: kw.location,
        })
    }

    fn do_block(&mut self, owner: &str, owner_loc: &SourceLocation) -> ParseResult<Vec<Statement>> {
        if self.peek_kind() != TokenKind::Do {
            return Err(StepsError::parse(
                codes::MISSING_CLAUSE,
                format!("`{}` is missing its `do:` block", owner),
                owner_loc.clone(),
            ));
        }
        self.advance();
        self.block_after_colon()
    }

    fn declare_block(&mut self) -> ParseResult<Vec<Declaration>> {
        self.expect(TokenKind::Declare)?;
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        let mut lines = Vec::new();
        if self.eat(TokenKind::Indent) {
            while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                self.skip_notes();
                if matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                    break;
                }
                let line = (|| -> ParseResult<Declaration> {
                    let (name, location) = self.expect_binding_name("a variable name")?;
                    self.expect(TokenKind::As)?;
                    let type_tag = self.type_keyword()?;
                    let fixed = self.eat(TokenKind::Fixed);
                    self.expect(TokenKind::Newline)?;
                    Ok(Declaration {
                        name,
                        type_tag,
                        fixed,
                        location,
                    })
                })();
                match line {
                    Ok(line) => lines.push(line),
                    Err(e) => self.recover(e),
                }
            }
            self.eat(TokenKind::Dedent);
        }
        Ok(lines)
    }

    fn type_keyword(&mut self) -> ParseResult<TypeTag> {
        let tag = match self.peek_kind() {
            TokenKind::NumberType => TypeTag::Number,
            TokenKind::TextType => TypeTag::Text,
            TokenKind::BooleanType => TypeTag::Boolean,
            TokenKind::ListType => TypeTag::List,
            TokenKind::TableType => TypeTag::Table,
            TokenKind::Nothing => TypeTag::Nothing,
            _ => {
                let found = self.peek();
                return Err(StepsError::parse(
                    codes::UNEXPECTED_TOKEN,
                    format!("expected a type name, found {}", found.kind),
                    found.location.clone(),
                )
                .with_hint("types are number, text, boolean, list, table, nothing"));
            }
        };
        self.advance();
        Ok(tag)
    }

    /// `: NEWLINE INDENT statements DEDENT`, tolerating an empty block when
    /// the body is absent (`attempt:` directly followed by `if unsuccessful:`).
    fn block_after_colon(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        let mut statements = Vec::new();
        if self.eat(TokenKind::Indent) {
            while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
                match self.statement() {
                    Ok(statement) => statements.push(statement),
                    Err(e) => self.recover(e),
                }
            }
            self.eat(TokenKind::Dedent);
        }
        Ok(statements)
    }

    // ===== Statements =====

    fn statement(&mut self) -> ParseResult<Statement> {
        match self.peek_kind() {
            TokenKind::Display => {
                let kw = self.advance();
                let value = self.expression()?;
                self.expect(TokenKind::Newline)?;
                Ok(Statement::Display {
                    value,
                    location: kw.location,
                })
            }
            TokenKind::Indicate => {
                let kw = self.advance();
                let value = self.expression()?;
                self.expect(TokenKind::Newline)?;
                Ok(Statement::Indicate {
                    value,
                    location: kw.location,
                })
            }
            TokenKind::Set => self.set_statement(),
            TokenKind::Call => self.call_statement(),
            TokenKind::Return => {
                let kw = self.advance();
                let value = if self.peek_kind() == TokenKind::Newline {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::Newline)?;
                Ok(Statement::Return {
                    value,
                    location: kw.location,
                })
            }
            TokenKind::Exit => {
                let kw = self.advance();
                self.expect(TokenKind::Newline)?;
                Ok(Statement::Exit {
                    location: kw.location,
                })
            }
            TokenKind::If => self.if_statement(),
            TokenKind::Repeat => self.repeat_statement(),
            TokenKind::Attempt => self.attempt_statement(),
            TokenKind::Add => {
                let kw = self.advance();
                let value = self.expression()?;
                self.expect(TokenKind::To)?;
                let list = self.expression()?;
                self.expect(TokenKind::Newline)?;
                Ok(Statement::AddToList {
                    value,
                    list,
                    location: kw.location,
                })
            }
            TokenKind::Remove => {
                let kw = self.advance();
                let value = self.expression()?;
                self.expect(TokenKind::From)?;
                let list = self.expression()?;
                self.expect(TokenKind::Newline)?;
                Ok(Statement::RemoveFromList {
                    value,
                    list,
                    location: kw.location,
                })
            }
            TokenKind::ClearConsole => {
                let kw = self.advance();
                self.expect(TokenKind::Newline)?;
                Ok(Statement::ClearConsole {
                    location: kw.location,
                })
            }
            TokenKind::Note => {
                let token = self.advance();
                self.expect(TokenKind::Newline)?;
                Ok(Statement::Note {
                    text: token.lexeme,
                    location: token.location,
                })
            }
            _ => {
                let found = self.peek();
                Err(StepsError::parse(
                    codes::UNEXPECTED_TOKEN,
                    format!("expected a statement, found {}", found.kind),
                    found.location.clone(),
                ))
            }
        }
    }

    fn set_statement(&mut self) -> ParseResult<Statement> {
        let kw = self.advance();

        if self.peek_kind() == TokenKind::IterationLimit {
            self.advance();
            self.expect(TokenKind::To)?;
            let value = self.expression()?;
            self.expect(TokenKind::Newline)?;
            return Ok(Statement::SetIterationLimit {
                value,
                location: kw.location,
            });
        }

        let (name, name_loc) = self.expect_binding_name("a variable name")?;
        let target = if self.eat(TokenKind::LBracket) {
            let index = self.expression()?;
            self.expect(TokenKind::RBracket)?;
            AssignTarget::Index { name, index }
        } else {
            AssignTarget::Name(name)
        };
        // Anything fancier than a name or one indexed position cannot be
        // assigned.
        if self.peek_kind() == TokenKind::LBracket {
            return Err(StepsError::parse(
                codes::BAD_ASSIGN_TARGET,
                "only a name or a single indexed position can be assigned",
                name_loc,
            ));
        }
        self.expect(TokenKind::To)?;
        let value = self.expression()?;
        self.expect(TokenKind::Newline)?;
        Ok(Statement::Set {
            target,
            value,
            location: kw.location,
        })
    }

    fn call_statement(&mut self) -> ParseResult<Statement> {
        let kw = self.advance();
        let (name, _) = self.expect_identifier("a step name")?;
        let mut args = Vec::new();
        if self.eat(TokenKind::With) {
            loop {
                args.push(self.expression()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let store_in = if self.eat(TokenKind::StoringResultIn) {
            let (target, _) = self.expect_binding_name("a variable name")?;
            Some(target)
        } else {
            None
        };
        self.expect(TokenKind::Newline)?;
        Ok(Statement::Call {
            name,
            args,
            store_in,
            location: kw.location,
        })
    }

    fn if_statement(&mut self) -> ParseResult<Statement> {
        let kw = self.advance();
        let condition = self.expression()?;
        let body = self.block_after_colon()?;
        let mut branches = vec![(condition, body)];

        while self.peek_kind() == TokenKind::OtherwiseIf {
            self.advance();
            let condition = self.expression()?;
            let body = self.block_after_colon()?;
            branches.push((condition, body));
        }

        let otherwise = if self.peek_kind() == TokenKind::Otherwise {
            self.advance();
            Some(self.block_after_colon()?)
        } else {
            None
        };

        Ok(Statement::If {
            branches,
            otherwise,
            location: kw.location,
        })
    }

    fn repeat_statement(&mut self) -> ParseResult<Statement> {
        let kw = self.advance();
        match self.peek_kind() {
            TokenKind::ForEach => {
                self.advance();
                let (var, _) = self.expect_binding_name("the loop variable")?;
                self.expect(TokenKind::In)?;
                let collection = self.expression()?;
                let body = self.block_after_colon()?;
                Ok(Statement::RepeatForEach {
                    var,
                    collection,
                    body,
                    location: kw.location,
                })
            }
            TokenKind::While => {
                self.advance();
                let condition = self.expression()?;
                let body = self.block_after_colon()?;
                Ok(Statement::RepeatWhile {
                    condition,
                    body,
                    location: kw.location,
                })
            }
            _ => {
                let count = self.expression()?;
                self.expect(TokenKind::Times)?;
                let body = self.block_after_colon()?;
                Ok(Statement::RepeatTimes {
                    count,
                    body,
                    location: kw.location,
                })
            }
        }
    }

    fn attempt_statement(&mut self) -> ParseResult<Statement> {
        let kw = self.advance();
        let try_body = self.block_after_colon()?;

        if self.peek_kind() != TokenKind::IfUnsuccessful {
            let found = self.peek();
            return Err(StepsError::parse(
                codes::MISSING_CLAUSE,
                format!(
                    "`attempt:` needs an `if unsuccessful:` block, found {}",
                    found.kind
                ),
                found.location.clone(),
            ));
        }
        self.advance();
        let rescue_body = self.block_after_colon()?;

        if self.peek_kind() != TokenKind::ThenContinue {
            let found = self.peek();
            return Err(StepsError::parse(
                codes::MISSING_CLAUSE,
                format!(
                    "`attempt:` needs a `then continue:` block, found {}",
                    found.kind
                ),
                found.location.clone(),
            ));
        }
        self.advance();
        let always_body = self.block_after_colon()?;

        Ok(Statement::Attempt {
            try_body,
            rescue_body,
            always_body,
            location: kw.location,
        })
    }

    // ===== Expressions, lowest precedence first =====

    fn expression(&mut self) -> ParseResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.peek_kind() == TokenKind::Or {
            let op_tok = self.advance();
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location: op_tok.location,
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.not_expr()?;
        while self.peek_kind() == TokenKind::And {
            let op_tok = self.advance();
            let rhs = self.not_expr()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location: op_tok.location,
            };
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> ParseResult<Expr> {
        if self.peek_kind() == TokenKind::Not {
            let op_tok = self.advance();
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
                location: op_tok.location,
            });
        }
        self.equality_expr()
    }

    fn equality_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.comparison_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::IsEqualTo | TokenKind::Equals => BinOp::Equal,
                TokenKind::IsNotEqualTo => BinOp::NotEqual,
                TokenKind::Contains => BinOp::Contains,
                TokenKind::StartsWith => BinOp::StartsWith,
                TokenKind::EndsWith => BinOp::EndsWith,
                TokenKind::IsIn => BinOp::IsIn,
                TokenKind::IsA => {
                    let op_tok = self.advance();
                    let tag = self.type_keyword()?;
                    lhs = Expr::IsA {
                        operand: Box::new(lhs),
                        tag,
                        location: op_tok.location,
                    };
                    continue;
                }
                _ => break,
            };
            let op_tok = self.advance();
            let rhs = self.comparison_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location: op_tok.location,
            };
        }
        Ok(lhs)
    }

    fn comparison_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.additive_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::IsLessThan => BinOp::Less,
                TokenKind::IsLessOrEqual => BinOp::LessOrEqual,
                TokenKind::IsGreaterThan => BinOp::Greater,
                TokenKind::IsGreaterOrEqual => BinOp::GreaterOrEqual,
                _ => break,
            };
            let op_tok = self.advance();
            let rhs = self.additive_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location: op_tok.location,
            };
        }
        Ok(lhs)
    }

    fn additive_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.multiplicative_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Subtract,
                TokenKind::AddedTo => BinOp::AddedTo,
                TokenKind::SplitBy => BinOp::SplitBy,
                _ => break,
            };
            let op_tok = self.advance();
            let rhs = self.multiplicative_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location: op_tok.location,
            };
        }
        Ok(lhs)
    }

    fn multiplicative_expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Multiply,
                TokenKind::Slash => BinOp::Divide,
                _ => break,
            };
            let op_tok = self.advance();
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location: op_tok.location,
            };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> ParseResult<Expr> {
        if self.peek_kind() == TokenKind::Minus {
            let op_tok = self.advance();
            let operand = self.unary_expr()?;
            return Ok(Expr::Unary {
                op: UnOp::Negate,
                operand: Box::new(operand),
                location: op_tok.location,
            });
        }
        self.postfix_expr()
    }

    /// Postfix: `as <type>`, `as decimal(N)`, `[index]`. Indexing binds
    /// tighter than `as`, and `as` binds tighter than `added to`.
    fn postfix_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek_kind() {
                TokenKind::LBracket => {
                    let bracket = self.advance();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        location: bracket.location,
                    };
                }
                TokenKind::As => {
                    let as_tok = self.advance();
                    if self.peek_kind() == TokenKind::Decimal {
                        self.advance();
                        self.expect(TokenKind::LParen)?;
                        let places = self.expression()?;
                        self.expect(TokenKind::RParen)?;
                        expr = Expr::FormatDecimal {
                            operand: Box::new(expr),
                            places: Box::new(places),
                            location: as_tok.location,
                        };
                    } else {
                        let tag = self.type_keyword()?;
                        expr = Expr::Convert {
                            operand: Box::new(expr),
                            to: tag,
                            location: as_tok.location,
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary_expr(&mut self) -> ParseResult<Expr> {
        match self.peek_kind() {
            TokenKind::NumberLit => {
                let token = self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    StepsError::parse(
                        codes::UNEXPECTED_TOKEN,
                        format!("malformed number `{}`", token.lexeme),
                        token.location.clone(),
                    )
                })?;
                Ok(Expr::NumberLit {
                    value,
                    location: token.location,
                })
            }
            TokenKind::TextLit => {
                let token = self.advance();
                Ok(Expr::TextLit {
                    value: token.lexeme,
                    location: token.location,
                })
            }
            TokenKind::True | TokenKind::False => {
                let token = self.advance();
                Ok(Expr::BooleanLit {
                    value: token.kind == TokenKind::True,
                    location: token.location,
                })
            }
            TokenKind::Nothing => {
                let token = self.advance();
                Ok(Expr::NothingLit {
                    location: token.location,
                })
            }
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(Expr::Identifier {
                    name: token.lexeme,
                    location: token.location,
                })
            }
            // Readable, never assignable; the interpreter binds it during
            // `if unsuccessful:` and lookup fails anywhere else.
            TokenKind::ProblemMessage => {
                let token = self.advance();
                Ok(Expr::Identifier {
                    name: token.lexeme,
                    location: token.location,
                })
            }
            TokenKind::Input => {
                let token = self.advance();
                // `input as number` converts the read line; `as decimal`
                // stays a postfix on the resulting value.
                let as_type = if self.peek_kind() == TokenKind::As
                    && self.peek_kind_at(1) != TokenKind::Decimal
                {
                    self.advance();
                    Some(self.type_keyword()?)
                } else {
                    None
                };
                Ok(Expr::Input {
                    as_type,
                    location: token.location,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.container_literal(),
            TokenKind::LengthOf => {
                let token = self.advance();
                let operand = self.postfix_expr()?;
                Ok(Expr::LengthOf {
                    operand: Box::new(operand),
                    location: token.location,
                })
            }
            TokenKind::CharacterAt => {
                let token = self.advance();
                let index = self.additive_expr()?;
                self.expect(TokenKind::Of)?;
                let text = self.postfix_expr()?;
                Ok(Expr::CharacterAt {
                    index: Box::new(index),
                    text: Box::new(text),
                    location: token.location,
                })
            }
            TokenKind::TypeOf => {
                let token = self.advance();
                let operand = self.postfix_expr()?;
                Ok(Expr::TypeOf {
                    operand: Box::new(operand),
                    location: token.location,
                })
            }
            _ => {
                let found = self.peek();
                Err(StepsError::parse(
                    codes::UNEXPECTED_TOKEN,
                    format!("expected a value, found {}", found.kind),
                    found.location.clone(),
                ))
            }
        }
    }

    /// `[]` empty list, `[:]` empty table, `[a, b]` list, `["k": v]` table.
    fn container_literal(&mut self) -> ParseResult<Expr> {
        let bracket = self.advance();

        if self.eat(TokenKind::RBracket) {
            return Ok(Expr::ListLit {
                items: Vec::new(),
                location: bracket.location,
            });
        }
        if self.peek_kind() == TokenKind::Colon {
            self.advance();
            self.expect(TokenKind::RBracket)?;
            return Ok(Expr::TableLit {
                entries: Vec::new(),
                location: bracket.location,
            });
        }

        let first = self.expression()?;
        if self.eat(TokenKind::Colon) {
            let mut entries = Vec::new();
            let value = self.expression()?;
            entries.push((first, value));
            while self.eat(TokenKind::Comma) {
                let key = self.expression()?;
                self.expect(TokenKind::Colon)?;
                let value = self.expression()?;
                entries.push((key, value));
            }
            self.expect(TokenKind::RBracket)?;
            Ok(Expr::TableLit {
                entries,
                location: bracket.location,
            })
        } else {
            let mut items = vec![first];
            while self.eat(TokenKind::Comma) {
                items.push(self.expression()?);
            }
            self.expect(TokenKind::RBracket)?;
            Ok(Expr::ListLit {
                items,
                location: bracket.location,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(source: &str) -> Vec<Statement> {
        let (statements, errors) = parse_fragment(source, "frag");
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        statements
    }

    #[test]
    fn test_parse_hello_building() {
        let source = "building: hello\n    display \"Hello, World!\"\n    exit\n";
        let (building, errors) = parse_building(source, "hello.building");
        assert!(errors.is_empty(), "{:?}", errors);
        let building = building.unwrap();
        assert_eq!(building.name, "hello");
        assert_eq!(building.body.len(), 2);
        assert!(matches!(building.body[1], Statement::Exit { .. }));
    }

    #[test]
    fn test_parse_building_with_sections() {
        let source = "building: demo\n    declare:\n        score as number fixed\n    do:\n        set score to 10\n";
        let (building, errors) = parse_building(source, "demo.building");
        assert!(errors.is_empty(), "{:?}", errors);
        let building = building.unwrap();
        assert_eq!(building.declares.len(), 1);
        assert!(building.declares[0].fixed);
        assert_eq!(building.body.len(), 1);
    }

    #[test]
    fn test_parse_floor() {
        let source = "floor: math\n    step: calculate_tip\n    step: add_tax\n";
        let (floor, errors) = parse_floor(source, "math.floor");
        assert!(errors.is_empty(), "{:?}", errors);
        let floor = floor.unwrap();
        assert_eq!(floor.name, "math");
        assert_eq!(floor.steps.len(), 2);
        assert_eq!(floor.steps[0].name, "calculate_tip");
    }

    #[test]
    fn test_parse_step_full() {
        let source = concat!(
            "step: calculate_tip\n",
            "    belongs to: math\n",
            "    expects: amount, percent\n",
            "    returns: tip\n",
            "    declare:\n",
            "        tip as number\n",
            "    do:\n",
            "        set tip to amount * percent / 100\n",
            "        return tip\n",
        );
        let (step, errors) = parse_step(source, "calculate_tip.step");
        assert!(errors.is_empty(), "{:?}", errors);
        let step = step.unwrap();
        assert_eq!(step.name, "calculate_tip");
        assert_eq!(step.floor, "math");
        assert_eq!(step.params, vec!["amount", "percent"]);
        assert_eq!(step.returns.as_deref(), Some("tip"));
        assert_eq!(step.declares.len(), 1);
        assert_eq!(step.body.len(), 2);
    }

    #[test]
    fn test_step_missing_belongs_to() {
        let source = "step: lonely\n    do:\n        exit\n";
        let (_, errors) = parse_step(source, "lonely.step");
        assert!(errors.iter().any(|e| e.code == codes::MISSING_CLAUSE));
    }

    #[test]
    fn test_parse_riser() {
        let source = concat!(
            "step: outer\n",
            "    belongs to: main\n",
            "    riser: helper\n",
            "        expects: x\n",
            "        returns: y\n",
            "        do:\n",
            "            return x * 2\n",
            "    do:\n",
            "        call helper with 3 storing result in r\n",
        );
        let (step, errors) = parse_step(source, "outer.step");
        assert!(errors.is_empty(), "{:?}", errors);
        let step = step.unwrap();
        assert_eq!(step.risers.len(), 1);
        assert_eq!(step.risers[0].name, "helper");
        assert_eq!(step.risers[0].params, vec!["x"]);
    }

    #[test]
    fn test_if_chain() {
        let source = concat!(
            "if x is greater than 10:\n",
            "    display \"big\"\n",
            "otherwise if x is greater than 5:\n",
            "    display \"medium\"\n",
            "otherwise:\n",
            "    display \"small\"\n",
        );
        let parsed = statements(source);
        assert_eq!(parsed.len(), 1);
        match &parsed[0] {
            Statement::If {
                branches, otherwise, ..
            } => {
                assert_eq!(branches.len(), 2);
                assert!(otherwise.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_repeat_forms() {
        let parsed = statements("repeat 3 times:\n    display 1\n");
        assert!(matches!(parsed[0], Statement::RepeatTimes { .. }));

        let parsed = statements("repeat for each item in things:\n    display item\n");
        assert!(matches!(parsed[0], Statement::RepeatForEach { .. }));

        let parsed = statements("repeat while going:\n    display 1\n");
        assert!(matches!(parsed[0], Statement::RepeatWhile { .. }));
    }

    #[test]
    fn test_attempt_with_empty_try() {
        let source = concat!(
            "attempt:\n",
            "if unsuccessful:\n",
            "    display problem_message\n",
            "then continue:\n",
            "    display \"done\"\n",
        );
        let parsed = statements(source);
        match &parsed[0] {
            Statement::Attempt {
                try_body,
                rescue_body,
                always_body,
                ..
            } => {
                assert!(try_body.is_empty());
                assert_eq!(rescue_body.len(), 1);
                assert_eq!(always_body.len(), 1);
            }
            other => panic!("expected attempt, got {:?}", other),
        }
    }

    #[test]
    fn test_attempt_requires_all_clauses() {
        let (_, errors) = parse_fragment("attempt:\n    display 1\n", "frag");
        assert!(errors.iter().any(|e| e.code == codes::MISSING_CLAUSE));
    }

    #[test]
    fn test_call_with_args_and_store() {
        let parsed = statements("call calculate_tip with 100, 15 storing result in tip\n");
        match &parsed[0] {
            Statement::Call {
                name,
                args,
                store_in,
                ..
            } => {
                assert_eq!(name, "calculate_tip");
                assert_eq!(args.len(), 2);
                assert_eq!(store_in.as_deref(), Some("tip"));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_indexed_assignment() {
        let parsed = statements("set scores[0] to 10\n");
        match &parsed[0] {
            Statement::Set {
                target: AssignTarget::Index { name, .. },
                ..
            } => assert_eq!(name, "scores"),
            other => panic!("expected indexed set, got {:?}", other),
        }
    }

    #[test]
    fn test_set_iteration_limit() {
        let parsed = statements("set iteration limit to 1000\n");
        assert!(matches!(parsed[0], Statement::SetIterationLimit { .. }));
    }

    #[test]
    fn test_problem_message_not_assignable() {
        let (_, errors) = parse_fragment("set problem_message to 1\n", "frag");
        assert!(errors.iter().any(|e| e.code == codes::BAD_ASSIGN_TARGET));

        let (_, errors) = parse_fragment("repeat for each problem_message in [1]:\n    display 1\n", "frag");
        assert!(errors.iter().any(|e| e.code == codes::BAD_ASSIGN_TARGET));

        let (_, errors) =
            parse_fragment("call greet storing result in problem_message\n", "frag");
        assert!(errors.iter().any(|e| e.code == codes::BAD_ASSIGN_TARGET));
    }

    #[test]
    fn test_problem_message_rejected_as_name() {
        // Not a legal step, floor, riser, or call-target name either.
        let (step, errors) = parse_step(
            "step: problem_message\n    belongs to: util\n    do:\n        display 1\n",
            "problem_message.step",
        );
        assert!(step.is_none());
        assert!(!errors.is_empty());

        let (_, errors) = parse_floor("floor: problem_message\n    step: mix\n", "f.floor");
        assert!(!errors.is_empty());

        let (_, errors) = parse_fragment("call problem_message with 1\n", "frag");
        assert!(errors.iter().any(|e| e.code == codes::UNEXPECTED_TOKEN));
    }

    #[test]
    fn test_problem_message_readable_in_expressions() {
        let parsed = statements("display problem_message\n");
        match &parsed[0] {
            Statement::Display { value, .. } => match value {
                Expr::Identifier { name, .. } => assert_eq!(name, "problem_message"),
                other => panic!("expected identifier, got {:?}", other),
            },
            other => panic!("expected display, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_as_binds_tighter_than_added_to() {
        let parsed = statements("display x as text added to \"!\"\n");
        match &parsed[0] {
            Statement::Display { value, .. } => match value {
                Expr::Binary { op, lhs, .. } => {
                    assert_eq!(*op, BinOp::AddedTo);
                    assert!(matches!(**lhs, Expr::Convert { .. }));
                }
                other => panic!("expected added to at the top, got {:?}", other),
            },
            other => panic!("expected display, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_arithmetic() {
        let parsed = statements("set x to 1 + 2 * 3\n");
        match &parsed[0] {
            Statement::Set { value, .. } => match value {
                Expr::Binary { op, rhs, .. } => {
                    assert_eq!(*op, BinOp::Add);
                    assert!(matches!(
                        **rhs,
                        Expr::Binary {
                            op: BinOp::Multiply,
                            ..
                        }
                    ));
                }
                other => panic!("expected +, got {:?}", other),
            },
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_container_literals() {
        let parsed =
            statements("set xs to [1, 2, 3]\nset t to [\"a\": 1]\nset e to [:]\nset l to []\n");
        assert_eq!(parsed.len(), 4);
        match (&parsed[1], &parsed[2], &parsed[3]) {
            (
                Statement::Set {
                    value: Expr::TableLit { entries, .. },
                    ..
                },
                Statement::Set {
                    value: Expr::TableLit { entries: empty, .. },
                    ..
                },
                Statement::Set {
                    value: Expr::ListLit { items, .. },
                    ..
                },
            ) => {
                assert_eq!(entries.len(), 1);
                assert!(empty.is_empty());
                assert!(items.is_empty());
            }
            other => panic!("unexpected shapes: {:?}", other),
        }
    }

    #[test]
    fn test_input_with_conversion() {
        let parsed = statements("set n to input as number\n");
        match &parsed[0] {
            Statement::Set { value, .. } => {
                assert!(matches!(
                    value,
                    Expr::Input {
                        as_type: Some(TypeTag::Number),
                        ..
                    }
                ));
            }
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_text_operator_forms() {
        let parsed = statements(
            "set a to length of name\nset b to character at 0 of name\nset c to name contains \"x\"\nset d to parts split by \",\"\nset e to 3 is in xs\nset f to x is a number\nset g to type of x\n",
        );
        assert_eq!(parsed.len(), 7);
    }

    #[test]
    fn test_as_decimal() {
        let parsed = statements("display tip as decimal(1)\n");
        match &parsed[0] {
            Statement::Display { value, .. } => {
                assert!(matches!(value, Expr::FormatDecimal { .. }));
            }
            other => panic!("expected display, got {:?}", other),
        }
    }

    #[test]
    fn test_error_recovery_continues() {
        let source = "display )\ndisplay 2\n";
        let (parsed, errors) = parse_fragment(source, "frag");
        assert_eq!(errors.len(), 1);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_note_statement() {
        let parsed = statements("note: only a comment\ndisplay 1\n");
        assert!(matches!(parsed[0], Statement::Note { .. }));
    }
}
