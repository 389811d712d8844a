// ABOUTME: AST node definitions for building, floor, and step files

use crate::location::SourceLocation;
use crate::value::TypeTag;

/// Root node of a `.building` file: the program entry point.
#[derive(Debug, Clone)]
pub struct Building {
    pub name: String,
    pub declares: Vec<Declaration>,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

/// Root node of a `.floor` file: the list of steps the floor provides.
#[derive(Debug, Clone)]
pub struct Floor {
    pub name: String,
    pub steps: Vec<StepDecl>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct StepDecl {
    pub name: String,
    pub location: SourceLocation,
}

/// Root node of a `.step` file: one callable unit of work.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub floor: String,
    pub params: Vec<String>,
    /// Name declared after `returns:`; a step with one must execute `return`.
    pub returns: Option<String>,
    pub declares: Vec<Declaration>,
    pub risers: Vec<Riser>,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

/// A private helper nested in a step, callable only from that step.
#[derive(Debug, Clone)]
pub struct Riser {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Option<String>,
    pub declares: Vec<Declaration>,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

/// One line of a `declare:` block: `score as number fixed`.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub type_tag: TypeTag,
    pub fixed: bool,
    pub location: SourceLocation,
}

/// The target of a `set` statement: a plain name or one indexed position.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(String),
    Index { name: String, index: Expr },
}

#[derive(Debug, Clone)]
pub enum Statement {
    Display {
        value: Expr,
        location: SourceLocation,
    },
    Indicate {
        value: Expr,
        location: SourceLocation,
    },
    Set {
        target: AssignTarget,
        value: Expr,
        location: SourceLocation,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        store_in: Option<String>,
        location: SourceLocation,
    },
    Return {
        value: Option<Expr>,
        location: SourceLocation,
    },
    Exit {
        location: SourceLocation,
    },
    If {
        branches: Vec<(Expr, Vec<Statement>)>,
        otherwise: Option<Vec<Statement>>,
        location: SourceLocation,
    },
    RepeatTimes {
        count: Expr,
        body: Vec<Statement>,
        location: SourceLocation,
    },
    RepeatForEach {
        var: String,
        collection: Expr,
        body: Vec<Statement>,
        location: SourceLocation,
    },
    RepeatWhile {
        condition: Expr,
        body: Vec<Statement>,
        location: SourceLocation,
    },
    Attempt {
        try_body: Vec<Statement>,
        rescue_body: Vec<Statement>,
        always_body: Vec<Statement>,
        location: SourceLocation,
    },
    Note {
        text: String,
        location: SourceLocation,
    },
    AddToList {
        value: Expr,
        list: Expr,
        location: SourceLocation,
    },
    RemoveFromList {
        value: Expr,
        list: Expr,
        location: SourceLocation,
    },
    ClearConsole {
        location: SourceLocation,
    },
    SetIterationLimit {
        value: Expr,
        location: SourceLocation,
    },
}

impl Statement {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Statement::Display { location, .. }
            | Statement::Indicate { location, .. }
            | Statement::Set { location, .. }
            | Statement::Call { location, .. }
            | Statement::Return { location, .. }
            | Statement::Exit { location }
            | Statement::If { location, .. }
            | Statement::RepeatTimes { location, .. }
            | Statement::RepeatForEach { location, .. }
            | Statement::RepeatWhile { location, .. }
            | Statement::Attempt { location, .. }
            | Statement::Note { location, .. }
            | Statement::AddToList { location, .. }
            | Statement::RemoveFromList { location, .. }
            | Statement::ClearConsole { location }
            | Statement::SetIterationLimit { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Text concatenation (`added to`), distinct from numeric `+`.
    AddedTo,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Contains,
    StartsWith,
    EndsWith,
    SplitBy,
    IsIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Negate,
    Not,
}

#[derive(Debug, Clone)]
pub enum Expr {
    NumberLit {
        value: f64,
        location: SourceLocation,
    },
    TextLit {
        value: String,
        location: SourceLocation,
    },
    BooleanLit {
        value: bool,
        location: SourceLocation,
    },
    NothingLit {
        location: SourceLocation,
    },
    ListLit {
        items: Vec<Expr>,
        location: SourceLocation,
    },
    TableLit {
        entries: Vec<(Expr, Expr)>,
        location: SourceLocation,
    },
    Identifier {
        name: String,
        location: SourceLocation,
    },
    Input {
        as_type: Option<TypeTag>,
        location: SourceLocation,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        location: SourceLocation,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        location: SourceLocation,
    },
    /// `expr as number`, `expr as text`, ...
    Convert {
        operand: Box<Expr>,
        to: TypeTag,
        location: SourceLocation,
    },
    /// `expr as decimal(N)`
    FormatDecimal {
        operand: Box<Expr>,
        places: Box<Expr>,
        location: SourceLocation,
    },
    /// `expr[index]` on lists and tables
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        location: SourceLocation,
    },
    LengthOf {
        operand: Box<Expr>,
        location: SourceLocation,
    },
    /// `character at N of S`
    CharacterAt {
        index: Box<Expr>,
        text: Box<Expr>,
        location: SourceLocation,
    },
    TypeOf {
        operand: Box<Expr>,
        location: SourceLocation,
    },
    /// `expr is a number`
    IsA {
        operand: Box<Expr>,
        tag: TypeTag,
        location: SourceLocation,
    },
}

impl Expr {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Expr::NumberLit { location, .. }
            | Expr::TextLit { location, .. }
            | Expr::BooleanLit { location, .. }
            | Expr::NothingLit { location }
            | Expr::ListLit { location, .. }
            | Expr::TableLit { location, .. }
            | Expr::Identifier { location, .. }
            | Expr::Input { location, .. }
            | Expr::Binary { location, .. }
            | Expr::Unary { location, .. }
            | Expr::Convert { location, .. }
            | Expr::FormatDecimal { location, .. }
            | Expr::Index { location, .. }
            | Expr::LengthOf { location, .. }
            | Expr::CharacterAt { location, .. }
            | Expr::TypeOf { location, .. }
            | Expr::IsA { location, .. } => location,
        }
    }
}
