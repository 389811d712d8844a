// ABOUTME: Token kinds, the multi-word keyword phrase table, and reserved words

use crate::location::SourceLocation;
use std::fmt;

/// One lexed token. `lexeme` holds the decoded text for literals and
/// identifiers (escape sequences already processed for text literals) and
/// the matched source words for keywords.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Structure keywords
    Building,
    Floor,
    Step,
    Riser,
    BelongsTo,
    Expects,
    Returns,
    Declare,
    Do,

    // Statement keywords
    Set,
    To,
    Call,
    With,
    StoringResultIn,
    Display,
    Indicate,
    Return,
    Exit,
    If,
    OtherwiseIf,
    Otherwise,
    Repeat,
    Times,
    ForEach,
    While,
    In,
    Attempt,
    IfUnsuccessful,
    ThenContinue,
    Add,
    Remove,
    From,
    ClearConsole,
    IterationLimit,
    Note,

    // Operator keywords
    And,
    Or,
    Not,
    Equals,
    IsEqualTo,
    IsNotEqualTo,
    IsLessThan,
    IsLessOrEqual,
    IsGreaterThan,
    IsGreaterOrEqual,
    AddedTo,
    SplitBy,
    LengthOf,
    CharacterAt,
    Of,
    Contains,
    StartsWith,
    EndsWith,
    IsIn,
    IsA,
    TypeOf,
    As,
    Decimal,
    Fixed,
    Input,

    // Type keywords and literal keywords
    NumberType,
    TextType,
    BooleanType,
    ListType,
    TableType,
    True,
    False,
    Nothing,

    // Literals and names
    Identifier,
    /// The error text bound by `if unsuccessful:`. A keyword of its own so
    /// it can never be declared, assigned, or used as a name, while the
    /// expression grammar still accepts it as a readable reference.
    ProblemMessage,
    NumberLit,
    TextLit,

    // Punctuation
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = match self {
            TokenKind::Building => "`building`",
            TokenKind::Floor => "`floor`",
            TokenKind::Step => "`step`",
            TokenKind::Riser => "`riser`",
            TokenKind::BelongsTo => "`belongs to`",
            TokenKind::Expects => "`expects`",
            TokenKind::Returns => "`returns`",
            TokenKind::Declare => "`declare`",
            TokenKind::Do => "`do`",
            TokenKind::Set => "`set`",
            TokenKind::To => "`to`",
            TokenKind::Call => "`call`",
            TokenKind::With => "`with`",
            TokenKind::StoringResultIn => "`storing result in`",
            TokenKind::Display => "`display`",
            TokenKind::Indicate => "`indicate`",
            TokenKind::Return => "`return`",
            TokenKind::Exit => "`exit`",
            TokenKind::If => "`if`",
            TokenKind::OtherwiseIf => "`otherwise if`",
            TokenKind::Otherwise => "`otherwise`",
            TokenKind::Repeat => "`repeat`",
            TokenKind::Times => "`times`",
            TokenKind::ForEach => "`for each`",
            TokenKind::While => "`while`",
            TokenKind::In => "`in`",
            TokenKind::Attempt => "`attempt`",
            TokenKind::IfUnsuccessful => "`if unsuccessful`",
            TokenKind::ThenContinue => "`then continue`",
            TokenKind::Add => "`add`",
            TokenKind::Remove => "`remove`",
            TokenKind::From => "`from`",
            TokenKind::ClearConsole => "`clear console`",
            TokenKind::IterationLimit => "`iteration limit`",
            TokenKind::Note => "note",
            TokenKind::And => "`and`",
            TokenKind::Or => "`or`",
            TokenKind::Not => "`not`",
            TokenKind::Equals => "`equals`",
            TokenKind::IsEqualTo => "`is equal to`",
            TokenKind::IsNotEqualTo => "`is not equal to`",
            TokenKind::IsLessThan => "`is less than`",
            TokenKind::IsLessOrEqual => "`is less than or equal to`",
            TokenKind::IsGreaterThan => "`is greater than`",
            TokenKind::IsGreaterOrEqual => "`is greater than or equal to`",
            TokenKind::AddedTo => "`added to`",
            TokenKind::SplitBy => "`split by`",
            TokenKind::LengthOf => "`length of`",
            TokenKind::CharacterAt => "`character at`",
            TokenKind::Of => "`of`",
            TokenKind::Contains => "`contains`",
            TokenKind::StartsWith => "`starts with`",
            TokenKind::EndsWith => "`ends with`",
            TokenKind::IsIn => "`is in`",
            TokenKind::IsA => "`is a`",
            TokenKind::TypeOf => "`type of`",
            TokenKind::As => "`as`",
            TokenKind::Decimal => "`decimal`",
            TokenKind::Fixed => "`fixed`",
            TokenKind::Input => "`input`",
            TokenKind::NumberType => "`number`",
            TokenKind::TextType => "`text`",
            TokenKind::BooleanType => "`boolean`",
            TokenKind::ListType => "`list`",
            TokenKind::TableType => "`table`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::Nothing => "`nothing`",
            TokenKind::Identifier => "a name",
            TokenKind::ProblemMessage => "`problem_message`",
            TokenKind::NumberLit => "a number",
            TokenKind::TextLit => "a text literal",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Colon => "`:`",
            TokenKind::Comma => "`,`",
            TokenKind::Newline => "end of line",
            TokenKind::Indent => "an indented block",
            TokenKind::Dedent => "end of block",
            TokenKind::Eof => "end of file",
        };
        f.write_str(shown)
    }
}

/// Multi-word keyword phrases, longest first. The lexer tries these at every
/// identifier-start position before the single-word keyword and identifier
/// rules; within the table a phrase must precede any phrase that is its
/// prefix (`is greater than or equal to` before `is greater than`).
pub const PHRASES: &[(&str, TokenKind)] = &[
    ("is greater than or equal to", TokenKind::IsGreaterOrEqual),
    ("is less than or equal to", TokenKind::IsLessOrEqual),
    ("storing result in", TokenKind::StoringResultIn),
    ("is not equal to", TokenKind::IsNotEqualTo),
    ("is greater than", TokenKind::IsGreaterThan),
    ("is less than", TokenKind::IsLessThan),
    ("is equal to", TokenKind::IsEqualTo),
    ("iteration limit", TokenKind::IterationLimit),
    ("if unsuccessful", TokenKind::IfUnsuccessful),
    ("then continue", TokenKind::ThenContinue),
    ("otherwise if", TokenKind::OtherwiseIf),
    ("clear console", TokenKind::ClearConsole),
    ("character at", TokenKind::CharacterAt),
    ("starts with", TokenKind::StartsWith),
    ("belongs to", TokenKind::BelongsTo),
    ("ends with", TokenKind::EndsWith),
    ("length of", TokenKind::LengthOf),
    ("added to", TokenKind::AddedTo),
    ("split by", TokenKind::SplitBy),
    ("for each", TokenKind::ForEach),
    ("type of", TokenKind::TypeOf),
    ("is in", TokenKind::IsIn),
    ("is a", TokenKind::IsA),
];

/// Single-word keywords.
pub fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "building" => TokenKind::Building,
        "floor" => TokenKind::Floor,
        "step" => TokenKind::Step,
        "riser" => TokenKind::Riser,
        "expects" => TokenKind::Expects,
        "returns" => TokenKind::Returns,
        "declare" => TokenKind::Declare,
        "do" => TokenKind::Do,
        "set" => TokenKind::Set,
        "to" => TokenKind::To,
        "call" => TokenKind::Call,
        "with" => TokenKind::With,
        "display" => TokenKind::Display,
        "indicate" => TokenKind::Indicate,
        "return" => TokenKind::Return,
        "exit" => TokenKind::Exit,
        "if" => TokenKind::If,
        "otherwise" => TokenKind::Otherwise,
        "repeat" => TokenKind::Repeat,
        "times" => TokenKind::Times,
        "while" => TokenKind::While,
        "in" => TokenKind::In,
        "attempt" => TokenKind::Attempt,
        "add" => TokenKind::Add,
        "remove" => TokenKind::Remove,
        "from" => TokenKind::From,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "equals" => TokenKind::Equals,
        "of" => TokenKind::Of,
        "contains" => TokenKind::Contains,
        "as" => TokenKind::As,
        "decimal" => TokenKind::Decimal,
        "fixed" => TokenKind::Fixed,
        "input" => TokenKind::Input,
        "number" => TokenKind::NumberType,
        "text" => TokenKind::TextType,
        "boolean" => TokenKind::BooleanType,
        "list" => TokenKind::ListType,
        "table" => TokenKind::TableType,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "nothing" => TokenKind::Nothing,
        "problem_message" => TokenKind::ProblemMessage,
        _ => return None,
    };
    Some(kind)
}

/// Words reserved solely as phrase fragments. They can never stand alone and
/// can never be identifiers.
pub fn is_reserved_fragment(word: &str) -> bool {
    matches!(
        word,
        "is" | "greater"
            | "less"
            | "than"
            | "equal"
            | "added"
            | "split"
            | "by"
            | "character"
            | "at"
            | "length"
            | "starts"
            | "ends"
            | "storing"
            | "result"
            | "unsuccessful"
            | "then"
            | "continue"
            | "note"
            | "block"
            | "end"
            | "iteration"
            | "limit"
            | "type"
            | "a"
            | "clear"
            | "console"
            | "each"
            | "for"
            | "belongs"
    )
}
