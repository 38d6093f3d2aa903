/// Token types for the query scanner
use phf::phf_map;

// Perfect hash map for O(1) keyword lookup
static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    // Query operations
    "get" => TokenType::Get,
    "upsert" => TokenType::Upsert,
    "delete" => TokenType::Delete,
    "count" => TokenType::Count,
    "sum" => TokenType::Sum,
    "avg" => TokenType::Avg,
    // Clauses
    "follow" => TokenType::Follow,
    "where" => TokenType::Where,
    "group" => TokenType::Group,
    "by" => TokenType::By,
    "having" => TokenType::Having,
    "order" => TokenType::Order,
    "select" => TokenType::Select,
    "as" => TokenType::As,
    "on" => TokenType::On,
    "for" => TokenType::For,
    // Pagination
    "page" => TokenType::Page,
    "of" => TokenType::Of,
    "size" => TokenType::Size,
    // Join types
    "left" => TokenType::Left,
    "inner" => TokenType::Inner,
    "right" => TokenType::Right,
    // Schema
    "create" => TokenType::Create,
    "database" => TokenType::Database,
    "drop" => TokenType::Drop,
    "add" => TokenType::Add,
    "purge" => TokenType::Purge,
    "table" => TokenType::Table,
    "column" => TokenType::Column,
    // Branches
    "branch" => TokenType::Branch,
    "commit" => TokenType::Commit,
    "checkout" => TokenType::Checkout,
    "merge" => TokenType::Merge,
    "into" => TokenType::Into,
    "from" => TokenType::From,
    "alias" => TokenType::Alias,
    "update" => TokenType::Update,
    "protect" => TokenType::Protect,
    "unprotect" => TokenType::Unprotect,
    "abandon" => TokenType::Abandon,
    "reactivate" => TokenType::Reactivate,
    // Auth
    "auth" => TokenType::Auth,
    "token" => TokenType::Token,
    "with" => TokenType::With,
    "disable" => TokenType::Disable,
    "enable" => TokenType::Enable,
    "revoke" => TokenType::Revoke,
    "list" => TokenType::List,
    // Meta
    "backup" => TokenType::Backup,
    "restore" => TokenType::Restore,
    "explain" => TokenType::Explain,
    "respawn" => TokenType::Respawn,
    "since" => TokenType::Since,
    // Time
    "last" => TokenType::Last,
    "this" => TokenType::This,
    "days" => TokenType::Days,
    "hours" => TokenType::Hours,
    "minutes" => TokenType::Minutes,
    "weeks" => TokenType::Weeks,
    "month" => TokenType::Month,
    "year" => TokenType::Year,
    "before" => TokenType::Before,
    "after" => TokenType::After,
    "ago" => TokenType::Ago,
    // Logical
    "and" => TokenType::And,
    "or" => TokenType::Or,
    "not" => TokenType::Not,
    // Collections
    "in" => TokenType::In,
    "contains" => TokenType::Contains,
    "any" => TokenType::Any,
    // Sorting
    "asc" => TokenType::Asc,
    "desc" => TokenType::Desc,
    // Literals
    "null" => TokenType::Null,
    "true" => TokenType::Boolean,
    "false" => TokenType::Boolean,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Query operations
    Get,
    Upsert,
    Delete,
    Count,
    Sum,
    Avg,

    // Clauses
    Follow,
    Where,
    Group,
    By,
    Having,
    Order,
    Select,
    As,
    On,
    For,
    Page,
    Of,
    Size,

    // Join types
    Left,
    Inner,
    Right,

    // Schema
    Create,
    Database,
    Drop,
    Add,
    Purge,
    Table,
    Column,

    // Branches
    Branch,
    Commit,
    Checkout,
    Merge,
    Into,
    From,
    Alias,
    Update,
    Protect,
    Unprotect,
    Abandon,
    Reactivate,

    // Auth
    Auth,
    Token,
    With,
    Disable,
    Enable,
    Revoke,
    List,

    // Meta
    Backup,
    Restore,
    Explain,
    Respawn,
    Since,

    // Time
    Last,
    This,
    Days,
    Hours,
    Minutes,
    Weeks,
    Month,
    Year,
    Before,
    After,
    Ago,

    // Logical
    And,
    Or,
    Not,

    // Collections
    In,
    Contains,
    Any,

    // Sorting
    Asc,
    Desc,

    // Operators
    Equals,             // =
    NotEquals,          // != or <>
    LessThan,           // <
    LessThanOrEqual,    // <=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    Arrow,              // ->

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    RightBrace,   // }
    Dot,          // .
    Comma,        // ,
    Colon,        // :
    Semicolon,    // ;

    // Literals
    Identifier,
    String,
    Number,
    Boolean,
    Null,

    // Special
    Invalid,
    Eof,
}

/// A scanned token. `text` preserves the original casing; string tokens
/// carry their contents without the surrounding quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub text: String,
    /// Offset of the first character in the input (in chars)
    pub position: usize,
    /// Number of input chars consumed, quotes included
    pub length: usize,
}

impl Token {
    pub fn new(token_type: TokenType, text: impl Into<String>, position: usize, length: usize) -> Self {
        Self {
            token_type,
            text: text.into(),
            position,
            length,
        }
    }

    pub fn eof(position: usize) -> Self {
        Self::new(TokenType::Eof, "", position, 0)
    }

    pub fn is(&self, token_type: TokenType) -> bool {
        self.token_type == token_type
    }
}

impl TokenType {
    /// Check if this word is a keyword (O(1) perfect hash lookup)
    pub fn from_keyword(s: &str) -> Option<Self> {
        // Convert to lowercase for case-insensitive matching
        let lowercase = s.to_lowercase();
        KEYWORDS.get(lowercase.as_str()).copied()
    }

    /// Aggregate keywords double as function names (`count()`, `sum(x)`)
    pub fn is_aggregate(self) -> bool {
        matches!(self, TokenType::Count | TokenType::Sum | TokenType::Avg)
    }

    /// Keywords that may appear where a plain name is expected
    pub fn is_keyword(self) -> bool {
        !matches!(
            self,
            TokenType::Equals
                | TokenType::NotEquals
                | TokenType::LessThan
                | TokenType::LessThanOrEqual
                | TokenType::GreaterThan
                | TokenType::GreaterThanOrEqual
                | TokenType::Arrow
                | TokenType::LeftParen
                | TokenType::RightParen
                | TokenType::LeftBracket
                | TokenType::RightBracket
                | TokenType::LeftBrace
                | TokenType::RightBrace
                | TokenType::Dot
                | TokenType::Comma
                | TokenType::Colon
                | TokenType::Semicolon
                | TokenType::Identifier
                | TokenType::String
                | TokenType::Number
                | TokenType::Boolean
                | TokenType::Null
                | TokenType::Invalid
                | TokenType::Eof
        )
    }
}
