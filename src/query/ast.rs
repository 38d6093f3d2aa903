/// Abstract syntax tree for query-language statements
use indexmap::IndexMap;

/// Top-level statement, one variant per operation family
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Query(QueryStmt),
    Upsert(UpsertStmt),
    Delete(DeleteStmt),
    Schema(SchemaStmt),
    Branch(BranchStmt),
    Auth(AuthStmt),
    Meta(MetaStmt),
}

impl Statement {
    /// Source offset of the statement's leading token
    pub fn position(&self) -> usize {
        match self {
            Statement::Query(s) => s.position,
            Statement::Upsert(s) => s.position,
            Statement::Delete(s) => s.position,
            Statement::Schema(s) => s.position,
            Statement::Branch(s) => s.position,
            Statement::Auth(s) => s.position,
            Statement::Meta(s) => s.position,
        }
    }

    /// Statements that write to the row store or schema
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Statement::Upsert(_) | Statement::Delete(_) | Statement::Schema(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Get,
    Count,
    Sum,
    Avg,
}

impl QueryOp {
    pub fn is_aggregate(self) -> bool {
        matches!(self, QueryOp::Count | QueryOp::Sum | QueryOp::Avg)
    }
}

/// get/count/sum/avg statement
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStmt {
    pub op: QueryOp,
    pub table: String,
    pub alias: Option<String>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    /// Explicit select list, or the implicit `<op> table.field` target
    pub select: Vec<Expr>,
    pub pagination: Option<Pagination>,
    pub position: usize,
}

impl QueryStmt {
    /// Qualifier that root-table columns are namespaced under in joined rows
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// `follow <left> -> <right> as <alias> [(type)] [on <expr>]`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub left_path: Vec<String>,
    pub right_path: Vec<String>,
    pub alias: String,
    pub join_type: JoinType,
    pub on: Option<Expr>,
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub field: Expr,
    pub asc: bool, // true = ASC, false = DESC
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub size: usize,
}

impl Pagination {
    pub fn skip(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }
}

/// `upsert <table> <json> [on <field>]`
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertStmt {
    pub table: String,
    pub data: Expr,
    pub on_field: Option<String>,
    pub position: usize,
}

/// `delete <table> [where <expr>]`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: String,
    pub where_clause: Option<Expr>,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOp {
    CreateDatabase,
    CreateTable,
    DropTable,
    AddColumn,
    PurgeColumn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaStmt {
    pub op: SchemaOp,
    pub database_name: Option<String>,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    pub data_type: Option<String>,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOp {
    Create,
    Checkout,
    Merge,
    Protect,
    Unprotect,
    Abandon,
    Reactivate,
    CreateAlias,
    UpdateAlias,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchStmt {
    pub op: BranchOp,
    pub branch_name: Option<String>,
    pub source: Option<String>,
    pub target: Option<String>,
    pub as_of: Option<String>,
    pub alias: Option<String>,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOp {
    CreateToken,
    RevokeToken,
    DisableToken,
    EnableToken,
    ListTokens,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthStmt {
    pub op: AuthOp,
    pub token_name: Option<String>,
    pub config: Option<Expr>,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaOp {
    Backup,
    Restore,
    Explain,
    Respawn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaStmt {
    pub op: MetaOp,
    pub target: Option<String>,
    pub source: Option<String>,
    /// Statement being explained
    pub explained: Option<Box<Statement>>,
    pub position: usize,
}

/// Sub-expression inside a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Dotted field reference; aggregate calls are a single `fn(arg)` segment
    FieldPath(Vec<String>),
    Literal {
        kind: LiteralKind,
        raw: String,
    },
    Json(JsonValue),
    Binary {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Alias {
        inner: Box<Expr>,
        name: String,
    },
}

impl Expr {
    pub fn field(segments: &[&str]) -> Self {
        Expr::FieldPath(segments.iter().map(|s| s.to_string()).collect())
    }

    pub fn literal(kind: LiteralKind, raw: impl Into<String>) -> Self {
        Expr::Literal { kind, raw: raw.into() }
    }

    pub fn comparison(op: ComparisonOp, left: Expr, right: Expr) -> Self {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Field path segments, looking through an alias
    pub fn path(&self) -> Option<&[String]> {
        match self {
            Expr::FieldPath(segments) => Some(segments),
            Expr::Alias { inner, .. } => inner.path(),
            _ => None,
        }
    }

    /// Key a projected or grouped value is stored under: the alias, or the
    /// dotted path text
    pub fn output_name(&self) -> Option<String> {
        match self {
            Expr::Alias { name, .. } => Some(name.clone()),
            Expr::FieldPath(segments) => Some(segments.join(".")),
            _ => None,
        }
    }

    /// Last path segment, the plain column name
    pub fn column_name(&self) -> Option<&str> {
        self.path().and_then(|p| p.last()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Number,
    Boolean,
    Null,
    Date,
}

/// JSON payloads for upsert data, token config and array literals
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    String(String),
    Number(String),
    Boolean(bool),
    Null,
    Object(IndexMap<String, Expr>),
    Array(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Contains,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}
