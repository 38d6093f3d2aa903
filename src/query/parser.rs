/// Query parser - converts tokens into a statement AST
use super::ast::*;
use super::token::{Token, TokenType};
use crate::error::{Result, SproutError};
use indexmap::IndexMap;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// Original query text, used to echo explained statements
    source: Option<Vec<char>>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().map_or(false, |t| t.is(TokenType::Eof)) {
            let end = tokens.last().map_or(0, |t| t.position + t.length);
            tokens.push(Token::eof(end));
        }
        Self {
            tokens,
            position: 0,
            source: None,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.chars().collect());
        self
    }

    /// Parse a single statement, with an optional trailing semicolon
    pub fn parse(&mut self) -> Result<Statement> {
        if self.current().is(TokenType::Eof) {
            return Err(SproutError::parse("Empty input", 0));
        }

        let stmt = self.parse_statement()?;

        // Optionally consume semicolon
        self.match_token(TokenType::Semicolon);

        if !self.current().is(TokenType::Eof) {
            return Err(self.unexpected());
        }

        Ok(stmt)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let stmt = match self.current().token_type {
            TokenType::Get | TokenType::Count | TokenType::Sum | TokenType::Avg => {
                Statement::Query(self.parse_query()?)
            }
            TokenType::Upsert => Statement::Upsert(self.parse_upsert()?),
            TokenType::Delete => Statement::Delete(self.parse_delete()?),
            TokenType::Create => self.parse_create()?,
            TokenType::Add => Statement::Schema(self.parse_add_column()?),
            TokenType::Purge => Statement::Schema(self.parse_purge_column()?),
            TokenType::Drop => Statement::Schema(self.parse_drop()?),
            TokenType::Update => Statement::Branch(self.parse_update_alias()?),
            TokenType::Checkout => Statement::Branch(self.parse_checkout()?),
            TokenType::Merge => Statement::Branch(self.parse_merge()?),
            TokenType::Protect | TokenType::Unprotect | TokenType::Abandon | TokenType::Reactivate => {
                Statement::Branch(self.parse_branch_management()?)
            }
            TokenType::Revoke | TokenType::Disable | TokenType::Enable | TokenType::List => {
                Statement::Auth(self.parse_auth()?)
            }
            TokenType::Backup | TokenType::Restore | TokenType::Explain | TokenType::Respawn => {
                Statement::Meta(self.parse_meta()?)
            }
            _ => return Err(self.unexpected()),
        };
        Ok(stmt)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    fn parse_query(&mut self) -> Result<QueryStmt> {
        let position = self.current().position;
        let op = match self.current().token_type {
            TokenType::Get => QueryOp::Get,
            TokenType::Count => QueryOp::Count,
            TokenType::Sum => QueryOp::Sum,
            TokenType::Avg => QueryOp::Avg,
            _ => return Err(self.error("Expected query operation")),
        };
        self.advance();

        let table = self.expect_identifier()?;

        // `sum orders.total` selects its target implicitly
        let mut select = Vec::new();
        if op.is_aggregate() && self.current().is(TokenType::Dot) {
            self.advance();
            let field = self.expect_name()?;
            select.push(Expr::FieldPath(vec![table.clone(), field]));
        }

        let alias = if self.match_token(TokenType::As) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        let mut joins = Vec::new();
        while self.current().is(TokenType::Follow) {
            joins.push(self.parse_join()?);
        }

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let group_by = if self.match_token(TokenType::Group) {
            self.expect(TokenType::By)?;
            self.parse_field_list()?
        } else {
            Vec::new()
        };

        let having = if self.match_token(TokenType::Having) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let order_by = if self.match_token(TokenType::Order) {
            self.expect(TokenType::By)?;
            self.parse_order_by()?
        } else {
            Vec::new()
        };

        // An explicit select overrides the implicit aggregate target
        if self.match_token(TokenType::Select) {
            select = self.parse_field_list()?;
        }

        let pagination = if self.match_token(TokenType::Page) {
            let page = self.expect_usize()?;
            self.expect(TokenType::Of)?;
            self.expect(TokenType::Size)?;
            let size = self.expect_usize()?;
            Some(Pagination { page, size })
        } else {
            None
        };

        Ok(QueryStmt {
            op,
            table,
            alias,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            select,
            pagination,
            position,
        })
    }

    fn parse_join(&mut self) -> Result<JoinClause> {
        self.expect(TokenType::Follow)?;
        let left_path = self.parse_path()?;
        self.expect(TokenType::Arrow)?;
        let right_path = self.parse_path()?;
        self.expect(TokenType::As)?;
        let alias = self.expect_identifier()?;

        let join_type = if self.match_token(TokenType::LeftParen) {
            let join_type = match self.current().token_type {
                TokenType::Left => JoinType::Left,
                TokenType::Inner => JoinType::Inner,
                TokenType::Right => JoinType::Right,
                _ => return Err(self.expected("join type")),
            };
            self.advance();
            self.expect(TokenType::RightParen)?;
            join_type
        } else {
            JoinType::Inner
        };

        let on = if self.match_token(TokenType::On) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(JoinClause {
            left_path,
            right_path,
            alias,
            join_type,
            on,
        })
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderByExpr>> {
        let mut order_by = Vec::new();
        loop {
            let field = self.parse_field_path()?;
            let asc = if self.match_token(TokenType::Desc) {
                false
            } else {
                self.match_token(TokenType::Asc);
                true
            };
            order_by.push(OrderByExpr { field, asc });
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(order_by)
    }

    fn parse_field_list(&mut self) -> Result<Vec<Expr>> {
        let mut fields = Vec::new();
        loop {
            fields.push(self.parse_field_path()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(fields)
    }

    /// Field reference: `a.b.c`, or an aggregate call `count()`, `sum(x.y)`,
    /// either optionally followed by `as <alias>`
    fn parse_field_path(&mut self) -> Result<Expr> {
        let expr = if self.current().token_type.is_aggregate()
            && self.peek(1).is(TokenType::LeftParen)
        {
            let function = self.current().text.to_lowercase();
            self.advance(); // function name
            self.advance(); // (
            let argument = if self.current().is(TokenType::RightParen) {
                String::new()
            } else {
                self.parse_path()?.join(".")
            };
            self.expect(TokenType::RightParen)?;
            Expr::FieldPath(vec![format!("{}({})", function, argument)])
        } else {
            Expr::FieldPath(self.parse_path()?)
        };

        if self.current().is(TokenType::As) {
            self.advance();
            let token = self.current();
            if token.is(TokenType::Identifier) || token.token_type.is_aggregate() {
                let name = token.text.clone();
                self.advance();
                return Ok(Expr::Alias {
                    inner: Box::new(expr),
                    name,
                });
            }
            return Err(self.expected("identifier"));
        }

        Ok(expr)
    }

    /// Dotted identifier chain; segments after the first may be keywords
    fn parse_path(&mut self) -> Result<Vec<String>> {
        let mut segments = vec![self.expect_identifier()?];
        while self.match_token(TokenType::Dot) {
            segments.push(self.expect_name()?);
        }
        Ok(segments)
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.match_token(TokenType::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.match_token(TokenType::And) {
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_primary()?;

        if left.path().is_some()
            && matches!(
                self.current().token_type,
                TokenType::Last | TokenType::This | TokenType::Before | TokenType::After
            )
        {
            return self.parse_date_comparison(left);
        }

        let op = match self.current().token_type {
            TokenType::Equals => ComparisonOp::Eq,
            TokenType::NotEquals => ComparisonOp::Ne,
            TokenType::GreaterThan => ComparisonOp::Gt,
            TokenType::GreaterThanOrEqual => ComparisonOp::Ge,
            TokenType::LessThan => ComparisonOp::Lt,
            TokenType::LessThanOrEqual => ComparisonOp::Le,
            TokenType::In => ComparisonOp::In,
            TokenType::Contains => ComparisonOp::Contains,
            TokenType::Any => ComparisonOp::Any,
            _ => return Ok(left),
        };
        self.advance();

        let right = self.parse_primary()?;
        Ok(Expr::comparison(op, left, right))
    }

    /// `field last N <unit>`, `field this <period>`, `field before x`,
    /// `field after x`
    fn parse_date_comparison(&mut self, field: Expr) -> Result<Expr> {
        match self.current().token_type {
            TokenType::Last => {
                self.advance();
                let amount = self.expect_usize()?;
                let unit = match self.current().token_type {
                    TokenType::Days => "days",
                    TokenType::Weeks => "weeks",
                    TokenType::Month => "months",
                    TokenType::Year => "years",
                    TokenType::Hours => "hours",
                    TokenType::Minutes => "minutes",
                    _ => return Err(self.expected("time unit")),
                };
                self.advance();
                let anchor = Expr::literal(LiteralKind::Date, format!("now-{}-{}", amount, unit));
                Ok(Expr::comparison(ComparisonOp::Ge, field, anchor))
            }
            TokenType::This => {
                self.advance();
                let token = self.current();
                let period = match token.token_type {
                    TokenType::Month => "month",
                    TokenType::Year => "year",
                    TokenType::Weeks => "week",
                    TokenType::Days => "day",
                    TokenType::Identifier if token.text.eq_ignore_ascii_case("week") => "week",
                    TokenType::Identifier if token.text.eq_ignore_ascii_case("day") => "day",
                    _ => return Err(self.expected("time period")),
                };
                self.advance();
                let anchor = Expr::literal(LiteralKind::Date, format!("this-{}", period));
                Ok(Expr::comparison(ComparisonOp::Ge, field, anchor))
            }
            TokenType::Before | TokenType::After => {
                let op = if self.current().is(TokenType::Before) {
                    ComparisonOp::Lt
                } else {
                    ComparisonOp::Gt
                };
                self.advance();
                let bound = match self.parse_primary()? {
                    Expr::Literal { kind: LiteralKind::String, raw } => {
                        Expr::literal(LiteralKind::Date, raw)
                    }
                    other => other,
                };
                Ok(Expr::comparison(op, field, bound))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        match token.token_type {
            TokenType::Count | TokenType::Sum | TokenType::Avg
                if self.peek(1).is(TokenType::LeftParen) =>
            {
                self.parse_field_path()
            }
            TokenType::Identifier => self.parse_field_path(),
            TokenType::String => {
                self.advance();
                Ok(Expr::literal(LiteralKind::String, token.text))
            }
            TokenType::Number => {
                self.advance();
                Ok(Expr::literal(LiteralKind::Number, token.text))
            }
            TokenType::Boolean => {
                self.advance();
                Ok(Expr::literal(LiteralKind::Boolean, token.text.to_lowercase()))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expr::literal(LiteralKind::Null, "null"))
            }
            TokenType::LeftBracket => Ok(Expr::Json(self.parse_json_array()?)),
            TokenType::LeftBrace => Ok(Expr::Json(self.parse_json_object()?)),
            TokenType::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::RightParen)?;
                Ok(expr)
            }
            TokenType::Not => {
                self.advance();
                let operand = self.parse_comparison()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            _ => Err(self.unexpected()),
        }
    }

    // ---------------------------------------------------------------------
    // JSON literals
    // ---------------------------------------------------------------------

    fn parse_json_value(&mut self) -> Result<JsonValue> {
        let token = self.current().clone();
        let value = match token.token_type {
            TokenType::LeftBrace => return self.parse_json_object(),
            TokenType::LeftBracket => return self.parse_json_array(),
            TokenType::String => JsonValue::String(token.text),
            TokenType::Number => JsonValue::Number(token.text),
            TokenType::Boolean => JsonValue::Boolean(token.text.eq_ignore_ascii_case("true")),
            TokenType::Null => JsonValue::Null,
            TokenType::Eof => return Err(self.unexpected()),
            _ => return Err(self.expected("JSON value")),
        };
        self.advance();
        Ok(value)
    }

    fn parse_json_object(&mut self) -> Result<JsonValue> {
        self.expect(TokenType::LeftBrace)?;
        let mut members = IndexMap::new();

        while !self.current().is(TokenType::RightBrace) {
            let token = self.current();
            let key = if matches!(token.token_type, TokenType::Identifier | TokenType::String)
                || token.token_type.is_keyword()
            {
                token.text.clone()
            } else {
                return Err(self.expected("property name"));
            };
            self.advance();
            self.expect(TokenType::Colon)?;
            let value = self.parse_json_value()?;
            members.insert(key, Expr::Json(value));

            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        self.expect(TokenType::RightBrace)?;
        Ok(JsonValue::Object(members))
    }

    fn parse_json_array(&mut self) -> Result<JsonValue> {
        self.expect(TokenType::LeftBracket)?;
        let mut items = Vec::new();

        while !self.current().is(TokenType::RightBracket) {
            items.push(Expr::Json(self.parse_json_value()?));
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }

        self.expect(TokenType::RightBracket)?;
        Ok(JsonValue::Array(items))
    }

    // ---------------------------------------------------------------------
    // Mutations and schema
    // ---------------------------------------------------------------------

    fn parse_upsert(&mut self) -> Result<UpsertStmt> {
        let position = self.current().position;
        self.expect(TokenType::Upsert)?;
        let table = self.expect_identifier()?;

        let data = match self.current().token_type {
            TokenType::LeftBrace | TokenType::LeftBracket => Expr::Json(self.parse_json_value()?),
            _ => return Err(self.expected("JSON object or array")),
        };

        let on_field = if self.match_token(TokenType::On) {
            Some(self.expect_name()?)
        } else {
            None
        };

        Ok(UpsertStmt {
            table,
            data,
            on_field,
            position,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStmt> {
        let position = self.current().position;
        self.expect(TokenType::Delete)?;
        let table = self.expect_identifier()?;

        let where_clause = if self.match_token(TokenType::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(DeleteStmt {
            table,
            where_clause,
            position,
        })
    }

    fn parse_create(&mut self) -> Result<Statement> {
        let position = self.current().position;
        self.expect(TokenType::Create)?;

        match self.current().token_type {
            TokenType::Database => {
                self.advance();
                let database_name = if self.current().is(TokenType::Identifier) {
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                Ok(Statement::Schema(SchemaStmt {
                    op: SchemaOp::CreateDatabase,
                    database_name,
                    table_name: None,
                    column_name: None,
                    data_type: None,
                    position,
                }))
            }
            TokenType::Table => {
                self.advance();
                let table_name = self.expect_identifier()?;
                Ok(Statement::Schema(SchemaStmt {
                    op: SchemaOp::CreateTable,
                    database_name: None,
                    table_name: Some(table_name),
                    column_name: None,
                    data_type: None,
                    position,
                }))
            }
            TokenType::Branch => {
                self.advance();
                let branch_name = self.expect_identifier()?;
                let source = if self.match_token(TokenType::From) {
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                Ok(Statement::Branch(BranchStmt {
                    source,
                    ..BranchStmt::new(BranchOp::Create, Some(branch_name), position)
                }))
            }
            TokenType::Alias => {
                self.advance();
                let alias = self.expect_identifier()?;
                self.match_token(TokenType::For);
                self.expect(TokenType::Branch)?;
                let branch_name = self.expect_identifier()?;
                Ok(Statement::Branch(BranchStmt {
                    alias: Some(alias),
                    ..BranchStmt::new(BranchOp::CreateAlias, Some(branch_name), position)
                }))
            }
            TokenType::Token => {
                self.advance();
                let token_name = self.expect_string()?;
                let config = if self.match_token(TokenType::With) {
                    Some(Expr::Json(self.parse_json_value()?))
                } else {
                    None
                };
                Ok(Statement::Auth(AuthStmt {
                    op: AuthOp::CreateToken,
                    token_name: Some(token_name),
                    config,
                    position,
                }))
            }
            _ => Err(self.expected("database, table, branch, alias or token")),
        }
    }

    fn parse_add_column(&mut self) -> Result<SchemaStmt> {
        let position = self.current().position;
        self.expect(TokenType::Add)?;
        self.expect(TokenType::Column)?;
        let (table_name, column_name) = self.parse_table_column()?;

        let data_type = if self.current().is(TokenType::Identifier) {
            Some(self.expect_identifier()?)
        } else {
            None
        };

        Ok(SchemaStmt {
            op: SchemaOp::AddColumn,
            database_name: None,
            table_name: Some(table_name),
            column_name: Some(column_name),
            data_type,
            position,
        })
    }

    fn parse_purge_column(&mut self) -> Result<SchemaStmt> {
        let position = self.current().position;
        self.expect(TokenType::Purge)?;
        self.expect(TokenType::Column)?;
        let (table_name, column_name) = self.parse_table_column()?;

        Ok(SchemaStmt {
            op: SchemaOp::PurgeColumn,
            database_name: None,
            table_name: Some(table_name),
            column_name: Some(column_name),
            data_type: None,
            position,
        })
    }

    fn parse_table_column(&mut self) -> Result<(String, String)> {
        let position = self.current().position;
        let mut path = self.parse_path()?;
        if path.len() != 2 {
            return Err(SproutError::parse("Expected table.column format", position));
        }
        let column = path.pop().unwrap_or_default();
        let table = path.pop().unwrap_or_default();
        Ok((table, column))
    }

    fn parse_drop(&mut self) -> Result<SchemaStmt> {
        let position = self.current().position;
        self.expect(TokenType::Drop)?;
        self.expect(TokenType::Table)?;
        let table_name = self.expect_identifier()?;

        Ok(SchemaStmt {
            op: SchemaOp::DropTable,
            database_name: None,
            table_name: Some(table_name),
            column_name: None,
            data_type: None,
            position,
        })
    }

    // ---------------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------------

    fn parse_update_alias(&mut self) -> Result<BranchStmt> {
        let position = self.current().position;
        self.expect(TokenType::Update)?;
        self.expect(TokenType::Alias)?;
        let alias = self.expect_identifier()?;
        self.match_word("to");
        self.expect(TokenType::Branch)?;
        let branch_name = self.expect_identifier()?;

        Ok(BranchStmt {
            alias: Some(alias),
            ..BranchStmt::new(BranchOp::UpdateAlias, Some(branch_name), position)
        })
    }

    fn parse_checkout(&mut self) -> Result<BranchStmt> {
        let position = self.current().position;
        self.expect(TokenType::Checkout)?;
        self.expect(TokenType::Branch)?;
        let branch_name = self.expect_identifier()?;

        let mut stmt = BranchStmt::new(BranchOp::Checkout, Some(branch_name), position);
        if self.current().is(TokenType::As) && self.peek(1).is(TokenType::Of) {
            self.advance(); // as
            self.advance(); // of
            stmt.as_of = Some(self.expect_string()?);
            if self.match_token(TokenType::As) {
                stmt.alias = Some(self.expect_identifier()?);
            }
        }
        Ok(stmt)
    }

    fn parse_merge(&mut self) -> Result<BranchStmt> {
        let position = self.current().position;
        self.expect(TokenType::Merge)?;
        self.match_token(TokenType::Branch);
        let source = self.expect_identifier()?;
        self.expect(TokenType::Into)?;
        self.match_token(TokenType::Branch);
        let target = self.expect_identifier()?;

        Ok(BranchStmt {
            source: Some(source),
            target: Some(target),
            ..BranchStmt::new(BranchOp::Merge, None, position)
        })
    }

    fn parse_branch_management(&mut self) -> Result<BranchStmt> {
        let position = self.current().position;
        let op = match self.current().token_type {
            TokenType::Protect => BranchOp::Protect,
            TokenType::Unprotect => BranchOp::Unprotect,
            TokenType::Abandon => BranchOp::Abandon,
            TokenType::Reactivate => BranchOp::Reactivate,
            _ => return Err(self.error("Unexpected branch operation")),
        };
        self.advance();
        self.expect(TokenType::Branch)?;
        let branch_name = self.expect_identifier()?;

        let mut stmt = BranchStmt::new(op, Some(branch_name), position);
        // abandon branch <name> [with '<reason>']
        if op == BranchOp::Abandon && self.match_token(TokenType::With) {
            stmt.source = Some(self.expect_string()?);
        }
        Ok(stmt)
    }

    // ---------------------------------------------------------------------
    // Auth and meta
    // ---------------------------------------------------------------------

    fn parse_auth(&mut self) -> Result<AuthStmt> {
        let position = self.current().position;
        let op = match self.current().token_type {
            TokenType::Revoke => AuthOp::RevokeToken,
            TokenType::Disable => AuthOp::DisableToken,
            TokenType::Enable => AuthOp::EnableToken,
            TokenType::List => AuthOp::ListTokens,
            _ => return Err(self.error("Unexpected auth operation")),
        };
        self.advance();

        let token_name = if op == AuthOp::ListTokens {
            if !self.match_token(TokenType::Token) {
                self.match_word("tokens");
            }
            None
        } else {
            self.expect(TokenType::Token)?;
            Some(self.expect_string()?)
        };

        Ok(AuthStmt {
            op,
            token_name,
            config: None,
            position,
        })
    }

    fn parse_meta(&mut self) -> Result<MetaStmt> {
        let position = self.current().position;
        let op = match self.current().token_type {
            TokenType::Backup => MetaOp::Backup,
            TokenType::Restore => MetaOp::Restore,
            TokenType::Explain => MetaOp::Explain,
            TokenType::Respawn => MetaOp::Respawn,
            _ => return Err(self.error("Unexpected meta operation")),
        };
        self.advance();

        let mut stmt = MetaStmt {
            op,
            target: None,
            source: None,
            explained: None,
            position,
        };

        match op {
            MetaOp::Backup => {
                self.match_token(TokenType::Database);
                self.match_word("to");
                stmt.target = Some(self.expect_string()?);
            }
            MetaOp::Restore => {
                self.match_token(TokenType::Database);
                self.match_token(TokenType::From);
                stmt.source = Some(self.expect_string()?);
            }
            MetaOp::Explain => {
                let start = self.current().position;
                let explained = self.parse_statement()?;
                let end = self.current().position;
                stmt.target = Some(self.source_text(start, end).unwrap_or_else(|| "query".to_string()));
                stmt.explained = Some(Box::new(explained));
            }
            MetaOp::Respawn => {
                self.expect(TokenType::Branch)?;
                stmt.source = Some(self.expect_identifier()?);
                if self.match_token(TokenType::As) {
                    stmt.target = Some(self.expect_identifier()?);
                }
            }
        }

        Ok(stmt)
    }

    fn source_text(&self, start: usize, end: usize) -> Option<String> {
        let source = self.source.as_ref()?;
        let end = end.min(source.len());
        let text: String = source.get(start..end)?.iter().collect();
        Some(text.trim().to_string())
    }

    // ---------------------------------------------------------------------
    // Helper methods
    // ---------------------------------------------------------------------

    fn expect_identifier(&mut self) -> Result<String> {
        if self.current().is(TokenType::Identifier) {
            let name = self.current().text.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.expected("identifier"))
        }
    }

    /// Identifier or keyword used as a name (`users.count`, `on date`)
    fn expect_name(&mut self) -> Result<String> {
        let token = self.current();
        if token.is(TokenType::Identifier) || token.token_type.is_keyword() {
            let name = token.text.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.expected("identifier"))
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        if self.current().is(TokenType::String) {
            let value = self.current().text.clone();
            self.advance();
            Ok(value)
        } else {
            Err(self.expected("string"))
        }
    }

    fn expect_usize(&mut self) -> Result<usize> {
        let token = self.current();
        if token.is(TokenType::Number) {
            if let Ok(n) = token.text.parse::<usize>() {
                self.advance();
                return Ok(n);
            }
        }
        Err(self.expected("number"))
    }

    fn current(&self) -> &Token {
        self.peek(0)
    }

    /// Token `offset` ahead; reads past the end yield the EOF token
    fn peek(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + offset).min(last)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.current().is(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Match a non-reserved word such as `to` or `tokens`
    fn match_word(&mut self, word: &str) -> bool {
        let token = self.current();
        if token.is(TokenType::Identifier) && token.text.eq_ignore_ascii_case(word) {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, token_type: TokenType) -> Result<()> {
        if self.current().is(token_type) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected(&format!("{:?}", token_type)))
        }
    }

    fn expected(&self, what: &str) -> SproutError {
        let token = self.current();
        if token.is(TokenType::Eof) {
            return SproutError::parse("Unexpected end of input", token.position);
        }
        SproutError::parse(
            format!("Expected {} but found '{}'", what, token.text),
            token.position,
        )
    }

    fn unexpected(&self) -> SproutError {
        let token = self.current();
        if token.is(TokenType::Eof) {
            return SproutError::parse("Unexpected end of input", token.position);
        }
        SproutError::parse(format!("Unexpected token '{}'", token.text), token.position)
    }

    fn error(&self, msg: &str) -> SproutError {
        SproutError::parse(msg, self.current().position)
    }
}

impl BranchStmt {
    fn new(op: BranchOp, branch_name: Option<String>, position: usize) -> Self {
        Self {
            op,
            branch_name,
            source: None,
            target: None,
            as_of: None,
            alias: None,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::Lexer;

    fn parse(text: &str) -> Result<Statement> {
        let tokens = Lexer::new(text).tokenize();
        Parser::new(tokens).with_source(text).parse()
    }

    fn parse_query(text: &str) -> QueryStmt {
        match parse(text).unwrap() {
            Statement::Query(q) => q,
            other => panic!("Expected query statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_get() {
        let q = parse_query("get users where age > 25");
        assert_eq!(q.op, QueryOp::Get);
        assert_eq!(q.table, "users");
        assert!(matches!(
            q.where_clause,
            Some(Expr::Comparison { op: ComparisonOp::Gt, .. })
        ));
    }

    #[test]
    fn test_parse_full_query_clause_order() {
        let q = parse_query(
            "get users follow users.id -> orders.user_id as orders \
             where orders.total > 100 group by users.name having count(orders.id) > 2 \
             order by count(orders.id) desc \
             select users.name, count(orders.id) as order_count, sum(orders.total) as total_spent \
             page 1 of size 10",
        );
        assert_eq!(q.joins.len(), 1);
        assert_eq!(q.joins[0].left_path, vec!["users", "id"]);
        assert_eq!(q.joins[0].right_path, vec!["orders", "user_id"]);
        assert_eq!(q.joins[0].join_type, JoinType::Inner);
        assert_eq!(q.group_by, vec![Expr::field(&["users", "name"])]);
        assert!(!q.order_by[0].asc);
        assert_eq!(q.order_by[0].field, Expr::field(&["count(orders.id)"]));
        assert_eq!(q.select.len(), 3);
        assert_eq!(q.select[1].output_name().as_deref(), Some("order_count"));
        assert_eq!(q.pagination, Some(Pagination { page: 1, size: 10 }));
    }

    #[test]
    fn test_parse_join_type_and_on() {
        let q = parse_query(
            "get users follow users.id -> orders.user_id as ordars (left) on ordars.status = 'completed'",
        );
        assert_eq!(q.joins[0].join_type, JoinType::Left);
        assert_eq!(q.joins[0].alias, "ordars");
        assert!(q.joins[0].on.is_some());
    }

    #[test]
    fn test_parse_aggregate_shorthand() {
        let q = parse_query("avg users.age");
        assert_eq!(q.op, QueryOp::Avg);
        assert_eq!(q.select, vec![Expr::field(&["users", "age"])]);

        let q = parse_query("sum orders.total select amount");
        assert_eq!(q.select, vec![Expr::field(&["amount"])]);
    }

    #[test]
    fn test_parse_date_comparisons() {
        let q = parse_query("get orders where date last 7 days");
        assert_eq!(
            q.where_clause,
            Some(Expr::comparison(
                ComparisonOp::Ge,
                Expr::field(&["date"]),
                Expr::literal(LiteralKind::Date, "now-7-days"),
            ))
        );

        let q = parse_query("get orders where date this month");
        assert_eq!(
            q.where_clause,
            Some(Expr::comparison(
                ComparisonOp::Ge,
                Expr::field(&["date"]),
                Expr::literal(LiteralKind::Date, "this-month"),
            ))
        );

        let q = parse_query("get orders where date before '2024-01-01'");
        assert_eq!(
            q.where_clause,
            Some(Expr::comparison(
                ComparisonOp::Lt,
                Expr::field(&["date"]),
                Expr::literal(LiteralKind::Date, "2024-01-01"),
            ))
        );
    }

    #[test]
    fn test_parse_logical_precedence() {
        let q = parse_query("get users where a = 1 or b = 2 and not c = 3");
        match q.where_clause {
            Some(Expr::Binary { op: LogicalOp::Or, right, .. }) => {
                assert!(matches!(*right, Expr::Binary { op: LogicalOp::And, .. }));
            }
            other => panic!("Expected OR at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_in_array() {
        let q = parse_query("get users where city in ['Berlin', 'Paris']");
        match q.where_clause {
            Some(Expr::Comparison { op: ComparisonOp::In, right, .. }) => {
                assert!(matches!(*right, Expr::Json(JsonValue::Array(ref items)) if items.len() == 2));
            }
            other => panic!("Expected IN comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_upsert_object_and_array() {
        match parse("upsert users { name: 'John', 'age': 30, tags: ['a', 'b'] } on name").unwrap() {
            Statement::Upsert(u) => {
                assert_eq!(u.table, "users");
                assert_eq!(u.on_field.as_deref(), Some("name"));
                match u.data {
                    Expr::Json(JsonValue::Object(map)) => {
                        assert_eq!(map.len(), 3);
                        assert!(map.contains_key("age"));
                    }
                    other => panic!("Expected object payload, got {:?}", other),
                }
            }
            other => panic!("Expected upsert, got {:?}", other),
        }

        match parse("upsert users [ { name: 'a' }, { name: 'b' } ]").unwrap() {
            Statement::Upsert(u) => {
                assert!(matches!(u.data, Expr::Json(JsonValue::Array(ref items)) if items.len() == 2));
            }
            other => panic!("Expected upsert, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_schema_statements() {
        assert!(matches!(
            parse("create database").unwrap(),
            Statement::Schema(SchemaStmt { op: SchemaOp::CreateDatabase, database_name: None, .. })
        ));
        match parse("add column users.age mixed").unwrap() {
            Statement::Schema(s) => {
                assert_eq!(s.op, SchemaOp::AddColumn);
                assert_eq!(s.table_name.as_deref(), Some("users"));
                assert_eq!(s.column_name.as_deref(), Some("age"));
                assert_eq!(s.data_type.as_deref(), Some("mixed"));
            }
            other => panic!("Expected schema statement, got {:?}", other),
        }
        assert!(matches!(
            parse("purge column users.age").unwrap(),
            Statement::Schema(SchemaStmt { op: SchemaOp::PurgeColumn, .. })
        ));
        assert!(matches!(
            parse("drop table users;").unwrap(),
            Statement::Schema(SchemaStmt { op: SchemaOp::DropTable, .. })
        ));
    }

    #[test]
    fn test_parse_branch_auth_meta() {
        match parse("checkout branch main as of '2024-01-01' as snapshot").unwrap() {
            Statement::Branch(b) => {
                assert_eq!(b.op, BranchOp::Checkout);
                assert_eq!(b.as_of.as_deref(), Some("2024-01-01"));
                assert_eq!(b.alias.as_deref(), Some("snapshot"));
            }
            other => panic!("Expected branch statement, got {:?}", other),
        }
        assert!(matches!(
            parse("merge feature into main").unwrap(),
            Statement::Branch(BranchStmt { op: BranchOp::Merge, .. })
        ));
        assert!(matches!(
            parse("create token 'ci' with { read: true }").unwrap(),
            Statement::Auth(AuthStmt { op: AuthOp::CreateToken, config: Some(_), .. })
        ));
        assert!(matches!(
            parse("list tokens").unwrap(),
            Statement::Auth(AuthStmt { op: AuthOp::ListTokens, .. })
        ));
        match parse("explain get users where age > 5").unwrap() {
            Statement::Meta(m) => {
                assert_eq!(m.op, MetaOp::Explain);
                assert_eq!(m.target.as_deref(), Some("get users where age > 5"));
                assert!(matches!(m.explained.as_deref(), Some(Statement::Query(_))));
            }
            other => panic!("Expected meta statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_abandon_reason() {
        match parse("abandon branch legacy with 'replaced by v2'").unwrap() {
            Statement::Branch(b) => {
                assert_eq!(b.op, BranchOp::Abandon);
                assert_eq!(b.branch_name.as_deref(), Some("legacy"));
                assert_eq!(b.source.as_deref(), Some("replaced by v2"));
            }
            other => panic!("Expected branch statement, got {:?}", other),
        }

        // only abandon takes a reason
        assert!(parse("protect branch main with 'x'").is_err());
    }

    #[test]
    fn test_parse_errors_carry_positions() {
        let err = parse("").unwrap_err();
        assert!(matches!(err, SproutError::Parse { ref message, position: 0 } if message == "Empty input"));

        let err = parse("get").unwrap_err();
        assert!(matches!(err, SproutError::Parse { ref message, position: 3 } if message == "Unexpected end of input"));

        let err = parse("get users where @").unwrap_err();
        assert!(matches!(err, SproutError::Parse { ref message, position: 16 } if message == "Unexpected token '@'"));

        let err = parse("frobnicate users").unwrap_err();
        assert_eq!(err.position(), Some(0));
    }
}
