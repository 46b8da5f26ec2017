//! Rendering and parsing of the store's SQL dialect.
//!
//! The dialect covers exactly what locked single-table reads need:
//!
//! ```text
//! SELECT "a".* FROM "t" AS "a"
//!     [INNER JOIN "u" AS "b" ON "a"."x" = "b"."y"]...
//!     [WHERE term [AND term]...]
//!     [ORDER BY column [ASC|DESC] [, ...]]
//!     [LIMIT n]
//!     [FOR UPDATE | FOR SHARE]
//! ```
//!
//! Terms are `column <op> literal`, `column IS [NOT] NULL` and
//! `column IN (literal, ...)`. Identifiers may be double-quoted or bare.

use crate::error::{StoreError, StoreResult};
use crate::query::{ColumnRef, Comparison, Join, Order, Predicate, Query};
use crate::types::LockMode;
use crate::value::Value;

/// A parsed statement: the query and the lock it requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// The read query.
    pub query: Query,
    /// Requested row lock.
    pub lock: LockMode,
}

const RESERVED: &[&str] = &[
    "SELECT", "FROM", "AS", "INNER", "JOIN", "ON", "WHERE", "AND", "ORDER", "BY", "ASC", "DESC",
    "LIMIT", "FOR", "UPDATE", "SHARE", "IS", "NOT", "NULL", "IN", "TRUE", "FALSE",
];

/// Quotes an identifier.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn render_column(column: &ColumnRef) -> String {
    match &column.qualifier {
        Some(q) => format!("{}.{}", quote_ident(q), quote_ident(&column.name)),
        None => quote_ident(&column.name),
    }
}

fn render_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Compare { column, op, value } => format!(
            "{} {} {}",
            render_column(column),
            op.as_sql(),
            value.to_sql_literal()
        ),
        Predicate::IsNull(column) => format!("{} IS NULL", render_column(column)),
        Predicate::IsNotNull(column) => format!("{} IS NOT NULL", render_column(column)),
        Predicate::In { column, values } => {
            let list: Vec<String> = values.iter().map(Value::to_sql_literal).collect();
            format!("{} IN ({})", render_column(column), list.join(", "))
        }
    }
}

/// Renders a query to SQL text, without any lock clause.
#[must_use]
pub fn render(query: &Query) -> String {
    let mut sql = format!(
        "SELECT {}.* FROM {}",
        quote_ident(query.effective_alias()),
        quote_ident(&query.table)
    );
    if let Some(alias) = &query.alias {
        sql.push_str(" AS ");
        sql.push_str(&quote_ident(alias));
    }

    for join in &query.joins {
        sql.push_str(" INNER JOIN ");
        sql.push_str(&quote_ident(&join.table));
        if let Some(alias) = &join.alias {
            sql.push_str(" AS ");
            sql.push_str(&quote_ident(alias));
        }
        sql.push_str(" ON ");
        sql.push_str(&render_column(&join.left));
        sql.push_str(" = ");
        sql.push_str(&render_column(&join.right));
    }

    if !query.filters.is_empty() {
        let terms: Vec<String> = query.filters.iter().map(render_predicate).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&terms.join(" AND "));
    }

    if !query.order_by.is_empty() {
        let terms: Vec<String> = query
            .order_by
            .iter()
            .map(|(column, order)| {
                let dir = match order {
                    Order::Asc => "ASC",
                    Order::Desc => "DESC",
                };
                format!("{} {dir}", render_column(column))
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    sql
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Integer(i64),
    Text(String),
    Hex(Vec<u8>),
    Symbol(&'static str),
}

fn tokenize(sql: &str) -> StoreResult<Vec<(Token, usize)>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        let start = pos;

        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let token = match b {
            b'"' => {
                let (text, next) = read_quoted(sql, pos, b'"')?;
                pos = next;
                Token::Quoted(text)
            }
            b'\'' => {
                let (text, next) = read_quoted(sql, pos, b'\'')?;
                pos = next;
                Token::Text(text)
            }
            b'X' | b'x' if bytes.get(pos + 1) == Some(&b'\'') => {
                let (text, next) = read_quoted(sql, pos + 1, b'\'')?;
                pos = next;
                Token::Hex(decode_hex(&text, start)?)
            }
            b'0'..=b'9' => {
                let (value, next) = read_integer(sql, pos, pos)?;
                pos = next;
                Token::Integer(value)
            }
            b'-' if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                let (value, next) = read_integer(sql, pos, pos + 1)?;
                pos = next;
                Token::Integer(value)
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let mut end = pos;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let word = sql[pos..end].to_string();
                pos = end;
                Token::Word(word)
            }
            _ => {
                let two = sql.get(pos..pos + 2);
                let symbol = match two {
                    Some("<=") => Some("<="),
                    Some(">=") => Some(">="),
                    Some("<>") | Some("!=") => Some("<>"),
                    _ => None,
                };
                if let Some(symbol) = symbol {
                    pos += 2;
                    Token::Symbol(symbol)
                } else {
                    let symbol = match b {
                        b'=' => "=",
                        b'<' => "<",
                        b'>' => ">",
                        b'.' => ".",
                        b',' => ",",
                        b'*' => "*",
                        b'(' => "(",
                        b')' => ")",
                        b';' => ";",
                        _ => {
                            return Err(StoreError::syntax(
                                format!("unexpected character {:?}", char::from(b)),
                                pos,
                            ))
                        }
                    };
                    pos += 1;
                    Token::Symbol(symbol)
                }
            }
        };
        tokens.push((token, start));
    }

    Ok(tokens)
}

/// Reads a quoted run starting at `start` (which holds the quote byte).
/// A doubled quote inside the run stands for one quote character.
fn read_quoted(sql: &str, start: usize, quote: u8) -> StoreResult<(String, usize)> {
    let bytes = sql.as_bytes();
    let mut text = String::new();
    let mut pos = start + 1;
    let mut run_start = pos;

    loop {
        match bytes.get(pos) {
            None => return Err(StoreError::syntax("unterminated quoted text", start)),
            Some(&b) if b == quote => {
                text.push_str(&sql[run_start..pos]);
                if bytes.get(pos + 1) == Some(&quote) {
                    text.push(char::from(quote));
                    pos += 2;
                    run_start = pos;
                } else {
                    return Ok((text, pos + 1));
                }
            }
            Some(_) => pos += 1,
        }
    }
}

fn read_integer(sql: &str, start: usize, digits_from: usize) -> StoreResult<(i64, usize)> {
    let bytes = sql.as_bytes();
    let mut end = digits_from;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    sql[start..end]
        .parse::<i64>()
        .map(|value| (value, end))
        .map_err(|_| StoreError::syntax("integer literal out of range", start))
}

fn decode_hex(text: &str, position: usize) -> StoreResult<Vec<u8>> {
    if !text.is_ascii() {
        return Err(StoreError::syntax("invalid hex digit", position));
    }
    if text.len() % 2 != 0 {
        return Err(StoreError::syntax("odd number of hex digits", position));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| StoreError::syntax("invalid hex digit", position))
        })
        .collect()
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.end, |(_, position)| *position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&self, message: impl Into<String>) -> StoreResult<T> {
        Err(StoreError::syntax(message, self.position()))
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> StoreResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.error(format!("expected {keyword}"))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> StoreResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            self.error(format!("expected '{symbol}'"))
        }
    }

    fn at_identifier(&self) -> bool {
        match self.peek() {
            Some(Token::Quoted(_)) => true,
            Some(Token::Word(w)) => !RESERVED.iter().any(|r| w.eq_ignore_ascii_case(r)),
            _ => false,
        }
    }

    fn identifier(&mut self) -> StoreResult<String> {
        if !self.at_identifier() {
            return self.error("expected identifier");
        }
        match self.advance() {
            Some(Token::Quoted(name)) | Some(Token::Word(name)) => Ok(name),
            _ => self.error("expected identifier"),
        }
    }

    fn column(&mut self) -> StoreResult<ColumnRef> {
        let first = self.identifier()?;
        if self.eat_symbol(".") {
            let name = self.identifier()?;
            Ok(ColumnRef::qualified(first, name))
        } else {
            Ok(ColumnRef::new(first))
        }
    }

    fn optional_alias(&mut self) -> StoreResult<Option<String>> {
        if self.eat_keyword("AS") || self.at_identifier() {
            self.identifier().map(Some)
        } else {
            Ok(None)
        }
    }

    fn literal(&mut self) -> StoreResult<Value> {
        let value = match self.peek() {
            Some(Token::Integer(i)) => Value::Integer(*i),
            Some(Token::Text(s)) => Value::Text(s.clone()),
            Some(Token::Hex(b)) => Value::Bytes(b.clone()),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("NULL") => Value::Null,
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("TRUE") => Value::Bool(true),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("FALSE") => Value::Bool(false),
            _ => return self.error("expected literal"),
        };
        self.pos += 1;
        Ok(value)
    }

    fn comparison(&mut self) -> Option<Comparison> {
        let op = match self.peek() {
            Some(Token::Symbol("=")) => Comparison::Eq,
            Some(Token::Symbol("<>")) => Comparison::Ne,
            Some(Token::Symbol("<")) => Comparison::Lt,
            Some(Token::Symbol("<=")) => Comparison::Le,
            Some(Token::Symbol(">")) => Comparison::Gt,
            Some(Token::Symbol(">=")) => Comparison::Ge,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn predicate(&mut self) -> StoreResult<Predicate> {
        let column = self.column()?;

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(if negated {
                Predicate::IsNotNull(column)
            } else {
                Predicate::IsNull(column)
            });
        }

        if self.eat_keyword("IN") {
            self.expect_symbol("(")?;
            let mut values = Vec::new();
            if !self.eat_symbol(")") {
                loop {
                    values.push(self.literal()?);
                    if self.eat_symbol(")") {
                        break;
                    }
                    self.expect_symbol(",")?;
                }
            }
            return Ok(Predicate::In { column, values });
        }

        match self.comparison() {
            Some(op) => {
                let value = self.literal()?;
                Ok(Predicate::Compare { column, op, value })
            }
            None => self.error("expected comparison operator"),
        }
    }

    fn statement(&mut self) -> StoreResult<Statement> {
        self.expect_keyword("SELECT")?;
        let projection = if self.eat_symbol("*") {
            None
        } else {
            let qualifier = self.identifier()?;
            self.expect_symbol(".")?;
            self.expect_symbol("*")?;
            Some(qualifier)
        };

        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let mut query = Query::table(table);
        query.alias = self.optional_alias()?;

        if let Some(qualifier) = projection {
            if qualifier != query.effective_alias() {
                return Err(StoreError::unsupported(format!(
                    "projection of {qualifier}.* (only the main table can be selected)"
                )));
            }
        }

        loop {
            if self.eat_keyword("INNER") {
                self.expect_keyword("JOIN")?;
            } else if !self.eat_keyword("JOIN") {
                break;
            }
            let table = self.identifier()?;
            let alias = self.optional_alias()?;
            self.expect_keyword("ON")?;
            let left = self.column()?;
            self.expect_symbol("=")?;
            let right = self.column()?;
            query.joins.push(Join {
                table,
                alias,
                left,
                right,
            });
        }

        if self.eat_keyword("WHERE") {
            loop {
                query.filters.push(self.predicate()?);
                if !self.eat_keyword("AND") {
                    break;
                }
            }
        }

        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let column = self.column()?;
                let order = if self.eat_keyword("DESC") {
                    Order::Desc
                } else {
                    self.eat_keyword("ASC");
                    Order::Asc
                };
                query.order_by.push((column, order));
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }

        if self.eat_keyword("LIMIT") {
            match self.advance() {
                Some(Token::Integer(n)) if n >= 0 => query.limit = Some(n.unsigned_abs()),
                _ => return self.error("expected non-negative LIMIT"),
            }
        }

        let lock = if self.eat_keyword("FOR") {
            if self.eat_keyword("UPDATE") {
                LockMode::ForUpdate
            } else if self.eat_keyword("SHARE") {
                LockMode::Share
            } else {
                return self.error("expected UPDATE or SHARE after FOR");
            }
        } else {
            LockMode::None
        };

        self.eat_symbol(";");
        if self.peek().is_some() {
            return self.error("unexpected trailing input");
        }

        Ok(Statement { query, lock })
    }
}

/// Parses a statement of this dialect.
///
/// # Errors
///
/// Returns [`StoreError::Syntax`] for malformed text and
/// [`StoreError::Unsupported`] for constructs outside the dialect.
pub fn parse(sql: &str) -> StoreResult<Statement> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: sql.len(),
    };
    parser.statement()
}
