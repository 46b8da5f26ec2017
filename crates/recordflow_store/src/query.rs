//! Structured read queries.

use crate::value::{Row, Value};
use std::fmt;

/// A possibly qualified column reference (`alias.column` or `column`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Table alias qualifier, if any.
    pub qualifier: Option<String>,
    /// Column name.
    pub name: String,
}

impl ColumnRef {
    /// Creates an unqualified column reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    /// Creates a column reference qualified by a table alias.
    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }

    /// Parses `alias.column` or `column`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((qualifier, name)) => Self::qualified(qualifier, name),
            None => Self::new(text),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for ColumnRef {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparison {
    /// SQL spelling of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A single filter term. Terms in a [`Query`] are joined with `AND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column <op> value`
    Compare {
        /// Left-hand column.
        column: ColumnRef,
        /// Operator.
        op: Comparison,
        /// Right-hand literal.
        value: Value,
    },
    /// `column IS NULL`
    IsNull(ColumnRef),
    /// `column IS NOT NULL`
    IsNotNull(ColumnRef),
    /// `column IN (values...)`
    In {
        /// Tested column.
        column: ColumnRef,
        /// Candidate literals.
        values: Vec<Value>,
    },
}

impl Predicate {
    fn compare(column: impl Into<ColumnRef>, op: Comparison, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// `column = value`
    pub fn eq(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Eq, value)
    }

    /// `column <> value`
    pub fn ne(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Ne, value)
    }

    /// `column < value`
    pub fn lt(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Lt, value)
    }

    /// `column <= value`
    pub fn le(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Le, value)
    }

    /// `column > value`
    pub fn gt(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Gt, value)
    }

    /// `column >= value`
    pub fn ge(column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        Self::compare(column, Comparison::Ge, value)
    }

    /// `column IS NULL`
    pub fn is_null(column: impl Into<ColumnRef>) -> Self {
        Self::IsNull(column.into())
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(column: impl Into<ColumnRef>) -> Self {
        Self::IsNotNull(column.into())
    }

    /// `column IN (values...)`
    pub fn is_in<V: Into<Value>>(
        column: impl Into<ColumnRef>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The column this predicate tests.
    #[must_use]
    pub fn column(&self) -> &ColumnRef {
        match self {
            Self::Compare { column, .. }
            | Self::IsNull(column)
            | Self::IsNotNull(column)
            | Self::In { column, .. } => column,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// An inner join on column equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Joined table.
    pub table: String,
    /// Alias of the joined table.
    pub alias: Option<String>,
    /// Left side of the `ON` equality.
    pub left: ColumnRef,
    /// Right side of the `ON` equality.
    pub right: ColumnRef,
}

impl Join {
    /// The name the joined table is referenced by.
    #[must_use]
    pub fn effective_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// A read query selecting the rows of one table, optionally filtered through
/// joins.
///
/// Only the columns of the main table are returned; joins exist to filter.
///
/// # Example
///
/// ```rust
/// use recordflow_store::{Predicate, Query};
///
/// let query = Query::table("orders")
///     .alias("o")
///     .inner_join("customers", "c", "o.customer_id", "c.id")
///     .filter(Predicate::eq("c.status", "active"))
///     .limit(10);
/// assert_eq!(query.effective_alias(), "o");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Main table.
    pub table: String,
    /// Alias of the main table.
    pub alias: Option<String>,
    /// Inner joins, in order.
    pub joins: Vec<Join>,
    /// Filter terms, joined with `AND`.
    pub filters: Vec<Predicate>,
    /// Ordering terms.
    pub order_by: Vec<(ColumnRef, Order)>,
    /// Row limit.
    pub limit: Option<u64>,
}

impl Query {
    /// Starts a query over `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            joins: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Builds an equality query from a column/value map.
    ///
    /// Unqualified columns in `condition` are left unqualified, so they
    /// resolve against the main table. A `NULL` value becomes `IS NULL`.
    #[must_use]
    pub fn from_condition(table: impl Into<String>, condition: &Row) -> Self {
        condition
            .iter()
            .fold(Self::table(table), |query, (column, value)| {
                if value.is_null() {
                    query.filter(Predicate::is_null(column.as_str()))
                } else {
                    query.where_eq(column.as_str(), value.clone())
                }
            })
    }

    /// Sets the alias of the main table.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds an inner join.
    #[must_use]
    pub fn inner_join(
        mut self,
        table: impl Into<String>,
        alias: impl Into<String>,
        left: impl Into<ColumnRef>,
        right: impl Into<ColumnRef>,
    ) -> Self {
        self.joins.push(Join {
            table: table.into(),
            alias: Some(alias.into()),
            left: left.into(),
            right: right.into(),
        });
        self
    }

    /// Adds a filter term.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Adds a `column = value` filter term.
    #[must_use]
    pub fn where_eq(self, column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::eq(column, value))
    }

    /// Adds an ordering term.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<ColumnRef>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    /// Limits the number of returned rows.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The name the main table is referenced by.
    #[must_use]
    pub fn effective_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}
