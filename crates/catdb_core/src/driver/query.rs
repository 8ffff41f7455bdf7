//! Typed request descriptors for driver queries.

use super::ident::{quote, validate_identifier};
use super::{DriverError, DriverResult};
use serde_json::Value;

/// Comparison operator of a single criteria condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
        }
    }
}

/// `column op value` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column name, optionally qualified as `relation.column`.
    pub column: String,
    pub op: Op,
    pub value: Value,
}

/// Conjunction of conditions. Empty criteria match every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub conditions: Vec<Condition>,
}

impl Criteria {
    /// Criteria matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds a condition and returns the criteria for chaining.
    pub fn and(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Renders a ` WHERE ...` clause (or an empty string) whose placeholders
    /// start after `offset` already bound parameters.
    pub(crate) fn to_sql(&self, offset: usize) -> DriverResult<(String, Vec<Value>)> {
        if self.conditions.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut values = Vec::with_capacity(self.conditions.len());
        for (index, condition) in self.conditions.iter().enumerate() {
            let column = quote_column_ref(&condition.column)?;
            clauses.push(format!(
                "{column} {} ?{}",
                condition.op.as_sql(),
                offset + index + 1
            ));
            values.push(condition.value.clone());
        }

        Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
    }
}

/// Shaping options of a flat find.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Column projection. Empty with empty `exprs` selects every column.
    pub fields: Vec<String>,
    /// `(alias, expression)` pairs selected as `expression AS alias`.
    ///
    /// Expressions are trusted SQL written by the caller, not user input.
    pub exprs: Vec<(String, String)>,
    /// Column to order by; defaults to the table's `id`.
    pub order_by: Option<String>,
}

impl FindOptions {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn exprs<I, A, E>(exprs: I) -> Self
    where
        I: IntoIterator<Item = (A, E)>,
        A: Into<String>,
        E: Into<String>,
    {
        Self {
            exprs: exprs
                .into_iter()
                .map(|(alias, expr)| (alias.into(), expr.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn select_list(&self) -> DriverResult<String> {
        if self.fields.is_empty() && self.exprs.is_empty() {
            return Ok("*".to_string());
        }

        let mut items = Vec::with_capacity(self.fields.len() + self.exprs.len());
        for field in &self.fields {
            items.push(quote(validate_identifier(field)?));
        }
        for (alias, expr) in &self.exprs {
            let alias = validate_identifier(alias)?;
            let expr = expr.trim();
            if expr.is_empty() || expr.contains(';') {
                return Err(DriverError::InvalidData(format!(
                    "invalid expression for alias `{alias}`"
                )));
            }
            items.push(format!("{expr} AS {}", quote(alias)));
        }
        Ok(items.join(", "))
    }

    pub(crate) fn order_column(&self) -> DriverResult<String> {
        match &self.order_by {
            Some(column) => Ok(quote(validate_identifier(column)?)),
            None => Ok(quote("id")),
        }
    }
}

/// Join type between two relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// One joined relation, possibly with nested joins of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub relation: String,
    pub kind: JoinKind,
    /// `(column of this relation, column of the parent)` equality pairs.
    ///
    /// The parent column may be qualified as `relation.column` to refer to
    /// any relation already in the join; unqualified names resolve against
    /// the direct parent.
    pub on: Vec<(String, String)>,
    pub children: Vec<Join>,
}

impl Join {
    pub fn new(relation: impl Into<String>, kind: JoinKind) -> Self {
        Self {
            relation: relation.into(),
            kind,
            on: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn on(mut self, column: impl Into<String>, parent_column: impl Into<String>) -> Self {
        self.on.push((column.into(), parent_column.into()));
        self
    }

    pub fn with_child(mut self, child: Join) -> Self {
        self.children.push(child);
        self
    }

    /// Appends the `JOIN ... ON ...` clauses for this relation and its
    /// children, collecting joined relation names in visiting order.
    pub(crate) fn render(
        &self,
        parent: &str,
        sql: &mut String,
        relations: &mut Vec<String>,
    ) -> DriverResult<()> {
        let relation = validate_identifier(&self.relation)?;
        if self.on.is_empty() {
            return Err(DriverError::InvalidData(format!(
                "join on `{relation}` has no join condition"
            )));
        }

        let mut predicates = Vec::with_capacity(self.on.len());
        for (column, parent_column) in &self.on {
            let left = format!("{}.{}", quote(relation), quote(validate_identifier(column)?));
            let right = if parent_column.contains('.') {
                quote_column_ref(parent_column)?
            } else {
                format!(
                    "{}.{}",
                    quote(parent),
                    quote(validate_identifier(parent_column)?)
                )
            };
            predicates.push(format!("{left} = {right}"));
        }

        sql.push_str(&format!(
            " {} {} ON {}",
            self.kind.as_sql(),
            quote(relation),
            predicates.join(" AND ")
        ));
        relations.push(relation.to_string());

        for child in &self.children {
            child.render(relation, sql, relations)?;
        }
        Ok(())
    }
}

/// Quotes `column` or `relation.column` after validating each part.
fn quote_column_ref(reference: &str) -> DriverResult<String> {
    match reference.split_once('.') {
        Some((relation, column)) => Ok(format!(
            "{}.{}",
            quote(validate_identifier(relation)?),
            quote(validate_identifier(column)?)
        )),
        None => Ok(quote(validate_identifier(reference)?)),
    }
}
