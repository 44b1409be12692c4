//! SQL statement builders.
//!
//! Every function here is pure: it validates the identifiers it is handed,
//! writes them into statement text, and collects the caller's values into a
//! positional parameter list in the same order as the `?` placeholders.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ident::{parse_reference, validate_all, validate_column_type, validate_identifier};
use crate::value::Value;

/// Column name → value, in caller order.
pub type Record = IndexMap<String, Value>;

/// Column name → value, read as a conjunction of equality predicates.
pub type Conditions = IndexMap<String, Value>;

/// Positional parameter bindings for SQL statements.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Params {
    pub values: Vec<Value>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the value bound to the next placeholder
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// SQL statement text with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: impl Into<Params>) -> Self {
        self.params = params.into();
        self
    }
}

/// A table to create: column declarations plus foreign keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    /// Column name → declared type (`INTEGER PRIMARY KEY`, `TEXT NOT NULL`, ...).
    pub attributes: IndexMap<String, String>,
    /// Foreign-key column → `table(column)`.
    pub foreign_keys: IndexMap<String, String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, declared: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), declared.into());
        self
    }

    pub fn with_foreign_key(mut self, column: impl Into<String>, reference: impl Into<String>) -> Self {
        self.foreign_keys.insert(column.into(), reference.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Delete,
    Update,
    UpdateOf(Vec<String>),
}

/// Timing plus event, e.g. `AFTER INSERT` or `BEFORE UPDATE OF name, email`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerAction {
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
}

impl FromStr for TriggerAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || {
            Error::invalid_input(format!(
                "trigger action {s:?} must be BEFORE, AFTER or INSTEAD OF followed by INSERT, DELETE or UPDATE [OF columns]"
            ))
        };
        fn is(word: &str, keyword: &str) -> bool {
            word.eq_ignore_ascii_case(keyword)
        }

        let words: Vec<&str> = s.split_whitespace().collect();
        let (timing, rest) = match words.as_slice() {
            [w, rest @ ..] if is(w, "BEFORE") => (TriggerTiming::Before, rest),
            [w, rest @ ..] if is(w, "AFTER") => (TriggerTiming::After, rest),
            [w, of, rest @ ..] if is(w, "INSTEAD") && is(of, "OF") => (TriggerTiming::InsteadOf, rest),
            _ => return Err(malformed()),
        };

        let event = match rest {
            [w] if is(w, "INSERT") => TriggerEvent::Insert,
            [w] if is(w, "DELETE") => TriggerEvent::Delete,
            [w] if is(w, "UPDATE") => TriggerEvent::Update,
            [w, of, columns @ ..] if is(w, "UPDATE") && is(of, "OF") && !columns.is_empty() => {
                let joined = columns.join(" ");
                let columns = validate_all(joined.split(',').map(str::trim))?;
                TriggerEvent::UpdateOf(columns.into_iter().map(String::from).collect())
            }
            _ => return Err(malformed()),
        };

        Ok(Self { timing, event })
    }
}

impl fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timing = match self.timing {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
            TriggerTiming::InsteadOf => "INSTEAD OF",
        };
        match &self.event {
            TriggerEvent::Insert => write!(f, "{timing} INSERT"),
            TriggerEvent::Delete => write!(f, "{timing} DELETE"),
            TriggerEvent::Update => write!(f, "{timing} UPDATE"),
            TriggerEvent::UpdateOf(columns) => write!(f, "{timing} UPDATE OF {}", columns.join(", ")),
        }
    }
}

/// A row trigger.
///
/// `predicate` and `body` are caller SQL fragments written into the statement
/// unparsed. Whoever may create triggers may run arbitrary SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerDescriptor {
    pub name: String,
    pub action: TriggerAction,
    pub table: String,
    pub predicate: String,
    pub body: String,
}

/// `CREATE TABLE IF NOT EXISTS` with one clause per column and one
/// cascading foreign-key clause per reference.
pub fn create_table(table: &TableDescriptor) -> Result<SqlQuery> {
    let name = validate_identifier(&table.name)?;
    if table.attributes.is_empty() {
        return Err(Error::invalid_input(format!("table {name:?} declares no columns")));
    }

    let mut clauses = Vec::with_capacity(table.attributes.len() + table.foreign_keys.len());
    for (column, declared) in &table.attributes {
        clauses.push(format!(
            "{} {}",
            validate_identifier(column)?,
            validate_column_type(declared)?
        ));
    }
    for (column, reference) in &table.foreign_keys {
        let column = validate_identifier(column)?;
        let (target, target_columns) = parse_reference(reference)?;
        clauses.push(format!(
            "FOREIGN KEY ({column}) REFERENCES {target}({}) ON UPDATE CASCADE ON DELETE CASCADE",
            target_columns.join(", ")
        ));
    }

    Ok(SqlQuery::new(format!(
        "CREATE TABLE IF NOT EXISTS {name} ({})",
        clauses.join(", ")
    )))
}

/// `INSERT INTO` with one placeholder per field. An empty record inserts a
/// row of column defaults.
pub fn insert(relation: &str, record: &Record) -> Result<SqlQuery> {
    let relation = validate_identifier(relation)?;
    if record.is_empty() {
        return Ok(SqlQuery::new(format!("INSERT INTO {relation} DEFAULT VALUES")));
    }

    let mut columns = Vec::with_capacity(record.len());
    let mut params = Params::new();
    for (column, value) in record {
        columns.push(validate_identifier(column)?);
        params.push(value.clone());
    }
    let placeholders = vec!["?"; columns.len()].join(", ");

    Ok(SqlQuery::new(format!(
        "INSERT INTO {relation} ({}) VALUES ({placeholders})",
        columns.join(", ")
    ))
    .with_params(params))
}

/// `DELETE FROM`. With no conditions every row is deleted.
pub fn delete(relation: &str, conditions: &Conditions) -> Result<SqlQuery> {
    let relation = validate_identifier(relation)?;
    let mut statement = format!("DELETE FROM {relation}");
    let mut params = Params::new();
    push_where(&mut statement, &mut params, conditions)?;
    Ok(SqlQuery::new(statement).with_params(params))
}

/// `SELECT` of the projected columns, or `*` when the projection is empty.
pub fn select(relation: &str, conditions: &Conditions, projection: &[String]) -> Result<SqlQuery> {
    let relation = validate_identifier(relation)?;
    let columns = if projection.is_empty() {
        "*".to_string()
    } else {
        validate_all(projection.iter().map(String::as_str))?.join(", ")
    };

    let mut statement = format!("SELECT {columns} FROM {relation}");
    let mut params = Params::new();
    push_where(&mut statement, &mut params, conditions)?;
    Ok(SqlQuery::new(statement).with_params(params))
}

/// `UPDATE ... SET ... WHERE ...`. SET parameters come first, then WHERE
/// parameters. With no conditions every row is updated.
pub fn update(relation: &str, conditions: &Conditions, new_values: &Record) -> Result<SqlQuery> {
    let relation = validate_identifier(relation)?;
    if new_values.is_empty() {
        return Err(Error::invalid_input(format!(
            "update of {relation:?} sets no columns"
        )));
    }

    let mut params = Params::new();
    let mut assignments = Vec::with_capacity(new_values.len());
    for (column, value) in new_values {
        assignments.push(format!("{} = ?", validate_identifier(column)?));
        params.push(value.clone());
    }

    let mut statement = format!("UPDATE {relation} SET {}", assignments.join(", "));
    push_where(&mut statement, &mut params, conditions)?;
    Ok(SqlQuery::new(statement).with_params(params))
}

/// `CREATE TRIGGER IF NOT EXISTS ... FOR EACH ROW`. The WHEN clause is left
/// out when the predicate is blank.
pub fn create_trigger(trigger: &TriggerDescriptor) -> Result<SqlQuery> {
    let name = validate_identifier(&trigger.name)?;
    let table = validate_identifier(&trigger.table)?;
    let body = trigger.body.trim().trim_end_matches(';').trim_end();
    if body.is_empty() {
        return Err(Error::invalid_input(format!("trigger {name:?} has an empty body")));
    }

    let predicate = trigger.predicate.trim();
    let when = if predicate.is_empty() {
        String::new()
    } else {
        format!(" WHEN ({predicate})")
    };

    Ok(SqlQuery::new(format!(
        "CREATE TRIGGER IF NOT EXISTS {name} {} ON {table} FOR EACH ROW{when} BEGIN {body}; END;",
        trigger.action
    )))
}

/// Caller-authored statement text, passed through untouched.
pub fn raw(statement: &str, params: Vec<Value>) -> Result<SqlQuery> {
    if statement.trim().is_empty() {
        return Err(Error::invalid_input("sql_statement must not be empty"));
    }
    Ok(SqlQuery::new(statement).with_params(params))
}

fn push_where(statement: &mut String, params: &mut Params, conditions: &Conditions) -> Result<()> {
    if conditions.is_empty() {
        return Ok(());
    }
    let mut predicates = Vec::with_capacity(conditions.len());
    for (column, value) in conditions {
        predicates.push(format!("{} = ?", validate_identifier(column)?));
        params.push(value.clone());
    }
    statement.push_str(" WHERE ");
    statement.push_str(&predicates.join(" AND "));
    Ok(())
}
