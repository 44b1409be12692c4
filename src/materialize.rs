//! Turn a row cursor into a caller-shaped result set.

use indexmap::IndexMap;
use rusqlite::Rows;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::value::Value;

/// Requested output form of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Shape {
    /// One column-name → value map per row. Duplicate column names
    /// (`SELECT 1 AS a, 2 AS a`) collapse to one key holding the last value.
    Dict,
    /// One positional value list per row.
    #[default]
    List,
}

impl Shape {
    pub fn from_return_as_dict(return_as_dict: bool) -> Self {
        if return_as_dict {
            Shape::Dict
        } else {
            Shape::List
        }
    }
}

/// Materialized rows in either shape. Serializes as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultSet {
    Records(Vec<IndexMap<String, Value>>),
    Rows(Vec<Vec<Value>>),
}

impl ResultSet {
    pub fn len(&self) -> usize {
        match self {
            ResultSet::Records(records) => records.len(),
            ResultSet::Rows(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A forward-only source of rows.
pub trait Cursor {
    fn column_names(&self) -> Vec<String>;

    /// Next row's values in column order, or `None` when exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>>;
}

impl Cursor for Rows<'_> {
    fn column_names(&self) -> Vec<String> {
        self.as_ref()
            .map(|stmt| stmt.column_names().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        let width = self.as_ref().map_or(0, |stmt| stmt.column_count());
        let Some(row) = self.next().map_err(Error::resource)? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(Value::try_from(row.get_ref(idx).map_err(Error::resource)?)?);
        }
        Ok(Some(values))
    }
}

/// Drain `cursor` into `shape`.
///
/// The cursor is taken by value and dropped on every return path, which
/// resets the underlying statement even when a row fails mid-stream.
pub fn materialize<C: Cursor>(mut cursor: C, shape: Shape) -> Result<ResultSet> {
    let columns = cursor.column_names();
    match shape {
        Shape::List => {
            let mut rows = Vec::new();
            while let Some(values) = cursor.next_row()? {
                rows.push(values);
            }
            Ok(ResultSet::Rows(rows))
        }
        Shape::Dict => {
            let mut records: Vec<IndexMap<String, Value>> = Vec::new();
            while let Some(values) = cursor.next_row()? {
                records.push(columns.iter().cloned().zip(values).collect());
            }
            Ok(ResultSet::Records(records))
        }
    }
}
