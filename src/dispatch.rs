//! Run built statements against a database handle.

use rusqlite::{params_from_iter, Batch, Connection};
use serde::Serialize;
use tracing::{debug, warn};

use crate::builder::SqlQuery;
use crate::error::{Error, Result};
use crate::materialize::{materialize, ResultSet, Shape};
use crate::registry::DatabaseHandle;

/// How a statement is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run for its side effects; report affected rows.
    Exec,
    /// Read every row back in the given shape.
    Query(Shape),
}

/// Session pragmas applied to the handle before the statement runs.
///
/// Failures are logged and ignored; the statement still runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pragmas {
    /// `PRAGMA foreign_keys = ON`
    pub foreign_keys: bool,
    /// `PRAGMA journal_mode = WAL`
    pub wal: bool,
}

impl Pragmas {
    pub fn none() -> Self {
        Self::default()
    }

    /// Toggles used ahead of caller-authored SQL: WAL always, foreign keys
    /// on request.
    pub fn for_raw(foreign_keys: bool) -> Self {
        Self {
            foreign_keys,
            wal: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    /// `last_insert_rowid` is `None` unless this call inserted a row.
    Executed {
        changes: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_insert_rowid: Option<i64>,
    },
    Rows(ResultSet),
}

impl Outcome {
    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            Outcome::Rows(rows) => Some(rows),
            Outcome::Executed { .. } => None,
        }
    }

    pub fn changes(&self) -> Option<u64> {
        match self {
            Outcome::Executed { changes, .. } => Some(*changes),
            Outcome::Rows(_) => None,
        }
    }
}

/// Execute `query` on `handle`, holding the handle's connection for the
/// whole statement including result materialization.
///
/// Exec mode runs every `;`-separated statement in the text, in order.
/// Parameters are bound left to right across the statements, and rows a
/// statement returns (`INSERT .. RETURNING`) are stepped through and
/// discarded. Query mode accepts exactly one statement.
pub fn execute(handle: &DatabaseHandle, query: &SqlQuery, mode: Mode, pragmas: Pragmas) -> Result<Outcome> {
    let conn = handle.lock()?;
    apply_pragmas(&conn, handle.name(), pragmas);
    debug!(
        database = handle.name(),
        statement = %query.statement,
        params = query.params.len(),
        ?mode,
        "executing statement"
    );

    match mode {
        Mode::Exec => exec_script(&conn, query),
        Mode::Query(shape) => {
            let mut batch = Batch::new(&conn, &query.statement);
            let Some(mut stmt) = batch.next()? else {
                return Err(Error::invalid_input("query has no statement to run"));
            };
            if !matches!(batch.next(), Ok(None)) {
                return Err(Error::invalid_input(
                    "query mode runs a single statement; use exec mode for scripts",
                ));
            }
            let rows = stmt.query(params_from_iter(query.params.values.iter()))?;
            let result = materialize(rows, shape)?;
            Ok(Outcome::Rows(result))
        }
    }
}

/// Run each statement of `query` to completion.
///
/// `changes` counts only rows written directly by these statements, so DDL
/// reports 0 rather than whatever the connection last touched. A failure
/// after at least one statement completed is wrapped in [`Error::Script`].
fn exec_script(conn: &Connection, query: &SqlQuery) -> Result<Outcome> {
    let rowid_before = conn.last_insert_rowid();
    let mut params = query.params.values.iter();
    let mut changes = 0u64;
    let mut completed = 0usize;

    let mut run = || -> Result<()> {
        let mut batch = Batch::new(conn, &query.statement);
        while let Some(mut stmt) = batch.next()? {
            for idx in 1..=stmt.parameter_count() {
                let value = params.next().ok_or_else(|| {
                    Error::invalid_input(format!(
                        "statement {} needs more values than the {} supplied",
                        completed + 1,
                        query.params.len()
                    ))
                })?;
                stmt.raw_bind_parameter(idx, value)?;
            }

            let total_before = total_changes(conn)?;
            {
                let mut rows = stmt.raw_query();
                while rows.next()?.is_some() {}
            }
            if total_changes(conn)? != total_before {
                changes += conn.changes();
            }
            completed += 1;
        }
        if params.next().is_some() {
            return Err(Error::invalid_input(format!(
                "{} values supplied but the statement text binds fewer",
                query.params.len()
            )));
        }
        Ok(())
    };

    match run() {
        Ok(()) => {
            let rowid = conn.last_insert_rowid();
            Ok(Outcome::Executed {
                changes,
                last_insert_rowid: (rowid != rowid_before).then_some(rowid),
            })
        }
        Err(err) if completed == 0 => Err(err),
        Err(err) => Err(Error::Script {
            completed,
            source: Box::new(err),
        }),
    }
}

fn total_changes(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

fn apply_pragmas(conn: &Connection, database: &str, pragmas: Pragmas) {
    if pragmas.foreign_keys {
        if let Err(err) = conn.pragma_update(None, "foreign_keys", true) {
            warn!(database, error = %err, "failed to enable foreign keys");
        }
    }
    if pragmas.wal {
        match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0)) {
            Ok(mode) if !mode.eq_ignore_ascii_case("wal") => {
                debug!(database, journal_mode = %mode, "journal mode left unchanged");
            }
            Ok(_) => {}
            Err(err) => warn!(database, error = %err, "failed to enable WAL journal mode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::raw;
    use crate::error::Error;
    use crate::value::Value;

    fn handle() -> DatabaseHandle {
        DatabaseHandle::open_in_memory("main").unwrap()
    }

    fn exec(handle: &DatabaseHandle, sql: &str, params: Vec<Value>) -> Result<Outcome> {
        execute(handle, &raw(sql, params)?, Mode::Exec, Pragmas::none())
    }

    #[test]
    fn exec_reports_changes_and_rowid() {
        let handle = handle();
        exec(&handle, "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", vec![]).unwrap();
        let outcome = exec(&handle, "INSERT INTO t (name) VALUES (?)", vec!["a".into()]).unwrap();
        assert_eq!(
            outcome,
            Outcome::Executed {
                changes: 1,
                last_insert_rowid: Some(1)
            }
        );
    }

    #[test]
    fn ddl_does_not_report_earlier_changes() {
        let handle = handle();
        exec(&handle, "CREATE TABLE n (v INTEGER); INSERT INTO n VALUES (1), (2), (3);", vec![]).unwrap();
        let outcome = exec(&handle, "CREATE TABLE m (v INTEGER)", vec![]).unwrap();
        assert_eq!(
            outcome,
            Outcome::Executed {
                changes: 0,
                last_insert_rowid: None
            }
        );
    }

    #[test]
    fn script_changes_add_up_across_statements() {
        let handle = handle();
        let outcome = exec(
            &handle,
            "CREATE TABLE n (v INTEGER); INSERT INTO n VALUES (?), (?); UPDATE n SET v = v * ?;",
            vec![1.into(), 2.into(), 10.into()],
        )
        .unwrap();
        assert_eq!(outcome.changes(), Some(4));
    }

    #[test]
    fn exec_steps_through_returned_rows() {
        let handle = handle();
        exec(&handle, "CREATE TABLE n (v INTEGER)", vec![]).unwrap();
        let outcome = exec(&handle, "INSERT INTO n VALUES (?) RETURNING v", vec![7.into()]).unwrap();
        assert_eq!(outcome.changes(), Some(1));
        let outcome = exec(&handle, "SELECT v FROM n", vec![]).unwrap();
        assert_eq!(outcome.changes(), Some(0));
    }

    #[test]
    fn value_count_mismatch_is_invalid_input() {
        let handle = handle();
        exec(&handle, "CREATE TABLE n (v INTEGER)", vec![]).unwrap();

        let err = exec(&handle, "UPDATE n SET v = ? WHERE v = ?", vec![1.into()]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // The first insert lands before the second runs short of values.
        let err = exec(
            &handle,
            "INSERT INTO n VALUES (?); INSERT INTO n VALUES (?);",
            vec![1.into()],
        )
        .unwrap_err();
        match err {
            Error::Script { completed, source } => {
                assert_eq!(completed, 1);
                assert!(matches!(*source, Error::InvalidInput(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = exec(&handle, "INSERT INTO n VALUES (?)", vec![1.into(), 2.into()]).unwrap_err();
        assert!(matches!(err, Error::Script { completed: 1, .. }));
    }

    #[test]
    fn query_mode_rejects_trailing_statements() {
        let handle = handle();
        exec(&handle, "CREATE TABLE n (v INTEGER)", vec![]).unwrap();
        let query = raw("SELECT v FROM n; DELETE FROM n;", vec![]).unwrap();
        let err = execute(&handle, &query, Mode::Query(Shape::List), Pragmas::none()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let query = raw("SELECT v FROM n;  -- trailing note", vec![]).unwrap();
        assert!(execute(&handle, &query, Mode::Query(Shape::List), Pragmas::none()).is_ok());
    }

    #[test]
    fn parameterless_exec_runs_scripts() {
        let handle = handle();
        exec(
            &handle,
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
            vec![],
        )
        .unwrap();
        let rows = execute(
            &handle,
            &raw("SELECT count(*) FROM t", vec![]).unwrap(),
            Mode::Query(Shape::List),
            Pragmas::none(),
        )
        .unwrap();
        assert_eq!(
            rows.into_rows(),
            Some(ResultSet::Rows(vec![vec![Value::Integer(2)]]))
        );
    }

    #[test]
    fn engine_rejections_keep_the_engine_message() {
        let handle = handle();
        let err = exec(&handle, "INSERT INTO missing VALUES (?)", vec![1.into()]).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert!(err.to_string().contains("no such table"));
    }

    #[test]
    fn foreign_key_pragma_enforces_references() {
        let handle = handle();
        exec(
            &handle,
            "CREATE TABLE parent (id INTEGER PRIMARY KEY); \
             CREATE TABLE child (pid INTEGER, FOREIGN KEY (pid) REFERENCES parent(id));",
            vec![],
        )
        .unwrap();

        // Off by default: the orphan goes in.
        exec(&handle, "INSERT INTO child VALUES (?)", vec![9.into()]).unwrap();

        let orphan = raw("INSERT INTO child VALUES (?)", vec![10.into()]).unwrap();
        let err = execute(&handle, &orphan, Mode::Exec, Pragmas::for_raw(true)).unwrap_err();
        assert!(err.to_string().contains("FOREIGN KEY"));
    }

    #[test]
    fn wal_toggle_on_memory_database_is_ignored() {
        let handle = handle();
        let query = raw("SELECT 1", vec![]).unwrap();
        let outcome = execute(&handle, &query, Mode::Query(Shape::Dict), Pragmas::for_raw(false)).unwrap();
        assert_eq!(outcome.into_rows().map(|rows| rows.len()), Some(1));
    }

    #[test]
    fn wal_toggle_switches_file_databases() {
        let dir = tempfile::tempdir().unwrap();
        let handle = DatabaseHandle::open("main", dir.path().join("wal.db")).unwrap();
        let query = raw("PRAGMA journal_mode", vec![]).unwrap();
        let outcome = execute(&handle, &query, Mode::Query(Shape::List), Pragmas::for_raw(false)).unwrap();
        assert_eq!(
            outcome.into_rows(),
            Some(ResultSet::Rows(vec![vec![Value::from("wal")]]))
        );
    }
}
