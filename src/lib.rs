//! Schema-agnostic SQLite data access for the Runar ecosystem.
//!
//! # Intention
//!
//! - Turn loosely-typed operation descriptors (create table, insert, delete,
//!   select, update, create trigger, raw SQL) into parameterized statements.
//! - Route each statement to one of several named database handles.
//! - Return query results either as keyed records or as positional rows.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - HTTP routing and request parsing live in the front end that calls
//!   [`DataAccess`].
//! - Identifiers are validated before they are written into SQL text; values
//!   are always bound parameters. The raw statement path and trigger
//!   predicate/body fragments are privileged surfaces that take caller SQL
//!   as-is.

pub mod builder;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ident;
pub mod materialize;
pub mod registry;
pub mod sqlite;
pub mod value;

pub use builder::{Conditions, Params, Record, SqlQuery, TableDescriptor, TriggerAction, TriggerDescriptor};
pub use config::GatewayConfig;
pub use dispatch::{Mode, Outcome, Pragmas};
pub use error::{Error, ErrorCategory, Result};
pub use materialize::{ResultSet, Shape};
pub use registry::{DatabaseHandle, Registry, DEFAULT_DATABASE};
pub use sqlite::{
    CreateTablesRequest, CreateTriggerRequest, DataAccess, DeleteRequest, ExecuteRawRequest,
    InsertRequest, QueryRequest, SqliteService, TableColumns, UpdateRequest,
};
pub use value::Value;
