use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::info;

use crate::builder::{self, Conditions, Record, SqlQuery, TableDescriptor, TriggerDescriptor};
use crate::config::GatewayConfig;
use crate::dispatch::{self, Mode, Outcome, Pragmas};
use crate::error::{Error, Result};
use crate::materialize::{ResultSet, Shape};
use crate::registry::{database_name, Registry};
use crate::value::Value;

/// Column declarations of one table in a [`CreateTablesRequest`].
///
/// Accepts the pair form `[{"id": "INTEGER"}, {"user_id": "users(id)"}]`
/// (foreign keys optional) or the object form
/// `{"attributes": {...}, "foreign_keys": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "TableColumnsRepr")]
pub struct TableColumns {
    pub attributes: IndexMap<String, String>,
    pub foreign_keys: IndexMap<String, String>,
}

impl TableColumns {
    pub fn describe(&self, name: &str) -> TableDescriptor {
        TableDescriptor {
            name: name.to_string(),
            attributes: self.attributes.clone(),
            foreign_keys: self.foreign_keys.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableColumnsRepr {
    Pair(Vec<IndexMap<String, String>>),
    Named {
        attributes: IndexMap<String, String>,
        #[serde(default)]
        foreign_keys: IndexMap<String, String>,
    },
}

impl TryFrom<TableColumnsRepr> for TableColumns {
    type Error = String;

    fn try_from(repr: TableColumnsRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            TableColumnsRepr::Named {
                attributes,
                foreign_keys,
            } => Ok(Self {
                attributes,
                foreign_keys,
            }),
            TableColumnsRepr::Pair(parts) if (1..=2).contains(&parts.len()) => {
                let mut parts = parts.into_iter();
                Ok(Self {
                    attributes: parts.next().unwrap_or_default(),
                    foreign_keys: parts.next().unwrap_or_default(),
                })
            }
            TableColumnsRepr::Pair(parts) => Err(format!(
                "expected [attributes, foreign_keys], got {} maps",
                parts.len()
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateTablesRequest {
    pub database: Option<String>,
    pub tables: IndexMap<String, TableColumns>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsertRequest {
    pub database: Option<String>,
    pub relation: String,
    #[serde(default)]
    pub records: Record,
}

/// `conditions` is required; pass an empty map to delete every row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeleteRequest {
    pub database: Option<String>,
    pub relation: String,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryRequest {
    pub database: Option<String>,
    pub relation: String,
    #[serde(default)]
    pub conditions: Conditions,
    /// Projection; empty selects `*`.
    #[serde(default)]
    pub to_query: Vec<String>,
    #[serde(default)]
    pub return_as_dict: bool,
}

/// `conditions` is required; pass an empty map to update every row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateRequest {
    pub database: Option<String>,
    pub relation: String,
    pub conditions: Conditions,
    pub new_values: Record,
}

/// `triggering_event` is the WHEN predicate and `sql_operation` the body;
/// both are raw SQL.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateTriggerRequest {
    pub database: Option<String>,
    pub trigger_name: String,
    pub action: String,
    pub table_name: String,
    #[serde(default)]
    pub triggering_event: String,
    pub sql_operation: String,
}

impl CreateTriggerRequest {
    pub fn describe(&self) -> Result<TriggerDescriptor> {
        Ok(TriggerDescriptor {
            name: self.trigger_name.clone(),
            action: self.action.parse()?,
            table: self.table_name.clone(),
            predicate: self.triggering_event.clone(),
            body: self.sql_operation.clone(),
        })
    }
}

/// Caller-authored SQL. The statement text is trusted as-is; only the
/// values are bound.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecuteRawRequest {
    pub database: Option<String>,
    pub sql_statement: String,
    #[serde(default)]
    pub values_tuple: Vec<Value>,
    #[serde(default)]
    pub query_mode: bool,
    #[serde(default)]
    pub fk_mode: bool,
    #[serde(default)]
    pub return_as_dict: bool,
}

/// The operation surface handed to the HTTP front end.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Create every table in request order. Stops at the first failure and
    /// reports that table; tables created before it are kept.
    async fn create_tables(&self, request: CreateTablesRequest) -> Result<()>;

    async fn insert_record(&self, request: InsertRequest) -> Result<Outcome>;

    async fn delete_record(&self, request: DeleteRequest) -> Result<Outcome>;

    async fn query_records(&self, request: QueryRequest) -> Result<ResultSet>;

    async fn update_record(&self, request: UpdateRequest) -> Result<Outcome>;

    async fn create_trigger(&self, request: CreateTriggerRequest) -> Result<()>;

    /// Rows in query mode, affected-row counts in exec mode.
    async fn execute_raw(&self, request: ExecuteRawRequest) -> Result<Outcome>;
}

/// SQLite implementation of [`DataAccess`] over a shared [`Registry`].
#[derive(Debug, Clone)]
pub struct SqliteService {
    registry: Arc<Registry>,
}

impl SqliteService {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Open every configured database; fails if any of them cannot be opened.
    pub fn start(config: &GatewayConfig) -> Result<Self> {
        let registry = Registry::open(config)?;
        info!(databases = ?registry.names(), "starting sqlite service");
        Ok(Self::new(registry))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn run(&self, database: Option<&str>, query: SqlQuery, mode: Mode, pragmas: Pragmas) -> Result<Outcome> {
        let handle = self.registry.resolve(database_name(database))?;
        tokio::task::spawn_blocking(move || dispatch::execute(&handle, &query, mode, pragmas))
            .await
            .map_err(|err| Error::Resource(format!("statement task failed: {err}")))?
    }

    async fn exec(&self, database: Option<&str>, query: SqlQuery) -> Result<Outcome> {
        self.run(database, query, Mode::Exec, Pragmas::none()).await
    }
}

#[async_trait]
impl DataAccess for SqliteService {
    async fn create_tables(&self, request: CreateTablesRequest) -> Result<()> {
        let database = request.database.as_deref();
        self.registry.resolve(database_name(database))?;

        for (table, columns) in &request.tables {
            let created = match builder::create_table(&columns.describe(table)) {
                Ok(query) => self.exec(database, query).await.map(drop),
                Err(err) => Err(err),
            };
            created.map_err(|source| Error::Table {
                table: table.clone(),
                source: Box::new(source),
            })?;
        }
        Ok(())
    }

    async fn insert_record(&self, request: InsertRequest) -> Result<Outcome> {
        let query = builder::insert(&request.relation, &request.records)?;
        self.exec(request.database.as_deref(), query).await
    }

    async fn delete_record(&self, request: DeleteRequest) -> Result<Outcome> {
        let query = builder::delete(&request.relation, &request.conditions)?;
        self.exec(request.database.as_deref(), query).await
    }

    async fn query_records(&self, request: QueryRequest) -> Result<ResultSet> {
        let query = builder::select(&request.relation, &request.conditions, &request.to_query)?;
        let shape = Shape::from_return_as_dict(request.return_as_dict);
        let outcome = self
            .run(request.database.as_deref(), query, Mode::Query(shape), Pragmas::none())
            .await?;
        outcome
            .into_rows()
            .ok_or_else(|| Error::Resource("query returned no result set".to_string()))
    }

    async fn update_record(&self, request: UpdateRequest) -> Result<Outcome> {
        let query = builder::update(&request.relation, &request.conditions, &request.new_values)?;
        self.exec(request.database.as_deref(), query).await
    }

    async fn create_trigger(&self, request: CreateTriggerRequest) -> Result<()> {
        let query = builder::create_trigger(&request.describe()?)?;
        self.exec(request.database.as_deref(), query).await.map(drop)
    }

    async fn execute_raw(&self, request: ExecuteRawRequest) -> Result<Outcome> {
        let mode = if request.query_mode {
            Mode::Query(Shape::from_return_as_dict(request.return_as_dict))
        } else {
            Mode::Exec
        };
        let query = builder::raw(&request.sql_statement, request.values_tuple)?;
        self.run(request.database.as_deref(), query, mode, Pragmas::for_raw(request.fk_mode))
            .await
    }
}
