//! SQL Server store client built on tiberius.
//!
//! Opens a dedicated connection per statement. Each call dials, runs,
//! drains and drops; nothing is pooled, so a poisoned connection can
//! never leak into a later attempt.

use crate::config::StoreConfig;
use crate::db::{ColumnInfo, QueryResult, Row, StoreClient, Value};
use crate::error::{QuestError, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tiberius::{AuthMethod, Client, ColumnData, Config, FromSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// SQL Server client.
#[derive(Debug, Clone)]
pub struct MssqlClient {
    host: String,
    port: u16,
    database: String,
    user: String,
    password: String,
    connect_timeout: Duration,
    query_timeout: Duration,
    trust_cert: bool,
}

impl MssqlClient {
    /// Creates a client from the store configuration.
    ///
    /// Fails fast when a required connection field is missing rather than
    /// erroring on the first statement.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| QuestError::store("Database host is not configured"))?;
        let database = config
            .database
            .clone()
            .ok_or_else(|| QuestError::store("Database name is not configured"))?;
        let user = config
            .user
            .clone()
            .ok_or_else(|| QuestError::store("Database user is not configured"))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| QuestError::store("Database password is not configured"))?;

        Ok(Self {
            host,
            port: config.port,
            database,
            user,
            password,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            trust_cert: config.trust_cert,
        })
    }

    /// Dials a fresh connection.
    async fn open(&self) -> Result<Client<Compat<TcpStream>>> {
        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        if self.trust_cert {
            config.trust_cert();
        }

        let tcp = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(config.get_addr()),
        )
        .await
        .map_err(|_| {
            QuestError::store(format!(
                "Connection to {}:{} timed out after {}s",
                self.host,
                self.port,
                self.connect_timeout.as_secs()
            ))
        })?
        .map_err(|e| {
            QuestError::store(format!(
                "Could not open a connection to {}:{}: {e}",
                self.host, self.port
            ))
        })?;

        tcp.set_nodelay(true)
            .map_err(|e| QuestError::store(format!("Failed to configure socket: {e}")))?;

        // TDS handshake and login, bounded by the same timeout as the dial
        let client = tokio::time::timeout(
            self.connect_timeout,
            Client::connect(config, tcp.compat_write()),
        )
        .await
        .map_err(|_| QuestError::store("Login timeout expired"))?
        .map_err(|e| QuestError::store(e.to_string()))?;

        Ok(client)
    }
}

#[async_trait]
impl StoreClient for MssqlClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let mut client = self.open().await?;
        debug!(database = %self.database, "Executing statement");

        let start = Instant::now();

        let fetch = async {
            let mut stream = client.simple_query(sql).await?;
            let columns = stream
                .columns()
                .await?
                .map(|cols| {
                    cols.iter()
                        .map(|c| ColumnInfo::new(c.name(), format!("{:?}", c.column_type())))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let rows = stream.into_first_result().await?;
            tiberius::Result::Ok((columns, rows))
        };

        let (columns, raw_rows) = tokio::time::timeout(self.query_timeout, fetch)
            .await
            .map_err(|_| {
                QuestError::store(format!(
                    "Execution Timeout Expired: statement exceeded {}s",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(|e| QuestError::store(e.to_string()))?;

        let execution_time = start.elapsed();
        let rows: Vec<Row> = raw_rows.into_iter().map(convert_row).collect();
        let row_count = rows.len();

        debug!(rows = row_count, elapsed = ?execution_time, "Statement finished");

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut client = self.open().await?;

        let check = async {
            let stream = client.simple_query("SELECT 1").await?;
            stream.into_first_result().await?;
            tiberius::Result::Ok(())
        };

        tokio::time::timeout(self.query_timeout, check)
            .await
            .map_err(|_| QuestError::store("Connectivity check timed out"))?
            .map_err(|e| QuestError::store(e.to_string()))?;

        Ok(())
    }
}

fn convert_row(row: tiberius::Row) -> Row {
    row.into_iter().map(convert_value).collect()
}

/// Maps a wire value into the backend-neutral `Value`.
///
/// Temporal types, GUIDs and XML are rendered as strings so downstream
/// consumers (prompt payloads, audit records) stay JSON-friendly.
fn convert_value(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(|n| Value::Int(i64::from(n))).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(|n| Value::Int(i64::from(n))).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(|n| Value::Int(i64::from(n))).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::Int).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(|n| Value::Float(f64::from(n))).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::Float).unwrap_or(Value::Null),
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .map(|s| Value::String(s.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v.map(|g| Value::String(g.to_string())).unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .map(|b| Value::Bytes(b.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .map(|n| {
                let scale = 10f64.powi(i32::from(n.scale()));
                Value::Float(n.value() as f64 / scale)
            })
            .unwrap_or(Value::Null),
        ColumnData::Xml(v) => v
            .map(|x| Value::String(x.into_owned().into_string()))
            .unwrap_or(Value::Null),
        dt @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => match chrono::NaiveDateTime::from_sql(&dt) {
            Ok(Some(v)) => Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            _ => Value::Null,
        },
        d @ ColumnData::Date(_) => match chrono::NaiveDate::from_sql(&d) {
            Ok(Some(v)) => Value::String(v.format("%Y-%m-%d").to_string()),
            _ => Value::Null,
        },
        t @ ColumnData::Time(_) => match chrono::NaiveTime::from_sql(&t) {
            Ok(Some(v)) => Value::String(v.format("%H:%M:%S%.f").to_string()),
            _ => Value::Null,
        },
        dto @ ColumnData::DateTimeOffset(_) => {
            match chrono::DateTime::<chrono::Utc>::from_sql(&dto) {
                Ok(Some(v)) => Value::String(v.to_rfc3339()),
                _ => Value::Null,
            }
        }
    }
}
