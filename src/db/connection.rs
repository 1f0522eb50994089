use oracle::sql_type::ToSql;
use oracle::{Connection, Row, Statement};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::DbError;
use super::query::{ColumnInfo, SqlValue};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub name: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub host: String,
    pub port: u16,
    pub service_name: String,
}

impl ConnectionInfo {
    pub fn new(
        name: &str,
        username: &str,
        password: &str,
        host: &str,
        port: u16,
        service_name: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            port,
            service_name: service_name.to_string(),
        }
    }

    pub fn connection_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service_name)
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} ({}@{}:{}/{})",
            self.name, self.username, self.host, self.port, self.service_name
        )
    }
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            username: String::new(),
            password: String::new(),
            host: "localhost".to_string(),
            port: 1521,
            service_name: "ORCL".to_string(),
        }
    }
}

/// Column metadata plus fetched rows, values already rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<String>>,
}

/// Opens one connection per batch.
pub trait Connector {
    fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn DbConnection>, DbError>;
}

pub trait DbConnection {
    fn cursor(&mut self) -> Result<Box<dyn DbCursor>, DbError>;
    fn commit(&mut self) -> Result<(), DbError>;
    fn close(&mut self) -> Result<(), DbError>;
}

pub trait DbCursor {
    /// Runs a statement that returns no rows; yields the affected row count.
    fn execute(&mut self, sql: &str) -> Result<u64, DbError>;
    /// Runs a parameterized statement once per row.
    fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, DbError>;
    fn query(&mut self, sql: &str) -> Result<RowSet, DbError>;
    /// Advances to the next pending result set. `Ok(false)` means none are left.
    fn next_result_set(&mut self) -> Result<bool, DbError>;
    fn close(&mut self) -> Result<(), DbError>;
}

pub struct OracleConnector;

impl OracleConnector {
    fn apply_default_session_settings(conn: &Connection) {
        let statements = [
            "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
            "ALTER SESSION SET NLS_DATE_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
        ];

        for statement in statements {
            if let Err(err) = conn.execute(statement, &[]) {
                log::warn!("Failed to apply default session setting `{statement}`: {err}");
            }
        }
    }

    /// Opens a plain driver connection, used for out-of-band schema refresh.
    pub fn open(info: &ConnectionInfo) -> Result<Connection, DbError> {
        let conn_str = info.connection_string();
        match Connection::connect(&info.username, &info.password, &conn_str) {
            Ok(connection) => {
                Self::apply_default_session_settings(&connection);
                Ok(connection)
            }
            Err(err) => {
                log::error!("Connection error: {err}");
                Err(DbError::from(err))
            }
        }
    }
}

impl Connector for OracleConnector {
    fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn DbConnection>, DbError> {
        let connection = Self::open(info)?;
        log::debug!("Connected to {}", info.display_string());
        Ok(Box::new(OracleConnection {
            connection: Arc::new(connection),
        }))
    }
}

pub struct OracleConnection {
    connection: Arc<Connection>,
}

impl DbConnection for OracleConnection {
    fn cursor(&mut self) -> Result<Box<dyn DbCursor>, DbError> {
        Ok(Box::new(OracleCursor {
            connection: Arc::clone(&self.connection),
            last: None,
        }))
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.connection.commit().map_err(DbError::from)
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.connection.close().map_err(DbError::from)
    }
}

/// Statement holder standing in for a client-side cursor. The last executed
/// statement is kept so its implicit result sets can be drained.
pub struct OracleCursor {
    connection: Arc<Connection>,
    last: Option<Statement>,
}

impl OracleCursor {
    fn replace_last(&mut self, stmt: Statement) -> Result<(), DbError> {
        if let Some(mut previous) = self.last.replace(stmt) {
            previous.close().map_err(DbError::from)?;
        }
        Ok(())
    }

    /// `SHOW TABLES` and `DESCRIBE t` have no Oracle equivalent; answer them
    /// from the data dictionary instead.
    fn dictionary_query(sql: &str) -> Option<(String, Option<String>)> {
        let upper = sql.trim().to_uppercase();
        if upper.starts_with("SHOW TABLES") {
            return Some((
                "SELECT table_name FROM user_tables ORDER BY table_name".to_string(),
                None,
            ));
        }
        let mut tokens = upper.split_whitespace();
        if tokens.next() == Some("DESCRIBE") {
            let target = tokens.next()?.trim_end_matches(';');
            let table = target
                .rsplit('.')
                .next()
                .unwrap_or(target)
                .trim_matches('"')
                .to_string();
            return Some((
                "SELECT column_name, data_type, nullable, data_default FROM user_tab_columns \
                 WHERE table_name = :1 ORDER BY column_id"
                    .to_string(),
                Some(table),
            ));
        }
        None
    }

    fn fetch(stmt: &mut Statement, bind: Option<&str>) -> Result<RowSet, DbError> {
        let result_set = match bind {
            Some(value) => stmt.query(&[&value.to_string()]),
            None => stmt.query(&[]),
        }
        .map_err(DbError::from)?;

        let columns: Vec<ColumnInfo> = result_set
            .column_info()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                data_type: format!("{:?}", col.oracle_type()),
            })
            .collect();

        let mut rows: Vec<Vec<String>> = Vec::new();
        for row_result in result_set {
            let row: Row = row_result.map_err(DbError::from)?;
            let mut row_data: Vec<String> = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value: Option<String> = row.get(i).unwrap_or(None);
                row_data.push(value.unwrap_or_else(|| "NULL".to_string()));
            }
            rows.push(row_data);
        }

        Ok(RowSet { columns, rows })
    }
}

impl DbCursor for OracleCursor {
    fn execute(&mut self, sql: &str) -> Result<u64, DbError> {
        let stmt = self.connection.execute(sql, &[]).map_err(DbError::from)?;
        let affected_rows = stmt.row_count().map_err(DbError::from)?;
        self.replace_last(stmt)?;
        Ok(affected_rows)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<SqlValue>]) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut batch = self
            .connection
            .batch(sql, rows.len())
            .build()
            .map_err(DbError::from)?;
        for row in rows {
            let values: Vec<Option<String>> = row.iter().map(SqlValue::to_bind_text).collect();
            let params: Vec<&dyn ToSql> = values.iter().map(|value| value as &dyn ToSql).collect();
            batch.append_row(&params).map_err(DbError::from)?;
        }
        batch.execute().map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }

    fn query(&mut self, sql: &str) -> Result<RowSet, DbError> {
        let (effective_sql, bind) = match Self::dictionary_query(sql) {
            Some((dictionary_sql, bind)) => (dictionary_sql, bind),
            None => (sql.to_string(), None),
        };
        let mut stmt = self
            .connection
            .statement(&effective_sql)
            .build()
            .map_err(DbError::from)?;
        let row_set = Self::fetch(&mut stmt, bind.as_deref())?;
        self.replace_last(stmt)?;
        Ok(row_set)
    }

    fn next_result_set(&mut self) -> Result<bool, DbError> {
        let Some(stmt) = self.last.as_mut() else {
            return Ok(false);
        };
        match stmt.implicit_result().map_err(DbError::from)? {
            Some(_cursor) => Ok(true),
            None => Ok(false),
        }
    }

    fn close(&mut self) -> Result<(), DbError> {
        match self.last.take() {
            Some(mut stmt) => stmt.close().map_err(DbError::from),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string() {
        let info = ConnectionInfo::new("dev", "scott", "tiger", "db.local", 1522, "XEPDB1");
        assert_eq!(info.connection_string(), "//db.local:1522/XEPDB1");
        assert_eq!(info.display_string(), "dev (scott@db.local:1522/XEPDB1)");
    }

    #[test]
    fn test_password_is_not_serialized() {
        let info = ConnectionInfo::new("dev", "scott", "tiger", "localhost", 1521, "ORCL");
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("tiger"));
        let back: ConnectionInfo = serde_json::from_str(&json).unwrap();
        assert!(back.password.is_empty());
    }

    #[test]
    fn test_dictionary_query_for_show_tables() {
        let (sql, bind) = OracleCursor::dictionary_query("show tables").unwrap();
        assert!(sql.contains("user_tables"));
        assert!(bind.is_none());
    }

    #[test]
    fn test_dictionary_query_for_describe() {
        let (sql, bind) = OracleCursor::dictionary_query("DESCRIBE employees").unwrap();
        assert!(sql.contains("user_tab_columns"));
        assert_eq!(bind.as_deref(), Some("EMPLOYEES"));
    }

    #[test]
    fn test_dictionary_query_strips_owner() {
        let (_, bind) = OracleCursor::dictionary_query("describe hr.employees").unwrap();
        assert_eq!(bind.as_deref(), Some("EMPLOYEES"));
        let (_, bind) = OracleCursor::dictionary_query("DESCRIBE \"HR\".\"JOBS\"").unwrap();
        assert_eq!(bind.as_deref(), Some("JOBS"));
    }

    #[test]
    fn test_dictionary_query_passes_select_through() {
        assert!(OracleCursor::dictionary_query("SELECT * FROM employees").is_none());
    }
}
