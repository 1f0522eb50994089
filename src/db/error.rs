use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::schema::IdentityGeneration;

static ORA_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ORA-(\d{5})").unwrap());

/// Oracle ORA-00942: table or view does not exist.
const ORA_TABLE_NOT_FOUND: i32 = 942;
/// MySQL ER_NO_SUCH_TABLE.
const MYSQL_NO_SUCH_TABLE: i32 = 1146;

/// Error reported by a database driver, reduced to what the pipeline needs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DbError {
    pub code: Option<i32>,
    pub sqlstate: Option<String>,
    pub message: String,
}

impl DbError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            sqlstate: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            sqlstate: None,
            message: message.into(),
        }
    }

    pub fn with_sqlstate(sqlstate: &str, message: impl Into<String>) -> Self {
        Self {
            code: None,
            sqlstate: Some(sqlstate.to_string()),
            message: message.into(),
        }
    }

    /// Whether the backend reported a missing table.
    /// Structured codes win; the message text is only consulted when the
    /// driver gave us nothing better.
    pub fn is_table_missing(&self) -> bool {
        if let Some(code) = self.code {
            return code == ORA_TABLE_NOT_FOUND || code == MYSQL_NO_SUCH_TABLE;
        }
        if let Some(state) = self.sqlstate.as_deref() {
            return state == "42P01";
        }
        let lower = self.message.to_lowercase();
        lower.contains("table")
            && (lower.contains("doesn't exist") || lower.contains("does not exist"))
    }
}

impl DbError {
    /// ORA code embedded in driver text, for errors raised outside the server.
    fn code_from_message(message: &str) -> Option<i32> {
        ORA_CODE_RE
            .captures(message)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok())
    }
}

impl From<oracle::Error> for DbError {
    fn from(err: oracle::Error) -> Self {
        let message = err.to_string();
        // DPI-only failures carry code 0.
        let code = match err.db_error().map(|db_error| db_error.code()) {
            Some(code) if code != 0 => Some(code),
            _ => Self::code_from_message(&message),
        };
        Self {
            code,
            sqlstate: None,
            message,
        }
    }
}

/// Why an INSERT could not be reconciled with the schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepairError {
    #[error("Could not determine the target table of the INSERT statement.")]
    MissingTable,
    #[error("Table '{0}' is not present in the schema directory.")]
    UnknownTable(String),
    #[error("Could not parse the INSERT statement for table '{table}': {reason}")]
    Malformed { table: String, reason: String },
    #[error("Column '{column}' does not exist in table '{table}'.")]
    UnknownColumn { table: String, column: String },
    #[error("Column '{column}' is listed more than once for table '{table}'.")]
    DuplicateColumn { table: String, column: String },
    #[error(
        "Too many values for table '{table}': row {row} has {found} value(s), but only {expected} column(s) are available."
    )]
    TooManyValues {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Column '{column}' of table '{table}' requires a value (row {row}).")]
    MissingRequiredValue {
        table: String,
        column: String,
        row: usize,
    },
    #[error("Value `{value}` for table '{table}' is not a literal and cannot be bound.")]
    UnsupportedValue { table: String, value: String },
    #[error(
        "Column '{column}' of table '{table}' is an identity column generated {generation}; the repaired INSERT cannot bind it (row {row})."
    )]
    IdentityColumn {
        table: String,
        column: String,
        generation: IdentityGeneration,
        row: usize,
    },
}

impl RepairError {
    pub fn table(&self) -> Option<&str> {
        match self {
            RepairError::MissingTable => None,
            RepairError::UnknownTable(table) => Some(table),
            RepairError::Malformed { table, .. }
            | RepairError::UnknownColumn { table, .. }
            | RepairError::DuplicateColumn { table, .. }
            | RepairError::TooManyValues { table, .. }
            | RepairError::MissingRequiredValue { table, .. }
            | RepairError::UnsupportedValue { table, .. }
            | RepairError::IdentityColumn { table, .. } => Some(table),
        }
    }
}

fn missing_table_message(table: &Option<String>) -> String {
    match table {
        Some(name) => format!("The table {} does not exist in the database.", name),
        None => "The referenced table does not exist in the database.".to_string(),
    }
}

/// Failure of a single statement, or of the batch before any statement ran.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("{}", missing_table_message(.table))]
    TableNotFound {
        table: Option<String>,
        statement: String,
        source: DbError,
    },
    #[error("SQL Execution Error: {source}")]
    Sql { statement: String, source: DbError },
    #[error("{source}")]
    Repair {
        statement: String,
        source: RepairError,
    },
    #[error("Could not connect to the database: {0}")]
    Connection(DbError),
}

impl ExecutionError {
    /// Classifies a backend failure for `statement`, naming `table` when known.
    pub fn from_db(err: DbError, table: Option<&str>, statement: &str) -> Self {
        if err.is_table_missing() {
            ExecutionError::TableNotFound {
                table: table.map(str::to_string),
                statement: statement.to_string(),
                source: err,
            }
        } else {
            log::error!("SQL Execution Error: {}", err);
            ExecutionError::Sql {
                statement: statement.to_string(),
                source: err,
            }
        }
    }

    pub fn statement(&self) -> Option<&str> {
        match self {
            ExecutionError::TableNotFound { statement, .. }
            | ExecutionError::Sql { statement, .. }
            | ExecutionError::Repair { statement, .. } => Some(statement),
            ExecutionError::Connection(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_missing_by_code() {
        assert!(DbError::with_code(942, "ORA-00942: table or view does not exist").is_table_missing());
        assert!(DbError::with_code(1146, "no such table").is_table_missing());
        assert!(!DbError::with_code(904, "ORA-00904: invalid identifier").is_table_missing());
    }

    #[test]
    fn test_code_wins_over_message() {
        let err = DbError::with_code(1, "table t does not exist in this trigger text");
        assert!(!err.is_table_missing());
    }

    #[test]
    fn test_table_missing_by_sqlstate() {
        assert!(DbError::with_sqlstate("42P01", "relation \"t\" does not exist").is_table_missing());
        assert!(!DbError::with_sqlstate("42703", "column does not exist").is_table_missing());
    }

    #[test]
    fn test_table_missing_by_message() {
        assert!(DbError::new("Table 'shop.t' doesn't exist").is_table_missing());
        assert!(!DbError::new("Unknown column 'x'").is_table_missing());
    }

    #[test]
    fn test_code_from_message() {
        assert_eq!(
            DbError::code_from_message("DPI-1080: connection was closed by ORA-03113"),
            Some(3113)
        );
        assert_eq!(DbError::code_from_message("DPI-1010: not connected"), None);
    }

    #[test]
    fn test_driver_error_without_server_code_falls_back_to_text() {
        let err = oracle::Error::new(
            oracle::ErrorKind::InternalError,
            "ORA-00942: table or view does not exist",
        );
        let db_error = DbError::from(err);
        assert_eq!(db_error.code, Some(942));
        assert!(db_error.is_table_missing());

        let err = oracle::Error::new(oracle::ErrorKind::InternalError, "statement is closed");
        assert_eq!(DbError::from(err).code, None);
    }

    #[test]
    fn test_generic_error_message() {
        let err = ExecutionError::from_db(DbError::new("boom"), Some("t"), "DELETE FROM t");
        assert_eq!(err.to_string(), "SQL Execution Error: boom");
        assert_eq!(err.statement(), Some("DELETE FROM t"));
    }

    #[test]
    fn test_missing_table_without_name() {
        let err = ExecutionError::from_db(
            DbError::with_code(942, "ORA-00942"),
            None,
            "SELECT 1 FROM dual",
        );
        assert_eq!(
            err.to_string(),
            "The referenced table does not exist in the database."
        );
    }
}
