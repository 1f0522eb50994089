use chrono::{DateTime, Local};
use std::time::Duration;

use crate::db::error::ExecutionError;

/// Label used for table-less SELECTs such as `SELECT 1`. Only ever shown to
/// the user; execution never branches on it.
pub const UNKNOWN_TABLE: &str = "Unknown Table";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRef {
    Named(String),
    Unknown,
}

impl TableRef {
    pub fn label(&self) -> &str {
        match self {
            TableRef::Named(name) => name,
            TableRef::Unknown => UNKNOWN_TABLE,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            TableRef::Named(name) => Some(name),
            TableRef::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    ShowTables,
    TabularRead,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedStatement {
    pub sql: String,
    pub table: Option<TableRef>,
    pub kind: StatementKind,
}

impl ClassifiedStatement {
    pub fn table_label(&self) -> Option<&str> {
        self.table.as_ref().map(TableRef::label)
    }
}

/// A literal that can be bound to an insert placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Number(String),
    Text(String),
}

impl SqlValue {
    pub fn to_bind_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Number(value) | SqlValue::Text(value) => Some(value.clone()),
        }
    }
}

/// Schema-reconciled INSERT: one placeholder per schema column and rows of
/// exactly that arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan {
    pub table: String,
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl InsertPlan {
    pub fn placeholder_count(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Rows,
    Empty,
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub sql: String,
    pub kind: ResultKind,
    pub title: Option<String>,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub execution_time: Duration,
    pub message: String,
}

impl QueryResult {
    pub fn new_select(
        sql: &str,
        table: &str,
        columns: Vec<ColumnInfo>,
        rows: Vec<Vec<String>>,
        execution_time: Duration,
    ) -> Self {
        if rows.is_empty() {
            return Self::new_empty(sql, format!("No records found in {}.", table), execution_time);
        }
        let row_count = rows.len();
        Self {
            sql: sql.to_string(),
            kind: ResultKind::Rows,
            title: Some(format!("Table {}", table)),
            columns,
            rows,
            row_count,
            execution_time,
            message: format!("{} rows fetched", row_count),
        }
    }

    pub fn new_table_list(sql: &str, tables: Vec<String>, execution_time: Duration) -> Self {
        if tables.is_empty() {
            return Self::new_empty(sql, "No tables found in the database.".to_string(), execution_time);
        }
        let row_count = tables.len();
        Self {
            sql: sql.to_string(),
            kind: ResultKind::Rows,
            title: Some("Available Tables in Database".to_string()),
            columns: vec![ColumnInfo {
                name: "Tables".to_string(),
                data_type: "VARCHAR2".to_string(),
            }],
            rows: tables.into_iter().map(|name| vec![name]).collect(),
            row_count,
            execution_time,
            message: format!("{} table(s) found", row_count),
        }
    }

    pub fn new_empty(sql: &str, message: String, execution_time: Duration) -> Self {
        Self {
            sql: sql.to_string(),
            kind: ResultKind::Empty,
            title: None,
            columns: vec![],
            rows: vec![],
            row_count: 0,
            execution_time,
            message,
        }
    }

    pub fn new_insert(sql: &str, table: &str, affected_rows: u64, execution_time: Duration) -> Self {
        Self {
            sql: sql.to_string(),
            kind: ResultKind::Acknowledged,
            title: None,
            columns: vec![],
            rows: vec![],
            row_count: affected_rows as usize,
            execution_time,
            message: format!("Insert query executed successfully for {}!", table),
        }
    }

    pub fn new_dml(sql: &str, affected_rows: u64, execution_time: Duration) -> Self {
        Self {
            sql: sql.to_string(),
            kind: ResultKind::Acknowledged,
            title: None,
            columns: vec![],
            rows: vec![],
            row_count: affected_rows as usize,
            execution_time,
            message: "Query executed successfully!".to_string(),
        }
    }

    pub fn is_informational(&self) -> bool {
        self.kind == ResultKind::Empty
    }
}

/// Outcome of one statement, reported in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementReport {
    pub statement: String,
    pub table: Option<TableRef>,
    pub outcome: Result<QueryResult, ExecutionError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub started_at: DateTime<Local>,
    pub statement_count: usize,
    pub statements: Vec<StatementReport>,
}

impl BatchReport {
    pub fn failure(&self) -> Option<&ExecutionError> {
        self.statements
            .iter()
            .find_map(|report| report.outcome.as_ref().err())
    }

    /// Statements that never ran because an earlier one failed.
    pub fn skipped(&self) -> usize {
        self.statement_count.saturating_sub(self.statements.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    NoStatements,
    Executed(BatchReport),
}

impl BatchOutcome {
    pub const NO_STATEMENTS_MESSAGE: &'static str = "No valid SQL query found.";

    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchOutcome::NoStatements => None,
            BatchOutcome::Executed(report) => Some(report),
        }
    }
}
