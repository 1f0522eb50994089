use chrono::Local;
use std::sync::Arc;
use std::time::Instant;

use crate::db::connection::{ConnectionInfo, Connector, DbConnection, DbCursor};
use crate::db::error::{DbError, ExecutionError};
use crate::db::schema::SchemaDirectory;
use crate::db::session::RequestContext;

use super::{
    BatchOutcome, BatchReport, ClassifiedStatement, QueryResult, StatementKind, StatementReport,
};

/// Statement splitting, classification and insert repair live on this type
/// as associated functions; see `script.rs` and `repair.rs`.
pub struct QueryExecutor;

pub const DEFAULT_PREVIEW_LIMIT: u32 = 100;

/// Owns the connection and cursor of one batch.
///
/// Release runs exactly once, either explicitly or on drop, so a panic
/// mid-batch still drains pending result sets and closes the cursor before
/// the connection.
struct ConnectionScope {
    connection: Option<Box<dyn DbConnection>>,
    cursor: Option<Box<dyn DbCursor>>,
}

impl ConnectionScope {
    fn open(connector: &dyn Connector, info: &ConnectionInfo) -> Result<Self, DbError> {
        let mut connection = connector.connect(info)?;
        match connection.cursor() {
            Ok(cursor) => Ok(Self {
                connection: Some(connection),
                cursor: Some(cursor),
            }),
            Err(err) => {
                if let Err(close_err) = connection.close() {
                    log::warn!("Failed to close connection after cursor error: {close_err}");
                }
                Err(err)
            }
        }
    }

    fn cursor(&mut self) -> Result<&mut dyn DbCursor, DbError> {
        match self.cursor.as_mut() {
            Some(cursor) => Ok(cursor.as_mut()),
            None => Err(DbError::new("cursor is already closed")),
        }
    }

    fn commit(&mut self) -> Result<(), DbError> {
        match self.connection.as_mut() {
            Some(connection) => connection.commit(),
            None => Err(DbError::new("connection is already closed")),
        }
    }

    fn release(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            loop {
                match cursor.next_result_set() {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(err) => {
                        log::debug!("No further result sets to drain: {err}");
                        break;
                    }
                }
            }
            if let Err(err) = cursor.close() {
                log::warn!("Failed to close cursor: {err}");
            }
        }
        if let Some(mut connection) = self.connection.take() {
            if let Err(err) = connection.close() {
                log::warn!("Failed to close connection: {err}");
            }
        }
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        self.release();
    }
}

/// Runs raw SQL batches against one configured database.
pub struct Workbench<C: Connector> {
    connector: C,
    connection: ConnectionInfo,
    schema: Arc<SchemaDirectory>,
}

impl<C: Connector> Workbench<C> {
    pub fn new(connector: C, connection: ConnectionInfo, schema: Arc<SchemaDirectory>) -> Self {
        Self {
            connector,
            connection,
            schema,
        }
    }

    /// Split, classify and execute every statement of `sql` in order.
    ///
    /// The first failing statement ends the batch; its error is the last
    /// entry of the report. Statements committed before it stay committed.
    /// A batch with nothing to run never opens a connection.
    pub fn run(&self, sql: &str) -> Result<BatchOutcome, ExecutionError> {
        let statements = QueryExecutor::split_statements(sql);
        if statements.is_empty() {
            log::warn!("{}", BatchOutcome::NO_STATEMENTS_MESSAGE);
            return Ok(BatchOutcome::NoStatements);
        }

        let started_at = Local::now();
        let mut scope =
            ConnectionScope::open(&self.connector, &self.connection).map_err(ExecutionError::Connection)?;

        let mut reports: Vec<StatementReport> = Vec::with_capacity(statements.len());
        for statement in &statements {
            let classified = QueryExecutor::classify(statement);
            log::debug!("Dispatching {:?} statement: {}", classified.kind, statement);

            let outcome = self.dispatch(&mut scope, &classified);
            let failed = outcome.is_err();
            reports.push(StatementReport {
                statement: classified.sql,
                table: classified.table,
                outcome,
            });
            if failed {
                break;
            }
        }
        scope.release();

        let report = BatchReport {
            started_at,
            statement_count: statements.len(),
            statements: reports,
        };
        log::info!(
            "Batch started {}: executed {} of {} statement(s){}",
            report.started_at.format("%Y-%m-%d %H:%M:%S"),
            report.statements.len(),
            report.statement_count,
            if report.failure().is_some() { " (stopped on error)" } else { "" }
        );
        Ok(BatchOutcome::Executed(report))
    }

    /// Show the first `limit` rows of `table` and remember the query.
    pub fn preview_table(
        &self,
        context: &mut RequestContext,
        table: &str,
        limit: u32,
    ) -> Result<BatchOutcome, ExecutionError> {
        let sql = format!("SELECT * FROM {} FETCH FIRST {} ROWS ONLY", table, limit);
        context.select_table(table);
        context.set_generated_sql(&sql);
        self.run(&sql)
    }

    fn dispatch(
        &self,
        scope: &mut ConnectionScope,
        statement: &ClassifiedStatement,
    ) -> Result<QueryResult, ExecutionError> {
        let sql = statement.sql.as_str();
        let table = statement.table_label();
        let db_error = |err: DbError| ExecutionError::from_db(err, table, sql);
        let start = Instant::now();

        match statement.kind {
            StatementKind::Insert => {
                let plan = QueryExecutor::repair_insert(sql, statement.table.as_ref(), &self.schema)
                    .map_err(|source| ExecutionError::Repair {
                        statement: sql.to_string(),
                        source,
                    })?;
                let affected = scope
                    .cursor()
                    .and_then(|cursor| cursor.execute_many(&plan.sql, &plan.rows))
                    .map_err(db_error)?;
                scope.commit().map_err(db_error)?;
                Ok(QueryResult::new_insert(sql, &plan.table, affected, start.elapsed()))
            }
            StatementKind::ShowTables => {
                let row_set = scope
                    .cursor()
                    .and_then(|cursor| cursor.query(sql))
                    .map_err(db_error)?;
                let tables: Vec<String> = row_set
                    .rows
                    .into_iter()
                    .filter_map(|row| row.into_iter().next())
                    .collect();
                Ok(QueryResult::new_table_list(sql, tables, start.elapsed()))
            }
            StatementKind::TabularRead => {
                let row_set = scope
                    .cursor()
                    .and_then(|cursor| cursor.query(sql))
                    .map_err(db_error)?;
                Ok(QueryResult::new_select(
                    sql,
                    table.unwrap_or(super::UNKNOWN_TABLE),
                    row_set.columns,
                    row_set.rows,
                    start.elapsed(),
                ))
            }
            StatementKind::Generic => {
                let affected = scope
                    .cursor()
                    .and_then(|cursor| cursor.execute(sql))
                    .map_err(db_error)?;
                scope.commit().map_err(db_error)?;
                Ok(QueryResult::new_dml(sql, affected, start.elapsed()))
            }
        }
    }
}
