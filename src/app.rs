use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::db::{
    BatchOutcome, ConnectionInfo, ContextError, DbError, ExecutionError, OracleConnector,
    RequestContext, ResultKind, SchemaDirectory, SchemaError, Workbench,
};
use crate::ui::ResultRenderer;
use crate::utils::{attach_password, delete_password, store_password, AppConfig, ConfigError};

/// Query Wizard command line runner
#[derive(Parser, Debug)]
#[command(name = "query_wizard")]
#[command(about = "Repair and execute SQL batches against a configured database", long_about = None)]
pub struct Args {
    /// Saved connection to use (defaults to the last used one)
    #[arg(short = 'c', long)]
    pub connection: Option<String>,

    /// SQL batch to execute
    #[arg(short = 'e', long, conflicts_with = "file")]
    pub execute: Option<String>,

    /// Read the SQL batch from a file
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Display the first rows of a table
    #[arg(long, conflicts_with_all = ["execute", "file"])]
    pub preview: Option<String>,

    /// Print the cached schema of a table and exit
    #[arg(long)]
    pub describe: Option<String>,

    /// List the tables in the schema cache and exit
    #[arg(long, conflicts_with = "describe")]
    pub tables: bool,

    /// Include nullability, defaults and identity in --describe
    #[arg(long, requires = "describe")]
    pub details: bool,

    /// Reload the schema cache from the database before running
    #[arg(long)]
    pub refresh_schema: bool,

    /// Schema cache file (defaults to the configured or per-user location)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Print tabular results as CSV
    #[arg(long)]
    pub csv: bool,

    /// Save a connection under this name (password goes to the OS keyring)
    #[arg(long, requires_all = ["user", "service"])]
    pub add_connection: Option<String>,

    /// Forget a saved connection and its stored password
    #[arg(long)]
    pub remove_connection: Option<String>,

    /// Database host for --add-connection
    #[arg(short = 'H', long, default_value = "localhost")]
    pub host: String,

    /// Database port for --add-connection
    #[arg(short = 'p', long, default_value_t = 1521)]
    pub port: u16,

    /// Database user for --add-connection
    #[arg(short = 'U', long)]
    pub user: Option<String>,

    /// Service name for --add-connection
    #[arg(short = 's', long)]
    pub service: Option<String>,

    /// Password for --add-connection
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("{0}")]
    Context(#[from] ContextError),
    #[error("{0}")]
    Execution(#[from] ExecutionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Credentials(String),
    #[error("{}", no_connection_message(.0))]
    NoConnection(Option<String>),
    #[error("Table '{0}' is not present in the schema cache")]
    UnknownTable(String),
    #[error("No schema cache location available; pass --schema")]
    NoSchemaPath,
}

fn no_connection_message(name: &Option<String>) -> String {
    match name {
        Some(name) => format!("No saved connection named '{}'", name),
        None => "No saved connection; add one with --add-connection".to_string(),
    }
}

pub struct App {
    config: AppConfig,
    args: Args,
}

impl App {
    pub fn new(args: Args) -> Self {
        let config = AppConfig::load();
        Self { config, args }
    }

    /// Returns whether every executed statement succeeded.
    pub fn run(&mut self) -> Result<bool, AppError> {
        if let Some(name) = self.args.add_connection.clone() {
            self.add_connection(&name)?;
            return Ok(true);
        }
        if let Some(name) = self.args.remove_connection.clone() {
            self.config.remove_connection(&name);
            self.config.save()?;
            delete_password(&name).map_err(AppError::Credentials)?;
            println!("Removed connection '{}'", name);
            return Ok(true);
        }

        let schema_path = self
            .args
            .schema
            .clone()
            .or_else(|| self.config.schema_cache_path())
            .ok_or(AppError::NoSchemaPath)?;
        let mut schema = SchemaDirectory::load(&schema_path)?;

        if self.args.tables {
            for name in schema.table_names() {
                println!("{}", name);
            }
            return Ok(true);
        }
        if let Some(table) = &self.args.describe {
            let table_schema = schema
                .lookup(table)
                .ok_or_else(|| AppError::UnknownTable(table.clone()))?;
            print!("{}", ResultRenderer::render_schema(table_schema, self.args.details));
            return Ok(true);
        }

        let mut info = self
            .config
            .resolve_connection(self.args.connection.as_deref())
            .cloned()
            .ok_or_else(|| AppError::NoConnection(self.args.connection.clone()))?;
        attach_password(&mut info).map_err(AppError::Credentials)?;

        if self.args.refresh_schema {
            let conn = OracleConnector::open(&info).map_err(ExecutionError::Connection)?;
            schema = SchemaDirectory::introspect(&conn)?;
            if let Err(err) = conn.close() {
                log::warn!("Failed to close connection: {}", DbError::from(err));
            }
            schema.save(&schema_path)?;
            log::info!("Schema cache written to {}", schema_path.display());
        }

        let workbench = Workbench::new(OracleConnector, info, Arc::new(schema));
        let mut context = RequestContext::default();

        let outcome = match &self.args.preview {
            Some(table) => {
                workbench.preview_table(&mut context, table, self.config.preview_limit)?
            }
            None => {
                let sql = self.read_batch()?;
                context.set_generated_sql(&sql);
                workbench.run(&sql)?
            }
        };

        self.print(&outcome);
        Ok(outcome
            .report()
            .map_or(true, |report| report.failure().is_none()))
    }

    fn add_connection(&mut self, name: &str) -> Result<(), AppError> {
        let info = ConnectionInfo::new(
            name,
            self.args.user.as_deref().unwrap_or_default(),
            "",
            &self.args.host,
            self.args.port,
            self.args.service.as_deref().unwrap_or_default(),
        );
        if let Some(password) = &self.args.password {
            store_password(name, password).map_err(AppError::Credentials)?;
        }
        println!("Saved connection {}", info.display_string());
        self.config.add_connection(info);
        self.config.save()?;
        Ok(())
    }

    fn read_batch(&self) -> Result<String, AppError> {
        if let Some(sql) = &self.args.execute {
            return Ok(sql.clone());
        }
        if let Some(path) = &self.args.file {
            return Ok(std::fs::read_to_string(path)?);
        }
        let mut sql = String::new();
        std::io::stdin().read_to_string(&mut sql)?;
        Ok(sql)
    }

    fn print(&self, outcome: &BatchOutcome) {
        if !self.args.csv {
            print!("{}", ResultRenderer::render_batch(outcome));
            return;
        }
        match outcome.report() {
            Some(report) => {
                for statement in &report.statements {
                    match &statement.outcome {
                        Ok(result) if result.kind == ResultKind::Rows => {
                            print!("{}", ResultRenderer::export_to_csv(result))
                        }
                        _ => eprint!("{}", ResultRenderer::render_statement(statement)),
                    }
                }
            }
            None => eprint!("{}", ResultRenderer::render_batch(outcome)),
        }
    }
}
