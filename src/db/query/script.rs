use once_cell::sync::Lazy;
use regex::Regex;

use super::{ClassifiedStatement, QueryExecutor, StatementKind, TableRef};

// First table-owning keyword wins; one identifier, optionally owner-qualified.
static TABLE_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:FROM|INTO|UPDATE|TABLE|JOIN)\s+(\w+(?:\.\w+)?)").unwrap()
});

const STATEMENT_TERMINATOR: char = ';';

impl QueryExecutor {
    /// Split a batch on `;` and drop blank segments.
    ///
    /// Terminators inside string literals are not recognised, so
    /// `INSERT INTO t VALUES ('a;b')` is cut in two. Callers that need
    /// literal semicolons must run such statements on their own.
    pub fn split_statements(sql: &str) -> Vec<String> {
        sql.split(STATEMENT_TERMINATOR)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn leading_keyword(sql: &str) -> Option<String> {
        sql.split_whitespace()
            .next()
            .map(|token| token.to_uppercase())
    }

    pub fn extract_table_ref(sql: &str) -> Option<TableRef> {
        if let Some(name) = TABLE_REF_RE
            .captures(sql)
            .and_then(|caps| caps.get(1))
        {
            return Some(TableRef::Named(name.as_str().to_string()));
        }
        if Self::leading_keyword(sql).as_deref() == Some("SELECT") {
            return Some(TableRef::Unknown);
        }
        None
    }

    pub fn statement_kind(sql: &str) -> StatementKind {
        let upper = sql.trim_start().to_uppercase();
        if upper.starts_with("INSERT") {
            StatementKind::Insert
        } else if upper.starts_with("SHOW TABLES") {
            StatementKind::ShowTables
        } else if upper.starts_with("SELECT")
            || upper.starts_with("SHOW")
            || upper.starts_with("DESCRIBE")
        {
            StatementKind::TabularRead
        } else {
            StatementKind::Generic
        }
    }

    pub fn classify(sql: &str) -> ClassifiedStatement {
        ClassifiedStatement {
            sql: sql.to_string(),
            table: Self::extract_table_ref(sql),
            kind: Self::statement_kind(sql),
        }
    }
}
