use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::error::RepairError;
use crate::db::schema::{IdentityGeneration, SchemaColumn, SchemaDirectory, TableSchema};

use super::{InsertPlan, QueryExecutor, SqlValue, TableRef};

static INSERT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*INSERT\s+INTO\s+(\w+(?:\.\w+)?)\s*(?:\(([^)]*)\))?\s*VALUES\s*(.*)$")
        .unwrap()
});

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?$").unwrap()
});

// One quoted string; `''` is the only escape. `'a' || 'b'` does not match.
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^'(?:[^']|'')*'$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
enum Literal {
    Value(SqlValue),
    Default,
}

impl QueryExecutor {
    /// Rewrite an INSERT into a bind template covering every schema column,
    /// in declared order, with each VALUES tuple widened to match.
    ///
    /// Tuples are mapped by the explicit column list when present, by
    /// position otherwise. Unfilled columns and `DEFAULT` take the schema
    /// default, or NULL where the column allows it.
    pub fn repair_insert(
        sql: &str,
        table: Option<&TableRef>,
        schema: &SchemaDirectory,
    ) -> Result<InsertPlan, RepairError> {
        let table_name = table
            .and_then(TableRef::name)
            .ok_or(RepairError::MissingTable)?;
        let table_schema = schema
            .lookup(table_name)
            .ok_or_else(|| RepairError::UnknownTable(table_name.to_string()))?;

        let malformed = |reason: &str| RepairError::Malformed {
            table: table_name.to_string(),
            reason: reason.to_string(),
        };

        let caps = INSERT_RE
            .captures(sql)
            .ok_or_else(|| malformed("expected INSERT INTO <table> [(columns)] VALUES (...)"))?;
        let target = caps.get(1).map_or(table_name, |m| m.as_str());
        let column_list = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .filter(|list| !list.is_empty());
        let values_text = caps.get(3).map_or("", |m| m.as_str());

        let column_indexes = match column_list {
            Some(list) => Some(Self::resolve_columns(table_schema, table_name, list)?),
            None => None,
        };

        let tuples = Self::split_value_tuples(values_text).map_err(|reason| malformed(reason.as_str()))?;

        let mut rows: Vec<Vec<SqlValue>> = Vec::with_capacity(tuples.len());
        for (index, tuple) in tuples.into_iter().enumerate() {
            let row_number = index + 1;
            let mut literals: Vec<Literal> = Vec::with_capacity(tuple.len());
            for token in tuple {
                let literal = Self::parse_literal(&token).ok_or_else(|| {
                    RepairError::UnsupportedValue {
                        table: table_name.to_string(),
                        value: token.clone(),
                    }
                })?;
                literals.push(literal);
            }
            let slots = Self::place_row(
                table_schema,
                table_name,
                column_indexes.as_deref(),
                literals,
                row_number,
            )?;
            rows.push(Self::fill_row(table_schema, table_name, slots, row_number)?);
        }

        let columns: Vec<String> = table_schema
            .columns
            .iter()
            .map(|column| column.name.clone())
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!(":{}", i)).collect();
        let template = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target,
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(InsertPlan {
            table: target.to_string(),
            sql: template,
            columns,
            rows,
        })
    }

    fn resolve_columns(
        table_schema: &TableSchema,
        table_name: &str,
        list: &str,
    ) -> Result<Vec<usize>, RepairError> {
        let mut indexes: Vec<usize> = Vec::new();
        for raw in list.split(',') {
            let name = raw.trim().trim_matches(|c| c == '"' || c == '`');
            if name.is_empty() {
                return Err(RepairError::Malformed {
                    table: table_name.to_string(),
                    reason: "empty column name in column list".to_string(),
                });
            }
            let index = table_schema
                .column_index(name)
                .ok_or_else(|| RepairError::UnknownColumn {
                    table: table_name.to_string(),
                    column: name.to_string(),
                })?;
            if indexes.contains(&index) {
                return Err(RepairError::DuplicateColumn {
                    table: table_name.to_string(),
                    column: name.to_string(),
                });
            }
            indexes.push(index);
        }
        Ok(indexes)
    }

    /// Assign a tuple's values to schema slots. `None` slots are filled later.
    fn place_row(
        table_schema: &TableSchema,
        table_name: &str,
        column_indexes: Option<&[usize]>,
        values: Vec<Literal>,
        row: usize,
    ) -> Result<Vec<Option<Literal>>, RepairError> {
        let width = table_schema.columns.len();
        let found = values.len();
        let mut slots: Vec<Option<Literal>> = vec![None; width];

        let too_many = |expected: usize| RepairError::TooManyValues {
            table: table_name.to_string(),
            row,
            expected,
            found,
        };

        match column_indexes {
            Some(indexes) => {
                if found == width && found != indexes.len() {
                    // A full row next to a stale column list: trust the values.
                    for (slot, value) in slots.iter_mut().zip(values) {
                        *slot = Some(value);
                    }
                } else if found <= indexes.len() {
                    for (&index, value) in indexes.iter().zip(values) {
                        slots[index] = Some(value);
                    }
                } else {
                    return Err(too_many(if found > width { width } else { indexes.len() }));
                }
            }
            None => {
                if found > width {
                    return Err(too_many(width));
                }
                let supplied: Vec<usize> = table_schema
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(_, column)| !column.is_generated())
                    .map(|(index, _)| index)
                    .collect();
                let targets: Vec<usize> = if found < width && supplied.len() == found {
                    supplied
                } else {
                    (0..found).collect()
                };
                for (index, value) in targets.into_iter().zip(values) {
                    slots[index] = Some(value);
                }
            }
        }

        Ok(slots)
    }

    fn fill_row(
        table_schema: &TableSchema,
        table_name: &str,
        slots: Vec<Option<Literal>>,
        row: usize,
    ) -> Result<Vec<SqlValue>, RepairError> {
        table_schema
            .columns
            .iter()
            .zip(slots)
            .map(|(column, slot)| match slot {
                Some(Literal::Value(value)) => Self::check_identity(column, table_name, value, row),
                Some(Literal::Default) | None => Self::fill_value(column, table_name, row),
            })
            .collect()
    }

    /// Every column is bound, so identity rules decide what a slot may hold.
    fn check_identity(
        column: &SchemaColumn,
        table_name: &str,
        value: SqlValue,
        row: usize,
    ) -> Result<SqlValue, RepairError> {
        let Some(generation) = column.identity else {
            return Ok(value);
        };
        let allowed = match value {
            SqlValue::Null => generation.accepts_null(),
            _ => generation.accepts_value(),
        };
        if allowed {
            Ok(value)
        } else {
            Err(Self::identity_error(column, generation, table_name, row))
        }
    }

    fn identity_error(
        column: &SchemaColumn,
        generation: IdentityGeneration,
        table_name: &str,
        row: usize,
    ) -> RepairError {
        RepairError::IdentityColumn {
            table: table_name.to_string(),
            column: column.name.clone(),
            generation,
            row,
        }
    }

    fn fill_value(column: &SchemaColumn, table_name: &str, row: usize) -> Result<SqlValue, RepairError> {
        if column.identity.is_some() {
            return Self::check_identity(column, table_name, SqlValue::Null, row);
        }
        if let Some(default) = column.default.as_deref() {
            if let Some(Literal::Value(value)) = Self::parse_literal(default) {
                return Ok(value);
            }
        }
        if column.nullable || column.auto_increment {
            return Ok(SqlValue::Null);
        }
        match column.default.as_deref() {
            Some(default) => Err(RepairError::UnsupportedValue {
                table: table_name.to_string(),
                value: default.to_string(),
            }),
            None => Err(RepairError::MissingRequiredValue {
                table: table_name.to_string(),
                column: column.name.clone(),
                row,
            }),
        }
    }

    fn parse_literal(token: &str) -> Option<Literal> {
        let token = token.trim();
        let upper = token.to_uppercase();
        if upper == "NULL" {
            return Some(Literal::Value(SqlValue::Null));
        }
        if upper == "DEFAULT" {
            return Some(Literal::Default);
        }
        if QUOTED_RE.is_match(token) {
            let inner = &token[1..token.len() - 1];
            return Some(Literal::Value(SqlValue::Text(inner.replace("''", "'"))));
        }
        if NUMBER_RE.is_match(token) {
            return Some(Literal::Value(SqlValue::Number(token.to_string())));
        }
        None
    }

    /// Split `(a, 'b,c'), (d, e)` into tuples of raw value tokens.
    /// Quotes and nested parentheses are respected.
    fn split_value_tuples(text: &str) -> Result<Vec<Vec<String>>, String> {
        let chars: Vec<char> = text.chars().collect();
        let mut tuples: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut token = String::new();
        let mut depth = 0usize;
        let mut in_quote = false;
        let mut i = 0usize;

        while i < chars.len() {
            let c = chars[i];

            if in_quote {
                token.push(c);
                if c == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        token.push('\'');
                        i += 2;
                        continue;
                    }
                    in_quote = false;
                }
                i += 1;
                continue;
            }

            match c {
                '\'' if depth > 0 => {
                    in_quote = true;
                    token.push(c);
                }
                '(' => {
                    if depth > 0 {
                        token.push(c);
                    }
                    depth += 1;
                }
                ')' => {
                    if depth == 0 {
                        return Err("unbalanced `)` in VALUES".to_string());
                    }
                    depth -= 1;
                    if depth == 0 {
                        let last = token.trim().to_string();
                        if !(last.is_empty() && current.is_empty()) {
                            current.push(last);
                        }
                        token.clear();
                        tuples.push(std::mem::take(&mut current));
                    } else {
                        token.push(c);
                    }
                }
                ',' if depth == 1 => {
                    current.push(token.trim().to_string());
                    token.clear();
                }
                ',' if depth == 0 => {}
                other if depth == 0 => {
                    if !other.is_whitespace() {
                        return Err(format!("unexpected `{}` outside a value list", other));
                    }
                }
                other => token.push(other),
            }
            i += 1;
        }

        if in_quote {
            return Err("unterminated string literal".to_string());
        }
        if depth != 0 {
            return Err("unclosed value list".to_string());
        }
        if tuples.is_empty() {
            return Err("no value list found".to_string());
        }
        Ok(tuples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_value_tuples_respects_quotes_and_parens() {
        let tuples =
            QueryExecutor::split_value_tuples("(1, 'a, (b)', 'it''s'), (2, 'c', NULL)").unwrap();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0], vec!["1", "'a, (b)'", "'it''s'"]);
        assert_eq!(tuples[1], vec!["2", "'c'", "NULL"]);
    }

    #[test]
    fn test_split_value_tuples_rejects_garbage() {
        assert!(QueryExecutor::split_value_tuples("(1, 'a'").is_err());
        assert!(QueryExecutor::split_value_tuples("(1, 'a)").is_err());
        assert!(QueryExecutor::split_value_tuples("").is_err());
        assert!(QueryExecutor::split_value_tuples("(1) junk").is_err());
    }

    #[test]
    fn test_split_value_tuples_empty_tuple() {
        let tuples = QueryExecutor::split_value_tuples("()").unwrap();
        assert_eq!(tuples, vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_parse_literal_kinds() {
        assert_eq!(
            QueryExecutor::parse_literal("null"),
            Some(Literal::Value(SqlValue::Null))
        );
        assert_eq!(QueryExecutor::parse_literal("Default"), Some(Literal::Default));
        assert_eq!(
            QueryExecutor::parse_literal("-12.5e3"),
            Some(Literal::Value(SqlValue::Number("-12.5e3".to_string())))
        );
        assert_eq!(
            QueryExecutor::parse_literal("'O''Brien'"),
            Some(Literal::Value(SqlValue::Text("O'Brien".to_string())))
        );
        assert_eq!(QueryExecutor::parse_literal("SYSDATE"), None);
        assert_eq!(QueryExecutor::parse_literal("'"), None);
        assert_eq!(QueryExecutor::parse_literal("'ab' || 'cd'"), None);
        assert_eq!(QueryExecutor::parse_literal("'a' 'b'"), None);
        assert_eq!(
            QueryExecutor::parse_literal("''"),
            Some(Literal::Value(SqlValue::Text(String::new())))
        );
    }
}
