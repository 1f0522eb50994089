use oracle::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::error::DbError;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Schema introspection failed: {0}")]
    Database(#[from] DbError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityGeneration>,
}

fn default_nullable() -> bool {
    true
}

/// How Oracle generates an identity column, from `user_tab_identity_columns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityGeneration {
    /// `GENERATED ALWAYS`: any bound value is rejected (ORA-32795).
    Always,
    /// `GENERATED BY DEFAULT`: a bound NULL is rejected (ORA-01400).
    ByDefault,
    /// `GENERATED BY DEFAULT ON NULL`: a bound NULL takes the next value.
    ByDefaultOnNull,
}

impl IdentityGeneration {
    pub fn from_dictionary(generation_type: Option<&str>, default_on_null: Option<&str>) -> Option<Self> {
        match generation_type?.trim().to_uppercase().as_str() {
            "ALWAYS" => Some(IdentityGeneration::Always),
            "BY DEFAULT" if default_on_null == Some("YES") => Some(IdentityGeneration::ByDefaultOnNull),
            "BY DEFAULT" => Some(IdentityGeneration::ByDefault),
            _ => None,
        }
    }

    pub fn accepts_null(self) -> bool {
        self == IdentityGeneration::ByDefaultOnNull
    }

    pub fn accepts_value(self) -> bool {
        self != IdentityGeneration::Always
    }
}

impl fmt::Display for IdentityGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IdentityGeneration::Always => "ALWAYS",
            IdentityGeneration::ByDefault => "BY DEFAULT",
            IdentityGeneration::ByDefaultOnNull => "BY DEFAULT ON NULL",
        };
        f.write_str(text)
    }
}

impl SchemaColumn {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            default: None,
            auto_increment: false,
            identity: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    /// Server-filled column that takes a bound NULL (MySQL `AUTO_INCREMENT`).
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn identity(mut self, generation: IdentityGeneration) -> Self {
        self.identity = Some(generation);
        self
    }

    /// Whether the database fills this column when no value is supplied.
    pub fn is_generated(&self) -> bool {
        self.auto_increment || self.identity.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<SchemaColumn>,
}

impl TableSchema {
    pub fn new(name: &str, columns: Vec<SchemaColumn>) -> Self {
        Self {
            name: name.to_string(),
            columns,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }
}

/// Read-only table metadata consulted by the insert repairer.
///
/// Keys are stored upper-cased so lookups ignore case, matching how Oracle
/// reports unquoted identifiers. Column order inside a table is the declared
/// order and is what positional VALUES lists are matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDirectory {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Vec<TableSchema>) -> Self {
        let mut directory = Self::new();
        for table in tables {
            directory.insert(table);
        }
        directory
    }

    pub fn insert(&mut self, table: TableSchema) {
        self.tables.insert(Self::normalize_name(&table.name), table);
    }

    pub fn lookup(&self, table_name: &str) -> Option<&TableSchema> {
        self.tables.get(&Self::normalize_name(table_name))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.values().map(|table| table.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Compact `table(column TYPE, ...)` listing handed to the SQL generator.
    pub fn describe_for_prompt(&self) -> String {
        self.tables
            .values()
            .map(|table| {
                let columns: Vec<String> = table
                    .columns
                    .iter()
                    .map(|column| format!("{} {}", column.name, column.data_type))
                    .collect();
                format!("{}({})", table.name, columns.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn normalize_name(name: &str) -> String {
        let bare = name.rsplit('.').next().unwrap_or(name);
        bare.trim_matches('"').to_uppercase()
    }

    pub fn cache_path() -> Option<PathBuf> {
        dirs::data_dir().map(|mut path| {
            path.push("query_wizard");
            path.push("schema.json");
            path
        })
    }

    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        let tables: Vec<TableSchema> = serde_json::from_str(content)?;
        Ok(Self::from_tables(tables))
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        let tables: Vec<&TableSchema> = self.tables.values().collect();
        Ok(serde_json::to_string_pretty(&tables)?)
    }

    /// Missing cache files yield an empty directory.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        if !path.exists() {
            log::warn!("Schema cache {} not found; starting empty", path.display());
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Rebuild the directory from the connected user's tables.
    pub fn introspect(conn: &Connection) -> Result<Self, SchemaError> {
        let sql = "SELECT c.table_name, c.column_name, c.data_type, c.nullable, c.data_default, \
                   i.generation_type, c.default_on_null \
                   FROM user_tab_columns c \
                   LEFT JOIN user_tab_identity_columns i \
                   ON i.table_name = c.table_name AND i.column_name = c.column_name \
                   ORDER BY c.table_name, c.column_id";
        let rows = conn.query(sql, &[]).map_err(DbError::from)?;

        let mut directory = Self::new();
        let mut current: Option<TableSchema> = None;
        for row_result in rows {
            let row: Row = row_result.map_err(DbError::from)?;
            let table_name: String = row.get(0).map_err(DbError::from)?;
            let column = Self::column_from_row(&row)?;

            match current.as_mut() {
                Some(table) if table.name == table_name => table.columns.push(column),
                _ => {
                    if let Some(done) = current.take() {
                        directory.insert(done);
                    }
                    current = Some(TableSchema::new(&table_name, vec![column]));
                }
            }
        }
        if let Some(done) = current {
            directory.insert(done);
        }

        log::info!("Introspected {} table(s)", directory.len());
        Ok(directory)
    }

    fn column_from_row(row: &Row) -> Result<SchemaColumn, SchemaError> {
        let name: String = row.get(1).map_err(DbError::from)?;
        let data_type: String = row.get(2).map_err(DbError::from)?;
        let nullable: Option<String> = row.get(3).map_err(DbError::from)?;
        let default: Option<String> = row.get(4).map_err(DbError::from)?;
        let generation_type: Option<String> = row.get(5).map_err(DbError::from)?;
        let default_on_null: Option<String> = row.get(6).map_err(DbError::from)?;
        let identity =
            IdentityGeneration::from_dictionary(generation_type.as_deref(), default_on_null.as_deref());

        Ok(SchemaColumn {
            name,
            data_type,
            nullable: nullable.as_deref() != Some("N"),
            // Identity columns report their ISEQ$$ sequence here.
            default: default
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty() && identity.is_none()),
            auto_increment: false,
            identity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SchemaDirectory {
        SchemaDirectory::from_tables(vec![
            TableSchema::new(
                "users",
                vec![
                    SchemaColumn::new("id", "NUMBER").not_null().auto_increment(),
                    SchemaColumn::new("name", "VARCHAR2").not_null(),
                    SchemaColumn::new("email", "VARCHAR2"),
                ],
            ),
            TableSchema::new("orders", vec![SchemaColumn::new("id", "NUMBER")]),
        ])
    }

    #[test]
    fn test_lookup_ignores_case_and_owner() {
        let schema = sample();
        assert!(schema.lookup("USERS").is_some());
        assert!(schema.lookup("hr.users").is_some());
        assert!(schema.lookup("customers").is_none());
    }

    #[test]
    fn test_column_order_is_preserved() {
        let schema = sample();
        let users = schema.lookup("users").unwrap();
        let names: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email"]);
        assert_eq!(users.column_index("EMAIL"), Some(2));
    }

    #[test]
    fn test_json_cache_round_trip_keeps_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("schema.json");
        let schema = sample();
        schema.save(&path).unwrap();

        let loaded = SchemaDirectory::load(&path).unwrap();
        assert_eq!(loaded, schema);
    }

    #[test]
    fn test_missing_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = SchemaDirectory::load(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_from_json_defaults_optional_fields() {
        let json = r#"[{"name": "t", "columns": [{"name": "a", "type": "NUMBER"}]}]"#;
        let schema = SchemaDirectory::from_json(json).unwrap();
        let column = &schema.lookup("t").unwrap().columns[0];
        assert!(column.nullable);
        assert!(column.default.is_none());
        assert!(!column.auto_increment);
        assert!(column.identity.is_none());
    }

    #[test]
    fn test_identity_generation_from_dictionary() {
        assert_eq!(
            IdentityGeneration::from_dictionary(Some("ALWAYS"), Some("NO")),
            Some(IdentityGeneration::Always)
        );
        assert_eq!(
            IdentityGeneration::from_dictionary(Some("BY DEFAULT"), Some("NO")),
            Some(IdentityGeneration::ByDefault)
        );
        assert_eq!(
            IdentityGeneration::from_dictionary(Some("BY DEFAULT"), Some("YES")),
            Some(IdentityGeneration::ByDefaultOnNull)
        );
        assert_eq!(IdentityGeneration::from_dictionary(None, Some("YES")), None);
    }

    #[test]
    fn test_identity_survives_json_cache() {
        let schema = SchemaDirectory::from_tables(vec![TableSchema::new(
            "tickets",
            vec![
                SchemaColumn::new("id", "NUMBER")
                    .not_null()
                    .identity(IdentityGeneration::ByDefaultOnNull),
                SchemaColumn::new("title", "VARCHAR2"),
            ],
        )]);
        let json = schema.to_json().unwrap();
        assert!(json.contains("by_default_on_null"));
        let loaded = SchemaDirectory::from_json(&json).unwrap();
        assert_eq!(loaded, schema);
        assert!(loaded.lookup("tickets").unwrap().columns[0].is_generated());
    }

    #[test]
    fn test_describe_for_prompt() {
        let text = sample().describe_for_prompt();
        assert!(text.contains("users(id NUMBER, name VARCHAR2, email VARCHAR2)"));
        assert!(text.contains("orders(id NUMBER)"));
    }
}
