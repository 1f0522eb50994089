use thiserror::Error;

use crate::db::schema::SchemaDirectory;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Please enter a query first.")]
    EmptyPrompt,
    #[error("Generate a query first.")]
    NoGeneratedQuery,
    #[error("Failed to generate query: {0}")]
    Generation(String),
}

/// Turns a natural-language request into SQL. Implemented outside this crate.
pub trait SqlGenerator {
    fn generate(&self, prompt: &str, schema: &SchemaDirectory) -> Result<String, String>;
}

/// Translates a prompt to English before generation.
pub trait PromptTranslator {
    fn translate(&self, text: &str) -> Result<String, String>;
}

/// Per-request state owned by the caller: what the user typed, the SQL last
/// generated for it, and which table the schema panel shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_input: String,
    pub generated_sql: Option<String>,
    pub selected_table: Option<String>,
    pub show_schema_details: bool,
}

impl RequestContext {
    pub fn new(user_input: &str) -> Self {
        Self {
            user_input: user_input.to_string(),
            ..Self::default()
        }
    }

    pub fn set_generated_sql(&mut self, sql: &str) {
        self.generated_sql = Some(sql.to_string());
    }

    pub fn select_table(&mut self, table: &str) {
        self.selected_table = Some(table.to_string());
    }

    pub fn toggle_schema_details(&mut self) -> bool {
        self.show_schema_details = !self.show_schema_details;
        self.show_schema_details
    }

    pub fn pending_sql(&self) -> Result<&str, ContextError> {
        self.generated_sql
            .as_deref()
            .filter(|sql| !sql.trim().is_empty())
            .ok_or(ContextError::NoGeneratedQuery)
    }

    /// Generate SQL for the current input and cache it.
    ///
    /// A failing translator is not fatal; the untranslated prompt is used.
    pub fn generate(
        &mut self,
        generator: &dyn SqlGenerator,
        translator: Option<&dyn PromptTranslator>,
        schema: &SchemaDirectory,
    ) -> Result<&str, ContextError> {
        let input = self.user_input.trim();
        if input.is_empty() {
            return Err(ContextError::EmptyPrompt);
        }

        let prompt = match translator.map(|t| t.translate(input)) {
            Some(Ok(translated)) => translated,
            Some(Err(err)) => {
                log::warn!("Translation Error: {err}");
                input.to_string()
            }
            None => input.to_string(),
        };

        match generator.generate(&prompt, schema) {
            Ok(sql) if !sql.trim().is_empty() => {
                self.generated_sql = Some(sql);
                self.pending_sql()
            }
            Ok(_) => Err(ContextError::Generation("the generator returned no SQL".to_string())),
            Err(err) => Err(ContextError::Generation(err)),
        }
    }

    pub fn clear(&mut self) {
        *self = Self {
            selected_table: self.selected_table.take(),
            ..Self::default()
        };
    }
}
