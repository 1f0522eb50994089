use comfy_table::{presets::UTF8_FULL, Cell, Table};

use crate::db::{
    BatchOutcome, ExecutionError, QueryResult, ResultKind, StatementReport, TableSchema,
};

pub struct ResultRenderer;

impl ResultRenderer {
    /// One block per executed statement, in execution order.
    pub fn render_batch(outcome: &BatchOutcome) -> String {
        let report = match outcome {
            BatchOutcome::NoStatements => {
                return format!("Warning: {}\n", BatchOutcome::NO_STATEMENTS_MESSAGE);
            }
            BatchOutcome::Executed(report) => report,
        };

        let mut out = String::new();
        for (index, statement) in report.statements.iter().enumerate() {
            out.push_str(&format!("-- [{}] {}\n", index + 1, statement.statement));
            out.push_str(&Self::render_statement(statement));
            out.push('\n');
        }
        if report.skipped() > 0 {
            out.push_str(&format!(
                "Skipped {} statement(s) after the error.\n",
                report.skipped()
            ));
        }
        out
    }

    pub fn render_statement(report: &StatementReport) -> String {
        match &report.outcome {
            Ok(result) => Self::render_result(result),
            Err(err) => Self::render_error(err),
        }
    }

    pub fn render_error(err: &ExecutionError) -> String {
        format!("Error: {}\n", err)
    }

    pub fn render_result(result: &QueryResult) -> String {
        match result.kind {
            ResultKind::Rows => {
                let mut out = String::new();
                if let Some(title) = &result.title {
                    out.push_str(title);
                    out.push_str(":\n");
                }
                out.push_str(&Self::render_table(result).to_string());
                out.push('\n');
                out.push_str(&format!(
                    "{} ({} ms)\n",
                    result.message,
                    result.execution_time.as_millis()
                ));
                out
            }
            ResultKind::Empty => format!("Warning: {}\n", result.message),
            ResultKind::Acknowledged => format!("{}\n", result.message),
        }
    }

    fn render_table(result: &QueryResult) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(result.columns.iter().map(|c| Cell::new(&c.name)));
        for row in &result.rows {
            table.add_row(row.iter().map(Cell::new));
        }
        table
    }

    /// Column / Data Type listing for a table's schema preview.
    pub fn render_schema(schema: &TableSchema, detailed: bool) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        if detailed {
            table.set_header(vec!["Column", "Data Type", "Nullable", "Default", "Identity"]);
            for column in &schema.columns {
                table.add_row(vec![
                    column.name.clone(),
                    column.data_type.clone(),
                    if column.nullable { "YES" } else { "NO" }.to_string(),
                    column.default.clone().unwrap_or_default(),
                    match (column.identity, column.auto_increment) {
                        (Some(generation), _) => generation.to_string(),
                        (None, true) => "YES".to_string(),
                        (None, false) => String::new(),
                    },
                ]);
            }
        } else {
            table.set_header(vec!["Column", "Data Type"]);
            for column in &schema.columns {
                table.add_row(vec![column.name.clone(), column.data_type.clone()]);
            }
        }
        format!("Schema Preview: {}\n{}\n", schema.name, table)
    }

    pub fn export_to_csv(result: &QueryResult) -> String {
        let mut csv = String::new();

        let header_line: Vec<String> = result
            .columns
            .iter()
            .map(|c| Self::escape_csv_field(&c.name))
            .collect();
        csv.push_str(&header_line.join(","));
        csv.push('\n');

        for row in &result.rows {
            let row_line: Vec<String> = row.iter().map(|c| Self::escape_csv_field(c)).collect();
            csv.push_str(&row_line.join(","));
            csv.push('\n');
        }

        csv
    }

    /// Escape a CSV field (add quotes if needed)
    fn escape_csv_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}
