//! `TableSummary`: the canonical result collator, an ASCII-bordered table
//! of connection results and plugin results.

use nodescraper_api::{PluginResult, PluginResultCollator, TaskResult};
use serde_json::Value;

const HEADERS: [&str; 3] = ["Task", "Status", "Message"];

pub struct TableSummaryCollator;

impl TableSummaryCollator {
    pub fn new() -> Self {
        TableSummaryCollator
    }
}

impl Default for TableSummaryCollator {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginResultCollator for TableSummaryCollator {
    fn collate_results(
        &mut self,
        plugin_results: &[PluginResult],
        connection_results: &[TaskResult],
        _args: Value,
    ) -> anyhow::Result<()> {
        let connection_rows: Vec<[String; 3]> = connection_results
            .iter()
            .map(|r| {
                [
                    r.task.clone().unwrap_or_else(|| "<unknown>".to_string()),
                    format!("{:?}", r.status),
                    r.message.clone().unwrap_or_default(),
                ]
            })
            .collect();

        let plugin_rows: Vec<[String; 3]> = plugin_results
            .iter()
            .map(|r| [r.source.clone(), format!("{:?}", r.status), r.message.clone().unwrap_or_default()])
            .collect();

        let connection_table = gen_str_table(&connection_rows);
        let plugin_table = gen_str_table(&plugin_rows);

        tracing::info!("\nConnection Results\n{connection_table}\nPlugin Results\n{plugin_table}");
        Ok(())
    }
}

/// Builds an ASCII-bordered table: `+---+---+` borders, column widths
/// auto-computed from the widest cell (header included), rows right-padded.
pub fn gen_str_table(rows: &[[String; 3]]) -> String {
    let mut widths = [HEADERS[0].len(), HEADERS[1].len(), HEADERS[2].len()];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let border = format!("+{}+{}+{}+", "-".repeat(widths[0] + 2), "-".repeat(widths[1] + 2), "-".repeat(widths[2] + 2));

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&format_row(&HEADERS.map(str::to_string), &widths));
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row, &widths));
        out.push('\n');
    }
    out.push_str(&border);
    out
}

fn format_row(cells: &[String; 3], widths: &[usize; 3]) -> String {
    format!(
        "| {:<w0$} | {:<w1$} | {:<w2$} |",
        cells[0],
        cells[1],
        cells[2],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodescraper_api::ExecutionStatus;

    #[test]
    fn gen_str_table_auto_sizes_columns() {
        let rows = vec![["KernelPlugin".to_string(), "OK".to_string(), "matched".to_string()]];
        let table = gen_str_table(&rows);
        assert!(table.starts_with('+'));
        assert!(table.contains("KernelPlugin"));
        let lines: Vec<&str> = table.lines().collect();
        let border_len = lines[0].len();
        assert!(lines.iter().all(|line| line.len() == border_len));
    }

    #[test]
    fn collate_results_does_not_error_on_empty_input() {
        let mut collator = TableSummaryCollator::new();
        let result = collator.collate_results(&[], &[], Value::Null);
        assert!(result.is_ok());
    }

    #[test]
    fn plugin_rows_use_source_and_status() {
        let mut plugin_result = PluginResult::not_ran("KernelPlugin", "skipped");
        plugin_result.status = ExecutionStatus::NotRan;
        let rows: Vec<[String; 3]> = [plugin_result]
            .iter()
            .map(|r| [r.source.clone(), format!("{:?}", r.status), r.message.clone().unwrap_or_default()])
            .collect();
        assert_eq!(rows[0][0], "KernelPlugin");
    }
}
