//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use legisync_entity::checkpoint::Checkpoint;
use legisync_entity::execution::Execution;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One execution as a table row.
#[derive(Debug, Serialize, Tabled)]
pub struct ExecutionRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Started")]
    pub started_at: String,
    #[tabled(rename = "Duration (s)")]
    pub duration: String,
    #[tabled(rename = "Records")]
    pub records: u64,
    #[tabled(rename = "Errors")]
    pub errors: u64,
    #[tabled(rename = "Trigger")]
    pub triggered_by: String,
}

impl From<&Execution> for ExecutionRow {
    fn from(e: &Execution) -> Self {
        Self {
            id: e.execution_id.to_string(),
            kind: e.kind.to_string(),
            status: e.status.to_string(),
            started_at: e.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            duration: e
                .duration_seconds
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            records: e.counters.total_records(),
            errors: e.counters.errors,
            triggered_by: e.triggered_by.clone(),
        }
    }
}

/// One checkpoint as a table row.
#[derive(Debug, Serialize, Tabled)]
pub struct CheckpointRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Processed")]
    pub processed: u64,
    #[tabled(rename = "Total")]
    pub total: String,
    #[tabled(rename = "Failed")]
    pub failed: u64,
    #[tabled(rename = "Updated")]
    pub updated_at: String,
}

impl From<&Checkpoint> for CheckpointRow {
    fn from(cp: &Checkpoint) -> Self {
        Self {
            id: cp.id.to_string(),
            unit: cp.unit_label(),
            status: cp.status.to_string(),
            processed: cp.progress.processed_items,
            total: cp
                .progress
                .total_items
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_string()),
            failed: cp.progress.failed_items,
            updated_at: cp.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => print_json(&items),
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string());
    println!("{}", json);
}

/// Print a summary of one execution
pub fn print_execution(execution: &Execution, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(execution),
        OutputFormat::Table => {
            print_kv("Execution", &execution.execution_id.to_string());
            print_kv("Kind", execution.kind.as_str());
            print_kv("Status", execution.status.as_str());
            print_kv("Started", &execution.started_at.to_rfc3339());
            if let Some(completed) = execution.completed_at {
                print_kv("Completed", &completed.to_rfc3339());
            }
            let c = &execution.counters;
            print_kv("Legislators", &c.legislators.to_string());
            print_kv("Bills", &c.bills.to_string());
            print_kv("Expenses", &c.expenses.to_string());
            print_kv("Votes", &c.votes.to_string());
            print_kv("Errors", &c.errors.to_string());
            if c.fallback_days > 0 {
                print_kv("Fallback days", &c.fallback_days.to_string());
            }
            if let Some(next) = execution.next_execution {
                print_kv("Next execution", &next.to_rfc3339());
            }
            if let Some(err) = &execution.error_message {
                print_kv("Error", err);
            }
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}
