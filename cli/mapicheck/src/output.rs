//! Output formatting for CLI commands.

use clap::ValueEnum;
use colored::Colorize;
use mapicheck_model::Node;
use mapicheck_verify::{MachineSetStatus, NodeStatus};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// Print rows as a table, or as a JSON array.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", format_json(data, "[]")),
    }
}

/// Print a single item as pretty JSON.
pub fn print_single<T: Serialize>(data: &T) {
    println!("{}", format_json(data, "{}"));
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| fallback.to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Table row for a machine-set.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct MachineSetRow {
    #[tabled(rename = "MachineSet")]
    pub name: String,
    #[tabled(rename = "Desired")]
    pub desired: i32,
    #[tabled(rename = "Ready")]
    pub ready: i32,
    #[tabled(rename = "Available")]
    pub available: i32,
}

impl From<&MachineSetStatus> for MachineSetRow {
    fn from(status: &MachineSetStatus) -> Self {
        Self {
            name: status.name.clone(),
            desired: status.desired,
            ready: status.ready,
            available: status.available,
        }
    }
}

/// Table row for a node.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct NodeRow {
    #[tabled(rename = "Node")]
    pub name: String,
    #[tabled(rename = "Ready")]
    pub ready: &'static str,
    #[tabled(rename = "Schedulable")]
    pub schedulable: &'static str,
    #[tabled(rename = "Conditions")]
    pub conditions: String,
}

impl From<&NodeStatus> for NodeRow {
    fn from(status: &NodeStatus) -> Self {
        Self {
            name: status.name.clone(),
            ready: yes_no(status.ready),
            schedulable: yes_no(!status.unschedulable),
            conditions: "-".to_string(),
        }
    }
}

impl From<&Node> for NodeRow {
    fn from(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            ready: yes_no(node.is_ready()),
            schedulable: yes_no(!node.unschedulable),
            conditions: node.conditions_summary(),
        }
    }
}
