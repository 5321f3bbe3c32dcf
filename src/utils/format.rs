//! Table formatting and output utilities

use crate::error::Result;
use serde::Serialize;
use tabled::{
    settings::{object::Rows, Alignment, Color, Modify, Padding, Style},
    Table, Tabled,
};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Raw,
}

/// Renders command results either as a table or as pretty JSON
pub struct TableFormatter {
    format: OutputFormat,
    no_color: bool,
}

impl TableFormatter {
    pub fn new(format: OutputFormat, no_color: bool) -> Self {
        Self { format, no_color }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a list of rows
    pub fn format_table<T: Tabled + Serialize>(&self, data: &[T]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
            _ if data.is_empty() => Ok("No data to display".to_string()),
            OutputFormat::Table => Ok(self.format_as_table(data)),
            OutputFormat::Raw => {
                let mut table = Table::new(data);
                table.with(Style::empty());
                Ok(table.to_string())
            }
        }
    }

    /// Format a single serializable value; tables fall back to key/value lines
    pub fn format_value<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = serde_json::to_value(value)?;
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(&json)?);
        }

        match json {
            serde_json::Value::Object(map) => {
                let pairs: Vec<(String, String)> = map
                    .into_iter()
                    .map(|(k, v)| (k, display_json(&v)))
                    .collect();
                Ok(format_key_value_pairs(&pairs))
            }
            other => Ok(display_json(&other)),
        }
    }

    fn format_as_table<T: Tabled>(&self, data: &[T]) -> String {
        let mut table = Table::new(data);
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .with(Padding::new(1, 1, 0, 0));

        if !self.no_color {
            table.with(Modify::new(Rows::first()).with(Color::FG_BLUE));
        }

        table.to_string()
    }
}

fn display_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Align `key: value` lines on the longest key
pub fn format_key_value_pairs(pairs: &[(String, String)]) -> String {
    let width = pairs.iter().map(|(key, _)| key.len()).max().unwrap_or(0);

    pairs
        .iter()
        .map(|(key, value)| format!("{:width$}: {}", key, value, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}
