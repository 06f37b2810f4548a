//! List command - show cached entries under a prefix

use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::RecallResult;
use crate::inventory::InventoryEntry;
use crate::memo::Memo;
use crate::ui::{self, UiContext};
use console::style;

/// Longest record summary shown in the table before truncating
const SUMMARY_WIDTH: usize = 60;

/// Execute the list command
pub fn execute(args: ListArgs, config: &Config) -> RecallResult<()> {
    let memo = Memo::from_config(config);
    let entries = memo.list_entries(&args.prefix)?;

    if entries.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(
                    &ctx,
                    &format!("No cache entries matching {}*", args.prefix),
                );
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(())
}

fn print_table(entries: &[InventoryEntry]) {
    let name_width = entries
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    println!(
        "{:<name_width$} {:<8} {:<17} {}",
        style("NAME").bold(),
        style("KEY").bold(),
        style("MODIFIED").bold(),
        style("RECORD").bold(),
    );
    println!("{}", "-".repeat(name_width + 28 + SUMMARY_WIDTH));

    for entry in entries {
        let kind = if entry.is_hashed() {
            style("hashed").yellow()
        } else {
            style("literal").green()
        };
        let summary = match (&entry.record, &entry.error) {
            (Some(record), _) => truncate(&record.summary(), SUMMARY_WIDTH),
            (None, error) => style(truncate(
                &format!("unreadable: {}", error.as_deref().unwrap_or("unknown error")),
                SUMMARY_WIDTH,
            ))
            .red()
            .to_string(),
        };
        let modified = entry
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<name_width$} {:<8} {:<17} {}",
            entry.name, kind, modified, summary
        );
    }

    println!();
    println!("{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}

fn print_json(entries: &[InventoryEntry]) -> RecallResult<()> {
    let json = serde_json::to_string_pretty(entries)?;
    println!("{}", json);
    Ok(())
}

fn print_plain(entries: &[InventoryEntry]) {
    for entry in entries {
        println!("{}", entry.name);
    }
}

/// Shorten `s` to at most `width` characters, marking the cut with `...`
pub(crate) fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let kept: String = s.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
