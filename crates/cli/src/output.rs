//! Human and JSON output for CLI commands.

use docmorph_core::{BatchResult, DocFormat, FormatMatrix};
use serde::Serialize;

/// Print the conversion matrix, or only the targets of `filter` when non-empty.
pub fn print_formats(matrix: &FormatMatrix, filter: &str) {
    if !filter.is_empty() {
        let targets = matrix.targets_for_extension(filter);
        if targets.is_empty() {
            print_warning(&format!("no conversions from .{}", filter.trim_start_matches('.')));
        } else {
            println!("{}", join(&targets));
        }
        return;
    }

    for from in matrix.sources() {
        println!("{:<6} -> {}", from, join(matrix.targets(from)));
    }
}

fn join(formats: &[DocFormat]) -> String {
    formats
        .iter()
        .map(DocFormat::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print a batch summary with the names of the files that failed.
pub fn print_summary(result: &BatchResult) {
    println!(
        "Converted {}/{} files in {:.2?}",
        result.success_count(),
        result.total(),
        result.total_duration
    );
    if result.total() == 0 {
        print_warning("no matching files found");
    }
    for failed in &result.failed {
        print_failure(&format!("{}: {}", failed.file_name(), failed.error));
    }
}

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize>(item: &T) {
    let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
    println!("{}", json);
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print a failure message
pub fn print_failure(msg: &str) {
    eprintln!("✗ {}", msg);
}
