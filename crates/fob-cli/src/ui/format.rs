//! Formatting utilities for sizes, durations and build summaries.

use console::Term;
use fob_plugin_rust::{BuildReport, BuildStatus, UnitReport};
use owo_colors::Style;
use std::time::Duration;

use super::paint;

/// Format file size in human-readable format.
///
/// ```
/// use fob_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(1_048_576), "1.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format duration in human-readable format (ms, s, m:s).
///
/// ```
/// use std::time::Duration;
/// use fob_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Bytes written for a unit, summed over its emitted files.
pub fn emitted_size(unit: &UnitReport) -> u64 {
    unit.emitted
        .iter()
        .filter_map(|path| std::fs::metadata(path).ok())
        .map(|meta| meta.len())
        .sum()
}

/// One-line outcome of a build, e.g. `2 units built (1 cached), 1 failed`.
pub fn summary_line(report: &BuildReport) -> String {
    let total = report.units.len();
    let failed = report.failures().count();
    let built = total - failed;
    let cached = report.cache_hits();

    let mut line = format!("{} unit{} built", built, if built == 1 { "" } else { "s" });
    if cached > 0 {
        line.push_str(&format!(" ({} cached)", cached));
    }
    if failed > 0 {
        line.push_str(&format!(", {} failed", failed));
    }
    line
}

/// Print a per-unit build summary to stderr.
///
/// Failed units are followed by their diagnostics, in the order the
/// toolchain emitted them.
pub fn print_build_summary(report: &BuildReport) {
    let term = Term::stderr();
    let width = (term.size().1 as usize).min(80);

    eprintln!("\n{}", paint("Build Summary", Style::new().bold().underline()));
    eprintln!("{}", "─".repeat(width));

    for unit in &report.units {
        print_unit(unit);
    }

    eprintln!("{}", "─".repeat(width));

    let total_size: u64 = report.units.iter().map(emitted_size).sum();
    let total_time = Duration::from_millis(report.duration_ms);
    let line = summary_line(report);
    let line = if report.is_success() {
        paint(line, Style::new().green())
    } else {
        paint(line, Style::new().red())
    };
    eprintln!(
        "  {} {}, {} in {}",
        paint("Total:", Style::new().bold()),
        line,
        format_size(total_size),
        format_duration(total_time)
    );
}

fn print_unit(unit: &UnitReport) {
    let dur_str = format_duration(Duration::from_millis(unit.build.duration_ms));

    match unit.failure {
        None => {
            let status = match unit.build.status {
                BuildStatus::CacheHit => paint("cached", Style::new().cyan()),
                _ => paint("built", Style::new().green()),
            };
            eprintln!(
                "  {} {} {} {} {}",
                paint("▸", Style::new().blue()),
                paint(unit.unit_name(), Style::new().bright_white().bold()),
                status,
                paint(format_size(emitted_size(unit)), Style::new().dimmed()),
                paint(format!("({})", dur_str), Style::new().dimmed())
            );
        }
        Some(kind) => {
            eprintln!(
                "  {} {} {} {}",
                paint("✗", Style::new().red()),
                paint(unit.unit_name(), Style::new().bright_white().bold()),
                paint(kind, Style::new().red()),
                paint(format!("({})", dur_str), Style::new().dimmed())
            );
            for line in unit.diagnostics() {
                eprintln!("      {}", line);
            }
        }
    }

    for warning in &unit.warnings {
        eprintln!(
            "      {} {}",
            paint("⚠", Style::new().yellow()),
            paint(&warning.message, Style::new().yellow())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fob_plugin_rust::{BuildResult, FailureKind};

    fn unit(name: &str, status: BuildStatus) -> UnitReport {
        UnitReport {
            build: BuildResult {
                unit_name: name.to_string(),
                status,
                artifact_path: None,
                debug_map_path: None,
                declared_inputs: vec![],
                diagnostics: if status.is_ok() {
                    vec![]
                } else {
                    vec!["error: could not compile".to_string()]
                },
                duration_ms: 120,
            },
            failure: status.failure_kind(),
            emitted: vec![],
            exports: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(10_485_760), "10.00 MB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_summary_line() {
        let report = BuildReport {
            units: vec![
                unit("engine", BuildStatus::Success),
                unit("physics", BuildStatus::CacheHit),
                unit("broken", BuildStatus::ToolchainFailure),
            ],
            duration_ms: 300,
        };
        assert_eq!(summary_line(&report), "2 units built (1 cached), 1 failed");

        let single = BuildReport {
            units: vec![unit("engine", BuildStatus::Success)],
            duration_ms: 10,
        };
        assert_eq!(summary_line(&single), "1 unit built");
    }

    #[test]
    fn test_instantiation_failure_counts_as_failed() {
        let mut bad = unit("engine", BuildStatus::Success);
        bad.failure = Some(FailureKind::Instantiation);
        let report = BuildReport {
            units: vec![bad],
            duration_ms: 10,
        };
        assert_eq!(summary_line(&report), "0 units built, 1 failed");
    }

    #[test]
    fn test_emitted_size_sums_files() {
        let dir = tempfile::tempdir().unwrap();
        let js = dir.path().join("engine.js");
        let wasm = dir.path().join("engine.wasm");
        std::fs::write(&js, "export {};\n").unwrap();
        std::fs::write(&wasm, [0u8; 100]).unwrap();

        let mut report = unit("engine", BuildStatus::Success);
        report.emitted = vec![js, wasm, dir.path().join("missing.map")];
        assert_eq!(emitted_size(&report), 111);
    }

    #[test]
    fn test_print_build_summary() {
        let report = BuildReport {
            units: vec![
                unit("engine", BuildStatus::Success),
                unit("broken", BuildStatus::Timeout),
            ],
            duration_ms: 300,
        };
        print_build_summary(&report);
        print_build_summary(&BuildReport::default());
    }
}
