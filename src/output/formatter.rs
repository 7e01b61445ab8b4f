use owo_colors::OwoColorize;
use std::io::IsTerminal;
use terminal_size::{terminal_size, Width};

use crate::contestant::{Committee, Contestant, EvaluationStatus};
use crate::scoring::{GradeEntry, GradeSet, RunningTotal, StageConfig};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Format a mark with at most two decimals and no trailing zeros (21.5, 22, 10.25)
pub fn format_score(score: f64) -> String {
    let rounded = (score * 100.0).round() / 100.0;
    // avoid "-0"
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{}", rounded)
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{}%", format_score(value))
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate a name to fit available width, accounting for Unicode
fn truncate_name(name: &str, max_width: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_width {
        name.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Fit a name column into whatever the terminal leaves after the fixed columns.
fn fit_name(name: &str, fixed_width: usize) -> String {
    match get_terminal_width() {
        Some(width) if width > fixed_width + 10 => truncate_name(name, width - fixed_width),
        Some(_) => truncate_name(name, 20),
        None => name.to_string(),
    }
}

/// Grading committees, one per line. The admin pseudo-committee and
/// passwords never appear.
pub fn format_committees(committees: &[&Committee], use_colors: bool) -> String {
    if committees.is_empty() {
        return "No committees found.".to_string();
    }

    committees
        .iter()
        .map(|c| {
            if use_colors {
                format!("Committee {}", c.id.bold())
            } else {
                format!("Committee {}", c.id)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Contestants waiting for a committee.
/// Columns: Index, Id, Questions, Name. Index is 1-based with a trailing dot.
pub fn format_roster(roster: &[Contestant], use_colors: bool) -> String {
    if roster.is_empty() {
        return "No contestants waiting for this committee.".to_string();
    }

    let id_width = roster.iter().map(|c| c.id.as_str().chars().count()).max().unwrap_or(0);
    let separator = "  ";

    roster
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let index_str = format!("{:>3}.", idx + 1);
            let id_padded = format!("{:<width$}", c.id.as_str(), width = id_width);
            let config = c.stage_config();
            let questions = format!("{:>2}q", config.question_count);
            let tajweed = if config.tajweed_enabled { "T" } else { " " };

            let fixed_width = index_str.len() + 1 + id_width + separator.len() * 3 + 3 + 1;
            let name = fit_name(c.display_name(), fixed_width);

            if use_colors {
                format!(
                    "{} {}{}{}{}{}{}",
                    index_str.dimmed(),
                    id_padded.cyan(),
                    separator,
                    questions.bold(),
                    tajweed.yellow(),
                    separator,
                    name
                )
            } else {
                format!(
                    "{} {}{}{}{}{}{}",
                    index_str, id_padded, separator, questions, tajweed, separator, name
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stages longer than this list only their graded questions.
const MAX_SHEET_ROWS: usize = 200;

/// Per-question marks of one contestant followed by the running total.
/// The tajweed column shows "-" when the stage does not score it.
pub fn format_grade_sheet(
    contestant: &Contestant,
    config: &StageConfig,
    grades: &GradeSet,
    use_colors: bool,
) -> String {
    let mut lines = Vec::new();

    let header = format!(
        "{} ({})  age {}  parts {}",
        contestant.display_name(),
        contestant.id,
        format_score(contestant.age),
        format_score(contestant.parts_count)
    );
    lines.push(if use_colors {
        header.bold().to_string()
    } else {
        header
    });

    lines.push(format!(
        "{:>4}  {:>8}  {:>8}  {:>8}",
        "Q",
        format!("M/{}", format_score(config.max_memorization)),
        format!("P/{}", format_score(config.max_performance)),
        if config.tajweed_enabled {
            format!("T/{}", format_score(config.max_tajweed))
        } else {
            "T".to_string()
        }
    ));

    let format_row = |entry: &GradeEntry| {
        let tajweed = if config.tajweed_enabled {
            format_score(entry.tajweed)
        } else {
            "-".to_string()
        };
        format!(
            "{:>4}  {:>8}  {:>8}  {:>8}",
            entry.question_number,
            format_score(entry.memorization),
            format_score(entry.performance),
            tajweed
        )
    };

    if grades.len() <= MAX_SHEET_ROWS {
        lines.extend(grades.entries().map(|e| format_row(&e)));
    } else {
        let recorded: Vec<String> = grades.recorded().map(format_row).collect();
        let ungraded = grades.len() - recorded.len();
        lines.extend(recorded);
        lines.push(format!("  ... {} more questions not graded yet", ungraded));
    }

    let total = grades.running_total(config);
    lines.push(format_total_line(&total, contestant.status(), use_colors));
    lines.join("\n")
}

fn format_total_line(total: &RunningTotal, status: EvaluationStatus, use_colors: bool) -> String {
    let status = status_label(status);
    let line = format!(
        "Total: {} / {} ({})  {}",
        format_score(total.total),
        format_score(total.max),
        format_percentage(total.percentage()),
        status
    );
    if use_colors {
        line.bold().to_string()
    } else {
        line
    }
}

fn status_label(status: EvaluationStatus) -> &'static str {
    match status {
        EvaluationStatus::InProgress => "pending",
        EvaluationStatus::Finalized => "submitted",
    }
}

/// Result listing for administrators.
/// Columns: Index, Status, Total, Percentage, Committee, Name
pub fn format_results_table(results: &[&Contestant], use_colors: bool) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let separator = "  ";
    let status_width = 9;
    let total_width = 7;
    let percent_width = 8;

    results
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let index_str = format!("{:>3}.", idx + 1);
            let status = format!("{:<width$}", status_label(c.status()), width = status_width);
            let total = c.total_score.map(format_score).unwrap_or_else(|| "-".to_string());
            let total = format!("{:>width$}", total, width = total_width);
            let percent = if c.submitted {
                format_percentage(c.percentage())
            } else {
                "-".to_string()
            };
            let percent = format!("{:>width$}", percent, width = percent_width);
            let committee = format!("[{}]", c.committee_id);

            let fixed_width = index_str.len()
                + 1
                + status_width
                + total_width
                + percent_width
                + committee.chars().count()
                + separator.len() * 4;
            let name = fit_name(c.display_name(), fixed_width);

            if use_colors {
                let status = match c.status() {
                    EvaluationStatus::Finalized => status.green().to_string(),
                    EvaluationStatus::InProgress => status.yellow().to_string(),
                };
                format!(
                    "{} {}{}{}{}{}{}{}{}{}",
                    index_str.dimmed(),
                    status,
                    separator,
                    total.bold(),
                    separator,
                    percent,
                    separator,
                    committee.cyan(),
                    separator,
                    name
                )
            } else {
                format!(
                    "{} {}{}{}{}{}{}{}{}{}",
                    index_str,
                    status,
                    separator,
                    total,
                    separator,
                    percent,
                    separator,
                    committee,
                    separator,
                    name
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tabs and line breaks inside a value would shift columns or split records.
fn tsv_field(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}

/// Format results as tab-separated values for scripting
/// Columns: id, name, committee, status, total, percentage (no headers, no colors)
pub fn format_results_tsv(results: &[&Contestant]) -> String {
    results
        .iter()
        .map(|c| {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                tsv_field(c.id.as_str()),
                tsv_field(&c.name),
                tsv_field(c.committee_id.as_str()),
                status_label(c.status()),
                c.total_score.map(format_score).unwrap_or_default(),
                format_score(c.percentage())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
