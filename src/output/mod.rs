pub mod formatter;

pub use formatter::{
    format_committees, format_grade_sheet, format_percentage, format_results_table,
    format_results_tsv, format_roster, format_score, should_use_colors,
};
