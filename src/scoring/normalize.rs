use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Normalize free-form numeric input into a finite number.
///
/// Everything except ASCII digits, `.` and `-` is stripped, then the longest
/// leading numeric prefix is parsed ("12 marks" -> 12, "1.5.2" -> 1.5).
/// Empty or unparseable input becomes 0.
pub fn normalize_number(input: &str) -> f64 {
    let filtered: String = input
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    parse_numeric_prefix(&filtered).unwrap_or(0.0)
}

fn parse_numeric_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let mut seen_digit = false;
    let mut seen_dot = false;

    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return None;
    }
    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Normalize an untyped record value (as returned by the store) into a number.
pub fn normalize_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()).unwrap_or(0.0),
        Value::String(s) => normalize_number(s),
        _ => 0.0,
    }
}

/// Render an untyped record value as text. Null becomes the empty string.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn value_to_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            !(s.is_empty() || s == "false" || s == "0" || s == "no" || s == "لا")
        }
        Value::Null => false,
        _ => true,
    }
}

// Lenient serde adapters for spreadsheet-backed records, where any cell may
// arrive as a string, a number, or be missing entirely.

pub fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(normalize_value(&Value::deserialize(deserializer)?))
}

pub fn lenient_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(normalize_value(other)),
    })
}

pub fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_flag(&Value::deserialize(deserializer)?))
}

pub fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_text(&Value::deserialize(deserializer)?))
}

pub fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = value_to_text(&Value::deserialize(deserializer)?);
    Ok(if text.is_empty() { None } else { Some(text) })
}
