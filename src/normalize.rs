use crate::config::DATE_COLUMNS;
use crate::record::AttributeValue;
use time::macros::format_description;
use time::OffsetDateTime;

/// Upstream rendering of a missing value that occasionally leaks through as text.
pub const NULL_MARKER: &str = "<nil>";

/// Canonical cell text for `column`. Never fails: absent values and unexpected
/// shapes degrade to an empty or best-effort string.
pub fn normalize_value(column: &str, value: Option<&AttributeValue>) -> String {
    let value = match value {
        None | Some(AttributeValue::Null) => return String::new(),
        Some(v) => v,
    };

    if DATE_COLUMNS.contains(&column) {
        if let AttributeValue::Number(millis) = value {
            if *millis == 0.0 {
                return String::new();
            }
            if let Some(formatted) = format_epoch_millis(*millis) {
                return formatted;
            }
        }
    }

    let s = stringify(value);
    if s == NULL_MARKER {
        return String::new();
    }
    s
}

/// `YYYY/MM/DD HH:MM:SS+00` in UTC, truncated to whole seconds.
fn format_epoch_millis(millis: f64) -> Option<String> {
    if !millis.is_finite() {
        return None;
    }
    let secs = (millis / 1000.0).trunc() as i64;
    let datetime = OffsetDateTime::from_unix_timestamp(secs).ok()?;
    datetime
        .format(format_description!("[year]/[month]/[day] [hour]:[minute]:[second]+00"))
        .ok()
}

fn stringify(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Text(s) => s.clone(),
        AttributeValue::Number(n) => n.to_string(),
        AttributeValue::Bool(b) => b.to_string(),
        AttributeValue::Null => String::new(),
    }
}
