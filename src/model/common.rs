use chrono::{DateTime, Utc};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Width of group and subgroup codes once normalized.
pub const CLASSIFICATION_CODE_WIDTH: usize = 2;

/// Normalize a group or subgroup code: 1-2 ASCII digits, left-padded with zeros.
///
/// Returns `None` when the input is empty, too long or not numeric.
pub fn normalize_classification_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.len() > CLASSIFICATION_CODE_WIDTH
        || !trimmed.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some(format!(
        "{:0>width$}",
        trimmed,
        width = CLASSIFICATION_CODE_WIDTH
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_classification_code() {
        assert_eq!(normalize_classification_code("5"), Some("05".to_string()));
        assert_eq!(normalize_classification_code(" 12 "), Some("12".to_string()));
        assert_eq!(normalize_classification_code("00"), Some("00".to_string()));
        assert_eq!(normalize_classification_code(""), None);
        assert_eq!(normalize_classification_code("123"), None);
        assert_eq!(normalize_classification_code("A1"), None);
    }
}
