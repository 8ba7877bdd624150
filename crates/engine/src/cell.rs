use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell value. Formatting and formulas are not carried.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Text value. Empty strings collapse to `Empty` since neither
    /// container distinguishes a blank cell from an empty string.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    /// Convert a typed JSON scalar. Arrays and objects have no cell form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(CellValue::Empty),
            serde_json::Value::Bool(b) => Some(CellValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number),
            serde_json::Value::String(s) => Some(CellValue::text(s.as_str())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Interpret free-form input text (command line arguments).
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }

        if let Ok(num) = trimmed.parse::<f64>() {
            if num.is_finite() {
                return CellValue::Number(num);
            }
        }

        CellValue::Text(input.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => {
                // Integers without decimals
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_collapses() {
        assert_eq!(CellValue::text(""), CellValue::Empty);
        assert_eq!(CellValue::from(""), CellValue::Empty);
        assert_eq!(CellValue::text("ok"), CellValue::Text("ok".to_string()));
    }

    #[test]
    fn test_from_input() {
        assert_eq!(CellValue::from_input("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::from_input(" 3.5 "), CellValue::Number(3.5));
        assert_eq!(CellValue::from_input("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::from_input("false"), CellValue::Bool(false));
        assert_eq!(CellValue::from_input("   "), CellValue::Empty);
        assert_eq!(CellValue::from_input("ok"), CellValue::Text("ok".to_string()));
        // "inf" parses as f64 but is not a storable number
        assert_eq!(CellValue::from_input("inf"), CellValue::Text("inf".to_string()));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(CellValue::from_json(&serde_json::json!(42)), Some(CellValue::Number(42.0)));
        assert_eq!(CellValue::from_json(&serde_json::json!("ok")), Some(CellValue::Text("ok".into())));
        assert_eq!(CellValue::from_json(&serde_json::json!(true)), Some(CellValue::Bool(true)));
        assert_eq!(CellValue::from_json(&serde_json::json!("")), Some(CellValue::Empty));
        assert_eq!(CellValue::from_json(&serde_json::json!([1, 2])), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellValue::Number(10.0).to_string(), "10");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::text("ok").to_string(), "ok");
    }

    #[test]
    fn test_serde_untagged() {
        let values = vec![
            CellValue::Empty,
            CellValue::Bool(false),
            CellValue::Number(1.5),
            CellValue::text("x"),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,false,1.5,"x"]"#);
        let parsed: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, values);
    }
}
