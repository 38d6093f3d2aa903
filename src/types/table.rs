/// Column type hints attached to table metadata
use serde::{Deserialize, Serialize};
use std::fmt;

/// Advisory column type; never enforced against stored values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
    Mixed,
}

impl ColumnType {
    /// Map a type name from `add column`, falling back to `String`
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" | "text" => ColumnType::String,
            "number" | "int" | "integer" => ColumnType::Number,
            "boolean" | "bool" => ColumnType::Boolean,
            "date" | "datetime" => ColumnType::Date,
            "object" | "json" => ColumnType::Object,
            "array" => ColumnType::Array,
            "mixed" => ColumnType::Mixed,
            _ => ColumnType::String,
        }
    }
}

impl Default for ColumnType {
    fn default() -> Self {
        ColumnType::String
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Object => "object",
            ColumnType::Array => "array",
            ColumnType::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_names() {
        assert_eq!(ColumnType::parse("INTEGER"), ColumnType::Number);
        assert_eq!(ColumnType::parse("json"), ColumnType::Object);
        assert_eq!(ColumnType::parse("datetime"), ColumnType::Date);
        assert_eq!(ColumnType::parse("mixed"), ColumnType::Mixed);
        assert_eq!(ColumnType::parse("whatever"), ColumnType::String);
    }
}
