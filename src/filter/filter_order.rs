use serde_json::Value;

use super::error::FilterError;
use super::filter::is_identifier;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // Expect array of strings like ["created_at desc", "title asc"]
                let mut out = Vec::new();
                for v in arr {
                    if let Value::String(s) = v { out.extend(Self::parse_order_string(s)); }
                }
                out
            }
            Value::Object(obj) => {
                // { "created_at": "desc", "title": "asc" }
                obj.iter()
                    .map(|(k, v)| {
                        let sort = match v.as_str().unwrap_or("asc").to_ascii_lowercase().as_str() {
                            "desc" => SortDirection::Desc,
                            _ => SortDirection::Asc,
                        };
                        FilterOrderInfo { field: k.clone(), sort }
                    })
                    .collect()
            }
            _ => vec![],
        };

        if let Some(bad) = infos.iter().find(|i| !is_identifier(&i.field)) {
            return Err(FilterError::InvalidField(bad.field.clone()));
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        // split on commas, then each token into field and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(field) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                out.push(FilterOrderInfo { field: field.to_string(), sort });
            }
        }
        out
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> Result<String, FilterError> {
        if infos.is_empty() { return Ok(String::new()); }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("doc->'{}' {}", i.field, i.sort.to_sql()))
            .collect();
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_array_and_object_forms() {
        let from_str = FilterOrder::validate_and_parse(&json!("created_at desc, title")).unwrap();
        assert_eq!(from_str.len(), 2);
        assert_eq!(from_str[0].sort, SortDirection::Desc);
        assert_eq!(from_str[1].sort, SortDirection::Asc);

        let from_obj = FilterOrder::validate_and_parse(&json!({ "due_date": "DESC" })).unwrap();
        assert_eq!(from_obj[0].field, "due_date");
        assert_eq!(from_obj[0].sort, SortDirection::Desc);

        assert_eq!(
            FilterOrder::generate(&from_str).unwrap(),
            "ORDER BY doc->'created_at' DESC, doc->'title' ASC"
        );
    }

    #[test]
    fn rejects_injection_in_order_field() {
        assert!(FilterOrder::validate_and_parse(&json!("created_at; DROP TABLE cases")).is_err());
    }
}
