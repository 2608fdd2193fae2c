use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
    #[serde(rename = "$like")] Like,
    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,
    #[serde(rename = "$contains")] Contains,
    #[serde(rename = "$exists")] Exists,
}

impl FilterOp {
    pub fn parse(op_key: &str) -> Option<Self> {
        Some(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$contains" => FilterOp::Contains,
            "$exists" => FilterOp::Exists,
            _ => return None,
        })
    }
}

/// Query over one document collection: Mongo-style `where`, ordering and paging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
    pub order: Option<Value>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl FilterData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on a single field equality.
    pub fn eq(field: &str, value: impl Serialize) -> Self {
        let mut data = Self::default();
        data.and_where(field, value);
        data
    }

    /// Adds a condition to the top-level `where` object, ANDed with existing ones.
    /// A repeated field is combined through `$and`.
    pub fn and_where(&mut self, field: &str, condition: impl Serialize) -> &mut Self {
        let condition = serde_json::to_value(condition).unwrap_or(Value::Null);
        match self.where_clause.take() {
            Some(Value::Object(mut obj)) if !obj.contains_key(field) => {
                obj.insert(field.to_string(), condition);
                self.where_clause = Some(Value::Object(obj));
            }
            Some(existing) => {
                self.where_clause = Some(json!({ "$and": [existing, { field: condition }] }));
            }
            None => {
                self.where_clause = Some(json!({ field: condition }));
            }
        }
        self
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order = Some(Value::String(order.into()));
        self
    }

    pub fn page(mut self, limit: Option<i32>, offset: Option<i32>) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub field: String,
    pub operator: FilterOp,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterOrderInfo {
    pub field: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_where_merges_fields() {
        let mut data = FilterData::eq("status", "open");
        data.and_where("client_id", "abc");
        assert_eq!(data.where_clause, Some(json!({ "status": "open", "client_id": "abc" })));
    }

    #[test]
    fn and_where_wraps_repeated_field() {
        let mut data = FilterData::eq("status", "open");
        data.and_where("status", json!({ "$ne": "closed" }));
        assert_eq!(
            data.where_clause,
            Some(json!({ "$and": [{ "status": "open" }, { "status": { "$ne": "closed" } }] }))
        );
    }
}
