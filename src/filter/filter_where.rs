use serde_json::Value;

use super::error::FilterError;
use super::filter::is_identifier;
use super::types::{FilterOp, FilterWhereInfo};

/// SQL generation for the `where` part of a filter. Every parameter is bound as JSONB,
/// so comparisons run on `doc->'field'` and keep JSON typing.
pub struct FilterWhere {
    param_values: Vec<Value>,
}

impl FilterWhere {
    pub fn new() -> Self {
        Self { param_values: vec![] }
    }

    pub fn generate(where_data: &Value) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new();
        let clause = filter_where.build(where_data)?;
        Ok((clause, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// Parses a `where` object into flat field conditions plus nested logical groups.
    pub fn parse(where_data: &Value) -> Result<Vec<WhereNode>, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(vec![]),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        let mut nodes = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                nodes.push(Self::parse_logical_operator(key, value)?);
            } else {
                if !is_identifier(key) {
                    return Err(FilterError::InvalidField(key.clone()));
                }
                nodes.extend(Self::parse_field_condition(key, value)?.into_iter().map(WhereNode::Field));
            }
        }
        Ok(nodes)
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<WhereNode, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let groups = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { WhereNode::And(groups) } else { WhereNode::Or(groups) })
            }
            "$not" => Ok(WhereNode::Not(Self::parse(value)?)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        match value {
            Value::Object(obj) if obj.keys().any(|k| k.starts_with('$')) => obj
                .iter()
                .map(|(op_key, op_val)| {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    Ok(FilterWhereInfo { field: field.to_string(), operator, data: op_val.clone() })
                })
                .collect(),
            // Implicit equality: { field: value }
            _ => Ok(vec![FilterWhereInfo { field: field.to_string(), operator: FilterOp::Eq, data: value.clone() }]),
        }
    }

    fn build(&mut self, where_data: &Value) -> Result<String, FilterError> {
        let nodes = Self::parse(where_data)?;
        self.build_nodes(&nodes)
    }

    fn build_nodes(&mut self, nodes: &[WhereNode]) -> Result<String, FilterError> {
        let mut sql_conditions = Vec::with_capacity(nodes.len());
        for node in nodes {
            sql_conditions.push(self.build_node(node)?);
        }
        Ok(if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") })
    }

    fn build_node(&mut self, node: &WhereNode) -> Result<String, FilterError> {
        match node {
            WhereNode::Field(condition) => self.build_sql_condition(condition),
            WhereNode::And(groups) | WhereNode::Or(groups) => {
                if groups.is_empty() {
                    return Ok(if matches!(node, WhereNode::And(_)) { "1=1" } else { "1=0" }.to_string());
                }
                let mut parts = Vec::with_capacity(groups.len());
                for group in groups {
                    parts.push(format!("({})", self.build_nodes(group)?));
                }
                let joiner = if matches!(node, WhereNode::And(_)) { " AND " } else { " OR " };
                Ok(format!("({})", parts.join(joiner)))
            }
            WhereNode::Not(group) => Ok(format!("NOT ({})", self.build_nodes(group)?)),
        }
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let path = format!("doc->'{}'", condition.field);
        let data = &condition.data;
        match condition.operator {
            FilterOp::Eq => {
                if data.is_null() { Ok(format!("COALESCE({}, 'null'::jsonb) = 'null'::jsonb", path)) }
                else { Ok(format!("{} = {}", path, self.param(data.clone()))) }
            }
            FilterOp::Ne => {
                if data.is_null() { Ok(format!("COALESCE({}, 'null'::jsonb) <> 'null'::jsonb", path)) }
                else { Ok(format!("({p} IS NULL OR {p} <> {v})", p = path, v = self.param(data.clone()))) }
            }
            FilterOp::Gt => Ok(format!("{} > {}", path, self.param(data.clone()))),
            FilterOp::Gte => Ok(format!("{} >= {}", path, self.param(data.clone()))),
            FilterOp::Lt => Ok(format!("{} < {}", path, self.param(data.clone()))),
            FilterOp::Lte => Ok(format!("{} <= {}", path, self.param(data.clone()))),
            FilterOp::Like => {
                if !data.is_string() {
                    return Err(FilterError::InvalidOperatorData("$like requires a string pattern".to_string()));
                }
                Ok(format!("doc->>'{}' LIKE ({} #>> '{{}}')", condition.field, self.param(data.clone())))
            }
            FilterOp::In | FilterOp::NIn => {
                let values = data
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$in/$nin require an array".to_string()))?;
                let negate = condition.operator == FilterOp::NIn;
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                if negate {
                    Ok(format!("({p} IS NULL OR {p} NOT IN ({v}))", p = path, v = params.join(", ")))
                } else {
                    Ok(format!("{} IN ({})", path, params.join(", ")))
                }
            }
            FilterOp::Contains => Ok(format!("{} @> jsonb_build_array({})", path, self.param(data.clone()))),
            FilterOp::Exists => {
                let wanted = data
                    .as_bool()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$exists requires a boolean".to_string()))?;
                let op = if wanted { "<>" } else { "=" };
                Ok(format!("COALESCE({}, 'null'::jsonb) {} 'null'::jsonb", path, op))
            }
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }
}

impl Default for FilterWhere {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsed `where` tree shared by the SQL generator and the in-memory matcher.
#[derive(Debug, Clone)]
pub enum WhereNode {
    Field(FilterWhereInfo),
    And(Vec<Vec<WhereNode>>),
    Or(Vec<Vec<WhereNode>>),
    Not(Vec<WhereNode>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_params_across_nested_groups() {
        let (sql, params) = FilterWhere::generate(&json!({
            "client_id": "c1",
            "$or": [
                { "status": "open" },
                { "priority": { "$in": ["high", "urgent"] } }
            ]
        }))
        .unwrap();

        assert_eq!(
            sql,
            "doc->'client_id' = $1 AND ((doc->'status' = $2) OR (doc->'priority' IN ($3, $4)))"
        );
        assert_eq!(params, vec![json!("c1"), json!("open"), json!("high"), json!("urgent")]);
    }

    #[test]
    fn contains_and_exists() {
        let (sql, params) = FilterWhere::generate(&json!({
            "assigned_lawyers": { "$contains": "u1" },
            "invoice_id": { "$exists": false }
        }))
        .unwrap();

        assert_eq!(
            sql,
            "doc->'assigned_lawyers' @> jsonb_build_array($1) AND COALESCE(doc->'invoice_id', 'null'::jsonb) = 'null'::jsonb"
        );
        assert_eq!(params, vec![json!("u1")]);
    }

    #[test]
    fn rejects_unknown_operators_and_fields() {
        assert!(matches!(
            FilterWhere::generate(&json!({ "status": { "$regex": "x" } })),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            FilterWhere::generate(&json!({ "status'; --": "x" })),
            Err(FilterError::InvalidField(_))
        ));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = FilterWhere::generate(&json!({ "id": { "$in": [] } })).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }
}
