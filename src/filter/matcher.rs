use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::error::FilterError;
use super::filter::Filter;
use super::filter_where::{FilterWhere, WhereNode};
use super::types::{FilterOp, FilterOrderInfo, FilterWhereInfo, SortDirection};

/// Evaluates a `Filter` against documents held in memory, with the same semantics the
/// SQL generator gives Postgres JSONB.
pub struct FilterMatcher {
    nodes: Vec<WhereNode>,
    order: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
}

impl FilterMatcher {
    pub fn new(filter: &Filter) -> Result<Self, FilterError> {
        let nodes = match filter.where_data() {
            Some(where_data) => FilterWhere::parse(where_data)?,
            None => vec![],
        };
        Ok(Self {
            nodes,
            order: filter.order_info().to_vec(),
            limit: filter.limit_value(),
            offset: filter.offset_value(),
        })
    }

    pub fn matches(&self, doc: &Value) -> bool {
        all_match(&self.nodes, doc)
    }

    /// Filters, sorts and pages an iterator of documents.
    pub fn apply<'a>(&self, docs: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let mut out: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).cloned().collect();

        if !self.order.is_empty() {
            out.sort_by(|a, b| {
                for info in &self.order {
                    let ord = compare_for_sort(a.get(&info.field), b.get(&info.field));
                    let ord = if info.sort == SortDirection::Desc { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = self.offset.unwrap_or(0).max(0) as usize;
        let limit = self.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        out.into_iter().skip(offset).take(limit).collect()
    }
}

fn all_match(nodes: &[WhereNode], doc: &Value) -> bool {
    nodes.iter().all(|node| node_matches(node, doc))
}

fn node_matches(node: &WhereNode, doc: &Value) -> bool {
    match node {
        WhereNode::Field(condition) => condition_matches(condition, doc.get(&condition.field)),
        WhereNode::And(groups) => groups.iter().all(|g| all_match(g, doc)),
        WhereNode::Or(groups) => groups.iter().any(|g| all_match(g, doc)),
        WhereNode::Not(group) => !all_match(group, doc),
    }
}

fn condition_matches(condition: &FilterWhereInfo, field: Option<&Value>) -> bool {
    let present = field.filter(|v| !v.is_null());
    let data = &condition.data;
    match condition.operator {
        FilterOp::Eq => match present {
            None => data.is_null(),
            Some(v) => json_eq(v, data),
        },
        FilterOp::Ne => match present {
            None => !data.is_null(),
            Some(v) => !json_eq(v, data),
        },
        FilterOp::Gt => cmp_is(present, data, |o| o == Ordering::Greater),
        FilterOp::Gte => cmp_is(present, data, |o| o != Ordering::Less),
        FilterOp::Lt => cmp_is(present, data, |o| o == Ordering::Less),
        FilterOp::Lte => cmp_is(present, data, |o| o != Ordering::Greater),
        FilterOp::Like => match (present.and_then(Value::as_str), data.as_str()) {
            (Some(text), Some(pattern)) => like(text, pattern),
            _ => false,
        },
        FilterOp::In => match (present, data.as_array()) {
            (Some(v), Some(values)) => values.iter().any(|candidate| json_eq(v, candidate)),
            _ => false,
        },
        FilterOp::NIn => match (present, data.as_array()) {
            (None, _) => true,
            (Some(v), Some(values)) => !values.iter().any(|candidate| json_eq(v, candidate)),
            (Some(_), None) => false,
        },
        FilterOp::Contains => match present.and_then(Value::as_array) {
            Some(items) => items.iter().any(|item| json_eq(item, data)),
            None => false,
        },
        FilterOp::Exists => data.as_bool().map(|wanted| wanted == present.is_some()).unwrap_or(false),
    }
}

fn cmp_is(field: Option<&Value>, data: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    field.and_then(|v| compare(v, data)).map(pred).unwrap_or(false)
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (as_timestamp(x), as_timestamp(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// RFC3339 strings compare as instants, whatever their fractional precision.
fn as_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    if text.len() < 20 || text.as_bytes().get(10) != Some(&b'T') {
        return None;
    }
    DateTime::parse_from_rfc3339(text).ok()
}

// Missing values sort last, as Postgres does for NULLs in ascending order.
fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.filter(|v| !v.is_null()), b.filter(|v| !v.is_null())) {
        (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// SQL LIKE: `%` matches any run, `_` matches one character.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}
