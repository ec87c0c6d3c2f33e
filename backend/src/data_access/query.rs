//! Mongo-style filter, sort and projection documents, parsed once and then
//! evaluated against JSON records.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

const ID_FIELD: &str = "_id";

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("unknown operator {0}")]
    UnknownOperator(String),
    #[error("operator {operator} expects {expected}")]
    InvalidOperand {
        operator: String,
        expected: &'static str,
    },
    #[error("invalid sort direction for field {0}")]
    InvalidSortDirection(String),
    #[error("invalid projection value for field {0}")]
    InvalidProjectionValue(String),
    #[error("projection cannot mix inclusion and exclusion")]
    MixedProjection,
}

// ── Filter ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
}

#[derive(Debug, Clone)]
enum Clause {
    Field { path: String, conditions: Vec<Condition> },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn from_json(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            _ => Err(QueryError::NotAnObject),
        }
    }

    fn from_map(fields: Map<String, Value>) -> Result<Self, QueryError> {
        let mut clauses = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            let clause = match key.as_str() {
                "$and" => Clause::And(parse_filter_list("$and", value)?),
                "$or" => Clause::Or(parse_filter_list("$or", value)?),
                "$nor" => Clause::Nor(parse_filter_list("$nor", value)?),
                op if op.starts_with('$') => return Err(QueryError::UnknownOperator(key)),
                _ => Clause::Field {
                    conditions: parse_conditions(value)?,
                    path: key,
                },
            };
            clauses.push(clause);
        }
        Ok(Filter { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Field { path, conditions } => {
                let field = lookup(document, path);
                conditions.iter().all(|condition| condition_holds(condition, field))
            }
            Clause::And(filters) => filters.iter().all(|f| f.matches(document)),
            Clause::Or(filters) => filters.iter().any(|f| f.matches(document)),
            Clause::Nor(filters) => !filters.iter().any(|f| f.matches(document)),
        })
    }
}

fn parse_filter_list(operator: &str, value: Value) -> Result<Vec<Filter>, QueryError> {
    match value {
        Value::Array(items) if !items.is_empty() => {
            items.into_iter().map(Filter::from_json).collect()
        }
        _ => Err(QueryError::InvalidOperand {
            operator: operator.to_string(),
            expected: "a non-empty array of filters",
        }),
    }
}

fn parse_conditions(value: Value) -> Result<Vec<Condition>, QueryError> {
    let operators = match value {
        Value::Object(fields) if fields.keys().any(|k| k.starts_with('$')) => fields,
        literal => return Ok(vec![Condition::Eq(literal)]),
    };

    let mut conditions = Vec::with_capacity(operators.len());
    for (operator, operand) in operators {
        let condition = match operator.as_str() {
            "$eq" => Condition::Eq(operand),
            "$ne" => Condition::Ne(operand),
            "$gt" => Condition::Gt(operand),
            "$gte" => Condition::Gte(operand),
            "$lt" => Condition::Lt(operand),
            "$lte" => Condition::Lte(operand),
            "$in" => Condition::In(operand_list(&operator, operand)?),
            "$nin" => Condition::Nin(operand_list(&operator, operand)?),
            "$exists" => Condition::Exists(match operand {
                Value::Bool(flag) => flag,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                _ => {
                    return Err(QueryError::InvalidOperand {
                        operator,
                        expected: "a boolean",
                    })
                }
            }),
            _ => return Err(QueryError::UnknownOperator(operator)),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn operand_list(operator: &str, operand: Value) -> Result<Vec<Value>, QueryError> {
    match operand {
        Value::Array(items) => Ok(items),
        _ => Err(QueryError::InvalidOperand {
            operator: operator.to_string(),
            expected: "an array",
        }),
    }
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.as_object()?.get(segment))
}

fn condition_holds(condition: &Condition, field: Option<&Value>) -> bool {
    match condition {
        Condition::Eq(expected) => field_equals(field, expected),
        Condition::Ne(expected) => !field_equals(field, expected),
        Condition::Gt(bound) => field_compares(field, bound, |o| o == Ordering::Greater),
        Condition::Gte(bound) => field_compares(field, bound, |o| o != Ordering::Less),
        Condition::Lt(bound) => field_compares(field, bound, |o| o == Ordering::Less),
        Condition::Lte(bound) => field_compares(field, bound, |o| o != Ordering::Greater),
        Condition::In(candidates) => candidates.iter().any(|c| field_equals(field, c)),
        Condition::Nin(candidates) => !candidates.iter().any(|c| field_equals(field, c)),
        Condition::Exists(expected) => field.is_some() == *expected,
    }
}

/// Equality with array-contains semantics: an array field matches a scalar
/// if any element equals it. A missing field equals `null`.
fn field_equals(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        None => expected.is_null(),
        Some(array @ Value::Array(items)) => {
            values_equal(array, expected) || items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

/// Range comparisons only apply between values of the same type class.
fn field_compares(field: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let comparable = |value: &Value| {
        type_rank(Some(value)) == type_rank(Some(bound)) && accept(compare_values(Some(value), Some(bound)))
    };
    match field {
        None => false,
        Some(Value::Array(items)) if !bound.is_array() => items.iter().any(comparable),
        Some(value) => comparable(value),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over JSON values: null < number < string < object < array < bool.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Array(xs)), Some(Value::Array(ys))) => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| compare_values(Some(x), Some(y)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| xs.len().cmp(&ys.len())),
        (Some(x), Some(y)) if x.is_object() => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    }
}

// ── Sort ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct Sort {
    keys: Vec<(String, Direction)>,
}

impl Sort {
    pub fn from_json(value: Value) -> Result<Self, QueryError> {
        let Value::Object(fields) = value else {
            return Err(QueryError::NotAnObject);
        };
        let mut keys = Vec::with_capacity(fields.len());
        for (field, direction) in fields {
            let direction = match &direction {
                Value::Number(n) => match n.as_f64() {
                    Some(d) if d > 0.0 => Direction::Ascending,
                    Some(d) if d < 0.0 => Direction::Descending,
                    _ => return Err(QueryError::InvalidSortDirection(field)),
                },
                Value::String(s) => match s.as_str() {
                    "asc" | "ascending" => Direction::Ascending,
                    "desc" | "descending" => Direction::Descending,
                    _ => return Err(QueryError::InvalidSortDirection(field)),
                },
                _ => return Err(QueryError::InvalidSortDirection(field)),
            };
            keys.push((field, direction));
        }
        Ok(Sort { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn apply(&self, documents: &mut [Value]) {
        if self.keys.is_empty() {
            return;
        }
        documents.sort_by(|a, b| {
            self.keys
                .iter()
                .map(|(path, direction)| {
                    let ordering = compare_values(lookup(a, path), lookup(b, path));
                    match direction {
                        Direction::Ascending => ordering,
                        Direction::Descending => ordering.reverse(),
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }
}

// ── Projection ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProjectionMode {
    All,
    Include(HashSet<String>),
    Exclude(HashSet<String>),
}

/// Which top-level fields of a record are returned. `_id` is kept unless
/// explicitly excluded.
#[derive(Debug, Clone)]
pub struct Projection {
    mode: ProjectionMode,
    include_id: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Projection {
            mode: ProjectionMode::All,
            include_id: true,
        }
    }
}

impl Projection {
    pub fn from_json(value: Value) -> Result<Self, QueryError> {
        let Value::Object(fields) = value else {
            return Err(QueryError::NotAnObject);
        };

        let mut id_flag = None;
        let mut included = HashSet::new();
        let mut excluded = HashSet::new();
        for (field, flag) in fields {
            let keep = match &flag {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                _ => return Err(QueryError::InvalidProjectionValue(field)),
            };
            if field == ID_FIELD {
                id_flag = Some(keep);
            } else if keep {
                included.insert(field);
            } else {
                excluded.insert(field);
            }
        }

        let mode = match (included.is_empty(), excluded.is_empty()) {
            // `{"_id": 1}` alone is an inclusion projection of just the id
            (true, true) if id_flag == Some(true) => ProjectionMode::Include(included),
            (true, true) => ProjectionMode::All,
            (false, true) => ProjectionMode::Include(included),
            (true, false) => ProjectionMode::Exclude(excluded),
            (false, false) => return Err(QueryError::MixedProjection),
        };
        Ok(Projection {
            mode,
            include_id: id_flag.unwrap_or(true),
        })
    }

    pub fn apply(&self, document: Value) -> Value {
        let Value::Object(fields) = document else {
            return document;
        };
        let projected = fields
            .into_iter()
            .filter(|(field, _)| {
                if field == ID_FIELD {
                    return self.include_id;
                }
                match &self.mode {
                    ProjectionMode::All => true,
                    ProjectionMode::Include(keep) => keep.contains(field),
                    ProjectionMode::Exclude(drop) => !drop.contains(field),
                }
            })
            .collect();
        Value::Object(projected)
    }
}

// ── Find options ───────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub filter: Filter,
    pub sort: Sort,
    pub projection: Projection,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn apply(&self, documents: Vec<Value>) -> Vec<Value> {
        let mut matched: Vec<Value> = documents
            .into_iter()
            .filter(|doc| self.filter.matches(doc))
            .collect();
        self.sort.apply(&mut matched);

        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let take = self
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|doc| self.projection.apply(doc))
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(value: Value) -> Filter {
        Filter::from_json(value).unwrap()
    }

    fn tasks() -> Vec<Value> {
        vec![
            json!({"_id": "a", "name": "write report", "completed": false, "priority": 2, "assignedUser": "u1"}),
            json!({"_id": "b", "name": "fix bug", "completed": true, "priority": 5, "assignedUser": ""}),
            json!({"_id": "c", "name": "deploy", "completed": false, "priority": 1, "assignedUser": "u2"}),
        ]
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = filter(json!({}));
        assert!(f.is_empty());
        assert!(tasks().iter().all(|t| f.matches(t)));
    }

    #[test]
    fn literal_equality_and_missing_fields() {
        let f = filter(json!({"completed": false}));
        let hits: Vec<_> = tasks().into_iter().filter(|t| f.matches(t)).collect();
        assert_eq!(hits.len(), 2);

        assert!(filter(json!({"missing": null})).matches(&json!({"_id": "x"})));
        assert!(!filter(json!({"missing": 1})).matches(&json!({"_id": "x"})));
    }

    #[test]
    fn array_fields_match_any_element() {
        let user = json!({"pendingTasks": ["t1", "t2"]});
        assert!(filter(json!({"pendingTasks": "t2"})).matches(&user));
        assert!(filter(json!({"pendingTasks": ["t1", "t2"]})).matches(&user));
        assert!(!filter(json!({"pendingTasks": "t3"})).matches(&user));
    }

    #[test]
    fn comparison_and_set_operators() {
        let docs = tasks();
        let count = |f: Filter| docs.iter().filter(|d| f.matches(d)).count();

        assert_eq!(count(filter(json!({"priority": {"$gt": 1}}))), 2);
        assert_eq!(count(filter(json!({"priority": {"$gte": 2, "$lt": 5}}))), 1);
        assert_eq!(count(filter(json!({"_id": {"$in": ["a", "c", "zzz"]}}))), 2);
        assert_eq!(count(filter(json!({"assignedUser": {"$nin": ["", "u1"]}}))), 1);
        assert_eq!(count(filter(json!({"assignedUser": {"$ne": ""}}))), 2);
        assert_eq!(count(filter(json!({"priority": {"$exists": false}}))), 0);
        // type bracketing: strings never compare against numbers
        assert_eq!(count(filter(json!({"name": {"$gt": 0}}))), 0);
    }

    #[test]
    fn integer_and_float_compare_equal() {
        assert!(filter(json!({"priority": 2.0})).matches(&json!({"priority": 2})));
    }

    #[test]
    fn logical_operators() {
        let docs = tasks();
        let count = |f: Filter| docs.iter().filter(|d| f.matches(d)).count();

        assert_eq!(
            count(filter(json!({"$or": [{"_id": "a"}, {"completed": true}]}))),
            2
        );
        assert_eq!(
            count(filter(json!({"$and": [{"completed": false}, {"priority": {"$lt": 2}}]}))),
            1
        );
        assert_eq!(count(filter(json!({"$nor": [{"completed": true}]}))), 2);
    }

    #[test]
    fn rejects_unknown_operators_and_bad_shapes() {
        assert_eq!(
            Filter::from_json(json!({"name": {"$regex": "x"}})).unwrap_err(),
            QueryError::UnknownOperator("$regex".into())
        );
        assert_eq!(
            Filter::from_json(json!({"$where": "1"})).unwrap_err(),
            QueryError::UnknownOperator("$where".into())
        );
        assert!(matches!(
            Filter::from_json(json!({"_id": {"$in": "a"}})),
            Err(QueryError::InvalidOperand { .. })
        ));
        assert!(matches!(
            Filter::from_json(json!({"$or": []})),
            Err(QueryError::InvalidOperand { .. })
        ));
        assert_eq!(Filter::from_json(json!([1, 2])).unwrap_err(), QueryError::NotAnObject);
    }

    #[test]
    fn sort_by_multiple_keys() {
        let mut docs = vec![
            json!({"_id": "1", "completed": true, "name": "b"}),
            json!({"_id": "2", "completed": false, "name": "c"}),
            json!({"_id": "3", "completed": false, "name": "a"}),
            json!({"_id": "4", "name": "d"}),
        ];
        Sort::from_json(json!({"completed": -1, "name": 1}))
            .unwrap()
            .apply(&mut docs);
        let ids: Vec<_> = docs.iter().map(|d| d["_id"].as_str().unwrap()).collect();
        // bool sorts above everything, missing sorts lowest
        assert_eq!(ids, ["1", "3", "2", "4"]);
    }

    #[test]
    fn sort_rejects_zero_direction() {
        assert_eq!(
            Sort::from_json(json!({"name": 0})).unwrap_err(),
            QueryError::InvalidSortDirection("name".into())
        );
        assert!(Sort::from_json(json!({"name": "desc"})).is_ok());
    }

    #[test]
    fn inclusion_projection_keeps_id() {
        let p = Projection::from_json(json!({"name": 1})).unwrap();
        assert_eq!(p.apply(tasks().remove(0)), json!({"_id": "a", "name": "write report"}));

        let p = Projection::from_json(json!({"name": 1, "_id": 0})).unwrap();
        assert_eq!(p.apply(tasks().remove(0)), json!({"name": "write report"}));
    }

    #[test]
    fn exclusion_projection_drops_fields() {
        let p = Projection::from_json(json!({"assignedUser": 0, "priority": false})).unwrap();
        assert_eq!(
            p.apply(tasks().remove(1)),
            json!({"_id": "b", "name": "fix bug", "completed": true})
        );
    }

    #[test]
    fn projection_rejects_mixed_modes() {
        assert_eq!(
            Projection::from_json(json!({"name": 1, "email": 0})).unwrap_err(),
            QueryError::MixedProjection
        );
        assert!(matches!(
            Projection::from_json(json!({"name": "yes"})),
            Err(QueryError::InvalidProjectionValue(_))
        ));
    }

    #[test]
    fn find_options_page_after_sorting() {
        let options = FindOptions {
            filter: filter(json!({"completed": false})),
            sort: Sort::from_json(json!({"priority": 1})).unwrap(),
            projection: Projection::from_json(json!({"_id": 1})).unwrap(),
            skip: 1,
            limit: Some(5),
        };
        assert_eq!(options.apply(tasks()), vec![json!({"_id": "a"})]);

        let unlimited = FindOptions::default();
        assert_eq!(unlimited.apply(tasks()).len(), 3);
    }
}
