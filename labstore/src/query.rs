use core::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::RecordField;

/// A stored record in its document form: field name to JSON value.
pub type Document = Map<String, Value>;

/// Equality condition on one document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

/// Selection and ordering of documents within one collection.
///
/// Both stores evaluate queries through [`Query::matches`] and [`Query::apply`],
/// so a query returns the same records whichever store answers it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds an equality condition on `field`.
    pub fn eq(self, field: impl RecordField, value: impl Into<Value>) -> Self {
        self.eq_raw(field.name(), value)
    }

    /// Adds an equality condition on a field given by its document name.
    pub fn eq_raw(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl RecordField, direction: Direction) -> Self {
        self.order = Some(Order {
            field: field.name().to_string(),
            direction,
        });
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.filters
            .iter()
            .all(|filter| document.get(&filter.field).unwrap_or(&Value::Null) == &filter.value)
    }

    /// Filters and orders `documents`. Ties keep their input order.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = documents
            .into_iter()
            .filter(|document| self.matches(document))
            .collect();
        if let Some(order) = &self.order {
            selected.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(&order.field).unwrap_or(&Value::Null),
                    b.get(&order.field).unwrap_or(&Value::Null),
                );
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        selected
    }
}

/// Total order over JSON scalars: null, then booleans, numbers, strings.
/// Arrays and objects sort last and compare equal among themselves.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .unwrap_or_default()
                .total_cmp(&b.as_f64().unwrap_or_default()),
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{BorrowRequestField, RequestStatus};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test documents are objects"),
        }
    }

    #[test]
    fn filters_by_every_condition() {
        let query = Query::all()
            .eq(BorrowRequestField::StudentId, "u1")
            .eq(BorrowRequestField::Status, RequestStatus::Pending);

        assert!(query.matches(&doc(json!({"studentId": "u1", "status": "pending"}))));
        assert!(!query.matches(&doc(json!({"studentId": "u1", "status": "approved"}))));
        assert!(!query.matches(&doc(json!({"status": "pending"}))));
    }

    #[test]
    fn missing_field_matches_null() {
        let query = Query::all().eq_raw("returnDate", Value::Null);
        assert!(query.matches(&doc(json!({"id": "r1"}))));
    }

    #[test]
    fn orders_numbers_numerically() {
        let query = Query::all().order_by(BorrowRequestField::RequestDate, Direction::Descending);
        let sorted = query.apply(vec![
            doc(json!({"id": "a", "requestDate": 9})),
            doc(json!({"id": "b", "requestDate": 100})),
            doc(json!({"id": "c", "requestDate": 10})),
        ]);
        let ids: Vec<_> = sorted.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn null_sorts_first() {
        assert_eq!(compare_values(&Value::Null, &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(1), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&json!(1.5), &json!(1.25)), Ordering::Greater);
    }
}
