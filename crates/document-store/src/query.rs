/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Builder for querying documents within one collection.
///
/// Filters are equality matches on top-level body fields and are ANDed
/// together. Sorting compares the field's JSON value (strings
/// lexicographically, numbers numerically).
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: String,

    /// Top-level field equality filters.
    pub filters: Vec<(String, serde_json::Value)>,

    /// Field to sort by, with direction.
    pub sort: Option<(String, SortOrder)>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query over every document in a collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Requires `field` to equal `value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Sorts ascending by `field`.
    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some((field.into(), SortOrder::Ascending));
        self
    }

    /// Sorts descending by `field`.
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some((field.into(), SortOrder::Descending));
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `body` satisfies every filter.
    pub fn matches(&self, body: &serde_json::Value) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| body.get(field) == Some(value))
    }

    /// Builds a JSON object of the filters, suitable for `jsonb @>` containment.
    pub fn filter_object(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .filters
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Orders two optional JSON values for sorting; missing values sort first.
pub(crate) fn compare_json(
    a: Option<&serde_json::Value>,
    b: Option<&serde_json::Value>,
) -> std::cmp::Ordering {
    use serde_json::Value;
    use std::cmp::Ordering;

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
