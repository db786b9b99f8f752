//! Collections: the fundamental evaluation result type

use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::value::FhirPathValue;

/// An ordered sequence of values with an orderedness flag.
///
/// The empty collection is FHIRPath's null. The flag records whether the
/// sequence's order is meaningful: some operations (`children()`,
/// `distinct()`, unions of unordered inputs) produce collections whose order
/// carries no information, and order-sensitive operations (`first()`,
/// indexing) refuse such inputs.
///
/// `Arc<Vec>` keeps cloning cheap when contexts fork per scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    values: Arc<Vec<FhirPathValue>>,
    is_ordered: bool,
}

impl Collection {
    /// The empty collection (ordered by convention)
    pub fn empty() -> Self {
        Self {
            values: Arc::new(Vec::new()),
            is_ordered: true,
        }
    }

    /// A collection with a single value
    pub fn single(value: FhirPathValue) -> Self {
        Self {
            values: Arc::new(vec![value]),
            is_ordered: true,
        }
    }

    /// Build from a vector, ordered
    pub fn from_values(values: Vec<FhirPathValue>) -> Self {
        Self {
            values: Arc::new(values),
            is_ordered: true,
        }
    }

    /// Build from a vector with explicit orderedness
    pub fn with_ordering(values: Vec<FhirPathValue>, is_ordered: bool) -> Self {
        Self {
            values: Arc::new(values),
            is_ordered,
        }
    }

    /// True when there are no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the sequence order is meaningful
    pub fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    /// Return the same values with the flag forced to `ordered`
    pub fn reordered(mut self, ordered: bool) -> Self {
        self.is_ordered = ordered;
        self
    }

    /// First value, if any
    pub fn first(&self) -> Option<&FhirPathValue> {
        self.values.first()
    }

    /// Last value, if any
    pub fn last(&self) -> Option<&FhirPathValue> {
        self.values.last()
    }

    /// Value at `index`, if in range
    pub fn get(&self, index: usize) -> Option<&FhirPathValue> {
        self.values.get(index)
    }

    /// Iterate over the values
    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathValue> {
        self.values.iter()
    }

    /// The values as a slice
    pub fn values(&self) -> &[FhirPathValue] {
        &self.values
    }

    /// Append a value in place
    pub fn push(&mut self, value: FhirPathValue) {
        Arc::make_mut(&mut self.values).push(value);
    }

    /// Take the values out, cloning only when shared
    pub fn into_vec(self) -> Vec<FhirPathValue> {
        Arc::try_unwrap(self.values).unwrap_or_else(|arc| (*arc).clone())
    }

    /// True when both collections share the same backing storage; used to
    /// recognize the evaluation root when clones travel through scopes.
    pub fn shares_storage(&self, other: &Collection) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    /// The lone value when the collection is a singleton
    pub fn as_singleton(&self) -> Option<&FhirPathValue> {
        if self.values.len() == 1 {
            self.values.first()
        } else {
            None
        }
    }

    /// True when `value` equals (known-true) some member
    pub fn contains_value(&self, value: &FhirPathValue) -> bool {
        self.values.iter().any(|v| v.equal(value) == Some(true))
    }

    /// JSON form: null for empty, the value for singletons, an array
    /// otherwise. Deterministic for the determinism property tests.
    pub fn to_json_value(&self) -> JsonValue {
        match self.values.len() {
            0 => JsonValue::Null,
            1 => self.values[0].to_json_value(),
            _ => JsonValue::Array(self.values.iter().map(|v| v.to_json_value()).collect()),
        }
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<FhirPathValue> for Collection {
    fn from(value: FhirPathValue) -> Self {
        Self::single(value)
    }
}

impl From<Vec<FhirPathValue>> for Collection {
    fn from(values: Vec<FhirPathValue>) -> Self {
        Self::from_values(values)
    }
}

impl IntoIterator for Collection {
    type Item = FhirPathValue;
    type IntoIter = std::vec::IntoIter<FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

impl FromIterator<FhirPathValue> for Collection {
    fn from_iter<T: IntoIterator<Item = FhirPathValue>>(iter: T) -> Self {
        Self::from_values(iter.into_iter().collect())
    }
}
