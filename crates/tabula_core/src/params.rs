//! Field-equality filters.

use crate::error::CoreResult;
use crate::reflect::{field_by_path, Reflect};
use crate::value::{equals, Value};

/// Ordered mapping of field path to expected value.
///
/// Keys are struct-level field names or dotted paths. Inserting an existing
/// key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    pairs: Vec<(String, Value)>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair, builder style.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Inserts or replaces the value for `field`.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((field, value)),
        }
    }

    /// Returns the expected value for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.pairs.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    /// Iterates pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// True if every pair compares equal on `record`.
    ///
    /// # Errors
    ///
    /// Returns a lookup error if a path does not resolve on the record.
    pub fn all_equal(&self, record: &dyn Reflect) -> CoreResult<bool> {
        for (field, expected) in &self.pairs {
            if !equals(&field_by_path(record, field)?, expected) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True if every pair compares not-equal on `record`. Incomparable pairs
    /// count as not-equal.
    ///
    /// # Errors
    ///
    /// Returns a lookup error if a path does not resolve on the record.
    pub fn none_equal(&self, record: &dyn Reflect) -> CoreResult<bool> {
        for (field, rejected) in &self.pairs {
            if equals(&field_by_path(record, field)?, rejected) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// An include set plus any number of exclude sets.
///
/// A record passes when every include pair is equal and, for every exclude
/// set, every pair is not-equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Pairs that must all be equal.
    pub include: Params,
    /// Sets whose pairs must all be not-equal.
    pub exclude: Vec<Params>,
}

impl Filter {
    /// A filter that matches every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter with only include pairs.
    #[must_use]
    pub fn include(include: Params) -> Self {
        Self {
            include,
            exclude: Vec::new(),
        }
    }

    /// Adds an exclude set, builder style.
    #[must_use]
    pub fn exclude(mut self, exclude: Params) -> Self {
        self.exclude.push(exclude);
        self
    }

    /// Returns true if any non-empty exclude set is present.
    #[must_use]
    pub fn has_exclusions(&self) -> bool {
        self.exclude.iter().any(|p| !p.is_empty())
    }

    /// Evaluates the filter against `record`.
    ///
    /// # Errors
    ///
    /// Returns a lookup error if a path does not resolve on the record.
    pub fn matches(&self, record: &dyn Reflect) -> CoreResult<bool> {
        if !self.include.all_equal(record)? {
            return Ok(false);
        }
        for exclude in &self.exclude {
            if !exclude.none_equal(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl From<Params> for Filter {
    fn from(include: Params) -> Self {
        Self::include(include)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::impl_reflect;

    struct Car {
        model: String,
        city: String,
        year: Option<u16>,
    }

    impl_reflect!(Car {
        value model,
        value city,
        value year,
    });

    fn car(model: &str, city: &str) -> Car {
        Car {
            model: model.into(),
            city: city.into(),
            year: None,
        }
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut p = Params::new().with("a", 1u8).with("b", "x");
        p.insert("a", 2u8);
        let keys: Vec<_> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(p.get("a"), Some(&Value::UInt(2)));
    }

    #[test]
    fn include_and_exclude() {
        let filter = Filter::include(Params::new().with("model", "Tesla"))
            .exclude(Params::new().with("city", "Paris"));

        assert!(filter.matches(&car("Tesla", "Moscow")).unwrap());
        assert!(!filter.matches(&car("Tesla", "Paris")).unwrap());
        assert!(!filter.matches(&car("BMW", "Moscow")).unwrap());
    }

    #[test]
    fn exclude_set_rejects_on_any_equal_pair() {
        let filter = Filter::all()
            .exclude(Params::new().with("model", "Volvo").with("city", "Moscow"));
        assert!(!filter.matches(&car("Tesla", "Moscow")).unwrap());
        assert!(filter.matches(&car("Tesla", "Paris")).unwrap());
    }

    #[test]
    fn incomparable_pairs() {
        // Null never equals, so it fails includes and passes excludes.
        let c = car("Tesla", "Moscow");
        assert!(!Filter::include(Params::new().with("year", 2020u16)).matches(&c).unwrap());
        assert!(Filter::all()
            .exclude(Params::new().with("year", 2020u16))
            .matches(&c)
            .unwrap());
    }

    #[test]
    fn unknown_field_is_an_error() {
        let err = Filter::include(Params::new().with("colour", "red"))
            .matches(&car("Tesla", "Moscow"))
            .unwrap_err();
        assert!(matches!(err, CoreError::FieldNotFound { .. }));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::all().matches(&car("a", "b")).unwrap());
        assert!(!Filter::all().exclude(Params::new()).has_exclusions());
    }
}
