//! Types of the well-known DSL constants

use std::collections::BTreeMap;

/// Labels for constant identifiers that solvers assign directly,
/// e.g. `x3 = TWO` or `x7 = DOWN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantTypes {
    types: BTreeMap<String, String>,
}

const BOOLEANS: &[&str] = &["T", "F"];

const INTEGERS: &[&str] = &[
    "ZERO", "ONE", "TWO", "THREE", "FOUR", "FIVE", "SIX", "SEVEN", "EIGHT", "NINE", "TEN",
    "NEG_ONE", "NEG_TWO",
];

const INTEGER_TUPLES: &[&str] = &[
    "ORIGIN",
    "UNITY",
    "DOWN",
    "UP",
    "RIGHT",
    "LEFT",
    "ZERO_BY_TWO",
    "TWO_BY_ZERO",
    "TWO_BY_TWO",
    "THREE_BY_THREE",
];

impl Default for ConstantTypes {
    fn default() -> Self {
        let mut types = BTreeMap::new();
        for (names, label) in [
            (BOOLEANS, "Boolean"),
            (INTEGERS, "Integer"),
            (INTEGER_TUPLES, "IntegerTuple"),
        ] {
            for name in names {
                types.insert(name.to_string(), label.to_string());
            }
        }
        ConstantTypes { types }
    }
}

impl ConstantTypes {
    /// A table holding exactly the given entries.
    pub fn new(types: BTreeMap<String, String>) -> Self {
        ConstantTypes { types }
    }

    /// A copy of this table extended (or corrected) by `overrides`.
    pub fn with_overrides<I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut types = self.types.clone();
        types.extend(overrides);
        ConstantTypes { types }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
