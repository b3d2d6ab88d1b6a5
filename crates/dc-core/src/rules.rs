//! Removal rules and the active rule set.
//!
//! Wire field names follow the extension's storage format: a rule is
//! `{ selector, message, multiple }`, so `label` serializes as
//! `message` and `cardinality` as the `multiple` bool.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How many matching elements a rule removes per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    /// First match in document order only.
    #[default]
    One,
    /// Every current match.
    All,
}

impl Serialize for Cardinality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(matches!(self, Cardinality::All))
    }
}

impl<'de> Deserialize<'de> for Cardinality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(if bool::deserialize(deserializer)? {
            Cardinality::All
        } else {
            Cardinality::One
        })
    }
}

/// One declarative removal rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRule {
    /// CSS selector. Validity is checked at reconcile time; a bad
    /// selector skips the rule, never aborts the pass.
    pub selector: String,
    /// Human-readable label, shown in diagnostics.
    #[serde(rename = "message", default)]
    pub label: String,
    #[serde(rename = "multiple", default)]
    pub cardinality: Cardinality,
}

impl RemovalRule {
    pub fn new(selector: &str, label: &str, cardinality: Cardinality) -> Self {
        Self {
            selector: selector.to_string(),
            label: label.to_string(),
            cardinality,
        }
    }
}

/// The active, wholesale-replaceable rule collection for the page.
///
/// Insertion order is evaluation order. The engine never mutates a
/// rule set in place; configuration messages replace it atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<RemovalRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<RemovalRule>) -> Self {
        Self { rules }
    }

    /// Replace the whole set. The only mutation the engine performs.
    pub fn replace(&mut self, rules: Vec<RemovalRule>) {
        self.rules = rules;
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemovalRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_round_trip() {
        let json = r#"{"selector":".ad","message":"ad removed","multiple":true}"#;
        let rule: RemovalRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.selector, ".ad");
        assert_eq!(rule.label, "ad removed");
        assert_eq!(rule.cardinality, Cardinality::All);
        assert_eq!(serde_json::to_string(&rule).unwrap(), json);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let rule: RemovalRule = serde_json::from_str(r##"{"selector":"#x"}"##).unwrap();
        assert_eq!(rule.label, "");
        assert_eq!(rule.cardinality, Cardinality::One);
    }

    #[test]
    fn test_rule_set_is_transparent_list() {
        let set: RuleSet = serde_json::from_str(
            r##"[{"selector":"#a","message":"","multiple":false},
                 {"selector":".b","message":"b","multiple":true}]"##,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        let selectors: Vec<_> = set.iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(selectors, vec!["#a", ".b"]);
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut set = RuleSet::from_rules(vec![RemovalRule::new("#a", "a", Cardinality::One)]);
        set.replace(vec![RemovalRule::new(".b", "b", Cardinality::All)]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().selector, ".b");
    }
}
