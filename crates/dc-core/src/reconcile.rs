//! The removal pass.
//!
//! One synchronous sweep of the active rule set over the live
//! document. The defining property is idempotence: a second pass with
//! no intervening DOM change removes nothing, which is what makes
//! uncoordinated observer-triggered re-invocation safe.

use log::{info, warn};

use crate::dom::Document;
use crate::rules::{Cardinality, RuleSet};
use crate::selector::{Selector, SelectorError};

/// One rule that removed something this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub label: String,
    pub count: usize,
}

/// Diagnostic report for one reconcile pass. Logging only; nothing in
/// the core surfaces it to a user.
#[derive(Debug, Clone, Default)]
pub struct RemovalReport {
    pub hits: Vec<RuleHit>,
    pub errors: Vec<SelectorError>,
}

impl RemovalReport {
    /// Total elements removed across all rules.
    pub fn removed_total(&self) -> usize {
        self.hits.iter().map(|h| h.count).sum()
    }

    /// True when the pass neither removed anything nor hit a bad rule.
    pub fn is_quiet(&self) -> bool {
        self.hits.is_empty() && self.errors.is_empty()
    }
}

/// Apply every rule in evaluation order against the live document.
///
/// A malformed selector is reported and skipped; one bad rule never
/// aborts the pass.
pub fn reconcile(rules: &RuleSet, doc: &mut Document) -> RemovalReport {
    let mut report = RemovalReport::default();

    for rule in rules.iter() {
        let selector = match Selector::parse(&rule.selector) {
            Ok(selector) => selector,
            Err(err) => {
                warn!("skipping rule `{}`: {err}", rule.label);
                report.errors.push(err);
                continue;
            }
        };

        match rule.cardinality {
            Cardinality::All => {
                let matches = selector.query_all(doc, doc.root());
                if matches.is_empty() {
                    continue;
                }
                for id in &matches {
                    doc.detach(*id);
                }
                info!("{} ({} removed)", rule.label, matches.len());
                report.hits.push(RuleHit {
                    label: rule.label.clone(),
                    count: matches.len(),
                });
            }
            Cardinality::One => {
                if let Some(id) = selector.query_first(doc, doc.root()) {
                    doc.detach(id);
                    info!("{}", rule.label);
                    report.hits.push(RuleHit {
                        label: rule.label.clone(),
                        count: 1,
                    });
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RemovalRule;

    fn rules(list: &[(&str, &str, Cardinality)]) -> RuleSet {
        RuleSet::from_rules(
            list.iter()
                .map(|(s, l, c)| RemovalRule::new(s, l, *c))
                .collect(),
        )
    }

    #[test]
    fn test_all_removes_every_match() {
        let mut doc = Document::parse(
            "<div class=\"ad-banner\">1</div><p>keep</p>\
             <div class=\"ad-banner\">2</div><div class=\"ad-banner\">3</div>",
        );
        let set = rules(&[(".ad-banner", "ad removed", Cardinality::All)]);

        let report = reconcile(&set, &mut doc);
        assert_eq!(report.hits, vec![RuleHit { label: "ad removed".into(), count: 3 }]);
        assert_eq!(doc.inner_html(doc.root()), "<p>keep</p>");
    }

    #[test]
    fn test_one_removes_first_in_document_order() {
        let mut doc = Document::parse(
            "<p class=\"promo\">first</p><p class=\"promo\">second</p>",
        );
        let set = rules(&[(".promo", "promo gone", Cardinality::One)]);

        let report = reconcile(&set, &mut doc);
        assert_eq!(report.removed_total(), 1);
        assert_eq!(doc.inner_html(doc.root()), "<p class=\"promo\">second</p>");
    }

    #[test]
    fn test_idempotence() {
        let mut doc = Document::parse(
            "<div class=\"x\"><span class=\"x\">nested</span></div><p>text</p>",
        );
        let set = rules(&[
            (".x", "x", Cardinality::All),
            ("p", "p", Cardinality::One),
        ]);

        let first = reconcile(&set, &mut doc);
        assert!(first.removed_total() > 0);
        let after_first = doc.inner_html(doc.root());

        let second = reconcile(&set, &mut doc);
        assert!(second.is_quiet());
        assert_eq!(doc.inner_html(doc.root()), after_first);
    }

    #[test]
    fn test_bad_selector_is_isolated() {
        let mut doc = Document::parse("<div class=\"ad\">x</div><div class=\"ad\">y</div>");
        let set = rules(&[
            ("div:hover", "broken", Cardinality::All),
            (".ad", "ad", Cardinality::All),
        ]);

        let report = reconcile(&set, &mut doc);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].selector, "div:hover");
        assert_eq!(report.removed_total(), 2);
        assert_eq!(doc.inner_html(doc.root()), "");
    }

    #[test]
    fn test_empty_rule_set_is_noop() {
        let mut doc = Document::parse("<p>hello</p>");
        let report = reconcile(&RuleSet::new(), &mut doc);
        assert!(report.is_quiet());
        assert_eq!(doc.inner_html(doc.root()), "<p>hello</p>");
    }

    #[test]
    fn test_rules_evaluate_in_insertion_order() {
        // The first rule removes the wrapper, so the second sees nothing.
        let mut doc = Document::parse("<div id=\"outer\"><p class=\"inner\">x</p></div>");
        let set = rules(&[
            ("#outer", "outer", Cardinality::One),
            (".inner", "inner", Cardinality::All),
        ]);

        let report = reconcile(&set, &mut doc);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].label, "outer");
    }
}
