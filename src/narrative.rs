//! Narrative generation seam for store comparisons.
//!
//! The engine only produces structured evidence; turning it into prose is a
//! collaborator concern. An LLM-backed generator lives outside this crate.
//! [`TemplateNarrative`] is the deterministic fallback used whenever the
//! external generator is unreachable or unconfigured, so a comparison
//! request always yields a summary.

use crate::comparison::ComparisonEvidence;
use crate::error::Result;

/// Turns comparison evidence into a prose summary.
pub trait NarrativeGenerator {
    fn generate(
        &self,
        store_a: &str,
        store_b: &str,
        evidence: &ComparisonEvidence,
    ) -> Result<String>;
}

/// Deterministic templated narrative built purely from the evidence payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrative;

impl NarrativeGenerator for TemplateNarrative {
    fn generate(
        &self,
        store_a: &str,
        store_b: &str,
        evidence: &ComparisonEvidence,
    ) -> Result<String> {
        let mut lines = Vec::new();

        lines.push("## Trends".to_string());
        for store in [store_a, store_b] {
            lines.push(describe_store(store, evidence));
        }

        lines.push("## Differences".to_string());
        let mut diff_lines: Vec<String> = evidence
            .differences
            .iter()
            .take(3)
            .map(|d| {
                format!(
                    "- {}: {} {} vs {} {} (difference {})",
                    d.category, store_a, d.store_a, store_b, d.store_b, d.difference
                )
            })
            .collect();
        if diff_lines.is_empty() {
            diff_lines.push("- No notable differences in category mix between the stores".to_string());
        }
        lines.extend(diff_lines);

        lines.push("## Recommendations".to_string());
        lines.push(
            "- Review inventory planning and root causes where the leading categories diverge most"
                .to_string(),
        );
        lines.push(
            "- Categories strong in both stores are candidates for coordinated promotions"
                .to_string(),
        );

        Ok(lines.join("\n"))
    }
}

fn describe_store(store: &str, evidence: &ComparisonEvidence) -> String {
    match evidence.stores.get(store) {
        Some(info) if !info.top_categories.is_empty() => {
            let parts: Vec<String> = info
                .top_categories
                .iter()
                .take(3)
                .map(|c| format!("{} ({}%)", c.category, c.share_pct))
                .collect();
            format!("- {}: leading categories are {}", store, parts.join(", "))
        }
        _ => format!("- {}: insufficient category information", store),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::{CategoryDifference, CategoryShare, StoreEvidence};
    use std::collections::BTreeMap;

    fn sample_evidence() -> ComparisonEvidence {
        let mut stores = BTreeMap::new();
        stores.insert(
            "恵比寿".to_string(),
            StoreEvidence {
                total: 800.0,
                top_categories: vec![CategoryShare {
                    category: "レディース トップス".to_string(),
                    value: 500.0,
                    share_pct: 62.5,
                }],
            },
        );
        stores.insert(
            "横浜元町".to_string(),
            StoreEvidence {
                total: 1110.0,
                top_categories: vec![],
            },
        );
        ComparisonEvidence {
            stores,
            differences: vec![CategoryDifference {
                category: "レディース トップス".to_string(),
                store_a: 500.0,
                store_b: 1000.0,
                difference: -500.0,
            }],
        }
    }

    #[test]
    fn test_template_narrative_is_deterministic() {
        let evidence = sample_evidence();
        let gen = TemplateNarrative;
        let first = gen.generate("恵比寿", "横浜元町", &evidence).unwrap();
        let second = gen.generate("恵比寿", "横浜元町", &evidence).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_template_narrative_sections_and_content() {
        let summary = TemplateNarrative
            .generate("恵比寿", "横浜元町", &sample_evidence())
            .unwrap();
        assert!(summary.contains("## Trends"));
        assert!(summary.contains("## Differences"));
        assert!(summary.contains("## Recommendations"));
        assert!(summary.contains("レディース トップス (62.5%)"));
        assert!(summary.contains("insufficient category information"));
        assert!(summary.contains("difference -500"));
    }

    #[test]
    fn test_template_narrative_without_differences() {
        let mut evidence = sample_evidence();
        evidence.differences.clear();
        let summary = TemplateNarrative
            .generate("恵比寿", "横浜元町", &evidence)
            .unwrap();
        assert!(summary.contains("No notable differences"));
    }
}
