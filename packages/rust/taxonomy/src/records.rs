//! Bundled static insight records.
//!
//! These records (raw nested mappings included) feed the category tree
//! visualization; the loader runs every record through the normalizer so
//! malformed bundled data fails loudly at load time rather than at render.

use optdesk_shared::{Insight, RawInsight, Result};

const INSIGHT_RECORDS: &str = include_str!("../data/insight_records.json");

/// Load and normalize the bundled insight records.
pub fn insight_records() -> Result<Vec<Insight>> {
    let raw: Vec<RawInsight> = serde_json::from_str(INSIGHT_RECORDS)
        .map_err(|e| optdesk_shared::OptdeskError::decode(format!("insight_records.json: {e}")))?;

    raw.iter().map(crate::normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_records_all_normalize() {
        let records = insight_records().expect("bundled records must flatten");
        assert!(!records.is_empty());

        for insight in &records {
            assert!(!insight.taxonomy_path.is_empty());
            // Paths are fully flattened: no mapping or list syntax survives.
            assert!(!insight.taxonomy_path.contains('{'));
            assert!(!insight.taxonomy_path.contains('['));
        }
    }

    #[test]
    fn bundled_records_cover_known_categories() {
        let records = insight_records().unwrap();
        let categories: std::collections::BTreeSet<&str> =
            records.iter().map(|i| i.category.as_str()).collect();
        assert!(categories.contains("domain"));
        assert!(categories.contains("formulation"));
        assert!(categories.contains("code"));
    }
}
