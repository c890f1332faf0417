use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::ClassificationDetail;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    pub count: usize,
    pub score_sum: f64,
}

pub fn aggregate(details: &[ClassificationDetail]) -> BTreeMap<String, CategoryStats> {
    let mut summary = BTreeMap::<String, CategoryStats>::new();
    for detail in details {
        let stats = summary.entry(detail.category.clone()).or_default();
        stats.count += 1;
        stats.score_sum += detail.score;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(gene: &str, category: &str, score: f64) -> ClassificationDetail {
        ClassificationDetail {
            gene: gene.to_string(),
            category: category.to_string(),
            score,
        }
    }

    #[test]
    fn groups_by_category() {
        let details = vec![
            detail("invA", "invasion", 6.0),
            detail("sipB", "invasion", 4.5),
            detail("xyz", "not classified", 0.0),
        ];
        let summary = aggregate(&details);
        assert_eq!(summary.len(), 2);
        assert_eq!(
            summary["invasion"],
            CategoryStats {
                count: 2,
                score_sum: 10.5
            }
        );
        assert_eq!(summary["not classified"].count, 1);
    }

    #[test]
    fn empty_details_give_empty_summary() {
        assert!(aggregate(&[]).is_empty());
    }
}
