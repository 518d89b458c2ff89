use std::collections::BTreeSet;

/// Jaccard similarity of two tag sets scaled to [0, 100].
///
/// Tags match by exact name. Two empty sets score 0.
pub fn compatibility_score(tags_a: &BTreeSet<String>, tags_b: &BTreeSet<String>) -> f64 {
    let common = tags_a.intersection(tags_b).count();
    let union = tags_a.len() + tags_b.len() - common;
    if union == 0 {
        return 0.0;
    }
    common as f64 / union as f64 * 100.0
}
