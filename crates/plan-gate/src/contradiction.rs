//! Contradiction detection.
//!
//! Two invariants contradict when they share `(entity, predicate_key)` but
//! carry values that differ under canonicalization. Contradictions are
//! diagnostics: they never fail a plan on their own.

use std::collections::HashMap;

use plan_gate_canonical::canonical_string;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::Invariant;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub entity: String,
    pub predicate_key: String,
    /// Distinct values in first-seen order.
    pub values: Vec<Value>,
}

/// Groups in first-seen order; only groups with two or more distinct values
/// are returned.
pub fn detect_contradictions(invariants: &[Invariant]) -> Vec<Contradiction> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<(Contradiction, Vec<String>)> = Vec::new();

    for inv in invariants {
        let key = (inv.entity.as_str(), inv.predicate_key.as_str());
        let canonical = canonical_string(&inv.value).unwrap_or_else(|_| inv.value.to_string());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((
                Contradiction {
                    entity: inv.entity.clone(),
                    predicate_key: inv.predicate_key.clone(),
                    values: Vec::new(),
                },
                Vec::new(),
            ));
            groups.len() - 1
        });
        let (group, seen) = &mut groups[slot];
        if !seen.contains(&canonical) {
            seen.push(canonical);
            group.values.push(inv.value.clone());
        }
    }

    groups
        .into_iter()
        .filter(|(group, _)| group.values.len() > 1)
        .map(|(group, _)| group)
        .collect()
}
