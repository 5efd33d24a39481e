//! State snapshot comparison
//!
//! Two snapshots differ unless they hold the same keys and every value is
//! loosely equal (see [`StateValue::loosely_eq`]). A key present on only one
//! side always counts as a difference.

use facetkit_types::{StateSnapshot, StateValue};

/// True iff the two snapshots are not equal over their own keys
pub fn state_diff(a: &StateSnapshot, b: &StateSnapshot) -> bool {
    one_sided_diff(a, b) || one_sided_diff(b, a)
}

/// Does any entry of `a` lack an equal counterpart in `b`?
fn one_sided_diff(a: &StateSnapshot, b: &StateSnapshot) -> bool {
    a.iter().any(|(key, va)| match b.get(key) {
        Some(vb) => !va.loosely_eq(vb),
        None => {
            tracing::trace!(key = %key, "state key missing on one side");
            true
        }
    })
}

/// Keys whose values differ between the two snapshots, in key order
pub fn changed_keys(a: &StateSnapshot, b: &StateSnapshot) -> Vec<String> {
    let mut keys: Vec<String> = a
        .keys()
        .chain(b.keys())
        .filter(|key| !values_match(a.get(key), b.get(key)))
        .cloned()
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn values_match(a: Option<&StateValue>, b: Option<&StateValue>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.loosely_eq(b),
        (None, None) => true,
        _ => false,
    }
}
