//! OID utilities and poll-time expansion
//!
//! Elenos ETG agents answer some objects under the scalar `.0` form and
//! some under per-exciter instance indices, depending on firmware. The
//! expansion below widens a configured OID set so a single GET covers all
//! the shapes, and force-adds the core metric bases whenever anything from
//! the Elenos enterprise tree is configured at all.

use std::collections::HashSet;

/// Enterprise subtree prefix for Elenos equipment.
pub const ELENOS_PREFIX: &str = "1.3.6.1.4.1.31946.";

/// Metric bases that gain instance-index fan-out.
pub const ELENOS_METRIC_BASES: &[&str] = &[
    "1.3.6.1.4.1.31946.4.2.6.10.1",
    "1.3.6.1.4.1.31946.4.2.6.10.2",
    "1.3.6.1.4.1.31946.4.2.6.10.12",
    "1.3.6.1.4.1.31946.4.2.6.10.13",
    "1.3.6.1.4.1.31946.4.2.6.10.14",
];

/// Bases always polled when any Elenos OID is configured, so frequency and
/// status arrive even from a misconfigured OID list.
pub const ELENOS_CORE_BASES: &[&str] = &[
    "1.3.6.1.4.1.31946.4.2.6.10.1",
    "1.3.6.1.4.1.31946.4.2.6.10.2",
    "1.3.6.1.4.1.31946.4.2.6.10.12",
    "1.3.6.1.4.1.31946.4.2.6.10.14",
];

const INSTANCE_MAX: u32 = 4;

/// True for a non-empty dotted-decimal OID string.
pub fn is_valid_oid(s: &str) -> bool {
    let trimmed = s.trim();
    !trimmed.is_empty()
        && trimmed
            .split('.')
            .all(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()))
}

/// Strip a single trailing numeric component (an instance index, including
/// the scalar `.0`). A non-numeric trailing segment is left intact.
pub fn strip_instance(oid: &str) -> &str {
    match oid.rsplit_once('.') {
        Some((head, last)) if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => oid,
    }
}

fn strip_trailing_zero(oid: &str) -> &str {
    oid.strip_suffix(".0").unwrap_or(oid)
}

/// The Elenos metric base a (possibly suffixed) OID belongs to, if any.
fn elenos_base_of(oid: &str) -> Option<&'static str> {
    let candidates = [oid, strip_trailing_zero(oid), strip_instance(oid)];
    for candidate in candidates {
        if let Some(base) = ELENOS_METRIC_BASES.iter().find(|b| **b == candidate) {
            return Some(base);
        }
    }
    None
}

/// True when the OID is `base.k` for a metric base and 1 <= k <= 4. Such
/// forms never get a `.0` twin, which keeps expansion idempotent.
fn is_elenos_indexed(oid: &str) -> bool {
    match oid.rsplit_once('.') {
        Some((head, last)) => match last.parse::<u32>() {
            Ok(k) if (1..=INSTANCE_MAX).contains(&k) => {
                ELENOS_METRIC_BASES.contains(&head)
            }
            _ => false,
        },
        None => false,
    }
}

/// Expand a configured OID set into the wire OID list for one GET.
///
/// The result is a superset of the input (modulo trimming) and expanding an
/// already-expanded list is a no-op as a set.
pub fn expand_oids(configured: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    fn push(out: &mut Vec<String>, seen: &mut HashSet<String>, oid: String) {
        if seen.insert(oid.clone()) {
            out.push(oid);
        }
    }

    let cleaned: Vec<&str> = configured
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect();

    let elenos_present = cleaned.iter().any(|o| o.starts_with(ELENOS_PREFIX));

    for oid in &cleaned {
        push(&mut out, &mut seen, oid.to_string());
        if !oid.ends_with(".0") && !is_elenos_indexed(oid) {
            push(&mut out, &mut seen, format!("{oid}.0"));
        }
    }

    // Instance fan-out for every configured metric base.
    for oid in &cleaned {
        if let Some(base) = elenos_base_of(oid) {
            for k in 1..=INSTANCE_MAX {
                push(&mut out, &mut seen, format!("{base}.{k}"));
            }
        }
    }

    // Anything Elenos at all forces the core bases in, in every shape.
    if elenos_present {
        for base in ELENOS_CORE_BASES {
            push(&mut out, &mut seen, (*base).to_string());
            push(&mut out, &mut seen, format!("{base}.0"));
            for k in 1..=INSTANCE_MAX {
                push(&mut out, &mut seen, format!("{base}.{k}"));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn as_set(v: &[String]) -> BTreeSet<String> {
        v.iter().cloned().collect()
    }

    #[test]
    fn test_strip_instance() {
        assert_eq!(strip_instance("1.3.6.1.2.1.1.1.0"), "1.3.6.1.2.1.1.1");
        assert_eq!(strip_instance("1.3.6.1.4.1.31946.4.2.6.10.1.3"), "1.3.6.1.4.1.31946.4.2.6.10.1");
        assert_eq!(strip_instance("iso.org"), "iso.org");
        assert_eq!(strip_instance("7"), "7");
    }

    #[test]
    fn test_is_valid_oid() {
        assert!(is_valid_oid("1.3.6.1.2.1.1.3.0"));
        assert!(is_valid_oid(" 1.3.6 "));
        assert!(!is_valid_oid(""));
        assert!(!is_valid_oid("1..3"));
        assert!(!is_valid_oid("1.3.x"));
    }

    #[test]
    fn test_expansion_is_monotone() {
        let configured = vec![
            "1.3.6.1.4.1.31946.4.2.6.10.1".to_string(),
            "1.3.6.1.2.1.1.5.0".to_string(),
        ];
        let expanded = expand_oids(&configured);
        let set = as_set(&expanded);
        for oid in &configured {
            assert!(set.contains(oid), "missing configured oid {oid}");
        }
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let configured = vec![
            "1.3.6.1.4.1.31946.4.2.6.10.13".to_string(),
            "1.3.6.1.2.1.1.1".to_string(),
        ];
        let once = expand_oids(&configured);
        let twice = expand_oids(&once);
        assert_eq!(as_set(&once), as_set(&twice));
    }

    #[test]
    fn test_elenos_base_fans_out_instances_and_scalar() {
        let expanded = expand_oids(&["1.3.6.1.4.1.31946.4.2.6.10.1".to_string()]);
        let set = as_set(&expanded);
        assert!(set.contains("1.3.6.1.4.1.31946.4.2.6.10.1.0"));
        for k in 1..=4 {
            assert!(set.contains(&format!("1.3.6.1.4.1.31946.4.2.6.10.1.{k}")));
        }
    }

    #[test]
    fn test_any_elenos_oid_forces_core_bases() {
        // Only the radio-name object is configured; frequency and status
        // must still end up on the wire.
        let expanded = expand_oids(&["1.3.6.1.4.1.31946.3.1.7.0".to_string()]);
        let set = as_set(&expanded);
        assert!(set.contains("1.3.6.1.4.1.31946.4.2.6.10.14.0"));
        assert!(set.contains("1.3.6.1.4.1.31946.4.2.6.10.12.0"));
        assert!(set.contains("1.3.6.1.4.1.31946.4.2.6.10.1.2"));
    }

    #[test]
    fn test_non_elenos_oids_stay_narrow() {
        let expanded = expand_oids(&["1.3.6.1.2.1.1.3".to_string()]);
        assert_eq!(
            as_set(&expanded),
            as_set(&["1.3.6.1.2.1.1.3".to_string(), "1.3.6.1.2.1.1.3.0".to_string()])
        );
    }

    #[test]
    fn test_blank_entries_dropped() {
        let expanded = expand_oids(&["  ".to_string(), "1.3.6.1.2.1.1.5.0".to_string()]);
        assert_eq!(expanded, vec!["1.3.6.1.2.1.1.5.0".to_string()]);
    }
}
