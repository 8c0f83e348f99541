//! Label-based resource exclusion

use std::collections::HashMap;

use tracing::debug;

/// Whether a resource should be skipped based on its labels.
///
/// An empty value in the exclusion map means "match any resource that has
/// this key"; a non-empty value must match exactly. Any single match
/// excludes the resource.
pub fn excluded_by_labels(
    resource_labels: &HashMap<String, String>,
    exclude_labels: &HashMap<String, String>,
) -> bool {
    if exclude_labels.is_empty() {
        return false;
    }
    for (key, value) in exclude_labels {
        match resource_labels.get(key) {
            Some(found) if value.is_empty() => {
                debug!(key = %key, value = %found, "Excluding resource by label key");
                return true;
            }
            Some(found) if found == value => {
                debug!(key = %key, value = %value, "Excluding resource by label");
                return true;
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_exclusions_match_nothing() {
        let resource = labels(&[("env", "prod")]);
        assert!(!excluded_by_labels(&resource, &HashMap::new()));
    }

    #[test]
    fn test_key_only_matches_any_value() {
        let exclude = labels(&[("env", "")]);
        assert!(excluded_by_labels(&labels(&[("env", "prod")]), &exclude));
        assert!(excluded_by_labels(&labels(&[("env", "dev")]), &exclude));
        assert!(!excluded_by_labels(&labels(&[("team", "core")]), &exclude));
    }

    #[test]
    fn test_exact_value_match() {
        let exclude = labels(&[("env", "prod")]);
        assert!(excluded_by_labels(&labels(&[("env", "prod")]), &exclude));
        assert!(!excluded_by_labels(&labels(&[("env", "staging")]), &exclude));
        assert!(!excluded_by_labels(&HashMap::new(), &exclude));
    }

    #[test]
    fn test_any_single_filter_excludes() {
        let exclude = labels(&[("env", "prod"), ("keep", "")]);
        assert!(excluded_by_labels(&labels(&[("keep", "yes")]), &exclude));
        assert!(excluded_by_labels(&labels(&[("env", "prod")]), &exclude));
        assert!(!excluded_by_labels(&labels(&[("env", "dev")]), &exclude));
    }
}
