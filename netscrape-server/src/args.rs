//! Translation of query parameters into scrape arguments.

/// Query parameter that selects the JSON diagnostic body. Never forwarded.
pub const DEBUG_PARAM: &str = "debug";

/// Whether `text` may be forwarded to a scrape: non-empty, and only ASCII
/// alphanumerics or `-_.,:`.
pub fn is_allowed(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ',' | ':'))
}

/// What a scrape request asks for, once its query has been filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub debug: bool,
    pub args: Vec<String>,
}

impl ScrapeRequest {
    /// Build the request from query pairs, in order.
    ///
    /// `?target=rack-sw01` becomes `--target rack-sw01`. Pairs whose name or
    /// value fails [`is_allowed`] are dropped without notice.
    pub fn from_query(pairs: &[(String, String)]) -> Self {
        let mut request = Self::default();

        for (name, value) in pairs {
            if name == DEBUG_PARAM {
                request.debug = true;
                continue;
            }

            if !is_allowed(name) || !is_allowed(value) {
                tracing::debug!(name = %name, "Dropping query parameter");
                continue;
            }

            if name.starts_with('-') {
                request.args.push(name.clone());
            } else {
                request.args.push(format!("--{}", name));
            }
            request.args.push(value.clone());
        }

        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_allowed_characters() {
        assert!(is_allowed("rack-sw01"));
        assert!(is_allowed("10.0.0.1:22,a_b"));
        assert!(!is_allowed(""));
        assert!(!is_allowed("rack sw01"));
        assert!(!is_allowed("x;reboot"));
        assert!(!is_allowed("$(id)"));
    }

    #[test]
    fn test_target_is_forwarded_unchanged() {
        let request = ScrapeRequest::from_query(&pairs(&[("target", "rack-sw01")]));

        assert_eq!(request.args, vec!["--target", "rack-sw01"]);
        assert!(!request.debug);
    }

    #[test]
    fn test_unsafe_values_are_dropped() {
        let request = ScrapeRequest::from_query(&pairs(&[
            ("target", "rack sw01"),
            ("target", "sw01;reboot"),
            ("bad name", "x"),
            ("empty", ""),
            ("limit", "5"),
        ]));

        assert_eq!(request.args, vec!["--limit", "5"]);
    }

    #[test]
    fn test_debug_is_never_forwarded() {
        let request = ScrapeRequest::from_query(&pairs(&[("target", "sw01"), ("debug", "")]));

        assert!(request.debug);
        assert_eq!(request.args, vec!["--target", "sw01"]);
    }

    #[test]
    fn test_dashed_names_keep_their_prefix() {
        let request = ScrapeRequest::from_query(&pairs(&[("-v", "1")]));
        assert_eq!(request.args, vec!["-v", "1"]);
    }
}
