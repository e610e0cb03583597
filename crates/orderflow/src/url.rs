//! URL patterns and identifier capture.
//!
//! Patterns gate navigation waits (`**/order/**`, `main\.aspx.*dashboard`)
//! and filter newly opened popups. Capture helpers are pure functions over
//! a URL or grid text: no match yields an empty string, never an error.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pattern for matching page URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
    /// Glob pattern (e.g., "**/order/**")
    Glob(String),
    /// Match any URL
    #[default]
    Any,
}

impl UrlPattern {
    /// Create a glob pattern
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// Create a regex pattern
    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex(pattern.into())
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern.as_str()),
            Self::Contains(pattern) => url.contains(pattern.as_str()),
            Self::Regex(pattern) => Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Glob(pattern) => glob_matches(pattern, url),
            Self::Any => true,
        }
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(s) | Self::Prefix(s) | Self::Contains(s) | Self::Regex(s) | Self::Glob(s) => {
                write!(f, "{s}")
            }
            Self::Any => write!(f, "*"),
        }
    }
}

/// Simple glob matching: `*` spans any run of characters.
///
/// The first segment is anchored at the start and the last at the end;
/// segments in between match at their leftmost occurrence.
fn glob_matches(pattern: &str, url: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return url == pattern;
    };
    let Some(rest) = url.strip_prefix(first) else {
        return false;
    };
    let Some(mut rest) = rest.strip_suffix(last) else {
        return false;
    };
    for part in middle.iter().filter(|p| !p.is_empty()) {
        let Some(found) = rest.find(part) else {
            return false;
        };
        rest = &rest[found + part.len()..];
    }
    true
}

// =============================================================================
// IDENTIFIER CAPTURE
// =============================================================================

/// Pattern locating the order number in an order page URL
pub const ORDER_NUMBER_PATTERN: &str = r"(?i)/order/(\d+)";

/// Pattern locating the job number in job grid text
pub const JOB_NUMBER_PATTERN: &str = r"\d{4,}";

/// Capture the first match of `pattern` in `text`.
///
/// Returns capture group 1 when the pattern has one, the whole match
/// otherwise, and an empty string when nothing matches.
#[must_use]
pub fn capture_first(pattern: &str, text: &str) -> String {
    let Ok(re) = Regex::new(pattern) else {
        return String::new();
    };
    re.captures(text)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Order number from an order page URL (`.../order/12345` -> `12345`)
#[must_use]
pub fn order_number_from_url(url: &str) -> String {
    capture_first(ORDER_NUMBER_PATTERN, url)
}

/// Job number from job grid text: the first run of four or more digits
#[must_use]
pub fn job_number_from_grid(text: &str) -> String {
    capture_first(JOB_NUMBER_PATTERN, text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod pattern_tests {
        use super::*;

        #[test]
        fn test_order_glob() {
            let pattern = UrlPattern::glob("**/order/**");
            assert!(pattern.matches("https://navigator.example.com/#/order/98765"));
            assert!(!pattern.matches("https://navigator.example.com/#/orderNew/1145/x"));
        }

        #[test]
        fn test_dashboard_regex() {
            let pattern = UrlPattern::regex(r"main\.aspx.*dashboard");
            assert!(pattern.matches("https://crm.example.com/main.aspx?pagetype=dashboard&id=1"));
            assert!(!pattern.matches("https://crm.example.com/main.aspx?pagetype=entitylist"));
        }

        #[test]
        fn test_invalid_regex_never_matches() {
            assert!(!UrlPattern::regex("(").matches("anything"));
        }

        #[test]
        fn test_glob_anchors_first_segment() {
            let pattern = UrlPattern::glob("https://crm*");
            assert!(pattern.matches("https://crm.example.com"));
            assert!(!pattern.matches("http://https://crm"));
        }

        #[test]
        fn test_glob_anchors_last_segment() {
            assert!(UrlPattern::glob("a*b").matches("abab"));
            assert!(UrlPattern::glob("*/jobs").matches("https://x/jobs/1/jobs"));
            assert!(!UrlPattern::glob("a*b").matches("abba!"));
        }

        #[test]
        fn test_glob_segments_do_not_overlap() {
            assert!(!UrlPattern::glob("ab*ba").matches("aba"));
            assert!(UrlPattern::glob("ab*ba").matches("abba"));
        }

        #[test]
        fn test_glob_without_wildcard_is_exact() {
            assert!(UrlPattern::glob("https://x/order").matches("https://x/order"));
            assert!(!UrlPattern::glob("https://x/order").matches("https://x/order/1"));
        }

        #[test]
        fn test_any_and_display() {
            assert!(UrlPattern::Any.matches(""));
            assert_eq!(UrlPattern::default().to_string(), "*");
            assert_eq!(UrlPattern::glob("**/order/**").to_string(), "**/order/**");
        }
    }

    mod capture_tests {
        use super::*;

        #[test]
        fn test_order_number_from_url() {
            assert_eq!(
                order_number_from_url("https://navigator.example.com/#/order/12345"),
                "12345"
            );
        }

        #[test]
        fn test_order_number_case_insensitive() {
            assert_eq!(order_number_from_url("https://x/#/ORDER/777/jobs"), "777");
        }

        #[test]
        fn test_non_matching_url_is_empty() {
            assert_eq!(order_number_from_url("https://x/#/orderNew/1145/abc"), "");
            assert_eq!(order_number_from_url(""), "");
        }

        #[test]
        fn test_job_number_first_long_digit_run() {
            let grid = "Job 12 Room A 334455 Ballroom 998877";
            assert_eq!(job_number_from_grid(grid), "334455");
        }

        #[test]
        fn test_job_number_absent() {
            assert_eq!(job_number_from_grid("Job 12 Room 345"), "");
        }

        #[test]
        fn test_capture_bad_pattern_is_empty() {
            assert_eq!(capture_first("(", "text"), "");
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_order_number_recovered(n in 0u64..u64::MAX, prefix in "[a-z]{1,10}") {
                let url = format!("https://{prefix}.example.com/#/order/{n}");
                prop_assert_eq!(order_number_from_url(&url), n.to_string());
            }

            #[test]
            fn prop_glob_matches_its_own_pieces(
                head in "[a-z/]{0,6}",
                mid in "[a-z/]{0,6}",
                tail in "[a-z/]{0,6}",
            ) {
                let url = format!("{head}{mid}{tail}");
                let pattern = format!("{head}*{tail}");
                prop_assert!(UrlPattern::glob(pattern).matches(&url));
            }

            #[test]
            fn prop_capture_never_panics(text in ".*") {
                let order = order_number_from_url(&text);
                let job = job_number_from_grid(&text);
                prop_assert!(order.chars().all(char::is_numeric));
                prop_assert!(job.is_empty() || job.len() >= 4);
            }
        }
    }
}
