//! Device-identifier extraction from query text.

use regex::Regex;
use std::sync::OnceLock;

static DEVICE_RE: OnceLock<Regex> = OnceLock::new();

fn device_re() -> &'static Regex {
    DEVICE_RE.get_or_init(|| {
        Regex::new(r"(?i)(Pi-\d{3}|device\s+\d{3})").expect("device pattern is valid")
    })
}

/// Scan the query for a device-identifier pattern ("Pi-001" or
/// "device 001"). The match is case-insensitive but the capture keeps the
/// original casing, since device ids are stored verbatim.
pub fn extract_device_filter(query: &str) -> Option<String> {
    device_re()
        .find(query)
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pi_pattern() {
        assert_eq!(
            extract_device_filter("what did Pi-001 see last night?"),
            Some("Pi-001".to_string())
        );
    }

    #[test]
    fn test_device_word_pattern() {
        assert_eq!(
            extract_device_filter("reports from device 042"),
            Some("device 042".to_string())
        );
    }

    #[test]
    fn test_case_preserving_capture() {
        assert_eq!(
            extract_device_filter("anything from pi-003?"),
            Some("pi-003".to_string())
        );
    }

    #[test]
    fn test_first_match_only() {
        assert_eq!(
            extract_device_filter("compare Pi-001 with Pi-002"),
            Some("Pi-001".to_string())
        );
    }

    #[test]
    fn test_no_device_mentioned() {
        assert_eq!(extract_device_filter("how many detections today?"), None);
        // Short numeric codes only; "Pi-1" is not a device id.
        assert_eq!(extract_device_filter("check Pi-1"), None);
    }
}
