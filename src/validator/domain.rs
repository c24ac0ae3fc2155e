use std::sync::LazyLock;

use regex::Regex;

static DOMAIN_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9-]+\.)+[a-z]{2,}$").expect("domain pattern compiles")
});

/// Dot-separated `[a-z0-9-]` labels, final label alphabetic (>= 2 chars).
/// Pushes invalidating reasons into `reasons`; expects a lower-cased input.
pub(crate) fn check_domain(domain: &str, reasons: &mut Vec<String>) {
    if domain.is_empty() || domain.len() > 253 {
        reasons.push(format!(
            "domain length {} invalid (1..=253)",
            domain.len()
        ));
        return;
    }

    if !DOMAIN_PART.is_match(domain) {
        reasons.push(format!("domain '{domain}' does not match label rules"));
        return;
    }

    for label in domain.split('.') {
        if label.len() > 63 {
            reasons.push(format!(
                "domain label '{}' length {} > 63",
                label,
                label.len()
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            reasons.push(format!(
                "domain label '{}' cannot start/end with '-'",
                label
            ));
        }
    }
}
