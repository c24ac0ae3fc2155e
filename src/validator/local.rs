use std::sync::LazyLock;

use regex::Regex;

static LOCAL_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+$").expect("local part pattern compiles")
});

/// Conservative local part: `[a-z0-9._%+-]`, no leading/trailing '.', no "..".
/// Expects a lower-cased input.
pub(crate) fn check_local(local: &str, reasons: &mut Vec<String>) {
    if local.is_empty() || local.len() > 64 {
        reasons.push(format!(
            "local part length {} invalid (1..=64)",
            local.len()
        ));
        return;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        reasons.push("local part has misplaced '.'".to_string());
    }
    if !LOCAL_PART.is_match(local) {
        reasons.push(format!("local part '{local}' has invalid chars"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(local: &str) -> bool {
        let mut reasons = vec![];
        check_local(local, &mut reasons);
        reasons.is_empty()
    }

    #[test]
    fn dots() {
        assert!(!ok(".abc"));
        assert!(!ok("abc."));
        assert!(!ok("a..b"));
        assert!(ok("a.b"));
    }

    #[test]
    fn punctuation_is_bounded() {
        assert!(ok("first.last+tag_1%x-y"));
        assert!(!ok("a!b"));
        assert!(!ok("\"quoted\""));
        assert!(!ok(&"a".repeat(65)));
    }
}
