mod domain;
mod local;

use domain::check_domain;
use local::check_local;

use crate::cell::CellValue;

/// Maximum overall address length (RFC 5321 path limit minus brackets).
pub const MAX_ADDRESS_LEN: usize = 254;

/// Syntactic check of a cell. Anything that is not text is invalid.
pub fn is_valid_format(value: &CellValue) -> bool {
    value.as_text().is_some_and(is_valid_email)
}

/// Syntactic check of an address string (trimmed, compared lower-cased).
pub fn is_valid_email(email: &str) -> bool {
    format_reasons(email).is_empty()
}

/// Returns every rule the address breaks; empty means the format is valid.
pub fn format_reasons(email: &str) -> Vec<String> {
    let input = email.trim().to_lowercase();

    let mut reasons = Vec::new();

    if input.len() > MAX_ADDRESS_LEN {
        reasons.push(format!("total length {} > {MAX_ADDRESS_LEN}", input.len()));
    }

    let parts: Vec<&str> = input.split('@').collect();
    if parts.len() != 2 {
        reasons.push("must contain exactly one '@'".to_string());
        return reasons;
    }
    let (local, domain) = (parts[0], parts[1]);

    check_local(local, &mut reasons);
    check_domain(domain, &mut reasons);

    reasons
}

/// Splits a trimmed address into `(local, domain)` at its single '@'.
pub fn split_address(email: &str) -> Option<(&str, &str)> {
    let (local, domain) = email.trim().split_once('@')?;
    if domain.contains('@') {
        return None;
    }
    Some((local, domain))
}
