//! Address syntax helpers shared by the email handler and its config checks.

use email_address::EmailAddress;

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Splits an address into `(local_part, domain)` at the last `@`.
pub fn email_parts(value: &str) -> Option<(&str, &str)> {
    value.rsplit_once('@').filter(|(local, domain)| !local.is_empty() && !domain.is_empty())
}

/// Normalises a domain for comparison: lowercase, no leading `@`, no trailing dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('@').trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("two@@example.com"));
    }

    #[test]
    fn email_parts_split_on_last_at() {
        assert_eq!(email_parts("jane@example.com"), Some(("jane", "example.com")));
        assert_eq!(email_parts("@example.com"), None);
        assert_eq!(email_parts("jane@"), None);
    }

    #[test]
    fn domains_normalize() {
        assert_eq!(normalize_domain(" @Example.COM. "), "example.com");
    }
}
