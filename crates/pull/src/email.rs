//! Notification address validation.
//!
//! Deliberately permissive: the same pattern the web frontend checks before
//! submitting, enforced again here because the frontend is optional.

use crate::error::{ErrorKind, Result};
use regex::Regex;
use std::sync::LazyLock;

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-z\-0-9]+\.)+[a-z]{2,}))$"#,
    )
    .unwrap()
});

pub fn is_valid(address: &str) -> bool {
    ADDRESS.is_match(address)
}

/// `None` and blank addresses mean "don't notify"; anything else must be
/// valid.
pub fn normalize(address: Option<&str>) -> Result<Option<String>> {
    match address.map(str::trim) {
        None | Some("") => Ok(None),
        Some(address) if is_valid(address) => Ok(Some(address.to_string())),
        Some(address) => exn::bail!(ErrorKind::InvalidRequest(format!("invalid email address: {address}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("someone@example.org")]
    #[case("Some.One@Example.ORG")]
    #[case("first.last+tag@sub.example.co.uk")]
    #[case("\"quoted name\"@example.org")]
    #[case("root@[192.168.0.1]")]
    fn test_valid(#[case] address: &str) {
        assert!(is_valid(address));
    }

    #[rstest]
    #[case("someone")]
    #[case("someone@")]
    #[case("@example.org")]
    #[case("someone@example")]
    #[case("some one@example.org")]
    #[case("someone@example.o")]
    #[case("a..b@example.org")]
    #[case("someone@example.org\nBcc: everyone@example.org")]
    fn test_invalid(#[case] address: &str) {
        assert!(!is_valid(address));
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), None)]
    #[case(Some("   "), None)]
    #[case(Some(" someone@example.org "), Some("someone@example.org"))]
    fn test_normalize(#[case] input: Option<&str>, #[case] expected: Option<&str>) {
        assert_eq!(normalize(input).unwrap().as_deref(), expected);
    }

    #[test]
    fn test_normalize_invalid() {
        let err = normalize(Some("not-an-address")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRequest(_)));
    }
}
