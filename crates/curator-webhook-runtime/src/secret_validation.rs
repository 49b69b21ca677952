//! Shared-secret gate for the webhook intake path.

/// Header carrying the caller-supplied webhook credential.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Returns true when the caller-supplied credential matches the configured
/// secret. Fails closed: a missing configuration or a missing header rejects
/// the request before anything is parsed.
pub fn validate_webhook_secret(provided: Option<&str>, configured: Option<&str>) -> bool {
    let Some(configured) = configured.map(str::trim).filter(|value| !value.is_empty()) else {
        return false;
    };
    let Some(provided) = provided.map(str::trim).filter(|value| !value.is_empty()) else {
        return false;
    };
    // Plain comparison mirrors the upstream contract; constant-time matching
    // is tracked as a hardening follow-up in DESIGN.md.
    provided == configured
}

#[cfg(test)]
mod tests {
    use super::validate_webhook_secret;

    #[test]
    fn accepts_exact_match_only() {
        assert!(validate_webhook_secret(Some("s3cret"), Some("s3cret")));
        assert!(!validate_webhook_secret(Some("S3CRET"), Some("s3cret")));
        assert!(!validate_webhook_secret(Some("wrong"), Some("s3cret")));
    }

    #[test]
    fn rejects_missing_header_or_configuration() {
        assert!(!validate_webhook_secret(None, Some("s3cret")));
        assert!(!validate_webhook_secret(Some("s3cret"), None));
        assert!(!validate_webhook_secret(Some(""), Some("s3cret")));
        assert!(!validate_webhook_secret(Some("s3cret"), Some("   ")));
    }

    #[test]
    fn trims_surrounding_whitespace_before_comparing() {
        assert!(validate_webhook_secret(Some(" s3cret "), Some("s3cret")));
    }
}
