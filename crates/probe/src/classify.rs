use tenantprobe_core::{ProbeOutcome, RawResult};

/// The credential-type lookup found zero obstacles for this username, i.e.
/// the account exists and is not federated away from this check.
pub const EXISTS_MARKER: &str = "\"IfExistsResult\":0,";

/// The remote associated throttle state with our apparent network origin.
pub const THROTTLE_MARKER: &str = "\"ThrottleStatus\":1,";

/// Interpret one raw probe result. Pure function: substring checks against
/// the two literal markers, tolerating any other response shape. A body that
/// matches neither marker is a plain Invalid, never an error; only transport
/// failures produce an errored outcome.
///
/// A throttled response always discards its embedded validity reading. The
/// throttle state taints the lookup, so the reading is never trusted to
/// shortcut a retry.
pub fn classify(raw: RawResult) -> ProbeOutcome {
    match raw {
        Err(failure) => ProbeOutcome::transport_failure(failure.to_string()),
        Ok(body) => {
            if body.contains(THROTTLE_MARKER) {
                ProbeOutcome::throttled()
            } else if body.contains(EXISTS_MARKER) {
                ProbeOutcome::valid()
            } else {
                ProbeOutcome::invalid()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantprobe_core::{ProbeError, Validity};

    #[test]
    fn exists_marker_is_valid() {
        let body = r#"{"Username":"a@b.com","IfExistsResult":0,"ThrottleStatus":0,"Credentials":{}}"#;
        let outcome = classify(Ok(body.to_string()));
        assert_eq!(outcome.validity, Validity::Valid);
        assert!(outcome.is_terminal());
    }

    #[test]
    fn no_marker_is_invalid() {
        let body = r#"{"Username":"a@b.com","IfExistsResult":1,"ThrottleStatus":0,"Credentials":{}}"#;
        let outcome = classify(Ok(body.to_string()));
        assert_eq!(outcome.validity, Validity::Invalid);
        assert!(outcome.is_terminal());
    }

    #[test]
    fn throttle_marker_overrides_validity_reading() {
        // Exists marker present too, but the throttle reading wins.
        let body = r#"{"IfExistsResult":0,"ThrottleStatus":1,"Credentials":{}}"#;
        let outcome = classify(Ok(body.to_string()));
        assert_eq!(outcome.validity, Validity::Unknown);
        assert!(outcome.throttled);
        assert!(!outcome.is_errored());
    }

    #[test]
    fn transport_failure_is_errored_not_throttled() {
        let outcome = classify(Err(ProbeError::Connect("connection refused".into())));
        assert_eq!(outcome.validity, Validity::Unknown);
        assert!(!outcome.throttled);
        assert_eq!(outcome.cause.as_deref(), Some("connect error: connection refused"));
    }

    #[test]
    fn malformed_body_is_invalid_not_error() {
        for body in ["", "<html>sign in</html>", "not json at all"] {
            let outcome = classify(Ok(body.to_string()));
            assert_eq!(outcome.validity, Validity::Invalid);
            assert!(outcome.is_terminal());
        }
    }

    #[test]
    fn classification_is_idempotent() {
        let body = r#"{"IfExistsResult":0,"ThrottleStatus":0}"#.to_string();
        let first = classify(Ok(body.clone()));
        let second = classify(Ok(body));
        assert_eq!(first, second);
    }
}
