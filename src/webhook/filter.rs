//! Release event filtering
//!
//! Decides whether a webhook delivery becomes a deployment. Checks run from
//! cheapest to most expensive: the event header, then the signature, and
//! only then the JSON body.

use axum::http::HeaderMap;
use serde::Deserialize;
use std::fmt;

use super::signature::{SignatureCheck, SignatureVerifier};
use crate::types::DeploymentRequest;

pub const EVENT_HEADER: &str = "x-github-event";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

const RELEASE_EVENT: &str = "release";
const PUBLISHED_ACTION: &str = "published";

/// Webhook headers relevant to filtering
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    pub event: String,
    pub signature: String,
    pub delivery: Option<String>,
}

impl WebhookHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(|s| s.to_string())
        };

        Self {
            event: get(EVENT_HEADER).unwrap_or_default(),
            signature: get(SIGNATURE_HEADER).unwrap_or_default(),
            delivery: get(DELIVERY_HEADER),
        }
    }
}

/// Why a delivery was ignored. Ignored deliveries are acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NonReleaseEvent(String),
    Action(String),
    Draft,
    Prerelease,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NonReleaseEvent(event) if event.is_empty() => {
                write!(f, "non-release event")
            }
            IgnoreReason::NonReleaseEvent(event) => write!(f, "non-release event: {}", event),
            IgnoreReason::Action(action) => write!(f, "action is {}", action),
            IgnoreReason::Draft => write!(f, "draft release"),
            IgnoreReason::Prerelease => write!(f, "prerelease"),
        }
    }
}

/// Why a delivery was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InvalidSignature(SignatureCheck),
    MalformedPayload(String),
    MissingVersion,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidSignature(_) => write!(f, "invalid signature"),
            RejectReason::MalformedPayload(_) => write!(f, "malformed payload"),
            RejectReason::MissingVersion => write!(f, "missing version"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accept(DeploymentRequest),
    Ignore(IgnoreReason),
    Reject(RejectReason),
}

impl FilterDecision {
    /// Metric label for the decision
    pub fn outcome(&self) -> &'static str {
        match self {
            FilterDecision::Accept(_) => "accepted",
            FilterDecision::Ignore(_) => "ignored",
            FilterDecision::Reject(_) => "rejected",
        }
    }
}

/// The subset of the GitHub release payload the filter reads. Every field
/// is optional so that `null` reads the same as an absent field.
#[derive(Debug, Deserialize)]
struct ReleasePayload {
    action: Option<String>,
    release: Option<Release>,
    repository: Option<Repository>,
}

#[derive(Debug, Default, Deserialize)]
struct Release {
    tag_name: Option<String>,
    draft: Option<bool>,
    prerelease: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct Repository {
    full_name: Option<String>,
}

pub struct EventFilter {
    verifier: SignatureVerifier,
}

impl EventFilter {
    pub fn new(verifier: SignatureVerifier) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    pub fn evaluate(&self, headers: &WebhookHeaders, body: &[u8]) -> FilterDecision {
        if headers.event != RELEASE_EVENT {
            return FilterDecision::Ignore(IgnoreReason::NonReleaseEvent(headers.event.clone()));
        }

        let check = self.verifier.check(body, &headers.signature);
        if !check.is_valid() {
            return FilterDecision::Reject(RejectReason::InvalidSignature(check));
        }

        let payload: ReleasePayload = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => return FilterDecision::Reject(RejectReason::MalformedPayload(e.to_string())),
        };

        let action = payload.action.as_deref().unwrap_or("unknown");
        if action != PUBLISHED_ACTION {
            return FilterDecision::Ignore(IgnoreReason::Action(action.to_string()));
        }

        let release = payload.release.unwrap_or_default();
        if release.draft.unwrap_or_default() {
            return FilterDecision::Ignore(IgnoreReason::Draft);
        }

        if release.prerelease.unwrap_or_default() {
            return FilterDecision::Ignore(IgnoreReason::Prerelease);
        }

        let version = match release.tag_name {
            Some(tag) if !tag.is_empty() => tag,
            _ => return FilterDecision::Reject(RejectReason::MissingVersion),
        };

        let repository = payload
            .repository
            .and_then(|repository| repository.full_name)
            .filter(|name| !name.is_empty());

        FilterDecision::Accept(DeploymentRequest::new(version, repository))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    const SECRET: &str = "filter-secret";

    fn filter() -> EventFilter {
        EventFilter::new(SignatureVerifier::new(SECRET))
    }

    fn signed(event: &str, body: &str) -> WebhookHeaders {
        WebhookHeaders {
            event: event.to_string(),
            signature: SignatureVerifier::new(SECRET).sign(body.as_bytes()).unwrap(),
            delivery: None,
        }
    }

    fn release_body(action: &str, draft: bool, prerelease: bool) -> String {
        format!(
            r#"{{"action":"{}","release":{{"tag_name":"v1.2.3","draft":{},"prerelease":{}}},"repository":{{"full_name":"org/app"}}}}"#,
            action, draft, prerelease
        )
    }

    #[test]
    fn test_accepts_published_release() {
        let body = release_body("published", false, false);
        let decision = filter().evaluate(&signed("release", &body), body.as_bytes());

        assert_eq!(
            decision,
            FilterDecision::Accept(DeploymentRequest::new(
                "v1.2.3",
                Some("org/app".to_string())
            ))
        );
        assert_eq!(decision.outcome(), "accepted");
    }

    #[test]
    fn test_ignores_non_release_events() {
        let body = release_body("published", false, false);
        let decision = filter().evaluate(&signed("push", &body), body.as_bytes());

        assert_eq!(
            decision,
            FilterDecision::Ignore(IgnoreReason::NonReleaseEvent("push".to_string()))
        );
    }

    #[test]
    fn test_event_checked_before_signature() {
        let headers = WebhookHeaders {
            event: "ping".to_string(),
            signature: "sha256=bogus".to_string(),
            delivery: None,
        };
        let decision = filter().evaluate(&headers, b"not json");
        assert!(matches!(decision, FilterDecision::Ignore(_)));
    }

    #[test]
    fn test_rejects_bad_signature_before_parsing() {
        let headers = WebhookHeaders {
            event: "release".to_string(),
            signature: "sha256=bogus".to_string(),
            delivery: None,
        };
        let decision = filter().evaluate(&headers, b"not json");
        assert_eq!(
            decision,
            FilterDecision::Reject(RejectReason::InvalidSignature(SignatureCheck::Mismatch))
        );
    }

    #[test]
    fn test_rejects_missing_signature() {
        let body = release_body("published", false, false);
        let headers = WebhookHeaders {
            event: "release".to_string(),
            ..Default::default()
        };
        let decision = filter().evaluate(&headers, body.as_bytes());
        assert_eq!(
            decision,
            FilterDecision::Reject(RejectReason::InvalidSignature(SignatureCheck::Missing))
        );
        assert_eq!(decision.outcome(), "rejected");
    }

    #[test]
    fn test_rejects_malformed_payload() {
        let body = "{not valid json";
        let decision = filter().evaluate(&signed("release", body), body.as_bytes());
        match decision {
            FilterDecision::Reject(reason @ RejectReason::MalformedPayload(_)) => {
                assert_eq!(reason.to_string(), "malformed payload");
            }
            other => panic!("Expected malformed payload, got: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_wrongly_typed_fields() {
        let body = r#"{"action":"published","release":{"tag_name":"v1","draft":"yes"}}"#;
        let decision = filter().evaluate(&signed("release", body), body.as_bytes());
        assert!(matches!(
            decision,
            FilterDecision::Reject(RejectReason::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_ignores_other_actions() {
        for action in ["created", "edited", "deleted", "released", "unpublished"] {
            let body = release_body(action, false, false);
            let decision = filter().evaluate(&signed("release", &body), body.as_bytes());
            match decision {
                FilterDecision::Ignore(reason) => {
                    assert_eq!(reason.to_string(), format!("action is {}", action));
                }
                other => panic!("Expected ignore for {}, got: {:?}", action, other),
            }
        }
    }

    #[test]
    fn test_missing_action_reads_as_unknown() {
        let body = r#"{"release":{"tag_name":"v1.0.0"}}"#;
        let decision = filter().evaluate(&signed("release", body), body.as_bytes());
        assert_eq!(
            decision,
            FilterDecision::Ignore(IgnoreReason::Action("unknown".to_string()))
        );
    }

    #[test]
    fn test_ignores_draft_and_prerelease() {
        let draft = release_body("published", true, false);
        assert_eq!(
            filter().evaluate(&signed("release", &draft), draft.as_bytes()),
            FilterDecision::Ignore(IgnoreReason::Draft)
        );

        let prerelease = release_body("published", false, true);
        assert_eq!(
            filter().evaluate(&signed("release", &prerelease), prerelease.as_bytes()),
            FilterDecision::Ignore(IgnoreReason::Prerelease)
        );

        // Draft wins when both are set
        let both = release_body("published", true, true);
        assert_eq!(
            filter().evaluate(&signed("release", &both), both.as_bytes()),
            FilterDecision::Ignore(IgnoreReason::Draft)
        );
    }

    #[test]
    fn test_rejects_missing_version() {
        for body in [
            r#"{"action":"published","release":{"draft":false}}"#,
            r#"{"action":"published","release":{"tag_name":""}}"#,
            r#"{"action":"published"}"#,
        ] {
            let decision = filter().evaluate(&signed("release", body), body.as_bytes());
            assert_eq!(
                decision,
                FilterDecision::Reject(RejectReason::MissingVersion),
                "body: {}",
                body
            );
        }
    }

    #[test]
    fn test_repository_is_optional() {
        let body = r#"{"action":"published","release":{"tag_name":"v3.0.0"}}"#;
        let decision = filter().evaluate(&signed("release", body), body.as_bytes());
        assert_eq!(
            decision,
            FilterDecision::Accept(DeploymentRequest::new("v3.0.0", None))
        );
    }

    #[test]
    fn test_null_fields_read_as_absent() {
        let body = r#"{"action":"published","release":{"tag_name":"v3.1.0","draft":null,"prerelease":null},"repository":null}"#;
        let decision = filter().evaluate(&signed("release", body), body.as_bytes());
        assert_eq!(
            decision,
            FilterDecision::Accept(DeploymentRequest::new("v3.1.0", None))
        );

        let body = r#"{"action":"published","release":null}"#;
        let decision = filter().evaluate(&signed("release", body), body.as_bytes());
        assert_eq!(decision, FilterDecision::Reject(RejectReason::MissingVersion));
    }

    #[test]
    fn test_whitespace_tag_is_kept_verbatim() {
        let body = r#"{"action":"published","release":{"tag_name":"  "}}"#;
        let decision = filter().evaluate(&signed("release", body), body.as_bytes());
        assert_eq!(
            decision,
            FilterDecision::Accept(DeploymentRequest::new("  ", None))
        );
    }

    #[test]
    fn test_disabled_secret_accepts_unsigned_release() {
        let filter = EventFilter::new(SignatureVerifier::new(""));
        let body = release_body("published", false, false);
        let headers = WebhookHeaders {
            event: "release".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            filter.evaluate(&headers, body.as_bytes()),
            FilterDecision::Accept(_)
        ));
    }

    #[test]
    fn test_headers_from_header_map() {
        let mut headers = HeaderMap::new();
        assert_eq!(WebhookHeaders::from_header_map(&headers).event, "");

        // Header names arrive in mixed case from GitHub
        for (name, value) in [
            ("X-GitHub-Event", "release"),
            ("X-Hub-Signature-256", "sha256=abc"),
            ("X-GitHub-Delivery", "delivery-1"),
        ] {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_static(value),
            );
        }

        let parsed = WebhookHeaders::from_header_map(&headers);
        assert_eq!(parsed.event, "release");
        assert_eq!(parsed.signature, "sha256=abc");
        assert_eq!(parsed.delivery.as_deref(), Some("delivery-1"));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            IgnoreReason::NonReleaseEvent(String::new()).to_string(),
            "non-release event"
        );
        assert_eq!(
            IgnoreReason::NonReleaseEvent("push".to_string()).to_string(),
            "non-release event: push"
        );
        assert_eq!(IgnoreReason::Draft.to_string(), "draft release");
        assert_eq!(IgnoreReason::Prerelease.to_string(), "prerelease");
        assert_eq!(
            RejectReason::InvalidSignature(SignatureCheck::Missing).to_string(),
            "invalid signature"
        );
        assert_eq!(RejectReason::MissingVersion.to_string(), "missing version");
    }
}
