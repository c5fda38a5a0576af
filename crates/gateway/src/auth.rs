use std::collections::HashMap;

use tokio::sync::RwLock;

use wicket_codes::{Entropy, decode};

// ── Credential parsing ───────────────────────────────────────────────────────

/// A parsed `code` query parameter from an upgrade attempt.
#[derive(Debug)]
pub enum Credential {
    /// Bare mnemonic: shared-code attempt, no identity bound.
    Shared { entropy: Entropy },
    /// `<mnemonic>:<request_id>`: one-time attempt bound to an approved
    /// access request.
    OneTime {
        entropy: Entropy,
        request_id: String,
    },
}

impl Credential {
    /// Parse and decode. Anything that is not a well-formed mnemonic
    /// (optionally suffixed with `:<request_id>`) yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.split_once(':') {
            Some((phrase, request_id)) => {
                let entropy = decode(phrase).ok()?;
                Some(Self::OneTime {
                    entropy,
                    request_id: request_id.to_string(),
                })
            },
            None => {
                let entropy = decode(raw).ok()?;
                Some(Self::Shared { entropy })
            },
        }
    }
}

// ── Admission decisions ──────────────────────────────────────────────────────

/// Result of an admission check at upgrade time.
#[derive(Debug)]
pub enum AdmissionDecision {
    Admitted {
        /// Present when admitted via a one-time code: the access-request id
        /// the connection stays bound to for later revocation.
        access_request_id: Option<String>,
    },
    Rejected {
        reason: RejectReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingCode,
    MalformedCode,
    SharedMismatch,
    UnknownRequest,
    CodeMismatch,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCode => "missing_code",
            Self::MalformedCode => "malformed_code",
            Self::SharedMismatch => "shared_mismatch",
            Self::UnknownRequest => "unknown_request",
            Self::CodeMismatch => "code_mismatch",
        }
    }
}

// ── Admission control ────────────────────────────────────────────────────────

/// Decides connection-upgrade attempts and owns both secret-code stores.
///
/// The shared entropy is read-only after construction. One-time entries are
/// written on operator approval and consumed by their first successful
/// validation. Validation compares decoded entropy, never surface text, so
/// alternate encodings of the same secret authenticate identically.
pub struct AdmissionControl {
    shared: Entropy,
    one_time: RwLock<HashMap<String, Entropy>>,
}

impl AdmissionControl {
    pub fn new(shared: Entropy) -> Self {
        Self {
            shared,
            one_time: RwLock::new(HashMap::new()),
        }
    }

    /// Store freshly minted entropy for an approved access request.
    pub async fn grant(&self, request_id: &str, entropy: Entropy) {
        self.one_time
            .write()
            .await
            .insert(request_id.to_string(), entropy);
    }

    /// Decide an upgrade attempt.
    ///
    /// A matching one-time entry is deleted on the way out, so the same
    /// code can never admit a second connection. A mismatched one-time code
    /// leaves the entry intact: the requester may retry with the right one.
    pub async fn authorize(&self, code: Option<&str>) -> AdmissionDecision {
        let Some(raw) = code else {
            return AdmissionDecision::Rejected {
                reason: RejectReason::MissingCode,
            };
        };
        let Some(credential) = Credential::parse(raw) else {
            return AdmissionDecision::Rejected {
                reason: RejectReason::MalformedCode,
            };
        };

        match credential {
            Credential::Shared { entropy } => {
                if entropy == self.shared {
                    AdmissionDecision::Admitted {
                        access_request_id: None,
                    }
                } else {
                    AdmissionDecision::Rejected {
                        reason: RejectReason::SharedMismatch,
                    }
                }
            },
            Credential::OneTime {
                entropy,
                request_id,
            } => {
                let mut store = self.one_time.write().await;
                let Some(expected) = store.get(&request_id) else {
                    // Never issued, or already consumed.
                    return AdmissionDecision::Rejected {
                        reason: RejectReason::UnknownRequest,
                    };
                };
                if &entropy == expected {
                    store.remove(&request_id);
                    AdmissionDecision::Admitted {
                        access_request_id: Some(request_id),
                    }
                } else {
                    AdmissionDecision::Rejected {
                        reason: RejectReason::CodeMismatch,
                    }
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn control() -> (AdmissionControl, String) {
        let shared = wicket_codes::generate().unwrap();
        let (phrase, entropy) = shared.into_parts();
        (AdmissionControl::new(entropy), phrase)
    }

    fn assert_rejected(decision: AdmissionDecision, reason: RejectReason) {
        match decision {
            AdmissionDecision::Rejected { reason: r } => assert_eq!(r, reason),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shared_code_admits_repeatedly() {
        let (control, phrase) = control();
        for _ in 0..3 {
            match control.authorize(Some(&phrase)).await {
                AdmissionDecision::Admitted { access_request_id } => {
                    assert!(access_request_id.is_none());
                },
                other => panic!("expected admission, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn missing_and_malformed_codes_are_rejected() {
        let (control, _) = control();
        assert_rejected(control.authorize(None).await, RejectReason::MissingCode);
        assert_rejected(
            control.authorize(Some("twelve bogus words")).await,
            RejectReason::MalformedCode,
        );
    }

    #[tokio::test]
    async fn wrong_shared_code_is_rejected() {
        let (control, _) = control();
        let other = wicket_codes::generate().unwrap();
        assert_rejected(
            control.authorize(Some(other.phrase())).await,
            RejectReason::SharedMismatch,
        );
    }

    #[tokio::test]
    async fn one_time_code_is_consumed_on_success() {
        let (control, _) = control();
        let code = wicket_codes::generate().unwrap();
        control.grant("req-1", code.entropy().clone()).await;

        let credential = format!("{}:req-1", code.phrase());
        match control.authorize(Some(&credential)).await {
            AdmissionDecision::Admitted { access_request_id } => {
                assert_eq!(access_request_id.as_deref(), Some("req-1"));
            },
            other => panic!("expected admission, got {other:?}"),
        }

        // Second use: the entry is gone.
        assert_rejected(
            control.authorize(Some(&credential)).await,
            RejectReason::UnknownRequest,
        );
    }

    #[tokio::test]
    async fn mismatched_one_time_code_leaves_entry_intact() {
        let (control, _) = control();
        let issued = wicket_codes::generate().unwrap();
        let wrong = wicket_codes::generate().unwrap();
        control.grant("req-2", issued.entropy().clone()).await;

        assert_rejected(
            control
                .authorize(Some(&format!("{}:req-2", wrong.phrase())))
                .await,
            RejectReason::CodeMismatch,
        );

        // The right code still works afterwards.
        match control
            .authorize(Some(&format!("{}:req-2", issued.phrase())))
            .await
        {
            AdmissionDecision::Admitted { .. } => {},
            other => panic!("expected admission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_time_attempt_for_unissued_request_is_rejected() {
        let (control, _) = control();
        let code = wicket_codes::generate().unwrap();
        assert_rejected(
            control
                .authorize(Some(&format!("{}:never-issued", code.phrase())))
                .await,
            RejectReason::UnknownRequest,
        );
    }

    #[tokio::test]
    async fn shared_phrase_with_request_suffix_is_not_shared_access() {
        let (control, phrase) = control();
        // Suffixing the shared code must not grant one-time access.
        assert_rejected(
            control.authorize(Some(&format!("{phrase}:req-3"))).await,
            RejectReason::UnknownRequest,
        );
    }
}
