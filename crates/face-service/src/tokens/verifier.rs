//! Credential token verification with current/previous key fallback.
//!
//! Candidates are ordered from one key store snapshot: the generation whose
//! kid matches the token header goes first, then the rest in natural order
//! (current, previous). A candidate that rejects the token for its signature,
//! audience or issuer hands over to the next one. Expired or structurally
//! invalid tokens stop immediately: trying another key cannot fix them.
//!
//! Every rejection surfaces as the same generic error. The reason is only
//! visible in logs and in the `reason` metric label.

use crate::errors::{FaceError, INVALID_TOKEN_MESSAGE};
use crate::keys::{KeyPair, KeyRing, KeyStore};
use crate::observability::metrics::{record_token_validation, record_verification_attempt};
use common::jwt::{peek_kid, validate_iat, CredentialClaims, TOKEN_AUDIENCE, TOKEN_ISSUER};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Why a token was rejected. Never shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not a JWT, wrong algorithm, unparseable claims or missing claims.
    Malformed,
    /// Past `exp` under the candidate key that validated its signature.
    Expired,
    /// `iat` further in the future than the clock skew allows.
    IssuedInFuture,
    /// No candidate accepted the signature, audience and issuer.
    NoMatchingKey,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::Malformed => "malformed",
            Rejection::Expired => "expired",
            Rejection::IssuedInFuture => "iat",
            Rejection::NoMatchingKey => "no_matching_key",
        }
    }
}

/// Outcome of one verification plus how many candidate keys were tried.
#[derive(Debug)]
pub struct Verification {
    pub outcome: Result<CredentialClaims, Rejection>,
    pub attempts: usize,
}

enum CandidateOutcome {
    Verified(CredentialClaims),
    TryNext(&'static str),
    Stop(Rejection),
}

#[derive(Clone)]
pub struct TokenVerifier {
    store: Arc<KeyStore>,
    clock_skew: Duration,
}

impl TokenVerifier {
    pub fn new(store: Arc<KeyStore>, clock_skew: Duration) -> Self {
        Self { store, clock_skew }
    }

    /// Verify `token` and return its claims.
    ///
    /// All failures map to [`FaceError::InvalidToken`] with the generic
    /// message.
    #[instrument(skip_all, name = "face.token.verify")]
    pub fn verify(&self, token: &str) -> Result<CredentialClaims, FaceError> {
        let verification = self.verify_detailed(token);

        match verification.outcome {
            Ok(claims) => {
                record_token_validation("success", None);
                debug!(
                    target: "face.token",
                    attempts = verification.attempts,
                    "Token verified"
                );
                Ok(claims)
            }
            Err(rejection) => {
                record_token_validation("error", Some(rejection.as_str()));
                match rejection {
                    Rejection::NoMatchingKey => warn!(
                        target: "face.token",
                        attempts = verification.attempts,
                        "Token rejected by every available key"
                    ),
                    Rejection::Expired => info!(target: "face.token", "Token rejected: expired"),
                    Rejection::Malformed | Rejection::IssuedInFuture => debug!(
                        target: "face.token",
                        reason = rejection.as_str(),
                        "Token rejected"
                    ),
                }
                Err(FaceError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string()))
            }
        }
    }

    /// Verify and report the rejection reason and attempt count.
    pub fn verify_detailed(&self, token: &str) -> Verification {
        let token_kid = match peek_kid(token) {
            Ok(kid) => kid,
            Err(_) => {
                return Verification {
                    outcome: Err(Rejection::Malformed),
                    attempts: 0,
                }
            }
        };

        let ring = self.store.snapshot();
        let validation = validation();
        let mut attempts = 0;

        for candidate in candidates(&ring, token_kid.as_deref()) {
            attempts += 1;
            record_verification_attempt();

            match self.try_candidate(token, candidate, &validation) {
                CandidateOutcome::Verified(claims) => {
                    return Verification {
                        outcome: Ok(claims),
                        attempts,
                    }
                }
                CandidateOutcome::TryNext(reason) => {
                    debug!(
                        target: "face.token",
                        kid = %candidate.kid(),
                        reason = reason,
                        "Candidate key rejected token"
                    );
                }
                CandidateOutcome::Stop(rejection) => {
                    return Verification {
                        outcome: Err(rejection),
                        attempts,
                    }
                }
            }
        }

        Verification {
            outcome: Err(Rejection::NoMatchingKey),
            attempts,
        }
    }

    fn try_candidate(
        &self,
        token: &str,
        candidate: &KeyPair,
        validation: &Validation,
    ) -> CandidateOutcome {
        match jsonwebtoken::decode::<CredentialClaims>(token, candidate.decoding_key(), validation) {
            Ok(data) => match validate_iat(data.claims.iat, self.clock_skew) {
                Ok(()) => CandidateOutcome::Verified(data.claims),
                Err(_) => CandidateOutcome::Stop(Rejection::IssuedInFuture),
            },
            Err(e) => match e.kind() {
                ErrorKind::InvalidSignature => CandidateOutcome::TryNext("signature"),
                ErrorKind::InvalidAudience => CandidateOutcome::TryNext("audience"),
                ErrorKind::InvalidIssuer => CandidateOutcome::TryNext("issuer"),
                ErrorKind::ExpiredSignature => CandidateOutcome::Stop(Rejection::Expired),
                _ => {
                    debug!(target: "face.token", error = %e, "Token structurally invalid");
                    CandidateOutcome::Stop(Rejection::Malformed)
                }
            },
        }
    }
}

/// kid match first, then current, then previous. The sort is stable, so
/// without a match the natural order is kept.
fn candidates<'a>(ring: &'a KeyRing, kid: Option<&str>) -> Vec<&'a KeyPair> {
    let mut keys: Vec<&KeyPair> = ring.keys().map(|key| key.as_ref()).collect();
    if let Some(kid) = kid {
        keys.sort_by_key(|key| key.kid() != kid);
    }
    keys
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.leeway = 0;
    validation
}
