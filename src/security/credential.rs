// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Offline credential validity.
//!
//! A credential is a three-part signed token `header.payload.signature`.
//! Only the payload matters here: it is base64url JSON carrying an `exp`
//! claim in seconds since the epoch. The signature is never checked; that is
//! the backend's job. This module only answers "is it worth sending?".
//!
//! Every failure is fail-closed. An unparseable credential is reported as
//! invalid, the same verdict as an expired one.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// URL-safe alphabet. Trailing `=` padding is tolerated but not required.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Pin the clock to a unix timestamp in seconds.
    pub fn at_unix(secs: i64) -> Self {
        Self(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// What to do with a credential whose payload has no `exp` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Treat it as valid. This is what deployed clients have always done.
    #[default]
    Permissive,
    /// Treat it as invalid.
    Strict,
}

impl ExpiryPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ExpiryPolicy::Strict
        } else {
            ExpiryPolicy::Permissive
        }
    }
}

/// The claims this crate reads out of a credential payload.
///
/// Unknown claims are ignored. `exp` and `iat` are NumericDate values and may
/// be fractional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CredentialClaims {
    pub sub: Option<String>,
    pub iat: Option<f64>,
    pub exp: Option<f64>,
}

impl CredentialClaims {
    /// Expiry in milliseconds since the epoch.
    fn expiry_millis(&self) -> Option<f64> {
        self.exp.map(|secs| secs * 1000.0)
    }

    /// The instant after which the credential must not be used.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_millis()
            .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64))
    }

    /// True iff `now` is at or past the expiry instant.
    ///
    /// A payload without `exp` never expires by this check; the policy
    /// decides what that means.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_millis() {
            Some(expiry_ms) => now.timestamp_millis() as f64 >= expiry_ms,
            None => false,
        }
    }

    /// Time left before expiry, clamped at zero. `None` if no expiry.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.expires_at()?;
        Some((expires_at - now).max(Duration::zero()))
    }
}

/// Decode the payload segment of a credential.
///
/// Requires exactly three dot-separated segments, a base64url payload and a
/// JSON object inside it. A present but non-numeric `exp` is malformed; a
/// `sub` or `iat` of the wrong type is dropped.
pub fn decode_claims(credential: &str) -> Result<CredentialClaims, CredentialError> {
    let segments: Vec<&str> = credential.split('.').collect();
    if segments.len() != 3 {
        return Err(CredentialError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let payload = segments[1];
    if payload.is_empty() {
        return Err(CredentialError::Malformed("empty payload segment".to_string()));
    }

    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| CredentialError::Malformed(format!("payload is not base64url: {}", e)))?;

    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| CredentialError::Malformed(format!("payload is not JSON: {}", e)))?;

    let Some(object) = value.as_object() else {
        return Err(CredentialError::Malformed("payload is not a JSON object".to_string()));
    };

    // Only exp decides validity. sub and iat are informational.
    let exp = match object.get("exp") {
        None | Some(serde_json::Value::Null) => None,
        Some(exp) => Some(exp.as_f64().ok_or_else(|| {
            CredentialError::Malformed(format!("exp is not a number: {}", exp))
        })?),
    };

    Ok(CredentialClaims {
        sub: object.get("sub").and_then(|v| v.as_str()).map(str::to_string),
        iat: object.get("iat").and_then(serde_json::Value::as_f64),
        exp,
    })
}

/// Classify a credential at `now`.
///
/// Returns the decoded claims when the credential may still be used.
pub fn check(
    credential: Option<&str>,
    now: DateTime<Utc>,
    policy: ExpiryPolicy,
) -> Result<CredentialClaims, CredentialError> {
    let credential = credential.ok_or(CredentialError::Missing)?;
    let claims = decode_claims(credential)?;

    match claims.expires_at() {
        Some(expired_at) if claims.is_expired_at(now) => {
            Err(CredentialError::Expired { expired_at })
        }
        Some(_) => Ok(claims),
        None if claims.exp.is_some() => {
            // exp decoded but does not map to a representable instant.
            if claims.is_expired_at(now) {
                Err(CredentialError::Expired { expired_at: DateTime::<Utc>::MIN_UTC })
            } else {
                Ok(claims)
            }
        }
        None => match policy {
            ExpiryPolicy::Permissive => Ok(claims),
            ExpiryPolicy::Strict => Err(CredentialError::MissingExpiry),
        },
    }
}

/// Whether `credential` may still be used at `now`. Total; never fails.
pub fn is_valid_at(credential: Option<&str>, now: DateTime<Utc>, policy: ExpiryPolicy) -> bool {
    match check(credential, now, policy) {
        Ok(_) => true,
        Err(err) => {
            tracing::debug!("CREDENTIAL_REJECTED | reason={}", err);
            false
        }
    }
}

/// Whether `credential` may still be used right now, under the permissive
/// policy.
pub fn is_valid(credential: Option<&str>) -> bool {
    is_valid_at(credential, SystemClock.now(), ExpiryPolicy::Permissive)
}

#[cfg(test)]
pub(crate) mod test_tokens {
    //! Token builders shared by the unit tests.

    use super::PAYLOAD_ENGINE;
    use base64::Engine;

    const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

    pub fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.{}",
            PAYLOAD_ENGINE.encode(HEADER),
            PAYLOAD_ENGINE.encode(payload),
            PAYLOAD_ENGINE.encode("signature")
        )
    }

    pub fn token_expiring_at(exp: i64) -> String {
        token_with_payload(&format!(r#"{{"sub":"asha@example.com","iat":{},"exp":{}}}"#, exp - 3600, exp))
    }
}

#[cfg(test)]
mod tests {
    use super::test_tokens::*;
    use super::*;

    /// 2024-03-01 00:00:00 UTC
    const NOW_2024: i64 = 1_709_251_200;

    fn now() -> DateTime<Utc> {
        FixedClock::at_unix(NOW_2024).now()
    }

    #[test]
    fn test_absent_credential_is_invalid() {
        assert!(!is_valid_at(None, now(), ExpiryPolicy::Permissive));
        assert_eq!(check(None, now(), ExpiryPolicy::Permissive), Err(CredentialError::Missing));
    }

    #[test]
    fn test_year_2001_expiry_is_invalid_in_2024() {
        let token = token_with_payload(r#"{"exp": 1000000000}"#);
        assert!(!is_valid_at(Some(&token), now(), ExpiryPolicy::Permissive));
        assert!(matches!(
            check(Some(&token), now(), ExpiryPolicy::Permissive),
            Err(CredentialError::Expired { .. })
        ));
    }

    #[test]
    fn test_past_expiry_is_invalid() {
        for delta in [1, 60, 86_400, 10 * 365 * 86_400] {
            let token = token_expiring_at(NOW_2024 - delta);
            assert!(!is_valid_at(Some(&token), now(), ExpiryPolicy::Permissive), "delta={}", delta);
        }
    }

    #[test]
    fn test_expiry_boundary_is_invalid() {
        // current instant == expiry instant counts as expired
        let token = token_expiring_at(NOW_2024);
        assert!(!is_valid_at(Some(&token), now(), ExpiryPolicy::Permissive));
    }

    #[test]
    fn test_future_expiry_is_valid() {
        for delta in [1, 60, 2 * 86_400] {
            let token = token_expiring_at(NOW_2024 + delta);
            assert!(is_valid_at(Some(&token), now(), ExpiryPolicy::Permissive), "delta={}", delta);
        }
    }

    #[test]
    fn test_fractional_expiry_compares_in_millis() {
        let token = token_with_payload(&format!(r#"{{"exp":{}.5}}"#, NOW_2024));
        assert!(is_valid_at(Some(&token), now(), ExpiryPolicy::Permissive));
    }

    #[test]
    fn test_malformed_credentials_are_invalid() {
        let good_header = PAYLOAD_ENGINE.encode("{}");
        let cases = vec![
            String::new(),
            "not-a-token".to_string(),
            "a.b".to_string(),
            "a.b.c.d".to_string(),
            format!("{}..sig", good_header),
            format!("{}.!!!notbase64!!!.sig", good_header),
            format!("{}.{}.sig", good_header, PAYLOAD_ENGINE.encode("not json")),
            format!("{}.{}.sig", good_header, PAYLOAD_ENGINE.encode("[1,2,3]")),
            format!("{}.{}.sig", good_header, PAYLOAD_ENGINE.encode("null")),
            format!("{}.{}.sig", good_header, PAYLOAD_ENGINE.encode(r#"{"exp":"tomorrow"}"#)),
        ];

        for case in cases {
            assert!(!is_valid_at(Some(&case), now(), ExpiryPolicy::Permissive), "case={:?}", case);
            assert!(matches!(decode_claims(&case), Err(CredentialError::Malformed(_))), "case={:?}", case);
        }
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":99999999999}"#);
        let token = format!("h.{}.s", payload);
        assert!(payload.ends_with('='));
        assert!(is_valid_at(Some(&token), now(), ExpiryPolicy::Permissive));
    }

    #[test]
    fn test_missing_expiry_follows_policy() {
        let token = token_with_payload(r#"{"sub":"asha@example.com"}"#);
        assert!(is_valid_at(Some(&token), now(), ExpiryPolicy::Permissive));
        assert!(!is_valid_at(Some(&token), now(), ExpiryPolicy::Strict));
        assert_eq!(
            check(Some(&token), now(), ExpiryPolicy::Strict),
            Err(CredentialError::MissingExpiry)
        );
    }

    #[test]
    fn test_null_expiry_is_missing_expiry() {
        let token = token_with_payload(r#"{"exp":null}"#);
        assert!(is_valid_at(Some(&token), now(), ExpiryPolicy::Permissive));
        assert!(!is_valid_at(Some(&token), now(), ExpiryPolicy::Strict));
    }

    #[test]
    fn test_informational_claims_do_not_affect_validity() {
        let exp = NOW_2024 + 3600;
        let payloads = [
            format!(r#"{{"sub":42,"exp":{}}}"#, exp),
            format!(r#"{{"iat":"yesterday","exp":{}}}"#, exp),
            format!(r#"{{"sub":["a"],"iat":{{}},"exp":{}}}"#, exp),
        ];

        for payload in payloads {
            let token = token_with_payload(&payload);
            assert!(is_valid_at(Some(&token), now(), ExpiryPolicy::Strict), "payload={}", payload);

            let claims = decode_claims(&token).unwrap();
            assert_eq!(claims.exp, Some(exp as f64));
            assert_eq!(claims.sub, None);
            assert_eq!(claims.iat, None);
        }
    }

    #[test]
    fn test_claims_expose_subject_and_remaining_time() {
        let token = token_expiring_at(NOW_2024 + 120);
        let claims = check(Some(&token), now(), ExpiryPolicy::Strict).unwrap();

        assert_eq!(claims.sub.as_deref(), Some("asha@example.com"));
        assert_eq!(claims.time_remaining(now()), Some(Duration::seconds(120)));
        assert_eq!(claims.issued_at().map(|t| t.timestamp()), Some(NOW_2024 + 120 - 3600));
    }

    #[test]
    fn test_time_remaining_clamps_at_zero() {
        let claims = decode_claims(&token_expiring_at(NOW_2024 - 10)).unwrap();
        assert_eq!(claims.time_remaining(now()), Some(Duration::zero()));
    }
}
