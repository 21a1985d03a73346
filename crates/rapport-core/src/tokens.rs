use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use rapport_types::claims::{Claim, ClaimKind, Claims};

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_TTL_HOURS: i64 = 24;

pub fn default_ttl() -> Duration {
    Duration::hours(DEFAULT_TTL_HOURS)
}

/// Wire form of the claims inside the signed JWT.
#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    nameid: String,
    unique_name: String,
    #[serde(default)]
    role: Vec<String>,
    iat: i64,
    exp: i64,
}

/// A freshly signed token and the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Signs and verifies session tokens (HS512 JWTs).
///
/// Built once at startup from the configured secret; the key is never
/// rotated while the process runs.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> CoreResult<Self> {
        if secret.is_empty() {
            return Err(CoreError::Crypto("token signing secret is empty".into()));
        }
        if ttl <= Duration::zero() {
            return Err(CoreError::Crypto("token lifetime must be positive".into()));
        }

        let mut validation = Validation::new(Algorithm::HS512);
        // Expiry is checked against the caller-supplied clock in `verify`.
        validation.validate_exp = false;
        validation.validate_aud = false;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Claims are ordered Identity, Name, then one Role claim per distinct
    /// role in ascending order.
    pub fn issue<R>(
        &self,
        user_id: Uuid,
        username: &str,
        roles: R,
        now: DateTime<Utc>,
    ) -> CoreResult<IssuedToken>
    where
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let roles: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        let iat = now.timestamp();
        let exp = (now + self.ttl).timestamp();

        let payload = TokenPayload {
            nameid: user_id.to_string(),
            unique_name: username.to_string(),
            role: roles.into_iter().collect(),
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS512), &payload, &self.encoding)
            .map_err(|e| CoreError::Crypto(format!("token signing failed: {}", e)))?;

        Ok(IssuedToken {
            claims: payload.into_claims()?,
            token,
        })
    }

    /// Checks the signature, then the expiry against `now`. A validly signed
    /// token with `now >= expires_at` is `TokenExpired`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> CoreResult<Claims> {
        let data = decode::<TokenPayload>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Token rejected: {:?}", e.kind());
            CoreError::TokenInvalid
        })?;

        let claims = data.claims.into_claims()?;
        if now >= claims.expires_at {
            return Err(CoreError::TokenExpired);
        }
        Ok(claims)
    }
}

impl TokenPayload {
    fn into_claims(self) -> CoreResult<Claims> {
        if self.nameid.parse::<Uuid>().is_err() {
            return Err(CoreError::TokenInvalid);
        }
        let issued_at = DateTime::from_timestamp(self.iat, 0).ok_or(CoreError::TokenInvalid)?;
        let expires_at = DateTime::from_timestamp(self.exp, 0).ok_or(CoreError::TokenInvalid)?;

        let mut items = vec![
            Claim::new(ClaimKind::Identity, self.nameid),
            Claim::new(ClaimKind::Name, self.unique_name),
        ];
        items.extend(self.role.into_iter().map(|r| Claim::new(ClaimKind::Role, r)));

        Ok(Claims {
            items,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"super secret key used only by the tests", default_ttl()).unwrap()
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn issued_claims_come_back_from_verify() {
        let issuer = issuer();
        let id = Uuid::new_v4();
        let issued = issuer.issue(id, "ann", ["Member", "Admin"], noon()).unwrap();

        let claims = issuer.verify(&issued.token, noon()).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.user_id(), Some(id));
        assert_eq!(claims.username(), Some("ann"));
        assert_eq!(claims.roles().collect::<Vec<_>>(), vec!["Admin", "Member"]);
        assert_eq!(claims.expires_at, noon() + Duration::hours(24));

        let almost = claims.expires_at - Duration::seconds(1);
        assert!(issuer.verify(&issued.token, almost).is_ok());
    }

    #[test]
    fn expired_token_is_rejected_even_when_signed() {
        let issuer = issuer();
        let issued = issuer
            .issue(Uuid::new_v4(), "ann", Vec::<String>::new(), noon())
            .unwrap();

        let at_expiry = issued.claims.expires_at;
        assert!(matches!(
            issuer.verify(&issued.token, at_expiry),
            Err(CoreError::TokenExpired)
        ));
        assert!(matches!(
            issuer.verify(&issued.token, at_expiry + Duration::days(3)),
            Err(CoreError::TokenExpired)
        ));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let issuer = issuer();
        let token = issuer
            .issue(Uuid::new_v4(), "ann", ["Member"], noon())
            .unwrap()
            .token;

        // Flip one character inside the payload segment and one in the signature.
        let payload_at = token.find('.').unwrap() + 5;
        let signature_at = token.rfind('.').unwrap() + 5;
        for at in [payload_at, signature_at] {
            let mut bytes = token.clone().into_bytes();
            bytes[at] = if bytes[at] == b'A' { b'B' } else { b'A' };
            let forged = String::from_utf8(bytes).unwrap();
            assert!(matches!(
                issuer.verify(&forged, noon()),
                Err(CoreError::TokenInvalid)
            ));
        }
    }

    #[test]
    fn token_from_another_key_is_invalid() {
        let other = TokenIssuer::new(b"a different secret", default_ttl()).unwrap();
        let token = other
            .issue(Uuid::new_v4(), "ann", ["Admin"], noon())
            .unwrap()
            .token;
        assert!(matches!(
            issuer().verify(&token, noon()),
            Err(CoreError::TokenInvalid)
        ));
        assert!(matches!(
            issuer().verify("not.a.token", noon()),
            Err(CoreError::TokenInvalid)
        ));
    }

    #[test]
    fn ttl_is_configurable() {
        let issuer = TokenIssuer::new(b"k", Duration::hours(1)).unwrap();
        let issued = issuer
            .issue(Uuid::new_v4(), "ann", Vec::<String>::new(), noon())
            .unwrap();
        assert_eq!(issued.claims.expires_at, noon() + Duration::hours(1));
        assert!(TokenIssuer::new(b"", default_ttl()).is_err());
    }
}
