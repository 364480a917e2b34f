//! Issues and validates the signed access and refresh tokens.
//!
//! Both kinds of token are JWTs with the same claims and signing key, they
//! only differ in the `refresh` flag and how long they live.

use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, TokenConfig, UserID};

/// Whether a token grants API access or can be exchanged for a new access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// A short-lived token sent with API requests.
    Access,
    /// A long-lived token that can only be used to get a new access token.
    Refresh,
}

/// The contents of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to, as a string.
    pub sub: String,
    /// The expiry time as seconds since the Unix epoch.
    pub exp: i64,
    /// A unique ID for this token.
    pub jti: String,
    /// Whether this is a refresh token.
    pub refresh: bool,
}

impl Claims {
    /// Create the claims for a token that expires `duration` from now.
    ///
    /// The expiry is clamped to the range of [OffsetDateTime].
    pub fn new(user_id: UserID, kind: TokenKind, duration: Duration) -> Self {
        let expires_at = OffsetDateTime::now_utc().saturating_add(duration);

        Self {
            sub: user_id.to_string(),
            exp: expires_at.unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
            refresh: matches!(kind, TokenKind::Refresh),
        }
    }

    /// The kind of token these claims belong to.
    pub fn kind(&self) -> TokenKind {
        if self.refresh {
            TokenKind::Refresh
        } else {
            TokenKind::Access
        }
    }

    /// Parse the subject as a user ID.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidToken] if the subject is not an integer.
    pub fn user_id(&self) -> Result<UserID, Error> {
        self.sub
            .parse()
            .map(UserID::new)
            .map_err(|_| Error::InvalidToken)
    }
}

/// Signs and verifies tokens with the secret and algorithm from a [TokenConfig].
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    access_token_duration: Duration,
    refresh_token_duration: Duration,
}

impl TokenService {
    /// Create a token service from `config`.
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(config.algorithm);
        // Expiry is exact, a token is invalid from the second it expires.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            header: Header::new(config.algorithm),
            validation,
            access_token_duration: config.access_token_duration,
            refresh_token_duration: config.refresh_token_duration,
        }
    }

    /// Issue a token of `kind` for `user_id` that expires after `duration`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::TokenCreation] if the token could not be signed.
    pub fn issue(
        &self,
        user_id: UserID,
        kind: TokenKind,
        duration: Duration,
    ) -> Result<String, Error> {
        self.encode(&Claims::new(user_id, kind, duration))
    }

    /// Issue an access token with the configured access token lifetime.
    ///
    /// # Errors
    ///
    /// Returns an [Error::TokenCreation] if the token could not be signed.
    pub fn issue_access_token(&self, user_id: UserID) -> Result<String, Error> {
        self.issue(user_id, TokenKind::Access, self.access_token_duration)
    }

    /// Create the claims for a refresh token with the configured refresh token lifetime.
    ///
    /// The claims are returned rather than the signed token so the caller can
    /// record the token ID before handing out the token.
    pub fn refresh_token_claims(&self, user_id: UserID) -> Claims {
        Claims::new(user_id, TokenKind::Refresh, self.refresh_token_duration)
    }

    /// Sign `claims`.
    ///
    /// # Errors
    ///
    /// Returns an [Error::TokenCreation] if the token could not be signed.
    pub fn encode(&self, claims: &Claims) -> Result<String, Error> {
        encode(&self.header, claims, &self.encoding_key)
            .map_err(|error| Error::TokenCreation(error.to_string()))
    }

    /// Verify the signature, algorithm and expiry of `token` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [Error::ExpiredToken] if the token has a valid signature but has expired,
    /// - [Error::InvalidToken] for a bad signature, a different algorithm, or a
    ///   token that is malformed or missing claims.
    pub fn decode(&self, token: &str) -> Result<Claims, Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|error| match error.kind() {
                ErrorKind::ExpiredSignature => Error::ExpiredToken,
                _ => {
                    tracing::debug!("Rejected token: {error}");
                    Error::InvalidToken
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde::Serialize;
    use time::{Duration, OffsetDateTime};

    use crate::{Error, TokenConfig, UserID};

    use super::{Claims, TokenKind, TokenService};

    fn get_service(secret: &str) -> TokenService {
        TokenService::new(&TokenConfig::with_defaults(secret))
    }

    #[test]
    fn issue_then_decode_keeps_subject_and_kind() {
        let service = get_service("foobar");
        let user_id = UserID::new(42);

        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let token = service.issue(user_id, kind, Duration::minutes(5)).unwrap();

            let claims = service.decode(&token).unwrap();

            assert_eq!(claims.user_id(), Ok(user_id));
            assert_eq!(claims.sub, "42");
            assert_eq!(claims.kind(), kind);
        }
    }

    #[test]
    fn claims_expire_after_duration() {
        let before = OffsetDateTime::now_utc().unix_timestamp();

        let claims = Claims::new(UserID::new(1), TokenKind::Access, Duration::minutes(15));

        let after = OffsetDateTime::now_utc().unix_timestamp();
        assert!(claims.exp >= before + 15 * 60);
        assert!(claims.exp <= after + 15 * 60);
    }

    #[test]
    fn huge_duration_clamps_expiry() {
        let claims = Claims::new(UserID::new(1), TokenKind::Refresh, Duration::MAX);

        assert_eq!(
            claims.exp,
            time::PrimitiveDateTime::MAX.assume_utc().unix_timestamp()
        );
    }

    #[test]
    fn each_token_has_a_unique_id() {
        let first = Claims::new(UserID::new(1), TokenKind::Access, Duration::minutes(5));
        let second = Claims::new(UserID::new(1), TokenKind::Access, Duration::minutes(5));

        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn access_token_uses_configured_duration() {
        let config = TokenConfig::new("foobar", "HS256", 1, 1).unwrap();
        let service = TokenService::new(&config);
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let token = service.issue_access_token(UserID::new(1)).unwrap();
        let claims = service.decode(&token).unwrap();

        assert_eq!(claims.kind(), TokenKind::Access);
        assert!((claims.exp - (now + 60)).abs() <= 1);
    }

    #[test]
    fn refresh_token_claims_use_configured_duration() {
        let service = get_service("foobar");
        let now = OffsetDateTime::now_utc().unix_timestamp();

        let claims = service.refresh_token_claims(UserID::new(1));

        assert_eq!(claims.kind(), TokenKind::Refresh);
        assert!((claims.exp - (now + 7 * 24 * 60 * 60)).abs() <= 1);
    }

    #[test]
    fn decode_fails_on_expired_token() {
        let service = get_service("foobar");
        let token = service
            .issue(UserID::new(1), TokenKind::Access, Duration::seconds(-10))
            .unwrap();

        assert_eq!(service.decode(&token), Err(Error::ExpiredToken));
    }

    #[test]
    fn decode_fails_on_different_secret() {
        let token = get_service("foobar")
            .issue(UserID::new(1), TokenKind::Access, Duration::minutes(5))
            .unwrap();

        assert_eq!(get_service("barfoo").decode(&token), Err(Error::InvalidToken));
    }

    #[test]
    fn decode_fails_on_expired_token_with_different_secret() {
        let token = get_service("foobar")
            .issue(UserID::new(1), TokenKind::Access, Duration::seconds(-10))
            .unwrap();

        assert_eq!(get_service("barfoo").decode(&token), Err(Error::InvalidToken));
    }

    #[test]
    fn decode_fails_on_different_algorithm() {
        let hs512 = TokenService::new(&TokenConfig::new("foobar", "HS512", 15, 7).unwrap());
        let token = hs512
            .issue(UserID::new(1), TokenKind::Access, Duration::minutes(5))
            .unwrap();

        assert_eq!(get_service("foobar").decode(&token), Err(Error::InvalidToken));
    }

    #[test]
    fn decode_fails_on_malformed_token() {
        let service = get_service("foobar");

        assert_eq!(service.decode("not.a.token"), Err(Error::InvalidToken));
        assert_eq!(service.decode(""), Err(Error::InvalidToken));
    }

    #[test]
    fn decode_fails_on_missing_refresh_flag() {
        #[derive(Serialize)]
        struct PartialClaims {
            sub: String,
            exp: i64,
        }

        let claims = PartialClaims {
            sub: "1".to_owned(),
            exp: (OffsetDateTime::now_utc() + Duration::minutes(5)).unix_timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"foobar"),
        )
        .unwrap();

        assert_eq!(get_service("foobar").decode(&token), Err(Error::InvalidToken));
    }

    #[test]
    fn user_id_fails_on_non_numeric_subject() {
        let mut claims = Claims::new(UserID::new(1), TokenKind::Access, Duration::minutes(5));
        claims.sub = "alice".to_owned();

        assert_eq!(claims.user_id(), Err(Error::InvalidToken));
    }
}
