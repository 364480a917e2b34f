//! Configuration for signing and validating auth tokens.

use std::str::FromStr;

use jsonwebtoken::Algorithm;
use time::Duration;

use crate::Error;

/// The settings the [crate::auth::TokenService] is built from.
///
/// This is constructed once at start-up and passed to the token service, so
/// tests can create services with their own secrets and lifetimes.
#[derive(Clone)]
pub struct TokenConfig {
    /// The shared secret used to sign and verify tokens.
    pub secret: String,
    /// The signing algorithm. Tokens signed with any other algorithm are rejected.
    pub algorithm: Algorithm,
    /// How long access tokens are valid for.
    pub access_token_duration: Duration,
    /// How long refresh tokens are valid for.
    pub refresh_token_duration: Duration,
}

impl TokenConfig {
    /// The default lifetime of an access token.
    pub const DEFAULT_ACCESS_TOKEN_DURATION: Duration = Duration::minutes(15);
    /// The default lifetime of a refresh token.
    pub const DEFAULT_REFRESH_TOKEN_DURATION: Duration = Duration::days(7);
    /// The longest an access token may be configured to live, one year.
    pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 60 * 24 * 365;
    /// The longest a refresh token may be configured to live, ten years.
    pub const MAX_REFRESH_TOKEN_DAYS: i64 = 365 * 10;

    /// Create a config from the raw settings, e.g. the server's command line
    /// arguments.
    ///
    /// `algorithm_name` is a JWT algorithm name such as "HS256". Only the HMAC
    /// family is supported since tokens are signed with a shared secret.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidConfig] if:
    /// - `secret` is empty,
    /// - `algorithm_name` is not a supported algorithm,
    /// - or either lifetime is not positive or is longer than
    ///   [Self::MAX_ACCESS_TOKEN_MINUTES] or [Self::MAX_REFRESH_TOKEN_DAYS].
    pub fn new(
        secret: &str,
        algorithm_name: &str,
        access_token_minutes: i64,
        refresh_token_days: i64,
    ) -> Result<Self, Error> {
        if secret.is_empty() {
            return Err(Error::InvalidConfig(
                "the token secret cannot be empty".to_owned(),
            ));
        }

        let algorithm = parse_hmac_algorithm(algorithm_name)?;

        if access_token_minutes <= 0 || refresh_token_days <= 0 {
            return Err(Error::InvalidConfig(
                "token lifetimes must be greater than zero".to_owned(),
            ));
        }

        if access_token_minutes > Self::MAX_ACCESS_TOKEN_MINUTES {
            return Err(Error::InvalidConfig(format!(
                "access tokens cannot live longer than {} minutes",
                Self::MAX_ACCESS_TOKEN_MINUTES
            )));
        }

        if refresh_token_days > Self::MAX_REFRESH_TOKEN_DAYS {
            return Err(Error::InvalidConfig(format!(
                "refresh tokens cannot live longer than {} days",
                Self::MAX_REFRESH_TOKEN_DAYS
            )));
        }

        Ok(Self {
            secret: secret.to_owned(),
            algorithm,
            access_token_duration: Duration::minutes(access_token_minutes),
            refresh_token_duration: Duration::days(refresh_token_days),
        })
    }

    /// Create a config with the HS256 algorithm and the default token lifetimes.
    pub fn with_defaults(secret: &str) -> Self {
        Self {
            secret: secret.to_owned(),
            algorithm: Algorithm::HS256,
            access_token_duration: Self::DEFAULT_ACCESS_TOKEN_DURATION,
            refresh_token_duration: Self::DEFAULT_REFRESH_TOKEN_DURATION,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"********")
            .field("algorithm", &self.algorithm)
            .field("access_token_duration", &self.access_token_duration)
            .field("refresh_token_duration", &self.refresh_token_duration)
            .finish()
    }
}

fn parse_hmac_algorithm(algorithm_name: &str) -> Result<Algorithm, Error> {
    let algorithm = Algorithm::from_str(algorithm_name).map_err(|_| {
        Error::InvalidConfig(format!("unknown signing algorithm \"{algorithm_name}\""))
    })?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(Error::InvalidConfig(format!(
            "signing algorithm \"{algorithm_name}\" needs a key pair, only HS256, HS384 and \
            HS512 are supported"
        ))),
    }
}
