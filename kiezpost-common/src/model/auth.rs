use crate::{
    model::{Id, user::{UserMarker, Username}},
    util::PositiveDuration,
};
use argon2::{
    Argon2, Params,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{DecodeError, Engine, display::Base64Display, prelude::BASE64_STANDARD};
use serde::{Deserialize, Deserializer, de::Error as DeError};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::UtcDateTime;

pub const AUTH_TOKEN_CORE_LEN: usize = 24;
pub const AUTH_TOKEN_SALT_LEN: usize = 18;
pub const AUTH_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing auth token failed: {0}")]
pub struct AuthTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AuthTokenDecodeError {
    #[error("Not enough parts separated by ':'")]
    NotEnoughParts,
    #[error("Invalid user id: {0}")]
    InvalidUserId(ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The length of the core part is incorrect")]
    InvalidCoreLength,
    #[error("The length of the salt part is incorrect")]
    InvalidSaltLength,
}

/// A bearer token as presented by clients: the owning user id plus random
/// core and salt bytes. Only the argon2 hash of the core is stored.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthToken {
    pub user_id: Id<UserMarker>,
    pub core: [u8; AUTH_TOKEN_CORE_LEN],
    pub salt: [u8; AUTH_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AuthTokenHash(Box<[u8; AUTH_TOKEN_HASH_LEN]>);

/// A stored session as fetched from the token table.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Authentication {
    pub user: Id<UserMarker>,
    pub token_hash: AuthTokenHash,
    pub created_at: UtcDateTime,
    pub expires_after: Option<PositiveDuration>,
}

impl Authentication {
    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        self.expires_after
            .is_some_and(|expires_after| self.created_at + expires_after.get() < now)
    }
}

impl AuthToken {
    #[must_use]
    pub fn generate_random(user_id: Id<UserMarker>) -> Self {
        let core = rand::random();
        let salt = rand::random();

        Self {
            user_id,
            core,
            salt,
        }
    }

    #[must_use]
    pub fn as_token_str(&self) -> String {
        let user_id = self.user_id;
        let encoded_core = Base64Display::new(&self.core, &BASE64_STANDARD);
        let encoded_salt = Base64Display::new(&self.salt, &BASE64_STANDARD);

        format!("{user_id}:{encoded_core}:{encoded_salt}")
    }

    pub fn hash(&self) -> Result<AuthTokenHash, AuthTokenHashError> {
        let argon2 = Argon2::default();

        let mut hash = Box::new([0; AUTH_TOKEN_HASH_LEN]);
        argon2
            .hash_password_into(&self.core, &self.salt, &mut *hash)
            .map_err(AuthTokenHashError)?;

        Ok(AuthTokenHash(hash))
    }
}

impl FromStr for AuthToken {
    type Err = AuthTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');

        let user_id_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let core_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;
        let salt_part = parts.next().ok_or(Self::Err::NotEnoughParts)?;

        let user_id = u64::from_str(user_id_part)
            .map_err(Self::Err::InvalidUserId)?
            .into();
        let core = BASE64_STANDARD
            .decode(core_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidCoreLength)?;
        let salt = BASE64_STANDARD
            .decode(salt_part)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            core,
            salt,
        })
    }
}

impl Debug for AuthToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_id", &self.user_id)
            .field("core", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl AuthTokenHash {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Debug for AuthTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The auth token hash had an invalid length")]
pub struct InvalidAuthTokenHashError;

impl TryFrom<Box<[u8]>> for AuthTokenHash {
    type Error = InvalidAuthTokenHashError;

    fn try_from(value: Box<[u8]>) -> Result<Self, Self::Error> {
        Ok(Self(
            value.try_into().map_err(|_| InvalidAuthTokenHashError)?,
        ))
    }
}

/// A plaintext password as supplied at signup or login. Never stored and
/// never printed.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Password(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The password must not be empty")]
pub struct InvalidPasswordError;

impl Password {
    pub fn new(password: String) -> Result<Self, InvalidPasswordError> {
        if password.is_empty() {
            Err(InvalidPasswordError)
        } else {
            Ok(Password(password))
        }
    }

    /// Hashes the password into a PHC string suitable for storage.
    pub fn hash(&self) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(self.0.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(hash.to_string())
    }

    /// Verifies the password against a stored PHC string.
    pub fn verify(&self, stored_hash: &str) -> Result<bool, PasswordHashError> {
        let parsed = PasswordHash::new(stored_hash).map_err(PasswordHashError)?;

        match Argon2::default().verify_password(self.0.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(PasswordHashError(err)),
        }
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(inner).map_err(DeError::custom)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct SignupRequest {
    pub username: Username,
    pub password: Password,
    pub bio: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct LoginRequest {
    pub username: Username,
    pub password: Password,
}

#[cfg(test)]
mod tests {
    use crate::{
        model::auth::{AuthToken, AuthTokenDecodeError, Authentication, Password},
        util::PositiveDuration,
    };
    use time::{Duration, macros::utc_datetime};

    #[test]
    fn token_roundtrips_through_its_string_form() {
        let token = AuthToken::generate_random(17_u64.into());
        let reparsed: AuthToken = token.as_token_str().parse().unwrap();

        assert_eq!(reparsed, token);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert_eq!(
            "17".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::NotEnoughParts)
        );
        assert!(matches!(
            "banana:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidUserId(_))
        ));
        assert_eq!(
            "17:AAAA:AAAA".parse::<AuthToken>(),
            Err(AuthTokenDecodeError::InvalidCoreLength)
        );
    }

    #[test]
    fn token_hash_is_deterministic() {
        let token = AuthToken::generate_random(3_u64.into());

        assert_eq!(token.hash().unwrap(), token.hash().unwrap());
    }

    #[test]
    fn expiry_is_measured_from_creation() {
        let created_at = utc_datetime!(2025-03-01 12:00);
        let authentication = Authentication {
            user: 1_u64.into(),
            token_hash: AuthToken::generate_random(1_u64.into()).hash().unwrap(),
            created_at,
            expires_after: Some(PositiveDuration::new_unchecked(Duration::days(30))),
        };

        assert!(!authentication.is_expired_at(created_at + Duration::days(29)));
        assert!(authentication.is_expired_at(created_at + Duration::days(31)));

        let unexpiring = Authentication {
            expires_after: None,
            ..authentication
        };
        assert!(!unexpiring.is_expired_at(created_at + Duration::days(10_000)));
    }

    #[test]
    fn password_hash_verifies() {
        let password = Password::new("hunter2".to_owned()).unwrap();
        let stored = password.hash().unwrap();

        assert!(password.verify(&stored).unwrap());

        let other = Password::new("hunter3".to_owned()).unwrap();
        assert!(!other.verify(&stored).unwrap());
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(Password::new(String::new()).is_err());
        assert!(serde_json::from_str::<Password>("\"\"").is_err());
        assert!(serde_json::from_str::<Password>("\"hunter2\"").is_ok());
    }
}
