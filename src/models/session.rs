//! Local session records binding an opaque id to OAuth tokens.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Client platform a sign-in was started from; fixes the callback redirect target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Web,
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }

    /// Mobile platforms receive the callback through an app deep link.
    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Android | Platform::Ios)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported platform '{0}'; expected one of web, android, ios")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            _ => Err(UnknownPlatform(value.to_string())),
        }
    }
}

/// Opaque bearer credential; wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

/// Token material returned by the identity provider.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: SecretToken,
    pub refresh_token: Option<SecretToken>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Authentication state of a session. A session is either pending with the
/// anti-forgery nonce it was issued, or authenticated with its tokens.
#[derive(Debug, Clone)]
pub enum SessionAuth {
    Pending {
        nonce: SecretToken,
    },
    Authenticated {
        tokens: TokenBundle,
        /// Absent when the provider did not report a lifetime.
        expires_at: Option<DateTime<Utc>>,
    },
}

/// A local session record.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub platform: Platform,
    pub auth: SessionAuth,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a pending session stamped with `now`.
    pub fn pending(
        session_id: impl Into<String>,
        platform: Platform,
        nonce: SecretToken,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            platform,
            auth: SessionAuth::Pending { nonce },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, SessionAuth::Authenticated { .. })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match &self.auth {
            SessionAuth::Authenticated { expires_at, .. } => *expires_at,
            SessionAuth::Pending { .. } => None,
        }
    }

    /// Whether the session carries a token whose lifetime has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at <= now)
    }

    /// Access token usable at `now`, if any.
    pub fn valid_access_token(&self, now: DateTime<Utc>) -> Option<&SecretToken> {
        match &self.auth {
            SessionAuth::Authenticated { tokens, expires_at } => match expires_at {
                Some(expires_at) if *expires_at <= now => None,
                _ => Some(&tokens.access_token),
            },
            SessionAuth::Pending { .. } => None,
        }
    }
}

/// Partial update merged into an existing session.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub platform: Option<Platform>,
    pub auth: Option<SessionAuth>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn authenticated(expires_at: Option<DateTime<Utc>>) -> Session {
        let now = Utc::now();
        Session {
            session_id: "s1".to_string(),
            platform: Platform::Web,
            auth: SessionAuth::Authenticated {
                tokens: TokenBundle {
                    access_token: SecretToken::new("tok"),
                    refresh_token: None,
                    token_type: Some("Bearer".to_string()),
                    scope: None,
                },
                expires_at,
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!("web".parse::<Platform>(), Ok(Platform::Web));
        assert_eq!("Android".parse::<Platform>(), Ok(Platform::Android));
        assert_eq!(" ios ".parse::<Platform>(), Ok(Platform::Ios));
        assert!("windows".parse::<Platform>().is_err());
        assert_eq!(Platform::default(), Platform::Web);
    }

    #[test]
    fn test_secret_token_debug_is_redacted() {
        let token = SecretToken::new("ya29.secret");
        let printed = format!("{:?}", token);
        assert!(!printed.contains("ya29"));
    }

    #[test]
    fn test_pending_session_has_no_token() {
        let session = Session::pending("s1", Platform::Web, SecretToken::new("n"), Utc::now());
        assert!(!session.is_authenticated());
        assert!(session.valid_access_token(Utc::now()).is_none());
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn test_token_without_expiry_is_valid() {
        let session = authenticated(None);
        assert!(session.valid_access_token(Utc::now()).is_some());
    }

    #[test]
    fn test_expired_token_is_not_usable() {
        let now = Utc::now();
        let session = authenticated(Some(now - Duration::seconds(1)));
        assert!(session.is_expired(now));
        assert!(session.valid_access_token(now).is_none());

        let fresh = authenticated(Some(now + Duration::seconds(60)));
        assert_eq!(
            fresh.valid_access_token(now).map(SecretToken::expose),
            Some("tok")
        );
    }
}
