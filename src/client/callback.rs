//! Parsing of the OAuth completion redirect, from either the web route or a
//! mobile deep link.

use thiserror::Error;
use url::Url;

use crate::oauth::redirect::CALLBACK_PATH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success { session_id: String },
    Failure { error: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackParseError {
    #[error("not a URL: {0}")]
    InvalidUrl(String),
    #[error("not an oauth-callback address: {0}")]
    NotACallback(String),
    #[error("callback carries neither a session nor an error")]
    Incomplete,
}

impl CallbackOutcome {
    /// Parse `<scheme>://oauth-callback?...` or `<frontend>/oauth-callback?...`.
    pub fn from_url(raw: &str) -> Result<Self, CallbackParseError> {
        let url = Url::parse(raw).map_err(|_| CallbackParseError::InvalidUrl(raw.to_string()))?;

        let deep_link = url.host_str() == Some(CALLBACK_PATH);
        let web_route = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            == Some(CALLBACK_PATH);
        if !deep_link && !web_route {
            return Err(CallbackParseError::NotACallback(raw.to_string()));
        }

        Self::from_query_pairs(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())))
    }

    pub fn from_query_pairs<I>(pairs: I) -> Result<Self, CallbackParseError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut session_id = None;
        let mut success = false;
        let mut error = None;

        for (key, value) in pairs {
            match key.as_str() {
                "sessionId" if !value.is_empty() => session_id = Some(value),
                "success" => success = value == "true",
                "error" if !value.is_empty() => error = Some(value),
                _ => {}
            }
        }

        match (error, session_id) {
            (Some(error), _) => Ok(Self::Failure { error }),
            (None, Some(session_id)) if success => Ok(Self::Success { session_id }),
            _ => Err(CallbackParseError::Incomplete),
        }
    }
}
