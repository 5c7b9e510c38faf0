//! Where the callback sends the browser once the code exchange is settled.

use url::form_urlencoded;

use crate::config::OAuthConfig;
use crate::models::Platform;

/// Path component shared by the web route and the mobile deep link.
pub const CALLBACK_PATH: &str = "oauth-callback";

/// Error codes carried in `error=` on a failed callback redirect.
pub mod codes {
    pub const MISSING_PARAMETERS: &str = "missing_parameters";
    pub const INVALID_STATE: &str = "invalid_state";
    pub const TOKEN_EXCHANGE_FAILED: &str = "token_exchange_failed";
}

/// Post-callback redirect targets per platform.
#[derive(Debug, Clone)]
pub struct RedirectTargets {
    frontend_url: String,
    app_scheme: String,
}

impl RedirectTargets {
    pub fn new(frontend_url: impl Into<String>, app_scheme: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
            app_scheme: app_scheme.into(),
        }
    }

    pub fn from_config(config: &OAuthConfig) -> Self {
        Self::new(&config.frontend_url, &config.app_scheme)
    }

    fn base(&self, platform: Platform) -> String {
        if platform.is_mobile() {
            format!("{}://{}", self.app_scheme, CALLBACK_PATH)
        } else {
            format!("{}/{}", self.frontend_url, CALLBACK_PATH)
        }
    }

    /// `…/oauth-callback?sessionId=<id>&success=true`
    pub fn success(&self, platform: Platform, session_id: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("sessionId", session_id)
            .append_pair("success", "true")
            .finish();
        format!("{}?{}", self.base(platform), query)
    }

    /// `…/oauth-callback?error=<code>`
    pub fn error(&self, platform: Platform, code: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("error", code)
            .finish();
        format!("{}?{}", self.base(platform), query)
    }
}
