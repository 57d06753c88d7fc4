//! API key authentication strategies.

use std::borrow::Cow;

use axum::http::{HeaderMap, Uri};

use crate::keys::KeyStore;

pub const AUTH_PARAM: &str = "param";
pub const AUTH_HEADER: &str = "header";

/// Query parameter read by [`AuthStrategy::Param`].
pub const API_KEY_PARAM: &str = "apikey";
/// Header read by [`AuthStrategy::Header`].
pub const API_KEY_HEADER: &str = "x-api-key";

/// How a client presents its API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStrategy {
    /// `?apikey=<key>` on the upgrade URL.
    Param,
    /// `X-API-KEY: <key>` request header.
    Header,
    /// No authentication; every request is admitted.
    #[default]
    Disabled,
}

impl AuthStrategy {
    /// Resolve the configured mode. Unrecognized modes yield `Disabled`.
    pub fn from_mode(mode: &str) -> Self {
        match mode {
            AUTH_PARAM => AuthStrategy::Param,
            AUTH_HEADER => AuthStrategy::Header,
            "" => AuthStrategy::Disabled,
            other => {
                tracing::warn!(mode = %other, "Unrecognized auth mode, authentication disabled");
                AuthStrategy::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, AuthStrategy::Disabled)
    }

    /// Pull the candidate key out of the request. A missing key is "".
    pub fn extract_key<'a>(&self, uri: &'a Uri, headers: &'a HeaderMap) -> Cow<'a, str> {
        match self {
            AuthStrategy::Param => uri
                .query()
                .and_then(|query| {
                    url::form_urlencoded::parse(query.as_bytes())
                        .find(|(name, _)| name == API_KEY_PARAM)
                        .map(|(_, value)| value)
                })
                .unwrap_or_default(),
            AuthStrategy::Header => headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(Cow::Borrowed)
                .unwrap_or_default(),
            AuthStrategy::Disabled => Cow::Borrowed(""),
        }
    }

    /// Decide whether the request carries a valid key.
    pub fn authenticate(&self, uri: &Uri, headers: &HeaderMap, keys: &KeyStore) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let key = self.extract_key(uri, headers);
        let valid = keys.validate(&key);
        if !valid {
            tracing::debug!(strategy = ?self, "API key rejected");
        }
        valid
    }
}
