//! Upstream dialing.
//!
//! Every admitted session gets its own upstream connection to the one
//! configured backend. `wss://` upstreams are handled by the client
//! transport's TLS support.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid upstream url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid upstream header {0:?}")]
    InvalidHeader(String),

    #[error("upstream handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

/// Dials the fixed upstream with the configured extra headers.
#[derive(Debug, Clone)]
pub struct UpstreamDialer {
    url: Url,
    headers: HeaderMap,
    connect_timeout: Duration,
}

impl UpstreamDialer {
    pub fn new(
        url: &str,
        headers: &BTreeMap<String, String>,
        connect_timeout: Duration,
    ) -> Result<Self, DialError> {
        let url = Url::parse(url).map_err(|source| DialError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let mut header_map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| DialError::InvalidHeader(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| DialError::InvalidHeader(name.clone()))?;
            header_map.append(header_name, header_value);
        }

        Ok(Self {
            url,
            headers: header_map,
            connect_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open a new WebSocket connection to the upstream.
    pub async fn dial(&self) -> Result<UpstreamSocket, DialError> {
        let mut request = self.url.as_str().into_client_request()?;
        for (name, value) in &self.headers {
            request.headers_mut().append(name.clone(), value.clone());
        }

        let (socket, response) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| DialError::Timeout(self.connect_timeout))??;

        tracing::debug!(
            upstream = %self.url,
            status = %response.status(),
            "Upstream connected"
        );
        Ok(socket)
    }
}
