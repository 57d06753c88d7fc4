//! Server construction and startup: key loading, misconfiguration and the
//! upstream probe.

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use ws_auth_proxy::http::{ProxyServer, ServerError};
use ws_auth_proxy::keys::KeyError;
use ws_auth_proxy::lifecycle::startup::{self, StartupError};
use ws_auth_proxy::ProxyConfig;

mod common;

use common::proxy_config;

const SECRET_ID: &str = "prod/ws-proxy/keys";

/// Minimal Secrets Manager endpoint answering GetSecretValue for
/// [`SECRET_ID`] with the given value fields.
async fn start_secrets_backend(value: serde_json::Value) -> SocketAddr {
    let app = Router::new().route(
        "/",
        post(move |headers: HeaderMap, body: String| async move {
            let target = headers
                .get("x-amz-target")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let request: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();

            if target != "secretsmanager.GetSecretValue" || request["SecretId"] != SECRET_ID {
                let error = serde_json::json!({
                    "__type": "ResourceNotFoundException",
                    "message": "Secrets Manager can't find the specified secret.",
                });
                return (
                    StatusCode::BAD_REQUEST,
                    [(header::CONTENT_TYPE, "application/x-amz-json-1.1")],
                    error.to_string(),
                )
                    .into_response();
            }

            let mut response = serde_json::json!({
                "ARN": format!("arn:aws:secretsmanager:us-east-1:000000000000:secret:{SECRET_ID}"),
                "Name": SECRET_ID,
            });
            if let (Some(fields), Some(extra)) = (response.as_object_mut(), value.as_object()) {
                fields.extend(extra.clone());
            }
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/x-amz-json-1.1")],
                response.to_string(),
            )
                .into_response()
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn secret_string(keys: &str) -> serde_json::Value {
    serde_json::json!({ "SecretString": keys })
}

fn secrets_config(backend: SocketAddr, secret_id: &str) -> ProxyConfig {
    secrets_config_for(backend, secret_id, "127.0.0.1:9".parse().unwrap())
}

fn secrets_config_for(backend: SocketAddr, secret_id: &str, upstream: SocketAddr) -> ProxyConfig {
    let mut config = proxy_config(upstream);
    config.auth.mode = "header".into();
    config.key_manager.mode = "secrets-backend".into();
    config.key_manager.identifier = secret_id.into();
    config.key_manager.secrets.region = Some("us-east-1".into());
    config.key_manager.secrets.endpoint_url = Some(format!("http://{backend}"));
    config.key_manager.secrets.access_key_id = Some("test".into());
    config.key_manager.secrets.secret_access_key = Some("test".into());
    config
}

#[tokio::test]
async fn key_file_with_invalid_json_fails_construction() {
    let keys = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(keys.path(), b"{not json").unwrap();

    let mut config = proxy_config("127.0.0.1:9".parse().unwrap());
    config.auth.mode = "param".into();
    config.key_manager.mode = "file".into();
    config.key_manager.identifier = keys.path().display().to_string();

    let err = ProxyServer::new(&config).await.err().unwrap();
    assert!(matches!(err, ServerError::KeyFetch(KeyError::Parse { .. })), "{err}");
}

#[tokio::test]
async fn missing_key_file_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = proxy_config("127.0.0.1:9".parse().unwrap());
    config.auth.mode = "header".into();
    config.key_manager.mode = "file".into();
    config.key_manager.identifier = dir.path().join("absent.json").display().to_string();

    let err = ProxyServer::new(&config).await.err().unwrap();
    assert!(matches!(err, ServerError::KeyFetch(KeyError::Io { .. })), "{err}");
}

#[tokio::test]
async fn auth_and_key_manager_must_be_configured_together() {
    let keys = common::write_key_file(&["abc123"]);

    let mut config = proxy_config("127.0.0.1:9".parse().unwrap());
    config.auth.mode = "header".into();
    let err = ProxyServer::new(&config).await.err().unwrap();
    assert!(matches!(err, ServerError::AuthWithoutKeyManager { .. }));

    let mut config = proxy_config("127.0.0.1:9".parse().unwrap());
    config.key_manager.mode = "file".into();
    config.key_manager.identifier = keys.path().display().to_string();
    let err = ProxyServer::new(&config).await.err().unwrap();
    assert!(matches!(err, ServerError::KeyManagerWithoutAuth { .. }));
}

#[tokio::test]
async fn keys_from_the_secrets_backend_gate_admission() {
    let backend = start_secrets_backend(secret_string(r#"["abc123","def456"]"#)).await;
    let upstream = common::start_echo_upstream().await;
    let proxy = common::start_proxy(secrets_config_for(backend, SECRET_ID, upstream)).await;

    let mut ws = common::connect(&proxy.url("/"), &[("x-api-key", "abc123")])
        .await
        .unwrap();
    ws.send(Message::text("ping".to_string())).await.unwrap();
    assert_eq!(common::next_data(&mut ws).await, Message::text("ping".to_string()));

    assert!(common::connect(&proxy.url("/"), &[("x-api-key", "def456")]).await.is_ok());

    let wrong = common::connect(&proxy.url("/"), &[("x-api-key", "wrong")]).await;
    assert_eq!(common::rejection_status(wrong), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn binary_only_secret_is_missing_its_string() {
    // SecretBinary is a base64 blob; the key list must be a SecretString.
    let backend = start_secrets_backend(serde_json::json!({ "SecretBinary": "WyJhYmMxMjMiXQ==" })).await;
    let err = ProxyServer::new(&secrets_config(backend, SECRET_ID))
        .await
        .err()
        .unwrap();
    assert!(
        matches!(err, ServerError::KeyFetch(KeyError::MissingSecretString(_))),
        "{err}"
    );
}

#[tokio::test]
async fn unknown_secret_is_a_backend_error() {
    let backend = start_secrets_backend(secret_string(r#"["abc123"]"#)).await;
    let err = ProxyServer::new(&secrets_config(backend, "missing"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ServerError::KeyFetch(KeyError::Backend { .. })), "{err}");
}

#[tokio::test]
async fn secret_that_is_not_a_key_list_is_a_parse_error() {
    let backend = start_secrets_backend(secret_string(r#"{"key":"abc123"}"#)).await;
    let err = ProxyServer::new(&secrets_config(backend, SECRET_ID))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ServerError::KeyFetch(KeyError::Parse { .. })), "{err}");
}

#[tokio::test]
async fn probe_against_unreachable_upstream_fails_startup() {
    let upstream = common::unused_addr().await;
    let mut config = proxy_config(upstream);
    config.lifecycle.probe_upstream = true;
    config.timeouts.connect_secs = 2;

    let err = startup::start(&config).await.err().unwrap();
    assert!(matches!(err, StartupError::Probe(_)), "{err}");
}

#[tokio::test]
async fn start_probes_upstream_and_binds_listener() {
    let upstream = common::start_echo_upstream().await;
    let mut config = proxy_config(upstream);
    config.lifecycle.probe_upstream = true;

    let (server, listener) = startup::start(&config).await.unwrap();
    assert_eq!(server.session_count(), 0);
    assert_ne!(listener.local_addr().unwrap().port(), 0);
}

#[tokio::test]
async fn simple_server_proxies_without_auth() {
    let upstream = common::start_echo_upstream().await;
    let server = ProxyServer::simple(&format!("ws://{upstream}")).await.unwrap();
    let mut probe = server.dial().await.unwrap();
    probe.close(None).await.unwrap();
}
