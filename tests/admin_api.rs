//! Admin API over a real socket

use std::sync::Arc;

use tokio::net::TcpListener;

use dual_mode_transport::admin::{start_admin_server, AdminState, DualModeStatus, DUAL_MODE_STATUS_PATH};
use dual_mode_transport::config::DualModeConfig;

async fn spawn_admin(enabled: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AdminState { dual_mode: Arc::new(DualModeConfig::new(enabled)) };
    tokio::spawn(start_admin_server(listener, state));
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_dual_mode_status_disabled() {
    let base = spawn_admin(false).await;

    let response = reqwest::get(format!("{}{}", base, DUAL_MODE_STATUS_PATH)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "enabled": false }));
}

#[tokio::test]
async fn test_dual_mode_status_enabled() {
    let base = spawn_admin(true).await;

    assert_eq!(DUAL_MODE_STATUS_PATH, "/_opendistro/_security/ssl_dual_mode");
    let status: DualModeStatus = reqwest::get(format!("{}/_opendistro/_security/ssl_dual_mode", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(status.enabled);
}

#[tokio::test]
async fn test_health_and_unknown_route() {
    let base = spawn_admin(false).await;

    let health: serde_json::Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    assert!(health["timestamp"].is_string());

    let missing = reqwest::get(format!("{}/_opendistro/_security/unknown", base)).await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}
