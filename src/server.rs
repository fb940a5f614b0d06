//! HTTP surface: push webhooks, a test email trigger and a liveness probe.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::WebhookError;
use crate::pipeline::Orchestrator;

/// State shared by all requests. Immutable after startup.
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    test_recipient: Option<String>,
}

impl AppState {
    /// Wraps an orchestrator; `/test-email` is disabled without a recipient.
    pub fn new(orchestrator: Arc<Orchestrator>, test_recipient: Option<String>) -> Self {
        Self {
            orchestrator,
            test_recipient,
        }
    }
}

/// Builds the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/test-email", post(test_email))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> (StatusCode, String) {
    match state.orchestrator.handle_webhook(&body).await {
        Ok(1) => (
            StatusCode::OK,
            "Webhook processed and email sent for the latest commit.".to_string(),
        ),
        Ok(count) => (
            StatusCode::OK,
            format!("Webhook processed and emails sent for {count} commits."),
        ),
        Err(WebhookError::Payload(e)) => {
            warn!(error = %e, "Rejected webhook payload");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ WebhookError::Delivery { .. }) => {
            error!(error = %e, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing the webhook.".to_string(),
            )
        }
    }
}

async fn test_email(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    let Some(recipient) = state.test_recipient.as_deref() else {
        return (
            StatusCode::BAD_REQUEST,
            "Test email recipient is not configured.",
        );
    };

    match state.orchestrator.send_test_email(recipient).await {
        Ok(()) => (StatusCode::OK, "Test email sent successfully!"),
        Err(e) => {
            error!(error = %e, "Error sending test email");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error sending test email.")
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Serves `state` on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::ai::test_utils::ConfigurableMockAiClient;
    use crate::analysis::AnalysisEngine;
    use crate::commit::GitDiffExtractor;
    use crate::config::PipelineConfig;
    use crate::notify::test_utils::RecordingNotifier;
    use crate::staging::ArtifactStager;

    const PUSH: &str = r#"{
        "commits": [{
            "id": "0123456789abcdef",
            "message": "Add parser",
            "author": { "email": "dev@example.com" },
            "added": ["src/parser.py"],
            "modified": []
        }]
    }"#;

    fn orchestrator(
        notifier: &RecordingNotifier,
        responses: Vec<anyhow::Result<String>>,
    ) -> (Orchestrator, TempDir) {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(
            AnalysisEngine::new(
                Box::new(ConfigurableMockAiClient::new(responses)),
                Duration::from_secs(5),
            ),
            Arc::new(GitDiffExtractor::new(dir.path())),
            ArtifactStager::in_memory(),
            Arc::new(notifier.clone()),
            PipelineConfig::default(),
        );
        (orchestrator, dir)
    }

    fn app_with(
        notifier: &RecordingNotifier,
        test_recipient: Option<&str>,
        responses: Vec<anyhow::Result<String>>,
    ) -> (Router, TempDir) {
        let (orchestrator, dir) = orchestrator(notifier, responses);
        let state = AppState::new(Arc::new(orchestrator), test_recipient.map(String::from));
        (create_router(Arc::new(state)), dir)
    }

    fn app(notifier: &RecordingNotifier, test_recipient: Option<&str>) -> (Router, TempDir) {
        app_with(
            notifier,
            test_recipient,
            vec![Ok(
                "Language: Python\n```python\nparse()\n```\nLooks good.".to_string(),
            )],
        )
    }

    fn assert_handler<T, H>(_handler: H)
    where
        H: axum::handler::Handler<T, Arc<AppState>>,
    {
    }

    fn assert_send<T: Send>(_value: &T) {}

    #[test]
    fn handlers_accept_a_real_orchestrator() {
        assert_handler(webhook);
        assert_handler(test_email);
        assert_handler(health);

        let notifier = RecordingNotifier::new();
        let (orchestrator, _dir) = orchestrator(&notifier, Vec::new());
        assert_send(&orchestrator.handle_webhook(PUSH.as_bytes()));
        assert_send(&orchestrator.send_test_email("qa@example.com"));

        let state = AppState::new(Arc::new(orchestrator), None);
        let _router: Router = create_router(Arc::new(state));
    }

    async fn call(router: Router, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn webhook_delivers_report() {
        let notifier = RecordingNotifier::new();
        let (router, _dir) = app(&notifier, None);

        let (status, body) = call(router, "POST", "/webhook", PUSH).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Webhook processed and email sent for the latest commit.");
        let reports = notifier.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].attachments[0].filename, "corrected_src_parser.py_0123456.py");
    }

    #[tokio::test]
    async fn webhook_attaches_every_added_and_modified_file() {
        let notifier = RecordingNotifier::new();
        let (router, _dir) = app_with(
            &notifier,
            None,
            // Files are reviewed concurrently, so every answer is the same.
            vec![
                Ok("No changes needed.".to_string()),
                Ok("No changes needed.".to_string()),
                Ok("No changes needed.".to_string()),
            ],
        );
        let payload = r#"{
            "commits": [{
                "id": "0123456789abcdef",
                "message": "Parser, docs and view",
                "author": { "email": "dev@example.com" },
                "added": ["src/parser.py", "docs/notes.md"],
                "modified": ["web/view.js"]
            }]
        }"#;

        let (status, _) = call(router, "POST", "/webhook", payload).await;

        assert_eq!(status, StatusCode::OK);
        let reports = notifier.reports();
        let names: Vec<_> = reports[0]
            .attachments
            .iter()
            .map(|a| a.filename.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "corrected_src_parser.py_0123456.py",
                "corrected_docs_notes.md_0123456.md",
                "corrected_web_view.js_0123456.js",
            ]
        );
        assert_eq!(
            reports[0].attachments[2].content,
            b"// Changes in web/view.js\n(diff unavailable)\n"
        );
    }

    #[tokio::test]
    async fn empty_commits_is_a_client_error() {
        let notifier = RecordingNotifier::new();
        let (router, _dir) = app(&notifier, None);

        let (status, body) = call(router, "POST", "/webhook", r#"{"commits": []}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "No commits found in the payload");
        assert!(notifier.reports().is_empty());
    }

    #[tokio::test]
    async fn non_json_body_is_a_client_error() {
        let notifier = RecordingNotifier::new();
        let (router, _dir) = app(&notifier, None);

        let (status, _) = call(router, "POST", "/webhook", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delivery_failure_is_a_server_error() {
        let notifier = RecordingNotifier::failing();
        let (router, _dir) = app(&notifier, None);

        let (status, body) = call(router, "POST", "/webhook", PUSH).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error processing the webhook.");
    }

    #[tokio::test]
    async fn test_email_requires_recipient() {
        let notifier = RecordingNotifier::new();
        let (router, _dir) = app(&notifier, None);

        let (status, _) = call(router, "POST", "/test-email", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(notifier.reports().is_empty());
    }

    #[tokio::test]
    async fn test_email_is_sent() {
        let notifier = RecordingNotifier::new();
        let (router, _dir) = app(&notifier, Some("qa@example.com"));

        let (status, body) = call(router, "POST", "/test-email", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Test email sent successfully!");
        assert_eq!(notifier.reports()[0].to, "qa@example.com");
    }

    #[tokio::test]
    async fn test_email_failure_is_a_server_error() {
        let notifier = RecordingNotifier::failing();
        let (router, _dir) = app(&notifier, Some("qa@example.com"));

        let (status, body) = call(router, "POST", "/test-email", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error sending test email.");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let notifier = RecordingNotifier::new();
        let (router, _dir) = app(&notifier, None);

        let (status, body) = call(router, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
