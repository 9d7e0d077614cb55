//! In-process helpers for route tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use careline_core::error::GatewayFailure;
use careline_core::prompt::PromptPayload;
use serde_json::Value;
use tower::ServiceExt;

use crate::gateway::{BackendFuture, ModelBackend, ProbeOutcome};

pub const TEST_MODEL: &str = "gemini-test";
pub const TEST_API_VERSION: &str = "v1beta";

/// Backend that returns a fixed reply and counts generate calls.
pub struct ScriptedBackend {
    reply: Result<String, GatewayFailure>,
    probe: Option<ProbeOutcome>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            probe: Some(ProbeOutcome {
                success: true,
                message: "Gemini API connection successful".to_string(),
            }),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(failure: GatewayFailure) -> Self {
        Self {
            reply: Err(failure),
            ..Self::replying("")
        }
    }

    pub fn with_probe(mut self, success: bool, message: &str) -> Self {
        self.probe = Some(ProbeOutcome {
            success,
            message: message.to_string(),
        });
        self
    }

    /// Make the probe panic, simulating an unexpected fault.
    pub fn with_broken_probe(mut self) -> Self {
        self.probe = None;
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl ModelBackend for ScriptedBackend {
    fn model(&self) -> &str {
        TEST_MODEL
    }

    fn api_version(&self) -> &str {
        TEST_API_VERSION
    }

    fn generate<'a>(
        &'a self,
        _prompt: &'a PromptPayload,
    ) -> BackendFuture<'a, Result<String, GatewayFailure>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.clone();
        Box::pin(async move { reply })
    }

    fn probe(&self) -> BackendFuture<'_, ProbeOutcome> {
        let outcome = self.probe.clone();
        Box::pin(async move {
            match outcome {
                Some(outcome) => outcome,
                None => panic!("probe exploded"),
            }
        })
    }
}

/// Run one request through the router and decode the JSON body.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("request should succeed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = serde_json::from_slice(&bytes).expect("body should be JSON");
    (status, body)
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}
