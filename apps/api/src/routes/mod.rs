pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/cv/process", post(handlers::handle_process))
        .route("/api/v1/cv/compliance", post(handlers::handle_compliance))
        .route("/api/v1/cv/normalize", post(handlers::handle_normalize))
        .route("/api/v1/cv/filename", post(handlers::handle_filename))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::normalization::schema::tests::valid_candidate;
    use crate::pipeline::{Pipeline, PipelineSettings};
    use crate::structuring::fallback::tests::{Behavior, MockOracle};
    use crate::structuring::ProviderChain;

    const BOUNDARY: &str = "cvdraft-test-boundary";

    fn app(behavior: Behavior) -> Router {
        let config = Config::from_lookup(|key| match key {
            "ANTHROPIC_API_KEY" => Some("test".to_string()),
            _ => None,
        })
        .unwrap();
        let chain = ProviderChain::new(
            vec![MockOracle::new("anthropic", behavior)],
            Duration::from_secs(5),
        );
        let pipeline = Pipeline::new(chain, PipelineSettings::default());
        build_router(AppState { pipeline, config })
    }

    fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &str)]) -> String {
        let mut body = String::new();
        for (name, file, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file {
                Some((filename, content_type)) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: {content_type}\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_multipart(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/cv/process")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(Behavior::Fail), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "cvdraft");
        assert_eq!(body["providers"], json!(["anthropic"]));
    }

    #[tokio::test]
    async fn test_process_upload_returns_draft_and_filename() {
        let body = multipart_body(&[
            ("file", Some(("jane.txt", "text/plain")), "Jane Doe\nlead developer at Acme Ltd"),
            ("candidate_id", None, "C-1042"),
        ]);
        let (status, body) =
            send(app(Behavior::Answer(valid_candidate())), post_multipart(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["draft"]["experience"][0]["startDate"], "Jun 2019");
        assert_eq!(body["compliance"]["compliant"], true);
        assert_eq!(body["extraction"]["sourceFormat"], "plain_text");
        assert_eq!(body["filename"], "Jane (C-1042) EHS CV");
        assert!(body["draft"]["personalDetails"].get("dateOfBirth").is_none());
    }

    #[tokio::test]
    async fn test_process_requires_file_part() {
        let body = multipart_body(&[("candidate_id", None, "C-1")]);
        let (status, body) = send(app(Behavior::Fail), post_multipart(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_process_reports_failing_stage() {
        let body = multipart_body(&[("file", Some(("photo.png", "image/png")), "not a cv")]);
        let (status, body) = send(app(Behavior::Fail), post_multipart(body)).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["stage"], "extraction");

        let body = multipart_body(&[("file", Some(("cv.txt", "text/plain")), "Jane Doe")]);
        let (status, body) = send(app(Behavior::Fail), post_multipart(body)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "ALL_PROVIDERS_FAILED");
        assert_eq!(body["error"]["stage"], "structuring");
    }

    #[tokio::test]
    async fn test_compliance_endpoint_scores_without_reprocessing() {
        let mut draft = valid_candidate();
        draft["font"] = json!("Times New Roman");
        let (status, body) = send(
            app(Behavior::Fail),
            post_json("/api/v1/cv/compliance", draft),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["compliant"], false);
        assert!(body["issues"]
            .as_array()
            .unwrap()
            .iter()
            .any(|i| i.as_str().unwrap().contains("Arial")));
    }

    #[tokio::test]
    async fn test_compliance_endpoint_rejects_invalid_draft() {
        let (status, body) = send(
            app(Behavior::Fail),
            post_json("/api/v1/cv/compliance", json!({"profile": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INVALID_DRAFT");
        assert_eq!(body["error"]["stage"], "validation");
    }

    #[tokio::test]
    async fn test_normalize_endpoint() {
        let (status, body) = send(
            app(Behavior::Fail),
            post_json("/api/v1/cv/normalize", valid_candidate()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["draft"]["profile"], "Responsible for leading teams.");
        assert_eq!(body["draft"]["header"]["title"], "Lead Developer");
        assert_eq!(body["compliance"]["score"], 100);
    }

    #[tokio::test]
    async fn test_filename_endpoint() {
        let (status, body) = send(
            app(Behavior::Fail),
            post_json(
                "/api/v1/cv/filename",
                json!({"draft": valid_candidate(), "candidate_id": "77", "client_label": "Acme"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filename"], "Jane (77) Acme CV");

        let (status, _) = send(
            app(Behavior::Fail),
            post_json(
                "/api/v1/cv/filename",
                json!({"draft": valid_candidate(), "candidate_id": " "}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_over_body_limit_is_rejected() {
        let config = Config::from_lookup(|key| match key {
            "ANTHROPIC_API_KEY" => Some("test".to_string()),
            "MAX_UPLOAD_BYTES" => Some("256".to_string()),
            _ => None,
        })
        .unwrap();
        let oracle = MockOracle::new("anthropic", Behavior::Answer(valid_candidate()));
        let chain = ProviderChain::new(vec![oracle.clone()], Duration::from_secs(5));
        let pipeline = Pipeline::new(chain, PipelineSettings::default());
        let app = build_router(AppState { pipeline, config });

        let text = "x".repeat(4096);
        let body = multipart_body(&[("file", Some(("cv.txt", "text/plain")), &text)]);
        let (status, body) = send(app, post_multipart(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }
}
