//! Form-to-JSON middleware.
//! Converts eligible form posts before the next handler sees them.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::form::{classify, Form2Json};
use crate::http::request::RequestIdExt;
use crate::observability::metrics;

/// Middleware function, installed with
/// `axum::middleware::from_fn_with_state(converter, form2json)`.
pub async fn form2json(
    State(converter): State<Form2Json>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();

    // 1. Passthrough for anything that is not a POSTed form.
    let Some(kind) = classify(request.method(), request.headers()) else {
        metrics::record_request("passthrough", start);
        return next.run(request).await;
    };

    let request_id = request.request_id().to_owned();
    let path = request.uri().path().to_owned();

    // 2. Convert, then hand over.
    match converter.convert(request, kind).await {
        Ok(request) => {
            metrics::record_request("converted", start);
            next.run(request).await
        }
        Err(e) => {
            metrics::record_request(e.label(), start);
            if e.is_client_error() {
                tracing::warn!(request_id = %request_id, path = %path, error = %e, "Rejected malformed form");
            } else {
                tracing::error!(request_id = %request_id, path = %path, error = %e, "Form conversion failed");
            }
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        http::{header, HeaderMap, Method, StatusCode},
        middleware::from_fn_with_state,
        routing::any,
        Router,
    };
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::FormConfig;
    use crate::form::{CONTENT_TYPE_CLASS, CONTENT_TYPE_CLASS_HEADER};

    const BOUNDARY: &str = "----middleware-test";

    /// What the next handler saw.
    async fn capture(State(calls): State<Arc<AtomicUsize>>, request: Request<Body>) -> Response {
        calls.fetch_add(1, Ordering::SeqCst);
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let mut headers = HeaderMap::new();
        for name in [header::CONTENT_TYPE, header::CONTENT_LENGTH] {
            if let Some(value) = parts.headers.get(&name) {
                headers.insert(name, value.clone());
            }
        }
        if let Some(value) = parts.headers.get(CONTENT_TYPE_CLASS_HEADER) {
            headers.insert(CONTENT_TYPE_CLASS_HEADER, value.clone());
        }
        (headers, body).into_response()
    }

    fn app(config: FormConfig) -> (Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/", any(capture))
            .with_state(calls.clone())
            .layer(from_fn_with_state(Form2Json::new(config), form2json));
        (router, calls)
    }

    fn multipart(parts: &[String]) -> String {
        let mut body = String::new();
        for part in parts {
            body.push_str(&format!("--{}\r\n{}\r\n", BOUNDARY, part));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    fn text_field(name: &str, value: &str) -> String {
        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value)
    }

    fn file_field(name: &str, file_name: &str, content_type: &str, data: &str) -> String {
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n{}",
            name, file_name, content_type, data
        )
    }

    fn post(content_type: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap()
    }

    fn multipart_post(body: String) -> Request<Body> {
        post(&format!("multipart/form-data; boundary={}", BOUNDARY), body)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    fn parts_of(body: &[u8]) -> Vec<Value> {
        serde_json::from_slice::<Value>(body).unwrap().as_array().unwrap().clone()
    }

    #[tokio::test]
    async fn test_avatar_scenario() {
        let (router, calls) = app(FormConfig::default());
        let body = multipart(&[
            text_field("name", "Alice"),
            file_field("avatar", "avatar.png", "image/png", "PNGDATA"),
        ]);

        let (status, headers, body) = send(router, multipart_post(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[CONTENT_TYPE_CLASS_HEADER], CONTENT_TYPE_CLASS);
        assert_eq!(headers[header::CONTENT_LENGTH], body.len().to_string().as_str());
        assert_eq!(
            parts_of(&body),
            vec![
                json!({"name": "name", "type": "field/text", "value": "Alice"}),
                json!({
                    "name": "avatar",
                    "type": "file/base64",
                    "value": "UE5HREFUQQ==",
                    "content_type": "image/png",
                    "file_name": "avatar.png"
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_urlencoded_repeated_values_keep_order() {
        let (router, _) = app(FormConfig::default());
        let (status, _, body) = send(router, post("application/x-www-form-urlencoded", "a=1&a=2")).await;

        assert_eq!(status, StatusCode::OK);
        let parts = parts_of(&body);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p["name"] == "a" && p["type"] == "field/text"));
        assert_eq!(parts[0]["value"], "1");
        assert_eq!(parts[1]["value"], "2");
    }

    #[tokio::test]
    async fn test_text_only_form_has_one_part_per_pair() {
        let (router, _) = app(FormConfig::default());
        let body = multipart(&[
            text_field("city", "Oslo"),
            text_field("tags", "x"),
            text_field("zip", "0150"),
            text_field("tags", "y"),
        ]);

        let (_, _, body) = send(router, multipart_post(body)).await;
        let parts = parts_of(&body);

        assert_eq!(parts.len(), 4);
        for part in &parts {
            assert_eq!(part["type"], "field/text");
            assert!(part.get("content_type").is_none());
            assert!(part.get("file_name").is_none());
        }
        let tags: Vec<&str> = parts
            .iter()
            .filter(|p| p["name"] == "tags")
            .map(|p| p["value"].as_str().unwrap())
            .collect();
        assert_eq!(tags, vec!["x", "y"]);
        let mut names: Vec<&str> = parts.iter().map(|p| p["name"].as_str().unwrap()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["city", "tags", "tags", "zip"]);
    }

    #[tokio::test]
    async fn test_files_follow_text_fields() {
        let (router, _) = app(FormConfig::default());
        let body = multipart(&[
            file_field("docs", "a.txt", "text/plain", "first"),
            text_field("title", "report"),
            file_field("docs", "b.txt", "text/plain", "second"),
        ]);

        let (_, _, body) = send(router, multipart_post(body)).await;
        let parts = parts_of(&body);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["type"], "field/text");
        assert_eq!(parts[1]["file_name"], "a.txt");
        assert_eq!(parts[2]["file_name"], "b.txt");
        assert_eq!(STANDARD.decode(parts[2]["value"].as_str().unwrap()).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_spill_path_is_transparent() {
        let (router, _) = app(FormConfig { memory_limit: 10, ..FormConfig::default() });
        let data = "z".repeat(1000);
        let body = multipart(&[file_field("blob", "blob.txt", "text/plain", &data)]);

        let (status, _, body) = send(router, multipart_post(body)).await;

        assert_eq!(status, StatusCode::OK);
        let parts = parts_of(&body);
        let decoded = STANDARD.decode(parts[0]["value"].as_str().unwrap()).unwrap();
        assert_eq!(decoded.len(), 1000);
        assert_eq!(decoded, data.as_bytes());
    }

    #[tokio::test]
    async fn test_get_passes_through_unchanged() {
        let (router, calls) = app(FormConfig::default());
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("a=1"))
            .unwrap();

        let (status, headers, body) = send(router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert!(headers.get(CONTENT_TYPE_CLASS_HEADER).is_none());
        assert_eq!(body, b"a=1");
    }

    #[tokio::test]
    async fn test_json_post_passes_through_unchanged() {
        let (router, _) = app(FormConfig::default());
        let (status, headers, body) = send(router, post("application/json", r#"{"a":1}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert!(headers.get(CONTENT_TYPE_CLASS_HEADER).is_none());
        assert_eq!(body, br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_corrupted_boundary_is_bad_request() {
        let (router, calls) = app(FormConfig::default());
        let body = multipart(&[text_field("name", "Alice")]);
        let request = post("multipart/form-data; boundary=not-the-declared-one", body);

        let (status, _, _) = send(router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "next handler must not run");
    }

    #[tokio::test]
    async fn test_truncated_body_is_bad_request() {
        let (router, calls) = app(FormConfig::default());
        let body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAli",
            BOUNDARY
        );

        let (status, _, _) = send(router, multipart_post(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
