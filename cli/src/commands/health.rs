use crate::util::api_request;

/// Probe the generative backend through the API (`GET /api/health`).
pub async fn run(api_url: &str, raw: bool) -> i32 {
    api_request(api_url, reqwest::Method::GET, "/api/health", None, raw).await
}
