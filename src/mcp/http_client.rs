//! Request/response capability listing.
//!
//! Some endpoints expose their tool list as a plain HTTP resource. The
//! listing is tried with POST first; a `404` or `405` answer to the POST is
//! retried once with GET on the same URL. Any other non-success status, a
//! transport failure, or a failed GET ends the attempt.

use reqwest::StatusCode;
use serde_json::{json, Value};

use super::IntrospectionError;
use crate::models::HttpMethod;

/// Outcome of one listing attempt that did not fail outright.
enum Attempt {
    Listed(Value),
    Fallback(StatusCode),
}

/// Attempt order for a requested listing method. Only POST falls back.
fn attempt_order(preferred: HttpMethod) -> &'static [HttpMethod] {
    match preferred {
        HttpMethod::Post => &[HttpMethod::Post, HttpMethod::Get],
        HttpMethod::Get => &[HttpMethod::Get],
    }
}

/// Fetches the capability payload, returning it with the method that worked.
pub async fn list_tools_over_http(
    client: &reqwest::Client,
    url: &str,
    preferred: HttpMethod,
) -> Result<(Value, HttpMethod), IntrospectionError> {
    let mut last_status = None;

    for &method in attempt_order(preferred) {
        match attempt(client, url, method).await? {
            Attempt::Listed(payload) => return Ok((payload, method)),
            Attempt::Fallback(status) => {
                tracing::debug!(
                    url = %url,
                    method = %method,
                    status = status.as_u16(),
                    "Listing method rejected, falling back"
                );
                last_status = Some(status);
            }
        }
    }

    Err(IntrospectionError::Status {
        url: url.to_string(),
        status: last_status.map(|s| s.as_u16()).unwrap_or_default(),
    })
}

async fn attempt(
    client: &reqwest::Client,
    url: &str,
    method: HttpMethod,
) -> Result<Attempt, IntrospectionError> {
    let mut request = client.request(method.into(), url);
    if method == HttpMethod::Post {
        request = request.json(&json!({}));
    }

    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(IntrospectionError::MalformedPayload(
                "empty response body".to_string(),
            ));
        }
        let payload = serde_json::from_slice(&body)
            .map_err(|e| IntrospectionError::MalformedPayload(e.to_string()))?;
        return Ok(Attempt::Listed(payload));
    }

    if method == HttpMethod::Post
        && matches!(status, StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED)
    {
        return Ok(Attempt::Fallback(status));
    }

    Err(IntrospectionError::Status {
        url: url.to_string(),
        status: status.as_u16(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_post_falls_back() {
        assert_eq!(
            attempt_order(HttpMethod::Post),
            &[HttpMethod::Post, HttpMethod::Get]
        );
        assert_eq!(attempt_order(HttpMethod::Get), &[HttpMethod::Get]);
    }
}
