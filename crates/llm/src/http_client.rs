//! HTTP Client Factory
//!
//! Provides a factory function for building reqwest clients with proxy support.

use std::time::Duration;

use crate::types::{LlmError, LlmResult};

/// Upper bound for a single provider round trip
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Build a `reqwest::Client` with the resolved proxy configuration.
///
/// - `Some(url)` -> configure proxy on the client (credentials may be embedded in the URL)
/// - `None` -> explicitly disable proxy (`no_proxy`), ignoring env vars
pub fn build_http_client(proxy_url: Option<&str>) -> LlmResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
    match proxy_url {
        Some(raw) => {
            let parsed = url::Url::parse(raw).map_err(|e| LlmError::InvalidRequest {
                message: format!("Invalid proxy URL '{}': {}", raw, e),
            })?;
            let mut proxy =
                reqwest::Proxy::all(parsed.as_str()).map_err(|e| LlmError::InvalidRequest {
                    message: format!("Invalid proxy URL '{}': {}", raw, e),
                })?;
            if !parsed.username().is_empty() {
                proxy = proxy.basic_auth(parsed.username(), parsed.password().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    builder.build().map_err(|e| LlmError::Other {
        message: format!("Failed to build HTTP client: {}", e),
    })
}
