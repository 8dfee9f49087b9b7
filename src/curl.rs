use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{header::HeaderMap, Client, StatusCode};

use crate::{
    check::{response::error_chain, ResponseCheck},
    request::RequestOption,
    Abort, TestHelper,
};

/// A response whose body has been read in full.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Everything a [`ResponseCheck`] can look at for one request.
#[derive(Debug)]
pub struct Exchange {
    /// `None` when the request failed before a response arrived.
    pub response: Option<HttpResponse>,
    pub error: Option<reqwest::Error>,
    /// Time from sending the request until the response headers arrived.
    pub duration: Duration,
}

impl Exchange {
    /// The body, or an empty slice when there is no response.
    pub fn body(&self) -> &[u8] {
        self.response
            .as_ref()
            .map(|r| r.body.as_ref())
            .unwrap_or_default()
    }
}

/// Sends a GET to `url` and runs `checks` against the result, in order.
///
/// A transport error is not fatal by itself: it is logged and handed to the
/// checks, so `request_fails` style checks can assert on it. Failing to apply
/// `option`, to build the client, or to read the body is fatal. The first
/// fatal check stops the remaining ones.
///
/// Returns the response body, or an empty body after a transport error.
pub async fn request(
    t: &dyn TestHelper,
    url: &str,
    option: impl RequestOption,
    checks: &[ResponseCheck],
) -> Result<Bytes, Abort> {
    let builder = option
        .apply_to_client(Client::builder())
        .map_err(|err| t.fatal(&format!("failed to apply request options: {err}")))?;
    let builder = match t.config().request_timeout() {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    };
    let client = builder
        .build()
        .map_err(|err| t.fatal(&format!("failed to create HTTP client: {}", error_chain(&err))))?;
    let request = option
        .apply_to_request(client.get(url))
        .map_err(|err| t.fatal(&format!("failed to apply request options: {err}")))?;

    let start = Instant::now();
    let sent = request.send().await;
    let duration = start.elapsed();

    let exchange = match sent {
        Ok(response) => {
            let status = response.status();
            let headers = response.headers().clone();
            // consumes the response, which returns the connection to the pool
            let body = response.bytes().await.map_err(|err| {
                t.fatal(&format!(
                    "failed to read response body from {url}: {}",
                    error_chain(&err)
                ))
            })?;
            Exchange {
                response: Some(HttpResponse {
                    status,
                    headers,
                    body,
                }),
                error: None,
                duration,
            }
        }
        Err(err) => {
            t.log(&format!(
                "HTTP request to {url} failed: {}",
                error_chain(&err)
            ));
            Exchange {
                response: None,
                error: Some(err),
                duration,
            }
        }
    };

    for check in checks {
        check(t, &exchange)?;
    }

    Ok(exchange
        .response
        .map(|response| response.body)
        .unwrap_or_default())
}
