//! Response-size limiting and base-URL checks shared by the news and AI clients.
use futures::StreamExt;
use url::Url;

/// Base URL rejected because it is not HTTPS and not a loopback test server.
#[derive(Debug)]
pub(crate) struct InsecureBaseUrl;

/// Parse a base URL, requiring HTTPS so API keys never travel in clear text.
///
/// Plain HTTP is allowed only for `localhost` and `127.0.0.1`, which is what
/// mock servers bind to in tests.
pub(crate) fn check_base_url(base: &str) -> Result<Url, InsecureBaseUrl> {
    let url = Url::parse(base).map_err(|_| InsecureBaseUrl)?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) => {
            tracing::warn!(base_url = %base, "Using non-HTTPS base URL (localhost only)");
            Ok(url)
        }
        _ => {
            tracing::error!(base_url = %base, "Rejecting non-HTTPS base URL");
            Err(InsecureBaseUrl)
        }
    }
}

pub(crate) enum ReadError {
    Network(reqwest::Error),
    TooLarge(usize),
    InvalidUtf8,
}

/// Read a response body as UTF-8, failing once it exceeds `limit` bytes.
pub(crate) async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ReadError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ReadError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ReadError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ReadError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ReadError::InvalidUtf8)
}
