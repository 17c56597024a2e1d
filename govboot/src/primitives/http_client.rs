use std::time::Duration;

/// HTTP transport used by govboot for block explorer requests.
///
/// Kept behind a trait so the verification client can be exercised against local mocks.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Performs a request and returns the response body.
    ///
    /// # Errors
    /// * `HttpError::BadStatusCode` - For HTTP error status codes (4xx, 5xx) with response body
    /// * `HttpError::Timeout` - When the request times out
    /// * `HttpError::ConnectionRefused` - When the server cannot be reached
    /// * `HttpError::Generic` - For other unexpected errors
    async fn fetch(
        &self,
        url: String,
        method: HttpMethod,
        headers: Vec<HttpHeader>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, HttpError>;
}

/// HTTP methods supported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// HTTP GET method for retrieving data
    Get,
    /// HTTP POST method for sending data
    Post,
}

/// A single request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

impl HttpHeader {
    /// Creates a header.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Represents HTTP-related errors that can occur during network requests.
#[crate::error::govboot_error]
pub enum HttpError {
    /// HTTP error with specific status code (4xx, 5xx responses)
    #[error("Bad status code {code}")]
    BadStatusCode {
        /// The HTTP status code that was returned
        code: u16,
        /// The response body, which may contain error details
        response_body: Vec<u8>,
    },
    /// Request timed out
    #[error("Request timed out after {seconds} seconds")]
    Timeout {
        /// Number of seconds before timeout occurred
        seconds: u64,
    },
    /// Connection could not be established
    #[error("Connection refused by {host}")]
    ConnectionRefused {
        /// The host that refused the connection
        host: String,
    },
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestHttpClient {
    /// Creates a client with a per-request timeout.
    ///
    /// # Errors
    /// - `HttpError::Generic` if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("govboot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Generic {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, url: &str, err: &reqwest::Error) -> HttpError {
        if err.is_timeout() {
            return HttpError::Timeout {
                seconds: self.timeout.as_secs(),
            };
        }
        if err.is_connect() {
            let host = url::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(ToString::to_string))
                .unwrap_or_else(|| url.to_string());
            return HttpError::ConnectionRefused { host };
        }
        HttpError::Generic {
            message: err.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn fetch(
        &self,
        url: String,
        method: HttpMethod,
        headers: Vec<HttpHeader>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, HttpError> {
        let mut request = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        for header in headers {
            request = request.header(header.name, header.value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| self.map_error(&url, &e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_error(&url, &e))?
            .to_vec();

        if !status.is_success() {
            return Err(HttpError::BadStatusCode {
                code: status.as_u16(),
                response_body: bytes,
            });
        }
        Ok(bytes)
    }
}
