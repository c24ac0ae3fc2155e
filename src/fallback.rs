//! Third-party verification API, consulted only after the SMTP probe failed
//! to confirm a mailbox (`with-fallback` feature).

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::VerifyError;
use crate::pipeline::FallbackVerifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackOptions {
    pub base_url: String,
    pub timeout: Duration,
    /// Minimum spacing between two API calls, across all workers.
    pub min_interval: Duration,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.eva.pingutil.com".to_string(),
            timeout: Duration::from_secs(15),
            min_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed response: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    data: ApiVerdict,
}

#[derive(Debug, Deserialize)]
struct ApiVerdict {
    valid_syntax: bool,
    valid_smtp: bool,
}

/// `data.valid_syntax && data.valid_smtp`.
pub fn parse_verdict(body: &str) -> Result<bool, FallbackError> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|source| FallbackError::Parse { source })?;
    Ok(response.data.valid_syntax && response.data.valid_smtp)
}

/// `GET {base_url}/email?email=<address>` over a blocking HTTP client.
#[derive(Debug, Clone)]
pub struct ApiFallbackVerifier {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl ApiFallbackVerifier {
    pub fn new(options: &FallbackOptions) -> Result<Self, VerifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|source| VerifyError::FallbackClient { source })?;
        Ok(Self {
            client,
            endpoint: format!("{}/email", options.base_url.trim_end_matches('/')),
        })
    }

    pub fn check(&self, address: &str) -> Result<bool, FallbackError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("email", address)])
            .send()
            .map_err(|source| FallbackError::Transport { source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FallbackError::Status(status.as_u16()));
        }
        let body = response
            .text()
            .map_err(|source| FallbackError::Transport { source })?;
        parse_verdict(&body)
    }
}

impl FallbackVerifier for ApiFallbackVerifier {
    fn verify_via_third_party(&self, address: &str) -> bool {
        match self.check(address) {
            Ok(verified) => verified,
            Err(err) => {
                debug!(address, error = %err, "fallback verification failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn both_flags_required() {
        let body = r#"{"status":"success","data":{"email_address":"a@b.com","valid_syntax":true,"valid_smtp":true,"deliverable":true}}"#;
        assert!(parse_verdict(body).expect("parses"));

        let body = r#"{"data":{"valid_syntax":true,"valid_smtp":false}}"#;
        assert!(!parse_verdict(body).expect("parses"));
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(matches!(
            parse_verdict("<html>rate limited</html>"),
            Err(FallbackError::Parse { .. })
        ));
        assert!(matches!(
            parse_verdict(r#"{"data":{"valid_syntax":true}}"#),
            Err(FallbackError::Parse { .. })
        ));
    }

    #[test]
    fn unreachable_endpoint_is_not_verified() {
        let verifier = ApiFallbackVerifier::new(&FallbackOptions {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            ..FallbackOptions::default()
        })
        .expect("client builds");
        assert!(!verifier.verify_via_third_party("user@example.com"));
    }

    #[test]
    #[ignore = "requires loopback TCP binding"]
    fn queries_endpoint_with_address() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request_line = String::new();
            BufReader::new(stream.try_clone().expect("clone"))
                .read_line(&mut request_line)
                .expect("read request");
            let body = r#"{"data":{"valid_syntax":true,"valid_smtp":true}}"#;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .expect("write response");
            request_line
        });

        let verifier = ApiFallbackVerifier::new(&FallbackOptions {
            base_url: format!("http://127.0.0.1:{port}/"),
            ..FallbackOptions::default()
        })
        .expect("client builds");
        assert!(verifier.verify_via_third_party("user@example.com"));
        let request_line = handle.join().expect("server thread");
        assert!(
            request_line.starts_with("GET /email?email=user%40example.com "),
            "{request_line}"
        );
    }
}
