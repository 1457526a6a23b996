//! Dashboard upload: transport traits, bounded retry and HTTP framing
//!
//! Delivery is at-least-once within a single cycle: the body is posted up to
//! `max_attempts` times with a fixed pause in between, and the first 2xx
//! response ends the loop. A cycle that exhausts its attempts gives up; the
//! next wake tries again with fresh data.

use core::fmt::{Debug, Write};
use core::future::Future;

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::config::UploadConfig;

/// Posts a JSON body and reports the HTTP status code.
pub trait HttpTransport {
    type Error: Debug;

    fn post_json(&mut self, body: &[u8]) -> impl Future<Output = Result<u16, Self::Error>>;
}

/// Station-mode link that carries the transport.
pub trait Network: HttpTransport {
    /// Join the configured network, returning the signal strength in dBm.
    fn connect(&mut self, timeout_ms: u32) -> impl Future<Output = Result<i8, Self::Error>>;

    /// Leave the network and power the radio down.
    fn disconnect(&mut self) -> impl Future<Output = ()>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    #[error("server answered {status} after {attempts} attempts")]
    Rejected { status: u16, attempts: u8 },
    #[error("transport failed after {attempts} attempts")]
    Transport { attempts: u8 },
    #[error("payload did not fit the upload buffer")]
    Serialize,
    #[error("could not join the network")]
    Connect,
}

/// Result of a successful upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReceipt {
    pub attempts: u8,
    pub status: u16,
}

pub const fn is_success(status: u16) -> bool {
    matches!(status, 200..=299)
}

pub struct Uploader<'a> {
    config: &'a UploadConfig,
}

impl<'a> Uploader<'a> {
    pub const fn new(config: &'a UploadConfig) -> Self {
        Self { config }
    }

    pub async fn upload<T, D>(
        &self,
        transport: &mut T,
        delay: &mut D,
        body: &[u8],
    ) -> Result<UploadReceipt, UploadError>
    where
        T: HttpTransport,
        D: DelayNs,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_status = None;

        for attempt in 1..=max_attempts {
            info!("Upload attempt {}/{}", attempt, max_attempts);

            match transport.post_json(body).await {
                Ok(status) if is_success(status) => {
                    info!("Data uploaded (HTTP {})", status);
                    return Ok(UploadReceipt {
                        attempts: attempt,
                        status,
                    });
                }
                Ok(status) => {
                    warn!("HTTP request rejected: {}", status);
                    last_status = Some(status);
                }
                Err(e) => {
                    error!("HTTP request failed: {:?}", e);
                    last_status = None;
                }
            }

            if attempt < max_attempts {
                info!("Waiting {} ms before retry", self.config.retry_delay_ms);
                delay.delay_ms(self.config.retry_delay_ms).await;
            }
        }

        Err(match last_status {
            Some(status) => UploadError::Rejected {
                status,
                attempts: max_attempts,
            },
            None => UploadError::Transport {
                attempts: max_attempts,
            },
        })
    }
}

/// Largest request head `write_post_request` produces
pub const REQUEST_HEAD_CAPACITY: usize = 256;

/// Format an HTTP/1.0 POST head for a JSON body of `content_length` bytes.
///
/// HTTP/1.0 makes the server close the connection after the response, so the
/// caller can read until EOF.
pub fn write_post_request(
    host: &str,
    port: u16,
    path: &str,
    content_length: usize,
) -> Result<String<REQUEST_HEAD_CAPACITY>, UploadError> {
    let mut head = String::new();
    write!(
        head,
        "POST {} HTTP/1.0\r\nHost: {}:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        path, host, port, content_length
    )
    .map_err(|_| UploadError::Serialize)?;
    Ok(head)
}

/// Extract the status code from the first line of an HTTP response.
pub fn parse_status_line(response: &[u8]) -> Option<u16> {
    let line_end = response
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(response.len());
    let line = core::str::from_utf8(&response[..line_end]).ok()?;

    let mut parts = line.split_ascii_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockNetwork, NoopDelay};
    use embassy_futures::block_on;

    #[test]
    fn test_first_attempt_success() {
        let config = UploadConfig::default();
        let mut network = MockNetwork::with_statuses(&[Ok(200)]);
        let mut delay = NoopDelay::default();

        let receipt =
            block_on(Uploader::new(&config).upload(&mut network, &mut delay, b"{}")).unwrap();

        assert_eq!(receipt, UploadReceipt { attempts: 1, status: 200 });
        assert_eq!(network.posts, 1);
        assert_eq!(delay.total_ms, 0);
    }

    #[test]
    fn test_retry_after_rejection() {
        let config = UploadConfig::default();
        let mut network = MockNetwork::with_statuses(&[Ok(503), Ok(201)]);
        let mut delay = NoopDelay::default();

        let receipt =
            block_on(Uploader::new(&config).upload(&mut network, &mut delay, b"{}")).unwrap();

        assert_eq!(receipt.attempts, 2);
        assert_eq!(receipt.status, 201);
        assert_eq!(delay.total_ms, config.retry_delay_ms);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let config = UploadConfig::default();
        let mut network = MockNetwork::with_statuses(&[Ok(500), Ok(502), Ok(200)]);
        let mut delay = NoopDelay::default();

        let result = block_on(Uploader::new(&config).upload(&mut network, &mut delay, b"{}"));

        assert_eq!(result, Err(UploadError::Rejected { status: 502, attempts: 2 }));
        assert_eq!(network.posts, 2);
        // No pause after the final attempt
        assert_eq!(delay.total_ms, config.retry_delay_ms);
    }

    #[test]
    fn test_transport_errors() {
        let config = UploadConfig::default();
        let mut network = MockNetwork::with_statuses(&[Err(()), Err(())]);
        let mut delay = NoopDelay::default();

        let result = block_on(Uploader::new(&config).upload(&mut network, &mut delay, b"{}"));
        assert_eq!(result, Err(UploadError::Transport { attempts: 2 }));
    }

    #[test]
    fn test_post_request_head() {
        let head = write_post_request("192.168.1.20", 3000, "/api/data", 42).unwrap();
        assert!(head.starts_with("POST /api/data HTTP/1.0\r\n"));
        assert!(head.contains("Host: 192.168.1.20:3000\r\n"));
        assert!(head.contains("Content-Type: application/json\r\n"));
        assert!(head.contains("Content-Length: 42\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_parse_status_line() {
        assert_eq!(parse_status_line(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n"), Some(200));
        assert_eq!(parse_status_line(b"HTTP/1.0 404 Not Found\r\n"), Some(404));
        assert_eq!(parse_status_line(b"HTTP/1.1 503"), Some(503));
        assert_eq!(parse_status_line(b"garbage"), None);
        assert_eq!(parse_status_line(b"HTTP/1.1 20 OK\r\n"), None);
        assert_eq!(parse_status_line(b""), None);
    }
}
