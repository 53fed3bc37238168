//! Transfer of a single byte range from a mirror.
//!
//! The download engine only talks to mirrors through [`ChunkTransport`], so
//! the HTTP client can be swapped for an in-memory double in tests.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;

use super::error::{DownloadError, DownloadResult};
use super::range::ByteRange;

/// Default timeout for a single chunk request in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default `User-Agent` header sent to mirrors.
pub const DEFAULT_USER_AGENT: &str = concat!("mapfetch/", env!("CARGO_PKG_VERSION"));

/// Fetches one byte range of the target file from one mirror.
///
/// Implementations are called concurrently from worker threads.
pub trait ChunkTransport: Send + Sync {
    /// Fetch exactly `range` of a `file_size`-byte file from `mirror`.
    ///
    /// Returning an error fails the chunk, which permanently drops the mirror
    /// from the session. A mirror serving a file of another size must fail.
    fn fetch(&self, mirror: &str, range: ByteRange, file_size: u64) -> DownloadResult<Vec<u8>>;
}

/// HTTP transport issuing `GET` requests with a `Range` header.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    pub(crate) timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the default timeout and user agent.
    pub fn new() -> DownloadResult<Self> {
        Self::with_settings(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_USER_AGENT)
    }

    /// Create a transport with a custom timeout and user agent.
    pub fn with_settings(timeout: Duration, user_agent: &str) -> DownloadResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DownloadError::ClientBuild(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Timeout applied to every request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request_failed(&self, url: &str, e: reqwest::Error) -> DownloadError {
        if e.is_timeout() {
            DownloadError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            DownloadError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl ChunkTransport for HttpTransport {
    fn fetch(&self, mirror: &str, range: ByteRange, file_size: u64) -> DownloadResult<Vec<u8>> {
        let mut response = self
            .client
            .get(mirror)
            .header(RANGE, range.http_range_header())
            .send()
            .map_err(|e| self.request_failed(mirror, e))?;

        let status = response.status();
        if !accepts_status(status, range, file_size) {
            return Err(DownloadError::UnexpectedStatus {
                url: mirror.to_string(),
                status: status.as_u16(),
                range,
            });
        }
        if status == StatusCode::PARTIAL_CONTENT {
            let content_range = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            check_content_range(mirror, range, file_size, content_range)?;
        }

        let expected = range.len();
        let mut body = Vec::with_capacity(expected as usize);
        // Read one byte past the range so an oversized body is detected
        // without buffering all of it.
        response
            .by_ref()
            .take(expected + 1)
            .read_to_end(&mut body)
            .map_err(|e| DownloadError::Http {
                url: mirror.to_string(),
                reason: format!("read error: {}", e),
            })?;

        check_body_len(mirror, range, body.len() as u64)?;
        Ok(body)
    }
}

/// A mirror may answer `200 OK` only when the range is the whole file, since
/// the full body is then exactly the requested bytes.
fn accepts_status(status: StatusCode, range: ByteRange, file_size: u64) -> bool {
    status == StatusCode::PARTIAL_CONTENT
        || (status == StatusCode::OK && range.begin == 0 && range.end == file_size)
}

/// Parse a `Content-Range` value of the form `bytes first-last/total`.
///
/// The total is `None` when the mirror reports it as unknown (`*`).
fn parse_content_range(value: &str) -> Option<(u64, u64, Option<u64>)> {
    let (span, total) = value.trim().strip_prefix("bytes ")?.split_once('/')?;
    let (first, last) = span.trim().split_once('-')?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };
    Some((first.trim().parse().ok()?, last.trim().parse().ok()?, total))
}

/// The served span must be the requested one, and a known total must be the
/// size of the file being downloaded.
fn check_content_range(
    url: &str,
    range: ByteRange,
    file_size: u64,
    content_range: &str,
) -> DownloadResult<()> {
    let matches = match parse_content_range(content_range) {
        Some((first, last, total)) => {
            first == range.begin
                && last.checked_add(1) == Some(range.end)
                && total.map_or(true, |t| t == file_size)
        }
        None => false,
    };
    if !matches {
        return Err(DownloadError::ContentRangeMismatch {
            url: url.to_string(),
            expected: format!("bytes {}-{}/{}", range.begin, range.end - 1, file_size),
            actual: content_range.to_string(),
        });
    }
    Ok(())
}

fn check_body_len(url: &str, range: ByteRange, actual: u64) -> DownloadResult<()> {
    if actual != range.len() {
        return Err(DownloadError::SizeMismatch {
            url: url.to_string(),
            range,
            expected: range.len(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_http_transport_new() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.timeout().as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_http_transport_with_settings() {
        let transport = HttpTransport::with_settings(Duration::from_secs(5), "test-agent").unwrap();
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }

    /// Answer the first connection on a local port with `response`.
    fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                stream.write_all(response.as_bytes()).ok();
            }
        });
        format!("http://{}/region.mwm", addr)
    }

    fn partial_content(content_range: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Range: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            content_range,
            body.len(),
            body
        )
    }

    #[test]
    fn test_partial_content_accepted() {
        assert!(accepts_status(
            StatusCode::PARTIAL_CONTENT,
            ByteRange::new(250, 500),
            800
        ));
    }

    #[test]
    fn test_full_body_only_accepted_for_whole_file() {
        assert!(accepts_status(StatusCode::OK, ByteRange::new(0, 250), 250));
        assert!(!accepts_status(StatusCode::OK, ByteRange::new(0, 250), 800));
        assert!(!accepts_status(StatusCode::OK, ByteRange::new(250, 500), 500));
        assert!(!accepts_status(StatusCode::NOT_FOUND, ByteRange::new(0, 250), 250));
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(
            parse_content_range("bytes 0-4/47684"),
            Some((0, 4, Some(47684)))
        );
        assert_eq!(parse_content_range("bytes 250-499/*"), Some((250, 499, None)));
        assert_eq!(parse_content_range("bytes */47684"), None);
        assert_eq!(parse_content_range(""), None);
    }

    #[test]
    fn test_content_range_must_match_request_and_file_size() {
        let range = ByteRange::new(250, 500);
        assert!(check_content_range("http://a", range, 800, "bytes 250-499/800").is_ok());
        assert!(check_content_range("http://a", range, 800, "bytes 250-499/*").is_ok());

        for served in ["bytes 250-499/47684", "bytes 0-249/800", "bytes 250-500/800", ""] {
            assert!(
                matches!(
                    check_content_range("http://a", range, 800, served),
                    Err(DownloadError::ContentRangeMismatch { .. })
                ),
                "accepted {:?}",
                served
            );
        }
    }

    #[test]
    fn test_body_length_must_match_range() {
        let range = ByteRange::new(0, 5);
        assert!(check_body_len("http://a", range, 5).is_ok());
        assert!(matches!(
            check_body_len("http://a", range, 6),
            Err(DownloadError::SizeMismatch {
                expected: 5,
                actual: 6,
                ..
            })
        ));
    }

    #[test]
    fn test_fetch_partial_content() {
        let url = serve_once(partial_content("bytes 0-4/5", "Test1"));
        let transport = HttpTransport::new().unwrap();

        let body = transport.fetch(&url, ByteRange::new(0, 5), 5).unwrap();
        assert_eq!(body, b"Test1");
    }

    #[test]
    fn test_mirror_with_other_file_size_fails_chunk() {
        let url = serve_once(partial_content("bytes 0-4/47684", "Test1"));
        let transport = HttpTransport::new().unwrap();

        let err = transport.fetch(&url, ByteRange::new(0, 5), 5).unwrap_err();
        assert!(
            matches!(err, DownloadError::ContentRangeMismatch { .. }),
            "unexpected error: {}",
            err
        );
        assert!(err.is_chunk_failure());
    }

    #[test]
    fn test_unreachable_mirror_is_chunk_failure() {
        let transport =
            HttpTransport::with_settings(Duration::from_secs(2), DEFAULT_USER_AGENT).unwrap();
        let err = transport
            .fetch("http://127.0.0.1:1/region.mwm", ByteRange::new(0, 10), 10)
            .unwrap_err();
        assert!(err.is_chunk_failure(), "unexpected error: {}", err);
    }
}
