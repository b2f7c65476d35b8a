//! Kroki-backed rendering surface.
//!
//! Diagrams are sent with `POST {server}/{endpoint}/{format}` and a plain-text
//! body. Kroki answers 4xx when the diagram source is invalid, which maps to
//! [`BackendError::NoOutput`]; transport failures and 5xx responses map to
//! [`BackendError::Unavailable`].

use std::time::Duration;

use ureq::Agent;

use crate::backend::{BackendError, DiagramBackend};
use crate::consts::{DEFAULT_KROKI_URL, DEFAULT_TIMEOUT};
use crate::language::DiagramLanguage;

/// [`DiagramBackend`] talking to a Kroki server over HTTP.
pub struct KrokiBackend {
    server_url: String,
    agent: Agent,
}

impl KrokiBackend {
    /// Create a backend for the given Kroki server URL.
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_owned();
        Self {
            server_url,
            agent: create_agent(DEFAULT_TIMEOUT),
        }
    }

    /// Set the HTTP timeout (default: 30 seconds).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.agent = create_agent(timeout);
        self
    }

    /// Server URL without trailing slash.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Send a diagram to Kroki and return the response body as bytes.
    fn send(
        &self,
        language: DiagramLanguage,
        source: &str,
        format: &str,
    ) -> Result<Vec<u8>, BackendError> {
        let endpoint = language.kroki_endpoint();
        let url = format!("{}/{endpoint}/{format}", self.server_url);

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain")
            .send(source.as_bytes())
            .map_err(|e| BackendError::Unavailable(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            let error_body = body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            let message = format!("HTTP {status}: {}", error_body.trim());
            return Err(if status < 500 {
                BackendError::NoOutput(message)
            } else {
                BackendError::Unavailable(message)
            });
        }

        let data = body
            .read_to_vec()
            .map_err(|e| BackendError::Unavailable(format!("failed to read response: {e}")))?;
        if data.is_empty() {
            return Err(BackendError::NoOutput("empty response".to_owned()));
        }
        Ok(data)
    }
}

impl Default for KrokiBackend {
    fn default() -> Self {
        Self::new(DEFAULT_KROKI_URL)
    }
}

impl DiagramBackend for KrokiBackend {
    fn name(&self) -> &str {
        "kroki"
    }

    fn render_svg(&self, language: DiagramLanguage, source: &str) -> Result<String, BackendError> {
        let data = self.send(language, source, "svg")?;
        String::from_utf8(data)
            .map_err(|e| BackendError::Unavailable(format!("invalid UTF-8 in SVG: {e}")))
    }

    fn capture_png(
        &self,
        language: DiagramLanguage,
        source: &str,
    ) -> Result<Vec<u8>, BackendError> {
        let data = self.send(language, source, "png")?;
        if png_dimensions(&data).is_none() {
            return Err(BackendError::NoOutput("invalid PNG data".to_owned()));
        }
        Ok(data)
    }
}

/// Create HTTP agent with the specified timeout.
///
/// Status codes are handled by the caller, so they are not turned into errors.
fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Extract width and height from PNG image data.
///
/// PNG format: 8-byte signature, then IHDR chunk with width/height at bytes 16-24.
pub(crate) fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 24 {
        return None;
    }

    if &data[0..8] != b"\x89PNG\r\n\x1a\n" {
        return None;
    }

    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_dimensions() {
        let mut png_data = vec![
            0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
            0x00, 0x00, 0x00, 0x0D, // IHDR length
            b'I', b'H', b'D', b'R', // IHDR type
            0x00, 0x00, 0x01, 0x2C, // width = 300
            0x00, 0x00, 0x00, 0x96, // height = 150
        ];
        png_data.extend_from_slice(&[0; 5]);

        assert_eq!(png_dimensions(&png_data), Some((300, 150)));
    }

    #[test]
    fn test_png_dimensions_rejects_other_data() {
        assert_eq!(png_dimensions(b"<svg></svg>"), None);
        assert_eq!(png_dimensions(&[0x89, b'P', b'N', b'G']), None);
    }

    #[test]
    fn test_server_url_trailing_slash_trimmed() {
        let backend = KrokiBackend::new("http://localhost:8000/");
        assert_eq!(backend.server_url(), "http://localhost:8000");
        assert_eq!(backend.name(), "kroki");
    }

    #[test]
    fn test_unreachable_server_is_unavailable() {
        // Port 9 (discard) on localhost is closed on test machines.
        let backend = KrokiBackend::new("http://127.0.0.1:9").timeout(Duration::from_secs(2));
        let result = backend.render_svg(DiagramLanguage::Mermaid, "graph TD; A-->B");
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }
}
