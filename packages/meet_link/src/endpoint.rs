//! The coordination endpoint URL, validated once at startup.

use std::fmt;
use std::str::FromStr;

use tokio_tungstenite::tungstenite::http::Uri;

use crate::error::LinkError;

/// Path used when an http(s) base URL without a path is given.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// A `ws://` or `wss://` URL naming the coordination endpoint.
///
/// `http://` and `https://` are accepted and rewritten to their WebSocket
/// schemes, with [`DEFAULT_WS_PATH`] filled in when no path is given, so a
/// plain server base URL can be configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionEndpoint {
    url: String,
    host: String,
    secure: bool,
}

impl ConnectionEndpoint {
    pub fn parse(raw: &str) -> Result<Self, LinkError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LinkError::invalid_endpoint(raw, "empty"));
        }
        let uri: Uri = trimmed
            .parse()
            .map_err(|e| LinkError::invalid_endpoint(raw, format!("{e}")))?;

        let (scheme, secure, http_base) = match uri.scheme_str() {
            Some("ws") => ("ws", false, false),
            Some("wss") => ("wss", true, false),
            Some("http") => ("ws", false, true),
            Some("https") => ("wss", true, true),
            Some(other) => {
                return Err(LinkError::invalid_endpoint(
                    raw,
                    format!("unsupported scheme {other:?}"),
                ));
            }
            None => return Err(LinkError::invalid_endpoint(raw, "missing scheme")),
        };

        let authority = uri
            .authority()
            .ok_or_else(|| LinkError::invalid_endpoint(raw, "missing host"))?;
        let host = authority.host();
        if host.is_empty() {
            return Err(LinkError::invalid_endpoint(raw, "missing host"));
        }

        let path = match uri.path() {
            "" | "/" if http_base => DEFAULT_WS_PATH,
            p => p,
        };
        let query = uri.query().map(|q| format!("?{q}")).unwrap_or_default();

        Ok(Self {
            url: format!("{scheme}://{authority}{path}{query}"),
            host: host.to_string(),
            secure,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

impl FromStr for ConnectionEndpoint {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ws_and_wss() {
        let ep = ConnectionEndpoint::parse("ws://192.168.1.21:5000/ws").unwrap();
        assert_eq!(ep.as_str(), "ws://192.168.1.21:5000/ws");
        assert_eq!(ep.host(), "192.168.1.21");
        assert!(!ep.is_secure());

        let ep = ConnectionEndpoint::parse("wss://meet.example.org/ws").unwrap();
        assert!(ep.is_secure());
        assert_eq!(ep.to_string(), "wss://meet.example.org/ws");
    }

    #[test]
    fn http_base_becomes_ws_endpoint() {
        let ep = ConnectionEndpoint::parse("http://localhost:5000").unwrap();
        assert_eq!(ep.as_str(), "ws://localhost:5000/ws");

        let ep = ConnectionEndpoint::parse("https://meet.example.org/").unwrap();
        assert_eq!(ep.as_str(), "wss://meet.example.org/ws");

        let ep = ConnectionEndpoint::parse("https://meet.example.org/live").unwrap();
        assert_eq!(ep.as_str(), "wss://meet.example.org/live");
    }

    #[test]
    fn keeps_query_string() {
        let ep = ConnectionEndpoint::parse("ws://localhost:5000/ws?surface=judge").unwrap();
        assert_eq!(ep.as_str(), "ws://localhost:5000/ws?surface=judge");
    }

    #[test]
    fn trims_whitespace() {
        let ep: ConnectionEndpoint = "  ws://localhost:9/ws \n".parse().unwrap();
        assert_eq!(ep.as_str(), "ws://localhost:9/ws");
    }

    #[test]
    fn rejects_malformed() {
        for raw in [
            "",
            "   ",
            "localhost:5000",
            "ftp://example.org",
            "YOUR_BACKEND_URL",
            "ws:///nohost",
        ] {
            let err = ConnectionEndpoint::parse(raw).unwrap_err();
            assert!(
                matches!(err, LinkError::InvalidEndpoint { .. }),
                "{raw:?} should be rejected, got {err:?}"
            );
        }
    }
}
