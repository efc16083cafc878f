//! Client request parsing: the request line, the absolute URI, and the
//! header block the proxy forwards upstream.

use std::io::{self, BufRead};

/// Headers the proxy always sends, in this order, replacing whatever the
/// client supplied for them.
pub const USER_AGENT_HDR: &str =
    "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3\r\n";
pub const ACCEPT_HDR: &str =
    "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8\r\n";
pub const ACCEPT_ENCODING_HDR: &str = "Accept-Encoding: gzip, deflate\r\n";
pub const CONNECTION_HDR: &str = "Connection: close\r\n";
pub const PROXY_CONNECTION_HDR: &str = "Proxy-Connection: close\r\n";

/// Client header names dropped in favour of the fixed set above.
const DROPPED_HEADERS: [&str; 5] = [
    "User-Agent",
    "Accept",
    "Accept-Encoding",
    "Connection",
    "Proxy-Connection",
];

/// A parsed request line. `raw` keeps the line exactly as received,
/// terminator included; it doubles as the cache key.
pub struct RequestLine {
    pub raw: String,
    pub method: String,
    pub uri: String,
}

/// Read and split the request line. EOF before any bytes is an error
/// (the client connected and said nothing).
pub fn read_request_line<R: BufRead>(reader: &mut R) -> io::Result<RequestLine> {
    let mut raw = String::new();
    if reader.read_line(&mut raw)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before a request line",
        ));
    }
    let mut parts = raw.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let uri = parts.next().unwrap_or("").to_string();
    Ok(RequestLine { raw, method, uri })
}

/// An absolute URI broken into its connect pieces. The port stays a
/// string so a malformed one fails at address resolution, not here.
pub struct Uri {
    pub host: String,
    pub port: String,
    pub path: String,
}

impl Uri {
    /// The upstream address in `host:port` form.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split an absolute URI into host, port (default 80) and path-and-query
/// (default `/`). The scheme prefix is recognised case-insensitively.
pub fn parse_uri(uri: &str) -> Uri {
    let rest = match uri.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http://") => &uri[7..],
        _ => uri,
    };

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, port),
        None => (authority, "80"),
    };

    Uri {
        host: host.to_string(),
        port: port.to_string(),
        path: path.to_string(),
    }
}

/// Read header lines up to the blank terminator, keeping everything the
/// proxy does not replace byte-for-byte, then append the fixed set.
pub fn collect_headers<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut headers = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
        if !is_replaced_header(&line) {
            headers.push_str(&line);
        }
    }

    headers.push_str(USER_AGENT_HDR);
    headers.push_str(ACCEPT_HDR);
    headers.push_str(ACCEPT_ENCODING_HDR);
    headers.push_str(CONNECTION_HDR);
    headers.push_str(PROXY_CONNECTION_HDR);
    Ok(headers)
}

/// Whether a header line names one of the five replaced headers. Only the
/// name before the colon is examined; values are never reparsed.
fn is_replaced_header(line: &str) -> bool {
    let name = match line.split_once(':') {
        Some((name, _)) => name.trim(),
        None => return false,
    };
    DROPPED_HEADERS.iter().any(|d| name.eq_ignore_ascii_case(d))
}
