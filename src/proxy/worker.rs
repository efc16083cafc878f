//! Per-connection pipeline: parse the request, try the cache, otherwise
//! fetch upstream while staging the response for insertion.

use std::io::{self, BufReader, Read, Write};
use std::net::TcpStream;

use tracing::{debug, info, warn};

use super::request::{self, RequestLine};
use crate::cache::{ResponseCache, MAX_OBJECT_SIZE};

const IO_BUF: usize = 8192;

/// Serve one accepted connection to completion. Broken-pipe and
/// connection-reset errors from either peer end the task quietly; both
/// sockets close on every path when their handles drop.
pub fn handle_connection(client: TcpStream, cache: &ResponseCache) {
    if let Err(e) = serve(client, cache) {
        match e.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
                debug!("peer closed early: {e}");
            }
            _ => warn!("request failed: {e}"),
        }
    }
}

fn serve(mut client: TcpStream, cache: &ResponseCache) -> io::Result<()> {
    let mut reader = BufReader::new(client.try_clone()?);

    let request = match request::read_request_line(&mut reader) {
        Ok(request) => request,
        Err(e) => {
            debug!("unreadable request line: {e}");
            return client_error(
                &mut client,
                "GET",
                "400",
                "Bad Request",
                "Request could not be understood",
            );
        }
    };
    if !request.method.eq_ignore_ascii_case("GET") {
        return client_error(
            &mut client,
            &request.method,
            "501",
            "Not Implemented",
            "Proxy only supports GET method",
        );
    }

    let headers = request::collect_headers(&mut reader)?;

    // Fast path: serve a cached object. The read lock is released inside
    // find(); the Arc keeps the bytes alive through the write.
    if let Some(obj) = cache.find(&request.raw) {
        info!(request = request.raw.trim_end(), "cache hit");
        return client.write_all(&obj.response);
    }

    fetch_and_relay(&mut client, cache, request, &headers)
}

/// Cache miss: connect upstream, forward the rewritten request, stream
/// the response back, and insert it when it stayed within bounds.
fn fetch_and_relay(
    client: &mut TcpStream,
    cache: &ResponseCache,
    request: RequestLine,
    headers: &str,
) -> io::Result<()> {
    let uri = request::parse_uri(&request.uri);
    let mut server = match TcpStream::connect(uri.authority()) {
        Ok(server) => server,
        Err(e) => {
            debug!("upstream {} unreachable: {e}", uri.authority());
            return client_error(
                client,
                "GET",
                "404",
                "Not found",
                "Requested URL could not be found",
            );
        }
    };

    server.write_all(format!("GET {} HTTP/1.0\r\n", uri.path).as_bytes())?;
    server.write_all(headers.as_bytes())?;
    server.write_all(b"\r\n")?;

    // Relay while staging a copy; once the body outgrows the cacheable
    // limit the scratch is discarded and relaying continues alone.
    let mut scratch: Option<Vec<u8>> = Some(Vec::new());
    let mut buf = [0u8; IO_BUF];
    let clean_eof = loop {
        let n = match server.read(&mut buf) {
            Ok(0) => break true,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                debug!("upstream reset mid-response");
                break false;
            }
            Err(e) => return Err(e),
        };
        if let Some(body) = scratch.as_mut() {
            if body.len() + n <= MAX_OBJECT_SIZE {
                body.extend_from_slice(&buf[..n]);
            } else {
                scratch = None;
            }
        }
        client.write_all(&buf[..n])?;
    };

    // Only a complete, bounded response is worth caching.
    if clean_eof {
        if let Some(body) = scratch {
            info!(
                request = request.raw.trim_end(),
                bytes = body.len(),
                "caching response"
            );
            cache.insert(request.raw, body);
        }
    }
    Ok(())
}

/// Reply with the proxy's HTML error envelope.
fn client_error<W: Write>(
    w: &mut W,
    cause: &str,
    code: &str,
    shortmsg: &str,
    longmsg: &str,
) -> io::Result<()> {
    let body = format!(
        "<html><title>Proxy Error</title><body bgcolor=\"ffffff\">\r\n\
         {code}: {shortmsg}\r\n\
         <p>{longmsg}: {cause}\r\n\
         <hr><em>The Web proxy</em>\r\n"
    );
    write!(
        w,
        "HTTP/1.0 {code} {shortmsg}\r\nContent-type: text/html\r\nContent-length: {}\r\n\r\n",
        body.len()
    )?;
    w.write_all(body.as_bytes())
}
