//! `proxy <port>`: a caching HTTP/1.0 forward proxy.

use std::env;
use std::net::TcpListener;
use std::process;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use webproxy::cache::{ResponseCache, MAX_CACHE_SIZE};
use webproxy::proxy::pool::WorkerPool;
use webproxy::proxy::worker;

const WORKERS: usize = 16;
const QUEUE_DEPTH: usize = 64;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <port>", args[0]);
        process::exit(1);
    }
    let port: u16 = match args[1].parse() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("usage: {} <port>", args[0]);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("cannot listen on port {port}: {e}");
            process::exit(1);
        }
    };
    let pool = match WorkerPool::new(WORKERS, QUEUE_DEPTH) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("cannot start worker pool: {e}");
            process::exit(1);
        }
    };

    let cache = Arc::new(ResponseCache::new(MAX_CACHE_SIZE));
    info!(port, workers = WORKERS, "proxy listening");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let cache = Arc::clone(&cache);
                pool.dispatch(move || worker::handle_connection(stream, &cache));
            }
            Err(e) => warn!("accept failed: {e}"),
        }
    }
}
