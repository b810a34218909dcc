//! JSON-RPC TCP transport.
//!
//! Line-delimited JSON-RPC 2.0 over a loopback TCP socket. Each connection gets its own task;
//! a line over `hf_protocol::MAX_MESSAGE_SIZE` is rejected without buffering past the limit,
//! matching the bounded-read discipline used elsewhere in this daemon. Every request gets a
//! response, including ones without a meaningful `id` - the wire contract has no fire-and-forget
//! notifications, so there is nothing to special-case there.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use hf_protocol::{JsonRpcRequest, JsonRpcResponse, MAX_MESSAGE_SIZE};

use crate::registry;
use crate::state::SharedState;

const MAX_CONNECTIONS: usize = 64;

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

async fn read_line_bounded<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<usize> {
    out.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(0);
        }

        let mut take_len = available.len();
        let mut found_newline = false;
        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            take_len = pos + 1;
            found_newline = true;
        }

        let remaining = max_len.saturating_sub(out.len());
        if take_len > remaining {
            let consume_len = remaining.min(available.len());
            reader.consume(consume_len);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "message too large"));
        }

        out.extend_from_slice(&available[..take_len]);
        reader.consume(take_len);

        if found_newline {
            return Ok(out.len());
        }
    }
}

pub async fn run(state: SharedState, host: String, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!(host = %host, port, "listening for JSON-RPC connections");

    loop {
        if state.shutdown.load(Ordering::SeqCst) {
            return Ok(());
        }
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                };

                if ACTIVE_CONNECTIONS.load(Ordering::SeqCst) >= MAX_CONNECTIONS {
                    warn!(%peer, "connection limit reached, rejecting");
                    drop(stream);
                    continue;
                }
                ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
                let state = state.clone();
                tokio::spawn(async move {
                    handle_connection(stream, state).await;
                    ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
                });
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {}
        }
    }
}

async fn handle_connection(stream: TcpStream, state: SharedState) {
    let _ = stream.set_nodelay(true);
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();

    loop {
        match read_line_bounded(&mut reader, &mut line, MAX_MESSAGE_SIZE).await {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "connection read error");
                let response = JsonRpcResponse::parse_error(e.to_string());
                let _ = write_response(&mut write_half, &response).await;
                return;
            }
        }

        let response = handle_line(&state, &line);
        if write_response(&mut write_half, &response).await.is_err() {
            return;
        }
    }
}

fn handle_line(state: &SharedState, line: &[u8]) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(line) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::parse_error(e.to_string()),
    };

    if request.method.is_empty() {
        return JsonRpcResponse::error(request.id, "", -32600, "missing method");
    }

    match registry::dispatch(state, &request.method, request.params) {
        Ok(data) => JsonRpcResponse::success(request.id, request.method, data),
        Err(e) => JsonRpcResponse::error(request.id, request.method, e.rpc_code(), e.to_string()),
    }
}

async fn write_response(
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
    response: &JsonRpcResponse,
) -> std::io::Result<()> {
    let mut bytes = serde_json::to_vec(response)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    bytes.push(b'\n');
    write_half.write_all(&bytes).await
}
