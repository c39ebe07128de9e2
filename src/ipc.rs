//! IpcServer
//!
//! Local stream transport (§4.8): a Unix-domain socket at a user-private
//! path, length-prefixed JSON framing, and same-effective-UID
//! authorization via `SO_PEERCRED`. This module owns the socket and the
//! wire format only; request semantics live in `agent::Agent`.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::error::{AgentError, AgentResult};

/// §6: a single IPC frame may not exceed this many bytes.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Anything that can answer one parsed IPC request with a JSON response
/// envelope (`{"status":"success", ...}` / `{"status":"failure", ...}`).
/// Implemented by `agent::Agent`; kept as a trait so the framing logic in
/// this module can be tested without a real agent.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, verb: &str, payload: Value) -> Value;
}

/// Binds a Unix-domain socket at `path` inside a 0700 directory, the
/// socket file itself 0600 (§6).
pub fn bind(path: &Path) -> AgentResult<UnixListener> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))?;
    }
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(listener)
}

/// Returns the effective UID of the process on the other end of `stream`,
/// via `SO_PEERCRED` (Linux) / `LOCAL_PEERCRED` equivalents exposed
/// through `nix`.
#[cfg(target_os = "linux")]
fn peer_uid(stream: &UnixStream) -> AgentResult<u32> {
    use std::os::unix::io::AsRawFd;
    let creds = nix::sys::socket::getsockopt(stream, nix::sys::socket::sockopt::PeerCredentials)
        .map_err(|e| AgentError::Internal(format!("SO_PEERCRED failed: {e}")))?;
    let _ = stream.as_raw_fd();
    Ok(creds.uid())
}

#[cfg(not(target_os = "linux"))]
fn peer_uid(_stream: &UnixStream) -> AgentResult<u32> {
    // Non-Linux Unix targets would use LOCAL_PEERCRED/getpeereid here; the
    // agent only ships peer-credential enforcement for Linux today.
    Err(AgentError::Internal("peer credential lookup unsupported on this platform".into()))
}

/// Rejects connections from a different effective UID than the agent's
/// own (§4.8). Only enforced on Linux, where `SO_PEERCRED` is available.
fn authorize_peer(stream: &UnixStream) -> AgentResult<()> {
    if cfg!(target_os = "linux") {
        let peer = peer_uid(stream)?;
        let mine = nix::unistd::geteuid().as_raw();
        if peer != mine {
            return Err(AgentError::UnauthorizedPeer);
        }
    }
    Ok(())
}

async fn read_frame(stream: &mut UnixStream) -> AgentResult<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];
    match stream.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(AgentError::IoError(e)),
    }
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(AgentError::FrameTooLarge);
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

async fn write_frame(stream: &mut UnixStream, bytes: &[u8]) -> AgentResult<()> {
    let len = (bytes.len() as u32).to_be_bytes();
    stream.write_all(&len).await?;
    stream.write_all(bytes).await?;
    Ok(())
}

fn failure_envelope(err: &AgentError) -> Value {
    serde_json::json!({
        "status": "failure",
        "error": err.kind(),
        "error_description": err.to_string(),
    })
}

/// Serves one connection: reads length-prefixed JSON requests in order
/// and writes responses in order (§5's single-connection ordering
/// guarantee), until the peer closes or a framing error ends the
/// connection.
pub async fn serve_connection(mut stream: UnixStream, handler: Arc<dyn RequestHandler>) {
    if let Err(e) = authorize_peer(&stream) {
        let _ = write_frame(&mut stream, failure_envelope(&e).to_string().as_bytes()).await;
        return;
    }

    loop {
        let frame = match read_frame(&mut stream).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                let _ = write_frame(&mut stream, failure_envelope(&e).to_string().as_bytes()).await;
                return;
            }
        };

        let response = match serde_json::from_slice::<Value>(&frame) {
            Ok(value) => {
                let verb = value.get("request").and_then(Value::as_str).map(str::to_string);
                match verb {
                    Some(verb) => handler.handle(&verb, value).await,
                    None => failure_envelope(&AgentError::ArgInvalid("missing 'request' field".into())),
                }
            }
            Err(e) => failure_envelope(&AgentError::FormatInvalid(format!("invalid request frame: {e}"))),
        };

        if write_frame(&mut stream, response.to_string().as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Accepts connections on `listener` until `shutdown` resolves, spawning
/// one task per connection (§4.9/§5: connections are independent and run
/// concurrently; ordering is only guaranteed within one connection).
pub async fn accept_loop(
    listener: UnixListener,
    handler: Arc<dyn RequestHandler>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, handler).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept ipc connection");
                    }
                }
            }
        }
    }
}
