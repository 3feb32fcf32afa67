//! # GSI HTTP Listener
//!
//! Accepts pushes from the game client: one dedicated accept task while
//! running, one short-lived task per connection, exactly one
//! request/response per connection. Read and write each get a 5 second
//! deadline; a slow or broken peer aborts only its own connection. `stop`
//! cancels the pending accept and drops the socket, so the port is free for
//! the next `start`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::GsiError;
use crate::http::{self, Request, Response};
use crate::mapper;
use crate::monitor::Liveness;
use crate::registry::SubscriberRegistry;
use crate::store::SnapshotStore;

/// Per-connection read and write deadline.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

const BODY_SUCCESS: &str = r#"{"status":"success"}"#;
const BODY_INVALID_REQUEST: &str = r#"{"error":"Invalid request"}"#;
const BODY_INVALID_JSON: &str = r#"{"error":"Invalid JSON"}"#;
const BODY_INTERNAL_ERROR: &str = r#"{"error":"Internal server error"}"#;

/// Shared collaborators every connection handler needs.
#[derive(Clone)]
pub struct ListenerContext {
    pub store: Arc<SnapshotStore>,
    pub subscribers: Arc<SubscriberRegistry>,
    pub liveness: Arc<Liveness>,
}

struct Running {
    token: CancellationToken,
    accept_task: JoinHandle<()>,
    connections: TaskTracker,
}

pub struct GsiListener {
    host: String,
    port: u16,
    ctx: ListenerContext,
    running: tokio::sync::Mutex<Option<Running>>,
    bound_port: AtomicU16,
}

impl GsiListener {
    /// `port` 0 lets the OS pick; `start` reports the actual port.
    pub fn new(host: impl Into<String>, port: u16, ctx: ListenerContext) -> Self {
        Self {
            host: host.into(),
            port,
            ctx,
            running: tokio::sync::Mutex::new(None),
            bound_port: AtomicU16::new(0),
        }
    }

    /// Binds the socket and spawns the accept loop. Calling this while
    /// already running fails with [`GsiError::AlreadyRunning`] and has no
    /// side effects.
    pub async fn start(&self) -> Result<u16, GsiError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            log::error!("GSI listener is already running");
            return Err(GsiError::AlreadyRunning);
        }

        let addr = format!("{}:{}", self.host, self.port);
        let socket = TcpListener::bind(&addr).await.map_err(|source| GsiError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let bound = socket.local_addr()?.port();
        self.bound_port.store(bound, Ordering::SeqCst);

        let token = CancellationToken::new();
        let connections = TaskTracker::new();
        let accept_task = tokio::spawn(accept_loop(
            socket,
            self.ctx.clone(),
            token.clone(),
            connections.clone(),
        ));
        *running = Some(Running {
            token,
            accept_task,
            connections,
        });

        log::info!("GSI listener started on {}:{}", self.host, bound);
        Ok(bound)
    }

    /// Cancels the pending accept, awaits the accept task and every in-flight
    /// connection handler, then drops the socket. Cancellation makes handlers
    /// return promptly, so the wait is short. A no-op when already stopped;
    /// safe to call from any task.
    pub async fn stop(&self) {
        let run = {
            let mut running = self.running.lock().await;
            running.take()
        };
        let Some(run) = run else {
            return;
        };
        run.token.cancel();
        if let Err(e) = run.accept_task.await {
            log::error!("GSI accept task aborted: {}", e);
        }
        run.connections.close();
        run.connections.wait().await;
        log::info!("GSI listener stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// The actually bound port of the most recent successful `start`.
    pub fn port(&self) -> u16 {
        self.bound_port.load(Ordering::SeqCst)
    }
}

async fn accept_loop(
    socket: TcpListener,
    ctx: ListenerContext,
    token: CancellationToken,
    connections: TaskTracker,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                log::debug!("accept loop cancelled");
                break;
            }
            accepted = socket.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("accepted connection from {}", peer);
                        let ctx = ctx.clone();
                        let conn_token = token.clone();
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, ctx, conn_token).await {
                                log::warn!("connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        log::warn!("error accepting connection: {}", e);
                        // do not spin on a persistent accept failure
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
    }
    // socket drops here, releasing the port
}

/// One request/response cycle. Transport failures and timeouts are scoped to
/// this connection and surface as the returned error.
async fn handle_connection(
    mut stream: TcpStream,
    ctx: ListenerContext,
    token: CancellationToken,
) -> std::io::Result<()> {
    let read = tokio::select! {
        _ = token.cancelled() => return Ok(()),
        read = timeout(IO_TIMEOUT, http::read_request(&mut stream)) => read,
    };

    let req = match read {
        Ok(Ok(req)) => req,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
            // unparseable head: answer 400 and drop the connection
            log::warn!("malformed request head: {}", e);
            let res = Response::json(400, BODY_INVALID_REQUEST);
            let _ = timeout(IO_TIMEOUT, http::write_response(&mut stream, &res)).await;
            return Ok(());
        }
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "request read timed out",
            ));
        }
    };

    log::trace!("request: {} {} ({} body bytes)", req.method, req.target, req.body.len());
    let res = route(&req, &ctx);

    match timeout(IO_TIMEOUT, http::write_response(&mut stream, &res)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "response write timed out",
            ));
        }
    }

    // any fully handled request proves the feed is alive
    ctx.liveness.touch();

    let _ = stream.shutdown().await;
    Ok(())
}

/// The request validator plus dispatch: gate on method before the mapper
/// ever sees the body.
fn route(req: &Request, ctx: &ListenerContext) -> Response {
    // CORS preflight is always accepted with an empty response
    if req.method.eq_ignore_ascii_case("OPTIONS") {
        return Response::no_content();
    }

    if req.method.eq_ignore_ascii_case("GET") && req.target == "/health" {
        return Response::text(200, "OK");
    }

    if !req.method.eq_ignore_ascii_case("POST") {
        log::warn!("rejected {} {} (ingest is POST-only)", req.method, req.target);
        return Response::json(400, BODY_INVALID_REQUEST);
    }

    ingest(&req.body, ctx)
}

/// Maps and commits one POST body. Order matters: the store commit happens
/// before subscriber notification, which happens before the response is
/// written, so a subscriber observing an event can immediately read a store
/// state at least as new as that event.
fn ingest(body: &str, ctx: &ListenerContext) -> Response {
    if body.is_empty() {
        // heartbeat/probe traffic from the game client: acknowledge, change nothing
        log::debug!("empty POST body, treated as a no-op update");
        return Response::json(200, BODY_SUCCESS);
    }

    let (delta, raw) = match mapper::map_payload(body) {
        Ok(mapped) => mapped,
        Err(e) => {
            log::warn!("rejected GSI payload: {}", e);
            return Response::json(400, BODY_INVALID_JSON);
        }
    };

    let committed = catch_unwind(AssertUnwindSafe(|| {
        ctx.store.apply(delta);
        ctx.subscribers.notify_all(&raw);
    }));
    match committed {
        Ok(()) => {
            ctx.liveness.mark_update();
            Response::json(200, BODY_SUCCESS)
        }
        Err(_) => {
            log::error!("panic while committing GSI update");
            Response::json(500, BODY_INTERNAL_ERROR)
        }
    }
}
