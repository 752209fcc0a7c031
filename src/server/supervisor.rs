//! The connection-accepting server.
//!
//! # Responsibilities
//! - Bind the listener exactly once per server instance
//! - Run the accept loop over any [`Acceptor`]: assign ids, register, hook, dispatch
//! - Reach `Stopped` with a recorded outcome even if the accept loop unwinds
//! - Supervise each handler and clean up however it ends
//! - Propagate stop to every live connection through the root scope

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::lifecycle::Shutdown;
use crate::net::{
    Acceptor, Connection, ConnectionId, ConnectionInfo, ListenAddr, Listener, ListenerError,
    PeerAddr, Registry, Stream,
};
use crate::observability::metrics;
use crate::resilience::AcceptRetry;
use crate::server::error::ServerError;
use crate::server::handler::Handler;

/// Run-once lifecycle of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    NotStarted = 0,
    Running = 1,
    Stopped = 2,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::NotStarted,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    Pending,
    Listening(ListenAddr),
    Closed,
}

/// A supervised stream server.
///
/// Start it on its own task with [`start`](Self::start) (or [`spawn`](Self::spawn))
/// and end it from anywhere with [`stop`](Self::stop).
pub struct Server<H> {
    config: ServerConfig,
    handler: Arc<H>,
    registry: Registry,
    shutdown: Shutdown,
    next_id: AtomicU64,
    state: AtomicU8,
    outcome: OnceLock<Result<(), ServerError>>,
    binding: watch::Sender<Binding>,
}

impl<H: Handler> Server<H> {
    pub fn new(config: ServerConfig, handler: H) -> Self {
        let (binding, _) = watch::channel(Binding::Pending);
        Self {
            config,
            handler: Arc::new(handler),
            registry: Registry::new(),
            shutdown: Shutdown::new(),
            next_id: AtomicU64::new(1),
            state: AtomicU8::new(ServerState::NotStarted as u8),
            outcome: OnceLock::new(),
            binding,
        }
    }

    /// Bind and run the accept loop until [`stop`](Self::stop) or a fatal
    /// accept error.
    ///
    /// Returns `Ok(())` when stopped deliberately. Only the first call binds:
    /// while running, further calls fail with [`ServerError::AlreadyRunning`];
    /// once stopped, they return the original outcome.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.run_once(async {
            let listener = self.bind().await?;
            self.accept_loop(&listener).await
        })
        .await
    }

    /// Run the accept loop over an already bound `acceptor`.
    ///
    /// Follows the same run-once rules as [`start`](Self::start) and shares
    /// its state: a server is either started or served, once.
    pub async fn serve<A: Acceptor>(&self, acceptor: A) -> Result<(), ServerError> {
        self.run_once(self.accept_loop(&acceptor)).await
    }

    /// Run [`start`](Self::start) on a new task.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<Result<(), ServerError>> {
        let server = Arc::clone(self);
        tokio::spawn(async move { server.start().await })
    }

    /// Close the listener and cancel every live connection.
    ///
    /// Does not wait for handlers; see [`drain`](Self::drain). Safe to call
    /// repeatedly and concurrently with a running accept loop.
    pub fn stop(&self) {
        let never_started = self
            .state
            .compare_exchange(
                ServerState::NotStarted as u8,
                ServerState::Stopped as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if never_started {
            self.binding.send_replace(Binding::Closed);
        }

        if !self.shutdown.is_triggered() {
            tracing::info!(live = self.registry.len(), "Stopping server");
        }
        self.shutdown.trigger();
    }

    /// Wait up to `timeout` for every connection to close. Returns whether
    /// the registry drained.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, self.registry.wait_empty())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.registry.len(),
                timeout_ms = timeout.as_millis() as u64,
                "Drain timed out"
            );
        }
        drained
    }

    /// Cancel a single connection's scope. Returns `false` if it is not live.
    pub fn cancel_connection(&self, id: ConnectionId) -> bool {
        match self.registry.get(id) {
            Some(info) => {
                info.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait for the bind attempt. `None` if binding failed or never happened.
    pub async fn listening(&self) -> Option<ListenAddr> {
        let mut rx = self.binding.subscribe();
        let binding = rx
            .wait_for(|binding| *binding != Binding::Pending)
            .await
            .ok()?;
        match &*binding {
            Binding::Listening(addr) => Some(addr.clone()),
            _ => None,
        }
    }

    /// The bound address while the accept loop runs.
    pub fn local_addr(&self) -> Option<ListenAddr> {
        match &*self.binding.borrow() {
            Binding::Listening(addr) => Some(addr.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn terminal_outcome(&self) -> Result<(), ServerError> {
        // Stopped without an outcome means stop() ran before start().
        self.outcome.get().cloned().unwrap_or(Ok(()))
    }

    async fn run_once<F>(&self, run: F) -> Result<(), ServerError>
    where
        F: Future<Output = Result<(), ServerError>>,
    {
        if let Err(current) = self.state.compare_exchange(
            ServerState::NotStarted as u8,
            ServerState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return match ServerState::from_u8(current) {
                ServerState::Running => Err(ServerError::AlreadyRunning),
                _ => self.terminal_outcome(),
            };
        }

        let guard = RunGuard {
            server: self,
            result: None,
        };
        let result = run.await;
        guard.finish(result.clone());
        result
    }

    async fn bind(&self) -> Result<Listener, ServerError> {
        let network = self.config.network();
        let address = self.config.address();

        Listener::bind(network, address)
            .await
            .map_err(|err| match err {
                ListenerError::Unsupported(network) => ServerError::UnsupportedNetwork(network),
                ListenerError::Bind(source) | ListenerError::Accept(source) => ServerError::Bind {
                    network,
                    address: address.to_string(),
                    source: Arc::new(source),
                },
            })
    }

    async fn accept_loop<A: Acceptor>(&self, acceptor: &A) -> Result<(), ServerError> {
        self.binding
            .send_replace(Binding::Listening(acceptor.local_addr().clone()));
        tracing::info!(address = %acceptor.local_addr(), "Accepting connections");

        let mut retry = AcceptRetry::new(self.config.accept().clone());
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => return Ok(()),
                accepted = acceptor.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    retry.on_success();
                    self.admit(stream, peer);
                }
                Err(err) => {
                    let err = into_io_error(err);
                    match retry.on_error(&err) {
                        Some(delay) => {
                            metrics::record_accept_error(true);
                            tracing::warn!(
                                error = %err,
                                attempt = retry.consecutive_failures(),
                                delay_ms = delay.as_millis() as u64,
                                "Transient accept error, backing off"
                            );
                            tokio::select! {
                                biased;
                                _ = self.shutdown.triggered() => return Ok(()),
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        None => {
                            metrics::record_accept_error(false);
                            return Err(ServerError::Accept(Arc::new(err)));
                        }
                    }
                }
            }
        }
    }

    fn admit(&self, stream: Stream, peer: PeerAddr) {
        let id = ConnectionId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let info = ConnectionInfo::new(id, peer, self.shutdown.child());
        self.registry.insert(info.clone());
        metrics::record_connection_accepted();

        if let Some(hook) = self.config.on_connect() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(&stream))) {
                metrics::record_hook_panic();
                tracing::error!(
                    connection_id = %id,
                    panic = panic_message(&*payload),
                    "on_connect hook panicked"
                );
            }
        }

        let conn = Connection::new(info, stream, self.registry.clone());
        tracing::debug!(connection_id = %id, peer = %conn.peer_addr(), "Connection accepted");

        let span = tracing::debug_span!("connection", connection_id = %id);
        tokio::spawn(dispatch(Arc::clone(&self.handler), conn).instrument(span));
    }
}

impl<H> Server<H> {
    fn record_outcome(&self, result: Result<(), ServerError>) {
        let _ = self.outcome.set(result.clone());
        self.state.store(ServerState::Stopped as u8, Ordering::Release);
        self.binding.send_replace(Binding::Closed);
        // Covers the fatal-error path; after stop() this is a no-op.
        self.shutdown.trigger();

        match &result {
            Ok(()) => tracing::info!(live = self.registry.len(), "Server stopped"),
            Err(e) => tracing::error!(error = %e, "Server terminated"),
        }
    }
}

/// Moves a running server to `Stopped` even if its accept loop unwinds or
/// its `start` future is dropped.
struct RunGuard<'a, H> {
    server: &'a Server<H>,
    result: Option<Result<(), ServerError>>,
}

impl<H> RunGuard<'_, H> {
    fn finish(mut self, result: Result<(), ServerError>) {
        self.result = Some(result);
    }
}

impl<H> Drop for RunGuard<'_, H> {
    fn drop(&mut self) {
        let result = self.result.take().unwrap_or(Err(ServerError::Aborted));
        self.server.record_outcome(result);
    }
}

impl<H> fmt::Debug for Server<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("state", &ServerState::from_u8(self.state.load(Ordering::Acquire)))
            .field("registry", &self.registry)
            .finish()
    }
}

/// Run the handler, then close the connection whatever happened.
async fn dispatch<H: Handler>(handler: Arc<H>, mut conn: Connection) {
    let cx = conn.token().clone();
    let outcome = AssertUnwindSafe(handler.handle(cx, &mut conn))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => tracing::trace!("Handler finished"),
        Ok(Err(e)) => {
            metrics::record_handler_failure(false);
            tracing::warn!(error = %e, "Handler failed");
        }
        Err(panic) => {
            metrics::record_handler_failure(true);
            tracing::error!(panic = panic_message(&*panic), "Handler panicked");
        }
    }
    conn.close();
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

fn into_io_error(err: ListenerError) -> io::Error {
    match err {
        ListenerError::Bind(e) | ListenerError::Accept(e) => e,
        ListenerError::Unsupported(network) => io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{network} listeners are not supported"),
        ),
    }
}
