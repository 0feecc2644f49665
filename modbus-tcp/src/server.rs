use std::{
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::{JoinHandle, JoinSet},
};
use tracing::Instrument;

use crate::{
    consts::DEFAULT_PORT,
    session::{wait_for_shutdown, Session},
    store::{BankSizes, RegisterStore},
};

/// Pause after a failed accept so a persistent error (e.g. out of file descriptors) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Everything needed to start a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host name or ip address to listen on.
    pub bind_address: String,
    pub port: u16,
    pub bank_sizes: BankSizes,
    /// Connections beyond this many concurrent sessions are closed right after accept. `None` is unbounded.
    pub max_connections: Option<usize>,
    /// Close a session that has not sent a complete request for this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            bank_sizes: BankSizes::default(),
            max_connections: None,
            idle_timeout: None,
        }
    }
}

/// Accepts connections and serves each one from its own task against a shared [`RegisterStore`].
pub struct ModbusTCPServer {
    listener: TcpListener,
    store: Arc<RegisterStore>,
    max_connections: Option<usize>,
    idle_timeout: Option<Duration>,
}

impl ModbusTCPServer {
    pub fn new(listener: TcpListener, store: Arc<RegisterStore>) -> Self {
        Self {
            listener,
            store,
            max_connections: None,
            idle_timeout: None,
        }
    }

    /// Binds the configured address and creates a zeroed store with the configured bank sizes.
    pub async fn bind(config: &ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((config.bind_address.as_str(), config.port)).await?;
        let store = Arc::new(RegisterStore::new(config.bank_sizes));
        Ok(Self::new(listener, store)
            .with_max_connections(config.max_connections)
            .with_idle_timeout(config.idle_timeout))
    }

    /// The store sessions execute against, for seeding or inspecting values locally.
    pub fn store(&self) -> Arc<RegisterStore> {
        self.store.clone()
    }

    pub fn with_max_connections(mut self, max_connections: Option<usize>) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts the accept loop on the current runtime.
    pub fn spawn(self) -> io::Result<ServerHandle> {
        let local_addr = self.listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let active = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(
            self.accept_loop(shutdown_rx, active.clone())
                .instrument(tracing::info_span!("Modbus-Server-TCP", listen = ?local_addr)),
        );

        Ok(ServerHandle {
            local_addr,
            shutdown,
            active,
            task,
        })
    }

    async fn accept_loop(self, mut shutdown: watch::Receiver<bool>, active: Arc<AtomicUsize>) {
        let mut sessions = JoinSet::new();

        tracing::info!("listening");

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                result = self.listener.accept() => match result {
                    Ok((stream, addr)) => self.start_session(&mut sessions, stream, addr, &shutdown, &active),
                    Err(err) => {
                        tracing::error!("error accepting connection: {}", err);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }

        tracing::info!("server shutdown, waiting for {} session(s)", active.load(Ordering::SeqCst));
        while sessions.join_next().await.is_some() {}
        tracing::info!("all sessions closed");
    }

    fn start_session(
        &self,
        sessions: &mut JoinSet<()>,
        stream: TcpStream,
        addr: SocketAddr,
        shutdown: &watch::Receiver<bool>,
        active: &Arc<AtomicUsize>,
    ) {
        if let Some(max_connections) = self.max_connections {
            if active.load(Ordering::SeqCst) >= max_connections {
                tracing::warn!("rejecting connection from {}: {} session(s) already active", addr, max_connections);
                return;
            }
        }

        let session = Session::new(stream, self.store.clone(), self.idle_timeout);
        let shutdown = shutdown.clone();
        let guard = ActiveSession::new(active.clone());

        sessions.spawn(
            async move {
                tracing::info!("connected");
                match session.run(shutdown).await {
                    Ok(()) => tracing::info!("disconnected"),
                    Err(err) => tracing::warn!("session closed: {}", err),
                }
                drop(guard);
            }
            .instrument(tracing::info_span!("session", peer = %addr)),
        );
    }
}

/// Counts a session as active for as long as it lives.
struct ActiveSession(Arc<AtomicUsize>);

impl ActiveSession {
    fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to a running server. Dropping it stops the server without waiting for sessions.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    active: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of sessions currently being served.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stops accepting, tells every session to close and waits until all of them have.
    pub async fn shutdown(self) {
        _ = self.shutdown.send(true);
        _ = self.task.await;
    }
}
