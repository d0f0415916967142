//! Connection acceptance and session dispatch.
//!
//! The registry owns the listening socket and the map from client identity to
//! session. The map is touched only from the accept loop — single-writer
//! confinement makes a lock unnecessary. Each attached connection gets one
//! serving task (scheduler + frame writes) and one ack-listener task; the two
//! share the session state behind an async mutex with short, await-free
//! critical sections.

use std::{collections::HashMap, io, net::SocketAddr, sync::Arc, time::Duration};

use rand::RngCore;
use seqwire_proto::{Acknowledge, Connect, ProtocolError};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
    task::JoinHandle,
    time,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::ServerError,
    session::{SessionState, TickStep},
};

/// Tuning knobs for the registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Scheduler period: one sweep step per tick per session.
    pub tick_period: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { tick_period: Duration::from_secs(1) }
    }
}

type SharedSession = Arc<Mutex<SessionState>>;

/// One registered client: its state plus the currently attached serving task.
struct SessionEntry {
    state: SharedSession,
    serving: Option<JoinHandle<()>>,
}

/// Accepts connections and dispatches them to per-client sessions.
///
/// Sessions are created on first connect for an identity and retained for the
/// process lifetime; a reconnect with a known identity re-attaches the
/// existing state, so already-acked indices are never re-sent.
pub struct Registry {
    listener: TcpListener,
    config: RegistryConfig,
    sessions: HashMap<String, SessionEntry>,
}

impl Registry {
    /// Bind the listening socket.
    pub async fn bind(addr: &str, config: RegistryConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
        Ok(Self { listener, config, sessions: HashMap::new() })
    }

    /// Address the registry is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and dispatch connections until the listener fails.
    ///
    /// A connect frame that fails to decode closes only that connection; the
    /// loop keeps accepting. Accept failures are fatal to the registry.
    pub async fn run(mut self) -> Result<(), ServerError> {
        loop {
            let (mut stream, peer) = self.listener.accept().await.map_err(ServerError::Accept)?;

            let connect = match Connect::decode(&mut stream).await {
                Ok(connect) => connect,
                Err(err) => {
                    warn!(%peer, error = %err, "failed to decode connect frame, dropping connection");
                    continue;
                },
            };

            self.attach(connect, stream);
        }
    }

    /// Create or resume the session for one decoded connect frame.
    fn attach(&mut self, connect: Connect, stream: TcpStream) {
        let client_id = connect.client_id;
        let tick_period = self.config.tick_period;

        let entry = self.sessions.entry(client_id.clone()).or_insert_with(|| {
            info!(%client_id, n = connect.n, "starting client");
            SessionEntry {
                state: Arc::new(Mutex::new(SessionState::new(random_series(connect.n)))),
                serving: None,
            }
        });

        // Resuming: the prior connection is logically abandoned. Stop its
        // serving task before attaching the new one.
        if let Some(previous) = entry.serving.take() {
            info!(%client_id, "resuming client");
            previous.abort();
        }

        let state = Arc::clone(&entry.state);
        entry.serving = Some(tokio::spawn(serve(client_id, state, stream, tick_period)));
    }
}

/// Generate a fresh series. Plain PRNG output — the values carry no secret.
fn random_series(n: u32) -> Vec<u32> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.next_u32()).collect()
}

/// How a serving loop ended.
enum Served {
    /// Every slot acked; the client is done.
    Completed,
    /// The peer vanished mid-stream. State is retained for resume.
    Detached,
}

/// Drive one attached connection: spawn the ack listener, run the scheduler.
async fn serve(client_id: String, state: SharedSession, stream: TcpStream, tick_period: Duration) {
    let (read_half, write_half) = stream.into_split();

    let ack_listener = tokio::spawn(listen_acks(client_id.clone(), Arc::clone(&state), read_half));

    let result = stream_series(&state, write_half, tick_period).await;
    ack_listener.abort();

    match result {
        Ok(Served::Completed) => info!(%client_id, "client complete"),
        Ok(Served::Detached) => info!(%client_id, "client lost, session retained for resume"),
        // Contained: this session dies, the registry and every other
        // session keep running.
        Err(err) => error!(%client_id, error = %err, "session write failed"),
    }
}

/// Periodic sweep scheduler: one state-machine step per tick.
async fn stream_series(
    state: &SharedSession,
    mut writer: OwnedWriteHalf,
    tick_period: Duration,
) -> io::Result<Served> {
    let mut ticker = time::interval(tick_period);

    loop {
        ticker.tick().await;

        let step = state.lock().await.tick();
        match step {
            TickStep::Skip => {},
            TickStep::Complete => return Ok(Served::Completed),
            TickStep::Send(msg) => {
                let frame = msg.encode();
                if let Err(err) = writer.write_all(&frame).await {
                    if is_disconnect(&err) {
                        return Ok(Served::Detached);
                    }
                    return Err(err);
                }
                debug!(tag = %msg.tag(), "sent frame");
            },
        }
    }
}

/// Decode acknowledgments until the connection goes away.
///
/// A frame that is not an `ACK` is dropped and decoding continues; only a
/// vanished peer ends the listener. Ack flags are monotone, so applying them
/// concurrently with the scheduler needs no further coordination.
async fn listen_acks(client_id: String, state: SharedSession, mut reader: OwnedReadHalf) {
    loop {
        match Acknowledge::decode(&mut reader).await {
            Ok(ack) => {
                if state.lock().await.record_ack(ack.sequence) {
                    debug!(%client_id, sequence = ack.sequence, "acked");
                }
            },
            Err(err @ (ProtocolError::TagMismatch { .. } | ProtocolError::UnknownTag(_))) => {
                debug!(%client_id, error = %err, "dropping malformed frame on ack stream");
            },
            Err(_) => return,
        }
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}
