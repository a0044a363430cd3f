//! A single gateway connection.

use crate::{
    callback::{Direction, DispatchCallback, ShardInfo, StatusCallback},
    close_code::{self, CloseClass},
    error::{GatewayCriticalError, Signal},
    intents::Intents,
    opcode::Opcode,
    status::ShardStatus,
};
use corvid_gateway_queue::GatewayRateLimiter;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::{json, Value};
use std::{
    convert::TryFrom,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};
use tokio::{net::TcpStream, sync::Mutex as AsyncMutex, task::JoinHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = Arc<AsyncMutex<SplitSink<Socket, Message>>>;

#[derive(Default)]
struct ShardState {
    status: ShardStatus,
    session_id: Option<String>,
    seq: Option<u64>,
    heartbeat_interval: Option<Duration>,
    last_heartbeat: Option<Instant>,
    last_ack: Option<Instant>,
}

/// One WebSocket connection to the Discord gateway.
///
/// Owns the subset of its connection identified as mutable runtime state:
/// the active socket, heartbeat bookkeeping, and session/sequence. All of
/// it is only ever written from within [`Shard::connect`]'s task, which
/// upholds the single-threaded-per-shard invariant; other tasks only ever
/// read it through the accessor methods below.
pub struct Shard {
    id: u64,
    shard_count: u64,
    token: String,
    intents: Intents,
    dispatch_callbacks: Arc<[DispatchCallback]>,
    status_hooks: Arc<[StatusCallback]>,
    send_limiter: Arc<dyn GatewayRateLimiter>,
    state: RwLock<ShardState>,
}

impl Shard {
    /// Construct a shard. Does not connect; call [`Shard::connect`] to run
    /// it.
    #[must_use]
    pub fn new(
        id: u64,
        shard_count: u64,
        token: impl Into<String>,
        intents: Intents,
        dispatch_callbacks: Arc<[DispatchCallback]>,
        status_hooks: Arc<[StatusCallback]>,
        send_limiter: Arc<dyn GatewayRateLimiter>,
    ) -> Self {
        Self {
            id,
            shard_count,
            token: token.into(),
            intents,
            dispatch_callbacks,
            status_hooks,
            send_limiter,
            state: RwLock::new(ShardState::default()),
        }
    }

    /// This shard's id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The total number of shards in this session.
    #[must_use]
    pub const fn shard_count(&self) -> u64 {
        self.shard_count
    }

    /// This shard's current connection status.
    #[must_use]
    pub fn status(&self) -> ShardStatus {
        self.state.read().expect("poisoned").status
    }

    /// Time between the most recent heartbeat and its acknowledgement, if
    /// both have happened.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        let state = self.state.read().expect("poisoned");
        let sent = state.last_heartbeat?;
        let acked = state.last_ack?;
        acked.checked_duration_since(sent)
    }

    fn info(&self) -> ShardInfo {
        ShardInfo::new(self.id, self.shard_count)
    }

    fn set_status(&self, status: ShardStatus) {
        self.state.write().expect("poisoned").status = status;

        for hook in self.status_hooks.iter() {
            tokio::spawn(hook(self.info(), status));
        }
    }

    fn session(&self) -> (Option<String>, Option<u64>) {
        let state = self.state.read().expect("poisoned");
        (state.session_id.clone(), state.seq)
    }

    fn clear_session(&self) {
        let mut state = self.state.write().expect("poisoned");
        state.session_id = None;
        state.seq = None;
    }

    fn record_sequence(&self, seq: u64) {
        self.state.write().expect("poisoned").seq = Some(seq);
    }

    /// Run the connect/reconnect loop forever.
    ///
    /// Sleeps the current backoff before every attempt, including the
    /// first, doubling it (capped at 5s) on a failed attempt and resetting
    /// it to 10ms once a connection is actually established. Only a
    /// critical gateway close code ends the loop.
    pub async fn connect(self: &Arc<Self>, url: &str) -> GatewayCriticalError {
        let mut backoff = Duration::from_millis(10);

        loop {
            tokio::time::sleep(backoff).await;

            match self.run_connection(url).await {
                Signal::Reconnect { established } => {
                    backoff = if established {
                        Duration::from_millis(10)
                    } else {
                        (backoff * 2).min(Duration::from_secs(5))
                    };
                }
                Signal::Critical(critical) => {
                    self.set_status(ShardStatus::Errored);
                    return critical;
                }
            }
        }
    }

    /// Run a single connection attempt to completion.
    ///
    /// Returns [`Signal::Reconnect`] for a non-fatal end (connection
    /// refused, transport error, or a resumable/session-invalidating
    /// close), carrying whether HELLO was ever received this attempt (used
    /// to decide whether backoff resets). Returns [`Signal::Critical`] only
    /// for a critical close code.
    async fn run_connection(self: &Arc<Self>, url: &str) -> Signal {
        let (session_id, seq) = self.session();
        let resuming = session_id.is_some() && seq.is_some();

        self.set_status(ShardStatus::Connecting);

        let socket = match connect_async(url).await {
            Ok((socket, _response)) => socket,
            Err(error) => {
                warn!(shard = self.id, %error, "failed to connect");
                return Signal::Reconnect { established: false };
            }
        };

        let (sink, mut stream) = socket.split();
        let sink: SocketSink = Arc::new(AsyncMutex::new(sink));

        if resuming {
            self.set_status(ShardStatus::Resuming);

            if self
                .send(&sink, json!({"op": Opcode::Resume as u8, "d": {
                    "token": self.token,
                    "session_id": session_id,
                    "seq": seq,
                }}))
                .await
                .is_err()
            {
                return Signal::Reconnect { established: false };
            }
        }

        let mut pacemaker: Option<JoinHandle<()>> = None;
        let mut established = false;

        let outcome = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame = match serde_json::from_str::<Value>(&text) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };

                    if let Some(seq) = frame.get("s").and_then(Value::as_u64) {
                        self.record_sequence(seq);
                    }

                    self.dispatch(Direction::Inbound, frame.clone()).await;

                    let op = frame
                        .get("op")
                        .and_then(Value::as_u64)
                        .and_then(|op| u8::try_from(op).ok());

                    let op = match op {
                        Some(op) => op,
                        None => continue,
                    };

                    match Opcode::try_from(op) {
                        Ok(Opcode::Hello) => {
                            established = true;

                            let interval_ms = frame
                                .get("d")
                                .and_then(|d| d.get("heartbeat_interval"))
                                .and_then(Value::as_u64)
                                .unwrap_or(45_000);

                            self.state.write().expect("poisoned").heartbeat_interval =
                                Some(Duration::from_millis(interval_ms));
                            self.state.write().expect("poisoned").last_ack = Some(Instant::now());

                            pacemaker = Some(self.spawn_pacemaker(Arc::clone(&sink), interval_ms));

                            if !resuming
                                && self
                                    .send(&sink, json!({"op": Opcode::Identify as u8, "d": {
                                        "token": self.token,
                                        "properties": {
                                            "os": std::env::consts::OS,
                                            "browser": "corvid",
                                            "device": "corvid",
                                        },
                                        "intents": self.intents.bits(),
                                        "shard": [self.id, self.shard_count],
                                    }}))
                                    .await
                                    .is_err()
                            {
                                break Signal::Reconnect { established: false };
                            }

                            self.set_status(ShardStatus::Connected);
                        }
                        Ok(Opcode::HeartbeatAck) => {
                            self.state.write().expect("poisoned").last_ack = Some(Instant::now());
                        }
                        Ok(Opcode::Reconnect) => {
                            let _ = sink.lock().await.close().await;
                            break Signal::Reconnect { established };
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map_or(1006, |frame| u16::from(frame.code));
                    break self.handle_disconnect(code, established);
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    debug!(shard = self.id, %error, "transport error, reconnecting");
                    break Signal::Reconnect { established };
                }
                None => break self.handle_disconnect(1006, established),
            }
        };

        if let Some(pacemaker) = pacemaker {
            pacemaker.abort();
        }

        self.set_status(ShardStatus::Disconnected);

        outcome
    }

    fn handle_disconnect(&self, code: u16, established: bool) -> Signal {
        self.set_status(ShardStatus::Errored);

        match close_code::classify(code) {
            CloseClass::Critical => Signal::Critical(GatewayCriticalError::new(code)),
            CloseClass::SessionInvalidating => {
                self.clear_session();
                Signal::Reconnect { established }
            }
            CloseClass::Resumable => Signal::Reconnect { established },
        }
    }

    fn spawn_pacemaker(self: &Arc<Self>, sink: SocketSink, interval_ms: u64) -> JoinHandle<()> {
        let shard = Arc::clone(self);

        tokio::spawn(async move {
            let jitter_bound = interval_ms.max(1);
            tokio::time::sleep(Duration::from_millis(fastrand::u64(0..jitter_bound))).await;

            let interval = Duration::from_millis(interval_ms);

            loop {
                let last_ack = shard.state.read().expect("poisoned").last_ack;

                if let Some(last_ack) = last_ack {
                    if last_ack.elapsed() >= interval {
                        warn!(shard = shard.id, "zombie connection detected, closing");
                        let _ = sink.lock().await.close().await;
                        return;
                    }
                }

                let seq = shard.state.read().expect("poisoned").seq;

                if shard
                    .send(&sink, json!({"op": Opcode::Heartbeat as u8, "d": seq}))
                    .await
                    .is_err()
                {
                    return;
                }

                shard.state.write().expect("poisoned").last_heartbeat = Some(Instant::now());

                tokio::time::sleep(interval).await;
            }
        })
    }

    async fn send(&self, sink: &SocketSink, payload: Value) -> Result<(), ()> {
        self.send_limiter.acquire().await;
        self.dispatch(Direction::Outbound, payload.clone()).await;

        let text = serde_json::to_string(&payload).map_err(|_| ())?;
        let mut sink = sink.lock().await;

        if sink.send(Message::Text(text)).await.is_err() {
            let _ = sink.close().await;
            return Err(());
        }

        Ok(())
    }

    async fn dispatch(&self, direction: Direction, frame: Value) {
        for callback in self.dispatch_callbacks.iter() {
            callback(self.info(), direction, frame.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Shard;
    use crate::intents::Intents;
    use corvid_gateway_queue::InMemoryGatewayRateLimiter;
    use static_assertions::assert_impl_all;
    use std::sync::Arc;

    assert_impl_all!(Shard: Send, Sync);

    fn shard() -> Shard {
        Shard::new(
            0,
            1,
            "token",
            Intents::empty(),
            Arc::from(Vec::new().into_boxed_slice()),
            Arc::from(Vec::new().into_boxed_slice()),
            Arc::new(InMemoryGatewayRateLimiter::new(120, 60)),
        )
    }

    #[test]
    fn starts_pending() {
        let shard = shard();

        assert_eq!(crate::status::ShardStatus::Pending, shard.status());
        assert!(shard.latency().is_none());
    }

    #[test]
    fn fatal_intents_close_is_critical_and_keeps_session() {
        let shard = shard();
        shard.record_sequence(7);

        let signal = shard.handle_disconnect(4014, true);

        assert!(matches!(signal, super::Signal::Critical(critical) if critical.code() == 4014));
    }

    #[test]
    fn session_timeout_clears_session_and_reconnects() {
        let shard = shard();
        shard.record_sequence(7);

        let signal = shard.handle_disconnect(4009, true);

        assert!(matches!(
            signal,
            super::Signal::Reconnect { established: true }
        ));
        assert_eq!((None, None), shard.session());
    }

    #[test]
    fn transient_close_reconnects_without_clearing_session() {
        let shard = shard();
        shard.record_sequence(7);

        let signal = shard.handle_disconnect(1001, true);

        assert!(matches!(
            signal,
            super::Signal::Reconnect { established: true }
        ));
        assert_eq!((None, Some(7)), shard.session());
    }
}
