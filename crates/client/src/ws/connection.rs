//! The backend event connection: one WebSocket with auto-reconnect,
//! subscription replay and listener dispatch.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ambient_shared::{ClientMessage, ServerEvent};
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::dispatcher::{Dispatcher, ListenerHandle};
use super::subscriptions::SubscriptionTracker;
use crate::config::{ClientConfig, ReconnectConfig};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state for the event WebSocket
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Client for the backend's event stream.
///
/// Cheap to clone; every clone shares the same socket, listeners and
/// subscriptions. Nothing happens on the network until [`initialize`] is
/// called from inside a tokio runtime.
///
/// [`initialize`]: EventClient::initialize
#[derive(Clone)]
pub struct EventClient {
    shared: Arc<Shared>,
}

struct Shared {
    url: String,
    reconnect: ReconnectConfig,
    dispatcher: Dispatcher,
    subscriptions: Mutex<SubscriptionTracker>,
    /// Present only while a socket is open.
    outbound: Mutex<Option<UnboundedSender<ClientMessage>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    state: watch::Sender<ConnectionState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventClient {
    pub fn new(config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                url: config.ws_url.clone(),
                reconnect: config.reconnect.clone(),
                dispatcher: Dispatcher::new(),
                subscriptions: Mutex::new(SubscriptionTracker::new()),
                outbound: Mutex::new(None),
                task: Mutex::new(None),
                state,
            }),
        }
    }

    /// Start the connection loop unless one is already running.
    ///
    /// After the reconnect budget is exhausted the loop ends, and a later
    /// call starts a fresh one.
    pub fn initialize(&self) -> ConnectionState {
        let mut task = lock(&self.shared.task);
        let running = task.as_ref().is_some_and(|handle| !handle.is_finished());
        if running && !matches!(self.state(), ConnectionState::Failed { .. }) {
            return self.state();
        }
        // A failed loop may still be winding down.
        if let Some(previous) = task.take() {
            previous.abort();
        }

        tracing::info!(url = %self.shared.url, "starting event connection");
        self.shared.state.send_replace(ConnectionState::Connecting);
        *task = Some(tokio::spawn(run(self.shared.clone())));
        self.state()
    }

    /// Tear the connection down and forget every listener and subscription.
    pub fn close(&self) {
        if let Some(handle) = lock(&self.shared.task).take() {
            handle.abort();
        }
        lock(&self.shared.outbound).take();
        self.shared.dispatcher.clear();
        lock(&self.shared.subscriptions).reset();
        self.shared.state.send_replace(ConnectionState::Disconnected);
        tracing::info!(url = %self.shared.url, "event connection closed");
    }

    /// Register `listener` for `event_type` (or `"*"` for every event).
    ///
    /// The first listener for a server-side type subscribes to it; dropping
    /// the last handle for that type unsubscribes.
    pub fn on<F>(&self, event_type: &str, listener: F) -> ListenerHandle
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        // Registry and tracker change under the same lock.
        let (id, request) = {
            let mut subscriptions = lock(&self.shared.subscriptions);
            let (id, first) = self.shared.dispatcher.add(event_type, Arc::new(listener));
            (id, first.then(|| subscriptions.subscribe([event_type])).flatten())
        };
        if let Some(msg) = request {
            self.shared.send_control(msg);
        }

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let owned_type = event_type.to_string();
        ListenerHandle::new(event_type, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let (removed, request) = {
                let mut subscriptions = lock(&shared.subscriptions);
                match shared.dispatcher.remove(&owned_type, id) {
                    Some((listener, true)) => {
                        (Some(listener), subscriptions.unsubscribe([owned_type.as_str()]))
                    }
                    Some((listener, false)) => (Some(listener), None),
                    None => (None, None),
                }
            };
            drop(removed);
            if let Some(msg) = request {
                shared.send_control(msg);
            }
        })
    }

    /// Send a control message on the open socket.
    ///
    /// Returns `false` (after logging) when there is no open socket; nothing
    /// is queued for later.
    pub fn send(&self, msg: ClientMessage) -> bool {
        let sent = self.shared.try_send(msg);
        if !sent {
            tracing::warn!(url = %self.shared.url, "event socket not open, dropping message");
        }
        sent
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// Follow state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn confirmed_subscriptions(&self) -> Vec<String> {
        lock(&self.shared.subscriptions).confirmed()
    }

    pub fn pending_subscriptions(&self) -> Vec<String> {
        lock(&self.shared.subscriptions).pending()
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.shared.dispatcher.listener_count(event_type)
    }

    /// Feed a raw frame through decode and dispatch as if it had arrived on
    /// the socket.
    #[cfg(test)]
    pub(crate) fn inject(&self, frame: &str) {
        self.shared.handle_text(frame);
    }
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn try_send(&self, msg: ClientMessage) -> bool {
        match lock(&self.outbound).as_ref() {
            Some(sender) => sender.unbounded_send(msg).is_ok(),
            None => false,
        }
    }

    /// Subscription traffic produced while offline is expected; the tracker
    /// replays it once the socket opens.
    fn send_control(&self, msg: ClientMessage) {
        if !self.try_send(msg) {
            tracing::debug!("event socket not open, subscription change deferred");
        }
    }

    fn handle_text(&self, text: &str) {
        let event = match ServerEvent::decode(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable event frame");
                return;
            }
        };

        match &event {
            ServerEvent::SubscriptionConfirmed { event_types } => {
                tracing::debug!(?event_types, "subscription confirmed");
                lock(&self.subscriptions).confirm(event_types);
            }
            ServerEvent::Ping => {
                self.try_send(ClientMessage::Pong);
            }
            _ => {}
        }

        self.dispatcher.dispatch(&event);
    }

    /// Drive one open socket until it closes.
    async fn session(&self, socket: Socket) {
        let (mut write, mut read) = socket.split();
        let (sender, mut receiver) = unbounded::<ClientMessage>();
        *lock(&self.outbound) = Some(sender);
        self.set_state(ConnectionState::Connected);

        let replay = lock(&self.subscriptions).resubscribe();
        if let Some(msg) = replay {
            tracing::debug!(event_types = ?msg.event_types(), "replaying subscriptions");
            self.try_send(msg);
        }
        self.dispatcher
            .dispatch(&ServerEvent::ConnectionStatusChanged(true));

        let writer = async {
            while let Some(msg) = receiver.next().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize control message");
                        continue;
                    }
                };
                tracing::trace!(%json, "sending");
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    tracing::warn!(error = %e, "event socket send failed");
                    break;
                }
            }
        };

        let reader = async {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => self.handle_text(text.as_str()),
                    Ok(Message::Close(frame)) => {
                        tracing::info!(?frame, "event socket received close frame");
                        break;
                    }
                    // Pong replies are sent by tungstenite; binary frames are not used.
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "event socket read error");
                        break;
                    }
                }
            }
        };

        tokio::select! {
            _ = writer => {}
            _ = reader => {}
        }

        lock(&self.outbound).take();
        self.set_state(ConnectionState::Disconnected);
        self.dispatcher
            .dispatch(&ServerEvent::ConnectionStatusChanged(false));
    }
}

/// Connection loop: connect, run the session, back off, repeat until the
/// attempt budget is spent.
async fn run(shared: Arc<Shared>) {
    let mut attempt = 0u32;

    loop {
        match connect_async(shared.url.as_str()).await {
            Ok((socket, _response)) => {
                attempt = 0;
                tracing::info!(url = %shared.url, "event socket connected");
                shared.session(socket).await;
                tracing::info!(url = %shared.url, "event socket closed");
            }
            Err(e) => {
                tracing::warn!(url = %shared.url, attempt, error = %e, "event socket connect failed");
            }
        }

        attempt += 1;
        if attempt > shared.reconnect.max_attempts {
            let reason = format!(
                "Max reconnect attempts ({}) exceeded",
                shared.reconnect.max_attempts
            );
            tracing::error!(url = %shared.url, %reason, "giving up on event socket");
            shared.set_state(ConnectionState::Failed { reason });
            shared
                .dispatcher
                .dispatch(&ServerEvent::ConnectionStatusChanged(false));
            return;
        }

        let delay = shared.reconnect.delay_for_attempt(attempt);
        tracing::info!(
            url = %shared.url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnecting event socket"
        );
        shared.set_state(ConnectionState::Reconnecting { attempt });
        tokio::time::sleep(delay).await;
    }
}
