//! # Event Bus System
//!
//! Broadcast channel through which the client core reports to the UI layer,
//! built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The core never paints anything itself. Everything a view needs to react
//! to is published here instead:
//!
//! ```text
//! ┌────────────────┐  emit   ┌───────────┐  subscribe  ┌──────────────┐
//! │ ApiClient      ├────────>│           ├────────────>│ toast layer  │
//! ├────────────────┤         │ EventBus  │             ├──────────────┤
//! │ TokenStore     ├────────>│ (broadcast├────────────>│ bell / badge │
//! ├────────────────┤         │  channel) │             ├──────────────┤
//! │ Poller, Bridge ├────────>│           ├────────────>│ sync status  │
//! └────────────────┘         └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ClientEvent, EventBus, Notice};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus.emit(ClientEvent::Notice(Notice::success("Login successful"))).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, ClientEvent::Notice(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: subscriber missed `n` events; non-fatal.
//! - **`RecvError::Closed`**: all senders dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns an error that publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Client Event Types
// ============================================================================

/// Top-level event published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum ClientEvent {
    Auth(AuthEvent),
    Request(RequestEvent),
    /// Transient user-facing notice (toast)
    Notice(Notice),
    Notifications(NotificationEvent),
    Connectivity(ConnectivityEvent),
    Bridge(BridgeEvent),
}

impl ClientEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            ClientEvent::Auth(AuthEvent::SignedIn { .. }) => "User signed in",
            ClientEvent::Auth(AuthEvent::SignedOut) => "User signed out",
            ClientEvent::Request(RequestEvent::ServedFromCache { .. }) => {
                "Served cached data after a failed read"
            }
            ClientEvent::Notice(notice) => &notice.message,
            ClientEvent::Notifications(NotificationEvent::UnreadChanged { .. }) => {
                "Unread notifications updated"
            }
            ClientEvent::Notifications(NotificationEvent::NativeShown { .. }) => {
                "Native notification shown"
            }
            ClientEvent::Connectivity(ConnectivityEvent::Online) => "Cloud Synchronized",
            ClientEvent::Connectivity(ConnectivityEvent::Offline) => "Local Only (Offline)",
            ClientEvent::Bridge(BridgeEvent::ActionDelivered { .. }) => {
                "Pending action handed to native bridge"
            }
            ClientEvent::Bridge(BridgeEvent::ActionDropped { .. }) => {
                "Pending action dropped after retries"
            }
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            ClientEvent::Notice(notice) => match notice.level {
                NoticeLevel::Error => EventSeverity::Error,
                NoticeLevel::Warning => EventSeverity::Warning,
                NoticeLevel::Success | NoticeLevel::Info => EventSeverity::Info,
            },
            ClientEvent::Bridge(BridgeEvent::ActionDropped { .. }) => EventSeverity::Error,
            ClientEvent::Request(_) | ClientEvent::Connectivity(ConnectivityEvent::Offline) => {
                EventSeverity::Warning
            }
            ClientEvent::Auth(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Session lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A token was stored after login or setup.
    SignedIn { is_admin: bool },
    /// The token was cleared by an explicit logout.
    SignedOut,
}

/// Request-path events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RequestEvent {
    /// A read failed and the last cached payload for `path` was returned.
    ServedFromCache { path: String, reason: String },
}

/// Visual weight of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// One row of the in-app notification list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationItem {
    pub id: String,
    pub icon: String,
    pub title: String,
    pub message: String,
    pub created_at: Option<String>,
}

/// Notification polling events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NotificationEvent {
    /// The unread set was refreshed.
    UnreadChanged {
        count: usize,
        /// Badge text, `None` when the badge should be hidden
        badge: Option<String>,
        /// Items for the dropdown list (already truncated)
        items: Vec<NotificationItem>,
    },
    /// A system notification was raised for the newest unread item.
    NativeShown { id: String },
}

/// Connectivity transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// Native bridge action-queue outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum BridgeEvent {
    ActionDelivered {
        action_id: String,
        method: String,
        path: String,
        attempts: u32,
    },
    ActionDropped {
        action_id: String,
        method: String,
        path: String,
        attempts: u32,
        reason: String,
    },
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`ClientEvent`]s.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: ClientEvent) -> Result<usize, SendError<ClientEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&ClientEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{ClientEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::default();
/// let notices = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, ClientEvent::Notice(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<ClientEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<ClientEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ClientEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &ClientEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<ClientEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Receives a matching event without waiting.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<ClientEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every buffered matching event.
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
