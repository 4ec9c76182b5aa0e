//! # Event Bus System
//!
//! Typed events broadcast over `tokio::sync::broadcast` so hosts can react to
//! inventory changes (refresh a "My books" screen, update a swap counter
//! badge) without polling.
//!
//! ```text
//!  inventory ─┐                       ┌─> subscriber (UI)
//!  wishlist  ─┼─ emit ─> EventBus ────┤
//!  browse    ─┘                       └─> subscriber (analytics)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SwapEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Swap(SwapEvent::Completed {
//!     uid: "u1".to_string(),
//!     isbn: "9780441013593".to_string(),
//!     total_swaps: 3,
//! }))
//! .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Swap completed");
//! # }
//! ```
//!
//! Emitting with no subscribers returns `Err(SendError)`; services ignore it.
//! Slow subscribers receive `RecvError::Lagged(n)` and may keep reading.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Library(LibraryEvent),
    Swap(SwapEvent),
    Wishlist(WishlistEvent),
    Account(AccountEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Swap(e) => e.description(),
            CoreEvent::Wishlist(e) => e.description(),
            CoreEvent::Account(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Library(LibraryEvent::PageLoaded { .. }) => EventSeverity::Debug,
            CoreEvent::Account(AccountEvent::Deleted { .. }) => EventSeverity::Warning,
            _ => EventSeverity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Shared inventory changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A user added a book to the shared inventory.
    BookListed { isbn: String, uid: String },
    /// A user stopped owning a book. `entry_removed` is set when they were
    /// the last owner and the book left the inventory.
    BookUnlisted {
        isbn: String,
        uid: String,
        entry_removed: bool,
    },
    /// A browse page was appended to a session.
    PageLoaded { count: usize, has_more: bool },
}

impl LibraryEvent {
    pub fn description(&self) -> &str {
        match self {
            LibraryEvent::BookListed { .. } => "Book listed",
            LibraryEvent::BookUnlisted { .. } => "Book unlisted",
            LibraryEvent::PageLoaded { .. } => "Browse page loaded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SwapEvent {
    Completed {
        uid: String,
        isbn: String,
        /// The user's swap counter after this swap
        total_swaps: i64,
    },
}

impl SwapEvent {
    pub fn description(&self) -> &str {
        match self {
            SwapEvent::Completed { .. } => "Swap completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WishlistEvent {
    Added { isbn: String, uid: String },
    Removed { isbn: String, uid: String },
}

impl WishlistEvent {
    pub fn description(&self) -> &str {
        match self {
            WishlistEvent::Added { .. } => "Added to wishlist",
            WishlistEvent::Removed { .. } => "Removed from wishlist",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AccountEvent {
    /// Profile removed and the user released from every book and wishlist.
    Deleted { uid: String, books_released: usize },
}

impl AccountEvent {
    pub fn description(&self) -> &str {
        match self {
            AccountEvent::Deleted { .. } => "Account deleted",
        }
    }
}

/// Broadcast hub for [`CoreEvent`]s. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is the per-subscriber backlog before `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that received the event, or an
    /// error when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New receiver for future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

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

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper that skips events not matching a predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let swaps_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Swap(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the stream fell behind, `RecvError::Closed`
    /// once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). `None` when nothing
    /// matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(isbn: &str) -> CoreEvent {
        CoreEvent::Library(LibraryEvent::BookListed {
            isbn: isbn.to_string(),
            uid: "u1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(listed("1")).is_err());
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(listed("1")).unwrap(), 2);
        assert_eq!(first.recv().await.unwrap(), listed("1"));
        assert_eq!(second.recv().await.unwrap(), listed("1"));
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Wishlist(_)));

        bus.emit(listed("1")).unwrap();
        let wish = CoreEvent::Wishlist(WishlistEvent::Added {
            isbn: "1".to_string(),
            uid: "u2".to_string(),
        });
        bus.emit(wish.clone()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), wish);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe();
        for i in 0..5 {
            bus.emit(listed(&i.to_string())).unwrap();
        }

        assert!(matches!(receiver.recv().await, Err(RecvError::Lagged(_))));
        assert!(receiver.recv().await.is_ok());
    }

    #[test]
    fn test_severity_and_description() {
        let page = CoreEvent::Library(LibraryEvent::PageLoaded {
            count: 10,
            has_more: true,
        });
        let deleted = CoreEvent::Account(AccountEvent::Deleted {
            uid: "u1".to_string(),
            books_released: 2,
        });

        assert_eq!(page.severity(), EventSeverity::Debug);
        assert_eq!(deleted.severity(), EventSeverity::Warning);
        assert_eq!(listed("1").severity(), EventSeverity::Info);
        assert_eq!(deleted.description(), "Account deleted");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Swap(SwapEvent::Completed {
            uid: "u1".to_string(),
            isbn: "9780441013593".to_string(),
            total_swaps: 4,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Swap");
        assert_eq!(json["payload"]["event"], "Completed");
        assert_eq!(json["payload"]["total_swaps"], 4);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
