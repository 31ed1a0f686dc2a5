use std::sync::Arc;

use tokio::sync::watch;

/// Placeholder text shown while a request is in flight.
pub const PENDING_TEXT: &str = "Thinking...";

/// Generic reply shown for any failed request. The real cause only goes to
/// the log, never into the transcript.
pub const ERROR_TEXT: &str =
    "Sorry, I encountered an error connecting to the service. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Final,
    Pending,
    Error,
}

/// A single transcript entry. Never mutated after creation; lifecycle
/// transitions replace the whole message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub origin: Origin,
    pub status: Status,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: Origin::User,
            status: Status::Final,
        }
    }

    pub fn pending() -> Self {
        Self {
            text: PENDING_TEXT.to_string(),
            origin: Origin::Assistant,
            status: Status::Pending,
        }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: Origin::Assistant,
            status: Status::Final,
        }
    }

    pub fn error() -> Self {
        Self {
            text: ERROR_TEXT.to_string(),
            origin: Origin::Assistant,
            status: Status::Error,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }
}

/// An immutable snapshot of the conversation, oldest message first.
pub type Transcript = Arc<Vec<Message>>;

/// Ordered, append-only conversation state. Every mutation publishes a fresh
/// snapshot through a watch channel, so readers never observe a half-applied
/// transition and renderers can subscribe for changes.
pub struct TranscriptStore {
    snapshot: watch::Sender<Transcript>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self { snapshot }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Transcript {
        self.snapshot.borrow().clone()
    }

    /// A receiver that yields each new snapshot as it is published.
    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.snapshot.subscribe()
    }

    pub fn append(&self, message: Message) {
        let current = self.snapshot();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(message);
        self.snapshot.send_replace(Arc::new(next));
    }

    /// Drops every PENDING entry. When nothing is pending the current
    /// snapshot is kept as-is, so repeated calls are no-ops.
    pub fn remove_pending(&self) {
        let current = self.snapshot();
        if !current.iter().any(Message::is_pending) {
            return;
        }
        let next: Vec<Message> = current
            .iter()
            .filter(|m| !m.is_pending())
            .cloned()
            .collect();
        self.snapshot.send_replace(Arc::new(next));
    }

    /// Replaces the placeholder with its resolution in a single snapshot
    /// transition, so no reader ever sees both at once.
    pub fn resolve(&self, message: Message) {
        let current = self.snapshot();
        let mut next: Vec<Message> = current
            .iter()
            .filter(|m| !m.is_pending())
            .cloned()
            .collect();
        next.push(message);
        self.snapshot.send_replace(Arc::new(next));
    }

    /// Discards the whole transcript.
    pub fn clear(&self) {
        self.snapshot.send_replace(Arc::new(Vec::new()));
    }
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}
