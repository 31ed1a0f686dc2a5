use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use crate::backend_client::{BackendClient, QueryError};
use crate::cli::chat::transcript::{Message, Status, TranscriptStore};

/// Drives the submit/resolve cycle between the transcript and the backend.
///
/// Submissions are not serialized: the user may send again before the
/// previous reply lands. Each submission takes a monotonically increasing
/// request id, and a completion whose id is no longer the latest is dropped
/// so a slow stale reply can never clobber a newer exchange.
pub struct ChatSession {
    store: Arc<TranscriptStore>,
    client: Arc<BackendClient>,
    latest_request: Arc<AtomicU64>,
}

impl ChatSession {
    pub fn new(client: BackendClient) -> Self {
        Self {
            store: Arc::new(TranscriptStore::new()),
            client: Arc::new(client),
            latest_request: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// Submits one user message. Fire-and-forget: the transcript is updated
    /// synchronously with the USER entry and a PENDING placeholder, and again
    /// when the request settles. Whitespace-only input is silently dropped.
    pub fn submit(&self, input: &str) {
        if input.trim().is_empty() {
            debug!("ignoring empty input");
            return;
        }

        let id = self.begin_exchange(input);
        let store = Arc::clone(&self.store);
        let client = Arc::clone(&self.client);
        let latest = Arc::clone(&self.latest_request);
        let query = input.to_string();

        tokio::spawn(async move {
            let outcome = client.query(&query).await;
            apply_completion(&store, &latest, id, outcome);
        });
    }

    /// Records the user message and its placeholder, superseding any earlier
    /// in-flight exchange. The raw text is stored; only the validity check
    /// uses the trimmed copy.
    fn begin_exchange(&self, input: &str) -> u64 {
        let id = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        // The superseded placeholder would dangle forever once its
        // completion is dropped, so it goes now.
        self.store.remove_pending();
        self.store.append(Message::user(input));
        self.store.append(Message::pending());
        id
    }

    /// Waits until no request is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.store.subscribe();
        loop {
            let pending = rx
                .borrow_and_update()
                .iter()
                .any(|m| m.status == Status::Pending);
            if !pending {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Discards the transcript and invalidates outstanding request ids, so
    /// replies still in flight cannot resurface after the clear.
    pub fn reset(&self) {
        self.latest_request.fetch_add(1, Ordering::SeqCst);
        self.store.clear();
    }
}

fn apply_completion(
    store: &TranscriptStore,
    latest: &AtomicU64,
    id: u64,
    outcome: Result<String, QueryError>,
) {
    if latest.load(Ordering::SeqCst) != id {
        debug!(request = id, "dropping completion for superseded request");
        return;
    }
    match outcome {
        Ok(reply) => store.resolve(Message::reply(reply)),
        Err(err) => {
            // The transcript only ever shows the generic apology.
            error!(request = id, "backend query failed: {err}");
            store.resolve(Message::error());
        }
    }
}
