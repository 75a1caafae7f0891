//! Shared page access: tree locking, mutation notifications, host events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::node::NodeId;
use crate::tree::DocumentTree;

/// Buffered mutation notifications before a slow subscriber starts lagging.
const MUTATION_CHANNEL_CAPACITY: usize = 256;

/// Events this system delivers *to* the host. The only write the pipeline
/// performs against the page is a simulated click on a known node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Click { node: NodeId },
}

struct PageInner {
    tree: RwLock<DocumentTree>,
    url: RwLock<String>,
    title: RwLock<String>,
    revision: AtomicU64,
    mutations: broadcast::Sender<u64>,
    host_events: mpsc::UnboundedSender<HostEvent>,
    host_events_rx: Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>,
}

/// Cheaply clonable handle to one live page.
///
/// Reads and mutations take the tree lock for the duration of the closure;
/// every mutation closure counts as one batched change notification,
/// mirroring how host mutation observers deliver record batches.
#[derive(Clone)]
pub struct PageHandle {
    inner: Arc<PageInner>,
}

impl PageHandle {
    pub fn new(url: impl Into<String>, title: impl Into<String>, tree: DocumentTree) -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        let (host_events, host_events_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(PageInner {
                tree: RwLock::new(tree),
                url: RwLock::new(url.into()),
                title: RwLock::new(title.into()),
                revision: AtomicU64::new(0),
                mutations,
                host_events,
                host_events_rx: Mutex::new(Some(host_events_rx)),
            }),
        }
    }

    pub fn url(&self) -> String {
        self.inner.url.read().clone()
    }

    pub fn title(&self) -> String {
        self.inner.title.read().clone()
    }

    /// The host navigated; any persisted pipeline state keyed to the old
    /// location becomes stale.
    pub fn set_url(&self, url: impl Into<String>) {
        *self.inner.url.write() = url.into();
    }

    /// Monotonic count of mutation batches applied so far.
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    /// Synchronous read access to the tree.
    pub fn read<R>(&self, f: impl FnOnce(&DocumentTree) -> R) -> R {
        f(&self.inner.tree.read())
    }

    /// Apply one batch of mutations and notify subscribers once.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut DocumentTree) -> R) -> R {
        let result = {
            let mut tree = self.inner.tree.write();
            f(&mut tree)
        };
        let revision = self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.inner.mutations.send(revision);
        result
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.read(|tree| tree.contains(id))
    }

    /// Subscribe to mutation batches. Dropping the stream unsubscribes.
    pub fn subscribe(&self) -> MutationStream {
        MutationStream {
            rx: self.inner.mutations.subscribe(),
        }
    }

    /// Simulate a user click on `node`, delivered to the host binding.
    pub fn click(&self, node: NodeId) {
        debug!(%node, "simulated click dispatched to host");
        let _ = self.inner.host_events.send(HostEvent::Click { node });
    }

    /// Take the host-event receiver. The binding that drives the real host
    /// (or a test harness standing in for it) consumes clicks from here.
    pub fn take_host_events(&self) -> Option<mpsc::UnboundedReceiver<HostEvent>> {
        self.inner.host_events_rx.lock().take()
    }
}

/// Subscription to a page's batched mutation notifications.
pub struct MutationStream {
    rx: broadcast::Receiver<u64>,
}

impl MutationStream {
    /// Wait for the next mutation batch; `None` once the page is gone.
    ///
    /// A lagged receiver skips to the oldest retained batch — losing
    /// intermediate batches is fine because the subscriber only needs proof
    /// of activity, not the batches themselves.
    pub async fn changed(&mut self) -> Option<u64> {
        loop {
            match self.rx.recv().await {
                Ok(revision) => return Some(revision),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
