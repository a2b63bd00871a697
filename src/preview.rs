//! Debounced per-section preview counting.
//!
//! Each filter section (price, bedrooms, availability, more, area) owns one
//! [`SectionPreview`]. Rapid edits coalesce through a re-armed timer; a
//! monotonic sequence counter discards responses that were superseded before
//! they resolved. In-flight requests are never aborted at the transport
//! level; correctness relies solely on the sequence guard.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::models::RawParams;
use crate::store::SharedStore;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Observable counting state for one section's UI.
/// `count: None` means "failed or not yet available" — the button label
/// falls back from "Apply (N)" to plain "Apply".
#[derive(Debug, Clone, Default)]
pub struct PreviewState {
    pub count: Option<u64>,
    pub loading: bool,
}

struct Inner {
    store: SharedStore,
    section: String,
    debounce: Duration,
    seq: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
    state: Mutex<PreviewState>,
}

#[derive(Clone)]
pub struct SectionPreview {
    inner: Arc<Inner>,
}

impl SectionPreview {
    pub fn new(store: SharedStore, section: impl Into<String>, debounce: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                section: section.into(),
                debounce: debounce.unwrap_or(DEFAULT_DEBOUNCE),
                seq: AtomicU64::new(0),
                timer: Mutex::new(None),
                state: Mutex::new(PreviewState::default()),
            }),
        }
    }

    pub fn state(&self) -> PreviewState {
        self.inner.state.lock().expect("preview state poisoned").clone()
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self.inner.timer.lock().expect("timer poisoned").take() {
            handle.abort();
        }
    }

    /// Re-arm the debounce timer with this section's latest draft
    /// (slider drags, rapid button taps).
    pub fn schedule_compute(&self, draft: RawParams) {
        self.cancel_timer();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            sleep(inner.debounce).await;
            // Detach the actual compute so a later timer cancellation
            // cannot abort an already-issued request mid-flight.
            tokio::spawn(compute(inner.clone(), draft));
        });
        *self.inner.timer.lock().expect("timer poisoned") = Some(handle);
    }

    /// Skip the debounce (mount-time initial count, explicit user action).
    pub async fn compute_now(&self, draft: RawParams) {
        self.cancel_timer();
        compute(Arc::clone(&self.inner), draft).await;
    }

    /// Cancel any pending timer. In-flight requests complete and are
    /// discarded by the sequence guard.
    pub fn cancel(&self) {
        self.cancel_timer();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.lock().ok().and_then(|mut t| t.take()) {
            handle.abort();
        }
    }
}

async fn compute(inner: Arc<Inner>, draft: RawParams) {
    let seq = inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
    inner.state.lock().expect("preview state poisoned").loading = true;

    {
        let mut store = inner.store.write().await;
        if draft.is_empty() {
            // An empty draft still has to evict this section's stale keys
            // before the merged count is taken.
            store.clear_preview_draft(&inner.section);
            store.update_preview_draft(&inner.section, RawParams::new());
        } else {
            store.update_preview_draft(&inner.section, draft);
        }
    }

    let result = {
        let store = inner.store.read().await;
        store.get_preview_count(&RawParams::new()).await
    };

    // Only the newest request may publish
    if seq == inner.seq.load(Ordering::SeqCst) {
        let mut state = inner.state.lock().expect("preview state poisoned");
        state.count = result.ok();
        state.loading = false;
    }
}
