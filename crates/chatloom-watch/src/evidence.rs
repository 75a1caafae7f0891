//! Two-source change evidence and the convergence decision.

use tokio::time::Instant;

use crate::detector::StabilityOptions;
use crate::fingerprint::Fingerprint;

/// Accumulated observations about a subtree since a baseline snapshot.
///
/// Fed by two independent signals — mutation notifications (push) and
/// fingerprint polls (pull). Notifications alone can fire in bursts with no
/// final quiescence signal; polls alone can miss rapid multi-step changes
/// between ticks. Feeding both into one accumulator bounds worst-case
/// convergence latency to `idle + poll_interval` after the true final
/// mutation, and lets tests drive either signal independently.
#[derive(Debug, Clone)]
pub struct ChangeEvidence {
    baseline: Fingerprint,
    current: Fingerprint,
    started_at: Instant,
    last_mutation_at: Option<Instant>,
    stable_since: Option<Instant>,
    root_detached: bool,
}

impl ChangeEvidence {
    pub fn new(baseline: Fingerprint, started_at: Instant) -> Self {
        let current = baseline.clone();
        Self {
            baseline,
            current,
            started_at,
            last_mutation_at: None,
            stable_since: None,
            root_detached: false,
        }
    }

    /// A mutation notification arrived.
    pub fn record_mutation(&mut self, at: Instant) {
        self.last_mutation_at = Some(at);
    }

    /// A poll observed `fingerprint`. `stable_since` resets whenever the
    /// fingerprint differs from the previous poll's, and latches to the first
    /// poll where it does not.
    pub fn record_poll(&mut self, fingerprint: Fingerprint, at: Instant) {
        if fingerprint != self.current {
            self.current = fingerprint;
            self.stable_since = None;
        } else if self.stable_since.is_none() {
            self.stable_since = Some(at);
        }
    }

    /// The observed root no longer resolves. A detached subtree cannot change
    /// further.
    pub fn record_detached(&mut self) {
        self.root_detached = true;
    }

    pub fn current(&self) -> &Fingerprint {
        &self.current
    }

    /// The convergence decision. `None` means keep waiting; `Some(changed)`
    /// is the final verdict.
    ///
    /// Pure in its inputs: given the same evidence, `now` and options it
    /// always decides the same way.
    pub fn verdict(&self, now: Instant, opts: &StabilityOptions) -> Option<bool> {
        if self.root_detached {
            return Some(false);
        }
        if now.duration_since(self.started_at) >= opts.timeout() {
            // No verdict reached in time counts as "nothing changed"; callers
            // must not block exports on a host that never settles.
            return Some(false);
        }

        let stable_for_idle = self
            .stable_since
            .is_some_and(|since| now.duration_since(since) >= opts.idle());

        if self.current == self.baseline {
            let waited_minimum = now.duration_since(self.started_at) >= opts.min_wait();
            (waited_minimum && stable_for_idle).then_some(false)
        } else {
            let quiet_since_mutation = self
                .last_mutation_at
                .is_some_and(|at| now.duration_since(at) >= opts.idle());
            (quiet_since_mutation || stable_for_idle).then_some(true)
        }
    }
}
