//! The stability detector loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use chatloom_dom::{NodeId, PageHandle, SelectorList};

use crate::evidence::ChangeEvidence;
use crate::fingerprint::{Fingerprint, fingerprint};

/// Timing knobs for one stability wait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityOptions {
    /// Hard ceiling on the whole wait.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Quiet window that counts as "settled".
    #[serde(default = "default_idle_ms")]
    pub idle_ms: u64,

    /// Minimum wait before a no-change verdict, so slow hosts get a chance
    /// to start mutating at all.
    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: u64,

    /// Fingerprint poll cadence.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Text samples folded into each fingerprint signature.
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_idle_ms() -> u64 {
    800
}

fn default_min_wait_ms() -> u64 {
    1200
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_max_samples() -> usize {
    10
}

impl Default for StabilityOptions {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            idle_ms: default_idle_ms(),
            min_wait_ms: default_min_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_samples: default_max_samples(),
        }
    }
}

impl StabilityOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn min_wait(&self) -> Duration {
        Duration::from_millis(self.min_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Outcome of one stability wait.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityVerdict {
    /// Whether content changed relative to the baseline. A hard timeout
    /// reports `false` — "no verdict" is treated like "nothing changed".
    pub changed: bool,
    /// The fingerprint current at the moment of the verdict.
    pub fingerprint: Fingerprint,
}

/// Observe `scope` until it converges relative to `baseline`, or until the
/// configured timeout.
///
/// Subscribes to the page's mutation notifications and polls fingerprints at
/// the configured cadence; both feed one [`ChangeEvidence`] accumulator whose
/// decision function is evaluated on every poll tick. The subscription is a
/// guard dropped on every exit path. A scope detached mid-wait converges as
/// "no further changes".
pub async fn wait_for_change_or_timeout(
    page: &PageHandle,
    scope: NodeId,
    selectors: &SelectorList,
    baseline: Fingerprint,
    opts: &StabilityOptions,
) -> StabilityVerdict {
    let started = Instant::now();
    let deadline = started + opts.timeout();
    let mut evidence = ChangeEvidence::new(baseline, started);

    // Dropped (unsubscribed) on every return path below.
    let mut stream = Some(page.subscribe());
    let mut poll = tokio::time::interval_at(started + opts.poll_interval(), opts.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            notified = async {
                match stream.as_mut() {
                    Some(stream) => stream.changed().await,
                    None => std::future::pending().await,
                }
            } => {
                // Record only. The verdict waits for the next poll: a
                // notification always precedes the fingerprint catching up,
                // and deciding here could emit "no change" computed from the
                // pre-change fingerprint.
                match notified {
                    Some(revision) => {
                        trace!(revision, "mutation notification");
                        evidence.record_mutation(Instant::now());
                    }
                    // Channel gone; polling alone carries the wait from here.
                    None => stream = None,
                }
            }
            _ = poll.tick() => {
                let now = Instant::now();
                if page.contains(scope) {
                    let current =
                        page.read(|tree| fingerprint(tree, scope, selectors, opts.max_samples));
                    evidence.record_poll(current, now);
                } else {
                    debug!(%scope, "observed root detached mid-wait");
                    evidence.record_detached();
                }
                if let Some(changed) = evidence.verdict(Instant::now(), opts) {
                    debug!(
                        changed,
                        count = evidence.current().count,
                        "stability wait converged"
                    );
                    return StabilityVerdict {
                        changed,
                        fingerprint: evidence.current().clone(),
                    };
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                debug!(elapsed_ms = opts.timeout_ms, "stability wait hit hard timeout");
                return StabilityVerdict {
                    changed: false,
                    fingerprint: evidence.current().clone(),
                };
            }
        }
    }
}
