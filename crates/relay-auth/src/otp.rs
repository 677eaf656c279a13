//! One-time credential store with time-based expiry.
//!
//! Every entry is removed by whichever comes first: a successful
//! [`CredentialStore::verify`], or the sweep once it is older than the
//! retention window. Issue, verify and sweep share one mutex.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

/// A single-use admission credential.
#[derive(Clone, Debug)]
pub struct Otp {
    /// Opaque token presented at `/ws?otp=`.
    pub key: String,
    /// When the credential was issued.
    pub created: Instant,
}

impl Otp {
    fn is_expired(&self, retention: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created) > retention
    }
}

/// Issued credentials awaiting verification.
pub struct CredentialStore {
    entries: Mutex<HashMap<String, Otp>>,
    retention: Duration,
}

impl CredentialStore {
    /// Create an empty store. No sweep runs until [`Self::spawn_sweeper`].
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Retention window after which unverified credentials expire.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Issue a new credential keyed by a random UUID v4.
    pub fn issue(&self) -> Otp {
        let otp = Otp {
            key: Uuid::new_v4().to_string(),
            created: Instant::now(),
        };
        let _ = self.entries.lock().insert(otp.key.clone(), otp.clone());
        counter!("relay_otp_issued_total").increment(1);
        otp
    }

    /// Consume a credential.
    ///
    /// Returns `true` and removes the entry iff it exists and has not
    /// outlived the retention window. An expired entry is removed as well
    /// but reported as `false`.
    pub fn verify(&self, key: &str) -> bool {
        let Some(otp) = self.entries.lock().remove(key) else {
            return false;
        };
        if otp.is_expired(self.retention, Instant::now()) {
            counter!("relay_otp_expired_total").increment(1);
            return false;
        }
        true
    }

    /// Remove every credential older than the retention window.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, otp| !otp.is_expired(self.retention, now));
        let removed = before - entries.len();
        if removed > 0 {
            counter!("relay_otp_expired_total").increment(removed as u64);
        }
        removed
    }

    /// Number of credentials awaiting verification.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no credentials are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Run [`Self::sweep_expired`] every `interval` until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            trace!(removed, "expired credentials swept");
                        }
                    }
                    () = cancel.cancelled() => {
                        debug!("credential sweep stopped");
                        return;
                    }
                }
            }
        })
    }
}
