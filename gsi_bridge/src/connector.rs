//! # Connector Facade
//!
//! Owns the whole ingest pipeline: listener, store, subscriber registry,
//! liveness state, health monitor and reconnect controller. This is the one
//! value callers hold; there is no process-wide singleton.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::GsiError;
use crate::listener::{GsiListener, ListenerContext};
use crate::model::Snapshot;
use crate::monitor::{self, Liveness};
use crate::reconnect::ReconnectController;
use crate::registry::{SubscriberCallback, SubscriberRegistry, SubscriptionHandle};
use crate::store::SnapshotStore;

struct MonitorTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct GsiConnector {
    store: Arc<SnapshotStore>,
    subscribers: Arc<SubscriberRegistry>,
    liveness: Arc<Liveness>,
    listener: Arc<GsiListener>,
    controller: Arc<ReconnectController>,
    monitor: tokio::sync::Mutex<Option<MonitorTask>>,
    check_interval: Duration,
    silence_threshold: Duration,
}

impl GsiConnector {
    pub fn new(config: &Config) -> Self {
        let store = Arc::new(SnapshotStore::new());
        let subscribers = Arc::new(SubscriberRegistry::new());
        let liveness = Arc::new(Liveness::new());

        let ctx = ListenerContext {
            store: Arc::clone(&store),
            subscribers: Arc::clone(&subscribers),
            liveness: Arc::clone(&liveness),
        };
        let listener = Arc::new(GsiListener::new(config.host(), config.port(), ctx));
        let controller = Arc::new(ReconnectController::new(
            Arc::clone(&listener),
            Arc::clone(&liveness),
            config.backoff_policy(),
        ));

        Self {
            store,
            subscribers,
            liveness,
            listener,
            controller,
            monitor: tokio::sync::Mutex::new(None),
            check_interval: Duration::from_secs(config.check_interval_seconds()),
            silence_threshold: Duration::from_secs(config.silence_threshold_seconds()),
        }
    }

    /// Starts the listener and, on first start, the health monitor. Returns
    /// the bound port. Fails with [`GsiError::AlreadyRunning`] when called
    /// while running, with no side effects.
    pub async fn start(&self) -> Result<u16, GsiError> {
        let port = self.listener.start().await?;
        // fresh silence window for the new listener
        self.liveness.touch();

        let mut monitor = self.monitor.lock().await;
        if monitor.is_none() {
            let token = CancellationToken::new();
            let handle = tokio::spawn(monitor::run(
                self.check_interval,
                self.silence_threshold,
                Arc::clone(&self.liveness),
                Arc::clone(&self.controller),
                token.clone(),
            ));
            *monitor = Some(MonitorTask { token, handle });
        }
        Ok(port)
    }

    /// Stops the monitor and the listener. Idempotent.
    pub async fn stop(&self) {
        let task = {
            let mut monitor = self.monitor.lock().await;
            monitor.take()
        };
        if let Some(task) = task {
            task.token.cancel();
            if let Err(e) = task.handle.await {
                log::error!("health monitor task aborted: {}", e);
            }
        }
        self.listener.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.listener.is_running().await
    }

    /// The actually bound port of the most recent successful start.
    pub fn port(&self) -> u16 {
        self.listener.port()
    }

    /// A consistent copy of the current typed game state.
    pub fn snapshot(&self) -> Snapshot {
        self.store.read()
    }

    /// Clears the stored game state back to defaults.
    pub fn reset(&self) {
        self.store.reset();
    }

    /// Registers a callback invoked with the raw parsed document of every
    /// accepted update. The handle is always `> 0`.
    pub fn subscribe(&self, callback: SubscriberCallback) -> SubscriptionHandle {
        self.subscribers.register(callback)
    }

    /// Removes a subscription; returns whether it existed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.subscribers.unregister(handle)
    }

    /// Time since the listener last handled a request. Diagnostic.
    pub fn time_since_last_update(&self) -> Duration {
        self.liveness.idle_for()
    }
}
