//! The synchronization engine: walks the boot lifecycle against the
//! remote store with bounded timeouts, subscribes to remote changes,
//! filters out echoes of its own writes, and persists dirty state on a
//! restartable debounce timer. Any network failure degrades to a fully
//! playable offline session.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

use crate::config::SyncConfig;
use crate::game::migration::{migrate_save, SaveDocument};
use crate::game::reducer::Action;
use crate::game::runtime::Runtime;
use crate::game::types::{BootStage, LeaderboardEntry, LiveConfig, SyncStatus};
use crate::sync::store::{DocChange, RemoteStore};

const SAVES: &str = "saves";
const HISTORY: &str = "history";
const LEADERBOARD: &str = "leaderboard";
const CONFIG: &str = "config";
const LIVE_DOC: &str = "live";

pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    runtime: Runtime,
    config: SyncConfig,
    identity: Option<String>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RemoteStore>, runtime: Runtime, config: SyncConfig) -> Self {
        Self {
            store,
            runtime,
            config,
            identity: None,
        }
    }

    /// Run the engine until the runtime goes away. Boot phases first,
    /// then the reconcile loop.
    pub async fn run(mut self, mut dirty_rx: mpsc::UnboundedReceiver<()>) {
        let (mut player_rx, mut live_rx) = self.bootstrap().await;

        let debounce = Duration::from_millis(self.config.debounce_ms);
        let save_timer = sleep(Duration::from_secs(86_400));
        tokio::pin!(save_timer);
        let mut save_armed = false;

        loop {
            tokio::select! {
                signal = dirty_rx.recv() => {
                    if signal.is_none() {
                        // Runtime dropped; flush anything outstanding.
                        if save_armed {
                            self.persist().await;
                        }
                        return;
                    }
                    save_timer.as_mut().reset(Instant::now() + debounce);
                    save_armed = true;
                }
                _ = &mut save_timer, if save_armed => {
                    save_armed = false;
                    self.persist().await;
                }
                Some(change) = recv_opt(&mut player_rx) => {
                    self.handle_player_change(change);
                }
                Some(change) = recv_opt(&mut live_rx) => {
                    self.handle_live_change(change);
                }
            }
        }
    }

    /// Boot lifecycle. Every phase is bounded; any failure lands the
    /// session in a fully playable offline state.
    async fn bootstrap(
        &mut self,
    ) -> (
        Option<mpsc::UnboundedReceiver<DocChange>>,
        Option<mpsc::UnboundedReceiver<DocChange>>,
    ) {
        // Phase 1: identity.
        self.runtime
            .dispatch(Action::SetBootStage(BootStage::Authenticating));
        let auth = timeout(
            Duration::from_millis(self.config.auth_timeout_ms),
            self.store.authenticate(),
        )
        .await;
        let uid = match auth {
            Ok(Ok(uid)) => uid,
            Ok(Err(err)) => {
                warn!("Authentication failed, going offline: {}", err);
                self.offline_ready();
                return (None, None);
            }
            Err(_) => {
                warn!("Authentication timed out, going offline");
                self.offline_ready();
                return (None, None);
            }
        };
        info!("Authenticated as {}", uid);
        self.runtime.dispatch(Action::SetIdentity(uid.clone()));
        self.identity = Some(uid.clone());

        // Phase 2: shared config and leaderboard. Neither is fatal.
        self.runtime
            .dispatch(Action::SetBootStage(BootStage::LoadingConfig));
        let live_rx = match self.store.subscribe(CONFIG, LIVE_DOC).await {
            Ok(rx) => Some(rx),
            Err(err) => {
                warn!("Live config unavailable: {}", err);
                None
            }
        };
        match self
            .store
            .fetch_top(LEADERBOARD, "level", self.config.leaderboard_size)
            .await
        {
            Ok(rows) => {
                let entries: Vec<LeaderboardEntry> = rows
                    .into_iter()
                    .filter_map(|row| serde_json::from_value(row).ok())
                    .collect();
                self.runtime.dispatch(Action::SetLeaderboard(entries));
            }
            Err(err) => warn!("Leaderboard fetch failed: {}", err),
        }

        // Phase 3: player data.
        self.runtime
            .dispatch(Action::SetBootStage(BootStage::LoadingPlayer));
        let mut player_rx = match self.store.subscribe(SAVES, &uid).await {
            Ok(rx) => rx,
            Err(err) => {
                warn!("Player subscription failed, going offline: {}", err);
                self.offline_ready();
                return (None, live_rx);
            }
        };
        match timeout(
            Duration::from_millis(self.config.load_timeout_ms),
            player_rx.recv(),
        )
        .await
        {
            Ok(Some(initial)) => {
                let existed = initial.data.is_some();
                self.handle_player_change(initial);
                self.runtime.dispatch(Action::SetBootStage(BootStage::Ready));
                if existed {
                    self.runtime
                        .dispatch(Action::SetSyncStatus(SyncStatus::Synced));
                } else {
                    // First-time player: persist the template right away.
                    info!("No remote save found, creating a fresh one");
                    self.persist().await;
                }
            }
            _ => {
                warn!("Player load timed out, going offline");
                self.offline_ready();
                return (None, live_rx);
            }
        }
        (Some(player_rx), live_rx)
    }

    /// Degrade to an offline-but-ready session. Whatever the network
    /// does afterwards, this session stays on local state.
    fn offline_ready(&self) {
        self.runtime.dispatch_all(vec![
            Action::SetSyncStatus(SyncStatus::Offline),
            Action::SetBootStage(BootStage::Ready),
            Action::AppendLog("Playing offline. Progress stays on this device.".into()),
        ]);
    }

    /// Apply one remote notification for the player document, guarded
    /// twice: pending local writes are echoes of our own save, and a
    /// repeated `lastActive` stamp is a duplicate notification. Both
    /// must be ignored or a save would reload itself in a loop.
    fn handle_player_change(&self, change: DocChange) {
        if change.pending_local_write {
            debug!("Ignoring echo of local write");
            return;
        }
        let Some(data) = change.data else {
            return;
        };
        let stamp = data.get("lastActive").and_then(Value::as_i64);
        if stamp.is_some() && stamp == self.runtime.snapshot().last_remote_stamp {
            debug!("Ignoring duplicate notification at stamp {:?}", stamp);
            return;
        }
        match migrate_save(data) {
            Some(doc) => {
                info!("Applying remote save (stamp {:?})", stamp);
                self.runtime.dispatch(Action::LoadSession(Box::new(doc)));
            }
            None => {
                warn!("Remote save unusable, keeping local state");
            }
        }
    }

    fn handle_live_change(&self, change: DocChange) {
        if change.pending_local_write {
            return;
        }
        let Some(data) = change.data else {
            return;
        };
        match serde_json::from_value::<LiveConfig>(data) {
            Ok(live) => {
                let mut actions = vec![Action::SetLiveConfig(live.clone())];
                if let Some(announcement) = live.announcement {
                    actions.push(Action::AppendLog(crate::logutil::escape_log(&announcement)));
                }
                self.runtime.dispatch_all(actions);
            }
            Err(err) => warn!("Malformed live config ignored: {}", err),
        }
    }

    /// Write the accumulated session to the store. Called only from the
    /// debounce timer (and once at first boot), so rapid successive
    /// mutations coalesce into one write.
    async fn persist(&mut self) {
        if self.identity.is_none() {
            // Offline since boot; a later triggering change retries
            // authentication so persistence can resume.
            match self.store.authenticate().await {
                Ok(uid) => {
                    info!("Reconnected as {}", uid);
                    self.runtime.dispatch(Action::SetIdentity(uid.clone()));
                    self.identity = Some(uid);
                }
                Err(err) => {
                    debug!("Still offline: {}", err);
                    self.runtime
                        .dispatch(Action::SetSyncStatus(SyncStatus::Offline));
                    return;
                }
            }
        }
        let uid = self.identity.clone().expect("identity set above");

        let session = self.runtime.snapshot();
        let archived: Vec<Value> = session
            .player
            .history
            .iter()
            .map(|line| serde_json::json!({ "line": line }))
            .collect();
        let mut player = session.player.clone();
        player.history.clear();
        let doc = SaveDocument {
            player,
            game_state: session.mode,
            enemy: session.enemy.clone(),
            grave: session.grave.clone(),
            current_event: session.event.clone(),
            quick_slots: session.quick_slots.to_vec(),
            onboarding_dismissed: session.onboarding_dismissed,
            version: crate::game::types::SAVE_SCHEMA_VERSION,
            last_active: 0, // stamped by the store
        };
        let patch = match serde_json::to_value(&doc) {
            Ok(patch) => patch,
            Err(err) => {
                warn!("Save serialization failed: {}", err);
                return;
            }
        };

        match self.store.write_merge(SAVES, &uid, patch).await {
            Ok(stamp) => {
                debug!("Saved at stamp {}", stamp);
                let mut actions = vec![
                    Action::RecordRemoteStamp(stamp),
                    Action::SetSyncStatus(SyncStatus::Synced),
                ];
                // History lines drain only once the archive write has
                // landed; on failure they stay in the session and ride
                // along with the next save.
                if !archived.is_empty() {
                    match self.store.append_history(HISTORY, &uid, &archived).await {
                        Ok(()) => actions.push(Action::DrainHistory {
                            count: archived.len(),
                        }),
                        Err(err) => warn!("History archive failed, retrying next save: {}", err),
                    }
                }
                self.runtime.dispatch_all(actions);
                let entry = serde_json::json!({
                    "name": session.player.name,
                    "level": session.player.level,
                    "kills": session.player.stats.kills,
                });
                if let Err(err) = self.store.write_merge(LEADERBOARD, &uid, entry).await {
                    debug!("Leaderboard update failed: {}", err);
                }
            }
            Err(err) => {
                warn!("Save failed, going offline: {}", err);
                self.runtime
                    .dispatch(Action::SetSyncStatus(SyncStatus::Offline));
            }
        }
    }
}

/// Await the next change on an optional subscription. A closed channel
/// disables itself so the select loop never spins on it.
async fn recv_opt(rx: &mut Option<mpsc::UnboundedReceiver<DocChange>>) -> Option<DocChange> {
    match rx {
        Some(inner) => match inner.recv().await {
            Some(change) => Some(change),
            None => {
                *rx = None;
                std::future::pending().await
            }
        },
        None => std::future::pending().await,
    }
}
