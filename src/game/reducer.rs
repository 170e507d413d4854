//! The single authoritative state transition function. Every mutation
//! of a [`GameSession`] flows through [`reduce`] as a tagged [`Action`];
//! nothing else writes to the session.
//!
//! The reducer is total: any action applied to any state yields a valid
//! state, clamped where necessary. It performs no IO, no RNG, and no
//! scheduling; side effects live in the runtime and the sync engine and
//! only observe what the reducer produced.

use crate::game::migration::SaveDocument;
use crate::game::types::{
    ActiveEvent, BootStage, Enemy, GameMode, GameSession, Grave, LeaderboardEntry, LiveConfig,
    Player, SyncStatus,
};

/// Everything that can happen to a session.
///
/// Combat entry and exit are single atomic actions so no observer ever
/// sees combat mode without an enemy or an enemy outside combat.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetBootStage(BootStage),
    SetSyncStatus(SyncStatus),
    SetMode(GameMode),
    /// Apply a loaded (already migrated) save document.
    LoadSession(Box<SaveDocument>),
    SetPlayer(Box<Player>),
    /// Enter combat: installs the enemy and switches the mode together.
    StartCombat(Box<Enemy>),
    /// Replace the live enemy mid-combat. Ignored outside combat.
    UpdateEnemy(Box<Enemy>),
    /// Leave combat: clears the enemy, any scheduled enemy turn, and
    /// lands in `mode` in one transition.
    EndCombat { mode: GameMode },
    /// Present an event: installs it and switches the mode together.
    OpenEvent(Box<ActiveEvent>),
    /// Dismiss the event and land in `mode`.
    CloseEvent { mode: GameMode },
    SetGrave(Option<Grave>),
    AppendLog(String),
    SetLiveConfig(LiveConfig),
    SetLeaderboard(Vec<LeaderboardEntry>),
    SetQuickSlot { slot: usize, item_id: Option<String> },
    DismissOnboarding,
    /// Reserve the next enemy-turn token. The runtime reads the token
    /// back from `pending_turn` and schedules against it.
    BeginEnemyTurn,
    /// Retire a scheduled enemy turn. A stale token is a no-op, which
    /// is what drops continuations for fights that already ended.
    ClearPendingTurn { token: u64 },
    RecordRemoteStamp(i64),
    SetIdentity(String),
    /// Drop the first `count` archived history lines after the sync
    /// engine has written them. Not a gameplay mutation.
    DrainHistory { count: usize },
    /// Wipe progress back to a template character. Identity survives;
    /// meta-progression survival is the caller's job via the template.
    ResetSession(Box<Player>),
}

impl Action {
    /// Gameplay mutations are the only persistence trigger: the sync
    /// engine reacts to the `Syncing` status this sets.
    fn is_gameplay_mutation(&self) -> bool {
        matches!(
            self,
            Action::SetMode(_)
                | Action::SetPlayer(_)
                | Action::StartCombat(_)
                | Action::UpdateEnemy(_)
                | Action::EndCombat { .. }
                | Action::OpenEvent(_)
                | Action::CloseEvent { .. }
                | Action::SetGrave(_)
                | Action::SetQuickSlot { .. }
                | Action::DismissOnboarding
                | Action::ResetSession(_)
        )
    }
}

/// Apply one action. Consumes and returns the session.
pub fn reduce(mut session: GameSession, action: Action) -> GameSession {
    let dirty = action.is_gameplay_mutation();
    match action {
        Action::SetBootStage(stage) => {
            session.boot = stage;
        }
        Action::SetSyncStatus(status) => {
            session.sync = status;
        }
        Action::SetMode(mode) => {
            // Combat mode is only reachable through StartCombat.
            if mode != GameMode::Combat {
                session.mode = mode;
            }
        }
        Action::LoadSession(doc) => {
            apply_save(&mut session, *doc);
        }
        Action::SetPlayer(player) => {
            session.player = *player;
            session.player.clamp_resources();
        }
        Action::StartCombat(enemy) => {
            session.enemy = Some(*enemy);
            session.mode = GameMode::Combat;
        }
        Action::UpdateEnemy(enemy) => {
            if session.in_combat() {
                session.enemy = Some(*enemy);
            }
        }
        Action::EndCombat { mode } => {
            session.enemy = None;
            session.pending_turn = None;
            session.mode = if mode == GameMode::Combat {
                GameMode::Idle
            } else {
                mode
            };
        }
        Action::OpenEvent(event) => {
            session.event = Some(*event);
            session.mode = GameMode::Event;
        }
        Action::CloseEvent { mode } => {
            session.event = None;
            session.mode = if mode == GameMode::Combat {
                GameMode::Idle
            } else {
                mode
            };
        }
        Action::SetGrave(grave) => {
            session.grave = grave;
        }
        Action::AppendLog(line) => {
            session.push_log(line);
        }
        Action::SetLiveConfig(live) => {
            session.live = live;
        }
        Action::SetLeaderboard(entries) => {
            session.leaderboard = entries;
        }
        Action::SetQuickSlot { slot, item_id } => {
            if let Some(cell) = session.quick_slots.get_mut(slot) {
                *cell = item_id;
            }
        }
        Action::DismissOnboarding => {
            session.onboarding_dismissed = true;
        }
        Action::BeginEnemyTurn => {
            session.turn_counter += 1;
            session.pending_turn = Some(session.turn_counter);
        }
        Action::ClearPendingTurn { token } => {
            if session.pending_turn == Some(token) {
                session.pending_turn = None;
            }
        }
        Action::RecordRemoteStamp(stamp) => {
            session.last_remote_stamp = Some(stamp);
        }
        Action::SetIdentity(identity) => {
            session.identity = Some(identity);
        }
        Action::DrainHistory { count } => {
            let count = count.min(session.player.history.len());
            session.player.history.drain(..count);
        }
        Action::ResetSession(template) => {
            let identity = session.identity.take();
            let boot = session.boot;
            session = GameSession::fresh(*template);
            session.boot = boot;
            session.identity = identity;
        }
    }
    if dirty && session.boot == BootStage::Ready {
        session.sync = SyncStatus::Syncing;
    }
    session
}

/// Install a migrated save. Loading is not a gameplay mutation, so the
/// result is marked `Synced`, not `Syncing`.
fn apply_save(session: &mut GameSession, doc: SaveDocument) {
    session.player = doc.player;
    session.player.clamp_resources();
    session.enemy = doc.enemy;
    session.grave = doc.grave;
    session.event = doc.current_event;
    // Combat mode with no enemy cannot be resumed, and a save caught
    // mid-travel has already arrived. Both fall back to idle.
    session.mode = match doc.game_state {
        GameMode::Combat if session.enemy.is_none() => GameMode::Idle,
        GameMode::Moving => GameMode::Idle,
        mode => mode,
    };
    let mut slots = doc.quick_slots.into_iter();
    session.quick_slots = std::array::from_fn(|_| slots.next().flatten());
    session.onboarding_dismissed = doc.onboarding_dismissed;
    if doc.last_active > 0 {
        session.last_remote_stamp = Some(doc.last_active);
    }
    session.pending_turn = None;
    session.sync = SyncStatus::Synced;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::content::{template_player, ContentTables};
    use crate::game::types::LOG_CAPACITY;

    fn ready_session() -> GameSession {
        let content = ContentTables::standard();
        let mut session = GameSession::fresh(template_player(&content, "adventurer"));
        session.boot = BootStage::Ready;
        session.sync = SyncStatus::Synced;
        session
    }

    fn wolf() -> Enemy {
        Enemy {
            name: "Forest Wolf".into(),
            base_name: "forest wolf".into(),
            hp: 26,
            max_hp: 26,
            attack: 6,
            exp: 14,
            gold: 9,
            guard_chance: 0.0,
            heavy_chance: 0.2,
            weakness: None,
            resistance: None,
            boss: false,
            stunned_turns: 0,
            guarding: false,
            drop_multiplier: 1.0,
        }
    }

    #[test]
    fn gameplay_mutations_mark_syncing() {
        let session = ready_session();
        let next = reduce(session, Action::DismissOnboarding);
        assert_eq!(next.sync, SyncStatus::Syncing);

        let next = reduce(next, Action::AppendLog("hello".into()));
        // Log lines are ephemeral and never trigger a save.
        assert_eq!(next.sync, SyncStatus::Syncing, "status untouched");

        let mut synced = ready_session();
        synced.sync = SyncStatus::Synced;
        let next = reduce(synced, Action::AppendLog("hello".into()));
        assert_eq!(next.sync, SyncStatus::Synced);
    }

    #[test]
    fn mutations_before_ready_do_not_mark_syncing() {
        let mut session = ready_session();
        session.boot = BootStage::LoadingPlayer;
        session.sync = SyncStatus::Offline;
        let next = reduce(session, Action::DismissOnboarding);
        assert_eq!(next.sync, SyncStatus::Offline);
    }

    #[test]
    fn combat_entry_and_exit_are_atomic() {
        let session = ready_session();
        let next = reduce(session, Action::StartCombat(Box::new(wolf())));
        assert!(next.in_combat());
        assert!(next.enemy.is_some());

        let next = reduce(next, Action::BeginEnemyTurn);
        assert!(next.pending_turn.is_some());

        let next = reduce(next, Action::EndCombat { mode: GameMode::Idle });
        assert_eq!(next.mode, GameMode::Idle);
        assert!(next.enemy.is_none());
        assert!(next.pending_turn.is_none(), "scheduled turn retired");
    }

    #[test]
    fn combat_mode_unreachable_via_set_mode() {
        let session = ready_session();
        let next = reduce(session, Action::SetMode(GameMode::Combat));
        assert_eq!(next.mode, GameMode::Idle);
        assert!(next.enemy.is_none());
    }

    #[test]
    fn update_enemy_outside_combat_is_ignored() {
        let session = ready_session();
        let next = reduce(session, Action::UpdateEnemy(Box::new(wolf())));
        assert!(next.enemy.is_none());
    }

    #[test]
    fn stale_turn_token_is_dropped() {
        let session = ready_session();
        let s = reduce(session, Action::StartCombat(Box::new(wolf())));
        let s = reduce(s, Action::BeginEnemyTurn);
        let stale = s.pending_turn.unwrap();

        // The fight ends and a new one begins before the old
        // continuation fires.
        let s = reduce(s, Action::EndCombat { mode: GameMode::Idle });
        let s = reduce(s, Action::StartCombat(Box::new(wolf())));
        let s = reduce(s, Action::BeginEnemyTurn);
        let fresh = s.pending_turn.unwrap();
        assert_ne!(stale, fresh);

        let s = reduce(s, Action::ClearPendingTurn { token: stale });
        assert_eq!(s.pending_turn, Some(fresh), "stale clear is a no-op");
        let s = reduce(s, Action::ClearPendingTurn { token: fresh });
        assert!(s.pending_turn.is_none());
    }

    #[test]
    fn load_session_marks_synced_and_repairs_mode() {
        let content = ContentTables::standard();
        let session = ready_session();
        let doc = SaveDocument {
            player: template_player(&content, "mage"),
            game_state: GameMode::Combat,
            enemy: None,
            grave: None,
            current_event: None,
            quick_slots: vec![Some("healing_draught".into())],
            onboarding_dismissed: true,
            version: 3,
            last_active: 1_700_000_000_000,
        };
        let next = reduce(session, Action::LoadSession(Box::new(doc)));
        assert_eq!(next.sync, SyncStatus::Synced);
        assert_eq!(next.mode, GameMode::Idle, "combat without enemy repaired");
        assert_eq!(next.player.class_id, "mage");
        assert_eq!(next.last_remote_stamp, Some(1_700_000_000_000));
        assert_eq!(next.quick_slots[0].as_deref(), Some("healing_draught"));
        assert!(next.quick_slots[1].is_none());
    }

    #[test]
    fn load_session_lands_travel_in_progress() {
        let content = ContentTables::standard();
        let session = ready_session();
        let doc = SaveDocument {
            player: template_player(&content, "adventurer"),
            game_state: GameMode::Moving,
            enemy: None,
            grave: None,
            current_event: None,
            quick_slots: Vec::new(),
            onboarding_dismissed: false,
            version: 3,
            last_active: 0,
        };
        let next = reduce(session, Action::LoadSession(Box::new(doc)));
        assert_eq!(next.mode, GameMode::Idle, "travel does not survive a reload");
    }

    #[test]
    fn reset_preserves_identity_only() {
        let content = ContentTables::standard();
        let mut session = ready_session();
        session.identity = Some("uid-123".into());
        session.player.gold = 999;
        session.grave = Some(Grave {
            location: "whisper_woods".into(),
            gold: 10,
            item: None,
            created_at: chrono::Utc::now(),
        });
        let template = template_player(&content, "adventurer");
        let next = reduce(session, Action::ResetSession(Box::new(template)));
        assert_eq!(next.identity.as_deref(), Some("uid-123"));
        assert_eq!(next.player.gold, 30);
        assert!(next.grave.is_none());
        assert_eq!(next.sync, SyncStatus::Syncing, "reset persists");
    }

    #[test]
    fn log_ring_is_bounded() {
        let mut session = ready_session();
        for i in 0..(LOG_CAPACITY + 10) {
            session = reduce(session, Action::AppendLog(format!("line {i}")));
        }
        assert_eq!(session.log.len(), LOG_CAPACITY);
        assert_eq!(session.log.front().unwrap(), "line 10");
    }

    #[test]
    fn quick_slot_out_of_range_is_ignored() {
        let session = ready_session();
        let next = reduce(
            session,
            Action::SetQuickSlot {
                slot: 7,
                item_id: Some("healing_draught".into()),
            },
        );
        assert!(next.quick_slots.iter().all(Option::is_none));
    }

    #[test]
    fn set_player_clamps_resources() {
        let session = ready_session();
        let mut player = session.player.clone();
        player.hp = player.max_hp + 500;
        player.mp = -3;
        let next = reduce(session, Action::SetPlayer(Box::new(player)));
        assert_eq!(next.player.hp, next.player.max_hp);
        assert_eq!(next.player.mp, 0);
    }
}
