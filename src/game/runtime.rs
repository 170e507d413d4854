//! The composition root around the reducer: owns the one root session
//! value, funnels every mutation through [`reduce`], signals the sync
//! engine when gameplay state becomes dirty, and schedules the paced
//! enemy counter-turn.
//!
//! Each entry point mirrors one UI-facing command. Rejections surface
//! as a single log line and change nothing else.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

use crate::config::{GameConfig, NarrativeConfig};
use crate::game::actions::{battle, explore, inventory, Followup, Outcome};
use crate::game::combat::TurnRejection;
use crate::game::content::ContentTables;
use crate::game::reducer::{reduce, Action};
use crate::game::types::{GameMode, GameSession, SyncStatus};
use crate::narrative::NarrativeClient;

struct Inner {
    session: Mutex<GameSession>,
    content: ContentTables,
    game_cfg: GameConfig,
    narrative: NarrativeClient,
    rng: Mutex<StdRng>,
    dirty_tx: mpsc::UnboundedSender<()>,
}

/// Fold a batch through the reducer against a locked session. Returns
/// whether the result is dirty. Callers hold the lock across whatever
/// read produced the actions, so nothing can change state in between.
fn fold(guard: &mut GameSession, actions: Vec<Action>) -> bool {
    let mut session = guard.clone();
    for action in actions {
        session = reduce(session, action);
    }
    let dirty = session.sync == SyncStatus::Syncing;
    *guard = session;
    dirty
}

/// Cheaply cloneable handle to the running game.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

impl Runtime {
    /// Build the runtime. The returned receiver fires once per dispatch
    /// that left the session in `Syncing`; the sync engine debounces it.
    pub fn new(
        content: ContentTables,
        game_cfg: GameConfig,
        narrative_cfg: NarrativeConfig,
        session: GameSession,
    ) -> (Self, mpsc::UnboundedReceiver<()>) {
        Self::with_rng(content, game_cfg, narrative_cfg, session, StdRng::from_entropy())
    }

    pub fn with_rng(
        content: ContentTables,
        game_cfg: GameConfig,
        narrative_cfg: NarrativeConfig,
        session: GameSession,
        rng: StdRng,
    ) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (dirty_tx, dirty_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            inner: Arc::new(Inner {
                session: Mutex::new(session),
                content,
                game_cfg,
                narrative: NarrativeClient::new(narrative_cfg),
                rng: Mutex::new(rng),
                dirty_tx,
            }),
        };
        (runtime, dirty_rx)
    }

    pub fn content(&self) -> &ContentTables {
        &self.inner.content
    }

    pub fn snapshot(&self) -> GameSession {
        self.inner.session.lock().expect("session lock").clone()
    }

    /// Apply one action through the reducer.
    pub fn dispatch(&self, action: Action) {
        self.dispatch_all(vec![action]);
    }

    /// Apply a batch atomically with respect to other dispatchers, then
    /// signal the sync engine if gameplay state is now dirty.
    pub fn dispatch_all(&self, actions: Vec<Action>) {
        let dirty = {
            let mut guard = self.inner.session.lock().expect("session lock");
            fold(&mut guard, actions)
        };
        if dirty {
            let _ = self.inner.dirty_tx.send(());
        }
    }

    /// Run one entry point and apply its outcome under a single hold of
    /// the session lock, so the state an entry read is still the state
    /// its actions land on.
    fn run<F>(&self, entry: F) -> Result<(), TurnRejection>
    where
        F: FnOnce(
            &GameSession,
            &ContentTables,
            &GameConfig,
            &mut StdRng,
        ) -> Result<Outcome, TurnRejection>,
    {
        let applied = {
            let mut session = self.inner.session.lock().expect("session lock");
            let mut rng = self.inner.rng.lock().expect("rng lock");
            match entry(&session, &self.inner.content, &self.inner.game_cfg, &mut rng) {
                Ok(outcome) => {
                    let followup = outcome.followup;
                    let dirty = fold(&mut session, outcome.actions);
                    Ok((dirty, followup))
                }
                Err(rejection) => {
                    fold(&mut session, vec![Action::AppendLog(rejection.to_string())]);
                    Err(rejection)
                }
            }
        };
        let (dirty, followup) = applied?;
        if dirty {
            let _ = self.inner.dirty_tx.send(());
        }
        if followup == Some(Followup::EnemyTurn) {
            self.schedule_enemy_turn();
        }
        Ok(())
    }

    /// Schedule the enemy counter-turn after the pacing delay. The
    /// continuation re-checks its token at fire time, so anything that
    /// ended the fight in between turns it into a no-op.
    fn schedule_enemy_turn(&self) {
        let Some(token) = self.snapshot().pending_turn else {
            return;
        };
        let runtime = self.clone();
        let delay = Duration::from_millis(runtime.inner.game_cfg.enemy_turn_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            runtime.run_enemy_turn(token);
        });
    }

    /// Resolve a scheduled enemy turn immediately. Public so tests and
    /// non-async front ends can drive pacing themselves.
    pub fn run_enemy_turn(&self, token: u64) {
        let dirty = {
            let mut session = self.inner.session.lock().expect("session lock");
            let mut rng = self.inner.rng.lock().expect("rng lock");
            // Token check and application happen under the same lock
            // hold; a fight that ended in between stays ended.
            let outcome = battle::enemy_turn(&session, &self.inner.content, &mut *rng, token);
            fold(&mut session, outcome.actions)
        };
        if dirty {
            let _ = self.inner.dirty_tx.send(());
        }
    }

    // ------------------------------------------------------------------
    // UI-facing entry points
    // ------------------------------------------------------------------

    pub fn move_to(&self, target: &str) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| explore::move_to(s, c, target))
    }

    /// Search the current area. Remote narrative content is fetched up
    /// front (a no-op unless the service is configured); the entry point
    /// itself falls back to canned content when none arrived.
    pub async fn explore(&self) -> Result<(), TurnRejection> {
        let context = {
            let s = self.snapshot();
            format!("{}, level {}", s.player.location, s.player.level)
        };
        let remote_event = self.inner.narrative.remote_event(&context).await;
        let flavor_line = self.inner.narrative.remote_line(&context).await;
        self.run(move |s, c, g, r| explore::explore(s, c, g, r, remote_event, flavor_line))
    }

    pub fn rest(&self) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| explore::rest(s, c))
    }

    pub fn collect_grave(&self) -> Result<(), TurnRejection> {
        self.run(|s, _, _, _| explore::collect_grave(s))
    }

    pub fn choose_event(&self, choice: usize) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| explore::choose_event(s, c, choice))
    }

    pub fn attack(&self) -> Result<(), TurnRejection> {
        self.run(|s, c, g, r| battle::attack(s, c, g, r))
    }

    pub fn use_skill(&self) -> Result<(), TurnRejection> {
        self.run(|s, c, g, r| battle::use_skill(s, c, g, r))
    }

    pub fn cycle_skill(&self) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| battle::cycle_skill(s, c))
    }

    pub fn escape(&self) -> Result<(), TurnRejection> {
        self.run(|s, c, g, r| battle::escape(s, c, g, r))
    }

    pub fn open_facility(&self, mode: GameMode) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| inventory::open_facility(s, c, mode))
    }

    pub fn leave_facility(&self) -> Result<(), TurnRejection> {
        self.run(|s, _, _, _| inventory::leave_facility(s))
    }

    pub fn use_item(&self, instance_id: uuid::Uuid) -> Result<(), TurnRejection> {
        self.run(|s, _, _, _| inventory::use_item(s, instance_id))
    }

    pub fn use_quick_slot(&self, slot: usize) -> Result<(), TurnRejection> {
        self.run(|s, _, _, _| inventory::use_quick_slot(s, slot))
    }

    pub fn assign_quick_slot(
        &self,
        slot: usize,
        item_id: Option<String>,
    ) -> Result<(), TurnRejection> {
        self.run(|s, _, _, _| inventory::assign_quick_slot(s, slot, item_id))
    }

    pub fn equip(&self, instance_id: uuid::Uuid) -> Result<(), TurnRejection> {
        self.run(|s, _, _, _| inventory::equip(s, instance_id))
    }

    pub fn unequip_offhand(&self) -> Result<(), TurnRejection> {
        self.run(|s, _, _, _| inventory::unequip_offhand(s))
    }

    pub fn buy(&self, item_id: &str) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| inventory::buy(s, c, item_id))
    }

    pub fn sell(&self, instance_id: uuid::Uuid) -> Result<(), TurnRejection> {
        self.run(|s, _, _, _| inventory::sell(s, instance_id))
    }

    pub fn craft(&self, recipe_id: &str) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| inventory::craft(s, c, recipe_id))
    }

    pub fn accept_quest(&self, quest_id: &str) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| inventory::accept_quest(s, c, quest_id))
    }

    pub fn claim_quest(&self, quest_id: &str) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| inventory::claim_quest(s, c, quest_id))
    }

    pub fn change_class(&self, class_id: &str) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| inventory::change_class(s, c, class_id))
    }

    pub fn reset_session(&self) -> Result<(), TurnRejection> {
        self.run(|s, c, _, _| inventory::reset_session(s, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::content::template_player;
    use crate::game::types::{BootStage, Enemy};

    fn runtime() -> (Runtime, mpsc::UnboundedReceiver<()>) {
        runtime_with(GameConfig::default())
    }

    fn runtime_with(game_cfg: GameConfig) -> (Runtime, mpsc::UnboundedReceiver<()>) {
        let content = ContentTables::standard();
        let mut session = GameSession::fresh(template_player(&content, "adventurer"));
        session.boot = BootStage::Ready;
        session.sync = SyncStatus::Synced;
        Runtime::with_rng(
            content,
            game_cfg,
            NarrativeConfig::default(),
            session,
            StdRng::seed_from_u64(99),
        )
    }

    #[tokio::test]
    async fn gameplay_dispatch_signals_dirty() {
        let (rt, mut dirty_rx) = runtime();
        rt.move_to("whisper_woods").unwrap();
        assert!(dirty_rx.try_recv().is_ok());
        assert_eq!(rt.snapshot().player.location, "whisper_woods");
    }

    #[tokio::test]
    async fn rejection_logs_once_and_changes_nothing() {
        let (rt, mut dirty_rx) = runtime();
        let before = rt.snapshot();
        assert!(rt.attack().is_err());
        let after = rt.snapshot();
        assert!(dirty_rx.try_recv().is_err(), "no dirty signal");
        assert_eq!(after.player, before.player);
        assert_eq!(after.log.len(), before.log.len() + 1);
    }

    #[tokio::test]
    async fn full_fight_via_entry_points() {
        let (rt, _dirty_rx) = runtime();
        rt.move_to("whisper_woods").unwrap();
        // Explore until a fight starts (events are possible too).
        for _ in 0..50 {
            if rt.snapshot().in_combat() {
                break;
            }
            match rt.snapshot().mode {
                GameMode::Event => rt.choose_event(0).unwrap(),
                GameMode::Idle => {
                    let _ = rt.explore().await;
                }
                _ => {}
            }
        }
        let session = rt.snapshot();
        assert!(session.in_combat(), "expected an encounter to start");

        // Drive the fight to a terminal state, resolving each pending
        // enemy turn synchronously.
        for _ in 0..200 {
            let s = rt.snapshot();
            if !s.in_combat() {
                break;
            }
            if let Some(token) = s.pending_turn {
                rt.run_enemy_turn(token);
            } else {
                let _ = rt.attack();
            }
        }
        let done = rt.snapshot();
        assert!(!done.in_combat(), "fight reached a terminal outcome");
        assert!(done.enemy.is_none());
    }

    #[tokio::test]
    async fn enemy_turn_with_stale_token_changes_nothing() {
        let (rt, _dirty_rx) = runtime_with(GameConfig {
            escape_chance: 1.0,
            enemy_turn_delay_ms: 60_000,
            ..GameConfig::default()
        });
        rt.dispatch(Action::StartCombat(Box::new(Enemy {
            name: "Forest Wolf".into(),
            base_name: "forest wolf".into(),
            hp: 1_000,
            max_hp: 1_000,
            attack: 50,
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
        })));
        rt.attack().unwrap();
        let token = rt.snapshot().pending_turn.expect("counter-turn reserved");

        // Flee before the counter-turn fires; the reserved token is
        // retired along with the fight.
        rt.escape().unwrap();
        let fled = rt.snapshot();
        assert!(!fled.in_combat());
        assert!(fled.pending_turn.is_none());

        rt.run_enemy_turn(token);
        let after = rt.snapshot();
        assert_eq!(after.player.hp, fled.player.hp, "stale hit never lands");
        assert_eq!(after.mode, GameMode::Idle);
        assert!(after.enemy.is_none());
    }
}
