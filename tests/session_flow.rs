//! Whole-session flows over the runtime entry points: town services,
//! quests, defeat recovery, and events, with enemy turns driven
//! synchronously through their tokens.

use rand::rngs::StdRng;
use rand::SeedableRng;

use tinyquest::config::{GameConfig, NarrativeConfig};
use tinyquest::game::content::{template_player, ContentTables};
use tinyquest::game::reducer::Action;
use tinyquest::game::runtime::Runtime;
use tinyquest::game::types::{
    ActiveEvent, BootStage, Enemy, EventOutcome, GameMode, GameSession, SyncStatus,
};

fn ready_runtime(seed: u64) -> Runtime {
    let content = ContentTables::standard();
    let mut session = GameSession::fresh(template_player(&content, "adventurer"));
    session.boot = BootStage::Ready;
    session.sync = SyncStatus::Synced;
    let (runtime, _dirty_rx) = Runtime::with_rng(
        content,
        GameConfig::default(),
        NarrativeConfig::default(),
        session,
        StdRng::seed_from_u64(seed),
    );
    runtime
}

fn wolf(hp: i64, attack: i64) -> Enemy {
    Enemy {
        name: "Forest Wolf".into(),
        base_name: "forest wolf".into(),
        hp,
        max_hp: hp,
        attack,
        exp: 14,
        gold: 9,
        guard_chance: 0.0,
        heavy_chance: 0.0,
        weakness: None,
        resistance: None,
        boss: false,
        stunned_turns: 0,
        guarding: false,
        drop_multiplier: 1.0,
    }
}

/// Drive the current fight to its end, resolving every scheduled enemy
/// turn immediately.
fn finish_fight(runtime: &Runtime) {
    for _ in 0..300 {
        let session = runtime.snapshot();
        if !session.in_combat() {
            return;
        }
        if let Some(token) = session.pending_turn {
            runtime.run_enemy_turn(token);
        } else {
            let _ = runtime.attack();
        }
    }
    panic!("fight did not terminate");
}

#[tokio::test]
async fn rest_restores_and_costs_gold() {
    let runtime = ready_runtime(1);
    let mut hurt = runtime.snapshot().player;
    hurt.hp = 1;
    hurt.mp = 0;
    runtime.dispatch(Action::SetPlayer(Box::new(hurt)));

    runtime.rest().unwrap();
    let player = runtime.snapshot().player;
    assert_eq!(player.hp, player.max_hp);
    assert_eq!(player.mp, player.max_mp);
    assert_eq!(player.gold, 20);
    assert_eq!(player.stats.rests, 1);
}

#[tokio::test]
async fn rest_without_gold_is_rejected() {
    let runtime = ready_runtime(2);
    let mut broke = runtime.snapshot().player;
    broke.gold = 5;
    broke.hp = 1;
    runtime.dispatch(Action::SetPlayer(Box::new(broke)));

    assert!(runtime.rest().is_err());
    let player = runtime.snapshot().player;
    assert_eq!(player.hp, 1, "nothing restored");
    assert_eq!(player.gold, 5, "nothing charged");
}

#[tokio::test]
async fn quest_accepted_progressed_and_claimed() {
    let runtime = ready_runtime(3);
    runtime.open_facility(GameMode::QuestBoard).unwrap();
    runtime.accept_quest("wolf_cull").unwrap();
    runtime.leave_facility().unwrap();
    assert_eq!(runtime.snapshot().player.quests.len(), 1);

    for kill in 1..=3u32 {
        runtime.dispatch(Action::StartCombat(Box::new(wolf(1, 6))));
        finish_fight(&runtime);
        let player = runtime.snapshot().player;
        assert_eq!(player.quests[0].progress, kill);
    }
    let before = runtime.snapshot().player;
    assert!(before.quests[0].is_ready());

    runtime.open_facility(GameMode::QuestBoard).unwrap();
    runtime.claim_quest("wolf_cull").unwrap();
    let player = runtime.snapshot().player;
    assert!(player.quests.is_empty());
    assert_eq!(player.gold, before.gold + 60);
    assert_eq!(player.exp, before.exp + 40);
}

#[tokio::test]
async fn victory_grants_exp_gold_and_essence() {
    let runtime = ready_runtime(4);
    let before = runtime.snapshot().player;
    runtime.dispatch(Action::StartCombat(Box::new(wolf(1, 6))));
    finish_fight(&runtime);
    let player = runtime.snapshot().player;
    assert_eq!(player.stats.kills, before.stats.kills + 1);
    assert_eq!(player.gold, before.gold + 9);
    assert_eq!(player.exp, before.exp + 14);
    assert_eq!(player.meta.essence, before.meta.essence + 1);
}

#[tokio::test]
async fn defeat_leaves_grave_and_recovery_restores_gold() {
    let runtime = ready_runtime(5);
    runtime.move_to("whisper_woods").unwrap();
    let mut rich = runtime.snapshot().player;
    rich.gold = 100;
    runtime.dispatch(Action::SetPlayer(Box::new(rich)));

    runtime.dispatch(Action::StartCombat(Box::new(wolf(100_000, 500))));
    let _ = runtime.attack();
    let token = runtime
        .snapshot()
        .pending_turn
        .expect("counter-turn scheduled");
    runtime.run_enemy_turn(token);

    let session = runtime.snapshot();
    assert_eq!(session.mode, GameMode::Idle);
    assert_eq!(session.player.stats.deaths, 1);
    assert_eq!(session.player.location, "emberfall", "reborn in town");
    let grave = session.grave.as_ref().expect("grave left behind");
    assert_eq!(grave.location, "whisper_woods");
    assert_eq!(grave.gold, 50);

    // Too far away: the grave must be collected where it was left.
    assert!(runtime.collect_grave().is_err());

    runtime.move_to("whisper_woods").unwrap();
    let gold_before = runtime.snapshot().player.gold;
    runtime.collect_grave().unwrap();
    let session = runtime.snapshot();
    assert_eq!(session.player.gold, gold_before + 50);
    assert!(session.grave.is_none());
}

#[tokio::test]
async fn event_choice_applies_its_outcome() {
    let runtime = ready_runtime(6);
    let gold_before = runtime.snapshot().player.gold;
    runtime.dispatch(Action::OpenEvent(Box::new(ActiveEvent {
        description: "A battered strongbox sits half-buried by the path.".into(),
        choices: vec!["Pry it open".into(), "Leave it be".into()],
        outcomes: vec![EventOutcome::Gold(25), EventOutcome::Nothing],
    })));
    assert_eq!(runtime.snapshot().mode, GameMode::Event);

    runtime.choose_event(0).unwrap();
    let session = runtime.snapshot();
    assert_eq!(session.mode, GameMode::Idle);
    assert!(session.event.is_none());
    assert_eq!(session.player.gold, gold_before + 25);
}

#[tokio::test]
async fn consumable_in_combat_heals_and_yields_the_turn() {
    let runtime = ready_runtime(7);
    let content = ContentTables::standard();
    let draught = content.item("healing_draught").unwrap().instantiate();
    let heal = draught.heal;
    let mut player = runtime.snapshot().player;
    player.hp = 1;
    player.inventory.push(draught.clone());
    runtime.dispatch(Action::SetPlayer(Box::new(player)));
    runtime.dispatch(Action::StartCombat(Box::new(wolf(100, 6))));

    runtime.use_item(draught.instance_id).unwrap();
    let session = runtime.snapshot();
    assert_eq!(session.player.hp, (1 + heal).min(session.player.max_hp));
    assert!(session.player.inventory.is_empty(), "consumable spent");
    assert!(session.pending_turn.is_some(), "enemy turn scheduled");
}

#[tokio::test]
async fn shop_purchase_and_resale() {
    let runtime = ready_runtime(8);
    let content = ContentTables::standard();
    let price = content.item("healing_draught").unwrap().price;
    let gold_before = runtime.snapshot().player.gold;
    assert!(gold_before >= price, "starter gold covers a draught");

    runtime.open_facility(GameMode::Shop).unwrap();
    runtime.buy("healing_draught").unwrap();
    let player = runtime.snapshot().player;
    assert_eq!(player.gold, gold_before - price);
    assert_eq!(player.inventory.len(), 1);

    let instance_id = player.inventory[0].instance_id;
    runtime.sell(instance_id).unwrap();
    let player = runtime.snapshot().player;
    assert!(player.inventory.is_empty());
    assert_eq!(player.gold, gold_before - price + price / 2);
}

#[tokio::test]
async fn facilities_require_being_in_town() {
    let runtime = ready_runtime(9);
    runtime.move_to("whisper_woods").unwrap();
    assert!(runtime.open_facility(GameMode::Shop).is_err());
    assert!(runtime.rest().is_err());

    runtime.move_to("emberfall").unwrap();
    runtime.open_facility(GameMode::Shop).unwrap();
    assert_eq!(runtime.snapshot().mode, GameMode::Shop);
    runtime.leave_facility().unwrap();
    assert_eq!(runtime.snapshot().mode, GameMode::Idle);
}

#[tokio::test]
async fn class_change_rebuilds_the_loadout() {
    let runtime = ready_runtime(10);
    runtime.open_facility(GameMode::JobChange).unwrap();
    runtime.change_class("mage").unwrap();
    let player = runtime.snapshot().player;
    assert_eq!(player.class_id, "mage");
    assert_eq!(player.skills.selected, Some(0));
    assert!(player.buff.is_none());
}

#[tokio::test]
async fn session_reset_keeps_meta_progression() {
    let runtime = ready_runtime(11);
    let mut veteran = runtime.snapshot().player;
    veteran.level = 9;
    veteran.gold = 500;
    veteran.meta.essence = 320;
    veteran.meta.rank = 2;
    veteran.meta.bonus_attack = 4;
    veteran.meta.bonus_hp = 20;
    veteran.meta.bonus_mp = 10;
    runtime.dispatch(Action::SetPlayer(Box::new(veteran)));

    runtime.reset_session().unwrap();
    let player = runtime.snapshot().player;
    assert_eq!(player.level, 1);
    assert_eq!(player.gold, 30);
    assert_eq!(player.meta.essence, 320, "essence survives");
    assert_eq!(player.meta.rank, 2);
    let fresh = template_player(&ContentTables::standard(), "adventurer");
    assert_eq!(player.attack, fresh.attack + 4, "rank bonus folded in");
    assert_eq!(player.max_hp, fresh.max_hp + 20);
}
