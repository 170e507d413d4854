//! Movement, exploration, resting, grave recovery, and random events.

use rand::Rng;

use crate::config::GameConfig;
use crate::game::actions::{require_mode, Outcome};
use crate::game::combat::TurnRejection;
use crate::game::content::{ContentTables, MonsterDef};
use crate::game::reducer::Action;
use crate::game::types::{ActiveEvent, Enemy, EventOutcome, GameMode, GameSession};
use crate::narrative;

/// Flat cost of a night at the inn.
pub const REST_COST: u64 = 10;

/// Travel to a connected location.
pub fn move_to(
    session: &GameSession,
    content: &ContentTables,
    target: &str,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Idle)?;
    let here = content
        .map(&session.player.location)
        .ok_or_else(|| TurnRejection::Invalid("You are nowhere known.".into()))?;
    if !here.connections.iter().any(|c| c == target) {
        return Err(TurnRejection::Invalid(
            "You can't get there from here.".into(),
        ));
    }
    let dest = content
        .map(target)
        .ok_or_else(|| TurnRejection::Invalid("That place doesn't exist.".into()))?;
    let mut player = session.player.clone();
    player.location = dest.id.clone();
    player.record_history(format!("Traveled to {}.", dest.name));
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("You arrive at {}.", dest.name)))
}

/// Search the current area: a random event, an encounter, or nothing.
/// The caller may pass pre-generated narrative content; `None` falls
/// back to the canned pool.
pub fn explore(
    session: &GameSession,
    content: &ContentTables,
    config: &GameConfig,
    rng: &mut impl Rng,
    remote_event: Option<ActiveEvent>,
    flavor_line: Option<String>,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Idle)?;
    let map = content
        .map(&session.player.location)
        .ok_or_else(|| TurnRejection::Invalid("You are nowhere known.".into()))?;
    if map.town {
        return Err(TurnRejection::Invalid(
            "It's peaceful here. Head out to the wilds to explore.".into(),
        ));
    }

    if rng.gen_bool(config.event_chance.clamp(0.0, 1.0)) {
        let event = remote_event.unwrap_or_else(|| narrative::fallback_event(rng));
        return Ok(Outcome::new()
            .log(event.description.clone())
            .act(Action::OpenEvent(Box::new(event))));
    }

    let Some(base_name) = pick(rng, &map.monsters) else {
        return Ok(Outcome::new().log("Nothing stirs."));
    };
    let def = content
        .monster(base_name)
        .ok_or_else(|| TurnRejection::Invalid("The wilds are strangely empty.".into()))?;
    let enemy = spawn_enemy(rng, content, def, config.enemy_prefix_chance);
    let flavor = flavor_line.unwrap_or_else(|| narrative::fallback_line(rng));
    let line = format!("A {} appears!", enemy.name);
    Ok(Outcome::new()
        .log(flavor)
        .act(Action::StartCombat(Box::new(enemy)))
        .log(line))
}

/// Build an encounter from a monster definition, with a chance of a
/// power prefix that scales stats and yields. The base name stays
/// untouched for loot and quest lookups.
pub fn spawn_enemy(
    rng: &mut impl Rng,
    content: &ContentTables,
    def: &MonsterDef,
    prefix_chance: f64,
) -> Enemy {
    let mut name = title_case(&def.base_name);
    let mut hp = def.hp;
    let mut attack = def.attack;
    let mut exp = def.exp;
    let mut gold = def.gold;
    let mut drop_multiplier = def.drop_multiplier;
    if !content.enemy_prefixes.is_empty() && rng.gen_bool(prefix_chance.clamp(0.0, 1.0)) {
        let prefix = &content.enemy_prefixes[rng.gen_range(0..content.enemy_prefixes.len())];
        name = format!("{} {}", prefix.name, name);
        hp = ((hp as f64) * prefix.hp_multiplier).floor().max(1.0) as i64;
        attack = ((attack as f64) * prefix.attack_multiplier).floor().max(1.0) as i64;
        exp = ((exp as f64) * prefix.yield_multiplier).floor() as u64;
        gold = ((gold as f64) * prefix.yield_multiplier).floor() as u64;
        drop_multiplier *= prefix.yield_multiplier;
    }
    Enemy {
        name,
        base_name: def.base_name.clone(),
        hp,
        max_hp: hp,
        attack,
        exp,
        gold,
        guard_chance: def.guard_chance,
        heavy_chance: def.heavy_chance,
        weakness: def.weakness,
        resistance: def.resistance,
        boss: def.boss,
        stunned_turns: 0,
        guarding: false,
        drop_multiplier,
    }
}

/// Rest at the inn: full restore for a flat fee. Towns only.
pub fn rest(session: &GameSession, content: &ContentTables) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Idle)?;
    let map = content
        .map(&session.player.location)
        .ok_or_else(|| TurnRejection::Invalid("You are nowhere known.".into()))?;
    if !map.town {
        return Err(TurnRejection::Invalid("No safe place to rest here.".into()));
    }
    if session.player.gold < REST_COST {
        return Err(TurnRejection::Invalid(format!(
            "The innkeeper wants {} gold.",
            REST_COST
        )));
    }
    let mut player = session.player.clone();
    player.gold -= REST_COST;
    player.hp = player.max_hp;
    player.mp = player.max_mp;
    player.stats.rests += 1;
    player.record_history("Rested at the inn.");
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log("You wake up fully restored."))
}

/// Recover a grave left at the current location.
pub fn collect_grave(session: &GameSession) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Idle)?;
    let grave = session
        .grave
        .as_ref()
        .ok_or_else(|| TurnRejection::Invalid("There is nothing to recover.".into()))?;
    if grave.location != session.player.location {
        return Err(TurnRejection::Invalid(format!(
            "Your remains lie elsewhere: {}.",
            grave.location
        )));
    }
    let mut player = session.player.clone();
    player.gold = player.gold.saturating_add(grave.gold);
    let mut out = Outcome::new().log(format!("You recover {} gold from your grave.", grave.gold));
    if let Some(item) = &grave.item {
        player.inventory.push(item.clone());
        out = out.log(format!("You also reclaim your {}.", item.name));
    }
    player.record_history("Recovered the grave.");
    Ok(out
        .act(Action::SetPlayer(Box::new(player)))
        .act(Action::SetGrave(None)))
}

/// Resolve a pending event choice. Events never kill: damage leaves at
/// least 1 hp.
pub fn choose_event(
    session: &GameSession,
    content: &ContentTables,
    choice: usize,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Event)?;
    let event = session
        .event
        .as_ref()
        .ok_or_else(|| TurnRejection::Invalid("Nothing is happening.".into()))?;
    let outcome = event
        .outcomes
        .get(choice)
        .ok_or_else(|| TurnRejection::Invalid("That isn't an option.".into()))?;

    let mut player = session.player.clone();
    let mut out = Outcome::new();
    match outcome {
        EventOutcome::Gold(amount) => {
            if *amount >= 0 {
                player.gold = player.gold.saturating_add(*amount as u64);
                out = out.log(format!("You gain {} gold.", amount));
            } else {
                let loss = amount.unsigned_abs().min(player.gold);
                player.gold -= loss;
                out = out.log(format!("You lose {} gold.", loss));
            }
        }
        EventOutcome::Heal(amount) => {
            player.hp = (player.hp + amount).min(player.max_hp);
            out = out.log(format!("You recover {} HP.", amount));
        }
        EventOutcome::Damage(amount) => {
            player.hp = (player.hp - amount).max(1);
            out = out.log(format!("You take {} damage.", amount));
        }
        EventOutcome::Item(item_id) => {
            if let Some(def) = content.item(item_id) {
                let item = def.instantiate();
                out = out.log(format!("You find a {}.", item.name));
                player.inventory.push(item);
            } else {
                out = out.log("You find nothing of use.");
            }
        }
        EventOutcome::Nothing => {
            out = out.log("Nothing comes of it.");
        }
    }
    Ok(out
        .act(Action::SetPlayer(Box::new(player)))
        .act(Action::CloseEvent {
            mode: GameMode::Idle,
        }))
}

fn pick<'a, T>(rng: &mut impl Rng, pool: &'a [T]) -> Option<&'a T> {
    if pool.is_empty() {
        None
    } else {
        Some(&pool[rng.gen_range(0..pool.len())])
    }
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
