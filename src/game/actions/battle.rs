//! Combat orchestration: player actions, the delayed enemy counter-turn,
//! and terminal outcomes (victory, escape, defeat). The engine math
//! lives in [`crate::game::combat`]; this module only decides which
//! dispatches follow from it.

use rand::Rng;

use crate::config::GameConfig;
use crate::game::actions::{require_mode, Outcome};
use crate::game::combat::{self, TurnRejection};
use crate::game::content::{template_player, ContentTables};
use crate::game::reducer::Action;
use crate::game::types::{Enemy, GameMode, GameSession, Player};

/// A basic weapon attack.
pub fn attack(
    session: &GameSession,
    content: &ContentTables,
    config: &GameConfig,
    rng: &mut impl Rng,
) -> Result<Outcome, TurnRejection> {
    let enemy = current_enemy(session)?;
    let stats = combat::attacker_stats(&session.player, config.crit_chance);
    let hit = combat::resolve_attack(rng, enemy, &stats);
    let out = Outcome::new().logs(hit.logs.clone());
    if hit.victory {
        Ok(finish_victory(
            out,
            session,
            session.player.clone(),
            &hit.enemy,
            content,
            config,
            rng,
        ))
    } else {
        Ok(out
            .act(Action::UpdateEnemy(Box::new(hit.enemy)))
            .then_enemy_turn())
    }
}

/// Cast the currently selected skill.
pub fn use_skill(
    session: &GameSession,
    content: &ContentTables,
    config: &GameConfig,
    rng: &mut impl Rng,
) -> Result<Outcome, TurnRejection> {
    let enemy = current_enemy(session)?;
    let index = session
        .player
        .skills
        .selected
        .ok_or(TurnRejection::NoSkillSelected)?;
    let class = content
        .class(&session.player.class_id)
        .ok_or_else(|| TurnRejection::Invalid("Your training has faded.".into()))?;
    let skill = class
        .skills
        .get(index)
        .ok_or(TurnRejection::NoSkillSelected)?;
    let stats = combat::attacker_stats(&session.player, config.crit_chance);
    let cast = combat::resolve_skill(rng, &session.player, enemy, &stats, skill, index)?;
    let out = Outcome::new().logs(cast.logs.clone());
    if cast.victory {
        Ok(finish_victory(
            out, session, cast.player, &cast.enemy, content, config, rng,
        ))
    } else {
        Ok(out
            .act(Action::SetPlayer(Box::new(cast.player)))
            .act(Action::UpdateEnemy(Box::new(cast.enemy)))
            .then_enemy_turn())
    }
}

/// Cycle the skill loadout selection. Usable in or out of combat and
/// never consumes a turn.
pub fn cycle_skill(
    session: &GameSession,
    content: &ContentTables,
) -> Result<Outcome, TurnRejection> {
    let class = content
        .class(&session.player.class_id)
        .ok_or_else(|| TurnRejection::Invalid("Your training has faded.".into()))?;
    if class.skills.is_empty() {
        return Err(TurnRejection::Invalid("You know no skills.".into()));
    }
    let mut player = session.player.clone();
    let next = match player.skills.selected {
        Some(i) => (i + 1) % class.skills.len(),
        None => 0,
    };
    player.skills.selected = Some(next);
    let name = class.skills[next].name.clone();
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("Skill ready: {}.", name)))
}

/// Attempt to flee. Failure costs one punishing hit.
pub fn escape(
    session: &GameSession,
    content: &ContentTables,
    config: &GameConfig,
    rng: &mut impl Rng,
) -> Result<Outcome, TurnRejection> {
    let enemy = current_enemy(session)?;
    let defender = combat::defender_stats(&session.player);
    let attempt = combat::resolve_escape(rng, &session.player, enemy, &defender, config.escape_chance);
    let out = Outcome::new().logs(attempt.logs.clone());
    if attempt.escaped {
        return Ok(out.act(Action::EndCombat {
            mode: GameMode::Idle,
        }));
    }
    if attempt.defeated {
        return Ok(apply_defeat(out, &attempt.player, content, rng));
    }
    Ok(out
        .act(Action::SetPlayer(Box::new(attempt.player)))
        .then_enemy_turn())
}

/// The delayed enemy counter-turn. Total: if the token went stale (the
/// fight ended, a reset happened, a new turn was reserved) the
/// continuation is dropped without touching anything.
pub fn enemy_turn(
    session: &GameSession,
    content: &ContentTables,
    rng: &mut impl Rng,
    token: u64,
) -> Outcome {
    if session.pending_turn != Some(token) {
        return Outcome::new();
    }
    let Some(enemy) = session.enemy.as_ref().filter(|_| session.in_combat()) else {
        return Outcome::new().act(Action::ClearPendingTurn { token });
    };
    let defender = combat::defender_stats(&session.player);
    let turn = combat::resolve_enemy_turn(rng, &session.player, enemy, &defender);
    let out = Outcome::new()
        .act(Action::ClearPendingTurn { token })
        .logs(turn.logs.clone());
    if turn.defeated {
        return apply_defeat(out, &turn.player, content, rng);
    }
    out.act(Action::SetPlayer(Box::new(turn.player)))
        .act(Action::UpdateEnemy(Box::new(turn.enemy)))
}

fn current_enemy(session: &GameSession) -> Result<&Enemy, TurnRejection> {
    require_mode(session, GameMode::Combat)?;
    session
        .enemy
        .as_ref()
        .ok_or_else(|| TurnRejection::Invalid("There is nothing to fight.".into()))
}

/// Rewards, quest progress, and loot for a kill, then the atomic exit
/// from combat.
fn finish_victory(
    out: Outcome,
    session: &GameSession,
    player: Player,
    enemy: &Enemy,
    content: &ContentTables,
    config: &GameConfig,
    rng: &mut impl Rng,
) -> Outcome {
    let victory = combat::resolve_victory(&player, enemy, &session.live);
    let (mut player, quest_logs) =
        combat::update_quest_progress(&victory.player, content, &enemy.base_name);
    let loot = combat::resolve_loot(rng, enemy, content, &session.live, config.prefix_chance);
    player.inventory.extend(loot.items);
    out.logs(victory.logs)
        .logs(quest_logs)
        .logs(loot.logs)
        .act(Action::SetPlayer(Box::new(player)))
        .act(Action::EndCombat {
            mode: GameMode::Idle,
        })
}

/// The player fell: leave a grave, rebirth from the class template with
/// meta-progression intact, and exit combat atomically.
fn apply_defeat(
    out: Outcome,
    fallen: &Player,
    content: &ContentTables,
    rng: &mut impl Rng,
) -> Outcome {
    let template = template_player(content, &fallen.class_id);
    let defeat = combat::resolve_defeat(rng, fallen, &template);
    out.logs(defeat.logs)
        .act(Action::SetGrave(Some(defeat.grave)))
        .act(Action::SetPlayer(Box::new(defeat.player)))
        .act(Action::EndCombat {
            mode: GameMode::Idle,
        })
}
