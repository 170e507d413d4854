//! Pure combat resolution. Every function here is deterministic given
//! the RNG handed in, touches no storage, and returns fresh values plus
//! the narrated log lines for the exchange. Rejections carry a player
//! message and guarantee zero state change; callers must not dispatch
//! partial updates on failure.

use rand::Rng;
use thiserror::Error;

use crate::game::content::{ContentTables, PrefixDef, SkillDef, SkillEffect};
use crate::game::types::{
    CombatBuff, Element, Enemy, Grave, ItemInstance, LiveConfig, Player, ESSENCE_PER_RANK,
    LEVEL_ATTACK_GAIN, LEVEL_DEFENSE_GAIN, LEVEL_HP_GAIN, LEVEL_MP_GAIN, RANK_BONUS_ATTACK,
    RANK_BONUS_HP, RANK_BONUS_MP,
};
use crate::game::content::QuestTarget;

/// Damage reduction applied while the target guards.
const GUARD_FACTOR: f64 = 0.65;

/// Heavy attacks swing at 1.4x the enemy's attack.
const HEAVY_FACTOR: f64 = 1.4;

/// Flat bonus applied when a skill carries a burn/poison/bleed tag.
/// There is no separate DOT ticking; this is the entire representation.
const DOT_FACTOR: f64 = 1.2;

/// A turn that cannot proceed. No state was changed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnRejection {
    #[error("No skill selected.")]
    NoSkillSelected,
    #[error("{name} is on cooldown for {turns} more turn(s).")]
    OnCooldown { name: String, turns: u32 },
    #[error("Not enough mana: need {need}, have {have}.")]
    InsufficientMana { need: i64, have: i64 },
    #[error("You can't do that right now.")]
    WrongMode,
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy)]
pub struct AttackerStats {
    pub attack: i64,
    pub crit_chance: f64,
    pub element: Option<Element>,
}

#[derive(Debug, Clone, Copy)]
pub struct DefenderStats {
    pub defense: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct DamageParams {
    pub multiplier: f64,
    pub is_guarded: bool,
    pub elemental: f64,
    pub crit_chance: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct DamageRoll {
    pub damage: i64,
    pub critical: bool,
}

/// Effective offensive stats: base attack plus equipment, scaled by any
/// active buff. Meta-progression bonuses are already folded into the
/// base attack when granted.
pub fn attacker_stats(player: &Player, crit_chance: f64) -> AttackerStats {
    let buff_bonus = player.buff.map_or(0.0, |b| b.attack_bonus);
    let raw = player.attack + player.equipment.attack_bonus();
    AttackerStats {
        attack: ((raw as f64) * (1.0 + buff_bonus)).floor() as i64,
        crit_chance,
        element: player.equipment.weapon.element,
    }
}

pub fn defender_stats(player: &Player) -> DefenderStats {
    let buff_bonus = player.buff.map_or(0.0, |b| b.defense_bonus);
    let raw = player.defense + player.equipment.defense_bonus();
    DefenderStats {
        defense: ((raw as f64) * (1.0 + buff_bonus)).floor() as i64,
    }
}

/// 1.25 on a weakness match, 0.75 on a resistance match, else 1.
pub fn elemental_multiplier(
    attack_element: Option<Element>,
    weakness: Option<Element>,
    resistance: Option<Element>,
) -> f64 {
    match attack_element {
        Some(e) if weakness == Some(e) => 1.25,
        Some(e) if resistance == Some(e) => 0.75,
        _ => 1.0,
    }
}

/// One damage roll. Draw order is fixed (swing, then crit) so seeded
/// tests stay stable.
pub fn compute_damage(rng: &mut impl Rng, stats: &AttackerStats, params: &DamageParams) -> DamageRoll {
    let swing: f64 = rng.gen_range(0.9..=1.1);
    let guard = if params.is_guarded { GUARD_FACTOR } else { 1.0 };
    let mut base = ((stats.attack as f64) * swing * params.multiplier * guard * params.elemental)
        .floor() as i64;
    let critical = params.crit_chance > 0.0 && rng.gen_bool(params.crit_chance.clamp(0.0, 1.0));
    if critical {
        base *= 2;
    }
    DamageRoll {
        damage: base.max(1),
        critical,
    }
}

#[derive(Debug, Clone)]
pub struct AttackOutcome {
    pub enemy: Enemy,
    pub victory: bool,
    pub logs: Vec<String>,
}

/// A basic attack against the enemy. The guard flag only blocks the
/// current incoming hit, so it is cleared unconditionally.
pub fn resolve_attack(rng: &mut impl Rng, enemy: &Enemy, stats: &AttackerStats) -> AttackOutcome {
    let elemental = elemental_multiplier(stats.element, enemy.weakness, enemy.resistance);
    let roll = compute_damage(
        rng,
        stats,
        &DamageParams {
            multiplier: 1.0,
            is_guarded: enemy.guarding,
            elemental,
            crit_chance: stats.crit_chance,
        },
    );
    let mut next = enemy.clone();
    let was_guarding = next.guarding;
    next.guarding = false;
    next.hp -= roll.damage;
    let mut logs = Vec::new();
    if roll.critical {
        logs.push(format!("Critical! You hit {} for {} damage.", next.name, roll.damage));
    } else if was_guarding {
        logs.push(format!(
            "{} guards, but you still land {} damage.",
            next.name, roll.damage
        ));
    } else {
        logs.push(format!("You hit {} for {} damage.", next.name, roll.damage));
    }
    let victory = next.hp <= 0;
    if victory {
        logs.push(format!("{} is defeated!", next.name));
    } else {
        logs.push(format!("{} has {} HP left.", next.name, next.display_hp()));
    }
    AttackOutcome {
        enemy: next,
        victory,
        logs,
    }
}

#[derive(Debug, Clone)]
pub struct SkillOutcome {
    pub player: Player,
    pub enemy: Enemy,
    pub victory: bool,
    pub logs: Vec<String>,
}

/// Resolve the currently selected skill. Gating (selection, cooldown,
/// mana) rejects before any value is touched.
pub fn resolve_skill(
    rng: &mut impl Rng,
    player: &Player,
    enemy: &Enemy,
    stats: &AttackerStats,
    skill: &SkillDef,
    skill_index: usize,
) -> Result<SkillOutcome, TurnRejection> {
    let cooldown = player.skills.cooldown(skill_index);
    if cooldown > 0 {
        return Err(TurnRejection::OnCooldown {
            name: skill.name.clone(),
            turns: cooldown,
        });
    }
    if player.mp < skill.mana_cost {
        return Err(TurnRejection::InsufficientMana {
            need: skill.mana_cost,
            have: player.mp,
        });
    }

    let mut next_player = player.clone();
    let mut next_enemy = enemy.clone();
    let mut logs = Vec::new();

    next_player.mp -= skill.mana_cost;
    if let Some(slot) = next_player.skills.cooldowns.get_mut(skill_index) {
        *slot = skill.effective_cooldown();
    }

    if skill.multiplier > 0.0 {
        let element = skill.element.or(stats.element);
        let elemental = elemental_multiplier(element, next_enemy.weakness, next_enemy.resistance);
        let roll = compute_damage(
            rng,
            stats,
            &DamageParams {
                multiplier: skill.multiplier,
                is_guarded: next_enemy.guarding,
                elemental,
                crit_chance: stats.crit_chance,
            },
        );
        let mut damage = roll.damage;
        if skill.effect.as_ref().is_some_and(SkillEffect::is_dot) {
            damage = ((damage as f64) * DOT_FACTOR).floor() as i64;
        }
        next_enemy.guarding = false;
        next_enemy.hp -= damage;
        if roll.critical {
            logs.push(format!(
                "Critical! {} hits {} for {} damage.",
                skill.name, next_enemy.name, damage
            ));
        } else {
            logs.push(format!(
                "{} hits {} for {} damage.",
                skill.name, next_enemy.name, damage
            ));
        }
    } else {
        logs.push(format!("You use {}.", skill.name));
    }

    match skill.effect {
        Some(SkillEffect::Buff {
            attack_bonus,
            defense_bonus,
            turns,
        }) => {
            // New buff replaces any existing one.
            next_player.buff = Some(CombatBuff {
                attack_bonus,
                defense_bonus,
                turns_left: turns,
            });
            next_player.status_effects.insert("empowered".into());
            logs.push(format!("Your fighting spirit surges for {} turn(s).", turns));
        }
        Some(ref effect) if effect.is_control() => {
            next_enemy.stunned_turns = next_enemy.stunned_turns.max(1);
            logs.push(format!("{} is reeling!", next_enemy.name));
        }
        Some(SkillEffect::Burn) => logs.push(format!("{} is seared.", next_enemy.name)),
        Some(SkillEffect::Poison) => logs.push(format!("{} is poisoned.", next_enemy.name)),
        Some(SkillEffect::Bleed) => logs.push(format!("{} is bleeding.", next_enemy.name)),
        _ => {}
    }

    let victory = next_enemy.hp <= 0;
    if victory {
        logs.push(format!("{} is defeated!", next_enemy.name));
    } else if skill.multiplier > 0.0 {
        logs.push(format!(
            "{} has {} HP left.",
            next_enemy.name,
            next_enemy.display_hp()
        ));
    }

    Ok(SkillOutcome {
        player: next_player,
        enemy: next_enemy,
        victory,
        logs,
    })
}

#[derive(Debug, Clone)]
pub struct EnemyTurnOutcome {
    pub player: Player,
    pub enemy: Enemy,
    pub defeated: bool,
    pub logs: Vec<String>,
}

/// The enemy's counter-turn. One random draw is checked sequentially
/// against the pattern: guard first, then heavy on the remaining
/// probability mass. This is deliberately not two independent rolls.
///
/// End-of-round bookkeeping also lives here: the player's buff timer
/// and skill cooldowns tick down once per resolved enemy turn.
pub fn resolve_enemy_turn(
    rng: &mut impl Rng,
    player: &Player,
    enemy: &Enemy,
    defender: &DefenderStats,
) -> EnemyTurnOutcome {
    let mut next_player = player.clone();
    let mut next_enemy = enemy.clone();
    let mut logs = Vec::new();

    if next_enemy.stunned_turns > 0 {
        next_enemy.stunned_turns -= 1;
        logs.push(format!("{} is stunned and cannot act.", next_enemy.name));
    } else {
        let draw: f64 = rng.gen();
        if draw < next_enemy.guard_chance {
            next_enemy.guarding = true;
            logs.push(format!("{} braces to guard.", next_enemy.name));
        } else {
            let heavy = draw < next_enemy.guard_chance + next_enemy.heavy_chance;
            let mult = if heavy { HEAVY_FACTOR } else { 1.0 };
            let damage = (((next_enemy.attack as f64) * mult) - (defender.defense as f64))
                .floor()
                .max(1.0) as i64;
            next_player.hp = (next_player.hp - damage).max(0);
            if heavy {
                logs.push(format!(
                    "{} lands a heavy blow for {} damage!",
                    next_enemy.name, damage
                ));
            } else {
                logs.push(format!("{} hits you for {} damage.", next_enemy.name, damage));
            }
        }
    }

    tick_round(&mut next_player);

    let defeated = next_player.hp == 0;
    if defeated {
        logs.push("You collapse...".to_string());
    }
    EnemyTurnOutcome {
        player: next_player,
        enemy: next_enemy,
        defeated,
        logs,
    }
}

/// Per-round ticking: buff duration and skill cooldowns.
fn tick_round(player: &mut Player) {
    if let Some(mut buff) = player.buff.take() {
        buff.turns_left = buff.turns_left.saturating_sub(1);
        if buff.turns_left > 0 {
            player.buff = Some(buff);
        } else {
            player.status_effects.remove("empowered");
        }
    }
    for cd in &mut player.skills.cooldowns {
        *cd = cd.saturating_sub(1);
    }
}

#[derive(Debug, Clone)]
pub struct EscapeOutcome {
    pub escaped: bool,
    pub player: Player,
    pub defeated: bool,
    pub logs: Vec<String>,
}

/// Attempt to flee. Success probability is a fixed configured constant;
/// failure costs one normal-attack-equivalent hit.
pub fn resolve_escape(
    rng: &mut impl Rng,
    player: &Player,
    enemy: &Enemy,
    defender: &DefenderStats,
    escape_chance: f64,
) -> EscapeOutcome {
    let mut next_player = player.clone();
    let mut logs = Vec::new();
    if rng.gen_bool(escape_chance.clamp(0.0, 1.0)) {
        logs.push(format!("You slip away from {}.", enemy.name));
        return EscapeOutcome {
            escaped: true,
            player: next_player,
            defeated: false,
            logs,
        };
    }
    let damage = ((enemy.attack - defender.defense) as f64).floor().max(1.0) as i64;
    next_player.hp = (next_player.hp - damage).max(0);
    logs.push(format!(
        "You fail to escape! {} punishes you for {} damage.",
        enemy.name, damage
    ));
    let defeated = next_player.hp == 0;
    if defeated {
        logs.push("You collapse...".to_string());
    }
    EscapeOutcome {
        escaped: false,
        player: next_player,
        defeated,
        logs,
    }
}

#[derive(Debug, Clone)]
pub struct VictoryOutcome {
    pub player: Player,
    pub levels_gained: u32,
    pub ranks_gained: u32,
    pub logs: Vec<String>,
}

/// Rewards for a kill: exp/gold, kill registries, essence and rank
/// meta-progression, then the compounding level-up loop.
pub fn resolve_victory(player: &Player, enemy: &Enemy, live: &LiveConfig) -> VictoryOutcome {
    let mut next = player.clone();
    let mut logs = Vec::new();

    let exp_gain = ((enemy.exp as f64) * live.exp_multiplier).floor() as u64;
    let gold_gain = ((enemy.gold as f64) * live.gold_multiplier).floor() as u64;
    next.gold = next.gold.saturating_add(gold_gain);
    next.stats.kills += 1;
    next.stats.gold_earned = next.stats.gold_earned.saturating_add(gold_gain);
    *next
        .stats
        .kills_by_monster
        .entry(enemy.base_name.clone())
        .or_insert(0) += 1;
    if enemy.boss {
        next.stats.boss_kills += 1;
    }
    logs.push(format!("Gained {} EXP and {} gold.", exp_gain, gold_gain));

    // Essence is proportional to the kill's exp yield; each full
    // ESSENCE_PER_RANK crossed grants one-time permanent bonuses.
    let essence = (exp_gain / 8).max(1);
    next.meta.essence += essence;
    let mut ranks_gained = 0;
    let target_rank = (next.meta.essence / ESSENCE_PER_RANK) as u32;
    while next.meta.rank < target_rank {
        next.meta.rank += 1;
        next.meta.bonus_attack += RANK_BONUS_ATTACK;
        next.meta.bonus_hp += RANK_BONUS_HP;
        next.meta.bonus_mp += RANK_BONUS_MP;
        next.attack += RANK_BONUS_ATTACK;
        next.max_hp += RANK_BONUS_HP;
        next.max_mp += RANK_BONUS_MP;
        ranks_gained += 1;
        logs.push(format!(
            "Essence rank up! You are now rank {}.",
            next.meta.rank
        ));
    }

    let (levels_gained, level_logs) = apply_exp(&mut next, exp_gain);
    logs.extend(level_logs);

    next.record_history(format!("Defeated {}.", enemy.name));
    VictoryOutcome {
        player: next,
        levels_gained,
        ranks_gained,
        logs,
    }
}

/// Award exp and run the compounding level-up loop: subtract the
/// threshold, grow it by x1.5, apply fixed increments, fully restore.
/// Also used for quest exp rewards, so the same loop governs both.
pub fn apply_exp(player: &mut Player, amount: u64) -> (u32, Vec<String>) {
    player.exp += amount;
    let mut levels = 0;
    let mut logs = Vec::new();
    while player.exp >= player.next_exp {
        player.exp -= player.next_exp;
        player.next_exp = ((player.next_exp as f64) * 1.5).floor() as u64;
        player.level += 1;
        player.max_hp += LEVEL_HP_GAIN;
        player.max_mp += LEVEL_MP_GAIN;
        player.attack += LEVEL_ATTACK_GAIN;
        player.defense += LEVEL_DEFENSE_GAIN;
        player.hp = player.max_hp;
        player.mp = player.max_mp;
        levels += 1;
        logs.push(format!("Level up! You are now level {}.", player.level));
    }
    (levels, logs)
}

#[derive(Debug, Clone)]
pub struct LootOutcome {
    pub items: Vec<ItemInstance>,
    pub logs: Vec<String>,
}

/// Roll the enemy's loot table: one independent roll per entry, then a
/// chance for each dropped piece of gear to pick up a random compatible
/// prefix. An already-prefixed instance is never re-prefixed.
pub fn resolve_loot(
    rng: &mut impl Rng,
    enemy: &Enemy,
    content: &ContentTables,
    live: &LiveConfig,
    prefix_chance: f64,
) -> LootOutcome {
    let mut items = Vec::new();
    let mut logs = Vec::new();
    let Some(entry) = content.loot.get(&enemy.base_name) else {
        return LootOutcome { items, logs };
    };
    for drop in &entry.drops {
        let chance = (drop.base_chance * enemy.drop_multiplier * live.drop_multiplier)
            .clamp(0.0, 1.0);
        if !rng.gen_bool(chance) {
            continue;
        }
        let Some(def) = content.item(&drop.item_id) else {
            continue;
        };
        let mut item = def.instantiate();
        if !item.is_prefixed() && rng.gen_bool(prefix_chance.clamp(0.0, 1.0)) {
            let candidates: Vec<&PrefixDef> = content
                .prefixes
                .iter()
                .filter(|p| p.applies_to.contains(&item.kind))
                .collect();
            if !candidates.is_empty() {
                let prefix = candidates[rng.gen_range(0..candidates.len())];
                apply_prefix(&mut item, prefix);
            }
        }
        logs.push(format!("{} dropped {}.", enemy.name, item.name));
        items.push(item);
    }
    LootOutcome { items, logs }
}

fn apply_prefix(item: &mut ItemInstance, prefix: &PrefixDef) {
    item.name = format!("{} {}", prefix.name, item.name);
    item.attack += prefix.attack_bonus;
    item.defense += prefix.defense_bonus;
    item.price = ((item.price as f64) * prefix.price_multiplier).floor() as u64;
    item.prefix = Some(prefix.id.clone());
}

#[derive(Debug, Clone)]
pub struct DefeatOutcome {
    pub player: Player,
    pub grave: Grave,
    pub logs: Vec<String>,
}

/// Death: leave a grave (half the gold, one random non-starter item) at
/// the current location and reset to template defaults. Permanent
/// meta-progression persists and is re-applied to the derived max
/// stats; the death counter increments and the rest counter carries
/// over instead of resetting.
pub fn resolve_defeat(rng: &mut impl Rng, player: &Player, template: &Player) -> DefeatOutcome {
    let grave_gold = player.gold / 2;
    let droppable: Vec<&ItemInstance> = player.inventory.iter().filter(|i| !i.starter).collect();
    let grave_item = if droppable.is_empty() {
        None
    } else {
        Some(droppable[rng.gen_range(0..droppable.len())].clone())
    };
    let grave = Grave {
        location: player.location.clone(),
        gold: grave_gold,
        item: grave_item,
        created_at: chrono::Utc::now(),
    };

    let mut reborn = template.clone();
    reborn.name = player.name.clone();
    reborn.gender = player.gender.clone();
    reborn.meta = player.meta.clone();
    reborn.attack += reborn.meta.bonus_attack;
    reborn.max_hp += reborn.meta.bonus_hp;
    reborn.max_mp += reborn.meta.bonus_mp;
    reborn.hp = reborn.max_hp;
    reborn.mp = reborn.max_mp;
    reborn.stats.deaths = player.stats.deaths + 1;
    reborn.stats.rests = player.stats.rests;
    reborn.record_history("You fell in battle.");

    let logs = vec![
        format!(
            "You left {} gold{} behind at {}.",
            grave.gold,
            grave
                .item
                .as_ref()
                .map(|i| format!(" and your {}", i.name))
                .unwrap_or_default(),
            grave.location
        ),
        "Your essence endures. You awaken back home.".to_string(),
    ];
    DefeatOutcome {
        player: reborn,
        grave,
        logs,
    }
}

/// Advance every active quest that matches the defeated enemy's base
/// name (exact or substring stem). Level-target quests sync to the
/// current level instead. Reaching the goal only unlocks claiming; the
/// claim itself is a distinct action.
pub fn update_quest_progress(
    player: &Player,
    content: &ContentTables,
    defeated_base_name: &str,
) -> (Player, Vec<String>) {
    let mut next = player.clone();
    let mut logs = Vec::new();
    for progress in &mut next.quests {
        let Some(def) = content.quest(&progress.quest_id) else {
            continue;
        };
        match &def.target {
            QuestTarget::Monster(target) => {
                if defeated_base_name == target || defeated_base_name.contains(target.as_str()) {
                    let before = progress.progress;
                    progress.advance(1);
                    if progress.progress != before {
                        logs.push(format!(
                            "Quest \"{}\": {}/{}.",
                            def.name, progress.progress, progress.goal
                        ));
                        if progress.is_ready() {
                            logs.push(format!("Quest \"{}\" is ready to turn in!", def.name));
                        }
                    }
                }
            }
            QuestTarget::Level => {
                let level = next.level.min(progress.goal);
                if level > progress.progress {
                    progress.progress = level;
                    if progress.is_ready() {
                        logs.push(format!("Quest \"{}\" is ready to turn in!", def.name));
                    }
                }
            }
        }
    }
    (next, logs)
}

/// Sync level-target quests after any level change outside combat.
pub fn sync_level_quests(player: &Player, content: &ContentTables) -> Player {
    let mut next = player.clone();
    for progress in &mut next.quests {
        if let Some(def) = content.quest(&progress.quest_id) {
            if def.target == QuestTarget::Level {
                progress.progress = next.level.min(progress.goal).max(progress.progress);
            }
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::content::template_player;
    use crate::game::types::QuestProgress;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x7157)
    }

    fn dummy_enemy() -> Enemy {
        Enemy {
            name: "Training Post".into(),
            base_name: "training post".into(),
            hp: 30,
            max_hp: 30,
            attack: 12,
            exp: 10,
            gold: 5,
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

    #[test]
    fn damage_is_floored_at_one() {
        let mut r = rng();
        let stats = AttackerStats {
            attack: 0,
            crit_chance: 0.0,
            element: None,
        };
        for _ in 0..50 {
            let roll = compute_damage(
                &mut r,
                &stats,
                &DamageParams {
                    multiplier: 1.0,
                    is_guarded: true,
                    elemental: 0.75,
                    crit_chance: 0.0,
                },
            );
            assert!(roll.damage >= 1);
        }
    }

    #[test]
    fn plain_exchange_matches_expected_ranges() {
        // atk 20 vs guardless enemy: damage in [18, 22]; counter is
        // max(1, 12 - 5) = 7.
        let mut r = rng();
        let enemy = dummy_enemy();
        let stats = AttackerStats {
            attack: 20,
            crit_chance: 0.0,
            element: None,
        };
        for _ in 0..40 {
            let outcome = resolve_attack(&mut r, &enemy, &stats);
            let dealt = enemy.hp - outcome.enemy.hp;
            assert!((18..=22).contains(&dealt), "damage {dealt} out of range");
        }

        let content = ContentTables::standard();
        let mut player = template_player(&content, "adventurer");
        player.hp = 50;
        player.defense = 5;
        player.equipment.armor.defense = 0;
        let outcome = resolve_enemy_turn(&mut r, &player, &enemy, &DefenderStats { defense: 5 });
        assert_eq!(player.hp - outcome.player.hp, 7);
        assert!(!outcome.defeated);
    }

    #[test]
    fn guarded_hits_are_reduced() {
        let mut r = rng();
        let mut enemy = dummy_enemy();
        enemy.guarding = true;
        let stats = AttackerStats {
            attack: 20,
            crit_chance: 0.0,
            element: None,
        };
        let outcome = resolve_attack(&mut r, &enemy, &stats);
        let dealt = enemy.hp - outcome.enemy.hp;
        // floor(20 * [0.9, 1.1] * 0.65) in [11, 14]
        assert!((11..=14).contains(&dealt), "guarded damage {dealt}");
        assert!(!outcome.enemy.guarding, "guard clears once hit");
    }

    #[test]
    fn elemental_multipliers() {
        assert_eq!(
            elemental_multiplier(Some(Element::Fire), Some(Element::Fire), None),
            1.25
        );
        assert_eq!(
            elemental_multiplier(Some(Element::Fire), None, Some(Element::Fire)),
            0.75
        );
        assert_eq!(elemental_multiplier(Some(Element::Fire), None, None), 1.0);
        assert_eq!(elemental_multiplier(None, Some(Element::Fire), None), 1.0);
    }

    #[test]
    fn skill_gating_rejects_without_mutation() {
        let mut r = rng();
        let content = ContentTables::standard();
        let player = template_player(&content, "mage");
        let enemy = dummy_enemy();
        let class = content.class("mage").unwrap();
        let skill = &class.skills[0];
        let stats = attacker_stats(&player, 0.0);

        // Insufficient mana.
        let mut poor = player.clone();
        poor.mp = skill.mana_cost - 1;
        let err = resolve_skill(&mut r, &poor, &enemy, &stats, skill, 0).unwrap_err();
        assert!(matches!(err, TurnRejection::InsufficientMana { .. }));

        // On cooldown.
        let mut cooling = player.clone();
        cooling.skills.cooldowns[0] = 2;
        let err = resolve_skill(&mut r, &cooling, &enemy, &stats, skill, 0).unwrap_err();
        assert!(matches!(err, TurnRejection::OnCooldown { .. }));
    }

    #[test]
    fn skill_success_spends_mana_and_sets_cooldown() {
        let mut r = rng();
        let content = ContentTables::standard();
        let player = template_player(&content, "mage");
        let enemy = dummy_enemy();
        let class = content.class("mage").unwrap();
        let skill = &class.skills[0]; // fireball: cost 12, burn tag
        let stats = attacker_stats(&player, 0.0);

        let outcome = resolve_skill(&mut r, &player, &enemy, &stats, skill, 0).unwrap();
        assert_eq!(outcome.player.mp, player.mp - skill.mana_cost);
        assert_eq!(outcome.player.skills.cooldowns[0], skill.effective_cooldown());
        assert!(outcome.enemy.hp < enemy.hp);
    }

    #[test]
    fn buff_skill_installs_and_replaces_buff() {
        let mut r = rng();
        let content = ContentTables::standard();
        let mut player = template_player(&content, "adventurer");
        player.buff = Some(CombatBuff {
            attack_bonus: 0.05,
            defense_bonus: 0.0,
            turns_left: 1,
        });
        let enemy = dummy_enemy();
        let class = content.class("adventurer").unwrap();
        let war_cry = &class.skills[1];
        let stats = attacker_stats(&player, 0.0);

        let outcome = resolve_skill(&mut r, &player, &enemy, &stats, war_cry, 1).unwrap();
        let buff = outcome.player.buff.expect("buff installed");
        assert_eq!(buff.attack_bonus, 0.3);
        assert_eq!(buff.turns_left, 3);
        assert!(outcome.player.status_effects.contains("empowered"));
        // Pure buff deals no damage.
        assert_eq!(outcome.enemy.hp, enemy.hp);
    }

    #[test]
    fn stun_skill_sets_counter_and_enemy_skips() {
        let mut r = rng();
        let content = ContentTables::standard();
        let player = template_player(&content, "rogue");
        let enemy = dummy_enemy();
        let class = content.class("rogue").unwrap();
        let sap = &class.skills[1];
        let stats = attacker_stats(&player, 0.0);

        let outcome = resolve_skill(&mut r, &player, &enemy, &stats, sap, 1).unwrap();
        assert!(outcome.enemy.stunned_turns >= 1);

        let turn = resolve_enemy_turn(
            &mut r,
            &outcome.player,
            &outcome.enemy,
            &defender_stats(&outcome.player),
        );
        assert_eq!(turn.player.hp, outcome.player.hp, "stunned enemy deals nothing");
        assert_eq!(turn.enemy.stunned_turns, 0);
    }

    #[test]
    fn enemy_pattern_is_sequential_range_check() {
        // guard 1.0 consumes the whole draw: always guard, never damage.
        let mut r = rng();
        let content = ContentTables::standard();
        let player = template_player(&content, "adventurer");
        let mut enemy = dummy_enemy();
        enemy.guard_chance = 1.0;
        enemy.heavy_chance = 1.0;
        for _ in 0..20 {
            let outcome = resolve_enemy_turn(&mut r, &player, &enemy, &DefenderStats { defense: 0 });
            assert!(outcome.enemy.guarding);
            assert_eq!(outcome.player.hp, player.hp);
        }
    }

    #[test]
    fn level_loop_reward_120() {
        let content = ContentTables::standard();
        let mut player = template_player(&content, "adventurer");
        player.exp = 0;
        player.next_exp = 100;
        let mut enemy = dummy_enemy();
        enemy.exp = 120;
        enemy.gold = 0;
        let outcome = resolve_victory(&player, &enemy, &LiveConfig::default());
        assert_eq!(outcome.levels_gained, 1);
        assert_eq!(outcome.player.exp, 20);
        assert_eq!(outcome.player.next_exp, 150);
        assert_eq!(outcome.player.level, 2);
        assert_eq!(outcome.player.hp, outcome.player.max_hp, "level-up restores");
    }

    #[test]
    fn level_loop_reward_250_compounds() {
        let content = ContentTables::standard();
        let mut player = template_player(&content, "adventurer");
        player.exp = 0;
        player.next_exp = 100;
        let mut enemy = dummy_enemy();
        enemy.exp = 250;
        enemy.gold = 0;
        let outcome = resolve_victory(&player, &enemy, &LiveConfig::default());
        // 250 -> level (cost 100, next 150) -> level (cost 150, next 225)
        assert_eq!(outcome.levels_gained, 2);
        assert_eq!(outcome.player.exp, 0);
        assert_eq!(outcome.player.next_exp, 225);
        assert_eq!(outcome.player.level, 3);
    }

    #[test]
    fn victory_counts_kills_and_essence() {
        let content = ContentTables::standard();
        let player = template_player(&content, "adventurer");
        let mut enemy = dummy_enemy();
        enemy.exp = 4; // essence floor: max(1, 4/8) = 1
        enemy.boss = true;
        let outcome = resolve_victory(&player, &enemy, &LiveConfig::default());
        assert_eq!(outcome.player.stats.kills, 1);
        assert_eq!(outcome.player.stats.boss_kills, 1);
        assert_eq!(
            outcome.player.stats.kills_by_monster.get("training post"),
            Some(&1)
        );
        assert_eq!(outcome.player.meta.essence, 1);
    }

    #[test]
    fn rank_up_grants_one_time_bonuses() {
        let content = ContentTables::standard();
        let mut player = template_player(&content, "adventurer");
        player.meta.essence = ESSENCE_PER_RANK - 1;
        let base_attack = player.attack;
        let mut enemy = dummy_enemy();
        enemy.exp = 8; // 1 essence, crosses the threshold
        let outcome = resolve_victory(&player, &enemy, &LiveConfig::default());
        assert_eq!(outcome.ranks_gained, 1);
        assert_eq!(outcome.player.meta.rank, 1);
        assert_eq!(outcome.player.meta.bonus_attack, RANK_BONUS_ATTACK);
        assert_eq!(outcome.player.attack, base_attack + RANK_BONUS_ATTACK);
    }

    #[test]
    fn forced_loot_roll_always_drops() {
        let content = ContentTables::standard();
        let mut enemy = dummy_enemy();
        enemy.base_name = "forest wolf".into();
        enemy.drop_multiplier = 100.0; // clamped to certainty
        let mut r = rng();
        for _ in 0..10 {
            let outcome = resolve_loot(&mut r, &enemy, &content, &LiveConfig::default(), 0.0);
            assert_eq!(outcome.items.len(), 1);
            assert_eq!(outcome.items[0].item_id, "wolf_pelt");
        }
    }

    #[test]
    fn prefixed_loot_is_decorated_once() {
        let content = ContentTables::standard();
        let mut enemy = dummy_enemy();
        enemy.base_name = "bone warden".into();
        enemy.drop_multiplier = 100.0;
        let mut r = rng();
        let outcome = resolve_loot(&mut r, &enemy, &content, &LiveConfig::default(), 1.0);
        assert!(!outcome.items.is_empty());
        for item in &outcome.items {
            assert!(item.is_prefixed());
            let def = content.item(&item.item_id).unwrap();
            assert_ne!(item.name, def.name, "display name decorated");
        }
    }

    #[test]
    fn defeat_preserves_meta_and_increments_deaths() {
        let content = ContentTables::standard();
        let template = template_player(&content, "adventurer");
        let mut player = template.clone();
        player.gold = 101;
        player.level = 7;
        player.meta.essence = 320;
        player.meta.rank = 2;
        player.meta.bonus_attack = 4;
        player.meta.bonus_hp = 20;
        player.meta.bonus_mp = 10;
        player.stats.deaths = 2;
        player.stats.rests = 9;
        player
            .inventory
            .push(content.item("wolf_pelt").unwrap().instantiate());

        let mut r = rng();
        let outcome = resolve_defeat(&mut r, &player, &template);
        assert_eq!(outcome.grave.gold, 50);
        assert!(outcome.grave.item.is_some());
        assert_eq!(outcome.player.meta, player.meta);
        assert_eq!(outcome.player.stats.deaths, 3);
        assert_eq!(outcome.player.stats.rests, 9);
        assert_eq!(outcome.player.level, 1);
        assert_eq!(outcome.player.max_hp, template.max_hp + 20);
        assert_eq!(outcome.player.hp, outcome.player.max_hp);
        assert_eq!(outcome.player.stats.kills, 0, "runtime stats reset");
    }

    #[test]
    fn defeat_never_buries_starter_gear() {
        let content = ContentTables::standard();
        let template = template_player(&content, "adventurer");
        let player = template.clone(); // starter-only inventory
        let mut r = rng();
        let outcome = resolve_defeat(&mut r, &player, &template);
        assert!(outcome.grave.item.is_none());
    }

    #[test]
    fn quest_progress_matches_substring_and_caps() {
        let content = ContentTables::standard();
        let mut player = template_player(&content, "adventurer");
        player.quests.push(QuestProgress::new("wolf_cull", 3));
        player.quests.push(QuestProgress::new("bat_harvest", 5));

        // "forest wolf" contains the "wolf" stem; bat quest untouched.
        let (next, logs) = update_quest_progress(&player, &content, "forest wolf");
        assert_eq!(next.quest("wolf_cull").unwrap().progress, 1);
        assert_eq!(next.quest("bat_harvest").unwrap().progress, 0);
        assert!(!logs.is_empty());

        let mut capped = next;
        capped.quests[0].progress = 3;
        let (after, _) = update_quest_progress(&capped, &content, "forest wolf");
        assert_eq!(after.quest("wolf_cull").unwrap().progress, 3);
    }

    #[test]
    fn level_quests_sync_to_level() {
        let content = ContentTables::standard();
        let mut player = template_player(&content, "adventurer");
        player.level = 4;
        player.quests.push(QuestProgress::new("seasoned", 5));
        let (next, _) = update_quest_progress(&player, &content, "anything");
        assert_eq!(next.quest("seasoned").unwrap().progress, 4);
        let mut leveled = next;
        leveled.level = 9;
        let synced = sync_level_quests(&leveled, &content);
        assert_eq!(synced.quest("seasoned").unwrap().progress, 5);
    }

    #[test]
    fn buff_and_cooldowns_tick_per_round() {
        let content = ContentTables::standard();
        let mut player = template_player(&content, "adventurer");
        player.buff = Some(CombatBuff {
            attack_bonus: 0.3,
            defense_bonus: 0.0,
            turns_left: 1,
        });
        player.status_effects.insert("empowered".into());
        player.skills.cooldowns[0] = 2;
        let mut enemy = dummy_enemy();
        enemy.stunned_turns = 1;
        let mut r = rng();
        let outcome = resolve_enemy_turn(&mut r, &player, &enemy, &defender_stats(&player));
        assert!(outcome.player.buff.is_none(), "expired buff removed");
        assert!(!outcome.player.status_effects.contains("empowered"));
        assert_eq!(outcome.player.skills.cooldowns[0], 1);
    }
}
