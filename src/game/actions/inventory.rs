//! Inventory, equipment, market, crafting, quest board, and job-change
//! entry points. Town facilities are modal: opening one switches the
//! session mode, and every trade/craft/claim checks its mode first.

use uuid::Uuid;

use crate::game::actions::{require_mode, Outcome};
use crate::game::combat::{self, TurnRejection};
use crate::game::content::ContentTables;
use crate::game::reducer::Action;
use crate::game::types::{GameMode, GameSession, ItemKind, Player, QuestProgress};
use crate::game::content::QuestTarget;

/// Town facilities reachable from idle.
const FACILITIES: [GameMode; 4] = [
    GameMode::Shop,
    GameMode::JobChange,
    GameMode::QuestBoard,
    GameMode::Crafting,
];

/// Open a town facility (shop, job board, quest board, workshop).
pub fn open_facility(
    session: &GameSession,
    content: &ContentTables,
    mode: GameMode,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Idle)?;
    if !FACILITIES.contains(&mode) {
        return Err(TurnRejection::Invalid("There is no such place.".into()));
    }
    let map = content
        .map(&session.player.location)
        .ok_or_else(|| TurnRejection::Invalid("You are nowhere known.".into()))?;
    if !map.town {
        return Err(TurnRejection::Invalid("Not out here.".into()));
    }
    Ok(Outcome::new().act(Action::SetMode(mode)))
}

/// Leave whichever facility is open.
pub fn leave_facility(session: &GameSession) -> Result<Outcome, TurnRejection> {
    if !FACILITIES.contains(&session.mode) {
        return Err(TurnRejection::WrongMode);
    }
    Ok(Outcome::new().act(Action::SetMode(GameMode::Idle)))
}

/// Drink/apply a consumable. Usable while idle or mid-combat; in combat
/// it consumes the turn and the enemy answers.
pub fn use_item(session: &GameSession, instance_id: Uuid) -> Result<Outcome, TurnRejection> {
    if session.mode != GameMode::Idle && session.mode != GameMode::Combat {
        return Err(TurnRejection::WrongMode);
    }
    let mut player = session.player.clone();
    let index = player
        .inventory
        .iter()
        .position(|i| i.instance_id == instance_id)
        .ok_or_else(|| TurnRejection::Invalid("You don't have that.".into()))?;
    if player.inventory[index].kind != ItemKind::Consumable {
        return Err(TurnRejection::Invalid("You can't use that.".into()));
    }
    let item = player.inventory.remove(index);
    let healed = item.heal.min(player.max_hp - player.hp);
    player.hp += healed;
    let out = Outcome::new()
        .log(format!("You use the {} and recover {} HP.", item.name, healed))
        .act(Action::SetPlayer(Box::new(player)));
    if session.in_combat() {
        Ok(out.then_enemy_turn())
    } else {
        Ok(out)
    }
}

/// Use whatever consumable a quick slot points at.
pub fn use_quick_slot(session: &GameSession, slot: usize) -> Result<Outcome, TurnRejection> {
    let item_id = session
        .quick_slots
        .get(slot)
        .and_then(|s| s.as_deref())
        .ok_or_else(|| TurnRejection::Invalid("That slot is empty.".into()))?;
    let instance = session
        .player
        .inventory
        .iter()
        .find(|i| i.item_id == item_id && i.kind == ItemKind::Consumable)
        .ok_or_else(|| TurnRejection::Invalid("None of those left.".into()))?;
    use_item(session, instance.instance_id)
}

/// Bind a quick slot to an item id, or clear it.
pub fn assign_quick_slot(
    session: &GameSession,
    slot: usize,
    item_id: Option<String>,
) -> Result<Outcome, TurnRejection> {
    if slot >= session.quick_slots.len() {
        return Err(TurnRejection::Invalid("No such slot.".into()));
    }
    if let Some(ref id) = item_id {
        let known = session
            .player
            .inventory
            .iter()
            .any(|i| &i.item_id == id && i.kind == ItemKind::Consumable);
        if !known {
            return Err(TurnRejection::Invalid("You don't carry that.".into()));
        }
    }
    Ok(Outcome::new().act(Action::SetQuickSlot { slot, item_id }))
}

/// Equip a weapon, armor, or offhand piece from the inventory. The
/// displaced piece returns to the inventory; a two-handed weapon clears
/// the offhand slot.
pub fn equip(session: &GameSession, instance_id: Uuid) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Idle)?;
    let mut player = session.player.clone();
    let index = player
        .inventory
        .iter()
        .position(|i| i.instance_id == instance_id)
        .ok_or_else(|| TurnRejection::Invalid("You don't have that.".into()))?;
    let item = player.inventory.remove(index);
    let name = item.name.clone();
    match item.kind {
        ItemKind::Weapon => {
            if item.two_handed {
                if let Some(offhand) = player.equipment.offhand.take() {
                    player.inventory.push(offhand);
                }
            }
            let old = std::mem::replace(&mut player.equipment.weapon, item);
            player.inventory.push(old);
        }
        ItemKind::Armor => {
            let old = std::mem::replace(&mut player.equipment.armor, item);
            player.inventory.push(old);
        }
        ItemKind::Offhand => {
            if player.equipment.weapon.two_handed {
                return Err(TurnRejection::Invalid(
                    "Both hands are on your weapon.".into(),
                ));
            }
            if let Some(old) = player.equipment.offhand.replace(item) {
                player.inventory.push(old);
            }
        }
        _ => {
            return Err(TurnRejection::Invalid("You can't wear that.".into()));
        }
    }
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("You equip the {}.", name)))
}

/// Stow the offhand piece.
pub fn unequip_offhand(session: &GameSession) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Idle)?;
    let mut player = session.player.clone();
    let item = player
        .equipment
        .offhand
        .take()
        .ok_or_else(|| TurnRejection::Invalid("Your offhand is empty.".into()))?;
    let name = item.name.clone();
    player.inventory.push(item);
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("You stow the {}.", name)))
}

/// Buy one item from the shop.
pub fn buy(
    session: &GameSession,
    content: &ContentTables,
    item_id: &str,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Shop)?;
    let def = content
        .item(item_id)
        .ok_or_else(|| TurnRejection::Invalid("Not in stock.".into()))?;
    if session.player.gold < def.price {
        return Err(TurnRejection::Invalid(format!(
            "You need {} gold for that.",
            def.price
        )));
    }
    let mut player = session.player.clone();
    player.gold -= def.price;
    let item = def.instantiate();
    let name = item.name.clone();
    player.inventory.push(item);
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("You buy a {}.", name)))
}

/// Sell one inventory item at half value. Starter gear is worthless to
/// the merchant and stays with you.
pub fn sell(session: &GameSession, instance_id: Uuid) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Shop)?;
    let mut player = session.player.clone();
    let index = player
        .inventory
        .iter()
        .position(|i| i.instance_id == instance_id)
        .ok_or_else(|| TurnRejection::Invalid("You don't have that.".into()))?;
    if player.inventory[index].starter {
        return Err(TurnRejection::Invalid(
            "The merchant waves your keepsake away.".into(),
        ));
    }
    let item = player.inventory.remove(index);
    let paid = item.value() / 2;
    player.gold = player.gold.saturating_add(paid);
    player.stats.gold_earned = player.stats.gold_earned.saturating_add(paid);
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("You sell the {} for {} gold.", item.name, paid)))
}

/// Craft a recipe: consumes the listed inputs and the gold cost,
/// produces one output instance.
pub fn craft(
    session: &GameSession,
    content: &ContentTables,
    recipe_id: &str,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::Crafting)?;
    let recipe = content
        .recipes
        .iter()
        .find(|r| r.id == recipe_id)
        .ok_or_else(|| TurnRejection::Invalid("No such recipe.".into()))?;
    if session.player.gold < recipe.gold_cost {
        return Err(TurnRejection::Invalid(format!(
            "Crafting this costs {} gold.",
            recipe.gold_cost
        )));
    }
    for (item_id, qty) in &recipe.inputs {
        let held = session
            .player
            .inventory
            .iter()
            .filter(|i| &i.item_id == item_id)
            .count() as u32;
        if held < *qty {
            return Err(TurnRejection::Invalid(format!(
                "You need {} more {}.",
                qty - held,
                item_id.replace('_', " ")
            )));
        }
    }
    let mut player = session.player.clone();
    player.gold -= recipe.gold_cost;
    for (item_id, qty) in &recipe.inputs {
        for _ in 0..*qty {
            if let Some(pos) = player.inventory.iter().position(|i| &i.item_id == item_id) {
                player.inventory.remove(pos);
            }
        }
    }
    let output = content
        .item(&recipe.output)
        .ok_or_else(|| TurnRejection::Invalid("The recipe is ruined.".into()))?
        .instantiate();
    let name = output.name.clone();
    player.inventory.push(output);
    player.record_history(format!("Crafted a {}.", name));
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("You craft a {}.", name)))
}

/// Take on a quest from the board.
pub fn accept_quest(
    session: &GameSession,
    content: &ContentTables,
    quest_id: &str,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::QuestBoard)?;
    let def = content
        .quest(quest_id)
        .ok_or_else(|| TurnRejection::Invalid("No such posting.".into()))?;
    if session.player.quest(quest_id).is_some() {
        return Err(TurnRejection::Invalid("You already took that job.".into()));
    }
    let mut player = session.player.clone();
    let mut progress = QuestProgress::new(&def.id, def.goal);
    if def.target == QuestTarget::Level {
        progress.progress = player.level.min(def.goal);
    }
    player.quests.push(progress);
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("Quest accepted: {}.", def.name)))
}

/// Turn in a completed quest for its reward bundle. Reaching the goal
/// only unlocks this; the claim is always explicit.
pub fn claim_quest(
    session: &GameSession,
    content: &ContentTables,
    quest_id: &str,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::QuestBoard)?;
    let def = content
        .quest(quest_id)
        .ok_or_else(|| TurnRejection::Invalid("No such posting.".into()))?;
    let progress = session
        .player
        .quest(quest_id)
        .ok_or_else(|| TurnRejection::Invalid("That isn't your job.".into()))?;
    if !progress.is_ready() {
        return Err(TurnRejection::Invalid(format!(
            "Not done yet: {}/{}.",
            progress.progress, progress.goal
        )));
    }
    let mut player = session.player.clone();
    player.quests.retain(|q| q.quest_id != quest_id);
    player.gold = player.gold.saturating_add(def.reward_gold);
    let mut out = Outcome::new().log(format!(
        "Quest complete: {}! Reward: {} gold.",
        def.name, def.reward_gold
    ));
    if def.reward_exp > 0 {
        let (_, level_logs) = combat::apply_exp(&mut player, def.reward_exp);
        out = out
            .log(format!("Gained {} EXP.", def.reward_exp))
            .logs(level_logs);
    }
    if let Some(ref item_id) = def.reward_item {
        if let Some(item_def) = content.item(item_id) {
            let item = item_def.instantiate();
            out = out.log(format!("Reward item: {}.", item.name));
            player.inventory.push(item);
        }
    }
    player.record_history(format!("Completed quest {}.", def.name));
    let player = combat::sync_level_quests(&player, content);
    Ok(out.act(Action::SetPlayer(Box::new(player))))
}

/// Retrain as another class. Stats and gear stay; the skill loadout is
/// rebuilt for the new class.
pub fn change_class(
    session: &GameSession,
    content: &ContentTables,
    class_id: &str,
) -> Result<Outcome, TurnRejection> {
    require_mode(session, GameMode::JobChange)?;
    let class = content
        .class(class_id)
        .ok_or_else(|| TurnRejection::Invalid("Nobody teaches that here.".into()))?;
    if session.player.class_id == class.id {
        return Err(TurnRejection::Invalid(format!(
            "You are already a {}.",
            class.name
        )));
    }
    let mut player = session.player.clone();
    player.class_id = class.id.clone();
    player.skills = crate::game::types::SkillLoadout::for_skill_count(class.skills.len());
    player.buff = None;
    player.status_effects.clear();
    player.record_history(format!("Became a {}.", class.name));
    Ok(Outcome::new()
        .act(Action::SetPlayer(Box::new(player)))
        .log(format!("You are now a {}.", class.name)))
}

/// Fresh template character for a full reset, carrying the fallen
/// character's meta-progression into the new derived stats.
pub fn reset_template(content: &ContentTables, player: &Player) -> Player {
    let mut template = crate::game::content::template_player(content, &player.class_id);
    template.name = player.name.clone();
    template.gender = player.gender.clone();
    template.meta = player.meta.clone();
    template.attack += template.meta.bonus_attack;
    template.max_hp += template.meta.bonus_hp;
    template.max_mp += template.meta.bonus_mp;
    template.hp = template.max_hp;
    template.mp = template.max_mp;
    template
}

/// Hard reset: wipe the session back to a template character. Meta
/// progression and the remote identity survive.
pub fn reset_session(
    session: &GameSession,
    content: &ContentTables,
) -> Result<Outcome, TurnRejection> {
    let template = reset_template(content, &session.player);
    Ok(Outcome::new()
        .act(Action::ResetSession(Box::new(template)))
        .log("The world fades. You begin again."))
}
