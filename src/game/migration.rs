//! Save-document schema and migration.
//!
//! The remote save is a JSON document with camelCase keys. Each save
//! tracks its schema version; older versions are upgraded in sequence
//! on the raw JSON before the typed parse, and fields added within a
//! version are backfilled by `#[serde(default)]`. Migrations are
//! idempotent and never lose data. A document that cannot be parsed at
//! all yields `None` and the caller starts a fresh character.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::types::{
    ActiveEvent, Enemy, GameMode, Grave, Player, SAVE_SCHEMA_VERSION,
};

/// The wire shape of a save. Top-level keys are the merge granularity:
/// a partial write replaces whole top-level values, never nested ones.
/// Session state lives in its own top-level keys (`gameState` is just
/// the mode string) so a merge never clobbers an unrelated sibling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveDocument {
    pub player: Player,
    #[serde(default = "default_mode")]
    pub game_state: GameMode,
    #[serde(default)]
    pub enemy: Option<Enemy>,
    #[serde(default)]
    pub grave: Option<Grave>,
    #[serde(default)]
    pub current_event: Option<ActiveEvent>,
    #[serde(default)]
    pub quick_slots: Vec<Option<String>>,
    #[serde(default)]
    pub onboarding_dismissed: bool,
    #[serde(default = "current_version")]
    pub version: u32,
    /// Server timestamp (epoch millis) of the last accepted write.
    #[serde(default)]
    pub last_active: i64,
}

fn current_version() -> u32 {
    SAVE_SCHEMA_VERSION
}

fn default_mode() -> GameMode {
    GameMode::Idle
}

/// Parse and upgrade a raw save document. Returns `None` when the
/// document is missing or unusable, which the boot path treats as a
/// first-time player rather than an error.
pub fn migrate_save(raw: Value) -> Option<SaveDocument> {
    if !raw.is_object() {
        if !raw.is_null() {
            warn!("Save document is not an object, starting fresh");
        }
        return None;
    }
    let mut doc = raw;
    flatten_game_state(&mut doc);
    let from_version = doc
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;

    if from_version < SAVE_SCHEMA_VERSION {
        info!(
            "Migrating save from schema v{} to v{}",
            from_version, SAVE_SCHEMA_VERSION
        );
        if from_version < 2 {
            migrate_v1_to_v2(&mut doc);
        }
        if from_version < 3 {
            migrate_v2_to_v3(&mut doc);
        }
        doc["version"] = Value::from(SAVE_SCHEMA_VERSION);
    } else if from_version > SAVE_SCHEMA_VERSION {
        // A newer client wrote this save. Parse what we understand.
        warn!(
            "Save schema v{} is newer than supported v{}; loading best-effort",
            from_version, SAVE_SCHEMA_VERSION
        );
    }

    match serde_json::from_value::<SaveDocument>(doc) {
        Ok(mut save) => {
            save.version = save.version.max(SAVE_SCHEMA_VERSION);
            save.player.schema_version = SAVE_SCHEMA_VERSION;
            save.player.clamp_resources();
            save.quick_slots.resize(3, None);
            Some(save)
        }
        Err(err) => {
            warn!("Save document unusable, starting fresh: {}", err);
            None
        }
    }
}

/// Some saves were written with `gameState` as a nested object holding
/// `mode`, `enemy`, `grave`, and `currentEvent`. Hoist those fields to
/// the top level and reduce `gameState` to the mode string. A no-op on
/// documents already in the flat shape.
fn flatten_game_state(doc: &mut Value) {
    let Some(obj) = doc.as_object_mut() else { return };
    if !obj.get("gameState").is_some_and(Value::is_object) {
        return;
    }
    let Some(Value::Object(mut nested)) = obj.remove("gameState") else {
        return;
    };
    for key in ["enemy", "grave", "currentEvent"] {
        if let Some(value) = nested.remove(key) {
            if !value.is_null() && !obj.contains_key(key) {
                obj.insert(key.into(), value);
            }
        }
    }
    let mode = nested.remove("mode").unwrap_or(Value::from("idle"));
    obj.insert("gameState".into(), mode);
}

/// v1 -> v2: `player.xp` renamed to `player.exp`; the mode string was
/// added (v1 carried only a bare `enemy`, so the mode is inferred).
fn migrate_v1_to_v2(doc: &mut Value) {
    if let Some(player) = doc.get_mut("player").and_then(Value::as_object_mut) {
        if let Some(xp) = player.remove("xp") {
            player.entry("exp").or_insert(xp);
        }
    }
    if doc.get("gameState").is_none() {
        let in_combat = doc.get("enemy").is_some_and(|e| !e.is_null());
        doc["gameState"] = Value::from(if in_combat { "combat" } else { "idle" });
    }
}

/// v2 -> v3: meta-progression block added (backfilled empty) and the
/// single `selectedSkill` index became a skill loadout with cooldowns.
fn migrate_v2_to_v3(doc: &mut Value) {
    let Some(player) = doc.get_mut("player").and_then(Value::as_object_mut) else {
        return;
    };
    if !player.contains_key("meta") {
        player.insert("meta".into(), serde_json::json!({}));
    }
    if let Some(selected) = player.remove("selectedSkill") {
        if !player.contains_key("skills") {
            player.insert(
                "skills".into(),
                serde_json::json!({ "selected": selected, "cooldowns": [] }),
            );
        }
    }
}
