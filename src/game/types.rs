use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use uuid::Uuid;

pub const SAVE_SCHEMA_VERSION: u32 = 3;

/// Capacity of the session log ring. Oldest entries drop first.
pub const LOG_CAPACITY: usize = 60;

/// Capacity of the player's rolling history log (archived on save).
pub const HISTORY_CAPACITY: usize = 40;

/// Essence needed per meta-progression rank.
pub const ESSENCE_PER_RANK: u64 = 150;

/// Permanent bonuses granted per rank-up.
pub const RANK_BONUS_ATTACK: i64 = 2;
pub const RANK_BONUS_HP: i64 = 10;
pub const RANK_BONUS_MP: i64 = 5;

/// Fixed per-level stat increments applied by the level-up loop.
pub const LEVEL_HP_GAIN: i64 = 12;
pub const LEVEL_MP_GAIN: i64 = 6;
pub const LEVEL_ATTACK_GAIN: i64 = 2;
pub const LEVEL_DEFENSE_GAIN: i64 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Fire,
    Ice,
    Lightning,
    Shadow,
    Holy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Armor,
    Offhand,
    Consumable,
    Material,
}

/// One owned item: a template snapshot plus a unique instance id.
/// A prefix is bound at most once; `item_id` stays stable for
/// registry/loot lookups even after the display name is decorated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemInstance {
    pub instance_id: Uuid,
    pub item_id: String,
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub attack: i64,
    #[serde(default)]
    pub defense: i64,
    /// Restored hp when consumed (consumables only).
    #[serde(default)]
    pub heal: i64,
    pub price: u64,
    #[serde(default)]
    pub two_handed: bool,
    #[serde(default)]
    pub element: Option<Element>,
    /// Prefix id once applied; never re-applied.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Starter gear is excluded from grave drops and sale.
    #[serde(default)]
    pub starter: bool,
}

impl ItemInstance {
    pub fn is_prefixed(&self) -> bool {
        self.prefix.is_some()
    }

    /// Sale/purchase price; prefixes already folded in at apply time.
    pub fn value(&self) -> u64 {
        self.price
    }
}

/// Equipment slots. Weapon and armor are always populated with some
/// instance; a two-handed weapon forces the offhand slot empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Equipment {
    pub weapon: ItemInstance,
    pub armor: ItemInstance,
    #[serde(default)]
    pub offhand: Option<ItemInstance>,
}

impl Equipment {
    pub fn attack_bonus(&self) -> i64 {
        self.weapon.attack + self.offhand.as_ref().map_or(0, |i| i.attack)
    }

    pub fn defense_bonus(&self) -> i64 {
        self.armor.defense + self.offhand.as_ref().map_or(0, |i| i.defense)
    }
}

/// Transient combat buff installed by self-buff skills. Replaced, not
/// stacked, when a new buff lands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CombatBuff {
    /// Fractional attack bonus, e.g. 0.3 for +30%.
    pub attack_bonus: f64,
    /// Fractional defense bonus.
    pub defense_bonus: f64,
    pub turns_left: u32,
}

/// Skill selection plus per-skill cooldown counters, parallel to the
/// class skill list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SkillLoadout {
    #[serde(default)]
    pub selected: Option<usize>,
    #[serde(default)]
    pub cooldowns: Vec<u32>,
}

impl SkillLoadout {
    pub fn for_skill_count(count: usize) -> Self {
        Self {
            selected: if count > 0 { Some(0) } else { None },
            cooldowns: vec![0; count],
        }
    }

    pub fn cooldown(&self, index: usize) -> u32 {
        self.cooldowns.get(index).copied().unwrap_or(0)
    }
}

/// Permanent meta-progression: survives defeat and reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MetaProgress {
    #[serde(default)]
    pub essence: u64,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub bonus_attack: i64,
    #[serde(default)]
    pub bonus_hp: i64,
    #[serde(default)]
    pub bonus_mp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Statistics {
    #[serde(default)]
    pub kills: u64,
    #[serde(default)]
    pub gold_earned: u64,
    #[serde(default)]
    pub deaths: u64,
    #[serde(default)]
    pub kills_by_monster: HashMap<String, u64>,
    #[serde(default)]
    pub boss_kills: u64,
    #[serde(default)]
    pub rests: u64,
}

/// Active quest progress. Progress never exceeds goal via normal
/// increments; completion is an explicit claim, not a side effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestProgress {
    pub quest_id: String,
    pub progress: u32,
    pub goal: u32,
}

impl QuestProgress {
    pub fn new(quest_id: &str, goal: u32) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            progress: 0,
            goal,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.progress >= self.goal
    }

    pub fn advance(&mut self, amount: u32) {
        self.progress = self.progress.saturating_add(amount).min(self.goal);
    }
}

/// The persistent progression entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub name: String,
    #[serde(default)]
    pub gender: String,
    pub class_id: String,
    pub level: u32,
    pub exp: u64,
    pub next_exp: u64,
    pub hp: i64,
    pub max_hp: i64,
    pub mp: i64,
    pub max_mp: i64,
    pub attack: i64,
    pub defense: i64,
    pub gold: u64,
    pub location: String,
    #[serde(default)]
    pub inventory: Vec<ItemInstance>,
    pub equipment: Equipment,
    #[serde(default)]
    pub quests: Vec<QuestProgress>,
    #[serde(default)]
    pub stats: Statistics,
    #[serde(default)]
    pub buff: Option<CombatBuff>,
    #[serde(default)]
    pub status_effects: BTreeSet<String>,
    #[serde(default)]
    pub skills: SkillLoadout,
    #[serde(default)]
    pub meta: MetaProgress,
    /// Bounded rolling history; drained into the archive on save.
    #[serde(default)]
    pub history: VecDeque<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    SAVE_SCHEMA_VERSION
}

impl Player {
    /// Clamp resources into their invariant ranges:
    /// `0 <= hp <= max_hp`, `0 <= mp <= max_mp`, level >= 1.
    pub fn clamp_resources(&mut self) {
        self.max_hp = self.max_hp.max(1);
        self.max_mp = self.max_mp.max(0);
        self.hp = self.hp.clamp(0, self.max_hp);
        self.mp = self.mp.clamp(0, self.max_mp);
        self.level = self.level.max(1);
        self.next_exp = self.next_exp.max(1);
    }

    pub fn record_history(&mut self, line: impl Into<String>) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(line.into());
    }

    pub fn quest(&self, quest_id: &str) -> Option<&QuestProgress> {
        self.quests.iter().find(|q| q.quest_id == quest_id)
    }
}

/// Ephemeral combat opponent. Created at encounter start, destroyed on
/// any terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enemy {
    /// Display name; may carry a power prefix ("Elder Cave Bat").
    pub name: String,
    /// Stable registry key for loot and quest matching.
    pub base_name: String,
    pub hp: i64,
    pub max_hp: i64,
    pub attack: i64,
    pub exp: u64,
    pub gold: u64,
    /// Attack pattern: probability mass checked sequentially, guard
    /// first, then heavy on the remainder of one draw.
    pub guard_chance: f64,
    pub heavy_chance: f64,
    #[serde(default)]
    pub weakness: Option<Element>,
    #[serde(default)]
    pub resistance: Option<Element>,
    #[serde(default)]
    pub boss: bool,
    #[serde(default)]
    pub stunned_turns: u32,
    /// Blocks the next incoming hit only; cleared whenever hit.
    #[serde(default)]
    pub guarding: bool,
    #[serde(default = "default_drop_multiplier")]
    pub drop_multiplier: f64,
}

fn default_drop_multiplier() -> f64 {
    1.0
}

impl Enemy {
    /// Hp as shown in logs: never negative even when the internal value
    /// dips below zero before the victory check.
    pub fn display_hp(&self) -> i64 {
        self.hp.max(0)
    }
}

/// Post-defeat remnant left at the player's last location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grave {
    pub location: String,
    pub gold: u64,
    #[serde(default)]
    pub item: Option<ItemInstance>,
    pub created_at: DateTime<Utc>,
}

/// A random event awaiting a player choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveEvent {
    pub description: String,
    pub choices: Vec<String>,
    pub outcomes: Vec<EventOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Gold(i64),
    Heal(i64),
    Damage(i64),
    Item(String),
    Nothing,
}

/// Ordered boot lifecycle. Each stage is a terminal precondition for
/// the next phase's side effects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BootStage {
    Uninitialized,
    Authenticating,
    LoadingConfig,
    LoadingPlayer,
    Ready,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Offline,
    Syncing,
    Synced,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Idle,
    Moving,
    Combat,
    Event,
    Shop,
    JobChange,
    QuestBoard,
    Crafting,
}

/// Shared/live configuration pushed from the remote store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveConfig {
    #[serde(default = "default_multiplier")]
    pub exp_multiplier: f64,
    #[serde(default = "default_multiplier")]
    pub gold_multiplier: f64,
    #[serde(default = "default_multiplier")]
    pub drop_multiplier: f64,
    #[serde(default)]
    pub announcement: Option<String>,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            exp_multiplier: 1.0,
            gold_multiplier: 1.0,
            drop_multiplier: 1.0,
            announcement: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub kills: u64,
}

/// The reducer's root object. Owned exclusively by the reducer; every
/// mutation flows through a dispatched action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSession {
    pub boot: BootStage,
    pub sync: SyncStatus,
    pub mode: GameMode,
    pub player: Player,
    pub enemy: Option<Enemy>,
    pub event: Option<ActiveEvent>,
    pub grave: Option<Grave>,
    pub log: VecDeque<String>,
    pub live: LiveConfig,
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Dedup guard: the `lastActive` stamp we last loaded or saved.
    pub last_remote_stamp: Option<i64>,
    /// Monotonic token; a scheduled enemy turn is valid only while
    /// `pending_turn` still holds its token.
    pub turn_counter: u64,
    pub pending_turn: Option<u64>,
    /// Remote identity handle; the only field a session reset keeps.
    pub identity: Option<String>,
    pub quick_slots: [Option<String>; 3],
    pub onboarding_dismissed: bool,
}

impl GameSession {
    /// A fresh, not-yet-booted session around a template player.
    pub fn fresh(player: Player) -> Self {
        Self {
            boot: BootStage::Uninitialized,
            sync: SyncStatus::Offline,
            mode: GameMode::Idle,
            player,
            enemy: None,
            event: None,
            grave: None,
            log: VecDeque::new(),
            live: LiveConfig::default(),
            leaderboard: Vec::new(),
            last_remote_stamp: None,
            turn_counter: 0,
            pending_turn: None,
            identity: None,
            quick_slots: Default::default(),
            onboarding_dismissed: false,
        }
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        if self.log.len() >= LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(line.into());
    }

    pub fn in_combat(&self) -> bool {
        self.mode == GameMode::Combat
    }
}
