//! Static, read-only content tables: classes, maps, items, monsters,
//! quests, loot, prefixes, and crafting recipes. Consumed by the engine
//! and the action modules, never mutated at runtime.
//!
//! The numbers here are deliberately small sample content: the engine
//! specifies the mechanism by which tables are consumed, not balance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::game::types::{
    Element, Equipment, ItemInstance, ItemKind, Player, SkillLoadout, SAVE_SCHEMA_VERSION,
};

pub const STARTING_LOCATION: &str = "emberfall";
pub const DEFAULT_CLASS: &str = "adventurer";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SkillEffect {
    /// Self-buff: fractional atk/def bonus for a number of turns.
    Buff {
        attack_bonus: f64,
        defense_bonus: f64,
        turns: u32,
    },
    /// Damage-over-time tags. There is no separate ticking; these add a
    /// flat +20% to the instantaneous skill damage.
    Burn,
    Poison,
    Bleed,
    /// Control tags: set the enemy's stunned-turn counter to at least 1.
    Stun,
    Freeze,
}

impl SkillEffect {
    pub fn is_dot(&self) -> bool {
        matches!(self, SkillEffect::Burn | SkillEffect::Poison | SkillEffect::Bleed)
    }

    pub fn is_control(&self) -> bool {
        matches!(self, SkillEffect::Stun | SkillEffect::Freeze)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillDef {
    pub id: String,
    pub name: String,
    pub multiplier: f64,
    pub mana_cost: i64,
    /// Explicit cooldown; when absent, `ceil(mana_cost / 15)`, min 1.
    #[serde(default)]
    pub cooldown: Option<u32>,
    #[serde(default)]
    pub element: Option<Element>,
    #[serde(default)]
    pub effect: Option<SkillEffect>,
}

impl SkillDef {
    pub fn effective_cooldown(&self) -> u32 {
        self.cooldown
            .unwrap_or_else(|| ((self.mana_cost as f64) / 15.0).ceil() as u32)
            .max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassDef {
    pub id: String,
    pub name: String,
    pub base_hp: i64,
    pub base_mp: i64,
    pub base_attack: i64,
    pub base_defense: i64,
    pub skills: Vec<SkillDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapDef {
    pub id: String,
    pub name: String,
    /// Monster pool drawn from on exploration; empty in towns.
    pub monsters: Vec<String>,
    pub connections: Vec<String>,
    pub town: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub attack: i64,
    #[serde(default)]
    pub defense: i64,
    #[serde(default)]
    pub heal: i64,
    pub price: u64,
    #[serde(default)]
    pub two_handed: bool,
    #[serde(default)]
    pub element: Option<Element>,
}

impl ItemDef {
    pub fn instantiate(&self) -> ItemInstance {
        ItemInstance {
            instance_id: Uuid::new_v4(),
            item_id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            attack: self.attack,
            defense: self.defense,
            heal: self.heal,
            price: self.price,
            two_handed: self.two_handed,
            element: self.element,
            prefix: None,
            starter: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonsterDef {
    pub base_name: String,
    pub hp: i64,
    pub attack: i64,
    pub exp: u64,
    pub gold: u64,
    #[serde(default)]
    pub guard_chance: f64,
    #[serde(default)]
    pub heavy_chance: f64,
    #[serde(default)]
    pub weakness: Option<Element>,
    #[serde(default)]
    pub resistance: Option<Element>,
    #[serde(default)]
    pub boss: bool,
    #[serde(default = "one")]
    pub drop_multiplier: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestTarget {
    /// Matches a defeated enemy's base name exactly or as a substring
    /// stem ("wolf" matches "dire wolf").
    Monster(String),
    /// Progress is synced to the character level instead.
    Level,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestDef {
    pub id: String,
    pub name: String,
    pub target: QuestTarget,
    pub goal: u32,
    #[serde(default)]
    pub reward_gold: u64,
    #[serde(default)]
    pub reward_exp: u64,
    #[serde(default)]
    pub reward_item: Option<String>,
}

/// Loot table entry keyed by monster base name: independent rolls per
/// item against `base_chance * enemy.drop_multiplier`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootEntry {
    pub drops: Vec<LootDrop>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LootDrop {
    pub item_id: String,
    pub base_chance: f64,
}

/// Item prefix decoration, permanently bound at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrefixDef {
    pub id: String,
    pub name: String,
    pub attack_bonus: i64,
    pub defense_bonus: i64,
    pub price_multiplier: f64,
    /// Which item kinds this prefix can decorate.
    pub applies_to: Vec<ItemKind>,
}

/// Power prefix decorating an enemy's display name and scaling stats.
/// The base name stays stable for loot/registry lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnemyPrefixDef {
    pub name: String,
    pub hp_multiplier: f64,
    pub attack_multiplier: f64,
    pub yield_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeDef {
    pub id: String,
    pub name: String,
    /// (item_id, quantity) consumed from the inventory.
    pub inputs: Vec<(String, u32)>,
    pub output: String,
    pub gold_cost: u64,
}

/// The full static content set.
#[derive(Debug, Clone)]
pub struct ContentTables {
    pub classes: HashMap<String, ClassDef>,
    pub maps: HashMap<String, MapDef>,
    pub items: HashMap<String, ItemDef>,
    pub monsters: HashMap<String, MonsterDef>,
    pub quests: HashMap<String, QuestDef>,
    pub loot: HashMap<String, LootEntry>,
    pub prefixes: Vec<PrefixDef>,
    pub enemy_prefixes: Vec<EnemyPrefixDef>,
    pub recipes: Vec<RecipeDef>,
}

impl ContentTables {
    pub fn class(&self, id: &str) -> Option<&ClassDef> {
        self.classes.get(id)
    }

    pub fn map(&self, id: &str) -> Option<&MapDef> {
        self.maps.get(id)
    }

    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn monster(&self, base_name: &str) -> Option<&MonsterDef> {
        self.monsters.get(base_name)
    }

    pub fn quest(&self, id: &str) -> Option<&QuestDef> {
        self.quests.get(id)
    }

    /// The canonical content set. Built once at startup.
    pub fn standard() -> Self {
        let mut classes = HashMap::new();
        for class in standard_classes() {
            classes.insert(class.id.clone(), class);
        }
        let mut maps = HashMap::new();
        for map in standard_maps() {
            maps.insert(map.id.clone(), map);
        }
        let mut items = HashMap::new();
        for item in standard_items() {
            items.insert(item.id.clone(), item);
        }
        let mut monsters = HashMap::new();
        for monster in standard_monsters() {
            monsters.insert(monster.base_name.clone(), monster);
        }
        let mut quests = HashMap::new();
        for quest in standard_quests() {
            quests.insert(quest.id.clone(), quest);
        }
        Self {
            classes,
            maps,
            items,
            monsters,
            quests,
            loot: standard_loot(),
            prefixes: standard_prefixes(),
            enemy_prefixes: standard_enemy_prefixes(),
            recipes: standard_recipes(),
        }
    }
}

fn skill(
    id: &str,
    name: &str,
    multiplier: f64,
    mana_cost: i64,
    element: Option<Element>,
    effect: Option<SkillEffect>,
) -> SkillDef {
    SkillDef {
        id: id.to_string(),
        name: name.to_string(),
        multiplier,
        mana_cost,
        cooldown: None,
        element,
        effect,
    }
}

fn standard_classes() -> Vec<ClassDef> {
    vec![
        ClassDef {
            id: "adventurer".into(),
            name: "Adventurer".into(),
            base_hp: 50,
            base_mp: 20,
            base_attack: 8,
            base_defense: 3,
            skills: vec![
                skill("power_strike", "Power Strike", 1.6, 8, None, None),
                skill(
                    "war_cry",
                    "War Cry",
                    0.0,
                    10,
                    None,
                    Some(SkillEffect::Buff {
                        attack_bonus: 0.3,
                        defense_bonus: 0.1,
                        turns: 3,
                    }),
                ),
            ],
        },
        ClassDef {
            id: "mage".into(),
            name: "Mage".into(),
            base_hp: 38,
            base_mp: 45,
            base_attack: 10,
            base_defense: 2,
            skills: vec![
                skill(
                    "fireball",
                    "Fireball",
                    1.8,
                    12,
                    Some(Element::Fire),
                    Some(SkillEffect::Burn),
                ),
                skill(
                    "frost_lance",
                    "Frost Lance",
                    1.4,
                    14,
                    Some(Element::Ice),
                    Some(SkillEffect::Freeze),
                ),
            ],
        },
        ClassDef {
            id: "rogue".into(),
            name: "Rogue".into(),
            base_hp: 44,
            base_mp: 26,
            base_attack: 9,
            base_defense: 2,
            skills: vec![
                skill(
                    "venom_fang",
                    "Venom Fang",
                    1.5,
                    9,
                    Some(Element::Shadow),
                    Some(SkillEffect::Poison),
                ),
                skill(
                    "sap",
                    "Sap",
                    1.1,
                    11,
                    None,
                    Some(SkillEffect::Stun),
                ),
            ],
        },
    ]
}

fn map(id: &str, name: &str, monsters: &[&str], connections: &[&str], town: bool) -> MapDef {
    MapDef {
        id: id.to_string(),
        name: name.to_string(),
        monsters: monsters.iter().map(|s| s.to_string()).collect(),
        connections: connections.iter().map(|s| s.to_string()).collect(),
        town,
    }
}

fn standard_maps() -> Vec<MapDef> {
    vec![
        map("emberfall", "Emberfall Village", &[], &["whisper_woods"], true),
        map(
            "whisper_woods",
            "Whisper Woods",
            &["forest wolf", "cave bat", "moss slime"],
            &["emberfall", "gloom_caverns"],
            false,
        ),
        map(
            "gloom_caverns",
            "Gloom Caverns",
            &["cave bat", "bone warden", "shade stalker"],
            &["whisper_woods", "ashen_keep"],
            false,
        ),
        map(
            "ashen_keep",
            "Ashen Keep",
            &["shade stalker", "ember knight", "keep tyrant"],
            &["gloom_caverns"],
            false,
        ),
    ]
}

fn standard_items() -> Vec<ItemDef> {
    vec![
        ItemDef {
            id: "worn_sword".into(),
            name: "Worn Sword".into(),
            kind: ItemKind::Weapon,
            attack: 3,
            defense: 0,
            heal: 0,
            price: 20,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "cloth_tunic".into(),
            name: "Cloth Tunic".into(),
            kind: ItemKind::Armor,
            attack: 0,
            defense: 2,
            heal: 0,
            price: 15,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "iron_sword".into(),
            name: "Iron Sword".into(),
            kind: ItemKind::Weapon,
            attack: 7,
            defense: 0,
            heal: 0,
            price: 120,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "greataxe".into(),
            name: "Greataxe".into(),
            kind: ItemKind::Weapon,
            attack: 13,
            defense: 0,
            heal: 0,
            price: 340,
            two_handed: true,
            element: None,
        },
        ItemDef {
            id: "ember_blade".into(),
            name: "Ember Blade".into(),
            kind: ItemKind::Weapon,
            attack: 11,
            defense: 0,
            heal: 0,
            price: 420,
            two_handed: false,
            element: Some(Element::Fire),
        },
        ItemDef {
            id: "leather_armor".into(),
            name: "Leather Armor".into(),
            kind: ItemKind::Armor,
            attack: 0,
            defense: 5,
            heal: 0,
            price: 140,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "oak_shield".into(),
            name: "Oak Shield".into(),
            kind: ItemKind::Offhand,
            attack: 0,
            defense: 3,
            heal: 0,
            price: 90,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "healing_draught".into(),
            name: "Healing Draught".into(),
            kind: ItemKind::Consumable,
            attack: 0,
            defense: 0,
            heal: 30,
            price: 25,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "wolf_pelt".into(),
            name: "Wolf Pelt".into(),
            kind: ItemKind::Material,
            attack: 0,
            defense: 0,
            heal: 0,
            price: 12,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "bat_wing".into(),
            name: "Bat Wing".into(),
            kind: ItemKind::Material,
            attack: 0,
            defense: 0,
            heal: 0,
            price: 8,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "ember_core".into(),
            name: "Ember Core".into(),
            kind: ItemKind::Material,
            attack: 0,
            defense: 0,
            heal: 0,
            price: 60,
            two_handed: false,
            element: None,
        },
        ItemDef {
            id: "pelt_cloak".into(),
            name: "Pelt Cloak".into(),
            kind: ItemKind::Armor,
            attack: 0,
            defense: 7,
            heal: 0,
            price: 260,
            two_handed: false,
            element: None,
        },
    ]
}

fn standard_monsters() -> Vec<MonsterDef> {
    vec![
        MonsterDef {
            base_name: "forest wolf".into(),
            hp: 26,
            attack: 6,
            exp: 14,
            gold: 9,
            guard_chance: 0.0,
            heavy_chance: 0.2,
            weakness: Some(Element::Fire),
            resistance: None,
            boss: false,
            drop_multiplier: 1.0,
        },
        MonsterDef {
            base_name: "cave bat".into(),
            hp: 16,
            attack: 5,
            exp: 9,
            gold: 6,
            guard_chance: 0.0,
            heavy_chance: 0.1,
            weakness: None,
            resistance: Some(Element::Shadow),
            boss: false,
            drop_multiplier: 1.0,
        },
        MonsterDef {
            base_name: "moss slime".into(),
            hp: 30,
            attack: 4,
            exp: 11,
            gold: 7,
            guard_chance: 0.25,
            heavy_chance: 0.0,
            weakness: Some(Element::Fire),
            resistance: Some(Element::Ice),
            boss: false,
            drop_multiplier: 1.0,
        },
        MonsterDef {
            base_name: "bone warden".into(),
            hp: 48,
            attack: 9,
            exp: 26,
            gold: 18,
            guard_chance: 0.3,
            heavy_chance: 0.2,
            weakness: Some(Element::Holy),
            resistance: Some(Element::Shadow),
            boss: false,
            drop_multiplier: 1.0,
        },
        MonsterDef {
            base_name: "shade stalker".into(),
            hp: 42,
            attack: 11,
            exp: 30,
            gold: 21,
            guard_chance: 0.1,
            heavy_chance: 0.35,
            weakness: Some(Element::Holy),
            resistance: None,
            boss: false,
            drop_multiplier: 1.1,
        },
        MonsterDef {
            base_name: "ember knight".into(),
            hp: 66,
            attack: 13,
            exp: 44,
            gold: 33,
            guard_chance: 0.25,
            heavy_chance: 0.25,
            weakness: Some(Element::Ice),
            resistance: Some(Element::Fire),
            boss: false,
            drop_multiplier: 1.2,
        },
        MonsterDef {
            base_name: "keep tyrant".into(),
            hp: 140,
            attack: 17,
            exp: 160,
            gold: 120,
            guard_chance: 0.2,
            heavy_chance: 0.3,
            weakness: Some(Element::Lightning),
            resistance: Some(Element::Shadow),
            boss: true,
            drop_multiplier: 2.0,
        },
    ]
}

fn standard_quests() -> Vec<QuestDef> {
    vec![
        QuestDef {
            id: "wolf_cull".into(),
            name: "Thin the Pack".into(),
            target: QuestTarget::Monster("wolf".into()),
            goal: 3,
            reward_gold: 60,
            reward_exp: 40,
            reward_item: None,
        },
        QuestDef {
            id: "bat_harvest".into(),
            name: "Wings for the Apothecary".into(),
            target: QuestTarget::Monster("cave bat".into()),
            goal: 5,
            reward_gold: 45,
            reward_exp: 30,
            reward_item: Some("healing_draught".into()),
        },
        QuestDef {
            id: "warden_down".into(),
            name: "Silence the Warden".into(),
            target: QuestTarget::Monster("bone warden".into()),
            goal: 1,
            reward_gold: 120,
            reward_exp: 90,
            reward_item: None,
        },
        QuestDef {
            id: "seasoned".into(),
            name: "Seasoned Adventurer".into(),
            target: QuestTarget::Level,
            goal: 5,
            reward_gold: 150,
            reward_exp: 0,
            reward_item: Some("oak_shield".into()),
        },
        QuestDef {
            id: "tyrant_slayer".into(),
            name: "Topple the Tyrant".into(),
            target: QuestTarget::Monster("keep tyrant".into()),
            goal: 1,
            reward_gold: 500,
            reward_exp: 300,
            reward_item: Some("ember_blade".into()),
        },
    ]
}

fn standard_loot() -> HashMap<String, LootEntry> {
    let mut loot = HashMap::new();
    loot.insert(
        "forest wolf".to_string(),
        LootEntry {
            drops: vec![LootDrop {
                item_id: "wolf_pelt".into(),
                base_chance: 0.5,
            }],
        },
    );
    loot.insert(
        "cave bat".to_string(),
        LootEntry {
            drops: vec![LootDrop {
                item_id: "bat_wing".into(),
                base_chance: 0.55,
            }],
        },
    );
    loot.insert(
        "moss slime".to_string(),
        LootEntry {
            drops: vec![LootDrop {
                item_id: "healing_draught".into(),
                base_chance: 0.2,
            }],
        },
    );
    loot.insert(
        "bone warden".to_string(),
        LootEntry {
            drops: vec![
                LootDrop {
                    item_id: "iron_sword".into(),
                    base_chance: 0.15,
                },
                LootDrop {
                    item_id: "oak_shield".into(),
                    base_chance: 0.2,
                },
            ],
        },
    );
    loot.insert(
        "ember knight".to_string(),
        LootEntry {
            drops: vec![
                LootDrop {
                    item_id: "ember_core".into(),
                    base_chance: 0.6,
                },
                LootDrop {
                    item_id: "leather_armor".into(),
                    base_chance: 0.2,
                },
            ],
        },
    );
    loot.insert(
        "keep tyrant".to_string(),
        LootEntry {
            drops: vec![
                LootDrop {
                    item_id: "greataxe".into(),
                    base_chance: 0.3,
                },
                LootDrop {
                    item_id: "ember_core".into(),
                    base_chance: 0.8,
                },
            ],
        },
    );
    loot
}

fn standard_prefixes() -> Vec<PrefixDef> {
    vec![
        PrefixDef {
            id: "keen".into(),
            name: "Keen".into(),
            attack_bonus: 2,
            defense_bonus: 0,
            price_multiplier: 1.5,
            applies_to: vec![ItemKind::Weapon],
        },
        PrefixDef {
            id: "brutal".into(),
            name: "Brutal".into(),
            attack_bonus: 4,
            defense_bonus: 0,
            price_multiplier: 2.2,
            applies_to: vec![ItemKind::Weapon],
        },
        PrefixDef {
            id: "sturdy".into(),
            name: "Sturdy".into(),
            attack_bonus: 0,
            defense_bonus: 2,
            price_multiplier: 1.5,
            applies_to: vec![ItemKind::Armor, ItemKind::Offhand],
        },
        PrefixDef {
            id: "warded".into(),
            name: "Warded".into(),
            attack_bonus: 0,
            defense_bonus: 4,
            price_multiplier: 2.0,
            applies_to: vec![ItemKind::Armor],
        },
    ]
}

fn standard_enemy_prefixes() -> Vec<EnemyPrefixDef> {
    vec![
        EnemyPrefixDef {
            name: "Feral".into(),
            hp_multiplier: 1.2,
            attack_multiplier: 1.3,
            yield_multiplier: 1.4,
        },
        EnemyPrefixDef {
            name: "Elder".into(),
            hp_multiplier: 1.5,
            attack_multiplier: 1.2,
            yield_multiplier: 1.6,
        },
        EnemyPrefixDef {
            name: "Frenzied".into(),
            hp_multiplier: 0.9,
            attack_multiplier: 1.6,
            yield_multiplier: 1.5,
        },
    ]
}

fn standard_recipes() -> Vec<RecipeDef> {
    vec![
        RecipeDef {
            id: "pelt_cloak".into(),
            name: "Pelt Cloak".into(),
            inputs: vec![("wolf_pelt".into(), 3)],
            output: "pelt_cloak".into(),
            gold_cost: 40,
        },
        RecipeDef {
            id: "ember_blade".into(),
            name: "Ember Blade".into(),
            inputs: vec![("ember_core".into(), 2), ("iron_sword".into(), 1)],
            output: "ember_blade".into(),
            gold_cost: 150,
        },
    ]
}

/// Starter gear instance, flagged so it never lands in a grave and
/// cannot be sold.
fn starter_item(def: &ItemDef) -> ItemInstance {
    let mut item = def.instantiate();
    item.starter = true;
    item
}

/// Build the template player for a class. Meta-progression bonuses are
/// folded into derived max stats by the caller where required.
pub fn template_player(content: &ContentTables, class_id: &str) -> Player {
    let class = content
        .class(class_id)
        .or_else(|| content.class(DEFAULT_CLASS))
        .expect("default class present in standard content");
    let weapon = starter_item(content.item("worn_sword").expect("starter weapon"));
    let armor = starter_item(content.item("cloth_tunic").expect("starter armor"));
    Player {
        name: String::new(),
        gender: String::new(),
        class_id: class.id.clone(),
        level: 1,
        exp: 0,
        next_exp: 100,
        hp: class.base_hp,
        max_hp: class.base_hp,
        mp: class.base_mp,
        max_mp: class.base_mp,
        attack: class.base_attack,
        defense: class.base_defense,
        gold: 30,
        location: STARTING_LOCATION.to_string(),
        inventory: Vec::new(),
        equipment: Equipment {
            weapon,
            armor,
            offhand: None,
        },
        quests: Vec::new(),
        stats: Default::default(),
        buff: None,
        status_effects: Default::default(),
        skills: SkillLoadout::for_skill_count(class.skills.len()),
        meta: Default::default(),
        history: Default::default(),
        schema_version: SAVE_SCHEMA_VERSION,
    }
}
