//! # Typed Game State Model
//!
//! The snapshot structs mirror the top-level sections of a GSI payload
//! (`provider`, `map`, `player`, `hero`, `abilities`, `items`). Every field
//! has a wire default so a partial payload always maps to a complete struct.

use serde::{Deserialize, Serialize};

/// Match phase reported by the game client in `map.game_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GamePhase {
    #[default]
    Undefined,
    Pregame,
    Strategy,
    HeroSelection,
    InProgress,
    Postgame,
}

impl GamePhase {
    /// Translates a wire string into a phase. The mapping is closed over the
    /// five known gamerules states; anything else (including the empty
    /// string) is `Undefined`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "DOTA_GAMERULES_STATE_INIT" => Self::Pregame,
            "DOTA_GAMERULES_STATE_STRATEGY_TIME" => Self::Strategy,
            "DOTA_GAMERULES_STATE_HERO_SELECTION" => Self::HeroSelection,
            "DOTA_GAMERULES_STATE_GAME_IN_PROGRESS" => Self::InProgress,
            "DOTA_GAMERULES_STATE_POST_GAME" => Self::Postgame,
            _ => Self::Undefined,
        }
    }
}

/// Identity of the application emitting updates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub app_id: String,
    pub version: String,
    pub timestamp: String,
}

/// Map-level state: match identity, phase and clocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    pub name: String,
    pub match_id: String,
    pub phase: GamePhase,
    pub game_time: i32,
    pub clock_time: i32,
    pub daytime: bool,
    pub nightstalker_night: bool,
}

impl Default for MapInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            match_id: String::new(),
            phase: GamePhase::Undefined,
            game_time: 0,
            clock_time: 0,
            // the map starts in daylight
            daytime: true,
            nightstalker_night: false,
        }
    }
}

/// The local player's identity and economy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub steam_id: String,
    pub team: i32,
    pub gold: i32,
    pub gold_reliable: i32,
    pub gold_unreliable: i32,
}

/// The controlled hero. Percent fields are passed through as reported,
/// nominally in `[0, 100]` but never clamped here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeroInfo {
    pub name: String,
    pub id: i32,
    pub level: i32,
    pub alive: bool,
    pub respawn_seconds: i32,
    pub health_percent: f32,
    pub mana_percent: f32,
    pub has_buyback: bool,
}

/// One ability slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ability {
    pub id: i32,
    pub name: String,
    pub level: i32,
    pub can_cast: bool,
    pub passive: bool,
    pub ultimate: bool,
    pub cooldown: f32,
    pub hidden: bool,
}

/// One inventory slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Item {
    pub id: i32,
    pub name: String,
    pub charges: i32,
    pub purchasable: bool,
    pub cooldown: f32,
    pub passive: bool,
}

/// The authoritative view of game state held by the store.
///
/// Ability and item order equals the order the game client listed the slots
/// in the payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub provider: ProviderInfo,
    pub map: MapInfo,
    pub player: PlayerInfo,
    pub hero: HeroInfo,
    pub abilities: Vec<Ability>,
    pub items: Vec<Item>,
}

impl Snapshot {
    /// A snapshot is valid once the feed has identified itself end to end:
    /// provider name, match id, player steam id and hero name all non-empty.
    /// Derived on demand, never stored.
    pub fn valid(&self) -> bool {
        !self.provider.name.is_empty()
            && !self.map.match_id.is_empty()
            && !self.player.steam_id.is_empty()
            && !self.hero.name.is_empty()
    }
}

/// The section updates extracted from one payload. Sections absent from the
/// payload stay `None` and leave the stored snapshot untouched.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDelta {
    pub provider: Option<ProviderInfo>,
    pub map: Option<MapInfo>,
    pub player: Option<PlayerInfo>,
    pub hero: Option<HeroInfo>,
    pub abilities: Option<Vec<Ability>>,
    pub items: Option<Vec<Item>>,
}
