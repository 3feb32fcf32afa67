//! # Payload Mapper
//!
//! Pure transformation from the untyped JSON a GSI push carries into a
//! [`SnapshotDelta`]. Field access is explicit with wire defaults; the only
//! semantically meaningful translation is the `map.game_state` phase string.
//! The raw parsed document is returned alongside the delta so subscribers
//! can observe fields the typed model does not capture.

use serde_json::{Map, Value};

use crate::error::MapError;
use crate::model::{
    Ability, GamePhase, HeroInfo, Item, MapInfo, PlayerInfo, ProviderInfo, SnapshotDelta,
};

/// Parses one request body into a snapshot delta plus the raw document.
///
/// Fails only on invalid JSON syntax or a non-object root. A missing
/// `provider` section is tolerated (partial feeds) but logged.
pub fn map_payload(body: &str) -> Result<(SnapshotDelta, Value), MapError> {
    let doc: Value = serde_json::from_str(body)?;
    let root = doc.as_object().ok_or(MapError::NotAnObject)?;

    if !root.contains_key("provider") {
        log::warn!("GSI payload is missing the 'provider' section");
    }

    let delta = SnapshotDelta {
        provider: root.get("provider").and_then(Value::as_object).map(map_provider),
        map: root.get("map").and_then(Value::as_object).map(map_map),
        player: root.get("player").and_then(Value::as_object).map(map_player),
        hero: root.get("hero").and_then(Value::as_object).map(map_hero),
        abilities: root
            .get("abilities")
            .and_then(Value::as_object)
            .map(map_abilities),
        items: root.get("items").and_then(Value::as_object).map(map_items),
    };

    Ok((delta, doc))
}

fn map_provider(obj: &Map<String, Value>) -> ProviderInfo {
    ProviderInfo {
        name: str_field(obj, "name"),
        app_id: str_field(obj, "appid"),
        version: str_field(obj, "version"),
        timestamp: str_field(obj, "timestamp"),
    }
}

fn map_map(obj: &Map<String, Value>) -> MapInfo {
    MapInfo {
        name: str_field(obj, "name"),
        match_id: str_field(obj, "matchid"),
        phase: GamePhase::from_wire(&str_field(obj, "game_state")),
        game_time: int_field(obj, "game_time"),
        clock_time: int_field(obj, "clock_time"),
        daytime: bool_field(obj, "daytime", true),
        nightstalker_night: bool_field(obj, "nightstalker_night", false),
    }
}

fn map_player(obj: &Map<String, Value>) -> PlayerInfo {
    PlayerInfo {
        name: str_field(obj, "name"),
        steam_id: str_field(obj, "steamid"),
        team: int_field(obj, "team"),
        gold: int_field(obj, "gold"),
        gold_reliable: int_field(obj, "gold_reliable"),
        gold_unreliable: int_field(obj, "gold_unreliable"),
    }
}

fn map_hero(obj: &Map<String, Value>) -> HeroInfo {
    HeroInfo {
        name: str_field(obj, "name"),
        id: int_field(obj, "id"),
        level: int_field(obj, "level"),
        alive: bool_field(obj, "alive", false),
        respawn_seconds: int_field(obj, "respawn_seconds"),
        health_percent: float_field(obj, "health_percent"),
        mana_percent: float_field(obj, "mana_percent"),
        has_buyback: bool_field(obj, "has_buyback", false),
    }
}

// Slot maps arrive as objects keyed "ability0", "slot1", ... Iteration
// follows the payload's key order (serde_json preserve_order), and
// non-object slot values are skipped rather than erroring.

fn map_abilities(obj: &Map<String, Value>) -> Vec<Ability> {
    obj.values()
        .filter_map(Value::as_object)
        .map(|slot| Ability {
            id: int_field(slot, "id"),
            name: str_field(slot, "name"),
            level: int_field(slot, "level"),
            can_cast: bool_field(slot, "can_cast", false),
            passive: bool_field(slot, "passive", false),
            ultimate: bool_field(slot, "ultimate", false),
            cooldown: float_field(slot, "cooldown"),
            hidden: bool_field(slot, "hidden", false),
        })
        .collect()
}

fn map_items(obj: &Map<String, Value>) -> Vec<Item> {
    obj.values()
        .filter_map(Value::as_object)
        .map(|slot| Item {
            id: int_field(slot, "id"),
            name: str_field(slot, "name"),
            charges: int_field(slot, "charges"),
            purchasable: bool_field(slot, "purchasable", false),
            cooldown: float_field(slot, "cooldown"),
            passive: bool_field(slot, "passive", false),
        })
        .collect()
}

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn int_field(obj: &Map<String, Value>, key: &str) -> i32 {
    obj.get(key).and_then(Value::as_i64).unwrap_or(0) as i32
}

fn float_field(obj: &Map<String, Value>, key: &str) -> f32 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(0.0) as f32
}

fn bool_field(obj: &Map<String, Value>, key: &str, default: bool) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(default)
}
