//! End-to-end tests driving the real listener over localhost, the way the
//! game client would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gsi_bridge::config::Config;
use gsi_bridge::{GamePhase, GsiConnector, GsiError};

fn test_config() -> Config {
    Config {
        host: Some("127.0.0.1".to_string()),
        // port 0: let the OS pick, the connector reports what it bound
        port: Some(0),
        ..Default::default()
    }
}

fn ingest_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}

const FULL_PAYLOAD: &str = r#"{
    "provider": {"name": "Dota 2", "appid": "570", "version": "47", "timestamp": "1700000000"},
    "map": {"name": "start", "matchid": "7100042", "game_state": "DOTA_GAMERULES_STATE_GAME_IN_PROGRESS",
            "game_time": 600, "clock_time": 540, "daytime": true, "nightstalker_night": false},
    "player": {"name": "player1", "steamid": "76561198000000000", "team": 2,
               "gold": 2500, "gold_reliable": 900, "gold_unreliable": 1600},
    "hero": {"name": "npc_dota_hero_axe", "id": 2, "level": 14, "alive": true,
             "respawn_seconds": 0, "health_percent": 64.0, "mana_percent": 31.5, "has_buyback": true},
    "abilities": {
        "ability0": {"id": 5100, "name": "axe_berserkers_call", "level": 4, "can_cast": true, "cooldown": 0.0},
        "ability1": {"id": 5101, "name": "axe_battle_hunger", "level": 4, "can_cast": false, "cooldown": 2.5}
    },
    "items": {
        "slot0": {"id": 1, "name": "item_blink", "purchasable": true, "cooldown": 0.0},
        "slot1": {"id": 34, "name": "item_tango", "charges": 2}
    }
}"#;

#[tokio::test]
async fn round_trip_ingest_produces_a_valid_snapshot() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("start");

    let res = reqwest::Client::new()
        .post(ingest_url(port))
        .header("Content-Type", "application/json")
        .body(FULL_PAYLOAD)
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(body["status"], "success");

    let snap = connector.snapshot();
    assert!(snap.valid());
    assert_eq!(snap.provider.name, "Dota 2");
    assert_eq!(snap.map.match_id, "7100042");
    assert_eq!(snap.map.phase, GamePhase::InProgress);
    assert_eq!(snap.player.steam_id, "76561198000000000");
    assert_eq!(snap.hero.name, "npc_dota_hero_axe");
    assert_eq!(snap.abilities.len(), 2);
    assert_eq!(snap.abilities[0].name, "axe_berserkers_call");
    assert_eq!(snap.abilities[1].name, "axe_battle_hunger");
    assert_eq!(snap.items[1].charges, 2);

    connector.stop().await;
}

#[tokio::test]
async fn partial_update_only_touches_its_sections() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("start");
    let client = reqwest::Client::new();

    client
        .post(ingest_url(port))
        .body(FULL_PAYLOAD)
        .send()
        .await
        .expect("send full");

    let res = client
        .post(ingest_url(port))
        .body(r#"{"hero": {"name": "npc_dota_hero_axe", "id": 2, "level": 15, "alive": true}}"#)
        .send()
        .await
        .expect("send partial");
    assert_eq!(res.status(), 200);

    let snap = connector.snapshot();
    assert_eq!(snap.hero.level, 15);
    // untouched sections survive
    assert_eq!(snap.provider.name, "Dota 2");
    assert_eq!(snap.map.match_id, "7100042");
    assert_eq!(snap.abilities.len(), 2);
    assert!(snap.valid());

    connector.stop().await;
}

#[tokio::test]
async fn malformed_json_is_rejected_without_side_effects() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("start");

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    connector.subscribe(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    let res = reqwest::Client::new()
        .post(ingest_url(port))
        .body("{ invalid json }")
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 400);
    let body: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(body["error"], "Invalid JSON");

    assert!(!connector.snapshot().valid());
    assert_eq!(notified.load(Ordering::SeqCst), 0);

    connector.stop().await;
}

#[tokio::test]
async fn empty_post_body_is_a_no_op_success() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("start");

    let res = reqwest::Client::new()
        .post(ingest_url(port))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);
    assert!(!connector.snapshot().valid());

    connector.stop().await;
}

#[tokio::test]
async fn health_endpoint_answers_while_running() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("start");

    let res = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.expect("body"), "OK");

    connector.stop().await;
}

#[tokio::test]
async fn preflight_gets_permissive_cors() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("start");

    let res = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, ingest_url(port))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 204);
    let headers = res.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").map(|v| v.as_bytes()),
        Some(b"*".as_slice())
    );
    assert_eq!(
        headers.get("access-control-allow-methods").map(|v| v.as_bytes()),
        Some(b"POST, OPTIONS".as_slice())
    );
    assert_eq!(
        headers.get("access-control-allow-headers").map(|v| v.as_bytes()),
        Some(b"Content-Type".as_slice())
    );

    connector.stop().await;
}

#[tokio::test]
async fn non_post_methods_are_client_errors() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("start");
    let client = reqwest::Client::new();

    let res = client.delete(ingest_url(port)).send().await.expect("send");
    assert_eq!(res.status(), 400);

    let res = client.get(ingest_url(port)).send().await.expect("send");
    assert_eq!(res.status(), 400);

    connector.stop().await;
}

#[tokio::test]
async fn start_is_rejected_while_running_and_stop_is_idempotent() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("first start");
    assert!(connector.is_running().await);

    let second = connector.start().await;
    assert!(matches!(second, Err(GsiError::AlreadyRunning)));
    // the running listener is unaffected
    assert_eq!(connector.port(), port);
    let res = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);

    connector.stop().await;
    assert!(!connector.is_running().await);
    connector.stop().await; // second stop is a no-op

    // and the listener can come back
    let port = connector.start().await.expect("restart");
    let res = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);
    connector.stop().await;
}

#[tokio::test]
async fn panicking_subscriber_does_not_take_down_the_bridge() {
    let connector = GsiConnector::new(&test_config());
    let port = connector.start().await.expect("start");

    let delivered = Arc::new(AtomicUsize::new(0));
    connector.subscribe(Box::new(|_| panic!("subscriber bug")));
    let counter = Arc::clone(&delivered);
    connector.subscribe(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    let client = reqwest::Client::new();
    let res = client
        .post(ingest_url(port))
        .body(FULL_PAYLOAD)
        .send()
        .await
        .expect("send");
    assert_eq!(res.status(), 200);
    assert!(connector.snapshot().valid());
    assert_eq!(delivered.load(Ordering::SeqCst), 1);

    // the process and the listener both survive the panic
    let res = client
        .post(ingest_url(port))
        .body(FULL_PAYLOAD)
        .send()
        .await
        .expect("send again");
    assert_eq!(res.status(), 200);
    assert_eq!(delivered.load(Ordering::SeqCst), 2);

    connector.stop().await;
}

#[tokio::test]
async fn subscribers_get_the_raw_document_after_the_commit() {
    let connector = Arc::new(GsiConnector::new(&test_config()));
    let port = connector.start().await.expect("start");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let reader = Arc::clone(&connector);
    let handle = connector.subscribe(Box::new(move |payload| {
        // by the time a subscriber runs, the store already holds this update
        let match_id = reader.snapshot().map.match_id.clone();
        sink.lock()
            .expect("lock")
            .push((payload["map"]["matchid"].clone(), match_id));
        Ok(())
    }));
    assert!(handle > 0);

    reqwest::Client::new()
        .post(ingest_url(port))
        .body(FULL_PAYLOAD)
        .send()
        .await
        .expect("send");

    {
        let deliveries = seen.lock().expect("lock");
        assert_eq!(deliveries.len(), 1);
        let (raw_match_id, store_match_id) = &deliveries[0];
        assert_eq!(raw_match_id, "7100042");
        assert_eq!(store_match_id, "7100042");
    }

    assert!(connector.unsubscribe(handle));
    assert!(!connector.unsubscribe(handle));

    // no further deliveries once unsubscribed
    reqwest::Client::new()
        .post(ingest_url(port))
        .body(FULL_PAYLOAD)
        .send()
        .await
        .expect("send");
    assert_eq!(seen.lock().expect("lock").len(), 1);

    connector.stop().await;
}
