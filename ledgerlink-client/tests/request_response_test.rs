//! Request/response integration tests
//!
//! Correlation ids, result extraction, typed results, timeouts and the real
//! WebSocket path.

mod common;

use common::{connect, drain_kinds, settle, MockLedgerNode, MockNetwork, MockNode};
use ledgerlink_client::{ClientBuilder, ClientOptions};
use ledgerlink_core::{Error, SendOptions};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

const NODE: &str = "wss://node.example";

#[derive(Debug, Deserialize, PartialEq)]
struct Echo {
    echo: String,
}

#[tokio::test(start_paused = true)]
async fn test_reply_carries_caller_id() {
    let network = MockNetwork::new().node(NODE, MockNode::healthy());
    let client = connect(&network, &[NODE], ClientOptions::default()).await;
    client.ready().await.unwrap();

    let with_id = client
        .send(json!({"command": "ping", "id": "abc"}), SendOptions::new())
        .await
        .unwrap();
    assert_eq!(with_id["id"], "abc");
    assert_eq!(with_id["status"], "success");

    let numeric = client
        .send(json!({"command": "ping", "id": 42}), SendOptions::new())
        .await
        .unwrap();
    assert_eq!(numeric["id"], 42);

    let without_id = client
        .send(json!({"command": "ping"}), SendOptions::new())
        .await
        .unwrap();
    assert!(without_id.get("id").is_none());

    // On the wire the id is the envelope
    let sent = network.received(NODE);
    let ping = sent.iter().find(|r| r.command() == "ping").unwrap();
    assert_eq!(ping.request["id"]["externalId"], "abc");
    assert!(ping.request["id"]["internalId"].is_u64());
}

#[tokio::test(start_paused = true)]
async fn test_result_is_unwrapped() {
    let network = MockNetwork::new().node(NODE, MockNode::healthy());
    let client = connect(&network, &[NODE], ClientOptions::default()).await;

    let result = client
        .send(json!({"command": "account_info", "account": "r1", "id": 1}), SendOptions::new())
        .await
        .unwrap();
    assert_eq!(result, json!({"echo": "account_info"}));

    let typed: Echo = client
        .send_as(json!({"command": "Account_Lines "}), SendOptions::new())
        .await
        .unwrap();
    assert_eq!(typed, Echo { echo: "account_lines".into() });

    let mismatch = client
        .send_as::<Vec<u8>>(json!({"command": "fee"}), SendOptions::new())
        .await;
    assert!(matches!(mismatch, Err(Error::Serialization(_))));
}

#[tokio::test(start_paused = true)]
async fn test_internal_ids_strictly_increase() {
    let network = MockNetwork::new().node(NODE, MockNode::healthy());
    let client = connect(&network, &[NODE], ClientOptions::default()).await;
    client.ready().await.unwrap();

    let calls: Vec<_> = (0..20)
        .map(|n| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send(json!({"command": "ledger_entry", "id": n}), SendOptions::new())
                    .await
            })
        })
        .collect();
    for call in calls {
        assert_eq!(call.await.unwrap().unwrap(), json!({"echo": "ledger_entry"}));
    }

    let ids: Vec<u64> = network
        .received(NODE)
        .iter()
        .map(|r| r.request["id"]["internalId"].as_u64().unwrap())
        .collect();
    assert_eq!(ids.len(), 22);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_request_never_transmitted() {
    let network = MockNetwork::new().node(NODE, MockNode::healthy());
    let client = connect(&network, &[NODE], ClientOptions::default()).await;
    client.ready().await.unwrap();

    for request in [json!("server_info"), json!({"id": 1}), json!({"command": "  "})] {
        let outcome = client.send(request, SendOptions::new()).await;
        assert!(matches!(outcome, Err(Error::InvalidRequest(_))));
    }
    settle().await;
    assert_eq!(network.commands(NODE), vec!["subscribe", "server_info"]);
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout() {
    let network = MockNetwork::new().node(NODE, MockNode::healthy().silent_on("account_info"));
    let client = connect(&network, &[NODE], ClientOptions::default()).await;
    client.ready().await.unwrap();

    let start = Instant::now();
    let outcome = client
        .send(
            json!({"command": "account_info", "account": "r1"}),
            SendOptions::new().with_timeout(Duration::from_secs(2)),
        )
        .await;
    assert_eq!(outcome, Err(Error::Timeout(Duration::from_secs(2))));
    assert!(start.elapsed() >= Duration::from_secs(2));

    // The connection is unaffected
    let fee = client.send(json!({"command": "fee"}), SendOptions::new()).await;
    assert!(fee.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_while_offline() {
    let network = MockNetwork::new();
    let client = connect(&network, &["wss://down.example"], ClientOptions::default()).await;

    let outcome = client
        .send(
            json!({"command": "fee"}),
            SendOptions::new().with_timeout(Duration::from_secs(3)),
        )
        .await;
    assert_eq!(outcome, Err(Error::Timeout(Duration::from_secs(3))));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_can_wait_for_transmission() {
    let network = MockNetwork::new();
    let client = connect(&network, &["wss://down.example"], ClientOptions::default()).await;

    let waiting = tokio::time::timeout(
        Duration::from_secs(30),
        client.send(
            json!({"command": "fee"}),
            SendOptions::new()
                .with_timeout(Duration::from_secs(3))
                .with_timeout_starts_when_online(),
        ),
    )
    .await;
    assert!(waiting.is_err(), "timer must not start before transmission");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_starts_on_transmission() {
    let network = MockNetwork::new().node(NODE, MockNode::healthy().silent_on("fee"));
    let client = connect(&network, &[NODE], ClientOptions::default()).await;
    client.ready().await.unwrap();

    let start = Instant::now();
    let outcome = client
        .send(
            json!({"command": "fee"}),
            SendOptions::new()
                .with_timeout(Duration::from_secs(5))
                .with_timeout_starts_when_online(),
        )
        .await;
    assert_eq!(outcome, Err(Error::Timeout(Duration::from_secs(5))));
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_frame_is_dropped() {
    let network = MockNetwork::new().node(NODE, MockNode::healthy());
    let client = connect(&network, &[NODE], ClientOptions::default()).await;
    client.ready().await.unwrap();
    let mut events = client.events();

    network.push_raw(NODE, "{nope");
    network.push_raw(NODE, "[1, 2, 3]");
    settle().await;
    assert!(drain_kinds(&mut events).is_empty());

    let fee = client.send(json!({"command": "fee"}), SendOptions::new()).await;
    assert_eq!(fee.unwrap(), json!({"echo": "fee"}));
    assert!(client.get_state().await.unwrap().online);
    assert_eq!(network.live_connections(NODE), 1);
    assert_eq!(network.connect_count(NODE), 1);
}

#[tokio::test(start_paused = true)]
async fn test_definitions() {
    let network = MockNetwork::new()
        .node(NODE, MockNode::healthy().with_definitions())
        .node("wss://plain.example", MockNode::healthy());

    let client = connect(&network, &[NODE], ClientOptions::default()).await;
    let definitions = client.definitions().await.unwrap().expect("definitions");
    assert!(definitions["FIELDS"].is_array());
    assert_eq!(definitions["TYPES"]["AccountID"], 8);

    let plain = connect(&network, &["wss://plain.example"], ClientOptions::default()).await;
    assert_eq!(plain.definitions().await.unwrap(), None);
}

#[tokio::test]
async fn test_real_websocket_round_trip() {
    let mut node = MockLedgerNode::start().await;
    let client = ClientBuilder::new()
        .with_endpoint(node.url())
        .connect()
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), client.ready())
        .await
        .expect("ready over a real socket")
        .unwrap();

    let first = node.next_request().await.unwrap();
    assert_eq!(first["command"], "subscribe");
    assert_eq!(first["id"]["externalId"], "_LedgerLink_Internal_Subscription");

    let reply = client
        .send(json!({"command": "ping", "id": 7}), SendOptions::new())
        .await
        .unwrap();
    assert_eq!(reply["id"], 7);

    let state = client.get_state().await.unwrap();
    assert!(state.online);
    assert_eq!(state.server.uri, node.url());

    client.destroy().await;
    node.shutdown().await;
}
