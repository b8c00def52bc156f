//! End-to-end negotiation over real sockets.

use std::time::Duration;

use bazaar_client::{ConnectOptions, HubClient};
use bazaar_core::{Accept, Chat, Frame, Kind, Offer, Pay, SYSTEM_SENDER};
use bazaar_server::{start, HubConfig, ServerHandle};

const QUIET: Duration = Duration::from_millis(150);
const PATIENCE: Duration = Duration::from_secs(5);

async fn boot() -> ServerHandle {
    let config = HubConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..HubConfig::default()
    };
    start(config, None).await.unwrap()
}

async fn join(options: ConnectOptions) -> HubClient {
    let mut client = HubClient::connect(&options).await.unwrap();
    let welcome = next(&mut client).await;
    assert!(matches!(welcome, Frame::Chat(ref c) if c.from == SYSTEM_SENDER));
    client
}

fn ws_url(server: &ServerHandle) -> String {
    format!("ws://{}/ws", server.addr())
}

async fn next(client: &mut HubClient) -> Frame {
    tokio::time::timeout(PATIENCE, client.next_frame())
        .await
        .expect("timed out waiting for a frame")
        .expect("connection closed")
        .expect("read failed")
}

async fn take(client: &mut HubClient, n: usize) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(n);
    for _ in 0..n {
        frames.push(next(client).await);
    }
    frames
}

async fn assert_silent(client: &mut HubClient) {
    if let Ok(Some(frame)) = tokio::time::timeout(QUIET, client.next_frame()).await {
        panic!("unexpected frame {frame:?}");
    }
}

fn kind_list(frames: &[Frame]) -> Vec<Kind> {
    frames.iter().map(Frame::kind).collect()
}

#[tokio::test]
async fn offer_accept_pay_round_trip() {
    let server = boot().await;
    let url = ws_url(&server);
    let mut alice = join(ConnectOptions::participant(&url).with_name("Alice")).await;
    let mut bob = join(ConnectOptions::participant(&url)).await;
    let mut watcher = join(ConnectOptions::observer(&url)).await;

    alice
        .send(&Frame::Offer(Offer {
            id: "o1".into(),
            skill: "logo design".into(),
            price: 12.0,
            from: "A".into(),
        }))
        .await
        .unwrap();

    assert_eq!(kind_list(&take(&mut alice, 1).await), vec![Kind::Chat]);
    assert_eq!(kind_list(&take(&mut bob, 2).await), vec![Kind::Offer, Kind::Chat]);
    let seen = take(&mut watcher, 2).await;
    assert_eq!(kind_list(&seen), vec![Kind::Offer, Kind::Chat]);
    assert!(matches!(&seen[1], Frame::Chat(c) if c.text.starts_with("Alice offers logo design")));

    bob.send(&Frame::Accept(Accept {
        id: "o1".into(),
        from: "B".into(),
    }))
    .await
    .unwrap();

    let to_alice = take(&mut alice, 3).await;
    assert_eq!(kind_list(&to_alice), vec![Kind::Accept, Kind::Invoice, Kind::Chat]);
    let Frame::Invoice(invoice) = &to_alice[1] else {
        panic!("expected invoice");
    };
    assert_eq!(invoice.buyer, "A");
    assert_eq!(invoice.seller, "B");
    assert_eq!(invoice.price, 12.0);
    assert_eq!(kind_list(&take(&mut bob, 2).await), vec![Kind::Invoice, Kind::Chat]);
    assert_eq!(kind_list(&take(&mut watcher, 2).await), vec![Kind::Accept, Kind::Chat]);

    alice
        .send(&Frame::Pay(Pay {
            id: "o1".into(),
            tx: "0xfeed".into(),
            from: "A".into(),
        }))
        .await
        .unwrap();

    assert_eq!(kind_list(&take(&mut alice, 1).await), vec![Kind::Chat]);
    assert_eq!(kind_list(&take(&mut bob, 2).await), vec![Kind::Pay, Kind::Chat]);
    assert_eq!(kind_list(&take(&mut watcher, 2).await), vec![Kind::Pay, Kind::Chat]);

    let txs: serde_json::Value = reqwest::get(format!("http://{}/transactions", server.addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(txs.as_array().unwrap().len(), 1);
    assert_eq!(txs[0]["from"], "A");
    assert_eq!(txs[0]["to"], "B");
    assert_eq!(txs[0]["settlementRef"], "0xfeed");

    let roster: serde_json::Value = reqwest::get(format!("http://{}/roster", server.addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(roster[0]["name"], "Alice");
    assert_eq!(roster.as_array().unwrap().len(), 2);

    let _ = server.shutdown(Some(Duration::from_secs(5))).await;
}

#[tokio::test]
async fn observer_cannot_trade() {
    let server = boot().await;
    let url = ws_url(&server);
    let mut seller = join(ConnectOptions::participant(&url)).await;
    let mut watcher = join(ConnectOptions::observer(&url)).await;

    watcher
        .send(&Frame::Offer(Offer {
            id: "o7".into(),
            skill: "spying".into(),
            price: 1.0,
            from: "O".into(),
        }))
        .await
        .unwrap();

    let notice = next(&mut watcher).await;
    assert!(matches!(notice, Frame::Chat(ref c) if c.from == SYSTEM_SENDER && c.text.contains("capability denied")));
    assert_silent(&mut seller).await;

    // Chat is still allowed and reaches participants.
    watcher
        .send(&Frame::Chat(Chat {
            text: "just looking".into(),
            from: "O".into(),
        }))
        .await
        .unwrap();
    assert!(matches!(next(&mut seller).await, Frame::Chat(c) if c.text == "just looking"));

    let offers: serde_json::Value = reqwest::get(format!("http://{}/offers", server.addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(offers["offers"].as_array().unwrap().is_empty());

    let _ = server.shutdown(Some(Duration::from_secs(5))).await;
}

#[tokio::test]
async fn malformed_frames_are_dropped_silently() {
    let server = boot().await;
    let url = ws_url(&server);
    let mut alice = join(ConnectOptions::participant(&url)).await;
    let mut bob = join(ConnectOptions::participant(&url)).await;

    for raw in [
        "{{{",
        r#"{"t":"HAGGLE","from":"A"}"#,
        r#"{"t":"OFFER","id":"o1","from":"A"}"#,
        r#"{"t":"PAY","id":"missing","tx":"x","from":"A"}"#,
    ] {
        alice.send_raw(raw).await.unwrap();
    }
    assert_silent(&mut alice).await;
    assert_silent(&mut bob).await;

    // The connection is still usable afterwards.
    alice
        .send(&Frame::Chat(Chat {
            text: "I'm Alice".into(),
            from: "A".into(),
        }))
        .await
        .unwrap();
    assert!(matches!(next(&mut bob).await, Frame::Chat(c) if c.from == "A"));

    let _ = server.shutdown(Some(Duration::from_secs(5))).await;
}

#[tokio::test]
async fn reset_announces_and_clears() {
    let server = boot().await;
    let url = ws_url(&server);
    let mut alice = join(ConnectOptions::participant(&url)).await;

    alice
        .send(&Frame::Offer(Offer {
            id: "o1".into(),
            skill: "tea".into(),
            price: 2.0,
            from: "A".into(),
        }))
        .await
        .unwrap();
    let _ = next(&mut alice).await;

    let summary: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{}/reset", server.addr()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["offers"], 1);
    assert!(matches!(next(&mut alice).await, Frame::Chat(c) if c.text.contains("reset")));

    let _ = server.shutdown(Some(Duration::from_secs(5))).await;
}

#[tokio::test]
async fn shutdown_closes_client_sockets() {
    let server = boot().await;
    let mut alice = join(ConnectOptions::participant(ws_url(&server))).await;
    let _ = server.shutdown(Some(Duration::from_secs(5))).await;
    let end = tokio::time::timeout(PATIENCE, alice.next_frame()).await.unwrap();
    assert!(!matches!(end, Some(Ok(_))));
}
