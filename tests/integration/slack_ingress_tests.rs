//! Slack Events API, slash command and interaction routes over HTTP.

use serde_json::{json, Value};

use super::test_helpers::{eventually, spawn_router, test_config, test_state, FakeChat, FakeCrm};

fn form_post(url: String, body: String) -> reqwest::RequestBuilder {
    computron::install_crypto_provider();
    reqwest::Client::new()
        .post(url)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(body)
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let state = test_state(test_config(), &FakeChat::new(), &FakeCrm::new());
    let (base, ct) = spawn_router(state).await;

    for path in ["/slack/events", "/"] {
        let resp = reqwest::Client::new()
            .post(format!("{base}{path}"))
            .json(&json!({ "type": "url_verification", "token": "t", "challenge": "abc123" }))
            .send()
            .await
            .expect("request sent");
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.expect("json body");
        assert_eq!(body["challenge"], "abc123");
    }
    ct.cancel();
}

#[tokio::test]
async fn member_joined_event_runs_intake_in_background() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    let state = test_state(test_config(), &chat, &FakeCrm::new());
    let (base, ct) = spawn_router(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/slack/events"))
        .json(&json!({
            "type": "event_callback",
            "event_id": "Ev1",
            "event": { "type": "member_joined_channel", "user": "U_NEW", "channel": "C1" }
        }))
        .send()
        .await
        .expect("request sent");

    assert_eq!(resp.status(), 200);
    assert!(eventually(|| chat.posts().len() == 2).await);
    ct.cancel();
}

#[tokio::test]
async fn unrelated_events_are_acknowledged() {
    let chat = FakeChat::new();
    let state = test_state(test_config(), &chat, &FakeCrm::new());
    let (base, ct) = spawn_router(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/slack/events"))
        .json(&json!({
            "type": "event_callback",
            "event": { "type": "message", "text": "hi", "channel": "C1" }
        }))
        .send()
        .await
        .expect("request sent");

    assert_eq!(resp.status(), 200);
    assert!(chat.posts().is_empty());
    ct.cancel();
}

#[tokio::test]
async fn start_command_acks_ephemerally() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    let state = test_state(test_config(), &chat, &FakeCrm::new());
    let (base, ct) = spawn_router(state).await;

    let resp = form_post(
        format!("{base}/slack/commands"),
        "command=%2Fstart&channel_id=C1&user_id=U_A&text=".into(),
    )
    .send()
    .await
    .expect("request sent");

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["response_type"], "ephemeral");
    assert!(body["text"].as_str().unwrap_or_default().contains("Starting"));
    assert!(eventually(|| chat.posts().len() == 2).await);
    ct.cancel();
}

#[tokio::test]
async fn unknown_command_is_reported() {
    let state = test_state(test_config(), &FakeChat::new(), &FakeCrm::new());
    let (base, ct) = spawn_router(state).await;

    let resp = form_post(
        format!("{base}/slack/commands"),
        "command=%2Fnope&channel_id=C1&user_id=U_A".into(),
    )
    .send()
    .await
    .expect("request sent");

    let body: Value = resp.json().await.expect("json body");
    assert!(body["text"].as_str().unwrap_or_default().contains("/nope"));
    ct.cancel();
}

#[tokio::test]
async fn crew_chief_selection_is_dispatched() {
    let chat = FakeChat::new().with_channel("C1", "deal4821");
    chat.set_display_name("U_CHIEF", "Carl Chief");
    let crm = FakeCrm::new();
    let state = test_state(test_config(), &chat, &crm);
    let (base, ct) = spawn_router(state).await;

    let payload = json!({
        "type": "block_actions",
        "user": { "id": "U_ACTOR" },
        "channel": { "id": "C1" },
        "actions": [{ "action_id": "select_crew_chief", "type": "users_select", "selected_user": "U_CHIEF" }]
    })
    .to_string();
    let resp = form_post(
        format!("{base}/slack/interactions"),
        format!("payload={}", urlencoding::encode(&payload)),
    )
    .send()
    .await
    .expect("request sent");

    assert_eq!(resp.status(), 200);
    assert!(eventually(|| crm.notes().len() == 1).await);
    assert!(chat.post_texts().iter().any(|t| t.contains("Carl Chief")));
    ct.cancel();
}

#[tokio::test]
async fn unreadable_interaction_is_rejected() {
    let state = test_state(test_config(), &FakeChat::new(), &FakeCrm::new());
    let (base, ct) = spawn_router(state).await;

    let resp = form_post(format!("{base}/slack/interactions"), "payload=not-json".into())
        .send()
        .await
        .expect("request sent");

    assert_eq!(resp.status(), 400);
    ct.cancel();
}
