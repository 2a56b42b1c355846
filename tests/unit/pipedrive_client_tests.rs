//! `PipedriveClient` against a mock Pipedrive API.

use chrono::NaiveDate;
use httpmock::prelude::*;
use serde_json::json;

use computron::config::CrmConfig;
use computron::crm::{CrmApi, NewActivity, PipedriveClient};
use computron::AppError;

fn client(server: &MockServer) -> PipedriveClient {
    let config = CrmConfig {
        base_url: server.base_url(),
        api_token: "pd-token".into(),
        estimator_field: Some("est_key".into()),
        timeout_seconds: 2,
        ..CrmConfig::default()
    };
    PipedriveClient::new(&config).expect("client builds")
}

#[tokio::test]
async fn fetch_deal_reads_person_and_estimator() {
    let server = MockServer::start();
    let deal = server.mock(|when, then| {
        when.method(GET)
            .path("/deals/4821")
            .query_param("api_token", "pd-token");
        then.status(200).json_body(json!({
            "success": true,
            "data": {
                "id": 4821,
                "title": "Smith basement",
                "person_name": "Jane Smith",
                "est_key": { "id": 7, "name": "Bob Estimator" }
            }
        }));
    });

    let record = client(&server).fetch_deal("4821").await.expect("deal fetched");

    assert_eq!(record.id, "4821");
    assert_eq!(record.customer_label(), "Jane Smith");
    assert_eq!(record.estimator.as_deref(), Some("Bob Estimator"));
    assert_eq!(deal.calls(), 1);
}

#[tokio::test]
async fn fetch_deal_without_person_uses_default_label() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/deals/9");
        then.status(200)
            .json_body(json!({ "success": true, "data": { "id": 9, "person_name": null } }));
    });

    let record = client(&server).fetch_deal("9").await.expect("deal fetched");
    assert_eq!(record.customer_label(), "Customer");
}

#[tokio::test]
async fn missing_deal_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/deals/1");
        then.status(200).json_body(json!({ "success": true, "data": null }));
    });

    let result = client(&server).fetch_deal("1").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn http_error_maps_to_crm_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/deals/2");
        then.status(401)
            .json_body(json!({ "success": false, "error": "unauthorized access" }));
    });

    let result = client(&server).fetch_deal("2").await;
    assert!(matches!(result, Err(AppError::Crm(msg)) if msg.contains("unauthorized")));
}

#[tokio::test]
async fn create_note_sends_numeric_deal_id() {
    let server = MockServer::start();
    let note = server.mock(|when, then| {
        when.method(POST)
            .path("/notes")
            .query_param("api_token", "pd-token")
            .json_body(json!({
                "content": "Crew Chief assigned is: Carl Chief",
                "deal_id": 4821
            }));
        then.status(201).json_body(json!({ "success": true, "data": { "id": 55 } }));
    });

    client(&server)
        .create_note("4821", "Crew Chief assigned is: Carl Chief")
        .await
        .expect("note created");
    assert_eq!(note.calls(), 1);
}

#[tokio::test]
async fn rejected_note_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/notes");
        then.status(200)
            .json_body(json!({ "success": false, "error": "Deal not found" }));
    });

    let result = client(&server).create_note("1", "x").await;
    assert!(matches!(result, Err(AppError::Crm(msg)) if msg.contains("Deal not found")));
}

#[tokio::test]
async fn create_activity_posts_due_date_and_returns_id() {
    let server = MockServer::start();
    let activity = server.mock(|when, then| {
        when.method(POST).path("/activities").json_body(json!({
            "subject": "Schedule initial site inspection",
            "type": "task",
            "due_date": "2024-05-01",
            "deal_id": 77
        }));
        then.status(201)
            .json_body(json!({ "success": true, "data": { "id": 1234 } }));
    });

    let id = client(&server)
        .create_activity(NewActivity {
            subject: "Schedule initial site inspection".into(),
            activity_type: "task".into(),
            due_date: NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
            deal_id: 77,
        })
        .await
        .expect("activity created");

    assert_eq!(id, "1234");
    assert_eq!(activity.calls(), 1);
}

#[tokio::test]
async fn unreachable_crm_is_an_error() {
    let config = CrmConfig {
        base_url: "http://127.0.0.1:9".into(),
        api_token: "pd-token".into(),
        timeout_seconds: 1,
        ..CrmConfig::default()
    };
    let client = PipedriveClient::new(&config).expect("client builds");

    let result = client.fetch_deal("1").await;
    assert!(matches!(result, Err(AppError::Crm(_))));
}
