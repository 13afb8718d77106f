use checkdesk::checklist::{Manifest, TaskStatus};
use checkdesk::store::{RemoteStore, StoreError, SupabaseClient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetch_statuses_sends_keys_and_skips_malformed_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/checklist_state"))
        .and(query_param("select", "task_id,status"))
        .and(header("apikey", "service-key"))
        .and(header("Authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "task_id": "auth-login", "status": "done" },
            { "task_id": "auth-reset", "status": "blocked" },
            { "status": "doing" },
            { "task_id": "billing-plans", "status": "doing" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&server.uri(), "service-key");
    let statuses = client.fetch_statuses().await.unwrap();

    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses["auth-login"], TaskStatus::Done);
    assert_eq!(statuses["billing-plans"], TaskStatus::Doing);
}

#[tokio::test]
async fn upsert_status_merges_on_task_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/checklist_state"))
        .and(query_param("on_conflict", "task_id"))
        .and(header("Prefer", "resolution=merge-duplicates,return=minimal"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&server.uri(), "key");
    client.upsert_status("auth-login", TaskStatus::Doing).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["task_id"], "auth-login");
    assert_eq!(body["status"], "doing");
}

#[tokio::test]
async fn ensure_tasks_ignores_duplicates() {
    let server = MockServer::start().await;
    let manifest = Manifest::from_yaml(
        r#"
tasks:
  - { id: "a", label: "Alpha", category: "One", priority: high }
"#,
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/rest/v1/checklist_tasks"))
        .and(query_param("on_conflict", "id"))
        .and(header("Prefer", "resolution=ignore-duplicates,return=minimal"))
        .and(body_json(json!([{ "id": "a", "label": "Alpha", "category": "One" }])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&server.uri(), "key");
    client.ensure_tasks(&manifest.tasks).await.unwrap();
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/checklist_state"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&server.uri(), "key");
    match client.fetch_statuses().await {
        Err(StoreError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected status error, got {:?}", other.map(|m| m.len())),
    }
}

#[tokio::test]
async fn assignment_filters_are_encoded() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/checklist_tasks"))
        .and(query_param("assigned_to", "eq.ana b"))
        .and(body_json(json!({ "assigned_to": null })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&server.uri(), "key");
    client.clear_assignments_to("ana b").await.unwrap();
}

#[tokio::test]
async fn fetch_assignments_reports_unassigned_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/checklist_tasks"))
        .and(query_param("select", "id,assigned_to"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "auth-login", "assigned_to": "ana" },
            { "id": "auth-reset", "assigned_to": null },
            { "id": "billing-plans" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&server.uri(), "key");
    let assignments = client.fetch_assignments().await.unwrap();

    assert_eq!(assignments.len(), 3);
    assert_eq!(assignments["auth-login"].as_deref(), Some("ana"));
    assert_eq!(assignments["auth-reset"], None);
    assert_eq!(assignments["billing-plans"], None);
}

#[tokio::test]
async fn replace_repo_deletes_then_inserts() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/project_repo"))
        .and(query_param("id", "neq.00000000-0000-0000-0000-000000000000"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/project_repo"))
        .and(body_json(json!({
            "repo_url": "https://github.com/acme/desk",
            "owner": "acme",
            "repo_name": "desk"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&server.uri(), "key");
    let repo = checkdesk::repository::RepoConfig {
        repo_url: "https://github.com/acme/desk".into(),
        owner: "acme".into(),
        repo_name: "desk".into(),
    };
    client.replace_repo(&repo).await.unwrap();
}
