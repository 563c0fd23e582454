use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, routing::post};
use chrono::{Duration as ChronoDuration, Utc};
use pinqueue_api::app::ApiAuth;
use pinqueue_api::app::services::AppServices;
use pinqueue_api::middleware::BearerAuth;
use pinqueue_api::signature::{self, ExtensionAuth};
use pinqueue_infra::{DispatchPolicy, HttpPinterestClient, PinterestConfig};
use reqwest::StatusCode;
use serde_json::{Value, json};

const CRON_SECRET: &str = "test-cron-secret";
const ADMIN_SECRET: &str = "test-admin-secret";
const EXTENSION_ID: &str = "ext-allowed";
const EXTENSION_SECRET: &str = "test-extension-secret";

fn extension_auth() -> ExtensionAuth {
    ExtensionAuth::new(vec![EXTENSION_ID.to_string()], EXTENSION_SECRET).unwrap()
}

struct TestServer {
    base_url: String,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

async fn serve(router: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

/// Pinterest stand-in: titles starting with "fail" get a 500, everything else is created.
fn mock_pinterest() -> Router {
    Router::new().route(
        "/v5/pins",
        post(|Json(body): Json<Value>| async move {
            let title = body["title"].as_str().unwrap_or_default().to_string();
            if title.starts_with("fail") {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "code": 2, "message": "upstream exploded" })),
                )
            } else {
                (
                    axum::http::StatusCode::CREATED,
                    Json(json!({ "id": format!("p-{title}") })),
                )
            }
        }),
    )
}

impl TestServer {
    async fn spawn() -> Self {
        let (pinterest_url, mock) = serve(mock_pinterest()).await;
        let api = HttpPinterestClient::new(PinterestConfig {
            api_base: format!("{pinterest_url}/v5"),
            timeout: Duration::from_secs(5),
            ..PinterestConfig::default()
        })
        .unwrap();
        let services = Arc::new(AppServices::in_memory(Arc::new(api), DispatchPolicy::default()));

        // Same router as prod, bound to an ephemeral port.
        let auth = ApiAuth {
            cron: BearerAuth::new("cron", CRON_SECRET),
            admin: BearerAuth::new("admin", ADMIN_SECRET),
            extension: extension_auth(),
        };
        let app = pinqueue_api::app::build_app(services, auth);
        let (base_url, handle) = serve(app).await;

        Self {
            base_url,
            handles: vec![mock, handle],
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Each test gets its own in-memory server, so a fixed id is enough.
fn user_id() -> String {
    "0190f0a0-0000-7000-8000-00000000abcd".to_string()
}

async fn link_account(client: &reqwest::Client, srv: &TestServer, user: &str) {
    let res = client
        .put(srv.url("/external/credentials"))
        .bearer_auth(ADMIN_SECRET)
        .json(&json!({
            "userId": user,
            "accessToken": "at-1",
            "refreshToken": "rt-1",
            "expiresIn": 3600
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn submit(client: &reqwest::Client, srv: &TestServer, body: Value) -> reqwest::Response {
    client
        .post(srv.url("/external/pins"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

fn pin(user: &str, title: &str) -> Value {
    json!({
        "userId": user,
        "boardId": "board-1",
        "title": title,
        "description": "A description",
        "imageUrl": "https://images.example.com/a.jpg",
        "link": "https://blog.example.com/post"
    })
}

async fn run_cron(client: &reqwest::Client, srv: &TestServer) -> Value {
    let res = client
        .post(srv.url("/cron/post-pins"))
        .bearer_auth(CRON_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn status(client: &reqwest::Client, srv: &TestServer, user: &str) -> Vec<Value> {
    let res = client
        .get(srv.url(&format!("/external/status?userId={user}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["pins"].as_array().unwrap().clone()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn cron_requires_secret() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.post(srv.url("/cron/post-pins")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = client
        .post(srv.url("/cron/post-pins"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(srv.url("/cron/post-pins")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn submitted_pin_is_posted_by_cron_run() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = user_id();
    link_account(&client, &srv, &user).await;

    let res = submit(&client, &srv, pin(&user, "autumn")).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["success"], true);
    let pin_id = created["pinId"].as_str().unwrap().to_string();

    let report = run_cron(&client, &srv).await;
    assert_eq!(report["success"], true);
    assert_eq!(report["processedCount"], 1);
    assert_eq!(report["results"][0]["entryId"], pin_id.as_str());
    assert_eq!(report["results"][0]["success"], true);
    assert_eq!(report["results"][0]["externalPinId"], "p-autumn");

    let pins = status(&client, &srv, &user).await;
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0]["posted"], true);
    assert_eq!(pins[0]["state"], "posted");
    assert!(pins[0]["postedAt"].is_string());
    assert!(pins[0]["errorMessage"].is_null());

    // Nothing left to do on the next run.
    let again = run_cron(&client, &srv).await;
    assert_eq!(again["processedCount"], 0);

    // Posted pins cannot be deleted.
    let res = client
        .delete(srv.url(&format!("/external/pins/{pin_id}?userId={user}")))
        .bearer_auth(ADMIN_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upstream_failure_is_recorded_as_retry() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = user_id();
    link_account(&client, &srv, &user).await;

    submit(&client, &srv, pin(&user, "fail-once")).await;
    let report = run_cron(&client, &srv).await;
    assert_eq!(report["results"][0]["success"], false);
    assert!(
        report["results"][0]["errorText"]
            .as_str()
            .unwrap()
            .contains("upstream exploded")
    );

    let pins = status(&client, &srv, &user).await;
    assert_eq!(pins[0]["retryCount"], 1);
    assert_eq!(pins[0]["posted"], false);
    assert_eq!(pins[0]["state"], "retrying");

    // Two more failures exhaust the entry; afterwards it is never selected.
    run_cron(&client, &srv).await;
    run_cron(&client, &srv).await;
    let pins = status(&client, &srv, &user).await;
    assert_eq!(pins[0]["retryCount"], 3);
    assert_eq!(pins[0]["state"], "exhausted");
    assert_eq!(run_cron(&client, &srv).await["processedCount"], 0);
}

#[tokio::test]
async fn submission_is_validated() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = user_id();

    // No linked account.
    let res = submit(&client, &srv, pin(&user, "hello")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    link_account(&client, &srv, &user).await;

    let res = submit(&client, &srv, pin(&user, &"x".repeat(101))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let mut bad_url = pin(&user, "ok");
    bad_url["imageUrl"] = json!("not-a-url");
    let res = submit(&client, &srv, bad_url).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = submit(&client, &srv, pin("not-a-uuid", "ok")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn queue_lists_newest_first_with_pagination() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = user_id();
    link_account(&client, &srv, &user).await;

    for i in 1..=3 {
        let mut body = pin(&user, &format!("later-{i}"));
        body["scheduledAt"] = json!((Utc::now() + ChronoDuration::days(i)).to_rfc3339());
        assert_eq!(submit(&client, &srv, body).await.status(), StatusCode::CREATED);
    }

    let res = client
        .get(srv.url(&format!("/external/queue?userId={user}&page=1&limit=2")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["pagination"], json!({ "page": 1, "limit": 2, "total": 3, "pages": 2 }));
    let titles: Vec<&str> = body["pins"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["later-3", "later-2"]);

    let res = client
        .get(srv.url(&format!("/external/queue?userId={user}&status=posted")))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["pagination"]["total"], 0);

    // Future pins are not touched by a run.
    assert_eq!(run_cron(&client, &srv).await["processedCount"], 0);

    let res = client
        .get(srv.url(&format!("/external/queue?userId={user}&status=stuck")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_pin_can_be_deleted_by_owner_only() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = user_id();
    link_account(&client, &srv, &user).await;

    let mut body = pin(&user, "tomorrow");
    body["scheduledAt"] = json!((Utc::now() + ChronoDuration::days(1)).to_rfc3339());
    let created: Value = submit(&client, &srv, body).await.json().await.unwrap();
    let pin_id = created["pinId"].as_str().unwrap().to_string();

    let stranger = "0190f0a0-0000-7000-8000-000000000001";
    let res = client
        .delete(srv.url(&format!("/external/pins/{pin_id}?userId={stranger}")))
        .bearer_auth(ADMIN_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .delete(srv.url(&format!("/external/pins/{pin_id}?userId={user}")))
        .bearer_auth(ADMIN_SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(status(&client, &srv, &user).await.is_empty());
}

#[tokio::test]
async fn credential_linking_and_deletes_require_admin_secret() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = user_id();
    let credentials = json!({ "userId": user, "accessToken": "stolen" });

    let res = client
        .put(srv.url("/external/credentials"))
        .json(&credentials)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .put(srv.url("/external/credentials"))
        .bearer_auth(CRON_SECRET)
        .json(&credentials)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Nothing was linked by the rejected calls.
    assert_eq!(submit(&client, &srv, pin(&user, "hello")).await.status(), StatusCode::NOT_FOUND);

    link_account(&client, &srv, &user).await;
    let created: Value = submit(&client, &srv, pin(&user, "keep")).await.json().await.unwrap();
    let pin_id = created["pinId"].as_str().unwrap().to_string();

    let res = client
        .delete(srv.url(&format!("/external/pins/{pin_id}?userId={user}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(status(&client, &srv, &user).await.len(), 1);
}

#[tokio::test]
async fn credential_lifetime_out_of_range_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .put(srv.url("/external/credentials"))
        .bearer_auth(ADMIN_SECRET)
        .json(&json!({
            "userId": user_id(),
            "accessToken": "at-1",
            "expiresIn": 20_000_000_000_000i64
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // The server is still serving.
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

fn signed_pin(user: &str, title: &str, extension_id: &str) -> Value {
    let mut body = pin(user, title);
    let payload = signature::submission_payload(
        extension_id,
        user,
        "board-1",
        title,
        "https://images.example.com/a.jpg",
    );
    body["extensionId"] = json!(extension_id);
    body["signature"] = json!(extension_auth().sign(&payload));
    body
}

async fn submit_from_extension(
    client: &reqwest::Client,
    srv: &TestServer,
    body: Value,
) -> reqwest::Response {
    client
        .post(srv.url("/chrome-extension/pins"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn extension_submission_is_signed_and_queued() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = user_id();
    link_account(&client, &srv, &user).await;

    let res = submit_from_extension(&client, &srv, signed_pin(&user, "clipped", EXTENSION_ID)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    let pin_id = created["pinId"].as_str().unwrap().to_string();

    let payload = signature::status_payload(EXTENSION_ID, &user, Some(&pin_id));
    let sig = extension_auth().sign(&payload);
    let res = client
        .get(srv.url(&format!(
            "/chrome-extension/status?extensionId={EXTENSION_ID}&userId={user}&pinId={pin_id}&signature={sig}"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["pins"].as_array().unwrap().len(), 1);
    assert_eq!(body["pins"][0]["title"], "clipped");

    let report = run_cron(&client, &srv).await;
    assert_eq!(report["results"][0]["externalPinId"], "p-clipped");
}

#[tokio::test]
async fn extension_requests_with_bad_signature_or_unknown_id_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = user_id();
    link_account(&client, &srv, &user).await;

    // Signature over a different title.
    let mut tampered = signed_pin(&user, "original", EXTENSION_ID);
    tampered["title"] = json!("tampered");
    let res = submit_from_extension(&client, &srv, tampered).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Invalid signature");

    let res = submit_from_extension(&client, &srv, signed_pin(&user, "x", "ext-unknown")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Extension not authorized");

    let res = client
        .get(srv.url(&format!(
            "/chrome-extension/status?extensionId={EXTENSION_ID}&userId={user}&signature=deadbeef"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    assert!(status(&client, &srv, &user).await.is_empty());
}
