use reqwest::StatusCode;
use serde_json::{json, Value};

use wallets_api::app::{build_app, AppServices};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory backends, on an ephemeral port.
        let services = AppServices::in_memory().expect("failed to build services");
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn post(&self, path: &str, key: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(format!("{}{}", self.base_url, path)).json(&body);
        if let Some(key) = key {
            req = req.header("Idempotency-Key", key);
        }
        req.send().await.unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    async fn create_wallet(&self, name: &str) {
        let res = self
            .post("/wallet", Some(&format!("create-{name}")), json!({ "wallet_name": name }))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    async fn deposit(&self, name: &str, amount: i64, key: &str) -> reqwest::Response {
        self.post(
            "/deposit",
            Some(key),
            json!({ "wallet_name": name, "amount": amount.to_string() }),
        )
        .await
    }

    async fn balance(&self, name: &str) -> i64 {
        let res = self.get(&format!("/wallet/{name}")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["balance"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn().await;
    assert_eq!(server.get("/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_then_get_wallet() {
    let server = TestServer::spawn().await;

    let res = server
        .post("/wallet", Some("k-create"), json!({ "wallet_name": "alice" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "name": "alice", "balance": 0 }));

    let res = server.get("/wallet/alice").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "alice");
}

#[tokio::test]
async fn get_wallet_reports_current_balance() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;
    server.create_wallet("bob").await;
    server.deposit("alice", 70, "k-a1").await;
    server.deposit("alice", 30, "k-a2").await;
    server
        .post(
            "/transfer",
            Some("k-ab"),
            json!({ "wallet_name_from": "alice", "wallet_name_to": "bob", "amount": "25" }),
        )
        .await;

    let res = server.get("/wallet/alice").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "name": "alice", "balance": 75 }));
    assert_eq!(server.balance("bob").await, 25);
}

#[tokio::test]
async fn duplicate_wallet_under_new_key_conflicts() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;

    let res = server
        .post("/wallet", Some("another-key"), json!({ "wallet_name": "alice" }))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "already_exists");
}

#[tokio::test]
async fn unknown_wallet_is_not_found() {
    let server = TestServer::spawn().await;
    assert_eq!(server.get("/wallet/ghost").await.status(), StatusCode::NOT_FOUND);

    let res = server.deposit("ghost", 10, "k-ghost").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deposit_executes_once_then_reports_completed() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;

    let res = server.deposit("alice", 100, "k-dep").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "name": "alice", "balance": 100 }));

    let res = server.deposit("alice", 100, "k-dep").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.bytes().await.unwrap().is_empty());

    assert_eq!(server.balance("alice").await, 100);
}

#[tokio::test]
async fn retry_of_completed_key_ignores_the_body() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;
    assert_eq!(server.deposit("alice", 10, "k-once").await.status(), StatusCode::OK);

    let res = server
        .post("/deposit", Some("k-once"), json!({ "wallet_name": "alice", "amount": "oops" }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.bytes().await.unwrap().is_empty());
    assert_eq!(server.balance("alice").await, 10);
}

#[tokio::test]
async fn missing_key_is_reported_before_body_errors() {
    let server = TestServer::spawn().await;

    let res = server.post("/transfer", None, json!({ "amount": "nope" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "`Idempotency-Key` not found");
}

#[tokio::test]
async fn failed_deposit_does_not_burn_the_key() {
    let server = TestServer::spawn().await;

    // Wallet missing: fails and leaves the key unused.
    assert_eq!(server.deposit("late", 5, "k-late").await.status(), StatusCode::NOT_FOUND);

    server.create_wallet("late").await;
    assert_eq!(server.deposit("late", 5, "k-late").await.status(), StatusCode::OK);
    assert_eq!(server.balance("late").await, 5);
}

#[tokio::test]
async fn mutation_without_key_is_rejected() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;

    let res = server
        .post("/deposit", None, json!({ "wallet_name": "alice", "amount": "10" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "`Idempotency-Key` not found");
    assert_eq!(server.balance("alice").await, 0);
}

#[tokio::test]
async fn malformed_bodies_are_rejected_with_messages() {
    let server = TestServer::spawn().await;

    let cases = [
        (json!({ "wallet_name": "alice" }), "required `amount` not found"),
        (json!({ "wallet_name": "alice", "amount": "ten" }), "malformed `amount`"),
        (json!({ "wallet_name": "alice", "amount": "0" }), "`amount` should be greater than zero"),
        (json!({ "amount": "1" }), "required `wallet_name` not found"),
    ];
    for (body, message) in cases {
        let res = server.post("/deposit", Some("k"), body).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["message"], message);
    }
}

#[tokio::test]
async fn transfer_moves_funds_and_rejects_overdraft() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;
    server.create_wallet("bob").await;
    assert_eq!(server.deposit("alice", 100, "k-seed").await.status(), StatusCode::OK);

    let res = server
        .post(
            "/transfer",
            Some("k-t1"),
            json!({ "wallet_name_from": "alice", "wallet_name_to": "bob", "amount": "60" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["debit"]["amount"], -60);
    assert_eq!(body["credit"]["amount"], 60);
    assert_eq!(body["credit"]["meta"]["source"], "alice");

    let res = server
        .post(
            "/transfer",
            Some("k-t2"),
            json!({ "wallet_name_from": "alice", "wallet_name_to": "bob", "amount": "60" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);

    assert_eq!(server.balance("alice").await, 40);
    assert_eq!(server.balance("bob").await, 60);
}

#[tokio::test]
async fn transfer_to_self_is_rejected() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;

    let res = server
        .post(
            "/transfer",
            Some("k-self"),
            json!({ "wallet_name_from": "alice", "wallet_name_to": "alice", "amount": "1" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_renders_csv_and_json() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;
    server.create_wallet("bob").await;
    server.deposit("alice", 100, "k-1").await;
    server
        .post(
            "/transfer",
            Some("k-2"),
            json!({ "wallet_name_from": "alice", "wallet_name_to": "bob", "amount": "30" }),
        )
        .await;

    let res = server.get("/history/alice").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));
    let csv = res.text().await.unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "id,amount,direction,meta,time");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",100,deposit,"));
    assert!(lines[2].contains(",-30,transfer,"));

    let res = server.get("/history/alice?format=json&direction=transfer").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["meta"]["destination"], "bob");
}

#[tokio::test]
async fn history_pages_with_cursor_header() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;
    for i in 0..5 {
        server.deposit("alice", 1, &format!("k-{i}")).await;
    }

    let res = server.get("/history/alice?limit=2&format=json").await;
    let cursor = res.headers()["x-next-cursor"].to_str().unwrap().to_string();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
    assert_eq!(body["next_cursor"].to_string(), cursor);

    let mut seen = 2;
    let mut cursor = Some(cursor);
    while let Some(after) = cursor {
        let res = server
            .get(&format!("/history/alice?limit=2&format=json&offset_by_id={after}"))
            .await;
        cursor = res
            .headers()
            .get("x-next-cursor")
            .map(|v| v.to_str().unwrap().to_string());
        let body: Value = res.json().await.unwrap();
        seen += body["records"].as_array().unwrap().len();
    }
    assert_eq!(seen, 5);
}

#[tokio::test]
async fn history_rejects_inverted_dates() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;

    let res = server
        .get("/history/alice?start_date=2024-02-01&end_date=2024-01-01")
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["message"],
        "time bounds error; start date greater than end date"
    );
}

#[tokio::test]
async fn withdrawal_is_not_exposed() {
    let server = TestServer::spawn().await;
    let res = server
        .post("/withdrawal", Some("k"), json!({ "wallet_name": "alice", "amount": "1" }))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_is_not_allowed() {
    let server = TestServer::spawn().await;
    assert_eq!(server.get("/deposit").await.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn metrics_expose_latency_and_idempotency_outcomes() {
    let server = TestServer::spawn().await;
    server.create_wallet("alice").await;
    server.deposit("alice", 1, "k-m").await;
    server.deposit("alice", 1, "k-m").await;

    let res = server.get("/metrics").await;
    assert_eq!(res.status(), StatusCode::OK);
    let text = res.text().await.unwrap();
    assert!(text.contains("svc_wallets_processing_response_time_seconds"));
    assert!(text.contains(r#"route="/deposit""#));
    assert!(text.contains(r#"outcome="already_completed""#));
}
