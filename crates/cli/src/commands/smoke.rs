//! Smoke test a running API.
//!
//! Hits the public endpoints, checks that protected ones reject anonymous
//! callers and, given credentials, signs in and reads the caller's data.
//! Nothing is written.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

/// Smoke test failures.
#[derive(Debug, Error)]
pub enum SmokeError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Login did not return a token.
    #[error("Login failed with status {0}")]
    Login(StatusCode),

    /// Some checks failed.
    #[error("{failed} of {total} checks failed")]
    Failed { failed: usize, total: usize },
}

struct Runner {
    client: Client,
    base_url: String,
    passed: usize,
    failed: usize,
}

impl Runner {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and compare the status. Returns the body on a match.
    async fn check(&mut self, name: &str, request: RequestBuilder, expected: StatusCode) -> Option<Value> {
        match request.send().await {
            Ok(response) if response.status() == expected => {
                self.passed += 1;
                info!("  ok   {name} ({expected})");
                Some(response.json().await.unwrap_or(Value::Null))
            }
            Ok(response) => {
                self.failed += 1;
                error!("  FAIL {name}: expected {expected}, got {}", response.status());
                None
            }
            Err(e) => {
                self.failed += 1;
                error!("  FAIL {name}: {e}");
                None
            }
        }
    }

    async fn get(&mut self, name: &str, path: &str, expected: StatusCode) -> Option<Value> {
        let request = self.client.get(self.url(path));
        self.check(name, request, expected).await
    }

    async fn get_as(&mut self, name: &str, path: &str, token: &str) -> Option<Value> {
        let request = self.client.get(self.url(path)).bearer_auth(token);
        self.check(name, request, StatusCode::OK).await
    }
}

/// Run the smoke checks against `base_url`.
///
/// # Errors
///
/// Returns `SmokeError::Failed` if any check fails and `SmokeError::Login`
/// if the supplied credentials are rejected.
pub async fn run(base_url: &str, credentials: Option<&(String, String)>) -> Result<(), SmokeError> {
    let mut runner = Runner {
        client: Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?,
        base_url: base_url.trim_end_matches('/').to_owned(),
        passed: 0,
        failed: 0,
    };

    info!("Smoke testing {}", runner.base_url);

    runner.get("liveness", "/health", StatusCode::OK).await;
    runner.get("readiness", "/health/ready", StatusCode::OK).await;
    runner
        .get("openapi document", "/api-docs/openapi.json", StatusCode::OK)
        .await;
    runner
        .get("category tree", "/categories/tree", StatusCode::OK)
        .await;
    if let Some(body) = runner
        .get("product list", "/products?limit=5", StatusCode::OK)
        .await
    {
        let total = body["pagination"]["total"].as_i64().unwrap_or_default();
        info!("       {total} products listed");
    }
    runner
        .get("cart requires auth", "/cart", StatusCode::UNAUTHORIZED)
        .await;
    runner
        .get("unknown route", "/no-such-route", StatusCode::NOT_FOUND)
        .await;

    if let Some((email, password)) = credentials {
        let response = runner
            .client
            .post(runner.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let token = body["data"]["token"]
            .as_str()
            .filter(|_| status.is_success())
            .ok_or(SmokeError::Login(status))?
            .to_owned();
        runner.passed += 1;
        info!("  ok   login");

        runner.get_as("current user", "/auth/me", &token).await;
        runner.get_as("cart", "/cart", &token).await;
        runner.get_as("wishlist", "/wishlist", &token).await;
        runner.get_as("orders", "/orders", &token).await;
        runner
            .get_as("loyalty summary", "/loyalty/summary", &token)
            .await;
    }

    let total = runner.passed + runner.failed;
    info!("{} of {total} checks passed", runner.passed);
    if runner.failed > 0 {
        return Err(SmokeError::Failed {
            failed: runner.failed,
            total,
        });
    }
    Ok(())
}
