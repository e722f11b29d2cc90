//! HTTP sessions against a running API, for the `#[ignore]`d end-to-end tests.

use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("LOTUS_API_URL").unwrap_or_else(|_| "http://127.0.0.1:4000".to_string())
}

/// A unique lowercase suffix for slugs, SKUs and emails.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", id.get(..10).unwrap_or(&id))
}

/// Parse a money field, which the API sends as a decimal string.
#[must_use]
pub fn amount(value: &Value) -> f64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_f64())
        .unwrap_or(f64::NAN)
}

/// A signed-in user.
pub struct Session {
    client: Client,
    token: String,
    /// The user's id.
    pub user_id: i64,
}

#[allow(clippy::expect_used)]
impl Session {
    /// Register a throwaway customer.
    ///
    /// Each registration claims its own forwarded client address to stay
    /// clear of the `/auth` rate limit.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub async fn register() -> Self {
        let email = format!("{}@lotusmart.test", unique("e2e"));
        let body = json!({
            "email": email,
            "password": "correct-horse-battery",
            "fullName": "E2E Customer",
        });
        Self::authenticate("/auth/register", &body, StatusCode::CREATED).await
    }

    /// Log in as the admin seeded with
    /// `lotus-cli seed admin -e $LOTUS_ADMIN_EMAIL -p $LOTUS_ADMIN_PASSWORD`.
    ///
    /// # Panics
    ///
    /// Panics if the login fails.
    pub async fn admin() -> Self {
        let email = std::env::var("LOTUS_ADMIN_EMAIL")
            .unwrap_or_else(|_| "admin@lotusmart.test".to_string());
        let password = std::env::var("LOTUS_ADMIN_PASSWORD")
            .unwrap_or_else(|_| "e2e-admin-password".to_string());
        let body = json!({ "email": email, "password": password });
        Self::authenticate("/auth/login", &body, StatusCode::OK).await
    }

    async fn authenticate(path: &str, body: &Value, expected: StatusCode) -> Self {
        let client = Client::new();
        let [a, b, c, ..] = *Uuid::new_v4().as_bytes();
        let resp = client
            .post(format!("{}{path}", base_url()))
            .header("x-forwarded-for", format!("10.{a}.{b}.{c}"))
            .json(body)
            .send()
            .await
            .expect("Failed to reach auth endpoint");
        assert_eq!(resp.status(), expected, "{path}");

        let body: Value = resp.json().await.expect("Failed to read auth body");
        let token = body["data"]["token"]
            .as_str()
            .expect("token in auth response")
            .to_owned();
        let user_id = body["data"]["user"]["id"]
            .as_i64()
            .expect("user id in auth response");
        Self {
            client,
            token,
            user_id,
        }
    }

    /// Send a request and return the status with the JSON body
    /// (`Value::Null` when there is none).
    ///
    /// # Panics
    ///
    /// Panics if the server can't be reached.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> (StatusCode, Value) {
        let mut request = self
            .client
            .request(method, format!("{}{path}", base_url()))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send().await.expect("request failed");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, None).await
    }

    /// Create a category and return its JSON.
    ///
    /// # Panics
    ///
    /// Panics unless the API answers 201.
    pub async fn create_category(&self, name: &str, parent_id: Option<i64>) -> Value {
        let (status, body) = self
            .post(
                "/categories",
                &json!({ "name": name, "slug": unique("e2e-cat"), "parentId": parent_id }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    /// Create an active product and return its JSON.
    ///
    /// # Panics
    ///
    /// Panics unless the API answers 201.
    pub async fn create_product(&self, category_id: i64, price: &str, stock: i32) -> Value {
        let sku = unique("E2E").to_uppercase();
        let (status, body) = self
            .post(
                "/products",
                &json!({
                    "name": format!("Sản phẩm {sku}"),
                    "sku": sku,
                    "categoryId": category_id,
                    "price": price,
                    "stock": stock,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

/// A complete delivery address for checkout.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "recipientName": "Nguyễn Văn A",
        "phone": "0901234567",
        "street": "12 Lý Thường Kiệt",
        "ward": "Phường 7",
        "district": "Quận 10",
        "city": "Hồ Chí Minh",
    })
}
