#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object, param::Path, ApiResponse };
use log::{debug, error, info};

use crate::utils::errors::StoreError;
use crate::utils::greeting::{self, GreetingMode};
use crate::utils::hello_utils::{self, Clock, RequestDebug};
use crate::utils::store::UserStore;

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct GetHelloApi {
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    mode: GreetingMode,
}

struct ReqGetHello
{
    name: String,
}

#[derive(Object, Debug)]
pub struct RespGetHello
{
    message: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqGetHello {
    type Req = ReqGetHello;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request parameters:");
        s.push_str("\n    name: ");
        s.push_str(&self.name);
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum HelloResponse {
    #[oai(status = 200)]
    Http200(Json<RespGetHello>),
    #[oai(status = 404)]
    Http404,
}

fn make_http_200(resp: RespGetHello) -> HelloResponse {
    HelloResponse::Http200(Json(resp))
}
fn make_http_404() -> HelloResponse {
    HelloResponse::Http404
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl GetHelloApi {
    #[oai(path = "/hello/:name", method = "get")]
    async fn get_hello_api(&self, http_req: &Request, name: Path<String>) -> HelloResponse {
        // Package the request parameters.
        let req = ReqGetHello {name: name.0};

        // -------------------- Process Request ----------------------
        self.process(http_req, &req).await
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl GetHelloApi {
    pub fn new(store: Arc<dyn UserStore>, clock: Arc<dyn Clock>, mode: GreetingMode) -> Self {
        GetHelloApi {store, clock, mode}
    }

    /// Process the request.
    async fn process(&self, http_req: &Request, req: &ReqGetHello) -> HelloResponse {
        // Conditional logging depending on log level.
        hello_utils::debug_request(http_req, req);

        // Any failure to retrieve the user is reported as not found.
        let user = match self.store.find_by_name(&req.name).await {
            Ok(u) => u,
            Err(StoreError::NotFound(_)) => {
                info!("{}: Can't get user: {}", hello_utils::request_context(http_req), req.name);
                return make_http_404();
            }
            Err(e) => {
                error!("{}: Can't get user {}: {}", hello_utils::request_context(http_req), req.name, e);
                return make_http_404();
            }
        };

        debug!("{}: Greeting user {} (id {}).", hello_utils::request_context(http_req), user.name, user.id);
        let message = greeting::greet(&user.name, &user.date_of_birth, self.clock.today(), self.mode);
        make_http_200(RespGetHello {message})
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use poem::http::StatusCode;
    use serde_json::json;

    use crate::api::test_support::{test_client, test_client_with_mode, ymd};
    use crate::utils::db_types::UserInput;
    use crate::utils::greeting::GreetingMode;
    use crate::utils::store::memory::MemoryStore;
    use crate::utils::store::UserStore;

    async fn store_with(name: &str, dob: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.save(&UserInput::new(name.to_string(), dob.to_string())).await.expect("save");
        store
    }

    #[tokio::test]
    async fn put_then_get_on_birthday() {
        let store = Arc::new(MemoryStore::new());
        let cli = test_client(store, ymd(2024, 3, 10));

        cli.put("/hello/testuser")
            .body_json(&json!({"dateOfBirth": "2000-11-10"}))
            .send()
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let resp = cli.get("/hello/testuser").send().await;
        resp.assert_status_is_ok();
        resp.assert_text(r#"{"message":"Hello, testuser! Happy Birthday!"}"#).await;
    }

    #[tokio::test]
    async fn five_days_greeting() {
        let cli = test_client(store_with("ann", "1990-07-04").await, ymd(2024, 2, 9));
        let resp = cli.get("/hello/ann").send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"message": "Hello, ann! Your birthday in 5 days"})).await;
    }

    #[tokio::test]
    async fn plain_greeting() {
        let cli = test_client(store_with("ann", "1990-07-04").await, ymd(2024, 7, 5));
        let resp = cli.get("/hello/ann").send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"message": "Hello, ann!"})).await;
    }

    #[tokio::test]
    async fn unparsable_stored_date_gives_plain_greeting() {
        let cli = test_client(store_with("eve", "10/11/2000").await, ymd(2024, 1, 10));
        let resp = cli.get("/hello/eve").send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"message": "Hello, eve!"})).await;
    }

    #[tokio::test]
    async fn unknown_user_is_not_found_without_body() {
        let cli = test_client(Arc::new(MemoryStore::new()), ymd(2024, 1, 1));
        let resp = cli.get("/hello/nobody").send().await;
        resp.assert_status(StatusCode::NOT_FOUND);
        resp.assert_text("").await;
    }

    #[tokio::test]
    async fn store_failure_is_not_found() {
        let store = store_with("ann", "1990-07-04").await;
        store.set_unreachable(true);
        let cli = test_client(store, ymd(2024, 7, 4));
        let resp = cli.get("/hello/ann").send().await;
        resp.assert_status(StatusCode::NOT_FOUND);
        resp.assert_text("").await;
    }

    #[tokio::test]
    async fn calendar_mode_checks_month() {
        let store = store_with("testuser", "2000-11-10").await;
        let cli = test_client_with_mode(store, ymd(2024, 3, 10), GreetingMode::Calendar);
        let resp = cli.get("/hello/testuser").send().await;
        resp.assert_status_is_ok();
        resp.assert_json(json!({"message": "Hello, testuser!"})).await;
    }
}
