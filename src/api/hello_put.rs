#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::{Body, Request};
use poem_openapi::{ OpenApi, payload::PlainText, param::Path, ApiResponse };
use serde::Deserialize;
use log::error;

use crate::utils::db_types::UserInput;
use crate::utils::hello_utils::{self, RequestDebug};
use crate::utils::store::UserStore;

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct PutHelloApi {
    store: Arc<dyn UserStore>,
}

// The body is parsed as JSON whatever Content-Type the client sends.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReqPutHelloBody
{
    date_of_birth: String,
}

struct ReqPutHello
{
    name: String,
    date_of_birth: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqPutHello {
    type Req = ReqPutHello;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    name: ");
        s.push_str(&self.name);
        s.push_str("\n    dateOfBirth: ");
        s.push_str(&self.date_of_birth);
        s
    }
}

// ------------------- HTTP Status Codes -------------------
// Unreadable or unparsable bodies are server errors, not bad requests.
#[derive(Debug, ApiResponse)]
#[oai(bad_request_handler = "bad_request_handler")]
enum HelloResponse {
    #[oai(status = 204)]
    Http204,
    #[oai(status = 500)]
    Http500(PlainText<String>),
}

fn make_http_204() -> HelloResponse {
    HelloResponse::Http204
}
fn make_http_500(msg: &str) -> HelloResponse {
    HelloResponse::Http500(PlainText(msg.to_string()))
}

fn bad_request_handler(err: poem::Error) -> HelloResponse {
    error!("Can't extract request: {}", err);
    make_http_500("Can't unmarshal json")
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl PutHelloApi {
    #[oai(path = "/hello/:name", method = "put")]
    async fn put_hello_api(&self, http_req: &Request, name: Path<String>,
                           body: Body) -> HelloResponse {
        // Read and parse the raw body.
        let bytes = match body.into_vec().await {
            Ok(b) => b,
            Err(e) => {
                error!("{}: Can't read request body: {}", hello_utils::request_context(http_req), e);
                return make_http_500("Can't unmarshal json");
            }
        };
        let body: ReqPutHelloBody = match serde_json::from_slice(&bytes) {
            Ok(b) => b,
            Err(e) => {
                error!("{}: Can't unmarshal request body: {}", hello_utils::request_context(http_req), e);
                return make_http_500("Can't unmarshal json");
            }
        };

        // Package the request parameters.
        let req = ReqPutHello {name: name.0, date_of_birth: body.date_of_birth};

        // -------------------- Process Request ----------------------
        self.process(http_req, req).await
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl PutHelloApi {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        PutHelloApi {store}
    }

    /// Process the request.
    async fn process(&self, http_req: &Request, req: ReqPutHello) -> HelloResponse {
        // Conditional logging depending on log level.
        hello_utils::debug_request(http_req, &req);

        // Every write inserts a new record.
        let user = UserInput::new(req.name, req.date_of_birth);
        match self.store.save(&user).await {
            Ok(_) => make_http_204(),
            Err(e) => {
                error!("{}: Can't add user {} with error: {}",
                       hello_utils::request_context(http_req), user.name, e);
                make_http_500("Can't add user to db")
            }
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use poem::http::StatusCode;
    use serde_json::json;

    use crate::api::test_support::{test_client, ymd};
    use crate::utils::store::memory::MemoryStore;
    use crate::utils::store::UserStore;

    #[tokio::test]
    async fn put_stores_record_and_returns_no_content() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let cli = test_client(store.clone(), ymd(2024, 1, 1));

        let resp = cli.put("/hello/testuser")
            .body_json(&json!({"dateOfBirth": "2000-11-10"}))
            .send()
            .await;
        resp.assert_status(StatusCode::NO_CONTENT);
        resp.assert_text("").await;

        let user = store.find_by_name("testuser").await.expect("stored");
        assert_eq!(user.date_of_birth, "2000-11-10");
    }

    #[tokio::test]
    async fn put_twice_keeps_both_records() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let cli = test_client(store.clone(), ymd(2024, 1, 1));

        for dob in ["2000-11-10", "2001-12-11"] {
            cli.put("/hello/testuser")
                .body_json(&json!({"dateOfBirth": dob}))
                .send()
                .await
                .assert_status(StatusCode::NO_CONTENT);
        }
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn malformed_json_is_server_error_and_stores_nothing() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let cli = test_client(store.clone(), ymd(2024, 1, 1));

        let resp = cli.put("/hello/testuser")
            .content_type("application/json")
            .body("{\"dateOfBirth\": ")
            .send()
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        resp.assert_text("Can't unmarshal json").await;
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn put_without_content_type_is_stored() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let cli = test_client(store.clone(), ymd(2024, 1, 1));

        let resp = cli.put("/hello/testuser")
            .body(r#"{"dateOfBirth":"2000-11-10"}"#)
            .send()
            .await;
        resp.assert_status(StatusCode::NO_CONTENT);
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn put_with_form_content_type_is_parsed_as_json() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let cli = test_client(store.clone(), ymd(2024, 1, 1));

        let resp = cli.put("/hello/testuser")
            .content_type("application/x-www-form-urlencoded")
            .body(r#"{"dateOfBirth":"2000-11-10"}"#)
            .send()
            .await;
        resp.assert_status(StatusCode::NO_CONTENT);
        let user = store.find_by_name("testuser").await.expect("stored");
        assert_eq!(user.date_of_birth, "2000-11-10");
    }

    #[tokio::test]
    async fn missing_date_of_birth_is_server_error() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let cli = test_client(store.clone(), ymd(2024, 1, 1));

        let resp = cli.put("/hello/testuser")
            .body_json(&json!({"birthday": "2000-11-10"}))
            .send()
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_server_error() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.set_unreachable(true);
        let cli = test_client(store.clone(), ymd(2024, 1, 1));

        let resp = cli.put("/hello/testuser")
            .body_json(&json!({"dateOfBirth": "2000-11-10"}))
            .send()
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        resp.assert_text("Can't add user to db").await;
    }
}
