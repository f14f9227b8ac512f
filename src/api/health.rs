#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::Request;
use poem_openapi::{ OpenApi, payload::Json, Object, ApiResponse };
use log::error;

use crate::utils::hello_utils;
use crate::utils::store::UserStore;

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct HealthApi {
    store: Arc<dyn UserStore>,
}

#[derive(Object, Debug)]
pub struct RespHealth
{
    alive: bool,
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum HealthResponse {
    #[oai(status = 200)]
    Http200(Json<RespHealth>),
    #[oai(status = 500)]
    Http500(Json<RespHealth>),
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl HealthApi {
    #[oai(path = "/health", method = "get")]
    async fn get_health_api(&self, http_req: &Request) -> HealthResponse {
        match self.store.ping().await {
            Ok(_) => HealthResponse::Http200(Json(RespHealth {alive: true})),
            Err(e) => {
                error!("{}: Cannot ping the db: {}", hello_utils::request_context(http_req), e);
                HealthResponse::Http500(Json(RespHealth {alive: false}))
            }
        }
    }
}

impl HealthApi {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        HealthApi {store}
    }
}
