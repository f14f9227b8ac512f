#![forbid(unsafe_code)]

use std::sync::Arc;

use poem::{Endpoint, EndpointExt, Route};
use poem_openapi::OpenApiService;

use crate::utils::greeting::GreetingMode;
use crate::utils::hello_utils::{log_request, Clock};
use crate::utils::store::UserStore;

use self::health::HealthApi;
use self::hello_get::GetHelloApi;
use self::hello_put::PutHelloApi;
use self::version::{VersionApi, SERVER_VERSION};

pub mod health;
pub mod hello_get;
pub mod hello_put;
pub mod version;

// ---------------------------------------------------------------------------
// make_app:
// ---------------------------------------------------------------------------
/** Assemble every endpoint around a single shared store.  The OpenAPI
 * document is served at /spec and /spec_yaml, the Swagger UI at /docs.
 */
pub fn make_app(store: Arc<dyn UserStore>, clock: Arc<dyn Clock>, mode: GreetingMode,
                title: &str, server_url: &str) -> impl Endpoint {
    let endpoints = (
        PutHelloApi::new(store.clone()),
        GetHelloApi::new(store.clone(), clock, mode),
        HealthApi::new(store),
        VersionApi,
    );
    let api_service =
        OpenApiService::new(endpoints, title, SERVER_VERSION).server(server_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let ui = api_service.swagger_ui();

    Route::new()
        .nest("/docs", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml)
        .nest("/", api_service)
        .around(log_request)
}
