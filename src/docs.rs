use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::requests::list_requests,
        routes::requests::list_by_requester,
        routes::requests::list_by_professor,
        routes::requests::get_request,
        routes::requests::create_request,
        routes::requests::update_request,
        routes::requests::update_request_status,
        routes::requests::delete_request,
        routes::request_types::list_request_types,
        routes::request_types::get_request_type,
        routes::request_types::create_request_type,
        routes::request_types::update_request_type,
        routes::request_types::delete_request_type,
        routes::accounts::list_accounts,
        routes::accounts::get_account,
        routes::accounts::update_flags,
    ),
    components(
        schemas(
            models::account::Account,
            models::account::AuthResponse,
            models::account::LoginRequest,
            models::account::RegisterRequest,
            models::account::FlagsUpdateRequest,
            models::request::RecommendationRequest,
            models::request::RequestCreateRequest,
            models::request::RequestUpdateRequest,
            models::request::RequestStatusUpdateRequest,
            models::request_type::RequestType,
            models::request_type::RequestTypeCreateRequest,
            models::request_type::RequestTypeUpdateRequest,
            routes::auth::MeResponse,
            routes::auth::MessageResponse,
            routes::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Requests", description = "Recommendation request tracking"),
        (name = "RequestTypes", description = "Request type catalog"),
        (name = "Accounts", description = "Admin account directory"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.servers = Some(vec![utoipa::openapi::ServerBuilder::new()
        .url(format!("http://localhost:{port}"))
        .build()]);
    doc
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(&doc).expect("OpenAPI serialization must succeed"));

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config))
}
