use utoipa::{OpenApi, ToSchema};

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct HealthOk {
    pub ok: bool,
}

#[allow(dead_code)]
#[derive(ToSchema)]
pub struct AboutResponse {
    pub service: String,
    pub version: String,
    pub recent_limit: usize,
    #[schema(example = json!(["GET /healthz", "POST /chat"]))]
    pub endpoints: Vec<String>,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "veda-server", description = "Chat ledger service"),
    paths(
        crate::api::meta::healthz,
        crate::api::meta::about,
        crate::api::spec::openapi_json,
        crate::api::chat::chat_post,
        crate::api::messages::messages_get,
        crate::api::messages::messages_post,
        crate::api::archive::clear_chat,
        crate::api::archive::archives_truncate,
        crate::api::archive::archives_list,
        crate::api::archive::archive_get,
        crate::api::counter::counter_get,
        crate::api::counter::counter_post,
        crate::api::admin::check_wallet,
        crate::api::admin::verify_wallet,
    ),
    components(schemas(
        HealthOk,
        AboutResponse,
        crate::api::chat::ChatRequest,
        crate::api::chat::ChatResponse,
        crate::api::messages::MessagesResponse,
        crate::api::messages::AppendRequest,
        crate::api::messages::AppendResponse,
        crate::api::archive::ClearChatResponse,
        crate::api::archive::TruncateRequest,
        crate::api::archive::TruncateResponse,
        crate::api::archive::ArchivesResponse,
        crate::api::counter::CounterResponse,
        crate::api::admin::AdminWallets,
        crate::api::admin::VerifyRequest,
        crate::api::admin::VerifyResponse,
    )),
    tags(
        (name = "Meta"),
        (name = "Chat"),
        (name = "Messages"),
        (name = "Archives"),
        (name = "Counter"),
        (name = "Admin"),
        (name = "Specs")
    )
)]
pub struct ApiDoc;
