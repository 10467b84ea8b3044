use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::wallet_auth::WalletAuthError;
use crate::{responses::ApiError, AppState};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminWallets {
    pub admin_wallets: Vec<String>,
}

/// Configured admin wallet list; only exposed in debug mode.
#[utoipa::path(
    get,
    path = "/admin/check-wallet",
    tag = "Admin",
    responses((status = 200, body = AdminWallets), (status = 403, description = "Not available outside debug mode"))
)]
pub async fn check_wallet(State(state): State<AppState>) -> Result<Json<AdminWallets>, ApiError> {
    if !state.admin().debug {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "not_available",
            "Not available outside debug mode",
        ));
    }
    Ok(Json(AdminWallets {
        admin_wallets: state.admin().wallets.clone(),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub message: String,
    /// Detached ed25519 signature as a byte array.
    pub signature: Vec<u8>,
    /// Base58 wallet public key.
    pub public_key: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub token: String,
    pub expires_in: u64,
}

/// Exchange an admin wallet signature for a session token.
#[utoipa::path(
    post,
    path = "/admin/verify",
    tag = "Admin",
    request_body = VerifyRequest,
    responses(
        (status = 200, body = VerifyResponse),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Not an admin wallet or signature mismatch")
    )
)]
pub async fn verify_wallet(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::bad_request("invalid_request"))?;
    let sessions = state.sessions();
    match sessions.sign_in(
        &state.admin().wallets,
        &req.public_key,
        &req.message,
        &req.signature,
    ) {
        Ok(token) => {
            info!(wallet = %req.public_key, "admin wallet signed in");
            Ok(Json(VerifyResponse {
                token,
                expires_in: sessions.ttl().as_secs(),
            }))
        }
        Err(WalletAuthError::NotAdmin) => {
            warn!(wallet = %req.public_key, "sign-in attempt from non-admin wallet");
            Err(ApiError::unauthorized())
        }
        Err(err) => {
            warn!(wallet = %req.public_key, "admin sign-in rejected: {}", err);
            Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                "Invalid Signature",
            ))
        }
    }
}
