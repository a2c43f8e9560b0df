use axum::extract::Query;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::referral;

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ReferralCodeResponse {
    pub id: String,
    pub code: String,
}

/// Derive the shareable referral code for a numeric identifier.
pub async fn get_code(
    Query(params): Query<CodeQuery>,
) -> Result<Json<ReferralCodeResponse>, AppError> {
    let code = referral::encode(&params.id)?;
    Ok(Json(ReferralCodeResponse {
        id: params.id,
        code,
    }))
}

/// Resolve a referral code back to its numeric identifier.
pub async fn get_resolve(
    Query(params): Query<ResolveQuery>,
) -> Result<Json<ReferralCodeResponse>, AppError> {
    let id = referral::decode(&params.code)?;
    Ok(Json(ReferralCodeResponse {
        id,
        code: params.code,
    }))
}
