use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;
use crate::utils::decimal_json;
use crate::validation::parse_user_id;
use crate::AppState;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub success: bool,
    pub user_id: String,
    pub currency: String,
    #[schema(value_type = f64)]
    pub fiat_balance: Value,
    #[schema(value_type = Object)]
    pub crypto_balances: Value,
    pub updated_at: Option<String>,
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/balance",
    params(("user_id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Current fiat balance", body = BalanceResponse),
        (status = 400, description = "Invalid user id")
    ),
    tag = "Wallet"
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let balance = state.store.get_balance(user_id).await?;

    // A user without a balance row has simply never been credited.
    let response = match balance {
        Some(balance) => BalanceResponse {
            success: true,
            user_id: user_id.to_string(),
            currency: state.settings.currency.clone(),
            fiat_balance: decimal_json(&balance.fiat_balance),
            crypto_balances: balance.crypto_balances,
            updated_at: Some(balance.updated_at.to_rfc3339()),
        },
        None => BalanceResponse {
            success: true,
            user_id: user_id.to_string(),
            currency: state.settings.currency.clone(),
            fiat_balance: json!(0),
            crypto_balances: json!({}),
            updated_at: None,
        },
    };

    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/transactions",
    params(("user_id" = String, Path, description = "User UUID"), Pagination),
    responses(
        (status = 200, description = "Ledger entries, newest first"),
        (status = 400, description = "Invalid user id")
    ),
    tag = "Wallet"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let (limit, offset) = page.bounds();
    let entries = state.store.list_transactions(user_id, limit, offset).await?;

    let items: Vec<Value> = entries
        .iter()
        .map(|entry| {
            json!({
                "id": entry.id,
                "type": entry.transaction_type,
                "currency": entry.currency,
                "amount": decimal_json(&entry.amount),
                "status": entry.status,
                "description": entry.description,
                "reference": entry.reference,
                "created_at": entry.created_at.to_rfc3339(),
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "user_id": user_id,
        "limit": limit,
        "offset": offset,
        "transactions": items,
    })))
}
