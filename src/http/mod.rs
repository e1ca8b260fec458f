//! JSON-over-HTTP front end for [`LedgerService`].
//!
//! Every response uses one envelope: `{code, data, message}` on success and
//! `{code, message, data: null}` on failure.

pub mod dto;
pub mod errors;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::Extension;
use axum::extract::rejection::JsonRejection;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::application::LedgerService;

use dto::{
    BalanceChangeData, BalanceData, BalanceRequest, DepositRequest, TransactionsData,
    TransactionsRequest, TransferData, TransferRequest, WithdrawRequest, amount_to_cents,
};
use errors::{ApiError, json_success};

pub fn router(service: Arc<LedgerService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .route("/transfer", post(transfer))
        .route("/balance", post(balance))
        .route("/transactions", post(transactions))
        .layer(Extension(service))
}

/// Serve until ctrl-c.
pub async fn serve(service: Arc<LedgerService>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await
        .context("Server error")
}

async fn health() -> Response {
    json_success(serde_json::json!({ "status": "ok" }))
}

async fn deposit(
    Extension(service): Extension<Arc<LedgerService>>,
    body: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let amount = amount_to_cents(req.amount)?;
    let change = service.deposit(&req.user_id, amount).await?;
    Ok(json_success(BalanceChangeData::from(change)))
}

async fn withdraw(
    Extension(service): Extension<Arc<LedgerService>>,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let amount = amount_to_cents(req.amount)?;
    let change = service.withdraw(&req.user_id, amount).await?;
    Ok(json_success(BalanceChangeData::from(change)))
}

async fn transfer(
    Extension(service): Extension<Arc<LedgerService>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let amount = amount_to_cents(req.amount)?;
    let outcome = service
        .transfer(&req.sender_id, &req.receiver_id, amount)
        .await?;
    Ok(json_success(TransferData::from(outcome)))
}

async fn balance(
    Extension(service): Extension<Arc<LedgerService>>,
    body: Result<Json<BalanceRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let account = service.get_balance(&req.user_id).await?;
    Ok(json_success(BalanceData::from(account)))
}

async fn transactions(
    Extension(service): Extension<Arc<LedgerService>>,
    body: Result<Json<TransactionsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let history = service
        .transactions(&req.user_id, req.page, req.page_size)
        .await?;
    Ok(json_success(TransactionsData::from(history)))
}
