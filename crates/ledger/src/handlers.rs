//! HTTP handlers for the wallet API

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::LedgerError;
use crate::model::{
    ApiResponse, CreateWalletRequest, ListParams, Transaction, TransactionRequest,
    TransferResponse, UpdateWalletRequest, Wallet,
};
use crate::server::AppState;

type HandlerResult = Result<Response, LedgerError>;

fn ok_response<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(ApiResponse::data(data))).into_response()
}

fn read_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, LedgerError> {
    body.map(|Json(request)| request)
        .map_err(|_| LedgerError::Validation("failed to read body".into()))
}

fn read_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, LedgerError> {
    path.map(|Path(id)| id)
        .map_err(|_| LedgerError::Validation("can't get id".into()))
}

fn read_params(
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<ListParams, LedgerError> {
    query
        .map(|Query(params)| params)
        .map_err(|_| LedgerError::Validation("error getting params".into()))
}

pub async fn create_wallet(
    State(state): State<AppState>,
    body: Result<Json<CreateWalletRequest>, JsonRejection>,
) -> HandlerResult {
    let request = read_body(body)?;

    let wallet = state.service.create_wallet(request).await?;

    debug!(wallet = %wallet.id, "created wallet");
    Ok(ok_response(StatusCode::CREATED, Wallet::from(wallet)))
}

pub async fn get_wallets(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> HandlerResult {
    let params = read_params(query)?;

    let wallets = state.service.list_wallets(principal, &params).await?;

    let wallets: Vec<Wallet> = wallets.into_iter().map(Wallet::from).collect();
    Ok(ok_response(StatusCode::OK, wallets))
}

pub async fn get_wallet_by_id(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let wallet_id = read_id(path)?;

    let wallet = state.service.get_wallet(principal, wallet_id).await?;

    Ok(ok_response(StatusCode::OK, Wallet::from(wallet)))
}

pub async fn update_wallet(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateWalletRequest>, JsonRejection>,
) -> HandlerResult {
    let wallet_id = read_id(path)?;
    let request = read_body(body)?;

    let wallet = state
        .service
        .update_wallet(principal, wallet_id, request)
        .await?;

    Ok(ok_response(StatusCode::OK, Wallet::from(wallet)))
}

pub async fn delete_wallet(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let wallet_id = read_id(path)?;

    state.service.delete_wallet(principal, wallet_id).await?;

    debug!(wallet = %wallet_id, "archived wallet");
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn deposit(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> HandlerResult {
    let request = read_body(body)?;

    if request.sum <= Decimal::ZERO {
        return Err(LedgerError::Precondition("sum must be positive".into()));
    }

    let transaction_id = state.service.external_transaction(principal, request).await?;

    Ok(ok_response(
        StatusCode::OK,
        TransferResponse { transaction_id },
    ))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> HandlerResult {
    let mut request = read_body(body)?;

    // The wire sum is positive; the ledger stores withdrawals negated.
    if request.sum <= Decimal::ZERO {
        return Err(LedgerError::Precondition("sum must be positive".into()));
    }
    request.sum = -request.sum;

    let transaction_id = state.service.external_transaction(principal, request).await?;

    Ok(ok_response(
        StatusCode::OK,
        TransferResponse { transaction_id },
    ))
}

pub async fn transfer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> HandlerResult {
    let request = read_body(body)?;

    let transaction_id = state.service.transfer(principal, request).await?;

    Ok(ok_response(
        StatusCode::OK,
        TransferResponse { transaction_id },
    ))
}

pub async fn get_transactions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> HandlerResult {
    let params = read_params(query)?;

    let transactions = state.service.list_transactions(principal, &params).await?;

    let transactions: Vec<Transaction> =
        transactions.into_iter().map(Transaction::from).collect();
    Ok(ok_response(StatusCode::OK, transactions))
}
