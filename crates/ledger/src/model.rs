//! Wire types for the HTTP API

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{transactions, wallets};

/// Response envelope: exactly one of `data` / `error` is populated.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub currency: String,
    pub balance: Decimal,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<wallets::Model> for Wallet {
    fn from(value: wallets::Model) -> Self {
        Self {
            id: value.id,
            owner_id: value.owner_id,
            currency: value.currency,
            balance: value.balance,
            name: value.name,
            created_at: value.created_at,
            modified_at: value.modified_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_wallet_id: Option<Uuid>,
    pub target_wallet_id: Uuid,
    pub currency: String,
    pub sum: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<transactions::Model> for Transaction {
    fn from(value: transactions::Model) -> Self {
        Self {
            id: value.id,
            agent_wallet_id: value.from_wallet_id,
            target_wallet_id: value.to_wallet_id,
            currency: value.currency,
            sum: value.balance,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub owner_id: Uuid,
    pub currency: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletRequest {
    pub name: Option<String>,
    pub currency: Option<String>,
}

/// Balance-changing request. `id` is the caller-chosen idempotency key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub id: Uuid,
    pub agent_wallet_id: Option<Uuid>,
    pub target_wallet_id: Uuid,
    pub currency: String,
    pub sum: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub transaction_id: Uuid,
}

fn default_limit() -> u64 {
    10
}

/// Listing window, sort and filter for collection endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub sorting: Option<String>,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
            sorting: None,
            descending: false,
            filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_has_exactly_one_field() {
        let ok = serde_json::to_value(ApiResponse::data(42)).unwrap();
        assert_eq!(ok, serde_json::json!({"data": 42}));

        let err = serde_json::to_value(ApiResponse::<i32>::error("wallet not found")).unwrap();
        assert_eq!(err, serde_json::json!({"error": "wallet not found"}));
    }

    #[test]
    fn test_transaction_request_wire_shape() {
        let request: TransactionRequest = serde_json::from_value(serde_json::json!({
            "id": "7d9afb5c-3a3e-4f0a-9c26-9a16c9d1e9b3",
            "agentWalletId": "f2f9a1f6-52f1-4c6e-bb35-0935ddc36fd8",
            "targetWalletId": "a37d98c8-4de5-49e8-9a85-b5bd0c935f6d",
            "currency": "USD",
            "sum": 300.5
        }))
        .unwrap();

        assert!(request.agent_wallet_id.is_some());
        assert_eq!(request.currency, "USD");
        assert_eq!(request.sum, Decimal::new(3005, 1));
    }

    #[test]
    fn test_transaction_request_without_agent_wallet() {
        let request: TransactionRequest = serde_json::from_value(serde_json::json!({
            "id": "7d9afb5c-3a3e-4f0a-9c26-9a16c9d1e9b3",
            "targetWalletId": "a37d98c8-4de5-49e8-9a85-b5bd0c935f6d",
            "currency": "USD",
            "sum": 1000
        }))
        .unwrap();

        assert!(request.agent_wallet_id.is_none());
    }

    #[test]
    fn test_list_params_defaults() {
        let params: ListParams = serde_json::from_value(serde_json::json!({})).unwrap();

        assert_eq!(params.offset, 0);
        assert_eq!(params.limit, 10);
        assert!(params.sorting.is_none());
        assert!(!params.descending);
        assert!(params.filter.is_none());
    }
}
