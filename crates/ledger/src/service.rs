//! Wallet service: composes the ledger store with the rate source
//!
//! This is the only component that touches both the store and the pricing
//! service. Amounts whose declared currency differs from a wallet's currency
//! are converted here, before the store applies them; the store itself only
//! ever sees wallet-local amounts.

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Principal;
use crate::entity::{transactions, wallets};
use crate::error::{LedgerError, Result};
use crate::model::{CreateWalletRequest, ListParams, TransactionRequest, UpdateWalletRequest};
use crate::rates::RateSource;
use crate::store::{LedgerStore, NewTransaction, TransferPlan, WalletProposal, WalletUpdate};

pub struct WalletService {
    store: Arc<LedgerStore>,
    rates: Arc<dyn RateSource>,
}

impl WalletService {
    pub fn new(store: Arc<LedgerStore>, rates: Arc<dyn RateSource>) -> Self {
        Self { store, rates }
    }

    pub async fn create_wallet(&self, request: CreateWalletRequest) -> Result<wallets::Model> {
        if request.name.trim().is_empty() {
            return Err(LedgerError::Precondition(
                "wallet name must not be empty".into(),
            ));
        }
        if request.currency.trim().is_empty() {
            return Err(LedgerError::Precondition("currency must not be empty".into()));
        }

        self.store
            .create_wallet(WalletProposal {
                owner_id: request.owner_id,
                currency: request.currency,
                name: request.name,
            })
            .await
    }

    /// Read a wallet. A wallet owned by someone else reads as not found so
    /// that existence is not disclosed across owners.
    pub async fn get_wallet(&self, caller: Principal, wallet_id: Uuid) -> Result<wallets::Model> {
        hide_not_allowed(self.store.get_wallet(wallet_id, caller).await)
    }

    pub async fn list_wallets(
        &self,
        caller: Principal,
        params: &ListParams,
    ) -> Result<Vec<wallets::Model>> {
        self.store.list_wallets(caller, params).await
    }

    /// Rename and/or re-denominate a wallet. When the currency changes, the
    /// conversion factor is resolved here and applied inside the same store
    /// transaction as the flip. Cross-owner updates surface as `not allowed`.
    pub async fn update_wallet(
        &self,
        caller: Principal,
        wallet_id: Uuid,
        request: UpdateWalletRequest,
    ) -> Result<wallets::Model> {
        let wallet = self.store.get_wallet(wallet_id, caller).await?;

        let conversion_rate = match &request.currency {
            Some(currency) if *currency != wallet.currency => {
                Some(self.rates.rate(&wallet.currency, currency).await?)
            }
            _ => None,
        };

        self.store
            .update_wallet(
                wallet_id,
                caller,
                WalletUpdate {
                    name: request.name,
                    currency: request.currency,
                    conversion_rate,
                },
            )
            .await
    }

    /// Archive a wallet. Follows the read rule: a wallet the caller cannot
    /// see cannot be deleted, and the attempt reads as not found.
    pub async fn delete_wallet(&self, caller: Principal, wallet_id: Uuid) -> Result<()> {
        hide_not_allowed(self.store.get_wallet(wallet_id, caller).await)?;
        self.store.delete_wallet(wallet_id).await
    }

    /// Move funds between two wallets. Both sides are converted
    /// independently from the declared currency, so the source is charged in
    /// source-currency and the target credited in target-currency.
    pub async fn transfer(&self, caller: Principal, request: TransactionRequest) -> Result<Uuid> {
        let source_id = request
            .agent_wallet_id
            .ok_or_else(|| LedgerError::Validation("agentWalletId is required".into()))?;

        if request.sum <= Decimal::ZERO {
            return Err(LedgerError::Precondition("sum must be positive".into()));
        }

        let source = hide_not_allowed(self.store.get_wallet(source_id, caller).await)?;
        let target =
            hide_not_allowed(self.store.get_wallet(request.target_wallet_id, caller).await)?;

        let withdraw_amount = self
            .localize(&request.currency, request.sum, &source.currency)
            .await?;
        let deposit_amount = self
            .localize(&request.currency, request.sum, &target.currency)
            .await?;

        let plan = TransferPlan {
            source_id: source.id,
            source_currency: source.currency,
            target_id: target.id,
            target_currency: target.currency,
            withdraw_amount,
            deposit_amount,
        };

        let record = NewTransaction {
            id: request.id,
            source: Some(plan.source_id),
            target: plan.target_id,
            currency: request.currency,
            sum: request.sum,
        };

        self.store.transfer(&plan, record).await
    }

    /// Deposit (`sum > 0`) or withdraw (`sum < 0`) external funds. The
    /// persisted record is always in the target wallet's currency.
    pub async fn external_transaction(
        &self,
        caller: Principal,
        request: TransactionRequest,
    ) -> Result<Uuid> {
        let target =
            hide_not_allowed(self.store.get_wallet(request.target_wallet_id, caller).await)?;

        let sum = self
            .localize(&request.currency, request.sum, &target.currency)
            .await?;

        let record = NewTransaction {
            id: request.id,
            source: None,
            target: target.id,
            currency: target.currency,
            sum,
        };

        self.store.external_transaction(record).await
    }

    pub async fn list_transactions(
        &self,
        caller: Principal,
        params: &ListParams,
    ) -> Result<Vec<transactions::Model>> {
        self.store.list_transactions(caller, params).await
    }

    /// Convert a declared-currency amount into a wallet-local one. No rate
    /// lookup is performed when the currencies already match.
    async fn localize(
        &self,
        declared: &str,
        sum: Decimal,
        wallet_currency: &str,
    ) -> Result<Decimal> {
        if declared == wallet_currency {
            return Ok(sum);
        }

        let factor = self.rates.rate(declared, wallet_currency).await?;
        Ok(sum * factor)
    }
}

fn hide_not_allowed<T>(result: Result<T>) -> Result<T> {
    result.map_err(|e| match e {
        LedgerError::NotAllowed => LedgerError::WalletNotFound,
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hide_not_allowed_masks_ownership() {
        let result: Result<()> = hide_not_allowed(Err(LedgerError::NotAllowed));
        assert!(matches!(result, Err(LedgerError::WalletNotFound)));
    }

    #[test]
    fn test_hide_not_allowed_keeps_other_errors() {
        let result: Result<()> = hide_not_allowed(Err(LedgerError::NotEnoughBalance));
        assert!(matches!(result, Err(LedgerError::NotEnoughBalance)));

        assert_eq!(hide_not_allowed(Ok(7)).unwrap(), 7);
    }
}
