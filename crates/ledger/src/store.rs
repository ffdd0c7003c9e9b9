//! Transactional ledger store
//!
//! Every balance movement runs inside one short database transaction. Balance
//! changes are expressed as relative deltas (`balance = balance + $1`) rather
//! than absolute writes so concurrent transfers serialize on row locks, and
//! the `CHECK (balance >= 0)` constraint is the backstop against overdraft.
//! The `RETURNING currency` on each delta detects a concurrent
//! re-denomination of the wallet mid-transaction.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseBackend, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::Database;
use crate::entity::{transactions, users, wallets};
use crate::error::{LedgerError, Result};
use crate::model::ListParams;

/// Proposal for a new wallet.
#[derive(Debug, Clone)]
pub struct WalletProposal {
    pub owner_id: Uuid,
    pub currency: String,
    pub name: String,
}

/// Field updates for an existing wallet. `conversion_rate` must be present
/// whenever `currency` differs from the stored one; the balance is
/// re-materialized inside the same transaction as the currency flip.
#[derive(Debug, Clone, Default)]
pub struct WalletUpdate {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub conversion_rate: Option<Decimal>,
}

/// Pre-computed transfer: both amounts are already wallet-local.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub source_id: Uuid,
    pub source_currency: String,
    pub target_id: Uuid,
    pub target_currency: String,
    pub withdraw_amount: Decimal,
    pub deposit_amount: Decimal,
}

/// Transaction record to persist. `id` is the caller-supplied idempotency
/// key; a null `source` marks an external deposit or withdrawal.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: Uuid,
    pub source: Option<Uuid>,
    pub target: Uuid,
    pub currency: String,
    pub sum: Decimal,
}

/// Persistent store for users, wallets and transactions.
pub struct LedgerStore {
    db: Database,
}

const BALANCE_DELTA_SQL: &str = "UPDATE wallets \
     SET balance = balance + $1, modified_at = $2 \
     WHERE id = $3 AND is_disabled = false \
     RETURNING currency";

const ARCHIVE_INACTIVE_SQL: &str = "UPDATE wallets \
     SET is_disabled = true, modified_at = $1 \
     WHERE is_disabled = false AND modified_at < $2 \
     RETURNING id";

impl LedgerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn create_user(&self, email: &str) -> Result<users::Model> {
        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            registered_at: Set(Utc::now()),
        };

        Ok(user.insert(self.db.connection()).await?)
    }

    /// Create a wallet with a zero balance. Name uniqueness per owner among
    /// non-archived wallets is pre-checked; a concurrent create racing past
    /// the pre-check is caught by the partial unique index.
    pub async fn create_wallet(&self, proposal: WalletProposal) -> Result<wallets::Model> {
        if proposal.owner_id.is_nil() {
            return Err(LedgerError::NilIdentity);
        }

        let conn = self.db.connection();

        let name_taken = wallets::Entity::find()
            .filter(wallets::Column::OwnerId.eq(proposal.owner_id))
            .filter(wallets::Column::Name.eq(proposal.name.clone()))
            .filter(wallets::Column::IsDisabled.eq(false))
            .one(conn)
            .await?
            .is_some();
        if name_taken {
            return Err(LedgerError::DuplicateWallet);
        }

        let now = Utc::now();
        let wallet = wallets::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(proposal.owner_id),
            currency: Set(proposal.currency),
            balance: Set(Decimal::ZERO),
            name: Set(proposal.name),
            is_disabled: Set(false),
            created_at: Set(now),
            modified_at: Set(now),
        };

        wallet.insert(conn).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => LedgerError::UserNotFound,
            Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::DuplicateWallet,
            _ => LedgerError::Database(e),
        })
    }

    /// Read a non-archived wallet. Absent or archived rows are not found;
    /// rows owned by someone else are not allowed (the service decides how
    /// much of that to disclose).
    pub async fn get_wallet(&self, wallet_id: Uuid, caller: Principal) -> Result<wallets::Model> {
        let wallet = wallets::Entity::find_by_id(wallet_id)
            .filter(wallets::Column::IsDisabled.eq(false))
            .one(self.db.connection())
            .await?
            .ok_or(LedgerError::WalletNotFound)?;

        if wallet.owner_id != caller.0 {
            return Err(LedgerError::NotAllowed);
        }

        Ok(wallet)
    }

    /// List the caller's non-archived wallets. Never fails on emptiness.
    pub async fn list_wallets(
        &self,
        caller: Principal,
        params: &ListParams,
    ) -> Result<Vec<wallets::Model>> {
        let mut query = wallets::Entity::find()
            .filter(wallets::Column::OwnerId.eq(caller.0))
            .filter(wallets::Column::IsDisabled.eq(false));

        if let Some(filter) = &params.filter {
            query = query.filter(wallets::Column::Name.contains(filter.as_str()));
        }

        if let Some(sorting) = &params.sorting {
            let column = wallet_sort_column(sorting)?;
            query = if params.descending {
                query.order_by_desc(column)
            } else {
                query.order_by_asc(column)
            };
        }

        Ok(query
            .offset(params.offset)
            .limit(params.limit)
            .all(self.db.connection())
            .await?)
    }

    /// Apply a rename and/or a currency flip atomically. The caller must have
    /// been authorized already against the current wallet state; ownership is
    /// re-checked here because the read is repeated inside this call.
    pub async fn update_wallet(
        &self,
        wallet_id: Uuid,
        caller: Principal,
        update: WalletUpdate,
    ) -> Result<wallets::Model> {
        let wallet = self.get_wallet(wallet_id, caller).await?;

        if update.name.is_none() && update.currency.is_none() {
            return Ok(wallet);
        }

        let txn = self.db.connection().begin().await?;

        let mut active: wallets::ActiveModel = wallet.clone().into();

        if let Some(name) = update.name {
            let name_taken = wallets::Entity::find()
                .filter(wallets::Column::OwnerId.eq(wallet.owner_id))
                .filter(wallets::Column::Name.eq(name.clone()))
                .filter(wallets::Column::IsDisabled.eq(false))
                .filter(wallets::Column::Id.ne(wallet_id))
                .one(&txn)
                .await?
                .is_some();
            if name_taken {
                txn.rollback().await?;
                return Err(LedgerError::DuplicateWallet);
            }

            active.name = Set(name);
        }

        if let Some(currency) = update.currency {
            if currency != wallet.currency {
                let rate = update.conversion_rate.ok_or(LedgerError::WrongCurrency)?;
                active.balance = Set(wallet.balance * rate);
                active.currency = Set(currency);
            }
        }

        active.modified_at = Set(Utc::now());

        let updated = active.update(&txn).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::DuplicateWallet,
            _ => LedgerError::Database(e),
        })?;

        txn.commit().await?;

        Ok(updated)
    }

    /// Archive a wallet. Soft deletion only: the row stays for the
    /// transaction history, but becomes invisible to reads and writes.
    pub async fn delete_wallet(&self, wallet_id: Uuid) -> Result<()> {
        let result = wallets::Entity::update_many()
            .col_expr(wallets::Column::IsDisabled, Expr::value(true))
            .col_expr(wallets::Column::ModifiedAt, Expr::value(Utc::now()))
            .filter(wallets::Column::Id.eq(wallet_id))
            .filter(wallets::Column::IsDisabled.eq(false))
            .exec(self.db.connection())
            .await?;

        if result.rows_affected == 0 {
            return Err(LedgerError::WalletNotFound);
        }

        Ok(())
    }

    /// Move funds between two wallets under one transaction:
    ///
    /// 1. insert the transaction record (duplicate id aborts here),
    /// 2. debit the source with `RETURNING currency`,
    /// 3. credit the target the same way,
    /// 4. commit.
    pub async fn transfer(&self, plan: &TransferPlan, record: NewTransaction) -> Result<Uuid> {
        let txn = self.db.connection().begin().await?;

        let transaction_id = insert_record(&txn, record).await?;

        let source_currency =
            apply_balance_delta(&txn, plan.source_id, -plan.withdraw_amount).await?;
        if source_currency != plan.source_currency {
            txn.rollback().await?;
            return Err(LedgerError::WalletWasChanged);
        }

        let target_currency = apply_balance_delta(&txn, plan.target_id, plan.deposit_amount).await?;
        if target_currency != plan.target_currency {
            txn.rollback().await?;
            return Err(LedgerError::WalletWasChanged);
        }

        txn.commit().await?;

        debug!(transaction = %transaction_id, "transfer committed");
        Ok(transaction_id)
    }

    /// Apply an external deposit (`sum > 0`) or withdrawal (`sum < 0`) under
    /// one transaction. The record's currency must already be wallet-local.
    pub async fn external_transaction(&self, record: NewTransaction) -> Result<Uuid> {
        let target_id = record.target;
        let expected_currency = record.currency.clone();
        let sum = record.sum;

        let txn = self.db.connection().begin().await?;

        let transaction_id = insert_record(&txn, record).await?;

        let currency = apply_balance_delta(&txn, target_id, sum).await?;
        if currency != expected_currency {
            txn.rollback().await?;
            return Err(LedgerError::WalletWasChanged);
        }

        txn.commit().await?;

        debug!(transaction = %transaction_id, "external transaction committed");
        Ok(transaction_id)
    }

    /// List transactions where the caller owns the source or the target
    /// wallet. Archived wallets still contribute their history. An empty
    /// result is an error by contract.
    pub async fn list_transactions(
        &self,
        caller: Principal,
        params: &ListParams,
    ) -> Result<Vec<transactions::Model>> {
        let conn = self.db.connection();

        let owned: Vec<Uuid> = wallets::Entity::find()
            .filter(wallets::Column::OwnerId.eq(caller.0))
            .all(conn)
            .await?
            .into_iter()
            .map(|wallet| wallet.id)
            .collect();

        if owned.is_empty() {
            return Err(LedgerError::TransactionsNotFound);
        }

        let mut query = transactions::Entity::find().filter(
            Condition::any()
                .add(transactions::Column::FromWalletId.is_in(owned.clone()))
                .add(transactions::Column::ToWalletId.is_in(owned)),
        );

        if let Some(filter) = &params.filter {
            query = query.filter(transactions::Column::Currency.contains(filter.as_str()));
        }

        if let Some(sorting) = &params.sorting {
            let column = transaction_sort_column(sorting)?;
            query = if params.descending {
                query.order_by_desc(column)
            } else {
                query.order_by_asc(column)
            };
        }

        let records = query
            .offset(params.offset)
            .limit(params.limit)
            .all(conn)
            .await?;

        if records.is_empty() {
            return Err(LedgerError::TransactionsNotFound);
        }

        Ok(records)
    }

    /// Archive wallets with no activity inside the window. Returns the
    /// affected ids for logging.
    pub async fn archive_inactive_wallets(&self, inactive_for: Duration) -> Result<Vec<Uuid>> {
        let cutoff = Utc::now() - inactive_for;

        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            ARCHIVE_INACTIVE_SQL,
            [Utc::now().into(), cutoff.into()],
        );

        let rows = self.db.connection().query_all(stmt).await?;

        rows.iter()
            .map(|row| Ok(row.try_get::<Uuid>("", "id")?))
            .collect()
    }
}

async fn insert_record<C: ConnectionTrait>(conn: &C, record: NewTransaction) -> Result<Uuid> {
    let model = transactions::ActiveModel {
        id: Set(record.id),
        from_wallet_id: Set(record.source),
        to_wallet_id: Set(record.target),
        currency: Set(record.currency),
        balance: Set(record.sum),
        created_at: Set(Utc::now()),
    };

    let inserted = model.insert(conn).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::DuplicateTransaction,
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => LedgerError::WalletNotFound,
        _ => LedgerError::Database(e),
    })?;

    Ok(inserted.id)
}

/// Apply a signed balance delta to a non-archived wallet and return its
/// stored currency. Overdraft surfaces as a check-constraint violation.
async fn apply_balance_delta<C: ConnectionTrait>(
    conn: &C,
    wallet_id: Uuid,
    delta: Decimal,
) -> Result<String> {
    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        BALANCE_DELTA_SQL,
        [delta.into(), Utc::now().into(), wallet_id.into()],
    );

    let row = conn.query_one(stmt).await.map_err(classify_delta_err)?;

    match row {
        Some(row) => Ok(row.try_get::<String>("", "currency")?),
        None => Err(LedgerError::WalletNotFound),
    }
}

fn classify_delta_err(err: DbErr) -> LedgerError {
    // sqlx reports constraint failures as "violates check constraint"; the
    // only check on wallets is the non-negative balance.
    if err.to_string().contains("violates check constraint") {
        LedgerError::NotEnoughBalance
    } else {
        LedgerError::Database(err)
    }
}

fn wallet_sort_column(name: &str) -> Result<wallets::Column> {
    match name {
        "created_at" => Ok(wallets::Column::CreatedAt),
        "modified_at" => Ok(wallets::Column::ModifiedAt),
        "name" => Ok(wallets::Column::Name),
        "balance" => Ok(wallets::Column::Balance),
        "currency" => Ok(wallets::Column::Currency),
        other => Err(LedgerError::Validation(format!(
            "unknown sort column: {other}"
        ))),
    }
}

fn transaction_sort_column(name: &str) -> Result<transactions::Column> {
    match name {
        "created_at" => Ok(transactions::Column::CreatedAt),
        "currency" => Ok(transactions::Column::Currency),
        "balance" => Ok(transactions::Column::Balance),
        other => Err(LedgerError::Validation(format!(
            "unknown sort column: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_sort_column_whitelist() {
        for allowed in ["created_at", "modified_at", "name", "balance", "currency"] {
            assert!(wallet_sort_column(allowed).is_ok());
        }

        assert!(matches!(
            wallet_sort_column("name; DROP TABLE wallets"),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            wallet_sort_column("owner_id"),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_transaction_sort_column_whitelist() {
        for allowed in ["created_at", "currency", "balance"] {
            assert!(transaction_sort_column(allowed).is_ok());
        }

        assert!(matches!(
            transaction_sort_column("name"),
            Err(LedgerError::Validation(_))
        ));
    }
}
