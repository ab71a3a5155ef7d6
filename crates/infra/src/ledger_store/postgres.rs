//! Postgres-backed ledger store.
//!
//! Balances live in `wallets`, the audit trail in `movements`; see
//! `migrations/` for the schema. The non-negative balance invariant is the
//! `wallets_balance_non_negative` CHECK constraint, so a debit never needs a
//! prior read of the balance.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (unique violation) | `23505` | `AlreadyExists` | Wallet name taken |
//! | Database (check violation on `wallets_balance_non_negative`) | `23514` | `InsufficientBalance` | Debit leg would go negative |
//! | Database (numeric value out of range) | `22003` | `Validation` | Balance would overflow `BIGINT` |
//! | Database (other) | Any other | `Internal` | |
//! | PoolClosed / Io / PoolTimedOut / Other | N/A | `Internal` | |
//!
//! ## Locking
//!
//! Transfers run at READ COMMITTED. Each leg is a single
//! `UPDATE ... RETURNING` so Postgres holds the row lock until commit. Legs are
//! applied in wallet-name order so that two opposing transfers between the
//! same pair cannot deadlock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{instrument, Span};

use wallets_core::movement::{credit_meta, debit_meta, deposit_meta};
use wallets_core::{
    Amount, Direction, HistoryFilter, HistoryPage, LedgerError, LedgerResult, Meta, Movement,
    TransferReceipt, Wallet, WalletName,
};

use super::r#trait::LedgerStore;

const BALANCE_CONSTRAINT: &str = "wallets_balance_non_negative";

/// Postgres-backed ledger store.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        Ok(tx)
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, name), fields(wallet = %name), err)]
    async fn create_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallets (name)
            VALUES ($1)
            RETURNING balance, created_at
            "#,
        )
        .bind(name.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::already_exists(name.as_str())
            } else {
                map_sqlx_error("create_wallet", e)
            }
        })?;

        Ok(Wallet {
            name: name.clone(),
            balance: read_column(&row, "balance")?,
            created_at: read_column(&row, "created_at")?,
        })
    }

    #[instrument(skip(self, name), fields(wallet = %name), err)]
    async fn get_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT balance, created_at
            FROM wallets
            WHERE name = $1
            "#,
        )
        .bind(name.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_wallet", e))?
        .ok_or_else(|| LedgerError::not_found(name.as_str()))?;

        Ok(Wallet {
            name: name.clone(),
            balance: read_column(&row, "balance")?,
            created_at: read_column(&row, "created_at")?,
        })
    }

    #[instrument(skip(self, wallet), fields(wallet = %wallet.name), err)]
    async fn balance(&self, wallet: &Wallet) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE name = $1")
            .bind(wallet.name.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("balance", e))?
            .ok_or_else(|| LedgerError::not_found(wallet.name.as_str()))?;

        read_column(&row, "balance")
    }

    #[instrument(
        skip(self, wallet, amount),
        fields(wallet = %wallet.name, amount = %amount, movement_id = tracing::field::Empty),
        err
    )]
    async fn deposit(&self, wallet: &Wallet, amount: Amount) -> LedgerResult<i64> {
        let mut tx = self.begin().await?;

        let balance = apply_delta(&mut tx, &wallet.name, amount.get()).await?;
        let movement = insert_movement(
            &mut tx,
            &wallet.name,
            Direction::Deposit,
            amount.get(),
            deposit_meta(),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("movement_id", movement.id);
        Ok(balance)
    }

    #[instrument(
        skip(self, from, to, amount),
        fields(from = %from.name, to = %to.name, amount = %amount),
        err
    )]
    async fn transfer(&self, from: &Wallet, to: &Wallet, amount: Amount) -> LedgerResult<TransferReceipt> {
        if from.name == to.name {
            return Err(LedgerError::validation("cannot transfer to the same wallet"));
        }

        let mut tx = self.begin().await?;

        let mut legs = [(&from.name, -amount.get()), (&to.name, amount.get())];
        legs.sort_by(|a, b| a.0.cmp(b.0));
        for (wallet, delta) in legs {
            apply_delta(&mut tx, wallet, delta).await?;
        }

        let debit = insert_movement(
            &mut tx,
            &from.name,
            Direction::Transfer,
            -amount.get(),
            debit_meta(&to.name),
        )
        .await?;
        let credit = insert_movement(
            &mut tx,
            &to.name,
            Direction::Transfer,
            amount.get(),
            credit_meta(&from.name),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(TransferReceipt { debit, credit })
    }

    #[instrument(
        skip(self, wallet, filter),
        fields(wallet = %wallet.name, filter = ?filter, record_count = tracing::field::Empty),
        err
    )]
    async fn fetch_history(&self, wallet: &Wallet, filter: &HistoryFilter) -> LedgerResult<HistoryPage> {
        filter.validate()?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, wallet, direction, amount, meta, created_at FROM movements WHERE wallet = ",
        );
        qb.push_bind(wallet.name.as_str());

        if let Some(direction) = filter.direction {
            qb.push(" AND direction = ").push_bind(direction.as_str());
        }
        if let Some(start) = filter.start_date {
            qb.push(" AND (created_at AT TIME ZONE 'UTC')::date >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            qb.push(" AND (created_at AT TIME ZONE 'UTC')::date <= ").push_bind(end);
        }
        if let Some(offset) = filter.offset_by_id.filter(|id| *id > 0) {
            qb.push(" AND id > ").push_bind(offset);
        }
        qb.push(" ORDER BY id ASC");

        let page_size = filter.page_size();
        if let Some(size) = page_size {
            qb.push(" LIMIT ").push_bind(size as i64 + 1);
        }

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_history", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let movement_row = MovementRow::from_row(&row)
                .map_err(|e| LedgerError::internal(format!("failed to deserialize movement row: {}", e)))?;
            records.push(Movement::try_from(movement_row)?);
        }

        Span::current().record("record_count", records.len());
        Ok(HistoryPage::from_overfetch(records, page_size))
    }
}

/// Add `delta` to a wallet balance inside `tx`, returning the new balance.
async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    wallet: &WalletName,
    delta: i64,
) -> LedgerResult<i64> {
    let row = sqlx::query(
        r#"
        UPDATE wallets
        SET balance = balance + $1
        WHERE name = $2
        RETURNING balance
        "#,
    )
    .bind(delta)
    .bind(wallet.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| {
        if is_balance_violation(&e) {
            LedgerError::insufficient_balance(wallet.as_str())
        } else if is_out_of_range(&e) {
            LedgerError::validation("balance overflow")
        } else {
            map_sqlx_error("apply_delta", e)
        }
    })?
    .ok_or_else(|| LedgerError::not_found(wallet.as_str()))?;

    read_column(&row, "balance")
}

async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    wallet: &WalletName,
    direction: Direction,
    amount: i64,
    meta: Meta,
) -> LedgerResult<Movement> {
    let row = sqlx::query(
        r#"
        INSERT INTO movements (wallet, direction, amount, meta)
        VALUES ($1, $2, $3, $4)
        RETURNING id, created_at
        "#,
    )
    .bind(wallet.as_str())
    .bind(direction.as_str())
    .bind(amount)
    .bind(JsonValue::Object(meta.clone()))
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;

    Ok(Movement {
        id: read_column(&row, "id")?,
        wallet: wallet.clone(),
        direction,
        amount,
        meta,
        created_at: read_column(&row, "created_at")?,
    })
}

fn read_column<'r, T>(row: &'r sqlx::postgres::PgRow, column: &str) -> LedgerResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| LedgerError::internal(format!("failed to read {}: {}", column, e)))
}

/// Map SQLx errors that have no ledger-specific meaning to `LedgerError::Internal`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => LedgerError::internal(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            LedgerError::internal(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            LedgerError::internal(format!("timed out acquiring connection in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            LedgerError::internal(format!("unexpected row not found in {}", operation))
        }
        _ => LedgerError::internal(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn db_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    db_code(err).as_deref() == Some("23505")
}

fn is_balance_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23514")
            && db_err.constraint() == Some(BALANCE_CONSTRAINT);
    }
    false
}

fn is_out_of_range(err: &sqlx::Error) -> bool {
    db_code(err).as_deref() == Some("22003")
}

// SQLx row types

#[derive(Debug)]
struct MovementRow {
    id: i64,
    wallet: String,
    direction: String,
    amount: i64,
    meta: JsonValue,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            wallet: row.try_get("wallet")?,
            direction: row.try_get("direction")?,
            amount: row.try_get("amount")?,
            meta: row.try_get("meta")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = LedgerError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let meta = match row.meta {
            JsonValue::Object(map) => map,
            JsonValue::Null => Meta::new(),
            other => {
                let mut wrapped = Meta::new();
                wrapped.insert("value".to_string(), other);
                wrapped
            }
        };

        Ok(Movement {
            id: row.id,
            wallet: WalletName::parse(row.wallet)
                .map_err(|e| LedgerError::internal(format!("corrupt wallet column: {}", e)))?,
            direction: row
                .direction
                .parse()
                .map_err(|e| LedgerError::internal(format!("corrupt direction column: {}", e)))?,
            amount: row.amount,
            meta,
            created_at: row.created_at,
        })
    }
}
