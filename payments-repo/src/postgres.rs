//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use std::ops::{Deref, DerefMut};
use tokio::sync::{Mutex, MutexGuard};

use payments_types::{ColumnValue, Filter, PaymentMethod, RepoError, Repository, Transaction};

use crate::columns::{Column, Condition, Op, PaymentMethodColumn, SqlValue, TransactionColumn};
use crate::rows::{
    ConflictTarget, DbPaymentMethod, DbTransaction, db_error, payment_method_fields,
    transaction_fields, tx_error,
};
use crate::{PoolSettings, ScopedFuture};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository for transactions and payment methods.
///
/// A repository either draws connections from the pool or, inside
/// [`PostgresRepo::with_transaction`], runs every statement on one open
/// database transaction.
pub struct PostgresRepo {
    db: Db,
}

enum Db {
    Pool(PgPool),
    Scoped(Mutex<sqlx::Transaction<'static, Postgres>>),
}

enum Conn<'a> {
    Pooled(PoolConnection<Postgres>),
    Scoped(MutexGuard<'a, sqlx::Transaction<'static, Postgres>>),
}

impl Deref for Conn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            Conn::Pooled(c) => &**c,
            Conn::Scoped(tx) => &***tx,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            Conn::Pooled(c) => &mut **c,
            Conn::Scoped(tx) => &mut ***tx,
        }
    }
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_transactions_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_payment_methods_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Connects with the given pool settings and runs migrations.
    pub async fn new(database_url: &str, settings: &PoolSettings) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .max_lifetime(settings.max_lifetime)
            .acquire_timeout(settings.acquire_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool. Migrations are not run.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { db: Db::Pool(pool) }
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        let Db::Pool(pool) = &self.db else {
            return Err(RepoError::Transaction(
                "schema changes are not allowed inside a scoped transaction".into(),
            ));
        };
        run_migrations(pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }

    /// Runs `f` against a repository bound to one database transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`. If
    /// `f` panics or its future is dropped, the open transaction is dropped
    /// with it and rolled back by the driver. Nesting is rejected.
    pub async fn with_transaction<T, F>(&self, f: F) -> Result<T, RepoError>
    where
        T: Send,
        F: for<'s> FnOnce(&'s PostgresRepo) -> ScopedFuture<'s, T> + Send,
    {
        let Db::Pool(pool) = &self.db else {
            return Err(RepoError::Transaction(
                "nested transactions are not supported".into(),
            ));
        };

        let db_tx = pool.begin().await.map_err(tx_error)?;
        let scoped = PostgresRepo {
            db: Db::Scoped(Mutex::new(db_tx)),
        };

        let result = f(&scoped).await;

        let Db::Scoped(lock) = scoped.db else {
            return Err(RepoError::Transaction("scoped handle lost its transaction".into()));
        };
        let db_tx = lock.into_inner();

        match result {
            Ok(value) => {
                db_tx.commit().await.map_err(tx_error)?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(error = %e, "rolling back scoped transaction");
                db_tx.rollback().await.map_err(tx_error)?;
                Err(e)
            }
        }
    }

    async fn conn(&self) -> Result<Conn<'_>, RepoError> {
        match &self.db {
            Db::Pool(pool) => pool.acquire().await.map(Conn::Pooled).map_err(db_error),
            Db::Scoped(lock) => Ok(Conn::Scoped(lock.lock().await)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement helpers shared by both tables
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert<C: ConflictTarget>(
        &self,
        fields: Vec<(C, SqlValue)>,
        if_absent: bool,
    ) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
        qb.push(C::TABLE).push(" (");
        let mut columns = qb.separated(", ");
        for (column, _) in &fields {
            columns.push(column.as_str());
        }
        qb.push(") VALUES (");
        let mut values = qb.separated(", ");
        for (_, value) in fields {
            match value {
                SqlValue::Uuid(v) => values.push_bind(v),
                SqlValue::Text(v) => values.push_bind(v),
                SqlValue::Int(v) => values.push_bind(v),
                SqlValue::Bool(v) => values.push_bind(v),
                SqlValue::Timestamp(v) => values.push_bind(v),
                SqlValue::Json(v) => values.push_bind(v),
            };
        }
        qb.push(")");
        if if_absent {
            qb.push(" ON CONFLICT (")
                .push(C::CONFLICT_TARGET)
                .push(") DO NOTHING");
        }

        let mut conn = self.conn().await?;
        let result = qb.build().execute(&mut *conn).await.map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn select<C: Column, T>(&self, conditions: Vec<Condition<C>>) -> Result<Vec<T>, RepoError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(C::select_list()).push(" FROM ").push(C::TABLE);
        push_where(&mut qb, conditions);
        qb.push(" ORDER BY ")
            .push(C::CREATED_AT.as_str())
            .push(" DESC");

        let mut conn = self.conn().await?;
        qb.build_query_as::<T>()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)
    }

    async fn update_status_where<C: Column>(
        &self,
        status: &str,
        filters: &[Filter],
    ) -> Result<u64, RepoError> {
        if filters.is_empty() {
            return Err(RepoError::FiltersRequired);
        }
        let conditions = filters
            .iter()
            .map(C::condition)
            .collect::<Result<Vec<_>, _>>()?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
        qb.push(C::TABLE)
            .push(" SET ")
            .push(C::STATUS.as_str())
            .push(" = ");
        qb.push_bind(status.to_string());
        qb.push(", ").push(C::UPDATED_AT.as_str()).push(" = ");
        qb.push_bind(Utc::now());
        push_where(&mut qb, conditions);

        let mut conn = self.conn().await?;
        let result = qb.build().execute(&mut *conn).await.map_err(db_error)?;
        match result.rows_affected() {
            0 => Err(RepoError::NoMatch),
            n => Ok(n),
        }
    }
}

fn push_where<C: Column>(qb: &mut QueryBuilder<'_, Postgres>, conditions: Vec<Condition<C>>) {
    if conditions.is_empty() {
        return;
    }
    qb.push(" WHERE ");
    let mut clause = qb.separated(" AND ");
    for cond in conditions {
        clause.push(cond.column.as_str());
        clause.push_unseparated(cond.op.as_sql());
        match cond.value {
            SqlValue::Uuid(v) => clause.push_bind_unseparated(v),
            SqlValue::Text(v) => clause.push_bind_unseparated(v),
            SqlValue::Int(v) => clause.push_bind_unseparated(v),
            SqlValue::Bool(v) => clause.push_bind_unseparated(v),
            SqlValue::Timestamp(v) => clause.push_bind_unseparated(v),
            SqlValue::Json(v) => clause.push_bind_unseparated(v),
        };
    }
}

fn single<T>(mut rows: Vec<T>) -> Result<T, RepoError> {
    if rows.is_empty() {
        return Err(RepoError::NotFound);
    }
    Ok(rows.swap_remove(0))
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository<Transaction>
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Repository<Transaction> for PostgresRepo {
    async fn create(&self, record: &Transaction) -> Result<(), RepoError> {
        self.insert(transaction_fields(record), false).await?;
        Ok(())
    }

    async fn create_if_absent(&self, record: &Transaction) -> Result<bool, RepoError> {
        Ok(self.insert(transaction_fields(record), true).await? == 1)
    }

    async fn update_status(
        &self,
        status: payments_types::TxStatus,
        filters: &[Filter],
    ) -> Result<u64, RepoError> {
        self.update_status_where::<TransactionColumn>(status.as_str(), filters)
            .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Transaction, RepoError> {
        let cond = TransactionColumn::condition(&Filter::eq("id", id))?;
        let rows: Vec<DbTransaction> = self.select(vec![cond]).await?;
        single(rows)?.into_domain()
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Transaction, RepoError> {
        let cond = Condition::eq(
            TransactionColumn::PaymentIntentId,
            SqlValue::Text(payment_intent_id.to_string()),
        );
        let rows: Vec<DbTransaction> = self.select(vec![cond]).await?;
        single(rows)?.into_domain()
    }

    async fn find_by_status(
        &self,
        status: payments_types::TxStatus,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, RepoError> {
        let conditions = vec![
            Condition::eq(
                TransactionColumn::TxStatus,
                SqlValue::Text(status.as_str().to_string()),
            ),
            Condition {
                column: TransactionColumn::CreatedAt,
                op: Op::AtOrAfter,
                value: SqlValue::Timestamp(since),
            },
        ];
        let rows: Vec<DbTransaction> = self.select(conditions).await?;
        rows.into_iter().map(DbTransaction::into_domain).collect()
    }

    async fn find_by_column(
        &self,
        column: &str,
        value: ColumnValue,
    ) -> Result<Vec<Transaction>, RepoError> {
        let cond = TransactionColumn::condition(&Filter::eq(column, value))?;
        let rows: Vec<DbTransaction> = self.select(vec![cond]).await?;
        rows.into_iter().map(DbTransaction::into_domain).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository<PaymentMethod>
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Repository<PaymentMethod> for PostgresRepo {
    async fn create(&self, record: &PaymentMethod) -> Result<(), RepoError> {
        self.insert(payment_method_fields(record), false).await?;
        Ok(())
    }

    async fn create_if_absent(&self, record: &PaymentMethod) -> Result<bool, RepoError> {
        Ok(self.insert(payment_method_fields(record), true).await? == 1)
    }

    async fn update_status(
        &self,
        status: payments_types::PaymentMethodStatus,
        filters: &[Filter],
    ) -> Result<u64, RepoError> {
        self.update_status_where::<PaymentMethodColumn>(status.as_str(), filters)
            .await
    }

    async fn find_by_id(&self, id: &str) -> Result<PaymentMethod, RepoError> {
        let cond = Condition::eq(
            PaymentMethodColumn::PaymentMethodId,
            SqlValue::Text(id.to_string()),
        );
        let rows: Vec<DbPaymentMethod> = self.select(vec![cond]).await?;
        single(rows)?.into_domain()
    }

    async fn find_by_payment_intent(
        &self,
        _payment_intent_id: &str,
    ) -> Result<PaymentMethod, RepoError> {
        Err(RepoError::InvalidColumn("payment_intent_id".into()))
    }

    async fn find_by_status(
        &self,
        status: payments_types::PaymentMethodStatus,
        since: DateTime<Utc>,
    ) -> Result<Vec<PaymentMethod>, RepoError> {
        let conditions = vec![
            Condition::eq(
                PaymentMethodColumn::Status,
                SqlValue::Text(status.as_str().to_string()),
            ),
            Condition {
                column: PaymentMethodColumn::CreatedAt,
                op: Op::AtOrAfter,
                value: SqlValue::Timestamp(since),
            },
        ];
        let rows: Vec<DbPaymentMethod> = self.select(conditions).await?;
        rows.into_iter().map(DbPaymentMethod::into_domain).collect()
    }

    async fn find_by_column(
        &self,
        column: &str,
        value: ColumnValue,
    ) -> Result<Vec<PaymentMethod>, RepoError> {
        let cond = PaymentMethodColumn::condition(&Filter::eq(column, value))?;
        let rows: Vec<DbPaymentMethod> = self.select(vec![cond]).await?;
        rows.into_iter().map(DbPaymentMethod::into_domain).collect()
    }
}
