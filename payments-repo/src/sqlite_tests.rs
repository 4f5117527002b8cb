//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use payments_types::{
        ColumnValue, Filter, PaymentMethod, PaymentMethodStatus, ProviderId, RepoError,
        Repository, Transaction, TxStatus,
    };

    use crate::{PoolSettings, SqliteRepo};

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:", &PoolSettings::default())
            .await
            .unwrap()
    }

    fn pending(intent: &str, customer: &str) -> Transaction {
        Transaction::new(
            intent,
            1000,
            "usd".parse().unwrap(),
            customer,
            TxStatus::Pending,
        )
    }

    fn card(customer: &str, method: &str) -> PaymentMethod {
        PaymentMethod::active(
            customer,
            method,
            ProviderId::new("stripe"),
            Some("card".into()),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // transactions
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_and_find_transaction() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        let tx = pending("pi_1", "cust_1")
            .with_reference(Some("order-1".into()))
            .remember_method(true)
            .with_metadata(BTreeMap::from([("cart".to_string(), "42".to_string())]));
        txs.create(&tx).await.unwrap();

        let by_id = txs.find_by_id(&tx.id.to_string()).await.unwrap();
        assert_eq!(by_id.id, tx.id);
        assert_eq!(by_id.internal_reference.as_deref(), Some("order-1"));
        assert_eq!(by_id.save_payment_method, Some(true));
        assert_eq!(by_id.metadata.get("cart").map(String::as_str), Some("42"));
        assert_eq!(by_id.currency.as_str(), "usd");

        let by_intent = txs.find_by_payment_intent("pi_1").await.unwrap();
        assert_eq!(by_intent.id, tx.id);
        assert_eq!(by_intent.status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn test_unset_optionals_use_column_defaults() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        txs.create(&pending("pi_1", "cust_1")).await.unwrap();

        let found = txs.find_by_payment_intent("pi_1").await.unwrap();
        assert!(found.internal_reference.is_none());
        assert!(found.save_payment_method.is_none());
        assert!(found.payment_method_id.is_none());
        assert!(found.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_find_missing_is_not_found() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        assert!(matches!(
            txs.find_by_payment_intent("pi_missing").await,
            Err(RepoError::NotFound)
        ));
        assert!(matches!(
            txs.find_by_id(&uuid::Uuid::new_v4().to_string()).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_malformed_id_is_rejected() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        assert!(matches!(
            txs.find_by_id("1 OR 1=1").await,
            Err(RepoError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_intent_is_conflict() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        txs.create(&pending("pi_1", "cust_1")).await.unwrap();
        let result = txs.create(&pending("pi_1", "cust_2")).await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_find_by_column_newest_first() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        let older = pending("pi_1", "cust_1");
        let mut newer = pending("pi_2", "cust_1");
        newer.created_at = older.created_at + Duration::seconds(1);
        txs.create(&older).await.unwrap();
        txs.create(&newer).await.unwrap();
        txs.create(&pending("pi_3", "cust_2")).await.unwrap();

        let rows = txs
            .find_by_column("customer_id", ColumnValue::from("cust_1"))
            .await
            .unwrap();

        let intents: Vec<_> = rows.iter().map(|t| t.payment_intent_id.as_str()).collect();
        assert_eq!(intents, vec!["pi_2", "pi_1"]);
    }

    #[tokio::test]
    async fn test_find_by_column_rejects_unknown_columns() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;
        txs.create(&pending("pi_1", "cust_1")).await.unwrap();

        for column in [
            "customer_id; DROP TABLE transactions",
            "customer_id = customer_id --",
            "nonexistent",
        ] {
            let result = txs.find_by_column(column, ColumnValue::from("x")).await;
            assert!(matches!(result, Err(RepoError::InvalidColumn(_))));
        }

        // table is intact
        assert!(txs.find_by_payment_intent("pi_1").await.is_ok());
    }

    #[tokio::test]
    async fn test_find_by_status_since() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        txs.create(&pending("pi_1", "cust_1")).await.unwrap();
        let mut done = pending("pi_2", "cust_1");
        done.status = TxStatus::Succeeded;
        txs.create(&done).await.unwrap();

        let recent = txs
            .find_by_status(TxStatus::Pending, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].payment_intent_id, "pi_1");

        let future = txs
            .find_by_status(TxStatus::Pending, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(future.is_empty());
    }

    #[tokio::test]
    async fn test_update_status_requires_filters() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;
        txs.create(&pending("pi_1", "cust_1")).await.unwrap();

        let result = txs.update_status(TxStatus::Succeeded, &[]).await;
        assert!(matches!(result, Err(RepoError::FiltersRequired)));

        let unchanged = txs.find_by_payment_intent("pi_1").await.unwrap();
        assert_eq!(unchanged.status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status_no_match() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        let result = txs
            .update_status(
                TxStatus::Succeeded,
                &[Filter::eq("payment_intent_id", "pi_missing")],
            )
            .await;
        assert!(matches!(result, Err(RepoError::NoMatch)));
    }

    #[tokio::test]
    async fn test_update_status_rejects_unknown_filter_column() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;

        let result = txs
            .update_status(TxStatus::Failed, &[Filter::eq("1=1 OR tx_status", "x")])
            .await;
        assert!(matches!(result, Err(RepoError::InvalidColumn(_))));
    }

    #[tokio::test]
    async fn test_update_status_compare_and_set() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;
        let tx = pending("pi_1", "cust_1");
        txs.create(&tx).await.unwrap();

        let guarded = [
            Filter::eq("payment_intent_id", "pi_1"),
            Filter::eq("tx_status", TxStatus::Pending),
        ];
        assert_eq!(txs.update_status(TxStatus::Failed, &guarded).await.unwrap(), 1);

        // second transition loses the race
        let again = txs.update_status(TxStatus::Succeeded, &guarded).await;
        assert!(matches!(again, Err(RepoError::NoMatch)));

        let stored = txs.find_by_payment_intent("pi_1").await.unwrap();
        assert_eq!(stored.status, TxStatus::Failed);
        assert!(stored.updated_at >= tx.updated_at);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // payment_methods
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_if_absent_is_idempotent() {
        let repo = setup_repo().await;
        let pms: &dyn Repository<PaymentMethod> = &repo;

        assert!(pms.create_if_absent(&card("cust_1", "pm_1")).await.unwrap());
        assert!(!pms.create_if_absent(&card("cust_1", "pm_1")).await.unwrap());
        // same method under another customer is a different record
        assert!(pms.create_if_absent(&card("cust_2", "pm_1")).await.unwrap());

        let rows = pms
            .find_by_column("customer_id", ColumnValue::from("cust_1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, PaymentMethodStatus::Active);
        assert_eq!(rows[0].method_type.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn test_concurrent_create_if_absent_writes_one_row() {
        let repo = Arc::new(setup_repo().await);
        let pms: Arc<dyn Repository<PaymentMethod>> = repo;
        let pm = card("cust_1", "pm_1");

        let (a, b, c) = tokio::join!(
            pms.create_if_absent(&pm),
            pms.create_if_absent(&pm),
            pms.create_if_absent(&pm)
        );
        let written = [a.unwrap(), b.unwrap(), c.unwrap()]
            .iter()
            .filter(|w| **w)
            .count();
        assert_eq!(written, 1);

        let rows = pms
            .find_by_column("payment_method_id", ColumnValue::from("pm_1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_plain_create_rejects_duplicate_method() {
        let repo = setup_repo().await;
        let pms: &dyn Repository<PaymentMethod> = &repo;

        pms.create(&card("cust_1", "pm_1")).await.unwrap();
        assert!(matches!(
            pms.create(&card("cust_1", "pm_1")).await,
            Err(RepoError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_payment_method_lookups() {
        let repo = setup_repo().await;
        let pms: &dyn Repository<PaymentMethod> = &repo;
        pms.create(&card("cust_1", "pm_1")).await.unwrap();

        let found = pms.find_by_id("pm_1").await.unwrap();
        assert_eq!(found.customer_id, "cust_1");
        assert_eq!(found.provider.as_str(), "stripe");

        assert!(matches!(
            pms.find_by_payment_intent("pi_1").await,
            Err(RepoError::InvalidColumn(_))
        ));
        assert!(matches!(
            pms.find_by_column("tx_status", ColumnValue::from("active")).await,
            Err(RepoError::InvalidColumn(_))
        ));
    }

    #[tokio::test]
    async fn test_payment_method_status_update() {
        let repo = setup_repo().await;
        let pms: &dyn Repository<PaymentMethod> = &repo;
        pms.create(&card("cust_1", "pm_1")).await.unwrap();

        let changed = pms
            .update_status(
                PaymentMethodStatus::Inactive,
                &[
                    Filter::eq("customer_id", "cust_1"),
                    Filter::eq("payment_method_id", "pm_1"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(
            pms.find_by_id("pm_1").await.unwrap().status,
            PaymentMethodStatus::Inactive
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // with_transaction
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_with_transaction_commits() {
        let repo = setup_repo().await;
        let tx = pending("pi_1", "cust_1");
        let pm = card("cust_1", "pm_1");

        let inserted = repo
            .with_transaction(|scoped| {
                Box::pin(async move {
                    let txs: &dyn Repository<Transaction> = scoped;
                    let pms: &dyn Repository<PaymentMethod> = scoped;
                    txs.create(&tx).await?;
                    pms.create_if_absent(&pm).await
                })
            })
            .await
            .unwrap();
        assert!(inserted);

        let txs: &dyn Repository<Transaction> = &repo;
        let pms: &dyn Repository<PaymentMethod> = &repo;
        assert!(txs.find_by_payment_intent("pi_1").await.is_ok());
        assert!(pms.find_by_id("pm_1").await.is_ok());
    }

    #[tokio::test]
    async fn test_with_transaction_rolls_back_on_error() {
        let repo = setup_repo().await;
        let tx = pending("pi_1", "cust_1");

        let result: Result<(), RepoError> = repo
            .with_transaction(|scoped| {
                Box::pin(async move {
                    let txs: &dyn Repository<Transaction> = scoped;
                    txs.create(&tx).await?;
                    // visible inside the scope
                    txs.find_by_payment_intent("pi_1").await?;
                    Err(RepoError::Conflict("forced".into()))
                })
            })
            .await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));

        let txs: &dyn Repository<Transaction> = &repo;
        assert!(matches!(
            txs.find_by_payment_intent("pi_1").await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_with_transaction_rolls_back_failed_statement() {
        let repo = setup_repo().await;
        let txs: &dyn Repository<Transaction> = &repo;
        txs.create(&pending("pi_taken", "cust_1")).await.unwrap();

        let first = pending("pi_new", "cust_1");
        let duplicate = pending("pi_taken", "cust_2");
        let result = repo
            .with_transaction(|scoped| {
                Box::pin(async move {
                    let txs: &dyn Repository<Transaction> = scoped;
                    txs.create(&first).await?;
                    txs.create(&duplicate).await
                })
            })
            .await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));

        assert!(matches!(
            txs.find_by_payment_intent("pi_new").await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_nested_transactions_rejected() {
        let repo = setup_repo().await;

        let result = repo
            .with_transaction(|scoped| {
                Box::pin(async move {
                    scoped
                        .with_transaction(|_inner| Box::pin(async move { Ok(()) }))
                        .await
                })
            })
            .await;

        assert!(matches!(result, Err(RepoError::Transaction(_))));
    }
}
