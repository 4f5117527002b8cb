//! Payment Application Service
//!
//! Orchestrates one provider adapter and the two repositories per use case.
//! Each operation runs under one deadline that the provider call and every
//! repository call after it share; nothing here is retried.
//!
//! Status moves forward only (`pending` to one terminal state). The service
//! enforces that with a compare-and-set update filtered on
//! `tx_status = pending`, so concurrent or replayed provider notifications
//! can never rewrite a terminal transaction.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use payments_types::{
    AppError, Filter, PaymentEvent, PaymentIntentRequest, PaymentIntentResponse, PaymentMethod,
    PaymentMethodResponse, PaymentProcessor, ProviderId, Repository, Transaction, TxStatus,
};

use crate::registry::{ProviderRegistry, RepositoryRegistry};

/// Per-operation deadlines. Each one covers the whole operation, provider
/// call and repository writes together.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Intent creation, retrieval, sync and cancellation
    pub intent: Duration,
    pub charge: Duration,
    /// Local reconciliation of one verified webhook event
    pub webhook: Duration,
    /// Cap on any single repository call; also the deadline of read-only
    /// queries
    pub storage: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            intent: Duration::from_secs(2),
            charge: Duration::from_secs(5),
            webhook: Duration::from_secs(5),
            storage: Duration::from_secs(5),
        }
    }
}

/// What to do with a provider-side intent whose local record could not be
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanIntentPolicy {
    /// Leave the intent at the provider; it shows up in out-of-band
    /// reconciliation.
    #[default]
    Keep,
    /// Make one best-effort cancellation call at the provider.
    Cancel,
}

impl FromStr for OrphanIntentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "cancel" => Ok(Self::Cancel),
            other => Err(format!(
                "unknown orphan intent policy '{}', expected 'keep' or 'cancel'",
                other
            )),
        }
    }
}

/// Application service for payment orchestration.
pub struct PaymentService {
    providers: ProviderRegistry,
    repositories: RepositoryRegistry,
    timeouts: Timeouts,
    orphan_policy: OrphanIntentPolicy,
}

impl PaymentService {
    /// Creates the service over fully populated registries.
    pub fn new(providers: ProviderRegistry, repositories: RepositoryRegistry) -> Self {
        Self {
            providers,
            repositories,
            timeouts: Timeouts::default(),
            orphan_policy: OrphanIntentPolicy::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanIntentPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Intents and charges
    // ─────────────────────────────────────────────────────────────────────────────

    /// Reserves a charge at the provider and records it locally as `pending`.
    #[tracing::instrument(skip(self, req), fields(customer_id = %req.customer_id, amount = req.amount))]
    pub async fn create_payment_intent(
        &self,
        provider: &str,
        req: PaymentIntentRequest,
    ) -> Result<PaymentIntentResponse, AppError> {
        req.validate()?;
        let processor = self.providers.get(provider)?;
        let transactions = self.repositories.transactions()?;

        let deadline = Deadline::after(self.timeouts.intent);

        let res = deadline
            .run("intent creation", processor.create_intent(&req))
            .await?;

        let tx = Transaction::new(
            &res.id,
            res.amount,
            res.currency.clone(),
            &req.customer_id,
            TxStatus::Pending,
        )
        .with_reference(req.internal_reference.clone())
        .with_metadata(req.metadata.clone())
        .remember_method(req.remember());

        if let Err(err) = self
            .store(deadline, "transaction insert", transactions.create(&tx))
            .await
        {
            self.handle_orphan_intent(processor.as_ref(), &res.id, &err)
                .await;
            return Err(err);
        }

        tracing::info!(intent_id = %res.id, transaction_id = %tx.id, "payment intent recorded");
        Ok(res.into())
    }

    /// Charges `req.token` directly and records the transaction as
    /// `succeeded`. Remembers the payment method when asked to.
    #[tracing::instrument(skip(self, req), fields(customer_id = %req.customer_id, amount = req.amount))]
    pub async fn charge_client(
        &self,
        provider: &str,
        req: PaymentIntentRequest,
    ) -> Result<PaymentIntentResponse, AppError> {
        let token = req.validate_charge()?.to_string();
        let processor = self.providers.get(provider)?;
        let transactions = self.repositories.transactions()?;
        let methods = self.repositories.payment_methods()?;

        let deadline = Deadline::after(self.timeouts.charge);

        let res = deadline.run("charge", processor.charge(&req)).await?;
        let method_id = res.payment_method_id.clone().unwrap_or(token);

        let tx = Transaction::new(
            &res.id,
            res.amount,
            res.currency.clone(),
            &req.customer_id,
            TxStatus::Succeeded,
        )
        .with_reference(req.internal_reference.clone())
        .with_metadata(req.metadata.clone())
        .remember_method(req.remember())
        .with_payment_method(Some(method_id.clone()), res.payment_method_type.clone());

        if let Err(err) = self
            .store(deadline, "transaction insert", transactions.create(&tx))
            .await
        {
            tracing::error!(
                intent_id = %res.id,
                error = %err,
                "charge succeeded at the provider but could not be recorded"
            );
            return Err(err);
        }
        tracing::info!(intent_id = %res.id, transaction_id = %tx.id, "charge recorded");

        if req.remember() {
            self.remember_method(
                deadline,
                methods.as_ref(),
                &req.customer_id,
                &method_id,
                processor.id(),
                res.payment_method_type.clone(),
            )
            .await?;
        }

        Ok(res.into())
    }

    /// Provider-side state of an intent. No local effect.
    #[tracing::instrument(skip(self))]
    pub async fn get_payment_intent(
        &self,
        provider: &str,
        id: &str,
    ) -> Result<PaymentIntentResponse, AppError> {
        let id = require_id(id)?;
        let processor = self.providers.get(provider)?;

        let res = Deadline::after(self.timeouts.intent)
            .run("intent retrieval", processor.get_intent(id))
            .await?;
        Ok(res.into())
    }

    /// Pulls the provider-side state of an intent and applies it to the
    /// local transaction with the same rules as webhook delivery.
    #[tracing::instrument(skip(self))]
    pub async fn sync_payment_intent(
        &self,
        provider: &str,
        id: &str,
    ) -> Result<PaymentIntentResponse, AppError> {
        let id = require_id(id)?;
        let processor = self.providers.get(provider)?;
        let transactions = self.repositories.transactions()?;
        let methods = self.repositories.payment_methods()?;

        let deadline = Deadline::after(self.timeouts.intent);

        let remote = deadline
            .run("intent retrieval", processor.get_intent(id))
            .await?;

        if remote.status.is_terminal() {
            self.reconcile(
                deadline,
                transactions.as_ref(),
                methods.as_ref(),
                processor.id(),
                &remote.id,
                remote.status,
                remote.payment_method_id.as_deref(),
            )
            .await?;
        } else {
            self.local_transaction(deadline, transactions.as_ref(), &remote.id)
                .await?;
            tracing::debug!(intent_id = %remote.id, provider_status = %remote.provider_status, "intent still open");
        }

        Ok(remote.into())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhooks
    // ─────────────────────────────────────────────────────────────────────────────

    /// Verifies and decodes a provider notification, then applies it.
    ///
    /// The decoded event is returned for every kind, including kinds with no
    /// local effect, so the caller can always acknowledge the delivery.
    #[tracing::instrument(skip(self, raw, headers), fields(bytes = raw.len()))]
    pub async fn parse_webhook(
        &self,
        provider: &str,
        raw: &[u8],
        headers: &HeaderMap,
    ) -> Result<PaymentEvent, AppError> {
        let processor = self.providers.get(provider)?;
        let transactions = self.repositories.transactions()?;
        let methods = self.repositories.payment_methods()?;

        let event = processor.parse_webhook(raw, headers).map_err(|e| {
            tracing::warn!(error = %e, "rejected webhook delivery");
            AppError::from(e)
        })?;

        let Some(target) = event.kind.target_status() else {
            tracing::debug!(kind = %event.kind, "event has no local effect");
            return Ok(event);
        };

        let intent_id = event.payment_intent.as_deref().ok_or_else(|| {
            AppError::Reconciliation(format!("{} event carries no payment intent", event.kind))
        })?;

        let deadline = Deadline::after(self.timeouts.webhook);
        deadline
            .run(
                "webhook reconciliation",
                self.reconcile(
                    deadline,
                    transactions.as_ref(),
                    methods.as_ref(),
                    processor.id(),
                    intent_id,
                    target,
                    event.payment_method.as_deref(),
                ),
            )
            .await?;

        Ok(event)
    }

    /// Moves the transaction for `intent_id` from `pending` to `target`.
    ///
    /// Replaying the current status is a no-op. A transaction that is
    /// already terminal with a different status is left unchanged.
    #[allow(clippy::too_many_arguments)]
    async fn reconcile(
        &self,
        deadline: Deadline,
        transactions: &dyn Repository<Transaction>,
        methods: &dyn Repository<PaymentMethod>,
        provider: ProviderId,
        intent_id: &str,
        target: TxStatus,
        event_method: Option<&str>,
    ) -> Result<Transaction, AppError> {
        let current = self
            .local_transaction(deadline, transactions, intent_id)
            .await?;

        let tx = if current.status == target {
            tracing::debug!(intent_id, status = %target, "status already applied");
            current
        } else if !current.status.can_transition_to(target) {
            tracing::warn!(
                intent_id,
                from = %current.status,
                to = %target,
                "ignoring transition out of a terminal status"
            );
            return Ok(current);
        } else {
            let filters = [
                Filter::eq("payment_intent_id", intent_id),
                Filter::eq("tx_status", TxStatus::Pending),
            ];
            match self
                .store(
                    deadline,
                    "status update",
                    transactions.update_status(target, &filters),
                )
                .await
            {
                Ok(_) => {
                    tracing::info!(intent_id, from = %current.status, to = %target, "transaction reconciled");
                    Transaction {
                        status: target,
                        updated_at: Utc::now(),
                        ..current
                    }
                }
                // Another delivery moved it first.
                Err(AppError::NoMatch) => {
                    let latest = self
                        .local_transaction(deadline, transactions, intent_id)
                        .await?;
                    if latest.status != target {
                        tracing::warn!(
                            intent_id,
                            status = %latest.status,
                            wanted = %target,
                            "transaction settled concurrently"
                        );
                        return Ok(latest);
                    }
                    latest
                }
                Err(err) => return Err(err),
            }
        };

        if target == TxStatus::Succeeded && tx.wants_method_saved() {
            match event_method.or(tx.payment_method_id.as_deref()) {
                Some(method_id) => {
                    self.remember_method(
                        deadline,
                        methods,
                        &tx.customer_id,
                        method_id,
                        provider,
                        tx.payment_method_type.clone(),
                    )
                    .await?
                }
                None => tracing::warn!(intent_id, "no payment method to remember"),
            }
        }

        Ok(tx)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Every stored payment method of a customer.
    #[tracing::instrument(skip(self))]
    pub async fn get_user_payment_methods(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentMethodResponse>, AppError> {
        let customer_id = require_id(customer_id)?;
        let methods = self.repositories.payment_methods()?;

        let rows = self
            .store(
                Deadline::after(self.timeouts.storage),
                "payment method lookup",
                methods.find_by_column("customer_id", customer_id.into()),
            )
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Transactions still `pending` that were created at or after `since`
    /// (default: the last 24 hours), newest first.
    #[tracing::instrument(skip(self))]
    pub async fn pending_transactions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, AppError> {
        let since = since.unwrap_or_else(|| Utc::now() - chrono::Duration::hours(24));
        let transactions = self.repositories.transactions()?;

        self.store(
            Deadline::after(self.timeouts.storage),
            "pending lookup",
            transactions.find_by_status(TxStatus::Pending, since),
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────────

    async fn local_transaction(
        &self,
        deadline: Deadline,
        transactions: &dyn Repository<Transaction>,
        intent_id: &str,
    ) -> Result<Transaction, AppError> {
        match self
            .store(
                deadline,
                "transaction lookup",
                transactions.find_by_payment_intent(intent_id),
            )
            .await
        {
            Err(AppError::NotFound(_)) => Err(AppError::Reconciliation(format!(
                "no transaction for payment intent {}",
                intent_id
            ))),
            other => other,
        }
    }

    /// Stores the payment method once per `(customer, method)` pair.
    async fn remember_method(
        &self,
        deadline: Deadline,
        methods: &dyn Repository<PaymentMethod>,
        customer_id: &str,
        method_id: &str,
        provider: ProviderId,
        method_type: Option<String>,
    ) -> Result<(), AppError> {
        let method = PaymentMethod::active(customer_id, method_id, provider, method_type);
        let inserted = self
            .store(
                deadline,
                "payment method insert",
                methods.create_if_absent(&method),
            )
            .await?;

        if inserted {
            tracing::info!(customer_id, payment_method_id = method_id, "payment method remembered");
        } else {
            tracing::debug!(customer_id, payment_method_id = method_id, "payment method already on file");
        }
        Ok(())
    }

    async fn handle_orphan_intent(
        &self,
        processor: &dyn PaymentProcessor,
        intent_id: &str,
        cause: &AppError,
    ) {
        match self.orphan_policy {
            OrphanIntentPolicy::Keep => {
                tracing::error!(intent_id, error = %cause, "intent created at the provider has no local record");
            }
            OrphanIntentPolicy::Cancel => {
                // The operation's own deadline may be spent already.
                let canceled = Deadline::after(self.timeouts.intent)
                    .run("intent cancellation", processor.cancel_intent(intent_id))
                    .await;
                match canceled {
                    Ok(_) => {
                        tracing::warn!(intent_id, error = %cause, "canceled intent that could not be recorded")
                    }
                    Err(err) => tracing::error!(
                        intent_id,
                        error = %cause,
                        cancel_error = %err,
                        "intent has no local record and could not be canceled"
                    ),
                }
            }
        }
    }

    /// One repository call, bounded by the operation's deadline and by the
    /// per-call storage cap, whichever comes first.
    async fn store<T>(
        &self,
        deadline: Deadline,
        stage: &'static str,
        fut: impl Future<Output = Result<T, payments_types::RepoError>>,
    ) -> Result<T, AppError> {
        deadline.capped(self.timeouts.storage).run(stage, fut).await
    }
}

/// Absolute point in time by which one operation must finish.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    /// The earlier of this deadline and `cap` from now.
    fn capped(self, cap: Duration) -> Self {
        let at = (Instant::now() + cap).min(self.at);
        Self {
            at,
            limit: self.limit.min(cap),
        }
    }

    /// Runs `fut` until the deadline. Dropping the future on expiry aborts
    /// the in-flight call.
    async fn run<T, E>(
        self,
        stage: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, AppError>
    where
        AppError: From<E>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => {
                tracing::warn!(stage, limit_ms = self.limit.as_millis() as u64, "deadline exceeded");
                Err(AppError::Timeout(stage))
            }
        }
    }
}

fn require_id(id: &str) -> Result<&str, AppError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::Validation("id cannot be empty".into()));
    }
    Ok(id)
}
