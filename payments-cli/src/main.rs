//! Payments CLI
//!
//! Command-line interface for the payment orchestration API.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use payments_client::PaymentsClient;
use payments_stripe::signature;
use payments_types::{CurrencyCode, PaymentIntentRequest};

#[derive(Parser)]
#[command(name = "payments")]
#[command(author, version, about = "Payments API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Payments API
    #[arg(
        long,
        env = "PAYMENTS_API_URL",
        default_value = "http://localhost:8080"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Payment intent operations
    Intent {
        #[command(subcommand)]
        action: IntentCommands,
    },
    /// Charge a customer directly with a payment method token
    Charge {
        #[arg(long, default_value = "stripe")]
        provider: String,
        #[command(flatten)]
        payment: PaymentArgs,
        /// Provider payment method reference
        #[arg(long)]
        token: String,
    },
    /// List the payment methods remembered for a customer
    Methods {
        /// Customer ID
        customer: String,
    },
    /// List transactions still waiting on the provider
    Pending {
        /// RFC 3339 lower bound on creation time (default: last 24 hours)
        #[arg(long)]
        since: Option<String>,
    },
    /// Webhook tooling
    Webhook {
        #[command(subcommand)]
        action: WebhookCommands,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum IntentCommands {
    /// Create a payment intent
    Create {
        #[arg(long, default_value = "stripe")]
        provider: String,
        #[command(flatten)]
        payment: PaymentArgs,
    },
    /// Show the provider's current view of an intent
    Get {
        #[arg(long, default_value = "stripe")]
        provider: String,
        /// Payment intent ID
        id: String,
    },
    /// Pull the provider's status into the local record
    Sync {
        #[arg(long, default_value = "stripe")]
        provider: String,
        /// Payment intent ID
        id: String,
    },
}

#[derive(Subcommand)]
enum WebhookCommands {
    /// Print a Stripe-Signature header for a payload file
    Sign {
        /// Path to the JSON payload
        #[arg(long)]
        payload: String,
        #[arg(long, env = "STRIPE_WEBHOOK_SECRET")]
        secret: String,
    },
    /// Sign a payload and deliver it to the webhook endpoint
    Send {
        #[arg(long, default_value = "stripe")]
        provider: String,
        /// Path to the JSON payload
        #[arg(long)]
        payload: String,
        #[arg(long, env = "STRIPE_WEBHOOK_SECRET")]
        secret: String,
    },
}

#[derive(clap::Args)]
struct PaymentArgs {
    /// Amount in minor units (e.g. cents)
    #[arg(long)]
    amount: i64,
    /// ISO 4217 currency code
    #[arg(long, default_value = "usd")]
    currency: String,
    #[arg(long)]
    customer: String,
    /// Remember the payment method once the payment succeeds
    #[arg(long)]
    remember: bool,
    /// Your own reference for the transaction
    #[arg(long)]
    reference: Option<String>,
    /// Metadata entries as key=value
    #[arg(long = "meta", value_parser = parse_meta)]
    metadata: Vec<(String, String)>,
}

impl PaymentArgs {
    fn into_request(self, token: Option<String>) -> Result<PaymentIntentRequest> {
        let currency: CurrencyCode = self
            .currency
            .parse()
            .with_context(|| format!("Unknown currency: {}", self.currency))?;
        Ok(PaymentIntentRequest {
            amount: self.amount,
            currency,
            customer_id: self.customer,
            token,
            remember_me: Some(self.remember),
            metadata: self.metadata.into_iter().collect::<BTreeMap<_, _>>(),
            payment_method: None,
            internal_reference: self.reference,
        })
    }
}

fn parse_meta(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn parse_since(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp: {}", s))
}

fn signed_payload(path: &str, secret: &str) -> Result<(Vec<u8>, String)> {
    let payload = std::fs::read(path).with_context(|| format!("Cannot read {}", path))?;
    let header = signature::sign(secret, Utc::now().timestamp(), &payload)?;
    Ok((payload, header))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let client = PaymentsClient::new(&cli.api_url);

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Intent { action } => match action {
            IntentCommands::Create { provider, payment } => {
                let req = payment.into_request(None)?;
                print_json(&client.create_intent(&provider, &req).await?)?;
            }
            IntentCommands::Get { provider, id } => {
                print_json(&client.get_intent(&provider, &id).await?)?;
            }
            IntentCommands::Sync { provider, id } => {
                print_json(&client.sync_intent(&provider, &id).await?)?;
            }
        },

        Commands::Charge {
            provider,
            payment,
            token,
        } => {
            let req = payment.into_request(Some(token))?;
            print_json(&client.charge(&provider, &req).await?)?;
        }

        Commands::Methods { customer } => {
            print_json(&client.payment_methods(&customer).await?)?;
        }

        Commands::Pending { since } => {
            let since = since.as_deref().map(parse_since).transpose()?;
            print_json(&client.pending(since).await?)?;
        }

        Commands::Webhook { action } => match action {
            WebhookCommands::Sign { payload, secret } => {
                let (_, header) = signed_payload(&payload, &secret)?;
                println!("{}: {}", signature::SIGNATURE_HEADER, header);
            }
            WebhookCommands::Send {
                provider,
                payload,
                secret,
            } => {
                let (payload, header) = signed_payload(&payload, &secret)?;
                let mut headers = HeaderMap::new();
                headers.insert(
                    HeaderName::from_bytes(signature::SIGNATURE_HEADER.as_bytes())?,
                    HeaderValue::from_str(&header)?,
                );
                print_json(&client.send_webhook(&provider, payload, headers).await?)?;
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_args_build_request() {
        let cli = Cli::try_parse_from([
            "payments", "charge", "--amount", "1200", "--currency", "EUR", "--customer",
            "cust_9", "--token", "pm_card_visa", "--remember", "--meta", "order=42",
        ])
        .unwrap();

        let Commands::Charge { provider, payment, token } = cli.command else {
            panic!("expected charge");
        };
        assert_eq!(provider, "stripe");
        let req = payment.into_request(Some(token)).unwrap();
        assert_eq!(req.currency.as_str(), "eur");
        assert_eq!(req.token.as_deref(), Some("pm_card_visa"));
        assert!(req.remember());
        assert_eq!(req.metadata.get("order").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_bad_metadata_is_rejected() {
        assert!(parse_meta("order").is_err());
        assert!(
            Cli::try_parse_from([
                "payments", "intent", "create", "--amount", "1", "--customer", "c", "--meta",
                "nokey",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse_since() {
        assert!(parse_since("2026-01-01T00:00:00Z").is_ok());
        assert!(parse_since("yesterday").is_err());
    }
}
