//! Finance Console - command-line access to the student finance portal
//!
//! Each invocation performs one operation and prints the result as JSON.
//! Failures print the user-facing message and exit non-zero.

#![forbid(unsafe_code)]

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use finance_client::config::LoggingConfig;
use finance_client::{
    metrics, AuthClient, BankImporter, ClientError, CollectionsClient, Config, FinanceApi, PaymentClient,
    TransactionMatcher, VerificationClient,
};
use payment_core::collections::is_block_eligible;
use payment_core::reconciliation::parse_positive_amount;
use payment_core::{
    check_bank_transfer, validate_card, BankTransferFields, CollectionsAction, Field, FieldErrors, MatchRequest, PaymentChannel, ProofDocument,
    RawCardFields, RawManualEntry, SessionProvider, TargetSet, ValidationError,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "finance-console",
    version,
    about = "Command-line console for the student finance portal"
)]
struct Cli {
    /// Backend base URL, e.g. http://localhost:5000/api
    #[arg(long, env = "FINANCE_API_URL")]
    api_url: Option<String>,

    /// Bearer token from a previous login
    #[arg(long, env = "FINANCE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log in with these credentials before running the command
    #[arg(long, env = "FINANCE_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "FINANCE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print request metrics to stderr when the command finishes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ChannelArg {
    Online,
    BankTransfer,
    Manual,
}

impl From<ChannelArg> for PaymentChannel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Online => PaymentChannel::Online,
            ChannelArg::BankTransfer => PaymentChannel::BankTransfer,
            ChannelArg::Manual => PaymentChannel::Manual,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and print the session token
    Login,

    /// Pay by card
    PayCard {
        #[arg(long)]
        number: String,

        /// Expiry as MM/YY
        #[arg(long)]
        expiry: String,

        #[arg(long)]
        cvv: String,

        /// Cardholder name as printed on the card
        #[arg(long)]
        name: String,

        /// Amount to pay; defaults to the outstanding balance
        #[arg(long)]
        amount: Option<String>,
    },

    /// Pay by bank transfer with a proof of payment
    PayTransfer {
        /// Bank transfer reference
        #[arg(long)]
        reference: String,

        /// Proof document (pdf, png, jpg, jpeg)
        #[arg(long)]
        proof: Option<PathBuf>,

        /// Amount to pay; defaults to the outstanding balance
        #[arg(long)]
        amount: Option<String>,
    },

    /// Show enrollment and outstanding balance
    Status,

    /// Show payment history
    History,

    /// Sync transactions from the bank feed
    Sync,

    /// Record a single bank transaction by hand
    Import {
        #[arg(long)]
        bank_ref: String,

        #[arg(long)]
        amount: String,

        /// Transaction date as YYYY-MM-DD
        #[arg(long)]
        date: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// List unmatched bank transactions
    Unmatched,

    /// Match a bank transaction to an existing payment
    MatchExisting {
        #[arg(long)]
        transaction: i64,

        #[arg(long)]
        payment: i64,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Match a bank transaction by creating a payment for a student
    MatchNew {
        #[arg(long)]
        transaction: i64,

        #[arg(long)]
        student: i64,

        /// Defaults to bank transfer
        #[arg(long, value_enum)]
        method: Option<ChannelArg>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Send payment reminders
    Remind {
        /// One id for an individual reminder, several for bulk
        #[arg(required = true, num_args = 1..)]
        students: Vec<i64>,
    },

    /// Apply a late-payment penalty
    Penalize {
        #[arg(required = true, num_args = 1..)]
        students: Vec<i64>,

        /// Penalty amount; defaults to the configured penalty
        #[arg(long)]
        amount: Option<String>,
    },

    /// Block course registration
    Block {
        #[arg(required = true, num_args = 1..)]
        students: Vec<i64>,

        /// Days overdue, checked against the blocking policy
        #[arg(long)]
        days_overdue: Option<i64>,
    },

    /// List bank transfers awaiting verification
    Pending,

    /// Verify a pending payment
    Verify {
        #[arg(long)]
        payment: i64,
    },

    /// Reject a pending payment
    Reject {
        #[arg(long)]
        payment: i64,

        #[arg(long)]
        reason: String,
    },

    /// Download a payment's proof document
    Proof {
        #[arg(long)]
        payment: i64,

        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    init_tracing(&config.logging);

    let print_metrics = cli.metrics;
    let code = match run(cli, config).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e.user_message());
            ExitCode::from(if e.is_local() { 2 } else { 1 })
        }
    };

    if print_metrics {
        eprint!("{}", metrics::gather_text());
    }
    code
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::from_env().context("failed to load configuration")?;

    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.api.bearer_token = Some(token.clone());
    }

    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn to_json<T: Serialize>(value: &T) -> finance_client::Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| ClientError::Decode(e.to_string()))
}

fn invalid(field: Field, error: ValidationError) -> ClientError {
    ClientError::Validation(FieldErrors::single(field, error))
}

/// Refuse input that needs no backend data before anything is fetched
fn check_locally<T>(operation: &str, result: Result<T, FieldErrors>) -> finance_client::Result<T> {
    result.map_err(|errors| {
        metrics::record_local_rejection(operation);
        warn!(operation, "Rejected locally: {}", errors);
        ClientError::Validation(errors)
    })
}

fn targets(students: Vec<i64>) -> TargetSet {
    match students.as_slice() {
        [single] => TargetSet::Single(*single),
        _ => TargetSet::Many(students),
    }
}

async fn read_proof(path: &Path, max_bytes: usize) -> finance_client::Result<ProofDocument> {
    let size = tokio::fs::metadata(path).await?.len();
    if size > max_bytes as u64 {
        return Err(invalid(
            Field::ProofDocument,
            ValidationError::ProofTooLarge {
                size: usize::try_from(size).unwrap_or(usize::MAX),
                max: max_bytes,
            },
        ));
    }

    let content = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    ProofDocument::with_limit(file_name, content, max_bytes).map_err(|e| invalid(Field::ProofDocument, e))
}

async fn run(cli: Cli, config: Config) -> finance_client::Result<String> {
    let api = FinanceApi::new(&config.api, SessionProvider::new())?;
    let auth = AuthClient::new(api.clone());

    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        let session = auth.login(username, password).await?;
        if matches!(cli.command, Commands::Login) {
            return to_json(&json!({
                "access_token": session.token(),
                "user": session.user(),
            }));
        }
    } else if matches!(cli.command, Commands::Login) {
        return Err(ClientError::Session(payment_core::SessionError::NotAuthenticated));
    }

    let now = Utc::now();

    match cli.command {
        Commands::Login => Err(ClientError::Session(payment_core::SessionError::NotAuthenticated)),

        Commands::PayCard {
            number,
            expiry,
            cvv,
            name,
            amount,
        } => {
            let card = RawCardFields {
                number,
                expiry,
                cvv,
                holder_name: name,
            };
            check_locally("submit_payment", validate_card(&card, now.date_naive()))?;

            let payments = PaymentClient::new(api);
            let amount = resolve_amount(&payments, amount.as_deref()).await?;
            to_json(&payments.pay_card(&card, amount, now).await?)
        }

        Commands::PayTransfer {
            reference,
            proof,
            amount,
        } => {
            let proof_document = match proof {
                Some(path) => Some(read_proof(&path, config.payments.max_proof_bytes).await?),
                None => None,
            };
            let fields = BankTransferFields {
                reference_number: reference,
                proof_document,
            };
            check_locally("submit_payment", check_bank_transfer(&fields))?;

            let payments = PaymentClient::new(api);
            let amount = resolve_amount(&payments, amount.as_deref()).await?;
            to_json(&payments.pay_bank_transfer(fields, amount, now).await?)
        }

        Commands::Status => to_json(&PaymentClient::new(api).status().await?),

        Commands::History => to_json(&PaymentClient::new(api).history().await?),

        Commands::Sync => {
            let summary = BankImporter::new(api).sync().await?;
            to_json(&json!({
                "summary": summary,
                "needs_manual_review": summary.needs_manual_review(),
                "message": summary.message(),
            }))
        }

        Commands::Import {
            bank_ref,
            amount,
            date,
            description,
        } => {
            let entry = RawManualEntry {
                bank_ref,
                amount,
                date,
                description,
            };
            let summary = BankImporter::new(api).import_batch(Some(&entry)).await?;
            to_json(&json!({
                "summary": summary,
                "needs_manual_review": summary.needs_manual_review(),
                "message": summary.message(),
            }))
        }

        Commands::Unmatched => {
            let matcher = TransactionMatcher::new(api);
            let stats = matcher.refresh().await?;
            to_json(&json!({
                "transactions": matcher.needs_attention(),
                "stats": stats,
            }))
        }

        Commands::MatchExisting {
            transaction,
            payment,
            notes,
        } => {
            let mut request = MatchRequest::existing(transaction, payment);
            if let Some(notes) = notes {
                request = request.with_notes(notes);
            }
            let matcher = TransactionMatcher::new(api);
            matcher.refresh().await?;
            to_json(&matcher.match_transaction(&request).await?)
        }

        Commands::MatchNew {
            transaction,
            student,
            method,
            notes,
        } => {
            let mut request = MatchRequest::new_payment(transaction, student);
            if let Some(method) = method {
                request = request.with_method(method.into());
            }
            if let Some(notes) = notes {
                request = request.with_notes(notes);
            }
            let matcher = TransactionMatcher::new(api);
            matcher.refresh().await?;
            to_json(&matcher.match_transaction(&request).await?)
        }

        Commands::Remind { students } => {
            let action = CollectionsAction::reminder(targets(students))?;
            to_json(&CollectionsClient::new(api).execute(&action).await?)
        }

        Commands::Penalize { students, amount } => {
            let amount = amount.unwrap_or_else(|| config.payments.default_penalty.clone());
            let action = CollectionsAction::penalty(targets(students), &amount)?;
            to_json(&CollectionsClient::new(api).execute(&action).await?)
        }

        Commands::Block { students, days_overdue } => {
            if let Some(days) = days_overdue {
                if !is_block_eligible(days) {
                    warn!(days_overdue = days, "Blocking a student who is not past the overdue threshold");
                }
            }
            let action = CollectionsAction::block(targets(students))?;
            to_json(&CollectionsClient::new(api).execute(&action).await?)
        }

        Commands::Pending => to_json(&VerificationClient::new(api).pending().await?),

        Commands::Verify { payment } => to_json(&VerificationClient::new(api).verify(payment).await?),

        Commands::Reject { payment, reason } => {
            to_json(&VerificationClient::new(api).reject(payment, &reason).await?)
        }

        Commands::Proof { payment, output } => {
            let content = VerificationClient::new(api).fetch_proof(payment).await?;
            tokio::fs::write(&output, &content).await?;
            to_json(&json!({
                "payment_id": payment,
                "output": output.display().to_string(),
                "bytes": content.len(),
            }))
        }
    }
}

/// Amount given on the command line, else the outstanding balance
async fn resolve_amount(payments: &PaymentClient, raw: Option<&str>) -> finance_client::Result<Decimal> {
    match raw {
        Some(raw) => parse_positive_amount(raw).ok_or_else(|| invalid(Field::Amount, ValidationError::InvalidAmount)),
        None => payments.outstanding_balance().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payment_core::collections::parse_penalty_amount;
    use wiremock::MockServer;

    async fn run_against(server: &MockServer, args: &[&str]) -> finance_client::Result<String> {
        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.api.bearer_token = Some("test-token".to_string());

        let mut argv = vec!["finance-console"];
        argv.extend_from_slice(args);
        run(Cli::parse_from(argv), config).await
    }

    #[tokio::test]
    async fn test_transfer_without_proof_never_reaches_backend() {
        let server = MockServer::start().await;

        let error = run_against(&server, &["pay-transfer", "--reference", "TRF-001"])
            .await
            .unwrap_err();

        match error {
            ClientError::Validation(errors) => {
                assert_eq!(errors.get(Field::ProofDocument), Some(&ValidationError::MissingProof));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(server.received_requests().await.unwrap().is_empty());

        let text = metrics::gather_text();
        assert!(text.contains("finance_local_validation_failures_total{operation=\"submit_payment\"}"));
    }

    #[tokio::test]
    async fn test_invalid_card_never_reaches_backend() {
        let server = MockServer::start().await;

        let error = run_against(
            &server,
            &[
                "pay-card",
                "--number",
                "4532015112830367",
                "--expiry",
                "12/30",
                "--cvv",
                "123",
                "--name",
                "John Smith",
            ],
        )
        .await
        .unwrap_err();

        assert!(error.is_local());
        assert!(matches!(error, ClientError::Validation(ref errors) if errors.contains(Field::CardNumber)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_proof_is_refused_before_reading() {
        let path = std::env::temp_dir().join(format!("finance-console-proof-{}.pdf", std::process::id()));
        tokio::fs::write(&path, vec![0u8; 64]).await.unwrap();

        let result = read_proof(&path, 16).await;
        tokio::fs::remove_file(&path).await.unwrap();

        match result.unwrap_err() {
            ClientError::Validation(errors) => {
                assert_eq!(
                    errors.get(Field::ProofDocument),
                    Some(&ValidationError::ProofTooLarge { size: 64, max: 16 })
                );
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_metrics_flag_is_global() {
        let cli = Cli::parse_from(["finance-console", "pending", "--metrics"]);
        assert!(cli.metrics);
        assert!(matches!(cli.command, Commands::Pending));
    }

    #[test]
    fn test_cli_parses_bulk_penalty() {
        let cli = Cli::parse_from(["finance-console", "penalize", "3", "4", "--amount", "75.50"]);
        match cli.command {
            Commands::Penalize { students, amount } => {
                assert_eq!(students, vec![3, 4]);
                assert_eq!(amount.as_deref(), Some("75.50"));
                assert!(parse_penalty_amount("75.50").is_ok());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_single_student_targets_individual_endpoint() {
        assert_eq!(targets(vec![9]), TargetSet::Single(9));
        assert_eq!(targets(vec![1, 2]), TargetSet::Many(vec![1, 2]));
    }
}
