//! Bank import and matching against a mock finance backend

use finance_client::config::ApiConfig;
use finance_client::{BankImporter, ClientError, FinanceApi, TransactionMatcher};
use payment_core::{Field, MatchRequest, PaymentChannel, RawManualEntry, SessionProvider, ValidationError};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> FinanceApi {
    let config = ApiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        bearer_token: Some("test-token".to_string()),
    };
    FinanceApi::new(&config, SessionProvider::new()).unwrap()
}

async fn mount_unmatched_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/bank-transactions/unmatched"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": [
                {"id": 5, "bank_ref": "TXN-005", "amount": 250.0, "date": "2025-06-05", "description": "Tuition J. Doe", "status": "UNMATCHED"},
                {"id": 6, "bank_ref": "TXN-006", "amount": 1200.0, "date": "2025-06-03", "description": null, "status": "UNMATCHED"}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sync_summary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bank/sync"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "imported_count": 10,
            "auto_matched": 7,
            "unmatched": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = BankImporter::new(api_for(&server)).sync().await.unwrap();

    assert_eq!(summary.imported_count, 10);
    assert_eq!(summary.auto_matched, 7);
    assert_eq!(summary.needs_manual_review(), 3);
    assert!(summary.is_consistent());
}

#[tokio::test]
async fn test_manual_import_sends_validated_entry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bank/sync"))
        .and(body_partial_json(json!({
            "bank_ref": "TXN-2025-009",
            "amount": 250.5,
            "date": "2025-06-05",
            "description": "Tuition J. Doe"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "imported_count": 1,
            "auto_matched": 0,
            "unmatched": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entry = RawManualEntry {
        bank_ref: "  TXN-2025-009 ".to_string(),
        amount: "250.50".to_string(),
        date: "2025-06-05".to_string(),
        description: "Tuition J. Doe".to_string(),
    };

    let summary = BankImporter::new(api_for(&server))
        .import_batch(Some(&entry))
        .await
        .unwrap();
    assert_eq!(summary.unmatched, 1);
}

#[tokio::test]
async fn test_invalid_manual_entry_is_not_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bank/sync"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let entry = RawManualEntry {
        bank_ref: " ".to_string(),
        amount: "abc".to_string(),
        date: "2025-06-05".to_string(),
        description: String::new(),
    };

    let error = BankImporter::new(api_for(&server))
        .import_manual(&entry)
        .await
        .unwrap_err();

    match error {
        ClientError::Validation(errors) => {
            assert!(errors.contains(Field::BankRef));
            assert!(errors.contains(Field::Amount));
            assert!(!errors.contains(Field::Date));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_match_is_terminal() {
    let server = MockServer::start().await;
    mount_unmatched_listing(&server).await;

    Mock::given(method("POST"))
        .and(path("/bank-transactions/5/match"))
        .and(body_partial_json(json!({"payment_id": 41, "notes": "Paid at counter"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"msg": "Transaction matched"})))
        .expect(1)
        .mount(&server)
        .await;

    let matcher = TransactionMatcher::new(api_for(&server));
    let stats = matcher.refresh().await.unwrap();
    assert_eq!(stats.unmatched, 2);
    assert_eq!(stats.unmatched_amount, dec!(1450));

    let request = MatchRequest::existing(5, 41).with_notes("Paid at counter");
    let result = matcher.match_transaction(&request).await.unwrap();
    assert_eq!(result.message.as_deref(), Some("Transaction matched"));

    let error = matcher.match_transaction(&request).await.unwrap_err();
    assert!(matches!(error, ClientError::AlreadyMatched(5)));
    assert!(error.is_local());

    let stats = matcher.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.manually_matched, 1);
    assert_eq!(stats.unmatched, 1);

    let remaining = matcher.needs_attention();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 6);

    // A later refresh cannot reopen the matched transaction
    let stats = matcher.refresh().await.unwrap();
    assert_eq!(stats.manually_matched, 1);
    assert_eq!(stats.unmatched, 1);
}

#[tokio::test]
async fn test_match_creates_bank_transfer_payment_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bank-transactions/6/match"))
        .and(body_partial_json(json!({
            "create_payment": true,
            "student_id": 12,
            "payment_method": "BANK_TRANSFER"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "msg": "Transaction matched and payment created",
            "payment_id": 77
        })))
        .expect(1)
        .mount(&server)
        .await;

    let matcher = TransactionMatcher::new(api_for(&server));
    let result = matcher
        .match_transaction(&MatchRequest::new_payment(6, 12))
        .await
        .unwrap();

    assert_eq!(result.payment_id, Some(77));
}

#[tokio::test]
async fn test_match_new_payment_with_explicit_method() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bank-transactions/6/match"))
        .and(body_partial_json(json!({"student_id": 12, "payment_method": "MANUAL"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let matcher = TransactionMatcher::new(api_for(&server));
    let request = MatchRequest::new_payment(6, 12).with_method(PaymentChannel::Manual);
    let result = matcher.match_transaction(&request).await.unwrap();

    assert_eq!(result.message, None);
}

#[tokio::test]
async fn test_invalid_match_ids_are_not_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let matcher = TransactionMatcher::new(api_for(&server));

    let error = matcher
        .match_transaction(&MatchRequest::existing(5, 0))
        .await
        .unwrap_err();
    match error {
        ClientError::Validation(errors) => {
            assert_eq!(errors.get(Field::PaymentId), Some(&ValidationError::InvalidPaymentId));
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let error = matcher
        .match_transaction(&MatchRequest::new_payment(5, -1))
        .await
        .unwrap_err();
    match error {
        ClientError::Validation(errors) => {
            assert_eq!(errors.get(Field::StudentId), Some(&ValidationError::InvalidStudentId));
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let error = matcher
        .match_transaction(&MatchRequest::existing(0, 41))
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::UnknownTransaction(0)));
}
