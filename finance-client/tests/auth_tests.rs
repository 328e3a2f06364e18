//! Login, session gating and logout

use finance_client::config::ApiConfig;
use finance_client::{AuthClient, ClientError, FinanceApi, PaymentClient, VerificationClient};
use payment_core::{Role, SessionError, SessionProvider};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_without_token(server: &MockServer) -> FinanceApi {
    let config = ApiConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        bearer_token: None,
    };
    FinanceApi::new(&config, SessionProvider::new()).unwrap()
}

async fn mount_login(server: &MockServer, is_admin: bool) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "jsmith", "password": "hunter22"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-abc",
            "user_id": 7,
            "username": "jsmith",
            "is_admin": is_admin,
            "email": "jsmith@example.edu"
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_loads_student_session() {
    let server = MockServer::start().await;
    mount_login(&server, false).await;

    Mock::given(method("GET"))
        .and(path("/students/status"))
        .and(header("authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dues_balance": 800.0})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_without_token(&server);
    let session = AuthClient::new(api.clone()).login("jsmith", "hunter22").await.unwrap();

    assert_eq!(session.role(), Role::Student);
    assert_eq!(session.user().id, 7);
    assert!(api.sessions().is_authenticated());

    let balance = PaymentClient::new(api).outstanding_balance().await.unwrap();
    assert_eq!(balance, dec!(800));
}

#[tokio::test]
async fn test_student_session_is_denied_finance_operations() {
    let server = MockServer::start().await;
    mount_login(&server, false).await;

    Mock::given(method("GET"))
        .and(path("/payments/pending"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = api_without_token(&server);
    AuthClient::new(api.clone()).login("jsmith", "hunter22").await.unwrap();

    let error = VerificationClient::new(api).pending().await.unwrap_err();
    assert!(matches!(
        error,
        ClientError::Session(SessionError::AccessDenied { .. })
    ));
    assert!(error.is_local());
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = MockServer::start().await;
    mount_login(&server, true).await;

    let api = api_without_token(&server);
    let auth = AuthClient::new(api.clone());
    let session = auth.login("jsmith", "hunter22").await.unwrap();
    assert_eq!(session.role(), Role::Finance);

    auth.logout();
    assert!(!api.sessions().is_authenticated());

    let error = VerificationClient::new(api).pending().await.unwrap_err();
    assert!(matches!(error, ClientError::Session(SessionError::NotAuthenticated)));
}

#[tokio::test]
async fn test_failed_login_keeps_no_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "Bad username or password"})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_without_token(&server);
    let error = AuthClient::new(api.clone())
        .login("jsmith", "wrong")
        .await
        .unwrap_err();

    assert_eq!(error.user_message(), "Bad username or password");
    assert!(!api.sessions().is_authenticated());
}
