use crate::api::FinanceApi;
use crate::error::Result;
use payment_core::{LoginResponse, Session};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Login and logout against the session provider the API was built with
#[derive(Debug, Clone)]
pub struct AuthClient {
    api: FinanceApi,
}

impl AuthClient {
    pub fn new(api: FinanceApi) -> Self {
        Self { api }
    }

    /// Authenticate and load the resulting session
    pub async fn login(&self, username: &str, password: &str) -> Result<Arc<Session>> {
        let response: LoginResponse = self
            .api
            .post_json("login", "/auth/login", Some(&LoginRequest { username, password }))
            .await?;

        let session = Session::from_login(response)?;
        info!(
            user_id = session.user().id,
            role = ?session.role(),
            "Logged in as {}",
            session.user().username
        );
        Ok(self.api.sessions().load(session))
    }

    pub fn logout(&self) {
        self.api.sessions().clear();
        info!("Session cleared");
    }
}
