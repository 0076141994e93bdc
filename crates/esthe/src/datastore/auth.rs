//! メールアドレスとパスワードによるログイン、ユーザー取得、ログアウト。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{DatastoreClient, DatastoreError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// ログインで得られるセッション。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: User,
}

impl DatastoreClient {
    /// パスワードでログインし、セッションを返す。
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let token: TokenResponse = self.send_json(request).await?;
        let expires_at = Duration::try_seconds(token.expires_in)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or(DatastoreError::InvalidExpiry(token.expires_in))?;

        info!(user_id = %token.user.id, "Signed in");
        Ok(Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        })
    }

    /// ログイン中のユーザーを取得する。
    ///
    /// セッションがない場合や、トークンが無効・期限切れの場合は None を返す。
    pub async fn get_user(&self) -> Result<Option<User>> {
        if !self.has_session() {
            return Ok(None);
        }

        let request = self.http.get(self.auth_url("user"));
        match self.send_json::<User>(request).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_unauthorized() => {
                debug!(error = %e, "Session is no longer valid");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// サーバー側のセッションを破棄する。既に無効なトークンはエラーにしない。
    pub async fn sign_out(&self) -> Result<()> {
        if !self.has_session() {
            return Ok(());
        }

        let request = self.http.post(self.auth_url("logout"));
        match self.send(request).await {
            Ok(_) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) if e.is_unauthorized() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::datastore::test_support::{ANON_KEY, client_for};

    fn session(token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            user: User {
                id: "user-1".to_string(),
                email: Some("admin@example.com".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn sign_in_returns_session() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", ANON_KEY))
            .and(body_json(
                json!({"email": "admin@example.com", "password": "secret"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-token",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-token",
                "user": {"id": "user-1", "email": "admin@example.com", "role": "authenticated"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let before = Utc::now();
        let session = client_for(&server.uri())
            .sign_in_with_password("admin@example.com", "secret")
            .await
            .unwrap();

        assert_eq!(session.access_token, "jwt-token");
        assert_eq!(session.user.id, "user-1");
        assert!(session.expires_at >= before + Duration::seconds(3600));
        assert!(!session.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn sign_in_failure_carries_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .sign_in_with_password("admin@example.com", "wrong")
            .await
            .unwrap_err();

        assert!(
            matches!(err, DatastoreError::Status { message, .. } if message == "Invalid login credentials")
        );
    }

    #[tokio::test]
    async fn out_of_range_expiry_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-token",
                "expires_in": i64::MAX,
                "refresh_token": "refresh-token",
                "user": {"id": "user-1"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server.uri())
            .sign_in_with_password("admin@example.com", "secret")
            .await
            .unwrap_err();

        assert!(matches!(err, DatastoreError::InvalidExpiry(i64::MAX)));
    }

    #[tokio::test]
    async fn get_user_uses_session_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer jwt-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "user-1", "email": "admin@example.com"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri()).with_session(&session("jwt-token"));
        let user = client.get_user().await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("admin@example.com"));
    }

    #[tokio::test]
    async fn get_user_without_session_skips_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let user = client_for(&server.uri()).get_user().await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn expired_token_means_no_user() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "Token expired"})))
            .mount(&server)
            .await;

        let client = client_for(&server.uri()).with_session(&session("stale"));
        assert!(client.get_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_out_tolerates_invalid_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri()).with_session(&session("stale"));
        client.sign_out().await.unwrap();
    }
}
