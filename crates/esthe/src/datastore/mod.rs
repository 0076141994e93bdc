//! ホスティングされたデータストア（REST クエリ API と認証 API）のクライアント。
//!
//! クライアントは明示的に生成して各処理へ渡す。グローバルなインスタンスは持たない。

mod auth;
mod query;

pub use auth::{Session, User};
pub use query::Query;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::DatastoreConfig;
use crate::version::user_agent;

#[derive(Error, Debug)]
pub enum DatastoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Datastore returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("Failed to decode datastore response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No row found in {table}")]
    NotFound { table: String },

    #[error("Session expiry out of range: expires_in = {0}")]
    InvalidExpiry(i64),
}

impl DatastoreError {
    /// 認証切れ・権限不足を示すステータスかどうか。
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            DatastoreError::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

pub type Result<T> = std::result::Result<T, DatastoreError>;

#[derive(Clone)]
pub struct DatastoreClient {
    http: reqwest::Client,
    /// 末尾のスラッシュを除いたプロジェクト URL
    base_url: String,
    anon_key: String,
    /// ログイン中ユーザーのアクセストークン
    access_token: Option<String>,
}

impl DatastoreClient {
    pub fn new(config: &DatastoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent())
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            access_token: None,
        })
    }

    /// ログインユーザーとしてリクエストするクライアントを返す。
    pub fn with_session(&self, session: &Session) -> Self {
        Self {
            access_token: Some(session.access_token.clone()),
            ..self.clone()
        }
    }

    pub fn has_session(&self) -> bool {
        self.access_token.is_some()
    }

    /// テーブルに対するクエリを組み立てる。
    pub fn from(&self, table: &str) -> Query<'_> {
        Query::new(self, table)
    }

    /// 行を追加する。
    pub async fn insert<P: Serialize + ?Sized>(&self, table: &str, payload: &P) -> Result<()> {
        let request = self
            .http
            .post(self.rest_url(table))
            .header("Prefer", "return=minimal")
            .json(payload);
        self.send(request).await?;
        debug!(table, "Inserted row");
        Ok(())
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// リクエストを送り、2xx 以外はステータスとメッセージを持つエラーにする。
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(DatastoreError::Status {
            status,
            message: error_message(&body),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let bytes = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// エラーレスポンスの本文から人が読めるメッセージを取り出す。
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::test_support::{ANON_KEY, client_for};

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(error_message(r#"{"message":"duplicate key"}"#), "duplicate key");
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login"}"#),
            "Invalid login"
        );
        assert_eq!(error_message(r#"{"msg":"Token expired"}"#), "Token expired");
        assert_eq!(error_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = client_for("https://abc.supabase.co/");
        assert_eq!(
            client.rest_url("rooms"),
            "https://abc.supabase.co/rest/v1/rooms"
        );
        assert_eq!(
            client.auth_url("user"),
            "https://abc.supabase.co/auth/v1/user"
        );
    }

    #[tokio::test]
    async fn insert_posts_payload_with_anon_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/rooms"))
            .and(header("apikey", ANON_KEY))
            .and(header("authorization", format!("Bearer {ANON_KEY}").as_str()))
            .and(header("prefer", "return=minimal"))
            .and(body_json(json!({"name": "Shibuya"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        client
            .insert("rooms", &json!({"name": "Shibuya"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn error_status_is_reported_with_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/rooms"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"message": "duplicate key"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client
            .insert("rooms", &json!({"name": "Shibuya"}))
            .await
            .unwrap_err();

        match err {
            DatastoreError::Status { status, message } => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(message, "duplicate key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
