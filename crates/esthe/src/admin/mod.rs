//! 管理者向けの操作。すべての操作は [`require_admin`] による確認を通す。

mod catalog;
mod shifts;

pub use catalog::{CourseCommand, RoomCommand, SettingsCommand, TherapistCommand};
pub use shifts::ShiftCommand;

use anyhow::{Context as _, Result, bail};
use clap::Subcommand;
use tracing::{info, warn};

use crate::datastore::{DatastoreClient, User};
use crate::models::Profile;
use crate::session::SessionStore;

#[derive(Subcommand)]
pub enum AdminCommand {
    /// セラピストの管理
    #[command(subcommand)]
    Therapists(TherapistCommand),
    /// コースの管理
    #[command(subcommand)]
    Courses(CourseCommand),
    /// ルームの管理
    #[command(subcommand)]
    Rooms(RoomCommand),
    /// シフトの管理（日時は JST で入力する）
    #[command(subcommand)]
    Shifts(ShiftCommand),
    /// サイト設定の管理
    #[command(subcommand)]
    Settings(SettingsCommand),
}

/// 管理画面へのアクセス可否。
#[derive(Debug, Clone, PartialEq)]
pub enum AdminStatus {
    Unauthenticated,
    Forbidden(User),
    Ready(User),
}

/// ログイン中のユーザーと、その `profiles.is_admin` を確認する。
pub async fn check_access(client: &DatastoreClient) -> Result<AdminStatus> {
    let Some(user) = client
        .get_user()
        .await
        .context("Failed to fetch current user")?
    else {
        return Ok(AdminStatus::Unauthenticated);
    };

    let profile = client
        .from("profiles")
        .select("is_admin")
        .eq("id", &user.id)
        .fetch_optional::<Profile>()
        .await;

    match profile {
        Ok(Some(profile)) if profile.is_admin => Ok(AdminStatus::Ready(user)),
        Ok(_) => Ok(AdminStatus::Forbidden(user)),
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "Failed to fetch profile");
            Ok(AdminStatus::Forbidden(user))
        }
    }
}

pub async fn require_admin(client: &DatastoreClient) -> Result<User> {
    match check_access(client).await? {
        AdminStatus::Ready(user) => Ok(user),
        AdminStatus::Unauthenticated => bail!("Not signed in. Run `esthe login` first"),
        AdminStatus::Forbidden(user) => bail!(
            "{} does not have admin access",
            user.email.as_deref().unwrap_or(&user.id)
        ),
    }
}

pub async fn run(client: &DatastoreClient, command: AdminCommand) -> Result<String> {
    let user = require_admin(client).await?;
    info!(user_id = %user.id, "Admin access granted");

    match command {
        AdminCommand::Therapists(command) => catalog::run_therapists(client, command).await,
        AdminCommand::Courses(command) => catalog::run_courses(client, command).await,
        AdminCommand::Rooms(command) => catalog::run_rooms(client, command).await,
        AdminCommand::Shifts(command) => shifts::run(client, command).await,
        AdminCommand::Settings(command) => catalog::run_settings(client, command).await,
    }
}

pub async fn login(
    client: &DatastoreClient,
    store: &mut SessionStore,
    email: &str,
    password: &str,
) -> Result<String> {
    let session = client
        .sign_in_with_password(email, password)
        .await
        .context("Failed to sign in")?;
    let email = session.user.email.clone().unwrap_or_else(|| email.to_string());
    store.set(session)?;
    Ok(format!("Signed in as {email}"))
}

/// サーバー側のログアウトに失敗しても、手元のセッションは破棄する。
pub async fn logout(client: &DatastoreClient, store: &mut SessionStore) -> Result<String> {
    if let Some(session) = store.session() {
        if let Err(e) = client.with_session(session).sign_out().await {
            warn!(error = %e, "Failed to sign out on the server");
        }
    }
    store.clear()?;
    Ok("Signed out".to_string())
}

pub async fn whoami(client: &DatastoreClient) -> Result<String> {
    Ok(match check_access(client).await? {
        AdminStatus::Unauthenticated => "Not signed in".to_string(),
        AdminStatus::Forbidden(user) => format!("{} (no admin access)", display_user(&user)),
        AdminStatus::Ready(user) => format!("{} (admin)", display_user(&user)),
    })
}

fn display_user(user: &User) -> &str {
    user.email.as_deref().unwrap_or(&user.id)
}

/// 削除は `--yes` を付けたときだけ実行する。
async fn delete_row(client: &DatastoreClient, table: &str, id: &str, yes: bool) -> Result<String> {
    if !yes {
        bail!("Refusing to delete {table}/{id} without --yes");
    }
    client
        .from(table)
        .eq("id", id)
        .delete()
        .await
        .with_context(|| format!("Failed to delete {table}/{id}"))?;
    info!(table, id, "Deleted");
    Ok(format!("Deleted {table}/{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::datastore::Session;
    use crate::datastore::test_support::client_for;

    fn session() -> Session {
        Session {
            access_token: "jwt".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            user: User {
                id: "user-1".to_string(),
                email: Some("admin@example.com".to_string()),
            },
        }
    }

    async fn mount_user(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "user-1", "email": "admin@example.com"})),
            )
            .mount(server)
            .await;
    }

    async fn mount_profile(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn no_session_is_unauthenticated() {
        let server = MockServer::start().await;
        let client = client_for(&server.uri());

        assert_eq!(
            check_access(&client).await.unwrap(),
            AdminStatus::Unauthenticated
        );
        assert!(require_admin(&client).await.is_err());
    }

    #[tokio::test]
    async fn admin_profile_is_ready() {
        let server = MockServer::start().await;
        mount_user(&server).await;
        mount_profile(&server, json!([{"is_admin": true}])).await;

        let client = client_for(&server.uri()).with_session(&session());
        let user = require_admin(&client).await.unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(whoami(&client).await.unwrap(), "admin@example.com (admin)");
    }

    #[tokio::test]
    async fn missing_or_false_profile_is_forbidden() {
        for body in [json!([]), json!([{"is_admin": false}])] {
            let server = MockServer::start().await;
            mount_user(&server).await;
            mount_profile(&server, body).await;

            let client = client_for(&server.uri()).with_session(&session());
            assert!(matches!(
                check_access(&client).await.unwrap(),
                AdminStatus::Forbidden(_)
            ));
        }
    }

    #[tokio::test]
    async fn profile_error_is_forbidden() {
        let server = MockServer::start().await;
        mount_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server.uri()).with_session(&session());
        assert!(matches!(
            check_access(&client).await.unwrap(),
            AdminStatus::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/courses"))
            .and(query_param("id", "eq.c1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        assert!(delete_row(&client, "courses", "c1", false).await.is_err());
        assert_eq!(
            delete_row(&client, "courses", "c1", true).await.unwrap(),
            "Deleted courses/c1"
        );
    }

    #[tokio::test]
    async fn login_and_logout_update_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt",
                "refresh_token": "refresh",
                "expires_in": 3600,
                "user": {"id": "user-1", "email": "admin@example.com"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::load(dir.path().join("session.json")).unwrap();
        let client = client_for(&server.uri());

        let message = login(&client, &mut store, "admin@example.com", "secret")
            .await
            .unwrap();
        assert_eq!(message, "Signed in as admin@example.com");
        assert_eq!(store.session().unwrap().access_token, "jwt");

        logout(&client, &mut store).await.unwrap();
        assert!(store.session().is_none());
    }
}
