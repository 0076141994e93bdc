mod admin;
mod config;
mod datastore;
mod models;
mod session;
mod version;
mod views;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use esthe_core::{RoomFilter, ScheduleQuery, WindowDays};
use tracing::{info, warn};

use crate::{
    admin::AdminCommand,
    config::{open_config, write_default_config},
    datastore::DatastoreClient,
    session::SessionStore,
    version::short_version,
};

#[derive(Parser)]
#[command(version = short_version())]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(long)]
    init: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// トップページ
    Home,
    /// セラピスト一覧
    Therapists,
    /// セラピスト詳細
    Therapist { slug: String },
    /// 料金表
    Pricing,
    /// アクセス
    Access,
    /// 求人情報
    Recruit,
    /// シフト表
    Schedule {
        /// 表示日数 (7 または 14)
        #[arg(long)]
        days: Option<String>,
        /// ルーム ID、または all
        #[arg(long)]
        room: Option<String>,
    },
    /// 公開ページの URL 一覧
    Sitemap,
    /// 管理者としてログインする
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// ログイン中のユーザーを表示する
    Whoami,
    /// 管理者向けの操作
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.init {
        write_default_config(&args.config)?;
        info!(path = ?args.config, "Created default configuration");
        return Ok(());
    }

    tracing::debug!(version = short_version(), "esthe version");

    let config = open_config(&args.config).context("Failed to load configuration")?;
    let mut store = SessionStore::load_or_empty(&config.site.session_file);

    let anonymous =
        DatastoreClient::new(&config.datastore).context("Failed to build datastore client")?;
    let client = match store.session() {
        Some(session) if session.is_expired(Utc::now()) => {
            warn!("Stored session has expired, continuing as anonymous");
            anonymous.clone()
        }
        Some(session) => anonymous.with_session(session),
        None => anonymous.clone(),
    };

    let output = match args.command.unwrap_or(Command::Home) {
        Command::Home => views::public::home(&anonymous).await,
        Command::Therapists => views::public::therapists(&anonymous).await?,
        Command::Therapist { slug } => views::public::therapist_detail(&anonymous, &slug).await?,
        Command::Pricing => views::public::pricing(&anonymous).await?,
        Command::Access => views::public::access(&anonymous).await?,
        Command::Recruit => views::public::recruit(),
        Command::Schedule { days, room } => {
            let query = ScheduleQuery {
                days: WindowDays::from_query(days.as_deref()),
                room: RoomFilter::from_query(room.as_deref()),
            };
            views::schedule::schedule(&anonymous, &query).await?
        }
        Command::Sitemap => views::sitemap(&config.site.base_url),
        Command::Login { email, password } => {
            admin::login(&anonymous, &mut store, &email, &password).await?
        }
        Command::Logout => admin::logout(&anonymous, &mut store).await?,
        Command::Whoami => admin::whoami(&client).await?,
        Command::Admin(command) => admin::run(&client, command).await?,
    };

    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
