//! セラピスト・コース・ルーム・サイト設定の管理コマンド。

use std::fmt::Write as _;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use tracing::info;

use super::delete_row;
use crate::datastore::DatastoreClient;
use crate::models::{
    Course, CoursePayload, Room, RoomPayload, SettingsPayload, SiteSettings, Therapist,
    TherapistPayload, blank_to_none,
};
use crate::views::format_yen;

#[derive(Subcommand)]
pub enum TherapistCommand {
    /// 在籍中・非公開を含めて一覧表示する
    List,
    Create(TherapistArgs),
    Update {
        id: String,
        #[command(flatten)]
        fields: TherapistArgs,
    },
    Delete {
        id: String,
        /// 削除を確定する
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct TherapistArgs {
    #[arg(long)]
    name: String,
    /// URL に使う識別子（英小文字・数字・ハイフン）
    #[arg(long)]
    slug: String,
    #[arg(long)]
    main_image_url: Option<String>,
    #[arg(long)]
    profile_text: Option<String>,
    #[arg(long)]
    booking_url: Option<String>,
    /// 複数指定可
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long, default_value_t = 0)]
    sort_order: i32,
    #[arg(long)]
    newface: bool,
    /// 非公開にする
    #[arg(long)]
    inactive: bool,
}

impl TherapistArgs {
    fn into_payload(self) -> Result<TherapistPayload> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            bail!("Name must not be empty");
        }
        let slug = self.slug.trim().to_string();
        if !is_valid_slug(&slug) {
            bail!("Invalid slug: {slug:?} (use a-z, 0-9 and '-')");
        }

        Ok(TherapistPayload {
            name,
            slug,
            main_image_url: blank_to_none(self.main_image_url),
            profile_text: blank_to_none(self.profile_text),
            booking_url: blank_to_none(self.booking_url),
            tags: self
                .tags
                .into_iter()
                .filter_map(|tag| blank_to_none(Some(tag)))
                .collect(),
            sort_order: self.sort_order,
            is_newface: self.newface,
            is_active: !self.inactive,
        })
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

pub(super) async fn run_therapists(
    client: &DatastoreClient,
    command: TherapistCommand,
) -> Result<String> {
    match command {
        TherapistCommand::List => {
            let therapists = client
                .from("therapists")
                .select("*")
                .order("sort_order", true)
                .fetch::<Therapist>()
                .await
                .context("Failed to fetch therapists")?;
            Ok(render_therapist_rows(&therapists))
        }
        TherapistCommand::Create(args) => {
            let payload = args.into_payload()?;
            client
                .insert("therapists", &payload)
                .await
                .context("Failed to create therapist")?;
            info!(slug = %payload.slug, "Therapist created");
            Ok(format!("Created therapist {}", payload.slug))
        }
        TherapistCommand::Update { id, fields } => {
            let payload = fields.into_payload()?;
            client
                .from("therapists")
                .eq("id", &id)
                .update(&payload)
                .await
                .context("Failed to update therapist")?;
            info!(%id, "Therapist updated");
            Ok(format!("Updated therapist {id}"))
        }
        TherapistCommand::Delete { id, yes } => delete_row(client, "therapists", &id, yes).await,
    }
}

fn render_therapist_rows(therapists: &[Therapist]) -> String {
    let mut out = String::new();
    for t in therapists {
        let mut flags = Vec::new();
        if t.is_newface {
            flags.push("新人");
        }
        if !t.is_active {
            flags.push("非公開");
        }
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            t.sort_order,
            t.name,
            t.slug,
            flags.join(","),
            t.id
        );
    }
    out
}

#[derive(Subcommand)]
pub enum CourseCommand {
    List,
    Create(CourseArgs),
    Update {
        id: String,
        #[command(flatten)]
        fields: CourseArgs,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct CourseArgs {
    #[arg(long)]
    name: String,
    /// 分
    #[arg(long)]
    duration: u32,
    /// 円
    #[arg(long)]
    price: u64,
    #[arg(long, default_value_t = 0)]
    sort_order: i32,
    #[arg(long)]
    inactive: bool,
}

impl CourseArgs {
    fn into_payload(self) -> Result<CoursePayload> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            bail!("Name must not be empty");
        }
        if self.duration == 0 {
            bail!("Duration must be greater than 0");
        }
        Ok(CoursePayload {
            name,
            duration_min: self.duration,
            price: self.price,
            sort_order: self.sort_order,
            is_active: !self.inactive,
        })
    }
}

pub(super) async fn run_courses(client: &DatastoreClient, command: CourseCommand) -> Result<String> {
    match command {
        CourseCommand::List => {
            let courses = client
                .from("courses")
                .select("*")
                .order("sort_order", true)
                .fetch::<Course>()
                .await
                .context("Failed to fetch courses")?;
            let mut out = String::new();
            for c in &courses {
                let _ = writeln!(
                    out,
                    "{}\t{}\t{}分\t{}\t{}\t{}",
                    c.sort_order,
                    c.name,
                    c.duration_min,
                    format_yen(c.price),
                    if c.is_active { "" } else { "非公開" },
                    c.id
                );
            }
            Ok(out)
        }
        CourseCommand::Create(args) => {
            let payload = args.into_payload()?;
            client
                .insert("courses", &payload)
                .await
                .context("Failed to create course")?;
            info!(name = %payload.name, "Course created");
            Ok(format!("Created course {}", payload.name))
        }
        CourseCommand::Update { id, fields } => {
            let payload = fields.into_payload()?;
            client
                .from("courses")
                .eq("id", &id)
                .update(&payload)
                .await
                .context("Failed to update course")?;
            info!(%id, "Course updated");
            Ok(format!("Updated course {id}"))
        }
        CourseCommand::Delete { id, yes } => delete_row(client, "courses", &id, yes).await,
    }
}

#[derive(Subcommand)]
pub enum RoomCommand {
    List,
    Create(RoomArgs),
    Update {
        id: String,
        #[command(flatten)]
        fields: RoomArgs,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct RoomArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    area: Option<String>,
    #[arg(long)]
    access_note: Option<String>,
    #[arg(long, default_value_t = 0)]
    sort_order: i32,
}

impl RoomArgs {
    fn into_payload(self) -> Result<RoomPayload> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            bail!("Name must not be empty");
        }
        Ok(RoomPayload {
            name,
            area: blank_to_none(self.area),
            access_note: blank_to_none(self.access_note),
            sort_order: self.sort_order,
        })
    }
}

pub(super) async fn run_rooms(client: &DatastoreClient, command: RoomCommand) -> Result<String> {
    match command {
        RoomCommand::List => {
            let rooms = client
                .from("rooms")
                .select("id,name,area,access_note,sort_order")
                .order("sort_order", true)
                .fetch::<Room>()
                .await
                .context("Failed to fetch rooms")?;
            let mut out = String::new();
            for r in &rooms {
                let _ = writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    r.sort_order,
                    r.name,
                    r.area.as_deref().unwrap_or("-"),
                    r.id
                );
            }
            Ok(out)
        }
        RoomCommand::Create(args) => {
            let payload = args.into_payload()?;
            client
                .insert("rooms", &payload)
                .await
                .context("Failed to create room")?;
            info!(name = %payload.name, "Room created");
            Ok(format!("Created room {}", payload.name))
        }
        RoomCommand::Update { id, fields } => {
            let payload = fields.into_payload()?;
            client
                .from("rooms")
                .eq("id", &id)
                .update(&payload)
                .await
                .context("Failed to update room")?;
            info!(%id, "Room updated");
            Ok(format!("Updated room {id}"))
        }
        RoomCommand::Delete { id, yes } => delete_row(client, "rooms", &id, yes).await,
    }
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    Show,
    /// すべての項目を置き換える。省略・空文字の項目は未設定になる
    Update(SettingsArgs),
}

#[derive(Args)]
pub struct SettingsArgs {
    #[arg(long)]
    global_booking_url: Option<String>,
    #[arg(long)]
    line_url: Option<String>,
    #[arg(long)]
    instagram_url: Option<String>,
    #[arg(long)]
    x_url: Option<String>,
    #[arg(long)]
    notice_text: Option<String>,
}

impl From<SettingsArgs> for SettingsPayload {
    fn from(args: SettingsArgs) -> Self {
        Self {
            global_booking_url: blank_to_none(args.global_booking_url),
            line_url: blank_to_none(args.line_url),
            instagram_url: blank_to_none(args.instagram_url),
            x_url: blank_to_none(args.x_url),
            notice_text: blank_to_none(args.notice_text),
        }
    }
}

pub(super) async fn run_settings(
    client: &DatastoreClient,
    command: SettingsCommand,
) -> Result<String> {
    let current = client
        .from("site_settings")
        .select("*")
        .fetch_optional::<SiteSettings>()
        .await
        .context("Failed to fetch site settings")?;

    match command {
        SettingsCommand::Show => Ok(render_settings(&current.unwrap_or_default())),
        SettingsCommand::Update(args) => {
            let payload = SettingsPayload::from(args);
            // 設定は 1 行だけ。まだなければ作る
            match current.filter(|s| !s.id.is_empty()) {
                Some(settings) => client
                    .from("site_settings")
                    .eq("id", &settings.id)
                    .update(&payload)
                    .await
                    .context("Failed to update site settings")?,
                None => client
                    .insert("site_settings", &payload)
                    .await
                    .context("Failed to create site settings")?,
            }
            info!("Site settings updated");
            Ok("Updated site settings".to_string())
        }
    }
}

fn render_settings(settings: &SiteSettings) -> String {
    let fields = [
        ("global_booking_url", &settings.global_booking_url),
        ("line_url", &settings.line_url),
        ("instagram_url", &settings.instagram_url),
        ("x_url", &settings.x_url),
        ("notice_text", &settings.notice_text),
    ];
    let mut out = String::new();
    for (key, value) in fields {
        let _ = writeln!(out, "{key}: {}", value.as_deref().unwrap_or("(未設定)"));
    }
    out
}
