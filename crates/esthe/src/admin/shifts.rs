//! シフトの管理コマンド。
//!
//! 日時は JST の壁時計（`2025-01-15T09:30`）で受け取り、UTC に変換して保存する。

use std::fmt::Write as _;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use esthe_core::{
    Instant, LocalDateTimeField, format_jst_date_time, local_field_to_utc_instant,
    start_of_today_jst_as_utc, utc_instant_to_local_field,
};
use tracing::info;

use super::delete_row;
use crate::datastore::DatastoreClient;
use crate::models::{OptionRow, Shift, ShiftPayload, blank_to_none};

const ADMIN_SHIFT_COLUMNS: &str =
    "id,start_at,end_at,note,is_active,therapist:therapists(id,name),room:rooms(id,name,area)";

#[derive(Subcommand)]
pub enum ShiftCommand {
    /// 本日 (JST) 以降のシフトを開始時刻順に表示する
    List {
        /// 過去のシフトも含める
        #[arg(long)]
        all: bool,
    },
    /// 入力に使うセラピストとルームの ID を表示する
    Options,
    Create(ShiftArgs),
    Update {
        id: String,
        #[command(flatten)]
        fields: ShiftArgs,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// 既存シフトを JST の入力形式で表示する
    EditForm { id: String },
}

#[derive(Args)]
pub struct ShiftArgs {
    /// セラピスト ID
    #[arg(long)]
    therapist: String,
    /// ルーム ID
    #[arg(long)]
    room: String,
    /// 開始日時 (JST, 例: 2025-01-15T09:30)
    #[arg(long)]
    start: String,
    /// 終了日時 (JST)
    #[arg(long)]
    end: String,
    #[arg(long)]
    note: Option<String>,
    #[arg(long)]
    inactive: bool,
}

impl ShiftArgs {
    fn into_payload(self) -> Result<ShiftPayload> {
        let therapist_id = self.therapist.trim().to_string();
        let room_id = self.room.trim().to_string();
        if therapist_id.is_empty() || room_id.is_empty() {
            bail!("Both --therapist and --room are required");
        }

        let start_at = parse_jst(&self.start).context("Invalid --start")?;
        let end_at = parse_jst(&self.end).context("Invalid --end")?;
        if end_at <= start_at {
            bail!(
                "End ({}) must be after start ({})",
                format_jst_date_time(end_at),
                format_jst_date_time(start_at)
            );
        }

        Ok(ShiftPayload {
            therapist_id,
            room_id,
            start_at,
            end_at,
            note: blank_to_none(self.note),
            is_active: !self.inactive,
        })
    }
}

fn parse_jst(input: &str) -> Result<Instant> {
    let field: LocalDateTimeField = input.parse()?;
    Ok(local_field_to_utc_instant(&field)?)
}

pub(super) async fn run(client: &DatastoreClient, command: ShiftCommand) -> Result<String> {
    match command {
        ShiftCommand::List { all } => {
            let query = client.from("shifts").select(ADMIN_SHIFT_COLUMNS);
            let query = if all {
                query
            } else {
                query.gte("start_at", start_of_today_jst_as_utc())
            };
            let shifts = query
                .order("start_at", true)
                .fetch::<Shift>()
                .await
                .context("Failed to fetch shifts")?;
            Ok(render_shift_rows(&shifts))
        }
        ShiftCommand::Options => {
            let therapists = client
                .from("therapists")
                .select("id,name")
                .order("sort_order", true)
                .fetch::<OptionRow>();
            let rooms = client
                .from("rooms")
                .select("id,name")
                .order("sort_order", true)
                .fetch::<OptionRow>();
            let (therapists, rooms) =
                tokio::try_join!(therapists, rooms).context("Failed to fetch options")?;
            Ok(render_options(&therapists, &rooms))
        }
        ShiftCommand::Create(args) => {
            let payload = args.into_payload()?;
            client
                .insert("shifts", &payload)
                .await
                .context("Failed to create shift")?;
            info!(
                therapist_id = %payload.therapist_id,
                start_at = %payload.start_at,
                "Shift created"
            );
            Ok(format!(
                "Created shift {}",
                format_jst_date_time(payload.start_at)
            ))
        }
        ShiftCommand::Update { id, fields } => {
            let payload = fields.into_payload()?;
            client
                .from("shifts")
                .eq("id", &id)
                .update(&payload)
                .await
                .context("Failed to update shift")?;
            info!(%id, start_at = %payload.start_at, "Shift updated");
            Ok(format!("Updated shift {id}"))
        }
        ShiftCommand::Delete { id, yes } => delete_row(client, "shifts", &id, yes).await,
        ShiftCommand::EditForm { id } => {
            let shift = client
                .from("shifts")
                .select(ADMIN_SHIFT_COLUMNS)
                .eq("id", &id)
                .fetch_one::<Shift>()
                .await
                .with_context(|| format!("Failed to fetch shift {id}"))?;
            Ok(render_edit_form(&shift))
        }
    }
}

fn render_shift_rows(shifts: &[Shift]) -> String {
    if shifts.is_empty() {
        return "No shifts\n".to_string();
    }
    let mut out = String::new();
    for shift in shifts {
        let _ = writeln!(
            out,
            "{} - {}\t{}\t{}\t{}\t{}",
            format_jst_date_time(shift.start_at),
            format_jst_date_time(shift.end_at),
            shift.therapist.as_ref().map_or("-", |t| t.name.as_str()),
            shift.room.as_ref().map_or("-", |r| r.name.as_str()),
            if shift.is_active { "公開" } else { "非公開" },
            shift.id
        );
    }
    out
}

fn render_options(therapists: &[OptionRow], rooms: &[OptionRow]) -> String {
    let mut out = String::from("therapists:\n");
    for row in therapists {
        let _ = writeln!(out, "  {}\t{}", row.id, row.name);
    }
    out.push_str("rooms:\n");
    for row in rooms {
        let _ = writeln!(out, "  {}\t{}", row.id, row.name);
    }
    out
}

/// `shifts update` にそのまま渡せる形で現在の値を表示する。
fn render_edit_form(shift: &Shift) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "id: {}", shift.id);
    let _ = writeln!(
        out,
        "therapist: {}",
        shift.therapist.as_ref().map_or("", |t| t.id.as_str())
    );
    let _ = writeln!(
        out,
        "room: {}",
        shift.room.as_ref().map_or("", |r| r.id.as_str())
    );
    let _ = writeln!(out, "start: {}", utc_instant_to_local_field(shift.start_at));
    let _ = writeln!(out, "end: {}", utc_instant_to_local_field(shift.end_at));
    let _ = writeln!(out, "note: {}", shift.note.as_deref().unwrap_or(""));
    let _ = writeln!(out, "active: {}", shift.is_active);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::datastore::test_support::client_for;

    fn args(start: &str, end: &str) -> ShiftArgs {
        ShiftArgs {
            therapist: "t1".to_string(),
            room: "r1".to_string(),
            start: start.to_string(),
            end: end.to_string(),
            note: Some(" ".to_string()),
            inactive: false,
        }
    }

    #[test]
    fn jst_input_is_stored_as_utc() {
        let payload = args("2025-01-15T09:30", "2025-01-15T12:30")
            .into_payload()
            .unwrap();
        assert_eq!(payload.start_at.to_string(), "2025-01-15T00:30:00.000Z");
        assert_eq!(payload.end_at.to_string(), "2025-01-15T03:30:00.000Z");
        assert_eq!(payload.note, None);
        assert!(payload.is_active);
    }

    #[test]
    fn shift_crossing_midnight_is_accepted() {
        let payload = args("2025-01-15T22:00", "2025-01-16 02:00")
            .into_payload()
            .unwrap();
        assert_eq!(payload.end_at.to_string(), "2025-01-15T17:00:00.000Z");
    }

    #[test]
    fn end_must_be_after_start() {
        assert!(args("2025-01-15T12:00", "2025-01-15T12:00").into_payload().is_err());
        assert!(args("2025-01-15T12:00", "2025-01-15T09:00").into_payload().is_err());
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(args("2025/01/15 09:30", "2025-01-15T12:00").into_payload().is_err());
        assert!(args("2025-01-15T09:30", "").into_payload().is_err());
        assert!(args("2025-01-15T09:30:00", "2025-01-15T12:00").into_payload().is_err());
    }

    fn shift() -> Shift {
        serde_json::from_value(json!({
            "id": "s1",
            "start_at": "2025-01-15T00:30:00Z",
            "end_at": "2025-01-15T03:30:00Z",
            "note": "指名のみ",
            "is_active": false,
            "therapist": {"id": "t1", "name": "Mika"},
            "room": {"id": "r1", "name": "Shibuya", "area": "渋谷"}
        }))
        .unwrap()
    }

    #[test]
    fn edit_form_shows_jst_values() {
        assert_eq!(
            render_edit_form(&shift()),
            "id: s1\ntherapist: t1\nroom: r1\nstart: 2025-01-15T09:30\nend: 2025-01-15T12:30\nnote: 指名のみ\nactive: false\n"
        );
    }

    #[test]
    fn rows_show_jst_range() {
        assert_eq!(
            render_shift_rows(&[shift()]),
            "01/15(水) 09:30 - 01/15(水) 12:30\tMika\tShibuya\t非公開\ts1\n"
        );
        assert_eq!(render_shift_rows(&[]), "No shifts\n");
    }

    #[tokio::test]
    async fn create_posts_utc_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/shifts"))
            .and(body_json(json!({
                "therapist_id": "t1",
                "room_id": "r1",
                "start_at": "2025-01-15T00:30:00.000Z",
                "end_at": "2025-01-15T03:30:00.000Z",
                "note": null,
                "is_active": true
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let out = run(
            &client,
            ShiftCommand::Create(args("2025-01-15T09:30", "2025-01-15T12:30")),
        )
        .await
        .unwrap();
        assert_eq!(out, "Created shift 01/15(水) 09:30");
    }

    #[tokio::test]
    async fn edit_form_fetches_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/shifts"))
            .and(query_param("id", "eq.s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "s1",
                    "start_at": "2025-01-15T00:30:00Z",
                    "end_at": "2025-01-15T03:30:00Z",
                    "note": null,
                    "therapist": {"id": "t1", "name": "Mika"},
                    "room": null
                }
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let out = run(&client, ShiftCommand::EditForm { id: "s1".to_string() })
            .await
            .unwrap();
        assert!(out.contains("start: 2025-01-15T09:30\n"));
        assert!(out.contains("room: \n"));
    }

    #[tokio::test]
    async fn options_lists_therapists_and_rooms() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/therapists"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "t1", "name": "Mika"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/rooms"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "r1", "name": "Shibuya"}])),
            )
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let out = run(&client, ShiftCommand::Options).await.unwrap();
        assert_eq!(out, "therapists:\n  t1\tMika\nrooms:\n  r1\tShibuya\n");
    }
}
