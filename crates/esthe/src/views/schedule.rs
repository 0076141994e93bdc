//! シフト表ページ。本日 (JST) から 7 日または 14 日分を日別に表示する。

use std::fmt::Write as _;

use anyhow::{Context as _, Result};
use esthe_core::{DayBucket, Instant, QueryPlan, RoomFilter, ScheduleQuery, is_same_jst_day};
use tracing::info;

use super::{format_jst_time_range, heading};
use crate::datastore::{DatastoreClient, Query};
use crate::models::{Room, Shift};

const SHIFT_COLUMNS: &str = "id,start_at,end_at,note,is_active,therapist:therapists(id,name,slug,main_image_url),room:rooms(id,name,area)";

/// 表示範囲に開始する有効なシフトを開始時刻の昇順で取得するクエリ。
pub fn shifts_in_window<'a>(client: &'a DatastoreClient, plan: &QueryPlan) -> Query<'a> {
    let query = client
        .from("shifts")
        .select(SHIFT_COLUMNS)
        .gte("start_at", plan.window.start)
        .lt("start_at", plan.window.end_exclusive)
        .eq("is_active", true);

    let query = match plan.room.room_id() {
        Some(room_id) => query.eq("room_id", room_id),
        None => query,
    };
    query.order("start_at", true)
}

pub async fn schedule(client: &DatastoreClient, query: &ScheduleQuery) -> Result<String> {
    schedule_at(client, query, Instant::now()).await
}

/// 取得範囲と「本日」の判定に同じ `now` を使う。
pub async fn schedule_at(
    client: &DatastoreClient,
    query: &ScheduleQuery,
    now: Instant,
) -> Result<String> {
    let plan = query.plan_at(now);

    let rooms = client
        .from("rooms")
        .select("id,name,area,access_note,sort_order")
        .order("sort_order", true)
        .fetch::<Room>();
    let shifts = shifts_in_window(client, &plan).fetch::<Shift>();

    let (rooms, shifts) =
        tokio::try_join!(rooms, shifts).context("Failed to fetch schedule data")?;
    info!(
        days = plan.window.days.days(),
        room = %plan.room,
        shifts = shifts.len(),
        "Schedule fetched"
    );

    let buckets = plan.bucket(shifts);
    Ok(render_schedule(&plan, &rooms, &buckets, now))
}

/// 日ごとの見出しとシフトを描画する。シフトのない日も「出勤予定なし」として必ず表示する。
pub fn render_schedule(
    plan: &QueryPlan,
    rooms: &[Room],
    buckets: &[DayBucket<Shift>],
    now: Instant,
) -> String {
    let mut out = String::new();
    heading(
        &mut out,
        &format!(
            "シフト表 ({}日間 / {})",
            plan.window.days,
            room_label(&plan.room, rooms)
        ),
    );

    let _ = writeln!(out, "ルーム: all=全ルーム");
    for room in rooms {
        let _ = writeln!(out, "        {}={}", room.id, room.name);
    }

    for bucket in buckets {
        let today = if is_same_jst_day(bucket.day, now) {
            " 本日"
        } else {
            ""
        };
        let _ = writeln!(out, "\n{}{today}", bucket.day.label());

        if bucket.is_empty() {
            let _ = writeln!(out, "  出勤予定なし");
            continue;
        }
        for shift in &bucket.entries {
            let therapist = shift
                .therapist
                .as_ref()
                .map(|t| t.name.as_str())
                .unwrap_or("セラピスト未定");
            let room = shift
                .room
                .as_ref()
                .map(|r| r.display_name())
                .unwrap_or_else(|| "ルーム未定".to_string());
            let _ = write!(
                out,
                "  {}  {therapist}  {room}",
                format_jst_time_range(shift.start_at, shift.end_at)
            );
            match shift.note.as_deref().filter(|n| !n.is_empty()) {
                Some(note) => {
                    let _ = writeln!(out, "  ({note})");
                }
                None => out.push('\n'),
            }
        }
    }

    out
}

fn room_label(filter: &RoomFilter, rooms: &[Room]) -> String {
    match filter.room_id() {
        None => "全ルーム".to_string(),
        Some(id) => rooms
            .iter()
            .find(|room| room.id == id)
            .map(|room| room.name.clone())
            .unwrap_or_else(|| id.to_string()),
    }
}
