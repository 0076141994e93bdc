//! データストアのテーブルに対応する行の型。

use std::collections::BTreeMap;

use esthe_core::{Instant, Scheduled};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DefaultOnNull, serde_as};

fn default_true() -> bool {
    true
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Therapist {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub main_image_url: Option<String>,
    pub profile_text: Option<String>,
    pub booking_url: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_newface: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub sns_urls: Option<BTreeMap<String, String>>,
}

impl Therapist {
    /// 個別の予約 URL、なければサイト共通の予約 URL。
    pub fn booking_link<'a>(&'a self, settings: Option<&'a SiteSettings>) -> Option<&'a str> {
        self.booking_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| settings.and_then(|s| s.global_booking_url.as_deref()))
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub duration_min: u32,
    pub price: u64,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub area: Option<String>,
    #[serde(default)]
    pub access_note: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TherapistSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub main_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
}

impl RoomSummary {
    /// `渋谷ルーム / 渋谷` のような表示名。
    pub fn display_name(&self) -> String {
        match self.area.as_deref().filter(|area| !area.is_empty()) {
            Some(area) => format!("{} / {}", self.name, area),
            None => self.name.clone(),
        }
    }
}

/// 出勤シフト。セラピストと部屋は埋め込みリレーションとして取得する。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Shift {
    pub id: String,
    pub start_at: Instant,
    pub end_at: Instant,
    pub note: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "embedded")]
    pub therapist: Option<TherapistSummary>,
    #[serde(default, deserialize_with = "embedded")]
    pub room: Option<RoomSummary>,
}

impl Scheduled for Shift {
    fn starts_at(&self) -> Instant {
        self.start_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SiteSettings {
    #[serde(default)]
    pub id: String,
    pub global_booking_url: Option<String>,
    pub line_url: Option<String>,
    pub instagram_url: Option<String>,
    pub x_url: Option<String>,
    pub notice_text: Option<String>,
}

impl SiteSettings {
    /// 設定されている SNS リンクを表示名と組で返す。
    pub fn sns_links(&self) -> Vec<(&'static str, &str)> {
        [
            ("LINE", &self.line_url),
            ("Instagram", &self.instagram_url),
            ("X", &self.x_url),
        ]
        .into_iter()
        .filter_map(|(label, url)| {
            url.as_deref()
                .filter(|url| !url.is_empty())
                .map(|url| (label, url))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub is_admin: bool,
}

/// 管理画面の選択肢用（id と名前だけ）。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OptionRow {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// 埋め込みリレーションはオブジェクト・配列・null のいずれでも返りうるので Option にそろえる。
fn embedded<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(
        match Option::<OneOrMany<T>>::deserialize(deserializer)? {
            None => None,
            Some(OneOrMany::One(value)) => Some(value),
            Some(OneOrMany::Many(values)) => values.into_iter().next(),
        },
    )
}

/// 書き込み時、空文字は null として送る。
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TherapistPayload {
    pub name: String,
    pub slug: String,
    pub main_image_url: Option<String>,
    pub profile_text: Option<String>,
    pub booking_url: Option<String>,
    pub tags: Vec<String>,
    pub sort_order: i32,
    pub is_newface: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoursePayload {
    pub name: String,
    pub duration_min: u32,
    pub price: u64,
    pub sort_order: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomPayload {
    pub name: String,
    pub area: Option<String>,
    pub access_note: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftPayload {
    pub therapist_id: String,
    pub room_id: String,
    pub start_at: Instant,
    pub end_at: Instant,
    pub note: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsPayload {
    pub global_booking_url: Option<String>,
    pub line_url: Option<String>,
    pub instagram_url: Option<String>,
    pub x_url: Option<String>,
    pub notice_text: Option<String>,
}
