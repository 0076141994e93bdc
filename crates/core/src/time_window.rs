//! UTC の時刻と JST の暦・壁時計表現の相互変換。
//!
//! JST は夏時間のない UTC+9 の固定オフセットなので、タイムゾーンデータベースは使わず
//! 540 分を足し引きするだけで変換できる。

use std::{fmt, str::FromStr, sync::LazyLock};

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Timelike,
    Utc, Weekday,
};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{Result, TimeError};

/// UTC から JST へのオフセット（分）。
pub const JST_OFFSET_MINUTES: i64 = 9 * 60;

fn jst_offset() -> Duration {
    Duration::minutes(JST_OFFSET_MINUTES)
}

/// タイムゾーンの曖昧さを持たない UTC の時刻。
///
/// 文字列表現は `2025-01-15T00:30:00.000Z` のようなミリ秒精度・`Z` 付きの ISO-8601。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant(DateTime<Utc>);

impl Instant {
    /// 現在時刻を取得する。
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// +540 分ずらした JST の壁時計を、オフセットなしの日時として返す。
    fn jst_wall_clock(&self) -> NaiveDateTime {
        self.0.naive_utc() + jst_offset()
    }
}

impl From<DateTime<Utc>> for Instant {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl FromStr for Instant {
    type Err = TimeError;

    /// RFC 3339 形式を受け付け、オフセット付きの場合は UTC に正規化する。
    fn from_str(s: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|_| TimeError::InvalidInstant(s.to_string()))
    }
}

impl Serialize for Instant {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Instant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// JST で解釈した暦日。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JstCalendarDay(NaiveDate);

impl JstCalendarDay {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// 翌日を返す。暦の上限を超える場合は None。
    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// `03/01(土)` 形式の表示用ラベル。
    pub fn label(&self) -> String {
        format!("{}({})", self.0.format("%m/%d"), weekday_ja(self.weekday()))
    }
}

impl From<NaiveDate> for JstCalendarDay {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

impl fmt::Display for JstCalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// 管理画面のフォームで入力される JST の壁時計（分単位）。
///
/// 永続化はせず、送信前に [`local_field_to_utc_instant`] で UTC に変換する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalDateTimeField {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

static LOCAL_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,6})-(\d{1,2})-(\d{1,2})[T ](\d{1,2}):(\d{1,2})$")
        .expect("local date-time pattern must compile")
});

impl FromStr for LocalDateTimeField {
    type Err = TimeError;

    /// `YYYY-MM-DDTHH:MM`（`datetime-local` 形式）または `YYYY-MM-DD HH:MM` を読む。
    ///
    /// 範囲外の値（13 月や 32 日など）はここでは弾かず、変換時に正規化される。
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || TimeError::Malformed(s.to_string());
        let caps = LOCAL_FIELD_RE.captures(s.trim()).ok_or_else(malformed)?;
        let component = |i: usize| caps[i].parse::<u32>().map_err(|_| malformed());

        Ok(Self {
            year: caps[1].parse().map_err(|_| malformed())?,
            month: component(2)?,
            day: component(3)?,
            hour: component(4)?,
            minute: component(5)?,
        })
    }
}

impl fmt::Display for LocalDateTimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

/// 現在時刻以前で最も新しい JST の 0 時を UTC で返す。
pub fn start_of_today_jst_as_utc() -> Instant {
    start_of_jst_day(Instant::now())
}

/// `instant` が属する JST の日の 0 時を UTC で返す。
pub fn start_of_jst_day(instant: Instant) -> Instant {
    let jst_midnight = instant.jst_wall_clock().date().and_time(NaiveTime::MIN);
    Instant((jst_midnight - jst_offset()).and_utc())
}

/// 丸日数を加算する。JST に夏時間はないので常に `days × 24h` だけ進む。
///
/// 結果が表現範囲を超える場合は範囲の端に丸める。
pub fn add_days_utc(instant: Instant, days: i64) -> Instant {
    checked_add_days_utc(instant, days).unwrap_or(if days < 0 {
        Instant(DateTime::<Utc>::MIN_UTC)
    } else {
        Instant(DateTime::<Utc>::MAX_UTC)
    })
}

/// [`add_days_utc`] の範囲チェック版。表現範囲を超える場合は None。
pub fn checked_add_days_utc(instant: Instant, days: i64) -> Option<Instant> {
    Duration::try_days(days)
        .and_then(|delta| instant.0.checked_add_signed(delta))
        .map(Instant)
}

pub fn to_jst_calendar_day(instant: Instant) -> JstCalendarDay {
    JstCalendarDay(instant.jst_wall_clock().date())
}

/// `06/01(日) 14:00` 形式で JST の日時を表示する。
pub fn format_jst_date_time(instant: Instant) -> String {
    let wall = instant.jst_wall_clock();
    format!(
        "{}({}) {}",
        wall.format("%m/%d"),
        weekday_ja(wall.weekday()),
        wall.format("%H:%M")
    )
}

/// `14:00` 形式で JST の時刻を表示する。
pub fn format_jst_time(instant: Instant) -> String {
    instant.jst_wall_clock().format("%H:%M").to_string()
}

/// JST の壁時計として入力された日時を UTC に変換する。
///
/// 範囲外の成分は繰り上げて正規化する（13 月は翌年 1 月、32 日は翌月、24 時は翌日）。
pub fn local_field_to_utc_instant(field: &LocalDateTimeField) -> Result<Instant> {
    let out_of_range = || TimeError::OutOfRange(*field);

    let months = i64::from(field.year) * 12 + i64::from(field.month) - 1;
    let year = i32::try_from(months.div_euclid(12)).map_err(|_| out_of_range())?;
    let month = u32::try_from(months.rem_euclid(12)).map_err(|_| out_of_range())? + 1;
    let first_of_month = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)?;

    let minutes = (i64::from(field.day) - 1) * 24 * 60
        + i64::from(field.hour) * 60
        + i64::from(field.minute)
        - JST_OFFSET_MINUTES;

    Duration::try_minutes(minutes)
        .and_then(|delta| {
            first_of_month
                .and_time(NaiveTime::MIN)
                .checked_add_signed(delta)
        })
        .map(|utc| Instant(utc.and_utc()))
        .ok_or_else(out_of_range)
}

/// [`local_field_to_utc_instant`] の逆変換。編集フォームの初期値に使う。
pub fn utc_instant_to_local_field(instant: Instant) -> LocalDateTimeField {
    let wall = instant.jst_wall_clock();
    LocalDateTimeField {
        year: wall.year(),
        month: wall.month(),
        day: wall.day(),
        hour: wall.hour(),
        minute: wall.minute(),
    }
}

fn weekday_ja(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "月",
        Weekday::Tue => "火",
        Weekday::Wed => "水",
        Weekday::Thu => "木",
        Weekday::Fri => "金",
        Weekday::Sat => "土",
        Weekday::Sun => "日",
    }
}
