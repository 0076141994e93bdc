//! シフト表の取得範囲の計算と、取得結果の JST 日別グルーピング。

use std::fmt;

use tracing::debug;

use crate::time_window::{
    Instant, JstCalendarDay, add_days_utc, start_of_jst_day, to_jst_calendar_day,
};

/// 開始時刻を持つレコード。
pub trait Scheduled {
    fn starts_at(&self) -> Instant;
}

impl Scheduled for Instant {
    fn starts_at(&self) -> Instant {
        *self
    }
}

/// シフト表に表示する日数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowDays {
    #[default]
    Week,
    Fortnight,
}

impl WindowDays {
    pub const fn days(self) -> u32 {
        match self {
            WindowDays::Week => 7,
            WindowDays::Fortnight => 14,
        }
    }

    /// 7 と 14 以外はすべて 7 日として扱う。
    pub fn from_days(days: u32) -> Self {
        match days {
            14 => WindowDays::Fortnight,
            _ => WindowDays::Week,
        }
    }

    /// クエリ文字列の `days` を解釈する。不正な値や欠落はエラーにせず 7 日に丸める。
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("7") | None => WindowDays::Week,
            Some("14") => WindowDays::Fortnight,
            Some(other) => {
                debug!(value = other, "Unsupported days value, using 7");
                WindowDays::Week
            }
        }
    }
}

impl fmt::Display for WindowDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.days())
    }
}

/// 部屋による絞り込み。絞り込み自体はデータストア側のクエリで行う。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum RoomFilter {
    #[default]
    All,
    Room(String),
}

impl RoomFilter {
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("all") => RoomFilter::All,
            Some(id) => RoomFilter::Room(id.to_string()),
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        match self {
            RoomFilter::All => None,
            RoomFilter::Room(id) => Some(id.as_str()),
        }
    }
}

impl fmt::Display for RoomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.room_id().unwrap_or("all"))
    }
}

/// 表示範囲 `[start, end_exclusive)`。`start` は常に JST の 0 時。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start: Instant,
    pub end_exclusive: Instant,
    pub days: WindowDays,
}

impl ScheduleWindow {
    pub fn contains(&self, instant: Instant) -> bool {
        self.start <= instant && instant < self.end_exclusive
    }
}

/// 本日 (JST) から `days` 日分の取得範囲を計算する。
pub fn compute_window(days: WindowDays) -> ScheduleWindow {
    compute_window_at(Instant::now(), days)
}

pub fn compute_window_at(now: Instant, days: WindowDays) -> ScheduleWindow {
    let start = start_of_jst_day(now);
    ScheduleWindow {
        start,
        end_exclusive: add_days_utc(start, i64::from(days.days())),
        days,
    }
}

/// ある JST 日付に開始するエントリの集まり。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBucket<T> {
    pub day: JstCalendarDay,
    pub entries: Vec<T>,
}

impl<T> DayBucket<T> {
    fn empty(day: JstCalendarDay) -> Self {
        Self {
            day,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// エントリを開始時刻の JST 日付ごとに振り分ける。
///
/// `start` の日から `days` 日分のバケットを、エントリがない日も含めて必ず返す。
/// 入力は開始時刻の昇順で渡される前提で、バケット内の順序はそのまま保つ。
/// 範囲外の日付に開始するエントリは黙って捨てる。
pub fn bucket_by_day<T, I>(entries: I, start: Instant, days: WindowDays) -> Vec<DayBucket<T>>
where
    T: Scheduled,
    I: IntoIterator<Item = T>,
{
    let first_day = to_jst_calendar_day(start);
    let mut buckets: Vec<DayBucket<T>> = first_day
        .date()
        .iter_days()
        .take(days.days() as usize)
        .map(|date| DayBucket::empty(date.into()))
        .collect();

    let mut dropped = 0usize;
    for entry in entries {
        let day = to_jst_calendar_day(entry.starts_at());
        match buckets.binary_search_by_key(&day, |bucket| bucket.day) {
            Ok(index) => buckets[index].entries.push(entry),
            Err(_) => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, first_day = %first_day, "Dropped entries outside the schedule window");
    }

    buckets
}

/// `day` が本日 (JST) かどうか。
pub fn is_today(day: JstCalendarDay) -> bool {
    is_same_jst_day(day, Instant::now())
}

pub fn is_same_jst_day(day: JstCalendarDay, now: Instant) -> bool {
    to_jst_calendar_day(start_of_jst_day(now)) == day
}

/// シフト表ページのクエリ条件。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScheduleQuery {
    pub days: WindowDays,
    pub room: RoomFilter,
}

impl ScheduleQuery {
    /// デコード済みのクエリ文字列のペアから `days` と `room` を読む。
    /// 同じキーが複数ある場合は最初の値を使う。
    pub fn from_query_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut days = None;
        let mut room = None;
        for (key, value) in pairs {
            match key {
                "days" if days.is_none() => days = Some(value),
                "room" if room.is_none() => room = Some(value),
                _ => {}
            }
        }

        Self {
            days: WindowDays::from_query(days),
            room: RoomFilter::from_query(room),
        }
    }

    pub fn plan(&self) -> QueryPlan {
        self.plan_at(Instant::now())
    }

    pub fn plan_at(&self, now: Instant) -> QueryPlan {
        QueryPlan {
            window: compute_window_at(now, self.days),
            room: self.room.clone(),
        }
    }
}

/// データストアへ渡す取得範囲と絞り込み条件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub window: ScheduleWindow,
    pub room: RoomFilter,
}

impl QueryPlan {
    pub fn bucket<T, I>(&self, entries: I) -> Vec<DayBucket<T>>
    where
        T: Scheduled,
        I: IntoIterator<Item = T>,
    {
        bucket_by_day(entries, self.window.start, self.window.days)
    }
}
