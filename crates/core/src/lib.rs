//! JST (UTC+9 固定) を基準にした時刻変換とシフト表の日別グルーピング。
//!
//! データストアとのやり取りはすべて UTC の [`Instant`] で行い、
//! 表示や入力フォームとの境界でのみ JST の暦・壁時計表現に変換する。
//! I/O は一切持たず、すべて同期的な純粋関数として提供する。

pub mod error;
pub mod planner;
pub mod time_window;

pub use error::{Result, TimeError};
pub use planner::{
    DayBucket, QueryPlan, RoomFilter, ScheduleQuery, ScheduleWindow, Scheduled, WindowDays,
    bucket_by_day, compute_window, compute_window_at, is_same_jst_day, is_today,
};
pub use time_window::{
    Instant, JST_OFFSET_MINUTES, JstCalendarDay, LocalDateTimeField, add_days_utc,
    checked_add_days_utc, format_jst_date_time, format_jst_time, local_field_to_utc_instant,
    start_of_jst_day, start_of_today_jst_as_utc, to_jst_calendar_day, utc_instant_to_local_field,
};
