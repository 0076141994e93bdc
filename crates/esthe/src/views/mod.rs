//! 公開ページをテキストとして組み立てる。
//!
//! 取得処理（async）と描画処理（純粋関数）を分け、描画側はデータだけを受け取る。

pub mod public;
pub mod schedule;

use std::fmt::Write as _;

use esthe_core::{Instant, format_jst_date_time, format_jst_time};

use crate::models::Shift;

pub const SITE_NAME: &str = "Mens Esthe Official Site";

/// サイトマップに載せる公開ページのパス。
pub const PUBLIC_PATHS: [&str; 6] = [
    "/",
    "/therapists",
    "/schedule",
    "/pricing",
    "/access",
    "/recruit",
];

/// `12,000円` 形式の料金表示。
pub fn format_yen(price: u64) -> String {
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{grouped}円")
}

pub fn sitemap(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let mut out = String::new();
    for path in PUBLIC_PATHS {
        let _ = writeln!(out, "{base}{path}");
    }
    out
}

/// `10:00 - 14:00` 形式の時間帯。
fn format_jst_time_range(start: Instant, end: Instant) -> String {
    format!("{} - {}", format_jst_time(start), format_jst_time(end))
}

/// シフト 1 件分の表示。`03/01(土) 10:00  10:00 - 14:00  部屋`
fn shift_summary(shift: &Shift) -> String {
    let room = shift
        .room
        .as_ref()
        .map(|room| room.display_name())
        .unwrap_or_else(|| "ルーム未定".to_string());
    format!(
        "{}  {}  {room}",
        format_jst_date_time(shift.start_at),
        format_jst_time_range(shift.start_at, shift.end_at)
    )
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.chars().count().max(4)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yen_has_thousands_separators() {
        assert_eq!(format_yen(0), "0円");
        assert_eq!(format_yen(999), "999円");
        assert_eq!(format_yen(12000), "12,000円");
        assert_eq!(format_yen(1234567), "1,234,567円");
    }

    #[test]
    fn sitemap_lists_public_pages() {
        let sitemap = sitemap("https://esthe.example.jp/");
        let lines: Vec<&str> = sitemap.lines().collect();
        assert_eq!(
            lines,
            vec![
                "https://esthe.example.jp/",
                "https://esthe.example.jp/therapists",
                "https://esthe.example.jp/schedule",
                "https://esthe.example.jp/pricing",
                "https://esthe.example.jp/access",
                "https://esthe.example.jp/recruit",
            ]
        );
    }
}
