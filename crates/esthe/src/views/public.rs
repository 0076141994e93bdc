//! トップ・セラピスト一覧/詳細・料金・アクセス・求人ページ。

use std::fmt::Write as _;

use anyhow::{Context as _, Result, bail};
use esthe_core::start_of_today_jst_as_utc;
use tracing::{error, warn};

use super::{SITE_NAME, format_yen, heading, shift_summary};
use crate::datastore::DatastoreClient;
use crate::models::{Course, Room, Shift, SiteSettings, Therapist};

const SETTINGS_COLUMNS: &str = "id,global_booking_url,line_url,instagram_url,x_url,notice_text";
const THERAPIST_COLUMNS: &str =
    "id,name,slug,main_image_url,profile_text,booking_url,tags,is_newface,is_active,sort_order,sns_urls";

/// トップページに並べる肩書き（表示順）。
const ROLE_LABELS: [&str; 3] = ["Senior Therapist", "Skin Specialist", "Wellness Expert"];

async fn fetch_settings(client: &DatastoreClient) -> crate::datastore::Result<Option<SiteSettings>> {
    client
        .from("site_settings")
        .select(SETTINGS_COLUMNS)
        .fetch_optional()
        .await
}

/// セラピストが取得できないときにトップページへ出す見本。
fn fallback_therapists() -> Vec<Therapist> {
    [
        ("fallback-1", "Mika Tanaka", "mika-tanaka", "Deep tissue & Anti-aging specialist"),
        ("fallback-2", "Hana Sato", "hana-sato", "Hydration & Pore refinement expert"),
        ("fallback-3", "Aoi Watanabe", "aoi-watanabe", "Stress reduction & Recovery session"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (id, name, slug, profile))| Therapist {
        id: id.to_string(),
        name: name.to_string(),
        slug: slug.to_string(),
        main_image_url: None,
        profile_text: Some(profile.to_string()),
        booking_url: None,
        tags: Vec::new(),
        is_newface: false,
        is_active: true,
        sort_order: i as i32,
        sns_urls: None,
    })
    .collect()
}

/// トップページ。取得に失敗しても見本データで表示する。
pub async fn home(client: &DatastoreClient) -> String {
    let therapists = client
        .from("therapists")
        .select(THERAPIST_COLUMNS)
        .eq("is_active", true)
        .order("sort_order", true)
        .limit(3)
        .fetch::<Therapist>();

    let (settings, therapists) = match tokio::try_join!(fetch_settings(client), therapists) {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Failed to fetch home page data, using fallback");
            (None, Vec::new())
        }
    };

    let therapists = if therapists.is_empty() {
        fallback_therapists()
    } else {
        therapists
    };

    render_home(settings.as_ref(), &therapists)
}

pub fn render_home(settings: Option<&SiteSettings>, therapists: &[Therapist]) -> String {
    let mut out = String::new();
    heading(&mut out, SITE_NAME);

    if let Some(notice) = settings
        .and_then(|s| s.notice_text.as_deref())
        .filter(|n| !n.is_empty())
    {
        let _ = writeln!(out, "お知らせ: {notice}");
    }

    let _ = writeln!(out, "\n[セラピスト]");
    for (i, therapist) in therapists.iter().enumerate() {
        let role = ROLE_LABELS.get(i).copied().unwrap_or("Therapist");
        let _ = writeln!(out, "- {} ({role})", therapist.name);
        if let Some(profile) = &therapist.profile_text {
            let _ = writeln!(out, "  {profile}");
        }
        let _ = writeln!(out, "  /therapists/{}", therapist.slug);
    }

    let booking = settings.and_then(|s| s.global_booking_url.as_deref());
    let _ = writeln!(out, "\n[ご予約]");
    let _ = writeln!(out, "{}", booking.unwrap_or("予約受付準備中"));

    if let Some(settings) = settings {
        let links = settings.sns_links();
        if !links.is_empty() {
            let _ = writeln!(out, "\n[SNS]");
            for (label, url) in links {
                let _ = writeln!(out, "{label}: {url}");
            }
        }
    }

    out
}

pub async fn therapists(client: &DatastoreClient) -> Result<String> {
    let therapists = client
        .from("therapists")
        .select(THERAPIST_COLUMNS)
        .eq("is_active", true)
        .order("sort_order", true)
        .fetch::<Therapist>();

    let (therapists, settings) = tokio::try_join!(therapists, fetch_settings(client))
        .context("Failed to fetch therapists")?;

    Ok(render_therapists(&therapists, settings.as_ref()))
}

pub fn render_therapists(therapists: &[Therapist], settings: Option<&SiteSettings>) -> String {
    let mut out = String::new();
    heading(&mut out, "セラピスト一覧");

    if therapists.is_empty() {
        let _ = writeln!(out, "現在掲載中のセラピストはいません。");
    }
    for therapist in therapists {
        let new_face = if therapist.is_newface { " [NEW]" } else { "" };
        let _ = writeln!(out, "\n{}{new_face}", therapist.name);
        if let Some(profile) = &therapist.profile_text {
            let _ = writeln!(out, "  {profile}");
        }
        let _ = writeln!(out, "  詳細: /therapists/{}", therapist.slug);
        match therapist.booking_link(settings) {
            Some(url) => {
                let _ = writeln!(out, "  予約: {url}");
            }
            None => {
                let _ = writeln!(out, "  予約: 受付準備中");
            }
        }
    }

    out
}

pub async fn therapist_detail(client: &DatastoreClient, slug: &str) -> Result<String> {
    let therapist = client
        .from("therapists")
        .select(THERAPIST_COLUMNS)
        .eq("slug", slug)
        .fetch_optional::<Therapist>();

    let (therapist, settings) = tokio::join!(therapist, fetch_settings(client));

    let therapist = match therapist {
        Ok(Some(therapist)) => therapist,
        Ok(None) => bail!("Therapist not found: {slug}"),
        Err(e) => {
            error!(slug, error = %e, "Therapist detail fetch failed");
            return Err(e).context("Failed to fetch therapist");
        }
    };

    let settings = settings.unwrap_or_else(|e| {
        warn!(error = %e, "Site settings fetch failed");
        None
    });

    let shifts = client
        .from("shifts")
        .select("id,start_at,end_at,note,is_active,room:rooms(id,name,area)")
        .eq("therapist_id", &therapist.id)
        .eq("is_active", true)
        .gte("start_at", start_of_today_jst_as_utc())
        .order("start_at", true)
        .fetch::<Shift>()
        .await
        .inspect_err(|e| warn!(therapist_id = %therapist.id, error = %e, "Shift fetch failed"))
        .ok();

    Ok(render_therapist_detail(
        &therapist,
        settings.as_ref(),
        shifts.as_deref(),
    ))
}

/// `shifts` が None の場合はシフトの取得に失敗したことを示す。
pub fn render_therapist_detail(
    therapist: &Therapist,
    settings: Option<&SiteSettings>,
    shifts: Option<&[Shift]>,
) -> String {
    let mut out = String::new();
    let new_face = if therapist.is_newface { " [NEW]" } else { "" };
    heading(&mut out, &format!("{}{new_face}", therapist.name));

    if let Some(profile) = &therapist.profile_text {
        let _ = writeln!(out, "{profile}");
    }
    if !therapist.tags.is_empty() {
        let _ = writeln!(out, "タグ: {}", therapist.tags.join(" / "));
    }
    if let Some(sns) = &therapist.sns_urls {
        for (name, url) in sns {
            let _ = writeln!(out, "{name}: {url}");
        }
    }
    let _ = writeln!(
        out,
        "予約: {}",
        therapist.booking_link(settings).unwrap_or("受付準備中")
    );

    let _ = writeln!(out, "\n[出勤予定]");
    match shifts {
        None => {
            let _ = writeln!(out, "出勤予定を取得できませんでした。時間をおいて再度お試しください。");
        }
        Some([]) => {
            let _ = writeln!(out, "現在、出勤予定はありません。");
        }
        Some(shifts) => {
            for shift in shifts {
                let _ = writeln!(out, "- {}", shift_summary(shift));
                if let Some(note) = shift.note.as_deref().filter(|n| !n.is_empty()) {
                    let _ = writeln!(out, "  {note}");
                }
            }
        }
    }

    out
}

pub async fn pricing(client: &DatastoreClient) -> Result<String> {
    let courses = client
        .from("courses")
        .select("id,name,duration_min,price,sort_order,is_active")
        .eq("is_active", true)
        .order("sort_order", true)
        .fetch::<Course>()
        .await
        .context("Failed to fetch courses")?;

    Ok(render_pricing(&courses))
}

pub fn render_pricing(courses: &[Course]) -> String {
    let mut out = String::new();
    heading(&mut out, "料金");
    let _ = writeln!(out, "コース料金と施術時間のご案内です。");

    for course in courses {
        let _ = writeln!(
            out,
            "- {}  {} 分  {}",
            course.name,
            course.duration_min,
            format_yen(course.price)
        );
    }
    out
}

pub async fn access(client: &DatastoreClient) -> Result<String> {
    let rooms = client
        .from("rooms")
        .select("id,name,area,access_note,sort_order")
        .order("sort_order", true)
        .fetch::<Room>()
        .await
        .context("Failed to fetch rooms")?;

    Ok(render_access(&rooms))
}

pub fn render_access(rooms: &[Room]) -> String {
    let mut out = String::new();
    heading(&mut out, "アクセス");

    for room in rooms {
        let _ = writeln!(out, "\n{}", room.name);
        if let Some(area) = room.area.as_deref().filter(|a| !a.is_empty()) {
            let _ = writeln!(out, "  エリア: {area}");
        }
        if let Some(note) = room.access_note.as_deref().filter(|n| !n.is_empty()) {
            let _ = writeln!(out, "  {note}");
        }
    }
    out
}

pub fn recruit() -> String {
    let mut out = String::new();
    heading(&mut out, "求人");
    out.push_str(
        "一緒に働いてくれるセラピストさんを募集しています。未経験の方もご相談ください。\n\
         \n\
         - 高収入 / 日払い相談可\n\
         - 自由出勤 / 掛け持ちOK\n\
         - 個室対応 / 安心サポート\n\
         \n\
         応募・お問い合わせは外部予約の連絡先からお願いします。\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn therapist(name: &str, slug: &str) -> Therapist {
        Therapist {
            id: format!("id-{slug}"),
            name: name.to_string(),
            slug: slug.to_string(),
            main_image_url: None,
            profile_text: None,
            booking_url: None,
            tags: Vec::new(),
            is_newface: false,
            is_active: true,
            sort_order: 0,
            sns_urls: None,
        }
    }

    fn shift(start: &str, end: &str) -> Shift {
        Shift {
            id: "s1".to_string(),
            start_at: start.parse().unwrap(),
            end_at: end.parse().unwrap(),
            note: Some("指名可".to_string()),
            is_active: true,
            therapist: None,
            room: None,
        }
    }

    #[test]
    fn home_shows_notice_and_sns() {
        let settings = SiteSettings {
            notice_text: Some("本日は 20 時まで".to_string()),
            instagram_url: Some("https://instagram.com/esthe".to_string()),
            ..Default::default()
        };
        let out = render_home(Some(&settings), &fallback_therapists());

        assert!(out.contains("お知らせ: 本日は 20 時まで"));
        assert!(out.contains("- Mika Tanaka (Senior Therapist)"));
        assert!(out.contains("- Aoi Watanabe (Wellness Expert)"));
        assert!(out.contains("予約受付準備中"));
        assert!(out.contains("Instagram: https://instagram.com/esthe"));
    }

    #[test]
    fn therapists_list_marks_new_faces() {
        let mut hana = therapist("Hana", "hana");
        hana.is_newface = true;
        hana.booking_url = Some("https://hana.example.com".to_string());
        let out = render_therapists(&[hana, therapist("Aoi", "aoi")], None);

        assert!(out.contains("Hana [NEW]"));
        assert!(out.contains("予約: https://hana.example.com"));
        assert!(out.contains("予約: 受付準備中"));
    }

    #[test]
    fn detail_lists_shifts_in_jst() {
        let mut mika = therapist("Mika", "mika");
        mika.tags = vec!["指圧".to_string(), "アロマ".to_string()];
        let shifts = vec![shift("2025-06-01T05:00:00Z", "2025-06-01T09:00:00Z")];

        let out = render_therapist_detail(&mika, None, Some(shifts.as_slice()));

        assert!(out.contains("タグ: 指圧 / アロマ"));
        assert!(out.contains("- 06/01(日) 14:00  14:00 - 18:00  ルーム未定"));
        assert!(out.contains("  指名可"));
    }

    #[test]
    fn detail_distinguishes_empty_and_failed_shifts() {
        let mika = therapist("Mika", "mika");
        assert!(render_therapist_detail(&mika, None, Some(&[][..])).contains("出勤予定はありません"));
        assert!(render_therapist_detail(&mika, None, None).contains("取得できませんでした"));
    }

    #[test]
    fn pricing_formats_courses() {
        let courses = vec![Course {
            id: "c1".to_string(),
            name: "スタンダード".to_string(),
            duration_min: 90,
            price: 15000,
            sort_order: 0,
            is_active: true,
        }];
        assert!(render_pricing(&courses).contains("- スタンダード  90 分  15,000円"));
    }

    #[test]
    fn access_skips_empty_fields() {
        let rooms = vec![Room {
            id: "r1".to_string(),
            name: "Shibuya".to_string(),
            area: Some(String::new()),
            access_note: Some("渋谷駅から徒歩 5 分".to_string()),
            sort_order: 0,
        }];
        let out = render_access(&rooms);
        assert!(!out.contains("エリア"));
        assert!(out.contains("渋谷駅から徒歩 5 分"));
    }
}
