//! Field extractors. Each one reads a single field out of a row label and
//! answers with a default or `None` instead of failing.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

pub const UNKNOWN: &str = "unknown";

/// Sender line of the campus announcement system.
pub const ANNOUNCEMENT_MARKER: &str = "長庚大學公告系統";
pub const INSTITUTION_MARKER: &str = "長庚大學";
pub const INTERNAL_DOMAIN: &str = "@cgu.edu.tw";

pub const UNIT_EMPTY: &str = "未知";
pub const UNIT_UNNAMED_ANNOUNCEMENT: &str = "公告系統(未明單位)";
pub const UNIT_INTERNAL_PERSON: &str = "校內個人/老師";
pub const UNIT_EXTERNAL: &str = "外部單位/廠商";

static NUMERIC_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})([/-])(\d{1,2})([/-])(\d{1,2})").expect("valid regex")
});
static LOCAL_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})日").expect("valid regex")
});
static HOUR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("valid regex"));
static ANNOUNCEMENT_UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"長庚大學公告系統\s*【([^】]+)】").expect("valid regex"));
static INSTITUTION_UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"長庚大學【([^】]+)】").expect("valid regex"));
static SENDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"寄件者:\s*(.*)").expect("valid regex"));
static SUBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"未讀取 (.*) 寄件者").expect("valid regex"));
static DATE_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2}|週[一二三四五六日]\s*\d{1,2}:\d{2}|\d{1,2}:\d{2})")
        .expect("valid regex")
});

/// Calendar date from `2025-10-19`, `2025/10/19` or `2025年10月19日`.
///
/// Only the first numeric match is considered, and it must use one
/// separator throughout. If it does not form a real date the localized
/// form is tried next; an invalid localized date is `None`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = NUMERIC_DATE_RE.captures(text) {
        if caps[2] == caps[4] {
            if let Some(date) = ymd(&caps[1], &caps[3], &caps[5]) {
                return Some(date);
            }
        }
    }

    let caps = LOCAL_DATE_RE.captures(text)?;
    ymd(&caps[1], &caps[2], &caps[3])
}

/// Year 0 is not a calendar year here.
fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year = i32::try_from(number(year)?).ok().filter(|y| *y >= 1)?;
    NaiveDate::from_ymd_opt(year, number(month)?, number(day)?)
}

/// Value of a run of ASCII or full-width digits. Other digit scripts
/// matched by `\d` yield `None`.
fn number(digits: &str) -> Option<u32> {
    digits.chars().try_fold(0u32, |acc, c| {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            '０'..='９' => c as u32 - '０' as u32,
            _ => return None,
        };
        acc.checked_mul(10)?.checked_add(value)
    })
}

/// Hour of the first `H:MM` in the text. Period words such as 下午 are
/// ignored, and an hour above 23 rejects the whole match.
pub fn parse_hour(text: &str) -> Option<u32> {
    let caps = HOUR_RE.captures(text)?;
    let hour = number(&caps[1])?;
    (hour <= 23).then_some(hour)
}

/// Sending unit, decided by the first rule that applies:
/// announcement-system bracket, institution bracket, internal mail
/// domain, then external.
pub fn extract_unit(text: &str) -> String {
    if text.is_empty() {
        return UNIT_EMPTY.to_string();
    }

    if text.contains(ANNOUNCEMENT_MARKER) {
        return match ANNOUNCEMENT_UNIT_RE.captures(text) {
            Some(caps) => caps[1].to_string(),
            None => UNIT_UNNAMED_ANNOUNCEMENT.to_string(),
        };
    }

    if let Some(caps) = INSTITUTION_UNIT_RE.captures(text) {
        return caps[1].to_string();
    }

    if text.contains(INTERNAL_DOMAIN) {
        return UNIT_INTERNAL_PERSON.to_string();
    }

    UNIT_EXTERNAL.to_string()
}

/// Rest of the line after `寄件者:`.
pub fn parse_sender(text: &str) -> Option<String> {
    SENDER_RE.captures(text).map(|caps| caps[1].to_string())
}

/// Subject between the unread marker and the sender marker.
pub fn parse_subject(text: &str) -> Option<String> {
    SUBJECT_RE.captures(text).map(|caps| caps[1].to_string())
}

/// Raw date token as the list shows it: an ISO date, a weekday with a
/// time, or a bare time.
pub fn parse_date_token(text: &str) -> Option<String> {
    DATE_TOKEN_RE.find(text).map(|m| m.as_str().to_string())
}

/// First `n` characters (not bytes).
pub fn prefix(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn parses_numeric_and_localized_dates() {
        assert_eq!(parse_date("2025-10-19"), date(2025, 10, 19));
        assert_eq!(parse_date("截止 2025/1/5 前"), date(2025, 1, 5));
        assert_eq!(parse_date("2025年10月19日"), date(2025, 10, 19));
        assert_eq!(parse_date("foo bar"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn invalid_calendar_values_are_absent() {
        assert_eq!(parse_date("2025-02-30"), None);
        assert_eq!(parse_date("2025年13月01日"), None);
        assert_eq!(parse_date("2025-10-32"), None);
    }

    #[test]
    fn invalid_numeric_date_falls_through_to_localized() {
        assert_eq!(parse_date("2025-13-01 改為 2025年12月1日"), date(2025, 12, 1));
    }

    #[test]
    fn mixed_separators_are_not_a_numeric_date() {
        assert_eq!(parse_date("2025/10-19"), None);
        assert_eq!(parse_date("2025/10-19 即 2025年10月19日"), date(2025, 10, 19));
    }

    #[test]
    fn numeric_form_wins_over_localized() {
        assert_eq!(parse_date("2025年1月1日 與 2024-12-31"), date(2024, 12, 31));
    }

    #[test]
    fn full_width_digits_parse_like_ascii() {
        assert_eq!(parse_date("２０２５年１０月１９日"), date(2025, 10, 19));
        assert_eq!(parse_date("２０２５-１０-１９"), date(2025, 10, 19));
        assert_eq!(parse_hour("週三 下午 ０６:３４"), Some(6));
        assert_eq!(parse_hour("２５:００"), None);
    }

    #[test]
    fn other_digit_scripts_are_absent() {
        assert_eq!(parse_hour("٠٦:٣٤"), None);
        assert_eq!(parse_date("٢٠٢٥-١٠-١٩"), None);
    }

    #[test]
    fn year_zero_is_absent() {
        assert_eq!(parse_date("0000-01-01"), None);
        assert_eq!(parse_date("0000年1月1日"), None);
        assert_eq!(parse_date("0001-01-01"), date(1, 1, 1));
    }

    #[test]
    fn hour_takes_first_time_in_range() {
        assert_eq!(parse_hour("週三 下午 06:34"), Some(6));
        assert_eq!(parse_hour("09:00 - 17:30"), Some(9));
        assert_eq!(parse_hour("23:59"), Some(23));
        assert_eq!(parse_hour("25:61 invalid"), None);
        assert_eq!(parse_hour("no time here"), None);
    }

    #[test]
    fn hour_is_stable_across_calls() {
        let text = "週五 上午 10:15 會議";
        assert_eq!(parse_hour(text), parse_hour(text));
        assert_eq!(extract_unit(text), extract_unit(text));
    }

    #[test]
    fn unit_cascade() {
        assert_eq!(extract_unit("長庚大學公告系統【總務處公告】停電通知"), "總務處公告");
        assert_eq!(extract_unit("長庚大學公告系統 【教務處公告】選課"), "教務處公告");
        assert_eq!(extract_unit("長庚大學公告系統 無標題"), UNIT_UNNAMED_ANNOUNCEMENT);
        assert_eq!(extract_unit("長庚大學【圖書館】借書到期"), "圖書館");
        assert_eq!(extract_unit("王老師 teacher@cgu.edu.tw 作業說明"), UNIT_INTERNAL_PERSON);
        assert_eq!(extract_unit("Newsletter from vendor.com"), UNIT_EXTERNAL);
        assert_eq!(extract_unit(""), UNIT_EMPTY);
    }

    #[test]
    fn announcement_marker_outranks_institution_bracket() {
        assert_eq!(
            extract_unit("長庚大學【圖書館】轉寄 長庚大學公告系統 無單位"),
            UNIT_UNNAMED_ANNOUNCEMENT
        );
    }

    #[test]
    fn date_token_prefers_leftmost_form() {
        assert_eq!(parse_date_token("2025-10-19 08:00").as_deref(), Some("2025-10-19"));
        assert_eq!(parse_date_token("週三 06:34").as_deref(), Some("週三 06:34"));
        assert_eq!(parse_date_token("nothing"), None);
    }

    #[test]
    fn prefix_counts_characters() {
        assert_eq!(prefix("長庚大學", 2), "長庚");
        assert_eq!(prefix("ab", 10), "ab");
    }
}
