use std::sync::LazyLock;

use regex::Regex;

use super::encoding::repair;
use crate::db::RawRecord;

/// Tried in order; the first pattern that matches anywhere in the page wins.
static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(\d{4}[-/年]\d{1,2}[-/月]\d{1,2}日?)").unwrap(),
        Regex::new(r"更新时间[:：]\s*(\d{4}[-/]\d{1,2}[-/]\d{1,2})").unwrap(),
    ]
});

/// The vendor's "prices as of" date, if the page states one.
pub fn page_date(page_text: &str) -> Option<String> {
    let text = repair(page_text);
    DATE_PATTERNS
        .iter()
        .find_map(|re| re.captures(&text).map(|caps| caps[1].to_string()))
}

/// Fill empty `update_date`s with the page-level date. Records that already
/// carry a date keep it.
pub fn backfill_dates(mut records: Vec<RawRecord>, page_text: &str) -> Vec<RawRecord> {
    let Some(date) = page_date(page_text) else {
        return records;
    };
    for r in records.iter_mut().filter(|r| r.update_date.is_empty()) {
        r.update_date = date.clone();
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(name: &str, date: &str) -> RawRecord {
        RawRecord {
            name: name.into(),
            update_date: date.into(),
            ..Default::default()
        }
    }

    #[test]
    fn labeled_update_time() {
        let records = vec![dated("足金", ""), dated("铂金", "2024-03-01")];
        let out = backfill_dates(records, "金价 更新时间：2024-03-15 以门店为准");
        assert_eq!(out[0].update_date, "2024-03-15");
        assert_eq!(out[1].update_date, "2024-03-01");
    }

    #[test]
    fn localized_separators() {
        assert_eq!(page_date("今日金价 2024年3月5日 发布").as_deref(), Some("2024年3月5日"));
        assert_eq!(page_date("as of 2024/03/05").as_deref(), Some("2024/03/05"));
    }

    #[test]
    fn first_match_in_page_wins() {
        assert_eq!(
            page_date("发布 2023-12-31 ... 更新时间: 2024-01-02").as_deref(),
            Some("2023-12-31")
        );
    }

    #[test]
    fn no_date_leaves_records_alone() {
        let records = vec![dated("足金", ""), dated("铂金", "2024-03-01")];
        let out = backfill_dates(records.clone(), "no dates on this page, only 520 yuan");
        assert_eq!(out, records);
    }
}
