use std::collections::btree_map::{BTreeMap, Entry};

use chrono::NaiveDateTime;

use crate::db::StoredRecord;

/// One deduplicated line of the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub name: String,
    pub latest_price: String,
    pub unit: String,
    pub purity: String,
    pub update_date: String,
    pub scraped_at: NaiveDateTime,
}

impl From<&StoredRecord> for ExportRow {
    fn from(s: &StoredRecord) -> Self {
        ExportRow {
            name: s.record.name.clone(),
            latest_price: s.record.latest_price.clone(),
            unit: s.record.unit.clone(),
            purity: s.record.purity.clone(),
            update_date: s.record.update_date.clone(),
            scraped_at: s.scraped_at,
        }
    }
}

/// Keep the most recent scrape of every `(name, update_date)`, ordered by
/// name then update date. Later `scraped_at` wins; equal timestamps fall back
/// to the higher sequence id.
pub fn reconcile(history: &[StoredRecord]) -> Vec<ExportRow> {
    let mut latest: BTreeMap<(&str, &str), &StoredRecord> = BTreeMap::new();

    for rec in history {
        let key = (rec.record.name.as_str(), rec.record.update_date.as_str());
        match latest.entry(key) {
            Entry::Vacant(e) => {
                e.insert(rec);
            }
            Entry::Occupied(mut e) => {
                if recency(rec) > recency(e.get()) {
                    e.insert(rec);
                }
            }
        }
    }

    latest.into_values().map(ExportRow::from).collect()
}

fn recency(rec: &StoredRecord) -> (NaiveDateTime, i64) {
    (rec.scraped_at, rec.sequence_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RawRecord;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn stored(seq: i64, name: &str, date: &str, price: &str, scraped_at: NaiveDateTime) -> StoredRecord {
        StoredRecord {
            sequence_id: seq,
            scraped_at,
            record: RawRecord {
                name: name.into(),
                latest_price: price.into(),
                update_date: date.into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn latest_scrape_wins() {
        let history = vec![
            stored(1, "24K Bracelet", "2024-01-01", "600", at(9)),
            stored(2, "24K Bracelet", "2024-01-01", "610", at(10)),
        ];
        let rows = reconcile(&history);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].scraped_at, at(10));
        assert_eq!(rows[0].latest_price, "610");
    }

    #[test]
    fn later_scrape_wins_even_if_written_first() {
        let history = vec![
            stored(5, "Ring", "2024-01-01", "new", at(12)),
            stored(6, "Ring", "2024-01-01", "old", at(8)),
        ];
        assert_eq!(reconcile(&history)[0].latest_price, "new");
    }

    #[test]
    fn tie_goes_to_higher_sequence_id() {
        let history = vec![
            stored(7, "Ring", "2024-01-01", "second", at(9)),
            stored(3, "Ring", "2024-01-01", "first", at(9)),
        ];
        assert_eq!(reconcile(&history)[0].latest_price, "second");
    }

    #[test]
    fn distinct_dates_are_distinct_rows() {
        let history = vec![
            stored(1, "Ring", "2024-01-02", "b", at(9)),
            stored(2, "Ring", "2024-01-01", "a", at(9)),
            stored(3, "Ring", "", "none", at(9)),
        ];
        let dates: Vec<String> = reconcile(&history).into_iter().map(|r| r.update_date).collect();
        assert_eq!(dates, vec!["", "2024-01-01", "2024-01-02"]);
    }

    #[test]
    fn ordering_independent_of_insertion() {
        let mut history = vec![
            stored(1, "铂金首饰", "2024-01-01", "300", at(9)),
            stored(2, "Bar", "2024-01-01", "500", at(9)),
            stored(3, "Anklet", "2024-01-03", "450", at(10)),
            stored(4, "Bar", "2024-01-01", "505", at(11)),
        ];
        let forward = reconcile(&history);
        history.reverse();
        let backward = reconcile(&history);
        assert_eq!(forward, backward);

        let names: Vec<&str> = forward.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Anklet", "Bar", "铂金首饰"]);
        assert_eq!(forward[1].latest_price, "505");
    }

    #[test]
    fn idempotent() {
        let history = vec![
            stored(1, "Ring", "2024-01-01", "1", at(9)),
            stored(2, "Ring", "2024-01-01", "2", at(10)),
            stored(3, "Chain", "2024-01-01", "3", at(9)),
        ];
        assert_eq!(reconcile(&history), reconcile(&history));
    }

    #[test]
    fn empty_history() {
        assert!(reconcile(&[]).is_empty());
    }
}
