use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{Html, Selector};

use super::encoding::repair;
use crate::db::RawRecord;

static BLOCK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div, li, dl").unwrap());

const MIN_TEXT_CHARS: usize = 10;
const NAME_CHARS: usize = 50;
pub const DEFAULT_UNIT: &str = "元/克";

/// Strategy B: any block element whose text carries a number becomes a
/// low-precision record named after its first 50 characters. Nested blocks
/// each produce their own record.
pub fn extract_blocks(doc: &Html, today: NaiveDate) -> Vec<RawRecord> {
    let date = today.format("%Y-%m-%d").to_string();

    doc.select(&BLOCK_SEL)
        .filter_map(|el| {
            let text = el.text().collect::<String>();
            let text = text.trim();
            if !looks_like_price_block(text) {
                return None;
            }
            let name: String = repair(text).chars().take(NAME_CHARS).collect();
            Some(RawRecord {
                name,
                unit: DEFAULT_UNIT.to_string(),
                update_date: date.clone(),
                ..Default::default()
            })
        })
        .filter(RawRecord::is_valid)
        .collect()
}

fn looks_like_price_block(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit()) && text.chars().count() > MIN_TEXT_CHARS
}
