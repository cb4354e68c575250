use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::encoding::repair;
use super::fields::{Field, FieldSet};
use crate::db::RawRecord;

static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static HEADER_CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());
static DATA_CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Header cell index for each mapped field, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap(Vec<(Field, usize)>);

impl ColumnMap {
    /// Each cell goes to the first field that claims it; each field keeps the
    /// first cell it was given.
    pub fn from_header(cells: &[String], fields: &FieldSet) -> Self {
        let mut map: Vec<(Field, usize)> = Vec::new();
        for (idx, cell) in cells.iter().enumerate() {
            if let Some(field) = fields.classify(cell) {
                if !map.iter().any(|(f, _)| *f == field) {
                    map.push((field, idx));
                }
            }
        }
        ColumnMap(map)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn index_of(&self, field: Field) -> Option<usize> {
        self.0.iter().find(|(f, _)| *f == field).map(|(_, i)| *i)
    }

    fn read(&self, cells: &[String]) -> RawRecord {
        let mut record = RawRecord::default();
        for &(field, idx) in &self.0 {
            if let Some(text) = cells.get(idx) {
                *record.field_mut(field) = repair(text);
            }
        }
        record
    }
}

/// Strategy A: every table with a recognizable header row, in document order.
pub fn extract_tables(doc: &Html, fields: &FieldSet) -> Vec<RawRecord> {
    doc.select(&TABLE_SEL)
        .flat_map(|table| extract_table(table, fields))
        .collect()
}

fn extract_table(table: ElementRef, fields: &FieldSet) -> Vec<RawRecord> {
    let rows: Vec<ElementRef> = table.select(&ROW_SEL).collect();

    let Some((header_idx, columns)) = find_header(&rows, fields) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in &rows[header_idx + 1..] {
        let cells = cell_texts(*row, &DATA_CELL_SEL);
        if cells.len() < columns.len() {
            continue;
        }
        // Repeated header or footer row
        if cells.first().is_some_and(|first| fields.is_keyword(first)) {
            continue;
        }
        let record = columns.read(&cells);
        if record.is_valid() {
            records.push(record);
        }
    }
    records
}

fn find_header(rows: &[ElementRef], fields: &FieldSet) -> Option<(usize, ColumnMap)> {
    rows.iter().enumerate().find_map(|(i, row)| {
        let cells = cell_texts(*row, &HEADER_CELL_SEL);
        if cells.is_empty() || !fields.mentions_keyword(&cells.join(" ")) {
            return None;
        }
        Some((i, ColumnMap::from_header(&cells, fields)))
    })
}

fn cell_texts(row: ElementRef, selector: &Selector) -> Vec<String> {
    row.select(selector)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<RawRecord> {
        extract_tables(&Html::parse_document(html), &FieldSet::default())
    }

    #[test]
    fn english_header_row() {
        let html = "<table>
            <tr><th>Name</th><th>Price</th><th>Unit</th></tr>
            <tr><td>Gold Ring</td><td>520.00</td><td>yuan/gram</td></tr>
        </table>";
        let records = extract(html);
        assert_eq!(
            records,
            vec![RawRecord {
                name: "Gold Ring".into(),
                latest_price: "520.00".into(),
                unit: "yuan/gram".into(),
                ..Default::default()
            }]
        );
    }

    #[test]
    fn column_map_from_chinese_header() {
        let header: Vec<String> = ["首饰名称", "最新价格", "单位", "纯度", "手工费", "更新日期"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = ColumnMap::from_header(&header, &FieldSet::default());
        assert_eq!(map.len(), 6);
        assert_eq!(map.index_of(Field::Name), Some(0));
        assert_eq!(map.index_of(Field::UpdateDate), Some(5));
    }

    #[test]
    fn duplicate_header_keeps_first_column() {
        let header: Vec<String> = ["名称", "Name", "Price"].iter().map(|s| s.to_string()).collect();
        let map = ColumnMap::from_header(&header, &FieldSet::default());
        assert_eq!(map.index_of(Field::Name), Some(0));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn table_without_header_is_skipped() {
        let html = "<table><tr><td>foo</td><td>1</td></tr><tr><td>bar</td><td>2</td></tr></table>";
        assert!(extract(html).is_empty());
    }

    #[test]
    fn header_found_below_title_row() {
        let html = "<table>
            <tr><td colspan=\"3\">北京菜百</td></tr>
            <tr><td>首饰名称</td><td>最新价格</td><td>单位</td></tr>
            <tr><td>足金首饰</td><td>618</td><td>元/克</td></tr>
        </table>";
        let records = extract(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "足金首饰");
        assert_eq!(records[0].latest_price, "618");
    }

    #[test]
    fn words_containing_aliases_do_not_make_a_header() {
        let html = "<table>
            <tr><td>Community username list 2024</td></tr>
            <tr><th>Name</th><th>Price</th></tr>
            <tr><td>Gold Ring</td><td>520.00</td></tr>
        </table>";
        let records = extract(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Gold Ring");
    }

    #[test]
    fn repeated_header_and_short_rows_skipped() {
        let html = "<table>
            <tr><th>首饰名称</th><th>最新价格</th><th>单位</th></tr>
            <tr><td>足金首饰</td><td>618</td><td>元/克</td></tr>
            <tr><td>首饰</td><td>价格</td><td>单位</td></tr>
            <tr><td>only one cell</td></tr>
            <tr><td>铂金首饰</td><td>305</td><td>元/克</td></tr>
        </table>";
        let names: Vec<String> = extract(html).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["足金首饰", "铂金首饰"]);
    }

    #[test]
    fn invalid_rows_dropped() {
        let html = "<table>
            <tr><th>名称</th><th>最新价格</th><th>纯度</th></tr>
            <tr><td></td><td></td><td>999</td></tr>
            <tr><td>足金</td><td></td><td>999</td></tr>
        </table>";
        let records = extract(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].purity, "999");
    }

    #[test]
    fn multiple_tables_in_document_order() {
        let html = "<table><tr><th>Name</th><th>Price</th></tr><tr><td>A</td><td>1</td></tr></table>
                    <table><tr><td>nothing here</td></tr></table>
                    <table><tr><th>Name</th><th>Price</th></tr><tr><td>B</td><td>2</td></tr></table>";
        let names: Vec<String> = extract(html).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn garbled_cells_are_repaired() {
        let garbled: String = "足价".bytes().map(char::from).collect();
        let html = format!(
            "<table><tr><th>Name</th><th>Price</th></tr><tr><td>{}</td><td>600</td></tr></table>",
            garbled
        );
        assert_eq!(extract(&html)[0].name, "足价");
    }
}
