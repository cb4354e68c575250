use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

/// Semantic columns a price table can carry, in header-matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name,
    LatestPrice,
    Unit,
    Purity,
    LaborFee,
    UpdateDate,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Name,
        Field::LatestPrice,
        Field::Unit,
        Field::Purity,
        Field::LaborFee,
        Field::UpdateDate,
    ];

    /// A header cell claims this field if it contains every term of any group.
    /// English terms are compared against the lowercased cell, at word starts.
    fn header_terms(self) -> &'static [&'static [&'static str]] {
        match self {
            Field::Name => &[&["首饰"], &["名称"], &["name"]],
            Field::LatestPrice => &[&["最新", "价格"], &["price"]],
            Field::Unit => &[&["单位"], &["unit"]],
            Field::Purity => &[&["纯度"], &["purity"]],
            Field::LaborFee => &[&["手工"], &["labor"]],
            Field::UpdateDate => &[&["更新"], &["update"]],
        }
    }

    /// Words that mark a row as a header. A data row whose first cell is
    /// exactly one of these is a repeated header or footer.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Field::Name => &["首饰", "name"],
            Field::LatestPrice => &["价格", "price"],
            Field::Unit => &["单位", "unit"],
            Field::Purity => &["纯度", "purity"],
            Field::LaborFee => &["手工费", "labor"],
            Field::UpdateDate => &["更新", "update"],
        }
    }

    pub fn matches_header(self, cell: &str) -> bool {
        let lower = cell.to_lowercase();
        self.header_terms()
            .iter()
            .any(|group| group.iter().all(|term| contains_term(&lower, term)))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::LatestPrice => "latest_price",
            Field::Unit => "unit",
            Field::Purity => "purity",
            Field::LaborFee => "labor_fee",
            Field::UpdateDate => "update_date",
        }
    }
}

/// Chinese terms match anywhere. ASCII terms must begin a word, so
/// `username` does not mention `name` but `Updated` mentions `update`.
fn contains_term(text: &str, term: &str) -> bool {
    if !term.is_ascii() {
        return text.contains(term);
    }
    text.match_indices(term).any(|(i, _)| {
        text[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_ascii_alphanumeric())
    })
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        match Field::ALL.iter().find(|f| f.as_str() == wanted) {
            Some(f) => Ok(*f),
            None => bail!("unknown field '{}'", s.trim()),
        }
    }
}

/// The columns the extractor is allowed to map, kept in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet(Vec<Field>);

impl FieldSet {
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Self {
        let mut fields: Vec<Field> = fields.into_iter().collect();
        fields.sort();
        fields.dedup();
        FieldSet(fields)
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.iter().copied()
    }

    /// First enabled field, in priority order, that claims the header cell.
    pub fn classify(&self, cell: &str) -> Option<Field> {
        self.iter().find(|f| f.matches_header(cell))
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.iter().any(|f| f.keywords().contains(&lower.as_str()))
    }

    pub fn mentions_keyword(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.iter()
            .flat_map(|f| f.keywords().iter())
            .any(|kw| contains_term(&lower, kw))
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        FieldSet::new(Field::ALL)
    }
}

impl FromStr for FieldSet {
    type Err = anyhow::Error;

    /// Comma-separated field names, e.g. `name,latest_price,unit`.
    fn from_str(s: &str) -> Result<Self> {
        let fields = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Field>>>()?;
        if fields.is_empty() {
            bail!("field list is empty");
        }
        Ok(FieldSet::new(fields))
    }
}
