use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::parser::fields::FieldSet;

pub const DEFAULT_URL: &str = "http://www.huangjinjiage.cn/gold/bjcbjj.html";
const DEFAULT_CONFIG_FILE: &str = "gold_price";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub url: String,
    pub db_path: PathBuf,
    pub export_path: PathBuf,
    pub timeout_secs: u64,
    pub user_agent: String,
    #[serde(deserialize_with = "time_of_day")]
    pub daily_at: NaiveTime,
    #[serde(deserialize_with = "from_str")]
    pub fields: FieldSet,
}

/// Defaults, then `gold_price.toml` (or `file`), then `GOLD_*` env vars.
pub fn load(file: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder()
        .set_default("url", DEFAULT_URL)?
        .set_default("db_path", "data/gold_price.sqlite")?
        .set_default("export_path", "data/gold_price.csv")?
        .set_default("timeout_secs", 30)?
        .set_default("user_agent", DEFAULT_USER_AGENT)?
        .set_default("daily_at", "09:00")?
        .set_default("fields", "name,latest_price,unit,purity,labor_fee,update_date")?;

    builder = match file {
        Some(path) => builder.add_source(File::from(path)),
        None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };

    builder
        .add_source(Environment::with_prefix("GOLD"))
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
}

fn time_of_day<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
    let s = String::deserialize(d)?;
    parse_time_of_day(&s).map_err(serde::de::Error::custom)
}

fn from_str<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let s = String::deserialize(d)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Defaults pointed at `url`, with history and export under `dir`. Does not
/// read files or the environment.
#[cfg(test)]
pub(crate) fn for_tests(url: &str, dir: &Path) -> Settings {
    Settings {
        url: url.to_string(),
        db_path: dir.join("history.sqlite"),
        export_path: dir.join("export.csv"),
        timeout_secs: 5,
        user_agent: DEFAULT_USER_AGENT.to_string(),
        daily_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        fields: FieldSet::default(),
    }
}
