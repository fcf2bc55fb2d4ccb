//! Deserializers for values that can reach us from TOML, a config file or a deployment script's
//! environment, where the same setting might arrive as a number or a string.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
}

impl Lenient {
    fn into_string(self) -> String {
        match self {
            Lenient::Text(text) => text,
            Lenient::Unsigned(value) => value.to_string(),
            Lenient::Signed(value) => value.to_string(),
            Lenient::Float(value) => value.to_string(),
            Lenient::Bool(value) => value.to_string(),
        }
    }
}

/// Accepts a string or any scalar and hands back its string form.
///
/// TOML files and `ACTIONS_MIRROR_*` variables can hand us `project_id = 1234` as an integer even
/// though we want the text. Quote values whose exact spelling matters (`"007"`, `"2.0"`).
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Lenient::deserialize(deserializer)?.into_string())
}

/// Like [`string`] but for optional settings. Empty strings are treated as unset.
pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Lenient>::deserialize(deserializer)?
        .map(Lenient::into_string)
        .filter(|value| !value.trim().is_empty());

    Ok(value)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

/// Accepts either whole seconds (`30`) or a unit string (`10s`, `5m`, `1h`, `1m30s`, `500ms`).
pub fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
        RawDuration::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("duration is empty".into());
    }

    if let Ok(seconds) = text.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;

    while !rest.is_empty() {
        let unit_start = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("duration '{text}' is missing a unit"))?;
        let (number, tail) = rest.split_at(unit_start);
        let value: u64 = number
            .parse()
            .map_err(|_| format!("duration '{text}' is malformed"))?;

        let unit_end = tail.find(|c: char| c.is_ascii_digit()).unwrap_or(tail.len());
        let (unit, remainder) = tail.split_at(unit_end);

        let part = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            _ => {
                return Err(format!(
                    "duration '{text}' has unknown unit '{unit}'; use one of ms, s, m, h"
                ))
            }
        };

        total = total.saturating_add(part);
        rest = remainder;
    }

    Ok(total)
}
