//! Wire-format duration parsing (section 3.1): a PipelineConfig field may be
//! written as a plain integer (seconds) or a Go-style string (`"30m"`,
//! `"1h"`). Normalized internally to `std::time::Duration`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, schemars::JsonSchema)]
pub struct WireDuration(#[schemars(with = "String")] pub Duration);

impl WireDuration {
    pub fn from_secs(secs: u64) -> Self {
        WireDuration(Duration::from_secs(secs))
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }
}

impl From<WireDuration> for Duration {
    fn from(value: WireDuration) -> Self {
        value.0
    }
}

/// Parses `"90"`, `"30m"`, `"1h"`, `"1h30m"`-style suffixed strings. Bare
/// digits are seconds. Recognized suffixes: `s`, `m`, `h`.
pub fn parse_duration_str(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut number = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let unit_secs = match ch {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            other => return Err(format!("invalid duration unit '{other}' in '{s}'")),
        };
        if number.is_empty() {
            return Err(format!("invalid duration '{s}': missing number before unit"));
        }
        let value: u64 = number
            .parse()
            .map_err(|_| format!("invalid duration '{s}'"))?;
        total += value * unit_secs;
        number.clear();
    }
    if !number.is_empty() {
        return Err(format!("invalid duration '{s}': trailing digits with no unit"));
    }
    Ok(Duration::from_secs(total))
}

impl<'de> Deserialize<'de> for WireDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Seconds(u64),
            Text(String),
        }
        let repr = Repr::deserialize(deserializer)?;
        let duration = match repr {
            Repr::Seconds(secs) => Duration::from_secs(secs),
            Repr::Text(text) => parse_duration_str(&text).map_err(serde::de::Error::custom)?,
        };
        Ok(WireDuration(duration))
    }
}

impl Serialize for WireDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.0.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_duration_str("90").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn parses_minutes() {
        assert_eq!(parse_duration_str("30m").unwrap(), Duration::from_secs(1800));
    }

    #[test]
    fn parses_compound() {
        assert_eq!(
            parse_duration_str("1h30m").unwrap(),
            Duration::from_secs(5400)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration_str("banana").is_err());
        assert!(parse_duration_str("").is_err());
        assert!(parse_duration_str("30x").is_err());
    }
}
