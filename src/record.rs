//! Records printed by the modelling script.
//!
//! The script prints a flat, comma separated list `key,value,key,value,...`.
//! Keys may carry line endings left over from the script's `print`, values are
//! kept as they are.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Token delimiter of script output.
pub const DELIMITER: char = ',';

/// One key/value pair of script output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    pub key: String,
    /// None for a trailing key without value.
    pub value: Option<String>,
}

impl Record {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn unpaired<K: Into<String>>(key: K) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// Records of one script run, in output order.
pub type RecordSet = Vec<Record>;

/// What to do with the last token when the token count is odd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OddTokenPolicy {
    /// Keep the trailing key with no value.
    Keep,
    /// Discard the trailing key.
    Drop,
    /// Fail with `ParseError::UnpairedKey`.
    Reject,
}

impl Default for OddTokenPolicy {
    fn default() -> Self {
        OddTokenPolicy::Keep
    }
}

impl FromStr for OddTokenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(OddTokenPolicy::Keep),
            "drop" => Ok(OddTokenPolicy::Drop),
            "reject" => Ok(OddTokenPolicy::Reject),
            other => Err(format!(
                "unknown odd token policy '{}', expected keep, drop or reject",
                other
            )),
        }
    }
}

impl fmt::Display for OddTokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OddTokenPolicy::Keep => "keep",
            OddTokenPolicy::Drop => "drop",
            OddTokenPolicy::Reject => "reject",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("key '{key}' has no value")]
    UnpairedKey { key: String },
}

/// Parse script output with the default policy, never fails.
pub fn parse(raw: &str) -> RecordSet {
    let mut records = Vec::new();
    for (key, value) in pairs(raw) {
        records.push(Record {
            key: strip_line_endings(key),
            value: value.map(String::from),
        });
    }
    records
}

/// Parse script output, handling an odd token count with `policy`.
pub fn parse_with(raw: &str, policy: OddTokenPolicy) -> Result<RecordSet, ParseError> {
    let mut records = Vec::new();
    for (key, value) in pairs(raw) {
        let key = strip_line_endings(key);
        match (value, policy) {
            (Some(v), _) => records.push(Record::new(key, v)),
            (None, OddTokenPolicy::Keep) => records.push(Record::unpaired(key)),
            (None, OddTokenPolicy::Drop) => log::debug!("dropping unpaired key '{}'", key),
            (None, OddTokenPolicy::Reject) => return Err(ParseError::UnpairedKey { key }),
        }
    }
    Ok(records)
}

/// Removes every carriage return and line feed.
pub fn strip_line_endings(s: &str) -> String {
    s.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Consecutive token pairs, the last value is None for an odd token count.
fn pairs(raw: &str) -> Pairs<'_> {
    Pairs {
        tokens: if raw.is_empty() {
            None
        } else {
            Some(raw.split(DELIMITER))
        },
    }
}

struct Pairs<'a> {
    tokens: Option<std::str::Split<'a, char>>,
}

impl<'a> Iterator for Pairs<'a> {
    type Item = (&'a str, Option<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        let tokens = self.tokens.as_mut()?;
        let key = tokens.next()?;
        Some((key, tokens.next()))
    }
}
