use anyhow::Result;
use std::collections::HashSet;
use thiserror::Error;

/// Seed used when the command line names none.
pub const DEFAULT_SEED: u64 = 1337;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedError {
    #[error("Unrecognized seed token: {0}")]
    Unrecognized(String),
}

/// Seed metadata carried through a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    /// Token as typed, when it was not already a plain decimal.
    pub label: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self { seed, label: None }
    }

    #[must_use]
    pub fn from_hex(seed: u64, token: &str) -> Self {
        Self {
            seed,
            label: Some(token.to_ascii_lowercase()),
        }
    }
}

/// Resolve a list of CLI seed arguments into canonical seed metadata.
///
/// Accepts decimal integers (negative values use their magnitude) and
/// `0x`-prefixed hex. Duplicates keep their first position.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut seen: HashSet<u64> = HashSet::new();
    let mut resolved: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }
        let info = parse_seed(token)?;
        if seen.insert(info.seed) {
            resolved.push(info);
        }
    }

    if resolved.is_empty() {
        resolved.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(resolved)
}

fn parse_seed(token: &str) -> Result<SeedInfo, SeedError> {
    if let Ok(value) = token.parse::<i64>() {
        return Ok(SeedInfo::from_numeric(value.unsigned_abs()));
    }

    if let Ok(value) = token.parse::<u64>() {
        return Ok(SeedInfo::from_numeric(value));
    }

    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        && let Ok(value) = u64::from_str_radix(hex, 16)
    {
        return Ok(SeedInfo::from_hex(value, token));
    }

    Err(SeedError::Unrecognized(token.to_string()))
}
