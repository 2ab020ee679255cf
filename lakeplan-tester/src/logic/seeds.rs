use anyhow::{Context, Result, bail, ensure};
use std::collections::HashSet;

pub const DEFAULT_SEED: u64 = 1337;
/// Upper bound on how many seeds a single range token may expand to.
pub const MAX_RANGE_SEEDS: u64 = 10_000;

/// A resolved seed and the CLI token it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub token: String,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self {
            seed,
            token: seed.to_string(),
        }
    }

    fn from_token(seed: u64, token: &str) -> Self {
        Self {
            seed,
            token: token.to_string(),
        }
    }
}

fn parse_single(token: &str) -> Option<u64> {
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok();
    }
    if let Ok(value) = token.parse::<u64>() {
        return Some(value);
    }
    token.parse::<i64>().ok().map(i64::unsigned_abs)
}

fn parse_range(token: &str) -> Result<Option<Vec<u64>>> {
    let (start, end, inclusive) = if let Some((start, end)) = token.split_once("..=") {
        (start, end, true)
    } else if let Some((start, end)) = token.split_once("..") {
        (start, end, false)
    } else {
        return Ok(None);
    };
    let start = parse_single(start).with_context(|| format!("bad range start in {token}"))?;
    let end = parse_single(end).with_context(|| format!("bad range end in {token}"))?;
    let end = if inclusive {
        end.checked_add(1)
            .with_context(|| format!("range end overflows in {token}"))?
    } else {
        end
    };
    ensure!(start < end, "empty seed range: {token}");
    ensure!(
        end - start <= MAX_RANGE_SEEDS,
        "seed range {token} expands to more than {MAX_RANGE_SEEDS} seeds"
    );
    Ok(Some((start..end).collect()))
}

/// Resolve a list of CLI seed arguments into canonical seeds.
///
/// Supports decimal integers (negative values use their magnitude), `0x`
/// hex literals and ranges such as `1..10` or `1..=10`. Duplicates keep their
/// first position; an empty list falls back to [`DEFAULT_SEED`].
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Some(seed) = parse_single(token) {
            pending.push(SeedInfo::from_token(seed, token));
            continue;
        }

        if let Some(range) = parse_range(token)? {
            pending.extend(range.into_iter().map(SeedInfo::from_numeric));
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    let mut seen = HashSet::new();
    pending.retain(|info| seen.insert(info.seed));

    if pending.is_empty() {
        pending.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(pending)
}
