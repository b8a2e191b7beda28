//! Deterministic A/B bucketing.
//!
//! Buckets must match the backend bit-for-bit, so hashing runs over UTF-16 code units (not UTF-8
//! bytes) and the modulus/divisor pairs are fixed per [`HashVersion`].
use crate::Error;

const FNV32A_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32A_PRIME: u32 = 0x0100_0193;

/// Bucketing hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashVersion {
    /// `fnv32a(value + seed) % 1000 / 1000`. Biased; only kept so that already-bucketed users
    /// stay where they are.
    V1,
    /// `fnv32a(fnv32a(seed + value).to_string()) % 10000 / 10000`.
    #[default]
    V2,
}

impl TryFrom<u8> for HashVersion {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(HashVersion::V1),
            2 => Ok(HashVersion::V2),
            other => Err(Error::UnsupportedHashVersion(other)),
        }
    }
}

/// 32-bit FNV-1a over the UTF-16 code units of `value`.
pub fn fnv32a(value: &str) -> u32 {
    value.encode_utf16().fold(FNV32A_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV32A_PRIME)
    })
}

/// Hash `value` under `seed` into `[0, 1)`.
pub fn bucket(seed: &str, value: &str, version: HashVersion) -> f64 {
    match version {
        HashVersion::V1 => {
            let n = fnv32a(&format!("{value}{seed}"));
            f64::from(n % 1000) / 1000.0
        }
        HashVersion::V2 => {
            let n = fnv32a(&fnv32a(&format!("{seed}{value}")).to_string());
            f64::from(n % 10_000) / 10_000.0
        }
    }
}

/// 50/50 split: `true` if `attribution_key` falls into the control group (variation 0) of
/// `experiment_id`.
pub fn is_in_control_group(experiment_id: &str, attribution_key: &str) -> bool {
    let variation = if bucket(experiment_id, attribution_key, HashVersion::V2) < 0.5 {
        0
    } else {
        1
    };
    log::trace!(target: "questline", experiment_id, attribution_key, variation; "assigned variation");
    variation == 0
}
