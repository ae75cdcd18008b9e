//! License key issuance and verification.
//!
//! Keys have the shape `PREFIX-PLAN-XXXX-XXXX-XXXX-XXXX-CCCC`:
//!
//! - `PREFIX` is the configured prefix (default `LIC`)
//! - `PLAN` is the plan identifier in upper case
//! - each `XXXX` is a segment of characters drawn from the OS random source
//! - `CCCC` is a check segment derived from HMAC-SHA256 over the rest of the
//!   key, so a key can later be recognised as one this issuer produced
//!
//! Ambiguous characters (0, O, I, L, 1) never appear in generated segments.
//!
//! # Example
//!
//! ```rust,ignore
//! use license_issuer::config::KeyConfig;
//! use license_issuer::license_key::{HmacKeyIssuer, KeyIssuer};
//!
//! let issuer = HmacKeyIssuer::new(&key_config)?;
//! let key = issuer.issue("home")?;
//! assert!(issuer.verify(&key, "home"));
//! ```

use rand::rngs::OsRng;
use rand::TryRngCore;
use regex::Regex;
use ring::hmac;
use std::fmt;
use std::sync::OnceLock;

use crate::config::KeyConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Character set for license key generation.
/// Excludes ambiguous characters: 0, O, I, L, 1
const LICENSE_KEY_CHARSET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Random bytes at or above this value are discarded so every charset entry
/// is equally likely (largest multiple of 31 that fits in a byte).
const UNBIASED_BYTE_LIMIT: usize = LICENSE_KEY_CHARSET.len() * 8;

/// Length of the trailing check segment.
pub const CHECK_SEGMENT_LENGTH: usize = 4;

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Minimum number of random characters per key (31^13 > 2^64).
pub const MIN_RANDOM_CHARS: usize = 13;

/// Produces license keys for a plan.
///
/// Implementations must return keys that are unique across calls and hard to
/// guess. Failures are returned unchanged to the caller; nothing retries.
pub trait KeyIssuer {
    fn issue(&self, plan: &str) -> LicenseResult<String>;
}

/// Layout of the random portion of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFormat {
    /// Prefix for the license key (e.g., "LIC")
    pub prefix: String,
    /// Number of random segments
    pub segments: u8,
    /// Length of each random segment
    pub segment_length: u8,
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self {
            prefix: "LIC".to_string(),
            segments: 4,
            segment_length: 4,
        }
    }
}

impl From<&KeyConfig> for KeyFormat {
    fn from(config: &KeyConfig) -> Self {
        Self {
            prefix: config.key_prefix.clone(),
            segments: config.key_segments,
            segment_length: config.key_segment_length,
        }
    }
}

impl KeyFormat {
    fn random_chars(&self) -> usize {
        self.segments as usize * self.segment_length as usize
    }
}

/// Components of a license key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub prefix: String,
    pub plan: String,
    pub segments: Vec<String>,
    pub check: String,
}

/// Split a key into prefix, plan token, random segments and check segment.
///
/// Returns `None` when the key has fewer than four dash-separated parts.
/// The plan token is returned in lower case.
pub fn parse_license_key(key: &str) -> Option<ParsedKey> {
    let parts: Vec<&str> = key.split('-').collect();
    if parts.len() < 4 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let last = parts.len() - 1;
    Some(ParsedKey {
        prefix: parts[0].to_string(),
        plan: parts[1].to_lowercase(),
        segments: parts[2..last].iter().map(|s| s.to_string()).collect(),
        check: parts[last].to_string(),
    })
}

/// Validate that a license key matches the expected layout.
///
/// This validates:
/// - The key starts with the expected prefix
/// - The plan token is a valid plan identifier
/// - The key has the correct number of segments of the correct length
/// - All characters in segments are from the valid character set
///
/// The check segment is not verified here, see [`HmacKeyIssuer::verify`].
pub fn validate_license_key_format(key: &str, format: &KeyFormat) -> bool {
    let Some(parsed) = parse_license_key(key) else {
        return false;
    };

    if parsed.prefix != format.prefix {
        return false;
    }
    if !is_valid_plan_id(&parsed.plan) {
        return false;
    }
    if parsed.segments.len() != format.segments as usize {
        return false;
    }

    let segment_ok = |segment: &str, len: usize| {
        segment.len() == len && segment.bytes().all(|b| LICENSE_KEY_CHARSET.contains(&b))
    };

    parsed
        .segments
        .iter()
        .all(|s| segment_ok(s, format.segment_length as usize))
        && segment_ok(&parsed.check, CHECK_SEGMENT_LENGTH)
}

fn plan_id_regex() -> &'static Regex {
    static PLAN_ID: OnceLock<Regex> = OnceLock::new();
    PLAN_ID.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{0,31}$").expect("plan id pattern is valid"))
}

/// Plan identifiers are lowercase ASCII, start with a letter, and are at most
/// 32 characters of `[a-z0-9_]`.
pub fn is_valid_plan_id(plan: &str) -> bool {
    plan_id_regex().is_match(plan)
}

/// Draw `len` charset characters from the OS random source.
fn random_charset_chars(len: usize) -> LicenseResult<Vec<u8>> {
    let mut rng = OsRng;
    let mut out = Vec::with_capacity(len);
    let mut buf = [0u8; 64];

    while out.len() < len {
        rng.try_fill_bytes(&mut buf).map_err(|e| {
            LicenseError::GenerationError(format!("OS random source failed: {e}"))
        })?;

        for &b in &buf {
            if (b as usize) < UNBIASED_BYTE_LIMIT {
                out.push(LICENSE_KEY_CHARSET[b as usize % LICENSE_KEY_CHARSET.len()]);
                if out.len() == len {
                    break;
                }
            }
        }
    }

    Ok(out)
}

/// Key issuer that signs every key with an HMAC-SHA256 check segment.
pub struct HmacKeyIssuer {
    key: hmac::Key,
    format: KeyFormat,
}

impl fmt::Debug for HmacKeyIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacKeyIssuer")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl HmacKeyIssuer {
    /// Build an issuer from explicit configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError` when the secret is missing or shorter than
    /// [`MIN_SECRET_LEN`] bytes, or when the key layout carries fewer than
    /// [`MIN_RANDOM_CHARS`] random characters.
    pub fn new(config: &KeyConfig) -> LicenseResult<Self> {
        if config.secret.is_empty() {
            return Err(LicenseError::ConfigError(
                "license signing secret is not set (LICENSE_SECRET_KEY)".to_string(),
            ));
        }
        if config.secret.len() < MIN_SECRET_LEN {
            return Err(LicenseError::ConfigError(format!(
                "license signing secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                config.secret.len()
            )));
        }

        let format = KeyFormat::from(config);
        if format.random_chars() < MIN_RANDOM_CHARS {
            return Err(LicenseError::ConfigError(format!(
                "key layout has {} random characters, at least {MIN_RANDOM_CHARS} are required",
                format.random_chars()
            )));
        }

        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, config.secret.as_bytes()),
            format,
        })
    }

    pub fn format(&self) -> &KeyFormat {
        &self.format
    }

    /// Check segment for the signed portion of a key.
    ///
    /// Tag bytes are sampled with the same rejection rule as the random
    /// segments. If a tag runs out of usable bytes, the next block is the
    /// HMAC of the previous tag, so the result stays deterministic.
    fn check_segment(&self, signed: &str) -> String {
        let mut check = String::with_capacity(CHECK_SEGMENT_LENGTH);
        let mut tag = hmac::sign(&self.key, signed.as_bytes());

        loop {
            for &b in tag.as_ref() {
                if (b as usize) < UNBIASED_BYTE_LIMIT {
                    check.push(LICENSE_KEY_CHARSET[b as usize % LICENSE_KEY_CHARSET.len()] as char);
                    if check.len() == CHECK_SEGMENT_LENGTH {
                        return check;
                    }
                }
            }
            tag = hmac::sign(&self.key, tag.as_ref());
        }
    }

    /// Returns true if `key` was produced by an issuer holding the same secret
    /// for the given `plan`.
    pub fn verify(&self, key: &str, plan: &str) -> bool {
        if !validate_license_key_format(key, &self.format) {
            return false;
        }
        let Some(parsed) = parse_license_key(key) else {
            return false;
        };
        if parsed.plan != plan {
            return false;
        }

        let signed = format!(
            "{}-{}-{}",
            parsed.prefix,
            plan.to_uppercase(),
            parsed.segments.join("-")
        );
        self.check_segment(&signed) == parsed.check
    }
}

impl KeyIssuer for HmacKeyIssuer {
    fn issue(&self, plan: &str) -> LicenseResult<String> {
        if !is_valid_plan_id(plan) {
            return Err(LicenseError::GenerationError(format!(
                "'{plan}' is not a valid plan identifier"
            )));
        }

        let chars = random_charset_chars(self.format.random_chars())?;
        let segments: Vec<String> = chars
            .chunks(self.format.segment_length as usize)
            .map(|chunk| chunk.iter().map(|&b| b as char).collect())
            .collect();

        let signed = format!(
            "{}-{}-{}",
            self.format.prefix,
            plan.to_uppercase(),
            segments.join("-")
        );
        let check = self.check_segment(&signed);

        Ok(format!("{signed}-{check}"))
    }
}
