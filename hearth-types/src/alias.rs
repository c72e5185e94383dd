//! The room alias model.
//!
//! A room alias is the human-addressable name of a room, derived
//! deterministically from `(seed, collection key, owner)`:
//!
//! ```text
//! #<seed>~<collection>~@<local>:<server>
//! ```
//!
//! `~` and `#` are reserved as structural separators and rejected inside
//! seeds, which makes [`RoomAlias::parse`] the exact inverse of
//! [`RoomAlias::build`].

use crate::{CollectionKey, Error, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of an alias seed.
pub const MAX_SEED_LEN: usize = 64;

const SEED_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Validates an alias seed: 1..=64 chars of `[a-z0-9._=-]`.
pub fn validate_seed(seed: &str) -> crate::Result<()> {
    if seed.is_empty() {
        return Err(Error::InvalidSeed("seed is empty".into()));
    }
    if seed.len() > MAX_SEED_LEN {
        return Err(Error::InvalidSeed(format!(
            "seed longer than {MAX_SEED_LEN} chars"
        )));
    }
    if let Some(bad) = seed
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || "._=-".contains(*c)))
    {
        return Err(Error::InvalidSeed(format!(
            "seed contains invalid character {bad:?}: {seed}"
        )));
    }
    Ok(())
}

/// Generates a random valid seed of the given length.
#[must_use]
pub fn random_seed(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let len = len.clamp(1, MAX_SEED_LEN);
    (0..len)
        .map(|_| SEED_CHARSET[rng.gen_range(0..SEED_CHARSET.len())] as char)
        .collect()
}

/// A room's human-addressable name.
///
/// Building and parsing are exact inverses: for every valid triple,
/// `RoomAlias::parse(&alias.to_string())` returns the original seed,
/// collection, and owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RoomAlias {
    seed: String,
    collection: CollectionKey,
    owner: UserId,
}

impl RoomAlias {
    /// Builds an alias from its three inputs. Pure and deterministic.
    pub fn build(seed: &str, collection: CollectionKey, owner: &UserId) -> crate::Result<Self> {
        validate_seed(seed)?;
        Ok(Self {
            seed: seed.to_string(),
            collection,
            owner: owner.clone(),
        })
    }

    /// Parses the `#seed~collection~owner` string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let body = s
            .strip_prefix('#')
            .ok_or_else(|| Error::MalformedAlias(format!("missing '#' prefix: {s}")))?;
        let mut parts = body.splitn(3, '~');
        let (seed, collection, owner) = match (parts.next(), parts.next(), parts.next()) {
            (Some(seed), Some(collection), Some(owner)) => (seed, collection, owner),
            _ => {
                return Err(Error::MalformedAlias(format!(
                    "expected 3 '~'-separated parts: {s}"
                )))
            }
        };
        validate_seed(seed).map_err(|_| Error::MalformedAlias(format!("bad seed in: {s}")))?;
        let collection = collection
            .parse::<CollectionKey>()
            .map_err(|_| Error::MalformedAlias(format!("bad collection in: {s}")))?;
        let owner =
            UserId::parse(owner).map_err(|_| Error::MalformedAlias(format!("bad owner in: {s}")))?;
        Ok(Self {
            seed: seed.to_string(),
            collection,
            owner,
        })
    }

    /// The alias seed.
    #[must_use]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// The collection the room belongs to.
    #[must_use]
    pub const fn collection(&self) -> CollectionKey {
        self.collection
    }

    /// The room's owner.
    #[must_use]
    pub fn owner(&self) -> &UserId {
        &self.owner
    }
}

impl fmt::Display for RoomAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}~{}~{}", self.seed, self.collection, self.owner)
    }
}

impl FromStr for RoomAlias {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<RoomAlias> for String {
    fn from(alias: RoomAlias) -> Self {
        alias.to_string()
    }
}

impl TryFrom<String> for RoomAlias {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}
