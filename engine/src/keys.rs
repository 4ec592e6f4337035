//! Natural-key identities shared by the diff detector and merge applicator.
//!
//! Keys double as the public `entity_id` of a difference and of a selection,
//! so their string form is part of the wire format:
//!
//! - book: `"{isbn}"`
//! - location: `"{name}:{type}"`
//! - ownership: `"{user_id}:{isbn}:{location_id}"`
//!
//! No escaping is applied. Parsing takes the location type and the location
//! id from the right-hand end and the user id from the left-hand end, so
//! location names and book keys may themselves contain the delimiter. User
//! ids must not.

use crate::{LocationId, LocationType, UserId};
use std::fmt;
use std::str::FromStr;

/// Separator between the components of a composite key.
pub const KEY_DELIMITER: char = ':';

/// Identity of a location independent of its surrogate id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationKey {
    name: String,
    kind: LocationType,
}

impl LocationKey {
    pub fn new(name: impl Into<String>, kind: LocationType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> LocationType {
        self.kind
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, KEY_DELIMITER, self.kind)
    }
}

impl FromStr for LocationKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, kind) = s
            .rsplit_once(KEY_DELIMITER)
            .ok_or_else(|| format!("malformed location key: {}", s))?;
        Ok(Self::new(name, kind.parse()?))
    }
}

/// Identity of an ownership once its location id is expressed in live ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnershipKey {
    user_id: UserId,
    isbn: String,
    location_id: LocationId,
}

impl OwnershipKey {
    pub fn new(user_id: impl Into<UserId>, isbn: impl Into<String>, location_id: LocationId) -> Self {
        Self {
            user_id: user_id.into(),
            isbn: isbn.into(),
            location_id,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }
}

impl fmt::Display for OwnershipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.user_id,
            self.isbn,
            self.location_id,
            d = KEY_DELIMITER
        )
    }
}

impl FromStr for OwnershipKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || format!("malformed ownership key: {}", s);
        let (user_id, rest) = s.split_once(KEY_DELIMITER).ok_or_else(malformed)?;
        let (isbn, location_id) = rest.rsplit_once(KEY_DELIMITER).ok_or_else(malformed)?;
        let location_id = location_id.parse().map_err(|_| malformed())?;
        Ok(Self::new(user_id, isbn, location_id))
    }
}
