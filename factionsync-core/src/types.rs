//! Domain types for the faction snapshot.
//!
//! Identities are integer newtypes taken straight from the save file. They are
//! the only thing that links a faction or member across reconciliation cycles.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identity of a faction inside the save file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionId(pub i64);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for FactionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Stable identity of a player (faction member) inside the save file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub i64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for MemberId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Tag length that marks a player faction. NPC and mod factions use longer tags.
pub const PRIMARY_TAG_LEN: usize = 3;

/// Whether a faction with this tag may materialize remote objects.
///
/// Counts characters, not bytes, so multi-byte tags classify the same way the
/// game displays them.
pub fn is_primary_tag(tag: &str) -> bool {
    tag.chars().count() == PRIMARY_TAG_LEN
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One faction as seen in the latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionEntity {
    pub id: FactionId,
    pub tag: String,
    pub display_name: String,
    pub is_primary: bool,
    #[serde(default)]
    pub member_ids: BTreeSet<MemberId>,
}

impl FactionEntity {
    /// Build a faction, deriving `is_primary` from the tag.
    pub fn new(
        id: FactionId,
        tag: impl Into<String>,
        display_name: impl Into<String>,
        member_ids: impl IntoIterator<Item = MemberId>,
    ) -> Self {
        let tag = tag.into();
        Self {
            id,
            is_primary: is_primary_tag(&tag),
            tag,
            display_name: display_name.into(),
            member_ids: member_ids.into_iter().collect(),
        }
    }
}

/// A player row. Created the first time any faction references it and never
/// deleted afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntity {
    pub id: MemberId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_account_id: Option<String>,
}

impl MemberEntity {
    pub fn bare(id: MemberId) -> Self {
        Self {
            id,
            display_name: None,
            external_account_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
