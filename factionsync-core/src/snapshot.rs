//! Save-file snapshot: the authoritative faction/membership state for one cycle.
//!
//! # Source layout
//!
//! ```text
//! <MyObjectBuilder_Checkpoint>
//!   <Factions>
//!     <Factions>
//!       <MyObjectBuilder_Faction>
//!         <FactionId>144115188075855876</FactionId>
//!         <Tag>RED</Tag>
//!         <Name>Reds</Name>
//!         <Members>
//!           <MyObjectBuilder_FactionMember>
//!             <PlayerId>144115188075855895</PlayerId>
//!           </MyObjectBuilder_FactionMember>
//!         </Members>
//!       </MyObjectBuilder_Faction>
//! ```
//!
//! Only the first `Factions` element below the root is consulted; every
//! `MyObjectBuilder_Faction` anywhere beneath it is one faction.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::SnapshotError;
use crate::types::{FactionEntity, FactionId, MemberId};

const FACTIONS: &str = "Factions";
const FACTION: &str = "MyObjectBuilder_Faction";
const MEMBERS: &str = "Members";
const MEMBER: &str = "MyObjectBuilder_FactionMember";

/// Validated factions for one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    factions: Vec<FactionEntity>,
}

impl Snapshot {
    /// Build a snapshot from already-parsed factions.
    ///
    /// Later factions reusing an earlier id are dropped with a warning.
    pub fn new(factions: impl IntoIterator<Item = FactionEntity>) -> Self {
        let mut seen = HashSet::new();
        let factions = factions
            .into_iter()
            .filter(|f| {
                let fresh = seen.insert(f.id);
                if !fresh {
                    tracing::warn!(faction_id = %f.id, tag = %f.tag, "duplicate faction id in snapshot, skipping");
                }
                fresh
            })
            .collect();
        Self { factions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn factions(&self) -> &[FactionEntity] {
        &self.factions
    }

    /// Factions eligible for remote materialization, in snapshot order.
    pub fn primary_factions(&self) -> impl Iterator<Item = &FactionEntity> {
        self.factions.iter().filter(|f| f.is_primary)
    }

    /// Union of every faction's member ids.
    pub fn member_ids(&self) -> BTreeSet<MemberId> {
        self.factions
            .iter()
            .flat_map(|f| f.member_ids.iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.factions.is_empty()
    }
}

/// Read and parse the save file at `path`.
pub fn load(path: &Path) -> Result<Snapshot, SnapshotError> {
    let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text).map_err(|source| SnapshotError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the save file, degrading any failure to an empty snapshot.
///
/// An empty snapshot means "nothing to reconcile"; callers must never treat
/// it as a reason to delete anything.
pub fn load_or_empty(path: &Path) -> Snapshot {
    match load(path) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::error!(error = %err, "snapshot unavailable, reconciling nothing this cycle");
            Snapshot::empty()
        }
    }
}

/// Parse save-file XML text.
pub fn parse(text: &str) -> Result<Snapshot, roxmltree::Error> {
    let doc = Document::parse(text)?;
    let Some(factions_node) = child(doc.root_element(), FACTIONS) else {
        tracing::warn!("save file has no Factions element");
        return Ok(Snapshot::empty());
    };

    let factions = factions_node
        .descendants()
        .filter(|n| n.has_tag_name(FACTION))
        .filter_map(parse_faction);
    Ok(Snapshot::new(factions))
}

fn parse_faction(node: Node<'_, '_>) -> Option<FactionEntity> {
    let tag = child_text(node, "Tag");
    let name = child_text(node, "Name");

    let raw_id = child_text(node, "FactionId");
    let id = match raw_id.parse::<i64>() {
        Ok(id) => FactionId(id),
        Err(_) => {
            tracing::warn!(tag = %tag, raw_id = %raw_id, "faction has no usable FactionId, skipping");
            return None;
        }
    };

    let members = child(node, MEMBERS)
        .into_iter()
        .flat_map(|m| m.children().filter(|c| c.has_tag_name(MEMBER)))
        .filter_map(|member| {
            let raw = child_text(member, "PlayerId");
            if raw.is_empty() {
                return None;
            }
            match raw.parse::<i64>() {
                Ok(pid) => Some(MemberId(pid)),
                Err(_) => {
                    tracing::warn!(faction_id = %id, raw_player_id = %raw, "unparsable PlayerId, skipping member");
                    None
                }
            }
        });

    Some(FactionEntity::new(id, tag, name, members))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(name))
}

fn child_text(node: Node<'_, '_>, name: &str) -> String {
    child(node, name)
        .and_then(|c| c.text())
        .map(|t| t.trim().to_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
