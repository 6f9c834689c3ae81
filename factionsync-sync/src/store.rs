//! Mapping store: the engine's only memory of what it has already done.
//!
//! # Tables
//!
//! ```text
//! factions        (faction_id PK, tag, name, is_primary)      insert-or-replace
//! members         (member_id PK, display_name, external_id)   insert-or-ignore
//! memberships     (member_id PK, faction_id NULL)             insert-or-replace
//! remote_roles    (faction_id PK, role_id, created_at)        insert only
//! remote_channels (faction_id PK, channel_id, channel_name, created_at)
//! ```
//!
//! Role and channel rows are written once and only removed by teardown.
//! Writes outside a [`MappingStore::begin`] batch are durable immediately,
//! which is what makes a crash between "role created" and "channel row
//! written" a resumable state.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;

use factionsync_core::{FactionEntity, FactionId, MemberEntity, MemberId};

use crate::error::StoreError;
use crate::gateway::{ChannelId, RoleId};

// ---------------------------------------------------------------------------
// 1. Records
// ---------------------------------------------------------------------------

/// The remote role created for a faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    pub faction_id: FactionId,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
}

/// The remote channel created for a faction, with the name it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    pub faction_id: FactionId,
    pub channel_id: ChannelId,
    pub resolved_name: String,
    pub created_at: DateTime<Utc>,
}

/// Faction bookkeeping row, without members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactionRow {
    pub id: FactionId,
    pub tag: String,
    pub display_name: String,
    pub is_primary: bool,
}

// ---------------------------------------------------------------------------
// 2. Trait
// ---------------------------------------------------------------------------

/// Durable record of snapshot entities and the remote objects made for them.
pub trait MappingStore: Send {
    /// Start a batch; writes until [`commit`](Self::commit) land together.
    fn begin(&mut self) -> Result<(), StoreError>;
    fn commit(&mut self) -> Result<(), StoreError>;
    fn rollback(&mut self) -> Result<(), StoreError>;

    fn upsert_faction(&mut self, faction: &FactionEntity) -> Result<(), StoreError>;
    fn get_faction(&self, id: FactionId) -> Result<Option<FactionRow>, StoreError>;

    /// Insert the member if unknown; an existing row is left untouched.
    fn upsert_member(&mut self, id: MemberId) -> Result<(), StoreError>;
    fn get_member(&self, id: MemberId) -> Result<Option<MemberEntity>, StoreError>;
    fn list_member_ids(&self) -> Result<Vec<MemberId>, StoreError>;

    fn set_membership(
        &mut self,
        member: MemberId,
        faction: Option<FactionId>,
    ) -> Result<(), StoreError>;
    /// Outer `None`: no link row. Inner `None`: member belongs to no faction.
    fn get_membership(&self, member: MemberId) -> Result<Option<Option<FactionId>>, StoreError>;

    fn get_role_record(&self, faction: FactionId) -> Result<Option<RoleRecord>, StoreError>;
    fn put_role_record(&mut self, faction: FactionId, role: RoleId) -> Result<(), StoreError>;
    fn list_role_records(&self) -> Result<Vec<RoleRecord>, StoreError>;
    fn clear_role_records(&mut self) -> Result<(), StoreError>;

    fn get_channel_record(&self, faction: FactionId) -> Result<Option<ChannelRecord>, StoreError>;
    fn put_channel_record(
        &mut self,
        faction: FactionId,
        channel: ChannelId,
        resolved_name: &str,
    ) -> Result<(), StoreError>;
    fn list_channel_records(&self) -> Result<Vec<ChannelRecord>, StoreError>;
    fn clear_channel_records(&mut self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// 3. SQLite implementation
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS factions (
    faction_id INTEGER PRIMARY KEY,
    tag        TEXT NOT NULL,
    name       TEXT NOT NULL,
    is_primary INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS members (
    member_id           INTEGER PRIMARY KEY,
    display_name        TEXT,
    external_account_id TEXT
);
CREATE TABLE IF NOT EXISTS memberships (
    member_id  INTEGER PRIMARY KEY,
    faction_id INTEGER NULL
);
CREATE TABLE IF NOT EXISTS remote_roles (
    faction_id INTEGER PRIMARY KEY,
    role_id    INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS remote_channels (
    faction_id   INTEGER PRIMARY KEY,
    channel_id   INTEGER NOT NULL,
    channel_name TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
";

/// [`MappingStore`] backed by a single SQLite file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Private in-memory database, gone when the store is dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

impl MappingStore for SqliteStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn upsert_faction(&mut self, faction: &FactionEntity) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO factions (faction_id, tag, name, is_primary)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                faction.id.0,
                faction.tag,
                faction.display_name,
                faction.is_primary
            ],
        )?;
        Ok(())
    }

    fn get_faction(&self, id: FactionId) -> Result<Option<FactionRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT tag, name, is_primary FROM factions WHERE faction_id = ?1",
                params![id.0],
                |row| {
                    Ok(FactionRow {
                        id,
                        tag: row.get(0)?,
                        display_name: row.get(1)?,
                        is_primary: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn upsert_member(&mut self, id: MemberId) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO members (member_id, display_name, external_account_id)
             VALUES (?1, NULL, NULL)",
            params![id.0],
        )?;
        Ok(())
    }

    fn get_member(&self, id: MemberId) -> Result<Option<MemberEntity>, StoreError> {
        let member = self
            .conn
            .query_row(
                "SELECT display_name, external_account_id FROM members WHERE member_id = ?1",
                params![id.0],
                |row| {
                    Ok(MemberEntity {
                        id,
                        display_name: row.get(0)?,
                        external_account_id: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(member)
    }

    fn list_member_ids(&self) -> Result<Vec<MemberId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT member_id FROM members ORDER BY member_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(MemberId))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn set_membership(
        &mut self,
        member: MemberId,
        faction: Option<FactionId>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO memberships (member_id, faction_id) VALUES (?1, ?2)",
            params![member.0, faction.map(|f| f.0)],
        )?;
        Ok(())
    }

    fn get_membership(&self, member: MemberId) -> Result<Option<Option<FactionId>>, StoreError> {
        let link = self
            .conn
            .query_row(
                "SELECT faction_id FROM memberships WHERE member_id = ?1",
                params![member.0],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(link.map(|faction| faction.map(FactionId)))
    }

    fn get_role_record(&self, faction: FactionId) -> Result<Option<RoleRecord>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT role_id, created_at FROM remote_roles WHERE faction_id = ?1",
                params![faction.0],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        raw.map(|(role, created)| role_record(faction.0, role, &created))
            .transpose()
    }

    fn put_role_record(&mut self, faction: FactionId, role: RoleId) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO remote_roles (faction_id, role_id, created_at) VALUES (?1, ?2, ?3)",
                params![faction.0, to_sql_id(role.0)?, Utc::now().to_rfc3339()],
            )
            .map_err(|e| duplicate_or(e, "role", faction))?;
        Ok(())
    }

    fn list_role_records(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT faction_id, role_id, created_at FROM remote_roles ORDER BY faction_id")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(faction, role, created)| role_record(faction, role, &created))
            .collect()
    }

    fn clear_role_records(&mut self) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM remote_roles", [])?;
        Ok(())
    }

    fn get_channel_record(&self, faction: FactionId) -> Result<Option<ChannelRecord>, StoreError> {
        let raw = self
            .conn
            .query_row(
                "SELECT channel_id, channel_name, created_at FROM remote_channels WHERE faction_id = ?1",
                params![faction.0],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        raw.map(|(channel, name, created)| channel_record(faction.0, channel, name, &created))
            .transpose()
    }

    fn put_channel_record(
        &mut self,
        faction: FactionId,
        channel: ChannelId,
        resolved_name: &str,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO remote_channels (faction_id, channel_id, channel_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    faction.0,
                    to_sql_id(channel.0)?,
                    resolved_name,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| duplicate_or(e, "channel", faction))?;
        Ok(())
    }

    fn list_channel_records(&self) -> Result<Vec<ChannelRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT faction_id, channel_id, channel_name, created_at
             FROM remote_channels ORDER BY faction_id",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(faction, channel, name, created)| channel_record(faction, channel, name, &created))
            .collect()
    }

    fn clear_channel_records(&mut self) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM remote_channels", [])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

// SQLite integers are signed; snowflakes fit in 63 bits.
fn to_sql_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Corrupt {
        column: "remote id",
        value: id.to_string(),
    })
}

fn from_sql_id(column: &'static str, id: i64) -> Result<u64, StoreError> {
    u64::try_from(id).map_err(|_| StoreError::Corrupt {
        column,
        value: id.to_string(),
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            column: "created_at",
            value: raw.to_owned(),
        })
}

fn role_record(faction: i64, role: i64, created: &str) -> Result<RoleRecord, StoreError> {
    Ok(RoleRecord {
        faction_id: FactionId(faction),
        role_id: RoleId(from_sql_id("role_id", role)?),
        created_at: parse_timestamp(created)?,
    })
}

fn channel_record(
    faction: i64,
    channel: i64,
    resolved_name: String,
    created: &str,
) -> Result<ChannelRecord, StoreError> {
    Ok(ChannelRecord {
        faction_id: FactionId(faction),
        channel_id: ChannelId(from_sql_id("channel_id", channel)?),
        resolved_name,
        created_at: parse_timestamp(created)?,
    })
}

fn duplicate_or(err: rusqlite::Error, kind: &'static str, faction_id: FactionId) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::DuplicateRecord { kind, faction_id },
        _ => StoreError::Sqlite(err),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
