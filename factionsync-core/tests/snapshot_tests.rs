//! Save-file loading and config loading against real files on disk.

use assert_fs::prelude::*;
use factionsync_core::{
    config,
    snapshot::{self, Snapshot},
    types::{FactionId, MemberId},
    ConfigError, SnapshotError,
};
use predicates::prelude::predicate;
use rstest::rstest;

const SANDBOX: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MyObjectBuilder_Checkpoint xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <SessionName>Test World</SessionName>
  <Factions>
    <Factions>
      <MyObjectBuilder_Faction>
        <FactionId>144115188075855876</FactionId>
        <Tag>RED</Tag>
        <Name>Reds</Name>
        <Description />
        <Members>
          <MyObjectBuilder_FactionMember>
            <PlayerId>144115188075855895</PlayerId>
            <IsLeader>true</IsLeader>
          </MyObjectBuilder_FactionMember>
          <MyObjectBuilder_FactionMember>
            <PlayerId>144115188075855896</PlayerId>
          </MyObjectBuilder_FactionMember>
        </Members>
      </MyObjectBuilder_Faction>
      <MyObjectBuilder_Faction>
        <FactionId>144115188075855877</FactionId>
        <Tag>SPRT</Tag>
        <Name>Space Pirates</Name>
        <Members />
      </MyObjectBuilder_Faction>
    </Factions>
  </Factions>
</MyObjectBuilder_Checkpoint>
"#;

// ---------------------------------------------------------------------------
// 1. Snapshot files
// ---------------------------------------------------------------------------

#[test]
fn loads_sandbox_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("Sandbox.sbc");
    file.write_str(SANDBOX).expect("write sandbox");

    let snapshot = snapshot::load(file.path()).expect("load");
    assert_eq!(snapshot.factions().len(), 2);

    let primary: Vec<_> = snapshot.primary_factions().collect();
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].id, FactionId(144_115_188_075_855_876));
    assert_eq!(primary[0].display_name, "Reds");
    assert!(snapshot
        .member_ids()
        .contains(&MemberId(144_115_188_075_855_896)));
}

#[test]
fn truncated_file_is_malformed_and_degrades_to_empty() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("Sandbox.sbc");
    file.write_str(&SANDBOX[..SANDBOX.len() / 2]).expect("write");

    let err = snapshot::load(file.path()).unwrap_err();
    assert!(matches!(err, SnapshotError::Malformed { .. }), "got: {err}");
    assert!(err.to_string().contains("Sandbox.sbc"));
    assert_eq!(snapshot::load_or_empty(file.path()), Snapshot::empty());
}

#[test]
fn missing_file_is_source_unavailable() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("Sandbox.sbc");
    dir.child("Sandbox.sbc").assert(predicate::path::missing());

    let err = snapshot::load(&path).unwrap_err();
    assert!(matches!(err, SnapshotError::SourceUnavailable { .. }));
}

// ---------------------------------------------------------------------------
// 2. Config files
// ---------------------------------------------------------------------------

#[rstest]
#[case("guild_id: 0\ncategory_id: 2\nsnapshot_path: s\n", "guild_id")]
#[case("guild_id: 1\ncategory_id: 0\nsnapshot_path: s\n", "category_id")]
#[case(
    "guild_id: 1\ncategory_id: 2\nsnapshot_path: s\nsync_interval_secs: 0\n",
    "sync_interval_secs"
)]
fn invalid_values_name_the_field(#[case] body: &str, #[case] field: &str) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("factionsync.yaml");
    file.write_str(body).expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }), "got: {err}");
    assert!(err.to_string().contains(field));
}

#[test]
fn missing_required_field_is_parse_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("factionsync.yaml");
    file.write_str("guild_id: 1\n").expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("factionsync.yaml"));
}

#[test]
fn full_config_roundtrips_all_directives() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("factionsync.yaml");
    file.write_str(
        "guild_id: 112233\ncategory_id: 445566\nsnapshot_path: /srv/Sandbox.sbc\n\
         database_path: /var/lib/factionsync.db\nsync_interval_secs: 60\n\
         delete_all: true\ndelete_unused: true\ndebug: true\n",
    )
    .expect("write");

    let cfg = config::load_at(file.path()).expect("load");
    assert_eq!(cfg.guild_id, 112_233);
    assert_eq!(cfg.category_id, 445_566);
    assert_eq!(cfg.sync_interval_secs, 60);
    assert!(cfg.delete_all && cfg.delete_unused && cfg.debug);
}
