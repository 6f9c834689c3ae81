use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use factionsync_core::{FactionEntity, FactionId, MemberId};
use factionsync_sync::{ChannelId, MappingStore, RoleId, SqliteStore};

const SAVE: &str = r#"<?xml version="1.0"?>
<MyObjectBuilder_Checkpoint>
  <Factions>
    <Factions>
      <MyObjectBuilder_Faction>
        <FactionId>1</FactionId>
        <Tag>RED</Tag>
        <Name>Reds</Name>
        <Members>
          <MyObjectBuilder_FactionMember><PlayerId>10</PlayerId></MyObjectBuilder_FactionMember>
        </Members>
      </MyObjectBuilder_Faction>
      <MyObjectBuilder_Faction>
        <FactionId>2</FactionId>
        <Tag>BLU</Tag>
        <Name>Reds</Name>
        <Members />
      </MyObjectBuilder_Faction>
      <MyObjectBuilder_Faction>
        <FactionId>3</FactionId>
        <Tag>SPRT</Tag>
        <Name>Space Pirates</Name>
        <Members />
      </MyObjectBuilder_Faction>
    </Factions>
  </Factions>
</MyObjectBuilder_Checkpoint>"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("Sandbox.sbc"), SAVE).expect("write save");
        let config = format!(
            "guild_id: 100\ncategory_id: 200\nsnapshot_path: {}\ndatabase_path: {}\n",
            dir.path().join("Sandbox.sbc").display(),
            dir.path().join("factionsync.db").display(),
        );
        fs::write(dir.path().join("factionsync.yaml"), config).expect("write config");
        Self { dir }
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("factionsync.yaml")
    }

    fn database(&self) -> PathBuf {
        self.dir.path().join("factionsync.db")
    }
}

fn factionsync_cmd(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("factionsync"));
    cmd.env_remove("DISCORD_BOT_TOKEN")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn status_on_fresh_store_lists_nothing() {
    let fx = Fixture::new();
    factionsync_cmd(&fx.config())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("No roles or channels recorded."));
}

#[test]
fn status_json_reports_recorded_objects() {
    let fx = Fixture::new();
    {
        let mut store = SqliteStore::open(&fx.database()).expect("open store");
        let faction = FactionEntity::new(
            FactionId(1),
            "RED".to_string(),
            "Reds".to_string(),
            [MemberId(10)],
        );
        store.upsert_faction(&faction).expect("faction");
        store
            .put_role_record(FactionId(1), RoleId(501))
            .expect("role");
        store
            .put_channel_record(FactionId(1), ChannelId(601), "reds")
            .expect("channel");
    }

    let output = factionsync_cmd(&fx.config())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("status json");
    assert_eq!(json["roles"], 1);
    assert_eq!(json["channels"], 1);
    let faction = &json["factions"][0];
    assert_eq!(faction["faction_id"], 1);
    assert_eq!(faction["tag"], "RED");
    assert_eq!(faction["role_id"], 501);
    assert_eq!(faction["channel_name"], "reds");
}

#[test]
fn offline_plan_needs_no_token_and_disambiguates_names() {
    let fx = Fixture::new();
    let output = factionsync_cmd(&fx.config())
        .args(["plan", "--offline", "--json"])
        .output()
        .expect("run plan");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let planned: serde_json::Value = serde_json::from_slice(&output.stdout).expect("plan json");
    let planned = planned.as_array().expect("array");
    assert_eq!(planned.len(), 2, "SPRT is not a primary faction");

    let names: Vec<&str> = planned
        .iter()
        .map(|p| p["resolved_channel_name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["reds", "reds-2"]);
    assert_eq!(planned[0]["role"]["action"], "create");
    assert_eq!(planned[0]["role"]["name"], "RED");
}

#[test]
fn offline_plan_table_output() {
    let fx = Fixture::new();
    factionsync_cmd(&fx.config())
        .args(["plan", "--offline"])
        .assert()
        .success()
        .stdout(contains("create #reds-2"))
        .stdout(contains("2 role(s) would be created."));
}

#[test]
fn sync_without_token_fails() {
    let fx = Fixture::new();
    factionsync_cmd(&fx.config())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("DISCORD_BOT_TOKEN"));
}

#[test]
fn teardown_without_token_fails() {
    let fx = Fixture::new();
    factionsync_cmd(&fx.config())
        .arg("teardown")
        .assert()
        .failure()
        .stderr(contains("bot token is required"));
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().expect("tempdir");
    factionsync_cmd(&dir.path().join("absent.yaml"))
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn invalid_interval_is_rejected() {
    let fx = Fixture::new();
    let mut contents = fs::read_to_string(fx.config()).expect("read config");
    contents.push_str("sync_interval_secs: 0\n");
    fs::write(fx.config(), contents).expect("write config");

    factionsync_cmd(&fx.config())
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("sync_interval_secs"));
}
