use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use factionsync_core::Config;
use factionsync_sync::{CycleReport, Engine, MappingStore, RemoteGateway, TeardownReport};

use crate::error::{io_err, DaemonError};

/// What the runtime should do once started.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub snapshot_path: PathBuf,
    pub interval: Duration,
    /// Run Safe-Teardown once and exit instead of looping.
    pub teardown: bool,
}

impl RunOptions {
    /// Options from the loaded config. `force_teardown` comes from the
    /// command line and wins over `delete_all = false`.
    pub fn from_config(config: &Config, force_teardown: bool) -> Self {
        Self {
            snapshot_path: config.snapshot_path.clone(),
            interval: config.sync_interval(),
            teardown: force_teardown || config.delete_all,
        }
    }
}

/// What the runtime did before it returned.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
    pub last_report: Option<CycleReport>,
    pub teardown: Option<TeardownReport>,
}

/// Start the runtime and block the current thread until it exits.
pub fn start_blocking<S, G>(
    engine: Engine<S, G>,
    options: RunOptions,
) -> Result<RunSummary, DaemonError>
where
    S: MappingStore + 'static,
    G: RemoteGateway + 'static,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(engine, options))
}

/// Run until ctrl-c (or, in teardown mode, until teardown finishes).
pub async fn run<S, G>(engine: Engine<S, G>, options: RunOptions) -> Result<RunSummary, DaemonError>
where
    S: MappingStore + 'static,
    G: RemoteGateway + 'static,
{
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("received ctrl-c, finishing current cycle");
                    let _ = shutdown.send(());
                    Ok(())
                }
                Err(err) => Err(DaemonError::Runtime(format!("ctrl-c handler failed: {err}"))),
            }
        })
    };

    let result = run_until(engine, options, &shutdown_tx).await;

    if signal_handle.is_finished() {
        handle_join("signal_handler", signal_handle.await)?;
    } else {
        signal_handle.abort();
    }
    result
}

/// Run until `shutdown` broadcasts. A cycle already in flight when the
/// signal arrives is awaited to completion first.
pub async fn run_until<S, G>(
    engine: Engine<S, G>,
    options: RunOptions,
    shutdown: &broadcast::Sender<()>,
) -> Result<RunSummary, DaemonError>
where
    S: MappingStore + 'static,
    G: RemoteGateway + 'static,
{
    if options.teardown {
        return run_teardown(engine).await;
    }

    let mut shutdown_rx = shutdown.subscribe();
    let mut interval = tokio::time::interval(options.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        snapshot = %options.snapshot_path.display(),
        interval_secs = options.interval.as_secs(),
        "sync loop started",
    );

    let mut engine = engine;
    let mut summary = RunSummary::default();
    loop {
        let tick = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => false,
            _ = interval.tick() => true,
        };
        if !tick {
            break;
        }

        let path = options.snapshot_path.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = engine.run_cycle_from_path(&path);
            (engine, result)
        })
        .await
        .map_err(|err| DaemonError::Runtime(format!("sync cycle join error: {err}")))?;

        let (returned, result) = joined;
        engine = returned;
        summary.cycles += 1;
        match result {
            Ok(report) => summary.last_report = Some(report),
            Err(err) => {
                summary.failed_cycles += 1;
                tracing::error!(error = %err, "sync cycle aborted");
            }
        }
    }

    tracing::info!(cycles = summary.cycles, "sync loop stopped");
    Ok(summary)
}

async fn run_teardown<S, G>(mut engine: Engine<S, G>) -> Result<RunSummary, DaemonError>
where
    S: MappingStore + 'static,
    G: RemoteGateway + 'static,
{
    tracing::warn!("teardown requested, deleting every recorded role and channel");
    let report = tokio::task::spawn_blocking(move || engine.teardown())
        .await
        .map_err(|err| DaemonError::Runtime(format!("teardown join error: {err}")))??;
    tracing::info!(
        deleted = report.deleted(),
        failed = report.failed(),
        "teardown finished",
    );
    Ok(RunSummary {
        teardown: Some(report),
        ..RunSummary::default()
    })
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global subscriber on stderr. `RUST_LOG` wins; otherwise
/// `debug` selects the default level.
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use factionsync_core::{FactionEntity, FactionId, MemberEntity, MemberId};
    use factionsync_sync::store::FactionRow;
    use factionsync_sync::{
        CategoryId, ChannelId, ChannelRecord, EngineSettings, InMemoryGateway, RoleId,
        RoleRecord, SqliteStore, StoreError, TeardownOutcome,
    };
    use tempfile::TempDir;

    use super::*;

    /// Store whose first `failures` batches cannot be opened.
    struct UnavailableStore {
        inner: SqliteStore,
        failures: AtomicUsize,
    }

    impl MappingStore for UnavailableStore {
        fn begin(&mut self) -> Result<(), StoreError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Corrupt {
                    column: "database",
                    value: "locked".to_string(),
                });
            }
            self.inner.begin()
        }

        fn commit(&mut self) -> Result<(), StoreError> {
            self.inner.commit()
        }

        fn rollback(&mut self) -> Result<(), StoreError> {
            self.inner.rollback()
        }

        fn upsert_faction(&mut self, faction: &FactionEntity) -> Result<(), StoreError> {
            self.inner.upsert_faction(faction)
        }

        fn get_faction(&self, id: FactionId) -> Result<Option<FactionRow>, StoreError> {
            self.inner.get_faction(id)
        }

        fn upsert_member(&mut self, id: MemberId) -> Result<(), StoreError> {
            self.inner.upsert_member(id)
        }

        fn get_member(&self, id: MemberId) -> Result<Option<MemberEntity>, StoreError> {
            self.inner.get_member(id)
        }

        fn list_member_ids(&self) -> Result<Vec<MemberId>, StoreError> {
            self.inner.list_member_ids()
        }

        fn set_membership(
            &mut self,
            member: MemberId,
            faction: Option<FactionId>,
        ) -> Result<(), StoreError> {
            self.inner.set_membership(member, faction)
        }

        fn get_membership(
            &self,
            member: MemberId,
        ) -> Result<Option<Option<FactionId>>, StoreError> {
            self.inner.get_membership(member)
        }

        fn get_role_record(&self, faction: FactionId) -> Result<Option<RoleRecord>, StoreError> {
            self.inner.get_role_record(faction)
        }

        fn put_role_record(&mut self, faction: FactionId, role: RoleId) -> Result<(), StoreError> {
            self.inner.put_role_record(faction, role)
        }

        fn list_role_records(&self) -> Result<Vec<RoleRecord>, StoreError> {
            self.inner.list_role_records()
        }

        fn clear_role_records(&mut self) -> Result<(), StoreError> {
            self.inner.clear_role_records()
        }

        fn get_channel_record(
            &self,
            faction: FactionId,
        ) -> Result<Option<ChannelRecord>, StoreError> {
            self.inner.get_channel_record(faction)
        }

        fn put_channel_record(
            &mut self,
            faction: FactionId,
            channel: ChannelId,
            resolved_name: &str,
        ) -> Result<(), StoreError> {
            self.inner.put_channel_record(faction, channel, resolved_name)
        }

        fn list_channel_records(&self) -> Result<Vec<ChannelRecord>, StoreError> {
            self.inner.list_channel_records()
        }

        fn clear_channel_records(&mut self) -> Result<(), StoreError> {
            self.inner.clear_channel_records()
        }
    }

    fn engine_failing_first(failures: usize) -> Engine<UnavailableStore, InMemoryGateway> {
        Engine::new(
            UnavailableStore {
                inner: SqliteStore::open_in_memory().expect("store"),
                failures: AtomicUsize::new(failures),
            },
            InMemoryGateway::new(),
            EngineSettings {
                category: CategoryId(77),
            },
        )
    }

    const SAVE: &str = r#"<MyObjectBuilder_Sector>
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
    </Factions>
  </Factions>
</MyObjectBuilder_Sector>"#;

    fn engine() -> Engine<SqliteStore, InMemoryGateway> {
        Engine::new(
            SqliteStore::open_in_memory().expect("store"),
            InMemoryGateway::new(),
            EngineSettings {
                category: CategoryId(77),
            },
        )
    }

    fn options(dir: &TempDir, teardown: bool) -> RunOptions {
        let path = dir.path().join("Sandbox.sbc");
        fs::write(&path, SAVE).expect("write save");
        RunOptions {
            snapshot_path: path,
            interval: Duration::from_secs(300),
            teardown,
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn first_cycle_runs_immediately_then_on_each_tick() {
        let dir = TempDir::new().expect("tempdir");
        let opts = options(&dir, false);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let tx = shutdown_tx.clone();

        let handle = tokio::spawn(async move { run_until(engine(), opts, &tx).await });

        tokio::time::sleep(Duration::from_secs(650)).await;
        shutdown_tx.send(()).expect("loop is listening");

        let summary = handle.await.expect("join").expect("run");
        assert_eq!(summary.cycles, 3, "ticks at 0s, 300s and 600s");
        assert_eq!(summary.failed_cycles, 0);
        let last = summary.last_report.expect("report");
        assert_eq!(last.primary_factions, 1);
        assert_eq!(last.roles_created(), 0, "later cycles reuse the first role");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn aborted_cycle_is_counted_and_the_loop_keeps_ticking() {
        let dir = TempDir::new().expect("tempdir");
        let opts = options(&dir, false);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let tx = shutdown_tx.clone();

        let handle =
            tokio::spawn(async move { run_until(engine_failing_first(1), opts, &tx).await });

        tokio::time::sleep(Duration::from_secs(650)).await;
        shutdown_tx.send(()).expect("loop is listening");

        let summary = handle.await.expect("join").expect("run survives a store error");
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.failed_cycles, 1, "only the first cycle hit the store error");
        let last = summary.last_report.expect("later cycles report");
        assert_eq!(last.primary_factions, 1);
        assert_eq!(last.roles_created(), 0, "the 300s cycle already created the role");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn store_down_for_every_cycle_still_schedules() {
        let dir = TempDir::new().expect("tempdir");
        let opts = options(&dir, false);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let tx = shutdown_tx.clone();

        let engine = engine_failing_first(usize::MAX);
        let handle = tokio::spawn(async move { run_until(engine, opts, &tx).await });

        tokio::time::sleep(Duration::from_secs(650)).await;
        shutdown_tx.send(()).expect("loop is listening");

        let summary = handle.await.expect("join").expect("run");
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.failed_cycles, 3);
        assert!(summary.last_report.is_none());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn shutdown_lets_a_started_cycle_finish() {
        let dir = TempDir::new().expect("tempdir");
        let opts = options(&dir, false);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let tx = shutdown_tx.clone();

        let handle = tokio::spawn(async move { run_until(engine(), opts, &tx).await });
        tokio::task::yield_now().await;
        shutdown_tx.send(()).expect("send");

        let summary = handle.await.expect("join").expect("run");
        assert!(summary.cycles <= 1, "no tick after shutdown");
        assert_eq!(
            summary.last_report.is_some(),
            summary.cycles == 1,
            "a started cycle always produces its report"
        );
    }

    #[test]
    fn teardown_mode_never_starts_the_loop() {
        let dir = TempDir::new().expect("tempdir");
        let opts = options(&dir, true);

        let mut engine = engine();
        let seeded = engine
            .run_cycle_from_path(&opts.snapshot_path)
            .expect("seed cycle");
        assert_eq!(seeded.roles_created(), 1);

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let summary =
            tokio_test::block_on(run_until(engine, opts, &shutdown_tx)).expect("teardown");

        assert_eq!(summary.cycles, 0);
        let report = summary.teardown.expect("teardown report");
        assert_eq!(report.count(&TeardownOutcome::Deleted), 2);
        assert_eq!(report.failed(), 0);
    }

    #[test]
    fn delete_all_in_config_selects_teardown() {
        let config = Config {
            guild_id: 1,
            category_id: 2,
            snapshot_path: PathBuf::from("Sandbox.sbc"),
            database_path: PathBuf::from("factionsync.db"),
            sync_interval_secs: 60,
            delete_all: true,
            delete_unused: false,
            debug: false,
        };
        assert!(RunOptions::from_config(&config, false).teardown);

        let config = Config {
            delete_all: false,
            ..config
        };
        assert!(!RunOptions::from_config(&config, false).teardown);
        assert!(RunOptions::from_config(&config, true).teardown);
        assert_eq!(
            RunOptions::from_config(&config, false).interval,
            Duration::from_secs(60)
        );
    }
}
