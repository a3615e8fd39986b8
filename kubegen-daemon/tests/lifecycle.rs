#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kubegen_core::source::MemorySource;
use kubegen_core::{
    ChangeKind, ConfigError, Environment, GeneratorConfig, KindSelection, PosixPlatform,
    ResourceKind, TemplateSource, WaitBounds,
};
use kubegen_daemon::{DaemonError, Lifecycle, WatchSettings};
use kubegen_sync::Generator;
use serde_json::json;
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn config(out: &Path, watch: bool) -> GeneratorConfig {
    let mut config = GeneratorConfig::new(TemplateSource::Inline(
        "{% for p in pods %}{{ p.metadata.name }} {% endfor %}".into(),
    ));
    config.output = Some(out.to_path_buf());
    config.watch = watch;
    config.kinds = KindSelection::from(vec![ResourceKind::Pods]);
    config
}

fn lifecycle(config: GeneratorConfig, source: &Arc<MemorySource>) -> Lifecycle {
    let generator = Generator::new(
        config,
        source.clone(),
        Arc::new(Environment::default()),
        Arc::new(PosixPlatform),
    );
    Lifecycle::new(generator).with_watch_settings(WatchSettings {
        poll: Duration::from_millis(20),
        reconnect_delay: Duration::from_millis(20),
    })
}

fn pods(names: &[&str]) -> Vec<serde_json::Value> {
    names
        .iter()
        .map(|n| json!({"metadata": {"name": n}}))
        .collect()
}

async fn wait_for_content(path: &PathBuf, expected: &str) {
    timeout(WAIT, async {
        loop {
            if fs::read_to_string(path).ok().as_deref() == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{} never became {expected:?}", path.display()));
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_runs_exactly_one_cycle() {
    let dir = TempDir::new().expect("tempdir");
    let out = dir.path().join("pods.txt");
    let source = Arc::new(MemorySource::new());
    source.set(ResourceKind::Pods, pods(&["a", "b"]));

    lifecycle(config(&out, false), &source).run().await.expect("run");
    assert_eq!(fs::read_to_string(&out).expect("out"), "a b ");
    assert_eq!(source.list_calls(), 1);
    assert_eq!(source.watchers(ResourceKind::Pods), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn one_shot_failure_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let source = Arc::new(MemorySource::new());
    source.set_failing(ResourceKind::Pods, true);

    let err = lifecycle(config(&dir.path().join("out"), false), &source)
        .run()
        .await
        .expect_err("snapshot fails");
    assert!(matches!(err, DaemonError::Cycle(_)), "got: {err}");
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_wait_bounds_fail_before_any_watcher() {
    let dir = TempDir::new().expect("tempdir");
    let source = Arc::new(MemorySource::new());
    let mut cfg = config(&dir.path().join("out"), true);
    cfg.wait = WaitBounds {
        min: Duration::from_secs(5),
        max: Duration::from_secs(1),
    };

    let err = lifecycle(cfg, &source).run().await.expect_err("invalid");
    assert!(
        matches!(err, DaemonError::Config(ConfigError::MaxBelowMin { .. })),
        "got: {err}"
    );
    assert_eq!(source.list_calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_mode_regenerates_on_change_and_reload() {
    let dir = TempDir::new().expect("tempdir");
    let out = dir.path().join("pods.txt");
    let source = Arc::new(MemorySource::new());
    source.set(ResourceKind::Pods, pods(&["a"]));

    let mut cfg = config(&out, true);
    cfg.wait = WaitBounds::new(Duration::from_millis(50), Duration::from_millis(200))
        .expect("bounds");
    let lifecycle = lifecycle(cfg, &source);
    let handle = lifecycle.handle();
    let task = tokio::spawn(lifecycle.run());

    // Initial cycle.
    wait_for_content(&out, "a ").await;

    // Watch event.
    timeout(WAIT, async {
        while source.watchers(ResourceKind::Pods) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("watcher subscribed");
    source.set(ResourceKind::Pods, pods(&["a", "b"]));
    source.push(ResourceKind::Pods, ChangeKind::Added);
    wait_for_content(&out, "a b ").await;

    // Reload without any watch event.
    source.set(ResourceKind::Pods, pods(&["c"]));
    assert!(handle.reload());
    wait_for_content(&out, "c ").await;

    handle.shutdown();
    timeout(WAIT, task)
        .await
        .expect("shutdown acknowledged")
        .expect("join")
        .expect("run");
    assert_eq!(source.watchers(ResourceKind::Pods), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn interval_ticks_regenerate() {
    let dir = TempDir::new().expect("tempdir");
    let out = dir.path().join("pods.txt");
    let source = Arc::new(MemorySource::new());
    source.set(ResourceKind::Pods, pods(&["a"]));

    let mut cfg = config(&out, true);
    cfg.interval = Some(Duration::from_millis(100));
    let lifecycle = lifecycle(cfg, &source);
    let handle = lifecycle.handle();
    let task = tokio::spawn(lifecycle.run());

    wait_for_content(&out, "a ").await;
    source.set(ResourceKind::Pods, pods(&["z"]));
    wait_for_content(&out, "z ").await;

    handle.shutdown();
    timeout(WAIT, task)
        .await
        .expect("shutdown acknowledged")
        .expect("join")
        .expect("run");
}

#[tokio::test(flavor = "multi_thread")]
async fn cycle_errors_in_watch_mode_are_not_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let out = dir.path().join("pods.txt");
    let source = Arc::new(MemorySource::new());
    source.set_failing(ResourceKind::Pods, true);

    let lifecycle = lifecycle(config(&out, true), &source);
    let handle = lifecycle.handle();
    let task = tokio::spawn(lifecycle.run());

    timeout(WAIT, async {
        while source.list_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("initial cycle attempted");

    source.set_failing(ResourceKind::Pods, false);
    source.set(ResourceKind::Pods, pods(&["ok"]));
    assert!(handle.reload());
    wait_for_content(&out, "ok ").await;

    handle.shutdown();
    timeout(WAIT, task)
        .await
        .expect("shutdown acknowledged")
        .expect("join")
        .expect("run");
}
