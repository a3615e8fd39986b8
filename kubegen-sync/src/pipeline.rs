//! Shared cycle pipeline used by the one-shot CLI path and the daemon.
//!
//! One cycle: snapshot → render → pre command → write → post command.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kubegen_core::{
    load_snapshot, Environment, GeneratorConfig, PlatformOps, ResourceKind, ResourceSource,
};
use kubegen_renderer::Renderer;

use crate::error::CycleError;
use crate::hooks::{HookRunner, HookStage};
use crate::writer::{OutputWriter, WriteResult};

/// Summary of one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub counts: Vec<(ResourceKind, usize)>,
    pub write: WriteResult,
    pub duration: Duration,
}

impl CycleReport {
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

/// Owns everything a cycle needs. Cheap to clone; clones share the source.
#[derive(Clone)]
pub struct Generator {
    config: Arc<GeneratorConfig>,
    source: Arc<dyn ResourceSource>,
    renderer: Renderer,
    writer: OutputWriter,
    hooks: HookRunner,
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("config", &self.config)
            .field("source", &self.source.describe())
            .field("renderer", &self.renderer)
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl Generator {
    pub fn new(
        config: GeneratorConfig,
        source: Arc<dyn ResourceSource>,
        env: Arc<Environment>,
        platform: Arc<dyn PlatformOps>,
    ) -> Self {
        let renderer = Renderer::new(config.template.clone(), env, Arc::clone(&platform));
        let writer = OutputWriter::from_config(&config, Arc::clone(&platform));
        let hooks = HookRunner::new(platform, config.log_cmd_output);
        Self {
            config: Arc::new(config),
            source,
            renderer,
            writer,
            hooks,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn ResourceSource> {
        &self.source
    }

    /// Run one full cycle. The first error stops the cycle; a failed pre
    /// command means nothing is written.
    pub fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();

        let snapshot = load_snapshot(self.source.as_ref(), &self.config.kinds)?;
        let content = self.renderer.render(&snapshot)?;

        self.hooks.run(HookStage::Pre, self.config.pre_cmd.as_deref())?;
        let write = self.writer.publish(&content)?;
        self.hooks.run(HookStage::Post, self.config.post_cmd.as_deref())?;

        Ok(CycleReport {
            counts: snapshot.counts(),
            write,
            duration: started.elapsed(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use kubegen_core::source::MemorySource;
    use kubegen_core::{PosixPlatform, TemplateSource};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn generator(config: GeneratorConfig, source: Arc<MemorySource>) -> Generator {
        Generator::new(
            config,
            source,
            Arc::new(Environment::default()),
            Arc::new(PosixPlatform),
        )
    }

    fn config(dir: &TempDir, template: &str) -> GeneratorConfig {
        let mut config = GeneratorConfig::new(TemplateSource::Inline(template.to_string()));
        config.output = Some(dir.path().join("out.txt"));
        config
    }

    #[test]
    fn cycle_writes_rendered_snapshot() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(MemorySource::new());
        source.set(ResourceKind::Pods, vec![json!({"metadata": {"name": "a"}})]);

        let gen = generator(config(&dir, "{{ pods | length }}"), source);
        let report = gen.run_cycle().expect("cycle");
        assert_eq!(report.total(), 1);
        assert!(matches!(report.write, WriteResult::Written { .. }));
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).expect("read"), "1");
    }

    #[test]
    fn hooks_run_even_when_output_is_unchanged() {
        let dir = TempDir::new().expect("tempdir");
        let marker = dir.path().join("post.log");
        let mut cfg = config(&dir, "static");
        cfg.post_cmd = Some(format!("echo run >> {}", marker.display()));

        let gen = generator(cfg, Arc::new(MemorySource::new()));
        gen.run_cycle().expect("first");
        let second = gen.run_cycle().expect("second");
        assert!(matches!(second.write, WriteResult::Unchanged { .. }));
        assert_eq!(fs::read_to_string(&marker).expect("marker"), "run\nrun\n");
    }

    #[test]
    fn failing_pre_command_skips_the_write() {
        let dir = TempDir::new().expect("tempdir");
        let mut cfg = config(&dir, "content");
        cfg.pre_cmd = Some("exit 1".to_string());

        let err = generator(cfg, Arc::new(MemorySource::new()))
            .run_cycle()
            .expect_err("pre fails");
        assert!(matches!(err, CycleError::Hook(_)), "got: {err}");
        assert!(!dir.path().join("out.txt").exists());
    }

    #[test]
    fn failing_post_command_fails_after_write() {
        let dir = TempDir::new().expect("tempdir");
        let mut cfg = config(&dir, "content");
        cfg.post_cmd = Some("exit 2".to_string());

        let err = generator(cfg, Arc::new(MemorySource::new()))
            .run_cycle()
            .expect_err("post fails");
        assert!(matches!(err, CycleError::Hook(_)), "got: {err}");
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).expect("read"), "content");
    }

    #[test]
    fn snapshot_failure_stops_before_render() {
        let dir = TempDir::new().expect("tempdir");
        let source = Arc::new(MemorySource::new());
        source.set_failing(ResourceKind::Services, true);

        let err = generator(config(&dir, "x"), source)
            .run_cycle()
            .expect_err("snapshot fails");
        assert!(matches!(err, CycleError::Snapshot(_)), "got: {err}");
        assert!(err.to_string().starts_with("failed to list services"), "got: {err}");
        assert!(!dir.path().join("out.txt").exists());
    }
}
