#![cfg(unix)]

use std::fs;
use std::sync::Arc;

use kubegen_core::source::DirectorySource;
use kubegen_core::{Environment, GeneratorConfig, KindSelection, PosixPlatform, TemplateSource};
use kubegen_sync::{CycleError, Generator, WriteError, WriteResult};
use tempfile::TempDir;

const SERVICES: &str = r#"{"items": [
  {"metadata": {"name": "web", "namespace": "default"}, "spec": {"clusterIP": "10.96.0.10"}},
  {"metadata": {"name": "dns", "namespace": "kube-system"}, "spec": {"clusterIP": "10.96.0.2"}}
]}"#;

const TEMPLATE: &str = "{% for s in services %}{{ s.spec.clusterIP }} {{ s.metadata.name }}.{{ s.metadata.namespace }}\n{% endfor %}";

struct Fixture {
    root: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        fs::create_dir_all(root.path().join("state")).expect("state dir");
        fs::write(root.path().join("state/services.json"), SERVICES).expect("services");
        fs::write(root.path().join("hosts.tmpl"), TEMPLATE).expect("template");
        Self { root }
    }

    fn config(&self) -> GeneratorConfig {
        let mut config =
            GeneratorConfig::new(TemplateSource::File(self.root.path().join("hosts.tmpl")));
        config.output = Some(self.root.path().join("out/hosts"));
        config.kinds = KindSelection::parse(&["services"]).expect("kinds");
        config
    }

    fn generator(&self, config: GeneratorConfig) -> Generator {
        Generator::new(
            config,
            Arc::new(DirectorySource::new(self.root.path().join("state"))),
            Arc::new(Environment::default()),
            Arc::new(PosixPlatform),
        )
    }

    fn output(&self) -> String {
        fs::read_to_string(self.root.path().join("out/hosts")).expect("output")
    }
}

#[test]
fn renders_directory_state_into_target() {
    let fx = Fixture::new();
    let report = fx.generator(fx.config()).run_cycle().expect("cycle");

    assert_eq!(report.total(), 2);
    assert_eq!(
        fx.output(),
        "10.96.0.10 web.default\n10.96.0.2 dns.kube-system\n"
    );
}

#[test]
fn template_and_state_edits_apply_next_cycle() {
    let fx = Fixture::new();
    let gen = fx.generator(fx.config());
    gen.run_cycle().expect("first");

    fs::write(fx.root.path().join("hosts.tmpl"), "{{ services | length }}").expect("edit template");
    let report = gen.run_cycle().expect("second");
    assert!(matches!(report.write, WriteResult::Written { .. }));
    assert_eq!(fx.output(), "2");

    fs::write(fx.root.path().join("state/services.json"), "[]").expect("edit state");
    gen.run_cycle().expect("third");
    assert_eq!(fx.output(), "0");
}

#[test]
fn one_shot_without_overwrite_refuses_changed_target() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.root.path().join("out")).expect("out dir");
    fs::write(fx.root.path().join("out/hosts"), "hand edited\n").expect("seed");

    let mut config = fx.config();
    config.overwrite = false;
    let err = fx.generator(config).run_cycle().expect_err("refused");
    assert!(
        matches!(err, CycleError::Write(WriteError::RefusedOverwrite { .. })),
        "got: {err}"
    );
    assert_eq!(fx.output(), "hand edited\n");
}

#[test]
fn watch_mode_always_overwrites() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.root.path().join("out")).expect("out dir");
    fs::write(fx.root.path().join("out/hosts"), "hand edited\n").expect("seed");

    let mut config = fx.config();
    config.overwrite = false;
    config.watch = true;
    fx.generator(config).run_cycle().expect("cycle");
    assert!(fx.output().contains("web.default"));
}

#[test]
fn render_error_leaves_target_untouched() {
    let fx = Fixture::new();
    let gen = fx.generator(fx.config());
    gen.run_cycle().expect("first");
    let before = fx.output();

    fs::write(fx.root.path().join("hosts.tmpl"), "{{ services | where_any(path=1) }}").expect("edit");
    let err = gen.run_cycle().expect_err("bad template");
    assert!(matches!(err, CycleError::Render(_)), "got: {err}");
    assert_eq!(fx.output(), before);
}
