//! `kube-gen <template> [<output>]`: build the generator and run it.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};

use kubegen_core::source::{ApiServerSource, DirectorySource};
use kubegen_core::{
    platform, Environment, GeneratorConfig, KindSelection, ResourceSource, TemplateSource,
    WaitBounds,
};
use kubegen_daemon::{init_tracing, start_blocking};
use kubegen_sync::Generator;

/// Arguments for the single `kube-gen` command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Template file to render, or `-` to read it from stdin.
    pub template: String,

    /// Where to write the rendered content; stdout when omitted.
    pub output: Option<PathBuf>,

    /// Base URL of the Kubernetes API (e.g. a local `kubectl proxy`).
    #[arg(long, default_value = "http://localhost:8001")]
    pub host: String,

    /// Read resources from `<dir>/<kind>.json|yaml` instead of the API.
    #[arg(long, value_name = "DIR", conflicts_with = "host")]
    pub source_dir: Option<PathBuf>,

    /// Resource types to pull [pods, services, endpoints]; repeatable.
    /// All types when omitted.
    #[arg(long = "type", value_name = "KIND")]
    pub types: Vec<String>,

    /// Keep running and regenerate on every change.
    #[arg(long)]
    pub watch: bool,

    /// Command to run before the output is written.
    #[arg(long, value_name = "CMD")]
    pub pre_cmd: Option<String>,

    /// Command to run after the output is written.
    #[arg(long, value_name = "CMD")]
    pub post_cmd: Option<String>,

    /// Log the output of the pre/post commands.
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    pub log_cmd: bool,

    /// Overwrite the output file if it exists.
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    pub overwrite: bool,

    /// `<minimum>[:<maximum>]` time to wait after an event, e.g. `500ms:5s`.
    #[arg(long, value_name = "MIN[:MAX]", default_value = "")]
    pub wait: String,

    /// Also regenerate every N seconds in watch mode (0 disables).
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub interval: u64,

    /// Directory for staging temp files; defaults to the output's directory.
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Log nothing.
    #[arg(long)]
    pub quiet: bool,
}

impl GenerateArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(self.quiet);

        let source = self.source();
        let config = self.into_config(read_stdin)?;
        tracing::info!(source = %source.describe(), template = %config.template.name(), "starting");

        let generator = Generator::new(
            config,
            source,
            Arc::new(Environment::capture()),
            platform::detect(),
        );
        start_blocking(generator).context("kube-gen failed")?;
        Ok(())
    }

    fn source(&self) -> Arc<dyn ResourceSource> {
        match &self.source_dir {
            Some(dir) => Arc::new(DirectorySource::new(dir.clone())),
            None => Arc::new(ApiServerSource::new(&self.host)),
        }
    }

    /// Validate flags into a [`GeneratorConfig`]. `stdin` supplies the
    /// template text when the template argument is `-`.
    pub fn into_config(self, stdin: impl FnOnce() -> Result<String>) -> Result<GeneratorConfig> {
        let wait = WaitBounds::parse(&self.wait).context("invalid wait value")?;
        let kinds = KindSelection::parse(&self.types).context("invalid --type")?;

        let template = if self.template == "-" {
            tracing::info!("reading template from stdin");
            let text = stdin().context("error reading from stdin")?;
            TemplateSource::Inline(text.trim().to_string())
        } else {
            TemplateSource::File(PathBuf::from(&self.template))
        };

        let mut config = GeneratorConfig::new(template);
        config.output = self.output;
        config.scratch_dir = self.scratch_dir;
        config.overwrite = self.overwrite;
        config.watch = self.watch;
        config.pre_cmd = self.pre_cmd;
        config.post_cmd = self.post_cmd;
        config.log_cmd_output = self.log_cmd;
        config.interval = (self.interval > 0).then(|| Duration::from_secs(self.interval));
        config.wait = wait;
        config.kinds = kinds;
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}
