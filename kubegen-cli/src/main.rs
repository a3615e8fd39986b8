//! kube-gen: render templates from Kubernetes resources.
//!
//! # Usage
//!
//! ```text
//! kube-gen [options] <template> [<output>]
//! kube-gen --watch --wait 500ms:5s --post-cmd 'nginx -s reload' nginx.tmpl /etc/nginx/upstreams.conf
//! echo '{{ services | length }}' | kube-gen --type services -
//! ```

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::generate::GenerateArgs;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "kube-gen",
    version,
    about = "Render templates using Kubernetes metadata and events",
    long_about = None,
    after_help = "Arguments:\n  template: path of the template file to render, or - to read from STDIN\n  output:   path to write the rendered content; printed to STDOUT when omitted.\n            An existing file is overwritten unless --overwrite=false is given.",
)]
struct Cli {
    #[command(flatten)]
    generate: GenerateArgs,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.generate.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
