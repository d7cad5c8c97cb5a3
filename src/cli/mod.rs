//! Thin CLI boundary. Directory walking with ignore patterns and rich
//! progress rendering are out of scope (§1) — this accepts an explicit
//! file list and wires it into the orchestrator with a minimal terminal
//! progress sink.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use url::Url;

use crate::config::Config;
use crate::descriptor::FileDescriptor;
use crate::error::Result;
use crate::http::Client;
use crate::orchestrator;
use crate::progress::{ProgressSink, TerminalProgress};

/// Upload files to a Dataverse-compatible repository.
#[derive(Parser, Debug)]
#[command(name = "dvuploader", version, about)]
pub struct Args {
    /// Dataverse persistent identifier of the target dataset.
    #[arg(long)]
    pub persistent_id: String,

    /// Base URL of the Dataverse instance, e.g. https://demo.dataverse.org
    #[arg(long)]
    pub base_url: Url,

    /// API key, normally read from DATAVERSE_API_KEY instead of the CLI.
    #[arg(long, env = "DATAVERSE_API_KEY")]
    pub api_key: String,

    /// Files to upload. Directory walking is the caller's job; pass
    /// explicit paths here.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Replace dataset files that already exist at the same path.
    #[arg(long)]
    pub replace_existing: bool,

    /// Force the native upload path even if direct upload is available.
    #[arg(long)]
    pub force_native: bool,
}

pub async fn run(args: Args) -> Result<orchestrator::Outcome> {
    let mut config = Config::from_env(args.api_key, args.base_url.clone(), args.persistent_id)?;
    config.replace_existing = args.replace_existing;
    config.force_native = args.force_native;

    let client = Client::new(config.base_url.clone(), config.api_key.clone())?;
    let descriptors = args.files.into_iter().map(FileDescriptor::from_path).collect();
    let progress: Arc<dyn ProgressSink> = Arc::new(TerminalProgress::default());

    orchestrator::run(&client, &config, descriptors, progress).await
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_required_arguments() {
        let args = Args::parse_from([
            "dvuploader",
            "--persistent-id",
            "doi:10/ABC",
            "--base-url",
            "https://dataverse.example",
            "--api-key",
            "secret",
            "a.txt",
            "b.txt",
        ]);
        assert_eq!(args.persistent_id, "doi:10/ABC");
        assert_eq!(args.files.len(), 2);
        assert!(!args.replace_existing);
    }
}
