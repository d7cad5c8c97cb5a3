use dvuploader::cli::{self, Args};
use dvuploader::orchestrator::DescriptorOutcome;

use clap::Parser;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config as LogConfig;

const LOG_FORMAT: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} {M} - {m}{n}";

fn init_logging() {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_FORMAT)))
        .build();

    let config = LogConfig::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(Root::builder().appender("console").build(log::LevelFilter::Info))
        .expect("log4rs configuration is well-formed");

    log4rs::init_config(config).expect("logging already initialized");
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();
    init_logging();

    let args = Args::parse();
    match cli::run(args).await {
        Ok(outcome) => {
            let mut had_failure = false;
            for result in &outcome.results {
                match result {
                    DescriptorOutcome::Uploaded { path } => {
                        log::info!("uploaded {}", path.display());
                    }
                    DescriptorOutcome::MetadataUpdated { path } => {
                        log::info!("updated metadata for {}", path.display());
                    }
                    DescriptorOutcome::Skipped { path, reason } => {
                        log::info!("skipped {}: {reason}", path.display());
                    }
                    DescriptorOutcome::Failed { path, error } => {
                        had_failure = true;
                        log::error!("failed {}: {error}", path.display());
                    }
                }
            }
            if had_failure {
                std::process::exit(1);
            }
        }
        Err(error) => {
            log::error!("upload run aborted: {error}");
            std::process::exit(1);
        }
    }
}
