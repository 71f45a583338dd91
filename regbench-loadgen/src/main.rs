//! Load generator binary that benchmarks a shell-descriptor registry.
//!
//! The run is configured through an optional YAML file and `REGBENCH__` environment variables, see
//! [`Config`]. When orchestration commands are configured, the target is started before the run
//! and stopped afterwards, including when the process receives `SIGINT` or `SIGTERM`.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;

use regbench_loadgen::benchmark::execute;
use regbench_loadgen::config::Config;
use regbench_loadgen::http::HttpRemote;
use regbench_loadgen::observability::initialize_tracing;
use regbench_loadgen::template::BodyTemplate;
use regbench_loadgen::workload::Workload;

/// Benchmarks a shell-descriptor registry with a weighted mix of operations
#[derive(Debug, FromArgs)]
pub struct Args {
    /// path to the yaml configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    initialize_tracing();
    tracing::debug!(?config);

    let template = match &config.template.path {
        Some(path) => BodyTemplate::from_path(path)
            .with_context(|| format!("failed to load template {}", path.display()))?,
        None => BodyTemplate::default(),
    }
    .sub_resources_field(config.template.sub_resources_field.as_str());

    let mut workload = Workload::builder()
        .seed(config.seed)
        .iterations(config.iterations)
        .prewarm(config.prewarm)
        .weights(config.weights)
        .page_limit(config.page_limit)
        .template(template)
        .ids(config.ids.clone())
        .build()
        .context("invalid workload")?;

    let remote = HttpRemote::with_timeout(config.remote.as_str(), config.request_timeout)
        .context("failed to create HTTP client")?
        .capture_details(config.log_request_details);

    let interrupt = async {
        elegant_departure::tokio::depart()
            .on_termination()
            .on_sigint()
            .await;
    };

    execute(&config, &remote, &mut workload, interrupt).await
}
