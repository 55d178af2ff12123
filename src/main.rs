use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use log::{LevelFilter, debug, error, info};
use env_logger::Builder;
use atac_multi::cli::parse;
use atac_multi::config::defs::{DispatchMode, RunConfig};
use atac_multi::pipelines::run_multi;


#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    info!("{:?}", args);

    let cwd = env::current_dir()?;
    let launcher_dir = launcher_dir()?;
    debug!("Launcher directory is {:?}", launcher_dir);

    let run_config = match RunConfig::from_args(&args, &cwd, &launcher_dir) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    match run_multi::run(&run_config).await {
        Ok(summary) => match run_config.dispatch {
            DispatchMode::Execute => info!(
                "Run complete: {} samples ({} succeeded, {} failed) in {} milliseconds.",
                summary.dispatched,
                summary.succeeded,
                summary.failed,
                run_start.elapsed().as_millis()
            ),
            DispatchMode::Script(path) => info!(
                "Wrote {} commands to {}.",
                summary.dispatched,
                path.display()
            ),
        },
        Err(e) => {
            error!("Batch failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
            std::process::exit(1);
        }
    }

    Ok(())
}


/// Directory holding this executable, after resolving symlinks.
fn launcher_dir() -> Result<PathBuf> {
    let exe = env::current_exe()?.canonicalize()?;
    exe.parent()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine launcher directory from {:?}", exe))
}
