use std::fs::File;
use std::io::{BufWriter, Write};
use log::{debug, info, warn};
use tokio::process::Child;
use crate::config::defs::{DispatchMode, PipelineError, RunConfig};
use crate::utils::command::{build_invocation, Invocation};
use crate::utils::file::{create_script_file, ensure_dir};
use crate::utils::manifest::ManifestReader;
use crate::utils::system::{oversubscription, physical_cores};


/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// A spawned pipeline process, owned by the run until waited on.
struct Worker {
    sample: String,
    child: Child,
}

enum Dispatcher {
    Execute {
        workers: Vec<Worker>,
        cores: usize,
        oversubscribed: bool,
    },
    Script(BufWriter<File>),
}

impl Dispatcher {
    fn execute(cores: usize) -> Self {
        Dispatcher::Execute {
            workers: Vec::new(),
            cores,
            oversubscribed: false,
        }
    }

    fn dispatch(&mut self, config: &RunConfig, sample: String, invocation: Invocation) -> Result<(), PipelineError> {
        match self {
            Dispatcher::Execute { workers, cores, oversubscribed } => {
                debug!("Spawning: {}", invocation.render());
                let child = invocation
                    .to_command(&config.out_dir)
                    .spawn()
                    .map_err(|e| PipelineError::Spawn {
                        program: invocation.program.clone(),
                        sample: sample.clone(),
                        source: e,
                    })?;
                workers.push(Worker { sample, child });

                if !*oversubscribed {
                    if let Some(requested) = oversubscription(config.threads, workers.len(), *cores) {
                        warn!(
                            "{} pipelines x {} threads = {} threads requested on {} physical cores",
                            workers.len(),
                            config.threads,
                            requested,
                            cores
                        );
                        *oversubscribed = true;
                    }
                }
            }
            Dispatcher::Script(writer) => {
                let path = script_path(config);
                writer
                    .write_all(invocation.script_line().as_bytes())
                    .map_err(|e| PipelineError::io(path, e))?;
            }
        }
        Ok(())
    }
}


/// Runs the pipeline once per manifest row.
///
/// Execute mode spawns every invocation in the background, then waits on each
/// in spawn order. Script mode writes the invocations to the script file instead.
///
/// # Arguments
///
/// * `config` - RunConfig built in main.
///
/// # Returns
/// BatchSummary with per-process outcomes (all zero outcomes in script mode).
pub async fn run(config: &RunConfig) -> Result<BatchSummary, PipelineError> {
    let mut dispatcher = match &config.dispatch {
        DispatchMode::Script(path) => {
            info!("Writing commands to {}", path.display());
            Dispatcher::Script(create_script_file(path)?)
        }
        DispatchMode::Execute => Dispatcher::execute(physical_cores()),
    };

    let dispatched = match dispatch_manifest(config, &mut dispatcher) {
        Ok(count) => count,
        Err(e) => {
            if let Dispatcher::Execute { workers, .. } = dispatcher {
                abort_workers(workers).await;
            }
            return Err(e);
        }
    };

    let mut summary = BatchSummary { dispatched, ..Default::default() };
    match dispatcher {
        Dispatcher::Execute { workers, .. } => {
            let (succeeded, failed) = wait_all(workers).await;
            summary.succeeded = succeeded;
            summary.failed = failed;
        }
        Dispatcher::Script(mut writer) => {
            writer.flush().map_err(|e| PipelineError::io(script_path(config), e))?;
        }
    }

    Ok(summary)
}


fn dispatch_manifest(config: &RunConfig, dispatcher: &mut Dispatcher) -> Result<usize, PipelineError> {
    ensure_dir(&config.out_dir)?;

    let mut dispatched = 0;
    for record in ManifestReader::open(&config.sample_file)? {
        let record = record?;
        let sample_output_dir = record.output_dir_name();
        info!("Processing {} (genome: {})", sample_output_dir, record.genome);

        ensure_dir(&config.out_dir.join(&sample_output_dir))?;
        let genome = config.genomes.get(&record.genome).ok_or_else(|| PipelineError::UnknownGenome {
            line: record.line,
            genome: record.genome.clone(),
        })?;

        let invocation = build_invocation(config, &record, genome);
        dispatcher.dispatch(config, sample_output_dir, invocation)?;
        dispatched += 1;
    }
    Ok(dispatched)
}


/// Waits on every worker in spawn order. Failures are logged, never short-circuit.
async fn wait_all(workers: Vec<Worker>) -> (usize, usize) {
    let mut succeeded = 0;
    let mut failed = 0;

    for mut worker in workers {
        match worker.child.wait().await {
            Ok(status) if status.success() => {
                info!("{} finished", worker.sample);
                succeeded += 1;
            }
            Ok(status) => {
                warn!("{} exited with {}", worker.sample, status);
                failed += 1;
            }
            Err(e) => {
                warn!("Failed to wait on {}: {}", worker.sample, e);
                failed += 1;
            }
        }
    }
    (succeeded, failed)
}


/// Kills and reaps workers spawned before a fatal error, along with anything
/// they started in their process group.
async fn abort_workers(mut workers: Vec<Worker>) {
    for worker in workers.iter_mut() {
        warn!("Killing {} after fatal error", worker.sample);
        kill_process_group(worker);
        if let Err(e) = worker.child.start_kill() {
            debug!("Kill failed for {}: {}", worker.sample, e);
        }
    }
    for mut worker in workers {
        let _ = worker.child.wait().await;
    }
}

#[cfg(unix)]
fn kill_process_group(worker: &Worker) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = worker.child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("killpg failed for {}: {}", worker.sample, e);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_worker: &Worker) {}


fn script_path(config: &RunConfig) -> std::path::PathBuf {
    match &config.dispatch {
        DispatchMode::Script(path) => path.clone(),
        DispatchMode::Execute => config.out_dir.clone(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use crate::config::defs::{EnvMode, GenomeTable};

    fn config(dir: &Path, dispatch: DispatchMode) -> RunConfig {
        RunConfig {
            out_dir: dir.join("out"),
            sample_file: dir.join("samples.tsv"),
            bds: "true".to_string(),
            bds_script: "atac.bds".to_string(),
            system: Some("local".to_string()),
            threads: 1,
            env_mode: EnvMode::KundajeLab,
            dispatch,
            genomes: GenomeTable::builtin(),
        }
    }

    #[tokio::test]
    async fn test_script_mode_dispatch() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::write(
            tmp.path().join("samples.tsv"),
            "S1\tA\tr1\tr2\thg19\tidx\ttss\nS2\tB\tr1\tr2\tmm9\tidx\ttss\n",
        )?;
        let script = tmp.path().join("run.sh");
        let config = config(tmp.path(), DispatchMode::Script(script.clone()));

        let summary = run(&config).await?;
        assert_eq!(summary, BatchSummary { dispatched: 2, succeeded: 0, failed: 0 });

        let contents = std::fs::read_to_string(&script)?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" hs "));
        assert!(lines[1].contains(" mm "));
        assert!(lines.iter().all(|l| l.ends_with(" &")));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_genome_aborts() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        std::fs::write(
            tmp.path().join("samples.tsv"),
            "S1\tA\tr1\tr2\thg19\tidx\ttss\nS2\tB\tr1\tr2\tdm3\tidx\ttss\n",
        )?;
        let config = config(tmp.path(), DispatchMode::Execute);

        let err = run(&config).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownGenome { line: 2, ref genome } if genome == "dm3"));
        Ok(())
    }

    #[tokio::test]
    async fn test_oversubscription_flagged_at_spawn() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let config = config(tmp.path(), DispatchMode::Execute);
        std::fs::create_dir_all(&config.out_dir)?;
        let invocation = Invocation { program: "true".to_string(), args: Vec::new() };

        let mut dispatcher = Dispatcher::execute(1);
        dispatcher.dispatch(&config, "S1-A".to_string(), invocation.clone())?;
        assert!(matches!(dispatcher, Dispatcher::Execute { oversubscribed: false, .. }));

        dispatcher.dispatch(&config, "S2-B".to_string(), invocation)?;
        assert!(matches!(dispatcher, Dispatcher::Execute { oversubscribed: true, .. }));

        if let Dispatcher::Execute { workers, .. } = dispatcher {
            assert_eq!(wait_all(workers).await, (2, 0));
        }
        Ok(())
    }
}
