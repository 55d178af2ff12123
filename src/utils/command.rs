/// Functions and structs for building pipeline command lines

use std::path::Path;
use tokio::process::Command;
use crate::config::defs::{EnvMode, GenomeInfo, RunConfig, BACKGROUND_MARKER, KUNDAJE_LAB_FLAG, MODULE_FLAG, SYSTEM_FLAG};
use crate::utils::manifest::SampleRecord;


/// Fully resolved external command for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Command ready to spawn from `work_dir`. On unix the child leads its own
    /// process group so everything it starts can be signalled together.
    pub fn to_command(&self, work_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(work_dir);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    /// Shell rendering. Each token is quoted only where needed, so the
    /// shell sees the same argv that `to_command` passes.
    pub fn render(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|token| shell_quote(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One script-mode line, backgrounded and newline terminated.
    pub fn script_line(&self) -> String {
        format!("{} {}\n", self.render(), BACKGROUND_MARKER)
    }
}


/// Builds the pipeline invocation for one sample.
///
/// # Arguments
///
/// * `config` - RunConfig for the batch.
/// * `record` - Manifest row.
/// * `genome` - Resolved genome metadata for `record.genome`.
///
/// # Returns
/// Invocation with args in pipeline order.
pub fn build_invocation(config: &RunConfig, record: &SampleRecord, genome: &GenomeInfo) -> Invocation {
    let mut args_vec: Vec<String> = Vec::new();

    if let Some(system) = &config.system {
        args_vec.push(SYSTEM_FLAG.to_string());
        args_vec.push(system.clone());
    }
    args_vec.push(config.bds_script.clone());
    args_vec.push(record.index.clone());
    args_vec.push(record.read1.clone());
    args_vec.push(record.read2.clone());
    args_vec.push(config.threads.to_string());
    args_vec.push(genome.size_code.clone());
    args_vec.push(genome.chrom_sizes.clone());
    args_vec.push(record.tssfile.clone());
    args_vec.push(record.output_dir_name());

    match &config.env_mode {
        EnvMode::KundajeLab => {
            args_vec.push(KUNDAJE_LAB_FLAG.to_string());
            args_vec.push("true".to_string());
        }
        EnvMode::Modules(mod_def) => {
            args_vec.push(MODULE_FLAG.to_string());
            args_vec.push(mod_def.clone());
        }
    }

    Invocation {
        program: config.bds.clone(),
        args: args_vec,
    }
}


fn shell_quote(token: &str) -> String {
    let safe = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if safe {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}
