use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use lazy_static::lazy_static;
use thiserror::Error;
use crate::cli::Arguments;

// External software
pub const BDS_TAG: &str = "bds";
pub const ATAC_BDS: &str = "atac.bds";

// Pipeline flags
pub const SYSTEM_FLAG: &str = "-s";
pub const MODULE_FLAG: &str = "-mod";
pub const KUNDAJE_LAB_FLAG: &str = "-kundaje_lab";

// Marks a script line as a background job.
pub const BACKGROUND_MARKER: &str = "&";

pub const MOD_DEF: &str = "bowtie/2.2.4; samtools/1.2; bedtools/2.21.0; picard-tools/1.129; \
                           ucsc_tools/3.0.9; MACS2/2.1.0; java/latest; preseq/1.0.2; texlive/2013";

pub const MANIFEST_FIELDS: usize = 7;


lazy_static! {
    pub static ref GENOME2GENOME_SIZE: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("hg19", "hs");
        m.insert("mm9", "mm");

        m
    };

    pub static ref GENOME2CHROM_SIZE: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("hg19", "/mnt/data/annotations/by_release/hg19.GRCh37/hg19.chrom.sizes");
        m.insert("mm9", "/srv/scratch/leepc12/mm9/mm9.chrom.sizes");

        m
    };
}


#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exists and is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Manifest line {line}: expected {} tab-separated fields, found {found}", MANIFEST_FIELDS)]
    MalformedManifestRow { line: usize, found: usize },

    #[error("Manifest line {line}: unknown genome '{genome}'")]
    UnknownGenome { line: usize, genome: String },

    #[error("Failed to spawn {program} for sample {sample}: {source}")]
    Spawn {
        program: String,
        sample: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io { path: path.into(), source }
    }
}


/// Genome metadata resolved for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeInfo {
    pub size_code: String,
    pub chrom_sizes: String,
}

/// Genome name -> (genome-size code, chrom-size path) lookup handed to a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenomeTable {
    genomes: HashMap<String, GenomeInfo>,
}

impl GenomeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Genomes compiled into the launcher.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (genome, size_code) in GENOME2GENOME_SIZE.iter() {
            if let Some(chrom_sizes) = GENOME2CHROM_SIZE.get(genome) {
                table.insert(genome, size_code, chrom_sizes);
            }
        }
        table
    }

    pub fn insert(&mut self, genome: &str, size_code: &str, chrom_sizes: &str) {
        self.genomes.insert(
            genome.to_string(),
            GenomeInfo {
                size_code: size_code.to_string(),
                chrom_sizes: chrom_sizes.to_string(),
            },
        );
    }

    pub fn get(&self, genome: &str) -> Option<&GenomeInfo> {
        self.genomes.get(genome)
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    /// Loads a table from a TSV of `genome<TAB>size_code<TAB>chrom_sizes`.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_tsv(path: &Path) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut table = Self::new();

        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            match fields.as_slice() {
                [genome, size_code, chrom_sizes] => table.insert(genome, size_code, chrom_sizes),
                _ => {
                    return Err(PipelineError::InvalidConfig(format!(
                        "{} line {}: expected 3 tab-separated fields, found {}",
                        path.display(),
                        idx + 1,
                        fields.len()
                    )));
                }
            }
        }

        if table.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "Genome table {} defines no genomes",
                path.display()
            )));
        }
        Ok(table)
    }
}


/// Extra arguments appended to every invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvMode {
    /// `-kundaje_lab true`: the pipeline sets up its own environment.
    KundajeLab,
    /// `-mod <definition>`: explicit module definitions.
    Modules(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchMode {
    Execute,
    Script(PathBuf),
}


pub struct RunConfig {
    pub out_dir: PathBuf,
    pub sample_file: PathBuf,
    pub bds: String,
    pub bds_script: String,
    pub system: Option<String>,
    pub threads: usize,
    pub env_mode: EnvMode,
    pub dispatch: DispatchMode,
    pub genomes: GenomeTable,
}

impl RunConfig {
    /// Resolves parsed arguments against `cwd` and the launcher's own location.
    pub fn from_args(args: &Arguments, cwd: &Path, launcher_dir: &Path) -> Result<Self, PipelineError> {
        if args.threads == 0 {
            return Err(PipelineError::InvalidConfig("--threads must be at least 1".to_string()));
        }

        let genomes = match &args.genome_table {
            Some(table) => GenomeTable::from_tsv(&resolve_path(table, cwd))?,
            None => GenomeTable::builtin(),
        };

        let bds_script = match &args.bds_script {
            Some(script) => resolve_path(script, cwd),
            None => launcher_dir.join(ATAC_BDS),
        };
        let bds_script = utf8_path(&bds_script, "--bds_script")?;

        // Children run from the output directory, so a relative runner path is pinned to cwd here.
        let bds = if args.bds.contains('/') || args.bds.contains(std::path::MAIN_SEPARATOR) {
            utf8_path(&resolve_path(&args.bds, cwd), "--bds")?
        } else {
            args.bds.clone()
        };

        let env_mode = if args.kundaje_lab {
            EnvMode::KundajeLab
        } else {
            EnvMode::Modules(MOD_DEF.to_string())
        };

        let dispatch = match args.printscript_path() {
            Some(script) => DispatchMode::Script(resolve_path(script, cwd)),
            None => DispatchMode::Execute,
        };

        Ok(RunConfig {
            out_dir: resolve_path(&args.output_directory, cwd),
            sample_file: resolve_path(&args.sample_file, cwd),
            bds,
            bds_script,
            system: args.system.clone(),
            threads: args.threads,
            env_mode,
            dispatch,
            genomes,
        })
    }
}

fn utf8_path(path: &Path, what: &str) -> Result<String, PipelineError> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| PipelineError::InvalidConfig(format!("{} path {:?} is not valid UTF-8", what, path)))
}

fn resolve_path(path: &str, cwd: &Path) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}
