use clap::Parser;
use crate::config::defs::BDS_TAG;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "atac-multi", version = "0.1.0", about = "Run ATAC pipeline on multiple samples.")]
pub struct Arguments {

    #[arg(help = "TSV file containing sample info")]
    pub sample_file: String,

    #[arg(help = "Output directory")]
    pub output_directory: String,

    #[arg(short = 's', long = "system", help = "BDS system parameter (e.g. local/cluster)")]
    pub system: Option<String>,

    #[arg(short = 't', long = "threads", default_value_t = 1, help = "Number of threads (default: 1)")]
    pub threads: usize,

    #[arg(short = 'p', long = "printscript", default_value = "", help = "Prints commands to file (does not run them)")]
    pub printscript: String,

    #[arg(short = 'k', long = "kundaje_lab", action, help = "If set, the pipeline will define Kundaje lab environment variables automatically.")]
    pub kundaje_lab: bool,

    #[arg(long = "bds", default_value = BDS_TAG, help = "Pipeline runner executable")]
    pub bds: String,

    #[arg(long = "bds_script", help = "Path to atac.bds. Defaults to atac.bds next to this executable.")]
    pub bds_script: Option<String>,

    #[arg(long = "genome_table", help = "Optional TSV of genome<TAB>size_code<TAB>chrom_sizes replacing the built-in genomes")]
    pub genome_table: Option<String>,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,
}

impl Arguments {
    /// Script output path, if script mode was requested.
    pub fn printscript_path(&self) -> Option<&str> {
        if self.printscript.is_empty() {
            None
        } else {
            Some(self.printscript.as_str())
        }
    }
}
