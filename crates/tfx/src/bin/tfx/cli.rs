//! tfx cli interface

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Terraform file to process
    pub terraform_file: PathBuf,

    /// Output directory for generated files
    ///
    /// Created next to the terraform file. The directory is removed and
    /// recreated on every run.
    #[clap(short = 'o', long = "output-dir", default_value = tfx::config::DEFAULT_OUTPUT_DIR)]
    pub output_dir: String,

    /// Skip creating a backup file
    #[clap(long = "no-backup")]
    pub no_backup: bool,

    /// Skip automatic terraform fmt formatting
    #[clap(long = "no-format")]
    pub no_format: bool,

    /// Only extract YAML to files, without templating or overrides
    ///
    /// This is the default behavior.
    #[clap(long = "only-yaml-format", conflicts_with = "with_templating")]
    pub only_yaml_format: bool,

    /// Enable templating and overrides processing
    #[clap(long = "with-templating")]
    pub with_templating: bool,

    /// Load templating rules from a YAML file instead of the built-in set
    #[clap(long = "rules")]
    pub rules: Option<PathBuf>,
}
