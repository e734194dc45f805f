//! File-level processing pipeline.
//!
//! One run is strictly sequential: read the input, back it up, reset the
//! output directory, extract every payload, rewrite the host text, write it
//! back and hand the file to `terraform fmt`. Everything past the initial
//! read degrades instead of failing; the only hard errors are a missing
//! input file and I/O problems on read/write.

use crate::config::{Carrier, Config};
use crate::{fmt, hcl_blocks, template, yaml_docs};
use indexmap::IndexMap;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("Terraform file not found: {0}")]
    MissingInput(PathBuf),
    #[error("IO error")]
    Io(#[from] std::io::Error),
}

/// Outcome of one run, for the caller's summary.
#[derive(Debug, Default)]
pub struct Report {
    /// Payload files written to the output directory.
    pub written_files: Vec<PathBuf>,
    /// Total variables extracted across all payloads.
    pub variables: usize,
}

#[derive(derive_new::new, Debug)]
pub struct Processor {
    config: Config,
}

impl Processor {
    /// Processes one Terraform file in place.
    pub fn process_file(&self, input: &Path) -> Result<Report, ProcessError> {
        if !input.is_file() {
            return Err(ProcessError::MissingInput(input.to_path_buf()));
        }
        tracing::info!(path = %input.display(), "processing terraform file");

        let original = std::fs::read_to_string(input)?;

        if self.config.backup {
            let backup = backup_path(input);
            std::fs::write(&backup, &original)?;
            tracing::info!(path = %backup.display(), "created backup");
        }

        let parent = input.parent().unwrap_or(Path::new("."));
        let output_dir = parent.join(&self.config.output_dir);
        reset_output_dir(&output_dir)?;

        let mut content = original.clone();
        let mut report = Report::default();
        let mut pending_overrides: Vec<(Carrier, String, IndexMap<String, Value>)> = Vec::new();

        for carrier in Carrier::ALL {
            for site in hcl_blocks::find_payloads(&content, carrier) {
                let file_name = carrier.file_name(&site.resource, site.pool.as_deref());
                let out_path = output_dir.join(&file_name);

                let (payload, variables) = if self.config.templating {
                    self.template_payload(&site.content, carrier)
                } else {
                    (site.content.clone(), IndexMap::new())
                };

                std::fs::write(&out_path, &payload)?;
                tracing::info!(path = %out_path.display(), "wrote payload file");
                report.written_files.push(out_path.clone());

                let reference = file_reference(parent, &out_path);
                content = hcl_blocks::replace_attribute(
                    &content,
                    carrier.attribute(),
                    &site.literal,
                    &reference,
                );

                if !variables.is_empty() {
                    report.variables += variables.len();
                    let marker = match carrier {
                        Carrier::CloudConfig => "file(".to_string(),
                        Carrier::MachinePool => file_name,
                    };
                    pending_overrides.push((carrier, marker, variables));
                }
            }
        }

        for (carrier, marker, variables) in &pending_overrides {
            content = hcl_blocks::inject_overrides(&content, *carrier, marker, variables);
        }

        if content != original {
            std::fs::write(input, &content)?;
            tracing::info!(path = %input.display(), "updated terraform file");
            if self.config.format {
                fmt::format_file(input);
            }
        }

        Ok(report)
    }

    /// Templates one payload: split, extract variables, reconstruct.
    ///
    /// A payload with no parseable documents, or one that cannot be
    /// reconstructed, is passed through unchanged.
    fn template_payload(&self, payload: &str, carrier: Carrier) -> (String, IndexMap<String, Value>) {
        let rules = self.config.rules.rules_for(carrier);
        if rules.is_empty() {
            return (payload.to_string(), IndexMap::new());
        }

        let mut split = yaml_docs::split(payload);
        if split.documents.is_empty() {
            tracing::warn!("no parseable yaml documents, payload left untouched");
            return (payload.to_string(), IndexMap::new());
        }

        {
            let kinds: Vec<&str> = split
                .documents
                .iter()
                .map(|doc| template::doc_kind(doc).unwrap_or("unknown"))
                .collect();
            tracing::info!(
                documents = split.documents.len(),
                raw = split.fragments.len() - split.documents.len(),
                ?kinds,
                "templating payload"
            );
        }

        let variables = template::apply(&mut split.documents, rules);

        match yaml_docs::reconstruct(&split.documents, &split.fragments, &variables) {
            Ok(rebuilt) => (rebuilt, variables),
            Err(error) => {
                tracing::warn!(%error, "reconstruction failed, returning original payload");
                (payload.to_string(), variables)
            }
        }
    }
}

/// Terraform `file(...)` expression for `target`, relative to the directory
/// of the host file. Backslashes are normalized so references stay portable.
fn file_reference(base: &Path, target: &Path) -> String {
    let relative = target.strip_prefix(base).unwrap_or(target);
    let mut path = relative.display().to_string();
    if cfg!(windows) {
        path = path.replace('\\', "/");
    }
    format!("file(\"{path}\")")
}

fn reset_output_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        tracing::info!(path = %dir.display(), "clearing output directory");
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)
}

fn backup_path(input: &Path) -> PathBuf {
    let mut path = input.as_os_str().to_os_string();
    path.push(".backup");
    PathBuf::from(path)
}
