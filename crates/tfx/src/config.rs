//! Processing configuration: payload carriers, rule sets, output settings.
//!
//! Everything here is an explicit value handed to the processor. The
//! built-in rule set covers the standard AWS cluster-api shapes; an
//! alternative set can be loaded from a YAML file.

use crate::template::Rule;
use std::path::Path;

/// Default output directory name, created next to the input file.
pub const DEFAULT_OUTPUT_DIR: &str = "cluster_configs_yaml";

/// The two payload carriers understood by the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    /// `cloud_config { values = "..." }`
    CloudConfig,
    /// `machine_pool { node_pool_config = "..." }`
    MachinePool,
}

impl Carrier {
    pub const ALL: [Carrier; 2] = [Carrier::CloudConfig, Carrier::MachinePool];

    /// Block keyword introducing the carrier.
    pub fn keyword(self) -> &'static str {
        match self {
            Carrier::CloudConfig => "cloud_config",
            Carrier::MachinePool => "machine_pool",
        }
    }

    /// Attribute holding the escaped payload literal.
    pub fn attribute(self) -> &'static str {
        match self {
            Carrier::CloudConfig => "values",
            Carrier::MachinePool => "node_pool_config",
        }
    }

    /// Output file name for a payload of this carrier.
    pub fn file_name(self, resource: &str, pool: Option<&str>) -> String {
        match self {
            Carrier::CloudConfig => format!("{resource}_cloud_config.yaml"),
            Carrier::MachinePool => {
                format!("{}_{}_config.yaml", resource, pool.unwrap_or(resource))
            }
        }
    }
}

/// Templating rules per carrier.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub cloud_config: Vec<Rule>,
    #[serde(default)]
    pub node_pool_config: Vec<Rule>,
}

impl RuleSet {
    /// The built-in rule set for AWS cluster-api payloads.
    ///
    /// Cloud-config payloads are extracted without templating by default;
    /// node-pool payloads template replica counts, template/bootstrap name
    /// references and the machine shape fields.
    pub fn builtin() -> Self {
        Self {
            cloud_config: vec![],
            node_pool_config: vec![
                // control plane
                Rule::new("KubeadmControlPlane.spec.replicas", "REPLICAS"),
                Rule::new(
                    "KubeadmControlPlane.spec.machineTemplate.infrastructureRef.name",
                    "MACHINE_TEMPLATE_NAME",
                ),
                // worker pools
                Rule::new(
                    "MachineDeployment.spec.template.spec.infrastructureRef.name",
                    "MACHINE_TEMPLATE_NAME",
                ),
                Rule::new(
                    "MachineDeployment.spec.template.spec.bootstrap.configRef.name",
                    "KC_TEMPLATE_NAME",
                ),
                Rule::new("KubeadmConfigTemplate.metadata.name", "KC_TEMPLATE_NAME"),
                // both
                Rule::new("AWSMachineTemplate.metadata.name", "MACHINE_TEMPLATE_NAME"),
                Rule::new("MachineDeployment.spec.replicas", "REPLICAS"),
                Rule::new("AWSMachineTemplate.spec.template.spec.ami.id", "AMI_ID"),
                Rule::new(
                    "AWSMachineTemplate.spec.template.spec.instanceType",
                    "INSTANCE_TYPE",
                ),
                Rule::new(
                    "AWSMachineTemplate.spec.template.spec.rootVolume.size",
                    "ROOT_VOLUME_SIZE",
                ),
            ],
        }
    }

    /// Loads a rule set from a YAML file.
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        tracing::info!(path = %path.display(), "loading rules file");
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    pub fn rules_for(&self, carrier: Carrier) -> &[Rule] {
        match carrier {
            Carrier::CloudConfig => &self.cloud_config,
            Carrier::MachinePool => &self.node_pool_config,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RulesError {
    #[error("Unable to read rules file")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse rules file")]
    Parse(#[from] serde_yaml::Error),
}

/// Run configuration assembled by the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Output directory name, created next to the input file.
    pub output_dir: String,
    /// Write a `.backup` sibling before rewriting the input.
    pub backup: bool,
    /// Run `terraform fmt` on the rewritten file.
    pub format: bool,
    /// Extract variables and inject overrides blocks. Off means payloads are
    /// written byte-for-byte as unescaped content.
    pub templating: bool,
    pub rules: RuleSet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            backup: true,
            format: true,
            templating: false,
            rules: RuleSet::builtin(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_names_per_carrier() {
        assert_eq!(
            Carrier::CloudConfig.file_name("capi", None),
            "capi_cloud_config.yaml"
        );
        assert_eq!(
            Carrier::MachinePool.file_name("capi", Some("worker-pool")),
            "capi_worker-pool_config.yaml"
        );
    }

    #[test]
    fn rule_set_deserializes_with_defaults() {
        let rules: RuleSet = serde_yaml::from_str(
            "node_pool_config:\n  - path: MachineDeployment.spec.replicas\n    variable: REPLICAS\n",
        )
        .unwrap();

        assert!(rules.cloud_config.is_empty());
        assert_eq!(
            rules.node_pool_config,
            vec![Rule::new("MachineDeployment.spec.replicas", "REPLICAS")]
        );
    }
}
