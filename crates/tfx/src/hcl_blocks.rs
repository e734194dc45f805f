//! Locating and rewriting payload carrier blocks in Terraform text.
//!
//! Carrier blocks are found with a keyword-plus-brace pattern and cut out by
//! [`crate::scan::block_body`]; the payload literal inside is recovered with
//! the quote scanner and unescaper. All rewriting is plain text surgery on
//! the host file so everything outside the touched spans survives
//! byte-for-byte.

use crate::config::Carrier;
use crate::scan;
use indexmap::IndexMap;
use regex::{NoExpand, Regex};
use serde_yaml::Value;
use std::sync::LazyLock;

static CLOUD_CONFIG_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cloud_config\s*\{").unwrap());
static MACHINE_POOL_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"machine_pool\s*\{").unwrap());
static VALUES_ASSIGN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"values\s*=\s*").unwrap());
static NODE_POOL_ASSIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"node_pool_config\s*=\s*").unwrap());

static RESOURCE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"resource\s+"[^"]+"\s+"([^"]+)"\s*\{"#).unwrap());
static POOL_NAME_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"name:\s*([^\n\r]+)").unwrap());
static TEMPLATE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\{\{.*?\}\}").unwrap());
static OVERRIDES_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"overrides\s*=\s*\{[^}]*\}").unwrap());

fn open_pattern(carrier: Carrier) -> &'static Regex {
    match carrier {
        Carrier::CloudConfig => &CLOUD_CONFIG_OPEN,
        Carrier::MachinePool => &MACHINE_POOL_OPEN,
    }
}

fn assign_pattern(carrier: Carrier) -> &'static Regex {
    match carrier {
        Carrier::CloudConfig => &VALUES_ASSIGN,
        Carrier::MachinePool => &NODE_POOL_ASSIGN,
    }
}

/// One payload found in the host text.
#[derive(Debug)]
pub struct PayloadSite {
    /// Name label of the owning `resource` block.
    pub resource: String,
    /// Pool name for machine pools, `None` for cloud configs.
    pub pool: Option<String>,
    /// The quoted literal exactly as it appears in the host text.
    pub literal: String,
    /// The unescaped payload content.
    pub content: String,
}

/// Finds every payload of `carrier` in `content`.
///
/// Blocks whose attribute already references a file are skipped, which makes
/// repeated runs over the same output a no-op for processed blocks.
pub fn find_payloads(content: &str, carrier: Carrier) -> Vec<PayloadSite> {
    let mut sites: Vec<PayloadSite> = Vec::new();

    for open in open_pattern(carrier).find_iter(content) {
        let block = scan::block_body(content, open.end());

        let Some(assign) = assign_pattern(carrier).find(block) else {
            continue;
        };
        let Some(literal) = scan::quoted_literal(block, assign.end()) else {
            continue;
        };

        if literal.contains("file(") {
            tracing::debug!(
                carrier = carrier.keyword(),
                "skipping already extracted payload"
            );
            continue;
        }

        let Some(resource) = owning_resource(content, open.start()) else {
            tracing::warn!(
                carrier = carrier.keyword(),
                "no resource header found before block"
            );
            continue;
        };

        let payload = scan::unescape(literal);
        let pool = match carrier {
            Carrier::CloudConfig => None,
            Carrier::MachinePool => Some(pool_name(&resource, block, &payload, &sites)),
        };

        tracing::info!(
            resource = %resource,
            pool = ?pool,
            bytes = literal.len(),
            "found payload"
        );
        sites.push(PayloadSite {
            resource,
            pool,
            literal: literal.to_string(),
            content: payload,
        });
    }

    sites
}

/// Name label of the nearest `resource "<type>" "<name>"` header preceding
/// `position`.
fn owning_resource(content: &str, position: usize) -> Option<String> {
    RESOURCE_HEADER
        .captures_iter(&content[..position])
        .last()
        .map(|caps| caps[1].to_string())
}

/// Pool naming: a `name:` field from the payload when present and usable,
/// otherwise `<resource>-cp` / `<resource>-worker` depending on the
/// `control_plane` attribute. Collisions get `_2`, `_3`, ... suffixes.
fn pool_name(resource: &str, block: &str, payload: &str, existing: &[PayloadSite]) -> String {
    let fallback = if block.contains("control_plane = true") {
        format!("{resource}-cp")
    } else {
        format!("{resource}-worker")
    };

    let Some(caps) = POOL_NAME_FIELD.captures(payload) else {
        return fallback;
    };
    let cleaned = TEMPLATE_MARKER.replace_all(caps[1].trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.starts_with("${") {
        return fallback;
    }

    let taken: Vec<&str> = existing
        .iter()
        .filter_map(|site| site.pool.as_deref())
        .collect();
    if !taken.contains(&cleaned) {
        return cleaned.to_string();
    }

    let mut counter = 2;
    loop {
        let candidate = format!("{cleaned}_{counter}");
        if !taken.contains(&candidate.as_str()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Replaces `attribute = <literal>` with `attribute = <replacement>`.
///
/// An exact pattern match is tried first; literals that defeat the pattern
/// fall back to plain substring replacement. When both fail the text is
/// returned unchanged and the failure reported.
pub fn replace_attribute(
    content: &str,
    attribute: &str,
    literal: &str,
    replacement: &str,
) -> String {
    let pattern = Regex::new(&format!(
        r"(?s)({attribute}\s*=\s*){}",
        regex::escape(literal)
    ))
    .expect("attribute pattern with escaped literal always compiles");

    if pattern.is_match(content) {
        tracing::debug!(attribute, "replaced attribute via pattern match");
        return pattern
            .replace_all(content, |caps: &regex::Captures| {
                format!("{}{replacement}", &caps[1])
            })
            .into_owned();
    }

    if content.contains(literal) {
        tracing::debug!(attribute, "replaced attribute via literal match");
        return content.replace(literal, replacement);
    }

    tracing::warn!(attribute, "could not replace attribute value");
    content.to_string()
}

/// Renders an `overrides = { ... }` body from extracted variables. Strings
/// are quoted and escaped, other scalars rendered bare; JSON scalar syntax
/// is valid HCL for both.
fn render_overrides(variables: &IndexMap<String, Value>) -> String {
    let lines: Vec<String> = variables
        .iter()
        .map(|(name, value)| {
            let rendered =
                serde_json::to_string(value).unwrap_or_else(|_| String::from("null"));
            format!("      {name} = {rendered}")
        })
        .collect();

    format!("overrides = {{\n{}\n    }}", lines.join("\n"))
}

/// Injects `variables` as an overrides block into the carrier block
/// identified by `marker`.
///
/// The marker distinguishes the governing block: the `file(` reference for
/// cloud configs, the generated file name for machine pools. An empty or
/// existing overrides attribute is replaced, otherwise a new one is inserted
/// at the top of the block body. Machine-pool injection stops after the
/// first matching block.
pub fn inject_overrides(
    content: &str,
    carrier: Carrier,
    marker: &str,
    variables: &IndexMap<String, Value>,
) -> String {
    if variables.is_empty() {
        return content.to_string();
    }

    let rendered = render_overrides(variables);
    let mut result = content.to_string();

    for open in open_pattern(carrier).find_iter(content) {
        let block = scan::block_body(content, open.end());
        if !block.contains(marker) {
            continue;
        }

        let updated = if block.contains("overrides = {}") {
            block.replace("overrides = {}", &rendered)
        } else if OVERRIDES_ATTR.is_match(block) {
            OVERRIDES_ATTR
                .replace_all(block, NoExpand(&rendered))
                .into_owned()
        } else {
            format!("\n    {rendered}\n{block}")
        };

        let head = &content[open.start()..open.end()];
        let original_span = format!("{head}{block}}}");
        let replacement_span = format!("{head}{updated}}}");
        result = result.replace(&original_span, &replacement_span);
        tracing::info!(carrier = carrier.keyword(), "injected overrides block");

        if matches!(carrier, Carrier::MachinePool) {
            break;
        }
    }

    result
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const HOST: &str = r#"
resource "spectrocloud_cluster_aws" "capi" {
  cloud_config {
    ssh_key_name = "default"
    values       = "kind: Cluster\nmetadata:\n  name: demo\n"
  }

  machine_pool {
    control_plane = true
    node_pool_config = "kind: KubeadmControlPlane\nspec:\n  replicas: 3\n"
  }

  machine_pool {
    node_pool_config = "metadata:\n  name: worker-pool\n"
  }
}
"#;

    #[test]
    fn finds_cloud_config_payload() {
        let sites = find_payloads(HOST, Carrier::CloudConfig);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].resource, "capi");
        assert_eq!(sites[0].pool, None);
        assert_eq!(sites[0].content, "kind: Cluster\nmetadata:\n  name: demo\n");
    }

    #[test]
    fn machine_pool_names_prefer_payload_name() {
        let sites = find_payloads(HOST, Carrier::MachinePool);
        assert_eq!(sites.len(), 2);
        // the control plane payload has no name field, so the fallback wins
        assert_eq!(sites[0].pool.as_deref(), Some("capi-cp"));
        assert_eq!(sites[1].pool.as_deref(), Some("worker-pool"));
    }

    #[test]
    fn duplicate_pool_names_get_suffixes() {
        let host = r#"
resource "spectrocloud_cluster_aws" "capi" {
  machine_pool {
    node_pool_config = "metadata:\n  name: pool\n"
  }
  machine_pool {
    node_pool_config = "metadata:\n  name: pool\n"
  }
}
"#;
        let sites = find_payloads(host, Carrier::MachinePool);
        assert_eq!(sites[0].pool.as_deref(), Some("pool"));
        assert_eq!(sites[1].pool.as_deref(), Some("pool_2"));
    }

    #[test]
    fn file_reference_blocks_are_skipped() {
        let host = r#"
resource "spectrocloud_cluster_aws" "capi" {
  cloud_config {
    values = file("cluster_configs_yaml/capi_cloud_config.yaml")
  }
}
"#;
        assert!(find_payloads(host, Carrier::CloudConfig).is_empty());
    }

    #[test]
    fn replace_attribute_prefers_pattern_match() {
        let replaced = replace_attribute(
            HOST,
            "values",
            r#""kind: Cluster\nmetadata:\n  name: demo\n""#,
            r#"file("out/capi_cloud_config.yaml")"#,
        );
        assert!(replaced.contains(r#"values       = file("out/capi_cloud_config.yaml")"#));
        assert!(!replaced.contains("kind: Cluster"));
    }

    #[test]
    fn replace_attribute_leaves_text_when_literal_is_gone() {
        let untouched = replace_attribute(HOST, "values", r#""no such literal""#, "file(\"x\")");
        assert_eq!(untouched, HOST);
    }

    #[test]
    fn inject_creates_new_overrides_block() {
        let host = r#"
resource "spectrocloud_cluster_aws" "capi" {
  cloud_config {
    values = file("cluster_configs_yaml/capi_cloud_config.yaml")
  }
}
"#;
        let mut variables = IndexMap::new();
        variables.insert("CLUSTER_NAME".to_string(), Value::from("demo-cluster"));
        variables.insert("REPLICAS".to_string(), Value::from(3));

        let injected = inject_overrides(host, Carrier::CloudConfig, "file(", &variables);
        assert!(injected.contains("overrides = {"));
        assert!(injected.contains("CLUSTER_NAME = \"demo-cluster\""));
        assert!(injected.contains("REPLICAS = 3"));
    }

    #[test]
    fn inject_replaces_empty_overrides() {
        let host = r#"
resource "spectrocloud_cluster_aws" "capi" {
  cloud_config {
    overrides = {}
    values = file("cluster_configs_yaml/capi_cloud_config.yaml")
  }
}
"#;
        let mut variables = IndexMap::new();
        variables.insert("CLUSTER_NAME".to_string(), Value::from("demo"));

        let injected = inject_overrides(host, Carrier::CloudConfig, "file(", &variables);
        assert!(injected.contains("CLUSTER_NAME = \"demo\""));
        assert!(!injected.contains("overrides = {}"));
    }

    #[test]
    fn inject_targets_the_marked_pool_only() {
        let host = r#"
resource "spectrocloud_cluster_aws" "capi" {
  machine_pool {
    node_pool_config = file("cluster_configs_yaml/capi_capi-cp_config.yaml")
  }
  machine_pool {
    node_pool_config = file("cluster_configs_yaml/capi_worker-pool_config.yaml")
  }
}
"#;
        let mut variables = IndexMap::new();
        variables.insert("REPLICAS".to_string(), Value::from(2));

        let injected = inject_overrides(
            host,
            Carrier::MachinePool,
            "capi_worker-pool_config.yaml",
            &variables,
        );

        let cp_block = injected.find("capi_capi-cp_config.yaml").unwrap();
        let overrides = injected.find("overrides = {").unwrap();
        assert!(overrides > cp_block, "only the worker pool block gains overrides");
        assert!(injected.contains("REPLICAS = 2"));
    }
}
