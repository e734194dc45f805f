//! Rule-driven variable extraction over parsed documents.
//!
//! A [`Rule`] binds the value found at a dotted path to a named variable.
//! The engine walks the documents in payload order; the first document where
//! the path resolves wins, the value is recorded and replaced by a
//! `${VARIABLE}` placeholder. Rules that match nothing are reported and
//! skipped, never fatal.

use crate::yaml_path;
use indexmap::IndexMap;
use serde_yaml::Value;

pub const MACHINE_DEPLOYMENT_KIND: &str = "MachineDeployment";
pub const MACHINE_TEMPLATE_KIND: &str = "AWSMachineTemplate";

const MACHINE_TEMPLATE_NAME_PATH: &str = "AWSMachineTemplate.metadata.name";
const MACHINE_DEPLOYMENT_NAME_PATH: &str = "MachineDeployment.metadata.name";

/// Declares that the value at `path` should be extracted into `variable`.
///
/// A leading capitalized path segment (`Cluster.metadata.name`) restricts
/// the rule to documents of that `kind`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rule {
    pub path: String,
    pub variable: String,
}

impl Rule {
    pub fn new(path: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            variable: variable.into(),
        }
    }
}

/// The top-level `kind` of a document, when present and scalar.
pub fn doc_kind(doc: &Value) -> Option<&str> {
    doc.get("kind").and_then(Value::as_str)
}

/// Derives the worker-pool name rule.
///
/// A machine deployment and a machine template sharing a `metadata.name`
/// belong to the same pool, so the deployment name gets the variable already
/// assigned to the template name by the static rule list. Differing names
/// mean unrelated resources and the deployment name stays untemplated. The
/// name equality is the only signal available for this correlation.
pub fn derive_rules(documents: &[Value], rules: &[Rule]) -> Vec<Rule> {
    let deployment = last_of_kind(documents, MACHINE_DEPLOYMENT_KIND);
    let template = last_of_kind(documents, MACHINE_TEMPLATE_KIND);
    let (Some(deployment), Some(template)) = (deployment, template) else {
        return vec![];
    };

    let deployment_name = yaml_path::read(deployment, "metadata.name").and_then(Value::as_str);
    let template_name = yaml_path::read(template, "metadata.name").and_then(Value::as_str);
    let variable = rules
        .iter()
        .find(|rule| rule.path == MACHINE_TEMPLATE_NAME_PATH)
        .map(|rule| rule.variable.clone());

    match (deployment_name, template_name, variable) {
        (Some(deployment_name), Some(template_name), Some(variable))
            if deployment_name == template_name =>
        {
            tracing::info!(
                name = deployment_name,
                variable = %variable,
                "pool names match, templating deployment name"
            );
            vec![Rule::new(MACHINE_DEPLOYMENT_NAME_PATH, variable)]
        }
        (Some(deployment_name), Some(template_name), Some(_)) => {
            tracing::info!(
                deployment = deployment_name,
                template = template_name,
                "pool names differ, deployment name left untouched"
            );
            vec![]
        }
        _ => vec![],
    }
}

fn last_of_kind<'a>(documents: &'a [Value], kind: &str) -> Option<&'a Value> {
    documents.iter().filter(|doc| doc_kind(doc) == Some(kind)).last()
}

/// Applies `rules` (plus any derived rules) over `documents`, mutating them
/// in place. Returns the extracted variables in rule evaluation order.
pub fn apply(documents: &mut [Value], rules: &[Rule]) -> IndexMap<String, Value> {
    let derived = derive_rules(documents, rules);
    let mut variables = IndexMap::new();

    for rule in rules.iter().chain(&derived) {
        let (kind, lookup) = yaml_path::split_kind(&rule.path);
        let mut matched = false;

        for doc in documents.iter_mut() {
            if let Some(kind) = kind {
                if doc_kind(doc) != Some(kind) {
                    continue;
                }
            }
            let Some(value) = yaml_path::read(doc, lookup) else {
                continue;
            };

            let value = value.clone();
            tracing::info!(
                variable = %rule.variable,
                path = %rule.path,
                ?value,
                "extracted variable"
            );
            yaml_path::write(
                doc,
                lookup,
                Value::from(format!("${{{}}}", rule.variable)),
            );
            variables.insert(rule.variable.clone(), value);
            matched = true;
            break;
        }

        if !matched {
            tracing::info!(path = %rule.path, "rule matched no document");
        }
    }

    variables
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn docs(yaml: &[&str]) -> Vec<Value> {
        yaml.iter().map(|doc| serde_yaml::from_str(doc).unwrap()).collect()
    }

    fn pool_rules() -> Vec<Rule> {
        vec![Rule::new(MACHINE_TEMPLATE_NAME_PATH, "MACHINE_TEMPLATE_NAME")]
    }

    #[test]
    fn derives_rule_when_names_match() {
        let documents = docs(&[
            "kind: MachineDeployment\nmetadata:\n  name: pool-a\n",
            "kind: AWSMachineTemplate\nmetadata:\n  name: pool-a\n",
        ]);
        let derived = derive_rules(&documents, &pool_rules());
        assert_eq!(
            derived,
            vec![Rule::new(MACHINE_DEPLOYMENT_NAME_PATH, "MACHINE_TEMPLATE_NAME")]
        );
    }

    #[test]
    fn derives_nothing_when_names_differ() {
        let documents = docs(&[
            "kind: MachineDeployment\nmetadata:\n  name: pool-a\n",
            "kind: AWSMachineTemplate\nmetadata:\n  name: pool-b\n",
        ]);
        assert_eq!(derive_rules(&documents, &pool_rules()), vec![]);
    }

    #[test]
    fn derives_nothing_without_both_kinds() {
        let documents = docs(&["kind: MachineDeployment\nmetadata:\n  name: pool-a\n"]);
        assert_eq!(derive_rules(&documents, &pool_rules()), vec![]);
    }

    #[test]
    fn first_matching_document_wins() {
        let mut documents = docs(&[
            "kind: Cluster\nmetadata:\n  name: first\n",
            "kind: Cluster\nmetadata:\n  name: second\n",
        ]);
        let rules = vec![Rule::new("Cluster.metadata.name", "CLUSTER_NAME")];
        let variables = apply(&mut documents, &rules);

        assert_eq!(variables.get("CLUSTER_NAME"), Some(&Value::from("first")));
        assert_eq!(
            yaml_path::read(&documents[0], "metadata.name"),
            Some(&Value::from("${CLUSTER_NAME}"))
        );
        assert_eq!(
            yaml_path::read(&documents[1], "metadata.name"),
            Some(&Value::from("second"))
        );
    }

    #[test]
    fn kind_selector_skips_other_documents() {
        let mut documents = docs(&[
            "kind: Machine\nmetadata:\n  name: machine-a\n",
            "kind: Cluster\nmetadata:\n  name: cluster-a\n",
        ]);
        let rules = vec![Rule::new("Cluster.metadata.name", "CLUSTER_NAME")];
        let variables = apply(&mut documents, &rules);

        assert_eq!(variables.get("CLUSTER_NAME"), Some(&Value::from("cluster-a")));
        assert_eq!(
            yaml_path::read(&documents[0], "metadata.name"),
            Some(&Value::from("machine-a"))
        );
    }

    #[test]
    fn unmatched_rule_extracts_nothing() {
        let mut documents = docs(&["kind: Cluster\nmetadata: {}\n"]);
        let rules = vec![Rule::new("Cluster.metadata.name", "CLUSTER_NAME")];
        assert!(apply(&mut documents, &rules).is_empty());
    }

    #[test]
    fn derived_rule_templates_deployment_name() {
        let mut documents = docs(&[
            "kind: MachineDeployment\nmetadata:\n  name: pool-a\n",
            "kind: AWSMachineTemplate\nmetadata:\n  name: pool-a\n",
        ]);
        let variables = apply(&mut documents, &pool_rules());

        assert_eq!(
            variables.get("MACHINE_TEMPLATE_NAME"),
            Some(&Value::from("pool-a"))
        );
        assert_eq!(
            yaml_path::read(&documents[0], "metadata.name"),
            Some(&Value::from("${MACHINE_TEMPLATE_NAME}"))
        );
        assert_eq!(
            yaml_path::read(&documents[1], "metadata.name"),
            Some(&Value::from("${MACHINE_TEMPLATE_NAME}"))
        );
    }
}
