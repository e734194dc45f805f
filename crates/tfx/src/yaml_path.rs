//! Dotted-path access into parsed YAML documents.
//!
//! Paths look like `spec.template.spec.ami.id` or `spec.cidrBlocks[0]`.
//! Reads answer with `Option`: a missing key, a traversal through a
//! non-mapping, an out-of-range index and an explicit null all read as
//! [`None`], which callers interpret as "rule did not match". Writes are
//! best effort and never fail a run.

use serde_yaml::Value;

/// One step of a dotted path. `replicas` is a plain key; `cidrBlocks[0]`
/// addresses index 0 of the sequence stored under `cidrBlocks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Indexed { key: String, index: usize },
}

/// Splits a path into segments. A segment whose index suffix does not parse
/// (`a[x]`) is kept as a literal key.
pub fn parse(path: &str) -> Vec<Segment> {
    path.split('.')
        .map(|segment| {
            if let Some((key, rest)) = segment.split_once('[') {
                if let Some(index) = rest.strip_suffix(']').and_then(|raw| raw.parse().ok()) {
                    return Segment::Indexed {
                        key: key.to_string(),
                        index,
                    };
                }
            }
            Segment::Key(segment.to_string())
        })
        .collect()
}

/// Splits a leading document-kind selector off a rule path.
///
/// `Cluster.metadata.name` becomes `(Some("Cluster"), "metadata.name")`; the
/// selector must start with an uppercase letter, mirroring Kubernetes kind
/// naming. A path without a selector is returned whole.
pub fn split_kind(path: &str) -> (Option<&str>, &str) {
    if let Some((head, rest)) = path.split_once('.') {
        if head.chars().next().is_some_and(|c| c.is_uppercase()) {
            return (Some(head), rest);
        }
    }
    (None, path)
}

/// Reads the value at `path` inside `doc`.
pub fn read<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in parse(path) {
        current = match &segment {
            Segment::Key(key) => current.get(key.as_str())?,
            Segment::Indexed { key, index } => current
                .get(key.as_str())?
                .as_sequence()?
                .get(*index)?,
        };
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Overwrites the value at `path` in place.
///
/// Navigates to the parent of the final segment the same way [`read`] does
/// and replaces the final key/index. A missing parent chain, wrong container
/// shape or out-of-range index leaves the document untouched.
pub fn write(doc: &mut Value, path: &str, new_value: Value) {
    let segments = parse(path);
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = doc;
    for segment in parents {
        let next = match segment {
            Segment::Key(key) => current.get_mut(key.as_str()),
            Segment::Indexed { key, index } => current
                .get_mut(key.as_str())
                .and_then(Value::as_sequence_mut)
                .and_then(|seq| seq.get_mut(*index)),
        };
        match next {
            Some(value) => current = value,
            None => return,
        }
    }

    match last {
        Segment::Key(key) => {
            if let Some(mapping) = current.as_mapping_mut() {
                mapping.insert(Value::from(key.as_str()), new_value);
            }
        }
        Segment::Indexed { key, index } => {
            if let Some(slot) = current
                .get_mut(key.as_str())
                .and_then(Value::as_sequence_mut)
                .and_then(|seq| seq.get_mut(*index))
            {
                *slot = new_value;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc() -> Value {
        serde_yaml::from_str(
            r#"
kind: Cluster
metadata:
  name: demo
spec:
  replicas: 3
  cidrBlocks:
    - 10.0.0.0/16
    - 10.1.0.0/16
  empty: null
"#,
        )
        .unwrap()
    }

    #[test]
    fn parse_splits_index_segments() {
        assert_eq!(
            parse("spec.cidrBlocks[1].name"),
            vec![
                Segment::Key("spec".into()),
                Segment::Indexed {
                    key: "cidrBlocks".into(),
                    index: 1
                },
                Segment::Key("name".into()),
            ]
        );
    }

    #[test]
    fn parse_keeps_malformed_index_as_key() {
        assert_eq!(parse("a[x]"), vec![Segment::Key("a[x]".into())]);
    }

    #[test]
    fn split_kind_requires_uppercase_head() {
        assert_eq!(split_kind("Cluster.metadata.name"), (Some("Cluster"), "metadata.name"));
        assert_eq!(split_kind("metadata.name"), (None, "metadata.name"));
        assert_eq!(split_kind("replicas"), (None, "replicas"));
    }

    #[test]
    fn read_resolves_nested_and_indexed() {
        let doc = doc();
        assert_eq!(read(&doc, "metadata.name"), Some(&Value::from("demo")));
        assert_eq!(read(&doc, "spec.cidrBlocks[1]"), Some(&Value::from("10.1.0.0/16")));
    }

    #[test]
    fn read_absent_paths_are_none() {
        let doc = doc();
        assert_eq!(read(&doc, "metadata.missing"), None);
        assert_eq!(read(&doc, "metadata.name.deeper"), None);
        assert_eq!(read(&doc, "spec.cidrBlocks[9]"), None);
        assert_eq!(read(&doc, "spec.empty"), None);
    }

    #[test]
    fn write_then_read_roundtrips() {
        let mut doc = doc();
        write(&mut doc, "metadata.name", Value::from("${CLUSTER_NAME}"));
        write(&mut doc, "spec.cidrBlocks[0]", Value::from("${CIDR}"));

        assert_eq!(read(&doc, "metadata.name"), Some(&Value::from("${CLUSTER_NAME}")));
        assert_eq!(read(&doc, "spec.cidrBlocks[0]"), Some(&Value::from("${CIDR}")));
    }

    #[test]
    fn write_with_missing_parent_is_ignored() {
        let mut doc = doc();
        let before = doc.clone();
        write(&mut doc, "status.phase.deep", Value::from("x"));
        assert_eq!(doc, before);
    }
}
