//! Multi-document YAML splitting, fallback parsing, and reconstruction.
//!
//! Payloads arrive as `---`-separated document streams. Every fragment is
//! run through an ordered chain of parse strategies, strictest first:
//!
//! 1. `strict`: the fragment parses to a tag-free top-level mapping.
//! 2. `untagged`: local tags (`!Ref`, ...) are stripped and their nodes
//!    coerced to the underlying scalar/sequence/mapping.
//! 3. `cleaned`: top-level lines shaped like hosts-file entries (bare IP or
//!    hostname pairs with no key separator) are commented out first. Such
//!    lines show up when shell snippets leak out of a block scalar.
//!
//! Whatever still fails stays a raw fragment: preserved verbatim apart from
//! the line-continuation fix and regex substitution in [`reconstruct`].
//! Reconstruction re-parses fragments with the same chain, so the parsed/raw
//! classification can never drift between the two passes.

use indexmap::IndexMap;
use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

static IP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+\s+").unwrap());
static HOST_PAIR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.-]+\s+[a-zA-Z0-9.-]+\s*$").unwrap());

static INFRA_REF_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(infrastructureRef:\s*\n(?:.*\n)*?\s*name:\s+)\S+").unwrap());
static TEMPLATE_METADATA_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(AWSMachineTemplate\s*\n.*?metadata:\s*\n.*?name:\s+)\S+").unwrap()
});
static DEPLOYMENT_METADATA_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(MachineDeployment\s*\n.*?metadata:\s*\n.*?name:\s+)\S+").unwrap()
});
static REPLICA_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(replicas:\s+)\d+").unwrap());

/// A payload split into parsed documents and raw fragments.
///
/// `fragments` holds every non-empty fragment verbatim; `documents` holds
/// the subset that parsed, in order. The two lists are correlated
/// positionally during reconstruction, not by content.
#[derive(Debug, Default)]
pub struct SplitPayload {
    pub documents: Vec<Value>,
    pub fragments: Vec<String>,
}

/// Splits `content` on document separators and parses each fragment.
pub fn split(content: &str) -> SplitPayload {
    let mut payload = SplitPayload::default();

    for fragment in content.split("---").map(str::trim) {
        if fragment.is_empty() {
            continue;
        }
        let position = payload.fragments.len() + 1;
        payload.fragments.push(fragment.to_string());

        match parse_fragment(fragment) {
            Some((doc, strategy)) => {
                tracing::debug!(fragment = position, strategy, "parsed document");
                payload.documents.push(doc);
            }
            None => tracing::debug!(fragment = position, "fragment kept raw"),
        }
    }

    payload
}

/// Runs the parse strategy chain over one fragment. Returns the parsed
/// document (always a mapping) and the name of the strategy that accepted
/// it.
fn parse_fragment(fragment: &str) -> Option<(Value, &'static str)> {
    if let Some(doc) = parse_strict(fragment) {
        return Some((doc, "strict"));
    }
    if let Some(doc) = parse_untagged(fragment) {
        return Some((doc, "untagged"));
    }
    if let Some(doc) = parse_strict(&comment_out_bare_lines(fragment)) {
        return Some((doc, "cleaned"));
    }
    None
}

fn parse_strict(fragment: &str) -> Option<Value> {
    let value = serde_yaml::from_str::<Value>(fragment).ok()?;
    if !value.is_mapping() || has_tags(&value) {
        return None;
    }
    Some(value)
}

fn parse_untagged(fragment: &str) -> Option<Value> {
    let value = serde_yaml::from_str::<Value>(fragment).ok()?;
    let value = untag(value);
    value.is_mapping().then_some(value)
}

fn has_tags(value: &Value) -> bool {
    match value {
        Value::Tagged(_) => true,
        Value::Mapping(mapping) => mapping.iter().any(|(k, v)| has_tags(k) || has_tags(v)),
        Value::Sequence(seq) => seq.iter().any(has_tags),
        _ => false,
    }
}

fn untag(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => untag(tagged.value),
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .map(|(key, value)| (untag(key), untag(value)))
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(untag).collect()),
        other => other,
    }
}

/// Comments out top-level lines with no key separator that look like hosts
/// entries. Indented lines are left alone: they may belong to a block
/// scalar.
fn comment_out_bare_lines(fragment: &str) -> String {
    fragment
        .split('\n')
        .map(|line| {
            let stripped = line.trim();
            let bare = !stripped.is_empty()
                && !stripped.contains(':')
                && !stripped.starts_with('-')
                && !stripped.starts_with('#');
            let suspicious = IP_LINE.is_match(stripped) || HOST_PAIR_LINE.is_match(stripped);
            let top_level = !line.starts_with([' ', '\t']);

            if bare && suspicious && top_level {
                format!("# {line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rebuilds payload text from templated documents and the original raw
/// fragments, in fragment order.
///
/// Fragments that parse are replaced by the serialized form of the next
/// unconsumed document (key order is preserved by the serializer). The rest
/// keep their original text, normalized for backslash line continuations and
/// run through best-effort variable substitution.
pub fn reconstruct(
    documents: &[Value],
    fragments: &[String],
    variables: &IndexMap<String, Value>,
) -> Result<String, serde_yaml::Error> {
    let mut parts = Vec::with_capacity(fragments.len());
    let mut consumed = 0;

    for fragment in fragments {
        if parse_fragment(fragment).is_some() && consumed < documents.len() {
            let rendered = serde_yaml::to_string(&documents[consumed])?;
            parts.push(rendered.trim_end().to_string());
            consumed += 1;
        } else {
            tracing::debug!("preserving raw fragment with best-effort substitution");
            let fixed = join_line_continuations(fragment);
            parts.push(substitute_raw(&fixed, variables));
        }
    }

    Ok(format!("---\n{}", parts.join("\n---\n")))
}

/// Collapses backslash-continued list items into a single quoted entry with
/// embedded literal `\n` sequences. Line-continued shell commands are not
/// valid YAML list items.
fn join_line_continuations(fragment: &str) -> String {
    let lines: Vec<&str> = fragment.split('\n').collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if !line.trim_end().ends_with('\\') {
            out.push(line.to_string());
            i += 1;
            continue;
        }

        let stripped = line.trim_start();
        let indent = line.len() - stripped.len();
        let head = stripped.strip_prefix("- ").unwrap_or(stripped).trim_end();
        let head = &head[..head.len() - 1];

        let mut parts = vec![head.trim().to_string()];
        i += 1;
        while i < lines.len() {
            let current = lines[i].trim();
            i += 1;
            if let Some(continued) = current.strip_suffix('\\') {
                parts.push(continued.to_string());
            } else {
                parts.push(current.to_string());
                break;
            }
        }

        let command = parts.join("\\n").replace('"', "\\\"");
        out.push(format!("{}- \"{}\"", " ".repeat(indent), command));
    }

    out.join("\n")
}

/// Regex-based substitution inside raw fragments, covering the two variable
/// categories that occur in practice: infrastructure/template name
/// references and replica counts.
fn substitute_raw(fragment: &str, variables: &IndexMap<String, Value>) -> String {
    let mut result = fragment.to_string();

    for name in variables.keys() {
        let placeholder = format!("${{{name}}}");

        match name.as_str() {
            "MACHINE_TEMPLATE_NAME" => {
                for pattern in [
                    &*INFRA_REF_NAME,
                    &*TEMPLATE_METADATA_NAME,
                    &*DEPLOYMENT_METADATA_NAME,
                ] {
                    result = pattern
                        .replace_all(&result, |caps: &regex::Captures| {
                            format!("{}{placeholder}", &caps[1])
                        })
                        .into_owned();
                }
            }
            "REPLICAS" => {
                result = REPLICA_COUNT
                    .replace_all(&result, |caps: &regex::Captures| {
                        format!("{}{placeholder}", &caps[1])
                    })
                    .into_owned();
            }
            _ => {}
        }
    }

    result
}
