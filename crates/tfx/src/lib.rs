//! # tfx - terraform yaml extraction
//!
//! `tfx` takes generated Terraform files for cluster-api style clusters,
//! pulls the escaped YAML payloads out of them, writes the payloads as
//! standalone files and rewrites the Terraform to reference those files with
//! `file("...")` expressions. With templating enabled it additionally
//! extracts selected fields into `${VARIABLE}` placeholders and records the
//! original values in `overrides` blocks.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `tfx` works internally.
//!
//! ### Locating payloads
//!
//! The host file is never parsed as HCL. [`hcl_blocks`] finds the two
//! carrier blocks (`cloud_config`, `machine_pool`) with a keyword-plus-brace
//! pattern and cuts out their bodies with the brace counter in [`scan`]. The
//! payload literal behind `values =` / `node_pool_config =` is recovered
//! with a backslash-aware quote scanner and unescaped into plain YAML text.
//! Blocks that already reference an external file are skipped, so running
//! `tfx` over its own output changes nothing.
//!
//! ### Parsing payloads
//!
//! A payload is a `---`-separated stream of documents, not all of which are
//! valid YAML (cloud-init content tends to leak shell fragments).
//! [`yaml_docs`] runs every fragment through a chain of parse strategies,
//! strictest first, and keeps whatever still fails as a raw fragment. The
//! parsed documents and the raw fragments are correlated by position, never
//! by content.
//!
//! ### Templating
//!
//! [`template`] walks a rule list over the parsed documents. A rule is a
//! dotted path (optionally prefixed with a document kind) and a variable
//! name; the first document where the path resolves supplies the value and
//! receives the placeholder. One extra rule is derived at run time: when a
//! machine deployment and a machine template carry the same name they form
//! one logical pool, so the deployment name is templated with the template's
//! variable. Reads and writes at dotted paths live in [`yaml_path`]; both
//! treat missing structure as "no match", never as a failure.
//!
//! ### Reconstruction
//!
//! [`yaml_docs::reconstruct`] rebuilds the payload in original fragment
//! order: parsed fragments are replaced by the serialized (templated)
//! documents, raw fragments keep their text and get a best-effort regex
//! substitution for the known variable categories.
//!
//! ### Rewriting the host file
//!
//! [`processor`] ties it together per file: backup, output directory reset,
//! payload extraction, attribute replacement, overrides injection, and a
//! final bounded `terraform fmt` run via [`fmt`]. All rewriting is plain
//! text surgery so untouched spans survive byte-for-byte.

pub mod config;
pub mod fmt;
pub mod hcl_blocks;
pub mod processor;
pub mod scan;
pub mod template;
pub mod yaml_docs;
pub mod yaml_path;
