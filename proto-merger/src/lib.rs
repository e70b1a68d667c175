//! Merges one root `.proto` file and every type it depends on into a single
//! self-contained schema file.
//!
//! The input is a linked [`DescriptorSet`] from the `parser` crate. The
//! merge computes the closure of types reachable from the root file's own
//! definitions, its service methods and any extra types named in
//! [`MergeOptions`], then renders them with flattened names and their source
//! comments.

mod comments;
pub mod config;
mod emit;
mod index;
mod qualify;
mod resolve;

use std::path::{Path, PathBuf};

use parser::{DescriptorSet, load_descriptor_set};
use thiserror::Error;
use tracing::info;

pub use config::{ConfigError, MergeOptions};
pub use index::{DescriptorIndex, EnumId, MessageId};
pub use qualify::Qualifier;
pub use resolve::{Closure, resolve};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("root file {0} is not part of the descriptor set")]
    RootFileNotFound(String),

    /// A configured additional message does not exist.
    #[error("message {0} not found")]
    MissingMessage(String),

    /// A configured additional enum does not exist.
    #[error("enum {0} not found")]
    MissingEnum(String),

    #[error("type {type_name} referenced by {referenced_by} not found")]
    UnresolvedReference {
        type_name: String,
        referenced_by: String,
    },

    #[error("type {0} is defined more than once")]
    DuplicateDefinition(String),
}

/// Errors of the file based entry point: loading the sources or merging them.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("parse error: {0}")]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Final path segment of the root file's name.
    pub name: String,
    pub content: String,
}

/// Merge the root file named by `options.main_proto` with its dependencies.
pub fn merge(set: &DescriptorSet, options: &MergeOptions) -> Result<GeneratedFile, MergeError> {
    let root = set
        .file(&options.main_proto)
        .ok_or_else(|| MergeError::RootFileNotFound(options.main_proto.clone()))?;
    let index = DescriptorIndex::new(set)?;
    let closure = resolve(&index, root, options)?;
    let qualifier = Qualifier::new(&options.omit_package_name);
    let content = emit::render(root, &index, &closure, &qualifier)?;

    info!(
        root = %root.name,
        messages = closure.messages.len(),
        enums = closure.enums.len(),
        "merged"
    );
    Ok(GeneratedFile {
        name: last_part(&root.name, '/').to_string(),
        content,
    })
}

/// Load `.proto` files from disk, following imports, and merge them.
pub fn merge_proto_files<P: AsRef<Path>>(
    inputs: &[P],
    include_dirs: &[PathBuf],
    options: &MergeOptions,
) -> Result<GeneratedFile, GenerateError> {
    let set = load_descriptor_set(inputs, include_dirs)?;
    Ok(merge(&set, options)?)
}

fn last_part(s: &str, split: char) -> &str {
    s.rsplit_once(split).map_or(s, |(_, last)| last)
}
