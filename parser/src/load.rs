use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{DescriptorSet, FileDescriptor, ParseError, parse_proto_str};

/// Parses `inputs` plus everything they import and links the result.
///
/// Imports are looked up in `include_dirs` in order (the current directory
/// when none are given). Every file is named by its path relative to the
/// include directory it lives in, which is also how imports refer to it.
pub fn load_descriptor_set<P: AsRef<Path>>(
    inputs: &[P],
    include_dirs: &[PathBuf],
) -> Result<DescriptorSet, ParseError> {
    let include_dirs = if include_dirs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        include_dirs.to_vec()
    };

    let mut pending: VecDeque<(String, PathBuf)> = inputs
        .iter()
        .map(|p| {
            let path = p.as_ref();
            (file_name(path, &include_dirs), path.to_path_buf())
        })
        .collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut files: Vec<FileDescriptor> = Vec::new();

    while let Some((name, path)) = pending.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        let file = parse_proto_str(&name, &content)?;
        for import in &file.dependencies {
            if seen.contains(import) {
                continue;
            }
            let found = include_dirs
                .iter()
                .map(|dir| dir.join(import))
                .find(|candidate| candidate.is_file())
                .ok_or_else(|| ParseError::ImportNotFound {
                    import: import.clone(),
                    from: name.clone(),
                })?;
            pending.push_back((import.clone(), found));
        }
        files.push(file);
    }

    DescriptorSet::link(files)
}

// `./protos` and `protos` name the same directory; when the spellings still
// differ (`..`, symlinks) both sides are canonicalized.
fn file_name(path: &Path, include_dirs: &[PathBuf]) -> String {
    let lexical = without_cur_dir(path);
    let canonical = fs::canonicalize(path).ok();
    include_dirs
        .iter()
        .find_map(|dir| {
            if let Ok(rest) = lexical.strip_prefix(without_cur_dir(dir)) {
                return Some(rest.to_path_buf());
            }
            let dir = fs::canonicalize(dir).ok()?;
            canonical
                .as_deref()?
                .strip_prefix(dir)
                .ok()
                .map(Path::to_path_buf)
        })
        .unwrap_or(lexical)
        .to_string_lossy()
        .replace('\\', "/")
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
