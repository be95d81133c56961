//! patito.toml manifest parsing.

use patito_syntax::segment::{MemoryLayout, MAX_SEGMENT_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "patito.toml";
pub const DEFAULT_ENTRY: &str = "main.pat";
pub use patito_syntax::segment::DEFAULT_SEGMENT_SIZE;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid {path}: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("failed to encode manifest: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub package: Package,
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub vm: VmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default = "default_entry")]
    pub entry: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default = "default_segment_size")]
    pub segment_size: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VmConfig {
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

fn default_entry() -> String {
    DEFAULT_ENTRY.to_string()
}

fn default_segment_size() -> u32 {
    DEFAULT_SEGMENT_SIZE
}

fn default_max_call_depth() -> usize {
    DEFAULT_MAX_CALL_DEPTH
}

impl Manifest {
    /// Manifest for a fresh project.
    pub fn new(name: &str) -> Self {
        Self {
            package: Package {
                name: name.to_string(),
                version: "0.1.0".to_string(),
                entry: default_entry(),
            },
            compiler: CompilerConfig::default(),
            vm: VmConfig::default(),
        }
    }

    pub fn to_toml(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string(self)?)
    }
}

pub fn parse_manifest(text: &str, path: &Path) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = toml::from_str(text).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if MemoryLayout::checked(manifest.compiler.segment_size).is_none() {
        return Err(ManifestError::Invalid {
            path: path.to_path_buf(),
            message: format!("compiler.segment_size must be between 1 and {}", MAX_SEGMENT_SIZE),
        });
    }
    if manifest.vm.max_call_depth == 0 {
        return Err(ManifestError::Invalid {
            path: path.to_path_buf(),
            message: "vm.max_call_depth must be positive".to_string(),
        });
    }
    Ok(manifest)
}

pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&text, path)
}

/// Project root for a path: the nearest ancestor (or the path itself) holding patito.toml.
pub fn find_project_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|p| p.join(MANIFEST_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Root and manifest of the project containing `path`, if there is one.
pub fn discover(path: &Path) -> Result<Option<(PathBuf, Manifest)>, ManifestError> {
    match find_project_root(path) {
        Some(root) => {
            let manifest = load_manifest(&root.join(MANIFEST_FILE))?;
            Ok(Some((root, manifest)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Manifest, ManifestError> {
        parse_manifest(text, Path::new("patito.toml"))
    }

    #[test]
    fn minimal_manifest_uses_defaults() {
        let m = parse("[package]\nname = \"demo\"\nversion = \"0.1.0\"\n").unwrap();
        assert_eq!(m.package.entry, "main.pat");
        assert_eq!(m.compiler.segment_size, 1000);
        assert_eq!(m.vm.max_call_depth, 1024);
    }

    #[test]
    fn sections_override_defaults() {
        let m = parse(
            r#"
[package]
name = "demo"
version = "0.2.0"
entry = "src/app.pat"

[compiler]
segment_size = 500

[vm]
max_call_depth = 64
"#,
        )
        .unwrap();
        assert_eq!(m.package.entry, "src/app.pat");
        assert_eq!(m.compiler.segment_size, 500);
        assert_eq!(m.vm.max_call_depth, 64);
    }

    #[test]
    fn rejects_zero_sizes() {
        let err = parse("[package]\nname = \"d\"\nversion = \"0\"\n[compiler]\nsegment_size = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("segment_size must be between 1 and"));
    }

    #[test]
    fn rejects_segment_size_past_the_address_space() {
        let text = "[package]\nname = \"d\"\nversion = \"0\"\n[compiler]\nsegment_size = 400000000\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { .. }));
        let largest = format!(
            "[package]\nname = \"d\"\nversion = \"0\"\n[compiler]\nsegment_size = {}\n",
            MAX_SEGMENT_SIZE
        );
        assert_eq!(parse(&largest).unwrap().compiler.segment_size, MAX_SEGMENT_SIZE);
    }

    #[test]
    fn missing_package_is_a_parse_error() {
        assert!(matches!(
            parse("[vm]\nmax_call_depth = 3\n"),
            Err(ManifestError::Parse { .. })
        ));
    }

    #[test]
    fn new_manifest_round_trips() {
        let m = Manifest::new("hello");
        let text = m.to_toml().unwrap();
        assert!(text.contains("name = \"hello\""));
        assert_eq!(parse(&text).unwrap(), m);
    }

    #[test]
    fn finds_nearest_ancestor() {
        let base = std::env::temp_dir().join(format!("patito_pkg_test_{}", std::process::id()));
        let nested = base.join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            base.join(MANIFEST_FILE),
            Manifest::new("anc").to_toml().unwrap(),
        )
        .unwrap();

        assert_eq!(find_project_root(&nested.join("x.pat")), Some(base.clone()));
        let (root, manifest) = discover(&nested).unwrap().unwrap();
        assert_eq!(root, base);
        assert_eq!(manifest.package.name, "anc");

        let _ = std::fs::remove_dir_all(&base);
    }
}
