//! External tool discovery.
//!
//! Resolves the compressors on `PATH` once, before anything touches the
//! filesystem. Required tools abort the run when missing; cwebp is optional
//! and only disables the WebP stage.
//!
//! | Tool | Role | Required |
//! |---|---|---|
//! | `pngquant` | lossy palette reduction | yes |
//! | `optipng` | lossless recompression | yes |
//! | `zopflipng` | brute-force deflate pass | yes |
//! | `cwebp` | WebP encoder for the grid search | no |

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("missing required tools: {}", .0.join(", "))]
pub struct MissingTools(pub Vec<&'static str>);

/// Every tool the pipeline may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Pngquant,
    Optipng,
    Zopflipng,
    Cwebp,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Pngquant, Tool::Optipng, Tool::Zopflipng, Tool::Cwebp];

    /// Executable name looked up on `PATH`.
    pub fn binary(self) -> &'static str {
        match self {
            Tool::Pngquant => "pngquant",
            Tool::Optipng => "optipng",
            Tool::Zopflipng => "zopflipng",
            Tool::Cwebp => "cwebp",
        }
    }

    pub fn is_required(self) -> bool {
        !matches!(self, Tool::Cwebp)
    }
}

/// Lookup result for a single tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub tool: Tool,
    pub path: Option<PathBuf>,
}

/// Resolved absolute paths of every installed tool.
///
/// Built once by [`Toolchain::detect`] and never mutated.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub pngquant: PathBuf,
    pub optipng: PathBuf,
    pub zopflipng: PathBuf,
    /// `None` when cwebp is not installed; the WebP stage is then skipped.
    pub cwebp: Option<PathBuf>,
}

impl Toolchain {
    /// Resolve all tools against the current process `PATH`.
    pub fn detect() -> Result<Self, MissingTools> {
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        Self::from_statuses(&check_tools(&path_var))
    }

    /// Build a toolchain from lookup results, failing if any required tool is absent.
    pub fn from_statuses(statuses: &[ToolStatus]) -> Result<Self, MissingTools> {
        let missing: Vec<&'static str> = statuses
            .iter()
            .filter(|s| s.tool.is_required() && s.path.is_none())
            .map(|s| s.tool.binary())
            .collect();
        if !missing.is_empty() {
            return Err(MissingTools(missing));
        }

        let find = |tool: Tool| {
            statuses
                .iter()
                .find(|s| s.tool == tool)
                .and_then(|s| s.path.clone())
        };
        let required = |tool: Tool| find(tool).ok_or(MissingTools(vec![tool.binary()]));

        Ok(Self {
            pngquant: required(Tool::Pngquant)?,
            optipng: required(Tool::Optipng)?,
            zopflipng: required(Tool::Zopflipng)?,
            cwebp: find(Tool::Cwebp),
        })
    }
}

/// Look up every [`Tool`] in the given `PATH`-style variable.
pub fn check_tools(path_var: &OsStr) -> Vec<ToolStatus> {
    Tool::ALL
        .iter()
        .map(|&tool| ToolStatus {
            tool,
            path: find_in_path(tool.binary(), path_var),
        })
        .collect()
}

/// Find the first executable named `name` in a `PATH`-style variable.
pub fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| candidates(&dir, name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(format!("{name}.exe")), dir.join(name)]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn install(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn finds_executable_in_second_path_entry() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let expected = install(b.path(), "pngquant", 0o755);
        let path_var = std::env::join_paths([a.path(), b.path()]).unwrap();

        assert_eq!(find_in_path("pngquant", &path_var), Some(expected));
    }

    #[test]
    fn ignores_non_executable_files() {
        let dir = TempDir::new().unwrap();
        install(dir.path(), "optipng", 0o644);
        let path_var = dir.path().as_os_str().to_owned();

        assert_eq!(find_in_path("optipng", &path_var), None);
    }

    #[test]
    fn first_match_wins() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let first = install(a.path(), "cwebp", 0o755);
        install(b.path(), "cwebp", 0o755);
        let path_var = std::env::join_paths([a.path(), b.path()]).unwrap();

        assert_eq!(find_in_path("cwebp", &path_var), Some(first));
    }

    #[test]
    fn missing_optional_tool_still_builds_toolchain() {
        let dir = TempDir::new().unwrap();
        for name in ["pngquant", "optipng", "zopflipng"] {
            install(dir.path(), name, 0o755);
        }
        let statuses = check_tools(dir.path().as_os_str());
        let toolchain = Toolchain::from_statuses(&statuses).unwrap();

        assert!(toolchain.cwebp.is_none());
        assert_eq!(toolchain.pngquant, dir.path().join("pngquant"));
    }

    #[test]
    fn missing_required_tools_are_all_reported() {
        let dir = TempDir::new().unwrap();
        install(dir.path(), "optipng", 0o755);
        install(dir.path(), "cwebp", 0o755);
        let statuses = check_tools(dir.path().as_os_str());

        let err = Toolchain::from_statuses(&statuses).unwrap_err();
        assert_eq!(err.0, vec!["pngquant", "zopflipng"]);
        assert_eq!(err.to_string(), "missing required tools: pngquant, zopflipng");
    }
}
