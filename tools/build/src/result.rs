//! The per-build result record, written as JSON next to the artifacts and
//! aggregated later into summaries.

use std::path::Path;

use indexmap::IndexMap;
use miette::{Context as _, IntoDiagnostic as _};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct MemoryUsage {
    pub used: u64,
    /// Size of the region. When memory was extended this is the size before
    /// extension, so `used` may exceed it.
    pub size: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BuildResult {
    /// Sanitized board identifier.
    pub platform: String,
    /// Board identifier as given to the build tool.
    #[serde(default)]
    pub platform_original: String,
    pub sample_name: String,
    pub success: bool,
    pub extended_memory: bool,
    #[serde(default)]
    pub configs: Option<Vec<String>>,
    #[serde(default)]
    pub zephyr_sha: String,
    #[serde(default)]
    pub zephyr_sdk: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch_bits: Option<u32>,
    pub platform_full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_revision: Option<String>,
    #[serde(default)]
    pub board_dir: String,
    #[serde(default)]
    pub memory: Option<IndexMap<String, MemoryUsage>>,
    #[serde(default)]
    pub dts_include_chain: Vec<String>,
}

impl BuildResult {
    pub fn write(&self, path: &Path) -> miette::Result<()> {
        let text = serde_json::to_string(self).into_diagnostic()?;
        std::fs::write(path, text)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't write result to {}", path.display()))
    }

    pub fn read(path: &Path) -> miette::Result<Self> {
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't read result {}", path.display()))?;
        serde_json::from_str(&text)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't parse result {}", path.display()))
    }
}

/// Reads the lines of a Kconfig fragment that actually set something.
///
/// Returns `None` if the file doesn't exist.
pub fn config_fragment_lines(path: &Path) -> miette::Result<Option<Vec<String>>> {
    if !std::fs::exists(path).into_diagnostic()? {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("can't read {}", path.display()))?;
    Ok(Some(
        text.lines()
            .filter(|l| !l.starts_with('#'))
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}
