//! Editing a west manifest.

use std::path::Path;

use miette::{bail, Context as _, IntoDiagnostic as _};
use serde_yaml::Value;

/// Points the `zephyr` project of the manifest text at `revision`. Key order
/// is preserved.
pub fn set_zephyr_revision_in(text: &str, revision: &str) -> miette::Result<String> {
    let mut doc: Value = serde_yaml::from_str(text).into_diagnostic()?;
    let Some(projects) = doc.get_mut("manifest")
        .and_then(|m| m.get_mut("projects"))
        .and_then(Value::as_sequence_mut)
    else {
        bail!("manifest has no project list");
    };

    let Some(zephyr) = projects.iter_mut()
        .find(|p| p.get("name").and_then(Value::as_str) == Some("zephyr"))
    else {
        bail!("manifest has no zephyr project");
    };
    let Some(zephyr) = zephyr.as_mapping_mut() else {
        bail!("zephyr project entry is not a mapping");
    };
    zephyr.insert(Value::from("revision"), Value::from(revision));

    serde_yaml::to_string(&doc).into_diagnostic()
}

pub fn set_zephyr_revision(path: &Path, revision: &str) -> miette::Result<()> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("can't read {}", path.display()))?;
    let updated = set_zephyr_revision_in(&text, revision)
        .wrap_err_with(|| format!("can't update {}", path.display()))?;
    std::fs::write(path, updated)
        .into_diagnostic()
        .wrap_err_with(|| format!("can't write {}", path.display()))
}
