//! Comparing two collective results, e.g. from consecutive runs.
//!
//! The earlier result is usually the one published by the last release, which
//! [`fetch_published`] retrieves.

use std::{collections::BTreeSet, fmt::Display, path::Path};

use indexmap::IndexMap;
use miette::{Context as _, IntoDiagnostic as _};

use crate::summary::{BuildStatus, Collective, SampleStatus};

/// Status of one sample on one target before and after.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Change {
    pub before: Option<SampleStatus>,
    pub after: Option<SampleStatus>,
}

#[derive(Clone, Debug, Default)]
pub struct SampleDiff {
    pub changed: IndexMap<String, Change>,
    /// Targets that now have a status and didn't before.
    pub added: IndexMap<String, Change>,
    /// Targets that had a status and no longer do.
    pub removed: IndexMap<String, Change>,
}

impl SampleDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Change)> {
        self.changed.iter().chain(&self.added).chain(&self.removed)
    }
}

/// URL of the collective result published for `version`.
pub fn published_result_url(base: &str, version: &str) -> String {
    format!("{}/{version}/result.json", base.trim_end_matches('/'))
}

/// Downloads a published collective result. Without a `version`, the one
/// named by the `latest` pointer under `base` is used.
pub fn fetch_published(base: &str, version: Option<&str>) -> Result<Collective, reqwest::Error> {
    let client = reqwest::blocking::Client::new();
    let version = match version {
        Some(v) => v.to_string(),
        None => {
            let latest = format!("{}/latest", base.trim_end_matches('/'));
            client.get(latest).send()?.error_for_status()?.text()?.trim().to_string()
        }
    };
    client.get(published_result_url(base, &version))
        .send()?
        .error_for_status()?
        .json()
}

pub fn load_collective(path: &Path) -> miette::Result<Collective> {
    let text = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("can't read {}", path.display()))?;
    serde_json::from_str(&text)
        .into_diagnostic()
        .wrap_err_with(|| format!("can't parse {}", path.display()))
}

/// Lists the targets whose status for `sample` differs between `before` and
/// `after`, in target name order.
pub fn sample_diff(sample: &str, before: &Collective, after: &Collective) -> SampleDiff {
    let status = |c: &Collective, target: &str| {
        c.get(target).and_then(|b| b.samples.get(sample)).cloned()
    };
    let targets = before.keys().chain(after.keys()).collect::<BTreeSet<_>>();

    let mut diff = SampleDiff::default();
    for target in targets {
        let change = Change {
            before: status(before, target),
            after: status(after, target),
        };
        if change.before == change.after {
            continue;
        }
        let category = match (&change.before, &change.after) {
            (None, _) => &mut diff.added,
            (_, None) => &mut diff.removed,
            _ => &mut diff.changed,
        };
        category.insert(target.clone(), change);
    }
    diff
}

struct ShowStatus<'a>(&'a Option<SampleStatus>);

impl Display for ShowStatus<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            None => f.write_str("none"),
            Some(s) => {
                f.write_str(match s.status {
                    BuildStatus::Built => "BUILT",
                    BuildStatus::NotBuilt => "NOT BUILT",
                })?;
                if s.extended_memory {
                    f.write_str(" (extended memory)")?;
                }
                Ok(())
            }
        }
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", ShowStatus(&self.before), ShowStatus(&self.after))
    }
}
