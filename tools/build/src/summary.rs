//! Rolling many per-build results up into reports.

use std::{collections::BTreeSet, fmt::Write as _, io, path::Path};

use indexmap::{IndexMap, IndexSet};
use miette::IntoDiagnostic as _;
use serde::{Deserialize, Serialize};
use size::Size;

use crate::{config::{Config, Versions}, result::BuildResult};

/// Suffix of per-build result files.
pub const RESULT_SUFFIX: &str = "-result.json";

/// Reads every result file under `dir`, in path order.
pub fn aggregate_results(dir: &Path) -> miette::Result<Vec<BuildResult>> {
    let mut results = vec![];
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.into_diagnostic()?;
        let is_result = entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(RESULT_SUFFIX);
        if is_result {
            results.push(BuildResult::read(entry.path())?);
        }
    }
    Ok(results)
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Stats {
    pub built: usize,
    /// Built, but only after memory was extended.
    pub built_ext: usize,
    pub failed: usize,
}

pub fn stats(results: &[BuildResult]) -> Stats {
    let mut s = Stats::default();
    for r in results {
        match (r.success, r.extended_memory) {
            (true, false) => s.built += 1,
            (true, true) => s.built_ext += 1,
            (false, _) => s.failed += 1,
        }
    }
    s
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum BuildStatus {
    #[serde(rename = "BUILT")]
    Built,
    #[serde(rename = "NOT BUILT")]
    NotBuilt,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SampleStatus {
    pub status: BuildStatus,
    pub extended_memory: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BoardEntry {
    pub arch: String,
    pub arch_bits: Option<u32>,
    pub name: String,
    pub soc: String,
    pub samples: IndexMap<String, SampleStatus>,
}

/// All results, keyed by platform.
pub type Collective = IndexMap<String, BoardEntry>;

/// Condenses a device-tree include chain into a short SoC description, e.g.
/// `Arm v7-m st/f4/stm32f429Xi`.
pub fn soc_info(chain: &[String]) -> String {
    let mut parts = chain.iter()
        .filter(|el| !el.contains("!skeleton"))
        .map(|el| el.trim_start_matches('!').to_string())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();

    let Some(last) = parts.last_mut() else {
        return String::new();
    };
    for (from, to) in [("arm/armv", "Arm v"), ("arm64/armv", "Arm v"), ("xtensa/xtensa", "Xtensa")] {
        if last.contains(from) {
            *last = last.replace(from, to);
        }
    }

    match parts.as_slice() {
        [only] => only.clone(),
        [first, .., last] => format!("{last} {first}"),
        [] => String::new(),
    }
}

/// Builds the per-platform view of all results.
///
/// Boards that share a display name get their revision appended, judged by
/// the results for the first configured sample.
pub fn collective_result(config: &Config, results: &[BuildResult]) -> Collective {
    let mut duplicates = BTreeSet::new();
    if let Some(first_sample) = config.samples.keys().next() {
        let mut names = BTreeSet::new();
        for r in results.iter().filter(|r| &r.sample_name == first_sample) {
            if !names.insert(&r.platform_full_name) {
                duplicates.insert(r.platform_full_name.clone());
            }
        }
    }

    let mut collective = Collective::new();
    for r in results {
        let entry = collective.entry(r.platform.clone()).or_insert_with(|| {
            let mut name = r.platform_full_name.clone();
            if duplicates.contains(&name) {
                name.push(' ');
                name.push_str(r.platform_revision.as_deref().unwrap_or_default());
            }
            BoardEntry {
                arch: r.arch.clone(),
                arch_bits: r.arch_bits,
                name,
                soc: soc_info(&r.dts_include_chain),
                samples: IndexMap::new(),
            }
        });
        entry.samples.insert(r.sample_name.clone(), SampleStatus {
            status: if r.success { BuildStatus::Built } else { BuildStatus::NotBuilt },
            extended_memory: r.extended_memory,
        });
    }
    collective
}

/// Writes `platform,sample,success,extended` rows, flags as 0/1.
pub fn write_minimal_csv(results: &[BuildResult], out: impl io::Write) -> miette::Result<()> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    for r in results {
        w.write_record([
            r.platform.as_str(),
            r.sample_name.as_str(),
            if r.success { "1" } else { "0" },
            if r.extended_memory { "1" } else { "0" },
        ]).into_diagnostic()?;
    }
    w.flush().into_diagnostic()
}

/// Writes `platform,name,soc,arch,arch_bits` rows, one per platform.
pub fn write_boards_csv(collective: &Collective, out: impl io::Write) -> miette::Result<()> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    for (platform, b) in collective {
        let bits = b.arch_bits.map(|n| n.to_string()).unwrap_or_default();
        w.write_record([platform.as_str(), b.name.as_str(), b.soc.as_str(), b.arch.as_str(), bits.as_str()])
            .into_diagnostic()?;
    }
    w.flush().into_diagnostic()
}

/// Groups results by sample, in order of first appearance, each group sorted
/// by platform.
pub fn process_sample_data(results: &[BuildResult]) -> IndexMap<&str, Vec<&BuildResult>> {
    let mut samples: IndexMap<&str, Vec<&BuildResult>> = IndexMap::new();
    for r in results {
        samples.entry(r.sample_name.as_str()).or_default().push(r);
    }
    for group in samples.values_mut() {
        group.sort_by(|a, b| a.platform.cmp(&b.platform));
    }
    samples
}

/// Renders the Markdown summary of a whole run.
pub fn render_markdown(
    config: &Config,
    versions: &Versions,
    stats: &Stats,
    samples: &IndexMap<&str, Vec<&BuildResult>>,
) -> miette::Result<String> {
    let mut md = String::new();
    writeln!(md, "# {} samples build summary\n", config.project_name).into_diagnostic()?;
    writeln!(md, "| Zephyr | Zephyr SDK | MicroPython |").into_diagnostic()?;
    writeln!(md, "|---|---|---|").into_diagnostic()?;
    writeln!(md, "| {} | {} | {} |\n", versions.zephyr, versions.sdk, versions.micropython).into_diagnostic()?;

    writeln!(md, "| Built | Built with extended memory | Failed |").into_diagnostic()?;
    writeln!(md, "|---|---|---|").into_diagnostic()?;
    writeln!(md, "| {} | {} | {} |", stats.built, stats.built_ext, stats.failed).into_diagnostic()?;

    for (sample, group) in samples {
        writeln!(md, "\n## {sample}\n").into_diagnostic()?;
        writeln!(md, "| Platform | Status | Extended memory | Memory |").into_diagnostic()?;
        writeln!(md, "|---|---|---|---|").into_diagnostic()?;
        for r in group {
            let status = if r.success { "BUILT" } else { "NOT BUILT" };
            let extended = if r.extended_memory { "yes" } else { "" };
            let memory = r.memory.as_ref()
                .map(|m| itertools::join(
                    m.iter().map(|(region, u)| format!(
                        "{region}: {} / {}",
                        Size::from_bytes(u.used),
                        Size::from_bytes(u.size),
                    )),
                    ", ",
                ))
                .unwrap_or_default();
            writeln!(
                md,
                "| {} (`{}`) | {status} | {extended} | {memory} |",
                r.platform_full_name, r.platform,
            ).into_diagnostic()?;
        }
    }
    Ok(md)
}
