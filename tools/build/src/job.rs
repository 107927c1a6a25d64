//! One unit of CI work: build a sample for a board, publish what came out,
//! and record the result.

use std::path::{Component, Path, PathBuf};

use miette::{Context as _, IntoDiagnostic as _};

use crate::{
    artifacts,
    boards::{self, Identifier},
    config::{Config, FormatArgs, Versions},
    maybe_create_dir,
    result::{config_fragment_lines, BuildResult},
    sample::{SampleBuilder, CUSTOM_OVERLAY},
    sanitize_lower,
    verbose::{banner, memory_table},
    west::BuildRunner,
};

/// Artifact names of the SBOM files collected into the archive.
const SBOM_ARTIFACTS: &[&str] = &["sbom-app", "sbom-zephyr", "sbom-build"];

/// Where a job finds its inputs.
#[derive(Clone, Debug)]
pub struct JobSpec<'a> {
    /// Directory of the board in the Zephyr tree, as produced by `pairs`.
    pub board_dir: &'a Path,
    /// Board identifier as understood by `west`.
    pub board: &'a str,
    pub sample: &'a str,
    /// Directory holding `configs/` and `overlays/`.
    pub base: &'a Path,
    /// Bound on rebuilds while recovering from memory overflow.
    pub max_attempts: Option<usize>,
}

/// Builds and publishes one board/sample pair.
///
/// Returns the result record, or `None` if the board has no YAML description
/// and was skipped after building.
pub fn run_job<R: BuildRunner>(
    config: &Config,
    versions: &Versions,
    runner: R,
    job: &JobSpec<'_>,
) -> miette::Result<Option<BuildResult>> {
    let sample_def = config.sample(job.sample)?;
    let sample_path = config.sample_path(sample_def)?;
    let workspace = config.sample_workspace(sample_def);

    let mut builder = SampleBuilder::new(runner, job.board, &sample_path, workspace)?;
    builder.kconfig = sample_def.kconfig.clone();
    builder.max_attempts = job.max_attempts;

    let conf_file = job.base.join("configs").join(format!("{}.conf", job.sample));
    if conf_file.exists() {
        let conf_file = absolute(&conf_file)?;
        builder.args.insert("config".to_string(), format!("-DCONF_FILE={}", conf_file.display()));
    }
    if let Some(extra) = &sample_def.extra_args {
        builder.args.insert("extra_args".to_string(), extra.clone());
    }

    let board_overlay = job.base.join("overlays").join(format!("{}.overlay", job.board));
    if board_overlay.exists() {
        builder.overlays.insert(CUSTOM_OVERLAY.to_string(), absolute(&board_overlay)?);
    }

    let outcome = builder.build_sample()?;

    let board_sanitized = sanitize_lower(job.board);
    let format_args = FormatArgs {
        board_name: board_sanitized.clone(),
        sample_name: job.sample.to_string(),
    };

    let dest = PathBuf::from(format!("{}{board_sanitized}/{}", config.artifact_prefix, job.sample));
    let original_dts = if builder.dts_modified() { builder.original_dts() } else { None };
    artifacts::copy_artifacts(&dest, job.sample, builder.log_path(), original_dts, &outcome.artifacts)
        .into_diagnostic()
        .wrap_err_with(|| format!("can't publish artifacts to {}", dest.display()))?;

    let Some((yaml_path, yaml)) = boards::find_board_yaml(job.board_dir, job.board) else {
        banner(format!("Skipping target due to missing YAML file: {}", job.board));
        return Ok(None);
    };
    let arch = yaml.arch.clone().unwrap_or_default();

    let memory = builder.memory_usage(&outcome)?;
    if let Some(m) = &memory {
        memory_table(m);
    }

    let arch_bits = match outcome.artifacts.get("elf") {
        Some(elf) => artifacts::elf_class_bits(elf).into_diagnostic()?,
        None => None,
    };
    let revision = Identifier::parse(job.board).revision;
    let dts_include_chain = boards::board_dts(job.board_dir, job.board, &yaml_path)
        .map(|dts| boards::dts_include_chain(&config.project_path, &arch, &dts))
        .unwrap_or_default();

    let result = BuildResult {
        platform: board_sanitized,
        platform_original: job.board.to_string(),
        sample_name: job.sample.to_string(),
        success: outcome.succeeded,
        extended_memory: outcome.extended_memory,
        configs: if builder.args.is_empty() { None } else { config_fragment_lines(&conf_file)? },
        zephyr_sha: versions.zephyr.clone(),
        zephyr_sdk: versions.sdk.clone(),
        arch,
        arch_bits,
        platform_full_name: yaml.full_name(),
        platform_revision: (!revision.is_empty()).then(|| revision.to_string()),
        board_dir: relative_board_dir(job.board_dir),
        memory,
        dts_include_chain,
    };

    banner(if result.success { "Success!" } else { "Fail!" });

    let result_path = config.artifact_path("result", &format_args)?;
    ensure_parent(&result_path)?;
    result.write(&result_path)?;

    if result.success {
        let elf = config.artifact_path("elf", &format_args)?;
        let checksum = config.artifact_path("elf-sha256", &format_args)?;
        ensure_parent(&checksum)?;
        artifacts::write_checksum(&elf, &checksum)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't checksum {}", elf.display()))?;

        let zip_path = config.artifact_path("zip-sbom", &format_args)?;
        let sboms = SBOM_ARTIFACTS.iter()
            .map(|name| config.artifact_path(name, &format_args))
            .collect::<miette::Result<Vec<_>>>()?;
        ensure_parent(&zip_path)?;
        artifacts::create_archive(&zip_path, sboms.iter().map(PathBuf::as_path))
            .into_diagnostic()
            .wrap_err_with(|| format!("can't write {}", zip_path.display()))?;
    }

    Ok(Some(result))
}

/// The board directory without the leading `<workspace>/<project>` part.
fn relative_board_dir(board_dir: &Path) -> String {
    let parts = board_dir.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .skip(2)
        .collect::<Vec<_>>();
    parts.join("/")
}

fn absolute(path: &Path) -> miette::Result<PathBuf> {
    std::path::absolute(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("can't make {} absolute", path.display()))
}

fn ensure_parent(path: &Path) -> miette::Result<()> {
    if let Some(parent) = path.parent() {
        maybe_create_dir(parent)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't create {}", parent.display()))?;
    }
    Ok(())
}
