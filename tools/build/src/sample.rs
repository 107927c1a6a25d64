//! Building one sample for one board.
//!
//! A [`SampleBuilder`] owns everything a single build session touches: a
//! scratch directory for the log, device-tree snapshots and generated
//! overlays, and the build directory itself. Both directories are removed
//! when the builder is dropped, however the session ended.
//!
//! If the build fails because the image doesn't fit, the builder hands the
//! failure to [`zsb_overflow::recover`], acting as its [`Rebuild`] host: each
//! step writes a fresh overlay with the enlarged memory nodes and builds
//! again with it layered over any board overlay.

use std::{fs, io::{ErrorKind, Write as _}, path::{Path, PathBuf}};

use indexmap::IndexMap;
use miette::{Context as _, IntoDiagnostic as _};
use tempfile::TempDir;
use zsb_overflow::{
    diag, dts, overlay, BuildAttempt, Growth, MemoryRegion, Rebuild, Recovery,
    RecoveryOutcome, ResolveError, ResolvedNode, Stop,
};

use crate::{
    result::MemoryUsage,
    verbose::simple_table,
    west::{BuildRequest, BuildRunner, BuildStage, RunOutput, WestCommand},
};

/// Build products we collect, by name, relative to the build directory.
pub const ARTIFACTS: &[(&str, &str)] = &[
    ("elf", "zephyr/zephyr.elf"),
    ("dts", "zephyr/zephyr.dts"),
    ("config", "zephyr/.config"),
    ("spdx_app", "spdx/app.spdx"),
    ("spdx_build", "spdx/build.spdx"),
    ("spdx_zephyr", "spdx/zephyr.spdx"),
];

/// Intermediate link products that are never the final image.
const PRELINK_ELVES: &[&str] = &["zephyr_pre0.elf", "zephyr_pre1.elf"];

/// Overlay key for a board-specific overlay from the project.
pub const CUSTOM_OVERLAY: &str = "custom";
/// Overlay key for the generated memory overlay.
pub const MEMORY_OVERLAY: &str = "memory";

/// Final state of one build session.
#[derive(Debug)]
pub struct BuildOutcome {
    pub succeeded: bool,
    /// At least one build ran with enlarged memory nodes.
    pub extended_memory: bool,
    /// Existing build products, pointing into the builder's build directory.
    pub artifacts: IndexMap<String, PathBuf>,
    /// Why overflow recovery gave up, if it ran and did.
    pub stop: Option<Stop>,
    /// Memory nodes at the sizes used by the last build.
    pub regions: Vec<MemoryRegion>,
    /// Everything the build tool printed during the session.
    pub log: String,
}

pub struct SampleBuilder<R> {
    runner: R,
    platform: String,
    sample_path: PathBuf,
    workspace: PathBuf,

    /// Groups of extra build arguments, each a whitespace-separated string.
    pub args: IndexMap<String, String>,
    /// Device-tree overlays, applied in insertion order.
    pub overlays: IndexMap<String, PathBuf>,
    /// Lines that must appear in the generated `.config`.
    pub kconfig: Vec<String>,
    /// Bound on rebuilds during overflow recovery.
    pub max_attempts: Option<usize>,

    build_dir: TempDir,
    scratch: TempDir,
    log_path: PathBuf,
    dts_original: PathBuf,
    dts_original_saved: bool,
    /// The last build used overlays, so its device tree isn't the board's own.
    dts_modified: bool,
    overlay_count: usize,
}

impl<R: BuildRunner> SampleBuilder<R> {
    pub fn new(
        runner: R,
        platform: &str,
        sample_path: &Path,
        workspace: &Path,
    ) -> miette::Result<Self> {
        let build_dir = tempfile::Builder::new()
            .prefix("zsb-build-")
            .tempdir()
            .into_diagnostic()
            .wrap_err("can't create build directory")?;
        let scratch = tempfile::Builder::new()
            .prefix("zsb-session-")
            .tempdir()
            .into_diagnostic()
            .wrap_err("can't create session directory")?;

        let log_path = scratch.path().join("build.log");
        fs::File::create(&log_path).into_diagnostic()?;
        let dts_original = scratch.path().join("zephyr.dts.orig");

        println!("Build dir: {}", build_dir.path().display());

        Ok(Self {
            runner,
            platform: platform.to_string(),
            sample_path: sample_path.to_path_buf(),
            workspace: workspace.to_path_buf(),
            args: IndexMap::new(),
            overlays: IndexMap::new(),
            kconfig: vec![],
            max_attempts: Some(zsb_overflow::DEFAULT_MAX_ATTEMPTS),
            build_dir,
            scratch,
            log_path,
            dts_original,
            dts_original_saved: false,
            dts_modified: false,
            overlay_count: 0,
        })
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn build_dir(&self) -> &Path {
        self.build_dir.path()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn dts_modified(&self) -> bool {
        self.dts_modified
    }

    /// The device tree as the board defines it, without any overlays, if we
    /// managed to capture one.
    pub fn original_dts(&self) -> Option<&Path> {
        self.dts_original_saved.then_some(self.dts_original.as_path())
    }

    /// Builds the sample, recovering from memory overflow if needed.
    ///
    /// A failed build is a normal outcome. `Err` is reserved for problems
    /// running the session itself, like being unable to spawn the build tool.
    pub fn build_sample(&mut self) -> miette::Result<BuildOutcome> {
        if !self.overlays.is_empty() {
            println!("This board specifies a DT overlay file. Performing a clean build to preserve original DTS");
            self.build(BuildStage::PrepareOnly, true)?;
            if let Some(dts) = self.artifacts().get("dts").cloned() {
                self.preserve_original_dts(&dts)?;
            }
        }

        let first = self.build(BuildStage::Full, false)?;
        let recovery = if first.succeeded {
            None
        } else {
            Some(self.check_extend_memory(first)?)
        };

        let artifacts = self.artifacts();
        let succeeded = artifacts.contains_key("elf") && self.check_kconfig_requirements(&artifacts)?;

        let (extended_memory, stop, regions) = match recovery {
            None => (false, None, vec![]),
            Some(r) => {
                let extended = r.memory_extended();
                let stop = match r.outcome {
                    RecoveryOutcome::Recovered => None,
                    RecoveryOutcome::Stopped(stop) => Some(stop),
                };
                (extended, stop, r.regions)
            }
        };

        let log = fs::read_to_string(&self.log_path).into_diagnostic()?;
        Ok(BuildOutcome {
            succeeded,
            extended_memory,
            artifacts,
            stop,
            regions,
            log,
        })
    }

    /// Retrieves the paths of all build products that currently exist.
    pub fn artifacts(&self) -> IndexMap<String, PathBuf> {
        let mut artifacts = IndexMap::new();
        for (name, rel) in ARTIFACTS {
            let path = self.build_dir.path().join(rel);
            if path.exists() {
                artifacts.insert(name.to_string(), path);
            }
        }

        // Some platforms name the image differently (e.g. app-core builds
        // of dual-core parts).
        if !artifacts.contains_key("elf") {
            if let Some(candidate) = self.find_elf_file() {
                println!("zephyr.elf not found! Trying to use: {}", candidate.display());
                artifacts.insert("elf".to_string(), candidate);
            }
        }
        artifacts
    }

    /// Memory usage reported by the linker, if the build succeeded.
    ///
    /// When memory was extended, `FLASH` and `RAM` sizes are the node sizes
    /// from the original device tree rather than the enlarged ones.
    pub fn memory_usage(&self, outcome: &BuildOutcome) -> miette::Result<Option<IndexMap<String, MemoryUsage>>> {
        if !outcome.succeeded {
            return Ok(None);
        }
        let log = fs::read_to_string(&self.log_path).into_diagnostic()?;
        let mut usage = IndexMap::new();
        for line in diag::memory_usage(&log) {
            usage.insert(line.region, MemoryUsage {
                used: line.used,
                size: line.size,
            });
        }

        if let (true, Some(original)) = (self.overlays.contains_key(MEMORY_OVERLAY), self.original_dts()) {
            for region in ["FLASH", "RAM"] {
                let Some(u) = usage.get_mut(region) else {
                    continue;
                };
                if let Ok(node) = dts::resolve_region(region, original) {
                    u.size = node.size;
                }
            }
        }
        Ok(Some(usage))
    }

    fn run(&mut self, cmd: &WestCommand) -> miette::Result<RunOutput> {
        let out = self.runner.run(cmd)?;
        let mut log = fs::OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .into_diagnostic()?;
        log.write_all(out.output.as_bytes()).into_diagnostic()?;
        Ok(out)
    }

    fn build(&mut self, stage: BuildStage, disable_overlays: bool) -> miette::Result<BuildAttempt> {
        self.dts_modified = !self.overlays.is_empty() && !disable_overlays;

        let words = self.args.values()
            .flat_map(|a| a.split_whitespace())
            .map(str::to_string)
            .collect::<Vec<_>>();
        let overlays = if disable_overlays {
            vec![]
        } else {
            self.overlays.values().cloned().collect::<Vec<_>>()
        };

        let sample = self.sample_path.display().to_string();
        let joined_args = words.join(" ");
        let joined_overlays = itertools::join(overlays.iter().map(|p| p.display()), "\n");
        simple_table([
            ("Board", self.platform.as_str()),
            ("Sample", sample.as_str()),
            ("Args", joined_args.as_str()),
            ("Overlays", joined_overlays.as_str()),
            ("Stage", match stage {
                BuildStage::PrepareOnly => "cmake only",
                BuildStage::Full => "full",
            }),
        ]);

        // SBOM files are only regenerated in a fresh build directory.
        match fs::remove_dir_all(self.build_dir.path()) {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::NotFound => (),
            Err(e) => return Err(e).into_diagnostic()
                .wrap_err_with(|| format!("can't clear {}", self.build_dir.path().display())),
        }

        let build_dir = self.build_dir.path().to_path_buf();
        let cmd = WestCommand::build(&self.workspace, &BuildRequest {
            board: &self.platform,
            build_dir: &build_dir,
            sample_path: &self.sample_path,
            args: &words,
            overlays: &overlays,
            pristine: true,
            stage,
        });

        let out = match stage {
            BuildStage::PrepareOnly => self.run(&cmd)?,
            BuildStage::Full => {
                self.run(&WestCommand::spdx_init(&self.workspace, &build_dir))?;
                let out = self.run(&cmd)?;
                self.run(&WestCommand::spdx(&self.workspace, &build_dir))?;
                out
            }
        };
        Ok(BuildAttempt::new(!out.failed, out.output))
    }

    /// Saves `dts` as the original device tree, unless the last build applied
    /// overlays to it.
    fn preserve_original_dts(&mut self, dts: &Path) -> miette::Result<()> {
        if self.dts_modified {
            return Ok(());
        }
        println!("Preserving original DTS file at {}", dts.display());
        fs::copy(dts, &self.dts_original)
            .into_diagnostic()
            .wrap_err_with(|| format!("copying {} to {}", dts.display(), self.dts_original.display()))?;
        self.dts_original_saved = true;
        Ok(())
    }

    fn check_extend_memory(&mut self, failed: BuildAttempt) -> miette::Result<Recovery> {
        let Some(dts) = self.artifacts().get("dts").cloned() else {
            println!("Build failed. DTS file is not present. Aborting!");
            return Ok(Recovery {
                outcome: RecoveryOutcome::Stopped(Stop::MissingDeviceTree),
                regions: vec![],
                rebuilds: 0,
                last: failed,
            });
        };

        // Node sizes are always taken from this first failed build, so that
        // growth never compounds on top of an earlier overlay.
        let baseline = self.scratch.path().join("baseline.dts");
        fs::copy(&dts, &baseline).into_diagnostic()?;

        let max_attempts = self.max_attempts;
        let mut host = RecoveryHost {
            builder: self,
            baseline,
        };
        let recovery = zsb_overflow::recover(&mut host, failed, max_attempts)?;

        if let RecoveryOutcome::Stopped(stop) = &recovery.outcome {
            println!("Build failed. {stop}. Aborting!");
        }
        Ok(recovery)
    }

    fn check_kconfig_requirements(&self, artifacts: &IndexMap<String, PathBuf>) -> miette::Result<bool> {
        if self.kconfig.is_empty() {
            return Ok(true);
        }
        let Some(config_path) = artifacts.get("config") else {
            println!("No .config produced, can't check Kconfig requirements");
            return Ok(false);
        };
        let text = fs::read_to_string(config_path)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't read {}", config_path.display()))?;

        let mut ok = true;
        for symbol in &self.kconfig {
            let found = text.lines().any(|l| l == symbol);
            println!(
                "Checking for {symbol} in {}... {}",
                config_path.display(),
                if found { "Found!" } else { "Not found!" },
            );
            ok &= found;
        }
        Ok(ok)
    }

    fn find_elf_file(&self) -> Option<PathBuf> {
        walkdir::WalkDir::new(self.build_dir.path())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .find(|e| {
                let name = e.file_name().to_string_lossy();
                name.ends_with(".elf") && !PRELINK_ELVES.contains(&name.as_ref())
            })
            .map(|e| e.into_path())
    }
}

struct RecoveryHost<'b, R> {
    builder: &'b mut SampleBuilder<R>,
    baseline: PathBuf,
}

impl<R: BuildRunner> Rebuild for RecoveryHost<'_, R> {
    type Error = miette::Report;

    fn resolve(&mut self, region: &str) -> Result<ResolvedNode, ResolveError> {
        dts::resolve_region(region, &self.baseline)
    }

    fn extending(&mut self, g: &Growth) {
        println!(
            "Extending {} (at {}) to {:#x} (+{:#x})",
            g.node_name, g.base, g.new_size, g.increment,
        );
    }

    fn rebuild(&mut self, regions: &[MemoryRegion]) -> miette::Result<BuildAttempt> {
        let b = &mut *self.builder;

        b.overlay_count += 1;
        let path = b.scratch.path().join(format!("memory-{}.overlay", b.overlay_count));
        fs::write(&path, overlay::render_regions(regions))
            .into_diagnostic()
            .wrap_err_with(|| format!("can't write overlay {}", path.display()))?;

        println!("Building again with extended node(s) size...");
        if let Some(dts) = b.artifacts().get("dts").cloned() {
            b.preserve_original_dts(&dts)?;
        }
        b.overlays.insert(MEMORY_OVERLAY.to_string(), path);
        b.build(BuildStage::Full, false)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    const BOARD_DTS: &str = "\
/ {
	chosen {
		zephyr,sram = &sram0;
		zephyr,flash = &flash0;
	};
	sram0: memory@20000000 {
		reg = < 0x20000000 0x1000 >;
	};
	flash0: flash@0 {
		reg = < 0x0 0x40000 >;
	};
};
";

    #[derive(Clone, Default)]
    struct FakeBuild {
        failed: bool,
        output: String,
        /// Leave no device tree behind, as when CMake itself fails.
        no_dts: bool,
        config: Option<String>,
    }

    impl FakeBuild {
        fn ok() -> Self {
            Self {
                output: "Memory region         Used Size  Region Size  %age Used\n\
                         \x20          FLASH:      300000 B       256 KB    114.44%\n\
                         \x20            RAM:        4224 B         8 KB     51.56%\n".to_string(),
                config: Some("CONFIG_PRINTK=y\nCONFIG_SHELL=y\n".to_string()),
                ..Default::default()
            }
        }

        fn overflow(region: &str, bytes: u64) -> Self {
            Self {
                failed: true,
                output: format!("ld.bfd: region `{region}' overflowed by {bytes} bytes\n"),
                ..Default::default()
            }
        }
    }

    /// Pretends to be `west`: build commands populate the build directory
    /// according to a script, everything else succeeds silently.
    #[derive(Default)]
    struct FakeRunner {
        script: VecDeque<FakeBuild>,
        commands: Vec<WestCommand>,
        /// Contents of every overlay passed to a build, per build.
        overlays_seen: Vec<Vec<String>>,
    }

    impl FakeRunner {
        fn new(script: impl IntoIterator<Item = FakeBuild>) -> Self {
            Self {
                script: script.into_iter().collect(),
                ..Default::default()
            }
        }

        fn builds(&self) -> Vec<&WestCommand> {
            self.commands.iter().filter(|c| c.is_build()).collect()
        }
    }

    impl BuildRunner for FakeRunner {
        fn run(&mut self, cmd: &WestCommand) -> miette::Result<RunOutput> {
            self.commands.push(cmd.clone());
            if !cmd.is_build() {
                return Ok(RunOutput::default());
            }

            let overlays = cmd.args.iter()
                .find_map(|a| a.strip_prefix("-DDTC_OVERLAY_FILE="))
                .map(|list| list.split(';').map(|p| fs::read_to_string(p).unwrap()).collect())
                .unwrap_or_default();
            self.overlays_seen.push(overlays);

            let dir_at = cmd.args.iter().position(|a| a == "-d").unwrap() + 1;
            let zephyr = Path::new(&cmd.args[dir_at]).join("zephyr");
            fs::create_dir_all(&zephyr).unwrap();

            let step = self.script.pop_front().expect("fake west ran out of builds");
            if !step.no_dts {
                fs::write(zephyr.join("zephyr.dts"), BOARD_DTS).unwrap();
            }
            let prepare_only = cmd.args.iter().any(|a| a == "--cmake-only");
            if !step.failed && !prepare_only {
                fs::write(zephyr.join("zephyr.elf"), b"\x7fELF").unwrap();
                if let Some(config) = &step.config {
                    fs::write(zephyr.join(".config"), config).unwrap();
                }
            }
            Ok(RunOutput {
                failed: step.failed,
                output: step.output,
            })
        }
    }

    fn builder(script: impl IntoIterator<Item = FakeBuild>) -> SampleBuilder<FakeRunner> {
        SampleBuilder::new(
            FakeRunner::new(script),
            "nucleo_f429zi",
            Path::new("/zephyr/samples/hello_world"),
            Path::new("."),
        ).unwrap()
    }

    #[test]
    fn clean_success() {
        let mut b = builder([FakeBuild::ok()]);
        let outcome = b.build_sample().unwrap();

        assert!(outcome.succeeded);
        assert!(!outcome.extended_memory);
        assert!(outcome.stop.is_none());
        assert!(outcome.artifacts.contains_key("elf"));
        assert!(outcome.log.contains("FLASH:"));

        let commands = b.runner().commands.iter().map(|c| c.args[..2].join(" ")).collect::<Vec<_>>();
        assert_eq!(commands, ["spdx --init", "build -b", "spdx -d"]);
        assert!(b.original_dts().is_none());
    }

    #[test]
    fn overflow_is_recovered() {
        let mut b = builder([FakeBuild::overflow("RAM", 200), FakeBuild::ok()]);
        let outcome = b.build_sample().unwrap();

        assert!(outcome.succeeded);
        assert!(outcome.extended_memory);
        assert_eq!(outcome.regions.len(), 1);
        assert_eq!(outcome.regions[0].current_size, 0x2000);

        let seen = &b.runner().overlays_seen;
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_empty());
        assert_eq!(seen[1], ["&sram0 {\n\treg = <0x20000000 0x2000>;\n};\n"]);

        // The unmodified tree from the failed build was kept.
        let orig = b.original_dts().expect("original DTS preserved");
        assert_eq!(fs::read_to_string(orig).unwrap(), BOARD_DTS);
        assert!(b.dts_modified());
    }

    #[test]
    fn reported_sizes_are_original_after_extension() {
        let mut b = builder([FakeBuild::overflow("FLASH", 30000), FakeBuild::ok()]);
        let outcome = b.build_sample().unwrap();
        let usage = b.memory_usage(&outcome).unwrap().unwrap();
        assert_eq!(usage["FLASH"], MemoryUsage { used: 300000, size: 0x40000 });
        assert_eq!(usage["RAM"], MemoryUsage { used: 4224, size: 0x1000 });
    }

    #[test]
    fn both_regions_in_one_overlay() {
        let mut first = FakeBuild::overflow("RAM", 10);
        first.output += "ld.bfd: region `FLASH' overflowed by 5000 bytes\n";
        let mut b = builder([first, FakeBuild::ok()]);
        let outcome = b.build_sample().unwrap();

        assert!(outcome.succeeded);
        let seen = &b.runner().overlays_seen[1];
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("&flash0 {\n\treg = <0x0 0x42000>;"));
        assert!(seen[0].contains("&sram0 {\n\treg = <0x20000000 0x2000>;"));
    }

    #[test]
    fn missing_dts_is_fatal() {
        let step = FakeBuild {
            failed: true,
            no_dts: true,
            output: "CMake Error at cmake/modules/boards.cmake".to_string(),
            ..Default::default()
        };
        let mut b = builder([step]);
        let outcome = b.build_sample().unwrap();

        assert!(!outcome.succeeded);
        assert!(matches!(outcome.stop, Some(Stop::MissingDeviceTree)));
        assert_eq!(b.runner().builds().len(), 1);
    }

    #[test]
    fn no_progress_stops_rebuilding() {
        let mut b = builder([FakeBuild::overflow("RAM", 200), FakeBuild::overflow("RAM", 200)]);
        let outcome = b.build_sample().unwrap();

        assert!(!outcome.succeeded);
        assert!(outcome.extended_memory);
        assert!(matches!(outcome.stop, Some(Stop::NoProgress { .. })));
        assert_eq!(b.runner().builds().len(), 2);
    }

    #[test]
    fn board_overlay_gets_clean_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("board.overlay");
        fs::write(&custom, "&uart0 { status = \"okay\"; };\n").unwrap();

        let mut b = builder([FakeBuild::ok(), FakeBuild::overflow("RAM", 1), FakeBuild::ok()]);
        b.overlays.insert(CUSTOM_OVERLAY.to_string(), custom);
        let outcome = b.build_sample().unwrap();
        assert!(outcome.succeeded);

        let builds = b.runner().builds();
        assert_eq!(builds.len(), 3);
        assert!(builds[0].args.iter().any(|a| a == "--cmake-only"));

        let seen = &b.runner().overlays_seen;
        assert!(seen[0].is_empty());
        assert_eq!(seen[1].len(), 1);
        // Board overlay first, generated memory overlay layered on top.
        assert_eq!(seen[2].len(), 2);
        assert!(seen[2][0].contains("uart0"));
        assert!(seen[2][1].contains("&sram0"));

        assert!(b.original_dts().is_some());
    }

    #[test]
    fn kconfig_requirement_decides_success() {
        let mut b = builder([FakeBuild::ok()]);
        b.kconfig = vec!["CONFIG_SHELL=y".to_string(), "CONFIG_NET=y".to_string()];
        let outcome = b.build_sample().unwrap();
        assert!(outcome.artifacts.contains_key("elf"));
        assert!(!outcome.succeeded);

        let mut b = builder([FakeBuild::ok()]);
        b.kconfig = vec!["CONFIG_SHELL=y".to_string()];
        assert!(b.build_sample().unwrap().succeeded);
    }

    #[test]
    fn args_are_split_into_words() {
        let mut b = builder([FakeBuild::ok()]);
        b.args.insert("config".to_string(), "-DCONF_FILE=/p/hello.conf".to_string());
        b.args.insert("extra_args".to_string(), "-DEXTRA_CONF_FILE=a.conf  -DFOO=1".to_string());
        b.build_sample().unwrap();

        let build = b.runner().builds()[0].clone();
        let at = build.args.iter().position(|a| a == "-DCONF_FILE=/p/hello.conf").unwrap();
        assert_eq!(build.args[at + 1], "-DEXTRA_CONF_FILE=a.conf");
        assert_eq!(build.args[at + 2], "-DFOO=1");
    }

    #[test]
    fn session_files_are_removed() {
        let mut b = builder([FakeBuild::overflow("RAM", 200), FakeBuild::overflow("RAM", 200)]);
        b.build_sample().unwrap();
        let build_dir = b.build_dir().to_path_buf();
        let log = b.log_path().to_path_buf();
        assert!(log.exists());

        drop(b);
        assert!(!build_dir.exists());
        assert!(!log.exists());
    }

    #[test]
    fn fallback_elf_name() {
        let b = builder([]);
        let other = b.build_dir().join("zephyr");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("zephyr_pre0.elf"), b"").unwrap();
        fs::write(other.join("zephyr_appcpu.elf"), b"").unwrap();
        let artifacts = b.artifacts();
        assert!(artifacts["elf"].ends_with("zephyr_appcpu.elf"));
    }
}
