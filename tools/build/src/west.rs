//! Running `west`, Zephyr's meta-tool, which does the actual building.

use std::{fmt::Display, path::{Path, PathBuf}, process::Command};

use miette::{Context as _, IntoDiagnostic as _};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BuildStage {
    /// Run CMake only. Enough to get a flattened device tree.
    PrepareOnly,
    Full,
}

/// Parameters of one `west build` invocation.
#[derive(Clone, Debug)]
pub struct BuildRequest<'a> {
    pub board: &'a str,
    pub build_dir: &'a Path,
    pub sample_path: &'a Path,
    /// Extra arguments, already split into words.
    pub args: &'a [String],
    /// Device-tree overlays, applied in order.
    pub overlays: &'a [PathBuf],
    pub pristine: bool,
    pub stage: BuildStage,
}

/// A `west` command line and the directory to run it in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WestCommand {
    pub cwd: PathBuf,
    pub args: Vec<String>,
}

impl WestCommand {
    pub fn build(cwd: &Path, req: &BuildRequest<'_>) -> Self {
        let mut args = vec![
            "build".to_string(),
            "-b".to_string(),
            req.board.to_string(),
            "-d".to_string(),
            req.build_dir.display().to_string(),
            req.sample_path.display().to_string(),
        ];
        args.extend(req.args.iter().cloned());
        if !req.overlays.is_empty() {
            let joined = itertools::join(req.overlays.iter().map(|p| p.display()), ";");
            args.push(format!("-DDTC_OVERLAY_FILE={joined}"));
        }
        if req.pristine {
            args.push("--pristine".to_string());
        }
        // Without this, recent Zephyr doesn't produce the build metadata the
        // SPDX generator needs.
        args.push("-DCONFIG_BUILD_OUTPUT_META=y".to_string());
        if req.stage == BuildStage::PrepareOnly {
            args.push("--cmake-only".to_string());
        }

        Self {
            cwd: cwd.to_path_buf(),
            args,
        }
    }

    /// Prepares a build directory for SBOM generation. Must precede the build.
    pub fn spdx_init(cwd: &Path, build_dir: &Path) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            args: vec![
                "spdx".to_string(),
                "--init".to_string(),
                "-d".to_string(),
                build_dir.display().to_string(),
            ],
        }
    }

    /// Writes the SBOM files for a finished build.
    pub fn spdx(cwd: &Path, build_dir: &Path) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            args: vec![
                "spdx".to_string(),
                "-d".to_string(),
                build_dir.display().to_string(),
            ],
        }
    }

    pub fn is_build(&self) -> bool {
        self.args.first().is_some_and(|a| a == "build")
    }
}

impl Display for WestCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "west {}", self.args.join(" "))
    }
}

/// What a command printed, and whether it failed.
#[derive(Clone, Debug, Default)]
pub struct RunOutput {
    pub failed: bool,
    /// Standard output followed by standard error.
    pub output: String,
}

pub trait BuildRunner {
    /// Runs `cmd` to completion. A command that runs and fails is a normal
    /// `Ok` result; `Err` means it couldn't be run at all.
    fn run(&mut self, cmd: &WestCommand) -> miette::Result<RunOutput>;
}

/// Runs commands with the `west` found on `PATH`.
#[derive(Clone, Debug, Default)]
pub struct WestRunner;

impl BuildRunner for WestRunner {
    fn run(&mut self, cmd: &WestCommand) -> miette::Result<RunOutput> {
        let out = Command::new("west")
            .args(&cmd.args)
            .current_dir(&cmd.cwd)
            .output()
            .into_diagnostic()
            .wrap_err_with(|| format!("can't run `{cmd}` in {}", cmd.cwd.display()))?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(RunOutput {
            failed: !out.status.success(),
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_build_command() {
        let args = ["-DCONF_FILE=/cfg/hello.conf".to_string()];
        let overlays = [PathBuf::from("/o/custom.overlay"), PathBuf::from("/tmp/mem.overlay")];
        let cmd = WestCommand::build(Path::new("/zephyr"), &BuildRequest {
            board: "nucleo_f429zi",
            build_dir: Path::new("/tmp/b"),
            sample_path: Path::new("/zephyr/samples/hello_world"),
            args: &args,
            overlays: &overlays,
            pristine: true,
            stage: BuildStage::Full,
        });
        assert_eq!(cmd.cwd, Path::new("/zephyr"));
        assert_eq!(cmd.args, [
            "build", "-b", "nucleo_f429zi", "-d", "/tmp/b",
            "/zephyr/samples/hello_world",
            "-DCONF_FILE=/cfg/hello.conf",
            "-DDTC_OVERLAY_FILE=/o/custom.overlay;/tmp/mem.overlay",
            "--pristine",
            "-DCONFIG_BUILD_OUTPUT_META=y",
        ]);
        assert!(cmd.is_build());
    }

    #[test]
    fn prepare_only_without_overlays() {
        let cmd = WestCommand::build(Path::new("."), &BuildRequest {
            board: "qemu_x86",
            build_dir: Path::new("b"),
            sample_path: Path::new("s"),
            args: &[],
            overlays: &[],
            pristine: true,
            stage: BuildStage::PrepareOnly,
        });
        assert_eq!(
            cmd.to_string(),
            "west build -b qemu_x86 -d b s --pristine -DCONFIG_BUILD_OUTPUT_META=y --cmake-only",
        );
    }

    #[test]
    fn spdx_commands() {
        let init = WestCommand::spdx_init(Path::new("."), Path::new("b"));
        assert_eq!(init.to_string(), "west spdx --init -d b");
        assert!(!init.is_build());
        assert_eq!(WestCommand::spdx(Path::new("."), Path::new("b")).to_string(), "west spdx -d b");
    }
}
