//! Project configuration.
//!
//! A project is described by one TOML file naming the Zephyr tree, the samples
//! to build, and where artifacts go. It is loaded once in `main` and handed to
//! everything that needs it.

use std::{collections::BTreeSet, path::{Path, PathBuf}};

use indexmap::IndexMap;
use miette::{miette, Context as _, IntoDiagnostic as _};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "samples-builder.toml";

/// Where earlier runs publish their collective results.
pub const DEFAULT_RESULTS_URL: &str = "https://storage.googleapis.com/zephyr-samples-builder/zephyr";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Short project identifier, e.g. `zephyr`.
    pub project: String,
    /// Human-readable project name for reports.
    pub project_name: String,
    #[serde(default)]
    pub project_git_tree: String,
    /// Root of the Zephyr tree. Samples and boards are found relative to it.
    pub project_path: PathBuf,
    /// Prepended to every artifact name to make its path.
    #[serde(default)]
    pub artifact_prefix: String,
    /// Artifact path templates, with `{board_name}` and `{sample_name}`
    /// placeholders.
    #[serde(default)]
    pub artifact_names: IndexMap<String, String>,
    /// Base URL of published results: `<url>/latest` names the newest
    /// version and `<url>/<version>/result.json` holds its collective result.
    #[serde(default = "default_results_url")]
    pub results_url: String,
    /// Samples in the order they should appear in reports.
    pub samples: IndexMap<String, SampleDef>,
}

fn default_results_url() -> String {
    DEFAULT_RESULTS_URL.to_string()
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SampleDef {
    /// Location of the sample, relative to its workspace.
    pub path: PathBuf,
    /// Alternate Zephyr workspace to build this sample in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    /// Extra arguments for `west build`, whitespace-separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<String>,
    /// Boards this sample is limited to; all boards if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boards: Option<Vec<String>>,
    /// Lines that must appear verbatim in the generated `.config` for the
    /// build to count as successful.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kconfig: Vec<String>,
    #[serde(default)]
    pub omit_in_results: bool,
}

/// Values substituted into artifact path templates.
#[derive(Clone, Debug)]
pub struct FormatArgs {
    pub board_name: String,
    pub sample_name: String,
}

impl FormatArgs {
    pub fn expand(&self, template: &str) -> String {
        template
            .replace("{board_name}", &self.board_name)
            .replace("{sample_name}", &self.sample_name)
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> miette::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't read config file at path: {}", path.display()))?;
        Self::from_toml_str(&text)
            .wrap_err_with(|| format!("can't parse config file at path: {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> miette::Result<Self> {
        toml::from_str(text).into_diagnostic()
    }

    pub fn sample(&self, name: &str) -> miette::Result<&SampleDef> {
        self.samples.get(name).ok_or_else(|| {
            let guesses = guess_intent(name, self.samples.keys());
            if guesses.is_empty() {
                miette!("no sample named '{name}' in config")
            } else {
                miette!(
                    help = format!("did you mean: {}", itertools::join(&guesses, ", ")),
                    "no sample named '{name}' in config"
                )
            }
        })
    }

    /// Directory `west` runs in for this sample.
    pub fn sample_workspace<'a>(&'a self, sample: &'a SampleDef) -> &'a Path {
        sample.workspace.as_deref().unwrap_or(&self.project_path)
    }

    /// Absolute path to the sample's sources.
    pub fn sample_path(&self, sample: &SampleDef) -> miette::Result<PathBuf> {
        let joined = self.sample_workspace(sample).join(&sample.path);
        std::path::absolute(&joined)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't make {} absolute", joined.display()))
    }

    /// Path of a named artifact for one board/sample pair.
    pub fn artifact_path(&self, name: &str, args: &FormatArgs) -> miette::Result<PathBuf> {
        let template = self.artifact_names.get(name)
            .ok_or_else(|| miette!("no {name} key in artifacts. Path unknown"))?;
        Ok(PathBuf::from(format!("{}{}", self.artifact_prefix, args.expand(template))))
    }

    /// Every artifact path, keyed by name, with placeholders left in.
    pub fn artifact_paths(&self) -> IndexMap<String, String> {
        self.artifact_names.iter()
            .map(|(k, v)| (k.clone(), format!("{}{}", self.artifact_prefix, v)))
            .collect()
    }

    /// The configuration as published alongside results: computed artifact
    /// paths included, samples marked `omit-in-results` left out.
    pub fn to_published_json(&self) -> miette::Result<serde_json::Value> {
        let mut published = self.clone();
        published.samples.retain(|_, s| !s.omit_in_results);
        let mut value = serde_json::to_value(&published).into_diagnostic()?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "artifact-paths".to_string(),
                serde_json::to_value(self.artifact_paths()).into_diagnostic()?,
            );
        }
        Ok(value)
    }
}

/// Versions of the tools used for a build, taken from the environment.
#[derive(Clone, Debug, Serialize)]
pub struct Versions {
    pub zephyr: String,
    pub sdk: String,
    pub micropython: String,
}

impl Versions {
    pub fn from_env() -> Self {
        let get = |name: &str| std::env::var(name).unwrap_or_else(|_| "???".to_string());
        Self {
            zephyr: get("ZEPHYR_VERSION"),
            sdk: get("ZEPHYR_SDK_VERSION"),
            micropython: get("MICROPYTHON_VERSION"),
        }
    }
}

pub fn guess_intent<'a>(
    value: &str,
    valid_options: impl IntoIterator<Item = &'a String>,
) -> BTreeSet<&'a str> {
    const MAX: usize = 4;

    valid_options.into_iter()
        .filter_map(|option| if strsim::damerau_levenshtein(value, option) <= MAX {
            Some(option.as_str())
        } else {
            None
        })
        .collect()
}
