//! Zephyr board metadata: finding a board's YAML description and device
//! tree, and enumerating the boards a project should be built for.

use std::{collections::BTreeSet, fs, path::{Path, PathBuf}, sync::LazyLock};

use indexmap::IndexMap;
use miette::{Context as _, IntoDiagnostic as _};
use regex::Regex;
use serde::Deserialize;

use crate::{config::Config, sanitize_lower};

/// Architectures never worth building samples for.
pub const OMIT_ARCHS: &[&str] = &["posix"];
/// Simulator targets, skipped when their identifier contains one of these.
pub const OMIT_TARGETS: &[&str] = &["nsim", "xenvm", "xt-sim", "fvp_"];

/// Longer full names lose their parenthesised parts.
const FULL_NAME_LIMIT: usize = 50;

static PARENTHESISED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(.*\)").expect("parenthesis pattern is valid")
});
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^@/]+)(@[^/]+)?(/[^/]+)?(/.+)?$").expect("identifier pattern is valid")
});

/// The parts of a board YAML file we care about.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BoardYaml {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub variants: Option<IndexMap<String, serde_yaml::Value>>,
}

impl BoardYaml {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let text = fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't read {}", path.display()))?;
        serde_yaml::from_str(&text)
            .into_diagnostic()
            .wrap_err_with(|| format!("can't parse {}", path.display()))
    }

    /// Display name for reports, shortened if unwieldy.
    pub fn full_name(&self) -> String {
        let name = self.name.as_deref()
            .or(self.identifier.as_deref())
            .unwrap_or_default();
        shorten_name(name)
    }
}

pub fn shorten_name(name: &str) -> String {
    if name.chars().count() > FULL_NAME_LIMIT {
        PARENTHESISED.replace_all(name, "").into_owned()
    } else {
        name.to_string()
    }
}

/// A board identifier split into `board[@revision][/soc[/variant]]`. Absent
/// parts are empty.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Identifier<'a> {
    pub board: &'a str,
    pub revision: &'a str,
    pub soc: &'a str,
    pub variant: &'a str,
}

impl<'a> Identifier<'a> {
    pub fn parse(identifier: &'a str) -> Self {
        let Some(c) = IDENTIFIER.captures(identifier) else {
            return Self::default();
        };
        let part = |i: usize, skip: usize| c.get(i).map_or("", |m| &m.as_str()[skip..]);
        Self {
            board: part(1, 0),
            revision: part(2, 1),
            soc: part(3, 1),
            variant: part(4, 1),
        }
    }

    /// The identifier with the revision dropped.
    pub fn without_revision(&self) -> String {
        let mut s = self.board.to_string();
        for part in [self.soc, self.variant] {
            if !part.is_empty() {
                s.push('/');
                s.push_str(part);
            }
        }
        s
    }
}

/// Searches `board_dir` for the YAML file describing `identifier`.
pub fn find_board_yaml(board_dir: &Path, identifier: &str) -> Option<(PathBuf, BoardYaml)> {
    println!("board_dir: {}, board_name: {identifier}", board_dir.display());
    yaml_files(board_dir)
        .filter_map(|path| match BoardYaml::load(&path) {
            Ok(yaml) => Some((path, yaml)),
            Err(e) => {
                println!("{e:?}");
                None
            }
        })
        .find(|(_, yaml)| yaml.identifier.as_deref() == Some(identifier))
}

fn yaml_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|x| x == "yaml"))
}

/// Picks the base device tree of a board from its directory.
///
/// There's no direct mapping from identifier to file, so this guesses: the
/// only `.dts` there is, then one named like the YAML file, then the most
/// specific prefix of the identifier.
pub fn board_dts(board_dir: &Path, identifier: &str, yaml_path: &Path) -> Option<PathBuf> {
    let candidates = walkdir::WalkDir::new(board_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|x| x == "dts"))
        .collect::<Vec<_>>();

    if let [only] = candidates.as_slice() {
        return Some(only.clone());
    }

    if let Some(stem) = yaml_path.file_stem() {
        let by_yaml = board_dir.join(stem).with_extension("dts");
        if by_yaml.exists() {
            return Some(by_yaml);
        }
    }

    // actinius_icarus@2.0.0/nrf9160 tries actinius_icarus_nrf9160.dts, then
    // actinius_icarus.dts, then actinius.dts.
    let plain = sanitize_lower(&Identifier::parse(identifier).without_revision());
    let parts = plain.split('_').collect::<Vec<_>>();
    for n in (1..=parts.len()).rev() {
        let file_name = format!("{}.dts", parts[..n].join("_"));
        if let Some(found) = candidates.iter().find(|p| p.file_name().is_some_and(|f| *f == *file_name)) {
            return Some(found.clone());
        }
    }

    let fallback = candidates.into_iter().next();
    if fallback.is_none() {
        println!("No DTS file found for {identifier}");
    }
    fallback
}

/// Follows the first non-header `#include` of each device-tree file, starting
/// at `dts`, and returns the included names without extensions.
///
/// Names of includes relative to the including file are prefixed with `!`;
/// `<...>` includes are looked up in `<project>/dts/<arch>/`.
pub fn dts_include_chain(project_path: &Path, arch: &str, dts: &Path) -> Vec<String> {
    let mut chain = vec![];
    let mut seen = BTreeSet::new();
    let mut current = dts.to_path_buf();

    while let Ok(text) = fs::read_to_string(&current) {
        if !seen.insert(current.clone()) {
            break;
        }
        let Some((next, name)) = text.lines()
            .filter(|l| l.starts_with("#include"))
            .filter_map(|l| l.split_whitespace().nth(1))
            .find_map(|target| resolve_include(project_path, arch, &current, target))
        else {
            break;
        };
        chain.push(name);
        current = next;
    }
    chain
}

fn resolve_include(project_path: &Path, arch: &str, from: &Path, target: &str) -> Option<(PathBuf, String)> {
    let system = target.starts_with('<') && target.ends_with('>');
    let target = target.trim_matches(|c| c == ' ' || c == '"' || c == '<' || c == '>');
    let (stem, ext) = match target.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => (stem, ext),
        _ => (target, ""),
    };
    if ext == "h" {
        return None;
    }

    if system {
        Some((project_path.join("dts").join(arch).join(target), stem.to_string()))
    } else {
        let dir = from.parent().unwrap_or(Path::new(""));
        Some((dir.join(target), format!("!{stem}")))
    }
}

/// Finds every buildable board identifier under `boards_root`, mapped to the
/// directory holding its YAML file.
pub fn board_identifiers(
    boards_root: &Path,
    omit_archs: &[&str],
    omit_targets: &[&str],
) -> IndexMap<String, PathBuf> {
    let omitted = |id: &str| omit_targets.iter().any(|t| id.contains(t));
    let mut boards = IndexMap::new();

    for path in yaml_files(boards_root) {
        let Some(dir) = path.parent() else {
            continue;
        };
        let rel = dir.strip_prefix(boards_root).unwrap_or(dir).to_string_lossy();
        if rel.contains("dts/bindings") || rel.contains("support") {
            continue;
        }

        let yaml = match BoardYaml::load(&path) {
            Ok(y) => y,
            Err(_) => continue,
        };
        // With an arch filter in place, a board that doesn't name its arch
        // can't pass it.
        if !omit_archs.is_empty() {
            match yaml.arch.as_deref() {
                Some(a) if !omit_archs.contains(&a) => {}
                _ => continue,
            }
        }

        if let Some(id) = &yaml.identifier {
            if !omitted(id) {
                boards.insert(id.clone(), dir.to_path_buf());
            }
        } else if let Some(variants) = &yaml.variants {
            for id in variants.keys().filter(|id| !omitted(id)) {
                boards.insert(id.clone(), dir.to_path_buf());
            }
        }
    }
    boards
}

/// One unit of build work.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildPair {
    pub board_dir: PathBuf,
    pub board: String,
    pub sample: String,
}

/// Pairs every board with every sample that applies to it. A sample with no
/// `boards` list applies to all of them.
pub fn pairs(config: &Config, boards: &IndexMap<String, PathBuf>) -> Vec<BuildPair> {
    let mut out = vec![];
    for (board, dir) in boards {
        for (sample, def) in &config.samples {
            let applies = def.boards.as_ref().is_none_or(|list| list.contains(board));
            if applies {
                out.push(BuildPair {
                    board_dir: dir.clone(),
                    board: board.clone(),
                    sample: sample.clone(),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, text).unwrap();
        p
    }

    #[test]
    fn long_names_are_shortened() {
        assert_eq!(shorten_name("nRF52 DK"), "nRF52 DK");
        let long = "Espressif ESP32-S3-DevKitM (PROCPU core, octal flash)  ";
        assert!(long.len() > FULL_NAME_LIMIT);
        assert_eq!(shorten_name(long), "Espressif ESP32-S3-DevKitM   ");
    }

    #[test]
    fn identifier_parts() {
        let id = Identifier::parse("actinius_icarus@2.0.0/nrf9160/ns");
        assert_eq!(id, Identifier {
            board: "actinius_icarus",
            revision: "2.0.0",
            soc: "nrf9160",
            variant: "ns",
        });
        assert_eq!(id.without_revision(), "actinius_icarus/nrf9160/ns");
        assert_eq!(Identifier::parse("qemu_x86").without_revision(), "qemu_x86");
    }

    #[test]
    fn finds_yaml_by_identifier() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "nrf52dk/nrf52dk_nrf52810.yaml", "identifier: nrf52dk/nrf52810\nname: nRF52 DK (nRF52810)\narch: arm\n");
        write(dir.path(), "nrf52dk/nrf52dk_nrf52832.yaml", "identifier: nrf52dk/nrf52832\nname: nRF52 DK\narch: arm\n");
        write(dir.path(), "nrf52dk/broken.yaml", ": : :\n");

        let (path, yaml) = find_board_yaml(dir.path(), "nrf52dk/nrf52832").unwrap();
        assert!(path.ends_with("nrf52dk_nrf52832.yaml"));
        assert_eq!(yaml.full_name(), "nRF52 DK");
        assert_eq!(yaml.arch.as_deref(), Some("arm"));
        assert!(find_board_yaml(dir.path(), "nrf52dk").is_none());
    }

    #[test]
    fn dts_by_identifier_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(dir.path(), "actinius_icarus_ns.yaml", "");
        write(dir.path(), "actinius_icarus_common.dtsi", "");
        write(dir.path(), "actinius_icarus.dts", "");
        write(dir.path(), "actinius_icarus_nrf9160.dts", "");

        let found = board_dts(dir.path(), "actinius_icarus@2.0.0/nrf9160", &yaml).unwrap();
        assert!(found.ends_with("actinius_icarus_nrf9160.dts"));

        let yaml = write(dir.path(), "actinius_icarus.yaml", "");
        let found = board_dts(dir.path(), "whatever", &yaml).unwrap();
        assert!(found.ends_with("actinius_icarus.dts"));
    }

    #[test]
    fn include_chain() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("zephyr");
        let board = write(
            &project,
            "boards/st/nucleo_f429zi/nucleo_f429zi.dts",
            "/dts-v1/;\n#include <st/f4/stm32f429Xi.dtsi>\n#include \"arduino_r3_connector.dtsi\"\n",
        );
        write(&project, "dts/arm/st/f4/stm32f429Xi.dtsi", "#include <mem.h>\n#include <st/f4/stm32f429.dtsi>\n");
        write(&project, "dts/arm/st/f4/stm32f429.dtsi", "#include \"stm32f427.dtsi\"\n");
        write(&project, "dts/arm/st/f4/stm32f427.dtsi", "/ { };\n");

        assert_eq!(dts_include_chain(&project, "arm", &board), [
            "st/f4/stm32f429Xi",
            "st/f4/stm32f429",
            "!stm32f427",
        ]);
        assert!(dts_include_chain(&project, "arm", &dir.path().join("none.dts")).is_empty());
    }

    #[test]
    fn include_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.dts", "#include \"b.dtsi\"\n");
        write(dir.path(), "b.dtsi", "#include \"a.dts\"\n");
        assert_eq!(dts_include_chain(dir.path(), "arm", &a), ["!b", "!a"]);
    }

    #[test]
    fn identifiers_and_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "arm/nucleo_f429zi/nucleo_f429zi.yaml", "identifier: nucleo_f429zi\narch: arm\n");
        write(root, "native/native_sim/native_sim.yaml", "identifier: native_sim\narch: posix\n");
        write(root, "arc/nsim/nsim_em.yaml", "identifier: nsim_em\narch: arc\n");
        write(root, "arm/mps2/mps2.yaml", "arch: arm\nvariants:\n  mps2/an385: {}\n  mps2/an521/cpu0: {}\n");
        write(root, "arm/nucleo_f429zi/support/openocd.yaml", "identifier: bogus\n");

        let ids = board_identifiers(root, OMIT_ARCHS, OMIT_TARGETS);
        let mut keys = ids.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, ["mps2/an385", "mps2/an521/cpu0", "nucleo_f429zi"]);
        assert!(ids["mps2/an385"].ends_with("arm/mps2"));

        let config = Config::from_toml_str(r#"
            project = "zephyr"
            project-name = "Zephyr"
            project-path = "zephyr"

            [samples.hello_world]
            path = "samples/hello_world"

            [samples.blinky]
            path = "samples/basic/blinky"
            boards = ["nucleo_f429zi"]
        "#).unwrap();
        let pairs = pairs(&config, &ids);
        assert_eq!(pairs.len(), 4);
        assert!(pairs.iter().any(|p| p.board == "nucleo_f429zi" && p.sample == "blinky"));
        assert!(!pairs.iter().any(|p| p.board == "mps2/an385" && p.sample == "blinky"));
    }

    #[test]
    fn board_without_arch() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "arm/nucleo_f429zi/nucleo_f429zi.yaml", "identifier: nucleo_f429zi\narch: arm\n");
        write(root, "misc/mystery/mystery.yaml", "identifier: mystery\n");

        let ids = board_identifiers(root, OMIT_ARCHS, OMIT_TARGETS);
        assert_eq!(ids.keys().collect::<Vec<_>>(), ["nucleo_f429zi"]);

        let unfiltered = board_identifiers(root, &[], OMIT_TARGETS);
        assert!(unfiltered.contains_key("mystery"));
    }
}
