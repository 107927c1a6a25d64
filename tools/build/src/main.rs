use std::{fs, path::{Path, PathBuf}, time::Instant};

use clap::Parser;
use miette::{Context as _, IntoDiagnostic as _};
use zsb_build::{
    boards,
    config::{Config, Versions, DEFAULT_CONFIG_PATH},
    diff, job, manifest, summary,
    verbose::{frame, simple_table},
    west::WestRunner,
};

#[derive(Parser)]
struct Tool {
    /// Path to the project configuration.
    #[clap(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Builds one sample for one board and publishes the results.
    Build {
        /// Board directory in the Zephyr tree.
        board_dir: PathBuf,
        /// Board identifier, e.g. `nrf52dk/nrf52832`.
        board_name: String,
        /// Sample name from the project configuration.
        sample_name: String,

        /// Number of this job within a CI run.
        #[clap(short = 'j', long)]
        job_number: Option<usize>,
        /// Total number of jobs in the CI run.
        #[clap(short = 'J', long)]
        jobs_total: Option<usize>,

        /// Give up on memory overflow after this many rebuilds.
        #[clap(long, default_value_t = zsb_overflow::DEFAULT_MAX_ATTEMPTS)]
        max_attempts: usize,
    },
    /// Prints `<board dir> <board> <sample>` for everything to build.
    Pairs,
    /// Prints the CI job matrix, sized by `MATRIX_RUNNERS`.
    Matrix,
    /// Aggregates build results into CSV/JSON files and a Markdown summary.
    Summary {
        /// Directory holding the published results.
        #[clap(long, default_value = "build")]
        dir: PathBuf,
    },
    /// Lists status changes against an earlier collective result, by default
    /// the latest published one.
    Diff {
        /// Compare against this local file instead of a published result.
        #[clap(long, conflicts_with = "remote")]
        before: Option<PathBuf>,
        /// Published version to compare against; `latest` if no value given.
        #[clap(long)]
        remote: Option<Option<String>>,
        #[clap(default_value = "build/result.json")]
        after: PathBuf,
    },
    /// Dumps the configuration as JSON, without samples omitted from results.
    Config,
    /// Points the `zephyr` project of a west manifest at another revision.
    SetZephyrRev {
        #[clap(short, long)]
        file: PathBuf,
        #[clap(short, long)]
        revision: String,
    },
}

fn main() -> miette::Result<()> {
    let args = Tool::parse();

    match args.cmd {
        Cmd::Build { board_dir, board_name, sample_name, job_number, jobs_total, max_attempts } => {
            let config = Config::load(&args.config)?;
            let versions = Versions::from_env();

            let multijob = job_number.zip(jobs_total);
            let start = Instant::now();
            if let Some((n, total)) = multijob {
                frame(format!("job {n} / {total} started"));
            }

            simple_table([
                ("Project", config.project_name.as_str()),
                ("Zephyr", versions.zephyr.as_str()),
                ("Zephyr SDK", versions.sdk.as_str()),
            ]);

            job::run_job(&config, &versions, WestRunner, &job::JobSpec {
                board_dir: &board_dir,
                board: &board_name,
                sample: &sample_name,
                base: Path::new("."),
                max_attempts: Some(max_attempts),
            })?;

            if let Some((n, total)) = multijob {
                let secs = start.elapsed().as_secs_f64();
                frame(format!("job {n} / {total} finished in {secs:.2}"));
            }
        }
        Cmd::Pairs => {
            let config = Config::load(&args.config)?;
            let ids = boards::board_identifiers(
                &config.project_path.join("boards"),
                boards::OMIT_ARCHS,
                boards::OMIT_TARGETS,
            );
            for p in boards::pairs(&config, &ids) {
                println!("{} {} {}", p.board_dir.display(), p.board, p.sample);
            }
        }
        Cmd::Matrix => {
            let runners: usize = match std::env::var("MATRIX_RUNNERS") {
                Ok(v) => v.parse()
                    .into_diagnostic()
                    .wrap_err_with(|| format!("MATRIX_RUNNERS is not a number: {v:?}"))?,
                Err(_) => 2,
            };
            let matrix = serde_json::json!({ "runner": (1..=runners).collect::<Vec<_>>() });
            println!("{matrix}");
        }
        Cmd::Summary { dir } => {
            let config = Config::load(&args.config)?;
            let versions = Versions::from_env();
            let results = summary::aggregate_results(&dir)?;
            let stats = summary::stats(&results);
            let collective = summary::collective_result(&config, &results);

            let write = |name: &str| -> miette::Result<fs::File> {
                let path = dir.join(name);
                fs::File::create(&path)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("can't create {}", path.display()))
            };
            summary::write_minimal_csv(&results, write("result.csv")?)?;
            summary::write_boards_csv(&collective, write("boards.csv")?)?;
            serde_json::to_writer(write("result.json")?, &collective).into_diagnostic()?;

            let samples = summary::process_sample_data(&results);
            print!("{}", summary::render_markdown(&config, &versions, &stats, &samples)?);
        }
        Cmd::Diff { before, remote, after } => {
            let config = Config::load(&args.config)?;
            let after = diff::load_collective(&after)?;
            let before = match before {
                Some(path) => diff::load_collective(&path)?,
                None => match diff::fetch_published(&config.results_url, remote.flatten().as_deref()) {
                    Ok(c) => c,
                    Err(e) => {
                        println!("Failed to get remote JSON, quitting!\n{e}");
                        return Ok(());
                    }
                },
            };

            let rule = "-".repeat(80);
            for sample in config.samples.keys() {
                let d = diff::sample_diff(sample, &before, &after);
                println!("{rule}");
                if d.is_empty() {
                    println!("No status changes for sample: {sample}");
                    continue;
                }
                println!("Status changes for sample: {sample}");
                for (target, change) in d.iter() {
                    println!("{target}: {change}");
                }
                println!("{rule}\n");
            }
        }
        Cmd::Config => {
            let config = Config::load(&args.config)?;
            println!("{}", config.to_published_json()?);
        }
        Cmd::SetZephyrRev { file, revision } => {
            manifest::set_zephyr_revision(&file, &revision)?;
        }
    }

    Ok(())
}
