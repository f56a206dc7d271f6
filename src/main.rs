use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use clap::Parser;

use althtml::config::Manifest;
use althtml::{Compiler, Diagnostic};

#[derive(Parser)]
#[command(name = "althtml", version, about = "Compile althtml sources to HTML")]
struct Cli {
    /// Source file to compile.
    #[arg(required_unless_present = "manifest")]
    input: Option<PathBuf>,

    /// Destination file; stdout when omitted.
    output: Option<PathBuf>,

    /// Header sources compiled first, for their bindings only.
    #[arg(long = "header", value_name = "FILE")]
    headers: Vec<PathBuf>,

    /// Build manifest listing headers and src/dst pairs.
    #[arg(long, value_name = "FILE", conflicts_with = "input")]
    manifest: Option<PathBuf>,

    /// Recompile whenever an input changes.
    #[arg(long)]
    watch: bool,
}

/// One full rebuild: headers in order, then every src/dst pair, all
/// sharing a single binding environment.
struct Job {
    headers: Vec<PathBuf>,
    builds: Vec<(PathBuf, Option<PathBuf>)>,
}

impl Job {
    fn from_cli(cli: &Cli) -> Result<Self> {
        match &cli.manifest {
            Some(path) => {
                let manifest = Manifest::load(path)?;
                Ok(Self::from_manifest(&manifest))
            }
            None => {
                let input = cli
                    .input
                    .clone()
                    .context("missing input file (or use --manifest)")?;
                Ok(Job {
                    headers: cli.headers.clone(),
                    builds: vec![(input, cli.output.clone())],
                })
            }
        }
    }

    fn from_manifest(manifest: &Manifest) -> Self {
        Job {
            headers: manifest.headers.clone(),
            builds: manifest
                .build
                .iter()
                .map(|pair| (pair.src.clone(), Some(pair.dst.clone())))
                .collect(),
        }
    }

    fn inputs(&self) -> Vec<PathBuf> {
        self.headers
            .iter()
            .cloned()
            .chain(self.builds.iter().map(|(src, _)| src.clone()))
            .collect()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let job = Job::from_cli(&cli)?;

    if cli.watch {
        return watch(job, &cli);
    }

    if run_job(&job)? {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

/// Returns false when any compilation produced diagnostics.
fn run_job(job: &Job) -> Result<bool> {
    let mut compiler = Compiler::new();
    let mut ok = true;

    for header in &job.headers {
        let source = read(header)?;
        if let Err(diags) = compiler.load_header(&source) {
            report(header, &diags);
            ok = false;
        }
    }

    for (src, dst) in &job.builds {
        let source = read(src)?;
        match compiler.compile(&source) {
            Ok(html) => match dst {
                Some(path) => fs::write(path, html)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{html}"),
            },
            Err(diags) => {
                report(src, &diags);
                ok = false;
            }
        }
    }

    Ok(ok)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn report(path: &Path, diags: &[Diagnostic]) {
    for diag in diags {
        eprintln!("{}:{}", path.display(), diag);
    }
}

// ---------------------------------------------------------------------------
// Watch mode
// ---------------------------------------------------------------------------

/// Poll the inputs' mtimes and rebuild everything on change. Bindings are
/// fresh on every rebuild; the manifest is re-read so edits to it take
/// effect too.
fn watch(mut job: Job, cli: &Cli) -> Result<()> {
    let poll = Duration::from_millis(300);

    println!(
        "[watch] monitoring {} file(s); press Ctrl+C to stop",
        job.inputs().len() + usize::from(cli.manifest.is_some())
    );
    rebuild(&job);
    let mut last = latest_mtime(&watched_paths(&job, cli));

    loop {
        thread::sleep(poll);
        let now = latest_mtime(&watched_paths(&job, cli));
        if now <= last {
            continue;
        }
        last = now;

        if let Some(path) = &cli.manifest {
            match Manifest::load(path) {
                Ok(manifest) => job = Job::from_manifest(&manifest),
                Err(e) => {
                    eprintln!("[watch] {e}");
                    continue;
                }
            }
        }
        println!("[watch] change detected — rebuilding");
        rebuild(&job);
    }
}

fn rebuild(job: &Job) {
    match run_job(job) {
        Ok(true) => println!("[watch] build ok"),
        Ok(false) => println!("[watch] build finished with errors"),
        Err(e) => eprintln!("[watch] {e}"),
    }
}

fn watched_paths(job: &Job, cli: &Cli) -> Vec<PathBuf> {
    let mut paths = job.inputs();
    if let Some(manifest) = &cli.manifest {
        paths.push(manifest.clone());
    }
    paths
}

fn latest_mtime(paths: &[PathBuf]) -> SystemTime {
    let mut latest = SystemTime::UNIX_EPOCH;
    for path in paths {
        if let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) {
            if modified > latest {
                latest = modified;
            }
        }
    }
    latest
}
