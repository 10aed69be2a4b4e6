//! The `sapling` binary: run a source file, a pre-parsed `.sapped` file, or
//! every `*.sap` in a directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use sapling::{cache, parser, report, Code, Vm};

#[derive(Parser)]
#[command(name = "sapling", version = sapling::VERSION, about = "The Sapling language runner")]
struct Cli {
    /// A .sap source file, a .sapped pre-parsed file, or a directory
    file: PathBuf,

    /// Serialise the parse tree to a .sapped sidecar before execution
    #[arg(short, long)]
    compile: bool,

    /// Print total elapsed time after execution
    #[arg(short, long)]
    time: bool,

    /// When running a directory, walk subdirectories for *.sap
    #[arg(short, long)]
    recursive: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    let ok = if cli.file.is_dir() {
        run_directory(&cli.file, &cli)
    } else {
        run_file(&cli.file, &cli)
    };

    if cli.time && ok {
        println!(
            "Total time elapsed: {:.4}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_directory(dir: &Path, cli: &Cli) -> bool {
    let files: Vec<PathBuf> = if cli.recursive {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "sap"))
            .collect()
    } else {
        let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "sap"))
                .collect(),
            Err(err) => {
                eprintln!("Cannot read directory '{}': {err}", dir.display());
                return false;
            }
        };
        files.sort();
        files
    };

    for file in files {
        println!("Running: {}", file.display());
        if !run_file(&file, cli) {
            return false;
        }
    }
    true
}

fn run_file(path: &Path, cli: &Cli) -> bool {
    if !path.is_file() {
        eprintln!("File '{}' not found", path.display());
        return false;
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("sap") => {
            let src = match std::fs::read_to_string(path) {
                Ok(src) => src,
                Err(err) => {
                    eprintln!("Cannot read '{}': {err}", path.display());
                    return false;
                }
            };

            let code = match parser::parse(&src) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("{}", report::render(&err, Some(&src)));
                    return false;
                }
            };

            if cli.compile {
                if let Err(err) = write_sapped(path, &code) {
                    eprintln!("{err}");
                    return false;
                }
            }

            execute(path, &code, Some(&src))
        }
        Some("sapped") => {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    eprintln!("Cannot read '{}': {err}", path.display());
                    return false;
                }
            };
            let code = match cache::deserialize(&bytes) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("{}", report::render(&err, None));
                    return false;
                }
            };
            execute(path, &code, None)
        }
        _ => {
            eprintln!(
                "Expected file suffix .sap or .sapped, not '{}'",
                path.display()
            );
            false
        }
    }
}

fn write_sapped(path: &Path, code: &Code) -> Result<(), String> {
    let out = path.with_extension(cache::EXTENSION);
    let bytes = cache::serialize(code).map_err(|e| e.to_string())?;
    std::fs::write(&out, bytes).map_err(|e| format!("Cannot write '{}': {e}", out.display()))?;
    info!(path = %out.display(), "wrote parse tree sidecar");
    Ok(())
}

fn execute(path: &Path, code: &Code, src: Option<&str>) -> bool {
    info!(path = %path.display(), "running");
    let mut vm = Vm::new(src);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        vm.set_base_dir(parent);
    }

    match vm.run(code) {
        Ok(()) => true,
        Err(err) => {
            eprintln!("{}", report::render(&err, src));
            false
        }
    }
}
