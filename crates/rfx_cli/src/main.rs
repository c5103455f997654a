mod config;
mod files;
mod logging;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rfx_ast::{is_component_path, Lang, Options, Resolution, ScriptRegion};
use rfx_parser::{contains_sigil, parse_script, script_regions};
use rfx_transform::{helper_declarations, Transformer};

use crate::files::FileFilter;

#[derive(Parser)]
#[command(name = "rfx", about = "rfx: desugar $-sigil reactivity shorthand")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// JSON options file (defaults to ./rfx.config.json when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Extra names excluded from the `$name(...)` trigger.
    #[arg(long = "ignore", value_name = "NAME")]
    ignore: Vec<String>,
    /// Use order-sensitive counter resolution instead of lexical scopes.
    #[arg(long)]
    counting: bool,
}

impl ConfigArgs {
    fn options(&self) -> Result<Options> {
        let mut options = config::load(self.config.as_deref())?;
        options.ignore.extend(self.ignore.iter().cloned());
        if self.counting {
            options.resolution = Resolution::Counting;
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite files and print or write the result.
    Transform {
        /// Files or directories.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output file (single input only; stdout if omitted).
        #[arg(short, long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,
        /// Write outputs under this directory, mirroring input paths.
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Write a `.map` file next to each output.
        #[arg(long)]
        source_map: bool,
        /// Append helper type declarations.
        #[arg(long)]
        declarations: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Parse every script region and report syntax errors.
    Check {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the edits and unwrap bindings for one file as JSON.
    Edits {
        input: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the helper signature declarations.
    Declarations {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Transform {
            inputs,
            output,
            out_dir,
            source_map,
            declarations,
            config,
        } => {
            let mut options = config.options()?;
            options.source_map |= source_map;
            options.declarations |= declarations;

            let files = FileFilter::new(&options)?.collect(&inputs)?;
            if output.is_some() && files.len() != 1 {
                bail!("--output needs exactly one input file, got {}", files.len());
            }

            let transformer = Transformer::new(options);
            let failed = for_each_file(&files, |path| {
                let target = match (&output, &out_dir) {
                    (Some(output), _) => Some(output.clone()),
                    (None, Some(dir)) => Some(dir.join(relative(path))),
                    (None, None) => None,
                };
                transform_one(&transformer, path, target.as_deref())
            });
            finish(failed, files.len())?;
        }
        Commands::Check { inputs, config } => {
            let options = config.options()?;
            let files = FileFilter::new(&options)?.collect(&inputs)?;
            let failed = for_each_file(&files, check_one);
            finish(failed, files.len())?;
        }
        Commands::Edits { input, config } => {
            let transformer = Transformer::new(config.options()?);
            let source = read(&input)?;
            let result = transformer.transform_file(&source, &input.display().to_string())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Declarations { config } => {
            print!("{}", helper_declarations(&config.options()?));
        }
    }

    Ok(())
}

/// Run `f` on every file, reporting failures without stopping. Returns the
/// number of failed files.
fn for_each_file(files: &[PathBuf], mut f: impl FnMut(&Path) -> Result<()>) -> usize {
    let mut failed = 0;
    for path in files {
        if let Err(err) = f(path) {
            tracing::debug!(path = %path.display(), "failed");
            eprintln!("error: {}: {err:#}", path.display());
            failed += 1;
        }
    }
    failed
}

fn finish(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        bail!("{failed} of {total} files failed");
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn transform_one(transformer: &Transformer, path: &Path, target: Option<&Path>) -> Result<()> {
    let source = read(path)?;
    let filename = path.display().to_string();
    let result = match transformer.transform_file(&source, &filename) {
        Ok(result) => result,
        Err(err) => {
            // The failed file still gets an output: its source, unchanged.
            emit(target, &source)?;
            return Err(err.into());
        }
    };
    tracing::info!(path = %filename, edits = result.edits.len(), "transformed");
    emit(target, &result.code)?;

    if let Some(map) = &result.map {
        let map_path = match target {
            Some(target) => format!("{}.map", target.display()),
            None => format!("{filename}.map"),
        };
        std::fs::write(&map_path, map).with_context(|| format!("failed to write {map_path}"))?;
        eprintln!("Source map written to {map_path}");
    }
    Ok(())
}

fn emit(target: Option<&Path>, code: &str) -> Result<()> {
    match target {
        Some(target) => {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(target, code)
                .with_context(|| format!("failed to write {}", target.display()))
        }
        None => {
            print!("{code}");
            Ok(())
        }
    }
}

fn check_one(path: &Path) -> Result<()> {
    let source = read(path)?;
    let filename = path.display().to_string();
    let regions = if is_component_path(&filename) {
        script_regions(&source)
    } else {
        let lang = Lang::from_path(&filename)
            .with_context(|| format!("unsupported file type: {filename}"))?;
        vec![ScriptRegion::whole(&source, lang)]
    };
    for region in &regions {
        let text = source
            .get(region.start..region.end)
            .context("script region outside the file")?;
        if contains_sigil(text) {
            parse_script(text, &filename, region.lang)?;
        }
    }
    eprintln!("OK: {filename}");
    Ok(())
}

/// `path` without a leading root or `..` components, for mirroring into an
/// output directory.
fn relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_transform_flags() {
        let cli = Cli::try_parse_from([
            "rfx",
            "transform",
            "src",
            "--out-dir",
            "dist",
            "--ignore",
            "$useRoute",
            "--counting",
        ])
        .unwrap();
        let Commands::Transform {
            inputs,
            out_dir,
            config,
            ..
        } = cli.command
        else {
            panic!("expected transform");
        };
        assert_eq!(inputs, vec![PathBuf::from("src")]);
        assert_eq!(out_dir, Some(PathBuf::from("dist")));
        let options = config.options().unwrap();
        assert_eq!(options.resolution, Resolution::Counting);
        assert!(options.ignore_list().contains(&"useRoute".to_string()));
    }

    #[test]
    fn relative_drops_roots_and_parents() {
        assert_eq!(
            relative(Path::new("../src/./a.ts")),
            PathBuf::from("src/a.ts")
        );
        assert_eq!(relative(Path::new("/abs/b.vue")), PathBuf::from("abs/b.vue"));
    }
}
