//! `dirtmpl`: compile an input directory into an output directory.
use anyhow::{Context, Result};
use clap::Parser;
use dirtmpl::ctx::{self, Ctx, Options};
use std::{env, ffi::OsString, path::PathBuf};

#[derive(Parser)]
#[command(name = "dirtmpl", about = "Deep directory templating", version)]
struct Cli {
    /// Input directory
    input: PathBuf,
    /// Output directory; emptied before each run
    output: PathBuf,

    /// Database file, relative to the input directory
    #[arg(long, default_value = ctx::DEFAULT_DB_FILE)]
    db_file: String,
    /// Database directory, relative to the input directory
    #[arg(long, default_value = ctx::DEFAULT_DB_DIR)]
    db_dir: String,
    /// Suffix marking files to render
    #[arg(long, default_value = ctx::DEFAULT_TEMPLATE_EXT)]
    template_ext: String,
    /// Template fragments directory, relative to the input directory
    #[arg(long, default_value = ctx::DEFAULT_TEMPLATES_DIR)]
    templates_dir: String,
    /// Copy the database sources to the output too
    #[arg(long)]
    keep_db: bool,
    /// Database key holding per-file entries, used by `get`
    #[arg(long, default_value = ctx::DEFAULT_IDS_KEY)]
    ids_key: String,
    #[arg(long, default_value = ctx::DEFAULT_LEFT_DELIM)]
    left_delim: String,
    #[arg(long, default_value = ctx::DEFAULT_RIGHT_DELIM)]
    right_delim: String,
    /// Fail on missing fields instead of rendering them empty
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let opts = Options {
        db_file: cli.db_file,
        db_dir: cli.db_dir,
        template_ext: cli.template_ext,
        templates_dir: cli.templates_dir,
        drop_db: !cli.keep_db,
        ids_key: cli.ids_key,
        left_delim: cli.left_delim,
        right_delim: cli.right_delim,
        strict: cli.strict,
    };
    let input = clean(&cli.input);
    let ctx = Ctx::new(&input, &clean(&cli.output), &opts)
        .with_search_path(search_path(&input.join("bin"))?);

    anyhow::ensure!(
        !ctx.input_dir.starts_with(&ctx.output_dir),
        "output directory {} would wipe the input",
        ctx.output_dir.display()
    );

    dirtmpl::util::recreate_dir(&ctx.output_dir).context("prepare output directory")?;
    dirtmpl::compile(&ctx)
}

/// Normalise separators and trailing slashes.
fn clean(p: &std::path::Path) -> PathBuf {
    p.components().collect()
}

/// `$PATH` extended with the input's `bin/`, when there is one.
fn search_path(bin: &std::path::Path) -> Result<Option<OsString>> {
    if !bin.is_dir() {
        return Ok(None);
    }
    let mut dirs: Vec<PathBuf> = env::var_os("PATH")
        .map(|p| env::split_paths(&p).collect())
        .unwrap_or_default();
    dirs.push(std::path::absolute(bin).context("resolve bin directory")?);
    env::join_paths(dirs)
        .map(Some)
        .context("extend PATH")
}
