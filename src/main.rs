use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

mod config;
mod diff;
mod encoding;
mod extract;
mod files;
mod logging;
mod patterns;
mod pipeline;
mod report;
mod rewrite;
mod scan;
mod source;

use config::{CliSettings, Settings};
use encoding::EncodingStrategy;
use patterns::LayerPatterns;
use source::MemorySource;

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Fix(cmd) => handle_fix(cmd)?,
        Command::Scan(cmd) => handle_scan(cmd)?,
        Command::Log(cmd) => handle_log(cmd)?,
        Command::Filter(cmd) => handle_filter(cmd)?,
    }

    Ok(())
}

fn handle_fix(cmd: FixCommand) -> Result<()> {
    let Some(root) = resolve_root(cmd.common.root.as_deref())? else {
        return Ok(());
    };
    let mut cli_settings = cmd.common.cli_settings();
    cli_settings.no_backup = cmd.no_backup;
    cli_settings.dry_run = cmd.dry_run;
    let settings = config::resolve_settings(&root, cmd.common.config.as_deref(), &cli_settings)?;
    if !cmd.common.json {
        print_command_summary("fix", &root, &settings)?;
    }

    let patterns = LayerPatterns::new()?;
    let report = pipeline::fix_folder(&root, &settings, &patterns, !cmd.common.json)?;
    if cmd.common.json {
        println!("{}", report::render_json(&report)?);
    } else {
        print!("{}", report::render_fix(&report));
    }

    if !report.failures.is_empty() {
        bail!("{} file(s) could not be processed", report.failures.len());
    }
    Ok(())
}

fn handle_scan(cmd: ScanCommand) -> Result<()> {
    let Some(root) = resolve_root(cmd.common.root.as_deref())? else {
        return Ok(());
    };
    let cli_settings = cmd.common.cli_settings();
    let settings = config::resolve_settings(&root, cmd.common.config.as_deref(), &cli_settings)?;
    if !cmd.common.json {
        print_command_summary("scan", &root, &settings)?;
    }

    let patterns = LayerPatterns::new()?;
    let report = pipeline::scan_folder(&root, &settings, &patterns)?;
    if cmd.common.json {
        println!("{}", report::render_json(&report)?);
    } else {
        print!("{}", report::render_scan(&report));
    }

    if !report.failures.is_empty() {
        bail!("{} file(s) could not be scanned", report.failures.len());
    }
    Ok(())
}

fn handle_log(cmd: LogCommand) -> Result<()> {
    let entries = logging::read_recent(&cmd.root, cmd.tail)?;
    if entries.is_empty() {
        println!("change log is empty.");
        return Ok(());
    }
    for entry in entries {
        let counts = entry.counts;
        println!(
            "[{}] fixed={:<4} (front={}, behind={}, back={}, commented-out={}) unresolved={:<4} {}",
            entry.timestamp,
            entry.fixed,
            counts.front,
            counts.behind,
            counts.back,
            counts.commented_out,
            entry.unresolved,
            entry.path
        );
    }
    Ok(())
}

fn handle_filter(cmd: FilterCommand) -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("reading stdin")?;
    let patterns = LayerPatterns::new()?;
    let mut source = MemorySource::new(&cmd.name, input);
    let outcome = rewrite::update_layer_props(&mut source, &patterns, true)?;

    let mut stdout = io::stdout();
    stdout.write_all(source.text().as_bytes())?;
    stdout.flush()?;
    if source.writes() == 0 {
        eprintln!("no changes for {}", cmd.name);
    } else {
        eprintln!("fixed {} matches in {}", outcome.fixed(), cmd.name);
    }
    for record in &outcome.unresolved {
        eprintln!("unresolved: {}: {}", record.location, record.line.trim());
    }
    Ok(())
}

/// Uses the given folder, or asks for one. An empty answer cancels the run
/// without an error.
fn resolve_root(root: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(root) = root {
        return Ok(Some(root.to_path_buf()));
    }
    print_prompt("Project folder (leave empty to cancel): ")?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("reading project folder")?;
    Ok(parse_root_answer(&input))
}

fn parse_root_answer(input: &str) -> Option<PathBuf> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

fn print_prompt(message: &str) -> Result<()> {
    print!("{message}");
    io::stdout().flush()?;
    Ok(())
}

fn print_command_summary(command: &str, root: &Path, settings: &Settings) -> Result<()> {
    let encoding = EncodingStrategy::new(settings.encoding.as_deref())?;
    println!("command: {command}");
    println!("root: {}", root.display());
    println!(
        "mode: {}",
        if settings.dry_run || command == "scan" {
            "dry-run"
        } else {
            "apply"
        }
    );
    println!("marker: {}", settings.marker_extension);
    println!("max depth: {}", settings.traversal.max_depth);
    println!("encoding strategy: {}", encoding.describe());
    println!("include hidden: {}", settings.traversal.include_hidden);
    if !settings.traversal.exclude.is_empty() {
        println!("exclude globs: {:?}", settings.traversal.exclude);
    }
    if settings.no_backup {
        println!("backups disabled");
    }
    println!("---");
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "layerfix",
    version,
    about = "Rewrites legacy layer: \"front\"/\"back\"/\"behind\" values to VfxLayer constants"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fix every entity and script under a project folder.
    Fix(FixCommand),
    /// Report what would be fixed without writing anything.
    Scan(ScanCommand),
    /// Show recent entries from a project's change log.
    Log(LogCommand),
    /// Fix a single file read from stdin and write the result to stdout.
    Filter(FilterCommand),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// Project folder; prompted for when omitted.
    #[arg(value_name = "ROOT", value_hint = ValueHint::DirPath)]
    root: Option<PathBuf>,
    /// Settings file (YAML, or JSON by extension). Defaults to ROOT/layerfix.yaml.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    #[arg(long = "max-depth", value_name = "N")]
    max_depth: Option<usize>,
    /// Do not descend into folders whose name starts with a dot.
    #[arg(long = "skip-hidden", action = ArgAction::SetTrue)]
    skip_hidden: bool,
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,
    /// Extension of the file that marks a project folder.
    #[arg(long, value_name = "EXT")]
    marker: Option<String>,
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

impl CommonArgs {
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            max_depth: self.max_depth,
            skip_hidden: self.skip_hidden,
            exclude: self.exclude.clone(),
            marker_extension: self.marker.clone(),
            encoding: self.encoding.clone(),
            ..CliSettings::default()
        }
    }
}

#[derive(Debug, Args)]
struct FixCommand {
    #[command(flatten)]
    common: CommonArgs,
    /// Preview the changes as a diff instead of writing them.
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,
    #[arg(long = "no-backup", action = ArgAction::SetTrue)]
    no_backup: bool,
}

#[derive(Debug, Args)]
struct ScanCommand {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct LogCommand {
    #[arg(value_name = "ROOT", default_value = ".", value_hint = ValueHint::DirPath)]
    root: PathBuf,
    #[arg(long, default_value_t = 20)]
    tail: usize,
}

#[derive(Debug, Args)]
struct FilterCommand {
    /// File name used to pick the file kind (.entity or .hx) and in labels.
    #[arg(long, value_name = "NAME")]
    name: String,
}
