use crate::{
    app::{App, CheckReport},
    game::GameId,
    index::IndexSources,
    profile::TextOnly,
    resolver::{Resolution, Source},
};
use anyhow::{bail, Result};
use serde::Serialize;
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    fn default_directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::Debug => "debug",
        }
    }
}

#[derive(Debug)]
struct GlobalOptions {
    format: OutputFormat,
    game: Option<GameId>,
    verbosity: Verbosity,
    assume_yes: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Check(String),
    Links {
        modlist: Option<String>,
        set: Option<(String, String)>,
    },
    GlobalLinks,
    Note {
        modlist: String,
        package_id: String,
        text: String,
    },
    Create {
        profile: PathBuf,
        name: String,
    },
    Adopt {
        modlist: String,
        profile: PathBuf,
    },
    Undo,
    Paths,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args)?;
    init_logging(global.verbosity);
    let command = parse_command(&tokens)?;

    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("truckmods v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => {
            let app = App::initialize(global.game)?;
            run_command(&app, command, &global)
        }
    }
}

fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut global = GlobalOptions {
        format: OutputFormat::Text,
        game: None,
        verbosity: Verbosity::Normal,
        assume_yes: false,
    };
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            tokens.extend(iter.by_ref().cloned());
            break;
        }
        if in_free_text(&tokens) {
            tokens.push(arg.to_string());
            continue;
        }
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };
        match flag {
            "--format" => {
                let value = inline.or_else(|| iter.next().cloned());
                let Some(value) = value else {
                    bail!("--format requires a value");
                };
                global.format = OutputFormat::parse(&value)
                    .ok_or_else(|| anyhow::anyhow!("Unknown format: {value}"))?;
            }
            "--game" => {
                let value = inline.or_else(|| iter.next().cloned());
                let Some(value) = value else {
                    bail!("--game requires a value");
                };
                global.game = Some(
                    GameId::parse(&value)
                        .ok_or_else(|| anyhow::anyhow!("Unknown game: {value}"))?,
                );
            }
            "-q" | "--quiet" => global.verbosity = Verbosity::Quiet,
            "--verbose" => global.verbosity = Verbosity::Verbose,
            "-y" | "--yes" => global.assume_yes = true,
            _ if arg.starts_with("-v") && !arg.starts_with("--") => {
                let count = arg.chars().filter(|ch| *ch == 'v').count();
                global.verbosity = if count >= 2 {
                    Verbosity::Debug
                } else {
                    Verbosity::Verbose
                };
            }
            _ => tokens.push(arg.to_string()),
        }
    }
    Ok((global, tokens))
}

// Everything after `note <modlist> <package>` is note text.
fn in_free_text(tokens: &[String]) -> bool {
    tokens.first().map(String::as_str) == Some("note") && tokens.len() >= 3
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    let command = match head.as_str() {
        "check" => CliCommand::Check(required(rest, 0, "check requires a modlist")?),
        "links" => parse_links(rest)?,
        "create" => CliCommand::Create {
            profile: PathBuf::from(required(rest, 0, "create requires a profile path")?),
            name: required(rest, 1, "create requires a modlist name")?,
        },
        "adopt" => CliCommand::Adopt {
            modlist: required(rest, 0, "adopt requires a modlist")?,
            profile: PathBuf::from(required(rest, 1, "adopt requires a profile path")?),
        },
        "note" => CliCommand::Note {
            modlist: required(rest, 0, "note requires a modlist")?,
            package_id: required(rest, 1, "note requires a package id")?,
            text: rest.get(2..).unwrap_or(&[]).join(" "),
        },
        "undo" => CliCommand::Undo,
        "paths" => CliCommand::Paths,
        "help" | "--help" | "-h" => CliCommand::Help,
        "version" | "--version" | "-V" => CliCommand::Version,
        other => bail!("Unknown command: {other} (see 'truckmods help')"),
    };
    Ok(command)
}

fn parse_links(args: &[String]) -> Result<CliCommand> {
    let mut modlist = None;
    let mut set = None;
    let mut global = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--set" => {
                let (Some(key), Some(url)) = (iter.next(), iter.next()) else {
                    bail!("--set requires a key and a url");
                };
                set = Some((key.to_string(), url.to_string()));
            }
            "--global" => global = true,
            value => modlist = Some(value.to_string()),
        }
    }
    if global && modlist.is_none() && set.is_none() {
        return Ok(CliCommand::GlobalLinks);
    }
    if modlist.is_none() && set.is_none() {
        bail!("links requires a modlist, --global, or --set <key> <url>");
    }
    Ok(CliCommand::Links { modlist, set })
}

fn required(args: &[String], index: usize, message: &str) -> Result<String> {
    args.get(index)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("{message}"))
}

fn run_command(app: &App, command: CliCommand, global: &GlobalOptions) -> Result<()> {
    match command {
        CliCommand::Check(name) => {
            let path = app.modlist_path(&name);
            let report = app.check_modlist(&path)?;
            print_check(&report, global.format)
        }
        CliCommand::Links { modlist, set } => {
            let modlist = modlist.map(|name| app.modlist_path(&name));
            if let Some((key, url)) = set {
                let path = app.set_link(modlist.as_deref(), &key, &url)?;
                println!("Saved link for {key} in {}", path.display());
                return Ok(());
            }
            let Some(modlist) = modlist else {
                return Ok(());
            };
            let report = app.check_modlist(&modlist)?;
            print_links(&report, global.format)
        }
        CliCommand::GlobalLinks => {
            let links = app.global_links();
            match global.format {
                OutputFormat::Json => println!("{}", links.to_json()?),
                OutputFormat::Text if links.is_empty() => println!("No game-wide links saved."),
                OutputFormat::Text => {
                    for (key, url) in links.iter() {
                        println!("{key} {url}");
                    }
                    println!("{} game-wide link(s)", links.len());
                }
            }
            Ok(())
        }
        CliCommand::Note {
            modlist,
            package_id,
            text,
        } => {
            let path = app.set_note(&app.modlist_path(&modlist), &package_id, &text)?;
            println!("Saved note for {package_id} in {}", path.display());
            Ok(())
        }
        CliCommand::Create { profile, name } => {
            let path = app.create_modlist_from_profile(&profile, &name, &TextOnly)?;
            println!("Created modlist {}", path.display());
            Ok(())
        }
        CliCommand::Adopt { modlist, profile } => {
            let modlist = app.modlist_path(&modlist);
            if app.config.confirm_profile_patch
                && !global.assume_yes
                && !confirm(&format!(
                    "Replace active mods in {} with {}?",
                    profile.display(),
                    modlist.display()
                ))?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let outcome = app.adopt_modlist(&modlist, &profile)?;
            match global.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
                OutputFormat::Text => {
                    println!("Patched {}", outcome.profile.display());
                    println!("Backup  {}", outcome.backup.display());
                    if !outcome.contiguous {
                        println!("Warning: non-mod lines inside the old block were replaced");
                    }
                    println!("Run 'truckmods undo' to restore the backup.");
                }
            }
            Ok(())
        }
        CliCommand::Undo => {
            let restored = app.undo_last_patch()?;
            println!(
                "Restored {} from {}",
                restored.profile.display(),
                restored.backup.display()
            );
            Ok(())
        }
        CliCommand::Paths => list_paths(app, global.format),
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn status_cell(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::Available {
            source: Source::Local,
            ..
        } => "local",
        Resolution::Available {
            source: Source::Remote,
            ..
        } => "workshop",
        Resolution::Missing => "MISSING",
    }
}

fn print_check(report: &CheckReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            for row in &report.rows {
                let matched = match &row.resolution {
                    Resolution::Available {
                        matched: Some(matched),
                        ..
                    } => format!(" -> {matched}"),
                    _ => String::new(),
                };
                println!(
                    "{position:>3} {status:<8} {name}{matched}",
                    position = row.position,
                    status = status_cell(&row.resolution),
                    name = row.entry.label(),
                );
                if let Some(note) = &row.note {
                    if !note.info.trim().is_empty() {
                        println!("            note: {}", note.info.trim());
                    }
                }
                if !row.resolution.is_available() {
                    if let Some(link) = &row.link {
                        println!("            get: {link}");
                    }
                }
            }
            println!(
                "{} local, {} workshop, {} missing",
                report.summary.available_local,
                report.summary.available_remote,
                report.summary.missing
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct LinkItem<'a> {
    package_id: &'a str,
    display_name: &'a str,
    url: Option<&'a str>,
}

fn print_links(report: &CheckReport, format: OutputFormat) -> Result<()> {
    let items: Vec<LinkItem<'_>> = report
        .rows
        .iter()
        .map(|row| LinkItem {
            package_id: &row.entry.package_id,
            display_name: &row.entry.display_name,
            url: row.link.as_deref(),
        })
        .collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text => {
            for item in items {
                println!("{} {}", item.display_name, item.url.unwrap_or("-"));
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    game: String,
    data_dir: String,
    modlist_dir: String,
    app_id: String,
    game_root: Option<String>,
    local_dirs: Vec<String>,
    content_dirs: Vec<String>,
    ledgers: Vec<String>,
}

fn list_paths(app: &App, format: OutputFormat) -> Result<()> {
    let sources: IndexSources = app.index_sources();
    let display = |paths: &[PathBuf]| -> Vec<String> {
        paths
            .iter()
            .map(|path| path.display().to_string())
            .collect()
    };
    let output = PathsOutput {
        game: app.game.game_id.display_name().to_string(),
        data_dir: app.game.data_dir.display().to_string(),
        modlist_dir: app.game.modlist_dir.display().to_string(),
        app_id: app.game.app_id().to_string(),
        game_root: app.game_root().map(|root| root.display().to_string()),
        local_dirs: display(&sources.local_dirs),
        content_dirs: display(&sources.content_dirs),
        ledgers: display(&sources.ledgers),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!("Game: {} (app {})", output.game, output.app_id);
            println!(
                "Install: {}",
                output.game_root.as_deref().unwrap_or("not found")
            );
            println!("Data: {}", output.data_dir);
            println!("Modlists: {}", output.modlist_dir);
            for dir in &output.local_dirs {
                println!("Local mods: {dir}");
            }
            for dir in &output.content_dirs {
                println!("Workshop content: {dir}");
            }
            for ledger in &output.ledgers {
                println!("Workshop ledger: {ledger}");
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("truckmods v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  truckmods check <modlist>               Show which mods are installed or missing");
    println!("  truckmods links <modlist>               Show download links for a modlist");
    println!("  truckmods links --global                Show game-wide download links");
    println!("  truckmods links [<modlist>] --set <key> <url>");
    println!("                                          Save a link (game-wide without a modlist)");
    println!("  truckmods note <modlist> <package> [text] Set a note on an entry (no text clears it)");
    println!("  truckmods create <profile.sii> <name>   Save a profile's active mods as a modlist");
    println!("  truckmods adopt <modlist> <profile.sii> Write a modlist into a profile");
    println!("  truckmods undo                          Restore the profile backed up by the last adopt");
    println!("  truckmods paths                         Show scanned locations");
    println!();
    println!("Global options:");
    println!("  --game <ets2|ats>                       Game to work with");
    println!("  --format <json|text>                    Output format");
    println!("  -y, --yes                               Do not ask before patching a profile");
    println!("  -q, --quiet                             Errors only");
    println!("  -v, -vv                                 More logging (RUST_LOG overrides)");
    println!("  --                                      Stop reading global options");
    println!("  -h, --help                              Show help");
    println!("  -V, --version                           Show version");
}
