use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use vision_contracts::events::EventWriter;
use vision_contracts::history::{GeneratedResult, HistoryStore};
use vision_contracts::models::{ModelRegistry, ModelSelector};
use vision_contracts::options::{AspectRatio, Resolution, StudioMode};
use vision_contracts::studio::{parse_command, StudioCommand, STUDIO_HELP_COMMANDS};
use vision_engine::{ActionOutcome, CredentialHost, GeminiClient, KeyStore, SessionController};

#[derive(Debug, Parser)]
#[command(
    name = "vision-studio",
    version,
    about = "Generate and edit images with Gemini, keeping a local history"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Directory holding the history file and the selected API key.
    #[arg(long, global = true, env = "VISION_STUDIO_HOME")]
    data_dir: Option<PathBuf>,
    /// Append session events (JSON lines) to this file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Per-request timeout in seconds. No timeout by default.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Edit(EditArgs),
    #[command(subcommand)]
    History(HistoryCommand),
    Models,
    Studio,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, default_value = "1:1")]
    aspect: AspectRatio,
    #[arg(long, default_value = "1K")]
    size: Resolution,
    /// Also write the image into this directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    List,
    Show { id: String },
    Delete { id: String },
    Download { id: String, dir: Option<PathBuf> },
}

type Studio = SessionController<GeminiClient, TerminalCredentialHost>;

/// Credential host backed by the terminal: a key is usable when one is
/// stored or exported, and selection reads a new key from stdin.
struct TerminalCredentialHost {
    keys: KeyStore,
}

impl CredentialHost for TerminalCredentialHost {
    fn has_usable_credential(&self) -> anyhow::Result<bool> {
        Ok(self.keys.resolve().is_some())
    }

    fn prompt_credential_selection(&self) -> anyhow::Result<()> {
        eprint!("Gemini API key (stored in the studio data dir): ");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read API key")?;
        if line.trim().is_empty() {
            bail!("no API key entered");
        }
        self.keys.store(&line)?;
        eprintln!("API key saved.");
        Ok(())
    }
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("vision-studio error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.global.data_dir.clone());
    match cli.command {
        Command::Generate(args) => run_generate(&cli.global, &data_dir, args),
        Command::Edit(args) => run_edit(&cli.global, &data_dir, args),
        Command::History(command) => run_history(&data_dir, command),
        Command::Models => {
            print_models(&ModelRegistry::default());
            Ok(0)
        }
        Command::Studio => run_studio(&cli.global, &data_dir),
    }
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::data_dir()
            .map(|dir| dir.join("vision-studio"))
            .unwrap_or_else(|| PathBuf::from(".vision-studio"))
    })
}

fn build_studio(global: &GlobalArgs, data_dir: &Path) -> Result<Studio> {
    let keys = KeyStore::in_dir(data_dir);
    let client = GeminiClient::new(keys.clone())
        .with_timeout(global.timeout_secs.map(Duration::from_secs));
    let history = HistoryStore::in_dir(data_dir);
    tracing::debug!(path = %history.path().display(), entries = history.len(), "history loaded");
    let mut studio = SessionController::new(history, client, TerminalCredentialHost { keys })?;
    if let Some(path) = global.events.as_ref() {
        studio = studio.with_events(EventWriter::new(path, session_id()));
    }
    Ok(studio)
}

fn apply_model(studio: &mut Studio, requested: Option<&str>) -> Result<()> {
    let selection = ModelSelector::new(Some(studio.registry().clone()))
        .select(requested)
        .map_err(anyhow::Error::msg)?;
    if let Some(reason) = selection.fallback_reason.as_deref() {
        eprintln!("{reason}");
    }
    studio.select_model(&selection.model.id);
    Ok(())
}

fn run_generate(global: &GlobalArgs, data_dir: &Path, args: GenerateArgs) -> Result<i32> {
    let mut studio = build_studio(global, data_dir)?;
    apply_model(&mut studio, args.model.as_deref())?;
    studio.set_mode(StudioMode::Generate);
    studio.set_aspect_ratio(args.aspect);
    studio.set_resolution(args.size);
    studio.set_prompt(args.prompt);
    let outcome = studio.submit();
    Ok(finish_one_shot(&mut studio, outcome, args.out.as_deref()))
}

fn run_edit(global: &GlobalArgs, data_dir: &Path, args: EditArgs) -> Result<i32> {
    let mut studio = build_studio(global, data_dir)?;
    apply_model(&mut studio, args.model.as_deref())?;
    studio.set_mode(StudioMode::Edit);
    if !studio.load_source_image(&args.image) {
        bail!(
            "{}",
            studio
                .state()
                .last_error
                .clone()
                .unwrap_or_else(|| format!("failed to read {}", args.image.display()))
        );
    }
    studio.set_prompt(args.prompt);
    let outcome = studio.submit();
    Ok(finish_one_shot(&mut studio, outcome, args.out.as_deref()))
}

fn finish_one_shot(studio: &mut Studio, outcome: ActionOutcome, out: Option<&Path>) -> i32 {
    report_outcome(studio, &outcome);
    let ActionOutcome::Created(id) = outcome else {
        return match outcome {
            ActionOutcome::Rejected => 2,
            _ => 1,
        };
    };
    if let Some(dir) = out {
        match studio.download_entry(&id, dir) {
            Some(path) => println!("saved {}", path.display()),
            None => {
                report_error(studio);
                return 1;
            }
        }
    }
    0
}

fn report_outcome(studio: &Studio, outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Created(id) => {
            if let Some(entry) = studio.history().get(id) {
                print_entry_line(entry);
                if let Some(citations) = entry.citations.as_ref() {
                    for citation in citations {
                        println!("  source: {} {}", citation.title, citation.uri);
                    }
                }
            }
        }
        ActionOutcome::Rejected => {
            let state = studio.state();
            if state.prompt_text.trim().is_empty() {
                eprintln!("Nothing to do: the prompt is empty.");
            } else if state.mode == StudioMode::Edit && state.source_image.is_none() {
                eprintln!("Nothing to do: pick a source image first.");
            } else {
                eprintln!("Another action is still running.");
            }
        }
        ActionOutcome::CredentialReselected => {
            eprintln!("The API key was rejected. Run the action again with the new key.");
        }
        ActionOutcome::Failed(message) => eprintln!("error: {message}"),
    }
}

fn report_error(studio: &Studio) {
    if let Some(message) = studio.state().last_error.as_deref() {
        eprintln!("error: {message}");
    }
}

fn run_history(data_dir: &Path, command: HistoryCommand) -> Result<i32> {
    let mut history = HistoryStore::in_dir(data_dir);
    match command {
        HistoryCommand::List => {
            if history.is_empty() {
                println!("No history yet.");
            }
            for entry in history.entries() {
                print_entry_line(entry);
            }
            Ok(0)
        }
        HistoryCommand::Show { id } => {
            let Some(entry) = history.get(&id) else {
                bail!("no history entry with id {id}");
            };
            println!("{}", serde_json::to_string_pretty(&entry_summary(entry)?)?);
            Ok(0)
        }
        HistoryCommand::Delete { id } => {
            if history.remove(&id)? {
                println!("deleted {id}");
                Ok(0)
            } else {
                eprintln!("no history entry with id {id}");
                Ok(1)
            }
        }
        HistoryCommand::Download { id, dir } => {
            let Some(entry) = history.get(&id) else {
                bail!("no history entry with id {id}");
            };
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            let path = vision_engine::download::export_entry(entry, &dir)?;
            println!("saved {}", path.display());
            Ok(0)
        }
    }
}

fn run_studio(global: &GlobalArgs, data_dir: &Path) -> Result<i32> {
    let mut studio = build_studio(global, data_dir)?;
    println!("Vision Studio. Type a prompt to run it, or /help for commands.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{}> ", status_line(&studio));
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        match parse_command(&line) {
            StudioCommand::Noop => {}
            StudioCommand::Submit { prompt } => {
                studio.set_prompt(prompt);
                println!("working...");
                let outcome = studio.submit();
                report_outcome(&studio, &outcome);
            }
            StudioCommand::SetMode(mode) => studio.set_mode(mode),
            StudioCommand::SetModel(alias) => {
                if studio.select_model(&alias).is_none() {
                    eprintln!("Unknown model '{alias}'.");
                    print_models(studio.registry());
                }
            }
            StudioCommand::SetAspectRatio(aspect_ratio) => studio.set_aspect_ratio(aspect_ratio),
            StudioCommand::SetResolution(resolution) => {
                if !studio.state().selected_model.supports_high_res {
                    eprintln!("Resolution only applies to high-resolution models; saved for later.");
                }
                studio.set_resolution(resolution);
            }
            StudioCommand::SetSource(path) => {
                if studio.load_source_image(Path::new(&path)) {
                    if let Some(source) = studio.state().source_image.as_ref() {
                        println!("source image: {path} ({})", source.mime_type);
                    }
                } else {
                    report_error(&studio);
                }
            }
            StudioCommand::ClearSource => studio.clear_source_image(),
            StudioCommand::History => {
                if studio.history().is_empty() {
                    println!("No history yet.");
                }
                for entry in studio.history().entries() {
                    print_entry_line(entry);
                }
            }
            StudioCommand::Delete(id) => {
                if studio.delete_entry(&id) {
                    println!("deleted {id}");
                } else if studio.state().last_error.is_some() {
                    report_error(&studio);
                } else {
                    eprintln!("no history entry with id {id}");
                }
            }
            StudioCommand::Download { id, dir } => {
                let dir = dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
                match studio.download_entry(&id, &dir) {
                    Some(path) => println!("saved {}", path.display()),
                    None => report_error(&studio),
                }
            }
            StudioCommand::Status => print_status(&studio),
            StudioCommand::Help => {
                for command in STUDIO_HELP_COMMANDS {
                    println!("  {command}");
                }
            }
            StudioCommand::Quit => break,
            StudioCommand::Invalid { message, .. } => eprintln!("{message}"),
            StudioCommand::Unknown { command, .. } => {
                eprintln!("Unknown command /{command}. Type /help for commands.")
            }
        }
    }
    Ok(0)
}

fn status_line(studio: &Studio) -> String {
    let state = studio.state();
    let mut parts = vec![
        state.mode.to_string(),
        state.selected_model.display_name.clone(),
        state.aspect_ratio.to_string(),
    ];
    if state.selected_model.supports_high_res {
        parts.push(state.resolution.to_string());
    }
    if state.mode == StudioMode::Edit && state.source_image.is_some() {
        parts.push("source".to_string());
    }
    format!("[{}]", parts.join(" | "))
}

fn print_status(studio: &Studio) {
    let state = studio.state();
    println!("mode:       {}", state.mode);
    println!(
        "model:      {} ({})",
        state.selected_model.display_name, state.selected_model.id
    );
    println!("aspect:     {}", state.aspect_ratio);
    println!("resolution: {}", state.resolution);
    println!(
        "source:     {}",
        state
            .source_image
            .as_ref()
            .map(|source| source.mime_type.as_str())
            .unwrap_or("none")
    );
    println!("history:    {} entries", studio.history().len());
    if let Some(message) = state.last_error.as_deref() {
        println!("last error: {message}");
    }
}

fn print_models(registry: &ModelRegistry) {
    for model in registry.list() {
        let tier = if model.supports_high_res {
            "1K/2K/4K, search grounding"
        } else {
            "standard"
        };
        println!(
            "{:<28} {:<14} {} [{}]",
            model.id, model.display_name, model.description, tier
        );
    }
}

fn print_entry_line(entry: &GeneratedResult) {
    println!(
        "{}  {}  {:<14} {}",
        entry.id,
        format_created_at(entry.created_at),
        entry.model_name,
        entry.prompt
    );
}

fn format_created_at(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|stamp| stamp.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Entry as JSON with the image payload replaced by its size.
fn entry_summary(entry: &GeneratedResult) -> Result<Value> {
    let mut value = serde_json::to_value(entry)?;
    if let Some(map) = value.as_object_mut() {
        map.insert(
            "imageData".to_string(),
            Value::String(format!("<omitted {} chars>", entry.image_data.len())),
        );
    }
    Ok(value)
}

fn session_id() -> String {
    format!("session-{}", Utc::now().format("%Y%m%dT%H%M%S%3f"))
}
