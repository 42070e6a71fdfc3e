use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stepper_cli::command::{CommandAction, CommandHandler, CommandRequest, CommandResponse};
use stepper_cli::watcher::DEFAULT_DEBOUNCE_MS;
use stepper_cli::{serve, TraceWatcher};
use stepper_protocol::{
    serialize_json, BracketLevel, ElabLevel, FetchRequest, FetchResponse, FETCH_METHOD,
};
use stepper_session::{SessionConfig, TraceService, TraceServiceConfig};

#[derive(Parser)]
#[command(name = "stepper")]
#[command(about = "Step through recorded proof checking runs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read JSON command requests from stdin, one per line
    Serve(ServeArgs),

    /// Open a declaration and print a single view as JSON
    Show(ShowArgs),

    /// Print JSON Schemas for the wire types
    Schema,
}

#[derive(Args)]
struct LevelArgs {
    /// Elaboration level 0..=2 (overrides STEPPER_ELAB_LEVEL)
    #[arg(long)]
    elab_level: Option<u8>,

    /// Bracket level 0..=1 (overrides STEPPER_BRACKET_LEVEL)
    #[arg(long)]
    bracket_level: Option<u8>,

    /// Steps returned around each requested step
    #[arg(long, default_value_t = TraceServiceConfig::default().window)]
    window: usize,
}

#[derive(Args)]
struct ServeArgs {
    /// Declaration to open before reading requests (requires --file)
    #[arg(long, requires = "file")]
    decl: Option<String>,

    /// Trace file backing the session
    #[arg(long)]
    file: Option<PathBuf>,

    /// Reload the session when the trace file changes
    #[arg(long, requires = "file")]
    watch: bool,

    /// Quiet period before a file change triggers a reload
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    debounce_ms: u64,

    #[command(flatten)]
    levels: LevelArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum StreamArg {
    Proof,
    Unify,
}

#[derive(Args)]
struct ShowArgs {
    /// Declaration to open
    #[arg(long)]
    decl: String,

    /// Trace file backing the session
    #[arg(long)]
    file: PathBuf,

    /// Stream to display
    #[arg(long, value_enum, default_value = "proof")]
    stream: StreamArg,

    /// Step to jump to after opening
    #[arg(long)]
    step: Option<usize>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,

    #[command(flatten)]
    levels: LevelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await?,
        Commands::Show(args) => run_show(args).await?,
        Commands::Schema => run_schema()?,
    }

    Ok(())
}

fn session_config(levels: &LevelArgs) -> Result<SessionConfig> {
    let mut config = SessionConfig::from_env();
    if let Some(level) = levels.elab_level {
        config.elab_level = ElabLevel::try_from(level)?;
    }
    if let Some(level) = levels.bracket_level {
        config.bracket_level = BracketLevel::try_from(level)?;
    }
    Ok(config)
}

fn handler(levels: &LevelArgs) -> Result<CommandHandler> {
    let service = TraceService::new(TraceServiceConfig {
        window: levels.window,
    });
    Ok(CommandHandler::new(Arc::new(service), session_config(levels)?))
}

fn open_request(decl: &str, file: &Path) -> CommandRequest {
    CommandRequest::new(
        CommandAction::Open,
        json!({ "decl": decl, "file": file.display().to_string() }),
    )
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut handler = handler(&args.levels)?;
    let (tx, rx) = serve::intent_queue();

    if let (Some(decl), Some(file)) = (&args.decl, &args.file) {
        tx.send(serve::Intent::Request(open_request(decl, file)))
            .await
            .context("Failed to queue initial open")?;
    }

    let _watcher = match (&args.file, args.watch) {
        (Some(file), true) => Some(TraceWatcher::spawn(
            file,
            Duration::from_millis(args.debounce_ms),
            tx.clone(),
        )?),
        _ => None,
    };

    serve::spawn_reader(tokio::io::BufReader::new(tokio::io::stdin()), tx);
    let mut stdout = tokio::io::stdout();
    serve::run(&mut handler, rx, &mut stdout).await
}

async fn run_show(args: ShowArgs) -> Result<()> {
    let mut handler = handler(&args.levels)?;

    let mut response = handler.execute(open_request(&args.decl, &args.file)).await;
    if !response.is_error() && matches!(args.stream, StreamArg::Unify) {
        response = handler
            .execute(CommandRequest::bare(CommandAction::ViewUnify))
            .await;
    }
    if let (false, Some(step)) = (response.is_error(), args.step) {
        let jumped = handler
            .execute(CommandRequest::new(
                CommandAction::Jump,
                json!({ "step": step }),
            ))
            .await;
        // An out-of-range jump changes nothing; keep printing the view it left alone.
        if jumped.is_error() || jumped.data["changed"] != false {
            response = jumped;
        }
    }

    print_response(&response, args.pretty)?;
    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_response(response: &CommandResponse, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serialize_json(response)?
    };
    println!("{output}");
    Ok(())
}

fn run_schema() -> Result<()> {
    let fetch_request = schemars::schema_for!(FetchRequest);
    let fetch_response = schemars::schema_for!(FetchResponse);
    let command_request = schemars::schema_for!(CommandRequest);
    let schemas = json!({
        "method": FETCH_METHOD,
        "fetch_request": fetch_request,
        "fetch_response": fetch_response,
        "command_request": command_request,
    });
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}
