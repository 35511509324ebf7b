mod api;
mod cli;
mod config;
mod transcript;
mod view;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "userdesk", about = "Manage users of a REST users API from the terminal")]
pub struct Args {
    #[arg(long, env = "API_URL", help = "Base URL of the users API")]
    pub api_url: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(short = 'c', long = "command", value_name = "CMD", action = clap::ArgAction::Append, help = "Run a shell command (e.g. '/delete 3') and exit; repeatable")]
    pub commands: Vec<String>,

    #[arg(long, help = "Session transcripts directory")]
    pub transcripts_dir: Option<PathBuf>,

    #[arg(long, help = "Do not write a session transcript")]
    pub no_transcript: bool,

    #[arg(long, help = "Debug output (print resolved settings)")]
    pub debug: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    // CLI overrides
    cfg.override_api_url(args.api_url.as_deref());
    if let Some(dir) = &args.transcripts_dir {
        cfg.transcript.dir = Some(dir.clone());
    }
    if args.no_transcript {
        cfg.transcript.enabled = Some(false);
    }

    if let Err(errors) = cfg.validate() {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(anyhow::anyhow!(
            "Invalid configuration: {}",
            details.join("; ")
        ));
    }

    let api = cfg.resolved_api_url().map(api::HttpClient::new);

    if args.debug {
        match &api {
            Some(client) => eprintln!("[DEBUG] API URL: {}", client.base_url()),
            None => eprintln!("[DEBUG] API URL: <not set>"),
        }
        eprintln!("[DEBUG] Transcripts enabled: {}", cfg.transcripts_enabled());
        eprintln!("[DEBUG] History file: {:?}", cfg.history_path());
    }

    let root = std::env::current_dir()?;
    let session_id = uuid::Uuid::new_v4().to_string();

    let mut view = view::UserManagementView::new(api);
    if cfg.transcripts_enabled() {
        let transcripts_dir = cfg.transcripts_dir(&root);
        std::fs::create_dir_all(&transcripts_dir)?;
        let transcript_path = transcripts_dir.join(format!("{}.jsonl", session_id));
        let mut transcript = transcript::Transcript::new(&transcript_path, &session_id)?;
        let _ = transcript.session_start(cfg.resolved_api_url());
        if args.debug {
            eprintln!("[DEBUG] Transcript: {}", transcript.path.display());
        }
        view = view.with_transcript(transcript);
    }
    view.mount();

    let mut ctx = cli::Context {
        view,
        session_id,
        history_path: cfg.history_path(),
    };

    if args.commands.is_empty() {
        cli::run_repl(ctx)
    } else {
        cli::run_batch(&mut ctx, &args.commands, &mut std::io::stdout())
    }
}
