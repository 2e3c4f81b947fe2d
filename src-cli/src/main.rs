//! procqa - ask questions about internal process PDFs, answered by a local Ollama model.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pqa_ai::session::{Collaborators, QaSession};
use pqa_core::config::AppConfig;
use pqa_core::error::AppError;
use procqa::{
    ai_health_check, index_status_json, parse_command, process_paths, render_history, Command,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Question answering over uploaded process documents
#[derive(Parser, Debug)]
#[command(name = "procqa")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON config file; PQA_* environment variables override it
    #[arg(short, long, env = "PQA_CONFIG")]
    config: Option<PathBuf>,

    /// Reuse the index left in the index directory by a previous run
    #[arg(long)]
    resume: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// PDF files to process before the prompt opens
    pdfs: Vec<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("pqa_core=debug,pqa_ai=debug,procqa=debug")
        } else {
            EnvFilter::new("pqa_core=warn,pqa_ai=warn,procqa=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(args: Args) -> Result<(), AppError> {
    let cfg = AppConfig::load(args.config.as_deref())?;
    info!(
        index_dir = %cfg.index_dir.display(),
        embed_model = %cfg.embed_model,
        chat_model = %cfg.chat_model,
        "configuration loaded"
    );

    let collab = Collaborators::local(&cfg)?;
    let mut session = QaSession::new(cfg.clone(), collab)?;

    if args.resume {
        if let Some(handle) = session.resume_existing_index()? {
            println!(
                "Resumed index generation {} ({} chunks from {})",
                handle.generation,
                handle.chunk_count,
                handle.sources.join(", ")
            );
        }
    }
    if !args.pdfs.is_empty() {
        println!("{}", process_paths(&mut session, &args.pdfs));
    }

    let stdin = io::stdin();
    let mut out = io::stdout();
    loop {
        print!("> ");
        out.flush().map_err(|e| {
            AppError::new("CLI_IO_FAILED", "Failed to write to stdout").with_details(e.to_string())
        })?;

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(|e| {
            AppError::new("CLI_IO_FAILED", "Failed to read from stdin").with_details(e.to_string())
        })?;
        if read == 0 {
            break;
        }

        match parse_command(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Process(paths) => println!("{}", process_paths(&mut session, &paths)),
            Command::History => println!("{}", render_history(session.history())),
            Command::Status => println!("{}", index_status_json(&session)?),
            Command::Health => match ai_health_check(&cfg) {
                Ok(status) => println!("{}", status.message),
                Err(e) => println!("{}", e.to_user_string()),
            },
            Command::Ask(question) => println!("{}", session.ask(&question)),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.to_user_string());
            ExitCode::FAILURE
        }
    }
}
