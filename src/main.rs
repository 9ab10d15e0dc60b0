use std::{
    io::{BufRead, Write},
    path::Path,
    process::ExitCode,
    sync::Arc,
};

use clap::Parser;
use docqa::{
    Error,
    FormatStyle,
    QaConfig,
    Result,
    Session,
    format::Answer,
    synthesis::CommandGenerator,
};
use kdam::{BarExt, tqdm};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCQA_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let config = resolve_config(&cli)?;
    let mut builder = Session::builder().config(config).style(if cli.html {
        FormatStyle::Html
    } else {
        FormatStyle::Plain
    });
    if let Some(command_line) = &cli.generator_cmd {
        builder = builder.generator(Arc::new(CommandGenerator::parse(command_line)?));
    }
    let mut session = builder.build()?;

    match &cli.command {
        Command::Ask(args) => {
            index_document(&mut session, &args.document)?;
            let question = args.question_text();
            if cli.json {
                print_json_answers(&session, &session.ask(&question)?)?;
            } else {
                print!("{}", session.ask_formatted(&question)?);
            }
        }
        Command::Chat(args) => {
            index_document(&mut session, &args.document)?;
            cmd_chat(&session, cli.json)?;
        }
        Command::Chunks(args) => {
            index_document(&mut session, &args.document)?;
            cmd_chunks(&session, cli.json)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

/// File config first, then command-line overrides, validated once at the end.
fn resolve_config(cli: &Cli) -> Result<QaConfig> {
    let mut config = match &cli.config {
        Some(path) => QaConfig::from_file(path)?,
        None => QaConfig::default(),
    };

    if let Some(mode) = cli.retrieval {
        config.retrieval_mode = mode.into();
    }
    if let Some(mode) = cli.answer_mode {
        config.answer_mode = mode.into();
    }
    if let Some(k) = cli.top_k {
        config.top_k = k;
    }
    if let Some(size) = cli.chunk_size {
        config.chunk_size = size;
    }
    if let Some(overlap) = cli.chunk_overlap {
        config.chunk_overlap = overlap;
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }

    config.validate()?;
    Ok(config)
}

fn index_document(session: &mut Session, path: &Path) -> Result<()> {
    let mut spinner = tqdm!(
        desc = format!("Processing {}", path.display()),
        leave = false
    );
    let _ = spinner.refresh();
    let result = session.load_path(path);
    let _ = spinner.clear();

    let chunks = result?;
    eprintln!(
        "Document '{}' processed successfully ({chunks} chunks).",
        session.document_name().unwrap_or_default()
    );
    Ok(())
}

fn cmd_chat(session: &Session, json: bool) -> Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match session.ask(&line) {
            Ok(answers) if json => print_json_answers(session, &answers)?,
            Ok(answers) => println!("{}", session.render(&answers)),
            // One bad question must not end the session.
            Err(e @ (Error::EmptyQuestion | Error::Model(_))) => {
                tracing::debug!(error = %e, "question failed");
                eprintln!("{}", e.user_message());
            }
            Err(e) => return Err(e),
        }
        std::io::stdout().flush()?;
    }
    Ok(())
}

fn cmd_chunks(session: &Session, json: bool) -> Result<()> {
    let chunks = session.chunks();
    if json {
        println!("{}", serde_json::to_string_pretty(chunks)?);
        return Ok(());
    }

    for chunk in chunks {
        match chunk.page {
            Some(page) => println!(
                "--- chunk {} (page {page}, {} chars) ---",
                chunk.index,
                chunk.text.chars().count()
            ),
            None => println!(
                "--- chunk {} ({} chars) ---",
                chunk.index,
                chunk.text.chars().count()
            ),
        }
        println!("{}", chunk.text.trim_end());
    }
    println!("\n{} chunk(s)", chunks.len());
    Ok(())
}

fn print_json_answers(session: &Session, answers: &[Answer]) -> Result<()> {
    let value = serde_json::json!({
        "document": session.document_name(),
        "answers": answers,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
