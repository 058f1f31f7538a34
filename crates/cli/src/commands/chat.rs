//! `paperdesk chat`: Analyze a paper and discuss it.
//!
//! Free text asks a follow-up question. Slash commands:
//! `/speak`, `/summary`, `/save <path>`, `/open <pdf>`, `/reset`, `/help`, `/quit`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use paperdesk_assistant::{Action, Assistant, NoticeLevel, Report, narration};
use paperdesk_core::document::PdfUpload;
use paperdesk_core::event::DomainEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

type CmdResult<T> = Result<T, Box<dyn std::error::Error>>;

pub async fn run(
    config_path: Option<&Path>,
    pdf: PathBuf,
    quiet: bool,
    questions: Vec<String>,
) -> CmdResult<()> {
    let mut config = super::load_config(config_path)?;
    if quiet {
        config.narration.enabled = false;
    }

    let client = paperdesk_providers::build_client(&config).map_err(|e| {
        format!(
            "No model endpoint available: {e}\n  Put ANTHROPIC_API_KEY in .env, or point PAPERDESK_RELAY_URL at a running `paperdesk serve`."
        )
    })?;
    let engine = narration::engine_from_config(&config.narration);
    let assistant = Arc::new(Assistant::new(client, engine, &config));
    spawn_event_log(&assistant);

    println!();
    println!("  PaperDesk");
    println!("  Endpoint:  {}", assistant.client_name());
    println!("  Model:     {}", config.models.default_model);
    println!(
        "  Narration: {}",
        if assistant.narration().is_available() {
            assistant.narration().engine_name().to_string()
        } else {
            "off".to_string()
        }
    );
    println!();

    if !open_paper(&assistant, &pdf).await? {
        return Err("Could not load the paper. See above for details.".into());
    }

    if !questions.is_empty() {
        for question in questions {
            println!("  You > {question}");
            print_report(&assistant.perform(Action::Ask(question)).await);
        }
        assistant.narration().stop();
        return Ok(());
    }

    interactive(&assistant).await?;
    assistant.narration().stop();
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn interactive(assistant: &Assistant) -> CmdResult<()> {
    println!("  Ask a question about the paper, or type /help.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt()?;
            continue;
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/help" => print_help(),
            "/speak" => print_report(&assistant.perform(Action::ToggleSpeech).await),
            "/reset" => print_report(&assistant.perform(Action::Reset).await),
            "/summary" => {
                let status = assistant.status();
                if status.summary.is_empty() {
                    println!("  No questions asked yet.");
                } else {
                    println!("  {}", status.summary);
                }
            }
            "/save" => {
                if arg.is_empty() {
                    eprintln!("  [Error] Usage: /save <path>");
                } else {
                    save_transcript(assistant, Path::new(arg)).await;
                }
            }
            "/open" => {
                if arg.is_empty() {
                    eprintln!("  [Error] Usage: /open <pdf>");
                } else {
                    print_report(&assistant.perform(Action::Reset).await);
                    open_paper(assistant, Path::new(arg)).await?;
                }
            }
            _ if command.starts_with('/') => {
                eprintln!("  [Error] Unknown command {command}. Type /help.");
            }
            _ => {
                eprint!("  ...");
                let report = assistant.perform(Action::Ask(line.to_string())).await;
                eprint!("\r     \r");
                print_report(&report);
            }
        }

        prompt()?;
    }

    Ok(())
}

/// Upload and analyze `path`. Returns `false` when either step failed.
async fn open_paper(assistant: &Assistant, path: &Path) -> CmdResult<bool> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("  [Error] Cannot read {}: {e}", path.display());
            return Ok(false);
        }
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    eprint!("  Extracting text from {file_name}...");
    let report = assistant
        .perform(Action::Upload {
            media_type: PdfUpload::media_type_for(&file_name).to_string(),
            file_name,
            bytes,
        })
        .await;
    eprintln!();
    print_report(&report);
    if report.failed() {
        return Ok(false);
    }

    eprint!("  Analyzing...");
    let report = assistant.perform(Action::Analyze).await;
    eprintln!();
    print_report(&report);
    Ok(!report.failed())
}

async fn save_transcript(assistant: &Assistant, path: &Path) {
    let snapshot = assistant.snapshot();
    if !snapshot.session.has_paper() {
        eprintln!("  [Error] Nothing to save yet.");
        return;
    }
    match tokio::fs::write(path, snapshot.session.transcript()).await {
        Ok(()) => println!("  Saved transcript to {}", path.display()),
        Err(e) => eprintln!("  [Error] Cannot write {}: {e}", path.display()),
    }
}

fn print_report(report: &Report) {
    for notice in &report.notices {
        match notice.level {
            NoticeLevel::Info => println!("  {}", notice.message),
            NoticeLevel::Error => eprintln!("  [Error] {}", notice.message),
        }
    }
    if let Some(reply) = &report.reply {
        println!();
        for line in reply.lines() {
            println!("  Assistant > {line}");
        }
        println!();
    }
}

fn print_help() {
    println!("  /speak         Stop narration, or replay the latest reply");
    println!("  /summary       Show the discussion summary");
    println!("  /save <path>   Write the transcript as Markdown");
    println!("  /open <pdf>    Reset and load another paper");
    println!("  /reset         Start over");
    println!("  /quit          Leave");
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn spawn_event_log(assistant: &Arc<Assistant>) {
    let mut rx = assistant.events().subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event log lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event.as_ref() {
                DomainEvent::PaperLoaded { title, text_chars, .. } => {
                    debug!(title = %title, text_chars, "event: paper loaded")
                }
                DomainEvent::AnalysisCompleted { analysis_chars, .. } => {
                    debug!(analysis_chars, "event: analysis completed")
                }
                DomainEvent::TurnRecorded { question_count, .. } => {
                    debug!(question_count, "event: turn recorded")
                }
                DomainEvent::SessionReset { epoch, .. } => debug!(epoch, "event: session reset"),
                DomainEvent::NarrationChanged { speaking, generation, .. } => {
                    debug!(speaking, generation, "event: narration changed")
                }
                DomainEvent::ActionFailed { action, error_message, .. } => {
                    debug!(action = %action, error = %error_message, "event: action failed")
                }
            }
        }
    });
}
