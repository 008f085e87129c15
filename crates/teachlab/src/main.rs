//! # teachlab
//!
//! Interactive console for the classroom simulator — create a session, type
//! teacher turns, watch the class react, inject chaos, end with a report.

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use teachlab_api::{CHAOS_EVENT_IDS, SessionReport};
use teachlab_client::{ClassroomSession, ClientError, NullSink, SessionStore, StoreEvent};
use teachlab_core::session::SessionConfig;

/// Classroom simulation console.
#[derive(Parser, Debug)]
#[command(name = "teachlab", about = "Practice teaching against a simulated classroom")]
struct Cli {
    /// Subject area.
    #[arg(long, default_value = "Biology")]
    subject: String,

    /// Lesson topic.
    #[arg(long, default_value = "Photosynthesis")]
    topic: String,

    /// Grade level.
    #[arg(long, default_value = "7th grade")]
    grade_level: String,

    /// Settings file (defaults to ~/.teachlab/settings.json).
    #[arg(long)]
    settings: Option<std::path::PathBuf>,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            subject: self.subject.clone(),
            topic: self.topic.clone(),
            grade_level: self.grade_level.clone(),
        }
    }
}

/// Print store changes as they happen: responses, hints, chaos, errors.
async fn watch_store(store: Arc<SessionStore>) {
    let mut rx = store.subscribe();
    let mut printed_entries = 0usize;
    let mut last_error: Option<String> = None;
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        };
        match event {
            StoreEvent::Conversation => {
                let log = store.conversation();
                for entry in log.iter().skip(printed_entries) {
                    let annotation = match (entry.emotion, entry.engagement) {
                        (Some(emotion), Some(engagement)) => {
                            format!("  ({emotion}, engagement {engagement})")
                        }
                        _ => String::new(),
                    };
                    println!("{}: {}{annotation}", entry.speaker, entry.text);
                }
                printed_entries = log.len();
            }
            StoreEvent::Hint => {
                if let Some(hint) = store.coaching_hint() {
                    println!("  [coach] {hint}");
                }
            }
            StoreEvent::Chaos => {
                let chaos = store.chaos();
                if !chaos.active {
                    println!("  [chaos resolved]");
                }
            }
            StoreEvent::Connection => {
                let error = store.error();
                if error != last_error {
                    if let Some(ref message) = error {
                        println!("  [!] {message}");
                    }
                    last_error = error;
                }
            }
            StoreEvent::Turn => {
                let avg = store.class_averages();
                println!(
                    "  [turn {}] class engagement {} / comprehension {}",
                    store.turn_count(),
                    avg.engagement,
                    avg.comprehension
                );
            }
            _ => {}
        }
    }
}

fn print_report(report: &SessionReport, store: &SessionStore) {
    println!("\n── session report ─────────────────────────────");
    let summary = store.turn_summary();
    println!(
        "{} teacher turns, {} student responses",
        summary.teacher_turns, summary.student_responses
    );
    for entry in &report.timeline {
        println!("  {}. {}: {}", entry.turn, entry.speaker, entry.text);
    }
    if let Some(ref feedback) = report.feedback {
        println!("\nfeedback: {feedback}");
    }
}

fn print_help() {
    println!("  <text>            send a teacher turn");
    println!("  /chaos            list chaos scenarios");
    println!("  /chaos <id>       inject a disruption");
    println!("  /status           roster snapshot");
    println!("  /end              end the session and print the report");
}

fn print_status(store: &SessionStore) {
    for student in store.students() {
        println!(
            "  {:<8} engagement {:>3}  comprehension {:>3}  {}",
            student.id.display_name(),
            student.engagement,
            student.comprehension,
            student.emotional_state
        );
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match cli.settings {
        Some(ref path) => Arc::new(
            teachlab_settings::load_settings_from_path(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
        ),
        None => teachlab_settings::get_settings(),
    };

    let config = cli.session_config();
    println!(
        "starting session: {} — {} ({})",
        config.subject, config.topic, config.grade_level
    );

    // Audio clips are discarded in console mode
    let session = ClassroomSession::begin(&settings, config, Arc::new(NullSink))
        .await
        .context("failed to create session")?;
    println!("session {} ready; /end to finish, /help for commands\n", session.session_id());

    let watcher = tokio::spawn(watch_store(Arc::clone(session.store())));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("stdin read failed")?,
            _ = tokio::signal::ctrl_c() => {
                println!("\ninterrupted, ending session");
                None
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(a, b)| (a, b.trim())) {
            ("/help", _) => print_help(),
            ("/status", _) => print_status(session.store()),
            ("/chaos", "") => {
                for id in CHAOS_EVENT_IDS {
                    println!("  {id}");
                }
            }
            ("/chaos", event_id) => match session.inject_chaos(event_id).await {
                Ok(injection) => {
                    if let Some(label) = injection.event.label {
                        println!("  [chaos: {label}]");
                    }
                }
                Err(e) => println!("  [!] chaos injection failed: {e}"),
            },
            ("/end" | "/quit", _) => break,
            _ => match session.send_teacher_input(line) {
                Ok(()) => {}
                Err(ClientError::NotConnected) => {
                    println!("  [!] not connected yet, try again in a moment");
                }
                Err(e) => println!("  [!] send failed: {e}"),
            },
        }
    }

    match session.end_session().await {
        Ok(report) => print_report(&report, session.store()),
        Err(e) => tracing::warn!(error = %e, "end-of-session report unavailable"),
    }

    watcher.abort();
    session.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("teachlab=warn")),
        )
        .init();

    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["teachlab"]);
        assert_eq!(cli.subject, "Biology");
        assert_eq!(cli.topic, "Photosynthesis");
        assert_eq!(cli.grade_level, "7th grade");
        assert!(cli.settings.is_none());
    }

    #[test]
    fn cli_custom_lesson() {
        let cli = Cli::parse_from([
            "teachlab",
            "--subject",
            "History",
            "--topic",
            "The Silk Road",
            "--grade-level",
            "9th grade",
        ]);
        let config = cli.session_config();
        assert_eq!(config.subject, "History");
        assert_eq!(config.topic, "The Silk Road");
        assert_eq!(config.grade_level, "9th grade");
    }

    #[test]
    fn cli_settings_path() {
        let cli = Cli::parse_from(["teachlab", "--settings", "/tmp/s.json"]);
        assert_eq!(cli.settings, Some(std::path::PathBuf::from("/tmp/s.json")));
    }
}
