// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Retina-Session command-line client
//!
//! Signs in against Firebase Authentication, keeps the local session cache
//! in sync with the remote record store, and records scans and viewed
//! education topics from the terminal.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use retina_session::{
    config::{Config, LogFormat},
    db::RecordStore,
    models::{topic::topic_by_index, Role, ScanCandidate, SessionState},
    persistence::FilePersistence,
    services::{FirebaseAuth, InteractivePrompt, SignUpRequest},
    time_utils::format_millis_rfc3339,
    RetryPolicy, SessionStore,
};
use std::io::BufRead;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type Store = SessionStore<FirebaseAuth<Arc<FilePersistence>>, RecordStore, Arc<FilePersistence>>;

#[derive(Debug, Parser)]
#[command(name = "retina-session", version, about = "Diabetic retinopathy screening session client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the signed-in user, role and profile summary
    Status,
    /// Sign in with email/password, or with Google
    Login {
        #[arg(long, conflicts_with_all = ["email", "password"])]
        google: bool,
        #[arg(long, required_unless_present = "google")]
        email: Option<String>,
        #[arg(long, required_unless_present = "google")]
        password: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    Logout,
    /// Switch between patient and clinician
    Role { role: Role },
    /// List scan history, newest first
    History,
    /// Record a screening result
    Scan {
        #[arg(long)]
        label: String,
        #[arg(long)]
        confidence: f64,
        #[arg(long)]
        severity: u32,
    },
    /// Mark an education topic as read, by title or index
    Topic { topic: String },
}

/// Reads a Google ID token from the terminal.
struct TerminalPrompt;

impl InteractivePrompt for TerminalPrompt {
    fn google_id_token(&self) -> Option<String> {
        eprintln!("Paste a Google ID token (empty to cancel):");
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).ok()?;
        Some(line.trim().to_string()).filter(|token| !token.is_empty())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_logging(config.log_format);

    let local = Arc::new(
        FilePersistence::open(&config.cache_path).with_context(|| {
            format!("Failed to open session cache {}", config.cache_path.display())
        })?,
    );

    let auth = FirebaseAuth::connect(&config, local.clone())
        .await
        .context("Failed to initialize Firebase Auth")?
        .with_prompt(Arc::new(TerminalPrompt));

    let remote = RecordStore::connect(&config)
        .await
        .context("Failed to connect to remote record store")?;
    tracing::info!(backend = ?config.remote_backend, "Remote record store ready");

    let store = SessionStore::init(auth, remote, local, RetryPolicy::from_config(&config));
    let state = store.ready().await;

    let result = run(cli.command, &store, state).await;
    store.flush().await;
    result
}

async fn run(command: Command, store: &Store, state: SessionState) -> anyhow::Result<()> {
    match command {
        Command::Status => print_status(&state),
        Command::Login {
            google,
            email,
            password,
        } => {
            if google {
                store.sign_in_interactive().await?;
            } else {
                let (Some(email), Some(password)) = (email, password) else {
                    bail!("--email and --password are required");
                };
                store.sign_in_with_password(&email, &password).await?;
            }
            print_status(&store.changed_since(state.generation).await);
        }
        Command::Signup {
            name,
            email,
            password,
            confirm_password,
        } => {
            let request = SignUpRequest {
                name,
                email,
                password,
                confirm_password,
            };
            store.identity_provider().sign_up(&request).await?;
            print_status(&store.changed_since(state.generation).await);
        }
        Command::Logout => {
            store.sign_out().await?;
            store.changed_since(state.generation).await;
            println!("Signed out");
        }
        Command::Role { role } => {
            store.set_role(role);
            println!("Role: {role}");
        }
        Command::History => print_history(&state),
        Command::Scan {
            label,
            confidence,
            severity,
        } => {
            let candidate = ScanCandidate::new(label, confidence, severity);
            match store.add_scan(candidate).context("Invalid scan")? {
                Some(scan) => println!("Recorded scan {}", scan.id),
                None => bail!("Sign in to record scans"),
            }
        }
        Command::Topic { topic } => {
            let title = match topic.parse::<usize>() {
                Ok(index) => topic_by_index(index)
                    .with_context(|| format!("No education topic at index {index}"))?
                    .to_string(),
                Err(_) => topic,
            };
            match store.mark_topic_viewed(&title) {
                Some(_) => println!("Marked \"{title}\" as read"),
                None if state.is_authenticated() => println!("\"{title}\" already read"),
                None => bail!("Sign in to track topics"),
            }
        }
    }
    Ok(())
}

fn print_status(state: &SessionState) {
    match state.user() {
        Some(user) => {
            println!("Signed in as {}", user.label());
            if let Some(email) = &user.email {
                println!("Email: {email}");
            }
            if let Some(created_at) = &user.created_at {
                println!("Member since: {created_at}");
            }
        }
        None => println!("Not signed in"),
    }
    println!("Role: {}", state.role);
    match serde_json::to_string_pretty(&state.summary()) {
        Ok(summary) => println!("{summary}"),
        Err(e) => tracing::warn!(error = %e, "Failed to render summary"),
    }
}

fn print_history(state: &SessionState) {
    if state.scans.is_empty() {
        println!("No scans recorded");
        return;
    }
    for scan in &state.scans {
        let when = format_millis_rfc3339(scan.timestamp).unwrap_or_else(|| scan.timestamp.to_string());
        println!(
            "{when}  {:<24} confidence {:.1}%  stage {}",
            scan.label,
            scan.confidence * 100.0,
            scan.severity
        );
    }
}

/// Initialize logging to stderr, JSON-formatted when requested.
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("retina_session=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
