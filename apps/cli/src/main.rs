use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{ClientEvent, HttpVoteNotifier, RetryPolicy, VoteController, VoteNotifier};
use shared::domain::{AlumniId, ThreadId, VoteDirection};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[arg(long)]
    alumni_id: i64,
    #[arg(long)]
    thread_id: i64,
    /// Submissions per vote before giving up on the network.
    #[arg(long, default_value_t = 4)]
    attempts: u32,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Toggle an upvote.
    Up,
    /// Toggle a downvote.
    Down,
    Reply,
    /// Print the current tally as JSON.
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let args = Args::parse();

    let thread_id = ThreadId(args.thread_id);
    let notifier = Arc::new(HttpVoteNotifier::new(
        &args.server_url,
        AlumniId(args.alumni_id),
    )?);
    let seed = notifier
        .fetch_tally(thread_id)
        .await
        .with_context(|| format!("failed to load votes for thread {thread_id}"))?;

    let direction = match args.command {
        Command::Show => {
            println!("{}", serde_json::to_string_pretty(&seed)?);
            return Ok(());
        }
        Command::Up => VoteDirection::Up,
        Command::Down => VoteDirection::Down,
        Command::Reply => {
            let controller = VoteController::seed(notifier, seed, RetryPolicy::default());
            let mut events = controller.subscribe_events();
            controller.request_reply();
            if let Ok(ClientEvent::ReplyRequested { thread_id }) = events.try_recv() {
                println!("reply requested for thread {thread_id}");
            }
            controller.shutdown().await;
            return Ok(());
        }
    };

    let policy = RetryPolicy {
        attempts: args.attempts.max(1),
        ..RetryPolicy::default()
    };
    let controller = VoteController::seed(notifier, seed, policy);
    let mut events = controller.subscribe_events();

    let transition = controller.click(direction).await?;
    println!(
        "{} -> {} (score {})",
        transition.previous, transition.next, transition.displayed_count
    );
    info!(%thread_id, delta = transition.delta, "vote queued");

    tokio::time::timeout(Duration::from_secs(60), controller.shutdown())
        .await
        .context("timed out waiting for the server")?;

    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::VoteReconciled {
                vote,
                displayed_count,
                ..
            } => println!("saved: {vote} (score {displayed_count})"),
            ClientEvent::VoteConflictResolved {
                vote,
                displayed_count,
                ..
            } => println!("server already had {vote} (score {displayed_count})"),
            ClientEvent::VoteSyncFailed {
                error, rolled_back, ..
            } => {
                let snapshot = controller.snapshot().await;
                eprintln!(
                    "vote not saved: {error}{} (score {})",
                    if rolled_back { ", reverted" } else { "" },
                    snapshot.displayed_count
                );
            }
            ClientEvent::ReplyRequested { .. } => {}
        }
    }

    Ok(())
}
