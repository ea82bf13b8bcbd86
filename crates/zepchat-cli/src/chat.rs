use std::time::Duration;

use anyhow::{Result, bail};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use zepchat_client::{ChatSession, ChatTurn, IgnoreReason, Role, SubmitOutcome};

/// Outcome of one question as far as the terminal is concerned.
enum Reply {
    Answered,
    /// Human-readable reason, not yet printed.
    Failed(String),
    Skipped,
}

async fn ask_once(session: &ChatSession, question: &str, timeout: Option<Duration>) -> Reply {
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, session.submit(question)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                println!();
                return Reply::Failed(format!(
                    "⚠ No complete answer within {}s.",
                    limit.as_secs()
                ));
            }
        },
        None => session.submit(question).await,
    };

    match outcome {
        SubmitOutcome::Answered(_) => {
            println!();
            Reply::Answered
        }
        SubmitOutcome::Failed { turn, error } => {
            tracing::debug!(error = %error, "Answer failed");
            // Partial output may already be on screen; close that line first.
            if !session.consumer().state().text.is_empty() {
                println!();
            }
            Reply::Failed(turn.content)
        }
        SubmitOutcome::Ignored(IgnoreReason::EmptyInput) => Reply::Skipped,
        SubmitOutcome::Ignored(IgnoreReason::Busy) => {
            eprintln!("{}", "Still answering the previous question.".yellow());
            Reply::Skipped
        }
    }
}

pub async fn run_ask(session: &ChatSession, question: &str, timeout: Option<Duration>) -> Result<()> {
    match ask_once(session, question, timeout).await {
        Reply::Failed(reason) => bail!("{reason}"),
        Reply::Answered | Reply::Skipped => Ok(()),
    }
}

pub async fn run_chat(session: &ChatSession, timeout: Option<Duration>) -> Result<()> {
    println!(
        "{} {}",
        "ZepChat".bold(),
        "(type /history to review, /quit to leave)".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", ">".green().bold());
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/history" => print_history(&session.history()),
            question => {
                if let Reply::Failed(reason) = ask_once(session, question, timeout).await {
                    eprintln!("{}", reason.red());
                }
            }
        }
    }

    Ok(())
}

fn print_history(turns: &[ChatTurn]) {
    if turns.is_empty() {
        println!("{}", "No messages yet.".dimmed());
        return;
    }

    for turn in turns {
        let time = turn.created_at.format("%H:%M:%S").to_string().dimmed();
        let label = match turn.role {
            Role::User => "you".cyan().bold(),
            Role::Assistant => "bot".magenta().bold(),
        };
        let content = if turn.failed {
            turn.content.red()
        } else {
            turn.content.normal()
        };
        println!("{time} {label}: {content}");
    }
}
