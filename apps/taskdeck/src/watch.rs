use std::sync::Arc;

use anyhow::{Context, Result};
use client_core::{notifications::NotificationEvent, BoardEvent, TaskBoard};
use shared::domain::{PriorityFilter, StatusFilter};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::render::{notification_line, print_page};

pub const HELP: &str = "type to search; :status <s>, :priority <p>, :page <n>, :next, :prev, :refresh, :quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    Search(String),
    Status(StatusFilter),
    Priority(PriorityFilter),
    Page(u32),
    Next,
    Previous,
    Refresh,
    Quit,
    Invalid(String),
}

/// Lines starting with `:` are commands, everything else is search text.
pub fn parse_watch_command(line: &str) -> WatchCommand {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(command) = line.strip_prefix(':') else {
        return WatchCommand::Search(line.trim().to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or_default();
    match name {
        "status" => arg
            .parse()
            .map(WatchCommand::Status)
            .unwrap_or_else(|err| WatchCommand::Invalid(format!("{err}"))),
        "priority" => arg
            .parse()
            .map(WatchCommand::Priority)
            .unwrap_or_else(|err| WatchCommand::Invalid(format!("{err}"))),
        "page" => match arg.parse::<u32>() {
            Ok(page) => WatchCommand::Page(page),
            Err(_) => WatchCommand::Invalid(format!("invalid page '{arg}'")),
        },
        "next" => WatchCommand::Next,
        "prev" => WatchCommand::Previous,
        "refresh" => WatchCommand::Refresh,
        "quit" | "q" => WatchCommand::Quit,
        other => WatchCommand::Invalid(format!("unknown command ':{other}'")),
    }
}

enum WatchExit {
    Finished,
    SessionExpired,
}

/// Interactive listing driven by stdin until `:quit`, EOF or session expiry.
pub async fn run_watch(board: Arc<TaskBoard>) -> Result<()> {
    run_watch_with(board, BufReader::new(tokio::io::stdin())).await
}

pub async fn run_watch_with<R>(board: Arc<TaskBoard>, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    println!("{HELP}");
    let printer = spawn_printer(&board);
    let exit = drive(&board, input).await;
    printer.abort();

    if let WatchExit::SessionExpired = exit? {
        println!("Session expired. Run `taskdeck login` again.");
    }
    Ok(())
}

fn spawn_printer(board: &TaskBoard) -> JoinHandle<()> {
    let mut events = board.subscribe_events();
    let mut notices = board.notifications().subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(BoardEvent::ResultsReplaced { page, .. }) => print_page(&page),
                    Ok(other) => debug!(event = ?other, "watch: board event"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "watch: board events lagged"),
                    Err(RecvError::Closed) => break,
                },
                notice = notices.recv() => {
                    if let Ok(NotificationEvent::Shown(entry)) = notice {
                        println!("{}", notification_line(&entry.notification));
                    }
                }
            }
        }
    })
}

async fn drive<R>(board: &TaskBoard, input: R) -> Result<WatchExit>
where
    R: AsyncBufRead + Unpin,
{
    // Debounced searches fail inside the board's own task, so expiry is
    // observed through the session rather than through command results.
    let mut signed_in = board.session().subscribe();

    if let Err(err) = board.refresh().await {
        if err.requires_reauth() {
            return Ok(WatchExit::SessionExpired);
        }
    }
    if !*signed_in.borrow_and_update() {
        return Ok(WatchExit::SessionExpired);
    }

    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            changed = signed_in.changed() => {
                if changed.is_err() || !*signed_in.borrow_and_update() {
                    return Ok(WatchExit::SessionExpired);
                }
                continue;
            }
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else {
            return Ok(WatchExit::Finished);
        };

        let result = match parse_watch_command(&line) {
            WatchCommand::Search(text) => {
                board.set_search_input(text);
                continue;
            }
            WatchCommand::Status(status) => board.set_status_filter(status).await,
            WatchCommand::Priority(priority) => board.set_priority_filter(priority).await,
            WatchCommand::Page(page) => board.go_to_page(page).await,
            WatchCommand::Next => board.next_page().await,
            WatchCommand::Previous => board.previous_page().await,
            WatchCommand::Refresh => board.refresh().await,
            WatchCommand::Quit => return Ok(WatchExit::Finished),
            WatchCommand::Invalid(message) => {
                eprintln!("{message} ({HELP})");
                continue;
            }
        };
        match result {
            Err(err) if err.requires_reauth() => return Ok(WatchExit::SessionExpired),
            Err(err) => debug!(error = %err, "watch: command failed"),
            Ok(outcome) => debug!(outcome = ?outcome, "watch: command applied"),
        }
    }
}
