mod config;
mod render;
mod watch;

use std::{future::Future, sync::Arc};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client_core::{
    AuthApi, BoardOptions, ClientError, DeleteTask, HttpTaskApi, NotificationCenter,
    ProfileChange, ProfileService, QueryParams, RetryPolicy, Session, SessionContext,
    SessionStore, TaskBoard,
};
use shared::{
    domain::{PriorityFilter, StatusFilter, TaskId, TaskPriority, TaskStatus},
    protocol::{LoginRequest, RegisterRequest, TaskDraft, TaskPatch},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::Settings,
    render::{notification_line, print_page, print_profile},
};

#[derive(Parser, Debug)]
#[command(name = "taskdeck", version, about = "Terminal client for a task board backend")]
struct Args {
    /// Backend base URL, e.g. http://localhost:5000/api
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Shows the profile, or changes it when any option is given.
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// New password; requires --confirm-password.
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        confirm_password: Option<String>,
    },
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        #[arg(long, default_value = "all")]
        priority: PriorityFilter,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        /// RFC 3339 timestamp, e.g. 2026-05-01T00:00:00Z
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    /// Flips a task between done and todo. The task must be on the given page.
    Toggle {
        id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Delete {
        id: String,
        /// Confirms the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Interactive listing with debounced search read from stdin.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings()?;
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }

    let session = Arc::new(SessionContext::load(SessionStore::new(
        settings.session_file.clone(),
    )));
    let api = Arc::new(HttpTaskApi::new(&settings.api_url, session.clone())?);
    info!(
        api_url = api.base_url(),
        session_file = %settings.session_file.display(),
        "taskdeck: starting"
    );
    let policy = RetryPolicy::new(settings.login_retry_attempts, settings.login_retry_delay);

    match args.command {
        Command::Login { email, password } => {
            let request = LoginRequest { email, password };
            let response = with_transport_retry(policy, || api.login(&request)).await?;
            sign_in(&session, Session::from(response)).await?;
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let request = RegisterRequest {
                name,
                email,
                password,
            };
            let response = with_transport_retry(policy, || api.register(&request)).await?;
            sign_in(&session, Session::from(response)).await?;
        }
        Command::Logout => {
            session.clear().await?;
            println!("Signed out.");
        }
        Command::Profile {
            name,
            email,
            password,
            confirm_password,
        } => {
            let change = ProfileChange {
                name,
                email,
                password,
                confirm_password,
            };
            let profile = ProfileService::new(api, session, NotificationCenter::new());
            run_profile_command(&profile, change).await?;
        }
        command => {
            if !session.is_authenticated().await {
                bail!("not signed in, run `taskdeck login` first");
            }
            let board = TaskBoard::new(api, session, board_options(&settings));
            run_board_command(board, &settings, command).await?;
        }
    }

    Ok(())
}

fn board_options(settings: &Settings) -> BoardOptions {
    BoardOptions {
        page_size: settings.page_size,
        search_quiescence: settings.search_debounce,
    }
}

async fn sign_in(session: &SessionContext, value: Session) -> Result<()> {
    let greeting = format!("Signed in as {} <{}>", value.name, value.email);
    session.establish(value).await?;
    println!("{greeting}");
    Ok(())
}

async fn run_profile_command(profile: &ProfileService, change: ProfileChange) -> Result<()> {
    let result = if change.is_empty() {
        profile.load().await.map(|loaded| print_profile(&loaded))
    } else {
        profile
            .update(&change)
            .await
            .map(|merged| println!("Saved {} <{}>", merged.name, merged.email))
    };
    for entry in profile.notifications().active().await {
        println!("{}", notification_line(&entry.notification));
    }
    Ok(result?)
}

/// Retries only transport failures; backend answers are returned as they are.
async fn with_transport_retry<T, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    policy
        .run(|_| {
            let attempt = op();
            async move {
                match attempt.await {
                    Err(err @ ClientError::Transport(_)) => Err(err),
                    other => Ok(other),
                }
            }
        })
        .await
        .and_then(|result| result)
}

async fn run_board_command(
    board: Arc<TaskBoard>,
    settings: &Settings,
    command: Command,
) -> Result<()> {
    match command {
        Command::List {
            search,
            status,
            priority,
            page,
        } => {
            let mut params = QueryParams::new(settings.page_size);
            params.set_search_text(search);
            params.set_status(status);
            params.set_priority(priority);
            params.set_page(page, u32::MAX);
            board.query_with(params).await?;
            print_page(&board.results().await);
        }
        Command::Create {
            title,
            description,
            status,
            priority,
            due,
        } => {
            let draft = TaskDraft {
                description,
                status,
                priority,
                due_date: due,
                ..TaskDraft::new(title)
            };
            let created = board.create_task(draft).await?;
            println!("Created {}", created.id);
            print_page(&board.results().await);
        }
        Command::Update {
            id,
            title,
            description,
            status,
            priority,
            due,
        } => {
            let patch = TaskPatch {
                title,
                description,
                status,
                priority,
                due_date: due,
            };
            let updated = board.update_task(&TaskId::new(id), patch).await?;
            println!("Updated {}", updated.id);
            print_page(&board.results().await);
        }
        Command::Toggle { id, page } => {
            let mut params = QueryParams::new(settings.page_size);
            params.set_page(page, u32::MAX);
            board.query_with(params).await?;
            let results = board.results().await;
            let Some(task) = results.items.iter().find(|task| task.id.as_str() == id) else {
                bail!("task {id} is not on page {page}");
            };
            let updated = board.toggle_completion(task).await?;
            println!("{} is now {}", updated.id, updated.status);
            print_page(&board.results().await);
        }
        Command::Delete { id, yes } => {
            let mut request = DeleteTask::new(TaskId::new(id));
            if yes {
                request = request.confirmed();
            }
            let id = request.id().clone();
            match board.delete_task(request).await {
                Ok(()) => {
                    println!("Deleted {id}");
                    print_page(&board.results().await);
                }
                Err(ClientError::ConfirmationRequired(id)) => {
                    bail!("refusing to delete {id} without --yes")
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Watch => watch::run_watch(board).await?,
        Command::Login { .. }
        | Command::Register { .. }
        | Command::Logout
        | Command::Profile { .. } => {
            bail!("account commands do not use the task board")
        }
    }
    Ok(())
}
