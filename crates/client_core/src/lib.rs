use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};

use shared::{
    domain::{PriorityFilter, StatusFilter, TaskId},
    protocol::{Task, TaskDraft, TaskListQuery, TaskPatch},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod debounce;
pub mod error;
pub mod notifications;
pub mod profile;
pub mod query;
pub mod retry;
pub mod session;
pub mod transport;

pub use debounce::{Debouncer, DEFAULT_QUIESCENCE_WINDOW};
pub use error::{ClientError, ErrorCategory};
pub use notifications::{Notification, NotificationCenter, NotificationVariant};
pub use profile::{ProfileChange, ProfileService};
pub use query::{QueryParams, TaskPage, DEFAULT_PAGE_SIZE};
pub use retry::RetryPolicy;
pub use session::{Session, SessionContext, SessionStore};
pub use transport::{AuthApi, HttpTaskApi, ProfileApi, TaskApi};

#[derive(Debug, Clone)]
pub struct BoardOptions {
    pub page_size: u32,
    pub search_quiescence: Duration,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_quiescence: DEFAULT_QUIESCENCE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The response replaced the visible page.
    Applied,
    /// A newer query was dispatched before this one completed; its result was dropped.
    Superseded,
    /// No authenticated session, nothing was sent.
    Skipped,
    /// The requested state was already current, nothing was sent.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    ToggleStatus,
    Delete,
}

impl MutationKind {
    fn failure_title(self) -> &'static str {
        match self {
            Self::Create | Self::Update => "Operation failed! Please try again.",
            Self::ToggleStatus => "Status update failed",
            Self::Delete => "Delete failed",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::ToggleStatus => "toggle_status",
            Self::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone)]
pub enum BoardEvent {
    QueryDispatched {
        request_id: u64,
        query: TaskListQuery,
    },
    ResultsReplaced {
        request_id: u64,
        page: TaskPage,
    },
    QueryDiscarded {
        request_id: u64,
    },
    InFlightChanged(bool),
    MutationCompleted(MutationKind),
    SessionExpired,
    Error(String),
}

/// Delete request. Nothing is sent unless it was explicitly confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    id: TaskId,
    confirmed: bool,
}

impl DeleteTask {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            confirmed: false,
        }
    }

    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }
}

#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub params: QueryParams,
    pub results: TaskPage,
    pub search_input: String,
    pub in_flight: bool,
}

impl BoardSnapshot {
    /// The empty-state placeholder is hidden while a query is outstanding.
    pub fn shows_empty_state(&self) -> bool {
        self.results.is_empty() && !self.in_flight
    }
}

struct BoardState {
    params: QueryParams,
    results: TaskPage,
    latest_request: u64,
    in_flight: usize,
}

/// Debounced task listing with filters, pagination and mutations.
///
/// Search input goes through a [`Debouncer`]; filter and page changes query
/// immediately. Every query gets an increasing request id and only the
/// response of the latest dispatched query may replace the visible page.
pub struct TaskBoard {
    api: Arc<dyn TaskApi>,
    session: Arc<SessionContext>,
    notifications: NotificationCenter,
    search: Debouncer<String>,
    inner: Mutex<BoardState>,
    events: broadcast::Sender<BoardEvent>,
    search_task: JoinHandle<()>,
}

impl TaskBoard {
    pub fn new(
        api: Arc<dyn TaskApi>,
        session: Arc<SessionContext>,
        options: BoardOptions,
    ) -> Arc<Self> {
        Self::new_with_notifications(api, session, options, NotificationCenter::new())
    }

    pub fn new_with_notifications(
        api: Arc<dyn TaskApi>,
        session: Arc<SessionContext>,
        options: BoardOptions,
        notifications: NotificationCenter,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let search = Debouncer::new(String::new(), options.search_quiescence);
        let search_rx = search.subscribe();

        Arc::new_cyclic(|board: &Weak<Self>| {
            let search_task = tokio::spawn(run_search_updates(board.clone(), search_rx));
            Self {
                api,
                session,
                notifications,
                search,
                inner: Mutex::new(BoardState {
                    params: QueryParams::new(options.page_size),
                    results: TaskPage::default(),
                    latest_request: 0,
                    in_flight: 0,
                }),
                events,
                search_task,
            }
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub async fn snapshot(&self) -> BoardSnapshot {
        let guard = self.inner.lock().await;
        BoardSnapshot {
            params: guard.params.clone(),
            results: guard.results.clone(),
            search_input: self.search.pending(),
            in_flight: guard.in_flight > 0,
        }
    }

    pub async fn results(&self) -> TaskPage {
        self.inner.lock().await.results.clone()
    }

    pub async fn params(&self) -> QueryParams {
        self.inner.lock().await.params.clone()
    }

    pub async fn is_refreshing(&self) -> bool {
        self.inner.lock().await.in_flight > 0
    }

    /// Records raw search input; the listing follows once typing pauses.
    pub fn set_search_input(&self, text: impl Into<String>) {
        self.search.push(text.into());
    }

    async fn apply_search(&self, text: String) -> Result<QueryOutcome, ClientError> {
        let changed = self.inner.lock().await.params.set_search_text(text);
        if !changed {
            return Ok(QueryOutcome::Unchanged);
        }
        self.refresh().await
    }

    pub async fn set_status_filter(
        &self,
        status: StatusFilter,
    ) -> Result<QueryOutcome, ClientError> {
        let changed = self.inner.lock().await.params.set_status(status);
        if !changed {
            return Ok(QueryOutcome::Unchanged);
        }
        self.refresh().await
    }

    pub async fn set_priority_filter(
        &self,
        priority: PriorityFilter,
    ) -> Result<QueryOutcome, ClientError> {
        let changed = self.inner.lock().await.params.set_priority(priority);
        if !changed {
            return Ok(QueryOutcome::Unchanged);
        }
        self.refresh().await
    }

    /// Moves to `page`, clamped to the pages reported by the last result.
    pub async fn go_to_page(&self, page: u32) -> Result<QueryOutcome, ClientError> {
        let changed = {
            let mut guard = self.inner.lock().await;
            let total_pages = guard.results.total_pages;
            guard.params.set_page(page, total_pages)
        };
        if !changed {
            return Ok(QueryOutcome::Unchanged);
        }
        self.refresh().await
    }

    pub async fn next_page(&self) -> Result<QueryOutcome, ClientError> {
        let page = self.inner.lock().await.params.page();
        self.go_to_page(page.saturating_add(1)).await
    }

    pub async fn previous_page(&self) -> Result<QueryOutcome, ClientError> {
        let page = self.inner.lock().await.params.page();
        self.go_to_page(page.saturating_sub(1)).await
    }

    /// Replaces search, filters and page in one step and queries once.
    pub async fn query_with(&self, params: QueryParams) -> Result<QueryOutcome, ClientError> {
        self.search.push(params.search_text().to_string());
        self.inner.lock().await.params = params;
        self.refresh().await
    }

    /// Issues one listing request for the current parameters.
    pub async fn refresh(&self) -> Result<QueryOutcome, ClientError> {
        if !self.session.is_authenticated().await {
            debug!("tasks: query skipped, no authenticated session");
            return Ok(QueryOutcome::Skipped);
        }

        let (request_id, query, became_busy) = {
            let mut guard = self.inner.lock().await;
            guard.latest_request += 1;
            guard.in_flight += 1;
            (
                guard.latest_request,
                guard.params.to_list_query(),
                guard.in_flight == 1,
            )
        };
        if became_busy {
            let _ = self.events.send(BoardEvent::InFlightChanged(true));
        }
        debug!(
            request_id,
            page = query.page,
            search = %query.search,
            status = %query.status,
            priority = %query.priority,
            "tasks: dispatching query"
        );
        let _ = self.events.send(BoardEvent::QueryDispatched {
            request_id,
            query: query.clone(),
        });

        let result = self.api.list_tasks(&query).await;

        let (is_latest, became_idle, settled) = {
            let mut guard = self.inner.lock().await;
            guard.in_flight = guard.in_flight.saturating_sub(1);
            let is_latest = request_id == guard.latest_request;
            let settled = match result {
                Ok(response) if is_latest => {
                    let page = TaskPage::from_response(response, query.page);
                    guard.results = page.clone();
                    Ok(Some(page))
                }
                Ok(_) => Ok(None),
                Err(ClientError::Unauthorized) => {
                    guard.results = TaskPage::default();
                    Err(ClientError::Unauthorized)
                }
                Err(err) => Err(err),
            };
            (is_latest, guard.in_flight == 0, settled)
        };

        let outcome = match settled {
            Ok(Some(page)) => {
                info!(
                    request_id,
                    items = page.items.len() as u64,
                    page = page.current_page,
                    pages = page.total_pages,
                    "tasks: results replaced"
                );
                let _ = self
                    .events
                    .send(BoardEvent::ResultsReplaced { request_id, page });
                Ok(QueryOutcome::Applied)
            }
            Ok(None) => {
                debug!(request_id, "tasks: discarding superseded response");
                let _ = self.events.send(BoardEvent::QueryDiscarded { request_id });
                Ok(QueryOutcome::Superseded)
            }
            Err(ClientError::Unauthorized) => {
                self.announce_session_expired();
                Err(ClientError::Unauthorized)
            }
            Err(err) if is_latest => {
                self.report_failure("Failed to fetch tasks", &err).await;
                Err(err)
            }
            Err(err) => {
                debug!(request_id, error = %err, "tasks: ignoring failure of superseded query");
                let _ = self.events.send(BoardEvent::QueryDiscarded { request_id });
                Ok(QueryOutcome::Superseded)
            }
        };

        if became_idle {
            let _ = self.events.send(BoardEvent::InFlightChanged(false));
        }
        outcome
    }

    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task, ClientError> {
        if draft.title.trim().is_empty() {
            let err = ClientError::invalid_input("task title is required");
            self.report_failure(MutationKind::Create.failure_title(), &err)
                .await;
            return Err(err);
        }
        self.require_session().await?;
        let result = self.api.create_task(&draft).await;
        self.finish_mutation(MutationKind::Create, result).await
    }

    pub async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, ClientError> {
        let blank_title = patch
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty());
        if patch.is_empty() || blank_title {
            let err = ClientError::invalid_input(if blank_title {
                "task title is required"
            } else {
                "nothing to update"
            });
            self.report_failure(MutationKind::Update.failure_title(), &err)
                .await;
            return Err(err);
        }
        self.require_session().await?;
        let result = self.api.update_task(id, &patch).await;
        self.finish_mutation(MutationKind::Update, result).await
    }

    /// Flips done and not-done for `task`.
    pub async fn toggle_completion(&self, task: &Task) -> Result<Task, ClientError> {
        self.require_session().await?;
        let patch = TaskPatch::status(task.status.toggled());
        let result = self.api.update_task(&task.id, &patch).await;
        self.finish_mutation(MutationKind::ToggleStatus, result).await
    }

    pub async fn delete_task(&self, request: DeleteTask) -> Result<(), ClientError> {
        if !request.is_confirmed() {
            debug!(task_id = %request.id, "tasks: delete not confirmed, nothing sent");
            return Err(ClientError::ConfirmationRequired(request.id));
        }
        self.require_session().await?;
        let result = self.api.delete_task(&request.id).await;
        self.finish_mutation(MutationKind::Delete, result).await
    }

    async fn require_session(&self) -> Result<(), ClientError> {
        if self.session.is_authenticated().await {
            Ok(())
        } else {
            Err(ClientError::NoSession)
        }
    }

    async fn finish_mutation<T>(
        &self,
        kind: MutationKind,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        match result {
            Ok(value) => {
                info!(mutation = %kind, "tasks: mutation succeeded, re-querying current page");
                let _ = self.events.send(BoardEvent::MutationCompleted(kind));
                if let Err(err) = self.refresh().await {
                    debug!(mutation = %kind, error = %err, "tasks: re-query after mutation failed");
                }
                Ok(value)
            }
            Err(ClientError::Unauthorized) => {
                self.inner.lock().await.results = TaskPage::default();
                self.announce_session_expired();
                Err(ClientError::Unauthorized)
            }
            Err(err) => {
                self.report_failure(kind.failure_title(), &err).await;
                Err(err)
            }
        }
    }

    fn announce_session_expired(&self) {
        warn!("tasks: session expired, dropping visible results");
        let _ = self.events.send(BoardEvent::SessionExpired);
    }

    async fn report_failure(&self, title: &str, err: &ClientError) {
        warn!(title, error = %err, "tasks: operation failed");
        self.notifications
            .push(Notification::error(title, err.user_message()))
            .await;
        let _ = self.events.send(BoardEvent::Error(format!("{title}: {err}")));
    }
}

impl Drop for TaskBoard {
    fn drop(&mut self) {
        self.search_task.abort();
    }
}

async fn run_search_updates(
    board: Weak<TaskBoard>,
    mut search_rx: tokio::sync::watch::Receiver<String>,
) {
    while search_rx.changed().await.is_ok() {
        let text = search_rx.borrow_and_update().clone();
        let Some(board) = board.upgrade() else {
            break;
        };
        if let Err(err) = board.apply_search(text).await {
            debug!(error = %err, "tasks: debounced search query failed");
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
