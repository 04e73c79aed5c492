use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use shared::{
    domain::TaskId,
    error::ApiError,
    protocol::{
        AuthResponse, LoginRequest, MessageResponse, ProfileUpdate, RegisterRequest, Task,
        TaskDraft, TaskListQuery, TaskListResponse, TaskPatch, UserProfile,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{error::ClientError, session::SessionContext};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self, query: &TaskListQuery) -> Result<TaskListResponse, ClientError>;
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ClientError>;
    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ClientError>;
    async fn delete_task(&self, id: &TaskId) -> Result<(), ClientError>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError>;
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError>;
}

#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn get_profile(&self) -> Result<UserProfile, ClientError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ClientError>;
}

/// Task backend over HTTP. Attaches the session's bearer token to every task
/// request and tears the session down when the backend answers 401.
pub struct HttpTaskApi {
    http: Client,
    base_url: String,
    session: Arc<SessionContext>,
}

impl HttpTaskApi {
    pub fn new(base_url: &str, session: Arc<SessionContext>) -> anyhow::Result<Self> {
        Self::with_client(Client::new(), base_url, session)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        session: Arc<SessionContext>,
    ) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|err| anyhow::anyhow!("invalid api url '{base_url}': {err}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("unsupported api url scheme '{}'", parsed.scheme());
        }
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_authorized(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let token = self.session.token().await.ok_or(ClientError::NoSession)?;
        let response = request.bearer_auth(token).send().await?;
        self.check_status(response).await
    }

    async fn check_status(&self, response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.session.expire().await;
            return Err(ClientError::Unauthorized);
        }
        let fallback = status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
        let message = match response.json::<ApiError>().await {
            Ok(body) if !body.message.trim().is_empty() => body.message,
            Ok(_) | Err(_) => fallback,
        };
        warn!(status = status.as_u16(), message = %message, "http: request failed");
        Err(ClientError::from_status(status.as_u16(), message))
    }

    async fn post_auth<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthResponse, ClientError> {
        let response = self.http.post(self.endpoint(path)).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiError>()
                .await
                .map(|body| body.message)
                .unwrap_or_else(|_| status.to_string());
            // 401 here means bad credentials, not an expired session.
            if status == StatusCode::UNAUTHORIZED {
                return Err(ClientError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(ClientError::from_status(status.as_u16(), message));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self, query: &TaskListQuery) -> Result<TaskListResponse, ClientError> {
        debug!(
            page = query.page,
            search = %query.search,
            status = %query.status,
            priority = %query.priority,
            "http: listing tasks"
        );
        let request = self.http.get(self.endpoint("tasks")).query(query);
        Ok(self.send_authorized(request).await?.json().await?)
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ClientError> {
        let request = self.http.post(self.endpoint("tasks")).json(draft);
        Ok(self.send_authorized(request).await?.json().await?)
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, ClientError> {
        let request = self
            .http
            .put(self.endpoint(&format!("tasks/{}", id.as_str())))
            .json(patch);
        Ok(self.send_authorized(request).await?.json().await?)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), ClientError> {
        let request = self
            .http
            .delete(self.endpoint(&format!("tasks/{}", id.as_str())));
        let response = self.send_authorized(request).await?;
        match response.json::<MessageResponse>().await {
            Ok(body) => debug!(task_id = %id, message = %body.message, "http: task deleted"),
            Err(err) => debug!(task_id = %id, error = %err, "http: task deleted without message body"),
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileApi for HttpTaskApi {
    async fn get_profile(&self) -> Result<UserProfile, ClientError> {
        let request = self.http.get(self.endpoint("users/profile"));
        Ok(self.send_authorized(request).await?.json().await?)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ClientError> {
        debug!(
            name = update.name.is_some(),
            email = update.email.is_some(),
            password = update.password.is_some(),
            "http: updating profile"
        );
        let request = self.http.put(self.endpoint("users/profile")).json(update);
        Ok(self.send_authorized(request).await?.json().await?)
    }
}

#[async_trait]
impl AuthApi for HttpTaskApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.post_auth("auth/login", request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.post_auth("auth/register", request).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
