use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, MeResponse, PublicUser, RegisterResponse};
use crate::error::{ErrorBody, ErrorCode};
use crate::tickets::{
    dto::{CreateTicketRequest, DeletedTicketResponse, UpdateTicketRequest},
    Ticket, TicketPriority, TicketStatus,
};

/// Failure of an API call, classified by the server's error code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict {
        field: Option<String>,
        message: String,
    },

    #[error("{0}")]
    Server(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// Form field the error belongs to, when the server named one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::Conflict { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

impl From<ErrorBody> for ApiError {
    fn from(body: ErrorBody) -> Self {
        let ErrorBody {
            code,
            message,
            field,
        } = body;
        match code {
            ErrorCode::ValidationError => Self::Validation { field, message },
            ErrorCode::AuthenticationError => Self::Authentication(message),
            ErrorCode::NotFound => Self::NotFound(message),
            ErrorCode::ConflictError => Self::Conflict { field, message },
            ErrorCode::ServerError => Self::Server(message),
        }
    }
}

/// The one call the board needs; lets tests stand in for the server.
#[async_trait]
pub trait TicketApi: Send + Sync {
    async fn update_ticket(&self, id: Uuid, patch: &UpdateTicketRequest) -> Result<Ticket, ApiError>;
}

/// Signed-in user and their bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Copy of this client that authenticates as `session`.
    pub fn with_session(&self, session: &Session) -> Self {
        Self {
            token: Some(session.token.clone()),
            ..self.clone()
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}/api{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let res = req.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res.json::<T>().await?);
        }
        match res.json::<ErrorBody>().await {
            Ok(body) => Err(body.into()),
            Err(_) => Err(ApiError::Server(format!("unexpected response status {status}"))),
        }
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(method, path).json(body)).await
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ApiError> {
        let body = serde_json::json!({ "username": username, "email": email, "password": password });
        let res: RegisterResponse = self.send_json(Method::POST, "/auth/register", &body).await?;
        Ok(Session {
            token: res.token,
            user: res.user,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let res: AuthResponse = self.send_json(Method::POST, "/auth/login", &body).await?;
        Ok(Session {
            token: res.token,
            user: res.user,
        })
    }

    pub async fn me(&self) -> Result<PublicUser, ApiError> {
        let res: MeResponse = self.send(self.request(Method::GET, "/auth/me")).await?;
        Ok(res.user)
    }

    pub async fn list_tickets(&self) -> Result<Vec<Ticket>, ApiError> {
        self.send(self.request(Method::GET, "/tickets")).await
    }

    pub async fn filtered_tickets(
        &self,
        status: Option<TicketStatus>,
        priority: Option<TicketPriority>,
    ) -> Result<Vec<Ticket>, ApiError> {
        let params = [
            ("status", status.map_or("", TicketStatus::as_str)),
            ("priority", priority.map_or("", TicketPriority::as_str)),
        ];
        self.send(self.request(Method::GET, "/tickets/filtered").query(&params))
            .await
    }

    pub async fn create_ticket(&self, req: &CreateTicketRequest) -> Result<Ticket, ApiError> {
        self.send_json(Method::POST, "/tickets", req).await
    }

    pub async fn delete_ticket(&self, id: Uuid) -> Result<Ticket, ApiError> {
        let res: DeletedTicketResponse = self
            .send(self.request(Method::DELETE, &format!("/tickets/{id}")))
            .await?;
        Ok(res.ticket)
    }
}

#[async_trait]
impl TicketApi for ApiClient {
    async fn update_ticket(&self, id: Uuid, patch: &UpdateTicketRequest) -> Result<Ticket, ApiError> {
        self.send_json(Method::PATCH, &format!("/tickets/{id}"), patch)
            .await
    }
}
