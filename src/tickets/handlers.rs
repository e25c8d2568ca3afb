use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateTicketRequest, DeletedTicketResponse, FilterParams, UpdateTicketRequest},
    model::Ticket,
    services,
};
use crate::{
    auth::AuthUser,
    error::{method_not_allowed, ApiJson, ApiPath, ApiQuery, AppError, AppResult},
    state::AppState,
};

pub fn ticket_routes() -> Router<AppState> {
    // /filtered must win over /:id
    Router::new()
        .route(
            "/tickets",
            get(list_tickets)
                .post(create_ticket)
                .fallback(method_not_allowed),
        )
        .route(
            "/tickets/filtered",
            get(list_filtered).fallback(method_not_allowed),
        )
        .route(
            "/tickets/:id",
            get(get_ticket)
                .patch(update_ticket)
                .delete(delete_ticket)
                .fallback(method_not_allowed),
        )
}

/// Ticket ids are opaque: a malformed one is just a ticket that does not exist.
fn ticket_id(raw: &str) -> AppResult<Uuid> {
    raw.parse().map_err(|_| AppError::NotFoundOrUnauthorized)
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn create_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CreateTicketRequest>,
) -> AppResult<(StatusCode, Json<Ticket>)> {
    let ticket = services::create(state.store.as_ref(), auth.id, payload).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn list_tickets(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Ticket>>> {
    let tickets = services::list_for_owner(state.store.as_ref(), auth.id).await?;
    Ok(Json(tickets))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn list_filtered(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(params): ApiQuery<FilterParams>,
) -> AppResult<Json<Vec<Ticket>>> {
    let tickets = services::filter(state.store.as_ref(), auth.id, &params).await?;
    Ok(Json(tickets))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn get_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<Ticket>> {
    let ticket = services::get(state.store.as_ref(), auth.id, ticket_id(&id)?).await?;
    Ok(Json(ticket))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.id))]
pub async fn update_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<UpdateTicketRequest>,
) -> AppResult<Json<Ticket>> {
    let ticket = services::update(state.store.as_ref(), auth.id, ticket_id(&id)?, payload).await?;
    Ok(Json(ticket))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id))]
pub async fn delete_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> AppResult<Json<DeletedTicketResponse>> {
    let ticket = services::delete(state.store.as_ref(), auth.id, ticket_id(&id)?).await?;
    Ok(Json(DeletedTicketResponse {
        message: "Ticket deleted".into(),
        ticket,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header, Method, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::{jwt::JwtKeys, repo_types::NewUser};

    struct Harness {
        app: Router,
        state: AppState,
    }

    impl Harness {
        fn new() -> Self {
            let state = AppState::fake();
            Self {
                app: ticket_routes().with_state(state.clone()),
                state,
            }
        }

        async fn user(&self, name: &str) -> String {
            let user = self
                .state
                .store
                .insert_user(NewUser {
                    username: name.into(),
                    email: format!("{name}@x.com"),
                    password_hash: "h".into(),
                })
                .await
                .unwrap();
            JwtKeys::from_ref(&self.state).sign(user.id, &user.email).unwrap()
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: &str,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"));
            let req = match body {
                Some(b) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(b.to_string())),
                None => builder.body(Body::empty()),
            }
            .unwrap();
            let res = self.app.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn create_move_delete_flow() {
        let h = Harness::new();
        let alice = h.user("alice").await;

        let (status, created) = h
            .call(
                Method::POST,
                "/tickets",
                &alice,
                Some(json!({"title": "Fix bug", "description": "NPE on save"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "todo");
        assert_eq!(created["priority"], "low");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, moved) = h
            .call(
                Method::PATCH,
                &format!("/tickets/{id}"),
                &alice,
                Some(json!({"status": "done"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["status"], "done");
        assert_eq!(moved["title"], created["title"]);
        assert_eq!(moved["description"], created["description"]);
        assert_eq!(moved["priority"], created["priority"]);
        assert_eq!(moved["created_at"], created["created_at"]);

        let (status, deleted) = h
            .call(Method::DELETE, &format!("/tickets/{id}"), &alice, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["message"], "Ticket deleted");
        assert_eq!(deleted["ticket"]["id"], id.as_str());

        let (_, list) = h.call(Method::GET, "/tickets", &alice, None).await;
        assert_eq!(list, json!([]));

        let (status, body) = h
            .call(
                Method::PATCH,
                &format!("/tickets/{id}"),
                &alice,
                Some(json!({"status": "todo"})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn foreign_and_missing_tickets_look_identical() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        let (_, created) = h
            .call(
                Method::POST,
                "/tickets",
                &alice,
                Some(json!({"title": "mine", "description": "d"})),
            )
            .await;
        let id = created["id"].as_str().unwrap();

        let foreign = h
            .call(
                Method::PATCH,
                &format!("/tickets/{id}"),
                &bob,
                Some(json!({"title": "stolen"})),
            )
            .await;
        let missing = h
            .call(
                Method::PATCH,
                &format!("/tickets/{}", Uuid::new_v4()),
                &bob,
                Some(json!({"title": "stolen"})),
            )
            .await;
        let malformed = h
            .call(
                Method::PATCH,
                "/tickets/42",
                &bob,
                Some(json!({"title": "stolen"})),
            )
            .await;
        assert_eq!(foreign.0, StatusCode::NOT_FOUND);
        assert_eq!(foreign, missing);
        assert_eq!(foreign, malformed);

        let (status, _) = h
            .call(Method::DELETE, &format!("/tickets/{id}"), &bob, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = h
            .call(Method::GET, &format!("/tickets/{id}"), &bob, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, bob_list) = h.call(Method::GET, "/tickets", &bob, None).await;
        assert_eq!(bob_list, json!([]));
        let (_, still) = h
            .call(Method::GET, &format!("/tickets/{id}"), &alice, None)
            .await;
        assert_eq!(still["title"], "mine");
    }

    #[tokio::test]
    async fn create_and_patch_validation() {
        let h = Harness::new();
        let alice = h.user("alice").await;

        let (status, body) = h
            .call(Method::POST, "/tickets", &alice, Some(json!({"title": "only title"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "description");

        let (_, created) = h
            .call(
                Method::POST,
                "/tickets",
                &alice,
                Some(json!({"title": "t", "description": "d"})),
            )
            .await;
        let id = created["id"].as_str().unwrap();

        let (status, body) = h
            .call(Method::PATCH, &format!("/tickets/{id}"), &alice, Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No fields to update");

        let (status, body) = h
            .call(
                Method::PATCH,
                &format!("/tickets/{id}"),
                &alice,
                Some(json!({"status": "Validation"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "status");
    }

    #[tokio::test]
    async fn filtered_listing_is_owner_scoped() {
        let h = Harness::new();
        let alice = h.user("alice").await;
        let bob = h.user("bob").await;
        for (token, status, priority) in [
            (&alice, "done", "high"),
            (&alice, "done", "low"),
            (&alice, "in-progress", "high"),
            (&bob, "done", "high"),
        ] {
            h.call(
                Method::POST,
                "/tickets",
                token,
                Some(json!({"title": "t", "description": "d", "status": status, "priority": priority})),
            )
            .await;
        }

        let (status, hits) = h
            .call(
                Method::GET,
                "/tickets/filtered?status=done&priority=high",
                &alice,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let hits = hits.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["status"], "done");
        assert_eq!(hits[0]["priority"], "high");

        let (_, all_mine) = h
            .call(Method::GET, "/tickets/filtered?status=&priority=", &alice, None)
            .await;
        assert_eq!(all_mine.as_array().unwrap().len(), 3);

        let (status, _) = h
            .call(Method::GET, "/tickets/filtered?priority=Urgent", &alice, None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_query_string_is_json_validation_error() {
        let h = Harness::new();
        let alice = h.user("alice").await;

        let (status, body) = h
            .call(
                Method::GET,
                "/tickets/filtered?status=done&status=todo",
                &alice,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("status"));
    }

    #[tokio::test]
    async fn wrong_method_is_json_405() {
        let h = Harness::new();
        let alice = h.user("alice").await;

        let (status, body) = h
            .call(
                Method::PUT,
                &format!("/tickets/{}", Uuid::new_v4()),
                &alice,
                Some(json!({"status": "done"})),
            )
            .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["code"], "not_found");
        assert_eq!(body["message"], "Method not allowed");

        let (status, body) = h.call(Method::DELETE, "/tickets", &alice, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["message"], "Method not allowed");
    }

    #[tokio::test]
    async fn routes_require_token() {
        let h = Harness::new();
        let req = Request::get("/tickets").body(Body::empty()).unwrap();
        let res = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let (status, body) = h.call(Method::GET, "/tickets", "not-a-jwt", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "authentication_error");
    }
}
