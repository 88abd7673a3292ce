//! HTTP route handlers for the TodoLists server.
//!
//! This module provides the HTML endpoints:
//!
//! - `GET /` - Redirect to `/lists`
//! - `GET /lists` - All lists, incomplete first
//! - `GET /lists/new` - New list form
//! - `POST /lists` - Create a list
//! - `GET /lists/{id}` - A single list
//! - `GET /lists/{id}/edit` - Rename form
//! - `POST /lists/{id}` - Rename a list
//! - `POST /lists/{id}/delete` - Delete a list
//! - `POST /lists/{id}/todos` - Add a todo
//! - `POST /lists/{id}/todos/{todo_id}` - Set a todo's completion
//! - `POST /lists/{id}/todos/{todo_id}/delete` - Delete a todo
//! - `POST /lists/{id}/complete_all` - Complete every todo in a list
//! - `GET /health` - Health check endpoint
//!
//! # Architecture
//!
//! Handlers are thin: each runs one
//! [`TodoListStore`](crate::store::TodoListStore) operation against the
//! caller's session through [`SessionHandle::respond`], which wraps
//! [`SessionStore::access`], and turns the result into a redirect or a
//! rendered page. Validation failures re-render the submitting
//! form with status 422. References to missing lists or todos redirect with an
//! error flash instead of failing.
//!
//! # Example
//!
//! ```rust,no_run
//! use todolists_server::routes::{create_router, AppState};
//! use todolists_server::config::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("failed to load config");
//!     let state = AppState::new(config);
//!     let app = create_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header::SET_COOKIE, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::Config;
use crate::cookie::CookieSigner;
use crate::error::{NotFoundError, ServerError, StoreError};
use crate::session::{SessionData, SessionStore, SessionStoreConfig};
use crate::store::{ListRef, TodoId};
use crate::views::{self, View};

// ============================================================================
// Constants
// ============================================================================

/// Header set by XMLHttpRequest-based clients.
const HEADER_REQUESTED_WITH: &str = "X-Requested-With";

/// Value of [`HEADER_REQUESTED_WITH`] that marks an AJAX-style request.
const XML_HTTP_REQUEST: &[u8] = b"XMLHttpRequest";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,

    /// Per-session to-do lists.
    pub sessions: SessionStore,

    /// Signs and verifies the session cookie.
    pub cookies: CookieSigner,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates a new application state with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let sessions = SessionStore::new(SessionStoreConfig::new(
            config.max_sessions,
            config.session_ttl,
        ));
        Self::with_sessions(config, sessions)
    }

    /// Creates application state around an existing session store.
    ///
    /// Useful for testing or when the store is shared with a cleanup task
    /// created elsewhere.
    #[must_use]
    pub fn with_sessions(config: Config, sessions: SessionStore) -> Self {
        Self {
            cookies: CookieSigner::new(&config.session_secret),
            config: Arc::new(config),
            sessions,
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("start_time", &self.start_time)
            .finish()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/lists", get(get_lists).post(post_lists))
        .route("/lists/new", get(get_new_list))
        .route("/lists/{id}", get(get_list).post(post_list))
        .route("/lists/{id}/edit", get(get_edit_list))
        .route("/lists/{id}/delete", post(post_delete_list))
        .route("/lists/{id}/todos", post(post_todos))
        .route("/lists/{id}/todos/{todo_id}", post(post_todo))
        .route("/lists/{id}/todos/{todo_id}/delete", post(post_delete_todo))
        .route("/lists/{id}/complete_all", post(post_complete_all))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Sessions
// ============================================================================

/// The session token carried by the request's signed cookie, if any.
///
/// Extraction never touches the session store. [`SessionHandle::respond`]
/// resolves the token, so a visitor without a live session only gets one
/// once a handler leaves something in it.
#[derive(Debug)]
pub struct SessionHandle {
    token: Option<String>,
}

impl FromRequestParts<AppState> for SessionHandle {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self {
            token: state.cookies.token_from_headers(&parts.headers),
        })
    }
}

impl SessionHandle {
    /// Runs `f` against this session's data and builds the response.
    ///
    /// Whenever a session backs the request, the cookie is re-sent so the
    /// browser's expiry follows the sliding server-side TTL.
    fn respond<R: IntoResponse>(
        self,
        state: &AppState,
        f: impl FnOnce(&mut SessionData) -> R,
    ) -> Result<Response, ServerError> {
        let (token, outcome) = state.sessions.access(self.token.as_deref(), f)?;
        let mut response = outcome.into_response();

        if let Some(token) = token {
            if self.token.as_deref() != Some(token.as_str()) {
                debug!(sessions = state.sessions.len(), "Started new session");
            }
            let cookie = state.cookies.set_cookie_header(
                &token,
                state.config.session_ttl.as_secs(),
                state.config.secure_cookie,
            );
            let cookie = HeaderValue::from_str(&cookie)
                .map_err(|err| ServerError::internal(format!("invalid session cookie: {err}")))?;
            response.headers_mut().append(SET_COOKIE, cookie);
        }

        Ok(response)
    }
}

// ============================================================================
// Handler outcomes
// ============================================================================

/// What a handler decided to send back.
#[derive(Debug)]
enum Outcome {
    /// `303 See Other` to the given path.
    Redirect(String),

    /// A rendered page with the given status.
    Page(StatusCode, String),

    /// A bare status for AJAX-style requests.
    Status(StatusCode),

    /// A plain-text body for AJAX-style requests.
    Text(&'static str),
}

impl Outcome {
    fn redirect(path: impl Into<String>) -> Self {
        Self::Redirect(path.into())
    }

    fn page(html: String) -> Self {
        Self::Page(StatusCode::OK, html)
    }

    fn invalid(html: String) -> Self {
        Self::Page(StatusCode::UNPROCESSABLE_ENTITY, html)
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect(path) => Redirect::to(&path).into_response(),
            Self::Page(status, html) => (status, Html(html)).into_response(),
            Self::Status(status) => status.into_response(),
            Self::Text(body) => body.into_response(),
        }
    }
}

/// Flashes `err` and redirects somewhere that still exists.
fn not_found(data: &mut SessionData, err: NotFoundError) -> Outcome {
    debug!(error = ?err, "Reference not found");
    data.flash.set_error(err.to_string());
    match err {
        NotFoundError::List { .. } => Outcome::redirect("/lists"),
        NotFoundError::Todo { list_index, .. } => Outcome::redirect(list_path(list_index)),
    }
}

fn list_path(list: ListRef) -> String {
    format!("/lists/{list}")
}

/// Parses a list position from the path. Unparseable ids map to a position
/// no list can occupy.
fn parse_list_ref(raw: &str) -> ListRef {
    raw.parse().unwrap_or(usize::MAX)
}

/// Parses a todo id from the path. Unparseable ids map to an id no todo is
/// ever given.
fn parse_todo_id(raw: &str) -> TodoId {
    raw.parse().unwrap_or(0)
}

/// Returns true if the request asked for a non-redirect response.
fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get(HEADER_REQUESTED_WITH)
        .is_some_and(|value| value.as_bytes() == XML_HTTP_REQUEST)
}

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListNameForm {
    #[serde(default)]
    list_name: String,
}

#[derive(Debug, Deserialize)]
struct TodoForm {
    #[serde(default)]
    todo: String,
}

#[derive(Debug, Deserialize)]
struct CompletedForm {
    #[serde(default)]
    completed: String,
}

// ============================================================================
// Lists
// ============================================================================

/// GET / - Redirect to the list index.
async fn get_root() -> Redirect {
    Redirect::to("/lists")
}

/// GET /lists - Render all lists.
async fn get_lists(
    State(state): State<AppState>,
    session: SessionHandle,
) -> Result<Response, ServerError> {
    session.respond(&state, |data| {
        let flash = data.flash.take();
        Html(views::render(View::Lists { store: &data.lists }, &flash))
    })
}

/// GET /lists/new - Render the list creation form.
async fn get_new_list(
    State(state): State<AppState>,
    session: SessionHandle,
) -> Result<Response, ServerError> {
    session.respond(&state, |data| {
        let flash = data.flash.take();
        Html(views::render(View::NewList { list_name: "" }, &flash))
    })
}

/// POST /lists - Create a list.
async fn post_lists(
    State(state): State<AppState>,
    session: SessionHandle,
    Form(form): Form<ListNameForm>,
) -> Result<Response, ServerError> {
    session.respond(&state, |data| match data.lists.create_list(&form.list_name) {
        Ok(list) => {
            info!(list, "List created");
            data.flash.set_success("The list has been created.");
            Outcome::redirect("/lists")
        }
        Err(err) => {
            debug!(error = %err, "List creation rejected");
            data.flash.set_error(err.to_string());
            let flash = data.flash.take();
            Outcome::invalid(views::render(
                View::NewList {
                    list_name: &form.list_name,
                },
                &flash,
            ))
        }
    })
}

/// GET /lists/{id} - Render a single list.
async fn get_list(
    State(state): State<AppState>,
    session: SessionHandle,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let list_id = parse_list_ref(&id);
    session.respond(&state, |data| match data.lists.list(list_id) {
        Some(list) => {
            let flash = data.flash.take();
            Outcome::page(views::render(
                View::List {
                    list,
                    list_id,
                    todo_input: "",
                },
                &flash,
            ))
        }
        None => not_found(data, NotFoundError::List { index: list_id }),
    })
}

/// GET /lists/{id}/edit - Render the rename form.
async fn get_edit_list(
    State(state): State<AppState>,
    session: SessionHandle,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let list_id = parse_list_ref(&id);
    session.respond(&state, |data| match data.lists.list(list_id) {
        Some(list) => {
            let flash = data.flash.take();
            Outcome::page(views::render(
                View::EditList {
                    list,
                    list_id,
                    list_name: &list.name,
                },
                &flash,
            ))
        }
        None => not_found(data, NotFoundError::List { index: list_id }),
    })
}

/// POST /lists/{id} - Rename a list.
async fn post_list(
    State(state): State<AppState>,
    session: SessionHandle,
    Path(id): Path<String>,
    Form(form): Form<ListNameForm>,
) -> Result<Response, ServerError> {
    let list_id = parse_list_ref(&id);
    session.respond(&state, |data| {
        match data.lists.rename_list(list_id, &form.list_name) {
            Ok(()) => {
                info!(list = list_id, "List renamed");
                data.flash.set_success("The list has been updated.");
                Outcome::redirect(list_path(list_id))
            }
            Err(StoreError::NotFound(err)) => not_found(data, err),
            Err(StoreError::Validation(err)) => {
                debug!(error = %err, list = list_id, "List rename rejected");
                data.flash.set_error(err.to_string());
                let flash = data.flash.take();
                match data.lists.list(list_id) {
                    Some(list) => Outcome::invalid(views::render(
                        View::EditList {
                            list,
                            list_id,
                            list_name: &form.list_name,
                        },
                        &flash,
                    )),
                    None => Outcome::redirect("/lists"),
                }
            }
        }
    })
}

/// POST /lists/{id}/delete - Delete a list.
///
/// AJAX-style requests receive the path to navigate to instead of a redirect.
/// Either way the success message waits for the next page.
async fn post_delete_list(
    State(state): State<AppState>,
    session: SessionHandle,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let list_id = parse_list_ref(&id);
    let xhr = is_xhr(&headers);
    session.respond(&state, |data| match data.lists.delete_list(list_id) {
        Ok(list) => {
            info!(list = list_id, todo_count = list.todos_count(), "List deleted");
            data.flash.set_success("The list has been deleted.");
            if xhr {
                Outcome::Text("/lists")
            } else {
                Outcome::redirect("/lists")
            }
        }
        Err(err) => not_found(data, err),
    })
}

// ============================================================================
// Todos
// ============================================================================

/// POST /lists/{id}/todos - Add a todo to a list.
async fn post_todos(
    State(state): State<AppState>,
    session: SessionHandle,
    Path(id): Path<String>,
    Form(form): Form<TodoForm>,
) -> Result<Response, ServerError> {
    let list_id = parse_list_ref(&id);
    session.respond(&state, |data| match data.lists.add_todo(list_id, &form.todo) {
        Ok(todo_id) => {
            info!(list = list_id, todo = todo_id, "Todo added");
            data.flash.set_success("The todo was added.");
            Outcome::redirect(list_path(list_id))
        }
        Err(StoreError::NotFound(err)) => not_found(data, err),
        Err(StoreError::Validation(err)) => {
            debug!(error = %err, list = list_id, "Todo rejected");
            data.flash.set_error(err.to_string());
            let flash = data.flash.take();
            match data.lists.list(list_id) {
                Some(list) => Outcome::invalid(views::render(
                    View::List {
                        list,
                        list_id,
                        todo_input: &form.todo,
                    },
                    &flash,
                )),
                None => Outcome::redirect("/lists"),
            }
        }
    })
}

/// POST /lists/{id}/todos/{todo_id} - Mark a todo completed or not.
async fn post_todo(
    State(state): State<AppState>,
    session: SessionHandle,
    Path((id, todo_id)): Path<(String, String)>,
    Form(form): Form<CompletedForm>,
) -> Result<Response, ServerError> {
    let list_id = parse_list_ref(&id);
    let todo_id = parse_todo_id(&todo_id);
    let completed = form.completed == "true";
    session.respond(&state, |data| {
        match data.lists.set_todo_completed(list_id, todo_id, completed) {
            Ok(()) => {
                info!(list = list_id, todo = todo_id, completed, "Todo updated");
                data.flash.set_success("The todo has been updated.");
                Outcome::redirect(list_path(list_id))
            }
            Err(err) => not_found(data, err),
        }
    })
}

/// POST /lists/{id}/todos/{todo_id}/delete - Delete a todo.
///
/// Deleting a todo that does not exist succeeds without changing anything.
/// AJAX-style requests receive `204 No Content` instead of a redirect.
async fn post_delete_todo(
    State(state): State<AppState>,
    session: SessionHandle,
    Path((id, todo_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let list_id = parse_list_ref(&id);
    let todo_id = parse_todo_id(&todo_id);
    let xhr = is_xhr(&headers);
    session.respond(&state, |data| match data.lists.delete_todo(list_id, todo_id) {
        Ok(()) => {
            info!(list = list_id, todo = todo_id, "Todo deleted");
            if xhr {
                Outcome::Status(StatusCode::NO_CONTENT)
            } else {
                data.flash.set_success("The todo has been deleted.");
                Outcome::redirect(list_path(list_id))
            }
        }
        Err(err) => not_found(data, err),
    })
}

/// POST /lists/{id}/complete_all - Complete every todo in a list.
async fn post_complete_all(
    State(state): State<AppState>,
    session: SessionHandle,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let list_id = parse_list_ref(&id);
    session.respond(&state, |data| match data.lists.complete_all(list_id) {
        Ok(()) => {
            info!(list = list_id, "All todos completed");
            data.flash.set_success("All todos have been completed.");
            Outcome::redirect(list_path(list_id))
        }
        Err(err) => not_found(data, err),
    })
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status (always "ok" if responding).
    pub status: String,

    /// Number of sessions currently held in memory.
    pub sessions: usize,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,
}

/// GET /health - Health check endpoint.
///
/// Does not create a session.
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.sessions.len(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// Tests
// ============================================================================
