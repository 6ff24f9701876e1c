// ./api/src/main.rs
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use application::{
    ApplicationError, BookResponse, BookService, CreateBookResponse, ListBooksQuery,
};
use domain::{BookPatch, BookPayload, DomainError};
use infrastructure::{InMemoryBookRepository, RandomIdGenerator};

#[derive(Clone)]
struct AppState {
    book_service: Arc<BookService>,
}

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

// --- Configuration ---

#[derive(Error, Debug, PartialEq)]
enum ConfigError {
    #[error("Invalid PORT value '{0}'")]
    InvalidPort(String),
    #[error("Invalid HOST value '{0}'")]
    InvalidHost(String),
}

#[derive(Debug, Clone, PartialEq)]
struct ServerConfig {
    host: IpAddr,
    port: u16,
}

impl ServerConfig {
    /// Reads `HOST` and `PORT`; invalid or missing values fall back to defaults.
    fn from_env() -> Self {
        Self::from_vars(env::var("HOST").ok(), env::var("PORT").ok())
    }

    fn from_vars(host: Option<String>, port: Option<String>) -> Self {
        let host = match host.as_deref().map(parse_host) {
            Some(Ok(host)) => host,
            Some(Err(e)) => {
                warn!("{}. Using default host {}.", e, DEFAULT_HOST);
                DEFAULT_HOST
            }
            None => DEFAULT_HOST,
        };
        let port = match port.as_deref().map(parse_port) {
            Some(Ok(port)) => {
                info!("Using port {} from environment variable PORT.", port);
                port
            }
            Some(Err(e)) => {
                warn!("{}. Using default port {}.", e, DEFAULT_PORT);
                DEFAULT_PORT
            }
            None => {
                info!(
                    "PORT environment variable not set. Using default port {}.",
                    DEFAULT_PORT
                );
                DEFAULT_PORT
            }
        };
        Self { host, port }
    }

    fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

fn parse_host(raw: &str) -> Result<IpAddr, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidHost(raw.to_string()))
}

// Application entry point
#[tokio::main]
async fn main() {
    // --- Logger Initialization ---
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    info!("Logger initialized successfully.");

    let config = ServerConfig::from_env();

    // --- Dependency Injection ---
    let book_repository = Arc::new(InMemoryBookRepository::new());
    let id_generator = Arc::new(RandomIdGenerator::new());
    let book_service = Arc::new(BookService::new(book_repository, id_generator));
    info!("Book service initialized.");

    let app = router(AppState { book_service });
    info!("API routes configured.");

    // --- Server Startup ---
    let addr = config.addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/books", get(list_books_handler).post(create_book_handler))
        .route(
            "/books/:book_id",
            get(get_book_handler)
                .put(update_book_handler)
                .delete(delete_book_handler),
        )
        .with_state(state)
}

// --- Response Envelope ---

/// Body shape shared by every `/books` response.
#[derive(Serialize, Debug)]
struct Envelope<T: Serialize> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn success<T: Serialize>(status: StatusCode, message: Option<&str>, data: Option<T>) -> Response {
    let body = Envelope {
        status: "success",
        message: message.map(str::to_string),
        data,
    };
    (status, JsonResponse(body)).into_response()
}

fn failure(status: StatusCode, message: String) -> Response {
    // 4xx is the caller's fault, 5xx is ours
    let tag = if status.is_server_error() { "error" } else { "fail" };
    let body: Envelope<()> = Envelope {
        status: tag,
        message: Some(message),
        data: None,
    };
    (status, JsonResponse(body)).into_response()
}

/// Which use case failed; selects the message prefix.
#[derive(Debug, Clone, Copy)]
enum Action {
    List,
    Get,
    Add,
    Update,
    Delete,
}

impl Action {
    fn prefix(self) -> &'static str {
        match self {
            Action::List => "Failed to list books",
            Action::Get => "Failed to get book",
            Action::Add => "Failed to add book",
            Action::Update => "Failed to update book",
            Action::Delete => "Failed to delete book",
        }
    }
}

// --- API Handlers ---

async fn health_check() -> impl IntoResponse {
    info!("Health check endpoint called");
    (StatusCode::OK, "OK")
}

/// Handler for listing books (GET /books?name=&reading=&finished=).
async fn list_books_handler(
    State(state): State<AppState>,
    query: Result<Query<ListBooksQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return reject(Action::List, rejection.body_text()),
    };
    info!(?query, "Received request to list books");
    match state.book_service.list_books(query).await {
        Ok(response) => success(StatusCode::OK, None, Some(response)),
        Err(e) => map_application_error_to_response(Action::List, e),
    }
}

/// Handler for getting a single book (GET /books/:book_id).
async fn get_book_handler(State(state): State<AppState>, Path(book_id): Path<String>) -> Response {
    info!(book_id = %book_id, "Received request to get book");
    match state.book_service.get_book(&book_id).await {
        Ok(book) => success(StatusCode::OK, None, Some(BookResponse { book })),
        Err(e) => map_application_error_to_response(Action::Get, e),
    }
}

/// Handler for adding a book (POST /books).
async fn create_book_handler(
    State(state): State<AppState>,
    payload: Result<Json<BookPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return reject(Action::Add, rejection.body_text()),
    };
    info!("Received request to add book");
    match state.book_service.create_book(payload).await {
        Ok(id) => success(
            StatusCode::CREATED,
            Some("Book added successfully"),
            Some(CreateBookResponse {
                book_id: id.into(),
            }),
        ),
        Err(e) => map_application_error_to_response(Action::Add, e),
    }
}

/// Handler for updating a book (PUT /books/:book_id).
async fn update_book_handler(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    patch: Result<Json<BookPatch>, JsonRejection>,
) -> Response {
    let Json(patch) = match patch {
        Ok(patch) => patch,
        Err(rejection) => return reject(Action::Update, rejection.body_text()),
    };
    info!(book_id = %book_id, "Received request to update book");
    match state.book_service.update_book(&book_id, patch).await {
        Ok(_) => success::<()>(StatusCode::OK, Some("Book updated successfully"), None),
        Err(e) => map_application_error_to_response(Action::Update, e),
    }
}

/// Handler for deleting a book (DELETE /books/:book_id).
async fn delete_book_handler(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Response {
    info!(book_id = %book_id, "Received request to delete book");
    match state.book_service.delete_book(&book_id).await {
        Ok(()) => success::<()>(StatusCode::OK, Some("Book deleted successfully"), None),
        Err(e) => map_application_error_to_response(Action::Delete, e),
    }
}

fn reject(action: Action, detail: String) -> Response {
    warn!("Rejected malformed request: {}", detail);
    failure(StatusCode::BAD_REQUEST, format!("{}. {}", action.prefix(), detail))
}

/// Maps an ApplicationError to an HTTP status code and envelope.
fn map_application_error_to_response(action: Action, err: ApplicationError) -> Response {
    let prefix = action.prefix();
    let (status, message) = match err {
        ApplicationError::DomainError(DomainError::MissingName) => (
            StatusCode::BAD_REQUEST,
            format!("{}. Please provide the book name", prefix),
        ),
        ApplicationError::DomainError(DomainError::InvalidPageRange { .. }) => (
            StatusCode::BAD_REQUEST,
            format!("{}. readPage cannot be greater than pageCount", prefix),
        ),
        ApplicationError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, format!("{}. {}", prefix, msg))
        }
        ApplicationError::NotFound(_) => match action {
            Action::Get => (StatusCode::NOT_FOUND, "Book not found".to_string()),
            _ => (StatusCode::NOT_FOUND, format!("{}. Id not found", prefix)),
        },
        ApplicationError::Integrity(msg) => {
            error!("Integrity failure: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, prefix.to_string())
        }
        ApplicationError::InfrastructureError(msg) => {
            error!("Underlying infrastructure error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            )
        }
    };
    if status.is_client_error() {
        warn!(status = status.as_u16(), "{}", message);
    }
    failure(status, message)
}
