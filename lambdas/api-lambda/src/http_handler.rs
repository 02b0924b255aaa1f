use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use serde::Serialize;
use std::sync::Arc;
use user_console_shared::{
    types::{Role, Status, UserDraft, UserPatch},
    view::{delete_prompt, ConsoleView, UserFilter},
    AppState,
};

/// Names the console session whose store a request works on.
const SESSION_HEADER: &str = "X-Session-Id";

/// Main Lambda handler - maps console requests onto the user store
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("User console API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header(
                "Access-Control-Allow-Methods",
                "GET,POST,PATCH,DELETE,OPTIONS",
            )
            .header(
                "Access-Control-Allow-Headers",
                "Content-Type,Authorization,X-Session-Id",
            )
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    let session_id = event
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match (method, parts.as_slice()) {
        // DELETE /session - tear down this console session
        (&Method::DELETE, ["session"]) => {
            let Some(id) = session_id else {
                return error_response(StatusCode::BAD_REQUEST, "Missing X-Session-Id header");
            };
            return if state.end_session(id).await {
                no_content()
            } else {
                not_found()
            };
        }
        (_, ["session"]) => return method_not_allowed(),
        (_, ["users", ..]) => {}
        _ => return not_found(),
    }

    let store = state.session(session_id).await;

    match (method, parts.as_slice()) {
        // GET /users?search=&status=&role= - filtered list with counters
        (&Method::GET, ["users"]) => {
            let filter = match parse_filter(&event) {
                Ok(filter) => filter,
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
            };
            json_response(StatusCode::OK, &ConsoleView::build(&store.state(), &filter))
        }
        // POST /users/refresh - refetch the whole list
        (&Method::POST, ["users", "refresh"]) => {
            if store.refresh().await {
                json_response(
                    StatusCode::OK,
                    &ConsoleView::build(&store.state(), &UserFilter::default()),
                )
            } else {
                store_error(store.last_error())
            }
        }
        // POST /users - create user
        (&Method::POST, ["users"]) => {
            let draft: UserDraft = match serde_json::from_slice(body) {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!("[CREATE] Parse error: {}", e);
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("Invalid request body: {}", e),
                    );
                }
            };
            match store.create(draft).await {
                Some(user) => json_response(StatusCode::CREATED, &user),
                None => store_error(store.last_error()),
            }
        }
        // PATCH /users/{id} - update supplied fields
        (&Method::PATCH, ["users", id]) => {
            let patch: UserPatch = match serde_json::from_slice(body) {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!("[UPDATE] Parse error: {}", e);
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("Invalid request body: {}", e),
                    );
                }
            };
            if patch.is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "Nothing to update");
            }
            match store.update(id, patch).await {
                Some(user) => json_response(StatusCode::OK, &user),
                None => store_error(store.last_error()),
            }
        }
        // GET /users/{id}/delete-prompt - confirmation text for the delete dialog
        (&Method::GET, ["users", id, "delete-prompt"]) => {
            match store.records().iter().find(|u| u.id == *id) {
                Some(user) => json_response(
                    StatusCode::OK,
                    &serde_json::json!({ "message": delete_prompt(user) }),
                ),
                None => not_found(),
            }
        }
        // DELETE /users/{id}
        (&Method::DELETE, ["users", id]) => {
            if store.remove(id).await {
                no_content()
            } else {
                store_error(store.last_error())
            }
        }
        (_, ["users"]) | (_, ["users", _]) | (_, ["users", _, _]) => method_not_allowed(),
        _ => not_found(),
    }
}

fn parse_filter(event: &Request) -> Result<UserFilter, String> {
    let params = event.query_string_parameters_ref();
    let param = |name: &str| {
        params
            .and_then(|p| p.first(name))
            .map(str::trim)
            .filter(|v| !v.is_empty() && *v != "All")
    };

    let status = param("status")
        .map(|s| s.parse::<Status>())
        .transpose()
        .map_err(|e| e.message())?;
    let role = param("role")
        .map(|r| r.parse::<Role>())
        .transpose()
        .map_err(|e| e.message())?;

    Ok(UserFilter {
        search: params
            .and_then(|p| p.first("search"))
            .unwrap_or_default()
            .to_string(),
        status,
        role,
    })
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

fn error_response(status: StatusCode, message: &str) -> Result<Response<Body>, Error> {
    json_response(status, &serde_json::json!({ "error": message }))
}

fn store_error(last_error: Option<String>) -> Result<Response<Body>, Error> {
    let message = last_error.unwrap_or_else(|| "An error occurred".to_string());
    error_response(StatusCode::BAD_GATEWAY, &message)
}

fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

fn method_not_allowed() -> Result<Response<Body>, Error> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

fn not_found() -> Result<Response<Body>, Error> {
    error_response(StatusCode::NOT_FOUND, "Not found")
}
