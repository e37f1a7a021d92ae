//! Per-provider OAuth2 handlers
//!
//! Mounted at `/<provider>/login` and `/<provider>/callback`. Each route
//! carries the `HandlerRef` it was registered with; that tag is the only
//! thing used to decide which provider a request belongs to.

use axum::{
    extract::{OriginalUri, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

use multiauth_core::dispatcher::AttemptState;
use multiauth_core::metrics;
use multiauth_core::redirect::safe_next;
use multiauth_core::{CallbackData, Error, HandlerContext, HandlerRef, ProviderKey};

use super::login::{render_chooser, NextQuery};
use super::{found, request_origin, AppError, AppResult, AppState};

/// Parameters the identity provider appends to the callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Provider login: redirect to the identity provider
///
/// GET /<provider>/login?next=<path>
pub async fn provider_login(
    State(state): State<AppState>,
    Extension(handler): Extension<HandlerRef>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> AppResult<Response> {
    let ctx = HandlerContext::new(
        handler,
        request_origin(&headers, state.trust_forwarded_headers),
        uri.path(),
    );
    let resolved = state.dispatcher.get_callback_url(Some(&ctx))?;

    let next = safe_next(query.next.as_deref(), &state.home_url);
    let state_token = state
        .login_states
        .issue(resolved.key, resolved.callback_url.clone(), next)
        .await;
    let authorize_url = resolved.authorize_url(&state_token)?;

    metrics::record_provider_redirect(resolved.key.as_str());
    info!(
        provider = %resolved.key,
        callback_url = %resolved.callback_url,
        state = AttemptState::Redirected.as_str(),
        "Redirecting to identity provider"
    );
    Ok(found(&authorize_url))
}

/// Provider callback: finish the login and start a session
///
/// GET /<provider>/callback?code=xxx&state=xxx
pub async fn provider_callback(
    State(state): State<AppState>,
    Extension(handler): Extension<HandlerRef>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    let provider = handler.provider;
    let state_token = query
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing OAuth2 state"))?;

    let pending = match state.login_states.take(state_token, provider).await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(provider = %provider, error = %e, "OAuth2 state verification failed");
            return login_failed(&state, provider, &state.home_url, &e);
        }
    };

    let ctx = HandlerContext::new(
        handler,
        request_origin(&headers, state.trust_forwarded_headers),
        uri.path(),
    );
    let data = CallbackData {
        code: query.code.as_deref(),
        error: query.error.as_deref(),
        redirect_uri: Some(&pending.callback_url),
    };

    match state.dispatcher.authenticate(&ctx, data).await {
        Ok(Some(identity)) => {
            info!(
                provider = %provider,
                user = %identity.username,
                elapsed_ms = pending.elapsed().num_milliseconds(),
                "Login completed"
            );
            let token = state.sessions.create(identity).await;
            let jar = jar.add(state.session_cookie(token));
            Ok((jar, found(&pending.next)).into_response())
        }
        Ok(None) => {
            if let Some(description) = &query.error_description {
                warn!(provider = %provider, description = %description, "Login not completed");
            }
            let message = format!("Sign in with {} was not completed", provider.display_name());
            Ok(render_chooser(&state, &pending.next, Some(message))?.into_response())
        }
        Err(e) if e.is_routing() => Err(e.into()),
        Err(e) => login_failed(&state, provider, &pending.next, &e),
    }
}

/// Chooser page with a generic failure message; details stay in the logs
fn login_failed(
    state: &AppState,
    provider: ProviderKey,
    next: &str,
    err: &Error,
) -> AppResult<Response> {
    error!(provider = %provider, error = %err, "Login failed");
    let status = match err {
        Error::InvalidInput(_) | Error::OAuthCallbackMismatch { .. } => StatusCode::BAD_REQUEST,
        Error::ProviderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::Exchange { .. } | Error::ProfileFetch { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = format!("Sign in with {} failed, please try again", provider.display_name());
    let page = render_chooser(state, next, Some(message))?;
    Ok((status, page).into_response())
}
