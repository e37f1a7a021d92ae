//! Provider chooser
//!
//! `GET {base}login` renders the chooser (or skips it for a signed-in user),
//! `POST {base}login` forwards the browser to the chosen provider's login.

use axum::{
    extract::{Form, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};
use url::form_urlencoded;

use multiauth_core::dispatcher::CHOOSER_PATH;
use multiauth_core::metrics;
use multiauth_core::provider::HandlerKind;
use multiauth_core::redirect::{safe_next, url_concat};

use super::templates::LoginPage;
use super::{found, request_origin, AppResult, AppState};

pub const UNKNOWN_AUTHENTICATOR: &str = "Unknown or missing authenticator";

/// Query params accepted by the login routes
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Render the chooser page
pub(crate) fn render_chooser(
    state: &AppState,
    next: &str,
    login_error: Option<String>,
) -> AppResult<Html<String>> {
    let providers = state.dispatcher.provider_choices();
    let page = LoginPage {
        providers: &providers,
        next: form_urlencoded::byte_serialize(next.as_bytes()).collect(),
        login_error,
        login_url: format!(
            "{}{}",
            state.dispatcher.base_url(),
            CHOOSER_PATH.trim_start_matches('/')
        ),
    };
    Ok(Html(state.templates.render_login(&page)?))
}

/// GET /login
pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
) -> AppResult<Response> {
    metrics::record_login_request();

    let cookie_name = state.session_config.cookie_name.as_str();
    if let Some(token) = jar.get(cookie_name).map(|c| c.value().to_string()) {
        if let Some(session) = state.sessions.get(&token).await {
            // The browser's cookie may be stale; issue it again
            let next = safe_next(query.next.as_deref(), &state.home_url);
            debug!(
                user = %session.identity.username,
                provider = %session.identity.provider,
                signed_in_at = %session.created_at,
                "Already signed in, skipping chooser"
            );
            let jar = jar.add(state.session_cookie(token));
            return Ok((jar, found(&next)).into_response());
        }
    }

    let next = query.next.unwrap_or_default();
    Ok(render_chooser(&state, &next, None)?.into_response())
}

/// POST /login
pub async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    metrics::record_login_request();

    let next = form
        .get("next")
        .cloned()
        .or(query.next)
        .unwrap_or_default();
    let selected = state
        .dispatcher
        .select_provider(|field| form.get(field).map(String::as_str));

    let Some(key) = selected else {
        debug!("Chooser submitted without an enabled provider");
        return Ok(render_chooser(&state, &next, Some(UNKNOWN_AUTHENTICATOR.to_string()))?
            .into_response());
    };

    let origin = request_origin(&headers, state.trust_forwarded_headers);
    let login_url = format!(
        "{}{}{}/{}",
        origin.base(),
        state.dispatcher.base_url(),
        key.path_segment(),
        HandlerKind::Login.route_suffix()
    );
    info!(provider = %key, "Provider selected on chooser");
    Ok(found(&url_concat(&login_url, &[("next", next.as_str())])))
}
