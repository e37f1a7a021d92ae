//! Login page rendering
//!
//! Uses Handlebars; every `{{value}}` is HTML-escaped.

use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;

use multiauth_core::dispatcher::ProviderChoice;
use multiauth_core::{Error, Result};

const LOGIN_TEMPLATE: &str = include_str!("../../templates/login.html");

/// Data the chooser template is rendered with
#[derive(Debug, Serialize)]
pub struct LoginPage<'a> {
    pub providers: &'a [ProviderChoice],
    /// URL-escaped `next` value
    pub next: String,
    pub login_error: Option<String>,
    /// Chooser path the form posts back to, without query
    pub login_url: String,
}

#[derive(Clone)]
pub struct LoginTemplates {
    handlebars: Arc<Handlebars<'static>>,
}

impl std::fmt::Debug for LoginTemplates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginTemplates").finish_non_exhaustive()
    }
}

impl LoginTemplates {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars
            .register_template_string("login", LOGIN_TEMPLATE)
            .map_err(|e| Error::Internal(format!("Failed to register login template: {e}")))?;

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    pub fn render_login(&self, page: &LoginPage<'_>) -> Result<String> {
        self.handlebars
            .render("login", page)
            .map_err(|e| Error::Internal(format!("Failed to render template: {e}")))
    }
}
