// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login form rendering.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

/// Values shown on the login form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginView {
    /// Message shown above the form after a failed attempt.
    pub error: Option<String>,
    /// Username to pre-fill after a failed attempt.
    pub username: Option<String>,
    /// Destination carried through the form submission.
    pub next: Option<String>,
}

/// Renders the login form as HTML.
pub trait LoginPage: Send + Sync {
    fn render(&self, view: &LoginView) -> String;
}

/// Minimal built-in form.
#[derive(Debug, Clone)]
pub struct BasicLoginPage {
    title: String,
}

impl BasicLoginPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl LoginPage for BasicLoginPage {
    fn render(&self, view: &LoginView) -> String {
        let title = escape(&self.title);
        let error = view
            .error
            .as_deref()
            .map(|e| format!("<p class=\"error\" role=\"alert\">{}</p>\n", escape(e)))
            .unwrap_or_default();
        let username = escape(view.username.as_deref().unwrap_or_default());
        let next = view
            .next
            .as_deref()
            .map(|n| format!("<input type=\"hidden\" name=\"next\" value=\"{}\">\n", escape(n)))
            .unwrap_or_default();

        format!(
            "<!DOCTYPE html>\n\
             <html lang=\"en\">\n\
             <head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
             <body>\n\
             <h1>{title}</h1>\n\
             {error}\
             <form method=\"post\" action=\"/\">\n\
             <label>Username <input name=\"username\" value=\"{username}\" autocomplete=\"username\" required></label>\n\
             <label>Password <input type=\"password\" name=\"password\" autocomplete=\"current-password\" required></label>\n\
             <label><input type=\"checkbox\" name=\"remember\" value=\"on\"> Remember me</label>\n\
             {next}\
             <button type=\"submit\">Sign in</button>\n\
             </form>\n\
             </body>\n\
             </html>\n"
        )
    }
}

/// Render `view` with `page` as an HTML response.
pub fn render(page: &dyn LoginPage, status: StatusCode, view: &LoginView) -> Response {
    (status, Html(page.render(view))).into_response()
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
