//! Administration page: active timestamp, auto-refresh and recent URLs.

use std::fmt::Write;

use axum::Form;
use axum::extract::State;
use axum::response::{Html, Redirect};
use serde::Deserialize;
use waybackproxy_core::ArchiveTimestamp;

use crate::error::ProxyError;
use crate::state::AppState;

/// Fields posted by the admin forms; an absent field leaves its setting alone.
#[derive(Debug, Default, Deserialize)]
pub struct AdminForm {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}

struct PageModel<'a> {
    admin_path: &'a str,
    timestamp: ArchiveTimestamp,
    refresh: Option<u32>,
    record_count: u64,
    history: &'a [String],
}

pub async fn page(State(state): State<AppState>) -> Result<Html<String>, ProxyError> {
    let record_count = state.store.count().await?;
    let history = state.history.snapshot().await;

    let model = PageModel {
        admin_path: state.admin_path.as_deref().unwrap_or_default(),
        timestamp: state.coordinator.timestamp().load(),
        refresh: state.refresh_interval(),
        record_count,
        history: &history,
    };

    Ok(Html(render_page(&model)))
}

pub async fn submit(State(state): State<AppState>, Form(form): Form<AdminForm>) -> Result<Redirect, ProxyError> {
    if let Some(raw) = form.timestamp.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        let timestamp = ArchiveTimestamp::parse(raw).map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
        let previous = state.coordinator.timestamp().store(timestamp);
        tracing::info!(%previous, current = %timestamp, "active timestamp changed");
    }

    if let Some(raw) = form.refresh {
        let secs = raw.trim().parse::<u32>().ok().filter(|secs| *secs > 0);
        state.set_refresh_interval(secs);
    }

    let back = state.admin_path.as_deref().unwrap_or("/");
    Ok(Redirect::to(back))
}

fn render_page(model: &PageModel<'_>) -> String {
    let action = escape(&format!("{}/submit", model.admin_path));
    let mut html = String::with_capacity(2048);

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    if let Some(secs) = model.refresh {
        let _ = writeln!(html, "<meta http-equiv=\"refresh\" content=\"{secs}\">");
    }
    html.push_str("<title>Administration</title>\n</head>\n<body>\n<h1>Administration</h1>\n<hr>\n");

    html.push_str("<h2>Timestamp</h2>\n");
    let _ = writeln!(
        html,
        "<form action=\"{action}\" method=\"post\"><label>Format: YYYY-MM-DD HH:MM:SS</label> \
         <input name=\"timestamp\" type=\"text\" value=\"{}\"> <input type=\"submit\"></form>",
        escape(&model.timestamp.to_form_value())
    );
    html.push_str("<hr>\n<h2>Auto refresh</h2>\n");
    let _ = writeln!(
        html,
        "<form action=\"{action}\" method=\"post\"><label>Delay (sec) (disabled if blank or invalid)</label> \
         <input name=\"refresh\" type=\"number\" value=\"{}\"> <input type=\"submit\"></form>",
        model.refresh.map(|secs| secs.to_string()).unwrap_or_default()
    );

    let _ = writeln!(html, "<hr>\n<h2>Cache</h2>\n<p>{} cached records</p>", model.record_count);

    html.push_str("<hr>\n<h2>History</h2>\n<ul>\n");
    for url in model.history {
        let url = escape(url);
        let _ = writeln!(html, "<li><a href=\"{url}\">{url}</a></li>");
    }
    html.push_str("</ul>\n</body>\n</html>\n");

    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
