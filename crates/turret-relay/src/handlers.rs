//! HTTP endpoint handlers for the relay.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Rig connection, operator count, game snapshot |
//! | `GET` | `/api/leaderboard` | Finished missions, best first |

use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::state::{AppState, LeaderboardResponse, RelayStatus};

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing relay status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.status().await;
    let rig = if status.rig_connected { "CONNECTED" } else { "OFFLINE" };
    let operators = status.operators;
    let pilot = status
        .game
        .player
        .as_deref()
        .map_or_else(|| String::from("none"), escape_html);
    let time_left = status.game.time_left;
    let score = status.game.score;

    let mut queue = String::new();
    for name in &status.game.queue {
        let _ = write!(queue, "<li>{}</li>", escape_html(name));
    }
    if queue.is_empty() {
        queue.push_str("<li>empty</li>");
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Turret Relay</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
    </style>
</head>
<body>
    <h1>Turret Relay</h1>
    <div>
        <div class="metric"><div class="label">Rig</div><div class="value">{rig}</div></div>
        <div class="metric"><div class="label">Operators</div><div class="value">{operators}</div></div>
        <div class="metric"><div class="label">Pilot</div><div class="value">{pilot}</div></div>
        <div class="metric"><div class="label">Time left</div><div class="value">{time_left}s</div></div>
        <div class="metric"><div class="label">Score</div><div class="value">{score}</div></div>
    </div>
    <h2>Queue</h2>
    <ul>{queue}</ul>
    <h2>API</h2>
    <ul>
        <li><a href="/api/status">/api/status</a></li>
        <li><a href="/api/leaderboard">/api/leaderboard</a></li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Relay and lobby snapshot.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<RelayStatus> {
    Json(state.status().await)
}

// ---------------------------------------------------------------------------
// GET /api/leaderboard
// ---------------------------------------------------------------------------

/// Finished missions, best first.
pub async fn get_leaderboard(State(state): State<Arc<AppState>>) -> Json<LeaderboardResponse> {
    Json(state.leaderboard().await)
}

/// Pilot names are user input.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
