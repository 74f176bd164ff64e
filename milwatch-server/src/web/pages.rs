//! HTML page handler: the recent-alert table.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use milwatch_core::AlertRecord;

use crate::web::AppState;

/// Seconds between automatic page reloads.
const REFRESH_SECS: u32 = 10;

const PAGE_CSS: &str = r#"body { font-family: sans-serif; background: #1a1a1a; color: #e6e6e6; margin: 16px; }
h1 { color: #0099ff; }
.loc { color: #888; font-size: 13px; }
table { width: 100%; border-collapse: collapse; }
th, td { padding: 8px; text-align: left; border-bottom: 1px solid #444; }
th { background: #0099ff; color: #1a1a1a; }
tr:nth-child(even) { background: #2a2a2a; }
.empty { color: #888; font-style: italic; }
a { color: #57aeff; }"#;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn alert_row(alert: &AlertRecord) -> String {
    format!(
        "<tr><td>{}</td><td><b>{}</b></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}, {}</td><td><a href=\"{}\" target=\"_blank\">Track</a></td></tr>\n",
        alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        escape_html(alert.callsign.as_deref().unwrap_or("-")),
        escape_html(&alert.identifier),
        escape_html(&alert.label),
        alert.category,
        alert.altitude_text(),
        alert.speed_text(),
        alert.distance_text(),
        alert.bearing_text(),
        escape_html(&alert.map_link()),
    )
}

/// Full page for the given alerts (newest first).
pub fn render_index(alerts: &[AlertRecord], location_line: &str) -> String {
    let mut s = String::with_capacity(4096);
    s.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    s.push_str("<meta charset=\"UTF-8\">\n");
    s.push_str(&format!(
        "<meta http-equiv=\"refresh\" content=\"{REFRESH_SECS}\">\n"
    ));
    s.push_str("<title>milwatch alerts</title>\n<style>\n");
    s.push_str(PAGE_CSS);
    s.push_str("\n</style>\n</head>\n<body>\n");
    s.push_str("<h1>Recent Aircraft Alerts</h1>\n");
    s.push_str(&format!(
        "<p class=\"loc\">{} &middot; refreshes every {REFRESH_SECS} seconds</p>\n",
        escape_html(location_line)
    ));

    if alerts.is_empty() {
        s.push_str("<p class=\"empty\">No alerts yet.</p>\n");
    } else {
        s.push_str("<table>\n<thead><tr><th>Time (UTC)</th><th>Callsign</th><th>ICAO</th><th>Reason</th><th>Category</th><th>Altitude</th><th>Speed</th><th>Position</th><th>Map</th></tr></thead>\n<tbody>\n");
        for alert in alerts {
            s.push_str(&alert_row(alert));
        }
        s.push_str("</tbody>\n</table>\n");
    }
    s.push_str("</body>\n</html>");
    s
}

/// GET /: recent alerts.
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let loc = state.location.current();
    let location_line = format!("Reference {:.4}, {:.4} ({})", loc.lat, loc.lon, loc.source);
    Html(render_index(&state.alerts.snapshot(), &location_line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use milwatch_core::{Coord, LocationProvider};

    use crate::sinks::web::tests::sample;
    use crate::sinks::AlertBuffer;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>&\"'"), "&lt;b&gt;&amp;&quot;&#39;");
    }

    #[test]
    fn test_render_empty() {
        let html = render_index(&[], "Reference 0, 0");
        assert!(html.contains("http-equiv=\"refresh\" content=\"10\""));
        assert!(html.contains("No alerts yet."));
    }

    #[tokio::test]
    async fn test_index_lists_alerts() {
        let alerts = Arc::new(AlertBuffer::new(25));
        let mut alert = sample("AE0200");
        alert.label = "Coast <Guard>".into();
        alerts.push(alert);
        let state = Arc::new(AppState {
            alerts,
            location: Arc::new(LocationProvider::new(Coord::new(38.95, -77.38))),
        });

        let response = crate::web::build_router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("AE0200"));
        assert!(html.contains("Coast &lt;Guard&gt;"));
        assert!(html.contains("Reference 38.9500, -77.3800 (Fallback)"));
    }
}
