use std::fmt::Write;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::state::AppState;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut out = String::with_capacity(2048);
    let monitor = &state.monitor;

    writeln!(out, "# TYPE uptime_monitor_info info").unwrap();
    writeln!(out, "# HELP uptime_monitor_info Information about the uptime monitor").unwrap();
    writeln!(
        out,
        "uptime_monitor_info{{version=\"{}\",created=\"{}\"}} 1",
        env!("CARGO_PKG_VERSION"),
        monitor.created_at().to_rfc3339()
    )
    .unwrap();

    writeln!(out, "# TYPE uptime_monitor_state stateset").unwrap();
    writeln!(out, "# HELP uptime_monitor_state Current state of the scheduler").unwrap();
    let current = monitor.state().await.to_string();
    for variant in &["idle", "active", "stopping", "stopped"] {
        writeln!(
            out,
            "uptime_monitor_state{{state=\"{}\"}} {}",
            variant,
            if current == *variant { 1 } else { 0 }
        )
        .unwrap();
    }

    writeln!(out, "# TYPE uptime_monitor_endpoints gauge").unwrap();
    writeln!(out, "# HELP uptime_monitor_endpoints Number of monitored endpoints").unwrap();
    writeln!(out, "uptime_monitor_endpoints {}", monitor.endpoints().len()).unwrap();

    writeln!(out, "# TYPE uptime_monitor_endpoint_up gauge").unwrap();
    writeln!(
        out,
        "# HELP uptime_monitor_endpoint_up Last observed status per endpoint URL"
    )
    .unwrap();
    for (url, up) in monitor.status_snapshot().await {
        writeln!(
            out,
            "uptime_monitor_endpoint_up{{url=\"{}\"}} {}",
            url,
            if up { 1 } else { 0 }
        )
        .unwrap();
    }

    writeln!(out, "# TYPE uptime_monitor_transitions counter").unwrap();
    writeln!(
        out,
        "# HELP uptime_monitor_transitions Status transitions per endpoint URL since start"
    )
    .unwrap();
    let mut counts: Vec<_> = monitor.transition_counts().await.into_iter().collect();
    counts.sort();
    for (url, count) in counts {
        writeln!(out, "uptime_monitor_transitions{{url=\"{}\"}} {}", url, count).unwrap();
    }

    writeln!(out, "# TYPE uptime_monitor_last_check_timestamp_seconds gauge").unwrap();
    writeln!(
        out,
        "# HELP uptime_monitor_last_check_timestamp_seconds Unix timestamp of the last probe cycle"
    )
    .unwrap();
    if let Some(t) = monitor.last_checked().await {
        let secs = t.timestamp() as f64 + (t.timestamp_subsec_millis() as f64 / 1000.0);
        writeln!(out, "uptime_monitor_last_check_timestamp_seconds {:.3}", secs).unwrap();
    }

    writeln!(out, "# TYPE uptime_monitor_uptime_seconds gauge").unwrap();
    writeln!(out, "# HELP uptime_monitor_uptime_seconds Time since the monitor was created").unwrap();
    let uptime = (chrono::Utc::now() - monitor.created_at()).num_milliseconds() as f64 / 1000.0;
    writeln!(out, "uptime_monitor_uptime_seconds {:.3}", uptime).unwrap();

    writeln!(out, "# EOF").unwrap();

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        out,
    )
}
