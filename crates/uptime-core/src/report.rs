//! Human-readable report and alert rendering for the notification sink.
//!
//! Messages use the sink's lightweight Markdown. Layout is shared: a title
//! line, a UTC timestamp, a separator, then one block per item.

use chrono::Utc;

use crate::prober::ProbeResult;
use crate::tracker::TransitionEvent;

const RULE: &str = "────────────────────────────────────────";

fn timestamp_line() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Shared message header: title, timestamp, separator.
pub fn message_header(title: &str) -> String {
    format!("{}\n⏰ {}\n{}\n\n", title, timestamp_line(), RULE)
}

/// Render a probe cycle as a single report message.
///
/// The header always carries the timestamp and the aggregate up/down count.
/// The per-endpoint section is included when `include_all` is set or any
/// endpoint is down.
pub fn format_summary(results: &[ProbeResult], include_all: bool) -> String {
    let up_count = results.iter().filter(|r| r.is_up()).count();
    let down_count = results.len() - up_count;

    let mut message = message_header("🏥 **Health Check Report**");

    if down_count == 0 {
        message.push_str(&format!(
            "✅ All services are UP ({}/{})\n\n",
            up_count,
            results.len()
        ));
    } else {
        message.push_str(&format!(
            "⚠️ {} service(s) DOWN, {} UP\n\n",
            down_count, up_count
        ));
    }

    if include_all || down_count > 0 {
        for result in results {
            let emoji = if result.is_up() { "✅" } else { "❌" };
            message.push_str(&format!("{} **{}**\n", emoji, result.display_name));

            if result.is_up() {
                let secs = result.response_time.map(|d| d.as_secs_f64()).unwrap_or(0.0);
                message.push_str(&format!("   Status: {} ({:.2}s)\n", result.status, secs));
            } else {
                let error = result.error.as_deref().unwrap_or("Unknown error");
                message.push_str(&format!("   Status: {}\n", result.status));
                message.push_str(&format!("   Error: {}\n", error));
            }

            message.push_str(&format!("   URL: {}\n\n", result.url));
        }
    }

    message
}

/// Render status transitions as an alert message. `None` when there is
/// nothing to alert on.
pub fn format_alert(transitions: &[TransitionEvent]) -> Option<String> {
    if transitions.is_empty() {
        return None;
    }

    let mut message = message_header("🚨 **Service Status Alert**");

    for change in transitions {
        if change.current.is_up() {
            message.push_str(&format!("✅ **{}** is now UP\n", change.display_name));
            message.push_str(&format!(
                "   Previous: {} → Current: {}\n",
                change.previous, change.current
            ));
        } else {
            message.push_str(&format!("❌ **{}** is now DOWN\n", change.display_name));
            message.push_str(&format!(
                "   Previous: {} → Current: {}\n",
                change.previous, change.current
            ));
            let error = change.result.error.as_deref().unwrap_or("Unknown");
            message.push_str(&format!("   Error: {}\n", error));
        }

        message.push_str(&format!("   URL: {}\n\n", change.url));
    }

    Some(message)
}
