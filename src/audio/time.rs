/// Placeholder shown for an unknown total duration
pub const UNKNOWN_TOTAL: &str = "--:--";

fn format_seconds(seconds: f64) -> String {
    let total_seconds = seconds.floor() as u64;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}", minutes, seconds)
}

/// Format the current position. Non-finite or negative input renders as `00:00`.
pub fn format_current_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    format_seconds(seconds)
}

/// Format the total duration. Unknown (non-finite, negative or zero) renders as `--:--`.
pub fn format_total_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return UNKNOWN_TOTAL.to_string();
    }
    format_seconds(seconds)
}

/// A duration is usable once the primitive reports a finite, positive value
pub fn is_known_duration(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0
}
