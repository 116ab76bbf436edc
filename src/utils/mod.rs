/// Longest stderr excerpt carried into a failure message
const MAX_STDERR_CHARS: usize = 300;

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else if total_seconds == 0 && seconds > 0.0 {
        format!("{}ms", (seconds * 1000.0).round() as u64)
    } else {
        format!("{}s", secs)
    }
}

/// Last non-empty line of a tool's stderr, truncated for use in messages
pub fn last_stderr_line(stderr: &str) -> Option<String> {
    let line = stderr.lines().map(str::trim).rfind(|line| !line.is_empty())?;

    if line.chars().count() > MAX_STDERR_CHARS {
        let truncated: String = line.chars().take(MAX_STDERR_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(line.to_string())
    }
}

/// Check if the current environment has required tools
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path).await {
        missing.push(format!(
            "{} - required for the yt_dlp transcript strategy",
            yt_dlp_path
        ));
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
