use chrono::{DateTime, Local, Utc};

use crate::error::{ErrorSeverity, PlayerError};
use crate::models::{CacheEntry, CacheStats};

/// Output formatting for the cache CLI
pub struct CacheDisplay;

impl CacheDisplay {
    /// One line per cached file, oldest first
    pub fn display_entries(entries: &[CacheEntry], sizes: &[Option<u64>]) {
        if entries.is_empty() {
            println!("Cache is empty");
            return;
        }

        println!("Cached audio ({} files):", entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let size = match sizes.get(i).copied().flatten() {
                Some(size) => Self::format_file_size(size),
                None => "missing".to_string(),
            };
            println!(
                "  {:>3}. {}  {:>9}  {}",
                i + 1,
                Self::format_cached_at(entry.cached_at),
                size,
                Self::truncate(&entry.remote_url, 60)
            );
        }
    }

    pub fn display_stats(stats: &CacheStats, audio_dir: &std::path::Path) {
        println!("┌─ Audio Cache ───────────────────────────────────────────┐");
        println!("│ Directory: {}", audio_dir.display());
        println!("│ Entries:   {}", stats.entries);
        println!("│ Size:      {}", Self::format_file_size(stats.total_bytes));
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon, severity.as_str());

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() + 1 <= width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }

        lines
    }

    /// Format file size in human-readable format
    pub fn format_file_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
        let mut size_f = size as f64;
        let mut unit_index = 0;

        while size_f >= 1024.0 && unit_index < UNITS.len() - 1 {
            size_f /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size_f, UNITS[unit_index])
        }
    }

    pub fn format_cached_at(cached_at: DateTime<Utc>) -> String {
        cached_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, PlaylistError};
    use std::path::PathBuf;

    #[test]
    fn test_format_file_size() {
        assert_eq!(CacheDisplay::format_file_size(512), "512 B");
        assert_eq!(CacheDisplay::format_file_size(1024), "1.0 KB");
        assert_eq!(CacheDisplay::format_file_size(1536), "1.5 KB");
        assert_eq!(CacheDisplay::format_file_size(1024 * 1024), "1.0 MB");
        assert_eq!(CacheDisplay::format_file_size(1536 * 1024 * 1024), "1.5 GB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(CacheDisplay::truncate("short", 10), "short");
        assert_eq!(CacheDisplay::truncate("this is a very long string", 10), "this is...");
        assert_eq!(CacheDisplay::truncate("abc", 2), "abc");
        assert_eq!(CacheDisplay::truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_wrap_text() {
        let lines = CacheDisplay::wrap_text("the quick brown fox jumps", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
        assert!(CacheDisplay::wrap_text("", 10).is_empty());
    }

    #[test]
    fn test_display_functions_dont_panic() {
        let entry = CacheEntry::new("https://cdn.example.com/a.mp3", PathBuf::from("/c/a.mp3"));
        CacheDisplay::display_entries(&[entry.clone()], &[Some(2048)]);
        CacheDisplay::display_entries(&[entry], &[]);
        CacheDisplay::display_entries(&[], &[]);
        CacheDisplay::display_stats(&CacheStats::default(), &PathBuf::from("/c"));

        CacheDisplay::display_error(&PlayerError::Cache(CacheError::Store("locked".to_string())));
        CacheDisplay::display_error(&PlayerError::Playlist(PlaylistError::EmptyPlaylist));
    }
}
