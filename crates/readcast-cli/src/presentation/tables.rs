//! Table formatting utilities for CLI output.

use readcast_core::QueueSnapshot;

const TITLE_WIDTH: usize = 40;
const FEED_WIDTH: usize = 14;
const TABLE_WIDTH: usize = 82;

/// Truncates a string to at most `max_len` characters, adding "..." if needed.
///
/// ```rust
/// use readcast_cli::presentation::truncate_string;
///
/// assert_eq!(truncate_string("Hello", 10), "Hello");
/// assert_eq!(truncate_string("Hello World", 8), "Hello...");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// `h:mm:ss` or `m:ss`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Print the queue as a table. Positions are 1-based; `>` marks the
/// current item.
pub fn print_queue(queue: &QueueSnapshot) {
    if queue.is_empty() {
        println!("The queue is empty.");
        return;
    }

    println!(
        "  {:>3}  {:<6}  {:<title$}  {:<feed$}  {:>8}  {}",
        "#",
        "KIND",
        "TITLE",
        "FEED",
        "POSITION",
        "FLAGS",
        title = TITLE_WIDTH,
        feed = FEED_WIDTH,
    );
    print_separator(TABLE_WIDTH);

    for (index, item) in queue.items.iter().enumerate() {
        let marker = if queue.current_index == Some(index) { ">" } else { " " };
        let mut flags = Vec::new();
        if item.listened {
            flags.push("listened");
        }
        if item.kept {
            flags.push("kept");
        }
        println!(
            "{marker} {:>3}  {:<6}  {:<title$}  {:<feed$}  {:>8}  {}",
            index + 1,
            item.kind,
            truncate_string(&item.title, TITLE_WIDTH),
            truncate_string(item.feed_label.as_deref().unwrap_or("-"), FEED_WIDTH),
            format_duration(item.last_position),
            flags.join(","),
            title = TITLE_WIDTH,
            feed = FEED_WIDTH,
        );
    }
}
