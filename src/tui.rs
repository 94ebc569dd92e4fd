use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const WARNING_STYLE: Style = Style::new().fg(Color::Yellow);

pub const FOCUS_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

pub const SERIES_STYLE: Style = Style::new().fg(Color::Rgb(80, 180, 240));

pub const BOLD: Style = Style::new().add_modifier(Modifier::BOLD);

/// Wrap text to a given width. Returns (wrapped_string, line_count).
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    if width == 0 {
        return (text.to_string(), 1);
    }
    let wrapped = textwrap::fill(text, width);
    let lines = wrapped.lines().count().max(1) as u16;
    (wrapped, lines)
}

/// Yellow warning lines, wrapped to `width`, for an empty chart.
pub fn warning_lines(text: &str, width: usize) -> Vec<Line<'static>> {
    let (wrapped, _) = wrap_text(text, width);
    wrapped
        .lines()
        .map(|l| Line::from(Span::styled(format!(" {l}"), WARNING_STYLE)))
        .collect()
}

/// A sidebar row: focus marker, fixed-width label, value.
pub fn control_line(label: &str, value: String, focused: bool) -> Line<'static> {
    let marker = if focused { ">" } else { " " };
    let style = if focused { FOCUS_STYLE } else { Style::default() };
    Line::from(vec![
        Span::styled(format!("{marker} {label:<11}"), style),
        Span::styled(value, style),
    ])
}

/// Rows `[start, end)` of a list of `len` rows to show in `height` lines so
/// that `cursor` stays visible.
pub fn list_window(len: usize, cursor: usize, height: usize) -> (usize, usize) {
    if height == 0 || len == 0 {
        return (0, 0);
    }
    if len <= height {
        return (0, len);
    }
    let start = cursor.saturating_sub(height / 2).min(len - height);
    (start, start + height)
}

/// Restore the terminal before the default panic output runs.
pub fn install_panic_hook() {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        let (wrapped, lines) = wrap_text("No data available for the selected filters.", 20);
        assert!(lines >= 2);
        assert!(wrapped.lines().all(|l| l.len() <= 20));
        assert_eq!(wrap_text("abc", 0), ("abc".to_string(), 1));
    }

    #[test]
    fn test_list_window_keeps_cursor_visible() {
        assert_eq!(list_window(3, 2, 10), (0, 3));
        assert_eq!(list_window(20, 0, 5), (0, 5));
        assert_eq!(list_window(20, 10, 5), (8, 13));
        assert_eq!(list_window(20, 19, 5), (15, 20));
        assert_eq!(list_window(0, 0, 5), (0, 0));
    }
}
