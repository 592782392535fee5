use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use tripmate_core::conversation::QUICK_REPLY_TOPICS;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use tripmate_core::{ChatEntry, KeySource, Severity};
use crate::animation::fade_color;
use crate::app::{App, FocusPane, InputMode};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let quick_replies_height = if app.show_quick_replies { 4 } else { 0 };

    // Main layout: header, chat, quick replies, input, footer
    let [header_area, chat_area, quick_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(quick_replies_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if app.show_quick_replies {
        render_quick_replies(app, frame, quick_area);
    } else {
        app.quick_reply_areas.clear();
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Popups and banner draw last
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
    render_banner(app, frame, chat_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let key_indicator = match app.settings.key_source {
        Some(KeySource::Flag) => " [key: flag]",
        Some(KeySource::Env) => " [key: env]",
        Some(KeySource::Config) => " [key: config]",
        None => " [no API key]",
    };

    let title = Line::from(vec![
        Span::styled(" ✈ Travel Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.settings.model.clone(), Style::default().fg(Color::White)),
        Span::styled(key_indicator, Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Rows a line occupies once wrapped to `width` columns
fn wrapped_rows(line: &Line, width: usize) -> u16 {
    let chars = line.width();
    if chars == 0 || width == 0 {
        1
    } else {
        chars.div_ceil(width) as u16
    }
}

fn typing_dots(frame_idx: u8) -> Line<'static> {
    let spans: Vec<Span<'static>> = (0..3u8)
        .map(|i| {
            if i == frame_idx {
                Span::styled("● ", Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
            } else {
                Span::styled("• ", Style::default().fg(Color::DarkGray))
            }
        })
        .collect();
    Line::from(spans)
}

fn entry_lines(app: &App, idx: usize, entry: &ChatEntry) -> Vec<Line<'static>> {
    let level = app.fades.level(entry.id());
    let selected = app.focus == FocusPane::Messages && app.selected_entry == Some(idx);
    let marker = if selected { "▶ " } else { "" };
    let mut lines = Vec::new();

    match entry {
        ChatEntry::DateMarker { display_date, .. } => {
            lines.push(
                Line::from(Span::styled(
                    format!("{}── {} ──", marker, display_date),
                    Style::default().fg(fade_color(level, Color::Gray)),
                ))
                .alignment(Alignment::Center),
            );
        }
        ChatEntry::User { id, text, .. } => {
            let editing = app.session.editing() == Some(*id);
            let label = if editing { "You (editing)" } else { "You" };
            lines.push(
                Line::from(Span::styled(
                    format!("{}{}", marker, label),
                    Style::default().fg(fade_color(level, Color::Cyan)).add_modifier(Modifier::BOLD),
                ))
                .alignment(Alignment::Right),
            );
            for line in text.lines() {
                lines.push(
                    Line::from(Span::styled(
                        line.to_string(),
                        Style::default().fg(fade_color(level, Color::White)),
                    ))
                    .alignment(Alignment::Right),
                );
            }
            lines.push(
                Line::from(Span::styled(entry.display_time(), Style::default().fg(Color::DarkGray)))
                    .alignment(Alignment::Right),
            );
        }
        ChatEntry::Assistant { text, .. } => {
            lines.push(Line::from(Span::styled(
                format!("{}◆ Assistant", marker),
                Style::default().fg(fade_color(level, Color::Yellow)).add_modifier(Modifier::BOLD),
            )));
            for line in text.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(fade_color(level, Color::Reset)),
                )));
            }
            lines.push(Line::from(Span::styled(
                entry.display_time(),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    lines.push(Line::default());
    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Messages;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    let wrap_width = area.width.saturating_sub(2) as usize;

    let mut lines: Vec<Line> = Vec::new();
    for (idx, entry) in app.session.entries().iter().enumerate() {
        lines.extend(entry_lines(app, idx, entry));
    }

    if app.is_sending() {
        lines.push(Line::from(Span::styled(
            "◆ Assistant",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(typing_dots(app.animation_frame));
    } else if app.session.is_empty() {
        let hint = if app.greeting_failed {
            "Could not reach the travel assistant. Press r to try again."
        } else if app.client.is_none() {
            "Add a Gemini API key with K to start planning."
        } else {
            "Connecting..."
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    }

    app.chat_total_lines = lines.iter().map(|l| wrapped_rows(l, wrap_width)).sum();
    let max_scroll = app.chat_total_lines.saturating_sub(app.chat_height);
    if app.follow_bottom || app.chat_scroll > max_scroll {
        app.chat_scroll = max_scroll;
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

/// Place buttons left to right, wrapping to the next row; buttons that do not
/// fit in `inner` are left out.
fn layout_quick_replies(inner: Rect, widths: &[u16]) -> Vec<Rect> {
    let mut rects = Vec::with_capacity(widths.len());
    let (mut x, mut y) = (inner.x, inner.y);
    for &width in widths {
        if x > inner.x && x + width > inner.right() {
            x = inner.x;
            y += 1;
        }
        if y >= inner.bottom() || width > inner.width {
            break;
        }
        rects.push(Rect::new(x, y, width, 1));
        x += width + 1;
    }
    rects
}

fn render_quick_replies(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::QuickReplies;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Quick replies ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let labels: Vec<String> = QUICK_REPLY_TOPICS
        .iter()
        .enumerate()
        .map(|(i, topic)| format!(" {} {} ", i + 1, title_case(topic)))
        .collect();
    let widths: Vec<u16> = labels.iter().map(|l| l.width() as u16).collect();
    app.quick_reply_areas = layout_quick_replies(inner, &widths);

    let dimmed = app.is_sending();
    for (i, (label, rect)) in labels.into_iter().zip(app.quick_reply_areas.iter()).enumerate() {
        let mut style = if focused && i == app.quick_reply_idx {
            Style::default().bg(Color::Cyan).fg(Color::Black)
        } else {
            Style::default().bg(Color::DarkGray).fg(Color::White)
        };
        if dimmed {
            style = style.add_modifier(Modifier::DIM);
        }
        frame.render_widget(Paragraph::new(Span::styled(label, style)), *rect);
    }
}

fn title_case(topic: &str) -> String {
    topic
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Input;
    let editing_entry = app.session.editing().is_some();
    let border_color = if editing_entry {
        Color::Magenta
    } else if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let title = if app.is_sending() { " Sending... " } else { " Message " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let content = if app.input.is_empty() {
        let placeholder = if editing_entry { "Editing message..." } else { "Type your message..." };
        Span::styled(placeholder, Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(app.input.clone())
    };

    let inner = block.inner(area);
    frame.render_widget(Paragraph::new(Line::from(content)).block(block), area);

    if focused && app.input_mode == InputMode::Editing && !app.show_api_key_input && !app.show_model_picker {
        let cursor_x = (cursor_column(&app.input, app.input_cursor) as u16).min(inner.width.saturating_sub(1));
        frame.set_cursor_position((inner.x + cursor_x, inner.y));
    }
}

/// Display column of a char-indexed cursor; wide glyphs take two cells
fn cursor_column(text: &str, cursor: usize) -> usize {
    text.chars().take(cursor).map(|c| c.width().unwrap_or(0)).sum()
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" TYPE ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let mut hints: Vec<Span> = Vec::new();
    match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => {
            hints.extend(hint(" Enter ", if app.session.editing().is_some() { " save edit " } else { " send " }));
            hints.extend(hint(" Esc ", if app.session.editing().is_some() { " cancel edit " } else { " stop typing " }));
        }
        (InputMode::Normal, FocusPane::QuickReplies) => {
            hints.extend(hint(" h/l ", " pick "));
            hints.extend(hint(" Enter ", " ask "));
        }
        (InputMode::Normal, _) => {
            hints.extend(hint(" j/k ", " select "));
            hints.extend(hint(" e ", " edit "));
            hints.extend(hint(" i ", " type "));
            if app.greeting_failed {
                hints.extend(hint(" r ", " retry "));
            }
        }
    }
    if app.input_mode == InputMode::Normal {
        if app.show_quick_replies {
            hints.extend(hint(" 1-9 ", " quick reply "));
        }
        hints.extend(hint(" M ", " model "));
        hints.extend(hint(" K ", " API key "));
        hints.extend(hint(" q ", " quit "));
    }
    hints.extend(hint(" ^L ", " clear "));

    let footer_content = Line::from(
        vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(hints)
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_banner(app: &App, frame: &mut Frame, area: Rect) {
    let Some(banner) = &app.banner else {
        return;
    };
    let notification = &banner.notification;

    let color = match notification.severity {
        Severity::Info => Color::Blue,
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Danger => Color::Red,
    };

    let width = 50.min(area.width.saturating_sub(2));
    let banner_area =
        Rect::new(area.x + area.width.saturating_sub(width + 1), area.y + 1, width, 4).intersection(area);
    frame.render_widget(Clear, banner_area);

    let body = Paragraph::new(notification.description.clone())
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(Span::styled(
                    format!(" {} ", notification.title),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
        );
    frame.render_widget(body, banner_area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 40, app.available_models.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|m| {
            let current = if *m == app.settings.model { " (current)" } else { "" };
            ListItem::new(format!("{}{}", m, current))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Select Model "),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Yellow)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

/// Mask all but the last four characters of a key
fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        "*".repeat(len)
    } else {
        let masked_len = len - 4;
        let last_four: String = key.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 60, 7);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Enter Gemini API Key ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let input = Paragraph::new(mask_key(&app.api_key_input)).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    let cursor_x = app.api_key_input_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(format!("{} characters", app.api_key_input.chars().count()))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("packing tips"), "Packing Tips");
        assert_eq!(title_case("flights"), "Flights");
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("abc"), "***");
        assert_eq!(mask_key("abcdefgh"), "****...efgh");
    }

    #[test]
    fn test_cursor_column_counts_wide_chars() {
        assert_eq!(cursor_column("Paris", 3), 3);
        assert_eq!(cursor_column("go to 東京", 7), 8);
        assert_eq!(cursor_column("go to 東京", 8), 10);
        assert_eq!(cursor_column("", 4), 0);
    }

    #[test]
    fn test_quick_reply_layout_wraps_rows() {
        let inner = Rect::new(1, 10, 20, 2);
        let rects = layout_quick_replies(inner, &[8, 8, 8, 8, 8]);
        assert_eq!(rects.len(), 4);
        assert_eq!(rects[0], Rect::new(1, 10, 8, 1));
        assert_eq!(rects[1], Rect::new(10, 10, 8, 1));
        assert_eq!(rects[2], Rect::new(1, 11, 8, 1));
        assert_eq!(rects[3], Rect::new(10, 11, 8, 1));
    }

    #[test]
    fn test_wrapped_rows() {
        assert_eq!(wrapped_rows(&Line::default(), 10), 1);
        assert_eq!(wrapped_rows(&Line::from("0123456789"), 10), 1);
        assert_eq!(wrapped_rows(&Line::from("0123456789a"), 10), 2);
    }

    #[test]
    fn test_typing_dots_highlight_one() {
        let line = typing_dots(1);
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "● ");
        assert_eq!(line.spans[0].content, "• ");
    }
}
