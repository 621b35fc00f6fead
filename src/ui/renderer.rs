use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use tui_textarea::TextArea;
use unicode_width::UnicodeWidthStr;

use crate::core::app::{App, Notice, NoticeKind};
use crate::core::context::WarningLevel;
use crate::core::message::{ConversationMessage, Role};

const TOOL_PREVIEW_CHARS: usize = 160;

/// Terminal-only state the [`App`] does not need to know about.
pub struct ChatView {
    pub textarea: TextArea<'static>,
    /// Rows scrolled back from the bottom of the transcript.
    pub scroll_back: u16,
}

impl Default for ChatView {
    fn default() -> Self {
        let mut textarea = TextArea::default();
        textarea.set_cursor_line_style(Style::default());
        textarea.set_placeholder_text("Message, or /help");
        Self {
            textarea,
            scroll_back: 0,
        }
    }
}

impl ChatView {
    pub fn input_text(&self) -> String {
        self.textarea.lines().join("\n")
    }

    /// Empties the input box and returns what it held.
    pub fn take_input(&mut self) -> String {
        let text = self.input_text();
        *self = ChatView::default();
        text
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_add(rows);
    }

    pub fn scroll_down(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(rows);
    }
}

pub fn ui(f: &mut Frame, app: &App, view: &ChatView) {
    let input_rows = (view.textarea.lines().len() as u16).clamp(1, 6);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(input_rows + 2), // borders
            Constraint::Length(1),
        ])
        .split(f.area());

    f.render_widget(Paragraph::new(header_line(app)), chunks[0]);
    render_transcript(f, app, view, chunks[1]);

    let input_title = if app.is_busy() {
        "Working… commands still accepted"
    } else {
        "Enter to send · Alt+Enter newline · PgUp/PgDn scroll · Ctrl+C quit"
    };
    let mut textarea = view.textarea.clone();
    textarea.set_block(
        Block::default()
            .borders(Borders::ALL)
            .title(input_title)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(&textarea, chunks[2]);

    f.render_widget(Paragraph::new(status_line(app)), chunks[3]);
}

fn render_transcript(f: &mut Frame, app: &App, view: &ChatView, area: Rect) {
    let lines = transcript_lines(app);
    let total_rows = wrapped_row_count(&lines, area.width);
    let max_offset = total_rows.saturating_sub(area.height);
    let offset = max_offset.saturating_sub(view.scroll_back);

    let transcript = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    f.render_widget(transcript, area);
}

pub fn header_line(app: &App) -> Line<'static> {
    let session = &app.session;
    let mut spans = vec![
        Span::styled(
            format!("parley v{}", env!("CARGO_PKG_VERSION")),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" · {} · {}", session.endpoint, session.model)),
        Span::raw(" · skills "),
        if app.skills_enabled {
            Span::styled("on", Style::default().fg(Color::Green))
        } else {
            Span::styled("off", Style::default().fg(Color::DarkGray))
        },
    ];
    if session.nsfw_mode {
        spans.push(Span::styled(
            " · NSFW",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

pub fn status_line(app: &App) -> Line<'static> {
    let usage = app.context_usage();
    let level = usage.warning_level();
    let context_style = match level {
        WarningLevel::Ok => Style::default().fg(Color::DarkGray),
        WarningLevel::Warn | WarningLevel::Caution => Style::default().fg(Color::Yellow),
        WarningLevel::Critical => Style::default()
            .fg(Color::White)
            .bg(Color::Red)
            .add_modifier(Modifier::BOLD),
    };

    let activity = app.activity().unwrap_or_else(|| "Ready".to_string());
    Line::from(vec![
        Span::raw(activity),
        Span::raw("  "),
        Span::styled(
            format!(
                "context {:.0}% of {} ({level})",
                usage.percent(),
                usage.max_tokens
            ),
            context_style,
        ),
    ])
}

/// Session messages in order, with each notice placed after the messages
/// that existed when it was raised.
pub fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut notices = app.notices.iter().peekable();

    for (index, message) in app.session.messages.iter().enumerate() {
        while let Some(notice) = notices.next_if(|notice| notice.after_message <= index) {
            push_notice(&mut lines, notice);
        }
        push_message(&mut lines, message, app.visible_content(index));
    }
    for notice in notices {
        push_notice(&mut lines, notice);
    }
    lines
}

fn push_message(lines: &mut Vec<Line<'static>>, message: &ConversationMessage, visible: &str) {
    match message.role {
        Role::User => {
            let style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
            push_prefixed(lines, "You: ", style, visible, Style::default());
            lines.push(Line::default());
        }
        Role::Assistant => {
            if visible.is_empty() {
                if let Some(calls) = message.tool_calls.as_deref() {
                    let names: Vec<&str> =
                        calls.iter().map(|call| call.function_name.as_str()).collect();
                    lines.push(Line::from(Span::styled(
                        format!("⋯ calling {}", names.join(", ")),
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::ITALIC),
                    )));
                    lines.push(Line::default());
                }
                return;
            }
            for line in visible.lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::default());
        }
        Role::Tool => {
            let id = message.tool_call_id.as_deref().unwrap_or("tool");
            lines.push(Line::from(Span::styled(
                format!("↳ {id}: {}", preview(&message.content)),
                Style::default().fg(Color::DarkGray),
            )));
        }
        Role::System => {}
    }
}

fn push_notice(lines: &mut Vec<Line<'static>>, notice: &Notice) {
    let color = match notice.kind {
        NoticeKind::Info => Color::Gray,
        NoticeKind::Warning => Color::Yellow,
        NoticeKind::Error => Color::Red,
    };
    let style = Style::default().fg(color);
    push_prefixed(lines, "• ", style, &notice.text, style);
    lines.push(Line::default());
}

fn push_prefixed(
    lines: &mut Vec<Line<'static>>,
    prefix: &'static str,
    prefix_style: Style,
    text: &str,
    text_style: Style,
) {
    let mut first = true;
    for line in text.lines() {
        let lead = if first {
            Span::styled(prefix, prefix_style)
        } else {
            Span::raw(" ".repeat(prefix.chars().count()))
        };
        first = false;
        lines.push(Line::from(vec![lead, Span::styled(line.to_string(), text_style)]));
    }
    if first {
        lines.push(Line::from(Span::styled(prefix, prefix_style)));
    }
}

fn preview(content: &str) -> String {
    let single_line = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= TOOL_PREVIEW_CHARS {
        return single_line;
    }
    let truncated: String = single_line.chars().take(TOOL_PREVIEW_CHARS).collect();
    format!("{truncated}…")
}

/// Rows the lines occupy once wrapped to `width` columns.
pub fn wrapped_row_count(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| {
            let columns: usize = line.spans.iter().map(|span| span.content.width()).sum();
            columns.div_ceil(width).max(1)
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::ConversationMessage;
    use crate::core::app::TypingState;
    use crate::utils::test_utils::{create_test_app, tool_call};
    use serde_json::json;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn tool_only_assistant_message_shows_placeholder() {
        let mut app = create_test_app();
        app.session.push(ConversationMessage::user("2+2?"));
        app.session
            .push(ConversationMessage::assistant_with_tool_calls(
                "",
                vec![tool_call("c1", "add", json!({"a": 2, "b": 2}))],
            ));
        app.session.push(ConversationMessage::tool_result("c1", "4"));

        let text = plain(&transcript_lines(&app));
        assert!(text.iter().any(|line| line == "⋯ calling add"));
        assert!(text.iter().any(|line| line == "↳ c1: 4"));
        assert_eq!(app.session.messages[1].content, "");
    }

    #[test]
    fn notices_follow_the_messages_they_were_raised_after() {
        let mut app = create_test_app();
        app.info("before anything");
        app.session.push(ConversationMessage::user("hello"));
        app.warn("after hello");
        app.session.push(ConversationMessage::assistant("hi"));

        let text = plain(&transcript_lines(&app));
        let position = |needle: &str| {
            text.iter()
                .position(|line| line.contains(needle))
                .unwrap_or_else(|| panic!("missing {needle}"))
        };
        let reply = text.iter().position(|line| line == "hi").expect("reply");
        assert!(position("before anything") < position("You: hello"));
        assert!(position("You: hello") < position("after hello"));
        assert!(position("after hello") < reply);
    }

    #[test]
    fn typing_message_shows_only_revealed_prefix() {
        let mut app = create_test_app();
        app.session.push(ConversationMessage::assistant("abcdef"));
        app.typing = Some(TypingState {
            message_index: 0,
            revealed: 3,
            total: 6,
        });

        let text = plain(&transcript_lines(&app));
        assert_eq!(text[0], "abc");
    }

    #[test]
    fn header_reflects_mode() {
        let mut app = create_test_app();
        let header: String = plain(&[header_line(&app)]).concat();
        assert!(header.contains("openai · gpt-4o-mini"));
        assert!(header.contains("skills on"));
        assert!(!header.contains("NSFW"));

        app.session.nsfw_mode = true;
        app.refresh_skills_enabled();
        let header: String = plain(&[header_line(&app)]).concat();
        assert!(header.contains("skills off"));
        assert!(header.contains("NSFW"));
    }

    #[test]
    fn critical_context_is_highlighted() {
        let mut app = create_test_app();
        app.session.usage.last_prompt_tokens = 127_000;
        let status = status_line(&app);
        let context = status.spans.last().expect("context span");
        assert!(context.content.contains("critical"));
        assert_eq!(context.style.bg, Some(Color::Red));
    }

    #[test]
    fn long_tool_output_is_truncated() {
        let long = "x".repeat(TOOL_PREVIEW_CHARS + 20);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), TOOL_PREVIEW_CHARS + 1);
        assert!(shown.ends_with('…'));
    }

    #[test]
    fn wrapped_rows_account_for_width() {
        let lines = vec![Line::from("a".repeat(25)), Line::default()];
        assert_eq!(wrapped_row_count(&lines, 10), 4);
        assert_eq!(wrapped_row_count(&lines, 80), 2);
    }

    #[test]
    fn take_input_clears_the_box() {
        let mut view = ChatView::default();
        view.textarea.insert_str("hello");
        view.scroll_up(5);
        assert_eq!(view.take_input(), "hello");
        assert_eq!(view.input_text(), "");
        assert_eq!(view.scroll_back, 0);
    }
}
