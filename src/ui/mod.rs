use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::agent::{ConversationEntry, Decision, InspectorSnapshot, Message, Role};
use crate::app::App;

mod theme;
use theme::*;

const TIME_FORMAT: &str = "%H:%M";

fn cell_width(text: &str) -> u16 {
    UnicodeWidthStr::width(text).min(u16::MAX as usize) as u16
}

pub fn render(f: &mut Frame<'_>, app: &App) {
    let size = f.size();
    if size.width < 60 || size.height < 16 {
        let block = Paragraph::new("Terminal too small. Resize to at least 60x16.")
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .title("GuardChat")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(FG_PRIMARY).bg(BG_PANEL)),
            )
            .style(Style::default().fg(FG_PRIMARY).bg(BG_PRIMARY));
        f.render_widget(block, size);
        return;
    }

    let base = Block::default().style(Style::default().bg(BG_PRIMARY));
    f.render_widget(base, size);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(size);
    let tab_area = vertical[0];
    let workspace = vertical[1];
    let status_area = vertical[2];

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
        .split(workspace);

    render_tab_bar(f, app, tab_area);
    render_chat(f, app, columns[0]);
    render_inspector(f, app, columns[1]);
    render_status_bar(f, app, status_area);
}

fn render_tab_bar(f: &mut Frame<'_>, app: &App, area: Rect) {
    f.render_widget(Clear, area);
    let manager = app.manager();
    let mut spans: Vec<Span> = Vec::new();
    let area_end = area.x.saturating_add(area.width);
    let mut cursor = area.x;

    for (idx, agent) in manager.registry().agents.iter().enumerate() {
        if cursor >= area_end {
            break;
        }
        let marker = if app.is_typing(&agent.id) {
            "…"
        } else if app.has_unread(&agent.id) {
            "•"
        } else {
            ""
        };
        let key = if idx < 9 {
            format!("F{} ", idx + 1)
        } else {
            String::new()
        };
        let label = format!("[{}{}{}]", key, agent.label, marker);
        let mut style = Style::default().fg(BAR_TEXT).bg(BAR_BG);
        if agent.id == manager.active_id() {
            style = style
                .fg(BAR_HIGHLIGHT_TEXT)
                .bg(BAR_HIGHLIGHT_BG)
                .add_modifier(Modifier::BOLD);
        }
        cursor = cursor.saturating_add(cell_width(&label));
        spans.push(Span::styled(label, style));
        if cursor < area_end {
            spans.push(Span::styled(" ", Style::default().bg(BAR_BG)));
            cursor = cursor.saturating_add(1);
        }
    }

    let bar = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Left)
        .style(Style::default().fg(BAR_TEXT).bg(BAR_BG));
    f.render_widget(bar, area);
}

fn render_chat(f: &mut Frame<'_>, app: &App, area: Rect) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(5)])
        .split(area);
    render_history(f, app, sections[0]);
    render_composer(f, app, sections[1]);
}

fn render_history(f: &mut Frame<'_>, app: &App, area: Rect) {
    let manager = app.manager();
    let agent = manager.active_agent();
    let title = match agent.badge.as_deref() {
        Some(badge) => format!("{} · {}", agent.label, badge),
        None => agent.label.clone(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_IDLE))
        .title(Span::styled(title, Style::default().fg(FG_PRIMARY)))
        .style(Style::default().bg(BG_PANEL));
    let inner = block.inner(area);
    let wrap_width = inner.width.max(1) as usize;

    let mut lines: Vec<Line> = Vec::new();
    if let Ok(entries) = manager.store().list(&agent.id) {
        for entry in entries {
            push_entry(&mut lines, entry, &agent.label, wrap_width);
        }
    }
    if app.is_typing(&agent.id) {
        lines.push(Line::from(Span::styled(
            format!("{} is evaluating…", agent.label),
            Style::default().fg(FG_DIM).add_modifier(Modifier::ITALIC),
        )));
    }

    // Keep the newest lines in view unless the user scrolled up.
    let height = inner.height as usize;
    let max_offset = lines.len().saturating_sub(height);
    let offset = (app.scroll_offset as usize).min(max_offset);
    let start = max_offset - offset;
    let visible: Vec<Line> = lines.into_iter().skip(start).take(height).collect();

    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(visible).block(block), area);
}

fn push_entry(
    lines: &mut Vec<Line>,
    entry: &ConversationEntry,
    agent_label: &str,
    width: usize,
) {
    match entry {
        ConversationEntry::Message(message) => push_message(lines, message, agent_label, width),
        // Allowed evaluations only show up in the inspector.
        ConversationEntry::Policy(record) if record.event.decision == Decision::Allowed => {
            return;
        }
        ConversationEntry::Policy(record) => {
            let color = decision_color(record.event.decision);
            let bar = Style::default().fg(color);
            lines.push(Line::from(vec![
                Span::styled("▌ ", bar),
                Span::styled(
                    record.event.decision.heading().to_string(),
                    bar.add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  {}", record.timestamp.format(TIME_FORMAT)),
                    Style::default().fg(FG_DIM),
                ),
            ]));
            let reason = record.event.reason.as_deref().unwrap_or_default();
            push_prefixed(lines, reason, bar, Style::default().fg(FG_PRIMARY), width);
            for detail in record.event.details() {
                push_prefixed(lines, &detail, bar, Style::default().fg(FG_DIM), width);
            }
        }
        ConversationEntry::Notice(record) => {
            let bar = Style::default().fg(notice_color(record.notice.level));
            lines.push(Line::from(vec![
                Span::styled("▌ ", bar),
                Span::styled(record.notice.title.clone(), bar.add_modifier(Modifier::BOLD)),
            ]));
            let detail_style = Style::default().fg(FG_PRIMARY);
            push_prefixed(lines, &record.notice.detail, bar, detail_style, width);
            for detail in &record.notice.details {
                push_prefixed(lines, detail, bar, Style::default().fg(FG_DIM), width);
            }
        }
    }
    lines.push(Line::default());
}

fn push_message(lines: &mut Vec<Line>, message: &Message, agent_label: &str, width: usize) {
    let (name, color) = match message.role {
        Role::User => ("You", ROLE_USER),
        Role::Assistant => (agent_label, ROLE_ASSISTANT),
        Role::System => ("System", ROLE_SYSTEM),
    };
    let mut header = vec![
        Span::styled(
            name.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", message.timestamp.format(TIME_FORMAT)),
            Style::default().fg(FG_DIM),
        ),
    ];
    if message.rewritten {
        header.push(Span::styled(
            "  (rewritten)",
            Style::default().fg(DECISION_REWRITTEN),
        ));
    }
    lines.push(Line::from(header));

    let style = match message.role {
        Role::System => Style::default().fg(FG_DIM).add_modifier(Modifier::ITALIC),
        _ => Style::default().fg(FG_PRIMARY),
    };
    for line in message.text.lines() {
        push_wrapped_line(lines, line, style, width);
    }
}

fn render_composer(f: &mut Frame<'_>, app: &App, area: Rect) {
    let active = app.manager().active_agent();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(
            Style::default()
                .fg(BORDER_FOCUS)
                .add_modifier(Modifier::BOLD),
        )
        .title(Span::styled(
            "Message (Enter send / Alt+Enter newline / Ctrl+P prompts)",
            Style::default().fg(FG_PRIMARY),
        ))
        .style(Style::default().bg(BG_PANEL));
    let inner = block.inner(area);

    let input_lines: Vec<Line> = if app.composer.is_empty() {
        vec![Line::from(Span::styled(
            format!("Message {}…", active.label),
            Style::default().fg(FG_DIM),
        ))]
    } else {
        app.composer
            .buffer()
            .split('\n')
            .map(|line| {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(FG_PRIMARY),
                ))
            })
            .collect()
    };

    let (cursor_col, cursor_row) = app
        .composer
        .cursor_display_position(inner.width.max(1) as usize);
    // Scroll so the cursor row stays visible in a short input box.
    let scroll = cursor_row.saturating_sub(inner.height.saturating_sub(1));
    let paragraph = Paragraph::new(input_lines)
        .block(block)
        .style(Style::default().bg(BG_PANEL))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);

    let cursor_x = inner
        .x
        .saturating_add(cursor_col.min(inner.width.saturating_sub(1)));
    let cursor_y = inner
        .y
        .saturating_add((cursor_row - scroll).min(inner.height.saturating_sub(1)));
    f.set_cursor(cursor_x, cursor_y);
}

fn render_inspector(f: &mut Frame<'_>, app: &App, area: Rect) {
    let manager = app.manager();
    let snapshot = manager.snapshot(manager.active_id());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER_IDLE))
        .title(Span::styled("Policy Inspector", Style::default().fg(FG_PRIMARY)))
        .style(Style::default().bg(BG_PANEL));
    let width = block.inner(area).width.max(1) as usize;

    let lines = inspector_lines(&snapshot, width);
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn inspector_lines(snapshot: &InspectorSnapshot, width: usize) -> Vec<Line<'static>> {
    let label = Style::default().fg(FG_DIM).add_modifier(Modifier::BOLD);
    let value = Style::default().fg(FG_PRIMARY);
    let mut lines = Vec::new();

    lines.push(Line::from(Span::styled("Decision", label)));
    match snapshot.decision() {
        Some(decision) => lines.push(Line::from(Span::styled(
            decision.as_str().to_uppercase(),
            Style::default()
                .fg(decision_color(decision))
                .add_modifier(Modifier::BOLD),
        ))),
        None => lines.push(Line::from(Span::styled("—", value))),
    }
    lines.push(Line::default());

    lines.push(Line::from(Span::styled("Reason", label)));
    push_wrapped_line(&mut lines, snapshot.reason(), value, width);
    lines.push(Line::default());

    lines.push(Line::from(Span::styled("Stage", label)));
    push_wrapped_line(&mut lines, snapshot.stage().unwrap_or("—"), value, width);
    lines.push(Line::default());

    for (title, signals) in [
        ("DLP signals", snapshot.dlp_signals()),
        ("AI signals", snapshot.ai_signals()),
    ] {
        lines.push(Line::from(Span::styled(title, label)));
        if signals.is_empty() {
            lines.push(Line::from(Span::styled("none", Style::default().fg(FG_DIM))));
        }
        for signal in signals {
            push_wrapped_line(&mut lines, &format!("• {signal}"), value, width);
        }
        lines.push(Line::default());
    }

    if let Some(text) = snapshot.rewritten_text() {
        lines.push(Line::from(Span::styled("Rewritten prompt", label)));
        for line in text.lines() {
            push_wrapped_line(
                &mut lines,
                line,
                Style::default().fg(DECISION_REWRITTEN),
                width,
            );
        }
        lines.push(Line::default());
    }

    if let Some(updated) = snapshot.updated_at() {
        lines.push(Line::from(Span::styled(
            format!("Updated {}", updated.format("%H:%M:%S")),
            Style::default().fg(FG_DIM),
        )));
    }
    lines
}

fn render_status_bar(f: &mut Frame<'_>, app: &App, area: Rect) {
    let manager = app.manager();
    let agent = manager.active_agent();
    let conversation = manager
        .store()
        .conversation_id(&agent.id)
        .map(|id| id.chars().take(8).collect::<String>())
        .unwrap_or_default();
    let right = format!("[{}] [CONV:{}] ", agent.initials(), conversation);

    f.render_widget(Clear, area);
    let available = area.width.saturating_sub(cell_width(&right)) as usize;
    let left: String = truncate_to_width(&format!(" {}", app.status_message), available);
    let padding = available.saturating_sub(UnicodeWidthStr::width(left.as_str()));
    let line = Line::from(vec![
        Span::styled(left, Style::default().fg(BAR_TEXT)),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, Style::default().fg(BAR_HIGHLIGHT_TEXT)),
    ]);
    let bar = Paragraph::new(line).style(Style::default().bg(BAR_BG));
    f.render_widget(bar, area);
}

fn push_prefixed(lines: &mut Vec<Line>, text: &str, bar: Style, style: Style, width: usize) {
    for segment in wrap_to_width(text, width.saturating_sub(2).max(1)) {
        lines.push(Line::from(vec![
            Span::styled("▌ ", bar),
            Span::styled(segment, style),
        ]));
    }
}

fn push_wrapped_line(lines: &mut Vec<Line>, text: &str, style: Style, width: usize) {
    for segment in wrap_to_width(text, width) {
        lines.push(Line::from(Span::styled(segment, style)));
    }
}

fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0usize;
    text.chars()
        .take_while(|ch| {
            used += UnicodeWidthChar::width(*ch).unwrap_or(1);
            used <= width
        })
        .collect()
}

fn wrap_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(1).max(1);
        if current_width + ch_width > width && !current.is_empty() {
            result.push(current);
            current = String::new();
            current_width = 0;
        }
        current.push(ch);
        current_width += ch_width;
    }
    result.push(current);
    result
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use crate::agent::{InspectorState, PolicyEvent};

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn wrap_counts_wide_characters() {
        assert_eq!(wrap_to_width("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_to_width("漢字漢字", 4), vec!["漢字", "漢字"]);
        assert_eq!(wrap_to_width("", 4), vec![String::new()]);
    }

    #[test]
    fn truncate_respects_width() {
        assert_eq!(truncate_to_width("hello", 3), "hel");
        assert_eq!(truncate_to_width("漢字", 3), "漢");
    }

    #[test]
    fn inspector_shows_placeholder_when_awaiting() {
        let text = plain(&inspector_lines(&InspectorSnapshot::awaiting(), 80));
        assert!(text.iter().any(|line| line.starts_with("Awaiting input.")));
        assert!(!text.iter().any(|line| line == "Rewritten prompt"));
    }

    #[test]
    fn inspector_lists_signals_and_rewrite() {
        let mut state = InspectorState::new();
        let mut event = PolicyEvent::new(Decision::Rewritten);
        event.dlp_signals = vec!["US_SSN".into()];
        event.rewritten_text = Some("My SSN is [REDACTED]".into());
        let snapshot = state.update("a", event).clone();

        let text = plain(&inspector_lines(&snapshot, 80));
        assert!(text.contains(&"REWRITTEN".to_string()));
        assert!(text.contains(&"• US_SSN".to_string()));
        assert!(text.contains(&"My SSN is [REDACTED]".to_string()));
    }

    #[tokio::test]
    async fn renders_small_terminal_notice() {
        use std::sync::Arc;

        use tokio::sync::mpsc;

        use crate::agent::providers::memory::ScriptedTransport;
        use crate::agent::{AgentManager, AgentSettings};

        let settings = AgentSettings::built_in().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let manager =
            AgentManager::new(settings, Arc::new(ScriptedTransport::new()), Box::new(tx)).unwrap();
        let app = App::new(manager, rx);

        let mut terminal = Terminal::new(TestBackend::new(40, 10)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let content: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(content.contains("Terminal too small"));

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let content: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(content.contains("Policy Inspector"));
        assert!(content.contains("Customer Assist"));
    }
}
