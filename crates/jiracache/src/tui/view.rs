use jiracache_core::selection::{Phase, ResolvedEntry};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use super::core::{ConnectionState, Model};
use crate::html::to_plain_text;

pub fn draw(frame: &mut Frame<'_>, model: &Model) {
    frame.render_widget(Clear, frame.size());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.size());

    draw_header(frame, model, chunks[0]);
    draw_search(frame, model, chunks[1]);
    draw_main(frame, model, chunks[2]);
    draw_footer(frame, model, chunks[3]);
}

fn draw_header(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let conn = match model.connection {
        ConnectionState::Connected => {
            Span::styled("● connected", Style::default().fg(Color::Green))
        }
        ConnectionState::Disconnected => {
            Span::styled("● disconnected", Style::default().fg(Color::Red))
        }
    };

    let selection = model.session.selection();
    let phase = match selection.phase() {
        Phase::Idle => "idle".to_owned(),
        Phase::Searching { seq } => format!("searching #{seq}"),
        Phase::Displaying => format!("{} results", selection.results().len()),
    };

    let line = Line::from(vec![
        Span::styled("jiracache", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        conn,
        Span::raw("  "),
        Span::styled(phase, Style::default().fg(Color::Gray)),
        Span::raw("  "),
        Span::styled(
            format!("cached: {}", model.session.cache().len()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        Span::styled(
            format!("pending: {}", model.session.correlator().pending_len()),
            Style::default().fg(Color::Gray),
        ),
    ]);

    frame.render_widget(Paragraph::new(line), area);
}

fn draw_search(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let input = Paragraph::new(Line::from(vec![
        Span::raw(model.editor.buffer.as_str()),
        Span::styled("▏", Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("search"));
    frame.render_widget(input, area);
}

fn draw_main(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    draw_results(frame, model, columns[0]);
    draw_issue(frame, model, columns[1]);
}

fn draw_results(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let selection = model.session.selection();
    let active = selection.active_index();

    let lines: Vec<Line<'_>> = selection
        .results()
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let style = if Some(idx) == active {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            let summary = match entry {
                ResolvedEntry::Issue(issue) => issue.summary().unwrap_or("").to_owned(),
                ResolvedEntry::Unresolved(_) => "…".to_owned(),
            };
            Line::from(vec![
                Span::styled(
                    format!("{:<10}", entry.key()),
                    style.add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!(" {summary}"), style),
            ])
        })
        .collect();

    let visible = area.height.saturating_sub(2) as usize;
    let offset = active
        .map(|idx| (idx + 1).saturating_sub(visible))
        .unwrap_or(0);

    let list = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("results"))
        .scroll((offset.min(u16::MAX as usize) as u16, 0));
    frame.render_widget(list, area);
}

fn draw_issue(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let selection = model.session.selection();
    let block = Block::default().borders(Borders::ALL).title("issue");

    let Some(shown) = selection.issue() else {
        let hint = match selection.wanted_key() {
            Some(key) => format!("loading {key}…"),
            None => String::new(),
        };
        frame.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    };

    let issue = &shown.issue;
    let mut lines = vec![
        Line::from(vec![
            Span::styled(issue.key.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::raw(issue.summary().unwrap_or("").to_owned()),
        ]),
        Line::from(vec![
            Span::styled("status: ", Style::default().fg(Color::Gray)),
            Span::raw(issue.status().unwrap_or("-").to_owned()),
            Span::styled("  assignee: ", Style::default().fg(Color::Gray)),
            Span::raw(issue.assignee().unwrap_or("Unassigned").to_owned()),
        ]),
        Line::raw(""),
    ];
    if let Some(description) = &shown.description {
        lines.extend(
            to_plain_text(description.as_str())
                .lines()
                .map(|l| Line::raw(l.to_owned())),
        );
    }

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_footer(frame: &mut Frame<'_>, model: &Model, area: Rect) {
    let text = match &model.status {
        Some(status) => status.clone(),
        None => "type to search · ↑/↓ select · enter open · esc clear/quit".to_owned(),
    };
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::Gray)),
        area,
    );
}
