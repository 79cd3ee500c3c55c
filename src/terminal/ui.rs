use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use crate::aggregate::SourceOutcome;
use crate::domain::message::Source;
use crate::terminal::state::{AppState, Focus, ViewMode};

fn source_color(s: Source) -> Color {
    match s {
        Source::Gmail => Color::Red,
        Source::Slack => Color::Magenta,
    }
}

pub fn render(f: &mut Frame, state: &AppState) {
    let [main, status, footer] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(f.area());

    let (left, right) = if state.mode == ViewMode::Split {
        let [l, r] = Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)])
            .areas(main);
        (l, Some(r))
    } else {
        (main, None)
    };

    let border = |focused: bool| {
        if focused {
            Color::Yellow
        } else {
            Color::DarkGray
        }
    };

    // LEFT: ranked list
    let list_block = Block::default()
        .title(format!(
            " Priority inbox ({}, {}) ",
            state.items.len(),
            state.filter.label()
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border(state.focus == Focus::List)));

    let items: Vec<ListItem> = state
        .items
        .iter()
        .map(|row| {
            let m = &row.message;
            let head = Line::from(vec![
                Span::styled(format!("{:>6.1} ", row.score), Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!("{:<5} ", m.source.as_str()),
                    Style::default().fg(source_color(m.source)),
                ),
                Span::styled(m.from.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(
                    format!("  {}", state.age_label(m)),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
            let title = m.subject.clone().unwrap_or_else(|| m.text.clone());
            let snip = Span::styled(title, Style::default().fg(Color::Gray));
            ListItem::new(Text::from(vec![head, Line::from(snip)]))
        })
        .collect();

    let list = List::new(items)
        .block(list_block)
        .highlight_symbol("➜ ")
        .highlight_style(Style::default().fg(Color::Green));

    f.render_stateful_widget(list, left, &mut state.list_state.clone());

    // RIGHT: opened message
    if let Some(right) = right {
        let body_block = Block::default()
            .title(" Message ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border(state.focus == Focus::Body)));

        let text = match &state.opened {
            Some(row) => {
                let m = &row.message;
                let mut lines = vec![
                    Line::from(format!("From:    {}", m.from)),
                    Line::from(format!("Source:  {}", m.source)),
                    Line::from(format!("Score:   {:.2}", row.score)),
                ];
                if let Some(subject) = &m.subject {
                    lines.push(Line::from(format!("Subject: {subject}")));
                }
                lines.push(Line::from(""));
                lines.extend(m.text.lines().map(|l| Line::from(l.to_string())));
                Text::from(lines)
            }
            None => Text::from("Nothing selected."),
        };

        let p = Paragraph::new(text)
            .block(body_block)
            .wrap(Wrap { trim: false })
            .scroll((state.body_scroll, 0));
        f.render_widget(p, right);
    }

    // Status: one entry per source
    let mut spans = Vec::new();
    if state.refreshing {
        spans.push(Span::styled("refreshing… ", Style::default().fg(Color::Yellow)));
    }
    for r in &state.reports {
        let color = match r.outcome {
            SourceOutcome::Fetched(_) => Color::Green,
            SourceOutcome::Failed(_) | SourceOutcome::TimedOut => Color::Red,
            SourceOutcome::StillRunning => Color::Yellow,
        };
        spans.push(Span::styled(r.to_string(), Style::default().fg(color)));
        spans.push(Span::raw("  "));
    }
    if state.reports.is_empty() && !state.refreshing {
        spans.push(Span::raw("No sources answered. Check `napoleon list` and RUST_LOG=warn."));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), status);

    let key = |k: &'static str| Span::styled(k, Style::default().add_modifier(Modifier::BOLD));
    let hint = Paragraph::new(Line::from(vec![
        key("j/k"),
        Span::raw(" move  "),
        key("Enter"),
        Span::raw(" open  "),
        key("Tab"),
        Span::raw(" focus  "),
        key("s"),
        Span::raw(" source  "),
        key("r"),
        Span::raw(" refresh  "),
        key("q"),
        Span::raw(" quit"),
    ]));
    f.render_widget(hint, footer);
}
