use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

use crate::picker::Picker;

const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);

pub fn render(frame: &mut Frame, picker: &Picker) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_title(frame, root[0], picker);
    render_options(frame, root[1], picker);
    render_hint(frame, root[2]);
}

fn render_title(frame: &mut Frame, area: Rect, picker: &Picker) {
    let mut spans = vec![Span::styled(
        picker.title().to_string(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )];
    if !picker.filter().is_empty() {
        spans.push(Span::styled("  / ", Style::default().fg(MUTED)));
        spans.push(Span::styled(
            picker.filter().to_string(),
            Style::default().fg(ACCENT),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_options(frame: &mut Frame, area: Rect, picker: &Picker) {
    let visible = picker.visible_options();
    if visible.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "  no matches",
                Style::default().fg(WARN),
            ))),
            area,
        );
        return;
    }

    let items = visible
        .into_iter()
        .map(|option| ListItem::new(option.to_string()))
        .collect::<Vec<_>>();
    let list = List::new(items)
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(picker.selected());
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_hint(frame: &mut Frame, area: Rect) {
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "↑/↓ move · type to filter · enter select · esc cancel",
            Style::default().fg(MUTED),
        ))),
        area,
    );
}
