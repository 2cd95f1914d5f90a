use crate::app::{AppState, RunNode, RunStatus};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let inner_width = area.width.saturating_sub(2) as usize;

    if state.nodes.is_empty() && !state.is_loading {
        let para = Paragraph::new("No runs yet. Push a kernel to get started.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::NONE));
        f.render_widget(para, area);
        return;
    }

    // Visible window (scroll follows the cursor)
    let visible_height = area.height as usize;
    let scroll_offset = if state.cursor >= visible_height {
        state.cursor - visible_height + 1
    } else {
        0
    };

    let lines: Vec<Line> = state
        .nodes
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(visible_height)
        .map(|(i, node)| render_node_line(node, i == state.cursor, inner_width))
        .collect();

    let tree = Paragraph::new(lines).block(Block::default().borders(Borders::NONE));
    f.render_widget(tree, area);
}

pub fn status_color(status: RunStatus) -> Color {
    match status {
        RunStatus::Complete => Color::Green,
        RunStatus::Running => Color::Blue,
        RunStatus::Queued | RunStatus::Pending => Color::Yellow,
        RunStatus::Error => Color::Red,
        RunStatus::Unknown => Color::DarkGray,
    }
}

fn render_node_line(node: &RunNode, is_selected: bool, max_width: usize) -> Line<'static> {
    let select_style = if is_selected {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };

    let (icon, icon_color, badge) = match node.status {
        Some(status) => (status.icon(), status_color(status), status.label()),
        None => (" ", Color::DarkGray, ""),
    };

    let badge_width = if badge.is_empty() { 0 } else { badge.len() + 1 };
    let prefix_width = 1 + UnicodeWidthStr::width(icon) + 1 + node.label.len() + 2;
    let url_max = max_width.saturating_sub(prefix_width + badge_width);
    let url = truncate(node.url.as_deref().unwrap_or(""), url_max);

    let label_style = if node.is_latest {
        select_style.add_modifier(Modifier::BOLD)
    } else {
        select_style.fg(Color::DarkGray)
    };

    let mut spans = vec![
        Span::styled(format!(" {icon} "), Style::default().fg(icon_color)),
        Span::styled(node.label.clone(), label_style),
        Span::styled(format!("  {url}"), Style::default().fg(Color::DarkGray)),
    ];
    if !badge.is_empty() {
        spans.push(Span::styled(
            format!(" {badge}"),
            Style::default().fg(icon_color),
        ));
    }

    Line::from(spans)
}

fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        s.to_string()
    } else {
        let mut result = String::new();
        let mut width = 0;
        for c in s.chars() {
            let cw = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
            if width + cw + 1 > max_width {
                result.push('…');
                break;
            }
            result.push(c);
            width += cw;
        }
        result
    }
}
