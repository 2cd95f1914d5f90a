use crate::app::AppState;
use crate::tui::{spinner_frame, tree};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![
        Span::styled(
            format!(
                " kgw v{}+{} ",
                env!("CARGO_PKG_VERSION"),
                env!("BUILD_NUMBER")
            ),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("│ "),
    ];

    let project = state
        .config
        .kernel_ref
        .clone()
        .unwrap_or_else(|| state.config.root.display().to_string());
    spans.push(Span::styled(
        project,
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));

    // Latest run badge
    if let Some(status) = state.latest_status {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{} {}", status.icon(), status.label()),
            Style::default().fg(tree::status_color(status)),
        ));
    }

    // Push-in-flight indicator; gated by the push flag, not by the
    // passive refresh.
    if state.is_pushing {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{} pushing", spinner_frame(state.spinner_frame)),
            Style::default().fg(Color::Yellow),
        ));
    } else if state.is_loading {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            spinner_frame(state.spinner_frame).to_string(),
            Style::default().fg(Color::Yellow),
        ));
    } else if state.next_refresh_in > 0 {
        spans.push(Span::styled(
            format!(" {}s", state.next_refresh_in),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if state.error_message().is_some() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            "!",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(header, area);
}
