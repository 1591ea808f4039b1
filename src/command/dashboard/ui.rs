use ansi_to_tui::IntoText;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};

use super::{App, Preview};
use crate::command::Ctx;
use crate::task::TaskStatus;

pub fn draw(frame: &mut Frame, app: &App, ctx: &Ctx) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Percentage(50),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_table(frame, app, chunks[0]);
    draw_preview(frame, app, ctx, chunks[1]);
    draw_footer(frame, app, chunks[2]);
}

fn status_style(status: TaskStatus) -> Style {
    match status {
        TaskStatus::Pending => Style::default().fg(Color::DarkGray),
        TaskStatus::Planning | TaskStatus::Clarification => Style::default().fg(Color::Yellow),
        TaskStatus::Working => Style::default().fg(Color::Green),
        TaskStatus::AgentReview | TaskStatus::Reviewing => Style::default().fg(Color::Cyan),
        TaskStatus::Stuck => Style::default().fg(Color::Red),
        TaskStatus::Done | TaskStatus::Cancelled => Style::default().fg(Color::DarkGray),
    }
}

fn draw_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec!["PROJECT", "BRANCH", "STATUS", "ROUND", "SESSION", "SUMMARY"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app
        .entries
        .iter()
        .map(|entry| {
            let task = &entry.task;
            let session = match (&task.tmux_session, entry.session_alive) {
                (Some(_), true) => Cell::from("live"),
                (Some(_), false) => {
                    Cell::from(Span::styled("DEAD", Style::default().fg(Color::Red)))
                }
                (None, _) => Cell::from("-"),
            };
            Row::new(vec![
                Cell::from(task.project.clone()),
                Cell::from(task.branch.clone()),
                Cell::from(Span::styled(
                    task.status.to_string(),
                    status_style(task.status),
                )),
                Cell::from(task.review_round.to_string()),
                session,
                Cell::from(task.summary.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(24),
            Constraint::Length(13),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" tasks "))
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default();
    state.select(if app.entries.is_empty() {
        None
    } else {
        Some(app.selected)
    });
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_preview(frame: &mut Frame, app: &App, ctx: &Ctx, area: Rect) {
    let summary = app
        .branch_summary(ctx)
        .map(|s| format!(" [{}]", s))
        .unwrap_or_default();

    let (title, text) = match app.selected_entry() {
        None => (" preview ".to_string(), Text::from("no tasks")),
        Some(entry) => match app.preview {
            Preview::Body => (
                format!(" TASK.md — {}{} ", entry.task.branch, summary),
                Text::from(entry.task.body.clone()),
            ),
            Preview::Pane => {
                let title = format!(" pane — {}{} ", entry.task.branch, summary);
                let inner_w = area.width.saturating_sub(2);
                let inner_h = area.height.saturating_sub(2);
                let text = match app.pane_capture(ctx, inner_w, inner_h) {
                    Some(capture) => capture
                        .into_text()
                        .unwrap_or_else(|_| Text::from("(pane capture unreadable)")),
                    None => Text::from("(no live session)"),
                };
                (title, text)
            }
        },
    };

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    let line = if app.confirm_cancel {
        Line::from(Span::styled(
            "cancel selected task? y/n",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
    } else {
        let mut spans = vec![Span::raw(
            "q quit  j/k move  p body/pane  [/] scroll  c cancel",
        )];
        if !app.status_line.is_empty() {
            spans.push(Span::raw("  |  "));
            spans.push(Span::styled(
                app.status_line.clone(),
                Style::default().fg(Color::Yellow),
            ));
        }
        Line::from(spans)
    };
    frame.render_widget(Paragraph::new(line), area);
}
