//! Minimal task dashboard.
//!
//! Shows every live task, marks dead sessions, previews the selected task's
//! body or pane, and runs the exit monitor on a timer. Recovery actions stay
//! on the CLI (`orange task respawn`); the dashboard's job is visibility.

mod ui;

use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use tracing::warn;

use super::Ctx;
use crate::history::EventKind;
use crate::monitor;
use crate::task::{Task, TaskStatus};

/// How often the exit monitor scans while the dashboard is open.
const SCAN_INTERVAL: Duration = Duration::from_secs(5);
/// Input poll / redraw cadence.
const TICK: Duration = Duration::from_millis(250);

pub struct TaskEntry {
    pub task: Task,
    pub session_alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preview {
    Body,
    Pane,
}

pub struct App {
    pub entries: Vec<TaskEntry>,
    pub selected: usize,
    pub preview: Preview,
    pub confirm_cancel: bool,
    pub status_line: String,
    last_scan: Instant,
}

impl App {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            selected: 0,
            preview: Preview::Body,
            confirm_cancel: false,
            status_line: String::new(),
            last_scan: Instant::now()
                .checked_sub(SCAN_INTERVAL)
                .unwrap_or_else(Instant::now),
        }
    }

    fn refresh(&mut self, ctx: &Ctx) -> Result<()> {
        if self.last_scan.elapsed() >= SCAN_INTERVAL {
            self.last_scan = Instant::now();
            match monitor::scan(&ctx.engine) {
                Ok(report) if report.crashed + report.advanced + report.escalated > 0 => {
                    self.status_line = format!(
                        "monitor: {} advanced, {} crashed, {} escalated",
                        report.advanced, report.crashed, report.escalated
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "monitor scan failed"),
            }
        }

        let tasks = ctx.deps.store.list_tasks(None)?;
        self.entries = tasks
            .into_iter()
            .filter(|t| !t.status.is_terminal())
            .map(|task| {
                let session_alive = task
                    .tmux_session
                    .as_deref()
                    .map(|s| ctx.deps.mux.session_exists(s).unwrap_or(false))
                    .unwrap_or(false);
                TaskEntry {
                    task,
                    session_alive,
                }
            })
            .collect();

        if self.selected >= self.entries.len() {
            self.selected = self.entries.len().saturating_sub(1);
        }
        Ok(())
    }

    pub fn selected_entry(&self) -> Option<&TaskEntry> {
        self.entries.get(self.selected)
    }

    /// ANSI-preserving pane capture of the selected task's worker window,
    /// sized to the preview area.
    pub fn pane_capture(&self, ctx: &Ctx, width: u16, height: u16) -> Option<String> {
        let entry = self.selected_entry()?;
        if !entry.session_alive {
            return None;
        }
        let session = entry.task.tmux_session.as_deref()?;
        let target = format!("{}:worker", session);

        ctx.deps.mux.resize_pane_safe(&target, width, height);
        let lines = match ctx.deps.mux.query_pane_info(&target) {
            Ok(info) => info.height.max(height),
            Err(_) => height,
        };

        // ANSI-preserving capture so the preview keeps the agent's colors;
        // plain capture as the fallback.
        ctx.deps
            .mux
            .capture_pane_ansi(&target, lines)
            .ok()
            .or_else(|| ctx.deps.mux.capture_pane_safe(&target, lines))
    }

    /// Branch summary for the preview title: short hash plus committed diff
    /// against the project's default branch.
    pub fn branch_summary(&self, ctx: &Ctx) -> Option<String> {
        let entry = self.selected_entry()?;
        let slot = entry.task.workspace.as_deref()?;
        let worktree = ctx.deps.data.workspace_dir(slot);
        let project = ctx.deps.store.get_project(&entry.task.project).ok()?;
        let base = format!("origin/{}", project.default_branch);

        let hash = ctx.deps.git.commit_hash(&worktree, true).ok()?;
        let stats = ctx.deps.git.diff_stats(&worktree, &base).ok()?;
        let commits = ctx.deps.git.commit_count(&worktree, &base).unwrap_or(0);
        Some(format!(
            "{} +{} -{} in {} files, {} commits",
            hash, stats.added, stats.removed, stats.files, commits
        ))
    }

    /// Scroll the selected task's worker pane from the preview.
    pub fn scroll(&self, ctx: &Ctx, dir: crate::multiplexer::ScrollDir) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        let Some(session) = entry.task.tmux_session.as_deref() else {
            return;
        };
        let _ = ctx
            .deps
            .mux
            .scroll_pane(&format!("{}:worker", session), dir);
    }

    fn cancel_selected(&mut self, ctx: &Ctx) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        let id = entry.task.id.clone();
        match ctx.engine.execute_transition(&id, TaskStatus::Cancelled) {
            Ok(task) => {
                let _ = ctx
                    .deps
                    .store
                    .append_event(&task, EventKind::TaskCancelled {});
                self.status_line = format!("cancelled {}", task.branch);
            }
            Err(e) => self.status_line = format!("cancel failed: {}", e),
        }
    }
}

pub fn run(ctx: &Ctx) -> Result<()> {
    let mut terminal = ratatui::init();
    let mut app = App::new();

    let result = loop {
        if let Err(e) = app.refresh(ctx) {
            break Err(e);
        }
        if let Err(e) = terminal.draw(|frame| ui::draw(frame, &app, ctx)) {
            break Err(e.into());
        }

        match event::poll(TICK) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if app.confirm_cancel {
                        match key.code {
                            KeyCode::Char('y') => {
                                app.confirm_cancel = false;
                                app.cancel_selected(ctx);
                            }
                            _ => app.confirm_cancel = false,
                        }
                        continue;
                    }
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break Ok(()),
                        KeyCode::Char('j') | KeyCode::Down => {
                            if app.selected + 1 < app.entries.len() {
                                app.selected += 1;
                            }
                        }
                        KeyCode::Char('k') | KeyCode::Up => {
                            app.selected = app.selected.saturating_sub(1);
                        }
                        KeyCode::Char('p') => {
                            app.preview = match app.preview {
                                Preview::Body => Preview::Pane,
                                Preview::Pane => Preview::Body,
                            };
                        }
                        KeyCode::Char('c') => {
                            if app.selected_entry().is_some() {
                                app.confirm_cancel = true;
                            }
                        }
                        KeyCode::Char('[') => {
                            app.scroll(ctx, crate::multiplexer::ScrollDir::Up);
                        }
                        KeyCode::Char(']') => {
                            app.scroll(ctx, crate::multiplexer::ScrollDir::Down);
                        }
                        _ => {}
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }
    };

    ratatui::restore();
    result
}
