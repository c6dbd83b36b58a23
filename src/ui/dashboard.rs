// ABOUTME: Main dashboard layout and rendering logic
// Stateless panels recomputed from the shared snapshots on every draw

use crate::app::state::AppState;
use crate::data::history::{HistoryKind, HistoryStatus, WorkHistoryEntry};
use crate::data::phase::PhaseStatus;
use crate::data::status::{AgentState, AgentStatus};
use crate::ui::layout::{completion_bar, make_bar, ColumnWidths};
use crate::utils::cost::short_model;
use crate::utils::textwidth::{pad_width, truncate_width};
use crate::utils::timefmt::{format_elapsed, format_tokens};
use chrono::{DateTime, Duration, Utc};
use crossterm::event::KeyCode;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use std::sync::Arc;

/// Rows flash for this long after a status transition.
const FLASH_WINDOW_MS: i64 = 2000;

pub struct Dashboard {
    state: Arc<AppState>,
    show_help: bool,
}

impl Dashboard {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            show_help: false,
        }
    }

    /// Returns false when the user asked to quit.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => false,
            KeyCode::Char('h') | KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                true
            }
            _ => true,
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let size = frame.size();
        let now = Utc::now();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),  // Header
                Constraint::Length(3),  // Phase ladder
                Constraint::Min(10),    // Agents + side column
                Constraint::Length(9),  // Tokens
                Constraint::Length(9),  // Logs + history
            ])
            .split(size);

        self.render_header(frame, chunks[0], now);
        self.render_phase_bar(frame, chunks[1]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[2]);
        self.render_agents(frame, body[0], now);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(4)])
            .split(body[1]);
        self.render_session(frame, side[0], now);
        self.render_projects(frame, side[1]);

        self.render_tokens(frame, chunks[3]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[4]);
        self.render_logs(frame, bottom[0]);
        self.render_history(frame, bottom[1], now);

        if self.show_help {
            self.render_help_overlay(frame, size);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let meta = self.state.project_meta.lock().unwrap();
        let last_update = *self.state.last_update.lock().unwrap();

        let mut spans = vec![
            Span::styled(
                "◆ Wavedash",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
        ];
        if let Some(project) = &meta.project {
            spans.push(Span::styled(
                project.clone(),
                Style::default().fg(Color::Cyan),
            ));
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(
            format!("updated {}", format_elapsed(now - last_update)),
            Style::default().fg(Color::DarkGray),
        ));
        spans.push(Span::styled(
            "  q: quit  h: help",
            Style::default().fg(Color::DarkGray),
        ));

        let header = Paragraph::new(Line::from(spans))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Magenta)),
            )
            .alignment(Alignment::Center);
        frame.render_widget(header, area);
    }

    fn render_phase_bar(&self, frame: &mut Frame, area: Rect) {
        let ladder = self.state.phases.lock().unwrap();
        let prefix = if ladder.wave_based { "W" } else { "P" };

        let mut spans = Vec::new();
        for (i, phase) in ladder.phases.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" → ", Style::default().fg(Color::DarkGray)));
            }
            let label = format!("{}{}", prefix, phase.number);
            match phase.status {
                PhaseStatus::Done => {
                    spans.push(Span::styled(
                        format!("{}✓", label),
                        Style::default().fg(Color::Green),
                    ));
                }
                PhaseStatus::Active => {
                    spans.push(Span::styled(
                        format!("{}▸{}", label, phase.name),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ));
                }
                PhaseStatus::Pending => {
                    spans.push(Span::styled(
                        format!("{}-", label),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
            }
        }
        if spans.is_empty() {
            spans.push(Span::styled(
                "no phase data",
                Style::default().fg(Color::DarkGray),
            ));
        }

        let bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .title("Phases")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        );
        frame.render_widget(bar, area);
    }

    fn render_agents(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let agents = self.state.agents.lock().unwrap();
        let subagents = self.state.subagents.lock().unwrap();
        let meta = self.state.project_meta.lock().unwrap();
        let cols = ColumnWidths::for_width(area.width);

        let mut lines: Vec<Line> = Vec::new();
        let mut current_wave: Option<Option<u32>> = None;

        for agent in agents.iter() {
            if current_wave != Some(agent.phase) {
                current_wave = Some(agent.phase);
                lines.push(self.wave_separator(&agents, &meta, agent.phase, now));
            }
            lines.push(self.agent_row(agent, &cols, now));
        }

        if !subagents.is_empty() {
            lines.push(Line::from(Span::styled(
                "── ad-hoc ────────────",
                Style::default().fg(Color::DarkGray),
            )));
            for agent in subagents.iter() {
                lines.push(self.agent_row(agent, &cols, now));
            }
        }

        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                "no active agents",
                Style::default().fg(Color::DarkGray),
            )));
        }

        let panel = Paragraph::new(lines).block(
            Block::default()
                .title("Agents")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(panel, area);
    }

    fn wave_separator(
        &self,
        agents: &[AgentState],
        meta: &crate::data::status::ProjectMeta,
        wave: Option<u32>,
        now: DateTime<Utc>,
    ) -> Line<'static> {
        let Some(wave_num) = wave else {
            return Line::from(Span::styled(
                "── unphased ──".to_string(),
                Style::default().fg(Color::DarkGray),
            ));
        };

        let members: Vec<&AgentState> =
            agents.iter().filter(|a| a.phase == Some(wave_num)).collect();
        let done = members.iter().filter(|a| a.is_completed).count();
        let bar = completion_bar(done, members.len(), 8);

        let timing = meta.wave_timings.get(&wave_num).map(|t| {
            match (t.started_at, t.completed_at) {
                (Some(start), Some(end)) => format!("took {}", format_elapsed(end - start)),
                (Some(start), None) => format!("running {}", format_elapsed(now - start)),
                _ => String::new(),
            }
        });

        let mut text = format!("── W{} {} {}/{}", wave_num, bar, done, members.len());
        if let Some(timing) = timing.filter(|t| !t.is_empty()) {
            text.push_str(&format!(" · {}", timing));
        }
        Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)))
    }

    fn agent_row(&self, agent: &AgentState, cols: &ColumnWidths, now: DateTime<Utc>) -> Line<'static> {
        let (icon, icon_color) = match agent.status {
            AgentStatus::Running => ("●", Color::Green),
            AgentStatus::Idle => ("○", Color::DarkGray),
            AgentStatus::Stuck => ("▲", Color::Yellow),
            AgentStatus::Offline => ("✕", Color::Red),
            AgentStatus::Pending => ("◌", Color::DarkGray),
        };

        let name = pad_width(&truncate_width(&agent.name, cols.name as usize), cols.name as usize);
        let model = pad_width(
            &truncate_width(&short_model(&agent.model), cols.model as usize),
            cols.model as usize,
        );
        let task = pad_width(
            &truncate_width(&agent.current_task, cols.task as usize),
            cols.task as usize,
        );
        let elapsed = format_elapsed(now - agent.last_activity);

        let row_style = match self.flash_color(agent, now) {
            Some(bg) => Style::default().bg(bg).fg(Color::Black),
            None => Style::default(),
        };

        Line::from(vec![
            Span::styled(icon.to_string(), row_style.fg(icon_color)),
            Span::raw(" "),
            Span::styled(name, row_style.add_modifier(Modifier::BOLD)),
            Span::raw(" "),
            Span::styled(model, row_style.fg(Color::Cyan)),
            Span::raw(" "),
            Span::styled(task, row_style),
            Span::raw(" "),
            Span::styled(elapsed, row_style.fg(Color::DarkGray)),
        ])
    }

    /// Transition flash, derived purely from changedAt and the current
    /// status. No timers: the highlight drops out on the next draw after
    /// the window passes.
    fn flash_color(&self, agent: &AgentState, now: DateTime<Utc>) -> Option<Color> {
        if now - agent.changed_at >= Duration::milliseconds(FLASH_WINDOW_MS) {
            return None;
        }
        if agent.is_new {
            return Some(Color::Yellow);
        }
        match agent.status {
            AgentStatus::Idle => Some(Color::Green),
            AgentStatus::Stuck => Some(Color::Red),
            AgentStatus::Running => Some(Color::Yellow),
            _ => None,
        }
    }

    fn render_tokens(&self, frame: &mut Frame, area: Rect) {
        let summary = self.state.token_summary.lock().unwrap();
        let max_model_total = summary
            .by_model
            .values()
            .map(|m| m.total)
            .max()
            .unwrap_or(1)
            .max(1);

        let mut lines = vec![Line::from(vec![
            Span::styled("in ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format_tokens(summary.total_input),
                Style::default().fg(Color::Green),
            ),
            Span::styled("  out ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format_tokens(summary.total_output),
                Style::default().fg(Color::Blue),
            ),
            Span::styled("  total ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format_tokens(summary.total_tokens),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled("  cost ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("${:.2}", summary.cost_estimate),
                Style::default().fg(Color::Yellow),
            ),
        ])];

        for (model, usage) in summary.by_model.iter() {
            let mut spans = vec![
                Span::raw(pad_width(&short_model(model), 6)),
                Span::styled(
                    make_bar(usage.total, max_model_total, 15),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!(" {:>7}", format_tokens(usage.total)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!(" ${:.2}", usage.cost),
                    Style::default().fg(Color::Yellow),
                ),
            ];
            if usage.delta > 0 {
                spans.push(Span::styled(
                    format!(" +{}", usage.delta),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            lines.push(Line::from(spans));
        }

        let panel = Paragraph::new(lines).block(
            Block::default()
                .title("Tokens")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
        frame.render_widget(panel, area);
    }

    fn render_session(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let session = self.state.session.lock().unwrap();

        let (label, color) = if session.active {
            ("ACTIVE", Color::Green)
        } else {
            ("IDLE", Color::DarkGray)
        };

        let mut lines = vec![Line::from(vec![
            Span::styled(format!("[{}]", label), Style::default().fg(color)),
            Span::raw(" "),
            Span::raw(session.current_task.clone()),
        ])];

        let mut detail = vec![Span::styled(
            format!("{}/{} done", session.completed_count, session.total_count),
            Style::default().fg(Color::DarkGray),
        )];
        if !session.phase_tag.is_empty() {
            detail.push(Span::styled(
                format!("  {}", session.phase_tag),
                Style::default().fg(Color::Cyan),
            ));
        }
        if let Some(last) = session.last_activity {
            detail.push(Span::styled(
                format!("  {}", format_elapsed(now - last)),
                Style::default().fg(Color::DarkGray),
            ));
        }
        if !session.session_id.is_empty() {
            detail.push(Span::styled(
                format!("  #{}", session.session_id),
                Style::default().fg(Color::DarkGray),
            ));
        }
        if !session.model.is_empty() {
            detail.push(Span::styled(
                format!("  {}", short_model(&session.model)),
                Style::default().fg(Color::Cyan),
            ));
        }
        lines.push(Line::from(detail));

        let panel = Paragraph::new(lines).block(
            Block::default()
                .title("Session")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
        frame.render_widget(panel, area);
    }

    fn render_projects(&self, frame: &mut Frame, area: Rect) {
        let registry = self.state.registry.lock().unwrap();

        let mut lines: Vec<Line> = registry
            .projects
            .iter()
            .map(|p| {
                let (icon, color) = match p.status.as_str() {
                    "active" => ("●", Color::Green),
                    "planning" => ("◐", Color::Cyan),
                    "paused" => ("◑", Color::Yellow),
                    "completed" => ("✓", Color::DarkGray),
                    _ => ("·", Color::DarkGray),
                };
                Line::from(vec![
                    Span::styled(icon.to_string(), Style::default().fg(color)),
                    Span::raw(" "),
                    Span::styled(
                        pad_width(&truncate_width(&p.name, 20), 20),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(p.status.clone(), Style::default().fg(Color::DarkGray)),
                ])
            })
            .collect();
        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                "no registered projects",
                Style::default().fg(Color::DarkGray),
            )));
        }

        let panel = Paragraph::new(lines).block(
            Block::default()
                .title(format!("Projects (v{})", registry.version))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        );
        frame.render_widget(panel, area);
    }

    fn render_logs(&self, frame: &mut Frame, area: Rect) {
        let logs = self.state.logs.lock().unwrap();
        let width = area.width.saturating_sub(14) as usize;

        let mut lines: Vec<Line> = logs
            .iter()
            .map(|entry| {
                Line::from(vec![
                    Span::raw(format!("{} ", entry.icon)),
                    Span::styled(
                        pad_width(&entry.tool, 9),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::styled(
                        truncate_width(&entry.summary, width.max(10)),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])
            })
            .collect();
        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                "no recent activity",
                Style::default().fg(Color::DarkGray),
            )));
        }

        let panel = Paragraph::new(lines).block(
            Block::default()
                .title("Activity")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        );
        frame.render_widget(panel, area);
    }

    fn render_history(&self, frame: &mut Frame, area: Rect, now: DateTime<Utc>) {
        let history = self.state.history.lock().unwrap();
        let task_width = (area.width.saturating_sub(16) as usize).max(10);

        let mut lines: Vec<Line> = Vec::new();
        let mut current_date = String::new();

        for entry in history.iter() {
            let date = entry.started_at.format("%Y-%m-%d").to_string();
            if date != current_date {
                current_date = date.clone();
                lines.push(Line::from(Span::styled(
                    format!("── {}", date),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            lines.push(self.history_row(entry, task_width, now));
        }
        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                "no work history",
                Style::default().fg(Color::DarkGray),
            )));
        }

        let panel = Paragraph::new(lines).block(
            Block::default()
                .title(format!("History ({})", history.len()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Magenta)),
        );
        frame.render_widget(panel, area);
    }

    fn history_row(&self, entry: &WorkHistoryEntry, task_width: usize, now: DateTime<Utc>) -> Line<'static> {
        let prefix = match entry.kind {
            HistoryKind::Wave => format!("W{}", entry.wave.unwrap_or(0)),
            HistoryKind::Adhoc => "──".to_string(),
        };
        let (icon, icon_color) = match entry.status {
            HistoryStatus::Completed => ("✓", Color::Green),
            HistoryStatus::Running => ("●", Color::Yellow),
            HistoryStatus::Error => ("✕", Color::Red),
        };
        let duration = match entry.completed_at {
            Some(done) => format_elapsed(done - entry.started_at),
            None => "...".to_string(),
        };
        let recent = now - entry.started_at < Duration::hours(1);
        let task_style = if recent {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };

        Line::from(vec![
            Span::styled(pad_width(&prefix, 3), Style::default().fg(Color::DarkGray)),
            Span::styled(icon.to_string(), Style::default().fg(icon_color)),
            Span::raw(" "),
            Span::styled(
                pad_width(&truncate_width(&entry.task, task_width), task_width),
                task_style,
            ),
            Span::styled(format!(" {:>5}", duration), Style::default().fg(Color::DarkGray)),
        ])
    }

    fn render_help_overlay(&self, frame: &mut Frame, area: Rect) {
        let width = 40.min(area.width);
        let height = 8.min(area.height);
        let popup = Rect::new(
            (area.width.saturating_sub(width)) / 2,
            (area.height.saturating_sub(height)) / 2,
            width,
            height,
        );

        let text = vec![
            Line::from("q / Esc   quit"),
            Line::from("h / ?     toggle this help"),
            Line::from(""),
            Line::from(Span::styled(
                "panels refresh every 2s",
                Style::default().fg(Color::DarkGray),
            )),
        ];
        let help = Paragraph::new(text).block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
        frame.render_widget(Clear, popup);
        frame.render_widget(help, popup);
    }
}
