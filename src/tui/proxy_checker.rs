//! TUI for proxy validation with live progress display

use crate::proxy::{
    event_channel, CancelToken, CheckerConfig, FileSink, OutputMode, RunEvent, RunState,
    ValidationEngine,
};
use crate::{Result, SieveError};
use anyhow::{anyhow, Context};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Duration;

/// Maximum number of recent log lines to keep per list
const MAX_RECENT_LINES: usize = 100;

/// Proxy validation TUI application state
pub struct ProxyCheckerApp {
    /// Descriptors to validate
    descriptors: Vec<String>,
    /// Checker configuration
    config: CheckerConfig,
    /// Output file for valid proxies
    valid_output: PathBuf,
    /// Output file for invalid proxies
    invalid_output: PathBuf,
    output_mode: OutputMode,
    /// Counters as last reported by the engine
    state: RunState,
    /// Recent valid log lines
    recent_valid: VecDeque<String>,
    /// Recent invalid log lines
    recent_invalid: VecDeque<String>,
    /// Selected list (0 = valid, 1 = invalid)
    selected_list: usize,
    /// Selected item in current list
    list_state: ListState,
    /// Status message
    status_message: String,
    /// Whether the engine has stopped sending events
    is_complete: bool,
    /// Whether the run ended with an error
    failed: bool,
    /// Whether the user wants to quit
    should_quit: bool,
    cancel: CancelToken,
}

impl ProxyCheckerApp {
    /// Create a new proxy validation TUI application
    pub fn new(
        descriptors: Vec<String>,
        config: CheckerConfig,
        valid_output: PathBuf,
        invalid_output: PathBuf,
        output_mode: OutputMode,
    ) -> Self {
        let total = descriptors.len();
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            descriptors,
            config,
            valid_output,
            invalid_output,
            output_mode,
            state: RunState::new(total),
            recent_valid: VecDeque::new(),
            recent_invalid: VecDeque::new(),
            selected_list: 0,
            list_state,
            status_message: "Starting... Press 'q' to stop.".to_string(),
            is_complete: false,
            failed: false,
            should_quit: false,
            cancel: CancelToken::new(),
        }
    }

    /// Run the TUI application until the user quits, returning the final counters
    pub async fn run(&mut self) -> Result<RunState> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<RunState> {
        let mut valid_sink = FileSink::open(&self.valid_output, self.output_mode)
            .with_context(|| format!("failed to open {}", self.valid_output.display()))?;
        let mut invalid_sink = FileSink::open(&self.invalid_output, self.output_mode)
            .with_context(|| format!("failed to open {}", self.invalid_output.display()))?;

        let engine = ValidationEngine::new(self.config.clone());
        let (tx, mut rx) = event_channel();
        let descriptors = std::mem::take(&mut self.descriptors);
        let cancel = self.cancel.clone();
        let mut run = tokio::spawn(async move {
            engine
                .run(descriptors, &mut valid_sink, &mut invalid_sink, Some(tx), cancel)
                .await
        });
        let mut outcome = None;

        loop {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                        if self.should_quit {
                            break;
                        }
                    }
                }
            }

            // Drain everything that arrived since the last frame
            loop {
                match rx.try_recv() {
                    Ok(event) => self.apply(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        // The sender is dropped as the run returns
                        if outcome.is_none() {
                            let finished = (&mut run)
                                .await
                                .map_err(|e| anyhow!("validation task failed: {}", e))?;
                            self.finish(&finished);
                            outcome = Some(finished);
                        }
                        break;
                    }
                }
            }
        }

        let finished = match outcome {
            Some(finished) => finished,
            None => {
                // Workers finish their in-flight probes before the run returns
                self.cancel.cancel();
                run.await
                    .map_err(|e| anyhow!("validation task failed: {}", e))?
            }
        };
        Ok(finished?)
    }

    /// Show how the run ended in the status bar
    fn finish(&mut self, outcome: &std::result::Result<RunState, SieveError>) {
        self.is_complete = true;
        match outcome {
            Ok(state) => {
                self.state = *state;
                self.status_message = format!(
                    "Complete! Checked: {}/{} | Valid: {} | Invalid: {} | Press 'q' to quit",
                    state.checked, state.total, state.valid_count, state.invalid_count
                );
            }
            Err(e) => {
                self.failed = true;
                self.status_message = format!("Failed: {} | Press 'q' to quit", e);
            }
        }
    }

    fn apply(&mut self, event: RunEvent) {
        match event {
            RunEvent::Log { message, is_valid } => {
                let list = if is_valid {
                    &mut self.recent_valid
                } else {
                    &mut self.recent_invalid
                };
                list.push_back(message);
                if list.len() > MAX_RECENT_LINES {
                    list.pop_front();
                }
            }
            RunEvent::Progress {
                checked_delta,
                valid_count,
                invalid_count,
                ..
            } => {
                self.state.checked += checked_delta;
                self.state.valid_count = valid_count;
                self.state.invalid_count = invalid_count;
                self.status_message = format!(
                    "Checking... {}% ({}/{}) | Valid: {} | Invalid: {}",
                    self.state.percent(),
                    self.state.checked,
                    self.state.total,
                    valid_count,
                    invalid_count
                );
            }
        }
    }

    fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.selected_list = (self.selected_list + 1) % 2;
                self.list_state.select(Some(0));
            }
            KeyCode::Down => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(i) if i + 1 < len => i + 1,
                    _ => 0,
                };
                self.list_state.select(Some(i));
            }
            KeyCode::Up => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(0) | None => len.saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.list_state.select(Some(i));
            }
            _ => {}
        }
    }

    fn selected_len(&self) -> usize {
        if self.selected_list == 0 {
            self.recent_valid.len()
        } else {
            self.recent_invalid.len()
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),    // Log lists
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new(format!("Proxy Checker - {}", self.config.test_url))
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let progress = self.state.percent().min(100);
        let progress_label = format!("{}/{} ({}%)", self.state.checked, self.state.total, progress);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(progress)
            .label(progress_label);
        f.render_widget(gauge, chunks[1]);

        let list_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);

        Self::render_log_list(
            f,
            list_chunks[0],
            "Valid",
            &self.recent_valid,
            self.state.valid_count,
            self.selected_list == 0,
            Color::Green,
            if self.selected_list == 0 { Some(&mut self.list_state) } else { None },
        );

        Self::render_log_list(
            f,
            list_chunks[1],
            "Invalid",
            &self.recent_invalid,
            self.state.invalid_count,
            self.selected_list == 1,
            Color::Red,
            if self.selected_list == 1 { Some(&mut self.list_state) } else { None },
        );

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.failed {
                Style::default().fg(Color::Red)
            } else if self.is_complete {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }

    #[allow(clippy::too_many_arguments)]
    fn render_log_list(
        f: &mut Frame,
        area: Rect,
        title: &str,
        lines: &VecDeque<String>,
        total_count: usize,
        is_selected: bool,
        color: Color,
        list_state: Option<&mut ListState>,
    ) {
        let items: Vec<ListItem> = lines
            .iter()
            .rev() // Show newest first
            .map(|line| ListItem::new(line.clone()).style(Style::default().fg(color)))
            .collect();

        let block_title = format!("{} ({})", title, total_count);
        let border_style = if is_selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(block_title)
                    .border_style(border_style),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

        if let Some(state) = list_state {
            f.render_stateful_widget(list, area, state);
        } else {
            f.render_widget(list, area);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(total: usize) -> ProxyCheckerApp {
        ProxyCheckerApp::new(
            (0..total).map(|i| format!("10.0.0.{}:8080", i)).collect(),
            CheckerConfig::new(),
            PathBuf::from("valid.txt"),
            PathBuf::from("invalid.txt"),
            OutputMode::Append,
        )
    }

    #[test]
    fn test_apply_events() {
        let mut app = app(2);
        app.apply(RunEvent::Log {
            message: "VALID, ip:1.1.1.1, http://10.0.0.0:8080".to_string(),
            is_valid: true,
        });
        app.apply(RunEvent::Progress {
            checked_delta: 1,
            checked: 1,
            valid_count: 1,
            invalid_count: 0,
        });

        assert_eq!(app.state.checked, 1);
        assert_eq!(app.recent_valid.len(), 1);
        assert!(app.recent_invalid.is_empty());
        assert!(app.status_message.contains("Valid: 1 | Invalid: 0"));
    }

    #[test]
    fn test_recent_lines_are_capped() {
        let mut app = app(1);
        for i in 0..(MAX_RECENT_LINES + 5) {
            app.apply(RunEvent::Log {
                message: format!("INVALID: http://10.0.0.{}:8080", i),
                is_valid: false,
            });
        }
        assert_eq!(app.recent_invalid.len(), MAX_RECENT_LINES);
        assert_eq!(app.recent_invalid.front().map(String::as_str), Some("INVALID: http://10.0.0.5:8080"));
    }

    #[test]
    fn test_finish_reports_sink_failure() {
        let mut app = app(3);
        let failure = Err(SieveError::SinkWrite {
            sink: "valid",
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        });
        app.finish(&failure);

        assert!(app.is_complete);
        assert!(app.failed);
        assert!(!app.status_message.starts_with("Complete!"));
        assert!(app.status_message.contains("failed to write to valid output: disk full"));
    }

    #[test]
    fn test_finish_reports_final_counts() {
        let mut app = app(3);
        let state = RunState {
            total: 3,
            checked: 3,
            valid_count: 1,
            invalid_count: 2,
        };
        app.finish(&Ok(state));

        assert!(app.is_complete);
        assert!(!app.failed);
        assert_eq!(app.state, state);
        assert!(app.status_message.starts_with("Complete! Checked: 3/3 | Valid: 1 | Invalid: 2"));
    }

    #[test]
    fn test_quit_and_list_navigation() {
        let mut app = app(1);
        app.handle_input(KeyCode::Tab);
        assert_eq!(app.selected_list, 1);
        app.handle_input(KeyCode::Up);
        assert_eq!(app.list_state.selected(), Some(0));
        app.handle_input(KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
