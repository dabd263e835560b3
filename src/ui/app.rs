use std::mem;

use anyhow::Result;
use chrono::Utc;
use crossterm::event::KeyCode;
use open::that as open_link;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, Tabs, Wrap,
};
use ratatui::Frame;

use crate::models::{format_value, Patient};
use crate::state::{Records, RECENT_WINDOW_DAYS};

use super::forms::{FormTab, PatientField, PatientForm};
use super::helpers::{centered_rect, clip, single_line, surface_error};
use super::screens::{
    ConsoleFocus, ConsoleScreen, DashboardScreen, DetailScreen, EXAMPLE_QUERIES, SCHEMA_REFERENCE,
};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Rows skipped by PageUp/PageDown in list views.
const PAGE_STEP: isize = 5;

/// High-level navigation states, one per route of the app.
enum Screen {
    Dashboard,
    Register(PatientForm),
    Detail(DetailScreen),
    Console(ConsoleScreen),
}

/// Fine-grained modes layered over the dashboard.
enum Mode {
    Normal,
    Searching(SearchState),
    GoToPatient(String),
}

/// State for an active inline search.
struct SearchState {
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    records: Records,
    dashboard: DashboardScreen,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(records: Records) -> Self {
        let mut app = Self {
            records,
            dashboard: DashboardScreen::default(),
            screen: Screen::Dashboard,
            mode: Mode::Normal,
            status: None,
        };
        app.surface_records_error();
        app
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    /// Dispatch one key press. Returns `true` when the app should exit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
            Mode::GoToPatient(input) => self.handle_go_to(code, input)?,
        };

        Ok(exit)
    }

    /// Ctrl+S submits the registration form from any field.
    pub(crate) fn handle_ctrl_s(&mut self) -> Result<()> {
        if matches!(self.screen, Screen::Register(_)) {
            self.submit_registration();
        }
        Ok(())
    }

    /// Ctrl+L clears the console editor.
    pub(crate) fn handle_ctrl_l(&mut self) -> Result<()> {
        if let Screen::Console(console) = &mut self.screen {
            console.input.clear();
        }
        Ok(())
    }

    /// Called on every event-loop tick: pick up writes made by other running
    /// instances.
    pub(crate) fn on_tick(&mut self) {
        if !self.records.apply_sync_events() {
            return;
        }
        let len = self.records.visible_patients().len();
        self.dashboard.ensure_in_bounds(len);

        if let Screen::Detail(detail) = &mut self.screen {
            if detail.patient.is_none() {
                detail.patient = self.records.patient(detail.patient_id);
            }
        }

        if self.records.error().is_some() {
            self.surface_records_error();
        } else if self.status.is_none() {
            self.set_status("Updated with changes from another window.", StatusKind::Info);
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let screen = mem::replace(&mut self.screen, Screen::Dashboard);
        let (screen, mode) = match screen {
            Screen::Dashboard => self.handle_dashboard_key(code, exit)?,
            Screen::Register(form) => (self.handle_register_key(code, form), Mode::Normal),
            Screen::Detail(detail) => (self.handle_detail_key(code, detail, exit), Mode::Normal),
            Screen::Console(console) => (self.handle_console_key(code, console), Mode::Normal),
        };
        self.screen = screen;
        Ok(mode)
    }

    fn handle_dashboard_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<(Screen, Mode)> {
        let len = self.records.visible_patients().len();
        match code {
            KeyCode::Char('q') => {
                *exit = true;
            }
            KeyCode::Esc => {
                if self.records.search_term().is_empty() {
                    *exit = true;
                } else {
                    self.records.search("");
                    self.dashboard.select_first();
                    self.clear_status();
                }
            }
            KeyCode::Up => self.dashboard.move_selection(-1, len),
            KeyCode::Down => self.dashboard.move_selection(1, len),
            KeyCode::PageUp => self.dashboard.move_selection(-PAGE_STEP, len),
            KeyCode::PageDown => self.dashboard.move_selection(PAGE_STEP, len),
            KeyCode::Home => self.dashboard.select_first(),
            KeyCode::End => self.dashboard.select_last(len),
            KeyCode::Enter => {
                if let Some(id) = self.current_patient().map(|patient| patient.id) {
                    self.clear_status();
                    return Ok((self.open_detail(id), Mode::Normal));
                }
                self.set_status("No patient selected.", StatusKind::Error);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Char('+') => {
                self.clear_status();
                return Ok((Screen::Register(PatientForm::default()), Mode::Normal));
            }
            KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Char(':') => {
                self.clear_status();
                self.records.refresh_history();
                self.surface_records_error();
                return Ok((Screen::Console(ConsoleScreen::default()), Mode::Normal));
            }
            KeyCode::Char('f') | KeyCode::Char('/') => {
                return Ok((
                    Screen::Dashboard,
                    Mode::Searching(SearchState {
                        query: self.records.search_term().to_string(),
                    }),
                ));
            }
            KeyCode::Char('g') | KeyCode::Char('G') => {
                return Ok((Screen::Dashboard, Mode::GoToPatient(String::new())));
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                if self.records.load() {
                    self.set_status("Reloaded patients and history.", StatusKind::Info);
                } else {
                    self.surface_records_error();
                }
                let len = self.records.visible_patients().len();
                self.dashboard.ensure_in_bounds(len);
            }
            _ => {}
        }
        Ok((Screen::Dashboard, Mode::Normal))
    }

    fn handle_register_key(&mut self, code: KeyCode, mut form: PatientForm) -> Screen {
        match code {
            KeyCode::Esc => {
                self.set_status("Registration cancelled.", StatusKind::Info);
                return Screen::Dashboard;
            }
            KeyCode::Enter => {
                self.screen = Screen::Register(form);
                self.submit_registration();
                return mem::replace(&mut self.screen, Screen::Dashboard);
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::PageDown => form.switch_tab(true),
            KeyCode::PageUp => form.switch_tab(false),
            KeyCode::Left => {
                form.cycle_gender(false);
            }
            KeyCode::Right | KeyCode::Char(' ') if form.active == PatientField::Gender => {
                form.cycle_gender(true);
            }
            KeyCode::Backspace => {
                form.backspace();
                form.error = None;
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Screen::Register(form)
    }

    /// Validate and store the form on the register screen. Success returns to
    /// the dashboard with the new patient selected; failure keeps the form open
    /// with the message inline.
    fn submit_registration(&mut self) {
        let Screen::Register(form) = &mut self.screen else {
            return;
        };

        let data = match form.parse_inputs() {
            Ok(data) => data,
            Err(err) => {
                form.error = Some(surface_error(&err));
                return;
            }
        };

        match self.records.add_patient(&data) {
            Some(patient) => {
                if !self.records.search_term().is_empty() {
                    self.records.search("");
                }
                self.dashboard
                    .focus(self.records.visible_patients(), patient.id);
                self.screen = Screen::Dashboard;
                self.set_status(
                    format!("Registered {} (#{}).", patient, patient.id),
                    StatusKind::Info,
                );
            }
            None => {
                let message = self
                    .records
                    .error()
                    .unwrap_or("Could not save patient.")
                    .to_string();
                if let Screen::Register(form) = &mut self.screen {
                    form.error = Some(message);
                }
            }
        }
    }

    fn handle_detail_key(&mut self, code: KeyCode, mut detail: DetailScreen, exit: &mut bool) -> Screen {
        match code {
            KeyCode::Char('q') => {
                *exit = true;
            }
            KeyCode::Esc | KeyCode::Backspace => {
                self.clear_status();
                return Screen::Dashboard;
            }
            KeyCode::Up => detail.scroll_by(-1),
            KeyCode::Down => detail.scroll_by(1),
            KeyCode::Char('r') | KeyCode::Char('R') => {
                return self.open_detail(detail.patient_id);
            }
            KeyCode::Char('m') | KeyCode::Char('M') => match &detail.patient {
                Some(patient) if !patient.email.trim().is_empty() => {
                    let target = format!("mailto:{}", patient.email.trim());
                    if let Err(err) = open_link(&target) {
                        self.set_status(format!("Failed to open mail client: {err}"), StatusKind::Error);
                    } else {
                        self.set_status(format!("Opened mail to {}.", patient.email), StatusKind::Info);
                    }
                }
                _ => self.set_status("This patient has no email address.", StatusKind::Error),
            },
            _ => {}
        }
        Screen::Detail(detail)
    }

    fn handle_console_key(&mut self, code: KeyCode, mut console: ConsoleScreen) -> Screen {
        if console.reference.is_some() {
            match code {
                KeyCode::Esc | KeyCode::F(1) => console.reference = None,
                KeyCode::Up => console.move_example(-1),
                KeyCode::Down => console.move_example(1),
                KeyCode::Enter => console.use_example(),
                _ => {}
            }
            return Screen::Console(console);
        }

        match code {
            KeyCode::F(1) => console.toggle_reference(),
            KeyCode::Esc => {
                self.clear_status();
                return Screen::Dashboard;
            }
            KeyCode::Tab => console.toggle_focus(),
            KeyCode::Enter => {
                if let Some(statement) = console.input.statement() {
                    self.run_console_statement(&statement, &mut console);
                } else {
                    self.set_status("Type a SQL statement first.", StatusKind::Error);
                }
            }
            _ if console.focus == ConsoleFocus::Results => {
                let rows = self
                    .records
                    .last_outcome()
                    .map(|outcome| outcome.rows.len())
                    .unwrap_or(0);
                match code {
                    KeyCode::Up => console.scroll_results(-1, rows),
                    KeyCode::Down => console.scroll_results(1, rows),
                    KeyCode::PageUp => console.scroll_results(-PAGE_STEP, rows),
                    KeyCode::PageDown => console.scroll_results(PAGE_STEP, rows),
                    KeyCode::Home => console.result_scroll = 0,
                    _ => {}
                }
            }
            KeyCode::Up | KeyCode::Down => {
                let history: Vec<String> = self
                    .records
                    .history()
                    .iter()
                    .map(|entry| entry.query.clone())
                    .collect();
                console.input.recall(&history, code == KeyCode::Up);
            }
            KeyCode::Backspace => console.input.backspace(),
            KeyCode::Char(ch) => {
                console.input.push_char(ch);
            }
            _ => {}
        }
        Screen::Console(console)
    }

    fn run_console_statement(&mut self, statement: &str, console: &mut ConsoleScreen) {
        match self.records.execute_query(statement) {
            Some(outcome) => {
                console.result_scroll = 0;
                console.input.recall = None;
                let message = if outcome.has_result_set() {
                    format!("{} row(s) returned.", outcome.row_count)
                } else {
                    format!("{} row(s) affected.", outcome.row_count)
                };
                let len = self.records.visible_patients().len();
                self.dashboard.ensure_in_bounds(len);
                if self.records.error().is_some() {
                    // The statement ran but the follow-up refresh did not.
                    self.surface_records_error();
                } else {
                    self.set_status(message, StatusKind::Info);
                }
            }
            None => self.surface_records_error(),
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.records.search("");
                self.dashboard.select_first();
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => {
                let count = self.records.visible_patients().len();
                if !state.query.trim().is_empty() {
                    self.set_status(format!("{count} patient(s) match."), StatusKind::Info);
                }
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Ok(Mode::Searching(state)),
        }

        if !self.records.search(&state.query) {
            self.surface_records_error();
        }
        self.dashboard.select_first();
        Ok(Mode::Searching(state))
    }

    fn handle_go_to(&mut self, code: KeyCode, mut input: String) -> Result<Mode> {
        match code {
            KeyCode::Esc => return Ok(Mode::Normal),
            KeyCode::Enter => {
                match input.trim().parse::<i64>() {
                    Ok(id) => self.screen = self.open_detail(id),
                    Err(_) => self.set_status("Patient id must be a number.", StatusKind::Error),
                }
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(ch) if ch.is_ascii_digit() => input.push(ch),
            _ => {}
        }
        Ok(Mode::GoToPatient(input))
    }

    /// Build the detail route for `id`, fetching straight from the store so a
    /// record added elsewhere is found even before the next sync tick.
    fn open_detail(&mut self, id: i64) -> Screen {
        let patient = self.records.patient(id);
        if self.records.error().is_some() {
            self.surface_records_error();
        } else if patient.is_none() {
            self.set_status(format!("No patient with id {id}."), StatusKind::Error);
        }
        Screen::Detail(DetailScreen::new(id, patient))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Dashboard => self.draw_dashboard(frame, content_area),
            Screen::Register(form) => self.draw_register(frame, content_area, form),
            Screen::Detail(detail) => self.draw_detail(frame, content_area, detail),
            Screen::Console(console) => self.draw_console(frame, content_area, console),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::Searching(state) => self.draw_prompt(frame, area, "Search", &state.query),
            Mode::GoToPatient(input) => self.draw_go_to(frame, area, input),
            Mode::Normal => {}
        }
    }

    fn draw_dashboard(&self, frame: &mut Frame, area: Rect) {
        let patients = self.records.visible_patients();
        let search = self.records.search_term();
        let title = if search.trim().is_empty() {
            format!(
                "Patients ({} total, {} in the last {} days)",
                self.records.patients().len(),
                self.records.recent_count(Utc::now()),
                RECENT_WINDOW_DAYS
            )
        } else {
            format!(
                "Patients matching \"{}\" ({} of {})",
                search,
                patients.len(),
                self.records.patients().len()
            )
        };
        let block = Block::default().title(title).borders(Borders::ALL);

        if patients.is_empty() {
            let message = if search.trim().is_empty() {
                "No patients yet. Press 'n' to register one."
            } else {
                "No patients match this search."
            };
            let paragraph = Paragraph::new(message)
                .alignment(Alignment::Center)
                .block(block)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        let name_width = area.width.saturating_sub(60).max(16) as usize;
        let items: Vec<ListItem> = patients
            .iter()
            .map(|patient| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("#{:<5}", patient.id),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(format!(
                        "{:<width$}",
                        clip(&patient.display_name(), name_width),
                        width = name_width
                    )),
                    Span::raw(format!(" {:<11}", patient.date_of_birth)),
                    Span::raw(format!("{:<8}", clip(&patient.gender.to_string(), 7))),
                    Span::raw(format!("{:<16}", clip(&patient.phone, 15))),
                    Span::styled(clip(&patient.email, 28), Style::default().fg(Color::Cyan)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(Some(self.dashboard.selected.min(patients.len() - 1)));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_register(&self, frame: &mut Frame, area: Rect, form: &PatientForm) {
        let block = Block::default()
            .title("Register Patient")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(0)])
            .split(inner);

        let titles: Vec<&str> = FormTab::ALL.iter().map(|tab| tab.title()).collect();
        let tabs = Tabs::new(titles)
            .select(form.active_tab().index())
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .divider(" | ");
        frame.render_widget(tabs, chunks[0]);

        let fields = form.active_tab().fields();
        let mut lines: Vec<Line> = fields.iter().map(|field| form.build_line(*field)).collect();
        lines.push(Line::from(""));
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter or Ctrl+S to save • Tab to move • PgUp/PgDn to switch tabs • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, chunks[1]);

        if form.active != PatientField::Gender {
            if let Some(row) = fields.iter().position(|field| *field == form.active) {
                let cursor_x = chunks[1].x + 20 + form.value_len(form.active) as u16;
                let cursor_y = chunks[1].y + row as u16;
                frame.set_cursor_position((cursor_x, cursor_y));
            }
        }
    }

    fn draw_detail(&self, frame: &mut Frame, area: Rect, detail: &DetailScreen) {
        let Some(patient) = &detail.patient else {
            let block = Block::default().title("Patient").borders(Borders::ALL);
            let paragraph = Paragraph::new(format!("No patient with id {}.", detail.patient_id))
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        };

        let block = Block::default()
            .title(format!("{} (#{})", patient, patient.id))
            .borders(Borders::ALL);

        let heading = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let mut lines = Vec::new();
        for (section, rows) in patient.detail_sections() {
            lines.push(Line::from(Span::styled(section, heading)));
            for (label, value) in rows {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {label:<20}"), Style::default().fg(Color::Gray)),
                    Span::raw(value),
                ]));
            }
            lines.push(Line::from(""));
        }

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((detail.scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn draw_console(&self, frame: &mut Frame, area: Rect, console: &ConsoleScreen) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(rows[1]);

        let focused = Style::default().fg(Color::Yellow);
        let editor_block = Block::default()
            .title("SQL")
            .borders(Borders::ALL)
            .border_style(if console.focus == ConsoleFocus::Editor {
                focused
            } else {
                Style::default()
            });
        let editor_inner = editor_block.inner(rows[0]);
        let editor = Paragraph::new(console.input.text.clone()).block(editor_block);
        frame.render_widget(editor, rows[0]);
        if console.focus == ConsoleFocus::Editor {
            let visible = editor_inner.width.saturating_sub(1) as usize;
            let offset = console.input.text.chars().count().min(visible) as u16;
            frame.set_cursor_position((editor_inner.x + offset, editor_inner.y));
        }

        let results_block = Block::default()
            .title("Results")
            .borders(Borders::ALL)
            .border_style(if console.focus == ConsoleFocus::Results {
                focused
            } else {
                Style::default()
            });
        self.draw_results(frame, columns[0], results_block, console.result_scroll);

        let history_items: Vec<ListItem> = self
            .records
            .history()
            .iter()
            .map(|entry| {
                let width = columns[1].width.saturating_sub(12) as usize;
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{} ", entry.timestamp.format("%H:%M:%S")),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(clip(&single_line(&entry.query), width)),
                ]))
            })
            .collect();
        let mut history_state = ListState::default();
        history_state.select(console.input.recall);
        let history = List::new(history_items)
            .block(Block::default().title("Recent queries").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Yellow));
        frame.render_stateful_widget(history, columns[1], &mut history_state);

        if let Some(selected) = console.reference {
            self.draw_reference(frame, area, selected);
        }
    }

    /// Popup listing both tables and the example statements.
    fn draw_reference(&self, frame: &mut Frame, area: Rect, selected: usize) {
        let popup_area = centered_rect(80, 80, area);
        frame.render_widget(Clear, popup_area);
        let block = Block::default()
            .title("Tables and examples")
            .borders(Borders::ALL);
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(inner);

        let heading = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let mut schema_lines = Vec::new();
        for (table, columns) in SCHEMA_REFERENCE {
            schema_lines.push(Line::from(Span::styled(table.to_string(), heading)));
            for (column, kind) in columns.iter() {
                schema_lines.push(Line::from(vec![
                    Span::raw(format!("  {column:<20}")),
                    Span::styled(kind.to_string(), Style::default().fg(Color::DarkGray)),
                ]));
            }
            schema_lines.push(Line::from(""));
        }
        frame.render_widget(Paragraph::new(schema_lines), chunks[0]);

        let examples: Vec<ListItem> = EXAMPLE_QUERIES
            .iter()
            .map(|(group, sql)| {
                ListItem::new(vec![
                    Line::from(Span::styled(group.to_string(), heading)),
                    Line::from(format!("  {sql}")),
                ])
            })
            .collect();
        let mut state = ListState::default();
        state.select(Some(selected));
        let list = List::new(examples)
            .block(Block::default().title("Examples (Enter to use)").borders(Borders::LEFT))
            .highlight_style(Style::default().fg(Color::Yellow));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    fn draw_results(&self, frame: &mut Frame, area: Rect, block: Block, scroll: usize) {
        let Some(outcome) = self.records.last_outcome() else {
            let paragraph = Paragraph::new("Run a statement to see results here.")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        };

        if !outcome.has_result_set() {
            let paragraph =
                Paragraph::new(format!("Statement ran. {} row(s) affected.", outcome.row_count))
                    .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let header = Row::new(
            outcome
                .columns
                .iter()
                .map(|name| Cell::from(name.clone())),
        )
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        let body: Vec<Row> = outcome
            .rows
            .iter()
            .skip(scroll)
            .map(|values| Row::new(values.iter().map(|value| Cell::from(format_value(value)))))
            .collect();
        let widths: Vec<Constraint> = outcome
            .columns
            .iter()
            .map(|_| Constraint::Ratio(1, outcome.columns.len() as u32))
            .collect();

        let title = format!("Results ({} row(s))", outcome.row_count);
        let table = Table::new(body, widths)
            .header(header)
            .block(block.title(title))
            .column_spacing(1);
        frame.render_widget(table, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else if self.records.is_loading() {
            Line::from(Span::styled("Loading…", Style::default().fg(Color::Gray)))
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_prompt(&self, frame: &mut Frame, area: Rect, title: &str, value: &str) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let prefix = format!("{title}: ");
        let block = Block::default().borders(Borders::ALL).title(title.to_string());
        let paragraph = Paragraph::new(Span::raw(format!("{prefix}{value}")))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + prefix.chars().count() as u16 + value.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_go_to(&self, frame: &mut Frame, area: Rect, input: &str) {
        let popup_area = centered_rect(40, 20, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Open patient")
            .borders(Borders::ALL);
        let inner = block.inner(popup_area);
        let lines = vec![
            Line::from(format!("Patient id: {input}")),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to open • Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        let paragraph = Paragraph::new(lines).block(block);
        frame.render_widget(paragraph, popup_area);

        let cursor_x = inner.x + "Patient id: ".len() as u16 + input.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let pairs: &[(&str, &str)] = match (&self.screen, &self.mode) {
            (_, Mode::Searching(_)) => &[("[Enter]", " Done   "), ("[Esc]", " Clear search")],
            (_, Mode::GoToPatient(_)) => &[("[Enter]", " Open   "), ("[Esc]", " Cancel")],
            (Screen::Dashboard, _) => &[
                ("[↑↓]", " Navigate   "),
                ("[Enter]", " Details   "),
                ("[n]", " Register   "),
                ("[f]", " Search   "),
                ("[g]", " Go to id   "),
                ("[c]", " SQL console   "),
                ("[r]", " Reload   "),
                ("[q]", " Quit"),
            ],
            (Screen::Register(_), _) => &[
                ("[Tab]", " Next field   "),
                ("[PgUp/PgDn]", " Switch tab   "),
                ("[←→]", " Gender   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
            (Screen::Detail(_), _) => &[
                ("[↑↓]", " Scroll   "),
                ("[m]", " Email   "),
                ("[r]", " Reload   "),
                ("[Esc]", " Back"),
            ],
            (Screen::Console(console), _) if console.reference.is_some() => &[
                ("[↑↓]", " Pick example   "),
                ("[Enter]", " Use   "),
                ("[Esc]", " Close"),
            ],
            (Screen::Console(_), _) => &[
                ("[Enter]", " Run   "),
                ("[F1]", " Tables/examples   "),
                ("[↑↓]", " History / scroll   "),
                ("[Tab]", " Editor/results   "),
                ("[Ctrl+L]", " Clear   "),
                ("[Esc]", " Back"),
            ],
        };

        let spans: Vec<Span<'static>> = pairs
            .iter()
            .flat_map(|(key, label)| {
                [
                    Span::styled(key.to_string(), key_style),
                    Span::raw(label.to_string()),
                ]
            })
            .collect();
        Line::from(spans)
    }

    fn current_patient(&self) -> Option<&Patient> {
        self.records.visible_patients().get(self.dashboard.selected)
    }

    fn surface_records_error(&mut self) {
        if let Some(message) = self.records.error().map(str::to_string) {
            self.set_status(message, StatusKind::Error);
        }
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn app() -> App {
        let mut records = Records::new(Store::open_in_memory().unwrap());
        records.load();
        App::new(records)
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    fn register(app: &mut App, values: &[&str]) {
        app.handle_key(KeyCode::Char('n')).unwrap();
        for (idx, value) in values.iter().enumerate() {
            if idx == 3 {
                // Gender selector: keep the default and move on.
                app.handle_key(KeyCode::Tab).unwrap();
            }
            type_text(app, value);
            app.handle_key(KeyCode::Tab).unwrap();
        }
        app.handle_key(KeyCode::Enter).unwrap();
    }

    #[test]
    fn registering_through_the_form_lands_on_the_dashboard() {
        let mut app = app();
        register(
            &mut app,
            &["Ana", "Diaz", "1990-01-01", "a@x.com", "555-0100", "1 Main St"],
        );

        assert!(matches!(app.screen, Screen::Dashboard));
        assert_eq!(app.records().patients().len(), 1);
        let patient = &app.records().patients()[0];
        assert_eq!(patient.first_name, "Ana");
        assert_eq!(patient.email, "a@x.com");

        app.handle_key(KeyCode::Enter).unwrap();
        match &app.screen {
            Screen::Detail(detail) => {
                assert_eq!(detail.patient.as_ref().map(|p| p.last_name.as_str()), Some("Diaz"));
            }
            _ => panic!("expected detail screen"),
        }
    }

    #[test]
    fn invalid_form_stays_open_with_inline_error() {
        let mut app = app();
        app.handle_key(KeyCode::Char('n')).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();

        match &app.screen {
            Screen::Register(form) => {
                assert_eq!(form.error.as_deref(), Some("First name is required."));
            }
            _ => panic!("expected register screen"),
        }
        assert!(app.records().patients().is_empty());
    }

    #[test]
    fn console_runs_statements_and_records_history() {
        let mut app = app();
        app.handle_key(KeyCode::Char('c')).unwrap();
        type_text(&mut app, "SELECT COUNT(*) FROM patients");
        app.handle_key(KeyCode::Enter).unwrap();

        let outcome = app.records().last_outcome().unwrap();
        assert_eq!(outcome.row_count, 1);
        assert_eq!(app.records().history().len(), 1);

        app.handle_key(KeyCode::Char('x')).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(app.records().error().is_some());
        assert!(matches!(app.status.as_ref().map(|s| &s.kind), Some(StatusKind::Error)));
    }

    #[test]
    fn console_reports_a_failed_refresh_after_a_successful_statement() {
        let mut app = app();
        app.handle_key(KeyCode::Char('c')).unwrap();
        type_text(&mut app, "ALTER TABLE patients RENAME TO archived");
        app.handle_key(KeyCode::Enter).unwrap();

        assert!(app.records().last_outcome().is_some());
        let status = app.status.as_ref().expect("status is set");
        assert!(matches!(status.kind, StatusKind::Error));
        assert!(status.text.contains("no such table"), "got {}", status.text);
    }

    #[test]
    fn console_reference_loads_an_example_into_the_editor() {
        let mut app = app();
        app.handle_key(KeyCode::Char('c')).unwrap();
        app.handle_key(KeyCode::F(1)).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();

        match &app.screen {
            Screen::Console(console) => {
                assert_eq!(console.input.text, EXAMPLE_QUERIES[0].1);
                assert!(console.reference.is_none());
            }
            _ => panic!("expected console screen"),
        }

        app.handle_key(KeyCode::Enter).unwrap();
        assert!(app.records().last_outcome().is_some_and(|o| o.has_result_set()));
    }

    #[test]
    fn go_to_unknown_id_shows_empty_detail() {
        let mut app = app();
        app.handle_key(KeyCode::Char('g')).unwrap();
        type_text(&mut app, "77");
        app.handle_key(KeyCode::Enter).unwrap();

        match &app.screen {
            Screen::Detail(detail) => {
                assert_eq!(detail.patient_id, 77);
                assert!(detail.patient.is_none());
            }
            _ => panic!("expected detail screen"),
        }
        assert!(app.records().error().is_none());
    }
}
