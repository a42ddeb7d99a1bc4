// 🖥️ Preview UI - browse category tables, tune the threshold, export
// Compiled only with the `tui` feature

use crate::cache::Dataset;
use crate::classifier::{classify, CategoryTable, Classification, ClassifiedExposure};
use crate::export::save_workbook;
use crate::record::Column;
use crate::rules::RuleEngine;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

const PAGE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Categories,
    Records,
}

pub struct App {
    pub dataset: Arc<Dataset>,
    pub engine: RuleEngine,
    pub classification: Classification,
    pub category_state: ListState,
    pub record_state: TableState,
    pub focus: Focus,
    pub show_detail: bool,
    pub output: PathBuf,
    pub message: Option<String>,
}

impl App {
    pub fn new(dataset: Arc<Dataset>, engine: RuleEngine, min_balance: u64, output: PathBuf) -> Self {
        let classification = classify(&dataset.exposures, &engine, min_balance);

        let mut category_state = ListState::default();
        if !classification.tables.is_empty() {
            category_state.select(Some(0));
        }

        let mut app = Self {
            dataset,
            engine,
            classification,
            category_state,
            record_state: TableState::default(),
            focus: Focus::Categories,
            show_detail: false,
            output,
            message: None,
        };
        app.reset_record_selection();
        app
    }

    pub fn min_balance(&self) -> u64 {
        self.classification.min_balance
    }

    pub fn selected_table(&self) -> Option<&CategoryTable> {
        self.category_state
            .selected()
            .and_then(|i| self.classification.tables.get(i))
    }

    pub fn selected_record(&self) -> Option<&ClassifiedExposure> {
        let table = self.selected_table()?;
        self.record_state.selected().and_then(|i| table.rows.get(i))
    }

    fn record_count(&self) -> usize {
        self.selected_table().map_or(0, |t| t.len())
    }

    fn reset_record_selection(&mut self) {
        if self.record_count() > 0 {
            self.record_state.select(Some(0));
        } else {
            self.record_state.select(None);
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Categories => Focus::Records,
            Focus::Records => Focus::Categories,
        };
    }

    pub fn next_category(&mut self) {
        let len = self.classification.tables.len();
        if len == 0 {
            return;
        }
        let i = self.category_state.selected().map_or(0, |i| (i + 1) % len);
        self.category_state.select(Some(i));
        self.reset_record_selection();
    }

    pub fn previous_category(&mut self) {
        let len = self.classification.tables.len();
        if len == 0 {
            return;
        }
        let i = match self.category_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.category_state.select(Some(i));
        self.reset_record_selection();
    }

    pub fn next(&mut self) {
        let len = self.record_count();
        if len == 0 {
            return;
        }
        let i = match self.record_state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.record_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.record_count();
        if len == 0 {
            return;
        }
        let i = match self.record_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.record_state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.record_count();
        if len == 0 {
            return;
        }
        let i = self.record_state.selected().map_or(0, |i| (i + PAGE).min(len - 1));
        self.record_state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.record_count() == 0 {
            return;
        }
        let i = self.record_state.selected().map_or(0, |i| i.saturating_sub(PAGE));
        self.record_state.select(Some(i));
    }

    /// Reclassify with a new threshold, keeping the selected category.
    pub fn set_min_balance(&mut self, min_balance: u64) {
        if min_balance == self.min_balance() {
            return;
        }
        self.classification = classify(&self.dataset.exposures, &self.engine, min_balance);
        self.reset_record_selection();
        self.message = None;
    }

    pub fn increase_threshold(&mut self) {
        self.set_min_balance(self.min_balance().saturating_add(1));
    }

    pub fn decrease_threshold(&mut self) {
        self.set_min_balance(self.min_balance().saturating_sub(1));
    }

    /// Write every category to the output workbook.
    pub fn export(&mut self) -> Result<()> {
        match save_workbook(&self.classification, &self.output) {
            Ok(bytes) => {
                self.message = Some(format!("Saved {} ({} bytes)", self.output.display(), bytes));
                Ok(())
            }
            Err(e) => {
                self.message = Some(format!("Export failed: {}", e));
                Err(e.into())
            }
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => app.toggle_focus(),
                KeyCode::Char('+') | KeyCode::Char('=') => app.increase_threshold(),
                KeyCode::Char('-') => app.decrease_threshold(),
                KeyCode::Char('d') => {
                    // failure is reported in the status bar
                    let _ = app.export();
                }
                KeyCode::Left | KeyCode::Char('h') => app.previous_category(),
                KeyCode::Right | KeyCode::Char('l') => app.next_category(),
                KeyCode::Down | KeyCode::Char('j') => match app.focus {
                    Focus::Categories => app.next_category(),
                    Focus::Records => app.next(),
                },
                KeyCode::Up | KeyCode::Char('k') => match app.focus {
                    Focus::Categories => app.previous_category(),
                    Focus::Records => app.previous(),
                },
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.reset_record_selection(),
                KeyCode::End => {
                    let len = app.record_count();
                    if len > 0 {
                        app.record_state.select(Some(len - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(0)])
        .split(chunks[1]);

    render_categories(f, content[0], app);

    if app.show_detail {
        let detail = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(content[1]);
        render_table(f, detail[0], app);
        render_detail_panel(f, detail[1], app);
    } else {
        render_table(f, content[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let spans = vec![
        Span::styled(
            "Exposures to BoG",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(app.dataset.file_name.clone(), Style::default().fg(Color::White)),
        Span::raw("  |  "),
        Span::styled(
            format!("Records: {}", app.dataset.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Minimum CRNT_BAL > {}", app.min_balance()),
            Style::default().fg(Color::Green),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_categories(f: &mut Frame, area: Rect, app: &mut App) {
    let items: Vec<ListItem> = app
        .classification
        .tables
        .iter()
        .map(|table| {
            let count_color = if table.is_empty() { Color::DarkGray } else { Color::Green };
            ListItem::new(Line::from(vec![
                Span::raw(truncate(&table.name, 22)),
                Span::raw(" "),
                Span::styled(format!("(n={})", table.len()), Style::default().fg(count_color)),
            ]))
        })
        .collect();

    let border = if app.focus == Focus::Categories { Color::Yellow } else { Color::White };
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(" Categories "),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(list, area, &mut app.category_state);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = Column::ALL.iter().map(|c| {
        Cell::from(c.header()).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let (title, rows): (String, Vec<Row>) = match app.selected_table() {
        Some(table) => (
            format!(" {} (n={}) ", table.name, table.len()),
            table
                .rows
                .iter()
                .map(|row| {
                    let cells = Column::ALL.iter().map(|c| {
                        let text = row.cell(*c).to_string();
                        match c {
                            Column::CustomerName => Cell::from(truncate(&text, 30)),
                            Column::TypeOfExposure => Cell::from(text).style(Style::default().fg(Color::Cyan)),
                            _ => Cell::from(text),
                        }
                    });
                    Row::new(cells).height(1)
                })
                .collect(),
        ),
        None => (" No category ".to_string(), Vec::new()),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Length(32),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(17),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if app.focus == Focus::Records { Color::Yellow } else { Color::White }))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.record_state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Exposure Details ");

    let Some(row) = app.selected_record() else {
        f.render_widget(Paragraph::new("No record selected").block(block), area);
        return;
    };

    let mut content = vec![Line::from("")];
    for column in Column::ALL {
        content.push(Line::from(vec![
            Span::styled(
                format!("  {}: ", column.header()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(row.cell(column).to_string()),
        ]));
    }
    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.record_state.selected().map(|i| i + 1).unwrap_or(0);

    let mut spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.record_count()),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(message.clone(), Style::default().fg(Color::Green)));
    }

    for (key, label, color) in [
        ("←/→", " Category", Color::Yellow),
        ("Tab", " Focus", Color::Yellow),
        ("+/-", " Threshold", Color::Yellow),
        ("Enter", " Details", Color::Yellow),
        ("d", " Download", Color::Yellow),
        ("q", " Quit", Color::Red),
    ] {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(key, Style::default().fg(color)));
        spans.push(Span::raw(label));
    }

    let status_bar = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
