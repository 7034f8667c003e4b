use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use expense_ledger::{ExpenseCategory, ExpenseStore, GroupedView, KeyValueStore};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Category,
    Amount,
    Date,
}

impl Field {
    pub fn next(&self) -> Self {
        match self {
            Field::Category => Field::Amount,
            Field::Amount => Field::Date,
            Field::Date => Field::Category,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Field::Category => Field::Date,
            Field::Amount => Field::Category,
            Field::Date => Field::Amount,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Field::Category => "Category",
            Field::Amount => "Amount",
            Field::Date => "Date (UTC)",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Success(String),
    Error(String),
}

/// Form state is plain fields; only the store is domain state.
pub struct App<S: KeyValueStore> {
    pub store: ExpenseStore<S>,
    pub focus: Field,
    /// None until the user picks one
    pub category: Option<ExpenseCategory>,
    pub amount: String,
    pub date: String,
    pub status: Status,
    pub view: GroupedView,
    pub table_state: TableState,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(store: ExpenseStore<S>) -> Self {
        let view = store.grouped();
        let status = if let Some(err) = store.load_error() {
            Status::Error(format!(
                "Saved history could not be read ({err}); new expenses stay in memory (Ctrl-S to retry)"
            ))
        } else if store.needs_sync() {
            Status::Error("storage out of sync (Ctrl-S to retry)".to_string())
        } else {
            Status::Info(format!("{} expenses loaded", store.len()))
        };

        Self {
            store,
            focus: Field::Category,
            category: None,
            amount: String::new(),
            date: today(),
            status,
            view,
            table_state: TableState::default(),
        }
    }

    pub fn selected_category(&self) -> Option<ExpenseCategory> {
        self.category
    }

    pub fn next_category(&mut self) {
        let all = ExpenseCategory::ALL;
        let i = match self.category {
            Some(c) => (c.index() + 1) % all.len(),
            None => 0,
        };
        self.category = Some(all[i]);
    }

    pub fn previous_category(&mut self) {
        let all = ExpenseCategory::ALL;
        let i = match self.category.map(|c| c.index()) {
            Some(0) | None => all.len() - 1,
            Some(i) => i - 1,
        };
        self.category = Some(all[i]);
    }

    pub fn submit(&mut self) {
        let category = self.selected_category();
        match self.store.add(category, &self.amount, &self.date) {
            Ok(record) => {
                let added = format!(
                    "Added {} {:.2} on {}",
                    record.category,
                    record.amount,
                    record.calendar_date().format("%Y-%m-%d")
                );
                self.status = match self.store.last_persist_error() {
                    Some(err) => Status::Error(format!("{added}, but saving failed: {err} (Ctrl-S to retry)")),
                    None => Status::Success(added),
                };
                self.amount.clear();
                self.category = None;
                self.focus = Field::Category;
                self.refresh();
            }
            Err(err) => {
                self.status = Status::Error(err.to_string());
                self.focus = match err.field() {
                    "category" => Field::Category,
                    "amount" => Field::Amount,
                    _ => Field::Date,
                };
            }
        }
    }

    pub fn clear_history(&mut self) {
        self.status = match self.store.clear() {
            Ok(()) => Status::Success("All expenses cleared".to_string()),
            Err(err) => Status::Error(format!("Cleared, but storage failed: {err:#} (Ctrl-S to retry)")),
        };
        self.refresh();
    }

    pub fn retry_sync(&mut self) {
        if !self.store.needs_sync() {
            self.status = Status::Info("Storage already in sync".to_string());
            return;
        }
        self.status = match self.store.sync() {
            Ok(()) => Status::Success("Saved".to_string()),
            Err(err) => Status::Error(format!("Save failed again: {err:#}")),
        };
    }

    fn refresh(&mut self) {
        self.view = self.store.grouped();
        self.table_state.select(None);
    }

    fn row_count(&self) -> usize {
        self.view
            .groups
            .iter()
            .map(|g| g.categories.len() + 1)
            .sum()
    }

    pub fn scroll_down(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) => (i + 10).min(len - 1),
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn scroll_up(&mut self) {
        let i = match self.table_state.selected() {
            Some(i) => i.saturating_sub(10),
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    /// Apply one key press. Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Char('c') if ctrl => return true,
            KeyCode::Char('l') if ctrl => self.clear_history(),
            KeyCode::Char('s') if ctrl => self.retry_sync(),
            KeyCode::Char('t') if ctrl => self.date = today(),
            KeyCode::Enter => self.submit(),
            KeyCode::BackTab => self.focus = self.focus.previous(),
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.focus = self.focus.previous();
                } else {
                    self.focus = self.focus.next();
                }
            }
            KeyCode::Down => self.focus = self.focus.next(),
            KeyCode::Up => self.focus = self.focus.previous(),
            KeyCode::PageDown => self.scroll_down(),
            KeyCode::PageUp => self.scroll_up(),
            KeyCode::Right if self.focus == Field::Category => self.next_category(),
            KeyCode::Left if self.focus == Field::Category => self.previous_category(),
            KeyCode::Char(' ') if self.focus == Field::Category => self.next_category(),
            KeyCode::Char(c) if !ctrl => match self.focus {
                Field::Amount => self.amount.push(c),
                Field::Date => self.date.push(c),
                Field::Category => {}
            },
            KeyCode::Backspace => match self.focus {
                Field::Amount => {
                    self.amount.pop();
                }
                Field::Date => {
                    self.date.pop();
                }
                Field::Category => self.category = None,
            },
            _ => {}
        }

        false
    }
}

/// Records group by UTC calendar date, so the prefill uses the UTC day too
fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn run_ui<S: KeyValueStore>(app: &mut App<S>) -> Result<()> {
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

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal form exited with error");
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui<S: KeyValueStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Form + grouped view
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    render_form(f, content_chunks[0], app);
    render_grouped(f, content_chunks[1], app);

    render_status_bar(f, chunks[2], app);
}

fn render_header<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let mut spans = vec![
        Span::styled(
            "Expense Ledger",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Records: {}", app.store.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Total: {:.2}", app.view.grand_total()),
            Style::default().fg(Color::Red),
        ),
    ];

    if app.store.needs_sync() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            "UNSAVED",
            Style::default().fg(Color::Black).bg(Color::Red),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn field_line<'a>(field: Field, focused: bool, value: String) -> Line<'a> {
    let label_style = if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let marker = if focused { "→ " } else { "  " };

    Line::from(vec![
        Span::styled(format!("{}{:<10}", marker, field.title()), label_style),
        Span::styled(value, Style::default().fg(Color::White)),
    ])
}

fn render_form<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let category = match app.selected_category() {
        Some(c) => format!("◀ {} ▶", c),
        None => "◀ (select) ▶".to_string(),
    };
    let cursor = |field: Field| if app.focus == field { "_" } else { "" };

    let status = match &app.status {
        Status::Info(msg) => Span::styled(msg.clone(), Style::default().fg(Color::Cyan)),
        Status::Success(msg) => Span::styled(msg.clone(), Style::default().fg(Color::Green)),
        Status::Error(msg) => Span::styled(msg.clone(), Style::default().fg(Color::Red)),
    };

    let lines = vec![
        Line::from(""),
        field_line(Field::Category, app.focus == Field::Category, category),
        Line::from(""),
        field_line(
            Field::Amount,
            app.focus == Field::Amount,
            format!("{}{}", app.amount, cursor(Field::Amount)),
        ),
        Line::from(""),
        field_line(
            Field::Date,
            app.focus == Field::Date,
            format!("{}{}", app.date, cursor(Field::Date)),
        ),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" Add expense"),
        ]),
        Line::from(""),
        Line::from(status),
    ];

    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" New Expense "),
    );

    f.render_widget(form, area);
}

fn render_grouped<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(" Expenses by Date ");

    if app.view.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "No expenses recorded",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let mut rows = Vec::new();
    for group in &app.view.groups {
        rows.push(
            Row::new(vec![
                Cell::from(group.label()),
                Cell::from(format!("{:.2}", group.total())),
            ])
            .style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
        );
        for total in &group.categories {
            rows.push(Row::new(vec![
                Cell::from(format!("  {}", total.category)),
                Cell::from(format!("{:.2}", total.total)).style(Style::default().fg(Color::Red)),
            ]));
        }
    }

    let header = Row::new(vec![
        Cell::from("Date / Category"),
        Cell::from("Amount"),
    ])
    .style(
        Style::default()
            .fg(Color::Yellow)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    let table = Table::new(rows, [Constraint::Length(20), Constraint::Length(14)])
        .header(header)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_status_bar<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let mut status_spans = vec![
        Span::styled(
            format!(" {} ", app.focus.title()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Field | "),
        Span::styled("←/→", Style::default().fg(Color::Yellow)),
        Span::raw(" Category | "),
        Span::styled("Ctrl-T", Style::default().fg(Color::Yellow)),
        Span::raw(" Today | "),
        Span::styled("Ctrl-L", Style::default().fg(Color::Yellow)),
        Span::raw(" Clear all | "),
    ];

    if app.store.needs_sync() {
        status_spans.push(Span::styled("Ctrl-S", Style::default().fg(Color::Red)));
        status_spans.push(Span::raw(" Retry save | "));
    }

    status_spans.push(Span::styled("Esc", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
