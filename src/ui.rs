use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use omnicard::{CardRecord, CatalogStore, CategoryFilter, Command, QuerySession, ViewMode};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

const PAGE_SIZE: usize = 20;
const PROMPT_PLACEHOLDER: &str = "e.g., \"I am a student and I dont have a ssn\"";

/// Which text box receives typed characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFocus {
    IntentPrompt,
    TextTerm,
    None,
}

pub struct App {
    pub catalog: CatalogStore,
    pub session: QuerySession,
    pub filtered_cards: Vec<CardRecord>,
    pub state: TableState,
    pub show_detail: bool,
    pub prompt: String,
    pub term_input: String,
    pub focus: InputFocus,
    pub summary_length: usize,
    categories: Vec<CategoryFilter>,
}

impl App {
    pub fn new(catalog: CatalogStore, session: QuerySession, summary_length: usize) -> Self {
        let mut categories = vec![CategoryFilter::All];
        categories.extend(catalog.reward_types().into_iter().map(CategoryFilter::Named));

        let mut app = Self {
            catalog,
            session,
            filtered_cards: Vec::new(),
            state: TableState::default(),
            show_detail: false,
            prompt: String::new(),
            term_input: String::new(),
            focus: InputFocus::IntentPrompt,
            summary_length,
            categories,
        };
        app.refresh();
        app
    }

    /// Run a session command, then recompute the visible cards
    pub fn dispatch(&mut self, command: Command) {
        self.session.apply(command);
        self.focus = match self.session.mode() {
            ViewMode::IntentEntry => InputFocus::IntentPrompt,
            ViewMode::Results => InputFocus::None,
        };
        self.refresh();
    }

    fn refresh(&mut self) {
        self.filtered_cards = self
            .session
            .results(&self.catalog)
            .into_iter()
            .cloned()
            .collect();

        // Reset selection to first item
        if !self.filtered_cards.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn selected_card(&self) -> Option<&CardRecord> {
        self.state.selected().and_then(|i| self.filtered_cards.get(i))
    }

    pub fn toggle_zero_fee(&mut self) {
        let spec = self.session.spec().clone();
        let zero_fee_only = !spec.zero_fee_only;
        self.dispatch(Command::EditStructuredFilter(spec.with_zero_fee_only(zero_fee_only)));
    }

    /// Step through "All" and the catalog's reward types
    pub fn cycle_category(&mut self) {
        let spec = self.session.spec().clone();
        let position = self.categories.iter().position(|c| *c == spec.category);
        let next = match position {
            Some(i) => self.categories[(i + 1) % self.categories.len()].clone(),
            None => CategoryFilter::All,
        };
        self.dispatch(Command::EditStructuredFilter(spec.with_category(next)));
    }

    pub fn begin_term_edit(&mut self) {
        self.term_input = self.session.spec().text_term.clone();
        self.focus = InputFocus::TextTerm;
    }

    pub fn commit_term_edit(&mut self) {
        let spec = self.session.spec().clone().with_text_term(self.term_input.clone());
        self.dispatch(Command::EditStructuredFilter(spec));
    }

    /// Handle one key press. Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        match self.focus {
            InputFocus::IntentPrompt => self.handle_prompt_key(key),
            InputFocus::TextTerm => {
                self.handle_term_key(key);
                false
            }
            InputFocus::None => self.handle_results_key(key),
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Enter => {
                let query = self.prompt.clone();
                self.dispatch(Command::SubmitIntentQuery(query));
            }
            KeyCode::Tab => self.dispatch(Command::ToggleMode),
            KeyCode::Backspace => {
                self.prompt.pop();
            }
            KeyCode::Char(c) => self.prompt.push(c),
            _ => {}
        }
        false
    }

    fn handle_term_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.focus = InputFocus::None,
            KeyCode::Enter => self.commit_term_edit(),
            KeyCode::Backspace => {
                self.term_input.pop();
            }
            KeyCode::Char(c) => self.term_input.push(c),
            _ => {}
        }
    }

    fn handle_results_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Enter => self.show_detail = !self.show_detail,
            KeyCode::Tab | KeyCode::Char('b') => self.dispatch(Command::ToggleMode),
            KeyCode::Char('/') => self.begin_term_edit(),
            KeyCode::Char('f') => self.toggle_zero_fee(),
            KeyCode::Char('c') => self.cycle_category(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::Home => {
                if !self.filtered_cards.is_empty() {
                    self.state.select(Some(0));
                }
            }
            KeyCode::End => {
                if !self.filtered_cards.is_empty() {
                    self.state.select(Some(self.filtered_cards.len() - 1));
                }
            }
            _ => {}
        }
        false
    }

    pub fn next(&mut self) {
        let len = self.filtered_cards.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.filtered_cards.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.filtered_cards.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + PAGE_SIZE).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.filtered_cards.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(PAGE_SIZE));
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Brand header
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.session.mode() {
        ViewMode::IntentEntry => render_prompt(f, chunks[1], app),
        ViewMode::Results if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(60), // Card list
                    Constraint::Percentage(40), // Detail panel
                ])
                .split(chunks[1]);

            render_table(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        ViewMode::Results => render_table(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled("💳 ", Style::default()),
        Span::styled(
            "OmniCard",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" View"),
        Span::raw("  |  "),
        Span::styled(
            format!("Catalog: {} cards", app.catalog.len()),
            Style::default().fg(Color::White),
        ),
    ];

    if app.session.mode() == ViewMode::Results {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("{} matching", app.filtered_cards.len()),
            Style::default().fg(Color::Green),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_prompt(f: &mut Frame, area: Rect, app: &App) {
    let input = if app.prompt.is_empty() {
        Span::styled(
            PROMPT_PLACEHOLDER,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )
    } else {
        Span::styled(format!("{}▏", app.prompt), Style::default().fg(Color::White))
    };

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Find Your Perfect Credit Card",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "The AI Way",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![Span::styled("> ", Style::default().fg(Color::Yellow)), input]),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "Describe your situation and filter {} cards instantly.",
                app.catalog.len()
            ),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(content)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Match My Cards "),
        );

    f.render_widget(paragraph, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Institution", "Product", "Reward", "Annual Fee"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.filtered_cards.iter().map(|card| {
        let fee_color = if omnicard::matcher::is_zero_fee(card.annual_fee_raw()) {
            Color::Green
        } else {
            Color::White
        };

        let cells = vec![
            Cell::from(truncate(card.institution(), 24)),
            Cell::from(truncate(card.product(), 36)),
            Cell::from(card.reward_type_label().to_string()).style(Style::default().fg(Color::Cyan)),
            Cell::from(card.fee_display().to_string()).style(Style::default().fg(fee_color)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(26),
            Constraint::Length(38),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Top Recommendations ({} matching) ", app.filtered_cards.len())),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let status_spans = match (app.session.mode(), app.focus) {
        (ViewMode::IntentEntry, _) => vec![
            key("Enter"),
            Span::raw(" Match | "),
            key("Tab"),
            Span::raw(" Results | "),
            Span::styled("Esc", Style::default().fg(Color::Red)),
            Span::raw(" Quit"),
        ],
        (ViewMode::Results, InputFocus::TextTerm) => vec![
            Span::styled(" Search: ", Style::default().fg(Color::Cyan)),
            Span::styled(format!("{}▏", app.term_input), Style::default().fg(Color::White)),
            Span::raw(" | "),
            key("Enter"),
            Span::raw(" Apply | "),
            key("Esc"),
            Span::raw(" Cancel"),
        ],
        (ViewMode::Results, _) => {
            let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
            vec![
                Span::styled(
                    format!(" Card: {}/{} ", selected, app.filtered_cards.len()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw("| "),
                Span::styled(
                    format!("Filter: {}", app.session.spec().summary()),
                    Style::default().fg(Color::Green),
                ),
                Span::raw(" | "),
                key("/"),
                Span::raw(" Search | "),
                key("c"),
                Span::raw(" Category | "),
                key("f"),
                Span::raw(" No fee | "),
                key("Enter"),
                Span::raw(" Details | "),
                key("b"),
                Span::raw(" Back | "),
                Span::styled("q", Style::default().fg(Color::Red)),
                Span::raw(" Quit"),
            ]
        }
    };

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Card Details ");

    let card = match app.selected_card() {
        Some(c) => c,
        None => {
            f.render_widget(Paragraph::new("No card selected").block(block), area);
            return;
        }
    };

    let label = |text: &'static str| {
        Span::styled(text, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    };
    let flag = |value: Option<bool>| match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    };

    let content = vec![
        Line::from(""),
        Line::from(vec![label("  Institution: "), Span::raw(card.institution())]),
        Line::from(""),
        Line::from(vec![label("  Product: "), Span::raw(card.product())]),
        Line::from(""),
        Line::from(vec![
            label("  Reward: "),
            Span::styled(card.reward_type_label(), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
        Line::from(vec![
            label("  Annual Fee: "),
            Span::styled(card.fee_display(), Style::default().fg(Color::Green)),
        ]),
        Line::from(""),
        Line::from(vec![label("  Student card: "), Span::raw(flag(card.is_student))]),
        Line::from(vec![label("  Accepts ITIN: "), Span::raw(flag(card.accepts_itin))]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(Span::styled(
            "  REWARDS",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", card.rewards_summary(app.summary_length)),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
        Line::from(vec![label("  Apply: "), Span::styled(card.apply_url(), Style::default().fg(Color::Green))]),
        Line::from(""),
        Line::from(Span::styled(
            "  Press Enter to close",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
    ];

    let detail_panel = Paragraph::new(content)
        .wrap(Wrap { trim: false })
        .block(block);

    f.render_widget(detail_panel, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(press(KeyCode::Char(c)));
        }
    }

    fn test_app() -> App {
        let card = |institution: &str, product: &str, reward: &str, fee: &str| CardRecord {
            institution_name: Some(institution.to_string()),
            product_name: Some(product.to_string()),
            reward_type: Some(reward.to_string()),
            annual_fee: Some(fee.to_string()),
            ..Default::default()
        };
        let catalog = CatalogStore::from_records(vec![
            card("Chase", "Sapphire Preferred", "Travel", "$95"),
            card("Discover", "it Student Cash Back", "Cashback", "$0"),
            card("Capital One", "VentureOne", "Travel", "$0"),
        ]);
        App::new(catalog, QuerySession::default(), 100)
    }

    #[test]
    fn test_submit_prompt_shows_results() {
        let mut app = test_app();
        assert_eq!(app.focus, InputFocus::IntentPrompt);

        type_text(&mut app, "travel");
        assert!(!app.handle_key(press(KeyCode::Enter)));

        assert_eq!(app.session.mode(), ViewMode::Results);
        assert_eq!(app.focus, InputFocus::None);
        assert_eq!(app.filtered_cards.len(), 2);
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_structured_keys_edit_filter() {
        let mut app = test_app();
        app.handle_key(press(KeyCode::Enter));
        assert_eq!(app.filtered_cards.len(), 3);

        app.handle_key(press(KeyCode::Char('f')));
        assert!(app.session.spec().zero_fee_only);
        assert_eq!(app.filtered_cards.len(), 2);

        // All -> Cashback
        app.handle_key(press(KeyCode::Char('c')));
        assert_eq!(app.session.spec().category, CategoryFilter::Named("Cashback".to_string()));
        assert_eq!(app.filtered_cards.len(), 1);
    }

    #[test]
    fn test_term_edit() {
        let mut app = test_app();
        app.handle_key(press(KeyCode::Enter));

        app.handle_key(press(KeyCode::Char('/')));
        assert_eq!(app.focus, InputFocus::TextTerm);
        type_text(&mut app, "chase");
        app.handle_key(press(KeyCode::Enter));

        assert_eq!(app.session.spec().text_term, "chase");
        assert_eq!(app.filtered_cards.len(), 1);
        assert_eq!(app.focus, InputFocus::None);
    }

    #[test]
    fn test_back_returns_to_prompt() {
        let mut app = test_app();
        type_text(&mut app, "student");
        app.handle_key(press(KeyCode::Enter));

        app.handle_key(press(KeyCode::Char('b')));
        assert_eq!(app.session.mode(), ViewMode::IntentEntry);
        assert_eq!(app.prompt, "student");

        assert!(app.handle_key(press(KeyCode::Esc)));
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = test_app();
        app.handle_key(press(KeyCode::Enter));

        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(2));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Sapphire", 20), "Sapphire");
        assert_eq!(truncate("Café Rewards Card", 8), "Café ...");
    }
}
