use anyhow::{Context, Result};
use cashback_ranker::{format_percent, RankedEntry, Ranking, SpendChannel, TierKind};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Recommendation,
    Comparison,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Recommendation => Page::Comparison,
            Page::Comparison => Page::Recommendation,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Recommendation => "Recommendation",
            Page::Comparison => "Full Comparison",
        }
    }
}

pub struct App {
    pub ranking: Ranking,
    pub channel: SpendChannel,
    pub category: String,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
}

impl App {
    pub fn new(ranking: Ranking, channel: SpendChannel, category: String) -> Self {
        let mut state = TableState::default();
        state.select(Some(0));

        Self {
            ranking,
            channel,
            category,
            state,
            current_page: Page::Recommendation,
            show_detail: false,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn selected_entry(&self) -> Option<&RankedEntry> {
        self.state.selected().and_then(|i| self.ranking.entries.get(i))
    }

    pub fn next(&mut self) {
        let len = self.ranking.entries.len();
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
        let len = self.ranking.entries.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
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

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    finish_session(res)
}

/// Surface the event loop's result once the terminal is restored
fn finish_session(res: io::Result<()>) -> Result<()> {
    res.context("TUI event loop failed")
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => app.state.select(Some(0)),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Recommendation => render_recommendation(f, chunks[1], app),
        Page::Comparison if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            render_table(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        Page::Comparison => render_table(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Recommendation, Page::Comparison].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Merchant: {}", app.ranking.merchant),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Amount: {}", app.ranking.amount),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("{} / {}", app.channel, app.category),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_recommendation(f: &mut Frame, area: Rect, app: &App) {
    let best = &app.ranking.best;

    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("✅ Recommended card: ", Style::default().fg(Color::Green)),
            Span::styled(
                format!("{} {}", best.bank, best.display_name),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::raw("   Estimated reward: "),
            Span::styled(
                best.reward_amount.to_string(),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  ({})", format_percent(best.rate_percent))),
        ]),
        Line::from(""),
        Line::from(format!("   {}", best.explanation())),
        Line::from(""),
        Line::from(Span::styled(
            format!("   Compared {} cards. Press Tab for the full comparison.", app.ranking.len()),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Recommendation "));

    f.render_widget(panel, area);
}

fn tier_color(tier: TierKind) -> Color {
    match tier {
        TierKind::SpecialMatch => Color::Green,
        TierKind::Extension => Color::Magenta,
        TierKind::GeneralFallback => Color::White,
        TierKind::CardDefault => Color::Cyan,
        TierKind::NoRule => Color::DarkGray,
    }
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["#", "Bank", "Card", "Rate", "Reward", "Rule"]
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

    let rows = app.ranking.entries.iter().map(|entry| {
        let color = tier_color(entry.tier);

        let cells = vec![
            Cell::from(entry.rank.to_string()),
            Cell::from(truncate(&entry.bank, 12)),
            Cell::from(truncate(&entry.display_name, 18)),
            Cell::from(format_percent(entry.rate_percent)).style(Style::default().fg(color)),
            Cell::from(entry.reward_amount.to_string()).style(Style::default().fg(color)),
            Cell::from(truncate(&entry.description, 40)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(14),
            Constraint::Length(20),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Full Comparison "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let lines = match app.selected_entry() {
        Some(entry) => vec![
            Line::from(vec![
                Span::styled("Card: ", Style::default().fg(Color::Yellow)),
                Span::raw(format!("{} ({})", entry.display_name, entry.card_id)),
            ]),
            Line::from(vec![
                Span::styled("Bank: ", Style::default().fg(Color::Yellow)),
                Span::raw(entry.bank.clone()),
            ]),
            Line::from(vec![
                Span::styled("Tier: ", Style::default().fg(Color::Yellow)),
                Span::styled(entry.tier.as_str(), Style::default().fg(tier_color(entry.tier))),
            ]),
            Line::from(vec![
                Span::styled("Rate: ", Style::default().fg(Color::Yellow)),
                Span::raw(format_percent(entry.rate_percent)),
            ]),
            Line::from(vec![
                Span::styled("Reward: ", Style::default().fg(Color::Yellow)),
                Span::raw(entry.reward_amount.to_string()),
            ]),
            Line::from(""),
            Line::from(Span::styled("Rule:", Style::default().fg(Color::Yellow))),
            Line::from(entry.description.clone()),
        ],
        None => vec![Line::from("No card selected")],
    };

    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Details "));

    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, app.ranking.len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Details | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

// Char-based so CJK names are never split mid-character
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashback_ranker::{Catalog, RewardRanker, TransactionContext};
    use rust_decimal::Decimal;

    fn demo_app() -> App {
        let catalog = Catalog::demo().unwrap();
        let ctx = TransactionContext::new("YouTube", SpendChannel::Online, "online_digital");
        let ranking = catalog
            .rank::<&str>(&RewardRanker::new(), None, &ctx, Decimal::from(1000))
            .unwrap();
        App::new(ranking, SpendChannel::Online, "online_digital".to_string())
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = demo_app();
        assert_eq!(app.selected_entry().unwrap().rank, 1);

        app.previous();
        assert_eq!(app.selected_entry().unwrap().rank, 5);

        app.next();
        assert_eq!(app.selected_entry().unwrap().rank, 1);
    }

    #[test]
    fn test_page_toggle() {
        let mut app = demo_app();
        assert_eq!(app.current_page, Page::Recommendation);
        app.next_page();
        assert_eq!(app.current_page, Page::Comparison);
        app.next_page();
        assert_eq!(app.current_page, Page::Recommendation);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("國泰世華銀行信用卡", 6), "國泰世...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_event_loop_error_is_returned() {
        assert!(finish_session(Ok(())).is_ok());

        let err = finish_session(Err(io::Error::new(io::ErrorKind::Other, "terminal gone"))).unwrap_err();
        assert!(format!("{:#}", err).contains("terminal gone"));
    }
}
