//! Command Menu (TUI popup)
//!
//! Displays a selectable command list when the user types "/"

use ratatui::{
    crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use std::io;

/// Command menu item
#[derive(Debug, Clone, Copy)]
pub struct CommandItem {
    /// Command name
    pub name: &'static str,
    /// Description
    pub description: &'static str,
    /// Whether the prompt should leave room for an argument
    pub takes_argument: bool,
}

/// All available commands
pub const COMMANDS: &[CommandItem] = &[
    CommandItem {
        name: "/connect",
        description: "Connect to a database (empty opens the form)",
        takes_argument: true,
    },
    CommandItem {
        name: "/disconnect",
        description: "Close the current connection",
        takes_argument: false,
    },
    CommandItem {
        name: "/schema",
        description: "Show the schema given to the agent (--refresh re-scans)",
        takes_argument: false,
    },
    CommandItem {
        name: "/tables",
        description: "List tables (--all includes system catalogs)",
        takes_argument: false,
    },
    CommandItem {
        name: "/test",
        description: "Run a SQL statement through the safety checks",
        takes_argument: true,
    },
    CommandItem {
        name: "/logs",
        description: "Show recent query executions",
        takes_argument: false,
    },
    CommandItem {
        name: "/status",
        description: "Show configuration and connection status",
        takes_argument: false,
    },
    CommandItem {
        name: "/examples",
        description: "Show example questions",
        takes_argument: false,
    },
    CommandItem {
        name: "/clear",
        description: "Clear chat context",
        takes_argument: false,
    },
    CommandItem {
        name: "/help",
        description: "Show detailed help",
        takes_argument: false,
    },
    CommandItem {
        name: "/quit",
        description: "Exit",
        takes_argument: false,
    },
];

/// Result of running the command menu
pub enum MenuResult {
    /// User selected a command
    Command(CommandItem),
    /// User cancelled (ESC)
    Cancelled,
    /// User wants to type their own input
    TextInput,
}

/// Display the command menu and return selected command
pub fn show_command_menu() -> io::Result<MenuResult> {
    let mut state = ListState::default();
    state.select(Some(0));

    // Setup terminal
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(io::stdout(), EnableMouseCapture)?;

    let backend = ratatui::backend::CrosstermBackend::new(io::stdout());
    let result = ratatui::Terminal::new(backend)
        .and_then(|mut terminal| {
            let result = run_menu(&mut terminal, &mut state);
            terminal.clear()?;
            result
        });

    // Restore terminal
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(io::stdout(), DisableMouseCapture)?;

    result
}

fn run_menu(
    terminal: &mut ratatui::Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>,
    state: &mut ListState,
) -> io::Result<MenuResult> {
    loop {
        terminal.draw(|f| ui(f, state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    return Ok(MenuResult::Cancelled);
                }
                KeyCode::Enter => {
                    if let Some(item) = state.selected().and_then(|i| COMMANDS.get(i)) {
                        return Ok(MenuResult::Command(*item));
                    }
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    let selected = state.selected().unwrap_or(0);
                    if selected + 1 < COMMANDS.len() {
                        state.select(Some(selected + 1));
                    }
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    let selected = state.selected().unwrap_or(0);
                    state.select(Some(selected.saturating_sub(1)));
                }
                KeyCode::Char('/') => {
                    return Ok(MenuResult::TextInput);
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(5),    // command list
            Constraint::Length(3), // key help
        ])
        .split(f.area());

    let header = Paragraph::new(vec![Line::from(" SQL Agent Chat ")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .alignment(Alignment::Center);
    f.render_widget(header, chunks[0]);

    let items: Vec<ListItem> = COMMANDS
        .iter()
        .map(|cmd| ListItem::new(format!("  {:<14} {}", cmd.name, cmd.description)))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::REVERSED)
                .fg(Color::Black)
                .bg(Color::Cyan),
        );
    f.render_stateful_widget(list, chunks[1], state);

    let help = Paragraph::new(vec![Line::from(
        " ↑/k: Up  ↓/j: Down  Enter: Select  ESC/q: Cancel  /: Type command ",
    )
    .style(Style::default().fg(Color::Gray))])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(help, chunks[2]);
}
