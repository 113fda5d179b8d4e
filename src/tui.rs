// stterm - terminal console for the SmartThings API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Full-screen console: a screen menu, and one list/detail screen per
//! resource kind driven by a [`Controller`].

use crate::controller::{Controller, ControllerOptions};
use crate::platform::PlatformClient;
use crate::report::Severity;
use crate::resource::{Remote, ResourceKind};
use crate::rules::Rules;
use crate::schedules::Schedules;
use anyhow::{Context, Result};
use clap::ValueEnum;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use tracing::{debug, info};

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const KEY_HINTS: &str = "F2 import  F3 edit  F4 save  F5 refresh  F6 copy  F9 delete  Home back  q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScreenChoice {
    Rules,
    Schedules,
}

impl ScreenChoice {
    const ALL: [ScreenChoice; 2] = [ScreenChoice::Rules, ScreenChoice::Schedules];

    fn title(self) -> &'static str {
        match self {
            Self::Rules => Rules::TITLE,
            Self::Schedules => Schedules::TITLE,
        }
    }
}

/// Per-kind controller settings the screens are opened with.
#[derive(Debug, Clone)]
pub struct ScreenOptions {
    pub rules: ControllerOptions,
    pub schedules: ControllerOptions,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            rules: ControllerOptions::for_kind::<Rules>(),
            schedules: ControllerOptions::for_kind::<Schedules>(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScreenAction {
    Stay,
    Back,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    List,
    Detail,
}

struct Screen<K: ResourceKind, R: Remote<K>> {
    controller: Controller<K, R>,
    cursor: usize,
    focus: Focus,
}

enum ActiveScreen {
    Menu { selected: usize },
    Rules(Screen<Rules, PlatformClient>),
    Schedules(Screen<Schedules, PlatformClient>),
}

pub struct App {
    platform: PlatformClient,
    options: ScreenOptions,
    screen: ActiveScreen,
    quit: bool,
}

pub fn run(platform: PlatformClient, options: ScreenOptions, start: Option<ScreenChoice>) -> Result<()> {
    let mut terminal = init_terminal()?;
    let mut app = App::new(platform, options);
    if let Some(choice) = start {
        app.open(choice);
    }
    let result = event_loop(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result
}

fn init_terminal() -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

fn event_loop(terminal: &mut TuiTerminal, app: &mut App) -> Result<()> {
    while !app.should_quit() {
        terminal
            .draw(|frame| draw(frame, app))
            .context("failed to draw frame")?;
        if let Event::Key(key) = event::read().context("failed to read terminal event")?
            && key.kind == KeyEventKind::Press
        {
            app.handle_key(key);
        }
    }
    Ok(())
}

impl App {
    pub fn new(platform: PlatformClient, options: ScreenOptions) -> Self {
        Self {
            platform,
            options,
            screen: ActiveScreen::Menu { selected: 0 },
            quit: false,
        }
    }

    /// Enters a resource screen; the previous screen and its catalog are
    /// dropped.
    pub fn open(&mut self, choice: ScreenChoice) {
        info!(screen = choice.title(), "opening screen");
        self.screen = match choice {
            ScreenChoice::Rules => ActiveScreen::Rules(Screen::open(Controller::new(
                self.platform.clone(),
                self.options.rules.clone(),
            ))),
            ScreenChoice::Schedules => ActiveScreen::Schedules(Screen::open(Controller::new(
                self.platform.clone(),
                self.options.schedules.clone(),
            ))),
        };
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }

        if let ActiveScreen::Menu { selected } = &mut self.screen {
            let mut chosen = None;
            match key.code {
                KeyCode::Up => *selected = selected.saturating_sub(1),
                KeyCode::Down => *selected = (*selected + 1).min(ScreenChoice::ALL.len() - 1),
                KeyCode::Enter => chosen = Some(ScreenChoice::ALL[*selected]),
                KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
                _ => {}
            }
            if let Some(choice) = chosen {
                self.open(choice);
            }
            return;
        }

        let (action, current) = match &mut self.screen {
            ActiveScreen::Menu { .. } => return,
            ActiveScreen::Rules(screen) => (screen.handle_key(key), ScreenChoice::Rules),
            ActiveScreen::Schedules(screen) => (screen.handle_key(key), ScreenChoice::Schedules),
        };

        match action {
            ScreenAction::Stay => {}
            ScreenAction::Back => {
                debug!(screen = current.title(), "back to menu");
                let selected = ScreenChoice::ALL
                    .iter()
                    .position(|choice| *choice == current)
                    .unwrap_or(0);
                self.screen = ActiveScreen::Menu { selected };
            }
            ScreenAction::Quit => self.quit = true,
        }
    }
}

impl<K: ResourceKind, R: Remote<K>> Screen<K, R> {
    fn open(mut controller: Controller<K, R>) -> Self {
        if controller.setup() {
            controller.select_index(0);
        }
        Self {
            controller,
            cursor: 0,
            focus: Focus::List,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        if self.controller.editor().is_editing() {
            self.handle_edit_key(key);
            self.sync_cursor();
            return ScreenAction::Stay;
        }
        if self.controller.import().is_open() && self.handle_import_key(key) {
            self.sync_cursor();
            return ScreenAction::Stay;
        }

        match key.code {
            KeyCode::F(2) => {
                self.controller.toggle_import();
            }
            KeyCode::F(3) => {
                self.controller.edit();
                self.focus = Focus::Detail;
            }
            KeyCode::F(4) => {
                self.controller.save(false);
            }
            KeyCode::F(5) => {
                self.controller.refresh();
            }
            KeyCode::F(6) => {
                self.controller.save(true);
            }
            KeyCode::F(9) => {
                self.controller.delete();
            }
            KeyCode::Home | KeyCode::Esc => return ScreenAction::Back,
            KeyCode::Char('q') => return ScreenAction::Quit,
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            KeyCode::Enter => {
                self.controller.select_index(self.cursor);
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::List => Focus::Detail,
                    Focus::Detail => Focus::List,
                };
            }
            _ => {}
        }
        self.sync_cursor();
        ScreenAction::Stay
    }

    /// Keys consumed by the open import overlay.
    fn handle_import_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => self.controller.import_mut().select_previous(),
            KeyCode::Down => self.controller.import_mut().select_next(),
            KeyCode::Enter => {
                self.controller.import_selected();
            }
            KeyCode::Esc => self.controller.import_mut().close(),
            _ => return false,
        }
        true
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.controller.editor_mut().end_edit(),
            KeyCode::F(4) => {
                self.controller.save(false);
            }
            KeyCode::F(6) => {
                self.controller.save(true);
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.controller.editor_mut().insert_char(c)
            }
            KeyCode::Tab => {
                let editor = self.controller.editor_mut();
                editor.insert_char(' ');
                editor.insert_char(' ');
            }
            KeyCode::Enter => self.controller.editor_mut().insert_newline(),
            KeyCode::Backspace => self.controller.editor_mut().backspace(),
            KeyCode::Delete => self.controller.editor_mut().delete(),
            KeyCode::Left => self.controller.editor_mut().move_left(),
            KeyCode::Right => self.controller.editor_mut().move_right(),
            KeyCode::Up => self.controller.editor_mut().move_up(),
            KeyCode::Down => self.controller.editor_mut().move_down(),
            KeyCode::Home => self.controller.editor_mut().home(),
            KeyCode::End => self.controller.editor_mut().end(),
            _ => {}
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.controller.catalog().len();
        if len == 0 {
            return;
        }
        let next = self.cursor.saturating_add_signed(delta).min(len - 1);
        if self.controller.select_index(next) {
            self.cursor = next;
        }
    }

    /// Keeps the highlighted row on the selection after the catalog moved.
    fn sync_cursor(&mut self) {
        let catalog = self.controller.catalog();
        if let Some(key) = self.controller.selected()
            && let Some(pos) = catalog.position(key)
        {
            self.cursor = pos;
        } else {
            self.cursor = self.cursor.min(catalog.len().saturating_sub(1));
        }
    }
}

pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    match &app.screen {
        ActiveScreen::Menu { selected } => draw_menu(frame, area, *selected),
        ActiveScreen::Rules(screen) => draw_screen(frame, area, screen),
        ActiveScreen::Schedules(screen) => draw_screen(frame, area, screen),
    }
}

fn draw_menu(frame: &mut Frame, area: Rect, selected: usize) {
    let items: Vec<ListItem> = ScreenChoice::ALL
        .iter()
        .map(|choice| ListItem::new(choice.title()))
        .collect();
    let list = List::new(items)
        .block(panel(" stterm ", true))
        .highlight_style(highlight())
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(selected));

    let [menu, hints] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .areas(area);
    frame.render_stateful_widget(list, menu, &mut state);
    frame.render_widget(
        Paragraph::new("Up/Down choose  Enter open  q quit").style(Style::default().fg(Color::DarkGray)),
        hints,
    );
}

fn draw_screen<K: ResourceKind, R: Remote<K>>(frame: &mut Frame, area: Rect, screen: &Screen<K, R>) {
    let [body, status] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .areas(area);
    let [left, right] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .areas(body);

    draw_list(frame, left, screen);
    draw_detail(frame, right, screen);
    if screen.controller.import().is_open() {
        let [overlay, _] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .areas(left);
        draw_import(frame, overlay, screen);
    }
    draw_status(frame, status, screen);
}

fn draw_list<K: ResourceKind, R: Remote<K>>(frame: &mut Frame, area: Rect, screen: &Screen<K, R>) {
    let catalog = screen.controller.catalog();
    let items: Vec<ListItem> = catalog
        .labels()
        .map(|(_, label)| ListItem::new(label.to_string()))
        .collect();
    let title = format!(" {} ({}) ", K::TITLE, catalog.len());
    let list = List::new(items)
        .block(panel(&title, screen.focus == Focus::List))
        .highlight_style(highlight())
        .highlight_symbol("> ");
    let selected = (!catalog.is_empty()).then_some(screen.cursor);
    let mut state = ListState::default().with_selected(selected);
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_detail<K: ResourceKind, R: Remote<K>>(frame: &mut Frame, area: Rect, screen: &Screen<K, R>) {
    let editor = screen.controller.editor();
    let mut title = match screen.controller.selected_resource() {
        Some(resource) => format!(" {} ", K::label(resource)),
        None => format!(" {} ", K::SINGULAR),
    };
    if editor.is_dirty() {
        title.push_str("* ");
    }
    if editor.is_editing() {
        title.push_str("[editing] ");
    }

    let block = panel(&title, screen.focus == Focus::Detail);
    let inner = block.inner(area);
    let (row, col) = editor.cursor();
    let scroll = row.saturating_sub(usize::from(inner.height.saturating_sub(1)));
    let lines: Vec<Line> = editor
        .lines()
        .iter()
        .map(|line| Line::from(line.as_str()))
        .collect();
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0)),
        area,
    );

    if editor.is_editing() && inner.width > 0 && inner.height > 0 {
        let x = inner.x + u16::try_from(col).unwrap_or(u16::MAX).min(inner.width - 1);
        let y = inner.y + u16::try_from(row - scroll).unwrap_or(0).min(inner.height - 1);
        frame.set_cursor_position((x, y));
    }
}

fn draw_import<K: ResourceKind, R: Remote<K>>(frame: &mut Frame, area: Rect, screen: &Screen<K, R>) {
    let Some(listing) = screen.controller.import().listing() else {
        return;
    };
    let items: Vec<ListItem> = listing.names().map(ListItem::new).collect();
    let title = format!(" Import {} from {} ", K::SINGULAR, listing.root().display());
    let list = List::new(items)
        .block(panel(&title, true))
        .highlight_style(highlight())
        .highlight_symbol("> ");
    let selected = (!listing.files().is_empty()).then_some(listing.selected());
    let mut state = ListState::default().with_selected(selected);
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_status<K: ResourceKind, R: Remote<K>>(frame: &mut Frame, area: Rect, screen: &Screen<K, R>) {
    let lines = match screen.controller.status().current() {
        Some(message) => {
            let style = match message.severity {
                Severity::Info => Style::default().fg(Color::Green),
                Severity::Warning => Style::default().fg(Color::Yellow),
                Severity::Error if message.code.is_some() => {
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                }
                Severity::Error => Style::default().fg(Color::Red),
            };
            message
                .text
                .lines()
                .take(2)
                .map(|line| Line::from(Span::styled(line.to_string(), style)))
                .collect()
        }
        None => vec![Line::from(Span::styled(
            KEY_HINTS,
            Style::default().fg(Color::DarkGray),
        ))],
    };
    frame.render_widget(Paragraph::new(lines), area);
}

fn panel(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(border)
}

fn highlight() -> Style {
    Style::default().add_modifier(Modifier::REVERSED)
}
