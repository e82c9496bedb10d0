mod components;

use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, AuthField, AuthMode, CardsFocus, Popup, Screen, ToastKind, MIN_PASSWORD_LEN};
use crate::theme::Theme;

use components::{card_height, card_tile, centered_fixed, centered_rect, input};

// Set once at startup from the config
static THEME: OnceLock<Theme> = OnceLock::new();

pub fn init_theme(theme: Theme) {
    if THEME.set(theme).is_err() {
        tracing::debug!("Theme already initialized");
    }
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn inactive() -> Color { theme().inactive }
fn success() -> Color { theme().success }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }
fn header() -> Color { theme().header }

pub fn draw(f: &mut Frame, app: &App) {
    match app.screen {
        Screen::Loading => draw_loading(f),
        Screen::Auth => draw_auth(f, app),
        Screen::Cards => draw_cards_screen(f, app),
    }

    // Draw popups on top
    match app.popup {
        Popup::None => {}
        Popup::Help => draw_help_popup(f),
        Popup::ConfirmSignOut => draw_confirm_popup(f),
    }
}

fn draw_loading(f: &mut Frame) {
    let area = centered_fixed(20, 1, f.area());
    let loading = Paragraph::new(Span::styled("Loading...", Style::default().fg(text())))
        .alignment(Alignment::Center);
    f.render_widget(loading, area);
}

fn draw_auth(f: &mut Frame, app: &App) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let form = &app.auth;
    let is_login = form.mode == AuthMode::SignIn;
    let box_area = centered_fixed(52, 15, chunks[0]);

    let title = if is_login { " 󰌾 Welcome Back " } else { " 󰌾 Create Account " };
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(header()).add_modifier(Modifier::BOLD)))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));
    f.render_widget(block, box_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Email
            Constraint::Length(3), // Password
            Constraint::Length(1), // Password hint
            Constraint::Length(1),
            Constraint::Length(1), // Submit
            Constraint::Length(1),
            Constraint::Length(1), // Mode toggle
        ])
        .split(box_area);

    f.render_widget(input("Email", &form.email, form.field == AuthField::Email, false), inner[0]);
    f.render_widget(input("Password", &form.password, form.field == AuthField::Password, true), inner[1]);

    if !is_login {
        let hint = Paragraph::new(Span::styled(
            format!("Password must be at least {} characters long", MIN_PASSWORD_LEN),
            Style::default().fg(text_dim()),
        ));
        f.render_widget(hint, inner[2]);
    }

    let label = if form.loading {
        "Processing..."
    } else if is_login {
        "Sign In"
    } else {
        "Sign Up"
    };
    let submit_style = if form.loading {
        Style::default().fg(inactive())
    } else {
        Style::default().fg(success()).add_modifier(Modifier::BOLD)
    };
    let submit = Paragraph::new(Line::from(vec![
        Span::styled("[ ", Style::default().fg(text_dim())),
        Span::styled(label, submit_style),
        Span::styled(" ]", Style::default().fg(text_dim())),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(submit, inner[4]);

    let toggle_text = if is_login {
        "Don't have an account? Sign Up"
    } else {
        "Already have an account? Sign In"
    };
    let toggle = Paragraph::new(Line::from(vec![
        Span::styled(toggle_text, Style::default().fg(text())),
        Span::styled(" (Ctrl+T)", Style::default().fg(text_dim())),
    ]))
    .alignment(Alignment::Center);
    f.render_widget(toggle, inner[6]);

    draw_status_line(f, app, chunks[1], vec![
        ("Tab", "switch field"),
        ("Enter", "submit"),
        ("Ctrl+T", "sign in/up"),
        ("Ctrl+C", "quit"),
    ]);
}

fn draw_cards_screen(f: &mut Frame, app: &App) {
    let area = f.area();
    let compose_height = if area.height < 20 { 5 } else { 8 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),              // Header
            Constraint::Length(compose_height), // Compose
            Constraint::Min(3),                 // Cards
            Constraint::Length(1),              // Toast / footer
        ])
        .split(area);

    draw_header(f, app, chunks[0]);
    draw_compose(f, app, chunks[1]);
    draw_card_list(f, app, chunks[2]);

    let hints = if app.focus == CardsFocus::Compose {
        vec![("Ctrl+S", "create"), ("Enter", "newline"), ("Esc", "cards"), ("Ctrl+C", "quit")]
    } else {
        vec![
            ("↑/↓", "select"),
            ("Enter", "flip"),
            ("s", "share"),
            ("n", "new"),
            ("r", "reload"),
            ("o", "sign out"),
            ("?", "help"),
            ("q", "quit"),
        ]
    };
    draw_status_line(f, app, chunks[3], hints);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let user = app
        .session
        .as_ref()
        .and_then(|s| s.user.email.as_deref())
        .unwrap_or("");

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(user.chars().count() as u16 + 2)])
        .split(area);

    let title = Paragraph::new(Line::from(vec![
        Span::styled(" 󰈙 ", Style::default().fg(accent())),
        Span::styled("Timestamped Cards", Style::default().fg(header()).add_modifier(Modifier::BOLD)),
    ]));
    f.render_widget(title, cols[0]);

    let who = Paragraph::new(Span::styled(user, Style::default().fg(text_dim()))).alignment(Alignment::Right);
    f.render_widget(who, cols[1]);
}

fn draw_compose(f: &mut Frame, app: &App, area: Rect) {
    let is_active = app.focus == CardsFocus::Compose;
    let border_color = if is_active { accent() } else { inactive() };
    let title_style = if is_active {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(inactive())
    };

    let (action, action_style) = if app.creating {
        ("Creating...", Style::default().fg(inactive()))
    } else if app.can_create() {
        ("Ctrl+S Create Card", Style::default().fg(success()).add_modifier(Modifier::BOLD))
    } else {
        ("Create Card", Style::default().fg(inactive()))
    };

    let block = Block::default()
        .title(Span::styled(" New card ", title_style))
        .title_bottom(Line::from(Span::styled(format!(" {} ", action), action_style)).right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let mut lines: Vec<Line> = if app.compose.is_empty() && !is_active {
        vec![Line::styled("Write your content here...", Style::default().fg(text_dim()))]
    } else {
        app.compose
            .split('\n')
            .map(|l| Line::styled(l.to_string(), Style::default().fg(text())))
            .collect()
    };

    if is_active && !app.creating {
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled("█", Style::default().fg(accent())));
        }
    }

    // Keep the cursor line in view
    let visible = area.height.saturating_sub(2) as usize;
    let skip = lines.len().saturating_sub(visible);
    let lines: Vec<Line> = lines.into_iter().skip(skip).collect();

    let compose = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
    f.render_widget(compose, area);
}

fn draw_card_list(f: &mut Frame, app: &App, area: Rect) {
    let is_active = app.focus == CardsFocus::List;
    let title = if app.loading_cards {
        " Cards (loading...) ".to_string()
    } else {
        format!(" Cards ({}) ", app.cards.len())
    };

    let block = Block::default()
        .title(Span::styled(
            title,
            if is_active {
                Style::default().fg(accent()).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(inactive())
            },
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if is_active { accent() } else { inactive() }));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.cards.is_empty() {
        let empty = Paragraph::new(Span::styled(
            if app.loading_cards { "  Loading cards..." } else { "  No cards yet. Press n to write one." },
            Style::default().fg(text_dim()),
        ));
        f.render_widget(empty, inner);
        return;
    }

    let heights: Vec<u16> = app
        .cards
        .iter()
        .map(|c| card_height(c, app.is_revealed(c), inner.width))
        .collect();

    // First visible card: walk back from the selection while it still fits
    let mut start = app.selected.min(app.cards.len() - 1);
    let mut used = heights[start];
    while start > 0 && used + heights[start - 1] <= inner.height {
        start -= 1;
        used += heights[start];
    }

    let mut y = inner.y;
    for (i, card) in app.cards.iter().enumerate().skip(start) {
        let remaining = inner.bottom().saturating_sub(y);
        if remaining == 0 {
            break;
        }
        let height = heights[i].min(remaining);
        let rect = Rect { x: inner.x, y, width: inner.width, height };
        let selected = is_active && i == app.selected;
        f.render_widget(card_tile(card, app.is_revealed(card), selected), rect);
        y += height;
    }
}

/// Bottom line: the current toast if any, otherwise key hints
fn draw_status_line(f: &mut Frame, app: &App, area: Rect, hints: Vec<(&str, &str)>) {
    let line = if let Some(ref toast) = app.toast {
        let (icon, color) = match toast.kind {
            ToastKind::Success => ("󰄬 ", success()),
            ToastKind::Error => ("󰅚 ", danger()),
        };
        Line::from(vec![
            Span::styled(icon, Style::default().fg(color)),
            Span::styled(toast.message.as_str(), Style::default().fg(color)),
        ])
    } else {
        let mut spans = Vec::new();
        for (i, (key, desc)) in hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", Style::default().fg(inactive())));
            }
            spans.push(Span::styled(*key, Style::default().fg(accent())));
            spans.push(Span::styled(format!(" {}", desc), Style::default().fg(text_dim())));
        }
        Line::from(spans)
    };

    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 60 },
        if area.height < 30 { 95 } else { 70 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(Span::styled(title, Style::default().fg(header()).add_modifier(Modifier::BOLD)))
    };
    let entry = |key: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", key), Style::default().fg(accent())),
            Span::raw(desc),
        ])
    };

    let help_text = vec![
        section("═══ Cards ═══"),
        entry("↑/↓ j/k", "Select card"),
        entry("Enter", "Flip card (reveal content)"),
        entry("s", "Copy share link"),
        entry("r", "Reload cards"),
        entry("n / Tab", "Write a new card"),
        Line::from(""),
        section("═══ New Card ═══"),
        entry("Ctrl+S", "Create card (F2 also works)"),
        entry("Enter", "New line"),
        entry("Esc", "Back to cards"),
        Line::from(""),
        section("═══ Account ═══"),
        entry("o", "Sign out"),
        entry("q", "Quit (session is kept)"),
        Line::from(""),
        section("═══ Command Line ═══"),
        entry("--list", "Print your cards as JSON"),
        entry("--create", "Create a card, print its link"),
        entry("--show", "Print a shared card"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" 󰋖 stampcards Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn draw_confirm_popup(f: &mut Frame) {
    let popup_area = centered_fixed(40, 6, f.area());

    f.render_widget(Clear, popup_area);

    let confirm = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("Sign out?", Style::default().fg(text()))),
        Line::from(vec![
            Span::styled("y", Style::default().fg(success()).add_modifier(Modifier::BOLD)),
            Span::raw(" Yes   "),
            Span::styled("n", Style::default().fg(danger()).add_modifier(Modifier::BOLD)),
            Span::raw(" No"),
        ]),
    ])
    .block(
        Block::default()
            .title(Span::styled(" Confirm ", Style::default().fg(accent())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent())),
    )
    .alignment(Alignment::Center);

    f.render_widget(confirm, popup_area);
}
