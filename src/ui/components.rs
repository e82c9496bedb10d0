//! Reusable pieces: labeled inputs, the card tile, popup geometry

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::card::{format_timestamp, Card};

use super::{accent, bg_selected, header, inactive, text, text_dim};

/// Single-line text input with a title; `mask` hides the value
pub fn input<'a>(title: &'a str, value: &str, focused: bool, mask: bool) -> Paragraph<'a> {
    let shown = if mask { "•".repeat(value.chars().count()) } else { value.to_string() };
    let cursor = if focused { "_" } else { "" };
    let border = if focused { accent() } else { inactive() };

    Paragraph::new(format!("{}{}", shown, cursor))
        .style(Style::default().fg(text()))
        .block(
            Block::default()
                .title(Span::styled(
                    format!(" {} ", title),
                    Style::default().fg(if focused { accent() } else { header() }),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        )
}

/// Rendered height of a card tile `width` columns wide, borders included
pub fn card_height(card: &Card, revealed: bool, width: u16) -> u16 {
    let body = Paragraph::new(card_lines(card, revealed))
        .wrap(Wrap { trim: false })
        .line_count(width.saturating_sub(2).max(1));
    u16::try_from(body).unwrap_or(u16::MAX).saturating_add(2)
}

/// A card: the front hides the content, the back shows it with its timestamp
pub fn card_tile(card: &Card, revealed: bool, selected: bool) -> Paragraph<'_> {
    let border = if selected { accent() } else { inactive() };
    let style = if selected { Style::default().bg(bg_selected()) } else { Style::default() };

    Paragraph::new(card_lines(card, revealed))
        .style(style)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        )
}

fn card_lines(card: &Card, revealed: bool) -> Vec<Line<'_>> {
    if !revealed {
        return vec![Line::styled(
            "Press Enter to reveal content",
            Style::default().fg(text()).add_modifier(Modifier::ITALIC),
        )];
    }

    let mut lines: Vec<Line> = card
        .content
        .lines()
        .map(|l| Line::styled(l, Style::default().fg(text())))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(format!("󰃰 {}", format_timestamp(card.created_at)), Style::default().fg(header())),
        Span::styled("  │  ", Style::default().fg(inactive())),
        Span::styled("s", Style::default().fg(accent())),
        Span::styled(" share", Style::default().fg(text_dim())),
    ]));
    lines
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Fixed-size rect centered in `r`, clamped to fit
pub fn centered_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}
