//! UI rendering for the TUI.
//!
//! Handles layout and widget rendering using ratatui.
//! Supports customizable themes via the Theme struct.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{AppMode, CredentialField, MessageBox, RowKind, TextInput, TreeRow};
use crate::core::Message;
use crate::App;

/// Draw the main UI.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Main vertical layout
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with site and combine option
            Constraint::Min(8),    // Tree + details
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Key hints
        ])
        .split(area);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[1]);

    draw_header(frame, app, chunks[0]);
    draw_tree(frame, app, content_chunks[0]);
    draw_details(frame, app, content_chunks[1]);
    draw_status_bar(frame, app, chunks[2]);
    draw_hints(frame, app, chunks[3]);

    match &app.mode {
        AppMode::Normal => {}
        AppMode::SiteDialog => draw_site_dialog(frame, app),
        AppMode::CredentialsDialog(field) => draw_credentials_dialog(frame, app, *field),
        AppMode::OutputDialog => draw_output_dialog(frame, app),
        AppMode::Message(message) => draw_message_box(frame, app, message),
    }
}

/// Draw the header with the site label and the combine checkbox.
fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;

    let checkbox = if app.combine { "[x] " } else { "[ ] " };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", app.tr(Message::Export)),
            Style::default().fg(theme.primary).add_modifier(Modifier::BOLD),
        ),
        Span::styled("│ ", Style::default().fg(theme.border)),
        Span::styled(checkbox, Style::default().fg(theme.checked)),
        Span::styled(app.tr(Message::CombineIntoOne), Style::default().fg(theme.text)),
        Span::styled(" (c)", Style::default().fg(theme.text_dim)),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title(format!(" {} ", app.tr(Message::AppTitle)))
            .title_style(Style::default().fg(theme.primary).add_modifier(Modifier::BOLD))
            .title_bottom(Line::from(format!(" {} ", app.site_label())).right_aligned()),
    );

    frame.render_widget(header, area);
}

/// Draw the course tree.
fn draw_tree(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let rows = app.rows();

    let items: Vec<ListItem> = rows.iter().map(|row| tree_item(app, row)).collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border))
                .title(format!(" {} ", app.tr(Message::ActivitiesAndMaterials)))
                .title_style(Style::default().fg(theme.primary).add_modifier(Modifier::BOLD)),
        )
        .highlight_style(Style::default().bg(theme.selected_bg).add_modifier(Modifier::BOLD));

    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn tree_item<'a>(app: &App, row: &'a TreeRow) -> ListItem<'a> {
    let theme = &app.theme;
    let indent = "  ".repeat(row.depth);

    let marker = match (row.expanded, row.checked) {
        (Some(true), _) => "▾ ",
        (Some(false), _) => "▸ ",
        (None, Some(true)) => "[x] ",
        (None, Some(false)) => "[ ] ",
        (None, None) => "  ",
    };

    let mut spans = vec![Span::raw(indent)];
    match row.checked {
        Some(true) => spans.push(Span::styled(marker, Style::default().fg(theme.checked))),
        _ => spans.push(Span::styled(marker, Style::default().fg(theme.text_dim))),
    }

    let label_style = match (&row.kind, row.visible) {
        (_, Some(false)) => Style::default().fg(theme.hidden).add_modifier(Modifier::ITALIC),
        (RowKind::Site | RowKind::Course { .. }, _) => {
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD)
        }
        (RowKind::Section { .. }, _) => Style::default().fg(theme.primary),
        _ => Style::default().fg(theme.text),
    };
    spans.push(Span::styled(row.label.as_str(), label_style));

    if let Some(visible) = row.visible {
        let (text, color) = if visible {
            (app.tr(Message::Shown), theme.success)
        } else {
            (app.tr(Message::Hidden), theme.hidden)
        };
        spans.push(Span::styled(format!("  ({text})"), Style::default().fg(color)));
    }

    ListItem::new(Line::from(spans))
}

/// Draw the selection summary and export progress.
fn draw_details(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let mut lines = vec![Line::from(Span::styled(
        format!("{}:", app.tr(Message::Export)),
        Style::default().fg(theme.primary).add_modifier(Modifier::BOLD),
    ))];
    if app.export_selection.is_empty() {
        lines.push(Line::from(Span::styled(
            app.tr(Message::SelectModulesFirst),
            Style::default().fg(theme.text_dim),
        )));
    }
    for item in &app.export_selection {
        lines.push(Line::from(vec![
            Span::styled("• ", Style::default().fg(theme.checked)),
            Span::styled(
                format!("{} ({})", item.name, item.kind.label()),
                Style::default().fg(theme.text),
            ),
        ]));
    }

    let details = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title(format!(" {} ", app.tr(Message::EditorTitle)))
            .title_style(Style::default().fg(theme.primary).add_modifier(Modifier::BOLD)),
    );
    frame.render_widget(details, chunks[0]);

    let (done, overall) = app.progress.unwrap_or((0, 0));
    let ratio = if overall == 0 { 0.0 } else { done as f64 / overall as f64 };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(theme.border)))
        .gauge_style(Style::default().fg(theme.primary))
        .label(format!("{done}/{overall}"))
        .ratio(ratio.clamp(0.0, 1.0));
    frame.render_widget(gauge, chunks[1]);
}

/// Draw the status bar.
fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;

    let spans = match &app.status {
        Some(status) if status.error => {
            vec![Span::styled(format!(" {}", status.text), Style::default().fg(theme.error))]
        }
        Some(status) => {
            vec![Span::styled(format!(" {}", status.text), Style::default().fg(theme.text))]
        }
        None => vec![Span::raw("")],
    };

    let status = Paragraph::new(Line::from(spans)).style(Style::default().bg(theme.background));
    frame.render_widget(status, area);
}

fn draw_hints(frame: &mut Frame, app: &App, area: Rect) {
    let hints = match app.mode {
        AppMode::Normal => app.tr(Message::KeyHints),
        _ => app.tr(Message::DialogHints),
    };
    let line = Paragraph::new(Line::from(Span::styled(
        format!(" {hints}"),
        Style::default().fg(app.theme.text_dim),
    )));
    frame.render_widget(line, area);
}

/// Center a popup of the given size.
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

fn dialog_block<'a>(app: &App, title: &'a str, error: bool) -> Block<'a> {
    let theme = &app.theme;
    let color = if error { theme.error } else { theme.primary };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(format!(" {title} "))
        .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .style(Style::default().bg(theme.background))
}

/// One labelled input line. Returns the line and the cursor column.
fn input_line<'a>(
    app: &App,
    label: &'a str,
    input: &TextInput,
    placeholder: &'a str,
    focused: bool,
) -> (Line<'a>, u16) {
    let theme = &app.theme;
    let text = input.display();
    let value = if text.is_empty() {
        Span::styled(placeholder, Style::default().fg(theme.text_dim))
    } else if focused {
        Span::styled(text, Style::default().fg(theme.text).add_modifier(Modifier::UNDERLINED))
    } else {
        Span::styled(text, Style::default().fg(theme.text))
    };
    let label_width = label.chars().count() as u16 + 1;
    let line = Line::from(vec![
        Span::raw(" "),
        Span::styled(label, Style::default().fg(theme.primary)),
        value,
    ]);
    (line, label_width + input.cursor as u16)
}

fn draw_site_dialog(frame: &mut Frame, app: &App) {
    let area = popup_area(frame.area(), 70, 5);
    frame.render_widget(Clear, area);

    let (line, cursor) =
        input_line(app, app.tr(Message::SiteUrlLabel), &app.site_input, "https://", true);
    let popup = Paragraph::new(vec![Line::from(""), line])
        .block(dialog_block(app, app.tr(Message::EnterSiteUrl), false));
    frame.render_widget(popup, area);
    frame.set_cursor_position((area.x + 1 + cursor, area.y + 2));
}

fn draw_credentials_dialog(frame: &mut Frame, app: &App, field: CredentialField) {
    let area = popup_area(frame.area(), 60, 6);
    frame.render_widget(Clear, area);

    let (user, user_cursor) = input_line(
        app,
        app.tr(Message::UsernameLabel),
        &app.username_input,
        app.tr(Message::UsernamePlaceholder),
        field == CredentialField::Username,
    );
    let (pass, pass_cursor) = input_line(
        app,
        app.tr(Message::PasswordLabel),
        &app.password_input,
        app.tr(Message::PasswordPlaceholder),
        field == CredentialField::Password,
    );

    let popup = Paragraph::new(vec![Line::from(""), user, pass])
        .block(dialog_block(app, app.tr(Message::EnterCredentials), false));
    frame.render_widget(popup, area);

    let (x, y) = match field {
        CredentialField::Username => (user_cursor, 2),
        CredentialField::Password => (pass_cursor, 3),
    };
    frame.set_cursor_position((area.x + 1 + x, area.y + y));
}

fn draw_output_dialog(frame: &mut Frame, app: &App) {
    let area = popup_area(frame.area(), 70, 6);
    frame.render_widget(Clear, area);

    let (line, cursor) = input_line(app, "", &app.output_input, "FAQ.pdf", true);
    let filter = Line::from(Span::styled(
        format!(" {}", app.tr(Message::PdfFileFilter)),
        Style::default().fg(app.theme.text_dim),
    ));
    let popup = Paragraph::new(vec![Line::from(""), line, filter])
        .block(dialog_block(app, app.tr(Message::SaveAsPdf), false));
    frame.render_widget(popup, area);
    frame.set_cursor_position((area.x + 1 + cursor, area.y + 2));
}

fn draw_message_box(frame: &mut Frame, app: &App, message: &MessageBox) {
    let text_lines = message.text.lines().count() as u16;
    let area = popup_area(frame.area(), 64, text_lines + 5);
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];
    lines.extend(message.text.lines().map(|l| Line::from(format!(" {l}"))));
    lines.push(Line::from(""));
    lines.push(
        Line::from(Span::styled(
            format!("[ {} ]", app.tr(Message::OkButton)),
            Style::default().fg(app.theme.primary).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
    );

    let popup = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(dialog_block(app, &message.title, message.error));
    frame.render_widget(popup, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_area_is_centered() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = popup_area(area, 60, 6);
        assert_eq!(popup, Rect::new(20, 17, 60, 6));
    }

    #[test]
    fn test_popup_area_fits_small_terminal() {
        let area = Rect::new(0, 0, 30, 4);
        let popup = popup_area(area, 60, 6);
        assert!(popup.width <= 26);
        assert!(popup.height <= 4);
    }
}
