use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::STATUS_MESSAGE_TTL;
use crate::grid::SheetView;
use crate::model::UIData;
use crate::settings::Theme;

pub const CMDLINE_HEIGHT: u16 = 1;
pub const PAGER_HEIGHT: u16 = 1;
pub const TABS_HEIGHT: u16 = 1;
pub const FILTER_LINE_HEIGHT: u16 = 1;
pub const NO_DATA: &str = "No data found";

struct Palette {
    accent: Color,
    row_highlight: Style,
    cell_highlight: Style,
    muted: Style,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Palette {
                accent: Color::Blue,
                row_highlight: Style::new().bg(Color::Gray).fg(Color::Black),
                cell_highlight: Style::new().bg(Color::Blue).fg(Color::White),
                muted: Style::new().fg(Color::DarkGray),
            },
            Theme::Dark => Palette {
                accent: Color::Yellow,
                row_highlight: Style::new().bg(Color::DarkGray).fg(Color::White),
                cell_highlight: Style::new().bg(Color::Yellow).fg(Color::Black),
                muted: Style::new().fg(Color::Gray),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&self, uidata: &UIData, frame: &mut Frame) {
        let palette = Palette::for_theme(uidata.theme);
        let [tabs_area, filter_area, table_area, pager_area, cmd_area] = Layout::vertical([
            Constraint::Length(TABS_HEIGHT),
            Constraint::Length(FILTER_LINE_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(PAGER_HEIGHT),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        frame.render_widget(Self::tabs(uidata, &palette), tabs_area);
        frame.render_widget(Self::filter_line(&uidata.sheet, &palette), filter_area);
        self.draw_table(uidata, &palette, frame, table_area);
        frame.render_widget(Self::pager(&uidata.sheet, &palette), pager_area);
        self.draw_cmdline(uidata, frame, cmd_area);

        if uidata.show_popup {
            self.draw_popup(&uidata.popup_title, &uidata.popup_message, &palette, frame);
        }
    }

    fn tabs<'a>(uidata: &'a UIData, palette: &Palette) -> Line<'a> {
        let mut spans = Vec::with_capacity(uidata.sheet_titles.len() * 2);
        for (idx, title) in uidata.sheet_titles.iter().enumerate() {
            let span = if idx == uidata.active_sheet {
                Span::styled(format!(" {title} "), Style::new().fg(palette.accent).bold().reversed())
            } else {
                Span::styled(format!(" {title} "), palette.muted)
            };
            spans.push(span);
            spans.push(Span::raw(" "));
        }
        Line::from(spans)
    }

    fn filter_line<'a>(sheet: &'a SheetView, palette: &Palette) -> Line<'a> {
        let mut spans = vec![Span::styled("Filters: ", palette.muted)];
        if sheet.filters.is_empty() {
            spans.push(Span::styled("none", palette.muted));
        } else {
            for (idx, filter) in sheet.filters.iter().enumerate() {
                if idx > 0 {
                    spans.push(Span::raw(" | "));
                }
                spans.push(Span::styled(format!("{}:{}", idx + 1, filter), Style::new().fg(palette.accent)));
            }
        }
        if !sheet.search.is_empty() {
            spans.push(Span::styled("  search: ", palette.muted));
            spans.push(Span::raw(sheet.search.as_str()).italic());
        }
        Line::from(spans)
    }

    fn draw_table(&self, uidata: &UIData, palette: &Palette, frame: &mut Frame, area: Rect) {
        let sheet = &uidata.sheet;
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", sheet.title)).bold())
            .border_set(border::PLAIN);

        if sheet.rows.is_empty() {
            let placeholder = Paragraph::new(NO_DATA).style(palette.muted).centered().block(block);
            frame.render_widget(placeholder, area);
            return;
        }

        let header = Row::new(sheet.headers.iter().map(|h| {
            let label = match h.sort {
                Some(direction) => format!("{} {}", h.label, direction.indicator()),
                None => h.label.clone(),
            };
            Cell::from(label).bold()
        }))
        .style(Style::new().fg(palette.accent))
        .bottom_margin(0);

        let rows = sheet
            .rows
            .iter()
            .map(|cells| Row::new(cells.iter().map(|c| Cell::from(c.as_str()))));
        let widths = sheet.headers.iter().map(|h| Constraint::Length(h.width));

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(palette.row_highlight)
            .cell_highlight_style(palette.cell_highlight.add_modifier(Modifier::BOLD));

        let mut state = TableState::default()
            .with_selected(Some(uidata.selected_row))
            .with_selected_column(Some(uidata.selected_column));
        frame.render_stateful_widget(table, area, &mut state);
    }

    /// `Page 2 of 5 | 6-10 of 23 | 1 [2] 3 4 5 | 5 per page`
    fn pager<'a>(sheet: &SheetView, palette: &Palette) -> Line<'a> {
        let mut spans = vec![
            Span::raw(format!("Page {} of {}", sheet.page, sheet.total_pages)).bold(),
            Span::styled(" | ", palette.muted),
            Span::raw(sheet.range_label()),
            Span::styled(" | ", palette.muted),
        ];
        spans.push(Span::styled("«", palette.muted));
        for page in sheet.pager.clone() {
            if page == sheet.page {
                spans.push(Span::styled(format!(" [{page}]"), Style::new().fg(palette.accent).bold()));
            } else {
                spans.push(Span::raw(format!(" {page}")));
            }
        }
        spans.push(Span::styled(" »", palette.muted));
        spans.push(Span::styled(" | ", palette.muted));
        spans.push(Span::raw(format!("{} per page", sheet.page_size)));
        Line::from(spans)
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = uidata.cmd_mode.map(|m| m.prompt()).unwrap_or(":");
            let line = Line::from(vec![Span::raw(prompt).bold(), Span::raw(uidata.cmdinput.input.as_str())]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.cursor_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
        } else if Instant::now().duration_since(uidata.last_status_message_update) < STATUS_MESSAGE_TTL {
            frame.render_widget(Paragraph::new(uidata.status_message.as_str()), area);
        }
    }

    fn draw_popup(&self, title: &str, message: &str, palette: &Palette, frame: &mut Frame) {
        let area = centered(frame.area(), 80, 80);
        let popup = Paragraph::new(message)
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title(Line::from(format!(" {title} (Esc to close) ")).centered())
                    .border_set(border::THICK)
                    .border_style(Style::new().fg(palette.accent)),
            );
        frame.render_widget(Clear, area);
        frame.render_widget(popup, area);
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
