//! UI rendering for the dashboard.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, Paragraph},
    style::{Color, Modifier, Style},
};
use super::app::DashboardApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DashboardApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Percentage(55),
        ])
        .split(frame.area());

    // Left side: code listing and registers
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(9),
        ])
        .split(chunks[0]);

    draw_code(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);

    // Right side: memory, stack, status, help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(8),
            Constraint::Length(3),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_stack(frame, right_chunks[1], app);
    draw_status(frame, right_chunks[2], app);
    draw_help(frame, right_chunks[3]);
}

/// Draw the code listing with the current PC highlighted.
fn draw_code(frame: &mut Frame, area: Rect, app: &DashboardApp) {
    let rows = app.code_listing((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = rows
        .iter()
        .map(|(addr, text, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{:04x}: {}", prefix, addr, text)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Code ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

/// Draw the register file plus PC, SP, flag and status.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DashboardApp) {
    let regs = &app.cpu.regs;
    let mut content = Vec::new();

    // Four registers per row keeps all seventeen visible.
    for row in regs.r.chunks(4).enumerate() {
        let (i, chunk) = row;
        let line: Vec<Span> = chunk
            .iter()
            .enumerate()
            .flat_map(|(j, v)| {
                vec![
                    Span::raw(format!("R{:02}: ", i * 4 + j)),
                    Span::styled(
                        format!("x{:04x}  ", v),
                        Style::default().fg(Color::White),
                    ),
                ]
            })
            .collect();
        content.push(Line::from(line));
    }

    content.push(Line::from(vec![
        Span::raw("PC: "),
        Span::styled(format!("x{:04x}", regs.pc), Style::default().fg(Color::Yellow)),
        Span::raw("  SP: "),
        Span::styled(format!("x{:04x}", regs.sp), Style::default().fg(Color::Yellow)),
        Span::raw("  Flag: "),
        Span::styled(
            format!("{}", regs.flag),
            if regs.flag {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            },
        ),
    ]));
    content.push(Line::from(vec![
        Span::raw("Cycles: "),
        Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
        Span::raw("  State: "),
        Span::styled(
            format!("{:?}", app.cpu.state),
            if app.running {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            },
        ),
    ]));

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );

    frame.render_widget(paragraph, area);
}

/// Draw the memory hex dump.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DashboardApp) {
    let visible_rows = (area.height as usize).saturating_sub(3);
    let total_rows = (app.cpu.mem.len() as usize).div_ceil(16);
    let start = app.mem_scroll.min(total_rows.saturating_sub(1));

    let mut items = vec![ListItem::new(
        "       00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f".to_string(),
    )
    .style(Style::default().fg(Color::DarkGray))];

    for row in start..(start + visible_rows).min(total_rows) {
        let addr = (row * 16) as u16;
        let in_row = app.cpu.regs.pc / 16 == row as u16;
        let style = if in_row {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };
        items.push(
            ListItem::new(format!("{:04x}:  {}", addr, app.cpu.mem.dump_row(addr))).style(style),
        );
    }

    let list = List::new(items).block(
        Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );

    frame.render_widget(list, area);
}

/// Draw the stack from SP down to the stack head.
fn draw_stack(frame: &mut Frame, area: Rect, app: &DashboardApp) {
    let dump = app.cpu.dump_stack();
    let text = if dump.is_empty() { "(empty)".to_string() } else { dump };

    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .title(" Stack ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        );

    frame.render_widget(paragraph, area);
}

/// Draw the status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DashboardApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default().title(" Status ").borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw the help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  x: Reset"),
        Line::from("+/-: Clock  ↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().title(" Help ").borders(Borders::ALL));

    frame.render_widget(help, area);
}
