use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::warn;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
    DefaultTerminal, Frame,
};
use sps_dashboard::{config::DashboardConfig, remote::Remote, store::ReconciledState, Dashboard};
use sps_protocol::{
    siemens::types::AnalogChannel,
    wago::types::{ControlCommand, LAMP_COUNT},
};
use std::{io, time::Duration};
use strum::IntoEnumIterator;

const LAMPS_PER_ROW: usize = 8;

pub(crate) async fn run<R: Remote>(remote: R, config: &DashboardConfig) -> Result<(), io::Error> {
    let dashboard = Dashboard::start(remote, config);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &dashboard);

    // Stop polling before the terminal is handed back
    dashboard.shutdown();
    ratatui::restore();

    result
}

fn event_loop<R: Remote>(
    terminal: &mut DefaultTerminal,
    dashboard: &Dashboard<R>,
) -> Result<(), io::Error> {
    loop {
        let state = dashboard.snapshot();
        terminal.draw(|f| draw(f, &state))?;

        // Handle keyboard input
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(c) => {
                        if let Some(command) = command_for_key(c) {
                            let dashboard = dashboard.clone();
                            tokio::spawn(async move {
                                if let Err(e) = dashboard.dispatch(command).await {
                                    warn!("Command {command} failed: {e}");
                                }
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn command_for_key(c: char) -> Option<ControlCommand> {
    let code = u8::try_from(c.to_digit(10)?).ok()?;
    ControlCommand::try_from(code).ok()
}

fn channel_label(channel: AnalogChannel) -> &'static str {
    match channel {
        AnalogChannel::Actual => "Actual temperature",
        AnalogChannel::Setpoint => "Setpoint temperature",
        AnalogChannel::Difference => "Difference",
    }
}

fn draw(f: &mut Frame, state: &ReconciledState) {
    let banner_height = if state.last_error.is_some() { 3 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(banner_height),
            Constraint::Length(4),
            Constraint::Length(5),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    if let Some(error) = &state.last_error {
        let banner = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL).title("Error"));
        f.render_widget(banner, chunks[0]);
    }

    // Lamps
    let lamp_title = match state.discrete {
        Some(status) => format!("WAGO 750 lamps (0x{:04X})", status.value),
        None => "WAGO 750 lamps (no data)".to_string(),
    };

    let lamps = state.lamps();
    let lamp_lines: Vec<Line> = (0..LAMP_COUNT)
        .step_by(LAMPS_PER_ROW)
        .map(|start| {
            Line::from(
                (start..start + LAMPS_PER_ROW)
                    .map(|i| {
                        let number = i + 1;
                        let style = match (state.discrete, lamps.lamp(number)) {
                            (Some(_), Some(true)) => Style::default()
                                .fg(Color::Black)
                                .bg(Color::Yellow)
                                .add_modifier(Modifier::BOLD),
                            (Some(_), _) => Style::default().fg(Color::Gray),
                            (None, _) => Style::default().fg(Color::DarkGray),
                        };
                        Span::styled(format!(" L{number:<2} "), style)
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    f.render_widget(
        Paragraph::new(lamp_lines).block(Block::default().borders(Borders::ALL).title(lamp_title)),
        chunks[1],
    );

    // Temperatures
    let analog_block = Block::default()
        .borders(Borders::ALL)
        .title("S7-1500 temperatures");

    if state.loading && state.analog.is_empty() {
        f.render_widget(Paragraph::new("Loading...").block(analog_block), chunks[2]);
    } else {
        let rows: Vec<Row> = AnalogChannel::iter()
            .map(|channel| {
                Row::new(vec![
                    channel_label(channel).to_string(),
                    state.analog.display(channel),
                ])
            })
            .collect();

        let table = Table::new(rows, [Constraint::Length(22), Constraint::Min(8)])
            .block(analog_block);
        f.render_widget(table, chunks[2]);
    }

    // Footer
    let mut keys: Vec<String> = ControlCommand::iter()
        .map(|command| format!("[{}] {command}", command.code()))
        .collect();
    keys.push("[q] quit".to_string());

    f.render_widget(
        Paragraph::new(keys.join("  ")).style(Style::default().fg(Color::Cyan)),
        chunks[4],
    );
}
