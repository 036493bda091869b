use std::borrow::Cow;

use super::form::{FormState, FIELDS};
use super::state::{AppState, HealthStatus, Outcome};
use super::View;
use crate::engine::band::ConfidenceBand;
use crate::engine::features::FEATURE_NAMES;
use crate::predictor::types::PredictRequest;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
    Frame,
};

const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const BANNER_MAX_LINES: usize = 6;

pub fn draw(f: &mut Frame, state: &AppState, view: &View, spinner_frame: u8) {
    let banner_height = state
        .banner
        .as_ref()
        .map(|b| b.lines().count().min(BANNER_MAX_LINES) as u16)
        .unwrap_or(0);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(banner_height),
            Constraint::Length(4),
            Constraint::Min(14),
            Constraint::Length(7),
            Constraint::Length(1),
        ])
        .split(f.area());

    if let Some(banner) = &state.banner {
        draw_banner(f, banner, chunks[0]);
    }
    draw_header(f, state, chunks[1], spinner_frame);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(42), Constraint::Percentage(58)])
        .split(chunks[2]);
    draw_form(f, &view.form, body[0]);

    let right = if view.charts || view.payload {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(9), Constraint::Min(0)])
            .split(body[1])
    } else {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0)])
            .split(body[1])
    };
    draw_result(f, state, right[0]);
    if view.payload {
        draw_payload(f, state, right[1]);
    } else if view.charts {
        draw_charts(f, state, &view.form, right[1]);
    }

    draw_logs(f, state, chunks[3]);
    draw_footer(f, state, view, chunks[4]);
}

fn draw_banner(f: &mut Frame, banner: &str, area: Rect) {
    let lines: Vec<Line> = banner
        .lines()
        .take(BANNER_MAX_LINES)
        .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Red))))
        .collect();
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn draw_header(f: &mut Frame, state: &AppState, area: Rect, spinner_frame: u8) {
    let activity = if state.predict_in_flight {
        let ch = SPINNER_FRAMES[(spinner_frame as usize) % SPINNER_FRAMES.len()];
        Span::styled(
            format!(" {} PREDICTING", ch),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(" IDLE", Style::default().fg(Color::DarkGray))
    };

    let health = match (&state.health, state.health_in_flight) {
        (_, true) => Span::styled("testing...", Style::default().fg(Color::Yellow)),
        (Some(HealthStatus::Online { .. }), _) => {
            Span::styled("online", Style::default().fg(Color::Green))
        }
        (Some(HealthStatus::Failed { message }), _) => {
            Span::styled(message.clone(), Style::default().fg(Color::Red))
        }
        (None, _) => Span::styled("untested", Style::default().fg(Color::DarkGray)),
    };

    let source_color = match state.endpoint_source {
        crate::config::EndpointSource::BuiltIn => Color::Yellow,
        _ => Color::Green,
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(" Backend: ", Style::default().fg(Color::DarkGray)),
            Span::raw(state.endpoint_url.clone()),
            Span::styled(
                format!(" ({})", state.endpoint_source.describe()),
                Style::default().fg(source_color),
            ),
        ]),
        Line::from(vec![
            Span::styled(" API: ", Style::default().fg(Color::DarkGray)),
            health,
            Span::styled(" | Sent: ", Style::default().fg(Color::DarkGray)),
            Span::raw(state.requests_sent.to_string()),
            Span::styled(" | Up: ", Style::default().fg(Color::DarkGray)),
            Span::raw(state.uptime()),
            activity,
        ]),
    ];

    let block = Block::default()
        .title(" F1 GP Winner Predictor 2025 ")
        .title_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_form(f: &mut Frame, form: &FormState, area: Rect) {
    let rows: Vec<Row> = FIELDS
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let read_only = form.is_read_only(*field);
            let value = if form.editing && i == form.selected {
                format!("{}\u{258f}", form.edit_buffer)
            } else if read_only {
                format!("{} (auto)", form.display_value(*field))
            } else {
                format!("\u{25c0} {} \u{25b6}", form.display_value(*field))
            };
            let value_style = if read_only {
                Style::default().fg(Color::DarkGray)
            } else if i == form.selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(field.label()),
                Cell::from(value).style(value_style),
            ])
        })
        .collect();

    let title = match &form.error {
        Some(_) => " Inputs (invalid value) ".to_string(),
        None => " Inputs ".to_string(),
    };

    let table = Table::new(rows, [Constraint::Percentage(55), Constraint::Percentage(45)])
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(Style::default().bg(Color::DarkGray));
    let mut table_state = ratatui::widgets::TableState::default();
    table_state.select(Some(form.selected));

    if let Some(err) = &form.error {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);
        f.render_stateful_widget(table, split[0], &mut table_state);
        let width = split[1].width as usize;
        f.render_widget(
            Paragraph::new(truncate_with_ellipsis(err, width).into_owned())
                .style(Style::default().fg(Color::Red)),
            split[1],
        );
    } else {
        f.render_stateful_widget(table, area, &mut table_state);
    }
}

fn band_color(band: ConfidenceBand) -> Color {
    match band {
        ConfidenceBand::Winner => Color::Green,
        ConfidenceBand::Podium => Color::Cyan,
        ConfidenceBand::MidPack => Color::Yellow,
    }
}

fn draw_result(f: &mut Frame, state: &AppState, area: Rect) {
    let block = Block::default().title(" Prediction ").borders(Borders::ALL);

    let lines: Vec<Line> = match &state.outcome {
        None if state.predict_in_flight => vec![Line::from(Span::styled(
            "Processing on the backend...",
            Style::default().fg(Color::Cyan),
        ))],
        None => vec![
            Line::from(""),
            Line::from(Span::styled(
                "Press [p] to start the prediction",
                Style::default().fg(Color::DarkGray),
            )),
        ],
        Some(Outcome::Prediction { probability, band, defaulted, latency_ms, .. }) => {
            let color = band_color(*band);
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("Win probability: ", Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        format!("{:.2}%", probability * 100.0),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("  ({}ms)", latency_ms), Style::default().fg(Color::DarkGray)),
                ]),
                Line::from(Span::styled(
                    band.headline(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
                Line::from(band.message(*probability)),
            ];
            if *defaulted {
                lines.push(Line::from(Span::styled(
                    "Backend sent no winner_probability; 0% assumed.",
                    Style::default().fg(Color::Yellow),
                )));
            }
            lines
        }
        Some(Outcome::Failed { kind, message, diagnostic }) => {
            let mut lines = vec![
                Line::from(vec![
                    Span::styled(format!("[{}] ", kind), Style::default().fg(Color::Red)),
                    Span::styled(message.clone(), Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                ]),
            ];
            if let Some(d) = diagnostic {
                lines.extend(d.lines().map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::DarkGray)))));
            }
            lines
        }
        Some(Outcome::InvalidInput { message }) => vec![
            Line::from(Span::styled(
                "Invalid input, nothing was sent.",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from(message.clone()),
        ],
    };

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_charts(f: &mut Frame, state: &AppState, form: &FormState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(6)])
        .split(area);

    let (ratio, label, color) = match &state.outcome {
        Some(Outcome::Prediction { probability, band, .. }) => (
            probability.clamp(0.0, 1.0),
            format!("{:.1}% \u{00b7} {}", probability * 100.0, band.label()),
            band_color(*band),
        ),
        _ => (0.0, "no prediction".to_string(), Color::DarkGray),
    };
    let gauge = Gauge::default()
        .block(Block::default().title(" Win Probability ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(label);
    f.render_widget(gauge, chunks[0]);

    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    let sectors = form.inputs.sectors();
    let bars: Vec<Bar> = sectors
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Bar::default()
                .value((s.max(0.0) * 1000.0).round() as u64)
                .text_value(format!("{:.3}", s))
                .label(Line::from(format!("S{}", i + 1)))
        })
        .collect();
    let chart = BarChart::default()
        .block(Block::default().title(" Sector Times ").borders(Borders::ALL))
        .bar_width(9)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Red))
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, lower[0]);

    draw_derived(f, state, lower[1]);
}

/// Derived slots of the last vector sent.
fn draw_derived(f: &mut Frame, state: &AppState, area: Rect) {
    const DERIVED: [usize; 8] = [8, 9, 10, 11, 12, 13, 14, 15];
    let block = Block::default().title(" Derived Features ").borders(Borders::ALL);

    let Some(vector) = &state.last_vector else {
        f.render_widget(
            Paragraph::new("sent on next prediction")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    };

    let values = vector.as_slice();
    let rows: Vec<Row> = DERIVED
        .iter()
        .map(|&i| {
            Row::new(vec![
                Cell::from(FEATURE_NAMES[i]),
                Cell::from(format!("{:.4}", values[i])),
            ])
        })
        .collect();
    let table = Table::new(rows, [Constraint::Percentage(65), Constraint::Percentage(35)]).block(block);
    f.render_widget(table, area);
}

fn draw_payload(f: &mut Frame, state: &AppState, area: Rect) {
    let block = Block::default().title(" Request Payload ").borders(Borders::ALL);
    let text = match &state.last_vector {
        Some(vector) => {
            let body = PredictRequest { features: vector.as_slice() };
            let json = serde_json::to_string(&body).unwrap_or_default();
            format!("{}\n\nTotal features: {}", json, vector.len())
        }
        None => "No request sent yet".to_string(),
    };
    let mut lines: Vec<Line> = text.lines().map(|l| Line::from(l.to_string())).collect();

    if let Some(Outcome::Prediction { response, .. }) = &state.outcome {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Full API response:", Style::default().fg(Color::DarkGray))));
        lines.extend(response.lines().map(|l| Line::from(l.to_string())));
    }
    if let Some(HealthStatus::Online { body }) = &state.health {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Health response:", Style::default().fg(Color::DarkGray))));
        lines.extend(body.lines().map(|l| Line::from(l.to_string())));
    }

    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn draw_logs(f: &mut Frame, state: &AppState, area: Rect) {
    let max_width = area.width.saturating_sub(2) as usize; // borders
    let visible_lines = area.height.saturating_sub(2) as usize;

    let lines: Vec<Line> = state
        .logs
        .iter()
        .rev()
        .take(visible_lines)
        .map(|l| {
            let color = match l.level.as_str() {
                "ERROR" => Color::Red,
                "WARN" => Color::Yellow,
                _ => Color::DarkGray,
            };
            let prefix = format!(" {} [{}] ", l.time, l.level);
            let msg_max = max_width.saturating_sub(prefix.len());
            let msg = truncate_with_ellipsis(&l.message, msg_max);
            Line::from(vec![
                Span::styled(prefix, Style::default().fg(color)),
                Span::raw(msg.into_owned()),
            ])
        })
        .collect();

    let block = Block::default().title(" Log ").borders(Borders::ALL);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(f: &mut Frame, state: &AppState, view: &View, area: Rect) {
    let key = Style::default().fg(Color::Yellow);
    let line = if view.form.editing {
        Line::from(vec![
            Span::styled("  [Enter]", key),
            Span::raw(" confirm  "),
            Span::styled("[Esc]", key),
            Span::raw(" cancel  "),
            Span::raw("type digits to edit"),
        ])
    } else {
        let predict_style = if state.predict_in_flight {
            Style::default().fg(Color::DarkGray)
        } else {
            key
        };
        Line::from(vec![
            Span::styled("  [q]", key),
            Span::raw("uit  "),
            Span::styled("[p]", predict_style),
            Span::raw("redict  "),
            Span::styled("[t]", key),
            Span::raw("est API  "),
            Span::styled("[\u{2191}\u{2193}]", key),
            Span::raw(" field  "),
            Span::styled("[\u{2190}\u{2192}]", key),
            Span::raw(" step  "),
            Span::styled("[Enter]", key),
            Span::raw(" edit  "),
            Span::styled("[r]", key),
            Span::raw("eset  "),
            Span::styled("[v]", key),
            Span::raw(if view.charts { " charts on  " } else { " charts off  " }),
            Span::styled("[d]", key),
            Span::raw(" payload  "),
        ])
    };
    f.render_widget(Paragraph::new(line), area);
}

fn truncate_with_ellipsis(s: &str, max_width: usize) -> Cow<'_, str> {
    let char_count = s.chars().count();
    if char_count <= max_width {
        Cow::Borrowed(s)
    } else if max_width <= 3 {
        Cow::Owned(".".repeat(max_width))
    } else {
        let end = s
            .char_indices()
            .nth(max_width - 3)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        Cow::Owned(format!("{}...", &s[..end]))
    }
}
