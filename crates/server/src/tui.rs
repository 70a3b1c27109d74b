use std::collections::VecDeque;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};

use crate::server::{PeerInfo, ServerStats};

const LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Default)]
pub struct TuiState {
    log: VecDeque<(LogLevel, String)>,
}

impl TuiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn push(&mut self, level: LogLevel, message: String) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back((level, message));
    }

    /// The newest `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &(LogLevel, String)> {
        self.log.iter().skip(self.log.len().saturating_sub(count))
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &ServerStats, peers: &[PeerInfo]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Length(peers.len().clamp(1, 8) as u16 + 2),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_status(frame, chunks[1], stats);
    render_network(frame, chunks[2], stats);
    render_peers(frame, chunks[3], peers);
    render_log(frame, chunks[4], state);
    render_help(frame, chunks[5]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let uptime = format_duration(stats.uptime_secs);
    let title = format!(" Arena Server - Uptime: {} ", uptime);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "Tick: {}  |  Peers: {}  |  Entities: {}",
        stats.tick, stats.peer_count, stats.entity_count
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let capacity = stats.max_peers.max(1);
    let ratio = stats.peer_count as f64 / capacity as f64;
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.min(1.0))
        .label(format!("{}/{} peers", stats.peer_count, stats.max_peers));

    frame.render_widget(gauge, area);
}

fn render_network(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let net = &stats.network_stats;
    let lines = vec![
        Line::from(vec![
            Span::styled("Packets: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} sent / {} recv", net.packets_sent, net.packets_received),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Bytes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {} recv",
                    format_bytes(net.bytes_sent),
                    format_bytes(net.bytes_received)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Dropped: ", Style::default().fg(Color::Gray)),
            Span::styled(
                net.packets_dropped.to_string(),
                Style::default().fg(if net.packets_dropped > 0 {
                    Color::Red
                } else {
                    Color::White
                }),
            ),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn render_peers(frame: &mut Frame, area: Rect, peers: &[PeerInfo]) {
    let block = Block::default()
        .title(" Peers ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let lines: Vec<Line> = if peers.is_empty() {
        vec![Line::from(Span::styled(
            "nobody here yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        peers
            .iter()
            .map(|p| {
                let addr = p.addr.map(|a| a.to_string()).unwrap_or_else(|| "?".into());
                let ship = p
                    .ship
                    .map(|s| format!("ship {}", s))
                    .unwrap_or_else(|| "no ship".into());
                Line::from(vec![
                    Span::styled(format!("{:<8}", p.peer.to_string()), Style::default().fg(Color::Gray)),
                    Span::styled(format!("{:<24}", p.name), Style::default().fg(Color::White)),
                    Span::raw(format!("{:<22} player {}  {}", addr, p.player, ship)),
                ])
            })
            .collect()
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Events ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let rows = usize::from(area.height.saturating_sub(2));
    let lines: Vec<Line> = state
        .recent(rows)
        .map(|(level, message)| {
            let color = match level {
                LogLevel::Info => Color::White,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Error => Color::Red,
            };
            Line::from(Span::styled(message.as_str(), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("Press 'q' or ESC to quit")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );

    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_newest_entries() {
        let mut state = TuiState::new();
        for i in 0..LOG_CAPACITY + 5 {
            state.log_info(format!("line {}", i));
        }
        let recent: Vec<_> = state.recent(2).map(|(_, m)| m.as_str()).collect();
        assert_eq!(recent, vec!["line 203", "line 204"]);
        assert_eq!(state.recent(usize::MAX).count(), LOG_CAPACITY);
    }

    #[test]
    fn formats_sizes_and_uptime() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
        assert_eq!(format_duration(3725), "01:02:05");
    }
}
