mod config;
mod events;
mod server;
mod tui;

use std::io;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use arena::{AsteroidField, AuthorityConfig};
use config::ServerConfig;
use server::GameServer;
use tui::TuiState;

#[derive(Parser)]
#[command(name = "arena-server")]
#[command(about = "Authoritative space arena server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = arena::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = arena::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 32)]
    max_peers: usize,

    #[arg(long, default_value_t = 0, help = "World seed")]
    seed: u64,

    #[arg(long, help = "Skip starfields, clusters and the planet")]
    no_background: bool,

    #[arg(long, help = "Start with an empty asteroid field")]
    no_asteroids: bool,

    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServerConfig {
        bind: format!("{}:{}", args.bind, args.port),
        authority: AuthorityConfig {
            tick_rate: args.tick_rate,
            max_peers: args.max_peers,
            seed: args.seed,
            background: !args.no_background,
            asteroids: if args.no_asteroids {
                AsteroidField::EMPTY
            } else {
                AsteroidField::default()
            },
            ..Default::default()
        },
    };

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let mut server = GameServer::new(config)?;
        log::info!("Server started on {}", server.local_addr());
        server.run();
        log::info!("Server shutting down");
    } else {
        let mut server = GameServer::new(config)?;
        run_with_tui(&mut server)?;
    }

    Ok(())
}

fn run_with_tui(server: &mut GameServer) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = server.running();
    let mut tui_state = TuiState::new();

    while running.load(Ordering::SeqCst) {
        server.tick_once();

        for event in server.drain_events() {
            match event {
                events::ServerEvent::Error { .. } => tui_state.log_error(event.describe()),
                ref e if e.is_problem() => tui_state.log_warn(e.describe()),
                e => tui_state.log_info(e.describe()),
            }
        }

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    running.store(false, Ordering::SeqCst);
                }
            }
        }

        let stats = server.stats();
        let peers = server.peer_infos();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &peers);
        })?;
    }

    tui_state.log_info("Shutting down...");
    server.shutdown_connections();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
