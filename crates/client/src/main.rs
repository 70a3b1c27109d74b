mod client;
mod config;

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};

use arena::ShipConfig;
use arena::entity::{FireMode, ShipType, SpecialKind};
use client::GameClient;
use config::{ClientConfig, Controls, Rotate};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RotateArg {
    Cw,
    Ccw,
}

#[derive(Parser)]
#[command(name = "arena-client")]
#[command(about = "Scripted space arena client")]
struct Args {
    #[arg(
        short,
        long,
        default_value_t = format!("127.0.0.1:{}", arena::DEFAULT_PORT),
        help = "Server address to connect to"
    )]
    server: String,

    #[arg(short, long, default_value = arena::entity::DEFAULT_PLAYER_NAME)]
    name: String,

    #[arg(long, default_value = "bustership", value_parser = parse_ship_type)]
    ship_type: ShipType,

    #[arg(long, default_value = "none", value_parser = parse_special)]
    special: SpecialKind,

    #[arg(long, default_value = "burst", value_parser = parse_fire_mode)]
    fire_mode: FireMode,

    #[arg(long, help = "Hold thrust")]
    thrust: bool,

    #[arg(long, help = "Hold the trigger")]
    fire: bool,

    #[arg(long, value_enum, help = "Hold a rotation")]
    rotate: Option<RotateArg>,

    #[arg(long, help = "Leave after this many seconds")]
    duration_secs: Option<u64>,

    #[arg(long, help = "Quit instead of reconnecting when the session is lost")]
    no_reconnect: bool,
}

fn parse_ship_type(name: &str) -> Result<ShipType> {
    ShipType::from_name(name).ok_or_else(|| anyhow!("unknown ship type '{}'", name))
}

fn parse_special(name: &str) -> Result<SpecialKind> {
    SpecialKind::from_name(name).ok_or_else(|| anyhow!("unknown special '{}'", name))
}

fn parse_fire_mode(name: &str) -> Result<FireMode> {
    FireMode::from_name(name).ok_or_else(|| anyhow!("unknown fire mode '{}'", name))
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .with_context(|| format!("cannot resolve {}", addr))?
        .next()
        .ok_or_else(|| anyhow!("{} resolved to nothing", addr))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = ClientConfig::new(resolve(&args.server)?);
    config.name = args.name;
    config.ship = ShipConfig {
        ship_type: args.ship_type,
        special: args.special,
        fire_mode: args.fire_mode,
        ..Default::default()
    };
    config.controls = Controls {
        thrust: args.thrust,
        fire: args.fire,
        rotate: args.rotate.map(|r| match r {
            RotateArg::Cw => Rotate::Cw,
            RotateArg::Ccw => Rotate::Ccw,
        }),
    };
    config.duration = args.duration_secs.map(Duration::from_secs);
    if args.no_reconnect {
        config.reconnect = None;
    }

    let mut client = GameClient::new(config)?;
    log::info!("Connecting to {}", client.server_addr());
    client.run()
}
