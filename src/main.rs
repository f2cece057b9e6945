//! GeoCreator
//!
//! `serve` runs the game server, `play` plays a game in the terminal against
//! any server, `mint-token` signs a development token for local play.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use geocreator::{
    VERSION, ROUND_TIME, GameController, GameSession, HttpBackend, SessionConfig,
    game::controller::{Advance, RoundView},
    network::{
        auth::{issue_token, AuthConfig, TokenClaims},
        server::{GameServer, ServerConfig},
        store::GameStore,
    },
};

#[derive(Parser)]
#[command(name = "geocreator", version, about = "Map-guessing game server and terminal player")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP game server.
    Serve {
        #[arg(long, env = "GEOCREATOR_BIND")]
        bind: Option<SocketAddr>,
        #[arg(long, env = "GEOCREATOR_SEED_FILE")]
        seed_file: Option<PathBuf>,
    },
    /// Play a game from its data URL, e.g. http://localhost:8080/game/<id>/data
    Play {
        url: String,
        #[arg(long, env = "GEOCREATOR_TOKEN")]
        token: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Sign an HS256 token with AUTH_SECRET.
    MintToken {
        #[arg(long)]
        sub: String,
        #[arg(long)]
        username: String,
        #[arg(long, default_value_t = 86_400)]
        ttl_secs: u64,
        #[arg(long, env = "AUTH_SECRET")]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Serve { bind, seed_file } => serve(bind, seed_file).await,
        Commands::Play { url, token, seed } => play(&url, token, seed).await,
        Commands::MintToken { sub, username, ttl_secs, secret } => {
            let claims = TokenClaims::for_user(sub, username, ttl_secs);
            let token = issue_token(&claims, &AuthConfig::with_secret(secret))?;
            println!("{}", token);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn serve(bind: Option<SocketAddr>, seed_file: Option<PathBuf>) -> anyhow::Result<()> {
    info!("GeoCreator server v{}", VERSION);

    let mut config = ServerConfig::from_env();
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if seed_file.is_some() {
        config.seed_file = seed_file;
    }

    let server = Arc::new(GameServer::bind(config, AuthConfig::from_env(), GameStore::new())?);
    let seeded = server.load_seed_file().await.context("loading seed file")?;
    if seeded > 0 {
        info!("Serving {} seeded games", seeded);
    }

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_server.shutdown();
        }
    });

    server.run().await?;
    info!("Server stopped");
    Ok(())
}

async fn play(url: &str, token: Option<String>, seed: Option<u64>) -> anyhow::Result<()> {
    let mut backend = HttpBackend::new();
    if let Some(token) = token {
        backend = backend.with_token(token);
    }
    let config = SessionConfig {
        rng_seed: seed,
        ..Default::default()
    };
    let session = GameSession::with_backend(url, backend, config)?;
    let mut game = GameController::new(session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let Some(mut view) = game.start().await? else {
        return Ok(());
    };

    loop {
        print_round(&view);
        let started = Instant::now();

        let score = loop {
            let remaining = ROUND_TIME.saturating_sub(started.elapsed());
            match tokio::time::timeout(remaining, lines.next_line()).await {
                Err(_) => {
                    println!("Time's up!");
                    break game.time_expired()?;
                }
                Ok(Ok(Some(line))) if line.trim().is_empty() => break game.submit()?,
                Ok(Ok(Some(line))) => match parse_guess(&line) {
                    Some((x, y)) => match game.place_marker(x, y) {
                        Ok(()) => break game.submit()?,
                        Err(e) => println!("{}", e),
                    },
                    None => println!("Enter two numbers, e.g. `0.42 0.77`"),
                },
                Ok(Ok(None)) => break game.submit()?,
                Ok(Err(e)) => return Err(e).context("reading guess"),
            }
        };

        if let Some(shot) = game.session().current_screenshot() {
            println!("Scored {} points (answer was {})", score, shot.correct_answer);
        }

        match game.advance(started.elapsed()).await? {
            Advance::Round(next) => view = next,
            Advance::Finished(report) => {
                println!();
                println!("Game over: {} points in {:.1}s", report.total_score, report.total_time);
                if !report.highscore_posted {
                    println!("(highscore not saved)");
                }
                for row in report.leaderboard {
                    println!("{:>3}. {:<20} {:>6} {:>7.1}s", row.rank, row.username, row.score, row.time);
                }
                return Ok(());
            }
        }
    }
}

fn print_round(view: &RoundView) {
    println!();
    println!("Round {}", view.round);
    println!("  map:        {}", view.map_url);
    println!("  screenshot: {}", view.screenshot_url);
    println!("Where was it taken? `x y` in 0..1, empty line to skip ({}s)", ROUND_TIME.as_secs());
}

fn parse_guess(line: &str) -> Option<(f64, f64)> {
    let mut parts = line.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((x, y))
}
