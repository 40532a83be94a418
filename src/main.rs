mod api;
mod server;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use douyin_virality::config::ServiceConfig;
use douyin_virality::{
    format_float, format_number, rank_creators, rank_videos, score_videos, RankingMetric,
    ScoredVideo, VideoMetric, ViralityScorer,
};

#[derive(Parser)]
#[command(name = "douyin-virality", about = "Douyin virality discovery and scoring")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Score a JSON array of videos offline.
    Score(ScoreArgs),
    /// Write the default configuration file.
    InitConfig(InitConfigArgs),
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ScoreArgs {
    /// JSON file with video records; stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, default_value_t = 20)]
    top: usize,
    /// Rank creators by the composite score (needs follower counts).
    #[arg(long)]
    followers: bool,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct InitConfigArgs {
    #[arg(long, default_value = "config/service.toml")]
    path: PathBuf,
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let config = load_config(args.config)?;
            let host = args.host.unwrap_or_else(|| config.server.host.clone());
            let port = args.port.unwrap_or(config.server.port);
            server::serve(host, port, config).await
        }
        Command::Score(args) => run_score(args),
        Command::InitConfig(args) => run_init_config(args),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ServiceConfig, String> {
    let (config, path) = ServiceConfig::load(path).map_err(|err| err.to_string())?;
    match path {
        Some(path) if path.exists() => tracing::info!(path = %path.display(), "loaded config"),
        _ => tracing::info!("using default config"),
    }
    Ok(config)
}

fn run_score(args: ScoreArgs) -> Result<(), String> {
    let config = load_config(args.config)?;
    let scorer = ViralityScorer::from_config(&config.scoring);

    let payload = read_input(args.input.as_deref())?;
    let videos: Vec<VideoMetric> = serde_json::from_str(&payload)
        .map_err(|err| format!("invalid video records: {}", err))?;
    let scored = score_videos(&scorer, videos, Utc::now());

    let metric = if args.followers {
        RankingMetric::ViralityScore
    } else {
        RankingMetric::Velocity
    };

    println!("Scored {} videos", format_number(scored.len() as u64));
    for video in &scored {
        println!(
            "  {} by {}: velocity {} | score {}",
            video.video.aweme_id,
            video.sec_uid(),
            format_float(video.virality_velocity, 2),
            composite_label(video)
        );
    }

    if args.followers {
        let ranked = rank_videos(scored.clone());
        println!("\nVideos by virality score:");
        for (position, video) in ranked.iter().take(args.top).enumerate() {
            println!(
                "{:>3}. {} ({})",
                position + 1,
                video.video.video_url(),
                composite_label(video)
            );
        }
    }

    let creators = rank_creators(&scored, metric, args.top);
    println!("\nTop {} creators:", creators.len());
    for (position, creator) in creators.iter().enumerate() {
        println!(
            "{:>3}. {} {} best {} on {} ({} videos)",
            position + 1,
            creator.display_name.as_deref().unwrap_or("-"),
            creator.sec_uid,
            format_float(creator.best_score, 2),
            creator.best_aweme_id,
            creator.video_count
        );
    }

    Ok(())
}

fn composite_label(video: &ScoredVideo) -> String {
    match (video.virality_score, video.score_error) {
        (Some(score), _) => format_float(score, 4),
        (None, Some(err)) => format!("n/a, {}", err),
        (None, None) => "n/a".to_string(),
    }
}

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    if args.path.exists() && !args.force {
        return Err(format!(
            "{} already exists (pass --force to overwrite)",
            args.path.display()
        ));
    }
    ServiceConfig::default()
        .write(&args.path)
        .map_err(|err| err.to_string())?;
    println!("Wrote default config to {}", args.path.display());
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String, String> {
    if let Some(path) = path {
        return std::fs::read_to_string(path)
            .map_err(|err| format!("failed reading {}: {}", path.display(), err));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|err| format!("failed reading stdin: {}", err))?;
    if buffer.trim().is_empty() {
        return Err("missing input: pass --input or pipe a JSON array".to_string());
    }
    Ok(buffer)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let manifest_path = Path::new(manifest_dir).join(".env");
    let _ = dotenvy::from_path(manifest_path);
}
