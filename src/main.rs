use clap::{Parser, Subcommand};
use env_logger::Env;
use podcastr::api::HttpEpisodeSource;
use podcastr::pages::{EpisodePage, HomePage};
use podcastr::{config, generate, output, server};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "podcastr")]
#[command(about = "Podcast listing and player pages")]
#[command(long_about = "\
Podcast listing and player pages

Episodes are read from a json-server style API:

  GET {api}/episodes?_limit=12&_sort=published_at&_order=desc
  GET {api}/episodes/{id}

Pages:

  /                  Latest 2 episodes, then a table with the other 10
  /episodes/{id}     One episode: description and play button

Use 'build' and 'episode' to write pages into the output directory, or
'serve' to build them on request and rebuild them after
home.revalidate_secs (8h) and episodes.revalidate_secs (24h).

Run 'podcastr gen-config' to generate a documented podcastr.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = "podcastr.toml", global = true)]
    config: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Episodes API base URL (overrides api.base_url)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the home page and every listed episode page into the output directory
    Build,
    /// Generate one episode page into the output directory
    Episode {
        /// Episode id as known to the API
        id: String,
    },
    /// Fetch and normalize the home listing without writing anything
    Check,
    /// Serve pages on demand, rebuilding them when they go stale
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print a stock podcastr.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let bind = match &cli.command {
        Command::Serve { bind } => bind.as_deref(),
        _ => None,
    };
    let overrides = config::cli_overrides(cli.api_url.as_deref(), bind);

    match &cli.command {
        Command::Build => {
            let site_config = config::load_config(&cli.config, overrides)?;
            let source = HttpEpisodeSource::new(&site_config.api)?;
            println!("==> Fetching episodes from {}", site_config.api.base_url);
            let page = HomePage::build(&source, &site_config.home, site_config.site.locale).await?;
            let home = generate::write_home(&page, &site_config, &cli.output)?;
            let episodes = generate::write_episodes(&page, &site_config, &cli.output)?;
            output::print_build_output(&page, &home, &episodes);
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Episode { id } => {
            let site_config = config::load_config(&cli.config, overrides)?;
            let source = HttpEpisodeSource::new(&site_config.api)?;
            let page = EpisodePage::build(&source, id, site_config.site.locale).await?;
            let written = generate::write_episode(&page, &site_config, &cli.output)?;
            output::print_episode_output(&page, &written);
        }
        Command::Check => {
            let site_config = config::load_config(&cli.config, overrides)?;
            let source = HttpEpisodeSource::new(&site_config.api)?;
            println!("==> Checking {}", site_config.api.base_url);
            let page = HomePage::build(&source, &site_config.home, site_config.site.locale).await?;
            output::print_check_output(&page);
            println!("==> Episodes are valid");
        }
        Command::Serve { .. } => {
            let site_config = config::load_config(&cli.config, overrides)?;
            let source = HttpEpisodeSource::new(&site_config.api)?;
            output::print_serve_banner(&site_config);
            server::serve(site_config, source).await?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
