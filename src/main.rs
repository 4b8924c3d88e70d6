use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use slow_planet::config::{ClientConfig, Credentials, API_KEY_VAR, DEFAULT_BASE_URL};
use slow_planet::download_plan::{generate_download_plan, DownloadPlan};
use slow_planet::image_selection::ImageSelection;
use slow_planet::planet::{self, psscene, ItemId, Provider};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(version, about = "Search, activate and download Planet imagery")]
struct Args {
    /// Image selection TOML; the built-in PSScene template is used when omitted
    #[arg(short, long, global = true)]
    selection: Option<PathBuf>,

    #[arg(long, env = API_KEY_VAR, hide_env_values = true, global = true)]
    api_key: Option<String>,

    #[arg(long, env = "PLANET_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the ids of items matching the selection
    Search,
    /// List the asset kinds of one item and their activation status
    Assets { item_id: String },
    /// Activate and download matching items
    Fetch {
        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,
        /// Fetch these items instead of running the search
        #[arg(long = "item")]
        items: Vec<String>,
        /// Download at most this many search results
        #[arg(long)]
        limit: Option<usize>,
        /// Write download_plan.json without downloading
        #[arg(long)]
        plan_only: bool,
    },
    /// Write the built-in image selection template
    Template { path: PathBuf },
}

fn init_tracing(args: &Args) {
    // RUST_LOG wins over -q, which wins over -v
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_selection(args: &Args) -> Result<ImageSelection> {
    match &args.selection {
        Some(path) => ImageSelection::read(path)
            .with_context(|| format!("reading image selection {}", path.display())),
        None => ImageSelection::from_template(&psscene::image_selection_toml()),
    }
}

fn provider(args: &Args) -> Result<Provider> {
    let credentials = match &args.api_key {
        Some(key) => Credentials::new(key.clone())?,
        None => Credentials::from_env()?,
    };
    Ok(Provider::new(ClientConfig::new(&args.base_url, credentials)?)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);
    debug!(command = ?args.command, selection = ?args.selection, "Arguments parsed");

    let mut selection = load_selection(&args)?;

    match &args.command {
        Command::Template { path } => {
            selection.write(path)?;
            info!(path = %path.display(), "Template written");
        }
        Command::Search => {
            let provider = provider(&args)?;
            for id in planet::search(&provider, selection.search_request()).await? {
                println!("{id}");
            }
        }
        Command::Assets { item_id } => {
            let provider = provider(&args)?;
            let item_id = ItemId::new(item_id.as_str());
            for (kind, status) in
                planet::list_assets(&provider, &selection.item_type, &item_id).await?
            {
                let status = status.map_or("unknown".to_string(), |s| s.to_string());
                println!("{kind}\t{status}");
            }
        }
        Command::Fetch {
            output_dir,
            items,
            limit,
            plan_only,
        } => {
            let provider = provider(&args)?;
            if limit.is_some() {
                selection.set_limit(*limit);
            }

            let plan = if items.is_empty() {
                generate_download_plan(&provider, &selection, output_dir.clone()).await?
            } else {
                let ids = items.iter().map(|id| ItemId::new(id.as_str())).collect();
                DownloadPlan::new(
                    &selection.item_type,
                    &selection.asset_kind,
                    output_dir.clone(),
                    ids,
                )
            };

            std::fs::create_dir_all(output_dir)
                .with_context(|| format!("creating {}", output_dir.display()))?;
            plan.write(output_dir.join("download_plan.json"))?;
            if *plan_only {
                return Ok(());
            }
            if plan.item_ids().is_empty() {
                info!("Nothing to download");
                return Ok(());
            }

            let report = plan.execute(&provider, &selection.poll_policy()).await;
            report.write(output_dir.join("download_report.json"))?;
            if report.failed() > 0 {
                bail!(
                    "{} of {} items failed, see download_report.json",
                    report.failed(),
                    report.items.len()
                );
            }
        }
    }

    Ok(())
}
