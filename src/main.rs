use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use seller_supply_planner::client::ApiClient;
use seller_supply_planner::error::ClientError;
use seller_supply_planner::models::OracleRequest;
use seller_supply_planner::session::{FileSession, SessionProvider};
use seller_supply_planner::{classify, config, input, report};

#[derive(Parser)]
#[command(name = "seller-planner")]
#[command(about = "Marketplace seller analytics and supply planning client", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and keep the session token for later commands
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SELLER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Analyse a single product
    Product { article: String },
    /// Analyse a brand
    Brand { name: String },
    /// Analyse a category
    Category { name: String },
    /// Build a supply plan for a list of articles
    #[command(group(
        ArgGroup::new("source")
            .args(["articles", "csv"])
            .required(true)
    ))]
    Supply {
        articles: Vec<String>,
        /// CSV file with an `article` column
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Planning horizon in days
        #[arg(long)]
        target_days: Option<f64>,
        /// Write a markdown report here
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write the classified plan as CSV here
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Classify a local stock snapshot without contacting the backend
    Classify {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        target_days: Option<f64>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Monitor advertising campaigns
    #[command(group(
        ArgGroup::new("source")
            .args(["articles", "csv"])
            .required(true)
    ))]
    Ads {
        articles: Vec<String>,
        #[arg(long)]
        csv: Option<PathBuf>,
        /// JSON file with seller-entered figures keyed by article
        #[arg(long)]
        manual: Option<PathBuf>,
    },
    /// Rank marketplace search queries
    Oracle {
        #[arg(long, default_value_t = 10)]
        queries_count: u32,
        /// Month as YYYY-MM
        #[arg(long)]
        month: String,
        #[arg(long, default_value_t = 0.0)]
        min_revenue: f64,
        #[arg(long, default_value_t = 0)]
        min_frequency: u64,
        #[arg(long, default_value = "products")]
        oracle_type: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run one backend request, dropping it if the user interrupts.
async fn cancellable<F, T>(request: F) -> anyhow::Result<T>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        result = request => match result {
            Ok(value) => Ok(value),
            Err(ClientError::SessionExpired) => {
                bail!("session expired, run `seller-planner login` again")
            }
            Err(err) => {
                tracing::warn!(error = %err, kind = err.label(), "request failed");
                Err(err.into())
            }
        },
        _ = tokio::signal::ctrl_c() => bail!("cancelled"),
    }
}

fn collect_articles(articles: Vec<String>, csv: Option<PathBuf>) -> anyhow::Result<Vec<String>> {
    let mut all = articles;
    if let Some(path) = csv {
        all.extend(input::load_articles(&path)?);
    }
    let all = input::normalize_articles(all);
    if all.is_empty() {
        bail!("no articles given");
    }
    Ok(all)
}

fn planning_horizon(target_days: Option<f64>, default: f64) -> anyhow::Result<f64> {
    let days = target_days.unwrap_or(default);
    if !(days.is_finite() && days > 0.0) {
        bail!("target days must be a positive number, got {days}");
    }
    Ok(days)
}

fn write_outputs(
    records: &[classify::ClassifiedRecord],
    target_days: f64,
    summary: Option<&str>,
    out: Option<PathBuf>,
    export: Option<PathBuf>,
) -> anyhow::Result<()> {
    print!("{}", report::render_stock_table(records));

    if let Some(out) = out {
        let today = chrono::Local::now().date_naive();
        let markdown = report::build_supply_report(today, target_days, summary, records);
        std::fs::write(&out, markdown)
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("Report written to {}.", out.display());
    }
    if let Some(export) = export {
        report::export_csv(&export, records)?;
        println!("Plan exported to {}.", export.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    let thresholds = config.thresholds;

    let session: Arc<dyn SessionProvider> = Arc::new(FileSession::open(&config.session_file));
    let client = ApiClient::new(&config.api, session).context("failed to build HTTP client")?;

    match cli.command {
        Commands::Login { email, password } => {
            let login = cancellable(client.login(&email, &password)).await?;
            let name = login.user.name.as_deref().unwrap_or(&login.user.email);
            println!("Logged in as {name}.");
            if let Some(stats) = login.subscription_stats {
                let plan = stats
                    .subscription_type
                    .or(login.user.subscription_type)
                    .unwrap_or_else(|| "free".to_string());
                match stats.analyses_limit {
                    Some(limit) => println!(
                        "Plan {plan}: {} of {} analyses used.",
                        stats.analyses_used, limit
                    ),
                    None => println!("Plan {plan}: {} analyses used.", stats.analyses_used),
                }
            }
        }
        Commands::Logout => {
            client.logout();
            println!("Session cleared.");
        }
        Commands::Product { article } => {
            let product = cancellable(client.analyze_product(&article)).await?;
            print!("{}", report::render_product(&product, &thresholds));
        }
        Commands::Brand { name } => {
            let brand = cancellable(client.analyze_brand(&name)).await?;
            print!("{}", report::render_brand(&brand));
        }
        Commands::Category { name } => {
            let category = cancellable(client.analyze_category(&name)).await?;
            print!("{}", report::render_category(name.trim(), &category));
        }
        Commands::Supply {
            articles,
            csv,
            target_days,
            out,
            export,
        } => {
            let articles = collect_articles(articles, csv)?;
            let target_days = planning_horizon(target_days, thresholds.target_stock_days)?;
            let plan = cancellable(client.supply_planning(&articles)).await?;

            if plan.products.is_empty() {
                println!("No stock data returned for these articles.");
                return Ok(());
            }

            let records = thresholds.classify_batch(&plan.products, target_days);
            write_outputs(&records, target_days, Some(&plan.summary), out, export)?;
        }
        Commands::Classify {
            csv,
            target_days,
            out,
            export,
        } => {
            let target_days = planning_horizon(target_days, thresholds.target_stock_days)?;
            let stock = input::load_stock_records(&csv)?;
            if stock.is_empty() {
                println!("No rows found in {}.", csv.display());
                return Ok(());
            }

            let records = thresholds.classify_batch(&stock, target_days);
            write_outputs(&records, target_days, None, out, export)?;
        }
        Commands::Ads {
            articles,
            csv,
            manual,
        } => {
            let articles = collect_articles(articles, csv)?;
            let manual = manual
                .map(|path| input::load_manual_ad_data(&path))
                .transpose()?;
            let ads = cancellable(client.ad_monitoring(&articles, manual.as_ref())).await?;
            print!("{}", report::render_ads(&report::rank_ads(ads)));
        }
        Commands::Oracle {
            queries_count,
            month,
            min_revenue,
            min_frequency,
            oracle_type,
        } => {
            let request = OracleRequest {
                queries_count,
                month: input::parse_month(&month)?,
                min_revenue,
                min_frequency,
                oracle_type,
            };
            let oracle = cancellable(client.oracle_enhanced(&request)).await?;
            print!("{}", report::render_oracle(&oracle));
        }
    }

    Ok(())
}
