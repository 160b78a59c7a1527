use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use features::{MovieAttributes, DEFAULT_GENRES};
use server::{AppContext, PredictionRequest, PredictionService, SearchService, ServiceConfig, SimilarFilm};
use std::sync::Arc;
use std::time::Instant;

/// Floportop - movie rating prediction and similar-film search
#[derive(Parser)]
#[command(name = "floportop", version)]
#[command(about = "Predict IMDb-style ratings and find similar films", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ServiceConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict a rating for a movie that may not exist yet
    Predict(MovieArgs),

    /// Print the encoded feature vector for a movie
    Features(MovieArgs),

    /// Find films similar to a free-text description
    Search {
        /// What the film is about
        query: String,

        /// Number of results
        #[arg(long, default_value = "10")]
        k: usize,

        /// Rebuild the index before searching
        #[arg(long)]
        rebuild: bool,
    },

    /// Join the raw CSVs into the search corpus and cache it
    BuildCorpus {
        /// Ignore the corpus cache
        #[arg(long)]
        force_reload: bool,
    },

    /// Build, persist and report the similarity index
    BuildIndex {
        /// Rebuild the corpus from the raw CSVs first
        #[arg(long)]
        force_reload: bool,
    },
}

#[derive(Args)]
struct MovieArgs {
    #[arg(long)]
    start_year: i32,

    #[arg(long)]
    runtime_minutes: i32,

    /// Plot overview
    #[arg(long)]
    overview: String,

    #[arg(long, default_value = "0")]
    is_adult: u8,

    /// Comma-separated genres
    #[arg(long, default_value = DEFAULT_GENRES)]
    genres: String,

    /// Production budget in dollars
    #[arg(long)]
    budget: Option<f64>,
}

impl MovieArgs {
    fn into_request(self) -> Result<PredictionRequest> {
        let attributes =
            MovieAttributes::new(self.start_year, self.runtime_minutes, self.is_adult, self.genres)?;
        Ok(PredictionRequest {
            attributes,
            overview: self.overview,
            budget: self.budget,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let ctx = Arc::new(AppContext::new(cli.config));

    match cli.command {
        Commands::Predict(movie) => handle_predict(ctx, movie).await?,
        Commands::Features(movie) => handle_features(ctx, movie).await?,
        Commands::Search { query, k, rebuild } => handle_search(ctx, query, k, rebuild).await?,
        Commands::BuildCorpus { force_reload } => handle_build_corpus(ctx, force_reload).await?,
        Commands::BuildIndex { force_reload } => handle_build_index(ctx, force_reload).await?,
    }

    Ok(())
}

async fn handle_predict(ctx: Arc<AppContext>, movie: MovieArgs) -> Result<()> {
    let request = movie.into_request()?;
    let start = Instant::now();
    let rating = PredictionService::new(ctx)
        .predict(&request)
        .await
        .context("Prediction failed")?;

    println!(
        "{} {} ({}, {} min, {})",
        "Predicted rating:".bold().blue(),
        format!("{:.2}", rating).green().bold(),
        request.attributes.start_year,
        request.attributes.runtime_minutes,
        request.attributes.genres
    );
    println!("  computed in {:?}", start.elapsed());
    Ok(())
}

async fn handle_features(ctx: Arc<AppContext>, movie: MovieArgs) -> Result<()> {
    let request = movie.into_request()?;
    let features = PredictionService::new(ctx)
        .encode_features(&request)
        .await
        .context("Feature encoding failed")?;

    println!("{}", format!("Feature vector ({} columns):", features.len()).bold().blue());
    for (i, (name, value)) in features.named().enumerate() {
        let value = format!("{:>12.4}", value);
        let value = if value.trim() == "0.0000" { value.dimmed() } else { value.normal() };
        println!("{:>3}  {:<22} {}", i, name, value);
    }
    Ok(())
}

async fn handle_search(ctx: Arc<AppContext>, query: String, k: usize, rebuild: bool) -> Result<()> {
    let service = SearchService::new(ctx);

    if rebuild {
        let size = service.rebuild(false).await.context("Index rebuild failed")?;
        println!("{} Rebuilt index with {} movies", "✓".green(), size);
    } else if service
        .load_persisted()
        .await
        .context("Failed to load the persisted index")?
        .is_none()
    {
        bail!("No search index found; run `floportop build-index` or pass --rebuild");
    }

    let results = service.search(&query, Some(k)).await.context("Search failed")?;
    print_results(&query, &results);
    Ok(())
}

async fn handle_build_corpus(ctx: Arc<AppContext>, force_reload: bool) -> Result<()> {
    let start = Instant::now();
    let cache_path = ctx.config().corpus_cache_path();
    let corpus = tokio::task::spawn_blocking(move || server::build_corpus(&ctx, force_reload))
        .await?
        .context("Corpus build failed")?;

    println!(
        "{} Corpus ready: {} movies in {:?} (cached at {})",
        "✓".green(),
        corpus.len(),
        start.elapsed(),
        cache_path.display()
    );
    for record in corpus.records().iter().take(5) {
        let year = record.year.map(|y| y.to_string()).unwrap_or_else(|| "????".to_string());
        println!("  {} {} ({}) [{}]", record.id.to_string().dimmed(), record.title, year, record.genre_names.join(", "));
    }
    Ok(())
}

async fn handle_build_index(ctx: Arc<AppContext>, force_reload: bool) -> Result<()> {
    let start = Instant::now();
    let index_path = ctx.config().index_path();
    let size = SearchService::new(ctx)
        .rebuild(force_reload)
        .await
        .context("Index build failed")?;

    println!(
        "{} Indexed {} movies in {:?} ({})",
        "✓".green(),
        size,
        start.elapsed(),
        index_path.display()
    );
    Ok(())
}

fn print_results(query: &str, results: &[SimilarFilm]) {
    println!("{}", format!("Films similar to '{}':", query).bold().blue());
    if results.is_empty() {
        println!("  (the corpus is empty)");
    }
    for (i, film) in results.iter().enumerate() {
        let rating = film
            .vote_average
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}. {} [{}] rated {} - Score: {:.3}",
            (i + 1).to_string().green(),
            film.title.bold(),
            film.genres.join(", "),
            rating,
            film.score
        );
        if !film.directors.is_empty() {
            println!("   Directed by {}", film.directors.join(", "));
        }
    }
}
