use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{DataIndex, Dataset, EventKind, MovieId, ObjectId, ObjectType, UserId};
use server::{EngineConfig, MovieRecommendation, RecommendationOrchestrator, is_not_found};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// ReelRecs - Movie Recommendation Engine
#[derive(Parser)]
#[command(name = "reel-recs")]
#[command(about = "Content-aware movie recommendations over a JSON snapshot", long_about = None)]
struct Cli {
    /// Path to the JSON snapshot of the dataset
    #[arg(short, long, default_value = "data/snapshot.json")]
    data: PathBuf,

    /// Optional engine config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get movie recommendations for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations to return (default from config)
        #[arg(long)]
        limit: Option<usize>,

        /// Show the score breakdown for each recommendation
        #[arg(long)]
        explain: bool,
    },

    /// Read the user's cached recommendations, building them if absent
    Cache {
        #[arg(long)]
        user_id: UserId,
    },

    /// Best-rated movies overall, for anonymous users
    Popular {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Most clicked movies over a recent window
    Trending {
        /// Window length in days (default from config)
        #[arg(long)]
        days: Option<u32>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Log an interaction event (impression, click, like, dismiss, rate)
    Event {
        /// Omit for anonymous events
        #[arg(long)]
        user_id: Option<UserId>,

        #[arg(long)]
        movie_id: Option<MovieId>,

        #[arg(long)]
        kind: EventKind,
    },

    /// Recompute and overwrite cached recommendations
    RebuildCache {
        /// List length per user (default from config)
        #[arg(long)]
        top_k: Option<usize>,

        /// Only these users (comma separated); all users when omitted
        #[arg(long, value_delimiter = ',')]
        users: Vec<UserId>,

        /// Only the first N users by id
        #[arg(long)]
        limit_users: Option<usize>,
    },

    /// Recompute rating aggregates for one movie, or all movies
    Recompute {
        #[arg(long)]
        movie_id: Option<MovieId>,
    },

    /// Create or replace a rating
    Rate {
        #[arg(long)]
        user_id: UserId,

        #[arg(long)]
        movie_id: MovieId,

        /// Score in [0, 5]
        #[arg(long)]
        score: f32,
    },

    /// Delete a rating
    Unrate {
        #[arg(long)]
        user_id: UserId,

        #[arg(long)]
        movie_id: MovieId,
    },

    /// Objects most similar to one object by embedding
    Similar {
        #[arg(long)]
        object_id: ObjectId,

        /// movie, user or tag
        #[arg(long, default_value = "movie")]
        object_type: ObjectType,

        /// Embedding model version (default from config)
        #[arg(long)]
        model_version: Option<String>,

        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show user profile and rating history
    User {
        /// User ID to display
        #[arg(long)]
        user_id: UserId,
    },

    /// Search for movies by title
    Search {
        /// Movie title to search for (case-insensitive substring match)
        #[arg(long)]
        title: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Err(err) if is_not_found(&err) => {
            eprintln!("{} {:#}", "Not found:".yellow().bold(), err);
            std::process::exit(2);
        }
        result => result,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref())?;

    println!("Loading dataset from {}...", cli.data.display());
    let start = Instant::now();
    let data_index = DataIndex::load_snapshot(&cli.data)
        .with_context(|| format!("Failed to load snapshot {}", cli.data.display()))?;
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());
    let (users, movies, ratings) = data_index.counts();
    info!(users, movies, ratings, "dataset loaded");

    let orchestrator = RecommendationOrchestrator::new(data_index, config);
    let default_k = orchestrator.config().default_k;

    // Dispatch to appropriate command handler; true when the store changed
    let modified = match cli.command {
        Commands::Recommend {
            user_id,
            limit,
            explain,
        } => {
            handle_recommend(&orchestrator, user_id, limit.unwrap_or(default_k), explain).await?;
            false
        }
        Commands::Cache { user_id } => handle_cache(&orchestrator, user_id).await?,
        Commands::Popular { limit } => {
            handle_popular(&orchestrator, limit).await?;
            false
        }
        Commands::Trending { days, limit } => {
            let days = days.unwrap_or(orchestrator.config().trending_window_days);
            handle_trending(&orchestrator, days, limit).await?;
            false
        }
        Commands::Event {
            user_id,
            movie_id,
            kind,
        } => {
            let event = orchestrator.record_event(user_id, movie_id, kind).await?;
            println!("{} Logged {} event at {}", "✓".green(), event.kind, event.timestamp);
            true
        }
        Commands::RebuildCache {
            top_k,
            users,
            limit_users,
        } => {
            let k = top_k.unwrap_or(default_k);
            let rebuilt = if users.is_empty() {
                orchestrator.rebuild_cache_for_all(k, limit_users).await?
            } else {
                orchestrator.rebuild_cache_for_users(&users, k).await?
            };
            println!("{} Rebuilt recommendations for {} users", "✓".green(), rebuilt);
            rebuilt > 0
        }
        Commands::Recompute { movie_id } => handle_recompute(&orchestrator, movie_id).await?,
        Commands::Rate {
            user_id,
            movie_id,
            score,
        } => {
            let stats = orchestrator.rate(user_id, movie_id, score).await?;
            println!(
                "{} Rated movie {} {:.1}; now avg {:.2} over {} ratings",
                "✓".green(),
                movie_id,
                score,
                stats.avg_rating,
                stats.rating_count
            );
            true
        }
        Commands::Unrate { user_id, movie_id } => {
            let removed = orchestrator.unrate(user_id, movie_id).await?;
            if removed {
                println!("{} Removed rating of movie {}", "✓".green(), movie_id);
            } else {
                println!("User {} had not rated movie {}", user_id, movie_id);
            }
            removed
        }
        Commands::Similar {
            object_id,
            object_type,
            model_version,
            limit,
        } => {
            handle_similar(&orchestrator, object_type, object_id, model_version, limit).await?;
            false
        }
        Commands::User { user_id } => {
            handle_user(&orchestrator, user_id).await?;
            false
        }
        Commands::Search { title } => {
            handle_search(&orchestrator, title).await?;
            false
        }
    };

    if modified {
        orchestrator.save_snapshot(cli.data.clone()).await?;
        println!("{} Saved {}", "✓".green(), cli.data.display());
    }

    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    orchestrator: &RecommendationOrchestrator,
    user_id: UserId,
    limit: usize,
    explain: bool,
) -> Result<()> {
    let start = Instant::now();
    let recommendations = orchestrator.explain(user_id, limit).await?;

    if recommendations.is_empty() {
        println!("No recommendations for user {}", user_id);
        return Ok(());
    }
    print_recommendations(&recommendations, explain);
    println!("({} results in {:?})", recommendations.len(), start.elapsed());
    Ok(())
}

/// Handle the 'cache' command. Returns true when a new cache row was written.
async fn handle_cache(orchestrator: &RecommendationOrchestrator, user_id: UserId) -> Result<bool> {
    let had_row = orchestrator
        .with_read(move |index| Ok(index.recommendation_cache(user_id).is_some()))
        .await?;
    let movie_ids = orchestrator.get_or_build_cache(user_id).await?;

    let source = if had_row { "cached" } else { "freshly built" };
    println!(
        "{}",
        format!("Recommendations for user {} ({}):", user_id, source)
            .bold()
            .blue()
    );
    print_movie_list(orchestrator, movie_ids).await?;
    Ok(!had_row)
}

/// Handle the 'popular' command
async fn handle_popular(orchestrator: &RecommendationOrchestrator, limit: usize) -> Result<()> {
    let movie_ids = orchestrator.popular(limit).await?;
    println!("{}", "Popular movies:".bold().blue());
    print_movie_list(orchestrator, movie_ids).await
}

/// Handle the 'trending' command
async fn handle_trending(
    orchestrator: &RecommendationOrchestrator,
    days: u32,
    limit: usize,
) -> Result<()> {
    let ranked = orchestrator.trending(days, limit).await?;
    let rows: Vec<(MovieId, String, u32)> = orchestrator
        .with_read(move |index| {
            Ok(ranked
                .into_iter()
                .map(|(id, clicks)| {
                    let title = index
                        .get_movie(id)
                        .map(|m| m.title.clone())
                        .unwrap_or_else(|| "<deleted>".to_string());
                    (id, title, clicks)
                })
                .collect())
        })
        .await?;

    println!(
        "{}",
        format!("Trending over the last {} days:", days).bold().blue()
    );
    if rows.is_empty() {
        println!("No clicks in this window");
    }
    for (rank, (id, title, clicks)) in rows.iter().enumerate() {
        println!(
            "{}. {} {} - {} clicks",
            (rank + 1).to_string().green(),
            id,
            title,
            clicks
        );
    }
    Ok(())
}

/// Handle the 'recompute' command
async fn handle_recompute(
    orchestrator: &RecommendationOrchestrator,
    movie_id: Option<MovieId>,
) -> Result<bool> {
    match movie_id {
        Some(movie_id) => match orchestrator.recompute_movie_aggregate(movie_id).await? {
            Some(stats) => {
                println!(
                    "{} Movie {}: avg {:.2} over {} ratings",
                    "✓".green(),
                    movie_id,
                    stats.avg_rating,
                    stats.rating_count
                );
                Ok(true)
            }
            None => {
                println!("Movie {} does not exist, nothing to recompute", movie_id);
                Ok(false)
            }
        },
        None => {
            let updated = orchestrator.recompute_all_aggregates().await?;
            println!("{} Recomputed aggregates for {} movies", "✓".green(), updated);
            Ok(updated > 0)
        }
    }
}

/// Handle the 'similar' command
async fn handle_similar(
    orchestrator: &RecommendationOrchestrator,
    object_type: ObjectType,
    object_id: ObjectId,
    model_version: Option<String>,
    limit: usize,
) -> Result<()> {
    let similar = orchestrator
        .similar_items(object_type, object_id, model_version, limit)
        .await?;

    let labelled: Vec<(ObjectId, f32, String)> = orchestrator
        .with_read(move |index| {
            Ok(similar
                .into_iter()
                .map(|(id, similarity)| (id, similarity, object_label(index, object_type, id)))
                .collect())
        })
        .await?;

    println!(
        "{}",
        format!("Most similar to {} {}:", object_type, object_id)
            .bold()
            .blue()
    );
    for (rank, (id, similarity, label)) in labelled.iter().enumerate() {
        println!(
            "{}. {} {} - similarity {:.3}",
            (rank + 1).to_string().green(),
            id,
            label,
            similarity
        );
    }
    Ok(())
}

fn object_label(index: &DataIndex, object_type: ObjectType, id: ObjectId) -> String {
    match object_type {
        ObjectType::Movie => index.get_movie(id).map(|m| m.title.clone()),
        ObjectType::User => index.get_user(id).map(|u| u.username.clone()),
        ObjectType::Tag => index.get_tag(id).map(|t| t.name.clone()),
    }
    .unwrap_or_default()
}

/// Handle the 'user' command
async fn handle_user(orchestrator: &RecommendationOrchestrator, user_id: UserId) -> Result<()> {
    let taste = orchestrator.config().taste_config();
    let lines = orchestrator
        .with_read(move |index| {
            let user = index
                .get_user(user_id)
                .ok_or_else(|| data_loader::DataError::not_found("User", user_id))?;
            let profile = sources::build_taste_profile(index, user_id, &taste)?;
            let ratings = index.get_user_ratings(user_id);

            let mut lines = vec![format!("User ID: {} ({})", user_id, user.username)
                .bold()
                .blue()
                .to_string()];

            let num_ratings = ratings.len();
            let avg_rating = if num_ratings > 0 {
                ratings.iter().map(|r| r.rating as f64).sum::<f64>() / num_ratings as f64
            } else {
                0.0
            };
            lines.push(format!("{}Number of ratings: {}", "• ".cyan(), num_ratings));
            lines.push(format!("{}Average rating: {:.2}", "• ".cyan(), avg_rating));
            lines.push(format!(
                "{}Liked movies (>= {:.1}): {}",
                "• ".cyan(),
                taste.like_threshold,
                profile.liked_movies.len()
            ));

            let genre_names: Vec<String> = profile
                .top_genres
                .iter()
                .filter_map(|&id| index.get_genre(id).map(|g| g.name.clone()))
                .collect();
            let tag_names: Vec<String> = profile
                .top_tags
                .iter()
                .filter_map(|&id| index.get_tag(id).map(|t| t.name.clone()))
                .collect();
            lines.push(format!("{}Top genres: {}", "• ".green(), genre_names.join(", ")));
            lines.push(format!("{}Top tags: {}", "• ".green(), tag_names.join(", ")));

            let mut top_rated: Vec<_> = ratings.iter().collect();
            top_rated.sort_by(|a, b| {
                b.rating
                    .total_cmp(&a.rating)
                    .then_with(|| a.movie_id.cmp(&b.movie_id))
            });
            lines.push("Top rated movies:".to_string());
            for rating in top_rated.iter().take(5) {
                if let Some(movie) = index.get_movie(rating.movie_id) {
                    lines.push(format!("  - {} (Rating: {:.1})", movie.title, rating.rating));
                }
            }
            Ok(lines)
        })
        .await?;

    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// Handle the 'search' command
async fn handle_search(orchestrator: &RecommendationOrchestrator, title: String) -> Result<()> {
    let title_lower = title.to_lowercase();
    let matches = orchestrator
        .with_read(move |index| {
            // (relevance, id, title, genres, avg, count); exact matches rank first
            let mut matches: Vec<(u8, MovieId, String, Vec<String>, f32, u32)> = index
                .movie_ids()
                .into_iter()
                .filter_map(|movie_id| {
                    let movie = index.get_movie(movie_id)?;
                    let movie_title_lower = movie.title.to_lowercase();
                    let relevance = if movie_title_lower == title_lower {
                        0
                    } else if movie_title_lower.contains(&title_lower) {
                        1
                    } else {
                        return None;
                    };
                    let stats = index.get_movie_stats(movie_id).copied().unwrap_or_default();
                    Some((
                        relevance,
                        movie_id,
                        movie.title.clone(),
                        index.genre_names_of(movie),
                        stats.avg_rating,
                        stats.rating_count,
                    ))
                })
                .collect();

            matches.sort_by(|a, b| {
                a.0.cmp(&b.0)
                    .then_with(|| b.4.total_cmp(&a.4))
                    .then_with(|| a.1.cmp(&b.1))
            });
            matches.truncate(20);
            Ok(matches)
        })
        .await?;

    println!("{}", format!("Search results for '{}':", title).bold().blue());
    if matches.is_empty() {
        println!("No movies found");
    }
    for (_, movie_id, movie_title, genres, avg_rating, rating_count) in &matches {
        println!(
            "{}: {} [{}] avg {:.2} ({} ratings)",
            movie_id,
            movie_title,
            genres.join(", "),
            avg_rating,
            rating_count
        );
    }
    Ok(())
}

/// Print a ranked list of movie ids with titles
async fn print_movie_list(
    orchestrator: &RecommendationOrchestrator,
    movie_ids: Vec<MovieId>,
) -> Result<()> {
    let rows: Vec<(MovieId, String, f32, u32)> = orchestrator
        .with_read(move |index| {
            Ok(movie_ids
                .into_iter()
                .map(|id| {
                    let title = index
                        .get_movie(id)
                        .map(|m| m.title.clone())
                        .unwrap_or_else(|| "<deleted>".to_string());
                    let stats = index.get_movie_stats(id).copied().unwrap_or_default();
                    (id, title, stats.avg_rating, stats.rating_count)
                })
                .collect())
        })
        .await?;

    for (rank, (id, title, avg_rating, rating_count)) in rows.iter().enumerate() {
        println!(
            "{}. {} {} - avg {:.2} ({} ratings)",
            (rank + 1).to_string().green(),
            id,
            title,
            avg_rating,
            rating_count
        );
    }
    Ok(())
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &[MovieRecommendation], explain: bool) {
    println!("{}", "Movie Recommendations:".bold().blue());
    for (rank, rec) in recommendations.iter().enumerate() {
        let year = rec
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "????".to_string());
        println!(
            "{}. {} ({}) [{}] - Score: {:.2}",
            (rank + 1).to_string().green(),
            rec.title,
            year,
            rec.genres.join(", "),
            rec.score
        );
        if explain {
            println!("   {}", rec.explanation.dimmed());
            if !rec.tags.is_empty() {
                println!("   Tags: {}", rec.tags.join(", "));
            }
        }
    }
}
