//! # Sources Crate
//!
//! Candidate-side signals for movie recommendations.
//!
//! ## Components
//!
//! ### Taste profile
//! What a user likes, derived from their rating history:
//! - Liked set: movies rated >= 4.0
//! - Top 5 genres and top 10 tags among the liked set
//!
//! ### Popular source
//! Non-personalized ranking by average rating, then rating count. An explicit
//! fallback for anonymous users, never substituted automatically.
//!
//! ### Trending
//! Movies ranked by click events inside a recent time window.
//!
//! ### Similar items
//! Cosine similarity over stored embeddings of one object type and model version.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{build_taste_profile, popular, similar_items, trending, window_start, TasteConfig};
//! use data_loader::{DataIndex, ObjectType};
//!
//! let profile = build_taste_profile(&index, user_id, &TasteConfig::default())?;
//! let fallback = popular(&index, 20);
//! let hot = trending(&index, window_start(now, 7), 20);
//! let neighbours = similar_items(&index, ObjectType::Movie, 42, "v1", 10)?;
//! ```

// Public modules
pub mod popular;
pub mod similar;
pub mod taste;
pub mod trending;

// Re-export commonly used items
pub use popular::popular;
pub use similar::{cosine_similarity, similar_items};
pub use taste::{build_taste_profile, TasteConfig, TasteProfile};
pub use trending::{trending, window_start, SECONDS_PER_DAY};

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{DataIndex, Movie, User, aggregates};

    fn create_test_index() -> DataIndex {
        let mut index = DataIndex::new();

        index.insert_user(User {
            id: 1,
            username: "alice".to_string(),
        });

        let action = index.get_or_insert_genre("Action");
        let mut movie = Movie::new(1, "Test Movie");
        movie.release_year = Some(2000);
        movie.genre_ids = vec![action];
        index.insert_movie(movie);

        aggregates::rate(&mut index, 1, 1, 5.0, 1000000).unwrap();

        index
    }

    #[test]
    fn test_profile_and_popular_agree_on_catalog() {
        let index = create_test_index();
        let profile = build_taste_profile(&index, 1, &TasteConfig::default()).unwrap();
        assert!(profile.liked_movies.contains(&1));

        // Popular ignores taste entirely, so the liked movie is still listed
        assert_eq!(popular(&index, 5), vec![1]);
    }
}
