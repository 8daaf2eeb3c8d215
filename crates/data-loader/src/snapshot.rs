//! JSON snapshot of a `DataIndex`.
//!
//! A snapshot is one JSON document holding every table of the store.
//! Loading rebuilds the indices, deduplicates genre/tag names
//! case-insensitively and validates referential integrity; saving writes
//! tables in ascending id order so diffs stay readable.
//!
//! Saves go to a sibling `.json.tmp` file that is synced and then renamed
//! over the target, so a failed save leaves the previous snapshot in place.

use crate::error::Result;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{info, warn};

/// Stats row as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieStatsRow {
    pub movie_id: MovieId,
    pub avg_rating: f32,
    pub rating_count: u32,
}

/// On-disk layout of the whole store
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub movies: Vec<Movie>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub movie_stats: Vec<MovieStatsRow>,
    #[serde(default)]
    pub recommendation_cache: Vec<RecommendationCache>,
    #[serde(default)]
    pub embeddings: Vec<Embedding>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl DataIndex {
    /// Load a store from a JSON snapshot file
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        let index = Self::from_snapshot(snapshot)?;

        let (users, movies, ratings) = index.counts();
        info!(
            "Loaded snapshot {:?}: {} users, {} movies, {} ratings",
            path, users, movies, ratings
        );
        Ok(index)
    }

    /// Build a store from an in-memory snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut index = DataIndex::new();

        for user in snapshot.users {
            index.insert_user(user);
        }

        // Snapshot ids may collide case-insensitively; remap duplicates onto the first id
        let genre_remap = load_labels(
            snapshot.genres.into_iter().map(|g| (g.id, g.name)),
            &mut index.genres,
            &mut index.genre_names,
            |id, name| Genre { id, name },
        );
        let tag_remap = load_labels(
            snapshot.tags.into_iter().map(|t| (t.id, t.name)),
            &mut index.tags,
            &mut index.tag_names,
            |id, name| Tag { id, name },
        );

        for mut movie in snapshot.movies {
            movie.genre_ids = remap_ids(&movie.genre_ids, &genre_remap);
            movie.tag_ids = remap_ids(&movie.tag_ids, &tag_remap);
            index.insert_movie(movie);
        }

        for rating in snapshot.ratings {
            index.insert_rating(rating);
        }

        for row in snapshot.movie_stats {
            index.movie_stats.insert(
                row.movie_id,
                MovieStats {
                    avg_rating: row.avg_rating,
                    rating_count: row.rating_count,
                },
            );
        }

        for cache in snapshot.recommendation_cache {
            index.rec_cache.insert(cache.user_id, cache);
        }

        for embedding in snapshot.embeddings {
            index.insert_embedding(embedding);
        }

        index.events = snapshot.events;

        index.validate()?;
        Ok(index)
    }

    /// Export the store as a snapshot, tables sorted by id
    pub fn to_snapshot(&self) -> Snapshot {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_unstable_by_key(|u| u.id);

        let mut movies: Vec<Movie> = self.movies.values().cloned().collect();
        movies.sort_unstable_by_key(|m| m.id);

        let mut ratings: Vec<Rating> = self.user_ratings.values().flatten().copied().collect();
        ratings.sort_unstable_by_key(|r| (r.user_id, r.movie_id));

        let mut movie_stats: Vec<MovieStatsRow> = self
            .movie_stats
            .iter()
            .map(|(&movie_id, stats)| MovieStatsRow {
                movie_id,
                avg_rating: stats.avg_rating,
                rating_count: stats.rating_count,
            })
            .collect();
        movie_stats.sort_unstable_by_key(|row| row.movie_id);

        let mut recommendation_cache: Vec<RecommendationCache> =
            self.rec_cache.values().cloned().collect();
        recommendation_cache.sort_unstable_by_key(|c| c.user_id);

        let mut embeddings: Vec<Embedding> = self.embeddings.values().cloned().collect();
        embeddings.sort_unstable_by(|a, b| a.key().cmp(&b.key()));

        Snapshot {
            users,
            genres: self.genres.values().cloned().collect(),
            tags: self.tags.values().cloned().collect(),
            movies,
            ratings,
            movie_stats,
            recommendation_cache,
            embeddings,
            events: self.events.clone(),
        }
    }

    /// Write the store to a JSON snapshot file, replacing it atomically
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        if let Err(err) = self.write_snapshot_file(&tmp) {
            if tmp.is_file() {
                if let Err(cleanup) = fs::remove_file(&tmp) {
                    warn!("Could not remove {:?}: {}", tmp, cleanup);
                }
            }
            return Err(err);
        }
        fs::rename(&tmp, path)?;
        info!("Saved snapshot to {:?}", path);
        Ok(())
    }

    fn write_snapshot_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.to_snapshot())?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

/// Insert labels, deduplicating by lowercased name. Returns old id -> kept id.
fn load_labels<L, I, F>(
    labels: I,
    by_id: &mut std::collections::BTreeMap<u32, L>,
    by_name: &mut HashMap<String, u32>,
    make: F,
) -> HashMap<u32, u32>
where
    I: Iterator<Item = (u32, String)>,
    F: Fn(u32, String) -> L,
{
    let mut remap = HashMap::new();
    for (id, name) in labels {
        let key = name.trim().to_lowercase();
        match by_name.get(&key) {
            Some(&kept) => {
                remap.insert(id, kept);
            }
            None => {
                by_name.insert(key, id);
                by_id.insert(id, make(id, name.trim().to_string()));
                remap.insert(id, id);
            }
        }
    }
    remap
}

/// Apply a label remap, keeping unknown ids (validation reports them) and dropping repeats
fn remap_ids(ids: &[u32], remap: &HashMap<u32, u32>) -> Vec<u32> {
    let mut out: Vec<u32> = Vec::with_capacity(ids.len());
    for id in ids {
        let mapped = remap.get(id).copied().unwrap_or(*id);
        if !out.contains(&mapped) {
            out.push(mapped);
        }
    }
    out
}
