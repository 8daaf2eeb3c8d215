//! Benchmarks for personalized scoring
//!
//! Run with: cargo bench --package pipeline
//!
//! Builds a synthetic catalog in memory so the benchmark needs no data files.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use data_loader::{aggregates, DataIndex, DatasetWriter, Movie, Rating, User};
use pipeline::Recommender;
use sources::{build_taste_profile, popular, TasteConfig};

const USERS: u32 = 500;
const MOVIES: u32 = 5_000;
const RATINGS_PER_USER: u32 = 40;

fn synthetic_index() -> DataIndex {
    let mut index = DataIndex::new();

    let genres: Vec<u32> = (0..18)
        .map(|i| index.get_or_insert_genre(&format!("genre{}", i)))
        .collect();
    let tags: Vec<u32> = (0..200)
        .map(|i| index.get_or_insert_tag(&format!("tag{}", i)))
        .collect();

    for id in 1..=MOVIES {
        let mut movie = Movie::new(id, format!("Movie {}", id));
        movie.genre_ids = vec![genres[(id % 18) as usize], genres[(id * 7 % 18) as usize]];
        movie.tag_ids = (0..3).map(|j| tags[((id * 31 + j * 17) % 200) as usize]).collect();
        movie.popularity = Some((id % 100) as f32 / 10.0);
        movie.vote_average = Some((id % 10) as f32);
        index.insert_movie(movie);
    }

    for user_id in 1..=USERS {
        index.insert_user(User {
            id: user_id,
            username: format!("user{}", user_id),
        });
        for j in 0..RATINGS_PER_USER {
            let movie_id = (user_id * 97 + j * 131) % MOVIES + 1;
            index
                .upsert_rating(Rating {
                    user_id,
                    movie_id,
                    rating: ((user_id + j) % 11) as f32 / 2.0,
                    timestamp: 0,
                })
                .unwrap();
        }
    }

    // Bulk seed: one batch recompute instead of one per rating
    aggregates::recompute_all_aggregates(&mut index);
    index
}

fn bench_recommend(c: &mut Criterion) {
    let index = synthetic_index();
    let recommender = Recommender::default();

    c.bench_function("recommend_top_50", |b| {
        b.iter(|| {
            let recs = recommender.recommend(&index, black_box(1), black_box(50)).unwrap();
            black_box(recs)
        })
    });
}

fn bench_build_taste_profile(c: &mut Criterion) {
    let index = synthetic_index();
    let config = TasteConfig::default();

    c.bench_function("build_taste_profile", |b| {
        b.iter(|| {
            let profile = build_taste_profile(&index, black_box(1), &config).unwrap();
            black_box(profile)
        })
    });
}

fn bench_popular(c: &mut Criterion) {
    let index = synthetic_index();

    c.bench_function("popular_top_50", |b| {
        b.iter(|| black_box(popular(&index, black_box(50))))
    });
}

fn bench_recompute_all(c: &mut Criterion) {
    let mut index = synthetic_index();

    c.bench_function("recompute_all_aggregates", |b| {
        b.iter(|| black_box(aggregates::recompute_all_aggregates(&mut index)))
    });
}

criterion_group!(
    benches,
    bench_recommend,
    bench_build_taste_profile,
    bench_popular,
    bench_recompute_all
);
criterion_main!(benches);
