//! Periodic ranking recomputation. On every cycle the engine re-scores all
//! reviewed hotels, re-derives the per-city orderings, persists the result,
//! and compares each city against the snapshot captured on the previous
//! cycle: a new top hotel triggers a multicast announcement, any change in
//! the ordering triggers delivery of the full new ranking to that city's
//! subscribers.

use crate::notify::{MulticastNotifier, SubscriptionRegistry};
use crate::persistence::Storage;
use crate::registry::{HotelRegistry, ReviewRegistry};
use log::{error, info};
use shared::model::{now_unix_secs, Hotel, LocalRanking, Review};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// City-independent score for one hotel: review quality weighted by how
/// recent the hotel's review activity is, plus a volume term, clamped to
/// `[1, 5]` as a whole.
pub fn global_rank(rate: f32, review_count: u32, reviews: &[Review], now: u64) -> f64 {
    let mean_age_days = if reviews.is_empty() {
        0.0
    } else {
        reviews.iter().map(|r| r.age_days(now)).sum::<f64>() / reviews.len() as f64
    };
    // Aging review activity decays the quality term down to half weight.
    let recency_weight = (1.0 - mean_age_days / 100.0).max(0.5);
    let rank = rate as f64 * recency_weight + review_count as f64 / 2.0;
    rank.clamp(1.0, 5.0)
}

pub struct RankingEngine {
    period: Duration,
    hotels: Arc<HotelRegistry>,
    reviews: Arc<ReviewRegistry>,
    storage: Arc<Storage>,
    multicast: Arc<MulticastNotifier>,
    subscriptions: Arc<SubscriptionRegistry>,
    /// Last published per-city ordering, deep-copied; the diff baseline.
    previous: HashMap<String, Vec<Hotel>>,
}

impl RankingEngine {
    pub async fn new(
        period: Duration,
        hotels: Arc<HotelRegistry>,
        reviews: Arc<ReviewRegistry>,
        storage: Arc<Storage>,
        multicast: Arc<MulticastNotifier>,
        subscriptions: Arc<SubscriptionRegistry>,
    ) -> Self {
        let mut engine = Self {
            period,
            hotels,
            reviews,
            storage,
            multicast,
            subscriptions,
            previous: HashMap::new(),
        };
        engine.previous = engine.capture_current().await;
        engine
    }

    /// Per-city orderings as the registry currently holds them, used to
    /// seed the diff baseline at startup.
    async fn capture_current(&self) -> HashMap<String, Vec<Hotel>> {
        let mut map = HashMap::new();
        for city in self.hotels.cities().await {
            let mut city_hotels = self.hotels.by_city(&city).await;
            city_hotels.sort_by_key(|hotel| hotel.local_rank);
            map.insert(city, city_hotels);
        }
        map
    }

    /// Runs cycles on the configured interval until the shutdown signal
    /// flips. A cycle that takes longer than the period skips the missed
    /// ticks instead of bursting.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("ranking engine running every {:?}", self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_cycle().await,
                _ = shutdown.changed() => {
                    info!("ranking engine stopping");
                    break;
                }
            }
        }
    }

    /// One full recomputation: global ranks, local ranks, persistence,
    /// diffing, notifications. Failures in persistence or notification are
    /// logged and never stop the next cycle.
    pub async fn run_cycle(&mut self) {
        let now = now_unix_secs();
        let mut hotels = self.hotels.snapshot().await;
        let reviews = self.reviews.snapshot().await;

        let mut by_hotel: HashMap<u32, Vec<Review>> = HashMap::new();
        for review in reviews {
            by_hotel.entry(review.hotel_id).or_default().push(review);
        }

        // Hotels without any review keep their current rank.
        for hotel in &mut hotels {
            if hotel.review_count == 0 {
                continue;
            }
            let hotel_reviews = by_hotel
                .get(&hotel.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            hotel.global_rank = global_rank(hotel.rate, hotel.review_count, hotel_reviews, now);
        }

        // Derive dense 1-based local ranks per city; the stable sort keeps
        // prior relative order on equal global ranks.
        let mut fresh: Vec<LocalRanking> = Vec::new();
        let mut assignments: Vec<(u32, f64, u32)> = Vec::new();
        for city in distinct_cities(&hotels) {
            let mut city_hotels: Vec<Hotel> = hotels
                .iter()
                .filter(|hotel| hotel.city.eq_ignore_ascii_case(&city))
                .cloned()
                .collect();
            city_hotels.sort_by(|a, b| {
                b.global_rank
                    .partial_cmp(&a.global_rank)
                    .unwrap_or(Ordering::Equal)
            });
            for (position, hotel) in city_hotels.iter_mut().enumerate() {
                hotel.local_rank = (position + 1) as u32;
                assignments.push((hotel.id, hotel.global_rank, hotel.local_rank));
            }
            fresh.push(LocalRanking::new(&city, city_hotels));
        }
        self.hotels.apply_ranks(&assignments).await;

        let snapshot = self.hotels.snapshot().await;
        if let Err(e) = self.storage.save_hotels(&snapshot) {
            error!("could not persist hotels after ranking cycle: {}", e);
        }

        for ranking in fresh {
            let prev = self.previous.get(&ranking.city);

            let top_changed = match (prev.and_then(|p| p.first()), ranking.hotels.first()) {
                (Some(old_top), Some(new_top)) => old_top.id != new_top.id,
                _ => false,
            };
            if top_changed {
                if let Some(top) = ranking.hotels.first() {
                    self.multicast
                        .announce_top_changed(&ranking.city, &top.name)
                        .await;
                }
            }

            let order_changed = prev.map_or(true, |p| ranking.differs_from(p));
            if order_changed {
                self.subscriptions.notify_ranking_changed(&ranking).await;
                self.previous
                    .insert(ranking.city.clone(), ranking.hotels.clone());
            }
        }
    }
}

fn distinct_cities(hotels: &[Hotel]) -> Vec<String> {
    let mut cities: Vec<String> = Vec::new();
    for hotel in hotels {
        if !cities
            .iter()
            .any(|city| city.eq_ignore_ascii_case(&hotel.city))
        {
            cities.push(hotel.city.clone());
        }
    }
    cities
}
