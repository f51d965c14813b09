//! Process-wide domain registries. Each registry guards one collection
//! behind its own lock; no code path acquires two registry locks at once.
//! Reads that feed longer computations clone a snapshot under the lock and
//! work on the copy, so the request path and the ranking engine contend
//! only briefly.

use log::info;
use shared::model::{Badge, Hotel, HotelRate, Review, User};
use shared::DomainError;
use tokio::sync::RwLock;

/// Folds one more value into a running average of `count` values, rounded
/// to one decimal.
pub fn incremental_avg(count: u32, avg: f32, value: f32) -> f32 {
    let total = avg * count as f32;
    let new_avg = (total + value) / (count + 1) as f32;
    (new_avg * 10.0).round() / 10.0
}

pub struct HotelRegistry {
    hotels: RwLock<Vec<Hotel>>,
}

impl HotelRegistry {
    pub fn new(hotels: Vec<Hotel>) -> Self {
        Self {
            hotels: RwLock::new(hotels),
        }
    }

    /// Copy of the whole registry, taken under the read lock.
    pub async fn snapshot(&self) -> Vec<Hotel> {
        self.hotels.read().await.clone()
    }

    /// Hotels located in `city`, matched case-insensitively. The registry
    /// is copied under the lock and filtered after releasing it.
    pub async fn by_city(&self, city: &str) -> Vec<Hotel> {
        let copy = self.hotels.read().await.clone();
        copy.into_iter()
            .filter(|hotel| hotel.city.eq_ignore_ascii_case(city))
            .collect()
    }

    /// Case-insensitive lookup on both name and city.
    pub async fn find(&self, name: &str, city: &str) -> Option<Hotel> {
        self.by_city(city)
            .await
            .into_iter()
            .find(|hotel| hotel.name.eq_ignore_ascii_case(name))
    }

    /// Distinct city names, in first-seen registry order.
    pub async fn cities(&self) -> Vec<String> {
        let copy = self.hotels.read().await.clone();
        let mut cities: Vec<String> = Vec::new();
        for hotel in copy {
            if !cities
                .iter()
                .any(|city| city.eq_ignore_ascii_case(&hotel.city))
            {
                cities.push(hotel.city);
            }
        }
        cities
    }

    /// Folds one review's scores into the hotel's running averages and
    /// bumps its review counter, all inside a single write-lock critical
    /// section so concurrent insertions on the same hotel never lose an
    /// update. Returns false when the hotel id is unknown.
    pub async fn apply_review(&self, hotel_id: u32, rate: f32, ratings: HotelRate) -> bool {
        let mut hotels = self.hotels.write().await;
        let Some(hotel) = hotels.iter_mut().find(|hotel| hotel.id == hotel_id) else {
            return false;
        };

        let n = hotel.review_count;
        hotel.rate = incremental_avg(n, hotel.rate, rate);
        hotel.ratings.cleaning = incremental_avg(n, hotel.ratings.cleaning, ratings.cleaning);
        hotel.ratings.position = incremental_avg(n, hotel.ratings.position, ratings.position);
        hotel.ratings.services = incremental_avg(n, hotel.ratings.services, ratings.services);
        hotel.ratings.quality = incremental_avg(n, hotel.ratings.quality, ratings.quality);
        hotel.review_count = n + 1;
        true
    }

    /// Writes recomputed ranks back in one pass. `ranks` pairs a hotel id
    /// with its new `(global_rank, local_rank)`.
    pub async fn apply_ranks(&self, ranks: &[(u32, f64, u32)]) {
        let mut hotels = self.hotels.write().await;
        for &(id, global_rank, local_rank) in ranks {
            if let Some(hotel) = hotels.iter_mut().find(|hotel| hotel.id == id) {
                hotel.global_rank = global_rank;
                hotel.local_rank = local_rank;
            }
        }
    }
}

pub struct UserRegistry {
    users: RwLock<Vec<User>>,
}

impl UserRegistry {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub async fn snapshot(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    /// Case-insensitive username lookup.
    pub async fn find(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .await
            .iter()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned()
    }

    /// True when `password` matches the stored one for `username`.
    pub async fn authenticate(&self, username: &str, password: &str) -> bool {
        self.users
            .read()
            .await
            .iter()
            .any(|user| user.username.eq_ignore_ascii_case(username) && user.password == password)
    }

    /// Adds a new user after validating the credentials.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), DomainError> {
        if username.is_empty() || password.is_empty() {
            return Err(DomainError::EmptyCredentials);
        }
        if username.chars().any(char::is_whitespace)
            || password.chars().any(char::is_whitespace)
        {
            return Err(DomainError::WhitespaceInCredentials);
        }

        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|user| user.username.eq_ignore_ascii_case(username))
        {
            return Err(DomainError::DuplicateUser(username.to_string()));
        }
        users.push(User::new(username, password));
        info!("registered new user {}", username);
        Ok(())
    }

    /// Counts one more review for `username` and returns the re-derived
    /// badge, or None for an unknown user.
    pub async fn record_review(&self, username: &str) -> Option<Badge> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|user| user.username.eq_ignore_ascii_case(username))?;
        user.record_review();
        Some(user.badge)
    }

    pub async fn badge_of(&self, username: &str) -> Option<Badge> {
        self.find(username).await.map(|user| user.badge)
    }
}

pub struct ReviewRegistry {
    reviews: RwLock<Vec<Review>>,
}

impl ReviewRegistry {
    pub fn new(reviews: Vec<Review>) -> Self {
        Self {
            reviews: RwLock::new(reviews),
        }
    }

    pub async fn add(&self, review: Review) {
        self.reviews.write().await.push(review);
    }

    pub async fn snapshot(&self) -> Vec<Review> {
        self.reviews.read().await.clone()
    }

    /// All reviews written for one hotel, copied out.
    pub async fn for_hotel(&self, hotel_id: u32) -> Vec<Review> {
        let copy = self.reviews.read().await.clone();
        copy.into_iter()
            .filter(|review| review.hotel_id == hotel_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::sync::Arc;

    fn rome_hotels() -> Vec<Hotel> {
        vec![
            Hotel::new(1, "Hotel Alpha", "by the river", "Rome", "111", vec![]),
            Hotel::new(2, "Hotel Beta", "city centre", "Rome", "222", vec![]),
            Hotel::new(3, "Hotel Gamma", "harbour view", "Genoa", "333", vec![]),
        ]
    }

    #[test]
    fn incremental_avg_matches_true_mean() {
        // [5, 5, 5] -> 5.0
        let mut avg = 0.0;
        for (n, value) in [5.0f32, 5.0, 5.0].iter().enumerate() {
            avg = incremental_avg(n as u32, avg, *value);
        }
        assert_approx_eq!(avg, 5.0);

        // [1, 5] -> 3.0
        let mut avg = 0.0;
        for (n, value) in [1.0f32, 5.0].iter().enumerate() {
            avg = incremental_avg(n as u32, avg, *value);
        }
        assert_approx_eq!(avg, 3.0);
    }

    #[test]
    fn incremental_avg_rounds_to_one_decimal() {
        // (4 + 5) / 2 = 4.5, (4.5 * 2 + 2) / 3 = 3.666... -> 3.7
        let avg = incremental_avg(0, 0.0, 4.0);
        let avg = incremental_avg(1, avg, 5.0);
        let avg = incremental_avg(2, avg, 2.0);
        assert_approx_eq!(avg, 3.7);
    }

    #[tokio::test]
    async fn by_city_is_case_insensitive_and_copies() {
        let registry = HotelRegistry::new(rome_hotels());

        let hotels = registry.by_city("rome").await;
        assert_eq!(hotels.len(), 2);

        let hotels = registry.by_city("ROME").await;
        assert_eq!(hotels.len(), 2);

        assert!(registry.by_city("Milan").await.is_empty());
    }

    #[tokio::test]
    async fn find_matches_name_and_city_case_insensitively() {
        let registry = HotelRegistry::new(rome_hotels());

        let hotel = registry.find("hotel alpha", "ROME").await;
        assert_eq!(hotel.map(|h| h.id), Some(1));

        assert!(registry.find("Hotel Alpha", "Genoa").await.is_none());
    }

    #[tokio::test]
    async fn apply_review_updates_averages_and_counter() {
        let registry = HotelRegistry::new(rome_hotels());
        let facets = HotelRate {
            cleaning: 4.0,
            position: 3.0,
            services: 5.0,
            quality: 4.0,
        };

        assert!(registry.apply_review(1, 4.0, facets).await);
        assert!(registry.apply_review(1, 5.0, facets).await);

        let hotel = registry.find("Hotel Alpha", "Rome").await.unwrap();
        assert_eq!(hotel.review_count, 2);
        assert_approx_eq!(hotel.rate, 4.5);
        assert_approx_eq!(hotel.ratings.cleaning, 4.0);
        assert_approx_eq!(hotel.ratings.services, 5.0);

        assert!(!registry.apply_review(99, 4.0, facets).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reviews_never_lose_an_update() {
        let registry = Arc::new(HotelRegistry::new(rome_hotels()));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry
                    .apply_review(1, 4.0, HotelRate::default())
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let hotel = registry.find("Hotel Alpha", "Rome").await.unwrap();
        assert_eq!(hotel.review_count, 32);
    }

    #[tokio::test]
    async fn register_validates_credentials() {
        let registry = UserRegistry::new(vec![]);

        assert_eq!(
            registry.register("", "pw").await,
            Err(DomainError::EmptyCredentials)
        );
        assert_eq!(
            registry.register("an na", "pw").await,
            Err(DomainError::WhitespaceInCredentials)
        );

        assert!(registry.register("anna", "pw").await.is_ok());
        assert_eq!(
            registry.register("ANNA", "other").await,
            Err(DomainError::DuplicateUser("ANNA".to_string()))
        );
    }

    #[tokio::test]
    async fn authenticate_requires_exact_password() {
        let registry = UserRegistry::new(vec![User::new("anna", "Secret")]);

        assert!(registry.authenticate("anna", "Secret").await);
        assert!(registry.authenticate("ANNA", "Secret").await);
        assert!(!registry.authenticate("anna", "secret").await);
        assert!(!registry.authenticate("bruno", "Secret").await);
    }

    #[tokio::test]
    async fn record_review_advances_badge_tier() {
        let registry = UserRegistry::new(vec![User::new("anna", "pw")]);

        assert_eq!(registry.record_review("anna").await, Some(Badge::Reviewer));
        assert_eq!(
            registry.record_review("anna").await,
            Some(Badge::ExpertReviewer)
        );
        assert_eq!(registry.record_review("ghost").await, None);
    }

    #[tokio::test]
    async fn reviews_are_filtered_per_hotel() {
        let registry = ReviewRegistry::new(vec![]);
        registry
            .add(Review::new("anna", 1, 4.0, HotelRate::default()))
            .await;
        registry
            .add(Review::new("bruno", 2, 3.0, HotelRate::default()))
            .await;
        registry
            .add(Review::new("carla", 1, 5.0, HotelRate::default()))
            .await;

        assert_eq!(registry.for_hotel(1).await.len(), 2);
        assert_eq!(registry.for_hotel(2).await.len(), 1);
        assert!(registry.for_hotel(3).await.is_empty());
    }
}
