//! Domain model: hotels with their running review averages and ranks,
//! immutable reviews, users with activity badges, and the per-city ranking
//! snapshot the server diffs between ranking cycles.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SECS_PER_DAY: u64 = 86_400;

/// Current unix time in whole seconds.
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Per-facet review scores, averaged incrementally on the owning hotel.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct HotelRate {
    pub cleaning: f32,
    pub position: f32,
    pub services: f32,
    pub quality: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Hotel {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub city: String,
    pub phone: String,
    pub services: Vec<String>,
    /// Running average of overall review scores, one-decimal precision.
    pub rate: f32,
    /// Running averages of the four review facets.
    pub ratings: HotelRate,
    pub review_count: u32,
    /// City-independent score recomputed by the ranking engine; stays in
    /// `[1, 5]` once the hotel has at least one review.
    pub global_rank: f64,
    /// 1-based position among the hotels of the same city, dense per city.
    pub local_rank: u32,
}

impl Hotel {
    pub fn new(
        id: u32,
        name: &str,
        description: &str,
        city: &str,
        phone: &str,
        services: Vec<String>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            city: city.to_string(),
            phone: phone.to_string(),
            services,
            rate: 0.0,
            ratings: HotelRate::default(),
            review_count: 0,
            global_rank: 0.0,
            local_rank: 0,
        }
    }
}

/// A submitted review. Immutable once created; owned by the review
/// registry and tied to its hotel by id only.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Review {
    pub author: String,
    pub hotel_id: u32,
    pub rate: f32,
    pub ratings: HotelRate,
    /// Unix seconds at creation time.
    pub created_at: u64,
}

impl Review {
    pub fn new(author: &str, hotel_id: u32, rate: f32, ratings: HotelRate) -> Self {
        Self {
            author: author.to_string(),
            hotel_id,
            rate,
            ratings,
            created_at: now_unix_secs(),
        }
    }

    /// Days elapsed since this review was written, as of `now`.
    pub fn age_days(&self, now: u64) -> f64 {
        now.saturating_sub(self.created_at) as f64 / SECS_PER_DAY as f64
    }
}

/// Reviewer activity tiers, derived only from the number of reviews a user
/// has written.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Reviewer,
    ExpertReviewer,
    Contributor,
    ExpertContributor,
    SuperContributor,
}

impl Badge {
    pub fn from_review_count(count: u32) -> Self {
        match count {
            0 | 1 => Badge::Reviewer,
            2 => Badge::ExpertReviewer,
            3 => Badge::Contributor,
            4 => Badge::ExpertContributor,
            _ => Badge::SuperContributor,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub password: String,
    pub review_count: u32,
    pub badge: Badge,
}

impl User {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            review_count: 0,
            badge: Badge::Reviewer,
        }
    }

    /// Counts one more written review and re-derives the badge tier.
    pub fn record_review(&mut self) {
        self.review_count += 1;
        self.badge = Badge::from_review_count(self.review_count);
    }
}

/// Ordered snapshot of one city's hotels at a point in time. Always holds
/// deep copies so diffing never races with live hotel mutation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocalRanking {
    pub city: String,
    pub hotels: Vec<Hotel>,
}

impl LocalRanking {
    pub fn new(city: &str, hotels: Vec<Hotel>) -> Self {
        Self {
            city: city.to_string(),
            hotels,
        }
    }

    /// True when the ordered hotel identities differ in length or at any
    /// position.
    pub fn differs_from(&self, other: &[Hotel]) -> bool {
        self.hotels.len() != other.len()
            || self
                .hotels
                .iter()
                .zip(other.iter())
                .any(|(a, b)| a.id != b.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_thresholds() {
        assert_eq!(Badge::from_review_count(0), Badge::Reviewer);
        assert_eq!(Badge::from_review_count(1), Badge::Reviewer);
        assert_eq!(Badge::from_review_count(2), Badge::ExpertReviewer);
        assert_eq!(Badge::from_review_count(3), Badge::Contributor);
        assert_eq!(Badge::from_review_count(4), Badge::ExpertContributor);
        assert_eq!(Badge::from_review_count(5), Badge::SuperContributor);
        assert_eq!(Badge::from_review_count(42), Badge::SuperContributor);
    }

    #[test]
    fn record_review_advances_badge() {
        let mut user = User::new("anna", "secret");
        assert_eq!(user.badge, Badge::Reviewer);

        user.record_review();
        assert_eq!(user.review_count, 1);
        assert_eq!(user.badge, Badge::Reviewer);

        user.record_review();
        assert_eq!(user.badge, Badge::ExpertReviewer);
    }

    #[test]
    fn review_age_in_days() {
        let mut review = Review::new("anna", 1, 4.0, HotelRate::default());
        let now = review.created_at;

        assert_eq!(review.age_days(now), 0.0);

        review.created_at = now - 10 * SECS_PER_DAY;
        assert_eq!(review.age_days(now), 10.0);

        // A clock that went backwards never yields a negative age.
        review.created_at = now + SECS_PER_DAY;
        assert_eq!(review.age_days(now), 0.0);
    }

    #[test]
    fn ranking_diff_detects_reorder_and_length() {
        let a = Hotel::new(1, "Alpha", "", "Rome", "", vec![]);
        let b = Hotel::new(2, "Beta", "", "Rome", "", vec![]);

        let snapshot = LocalRanking::new("Rome", vec![a.clone(), b.clone()]);
        assert!(!snapshot.differs_from(&[a.clone(), b.clone()]));
        assert!(snapshot.differs_from(&[b.clone(), a.clone()]));
        assert!(snapshot.differs_from(&[a]));
    }
}
