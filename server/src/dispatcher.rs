//! Per-connection request handling. A dispatcher interprets one typed
//! request at a time against the shared registries and produces a typed
//! response; every failure becomes an error response for the requesting
//! client and nothing else. The dispatcher also owns the connection's
//! login state and releases it when the connection goes away.

use crate::persistence::Storage;
use crate::registry::{HotelRegistry, ReviewRegistry, UserRegistry};
use crate::session::SessionRegistry;
use log::{error, info, warn};
use shared::model::{HotelRate, Review};
use shared::protocol::Packet;
use shared::DomainError;
use std::sync::Arc;

/// Handles to the process-wide services every dispatcher works against.
/// Constructed once at startup and cloned per connection.
#[derive(Clone)]
pub struct Services {
    pub hotels: Arc<HotelRegistry>,
    pub users: Arc<UserRegistry>,
    pub reviews: Arc<ReviewRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub storage: Arc<Storage>,
}

pub struct Dispatcher {
    services: Services,
    /// Username logged in on this connection, at most one.
    current_user: Option<String>,
}

impl Dispatcher {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            current_user: None,
        }
    }

    /// Maps one inbound request to its response. Non-request packets are
    /// answered with an error response rather than dropped, so a confused
    /// client finds out.
    pub async fn handle(&mut self, packet: Packet) -> Packet {
        let result = match packet {
            Packet::LoginRequest { username, password } => self.login(username, password).await,
            Packet::LogoutRequest => self.logout().await,
            Packet::SearchHotelRequest { name, city } => self.search_hotel(name, city).await,
            Packet::SearchAllHotelsRequest { city } => self.search_all_hotels(city).await,
            Packet::InsertReviewRequest {
                hotel_name,
                city,
                rate,
                ratings,
            } => self.insert_review(hotel_name, city, rate, ratings).await,
            Packet::BadgeRequest => self.badge().await,
            other => {
                warn!("unsupported request packet with tag {}", other.tag());
                return error_response("unsupported request".to_string());
            }
        };

        result.unwrap_or_else(|e| error_response(e.to_string()))
    }

    /// Releases this connection's login without an explicit logout
    /// message; invoked when the connection closes for any reason.
    pub async fn handle_disconnect(&mut self) {
        if let Some(username) = self.current_user.take() {
            self.services.sessions.mark_logged_out(&username).await;
            info!("released login for {} on disconnect", username);
        }
    }

    async fn login(&mut self, username: String, password: String) -> Result<Packet, DomainError> {
        if let Some(current) = &self.current_user {
            return Err(DomainError::AlreadyLoggedIn(current.clone()));
        }

        let user = self
            .services
            .users
            .find(&username)
            .await
            .ok_or(DomainError::UnknownUser)?;

        if !self.services.users.authenticate(&username, &password).await {
            return Err(DomainError::WrongPassword);
        }

        // Claiming the session is atomic, so two connections racing the
        // same user cannot both log in.
        if !self
            .services
            .sessions
            .try_mark_logged_in(&user.username)
            .await
        {
            return Err(DomainError::SessionElsewhere(user.username));
        }

        info!("{} logged in", user.username);
        self.current_user = Some(user.username);
        Ok(Packet::LoginResponse {
            message: "login successful".to_string(),
        })
    }

    async fn logout(&mut self) -> Result<Packet, DomainError> {
        let username = self
            .current_user
            .take()
            .ok_or(DomainError::NotLoggedIn("log out"))?;
        self.services.sessions.mark_logged_out(&username).await;
        info!("{} logged out", username);
        Ok(Packet::LogoutResponse {
            message: "logout successful".to_string(),
        })
    }

    async fn search_hotel(&self, name: String, city: String) -> Result<Packet, DomainError> {
        let hotel = self
            .services
            .hotels
            .find(&name, &city)
            .await
            .ok_or(DomainError::HotelNotFound)?;
        Ok(Packet::SearchHotelResponse { hotel })
    }

    async fn search_all_hotels(&self, city: String) -> Result<Packet, DomainError> {
        let mut hotels = self.services.hotels.by_city(&city).await;
        if hotels.is_empty() {
            return Err(DomainError::NoHotelsFound);
        }
        hotels.sort_by_key(|hotel| hotel.local_rank);
        Ok(Packet::SearchAllHotelsResponse { hotels })
    }

    async fn insert_review(
        &mut self,
        hotel_name: String,
        city: String,
        rate: f32,
        ratings: HotelRate,
    ) -> Result<Packet, DomainError> {
        let author = self
            .current_user
            .clone()
            .ok_or(DomainError::NotLoggedIn("insert a review"))?;

        let hotel = self
            .services
            .hotels
            .find(&hotel_name, &city)
            .await
            .ok_or(DomainError::HotelNotFound)?;

        let review = Review::new(&author, hotel.id, rate, ratings);
        self.services.reviews.add(review).await;
        self.persist_reviews().await;

        self.services.users.record_review(&author).await;
        self.persist_users().await;

        if !self.services.hotels.apply_review(hotel.id, rate, ratings).await {
            warn!("hotel {} vanished while recording a review", hotel.id);
        }
        self.persist_hotels().await;

        info!("{} reviewed {} in {}", author, hotel.name, hotel.city);
        Ok(Packet::InsertReviewResponse {
            message: "review recorded".to_string(),
        })
    }

    async fn badge(&self) -> Result<Packet, DomainError> {
        let username = self
            .current_user
            .as_deref()
            .ok_or(DomainError::NotLoggedIn("request the badge"))?;
        let badge = self
            .services
            .users
            .badge_of(username)
            .await
            .ok_or(DomainError::UnknownUser)?;
        Ok(Packet::BadgeResponse { badge })
    }

    async fn persist_hotels(&self) {
        let snapshot = self.services.hotels.snapshot().await;
        if let Err(e) = self.services.storage.save_hotels(&snapshot) {
            error!("could not persist hotels: {}", e);
        }
    }

    async fn persist_users(&self) {
        let snapshot = self.services.users.snapshot().await;
        if let Err(e) = self.services.storage.save_users(&snapshot) {
            error!("could not persist users: {}", e);
        }
    }

    async fn persist_reviews(&self) {
        let snapshot = self.services.reviews.snapshot().await;
        if let Err(e) = self.services.storage.save_reviews(&snapshot) {
            error!("could not persist reviews: {}", e);
        }
    }
}

fn error_response(message: String) -> Packet {
    Packet::ErrorResponse {
        message: format!("[ERROR] {}", message),
    }
}
