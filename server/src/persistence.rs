//! JSON snapshot persistence for the three registries. Saving is invoked
//! after every mutating operation and is never allowed to fail the
//! operation that triggered it; loading happens once at startup, where a
//! missing or malformed hotels snapshot is fatal while users and reviews
//! simply start empty.

use shared::model::{Hotel, Review, User};
use shared::ConfigurationError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const HOTELS_FILE: &str = "hotels.json";
const USERS_FILE: &str = "users.json";
const REVIEWS_FILE: &str = "reviews.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("serialization failure: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn save_hotels(&self, hotels: &[Hotel]) -> Result<(), StorageError> {
        save_json(&self.path(HOTELS_FILE), hotels)
    }

    pub fn save_users(&self, users: &[User]) -> Result<(), StorageError> {
        save_json(&self.path(USERS_FILE), users)
    }

    pub fn save_reviews(&self, reviews: &[Review]) -> Result<(), StorageError> {
        save_json(&self.path(REVIEWS_FILE), reviews)
    }

    /// The hotels snapshot seeds the whole system and must exist.
    pub fn load_hotels(&self) -> Result<Vec<Hotel>, ConfigurationError> {
        let path = self.path(HOTELS_FILE);
        if !path.exists() {
            return Err(ConfigurationError::MissingSnapshot(
                path.display().to_string(),
            ));
        }
        load_json(&path, HOTELS_FILE)
    }

    /// Users accumulate at runtime; a missing snapshot means none yet.
    pub fn load_users(&self) -> Result<Vec<User>, ConfigurationError> {
        let path = self.path(USERS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        load_json(&path, USERS_FILE)
    }

    pub fn load_reviews(&self) -> Result<Vec<Review>, ConfigurationError> {
        let path = self.path(REVIEWS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        load_json(&path, REVIEWS_FILE)
    }
}

fn save_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(
    path: &Path,
    name: &str,
) -> Result<T, ConfigurationError> {
    let json = fs::read_to_string(path).map_err(|e| ConfigurationError::MalformedSnapshot {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&json).map_err(|e| ConfigurationError::MalformedSnapshot {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
