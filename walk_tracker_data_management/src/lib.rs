use const_format::concatcp;
use uuid::Uuid;

pub mod database;
pub mod memory_store;
mod session_store;

pub use session_store::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "walks.db");

#[derive(Debug)]
pub enum StoreError {
    NotFound(Uuid),
    Storage(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(session_id) => write!(f, "no session with id {session_id}"),
            StoreError::Storage(message) => write!(f, "storage failure: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}
