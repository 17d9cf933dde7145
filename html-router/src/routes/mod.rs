pub mod auth;
pub mod export;
pub mod index;
pub mod result;
pub mod upload;
