pub mod models;
pub mod zapping;
