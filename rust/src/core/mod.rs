pub mod ai;
pub mod zapping;
