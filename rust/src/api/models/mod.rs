pub mod zapping;
