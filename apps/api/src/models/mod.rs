pub mod candidate;
pub mod score;
