pub mod algorithm;
pub mod availability;
pub mod history;
pub mod lifecycle;
pub mod score;
pub mod slot;
