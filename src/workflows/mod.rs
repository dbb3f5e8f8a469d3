pub mod listings;
pub mod polling;
pub mod quotes;
pub mod securecafe;
