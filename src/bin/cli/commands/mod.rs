pub mod backup;
pub mod cards;
pub mod decks;
pub mod generate;
pub mod review;
