// Technical indicators module
// Moving averages feeding the crossover strategy

pub mod moving_average;

pub use moving_average::{calculate_sma, sma_series};
