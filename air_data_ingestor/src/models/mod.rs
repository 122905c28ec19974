pub mod coordinate;
pub mod measurement;
pub mod pollutant;
pub mod unit;
pub mod weather;
