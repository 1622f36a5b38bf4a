//! Price data access port trait.

use crate::domain::error::MomentumError;
use crate::domain::price::PriceSeries;
use chrono::NaiveDate;

pub trait PriceDataPort {
    /// Closing prices for one instrument, optionally bounded on either side.
    fn fetch_closes(
        &self,
        instrument: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<PriceSeries, MomentumError>;

    fn list_instruments(&self) -> Result<Vec<String>, MomentumError>;
}
