//! Rebalance calendar.

use chrono::{Datelike, NaiveDate};

use super::params::RebalanceCadence;

/// First trading day of the timeline, then the first trading day of every new
/// calendar month (or ISO week) that follows. `timeline` must be sorted.
pub fn rebalance_dates(timeline: &[NaiveDate], cadence: RebalanceCadence) -> Vec<NaiveDate> {
    let period = |d: &NaiveDate| match cadence {
        RebalanceCadence::Monthly => (d.year(), d.month()),
        RebalanceCadence::Weekly => {
            let week = d.iso_week();
            (week.year(), week.week())
        }
    };

    let mut dates = Vec::new();
    let mut last_period = None;
    for date in timeline {
        let p = period(date);
        if last_period != Some(p) {
            dates.push(*date);
            last_period = Some(p);
        }
    }
    dates
}
