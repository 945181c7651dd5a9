use std::collections::BTreeMap;

use chrono::naive::NaiveDate;
use serde::Serialize;

use super::filter::{GroupKey,Resolution};
use super::ledger::{CaseRecord,DateSpan};
use super::population::{Population,per_100k};


#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct TimeSeriesPoint {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(flatten)]
    pub key: GroupKey,
    #[serde(rename = "Cases")]
    pub daily: u64,
    #[serde(rename = "Total")]
    pub cumulative: u64,
    #[serde(rename = "Population")]
    pub population: Option<u64>,
    #[serde(rename = "Per100k")]
    pub rate_per_100k: Option<f64>,
}


/// Daily reported cases per group, zero-filled over every date of `span`,
/// with running totals and per-100k rates. Groups never include health
/// status.
pub fn build<'a,I>(records: I, span: DateSpan, resolution: &Resolution,
		   registry: &Population) -> Vec<TimeSeriesPoint>
where I: IntoIterator<Item = &'a CaseRecord> {

    let mut by_group = BTreeMap::new();

    for record in records {
	if let Some(key) = resolution.key(record, false) {
	    *by_group.entry(key).or_insert_with(BTreeMap::new)
		.entry(record.date_reported).or_insert(0) += 1;
	}
    }

    by_group.into_iter().flat_map(|(key,mut series)| {
	let population = resolution.population(&key, registry);
	span.dates().scan(0, move |sum,date| {
	    let daily = series.remove(&date).unwrap_or(0);
	    *sum += daily;
	    Some(TimeSeriesPoint {
		date,
		key: key.clone(),
		daily,
		cumulative: *sum,
		population,
		rate_per_100k: per_100k(*sum, population),
	    })
	})
    }).collect()

}
