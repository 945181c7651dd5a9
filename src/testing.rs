use std::fs;
use std::path::Path;
use std::collections::BTreeMap;

use serde::Deserialize;

use super::error::Result;
use super::ledger::decode_source;


/// One facility-day of a DOH testing aggregates data drop.
#[derive(Deserialize,Debug,Clone)]
pub struct TestingRow {
    pub facility_name: String,
    pub cumulative_unique_individuals: Option<u64>,
}


/// People tested nationwide: the highest cumulative count reported by each
/// facility, summed over facilities.
pub fn people_tested<'a,I>(rows: I) -> u64
where I: IntoIterator<Item = &'a TestingRow> {

    let mut by_facility = BTreeMap::new();

    for row in rows {
	if let Some(count) = row.cumulative_unique_individuals {
	    let max = by_facility.entry(row.facility_name.as_str()).or_insert(0);
	    *max = count.max(*max);
	}
    }

    by_facility.values().sum()

}


pub fn load(path: &Path) -> Result<Vec<TestingRow>> {
    let bytes = fs::read(path)?;
    let contents = decode_source(&bytes);
    let rows = csv::Reader::from_reader(contents.as_bytes())
	.into_deserialize::<TestingRow>()
	.collect::<std::result::Result<Vec<_>,_>>()?;
    log::info!("Loaded {} testing aggregate rows from {}", rows.len(), path.display());
    Ok(rows)
}
