use std::collections::BTreeMap;

use serde::Serialize;

use super::filter::{GroupKey,Resolution};
use super::ledger::{CaseRecord,HealthStatus};


#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct RateRow {
    #[serde(flatten)]
    pub key: GroupKey,
    #[serde(rename = "Cases")]
    pub cases: u64,
    #[serde(rename = "Deaths")]
    pub deaths: u64,
    #[serde(rename = "Rate")]
    pub death_rate: Option<f64>,
}


/// Case fatality per group. Health status is the outcome here, never part of
/// the key; groups without cases are left out.
pub fn build<'a,I>(records: I, resolution: &Resolution) -> Vec<RateRow>
where I: IntoIterator<Item = &'a CaseRecord> {

    let mut by_group = BTreeMap::new();

    for record in records {
	if let Some(key) = resolution.key(record, false) {
	    let (cases,deaths) = by_group.entry(key).or_insert((0,0));
	    *cases += 1;
	    if record.health_status == HealthStatus::Died {
		*deaths += 1;
	    }
	}
    }

    by_group.into_iter().filter(|(_,(cases,_))| *cases > 0).map(
	|(key,(cases,deaths))| RateRow {
	    key, cases, deaths,
	    death_rate: fatality(deaths, cases),
	}
    ).collect()

}


fn fatality(deaths: u64, cases: u64) -> Option<f64> {
    match cases {
	0 => None,
	n => Some(deaths as f64 / n as f64),
    }
}
