use std::collections::BTreeMap;

use serde::Serialize;

use super::filter::{Dimension,GroupKey,Resolution};
use super::ledger::{CaseRecord,Totals};


#[derive(Clone,Debug,PartialEq,Eq,Serialize)]
pub struct AggregateRow {
    #[serde(flatten)]
    pub key: GroupKey,
    #[serde(flatten)]
    pub totals: Totals,
}


pub fn build<'a,I>(records: I, resolution: &Resolution) -> Vec<AggregateRow>
where I: IntoIterator<Item = &'a CaseRecord> {

    let mut by_group = BTreeMap::new();

    for record in records {
	if let Some(key) = resolution.key(record, true) {
	    by_group.entry(key).or_insert_with(Totals::default).add(record);
	}
    }

    by_group.into_iter().map(
	|(key,totals)| AggregateRow { key, totals }
    ).collect()

}


/// Column names of the aggregate table, in display order.
pub fn columns(dimensions: &[Dimension]) -> Vec<&'static str> {
    dimensions.iter().map(Dimension::name)
	.chain(vec!["Cases", "Deaths", "Recoveries"])
	.collect()
}
