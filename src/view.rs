use serde::Serialize;

use super::filter::{FilterState,Resolution};
use super::ledger::{Ledger,CaseRecord};
use super::population::Population;
use super::series::{self,TimeSeriesPoint};
use super::table::{self,AggregateRow};
use super::mortality::{self,RateRow};


/// Everything the presentation layer needs for one filter state.
#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct View {
    pub columns: Vec<&'static str>,
    pub time_series: Vec<TimeSeriesPoint>,
    pub aggregates: Vec<AggregateRow>,
    pub rates: Vec<RateRow>,
}


/// Derive all views for `state`. Total and deterministic: an empty selection
/// gives empty lists.
pub fn compute_view(ledger: &Ledger, registry: &Population, state: &FilterState) -> View {

    let resolution = Resolution::resolve(state);
    let predicate = |record: &CaseRecord| resolution.predicate.matches(record);

    let records : Vec<&CaseRecord> = ledger.query(predicate).collect();
    let span = ledger.date_range(predicate);
    let resolution = resolution.clone().settle(records.iter().copied());

    log::debug!("{} of {} records selected, report dates {:?}",
		records.len(), ledger.len(), span);

    View {
	columns: table::columns(&resolution.dimensions()),
	time_series: series::build(records.iter().copied(), span, &resolution, registry),
	aggregates: table::build(records.iter().copied(), &resolution),
	rates: mortality::build(records.iter().copied(), &resolution),
    }

}


#[cfg(test)]
mod tests {

    use std::collections::BTreeMap;

    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;
    use crate::filter::{Scope,Breakdown,GroupKey};
    use crate::ledger::{RawCase,Totals};
    use crate::ledger::tests::{raw,date};

    fn provinces(names: &[&str], merge: bool) -> Scope {
	Scope::Provinces {
	    provinces: names.iter().map(|n| n.to_string()).collect(),
	    regions: Vec::new(),
	    merge
	}
    }

    fn state(scope: Scope, breakdown: &[Breakdown]) -> FilterState {
	FilterState { scope, breakdown: breakdown.iter().copied().collect() }
    }

    #[test]
    fn single_province_view() {
	let ledger = Ledger::load(vec![
	    raw("C1", "A", "2020-04-01", "Died"),
	    raw("C2", "A", "2020-04-01", "Active"),
	    raw("C3", "A", "2020-04-02", "Recovered"),
	]).unwrap();
	let registry = Population::new(vec![("A", 1_000_000)]);
	let view = compute_view(&ledger, &registry, &state(provinces(&["A"], false), &[]));

	assert_eq!(view.time_series.iter().map(
	    |p| (p.date, p.key.area.as_str(), p.daily, p.cumulative, p.rate_per_100k)
	).collect::<Vec<_>>(), vec![
	    (date("2020-04-01"), "A", 2, 2, Some(0.2)),
	    (date("2020-04-02"), "A", 1, 3, Some(0.3)),
	]);
	assert_eq!(view.aggregates.len(), 1);
	assert_eq!(view.aggregates[0].key.area, "A");
	assert_eq!(view.aggregates[0].totals, Totals { cases: 3, deaths: 1, recoveries: 1 });
	assert_eq!(view.rates.len(), 1);
	assert_eq!((view.rates[0].cases, view.rates[0].deaths), (3, 1));
	assert!((view.rates[0].death_rate.unwrap() - 1.0 / 3.0).abs() < 1e-12);
	assert_eq!(view.columns, vec!["Province", "Cases", "Deaths", "Recoveries"]);
    }

    #[test]
    fn single_province_matches_direct_query() {
	let ledger = Ledger::load(vec![
	    raw("C1", "METRO MANILA", "2020-04-01", "Died"),
	    raw("C2", "METRO MANILA", "2020-04-03", "Recovered"),
	    raw("C3", "METRO MANILA", "2020-04-03", "Recovered"),
	    raw("C4", "CEBU", "2020-04-02", "Died"),
	    raw("C5", "LAGUNA", "2020-04-05", "Mild"),
	]).unwrap();
	let view = compute_view(&ledger, &Population::default(),
				&state(provinces(&["METRO MANILA"], false), &[]));

	let mut direct = Totals::default();
	ledger.query(|r| r.province.as_deref() == Some("METRO MANILA"))
	    .for_each(|r| direct.add(r));
	assert_eq!(view.aggregates.len(), 1);
	assert_eq!(view.aggregates[0].totals, direct);
	assert!(view.time_series.iter().all(|p| p.rate_per_100k.is_none()));
    }

    #[test]
    fn empty_selection_is_a_valid_view() {
	let ledger = Ledger::load(vec![raw("C1", "A", "2020-04-01", "Died")]).unwrap();
	let registry = Population::default();
	for scope in vec![Scope::None, provinces(&[], true), provinces(&["Z"], false)] {
	    let view = compute_view(&ledger, &registry, &state(scope, &[Breakdown::Sex]));
	    assert!(view.time_series.is_empty());
	    assert!(view.aggregates.is_empty());
	    assert!(view.rates.is_empty());
	}
	let view = compute_view(&Ledger::default(), &registry, &state(Scope::National, &[]));
	assert!(view.time_series.is_empty() && view.aggregates.is_empty() && view.rates.is_empty());
    }

    #[test]
    fn merged_view_sums_member_populations() {
	let ledger = Ledger::load(vec![
	    raw("C1", "A", "2020-04-01", "Died"),
	    raw("C2", "B", "2020-04-01", "Active"),
	]).unwrap();
	let registry = Population::new(vec![("A", 100_000), ("B", 100_000)]);
	let view = compute_view(&ledger, &registry, &state(provinces(&["A", "B"], true), &[]));

	assert_eq!(view.time_series.len(), 1);
	assert_eq!(view.time_series[0].key.area, "2 PROVINCES");
	assert_eq!(view.time_series[0].population, Some(200_000));
	assert_eq!(view.time_series[0].rate_per_100k, Some(1.0));
	assert_eq!(view.rates[0].death_rate, Some(0.5));
    }

    #[test]
    fn region_restriction_trims_merged_population() {
	let mut cebu = raw("C2", "CEBU", "2020-04-01", "Active");
	cebu.region = Some("Region VII".to_string());
	let ledger = Ledger::load(vec![raw("C1", "METRO MANILA", "2020-04-01", "Died"), cebu]).unwrap();
	let registry = Population::new(vec![("METRO MANILA", 100_000), ("CEBU", 900_000)]);
	let scope = Scope::Provinces {
	    provinces: vec!["METRO MANILA".to_string(), "CEBU".to_string()],
	    regions: vec!["NCR".to_string()],
	    merge: true
	};
	let view = compute_view(&ledger, &registry, &state(scope, &[]));

	assert_eq!(view.time_series.len(), 1);
	let point = &view.time_series[0];
	assert_eq!(point.key.area, "1 PROVINCES");
	assert_eq!(point.population, Some(100_000));
	assert_eq!(point.rate_per_100k, Some(1.0));
	assert_eq!(view.aggregates[0].totals, Totals { cases: 1, deaths: 1, recoveries: 0 });
    }


    fn ledger_strategy() -> impl Strategy<Value = Ledger> {
	proptest::collection::vec((0..4usize, 0..20i64, 0..3usize, 0..18usize, 0..3usize), 0..60)
	    .prop_map(|rows| {
		let provinces = ["A", "B", "C", "D"];
		let statuses = ["Mild", "Died", "Recovered"];
		let sexes = ["Male", "Female", ""];
		let start = date("2020-03-01");
		Ledger::load(rows.into_iter().enumerate().map(
		    |(i,(province,offset,status,age,sex))| RawCase {
			case_code: Some(format!("C{}", i)),
			region: Some("R".to_string()),
			province: Some(provinces[province].to_string()),
			age_group: crate::ledger::AgeGroup::BANDS.get(age).map(|a| a.label().to_string()),
			sex: Some(sexes[sex].to_string()),
			health_status: Some(statuses[status].to_string()),
			date_reported: Some((start + Duration::days(offset)).format("%Y-%m-%d").to_string()),
			date_died: None,
			date_recovered: None,
		    }
		)).unwrap()
	    })
    }

    fn state_strategy() -> impl Strategy<Value = FilterState> {
	let scope = prop_oneof![
	    Just(Scope::None),
	    Just(Scope::National),
	    (proptest::collection::vec(0..5usize, 0..4), any::<bool>()).prop_map(|(picks,merge)| {
		let names = ["A", "B", "C", "D", "E"];
		provinces(&picks.into_iter().map(|i| names[i]).collect::<Vec<_>>(), merge)
	    }),
	];
	(scope, any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(scope,age,sex,status)| {
	    let breakdown = vec![(age, Breakdown::AgeGroup), (sex, Breakdown::Sex),
				 (status, Breakdown::HealthStatus)];
	    FilterState {
		scope,
		breakdown: breakdown.into_iter().filter(|(on,_)| *on).map(|(_,b)| b).collect()
	    }
	})
    }

    fn registry() -> Population {
	Population::new(vec![("PHILIPPINES", 1_000_000), ("A", 1000), ("B", 0), ("C", 5000)])
    }

    fn without_status(key: &GroupKey) -> GroupKey {
	GroupKey { health_status: None, ..key.clone() }
    }

    proptest! {

	#[test]
	fn series_totals_match_aggregates(ledger in ledger_strategy(), state in state_strategy()) {
	    let view = compute_view(&ledger, &registry(), &state);

	    let mut daily_sums = BTreeMap::new();
	    for point in &view.time_series {
		*daily_sums.entry(point.key.clone()).or_insert(0) += point.daily;
	    }
	    let mut aggregate_sums = BTreeMap::new();
	    for row in &view.aggregates {
		prop_assert!(row.totals.deaths + row.totals.recoveries <= row.totals.cases);
		*aggregate_sums.entry(without_status(&row.key)).or_insert(0) += row.totals.cases;
	    }
	    let rate_sums : BTreeMap<_,_> = view.rates.iter()
		.map(|row| (row.key.clone(), row.cases)).collect();

	    prop_assert_eq!(&daily_sums, &aggregate_sums);
	    prop_assert_eq!(&daily_sums, &rate_sums);
	}

	#[test]
	fn cumulative_series_are_contiguous_and_monotonic(ledger in ledger_strategy(),
							  state in state_strategy()) {
	    let view = compute_view(&ledger, &registry(), &state);

	    for pair in view.time_series.windows(2) {
		let (prev,next) = (&pair[0], &pair[1]);
		if prev.key == next.key {
		    prop_assert_eq!(prev.date.succ_opt(), Some(next.date));
		    prop_assert_eq!(next.cumulative, prev.cumulative + next.daily);
		} else {
		    prop_assert_eq!(next.cumulative, next.daily);
		}
	    }
	    if let Some(first) = view.time_series.first() {
		prop_assert_eq!(first.cumulative, first.daily);
	    }

	    let final_totals : BTreeMap<_,_> = view.time_series.iter()
		.map(|point| (point.key.clone(), point.cumulative)).collect();
	    let rate_cases : BTreeMap<_,_> = view.rates.iter()
		.map(|row| (row.key.clone(), row.cases)).collect();
	    prop_assert_eq!(final_totals, rate_cases);
	    for point in &view.time_series {
		match point.population {
		    Some(pop) if pop > 0 => {
			prop_assert!(point.rate_per_100k.map_or(false, f64::is_finite));
		    },
		    _ => {
			prop_assert!(point.rate_per_100k.is_none());
		    },
		}
	    }
	}

	#[test]
	fn death_rates_are_proportions(ledger in ledger_strategy(), state in state_strategy()) {
	    let view = compute_view(&ledger, &registry(), &state);
	    for row in &view.rates {
		prop_assert!(row.cases > 0);
		prop_assert!(row.key.health_status.is_none());
		let rate = row.death_rate.unwrap();
		prop_assert!((0.0..=1.0).contains(&rate));
	    }
	}

	#[test]
	fn views_are_idempotent(ledger in ledger_strategy(), state in state_strategy()) {
	    let first = serde_json::to_string(&compute_view(&ledger, &registry(), &state)).unwrap();
	    let second = serde_json::to_string(&compute_view(&ledger, &registry(), &state)).unwrap();
	    prop_assert_eq!(first, second);
	}

    }

}
