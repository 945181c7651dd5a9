mod error;
mod population;
mod ledger;
mod filter;
mod series;
mod table;
mod mortality;
mod view;
mod testing;

use std::io;
use std::fs::File;
use std::path::PathBuf;

use chrono::naive::NaiveDate;
use clap::Parser;
use serde::Serialize;

use error::Result;
use filter::{Breakdown,FilterState,Scope};
use ledger::{Ledger,Totals};
use population::Population;
use view::View;


#[derive(Parser,Debug)]
#[command(name = "ph-case-views")]
#[command(about = "Derived COVID-19 case views from a DOH case information data drop", long_about = None)]
struct Cli {
    /// Case information CSV
    #[arg(long)]
    cases: PathBuf,

    /// Population CSV (name,pop_2015)
    #[arg(long)]
    population: PathBuf,

    /// Testing aggregates CSV (facility_name,cumulative_unique_individuals)
    #[arg(long)]
    tests: Option<PathBuf>,

    /// Output JSON file (stdout if absent)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Display aggregate national data
    #[arg(long)]
    national: bool,

    /// Restrict provinces to these regions (none: any region)
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Provinces to display (an empty name selects nothing)
    #[arg(long = "province", default_value = "METRO MANILA")]
    provinces: Vec<String>,

    /// Group provincial data together
    #[arg(long, conflicts_with = "national")]
    merge: bool,

    /// Break down cases by these dimensions
    #[arg(long = "breakdown", value_enum)]
    breakdown: Vec<Breakdown>,
}

impl Cli {

    fn filter_state(&self) -> FilterState {
	let provinces : Vec<String> = self.provinces.iter()
	    .filter(|name| !name.trim().is_empty()).cloned().collect();
	FilterState {
	    scope: match (self.national, provinces.is_empty()) {
		(true, _) => Scope::National,
		(false, true) => Scope::None,
		(false, false) => Scope::Provinces {
		    provinces,
		    regions: self.regions.clone(),
		    merge: self.merge
		}
	    },
	    breakdown: self.breakdown.iter().copied().collect(),
	}
    }

}


/// Ledger-wide summary, independent of the filter state.
#[derive(Serialize,Debug)]
struct Summary {
    #[serde(flatten)]
    totals: Totals,
    #[serde(rename = "PeopleTested")]
    people_tested: Option<u64>,
}

#[derive(Serialize,Debug)]
struct Report<'a> {
    summary: Summary,
    #[serde(flatten)]
    view: &'a View,
}


fn main() {

    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
	eprintln!("Error: {}", err);
	std::process::exit(1);
    }

}


fn run(cli: &Cli) -> Result<()> {

    let ledger = Ledger::from_csv(&cli.cases)?;
    let population = Population::load(&cli.population)?;

    let people_tested = match &cli.tests {
	Some(path) => Some(testing::people_tested(&testing::load(path)?)),
	None => None,
    };

    let totals = ledger.totals();
    log::info!("{} cases, {} deaths, {} recoveries, {:?} people tested",
	       totals.cases, totals.deaths, totals.recoveries, people_tested);

    let view = view::compute_view(&ledger, &population, &cli.filter_state());
    log::info!("{} time series points, {} aggregate rows, {} rate rows",
	       view.time_series.len(), view.aggregates.len(), view.rates.len());

    let report = Report { summary: Summary { totals, people_tested }, view: &view };
    match &cli.output {
	Some(path) => serde_json::to_writer_pretty(io::BufWriter::new(File::create(path)?), &report)?,
	None => serde_json::to_writer_pretty(io::stdout().lock(), &report)?,
    }

    Ok(())

}


/// Calendar days from the first date up to and including the second, or
/// without end if there is none.
#[derive(Clone,Debug)]
pub struct NaiveDateRange(NaiveDate,Option<NaiveDate>);

impl NaiveDateRange {

    pub fn empty() -> Self {
	NaiveDateRange(NaiveDate::MAX, Some(NaiveDate::MIN))
    }

}

impl Iterator for NaiveDateRange {
    type Item = NaiveDate;
    fn next(&mut self) -> Option<NaiveDate> {
	match self.1.map_or(true, |end| self.0 <= end) {
	    false => None,
	    true => {
		let current = self.0;
		match self.0.succ_opt() {
		    Some(next) => self.0 = next,
		    None => *self = Self::empty(),
		}
		Some(current)
	    }
	}
    }
}
