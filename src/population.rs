use std::fs;
use std::path::Path;
use std::collections::HashMap;

use serde::Deserialize;
use unidecode::unidecode;

use super::error::Result;
use super::ledger::decode_source;


pub const NATIONAL: &str = "PHILIPPINES";

#[derive(Deserialize,Debug)]
struct PopulationRow {
    name: String,
    pop_2015: u64,
}

/// Reference populations by geographic unit, used only to normalise rates.
#[derive(Clone,Debug,Default)]
pub struct Population {
    entries: HashMap<String,u64>,
}

impl Population {

    pub fn new<I,S>(entries: I) -> Self
    where I: IntoIterator<Item = (S,u64)>, S: AsRef<str> {
	Self {
	    entries: entries.into_iter().map(
		|(name,pop)| (normalize(name.as_ref()), pop)
	    ).collect()
	}
    }

    pub fn load(path: &Path) -> Result<Self> {
	let bytes = fs::read(path)?;
	let contents = decode_source(&bytes);
	let rows = csv::Reader::from_reader(contents.as_bytes())
	    .into_deserialize::<PopulationRow>()
	    .collect::<std::result::Result<Vec<_>,_>>()?;
	log::info!("Loaded {} population entries from {}", rows.len(), path.display());
	Ok(Self::new(rows.into_iter().map(|row| (row.name, row.pop_2015))))
    }

    pub fn get(&self, name: &str) -> Option<u64> {
	self.entries.get(&normalize(name)).copied()
    }

    pub fn national(&self) -> Option<u64> {
	self.get(NATIONAL)
    }

    /// Sum of the populations of the given units. Units without an entry are
    /// skipped with a warning; `None` if none of them resolve.
    pub fn sum<'a,I>(&self, names: I) -> Option<u64>
    where I: IntoIterator<Item = &'a str> {
	names.into_iter().fold(None, |total,name| match self.get(name) {
	    Some(pop) => Some(total.unwrap_or(0) + pop),
	    None => {
		log::warn!("No population entry for {}", name);
		total
	    }
	})
    }

}


fn normalize(name: &str) -> String {
    unidecode(name.trim()).to_uppercase()
}


/// Cumulative count per 100k population; `None` for an unknown or empty
/// population.
pub fn per_100k(count: u64, population: Option<u64>) -> Option<f64> {
    match population {
	Some(pop) if pop > 0 => Some(count as f64 * 100000.0 / pop as f64),
	_ => None
    }
}
