use std::fs;
use std::fmt;
use std::borrow::Cow;
use std::path::Path;
use std::collections::HashSet;

use chrono::naive::NaiveDate;
use serde::{Serialize,Serializer,Deserialize};
use encoding_rs::mem::decode_latin1;

use super::error::{Result,Error};
use super::population::NATIONAL;
use super::NaiveDateRange;


/// One row of a DOH case information data drop, before validation.
#[derive(Deserialize,Debug,Clone,Default)]
pub struct RawCase {
    #[serde(rename = "CaseCode")]
    pub case_code: Option<String>,
    #[serde(rename = "RegionRes")]
    pub region: Option<String>,
    #[serde(rename = "ProvRes")]
    pub province: Option<String>,
    #[serde(rename = "AgeGroup")]
    pub age_group: Option<String>,
    #[serde(rename = "Sex")]
    pub sex: Option<String>,
    #[serde(rename = "HealthStatus")]
    pub health_status: Option<String>,
    #[serde(rename = "DateRepConf")]
    pub date_reported: Option<String>,
    #[serde(rename = "DateDied")]
    pub date_died: Option<String>,
    #[serde(rename = "DateRecover")]
    pub date_recovered: Option<String>,
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum AgeGroup {
    From0To4,
    From5To9,
    From10To14,
    From15To19,
    From20To24,
    From25To29,
    From30To34,
    From35To39,
    From40To44,
    From45To49,
    From50To54,
    From55To59,
    From60To64,
    From65To69,
    From70To74,
    From75To79,
    Over80,
    Unknown,
}

impl AgeGroup {

    pub const BANDS: [AgeGroup; 17] = [
	Self::From0To4, Self::From5To9, Self::From10To14, Self::From15To19,
	Self::From20To24, Self::From25To29, Self::From30To34, Self::From35To39,
	Self::From40To44, Self::From45To49, Self::From50To54, Self::From55To59,
	Self::From60To64, Self::From65To69, Self::From70To74, Self::From75To79,
	Self::Over80
    ];

    pub fn label(&self) -> &'static str {
	match self {
	    Self::From0To4 => "0 to 4",
	    Self::From5To9 => "5 to 9",
	    Self::From10To14 => "10 to 14",
	    Self::From15To19 => "15 to 19",
	    Self::From20To24 => "20 to 24",
	    Self::From25To29 => "25 to 29",
	    Self::From30To34 => "30 to 34",
	    Self::From35To39 => "35 to 39",
	    Self::From40To44 => "40 to 44",
	    Self::From45To49 => "45 to 49",
	    Self::From50To54 => "50 to 54",
	    Self::From55To59 => "55 to 59",
	    Self::From60To64 => "60 to 64",
	    Self::From65To69 => "65 to 69",
	    Self::From70To74 => "70 to 74",
	    Self::From75To79 => "75 to 79",
	    Self::Over80 => "80+",
	    Self::Unknown => "Unknown",
	}
    }

    fn parse(val: Option<&str>) -> Option<Self> {
	match val {
	    None => Some(Self::Unknown),
	    Some(val) => Self::BANDS.iter().copied().find(|band| band.label() == val),
	}
    }

}

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {

    pub fn label(&self) -> &'static str {
	match self {
	    Self::Male => "Male",
	    Self::Female => "Female",
	    Self::Unknown => "Unknown",
	}
    }

    fn parse(val: Option<&str>) -> Option<Self> {
	match val.map(|v| v.to_lowercase()).as_deref() {
	    None => Some(Self::Unknown),
	    Some("male") => Some(Self::Male),
	    Some("female") => Some(Self::Female),
	    Some(_) => None,
	}
    }

}

#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum HealthStatus {
    Active,
    Died,
    Recovered,
}

impl HealthStatus {

    pub fn label(&self) -> &'static str {
	match self {
	    Self::Active => "Active",
	    Self::Died => "Died",
	    Self::Recovered => "Recovered",
	}
    }

    /// Severity grades of open cases in the data drops all count as active.
    fn parse(val: &str) -> Option<Self> {
	match val {
	    "Active" | "Asymptomatic" | "Mild" | "Severe" | "Critical" => Some(Self::Active),
	    "Died" => Some(Self::Died),
	    "Recovered" => Some(Self::Recovered),
	    _ => None,
	}
    }

}

macro_rules! label_impls {
    ($($ty:ty),*) => {$(
	impl Serialize for $ty {
	    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.serialize_str(self.label())
	    }
	}

	impl fmt::Display for $ty {
	    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	    }
	}
    )*}
}

label_impls!(AgeGroup, Sex, HealthStatus);


#[derive(Clone,Debug,PartialEq)]
pub struct CaseRecord {
    pub case_id: String,
    pub region: Option<String>,
    pub province: Option<String>,
    pub age_group: AgeGroup,
    pub sex: Sex,
    pub health_status: HealthStatus,
    pub date_reported: NaiveDate,
    pub date_removed: Option<NaiveDate>,
    pub country: &'static str,
}

impl CaseRecord {

    fn validate(row: usize, raw: RawCase) -> Result<Self> {

	let case_id = present(&raw.case_code)
	    .ok_or_else(|| Error::validation(row, "CaseCode", "missing case identifier"))?;

	let status = present(&raw.health_status)
	    .ok_or_else(|| Error::validation(row, "HealthStatus", "missing health status"))?;
	let health_status = HealthStatus::parse(status)
	    .ok_or_else(|| Error::validation(row, "HealthStatus",
					     format!("unknown health status {:?}", status)))?;

	let age_group = AgeGroup::parse(present(&raw.age_group))
	    .ok_or_else(|| Error::validation(row, "AgeGroup",
					     format!("unknown age group {:?}", raw.age_group)))?;
	let sex = Sex::parse(present(&raw.sex))
	    .ok_or_else(|| Error::validation(row, "Sex", format!("unknown sex {:?}", raw.sex)))?;

	let date_reported = parse_date(row, "DateRepConf", &raw.date_reported)?
	    .ok_or_else(|| Error::validation(row, "DateRepConf", "missing report date"))?;
	let date_died = parse_date(row, "DateDied", &raw.date_died)?;
	let date_recovered = parse_date(row, "DateRecover", &raw.date_recovered)?;

	let date_removed = match health_status {
	    HealthStatus::Died => date_died,
	    HealthStatus::Recovered => date_recovered,
	    HealthStatus::Active => None,
	}.filter(|removed| {
	    let ordered = *removed >= date_reported;
	    if !ordered {
		log::warn!("Case {} at row {}: removal date {} precedes report date {}, dropped",
			   case_id, row, removed, date_reported);
	    }
	    ordered
	});

	Ok(Self {
	    case_id: case_id.to_string(),
	    region: present(&raw.region).map(str::to_string),
	    province: present(&raw.province).map(str::to_string),
	    age_group, sex, health_status,
	    date_reported, date_removed,
	    country: NATIONAL,
	})

    }

}


fn present(val: &Option<String>) -> Option<&str> {
    val.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(row: usize, field: &'static str, val: &Option<String>) -> Result<Option<NaiveDate>> {
    present(val).map(
	|v| NaiveDate::parse_from_str(v, "%Y-%m-%d")
	    .map_err(|err| Error::validation(row, field, format!("{:?}: {}", v, err)))
    ).transpose()
}


/// Source files are UTF-8, except when they aren't.
pub fn decode_source(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
	Ok(text) => Cow::Borrowed(text),
	Err(_) => decode_latin1(bytes),
    }
}


/// Inclusive report date bounds of a record selection.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum DateSpan {
    Empty,
    Between(NaiveDate,NaiveDate),
}

impl DateSpan {

    pub fn dates(&self) -> NaiveDateRange {
	match *self {
	    Self::Empty => NaiveDateRange::empty(),
	    Self::Between(start,end) => NaiveDateRange(start, Some(end)),
	}
    }

}


#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Serialize)]
pub struct Totals {
    #[serde(rename = "Cases")]
    pub cases: u64,
    #[serde(rename = "Deaths")]
    pub deaths: u64,
    #[serde(rename = "Recoveries")]
    pub recoveries: u64,
}

impl Totals {

    pub fn add(&mut self, record: &CaseRecord) {
	self.cases += 1;
	match record.health_status {
	    HealthStatus::Died => self.deaths += 1,
	    HealthStatus::Recovered => self.recoveries += 1,
	    HealthStatus::Active => {}
	}
    }

}


/// The validated case records. Built once, never modified.
#[derive(Debug,Default)]
pub struct Ledger {
    records: Vec<CaseRecord>,
}

impl Ledger {

    pub fn load<I>(rows: I) -> Result<Self>
    where I: IntoIterator<Item = RawCase> {

	let mut seen = HashSet::new();
	let mut records = Vec::new();

	for (i,raw) in rows.into_iter().enumerate() {
	    let record = CaseRecord::validate(i + 1, raw)?;
	    if !seen.insert(record.case_id.clone()) {
		return Err(Error::validation(i + 1, "CaseCode", format!(
		    "duplicate case identifier {}", record.case_id)));
	    }
	    records.push(record);
	}

	Ok(Self { records })

    }

    pub fn from_csv(path: &Path) -> Result<Self> {
	let bytes = fs::read(path)?;
	let contents = decode_source(&bytes);
	let rows = csv::Reader::from_reader(contents.as_bytes())
	    .into_deserialize::<RawCase>()
	    .collect::<std::result::Result<Vec<_>,_>>()?;
	let ledger = Self::load(rows)?;
	log::info!("Loaded {} case records from {}", ledger.len(), path.display());
	Ok(ledger)
    }

    pub fn len(&self) -> usize {
	self.records.len()
    }

    pub fn query<'a,F>(&'a self, predicate: F) -> impl Iterator<Item = &'a CaseRecord>
    where F: for<'r> Fn(&'r CaseRecord) -> bool + 'a {
	self.records.iter().filter(move |record| predicate(*record))
    }

    pub fn date_range<F>(&self, predicate: F) -> DateSpan
    where F: for<'r> Fn(&'r CaseRecord) -> bool {
	self.records.iter().filter(|record| predicate(*record)).fold(DateSpan::Empty, |span,record| {
	    let date = record.date_reported;
	    match span {
		DateSpan::Empty => DateSpan::Between(date, date),
		DateSpan::Between(start,end) => DateSpan::Between(start.min(date), end.max(date)),
	    }
	})
    }

    pub fn totals(&self) -> Totals {
	let mut totals = Totals::default();
	self.records.iter().for_each(|record| totals.add(record));
	totals
    }

}
