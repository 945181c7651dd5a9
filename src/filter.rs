use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::{Serialize,Serializer};
use serde::ser::SerializeMap;

use super::ledger::{CaseRecord,AgeGroup,Sex,HealthStatus};
use super::population::Population;


#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum Dimension {
    Country,
    Province,
    AgeGroup,
    Sex,
    HealthStatus,
}

impl Dimension {

    pub fn name(&self) -> &'static str {
	match self {
	    Self::Country => "Country",
	    Self::Province => "Province",
	    Self::AgeGroup => "AgeGroup",
	    Self::Sex => "Sex",
	    Self::HealthStatus => "HealthStatus",
	}
    }

}

/// Non-geographic axes a view can be broken down by. The derived order is
/// the order they appear in a group key.
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash,ValueEnum)]
pub enum Breakdown {
    AgeGroup,
    Sex,
    HealthStatus,
}

impl Breakdown {

    pub fn dimension(&self) -> Dimension {
	match self {
	    Self::AgeGroup => Dimension::AgeGroup,
	    Self::Sex => Dimension::Sex,
	    Self::HealthStatus => Dimension::HealthStatus,
	}
    }

}


#[derive(Clone,Debug,PartialEq,Eq)]
pub enum Scope {
    National,
    Provinces { provinces: Vec<String>, regions: Vec<String>, merge: bool },
    None,
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct FilterState {
    pub scope: Scope,
    pub breakdown: BTreeSet<Breakdown>,
}


/// Record selection of a resolved filter.
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum Predicate {
    All,
    Nothing,
    Provinces { provinces: BTreeSet<String>, regions: BTreeSet<String> },
}

impl Predicate {

    pub fn matches(&self, record: &CaseRecord) -> bool {
	match self {
	    Self::All => true,
	    Self::Nothing => false,
	    Self::Provinces { provinces, regions } =>
		record.province.as_ref().map_or(false, |p| provinces.contains(p))
		&& (regions.is_empty() || record.region.as_ref().map_or(false, |r| regions.contains(r))),
	}
    }

}


/// Where the geographic part of a group key comes from.
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum Geography {
    National,
    Provinces,
    Merged { label: String, members: BTreeSet<String> },
}


#[derive(Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct GroupKey {
    pub level: Dimension,
    pub area: String,
    pub age_group: Option<AgeGroup>,
    pub sex: Option<Sex>,
    pub health_status: Option<HealthStatus>,
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
	let mut map = serializer.serialize_map(None)?;
	map.serialize_entry(self.level.name(), &self.area)?;
	if let Some(age_group) = &self.age_group {
	    map.serialize_entry(Dimension::AgeGroup.name(), age_group)?;
	}
	if let Some(sex) = &self.sex {
	    map.serialize_entry(Dimension::Sex.name(), sex)?;
	}
	if let Some(status) = &self.health_status {
	    map.serialize_entry(Dimension::HealthStatus.name(), status)?;
	}
	map.end()
    }
}


#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Resolution {
    pub predicate: Predicate,
    pub geography: Geography,
    pub breakdown: Vec<Breakdown>,
}

impl Resolution {

    pub fn resolve(state: &FilterState) -> Self {

	let breakdown = state.breakdown.iter().copied().collect();

	match &state.scope {
	    Scope::National => Self {
		predicate: Predicate::All,
		geography: Geography::National,
		breakdown
	    },
	    Scope::Provinces { provinces, regions, merge } if !provinces.is_empty() => {
		let provinces : BTreeSet<String> = provinces.iter().cloned().collect();
		Self {
		    geography: match *merge {
			true => Geography::Merged {
			    label: format!("{} PROVINCES", provinces.len()),
			    members: provinces.clone()
			},
			false => Geography::Provinces
		    },
		    predicate: Predicate::Provinces {
			provinces,
			regions: regions.iter().cloned().collect()
		    },
		    breakdown
		}
	    },
	    _ => Self {
		predicate: Predicate::Nothing,
		geography: Geography::National,
		breakdown
	    }
	}

    }

    /// Narrow a merged group to the provinces its records actually came
    /// from, so a region restriction also trims the label and denominator.
    pub fn settle<'a,I>(mut self, records: I) -> Self
    where I: IntoIterator<Item = &'a CaseRecord> {
	if let Geography::Merged { label, members } = &mut self.geography {
	    let reached : BTreeSet<String> = records.into_iter()
		.filter_map(|record| record.province.clone())
		.collect();
	    if !reached.is_empty() {
		*label = format!("{} PROVINCES", reached.len());
		*members = reached;
	    }
	}
	self
    }

    pub fn level(&self) -> Dimension {
	match self.geography {
	    Geography::National => Dimension::Country,
	    Geography::Provinces | Geography::Merged { .. } => Dimension::Province,
	}
    }

    /// Key dimensions of the aggregate table: geography first, then the
    /// breakdown in canonical order.
    pub fn dimensions(&self) -> Vec<Dimension> {
	std::iter::once(self.level())
	    .chain(self.breakdown.iter().map(Breakdown::dimension))
	    .collect()
    }

    /// The group a record falls into. Health status only becomes part of the
    /// key when `with_status` is set, since it changes over a case's
    /// lifetime.
    pub fn key(&self, record: &CaseRecord, with_status: bool) -> Option<GroupKey> {
	let area = match &self.geography {
	    Geography::National => record.country.to_string(),
	    Geography::Provinces => record.province.clone()?,
	    Geography::Merged { label, .. } => label.clone(),
	};
	let has = |b| self.breakdown.contains(&b);
	Some(GroupKey {
	    level: self.level(),
	    area,
	    age_group: Some(record.age_group).filter(|_| has(Breakdown::AgeGroup)),
	    sex: Some(record.sex).filter(|_| has(Breakdown::Sex)),
	    health_status: Some(record.health_status)
		.filter(|_| with_status && has(Breakdown::HealthStatus)),
	})
    }

    /// Reference population of a group. Age and sex slices share the
    /// denominator of their area.
    pub fn population(&self, key: &GroupKey, registry: &Population) -> Option<u64> {
	let pop = match &self.geography {
	    Geography::National => registry.national(),
	    Geography::Provinces => registry.get(&key.area),
	    Geography::Merged { members, .. } => registry.sum(members.iter().map(String::as_str)),
	};
	if pop.is_none() {
	    log::warn!("Unresolved population for {}", key.area);
	}
	pop
    }

}
