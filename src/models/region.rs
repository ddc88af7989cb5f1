//! Named region and quarter types.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// Stable region identity (dataset feature id).
pub type RegionId = u64;

/// Name fields a region can be resolved by.
///
/// County datasets carry several overlapping naming columns; none of them is
/// reliably unique or populated, so lookups walk them in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NameField {
    /// Primary English name
    English,
    /// Dataset variant of the English name
    CountyName,
    /// Dataset variant of the English name
    County,
    /// Localised (Irish) name
    Gaeilge,
    /// Localised dataset variant
    Contae,
    /// Free aliases, including partition-tag aliases
    Alias,
}

impl NameField {
    /// Resolution order for name lookups: first matching field wins.
    pub const RESOLUTION_ORDER: [NameField; 6] = [
        NameField::English,
        NameField::CountyName,
        NameField::County,
        NameField::Gaeilge,
        NameField::Contae,
        NameField::Alias,
    ];

    /// Get the dataset property name for this field
    pub fn field_name(&self) -> &'static str {
        match self {
            NameField::English => "english",
            NameField::CountyName => "countyname",
            NameField::County => "county",
            NameField::Gaeilge => "gaeilge",
            NameField::Contae => "contae",
            NameField::Alias => "aliases",
        }
    }
}

/// All naming schemes carried by a region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionNames {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub english: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countyname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaeilge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contae: Option<String>,
    /// Partition tag (administrative grouping)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl RegionNames {
    /// Non-blank values stored under a name field
    pub fn values(&self, field: NameField) -> Vec<&str> {
        fn single(v: &Option<String>) -> Vec<&str> {
            non_blank(v.as_deref()).into_iter().collect()
        }
        match field {
            NameField::English => single(&self.english),
            NameField::CountyName => single(&self.countyname),
            NameField::County => single(&self.county),
            NameField::Gaeilge => single(&self.gaeilge),
            NameField::Contae => single(&self.contae),
            NameField::Alias => self
                .aliases
                .iter()
                .filter_map(|a| non_blank(Some(a.as_str())))
                .collect(),
        }
    }

    /// English display name: english, countyname, county, then "Unknown County"
    pub fn display_english(&self) -> String {
        let raw = non_blank(self.english.as_deref())
            .or_else(|| non_blank(self.countyname.as_deref()))
            .or_else(|| non_blank(self.county.as_deref()))
            .unwrap_or("Unknown County");
        title_case(raw)
    }

    /// Localised display name: gaeilge, contae, then "Gan Ainm"
    pub fn display_localized(&self) -> String {
        let raw = non_blank(self.gaeilge.as_deref())
            .or_else(|| non_blank(self.contae.as_deref()))
            .unwrap_or("Gan Ainm");
        title_case(raw)
    }

    pub fn display_province(&self) -> String {
        title_case(non_blank(self.province.as_deref()).unwrap_or("Unknown"))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Title-case a name: a letter is upper-cased when it follows a non-letter,
/// lower-cased otherwise ("DÚN LAOGHAIRE" -> "Dún Laoghaire").
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_alpha = false;
    for c in input.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// A named polygonal region (e.g. a county).
///
/// Regions may overlap; nothing about their names is assumed unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: RegionId,

    /// Dataset code (e.g. county id)
    pub code: Option<String>,

    pub names: RegionNames,

    pub boundary: MultiPolygon<f64>,
}

/// One of a fixed, rank-ordered set of partitioning polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct Quarter {
    /// Unique within a loaded set
    pub rank: u32,

    pub name: Option<String>,

    pub boundary: MultiPolygon<f64>,
}
