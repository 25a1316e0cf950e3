//! District catalog loaded from the static dataset.
//!
//! The dataset looks like `{"districts": [{"name": "Dhaka", "lat": "23.81", "long": "90.41"}]}`.
//! Coordinates may be JSON strings or numbers; extra fields are ignored.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::types::District;

/// Source of the districts a batch runs over.
///
/// Implementations never fail: an unreadable source is an empty catalog.
pub trait DistrictCatalog: Send + Sync {
    fn list_districts(&self) -> Vec<District>;

    /// Case-insensitive lookup by name
    fn find(&self, name: &str) -> Option<District> {
        let name = name.trim();
        self.list_districts()
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }
}

impl DistrictCatalog for Vec<District> {
    fn list_districts(&self) -> Vec<District> {
        self.clone()
    }
}

#[derive(Debug, Deserialize)]
struct DistrictFile {
    #[serde(default)]
    districts: Vec<RawDistrict>,
}

#[derive(Debug, Deserialize)]
struct RawDistrict {
    name: String,
    lat: Coordinate,
    long: Coordinate,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f64),
    Text(String),
}

impl Coordinate {
    fn to_f64(&self) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .with_context(|| format!("invalid coordinate {:?}", s)),
        }
    }
}

/// Districts read from a JSON file on first use and kept for the catalog's lifetime
#[derive(Debug, Clone)]
pub struct JsonDistrictCatalog {
    path: PathBuf,
    districts: OnceLock<Vec<District>>,
}

impl JsonDistrictCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            districts: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the dataset, failing on the first unreadable entry
    pub fn load(&self) -> Result<Vec<District>> {
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let file: DistrictFile =
            serde_json::from_str(&contents).context("Failed to parse district dataset")?;

        file.districts
            .into_iter()
            .map(|raw| -> Result<District> {
                let latitude = raw
                    .lat
                    .to_f64()
                    .with_context(|| format!("district {}", raw.name))?;
                let longitude = raw
                    .long
                    .to_f64()
                    .with_context(|| format!("district {}", raw.name))?;
                Ok(District::new(raw.name, latitude, longitude))
            })
            .collect()
    }

    /// The loaded districts. A failed load is logged once and leaves the catalog empty.
    fn districts(&self) -> &[District] {
        self.districts.get_or_init(|| match self.load() {
            Ok(districts) => {
                tracing::info!(
                    "Loaded {} districts from {}",
                    districts.len(),
                    self.path.display()
                );
                districts
            }
            Err(e) => {
                tracing::error!("Error loading districts data: {:#}", e);
                Vec::new()
            }
        })
    }
}

impl DistrictCatalog for JsonDistrictCatalog {
    fn list_districts(&self) -> Vec<District> {
        self.districts().to_vec()
    }

    fn find(&self, name: &str) -> Option<District> {
        let name = name.trim();
        self.districts()
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .cloned()
    }
}
