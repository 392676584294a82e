use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::models::reading::Metric;
use crate::models::region::Region;

/// Named regions as stored in the region file
pub type RegionMap = BTreeMap<String, Region>;

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("Failed to read region file {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("Failed to write region file {path}: {reason}")]
    Write { path: PathBuf, reason: String },
    #[error("Region name must not be empty or contain ':'")]
    InvalidName,
}

// Name: (left, top, width, height)
static REGION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^:]+?)\s*:\s*\(\s*(-?\d+)\s*,\s*(-?\d+)\s*,\s*(-?\d+)\s*,\s*(-?\d+)\s*\)\s*$")
        .expect("valid region line regex")
});

/// Plain-text persistence for named screen regions
pub struct RegionStore {
    path: PathBuf,
}

impl RegionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load every region; a missing file is an empty map
    pub fn load(&self) -> Result<RegionMap, RegionError> {
        if !self.exists() {
            debug!("No region file at {}", self.path.display());
            return Ok(RegionMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| RegionError::Read {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        Ok(parse_regions(&content))
    }

    pub fn save(&self, regions: &RegionMap) -> Result<(), RegionError> {
        let write_error = |e: std::io::Error| RegionError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(&self.path, format_regions(regions)).map_err(write_error)?;
        debug!("Saved {} regions to {}", regions.len(), self.path.display());
        Ok(())
    }

    /// Insert or replace one region and persist the result
    pub fn set(&self, name: &str, region: Region) -> Result<RegionMap, RegionError> {
        let name = name.trim();
        if name.is_empty() || name.contains(':') {
            return Err(RegionError::InvalidName);
        }

        let mut regions = self.load()?;
        // Replace an existing entry spelled with different case
        let existing = regions
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned();
        if let Some(existing) = existing {
            regions.remove(&existing);
        }
        regions.insert(canonical_name(name), region);
        self.save(&regions)?;
        Ok(regions)
    }
}

/// Region for a metric, matching its label case-insensitively
pub fn region_for(regions: &RegionMap, metric: Metric) -> Option<&Region> {
    regions
        .iter()
        .find(|(name, _)| Metric::from_label(name) == Some(metric))
        .map(|(_, region)| region)
}

/// Parse region file content, skipping malformed lines
pub fn parse_regions(content: &str) -> RegionMap {
    let mut regions = RegionMap::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let Some(caps) = REGION_LINE.captures(line) else {
            warn!("Region file line {}: cannot parse '{}'", index + 1, line.trim());
            continue;
        };

        let numbers: Option<Vec<i64>> = (2..=5).map(|i| caps[i].parse().ok()).collect();
        let Some([left, top, width, height]) = numbers.and_then(|n| <[i64; 4]>::try_from(n).ok()) else {
            warn!("Region file line {}: numbers out of range", index + 1);
            continue;
        };

        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            i32::try_from(left),
            i32::try_from(top),
            u32::try_from(width),
            u32::try_from(height),
        ) else {
            warn!("Region file line {}: invalid rectangle '{}'", index + 1, line.trim());
            continue;
        };

        regions.insert(canonical_name(&caps[1]), Region::new(left, top, width, height));
    }

    regions
}

/// Render regions with HP first, then Mana, then the rest by name
pub fn format_regions(regions: &RegionMap) -> String {
    let mut ordered: Vec<(&String, &Region)> = regions.iter().collect();
    ordered.sort_by_key(|(name, _)| {
        let rank = match Metric::from_label(name) {
            Some(Metric::Hp) => 0,
            Some(Metric::Mana) => 1,
            None => 2,
        };
        (rank, name.to_string())
    });

    ordered
        .into_iter()
        .map(|(name, region)| format!("{}: {}\n", name, region))
        .collect()
}

/// Metric names are stored with their canonical spelling
fn canonical_name(name: &str) -> String {
    match Metric::from_label(name) {
        Some(metric) => metric.label().to_string(),
        None => name.trim().to_string(),
    }
}
