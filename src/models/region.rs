use serde::{Deserialize, Serialize};

/// Screen rectangle a metric is read from, in logical screen pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Create a new region from its top-left corner and size
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Create a region from two opposite corners, in any order
    ///
    /// Region selection clicks the top-left and bottom-right corner of the
    /// number, but users do not always click them in that order.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            left: x1.min(x2),
            top: y1.min(y2),
            width: x1.abs_diff(x2),
            height: y1.abs_diff(y2),
        }
    }

    /// A region is only usable if it covers at least one pixel
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_creation() {
        let region = Region::new(100, 100, 200, 150);
        assert_eq!(region.left, 100);
        assert_eq!(region.top, 100);
        assert_eq!(region.width, 200);
        assert_eq!(region.height, 150);
    }

    #[test]
    fn test_region_from_corners_ordered() {
        let region = Region::from_corners(100, 100, 300, 250);
        assert_eq!(region, Region::new(100, 100, 200, 150));
    }

    #[test]
    fn test_region_from_corners_reversed() {
        // Bottom-right clicked first
        let region = Region::from_corners(300, 250, 100, 100);
        assert_eq!(region, Region::new(100, 100, 200, 150));
    }

    #[test]
    fn test_region_from_corners_mixed() {
        let region = Region::from_corners(300, 100, 100, 250);
        assert_eq!(region, Region::new(100, 100, 200, 150));
    }

    #[test]
    fn test_region_validation() {
        assert!(Region::new(0, 0, 100, 100).is_valid());
        assert!(!Region::new(0, 0, 0, 100).is_valid());
        assert!(!Region::new(0, 0, 100, 0).is_valid());

        // Same point clicked twice
        assert!(!Region::from_corners(50, 50, 50, 50).is_valid());
    }

    #[test]
    fn test_region_display_matches_file_format() {
        let region = Region::new(12, 34, 56, 78);
        assert_eq!(region.to_string(), "(12, 34, 56, 78)");
    }

    #[test]
    fn test_region_serialization() {
        let region = Region::new(100, 200, 300, 400);
        let json = serde_json::to_string(&region).unwrap();
        let deserialized: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(region, deserialized);
    }
}
