//! Shape descriptors and the pure functions keyed by them.

use crate::error::{DwellingError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

/// Floor plan of a dwelling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    /// Square cabin with the given side length
    Square {
        /// Side length
        length: f64,
    },
    /// Single-floor round hut
    RoundHut {
        /// Floor radius
        radius: f64,
    },
    /// Round tower; every floor has the same radius
    RoundTower {
        /// Floor radius
        radius: f64,
        /// Number of floors, at least one
        floors: u32,
    },
}

/// Residents a square cabin holds.
pub const SQUARE_CAPACITY: u32 = 6;

/// Residents a round hut holds, and each floor of a round tower.
pub const ROUND_FLOOR_CAPACITY: u32 = 4;

impl Shape {
    /// Checks that every dimension is positive and finite.
    pub fn validate(&self) -> Result<()> {
        let (name, value) = match *self {
            Shape::Square { length } => ("length", length),
            Shape::RoundHut { radius } => ("radius", radius),
            Shape::RoundTower { radius, floors } => {
                if floors == 0 {
                    return Err(DwellingError::InvalidDimension {
                        name: "floors",
                        value: 0.0,
                    });
                }
                ("radius", radius)
            }
        };
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(DwellingError::InvalidDimension { name, value })
        }
    }

    /// Material the shape is traditionally built from.
    pub fn default_material(&self) -> Material {
        match self {
            Shape::Square { .. } => Material::Wood,
            Shape::RoundHut { .. } => Material::Straw,
            Shape::RoundTower { .. } => Material::Stone,
        }
    }
}

/// Building material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    /// Timber
    Wood,
    /// Thatch
    Straw,
    /// Masonry
    Stone,
}

/// Total floor area, summed over every floor.
///
/// # Example
/// ```
/// use larder_dwelling::{floor_area, Shape};
///
/// let hut = Shape::RoundHut { radius: 1.0 };
/// assert!((floor_area(&hut) - std::f64::consts::PI).abs() < 1e-12);
/// ```
#[inline]
pub fn floor_area(shape: &Shape) -> f64 {
    match *shape {
        Shape::Square { length } => length * length,
        Shape::RoundHut { radius } => circle_area(radius),
        Shape::RoundTower { radius, floors } => circle_area(radius) * f64::from(floors),
    }
}

/// Side of the largest square carpet that fits on one floor.
///
/// A square floor takes a carpet of its own size; a round floor takes the
/// square inscribed in its circle, whose side is `radius * √2`.
#[inline]
pub fn max_carpet_size(shape: &Shape) -> f64 {
    match *shape {
        Shape::Square { length } => length,
        Shape::RoundHut { radius } | Shape::RoundTower { radius, .. } => radius * SQRT_2,
    }
}

/// Maximum number of residents.
#[inline]
pub fn capacity(shape: &Shape) -> u32 {
    match *shape {
        Shape::Square { .. } => SQUARE_CAPACITY,
        Shape::RoundHut { .. } => ROUND_FLOOR_CAPACITY,
        Shape::RoundTower { floors, .. } => ROUND_FLOOR_CAPACITY.saturating_mul(floors),
    }
}

#[inline]
fn circle_area(radius: f64) -> f64 {
    PI * radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_square_area() {
        assert!((floor_area(&Shape::Square { length: 50.0 }) - 2500.0).abs() < EPSILON);
    }

    #[test]
    fn test_round_hut_area() {
        let area = floor_area(&Shape::RoundHut { radius: 10.0 });
        assert!((area - 314.159_265_358_979_3).abs() < EPSILON);
    }

    #[test]
    fn test_round_tower_area_counts_floors() {
        let tower = Shape::RoundTower {
            radius: 15.5,
            floors: 2,
        };
        let one_floor = floor_area(&Shape::RoundHut { radius: 15.5 });
        assert!((floor_area(&tower) - 2.0 * one_floor).abs() < EPSILON);
    }

    #[test]
    fn test_max_carpet_size() {
        let carpet = max_carpet_size(&Shape::RoundHut { radius: 10.0 });
        assert!((carpet - 14.142_135_623_730_95).abs() < EPSILON);
        assert_eq!(max_carpet_size(&Shape::Square { length: 3.0 }), 3.0);
    }

    #[test]
    fn test_capacity() {
        assert_eq!(capacity(&Shape::Square { length: 1.0 }), 6);
        assert_eq!(capacity(&Shape::RoundHut { radius: 1.0 }), 4);
        assert_eq!(
            capacity(&Shape::RoundTower {
                radius: 1.0,
                floors: 3
            }),
            12
        );
    }

    #[test]
    fn test_validate_rejects_bad_dimensions() {
        assert!(Shape::Square { length: 0.0 }.validate().is_err());
        assert!(Shape::RoundHut { radius: -1.0 }.validate().is_err());
        assert!(Shape::RoundHut { radius: f64::NAN }.validate().is_err());
        assert_eq!(
            Shape::RoundTower {
                radius: 1.0,
                floors: 0
            }
            .validate(),
            Err(DwellingError::InvalidDimension {
                name: "floors",
                value: 0.0
            })
        );
    }

    #[test]
    fn test_serde_tagged() {
        let json = serde_json::to_value(Shape::RoundTower {
            radius: 2.0,
            floors: 3,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"shape": "round_tower", "radius": 2.0, "floors": 3})
        );
    }
}
