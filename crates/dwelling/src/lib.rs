//! Dwellings described by composition rather than a class hierarchy.
//!
//! A [`Dwelling`] pairs a [`Shape`] value with its occupancy. Area, carpet
//! and capacity are pure functions of the shape tag.
//!
//! # Example
//!
//! ```
//! use larder_dwelling::{Dwelling, Shape};
//!
//! let mut tower = Dwelling::new(Shape::RoundTower { radius: 15.5, floors: 2 }, 4).unwrap();
//! assert_eq!(tower.capacity(), 8);
//! assert!(tower.has_room());
//!
//! tower.check_in().unwrap();
//! assert_eq!(tower.residents(), 5);
//! ```

mod error;
mod shape;

pub use error::{DwellingError, Result};
pub use shape::{
    capacity, floor_area, max_carpet_size, Material, Shape, ROUND_FLOOR_CAPACITY, SQUARE_CAPACITY,
};

use serde::{Deserialize, Serialize};

/// A dwelling and the people living in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dwelling {
    material: Material,
    residents: u32,
    #[serde(flatten)]
    shape: Shape,
}

/// Whether a dwelling with `residents` people can take one more.
#[inline]
pub fn has_room(shape: &Shape, residents: u32) -> bool {
    residents < capacity(shape)
}

impl Dwelling {
    /// Creates a dwelling of the shape's default material.
    ///
    /// Fails if a dimension is invalid or the residents do not fit.
    pub fn new(shape: Shape, residents: u32) -> Result<Self> {
        shape.validate()?;
        let capacity = capacity(&shape);
        if residents > capacity {
            return Err(DwellingError::NoRoom {
                residents,
                capacity,
            });
        }
        Ok(Self {
            material: shape.default_material(),
            residents,
            shape,
        })
    }

    /// Builds from a different material.
    #[must_use]
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn residents(&self) -> u32 {
        self.residents
    }

    pub fn capacity(&self) -> u32 {
        capacity(&self.shape)
    }

    pub fn floor_area(&self) -> f64 {
        floor_area(&self.shape)
    }

    pub fn max_carpet_size(&self) -> f64 {
        max_carpet_size(&self.shape)
    }

    pub fn has_room(&self) -> bool {
        has_room(&self.shape, self.residents)
    }

    /// Adds one resident, returning the new count.
    pub fn check_in(&mut self) -> Result<u32> {
        if !self.has_room() {
            return Err(DwellingError::NoRoom {
                residents: self.residents,
                capacity: self.capacity(),
            });
        }
        self.residents += 1;
        Ok(self.residents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::SQRT_2;

    #[test]
    fn test_defaults_follow_shape() {
        let cabin = Dwelling::new(Shape::Square { length: 50.0 }, 6).unwrap();
        assert_eq!(cabin.material(), Material::Wood);
        assert!(!cabin.has_room());

        let hut = Dwelling::new(Shape::RoundHut { radius: 10.0 }, 3).unwrap();
        assert_eq!(hut.material(), Material::Straw);
        assert!(hut.has_room());
    }

    #[test]
    fn test_check_in_until_full() {
        let mut hut = Dwelling::new(Shape::RoundHut { radius: 10.0 }, 3).unwrap();
        assert_eq!(hut.check_in(), Ok(4));
        assert_eq!(
            hut.check_in(),
            Err(DwellingError::NoRoom {
                residents: 4,
                capacity: 4
            })
        );
        assert_eq!(hut.residents(), 4);
    }

    #[test]
    fn test_rejects_overfull() {
        let err = Dwelling::new(Shape::Square { length: 2.0 }, 7).unwrap_err();
        assert!(matches!(err, DwellingError::NoRoom { capacity: 6, .. }));
    }

    #[test]
    fn test_with_material() {
        let hut = Dwelling::new(Shape::RoundHut { radius: 1.0 }, 0)
            .unwrap()
            .with_material(Material::Stone);
        assert_eq!(hut.material(), Material::Stone);
    }

    #[test]
    fn test_serde_flattens_shape() {
        let hut = Dwelling::new(Shape::RoundHut { radius: 2.5 }, 1).unwrap();
        let json = serde_json::to_value(&hut).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "material": "straw",
                "residents": 1,
                "shape": "round_hut",
                "radius": 2.5
            })
        );
        let back: Dwelling = serde_json::from_value(json).unwrap();
        assert_eq!(back, hut);
    }

    proptest! {
        #[test]
        fn tower_area_scales_with_floors(radius in 0.1f64..100.0, floors in 1u32..50) {
            let tower = floor_area(&Shape::RoundTower { radius, floors });
            let hut = floor_area(&Shape::RoundHut { radius });
            prop_assert!((tower - hut * f64::from(floors)).abs() <= 1e-9 * tower);
        }

        #[test]
        fn carpet_fits_inside_round_floor(radius in 0.1f64..100.0) {
            let side = max_carpet_size(&Shape::RoundHut { radius });
            // Square of that side has its corners on the circle
            let area = floor_area(&Shape::RoundHut { radius });
            prop_assert!(side * side <= area);
            prop_assert!((side / 2.0 * SQRT_2).abs() <= radius * (1.0 + 1e-12));
        }

        #[test]
        fn check_in_never_exceeds_capacity(floors in 1u32..10, attempts in 0usize..60) {
            let mut tower = Dwelling::new(Shape::RoundTower { radius: 5.0, floors }, 0).unwrap();
            for _ in 0..attempts {
                let _ = tower.check_in();
            }
            prop_assert!(tower.residents() <= tower.capacity());
        }
    }
}
