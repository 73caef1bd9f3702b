use serde::{Deserialize, Serialize};

use crate::Error;

/// Lamé parameters of an isotropic elastic material.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElasticityParameters {
    /// First Lame parameter. Measured in Pa = N/m² = kg/(ms²).
    pub lambda: f64,
    /// Second Lame parameter. Measured in Pa = N/m² = kg/(ms²).
    pub mu: f64,
}

impl ElasticityParameters {
    pub fn from_young_poisson(young: f64, poisson: f64) -> Self {
        ElasticityParameters {
            lambda: young * poisson / ((1.0 + poisson) * (1.0 - 2.0 * poisson)),
            mu: young / (2.0 * (1.0 + poisson)),
        }
    }

    /// Bulk modulus measures the material's resistance to expansion and compression.
    pub fn bulk_modulus(&self) -> f64 {
        self.lambda + 2.0 * self.mu / 3.0
    }
}

/// Material of a simulated solid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Young's modulus in Pa.
    pub young_modulus: f64,
    /// Poisson ratio. Must lie strictly between -1 and 0.5.
    pub poisson_ratio: f64,
    /// Mass per unit volume.
    pub density: f64,
}

impl Default for Material {
    fn default() -> Self {
        Material::explicit()
    }
}

impl Material {
    /// Material of the reference explicit scene.
    pub const fn explicit() -> Self {
        Material {
            young_modulus: 2e6,
            poisson_ratio: 0.1,
            density: 1e5,
        }
    }

    /// Material of the reference implicit scene. Softer than the explicit one since the
    /// implicit integrator takes much larger steps.
    pub const fn implicit() -> Self {
        Material {
            young_modulus: 1e5,
            ..Material::explicit()
        }
    }

    pub fn with_young_modulus(mut self, young_modulus: f64) -> Material {
        self.young_modulus = young_modulus;
        self
    }
    pub fn with_poisson_ratio(mut self, poisson_ratio: f64) -> Material {
        self.poisson_ratio = poisson_ratio;
        self
    }
    pub fn with_density(mut self, density: f64) -> Material {
        self.density = density;
        self
    }

    pub fn elasticity(&self) -> ElasticityParameters {
        ElasticityParameters::from_young_poisson(self.young_modulus, self.poisson_ratio)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |name: &str| {
            Err(Error::InvalidParameter {
                name: name.to_string(),
            })
        };
        if !(self.young_modulus > 0.0) {
            return invalid("young_modulus");
        }
        if !(self.poisson_ratio > -1.0 && self.poisson_ratio < 0.5) {
            return invalid("poisson_ratio");
        }
        if !(self.density > 0.0) {
            return invalid("density");
        }
        Ok(())
    }
}
