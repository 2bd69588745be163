//! Physical description of a layered snow/ice column.

use serde::Deserialize;

use crate::error::SnicarError;
use crate::species::{Species, SpeciesTable};

/// Conversion from parts-per-billion by mass to kg/kg.
pub(crate) const PPB: f64 = 1e-9;

/// Ice grain shape.
///
/// The discriminants are the numeric shape tags used by callers that pass
/// shapes as integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrainShape {
    /// Mie sphere, no shape correction
    #[default]
    Sphere = 1,
    /// Spheroid
    Spheroid = 2,
    /// Hexagonal plate
    HexagonalPlate = 3,
    /// Koch snowflake
    KochSnowflake = 4,
}

impl TryFrom<i64> for GrainShape {
    type Error = SnicarError;

    fn try_from(tag: i64) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(GrainShape::Sphere),
            2 => Ok(GrainShape::Spheroid),
            3 => Ok(GrainShape::HexagonalPlate),
            4 => Ok(GrainShape::KochSnowflake),
            _ => Err(SnicarError::InvalidGrainShape(tag)),
        }
    }
}

/// A single snow layer.
///
/// Built with [`Layer::new`] and the `with_*` methods; a new layer is clean
/// snow made of spherical grains.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Thickness in m.
    pub thickness: f64,
    /// Bulk density in kg/m³.
    pub density: f64,
    /// Ice grain effective radius in µm.
    pub grain_radius: f64,
    /// Ice grain shape.
    pub shape: GrainShape,
    /// Shape factor, or 0 for the default of `shape`.
    pub shape_factor: f64,
    /// Aspect ratio, or 0 for the default of `shape`.
    pub aspect_ratio: f64,
    /// Impurity mass-mixing ratios in ppb.
    pub impurities: SpeciesTable<f64>,
    /// Algae cell concentration in cells/mL of snow.
    pub algae: f64,
}

impl Layer {
    /// Clean layer of spherical grains.
    pub fn new(thickness: f64, density: f64, grain_radius: f64) -> Self {
        Self {
            thickness,
            density,
            grain_radius,
            shape: GrainShape::Sphere,
            shape_factor: 0.0,
            aspect_ratio: 0.0,
            impurities: SpeciesTable::default(),
            algae: 0.0,
        }
    }

    /// Set the grain shape, with its shape factor and aspect ratio (0 for
    /// the shape defaults).
    pub fn with_shape(mut self, shape: GrainShape, shape_factor: f64, aspect_ratio: f64) -> Self {
        self.shape = shape;
        self.shape_factor = shape_factor;
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Set the mixing ratio of one species, in ppb.
    pub fn with_impurity(mut self, species: Species, ppb: f64) -> Self {
        self.impurities[species] = ppb;
        self
    }

    /// Set the algae concentration, in cells/mL.
    pub fn with_algae(mut self, cells_per_ml: f64) -> Self {
        self.algae = cells_per_ml;
        self
    }

    /// Total layer mass per unit area, in kg/m².
    pub fn mass(&self) -> f64 {
        self.density * self.thickness
    }

    // Negated comparisons also reject NaN
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    fn validate(&self, layer: usize) -> Result<(), SnicarError> {
        let invalid = |reason| Err(SnicarError::InvalidLayer { layer, reason });
        if !(self.thickness > 0.0) {
            return invalid("thickness must be positive");
        }
        if !(self.density > 0.0) {
            return invalid("density must be positive");
        }
        if !(self.grain_radius > 0.0) {
            return invalid("grain radius must be positive");
        }
        if self.shape_factor < 0.0 || self.aspect_ratio < 0.0 {
            return invalid("shape factor and aspect ratio can't be negative");
        }
        if self.algae < 0.0 || self.impurities.iter().any(|(_, &ppb)| ppb < 0.0) {
            return invalid("impurity loadings can't be negative");
        }
        Ok(())
    }
}

/// Layers of snow ordered from the top of the column down.
#[derive(Debug, Clone, PartialEq)]
pub struct SnowColumn {
    layers: Vec<Layer>,
}

impl SnowColumn {
    /// Check and wrap the layers. At least one layer is required.
    pub fn new(layers: Vec<Layer>) -> Result<Self, SnicarError> {
        if layers.is_empty() {
            return Err(SnicarError::InconsistentInputs(
                "a column needs at least one layer".into(),
            ));
        }
        for (i, layer) in layers.iter().enumerate() {
            layer.validate(i)?;
        }
        Ok(Self { layers })
    }

    /// The layers, top first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always false, since a column can't be built without layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Size and density of algae cells, used to turn cell counts into mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgaeCells {
    /// Mean cell radius in µm.
    pub radius_um: f64,
    /// Cell density in kg/m³.
    pub density: f64,
}

impl Default for AlgaeCells {
    fn default() -> Self {
        Self {
            radius_um: 6.0,
            density: 1080.0,
        }
    }
}

impl AlgaeCells {
    /// Mean mass of a single cell in kg.
    ///
    /// Radii are normally distributed with a standard deviation of 10% of
    /// the mean, which gives a mean volume of `4/3 π (r³ + 3 r σ²)`.
    pub fn cell_mass(&self) -> f64 {
        let r = self.radius_um * 1e-6;
        let sigma = 0.1 * r;
        let volume = 4.0 / 3.0 * std::f64::consts::PI * (r.powi(3) + 3.0 * r * sigma.powi(2));
        volume * self.density
    }

    /// Algae mass per unit area (kg/m²) in a layer of `thickness` m holding
    /// `cells_per_ml` cells per mL.
    pub fn burden(&self, cells_per_ml: f64, thickness: f64) -> f64 {
        // 1e6 mL per m³
        cells_per_ml * 1e6 * thickness * self.cell_mass()
    }
}
