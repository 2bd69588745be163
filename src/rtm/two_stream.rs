//! Two-stream solution for a stack of homogeneous layers.
//!
//! Follows Toon, McKay, Ackerman & Santhanam (1989): within each layer the
//! diffuse fluxes are a homogeneous solution plus a particular solution
//! driven by the direct beam. Requiring continuity at each interface, the
//! incident diffuse flux at the top, and Lambertian reflection at the bottom
//! gives a tridiagonal system of size 2L for the 2L unknown coefficients.
//!
//! # References
//!
//! O. B. Toon, C. P. McKay, T. P. Ackerman, and K. Santhanam, "Rapid
//! calculation of radiative heating rates and photodissociation rates in
//! inhomogeneous multiple scattering atmospheres", J. Geophys. Res., 94(D13),
//! 16287-16301, 1989, <https://doi.org/10.1029/JD094iD13p16287>.

use std::f64::consts::PI;

use serde::Deserialize;
use smallvec::SmallVec;

use super::mixing::LayerOptics;

/// Per-layer storage that stays on the stack for typical columns
pub(crate) type PerLayer<T> = SmallVec<[T; 16]>;

/// Per-row storage of the tridiagonal system
type PerRow<T> = SmallVec<[T; 32]>;

/// Relative size of `λ² - 1/μ₀²` below which a layer is flagged as near the
/// particular solution's singularity.
const SINGULAR_TOLERANCE: f64 = 1e-6;

/// Closure relating the angular moments of the intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Closure {
    /// Eddington approximation
    Eddington,
    /// Gaussian quadrature
    Quadrature,
    /// Hemispheric mean
    #[default]
    HemisphericMean,
}

/// Closure coefficients γ₁..γ₄ and μ₁ (Toon et al. 1989, Table 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Gammas {
    pub(crate) gamma1: f64,
    pub(crate) gamma2: f64,
    pub(crate) gamma3: f64,
    pub(crate) gamma4: f64,
    pub(crate) mu1: f64,
}

impl Closure {
    /// Coefficients for a layer with albedo `ssa` and asymmetry `g`, lit at
    /// `mu0`.
    pub(crate) fn gammas(self, ssa: f64, g: f64, mu0: f64) -> Gammas {
        let sqrt3 = 3f64.sqrt();
        let (gamma1, gamma2, gamma3, mu1) = match self {
            Closure::Eddington => (
                (7.0 - ssa * (4.0 + 3.0 * g)) / 4.0,
                -(1.0 - ssa * (4.0 - 3.0 * g)) / 4.0,
                (2.0 - 3.0 * g * mu0) / 4.0,
                0.5,
            ),
            Closure::Quadrature => (
                sqrt3 * (2.0 - ssa * (1.0 + g)) / 2.0,
                ssa * sqrt3 * (1.0 - g) / 2.0,
                (1.0 - sqrt3 * g * mu0) / 2.0,
                1.0 / sqrt3,
            ),
            Closure::HemisphericMean => (
                2.0 - ssa * (1.0 + g),
                ssa * (1.0 - g),
                (1.0 - sqrt3 * g * mu0) / 2.0,
                0.5,
            ),
        };
        Gammas {
            gamma1,
            gamma2,
            gamma3,
            gamma4: 1.0 - gamma3,
            mu1,
        }
    }
}

/// Illumination and lower boundary for one wavelength.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Boundary {
    /// Cosine of the solar zenith angle, μ₀
    pub(crate) cos_zenith: f64,
    /// Direct-beam flux through a horizontal surface, μ₀πF_s (W/m²)
    pub(crate) direct: f64,
    /// Diffuse downward flux at the top (W/m²)
    pub(crate) diffuse: f64,
    /// Lambertian albedo of the underlying surface
    pub(crate) surface_albedo: f64,
}

/// Everything that follows from one layer's optics.
#[derive(Debug, Clone, Copy)]
struct LayerTerms {
    mu1: f64,
    /// Γ = γ₂ / (γ₁ + λ)
    gamma: f64,
    /// exp(-λτ)
    attenuation: f64,
    e1: f64,
    e2: f64,
    e3: f64,
    e4: f64,
    /// Particular solution C± at the top and bottom of the layer
    c_plus_top: f64,
    c_minus_top: f64,
    c_plus_bottom: f64,
    c_minus_bottom: f64,
    /// Direct-beam flux reaching the base of the layer
    direct_bottom: f64,
    near_singular: bool,
}

impl LayerTerms {
    fn new(layer: &LayerOptics, depth_above: f64, closure: Closure, boundary: &Boundary) -> Self {
        let mu0 = boundary.cos_zenith;
        let Gammas {
            gamma1,
            gamma2,
            gamma3,
            gamma4,
            mu1,
        } = closure.gammas(layer.ssa, layer.asymmetry, mu0);

        let lambda = (gamma1.powi(2) - gamma2.powi(2)).abs().sqrt();
        let gamma = gamma2 / (gamma1 + lambda);
        let attenuation = (-lambda * layer.tau).exp();

        let beam_top = (-depth_above / mu0).exp();
        let beam_bottom = (-(depth_above + layer.tau) / mu0).exp();

        // λ² - 1/μ₀² vanishes when the eigenvalue matches the beam; the
        // particular solution is then undefined
        let resonance = lambda.powi(2) - 1.0 / mu0.powi(2);
        let scattering = boundary.direct > 0.0 && layer.ssa > 0.0;
        let (c_plus_top, c_minus_top, c_plus_bottom, c_minus_bottom) = if scattering {
            // ω πF_s / (λ² - 1/μ₀²), with πF_s = direct / μ₀
            let source = layer.ssa * (boundary.direct / mu0) / resonance;
            let plus = source * ((gamma1 - 1.0 / mu0) * gamma3 + gamma4 * gamma2);
            let minus = source * ((gamma1 + 1.0 / mu0) * gamma4 + gamma2 * gamma3);
            (
                plus * beam_top,
                minus * beam_top,
                plus * beam_bottom,
                minus * beam_bottom,
            )
        } else {
            (0.0, 0.0, 0.0, 0.0)
        };

        Self {
            mu1,
            gamma,
            attenuation,
            e1: 1.0 + gamma * attenuation,
            e2: 1.0 - gamma * attenuation,
            e3: gamma + attenuation,
            e4: gamma - attenuation,
            c_plus_top,
            c_minus_top,
            c_plus_bottom,
            c_minus_bottom,
            direct_bottom: boundary.direct * beam_bottom,
            near_singular: scattering && resonance.abs() < SINGULAR_TOLERANCE / mu0.powi(2),
        }
    }
}

/// One row of the tridiagonal system: `a·y[i-1] + b·y[i] + d·y[i+1] = e`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Row {
    a: f64,
    b: f64,
    d: f64,
    e: f64,
}

/// Tridiagonal system for the 2L coefficients of a column.
#[derive(Debug, Clone)]
struct TridiagonalSystem {
    rows: PerRow<Row>,
}

impl TridiagonalSystem {
    /// Top boundary, two rows per interior interface, bottom boundary.
    fn assemble(terms: &[LayerTerms], boundary: &Boundary) -> Self {
        let mut rows = PerRow::with_capacity(2 * terms.len());
        rows.push(top_row(&terms[0], boundary));
        for pair in terms.windows(2) {
            let (lower_free, upper_free) = interface_rows(&pair[0], &pair[1]);
            rows.push(lower_free);
            rows.push(upper_free);
        }
        rows.push(bottom_row(&terms[terms.len() - 1], boundary));
        Self { rows }
    }

    /// Solve by elimination from the last row up, then substitution from
    /// the first row down (Toon et al. 1989, Eq. 45).
    fn solve(&self) -> PerRow<f64> {
        let n = self.rows.len();
        let mut alpha = PerRow::from_elem(0.0, n);
        let mut beta = PerRow::from_elem(0.0, n);

        let last = &self.rows[n - 1];
        alpha[n - 1] = last.a / last.b;
        beta[n - 1] = last.e / last.b;
        for i in (0..n - 1).rev() {
            let row = &self.rows[i];
            let x = 1.0 / (row.b - row.d * alpha[i + 1]);
            alpha[i] = row.a * x;
            beta[i] = (row.e - row.d * beta[i + 1]) * x;
        }

        let mut y = PerRow::from_elem(0.0, n);
        y[0] = beta[0];
        for i in 1..n {
            y[i] = beta[i] - alpha[i] * y[i - 1];
        }
        y
    }
}

/// Diffuse downward flux at the top equals the incident diffuse flux.
fn top_row(top: &LayerTerms, boundary: &Boundary) -> Row {
    Row {
        a: 0.0,
        b: top.e1,
        d: -top.e2,
        e: boundary.diffuse - top.c_minus_top,
    }
}

/// Continuity of upward and downward diffuse flux between `upper` and
/// `lower`, combined so the system stays tridiagonal.
///
/// The first row eliminates Y₂ of `lower` and couples Y₁, Y₂ of `upper` to
/// Y₁ of `lower`; the second eliminates Y₁ of `upper` and couples Y₂ of
/// `upper` to Y₁, Y₂ of `lower` (Toon et al. 1989, Eqs. 41-42). At the top of
/// a layer F↑ = Y₁e₃ - Y₂e₄ + C⁺ and F↓ = Y₁e₁ - Y₂e₂ + C⁻.
fn interface_rows(upper: &LayerTerms, lower: &LayerTerms) -> (Row, Row) {
    let jump_plus = lower.c_plus_top - upper.c_plus_bottom;
    let jump_minus = lower.c_minus_top - upper.c_minus_bottom;
    let lower_free = Row {
        a: lower.e2 * upper.e1 - upper.e3 * lower.e4,
        b: upper.e2 * lower.e2 - upper.e4 * lower.e4,
        d: lower.e1 * lower.e4 - lower.e2 * lower.e3,
        e: lower.e2 * jump_plus - lower.e4 * jump_minus,
    };
    let upper_free = Row {
        a: upper.e2 * upper.e3 - upper.e4 * upper.e1,
        b: upper.e1 * lower.e1 - upper.e3 * lower.e3,
        d: upper.e3 * lower.e4 - upper.e1 * lower.e2,
        e: upper.e3 * jump_plus - upper.e1 * jump_minus,
    };
    (lower_free, upper_free)
}

/// Upward diffuse flux at the base is the surface's reflection of
/// everything reaching it.
fn bottom_row(bottom: &LayerTerms, boundary: &Boundary) -> Row {
    let albedo = boundary.surface_albedo;
    let reflected_beam = albedo * bottom.direct_bottom;
    Row {
        a: bottom.e1 - albedo * bottom.e3,
        b: bottom.e2 - albedo * bottom.e4,
        d: 0.0,
        e: reflected_beam - bottom.c_plus_bottom + albedo * bottom.c_minus_bottom,
    }
}

/// Fluxes of a column at one wavelength. Per-layer values are at the base of
/// each layer.
#[derive(Debug, Clone)]
pub(crate) struct SpectralFluxes {
    /// Upward over incident flux at the top
    pub(crate) albedo: f64,
    /// Upward diffuse flux
    pub(crate) upward: PerLayer<f64>,
    /// Downward flux, diffuse plus direct
    pub(crate) downward: PerLayer<f64>,
    /// Net flux, upward minus downward
    pub(crate) net: PerLayer<f64>,
    /// Mean intensity
    pub(crate) mean_intensity: PerLayer<f64>,
    /// Flux absorbed within each layer
    pub(crate) absorbed: PerLayer<f64>,
    /// Flux absorbed by the underlying surface
    pub(crate) transmitted: f64,
    /// Total incident flux at the top
    pub(crate) incident: f64,
    /// `incident - (absorbed + transmitted + reflected)`
    pub(crate) residual: f64,
    /// Largest `|net - (upward - downward)|` over the interfaces
    pub(crate) net_discrepancy: f64,
    /// Whether any layer sat near the particular-solution singularity
    pub(crate) near_singular: bool,
}

/// Terms of every layer, with the beam attenuated by the layers above.
fn layer_terms(
    layers: &[LayerOptics],
    closure: Closure,
    boundary: &Boundary,
) -> PerLayer<LayerTerms> {
    let mut depth_above = 0.0;
    layers
        .iter()
        .map(|layer| {
            let terms = LayerTerms::new(layer, depth_above, closure, boundary);
            depth_above += layer.tau;
            terms
        })
        .collect()
}

/// Solve the column `layers` (top first) at one wavelength.
pub(crate) fn solve(layers: &[LayerOptics], closure: Closure, boundary: &Boundary) -> SpectralFluxes {
    let terms = layer_terms(layers, closure, boundary);
    let y = TridiagonalSystem::assemble(&terms, boundary).solve();

    let num_layers = terms.len();
    let mut upward = PerLayer::with_capacity(num_layers);
    let mut downward = PerLayer::with_capacity(num_layers);
    let mut net = PerLayer::with_capacity(num_layers);
    let mut mean_intensity = PerLayer::with_capacity(num_layers);
    let mut net_discrepancy: f64 = 0.0;

    for (n, t) in terms.iter().enumerate() {
        let (y1, y2) = (y[2 * n], y[2 * n + 1]);
        let up = y1 * t.e1 + y2 * t.e2 + t.c_plus_bottom;
        let down = y1 * t.e3 + y2 * t.e4 + t.c_minus_bottom + t.direct_bottom;
        let net_flux =
            y1 * (t.e1 - t.e3) + y2 * (t.e2 - t.e4) + t.c_plus_bottom - t.c_minus_bottom
                - t.direct_bottom;
        let intensity = ((y1 * (t.e1 + t.e3) + y2 * (t.e2 + t.e4) + t.c_plus_bottom
            + t.c_minus_bottom)
            / t.mu1
            + t.direct_bottom / boundary.cos_zenith)
            / (4.0 * PI);

        net_discrepancy = net_discrepancy.max((net_flux - (up - down)).abs());
        upward.push(up);
        downward.push(down);
        net.push(net_flux);
        mean_intensity.push(intensity);
    }

    let top = &terms[0];
    let reflected =
        y[0] * (top.attenuation + top.gamma) + y[1] * (top.attenuation - top.gamma) + top.c_plus_top;
    let incident = boundary.direct + boundary.diffuse;
    let albedo = if incident > 0.0 {
        reflected / incident
    } else {
        0.0
    };

    let mut absorbed = PerLayer::with_capacity(num_layers);
    let mut net_above = reflected - incident;
    for &net_below in &net {
        absorbed.push(net_below - net_above);
        net_above = net_below;
    }
    let transmitted = -net[num_layers - 1];
    let residual = incident - (absorbed.iter().sum::<f64>() + transmitted + reflected);

    SpectralFluxes {
        albedo,
        upward,
        downward,
        net,
        mean_intensity,
        absorbed,
        transmitted,
        incident,
        residual,
        net_discrepancy,
        near_singular: terms.iter().any(|t| t.near_singular),
    }
}
