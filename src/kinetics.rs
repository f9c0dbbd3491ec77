//! Kinetic rate laws.
//!
//! The rate of a kinetic species is
//!
//! ```text
//! rate = sgn * k * A * [M * mw] * kin_monod * prod_i promoter_i * |1 - (Q/K)^theta|^eta
//!        * exp(Ea / R * (1/T0 - 1/T))
//! ```
//!
//! where `A` is the area quantity, `M` the kinetic mole number (the bracketed
//! factor only applies when `multiply_by_mass` is set), `kin_monod` is
//! `(M/nw)^a / ((M/nw)^a + Ks^a)^b`, each promoting factor is
//! `v^p / (v^p + K_half^p)^m` with `v` the promoting species' molality (or
//! activity for gases, `H+` and `OH-`), and `Q/K` is the activity product of
//! the kinetic reaction divided by its equilibrium constant, lowered by any
//! captured energy. The sign `sgn` depends on [`Direction`].
//!
//! [`calculate_rate`] also returns the derivatives of the rate with respect
//! to the kinetic mole number and the basis molalities. Derivatives of
//! activity coefficients and of the water activity are ignored.

use serde::{Deserialize, Serialize};

use crate::constants::{CELSIUS_TO_KELVIN, GAS_CONSTANT, WATER_NAME};
use crate::database::{ModelDatabase, Species};
use crate::error::{GeochemError, GeochemResult};

/// Which way a kinetic reaction may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Dissolution when Q < K, precipitation when Q > K
    #[default]
    Both,
    /// Only dissolution, the rate is zero when Q > K
    Dissolution,
    /// Only precipitation, the rate is zero when Q < K
    Precipitation,
    /// The magnitude of the rate, independent of Q/K sign
    Raw,
    /// Like `Raw`, for biomass decay: basis species are not altered
    Death,
}

/// A species that promotes (or inhibits) a kinetic reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotingSpecies {
    /// Basis or equilibrium species name
    pub name: String,
    /// Exponent `p`
    pub index: f64,
    /// Monod exponent `m`
    #[serde(default)]
    pub monod_index: f64,
    /// Half saturation `K_half`
    #[serde(default)]
    pub half_saturation: f64,
}

impl PromotingSpecies {
    pub fn new(name: &str, index: f64) -> Self {
        PromotingSpecies { name: name.to_string(), index, monod_index: 0.0, half_saturation: 0.0 }
    }

    pub fn with_monod(mut self, monod_index: f64, half_saturation: f64) -> Self {
        self.monod_index = monod_index;
        self.half_saturation = half_saturation;
        self
    }
}

/// User description of a kinetic rate law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KineticRateDescription {
    /// Name of the kinetic species
    pub kinetic_species: String,
    /// Intrinsic rate constant `k`
    pub intrinsic_rate_constant: f64,
    /// Area (or other) quantity `A`
    pub area_quantity: f64,
    /// Multiply by the kinetic species' mass in grams
    pub multiply_by_mass: bool,
    /// Exponent `a` of the kinetic molality
    pub kinetic_molal_index: f64,
    /// Monod exponent `b` of the kinetic molality
    pub kinetic_monod_index: f64,
    /// Half saturation `Ks` of the kinetic molality
    pub kinetic_half_saturation: f64,
    pub promoting_species: Vec<PromotingSpecies>,
    pub theta: f64,
    pub eta: f64,
    /// Activation energy [J/mol]
    pub activation_energy: f64,
    /// Reciprocal of the reference temperature [1/K]
    pub one_over_t0: f64,
    pub direction: Direction,
    /// Species produced by the reaction, in the basis or in equilibrium
    pub progeny: String,
    pub progeny_efficiency: f64,
    /// Multiplier on the rate for the kinetic species itself
    pub kinetic_bio_efficiency: f64,
    /// Energy captured by the reaction [J/mol]
    pub energy_captured: f64,
}

impl Default for KineticRateDescription {
    fn default() -> Self {
        KineticRateDescription {
            kinetic_species: String::new(),
            intrinsic_rate_constant: 1.0,
            area_quantity: 1.0,
            multiply_by_mass: false,
            kinetic_molal_index: 0.0,
            kinetic_monod_index: 0.0,
            kinetic_half_saturation: 0.0,
            promoting_species: Vec::new(),
            theta: 1.0,
            eta: 1.0,
            activation_energy: 0.0,
            one_over_t0: 1.0 / (25.0 + CELSIUS_TO_KELVIN),
            direction: Direction::Both,
            progeny: WATER_NAME.to_string(),
            progeny_efficiency: 0.0,
            kinetic_bio_efficiency: -1.0,
            energy_captured: 0.0,
        }
    }
}

impl KineticRateDescription {
    pub fn new(kinetic_species: &str, intrinsic_rate_constant: f64, area_quantity: f64) -> Self {
        KineticRateDescription {
            kinetic_species: kinetic_species.to_string(),
            intrinsic_rate_constant,
            area_quantity,
            ..Default::default()
        }
    }

    pub fn with_multiply_by_mass(mut self, multiply: bool) -> Self {
        self.multiply_by_mass = multiply;
        self
    }

    pub fn with_kinetic_monod(mut self, molal_index: f64, monod_index: f64, half_saturation: f64) -> Self {
        self.kinetic_molal_index = molal_index;
        self.kinetic_monod_index = monod_index;
        self.kinetic_half_saturation = half_saturation;
        self
    }

    pub fn with_promoter(mut self, promoter: PromotingSpecies) -> Self {
        self.promoting_species.push(promoter);
        self
    }

    pub fn with_theta_eta(mut self, theta: f64, eta: f64) -> Self {
        self.theta = theta;
        self.eta = eta;
        self
    }

    pub fn with_activation(mut self, activation_energy: f64, one_over_t0: f64) -> Self {
        self.activation_energy = activation_energy;
        self.one_over_t0 = one_over_t0;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_progeny(mut self, progeny: &str, efficiency: f64) -> Self {
        self.progeny = progeny.to_string();
        self.progeny_efficiency = efficiency;
        self
    }

    pub fn with_bio_efficiency(mut self, kinetic_bio_efficiency: f64) -> Self {
        self.kinetic_bio_efficiency = kinetic_bio_efficiency;
        self
    }

    pub fn with_energy_captured(mut self, energy_captured: f64) -> Self {
        self.energy_captured = energy_captured;
        self
    }

    /// Checks that no promoting species appears twice.
    pub fn validate(&self) -> GeochemResult<()> {
        for (i, p) in self.promoting_species.iter().enumerate() {
            if self.promoting_species[..i].iter().any(|q| q.name == p.name) {
                return Err(GeochemError::InvalidRateDescription {
                    species: self.kinetic_species.clone(),
                    reason: format!("Promoting species {} has already been provided with an exponent", p.name),
                });
            }
        }
        Ok(())
    }
}

/// A rate description resolved against the current basis and equilibrium
/// species of a database.
///
/// The promoting arrays have one slot per basis species followed by one per
/// equilibrium species; slots of species that do not promote hold zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct KineticRateDefinition {
    pub kinetic_species_index: usize,
    pub description: KineticRateDescription,
    pub promoting_indices: Vec<f64>,
    pub promoting_monod_indices: Vec<f64>,
    pub promoting_half_saturation: Vec<f64>,
    /// Basis index, or `num_basis + j` for equilibrium species `j`
    pub progeny_index: usize,
}

impl KineticRateDefinition {
    /// Resolves `description` against `db`.
    pub fn resolve(description: KineticRateDescription, db: &ModelDatabase) -> GeochemResult<Self> {
        description.validate()?;
        let kinetic_species_index = db
            .kinetic_index(&description.kinetic_species)
            .ok_or_else(|| GeochemError::UnknownSpecies(description.kinetic_species.clone()))?;
        let nb = db.num_basis();
        let locate = |name: &str| -> GeochemResult<usize> {
            db.basis_index(name)
                .or_else(|| db.eqm_index(name).map(|j| nb + j))
                .ok_or_else(|| GeochemError::InvalidRateDescription {
                    species: description.kinetic_species.clone(),
                    reason: format!("{name} is neither a basis nor an equilibrium species"),
                })
        };

        let n = nb + db.num_eqm();
        let mut promoting_indices = vec![0.0; n];
        let mut promoting_monod_indices = vec![0.0; n];
        let mut promoting_half_saturation = vec![0.0; n];
        for p in &description.promoting_species {
            let slot = locate(&p.name)?;
            promoting_indices[slot] = p.index;
            promoting_monod_indices[slot] = p.monod_index;
            promoting_half_saturation[slot] = p.half_saturation;
        }
        let progeny_index = locate(&description.progeny)?;
        Ok(KineticRateDefinition {
            kinetic_species_index,
            description,
            promoting_indices,
            promoting_monod_indices,
            promoting_half_saturation,
            progeny_index,
        })
    }

    /// Adds an empty slot for a newly added equilibrium species.
    pub(crate) fn grow_for_new_eqm(&mut self) {
        self.promoting_indices.push(0.0);
        self.promoting_monod_indices.push(0.0);
        self.promoting_half_saturation.push(0.0);
    }

    /// Exchanges slots `a` and `b` after a basis swap.
    pub(crate) fn swap_indices(&mut self, a: usize, b: usize) {
        self.promoting_indices.swap(a, b);
        self.promoting_monod_indices.swap(a, b);
        self.promoting_half_saturation.swap(a, b);
        if self.progeny_index == a {
            self.progeny_index = b;
        } else if self.progeny_index == b {
            self.progeny_index = a;
        }
    }
}

/// Speciation quantities needed to evaluate a rate.
#[derive(Debug, Clone, Copy)]
pub struct RateInputs<'a> {
    /// Basis molalities (solvent mass in kg for water)
    pub basis_molality: &'a [f64],
    pub basis_activity: &'a [f64],
    pub basis_activity_known: &'a [bool],
    pub eqm_molality: &'a [f64],
    /// Equilibrium activities, needed for gases, `H+` and `OH-`
    pub eqm_activity: &'a [f64],
    /// Mole number of the kinetic species
    pub kin_moles: f64,
    /// log10K of the kinetic reaction
    pub kin_log10k: f64,
    /// log10 of the activity product of the kinetic reaction
    pub log10_activity_product: f64,
    /// Temperature [C]
    pub temperature: f64,
}

/// Rate and its derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct KineticRate {
    /// Rate [mol/time]
    pub rate: f64,
    /// d(rate)/d(kinetic moles)
    pub drate_dkin: f64,
    /// d(rate)/d(basis molality), with `[0]` w.r.t. the solvent mass
    pub drate_dmol: Vec<f64>,
}

fn uses_activity(species: &Species) -> bool {
    species.is_gas() || species.name == "H+" || species.name == "OH-"
}

/// `v^p / (v^p + h^p)^m` and its logarithmic derivative `d ln f / d ln v`.
fn monod_factor(v: f64, p: f64, m: f64, h: f64) -> (f64, f64) {
    let vp = v.powf(p);
    let denom = vp + h.powf(p);
    let f = vp / denom.powf(m);
    let dlog = if denom > 0.0 { p - m * p * vp / denom } else { p };
    (f, dlog)
}

fn check_len(what: &'static str, expected: usize, got: usize) -> GeochemResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(GeochemError::SizeMismatch { what, expected, got })
    }
}

/// Evaluates the rate law `definition` and its derivatives.
pub fn calculate_rate(
    definition: &KineticRateDefinition,
    db: &ModelDatabase,
    inputs: &RateInputs<'_>,
) -> GeochemResult<KineticRate> {
    let nb = db.num_basis();
    let neq = db.num_eqm();
    check_len("promoting indices", nb + neq, definition.promoting_indices.len())?;
    check_len("promoting monod indices", nb + neq, definition.promoting_monod_indices.len())?;
    check_len("promoting half saturation", nb + neq, definition.promoting_half_saturation.len())?;
    check_len("basis molality", nb, inputs.basis_molality.len())?;
    check_len("basis activity", nb, inputs.basis_activity.len())?;
    check_len("basis activity known", nb, inputs.basis_activity_known.len())?;
    check_len("equilibrium molality", neq, inputs.eqm_molality.len())?;
    check_len("equilibrium activity", neq, inputs.eqm_activity.len())?;
    let kin = definition.kinetic_species_index;
    if kin >= db.num_kinetic() {
        return Err(GeochemError::IndexOutOfRange { what: "kinetic species", index: kin, len: db.num_kinetic() });
    }

    let desc = &definition.description;
    let m = inputs.basis_molality;
    let known = inputs.basis_activity_known;
    let nw = m[0];
    // molalities whose variation moves the activity product
    let varies = |b: usize| b != 0 && !known[b] && m[b] != 0.0;

    // prefactor without sign or the Q/K factor, with d ln / d m_b accumulated
    let mut dlog_dmol = vec![0.0; nb];
    let mut prefactor = desc.intrinsic_rate_constant
        * desc.area_quantity
        * (desc.activation_energy / GAS_CONSTANT * (desc.one_over_t0 - 1.0 / (inputs.temperature + CELSIUS_TO_KELVIN)))
            .exp();

    let n_kin = inputs.kin_moles;
    let kin_molality = n_kin / nw;
    let (kin_monod, kin_dlog) = monod_factor(
        kin_molality,
        desc.kinetic_molal_index,
        desc.kinetic_monod_index,
        desc.kinetic_half_saturation,
    );
    let mass = if desc.multiply_by_mass { n_kin * db.kinetic[kin].molecular_weight } else { 1.0 };
    prefactor *= kin_monod;
    // d ln(kin_monod) / d n = kin_dlog / n, and / d nw = -kin_dlog / nw
    let dlog_dkin = if n_kin != 0.0 { kin_dlog / n_kin } else { 0.0 };
    dlog_dmol[0] -= kin_dlog / nw;

    for (i, sp) in db.basis.iter().enumerate() {
        let p = definition.promoting_indices[i];
        if p == 0.0 {
            continue;
        }
        let (v, d_ln_v) = if i == 0 {
            (nw, Some(0))
        } else if uses_activity(sp) {
            (inputs.basis_activity[i], if known[i] { None } else { Some(i) })
        } else {
            (m[i], Some(i))
        };
        let (f, g) = monod_factor(
            v,
            p,
            definition.promoting_monod_indices[i],
            definition.promoting_half_saturation[i],
        );
        prefactor *= f;
        if let Some(b) = d_ln_v {
            if m[b] != 0.0 {
                dlog_dmol[b] += g / m[b];
            }
        }
    }
    for (j, sp) in db.eqm.iter().enumerate() {
        let slot = nb + j;
        let p = definition.promoting_indices[slot];
        if p == 0.0 {
            continue;
        }
        let v = if uses_activity(sp) { inputs.eqm_activity[j] } else { inputs.eqm_molality[j] };
        let (f, g) = monod_factor(
            v,
            p,
            definition.promoting_monod_indices[slot],
            definition.promoting_half_saturation[slot],
        );
        prefactor *= f;
        for b in (1..nb).filter(|&b| varies(b)) {
            dlog_dmol[b] += g * db.eqm_stoichiometry[(j, b)] / m[b];
        }
    }

    let log10k = desc.energy_captured.mul_add(
        -1.0 / (GAS_CONSTANT * (inputs.temperature + CELSIUS_TO_KELVIN) * std::f64::consts::LN_10),
        inputs.kin_log10k,
    );
    let q_over_k_log10 = inputs.log10_activity_product - log10k;
    let qk = 10f64.powf(q_over_k_log10 * desc.theta);
    let u = 1.0 - qk;
    let affinity = u.abs().powf(desc.eta);
    let daffinity_dqk = if u == 0.0 { 0.0 } else { -desc.eta * u.abs().powf(desc.eta - 1.0) * u.signum() };

    let sign = match desc.direction {
        Direction::Both => {
            if q_over_k_log10 > 0.0 {
                -1.0
            } else {
                1.0
            }
        }
        Direction::Dissolution if q_over_k_log10 > 0.0 => 0.0,
        Direction::Precipitation if q_over_k_log10 < 0.0 => 0.0,
        Direction::Precipitation => -1.0,
        Direction::Dissolution | Direction::Raw | Direction::Death => 1.0,
    };

    let magnitude = sign * prefactor * mass;
    let rate = magnitude * affinity;
    let drate_dkin = if desc.multiply_by_mass {
        sign * prefactor * db.kinetic[kin].molecular_weight * affinity + rate * dlog_dkin
    } else {
        rate * dlog_dkin
    };
    let mut drate_dmol: Vec<f64> = dlog_dmol.iter().map(|d| rate * d).collect();
    if sign != 0.0 && daffinity_dqk != 0.0 {
        // d qk / d m_b = theta * qk * kin_stoi(b) / m_b
        for b in (1..nb).filter(|&b| varies(b)) {
            let dqk = desc.theta * qk * db.kin_stoichiometry[(kin, b)] / m[b];
            drate_dmol[b] += magnitude * daffinity_dqk * dqk;
        }
    }
    Ok(KineticRate { rate, drate_dkin, drate_dmol })
}
