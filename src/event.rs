#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pseudorapidity assigned to momenta along the beam axis
const BEAM_AXIS_ETA: f64 = 1e10;

/// Four-momentum with components (E, px, py, pz)
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Default, PartialEq, PartialOrd, Debug)]
pub struct FourMomentum(pub [f64; 4]);

impl FourMomentum {
    /// Construct a four-momentum from energy and momentum components
    pub fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self([e, px, py, pz])
    }

    pub fn e(&self) -> f64 {
        self.0[0]
    }

    pub fn px(&self) -> f64 {
        self.0[1]
    }

    pub fn py(&self) -> f64 {
        self.0[2]
    }

    pub fn pz(&self) -> f64 {
        self.0[3]
    }

    /// Transverse momentum
    pub fn pt(&self) -> f64 {
        self.px().hypot(self.py())
    }

    /// Pseudorapidity
    ///
    /// Momenta along the beam axis get ±10¹⁰, a momentum at rest gets 0.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt > 0. {
            (self.pz() / pt).asinh()
        } else if self.pz() > 0. {
            BEAM_AXIS_ETA
        } else if self.pz() < 0. {
            -BEAM_AXIS_ETA
        } else {
            0.
        }
    }

    /// Azimuthal angle in (-π, π]
    pub fn phi(&self) -> f64 {
        if self.px() == 0. && self.py() == 0. {
            0.
        } else {
            self.py().atan2(self.px())
        }
    }

    /// Rapidity
    pub fn rapidity(&self) -> f64 {
        0.5 * ((self.e() + self.pz()) / (self.e() - self.pz())).ln()
    }

    /// Invariant mass, negative for space-like momenta
    pub fn mass(&self) -> f64 {
        let m2 = self.e() * self.e()
            - self.px() * self.px()
            - self.py() * self.py()
            - self.pz() * self.pz();
        if m2 < 0. {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }
}

impl From<[f64; 4]> for FourMomentum {
    fn from(p: [f64; 4]) -> Self {
        Self(p)
    }
}

/// Outgoing particle
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Default, PartialEq, PartialOrd, Debug)]
pub struct Particle {
    /// Particle ID following the PDG Monte Carlo numbering scheme
    pub id: i32,
    /// Four-momentum
    pub p: FourMomentum,
}

impl Particle {
    pub fn new(id: i32, p: FourMomentum) -> Self {
        Self { id, p }
    }
}

/// Scattering event reduced to its outgoing particles
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Default, PartialEq, PartialOrd, Debug)]
pub struct Event {
    /// Event weight
    pub weight: f64,
    /// Outgoing particles in the order they appear in the input
    pub out: Vec<Particle>,
}

impl Event {
    /// Number of outgoing particles
    pub fn nparticle(&self) -> usize {
        self.out.len()
    }
}
