//! Higgs plus jets histograms from ROOT ntuples and Les Houches Event Files
//!
//! Events are read from a [Chain] of event files, either ROOT ntuples with
//! the particle branches `nparticle`, `kf`, `E`, `px`, `py`, `pz` (see
//! [NtupleLayout]) or Les Houches Event Files. In each event the Higgs
//! candidate (PDG ID 25) and the jets (everything else) are identified,
//! jets are subjected to [JetCuts], and the Higgs transverse momentum, jet
//! transverse momenta, and jet multiplicities are histogrammed.
//!
//! # Example
//!
//! ```rust,no_run
//! use hjets::{analyse, AnalysisConfig, Chain, WeightSelection, Writer};
//!
//! let mut chain = Chain::new(WeightSelection::Central);
//! chain.add("events.root").unwrap();
//! let (histograms, summary) = analyse(chain, AnalysisConfig::default()).unwrap();
//! summary.log();
//!
//! let mut writer = Writer::new(std::io::stdout());
//! for histo in histograms.iter() {
//!     writer.write_histogram(histo).unwrap();
//! }
//! ```
pub mod analysis;
pub mod chain;
pub mod event;
pub mod histogram;
pub mod ntuple;
pub mod reader;
pub mod status;
pub mod writer;
mod tags;

pub use analysis::*;
pub use chain::*;
pub use event::*;
pub use histogram::*;
pub use ntuple::*;
pub use reader::*;
pub use status::*;
pub use writer::*;
