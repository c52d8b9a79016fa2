use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::Parser;
use hjets::{
    AnalysisConfig, EtaCut, JetCuts, NtupleLayout, WeightSelection,
    DEFAULT_TREE, DEFAULT_WEIGHT_BRANCH, MAX_TRACKED_JETS, PID_HIGGS,
};

/// Fill Higgs and jet histograms from ROOT ntuples or Les Houches Event Files
#[derive(Debug, Parser)]
#[clap(version, about)]
pub(crate) struct Opt {
    /// Output file for the histograms
    #[clap(value_parser)]
    pub(crate) outfile: PathBuf,

    /// Input ROOT ntuples or event files, optionally gzip-compressed
    #[clap(required = true, value_parser)]
    pub(crate) infiles: Vec<PathBuf>,

    /// Minimum jet transverse momentum
    #[clap(long, default_value_t = 30.)]
    pub(crate) pt_min: f64,

    /// Maximum jet pseudorapidity
    #[clap(long, default_value_t = 4.4)]
    pub(crate) eta_max: f64,

    /// Cut on the absolute jet pseudorapidity
    ///
    /// By default only jets with pseudorapidity above the maximum are
    /// rejected, while jets with large negative pseudorapidity are kept.
    #[clap(long)]
    pub(crate) symmetric_eta: bool,

    /// Number of leading jet positions with their own pT histogram
    #[clap(
        long,
        default_value_t = 4,
        value_parser = RangedU64ValueParser::<usize>::new().range(..=MAX_TRACKED_JETS as u64)
    )]
    pub(crate) max_jets: usize,

    /// Particle ID of the Higgs boson
    #[clap(long, default_value_t = PID_HIGGS, allow_hyphen_values = true)]
    pub(crate) higgs_pid: i32,

    /// Use the reweighting weight with this id instead of the central weight
    ///
    /// Only applies to Les Houches Event Files.
    #[clap(long)]
    pub(crate) weight: Option<String>,

    /// Name of the event tree in ROOT ntuples
    #[clap(long, default_value = DEFAULT_TREE)]
    pub(crate) tree: String,

    /// Name of the event weight branch in ROOT ntuples
    #[clap(long, default_value = DEFAULT_WEIGHT_BRANCH)]
    pub(crate) weight_branch: String,

    /// Verbosity level
    ///
    /// Possible values with increasing amount of output are
    /// 'off', 'error', 'warn', 'info', 'debug', 'trace'.
    #[clap(short, long, default_value = "info")]
    pub(crate) loglevel: String,
}

impl Opt {
    pub(crate) fn analysis_config(&self) -> AnalysisConfig {
        let eta_cut = if self.symmetric_eta {
            EtaCut::Absolute
        } else {
            EtaCut::Signed
        };
        AnalysisConfig {
            cuts: JetCuts {
                pt_min: self.pt_min,
                eta_max: self.eta_max,
                eta_cut,
            },
            max_jets: self.max_jets,
            higgs_pid: self.higgs_pid,
        }
    }

    pub(crate) fn ntuple_layout(&self) -> NtupleLayout {
        NtupleLayout {
            tree: self.tree.clone(),
            weight: self.weight_branch.clone(),
        }
    }

    pub(crate) fn weight_selection(&self) -> WeightSelection {
        match &self.weight {
            Some(id) => WeightSelection::Named(id.clone()),
            None => WeightSelection::Central,
        }
    }
}
