use log::{info, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::event::{Event, FourMomentum};
use crate::histogram::Histo1D;

/// PDG Monte Carlo ID of the Higgs boson
pub const PID_HIGGS: i32 = 25;

const PT_NBINS: usize = 100;
const PT_MIN: f64 = 0.;
const PT_MAX: f64 = 1.5e3;

const PROGRESS_INTERVAL: u64 = 100_000;

/// Largest supported number of tracked jet positions
pub const MAX_TRACKED_JETS: usize = 64;

/// How to apply the pseudorapidity cut to jets
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Hash)]
pub enum EtaCut {
    /// Reject jets with η > η_max, jets at large negative η are kept
    #[default]
    Signed,
    /// Reject jets with |η| > η_max
    Absolute,
}

/// Kinematic cuts on jets
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JetCuts {
    /// Minimum transverse momentum
    pub pt_min: f64,
    /// Maximum pseudorapidity
    pub eta_max: f64,
    pub eta_cut: EtaCut,
}

impl Default for JetCuts {
    fn default() -> Self {
        Self {
            pt_min: 30.,
            eta_max: 4.4,
            eta_cut: EtaCut::Signed,
        }
    }
}

impl JetCuts {
    /// Check whether a jet with the given transverse momentum and
    /// pseudorapidity is accepted
    pub fn accept(&self, pt: f64, eta: f64) -> bool {
        if pt < self.pt_min {
            return false;
        }
        let eta = match self.eta_cut {
            EtaCut::Signed => eta,
            EtaCut::Absolute => eta.abs(),
        };
        // NaN fails neither comparison, the same as in the pT cut
        !(eta > self.eta_max)
    }
}

/// Analysis settings
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    pub cuts: JetCuts,
    /// Number of leading jet positions with their own pT histogram
    pub max_jets: usize,
    /// Particle ID identifying the Higgs candidate
    pub higgs_pid: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cuts: JetCuts::default(),
            max_jets: 4,
            higgs_pid: PID_HIGGS,
        }
    }
}

/// Event split into Higgs candidate and jets
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classified {
    /// The last Higgs candidate in the event
    pub higgs: Option<FourMomentum>,
    /// Number of Higgs candidates seen
    pub higgs_candidates: usize,
    /// All other particles in input order
    pub jets: Vec<FourMomentum>,
}

/// Split the outgoing particles into the Higgs candidate and jets
///
/// If there are several Higgs candidates, the last one is kept.
pub fn classify(event: &Event, higgs_pid: i32) -> Classified {
    let mut res = Classified::default();
    for particle in &event.out {
        if particle.id == higgs_pid {
            res.higgs = Some(particle.p);
            res.higgs_candidates += 1;
        } else {
            res.jets.push(particle.p);
        }
    }
    res
}

/// Histograms filled by the analysis
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Histograms {
    /// Higgs transverse momentum
    pub higgs_pt: Histo1D,
    /// Number of jets passing the cuts
    pub njets_excl: Histo1D,
    /// Number of events with at least n jets passing the cuts
    pub njets_incl: Histo1D,
    /// Transverse momentum of the jet at each tracked position
    pub jet_pt: Vec<Histo1D>,
}

impl Histograms {
    /// Book the histograms for `max_jets` tracked jet positions
    ///
    /// # Panics
    ///
    /// Panics if `max_jets` exceeds [MAX_TRACKED_JETS].
    pub fn new(max_jets: usize) -> Self {
        assert!(
            max_jets <= MAX_TRACKED_JETS,
            "At most {MAX_TRACKED_JETS} jet positions can be tracked, got {max_jets}"
        );
        let nmax = max_jets as f64;
        let jet_pt = (1..=max_jets)
            .map(|n| Histo1D::new(format!("jet{n}_pT"), PT_NBINS, PT_MIN, PT_MAX))
            .collect();
        Self {
            higgs_pt: Histo1D::new("H_pT", PT_NBINS, PT_MIN, PT_MAX),
            njets_excl: Histo1D::new("Njets_excl", max_jets + 1, -0.5, nmax + 0.5),
            njets_incl: Histo1D::new("Njets_incl", max_jets + 1, -0.5, nmax + 0.5),
            jet_pt,
        }
    }

    /// All histograms in output order
    pub fn iter(&self) -> impl Iterator<Item = &Histo1D> {
        [&self.higgs_pt, &self.njets_excl, &self.njets_incl]
            .into_iter()
            .chain(self.jet_pt.iter())
    }

    /// Look up a histogram by its name
    pub fn get(&self, name: &str) -> Option<&Histo1D> {
        self.iter().find(|h| h.name() == name)
    }
}

/// Event counts and weights collected over the whole run
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Summary {
    /// Events seen
    pub nevents: u64,
    /// Events with a Higgs candidate
    pub accepted: u64,
    /// Events without a Higgs candidate
    pub no_higgs: u64,
    /// Events with more than one Higgs candidate
    pub multiple_higgs: u64,
    /// Sum of weights of events with a Higgs candidate
    pub sumw: f64,
}

/// Accumulate Higgs and jet histograms event by event
#[derive(Clone, Debug)]
pub struct Analysis {
    config: AnalysisConfig,
    histograms: Histograms,
    summary: Summary,
}

impl Analysis {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            histograms: Histograms::new(config.max_jets),
            config,
            summary: Summary::default(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn histograms(&self) -> &Histograms {
        &self.histograms
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Fill histograms with the `idx`th event
    ///
    /// Returns the number of jets passing the cuts, or `None` if the
    /// event was skipped because it has no Higgs candidate.
    pub fn add(&mut self, idx: u64, event: &Event) -> Option<usize> {
        self.summary.nevents += 1;
        let Classified {
            higgs,
            higgs_candidates,
            jets,
        } = classify(event, self.config.higgs_pid);
        let Some(higgs) = higgs else {
            warn!("No Higgs in entry {idx}");
            self.summary.no_higgs += 1;
            return None;
        };
        if higgs_candidates > 1 {
            warn!("{higgs_candidates} Higgs candidates in entry {idx}, keeping the last one");
            self.summary.multiple_higgs += 1;
        }
        self.summary.accepted += 1;
        let weight = event.weight;
        self.summary.sumw += weight;

        let hists = &mut self.histograms;
        hists.higgs_pt.fill(higgs.pt(), weight);

        let mut njets = 0;
        for (pos, jet) in jets.iter().enumerate() {
            let pt = jet.pt();
            if !self.config.cuts.accept(pt, jet.eta()) {
                continue;
            }
            njets += 1;
            if let Some(hist) = hists.jet_pt.get_mut(pos) {
                hist.fill(pt, weight);
            }
        }

        hists.njets_excl.fill(njets as f64, weight);
        for n in 0..=njets {
            hists.njets_incl.fill(n as f64, weight);
        }
        Some(njets)
    }

    /// Finalise the histograms
    ///
    /// The inclusive multiplicity histogram is filled several times per
    /// event, so its entry count is reset to the number of events.
    pub fn finish(self) -> (Histograms, Summary) {
        let Self {
            mut histograms,
            summary,
            ..
        } = self;
        let entries = histograms.njets_excl.entries();
        histograms.njets_incl.set_entries(entries);
        (histograms, summary)
    }
}

/// Run the analysis over all events and finalise the histograms
///
/// Stops at the first event that cannot be read.
pub fn analyse<I, E>(
    events: I,
    config: AnalysisConfig,
) -> Result<(Histograms, Summary), E>
where
    I: IntoIterator<Item = Result<Event, E>>,
{
    let mut analysis = Analysis::new(config);
    for (idx, event) in (0..).zip(events) {
        analysis.add(idx, &event?);
        let nevents = idx + 1;
        if nevents % PROGRESS_INTERVAL == 0 {
            info!("Processed {nevents} events");
        }
    }
    Ok(analysis.finish())
}

impl Summary {
    /// Log the event counts
    pub fn log(&self) {
        info!("Read {} events", self.nevents);
        info!(
            "Accepted {} events with total weight {}",
            self.accepted, self.sumw
        );
        if self.no_higgs > 0 {
            info!("Skipped {} events without Higgs", self.no_higgs);
        }
        if self.multiple_higgs > 0 {
            warn!(
                "{} events had more than one Higgs candidate",
                self.multiple_higgs
            );
        }
    }
}
