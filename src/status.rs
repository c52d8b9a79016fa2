/// Particle status code in the LHEF `ISTUP` column
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Status {
    /// Incoming beam particles at time t = −∞
    IncomingBeam,
    /// Intermediate space-like propagator
    IntermediateSpacelike,
    /// Incoming particle
    Incoming,
    /// Outgoing final state particle
    Outgoing,
    /// Intermediate resonance
    IntermediateResonance,
    /// Intermediate resonance, for documentation only
    IntermediateDoc,
}

impl TryFrom<i32> for Status {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        use Status::*;
        match code {
            -9 => Ok(IncomingBeam),
            -2 => Ok(IntermediateSpacelike),
            -1 => Ok(Incoming),
            1 => Ok(Outgoing),
            2 => Ok(IntermediateResonance),
            3 => Ok(IntermediateDoc),
            code => Err(code),
        }
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        use Status::*;
        match status {
            IncomingBeam => -9,
            IntermediateSpacelike => -2,
            Incoming => -1,
            Outgoing => 1,
            IntermediateResonance => 2,
            IntermediateDoc => 3,
        }
    }
}
