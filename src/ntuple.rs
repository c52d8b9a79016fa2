use std::path::Path;

use log::debug;
use oxyroot::{Branch, Named, ReaderTree, RootFile, Slice};
use thiserror::Error;

use crate::event::{Event, FourMomentum, Particle};

/// Leading bytes of every ROOT file
pub const ROOT_MAGIC: &[u8; 4] = b"root";

/// Default name of the event tree
pub const DEFAULT_TREE: &str = "t3";
/// Default name of the event weight branch
pub const DEFAULT_WEIGHT_BRANCH: &str = "weight2";

const NPARTICLE: &str = "nparticle";
const KF: &str = "kf";
const E: &str = "E";
const PX: &str = "px";
const PY: &str = "py";
const PZ: &str = "pz";

/// Tree and weight branch names of a ROOT ntuple
///
/// The particle branches are always `nparticle`, `kf`, `E`, `px`, `py`,
/// and `pz`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct NtupleLayout {
    pub tree: String,
    pub weight: String,
}

impl Default for NtupleLayout {
    fn default() -> Self {
        Self {
            tree: DEFAULT_TREE.to_owned(),
            weight: DEFAULT_WEIGHT_BRANCH.to_owned(),
        }
    }
}

// the error type of oxyroot is not public, so only its message is kept
#[derive(Debug, Error)]
pub enum NtupleError {
    #[error("Failed to open ROOT file: {0}")]
    Open(String),
    #[error("Failed to get tree '{0}': {1}")]
    Tree(String, String),
    #[error("Missing branch '{0}'")]
    MissingBranch(String),
    #[error("Failed to read branch '{0}': {1}")]
    Branch(String, String),
    #[error("Branch '{branch}' has {found} entries, expected {expected}")]
    Entries {
        branch: String,
        found: usize,
        expected: usize,
    },
    #[error("Negative particle number {0} in entry {1}")]
    NegativeMultiplicity(i32, usize),
    #[error(
        "Entry {entry} has {nparticle} particles, \
         but only {found} values in branch '{branch}'"
    )]
    ShortArray {
        branch: &'static str,
        entry: usize,
        nparticle: usize,
        found: usize,
    },
}

/// Event reader for ROOT ntuples
///
/// The branches are checked when the reader is created, but only read
/// when the first event is requested.
pub struct NtupleReader {
    tree: ReaderTree,
    weight: String,
    events: Option<std::vec::IntoIter<Event>>,
}

impl NtupleReader {
    pub fn open(
        path: impl AsRef<Path>,
        layout: &NtupleLayout,
    ) -> Result<Self, NtupleError> {
        let path = path.as_ref();
        let mut file = RootFile::open(path)
            .map_err(|err| NtupleError::Open(err.to_string()))?;
        let tree = file
            .get_tree(&layout.tree)
            .map_err(|err| NtupleError::Tree(layout.tree.clone(), err.to_string()))?;
        for name in [NPARTICLE, KF, E, PX, PY, PZ, layout.weight.as_str()] {
            let branch = find_branch(&tree, name)?;
            debug!("Branch {name}: {}", branch.item_type_name());
        }
        Ok(Self {
            tree,
            weight: layout.weight.clone(),
            events: None,
        })
    }

    /// Read the next event
    pub fn event(&mut self) -> Result<Option<Event>, NtupleError> {
        if self.events.is_none() {
            match read_events(&self.tree, &self.weight) {
                Ok(events) => self.events = Some(events.into_iter()),
                Err(err) => {
                    // a broken tree is only reported once
                    self.events = Some(Vec::new().into_iter());
                    return Err(err);
                }
            }
        }
        Ok(self.events.as_mut().and_then(Iterator::next))
    }
}

impl Iterator for NtupleReader {
    type Item = Result<Event, NtupleError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.event().transpose()
    }
}

fn find_branch<'a>(tree: &'a ReaderTree, name: &str) -> Result<&'a Branch, NtupleError> {
    tree.branches()
        .find(|branch| branch.name() == name)
        .ok_or_else(|| NtupleError::MissingBranch(name.to_owned()))
}

macro_rules! read_branch {
    ($branch:expr, $name:expr, $t:ty) => {
        $branch
            .as_iter::<$t>()
            .map_err(|err| NtupleError::Branch($name.to_owned(), err.to_string()))?
    };
}

fn type_name(branch: &Branch) -> String {
    branch.item_type_name().to_ascii_lowercase()
}

// per-event arrays are stored either as C arrays sized by `nparticle`
// or as `std::vector`
fn is_vector(branch: &Branch) -> bool {
    type_name(branch).contains("vector")
}

fn is_double(branch: &Branch) -> bool {
    let name = type_name(branch);
    name.contains("double") || name.contains("float64")
}

fn widen(values: Vec<f32>) -> Vec<f64> {
    values.into_iter().map(f64::from).collect()
}

fn read_counts(tree: &ReaderTree) -> Result<Vec<i32>, NtupleError> {
    let branch = find_branch(tree, NPARTICLE)?;
    Ok(read_branch!(branch, NPARTICLE, i32).collect())
}

fn read_ids(tree: &ReaderTree) -> Result<Vec<Vec<i32>>, NtupleError> {
    let branch = find_branch(tree, KF)?;
    let ids = if is_vector(branch) {
        read_branch!(branch, KF, Vec<i32>).collect()
    } else {
        read_branch!(branch, KF, Slice<i32>).map(Vec::from).collect()
    };
    Ok(ids)
}

fn read_momenta(tree: &ReaderTree, name: &str) -> Result<Vec<Vec<f64>>, NtupleError> {
    let branch = find_branch(tree, name)?;
    let values = match (is_vector(branch), is_double(branch)) {
        (true, true) => read_branch!(branch, name, Vec<f64>).collect(),
        (true, false) => read_branch!(branch, name, Vec<f32>).map(widen).collect(),
        (false, true) => read_branch!(branch, name, Slice<f64>).map(Vec::from).collect(),
        (false, false) => read_branch!(branch, name, Slice<f32>)
            .map(|values| widen(Vec::from(values)))
            .collect(),
    };
    Ok(values)
}

fn read_weights(tree: &ReaderTree, name: &str) -> Result<Vec<f64>, NtupleError> {
    let branch = find_branch(tree, name)?;
    let weights = if is_double(branch) {
        read_branch!(branch, name, f64).collect()
    } else {
        read_branch!(branch, name, f32).map(f64::from).collect()
    };
    Ok(weights)
}

fn check_entries<T>(
    branch: &str,
    column: &[T],
    expected: usize,
) -> Result<(), NtupleError> {
    if column.len() == expected {
        Ok(())
    } else {
        Err(NtupleError::Entries {
            branch: branch.to_owned(),
            found: column.len(),
            expected,
        })
    }
}

fn read_events(tree: &ReaderTree, weight: &str) -> Result<Vec<Event>, NtupleError> {
    let nparticle = read_counts(tree)?;
    let nevents = nparticle.len();
    let ids = read_ids(tree)?;
    check_entries(KF, &ids, nevents)?;
    let mut momenta = Vec::with_capacity(4);
    for name in [E, PX, PY, PZ] {
        let column = read_momenta(tree, name)?;
        check_entries(name, &column, nevents)?;
        momenta.push((name, column));
    }
    let weights = read_weights(tree, weight)?;
    check_entries(weight, &weights, nevents)?;
    debug!("Read {nevents} ntuple entries");

    let mut events = Vec::with_capacity(nevents);
    for (entry, (&n, weight)) in nparticle.iter().zip(weights).enumerate() {
        let n = usize::try_from(n)
            .map_err(|_| NtupleError::NegativeMultiplicity(n, entry))?;
        let short = |branch, found| NtupleError::ShortArray {
            branch,
            entry,
            nparticle: n,
            found,
        };
        let kf = &ids[entry];
        if kf.len() < n {
            return Err(short(KF, kf.len()));
        }
        for (name, column) in &momenta {
            if column[entry].len() < n {
                return Err(short(*name, column[entry].len()));
            }
        }
        let [e, px, py, pz] = [0, 1, 2, 3].map(|i| &momenta[i].1[entry]);
        let out = (0..n)
            .map(|i| {
                let p = FourMomentum::new(e[i], px[i], py[i], pz[i]);
                Particle::new(kf[i], p)
            })
            .collect();
        events.push(Event { weight, out });
    }
    Ok(events)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::fs::File;
    use std::io::BufReader;
    use std::path::PathBuf;

    use oxyroot::WriterTree;

    use crate::reader::Reader;

    pub(crate) fn tmp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hjets-{}-{name}", std::process::id()))
    }

    pub(crate) fn lhef_events() -> Vec<Event> {
        let file = File::open("test_data/hjets.lhe").unwrap();
        let lhef = Reader::new(BufReader::new(file)).unwrap();
        lhef.map(|ev| ev.unwrap()).collect()
    }

    // per-event particle arrays as std::vector branches
    pub(crate) fn write_ntuple(path: &Path, layout: &NtupleLayout, events: &[Event]) {
        let column = |f: fn(&Particle) -> f32| -> Vec<Vec<f32>> {
            events
                .iter()
                .map(|ev| ev.out.iter().map(f).collect())
                .collect()
        };
        let nparticle: Vec<i32> = events.iter().map(|ev| ev.out.len() as i32).collect();
        let kf: Vec<Vec<i32>> = events
            .iter()
            .map(|ev| ev.out.iter().map(|p| p.id).collect())
            .collect();
        let weights: Vec<f64> = events.iter().map(|ev| ev.weight).collect();

        let mut file = RootFile::create(path).unwrap();
        let mut tree = WriterTree::new(layout.tree.as_str());
        tree.new_branch(NPARTICLE, nparticle.into_iter());
        tree.new_branch(KF, kf.into_iter());
        tree.new_branch(E, column(|p| p.p.e() as f32).into_iter());
        tree.new_branch(PX, column(|p| p.p.px() as f32).into_iter());
        tree.new_branch(PY, column(|p| p.p.py() as f32).into_iter());
        tree.new_branch(PZ, column(|p| p.p.pz() as f32).into_iter());
        tree.new_branch(layout.weight.as_str(), weights.into_iter());
        tree.write(&mut file).unwrap();
        file.close().unwrap();
    }

    #[test]
    fn read_ntuple() {
        let path = tmp_path("read.root");
        let events = lhef_events();
        write_ntuple(&path, &NtupleLayout::default(), &events);
        let reader = NtupleReader::open(&path, &NtupleLayout::default()).unwrap();
        let read: Vec<_> = reader.map(|ev| ev.unwrap()).collect();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(read.len(), events.len());
        for (read, orig) in read.iter().zip(&events) {
            assert_eq!(read.weight, orig.weight);
            let ids: Vec<_> = read.out.iter().map(|p| p.id).collect();
            let orig_ids: Vec<_> = orig.out.iter().map(|p| p.id).collect();
            assert_eq!(ids, orig_ids);
            for (p, q) in read.out.iter().zip(&orig.out) {
                assert!((p.p.pt() - q.p.pt()).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn custom_layout() {
        let path = tmp_path("layout.root");
        let layout = NtupleLayout {
            tree: "events".to_owned(),
            weight: "w".to_owned(),
        };
        write_ntuple(&path, &layout, &lhef_events());

        let default = NtupleReader::open(&path, &NtupleLayout::default());
        assert!(matches!(default, Err(NtupleError::Tree(name, _)) if name == "t3"));

        let other_weight = NtupleLayout {
            weight: "weight2".to_owned(),
            ..layout.clone()
        };
        let missing = NtupleReader::open(&path, &other_weight);
        assert!(matches!(missing, Err(NtupleError::MissingBranch(name)) if name == "weight2"));

        let reader = NtupleReader::open(&path, &layout).unwrap();
        let weights: Vec<_> = reader.map(|ev| ev.unwrap().weight).collect();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(weights, [2., 1., 0.5, 1.]);
    }
}
