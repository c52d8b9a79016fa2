use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::bufread::MultiGzDecoder;
use log::{debug, info, warn};
use thiserror::Error;

use crate::event::Event;
use crate::ntuple::{NtupleError, NtupleLayout, NtupleReader, ROOT_MAGIC};
use crate::reader::{weight_names, ReadError, Reader, WeightSelection};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Failed to open {0:?}")]
    Open(PathBuf, #[source] io::Error),
    #[error("Failed to read {0:?}")]
    Read(PathBuf, #[source] ReadError),
    #[error("Failed to read ROOT ntuple {0:?}")]
    Ntuple(PathBuf, #[source] NtupleError),
}

/// Check whether a file starts with the ROOT file signature
pub fn is_root_file(path: &Path) -> Result<bool, io::Error> {
    let mut reader = BufReader::new(File::open(path)?);
    Ok(reader.fill_buf()?.starts_with(ROOT_MAGIC))
}

/// Open a plain or gzip-compressed file
pub fn open_event_file(path: &Path) -> Result<Box<dyn BufRead>, io::Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let compressed = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if compressed {
        debug!("Reading {path:?} as gzip-compressed file");
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

enum Source {
    Lhef(Reader<Box<dyn BufRead>>),
    Ntuple(NtupleReader),
}

/// Sequence of event files read one after the other
///
/// Files can be Les Houches Event Files, optionally gzip-compressed, or
/// ROOT ntuples.
pub struct Chain {
    weight: WeightSelection,
    layout: NtupleLayout,
    files: Vec<PathBuf>,
    sources: VecDeque<(PathBuf, Source)>,
}

impl Chain {
    /// Create an empty chain reading the given event weight
    ///
    /// ROOT ntuples are expected to follow the default [NtupleLayout].
    pub fn new(weight: WeightSelection) -> Self {
        Self::with_layout(weight, NtupleLayout::default())
    }

    /// Create an empty chain with custom tree and weight branch names
    /// for ROOT ntuples
    pub fn with_layout(weight: WeightSelection, layout: NtupleLayout) -> Self {
        Self {
            weight,
            layout,
            files: Vec::new(),
            sources: VecDeque::new(),
        }
    }

    /// Append an event file
    ///
    /// The file is opened immediately and its header or tree checked.
    pub fn add(&mut self, path: impl AsRef<Path>) -> Result<(), ChainError> {
        let path = path.as_ref().to_owned();
        let root = is_root_file(&path).map_err(|err| ChainError::Open(path.clone(), err))?;
        let source = if root {
            self.open_ntuple(&path)?
        } else {
            self.open_lhef(&path)?
        };
        info!("  {}", path.display());
        self.files.push(path.clone());
        self.sources.push_back((path, source));
        Ok(())
    }

    fn open_lhef(&self, path: &Path) -> Result<Source, ChainError> {
        let stream =
            open_event_file(path).map_err(|err| ChainError::Open(path.to_owned(), err))?;
        let reader = Reader::with_weight(stream, self.weight.clone())
            .map_err(|err| ChainError::Read(path.to_owned(), err))?;
        debug!(
            "LHEF version {}, total cross section {}",
            reader.version(),
            reader.run_info().total_cross_section()
        );
        if let Some(xml_header) = reader.xml_header() {
            match weight_names(xml_header) {
                Ok(names) if !names.is_empty() => debug!("Weights: {names}"),
                Ok(_) => {}
                Err(err) => debug!("Cannot read weight names: {err}"),
            }
        }
        Ok(Source::Lhef(reader))
    }

    fn open_ntuple(&self, path: &Path) -> Result<Source, ChainError> {
        if let WeightSelection::Named(id) = &self.weight {
            warn!(
                "Ignoring weight '{id}' for ROOT ntuple {path:?}, using branch '{}'",
                self.layout.weight
            );
        }
        let reader = NtupleReader::open(path, &self.layout)
            .map_err(|err| ChainError::Ntuple(path.to_owned(), err))?;
        debug!(
            "ROOT ntuple with tree '{}' and weight '{}'",
            self.layout.tree, self.layout.weight
        );
        Ok(Source::Ntuple(reader))
    }

    /// All files added to the chain
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Iterator for Chain {
    type Item = Result<Event, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (path, source) = self.sources.front_mut()?;
            let event = match source {
                Source::Lhef(reader) => reader
                    .event()
                    .map_err(|err| ChainError::Read(path.clone(), err)),
                Source::Ntuple(reader) => reader
                    .event()
                    .map_err(|err| ChainError::Ntuple(path.clone(), err)),
            };
            match event {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => {
                    debug!("Finished reading {path:?}");
                    self.sources.pop_front();
                }
                Err(err) => {
                    self.sources.pop_front();
                    return Some(Err(err));
                }
            }
        }
    }
}
