use std::fmt;
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::histogram::{Bin, Histo1D};

const BEGIN: &str = "# BEGIN HISTO1D";
const END: &str = "# END HISTO1D";
const PATH: &str = "Path:";
const TITLE: &str = "Title:";
const ENTRIES: &str = "Entries:";
const SUMW: &str = "SumW:";
const SUMW2: &str = "SumW2:";
const COLUMNS: &str = "# xlow\txhigh\tsumw\tsumw2";
const UNDERFLOW: &str = "Underflow";
const OVERFLOW: &str = "Overflow";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error")]
    Io(#[from] io::Error),
}

/// Writer for plain-text histogram files
#[derive(Debug)]
pub struct Writer<Stream: Write> {
    stream: Stream,
}

impl<Stream: Write> Writer<Stream> {
    pub fn new(stream: Stream) -> Self {
        Self { stream }
    }

    fn write<T: fmt::Display + ?Sized>(
        &mut self,
        expr: &T,
    ) -> Result<(), io::Error> {
        write!(self.stream, "{expr}")
    }

    fn write_float(&mut self, x: f64) -> Result<(), io::Error> {
        let mut buf = ryu::Buffer::new();
        self.stream.write_all(buf.format(x).as_bytes())
    }

    fn write_bin_line(
        &mut self,
        low: &str,
        high: &str,
        bin: &Bin,
    ) -> Result<(), io::Error> {
        for text in [low, "\t", high, "\t"] {
            self.write(text)?;
        }
        self.write_float(bin.sumw)?;
        self.write("\t")?;
        self.write_float(bin.sumw2)?;
        self.write("\n")
    }

    /// Write one histogram block
    pub fn write_histogram(&mut self, histo: &Histo1D) -> Result<(), WriteError> {
        let name = histo.name();
        writeln!(self.stream, "{BEGIN} /{name}")?;
        writeln!(self.stream, "{PATH} /{name}")?;
        match histo.title() {
            "" => writeln!(self.stream, "{TITLE}")?,
            title => writeln!(self.stream, "{TITLE} {title}")?,
        }
        self.write(ENTRIES)?;
        self.write(" ")?;
        self.write_float(histo.entries())?;
        self.write("\n")?;
        self.write(SUMW)?;
        self.write(" ")?;
        self.write_float(histo.sumw())?;
        self.write("\n")?;
        self.write(SUMW2)?;
        self.write(" ")?;
        self.write_float(histo.sumw2())?;
        self.write("\n")?;
        self.write(COLUMNS)?;
        self.write("\n")?;
        self.write_bin_line(UNDERFLOW, UNDERFLOW, histo.underflow())?;
        self.write_bin_line(OVERFLOW, OVERFLOW, histo.overflow())?;
        for (idx, bin) in histo.bins().iter().enumerate() {
            let (low, high) = histo.bin_edges(idx);
            let low = ryu::Buffer::new().format(low).to_owned();
            let high = ryu::Buffer::new().format(high).to_owned();
            self.write_bin_line(&low, &high, bin)?;
        }
        self.write(END)?;
        self.write("\n\n")?;
        Ok(())
    }

    /// Flush the output and return the underlying stream
    pub fn finish(mut self) -> Result<Stream, WriteError> {
        self.stream.flush()?;
        Ok(self.stream)
    }
}

#[derive(Debug, Error)]
pub enum HistoParseError {
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("Encountered unrecognized line '{0}', expected '# BEGIN HISTO1D'")]
    BadStart(String),
    #[error("Malformed bin line '{0}'")]
    BadBin(String),
    #[error("Failed to convert to number: '{0}'")]
    ConversionError(String),
    #[error("Histogram '{0}' has no bins")]
    NoBins(String),
    #[error("Histogram '{0}' has no closing '# END HISTO1D'")]
    EndOfFile(String),
}

/// Read all histograms from a file written by [Writer]
pub fn read_histograms<R: BufRead>(
    stream: R,
) -> Result<Vec<Histo1D>, HistoParseError> {
    let mut histos = Vec::new();
    let mut lines = stream.lines();
    while let Some(line) = lines.next() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(path) = line.strip_prefix(BEGIN) else {
            return Err(HistoParseError::BadStart(line.to_owned()));
        };
        let path = path.trim();
        let name = path.strip_prefix('/').unwrap_or(path);
        histos.push(parse_histogram(name, &mut lines)?);
    }
    Ok(histos)
}

fn parse_float(text: &str) -> Result<f64, HistoParseError> {
    fast_float::parse(text)
        .map_err(|_| HistoParseError::ConversionError(text.to_owned()))
}

fn parse_histogram<I>(name: &str, lines: I) -> Result<Histo1D, HistoParseError>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut title = String::new();
    let mut entries = 0.;
    let mut underflow = Bin::default();
    let mut overflow = Bin::default();
    let mut edges: Vec<(f64, f64)> = Vec::new();
    let mut bins = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim() == END {
            let (Some(&(xmin, _)), Some(&(_, xmax))) = (edges.first(), edges.last())
            else {
                return Err(HistoParseError::NoBins(name.to_owned()));
            };
            return Ok(Histo1D::from_parts(
                name.to_owned(),
                title,
                (xmin, xmax),
                bins,
                (underflow, overflow),
                entries,
            ));
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        if let Some(text) = line.strip_prefix(TITLE) {
            title = text.trim().to_owned();
        } else if let Some(text) = line.strip_prefix(ENTRIES) {
            entries = parse_float(text.trim())?;
        } else if [PATH, SUMW2, SUMW].iter().any(|p| line.starts_with(p)) {
            // derived from the bins
            continue;
        } else {
            let cols: Vec<_> = line.split('\t').map(str::trim).collect();
            let &[low, high, sumw, sumw2] = cols.as_slice() else {
                return Err(HistoParseError::BadBin(line.clone()));
            };
            let bin = Bin {
                sumw: parse_float(sumw)?,
                sumw2: parse_float(sumw2)?,
            };
            match (low, high) {
                (UNDERFLOW, UNDERFLOW) => underflow = bin,
                (OVERFLOW, OVERFLOW) => overflow = bin,
                (low, high) => {
                    edges.push((parse_float(low)?, parse_float(high)?));
                    bins.push(bin);
                }
            }
        }
    }
    Err(HistoParseError::EndOfFile(name.to_owned()))
}
