use std::io::{self, BufRead};

use itertools::Itertools;
use thiserror::Error;
use xmltree::XMLNode;

use crate::event::{Event, FourMomentum, Particle};
use crate::status::Status;
use crate::tags::*;

pub type XmlTree = xmltree::Element;

/// Which event weight to assign to each event
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum WeightSelection {
    /// The central weight `XWGTUP`
    #[default]
    Central,
    /// A reweighting weight `<wgt id=...>` declared in the `<initrwgt>` header
    Named(String),
}

/// Run information from the `<init>` block
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunInfo {
    /// Beam IDs
    pub beam_ids: [i32; 2],
    /// Beam energies
    pub beam_energies: [f64; 2],
    /// Event weight specification `IDWTUP`
    pub weight_type: i32,
    /// Subprocess cross sections
    pub cross_sections: Vec<f64>,
    /// Subprocess cross section errors
    pub cross_section_errors: Vec<f64>,
    /// Process IDs
    pub process_ids: Vec<i32>,
}

impl RunInfo {
    /// Sum over all subprocess cross sections
    pub fn total_cross_section(&self) -> f64 {
        self.cross_sections.iter().sum()
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("First line '{0}' in input does not start with '<LesHouchesEvents version='")]
    BadFirstLine(String),
    #[error(
        "Encountered unrecognized line '{0}', expected a header starting \
         with '<!--', '<header', or the init block starting with '<init'"
    )]
    BadHeaderStart(String),
    #[error(
        "Encountered unrecognized line '{0}', \
         expected an event starting with '<event'"
    )]
    BadEventStart(String),
    #[error("Missing entry '{0}'")]
    MissingEntry(String),
    #[error("Failed to convert '{1}' in entry '{0}' to number")]
    ConversionError(String, String),
    #[error("Unsupported version {0}, only 1.0, 2.0, 3.0 are supported")]
    UnsupportedVersion(String),
    #[error("Version information missing")]
    MissingVersion,
    #[error("Encountered '{0}' block without closing tag")]
    EndOfFile(&'static str),
    #[error("Malformed xml in '{0}' block")]
    Xml(&'static str, #[source] xmltree::ParseError),
    #[error("Weight '{0}' is not declared in the '<initrwgt>' header")]
    UnknownWeight(String),
    #[error("Event has no weight with id '{0}'")]
    MissingWeight(String),
    #[error("Event groups ('<eventgroup>') are not supported")]
    EventGroup,
}

/// Reader for the LHEF format
///
/// Events only keep their outgoing particles and the selected weight.
#[derive(Debug)]
pub struct Reader<T> {
    stream: T,
    version: &'static str,
    header: String,
    xml_header: Option<String>,
    run_info: RunInfo,
    weight: WeightSelection,
}

impl<T: BufRead> Reader<T> {
    /// Create a new LHEF reader using the central event weight
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// let file = std::fs::File::open("events.lhe").unwrap();
    /// let file = std::io::BufReader::new(file);
    /// let reader = hjets::Reader::new(file).unwrap();
    /// ```
    pub fn new(stream: T) -> Result<Reader<T>, ReadError> {
        Self::with_weight(stream, WeightSelection::Central)
    }

    /// Create a new LHEF reader that assigns the selected weight to events
    ///
    /// A named weight has to be declared in the `<initrwgt>` block of
    /// the header.
    pub fn with_weight(
        mut stream: T,
        weight: WeightSelection,
    ) -> Result<Reader<T>, ReadError> {
        let version = parse_version(&mut stream)?;
        let (header, xml_header) = parse_header(&mut stream)?;
        let run_info = parse_init(&mut stream)?;
        if let WeightSelection::Named(id) = &weight {
            let declared = xml_header
                .as_deref()
                .map(declared_weights)
                .transpose()?
                .unwrap_or_default();
            if !declared.iter().any(|d| d == id) {
                return Err(ReadError::UnknownWeight(id.to_owned()));
            }
        }
        Ok(Reader {
            stream,
            version,
            header,
            xml_header,
            run_info,
            weight,
        })
    }

    /// Get the LHEF version
    pub fn version(&self) -> &str {
        self.version
    }

    /// Get the LHEF comment header
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Get the raw text of the LHEF xml header
    pub fn xml_header(&self) -> Option<&str> {
        self.xml_header.as_deref()
    }

    /// Get the run information from the `<init>` block
    pub fn run_info(&self) -> &RunInfo {
        &self.run_info
    }

    /// Get the next event
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// let file = std::fs::File::open("events.lhe").unwrap();
    /// let file = std::io::BufReader::new(file);
    /// let mut reader = hjets::Reader::new(file).unwrap();
    ///
    /// match reader.event().unwrap() {
    ///    Some(event) => println!("Found an event with weight {}", event.weight),
    ///    None => println!("Reached end of event file."),
    /// }
    /// ```
    pub fn event(&mut self) -> Result<Option<Event>, ReadError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.stream.read_line(&mut line)? == 0 {
                return Err(ReadError::EndOfFile("LesHouchesEvents"));
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        let start = line.trim_start();
        if starts_with_tag(start, EVENT_START) {
            Ok(Some(parse_event(&mut self.stream, &self.weight)?))
        } else if starts_with_tag(start, EVENTGROUP_START) {
            Err(ReadError::EventGroup)
        } else if line.trim() == LHEF_LAST_LINE {
            Ok(None)
        } else {
            Err(ReadError::BadEventStart(line))
        }
    }
}

impl<T: BufRead> Iterator for Reader<T> {
    type Item = Result<Event, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.event().transpose()
    }
}

fn parse_version<T: BufRead>(
    stream: &mut T,
) -> Result<&'static str, ReadError> {
    use ReadError::*;
    let mut first_line = String::new();
    stream.read_line(&mut first_line)?;
    let line_cp = first_line.clone();
    let mut line_entries = first_line.trim().split('"');
    if line_entries.next() != Some(LHEF_TAG_OPEN) {
        return Err(BadFirstLine(line_cp));
    };
    let version = match line_entries.next() {
        Some("1.0") => "1.0",
        Some("2.0") => "2.0",
        Some("3.0") => "3.0",
        Some(version) => return Err(UnsupportedVersion(version.to_owned())),
        None => return Err(MissingVersion),
    };
    if line_entries.next() != Some(">") {
        return Err(BadFirstLine(line_cp));
    };
    Ok(version)
}

fn parse_header<T: BufRead>(
    stream: &mut T,
) -> Result<(String, Option<String>), ReadError> {
    use ReadError::BadHeaderStart;
    let mut header = String::new();
    let mut xml_header = None;
    loop {
        let mut header_text = String::new();
        if stream.read_line(&mut header_text)? == 0 {
            return Err(ReadError::EndOfFile("LesHouchesEvents"));
        }
        let start = header_text.trim_start();
        if start.is_empty() {
            continue;
        }
        if start.starts_with(COMMENT_START) {
            if !header_text.trim_end().ends_with(COMMENT_END) {
                read_lines_until(stream, &mut header_text, COMMENT_END)?;
            }
            header.push_str(&header_text);
        } else if starts_with_tag(start, HEADER_START) {
            read_lines_until(stream, &mut header_text, HEADER_END)?;
            xml_header = Some(header_text);
        } else if starts_with_tag(start, INIT_START) {
            return Ok((header, xml_header));
        } else {
            return Err(BadHeaderStart(header_text));
        }
    }
}

fn read_lines_until<T: BufRead>(
    stream: &mut T,
    text: &mut String,
    end: &'static str,
) -> Result<(), ReadError> {
    loop {
        if stream.read_line(text)? == 0 {
            return Err(ReadError::EndOfFile(end));
        }
        if text.lines().last().map(str::trim) == Some(end) {
            return Ok(());
        }
    }
}

fn parse_int(name: &str, text: Option<&str>) -> Result<i32, ReadError> {
    let text = text.ok_or_else(|| ReadError::MissingEntry(name.to_owned()))?;
    text.parse()
        .map_err(|_| ReadError::ConversionError(name.to_owned(), text.to_owned()))
}

fn parse_float(name: &str, text: Option<&str>) -> Result<f64, ReadError> {
    let text = text.ok_or_else(|| ReadError::MissingEntry(name.to_owned()))?;
    fast_float::parse(text)
        .map_err(|_| ReadError::ConversionError(name.to_owned(), text.to_owned()))
}

fn parse_init<T: BufRead>(stream: &mut T) -> Result<RunInfo, ReadError> {
    let mut line = String::new();
    stream.read_line(&mut line)?;
    let mut entries = line.split_whitespace();
    let beam_ids = [
        parse_int("IDBMUP(1)", entries.next())?,
        parse_int("IDBMUP(2)", entries.next())?,
    ];
    let beam_energies = [
        parse_float("EBMUP(1)", entries.next())?,
        parse_float("EBMUP(2)", entries.next())?,
    ];
    for name in ["PDFGUP(1)", "PDFGUP(2)", "PDFSUP(1)", "PDFSUP(2)"] {
        parse_int(name, entries.next())?;
    }
    let weight_type = parse_int("IDWTUP", entries.next())?;
    let nprup = parse_int("NPRUP", entries.next())?;
    let nprup = usize::try_from(nprup).map_err(|_| {
        ReadError::ConversionError("NPRUP".to_owned(), nprup.to_string())
    })?;
    let mut cross_sections = Vec::with_capacity(nprup);
    let mut cross_section_errors = Vec::with_capacity(nprup);
    let mut process_ids = Vec::with_capacity(nprup);
    for i in 1..=nprup {
        line.clear();
        stream.read_line(&mut line)?;
        let mut entries = line.split_whitespace();
        cross_sections
            .push(parse_float(&format!("XSECUP({i})"), entries.next())?);
        cross_section_errors
            .push(parse_float(&format!("XERRUP({i})"), entries.next())?);
        parse_float(&format!("XMAXUP({i})"), entries.next())?;
        process_ids.push(parse_int(&format!("LPRUP({i})"), entries.next())?);
    }
    let mut rest = String::new();
    loop {
        if stream.read_line(&mut rest)? == 0 {
            return Err(ReadError::EndOfFile("init"));
        }
        if rest.lines().last().map(str::trim) == Some(INIT_END) {
            break;
        }
    }
    Ok(RunInfo {
        beam_ids,
        beam_energies,
        weight_type,
        cross_sections,
        cross_section_errors,
        process_ids,
    })
}

fn parse_event<T: BufRead>(
    stream: &mut T,
    weight: &WeightSelection,
) -> Result<Event, ReadError> {
    let mut line = String::new();
    stream.read_line(&mut line)?;
    let mut entries = line.split_whitespace();
    let nup = parse_int("NUP", entries.next())?;
    let nup = usize::try_from(nup).map_err(|_| {
        ReadError::ConversionError("NUP".to_owned(), nup.to_string())
    })?;
    parse_int("IDRUP", entries.next())?;
    let xwgtup = parse_float("XWGTUP", entries.next())?;
    for name in ["SCALUP", "AQEDUP", "AQCDUP"] {
        parse_float(name, entries.next())?;
    }
    let mut out = Vec::with_capacity(nup);
    for i in 1..=nup {
        line.clear();
        stream.read_line(&mut line)?;
        let mut entries = line.split_whitespace();
        let id = parse_int(&format!("IDUP({i})"), entries.next())?;
        let status = parse_int(&format!("ISTUP({i})"), entries.next())?;
        for name in ["MOTHUP", "ICOLUP"] {
            for j in 1..=2 {
                parse_int(&format!("{name}({i}, {j})"), entries.next())?;
            }
        }
        let mut pup = [0.; 5];
        for (j, p) in pup.iter_mut().enumerate() {
            *p = parse_float(&format!("PUP({i}, {})", j + 1), entries.next())?;
        }
        parse_float(&format!("VTIMUP({i})"), entries.next())?;
        parse_float(&format!("SPINUP({i})"), entries.next())?;
        if Status::try_from(status) == Ok(Status::Outgoing) {
            let [px, py, pz, e, _m] = pup;
            out.push(Particle::new(id, FourMomentum::new(e, px, py, pz)));
        }
    }
    let mut info = String::new();
    loop {
        if stream.read_line(&mut info)? == 0 {
            return Err(ReadError::EndOfFile("event"));
        }
        if info.lines().last().map(str::trim) == Some(EVENT_END) {
            break;
        }
    }
    let weight = match weight {
        WeightSelection::Central => xwgtup,
        WeightSelection::Named(id) => named_weight(&info, id)?,
    };
    Ok(Event { weight, out })
}

// Whether `text` starts with the opening tag `tag_open`, e.g. `<event`,
// followed by `>`, `/` or whitespace
fn starts_with_tag(text: &str, tag_open: &str) -> bool {
    match text.strip_prefix(tag_open).and_then(|rest| rest.chars().next()) {
        Some(c) => c == '>' || c == '/' || c.is_whitespace(),
        None => false,
    }
}

// Cut out the xml block `<tag ...> ... </tag>` from some free-form text
fn xml_block<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}");
    let start = text
        .match_indices(&open)
        .map(|(pos, _)| pos)
        .find(|&pos| starts_with_tag(&text[pos..], &open))?;
    let close = format!("</{tag}>");
    let len = text[start..].find(&close)? + close.len();
    Some(&text[start..start + len])
}

fn declared_weights(xml_header: &str) -> Result<Vec<String>, ReadError> {
    let Some(block) = xml_block(xml_header, INITRWGT) else {
        return Ok(Vec::new());
    };
    let initrwgt = XmlTree::parse(block.as_bytes())
        .map_err(|err| ReadError::Xml(INITRWGT, err))?;
    let groups = initrwgt.children.iter().filter_map(as_element);
    let mut ids = Vec::new();
    for element in groups {
        if element.name == WEIGHTGROUP {
            let weights = element
                .children
                .iter()
                .filter_map(as_element)
                .filter(|w| w.name == WEIGHT);
            ids.extend(weights.filter_map(weight_id))
        } else if element.name == WEIGHT {
            ids.extend(weight_id(element))
        }
    }
    Ok(ids)
}

fn named_weight(info: &str, id: &str) -> Result<f64, ReadError> {
    let block = xml_block(info, RWGT)
        .ok_or_else(|| ReadError::MissingWeight(id.to_owned()))?;
    let rwgt = XmlTree::parse(block.as_bytes())
        .map_err(|err| ReadError::Xml(RWGT, err))?;
    let wgt = rwgt
        .children
        .iter()
        .filter_map(as_element)
        .filter(|w| w.name == WGT)
        .find(|w| weight_id(w).as_deref() == Some(id))
        .ok_or_else(|| ReadError::MissingWeight(id.to_owned()))?;
    let text = wgt.get_text().unwrap_or_default();
    parse_float(&format!("wgt id='{id}'"), Some(text.trim()))
}

fn as_element(node: &XMLNode) -> Option<&XmlTree> {
    match node {
        XMLNode::Element(element) => Some(element),
        _ => None,
    }
}

fn weight_id(element: &XmlTree) -> Option<String> {
    element.attributes.get(ID).map(|id| id.trim().to_owned())
}

/// Comma-separated list of the weight ids declared in an LHEF xml header
pub fn weight_names(xml_header: &str) -> Result<String, ReadError> {
    Ok(declared_weights(xml_header)?.into_iter().join(", "))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::fs::File;
    use std::io::BufReader;

    pub(crate) const TWO_EVENTS: &str = r#"<LesHouchesEvents version="3.0">
<!--
File generated for testing
-->
<header>
<MGVersion>
#3.5.1
</MGVersion>
<initrwgt>
<weightgroup name="scale_variation" combine="envelope">
<weight id="1001"> muR=1.0 muF=1.0 </weight>
<weight id="1002"> muR=2.0 muF=1.0 </weight>
</weightgroup>
<weight id="pdf"> PDF set = 303400 </weight>
</initrwgt>
</header>
<init>
2212 2212 6.5000000e+03 6.5000000e+03 0 0 303400 303400 -4 1
3.1e+01 1.2e-01 3.1e+01 1
<generator name='test'>handwritten</generator>
</init>
<event>
5 1 +2.0000000e+00 1.25e+02 7.54e-03 1.18e-01
21 -1 0 0 501 502 +0.0 +0.0 +1.0e+02 1.0e+02 0.0 0.0 9.0
21 -1 0 0 502 503 -0.0 -0.0 -1.0e+02 1.0e+02 0.0 0.0 9.0
25 2 1 2 0 0 +0.0 +0.0 +0.0 1.25e+02 1.25e+02 0.0 9.0
25 1 3 3 0 0 +0.0 +0.0 +0.0 1.25e+02 1.25e+02 0.0 9.0
21 1 1 2 501 503 +5.0e+01 +0.0 +5.8760100e+01 7.7155e+01 0.0 0.0 9.0
<mgrwt>
<rscale>  0 0.12500000E+03</rscale>
</mgrwt>
<rwgt>
<wgt id='1001'> +2.0e+00 </wgt>
<wgt id='1002'> +1.5e+00 </wgt>
<wgt id='pdf'> +2.5e+00 </wgt>
</rwgt>
</event>
<event>
3 1 -5.0000000e-01 1.25e+02 7.54e-03 1.18e-01
21 -1 0 0 501 502 +0.0 +0.0 +1.0e+02 1.0e+02 0.0 0.0 9.0
21 -1 0 0 502 501 -0.0 -0.0 -1.0e+02 1.0e+02 0.0 0.0 9.0
25 1 1 2 0 0 +1.0e+01 +0.0 +0.0 1.2539936e+02 1.25e+02 0.0 9.0
<rwgt>
<wgt id='1001'> -5.0e-01 </wgt>
<wgt id='1002'> -2.5e-01 </wgt>
<wgt id='pdf'> -7.5e-01 </wgt>
</rwgt>
</event>
</LesHouchesEvents>
"#;

    #[test]
    fn read_correct() {
        let mut lhef = Reader::new(TWO_EVENTS.as_bytes()).unwrap();
        assert_eq!(lhef.version(), "3.0");
        assert!(lhef.header().contains("File generated for testing"));
        assert!(lhef.xml_header().unwrap().contains("<MGVersion>"));
        let run_info = lhef.run_info();
        assert_eq!(run_info.beam_ids, [2212, 2212]);
        assert_eq!(run_info.weight_type, -4);
        assert_eq!(run_info.process_ids, [1]);
        assert_eq!(run_info.total_cross_section(), 31.);

        let first = lhef.event().unwrap().unwrap();
        assert_eq!(first.weight, 2.);
        // incoming gluons and the intermediate Higgs are dropped
        assert_eq!(first.nparticle(), 2);
        assert_eq!(first.out[0].id, 25);
        assert_eq!(first.out[1].id, 21);
        assert_eq!(first.out[1].p, FourMomentum::new(77.155, 50., 0., 58.76010));

        let second = lhef.event().unwrap().unwrap();
        assert_eq!(second.weight, -0.5);
        assert_eq!(second.nparticle(), 1);
        assert!(lhef.event().unwrap().is_none());
    }

    #[test]
    fn iterate() {
        let lhef = Reader::new(TWO_EVENTS.as_bytes()).unwrap();
        let weights: Vec<_> = lhef.map(|ev| ev.unwrap().weight).collect();
        assert_eq!(weights, [2., -0.5]);
    }

    #[test]
    fn named_weights() {
        let select = WeightSelection::Named("1002".to_owned());
        let lhef = Reader::with_weight(TWO_EVENTS.as_bytes(), select).unwrap();
        let weights: Vec<_> = lhef.map(|ev| ev.unwrap().weight).collect();
        assert_eq!(weights, [1.5, -0.25]);

        let select = WeightSelection::Named("pdf".to_owned());
        let lhef = Reader::with_weight(TWO_EVENTS.as_bytes(), select).unwrap();
        let weights: Vec<_> = lhef.map(|ev| ev.unwrap().weight).collect();
        assert_eq!(weights, [2.5, -0.75]);
    }

    #[test]
    fn list_weight_names() {
        let lhef = Reader::new(TWO_EVENTS.as_bytes()).unwrap();
        let names = weight_names(lhef.xml_header().unwrap()).unwrap();
        assert_eq!(names, "1001, 1002, pdf");
    }

    #[test]
    fn unknown_weight() {
        let select = WeightSelection::Named("2001".to_owned());
        let err = Reader::with_weight(TWO_EVENTS.as_bytes(), select).unwrap_err();
        assert!(matches!(err, ReadError::UnknownWeight(id) if id == "2001"));
    }

    #[test]
    fn missing_event_weight() {
        let text = TWO_EVENTS.replace("<wgt id='1002'> -2.5e-01 </wgt>\n", "");
        let select = WeightSelection::Named("1002".to_owned());
        let mut lhef = Reader::with_weight(text.as_bytes(), select).unwrap();
        assert!(lhef.event().is_ok());
        let err = lhef.event().unwrap_err();
        assert!(matches!(err, ReadError::MissingWeight(_)));
    }

    #[test]
    fn bad_input() {
        let err = Reader::new("<LesHouchesEvents version=\"4.0\">\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedVersion(v) if v == "4.0"));

        let err = Reader::new("<html>\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ReadError::BadFirstLine(_)));

        let text = TWO_EVENTS.replace("+2.0000000e+00", "two");
        let mut lhef = Reader::new(text.as_bytes()).unwrap();
        let err = lhef.event().unwrap_err();
        assert!(matches!(err, ReadError::ConversionError(name, _) if name == "XWGTUP"));

        let truncated = &TWO_EVENTS[..TWO_EVENTS.find("<rwgt>").unwrap()];
        let mut lhef = Reader::new(truncated.as_bytes()).unwrap();
        let err = lhef.event().unwrap_err();
        assert!(matches!(err, ReadError::EndOfFile("event")));
    }

    #[test]
    fn event_tags() {
        let text = TWO_EVENTS.replacen("<event>", "<event npLO=\" 1 \">", 1);
        let lhef = Reader::new(text.as_bytes()).unwrap();
        assert_eq!(lhef.map(|ev| ev.unwrap()).count(), 2);

        let text = TWO_EVENTS.replacen("<event>", "<eventgroup>\n<event>", 1);
        let mut lhef = Reader::new(text.as_bytes()).unwrap();
        assert!(matches!(lhef.event().unwrap_err(), ReadError::EventGroup));

        let text = TWO_EVENTS.replacen("<event>", "<events>", 1);
        let mut lhef = Reader::new(text.as_bytes()).unwrap();
        assert!(matches!(lhef.event().unwrap_err(), ReadError::BadEventStart(_)));
    }

    #[test]
    fn rwgt_block_boundary() {
        let text = TWO_EVENTS.replacen(
            "<rwgt>",
            "<rwgtinfo>\n<wgt id='1002'> +9.0e+00 </wgt>\n</rwgtinfo>\n<rwgt>",
            1,
        );
        let select = WeightSelection::Named("1002".to_owned());
        let lhef = Reader::with_weight(text.as_bytes(), select).unwrap();
        let weights: Vec<_> = lhef.map(|ev| ev.unwrap().weight).collect();
        assert_eq!(weights, [1.5, -0.25]);

        let block = "<rwgtx>a</rwgtx> <rwgt >b</rwgt>";
        assert_eq!(xml_block(block, RWGT), Some("<rwgt >b</rwgt>"));
        assert_eq!(xml_block("<rwgtx>a</rwgtx>", RWGT), None);
    }

    #[test]
    fn read_file() {
        let file = File::open("test_data/hjets.lhe").expect("file not found");
        let lhef = Reader::new(BufReader::new(file)).unwrap();
        let mut nevents = 0;
        for event in lhef {
            event.unwrap();
            nevents += 1;
        }
        assert_eq!(nevents, 4);
    }
}
