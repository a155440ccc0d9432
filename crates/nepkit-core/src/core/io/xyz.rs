use crate::core::geometry::lattice;
use crate::core::io::traits::StructureFile;
use crate::core::models::fields::{self, FieldValue, GlobalFields};
use crate::core::models::properties::{AtomArray, PropertyKind, PropertySpec};
use crate::core::models::structure::{ModelError, POSITIONS_KEY, SPECIES_KEY, Structure};
use std::io::{self, BufRead, Cursor, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const REAL_PRECISION: usize = 10;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    MalformedLine {
        line: usize,
        kind: XyzParseErrorKind,
    },
    #[error("Invalid frame starting on line {line}: {source}")]
    Structure {
        line: usize,
        #[source]
        source: ModelError,
    },
    #[error("Value of '{key}' cannot be written as a quoted field: {value:?}")]
    UnquotableValue { key: String, value: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidAtomCount(String),
    #[error("Unexpected end of input: frame declares {expected} atoms but only {found} atom lines follow")]
    UnexpectedEof { expected: usize, found: usize },
    #[error("Lattice must hold 9 numbers (value: '{0}')")]
    InvalidLattice(String),
    #[error("Invalid Properties schema '{0}'")]
    InvalidProperties(String),
    #[error("Invalid value for '{key}' (value: '{value}')")]
    InvalidField { key: String, value: String },
    #[error("Atom line has {found} columns but the schema needs {expected}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("Invalid float in column '{column}' (value: '{value}')")]
    InvalidFloat { column: String, value: String },
    #[error("Expected exactly one frame, found {0}")]
    ExpectedSingleFrame(usize),
}

impl XyzError {
    fn malformed(line: usize, kind: XyzParseErrorKind) -> Self {
        Self::MalformedLine { line, kind }
    }
}

/// Extended XYZ: an atom-count line, a `key=value` global line and one row per atom.
pub struct XyzFile;

impl StructureFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error> {
        read_multiple(reader)
    }

    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error> {
        write_multiple(structures, writer)
    }
}

/// Lines of one frame, split off the input before parsing.
struct RawFrame {
    /// 1-based line number of the atom-count line.
    first_line: usize,
    num_atoms: usize,
    /// The global line followed by `num_atoms` atom lines.
    body: Vec<String>,
}

/// Reads every frame in the input.
///
/// Blank lines between frames are skipped. Frames are split off
/// sequentially and then parsed independently.
///
/// # Errors
///
/// Fails on the first malformed frame; the error names the offending line.
#[instrument(skip_all, name = "xyz_read")]
pub fn read_multiple(reader: &mut impl BufRead) -> Result<Vec<Structure>, XyzError> {
    let frames = split_frames(reader)?;
    debug!(num_frames = frames.len(), "Split input into frames.");

    #[cfg(not(feature = "parallel"))]
    let iterator = frames.iter();

    #[cfg(feature = "parallel")]
    let iterator = frames.par_iter();

    let structures: Vec<Structure> = iterator.map(parse_frame).collect::<Result<_, _>>()?;
    info!(num_frames = structures.len(), "Read extended XYZ frames.");
    Ok(structures)
}

pub fn read_multiple_path<P: AsRef<Path>>(path: P) -> Result<Vec<Structure>, XyzError> {
    XyzFile::read_from_path(path)
}

/// Parses text holding exactly one frame.
pub fn parse_structure(text: &str) -> Result<Structure, XyzError> {
    let mut structures = read_multiple(&mut Cursor::new(text))?;
    match structures.len() {
        1 => Ok(structures.remove(0)),
        n => Err(XyzError::malformed(1, XyzParseErrorKind::ExpectedSingleFrame(n))),
    }
}

fn split_frames(reader: &mut impl BufRead) -> Result<Vec<RawFrame>, XyzError> {
    let mut lines = reader.lines().enumerate();
    let mut frames = Vec::new();

    while let Some((index, line)) = lines.next() {
        let line = line?;
        let header = line.trim();
        if header.is_empty() {
            continue;
        }
        let first_line = index + 1;
        let num_atoms: usize = header.parse().map_err(|_| {
            XyzError::malformed(
                first_line,
                XyzParseErrorKind::InvalidAtomCount(header.to_string()),
            )
        })?;

        let mut body = Vec::with_capacity(num_atoms + 1);
        for _ in 0..=num_atoms {
            match lines.next() {
                Some((_, line)) => body.push(line?),
                None => {
                    return Err(XyzError::malformed(
                        first_line + body.len() + 1,
                        XyzParseErrorKind::UnexpectedEof {
                            expected: num_atoms,
                            found: body.len().saturating_sub(1),
                        },
                    ));
                }
            }
        }
        frames.push(RawFrame {
            first_line,
            num_atoms,
            body,
        });
    }
    Ok(frames)
}

fn parse_frame(frame: &RawFrame) -> Result<Structure, XyzError> {
    let global_line = frame.first_line + 1;
    let header = parse_global_line(&frame.body[0], global_line)?;
    let width: usize = header.schema.iter().map(|spec| spec.count).sum();

    let mut buffers: Vec<ColumnBuffer> = header
        .schema
        .iter()
        .map(|spec| ColumnBuffer::for_kind(&spec.kind, frame.num_atoms * spec.count))
        .collect();

    for (offset, row) in frame.body[1..].iter().enumerate() {
        let line = global_line + 1 + offset;
        let tokens: Vec<&str> = row.split_whitespace().collect();
        if tokens.len() < width {
            return Err(XyzError::malformed(
                line,
                XyzParseErrorKind::TooFewColumns {
                    expected: width,
                    found: tokens.len(),
                },
            ));
        }
        let mut column = 0;
        for (spec, buffer) in header.schema.iter().zip(buffers.iter_mut()) {
            for token in &tokens[column..column + spec.count] {
                buffer.push(token).map_err(|_| {
                    XyzError::malformed(
                        line,
                        XyzParseErrorKind::InvalidFloat {
                            column: spec.name.clone(),
                            value: token.to_string(),
                        },
                    )
                })?;
            }
            column += spec.count;
        }
    }

    let columns = header
        .schema
        .into_iter()
        .zip(buffers.into_iter().map(ColumnBuffer::finish))
        .collect();
    Structure::from_columns(header.lattice, columns, header.fields).map_err(|source| {
        XyzError::Structure {
            line: frame.first_line,
            source,
        }
    })
}

enum ColumnBuffer {
    Real(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnBuffer {
    fn for_kind(kind: &PropertyKind, capacity: usize) -> Self {
        if kind.is_textual() {
            Self::Text(Vec::with_capacity(capacity))
        } else {
            Self::Real(Vec::with_capacity(capacity))
        }
    }

    fn push(&mut self, token: &str) -> Result<(), std::num::ParseFloatError> {
        match self {
            Self::Real(values) => values.push(token.parse()?),
            Self::Text(values) => values.push(token.to_string()),
        }
        Ok(())
    }

    fn finish(self) -> AtomArray {
        match self {
            Self::Real(values) => AtomArray::Real(values),
            Self::Text(values) => AtomArray::Text(values),
        }
    }
}

struct GlobalHeader {
    lattice: Option<nalgebra::Matrix3<f64>>,
    schema: Vec<PropertySpec>,
    fields: GlobalFields,
}

fn parse_global_line(text: &str, line: usize) -> Result<GlobalHeader, XyzError> {
    let mut lattice = None;
    let mut schema = None;
    let mut fields = GlobalFields::new();
    let invalid = |key: &str, value: &str| {
        XyzError::malformed(
            line,
            XyzParseErrorKind::InvalidField {
                key: key.to_string(),
                value: value.to_string(),
            },
        )
    };

    for (key, value) in tokenize_global_line(text) {
        if key.eq_ignore_ascii_case("lattice") {
            let numbers = fields::parse_number_list(value)
                .and_then(|values| lattice::lattice_from_rows(&values))
                .ok_or_else(|| {
                    XyzError::malformed(line, XyzParseErrorKind::InvalidLattice(value.to_string()))
                })?;
            lattice = Some(numbers);
            continue;
        }
        if key.eq_ignore_ascii_case("properties") {
            schema = Some(parse_properties(value).ok_or_else(|| {
                XyzError::malformed(line, XyzParseErrorKind::InvalidProperties(value.to_string()))
            })?);
            continue;
        }

        let value = if value.contains('"') {
            value.trim_matches('"')
        } else {
            value
        };
        let lowered = key.to_ascii_lowercase();
        match lowered.as_str() {
            "config_type" if key == "config_type" || key == "Config_type" => {
                fields.config_type = value.to_string();
            }
            "energy" => {
                fields.energy = Some(value.trim().parse().map_err(|_| invalid(key, value))?);
            }
            "pbc" => {
                fields.pbc = Some(fields::parse_pbc(value).ok_or_else(|| invalid(key, value))?);
            }
            "virial" => {
                fields.virial =
                    Some(fields::parse_number_list(value).ok_or_else(|| invalid(key, value))?);
            }
            "stress" => {
                fields.stress =
                    Some(fields::parse_number_list(value).ok_or_else(|| invalid(key, value))?);
            }
            _ => {
                let field = match value.trim().parse::<f64>() {
                    Ok(number) => FieldValue::Number(number),
                    Err(_) => FieldValue::Text(value.to_string()),
                };
                fields.set_extra(key, field);
            }
        }
    }

    Ok(GlobalHeader {
        lattice,
        schema: schema.unwrap_or_else(default_schema),
        fields,
    })
}

fn default_schema() -> Vec<PropertySpec> {
    vec![
        PropertySpec::new(SPECIES_KEY, PropertyKind::Str, 1),
        PropertySpec::new(POSITIONS_KEY, PropertyKind::Real, 3),
    ]
}

/// Parses `name:kind:count` triples; a missing trailing count means 1.
fn parse_properties(text: &str) -> Option<Vec<PropertySpec>> {
    let tokens: Vec<&str> = text.split(':').collect();
    let mut schema = Vec::with_capacity(tokens.len() / 3 + 1);
    for group in tokens.chunks(3) {
        let (name, kind, count) = match group {
            [name, kind, count] => (*name, *kind, count.parse::<usize>().ok()?),
            [name, kind] => (*name, *kind, 1),
            _ => return None,
        };
        if name.is_empty() || count == 0 {
            return None;
        }
        schema.push(PropertySpec::new(name, kind.parse().ok()?, count));
    }
    Some(schema)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Splits a global line into `key=value` pairs.
///
/// A value is either a double-quoted run of at least one character (leading
/// whitespace after `=` allowed) or, failing that, a run of non-whitespace.
/// Text that forms neither is skipped.
fn tokenize_global_line(text: &str) -> Vec<(&str, &str)> {
    let bytes = text.as_bytes();
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !is_word_byte(bytes[i]) {
            i += 1;
            continue;
        }
        let key_start = i;
        while i < bytes.len() && is_word_byte(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        let key = &text[key_start..i];
        let value_start = i + 1;

        let mut quote = value_start;
        while quote < bytes.len() && bytes[quote].is_ascii_whitespace() {
            quote += 1;
        }
        if quote < bytes.len() && bytes[quote] == b'"' {
            if let Some(len) = text[quote + 1..].find('"').filter(|&len| len > 0) {
                pairs.push((key, &text[quote + 1..quote + 1 + len]));
                i = quote + len + 2;
                continue;
            }
        }

        let mut end = value_start;
        while end < bytes.len() && !bytes[end].is_ascii_whitespace() {
            end += 1;
        }
        if end > value_start {
            pairs.push((key, &text[value_start..end]));
        }
        i = end.max(value_start);
    }
    pairs
}

/// Writes one frame.
pub fn write_structure(structure: &Structure, writer: &mut impl Write) -> Result<(), XyzError> {
    writeln!(writer, "{}", structure.num_atoms())?;
    writeln!(writer, "{}", global_line(structure)?)?;

    let mut row = String::new();
    for atom in 0..structure.num_atoms() {
        row.clear();
        for spec in structure.schema() {
            for column in 0..spec.count {
                if !row.is_empty() {
                    row.push(' ');
                }
                let cell = if spec.name == SPECIES_KEY {
                    structure.species()[atom].clone()
                } else if spec.name == structure.positions_name() {
                    format_g(structure.positions()[atom][column], REAL_PRECISION)
                } else {
                    match structure.property(&spec.name) {
                        Some(AtomArray::Real(values)) => {
                            format_g(values[atom * spec.count + column], REAL_PRECISION)
                        }
                        Some(AtomArray::Text(values)) => values[atom * spec.count + column].clone(),
                        None => String::new(),
                    }
                };
                row.push_str(&cell);
            }
        }
        writeln!(writer, "{}", row)?;
    }
    Ok(())
}

pub fn write_multiple(structures: &[Structure], writer: &mut impl Write) -> Result<(), XyzError> {
    for structure in structures {
        write_structure(structure, writer)?;
    }
    Ok(())
}

/// Writes all frames to `path` through a staged temporary file.
#[instrument(skip_all, name = "xyz_write")]
pub fn write_multiple_path<P: AsRef<Path>>(
    structures: &[Structure],
    path: P,
) -> Result<(), XyzError> {
    XyzFile::write_to_path(structures, path.as_ref())?;
    info!(
        num_frames = structures.len(),
        path = %path.as_ref().display(),
        "Wrote extended XYZ frames."
    );
    Ok(())
}

fn join_numbers(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats `key="value"`. Quoted values end at the next `"` when read back,
/// so text holding a quote or a line break is refused.
fn quoted(key: &str, value: &str) -> Result<String, XyzError> {
    if value.contains(['"', '\n', '\r']) {
        return Err(XyzError::UnquotableValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(format!("{}=\"{}\"", key, value))
}

fn global_line(structure: &Structure) -> Result<String, XyzError> {
    let mut parts = Vec::new();
    if let Some(cell) = structure.lattice() {
        parts.push(format!("Lattice=\"{}\"", join_numbers(&lattice::flatten_rows(cell))));
    }
    let schema = structure
        .schema()
        .iter()
        .map(PropertySpec::to_string)
        .collect::<Vec<_>>()
        .join(":");
    parts.push(format!("Properties={}", schema));

    let fields = &structure.fields;
    if let Some(energy) = fields.energy {
        parts.push(format!("energy={}", energy));
    }
    parts.push(quoted("Config_type", &fields.config_type)?);
    if let Some(pbc) = &fields.pbc {
        parts.push(format!("pbc=\"{}\"", fields::format_pbc(pbc)));
    }
    if let Some(virial) = &fields.virial {
        parts.push(format!("virial=\"{}\"", join_numbers(virial)));
    }
    if let Some(stress) = &fields.stress {
        parts.push(format!("stress=\"{}\"", join_numbers(stress)));
    }
    for (key, value) in fields.extras() {
        match value {
            FieldValue::Number(number) => parts.push(format!("{}={}", key, number)),
            FieldValue::Text(text) => parts.push(quoted(key, text)?),
            FieldValue::Vector(values) => {
                parts.push(format!("{}=\"{}\"", key, join_numbers(values)))
            }
        }
    }
    Ok(parts.join(" "))
}

/// Formats a float like C's `%.{precision}g`: `precision` significant
/// digits, trailing zeros removed, scientific notation outside `1e-4..1e{precision}`.
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= precision as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    const WATER: &str = "3
Lattice=\"10.0 0.0 0.0 0.0 10.0 0.0 0.0 0.0 10.0\" Properties=species:S:1:pos:R:3:forces:R:3 energy=-14.25 Config_type=\"water md\" pbc=\"T T T\" virial=\"1 0 0 0 1 0 0 0 1\" temperature=300
O 0.0 0.0 0.0 0.1 0.2 0.3
H 0.96 0.0 0.0 -0.05 -0.1 -0.15
H -0.24 0.93 0.0 -0.05 -0.1 -0.15
";

    #[test]
    fn parses_lattice_schema_and_global_fields() {
        let s = parse_structure(WATER).unwrap();
        assert_eq!(s.num_atoms(), 3);
        assert_eq!(s.lattice().unwrap()[(1, 1)], 10.0);
        assert_eq!(s.species(), &["O", "H", "H"].map(String::from));
        assert_eq!(s.positions()[2], Vector3::new(-0.24, 0.93, 0.0));
        assert_eq!(s.forces().unwrap()[3..6], [-0.05, -0.1, -0.15]);
        assert_eq!(s.fields.energy, Some(-14.25));
        assert_eq!(s.config_type(), "water md");
        assert_eq!(s.fields.pbc, Some([true; 3]));
        assert_eq!(
            s.fields.virial,
            Some(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
        );
        assert_eq!(s.fields.extra("temperature"), Some(&FieldValue::Number(300.0)));
    }

    #[test]
    fn global_keys_are_normalised() {
        let text = "1\nlattice=\"2 0 0 0 2 0 0 0 2\" properties=species:S:1:pos:R:3 Energy=1.5 PBC=\"F F F\" config_type=bulk Stress=\"1 2 3 4 5 6 7 8 9\"\nCu 0 0 0\n";
        let s = parse_structure(text).unwrap();
        assert!(s.lattice().is_some());
        assert_eq!(s.fields.energy, Some(1.5));
        assert_eq!(s.fields.pbc, Some([false; 3]));
        assert_eq!(s.config_type(), "bulk");
        assert_eq!(s.fields.stress.as_ref().map(Vec::len), Some(9));
        assert_eq!(s.fields.extras().count(), 0);
    }

    #[test]
    fn missing_properties_fall_back_to_species_and_positions() {
        let s = parse_structure("2\nenergy=0\nH 0 0 0\nH 0 0 0.74\n").unwrap();
        assert!(s.lattice().is_none());
        let names: Vec<&str> = s.schema().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["species", "pos"]);
        assert_eq!(s.positions()[1].z, 0.74);
    }

    #[test]
    fn properties_without_trailing_count_default_to_one() {
        let schema = parse_properties("species:S:1:pos:R:3:tag:I").unwrap();
        assert_eq!(schema[2], PropertySpec::new("tag", PropertyKind::Other("I".into()), 1));
        assert!(parse_properties("species:S:0").is_none());
        assert!(parse_properties("species").is_none());
        assert!(parse_properties("species:S:x").is_none());
    }

    #[test]
    fn tokenizer_handles_quotes_spaces_and_empty_values() {
        let pairs = tokenize_global_line("a=\"1 2\" b= \"x y\" c=plain Config_type=\"\" d= e=\"open");
        assert_eq!(
            pairs,
            vec![
                ("a", "1 2"),
                ("b", "x y"),
                ("c", "plain"),
                ("Config_type", "\"\""),
                ("e", "\"open"),
            ]
        );
    }

    #[test]
    fn empty_quoted_config_type_round_trips_as_empty() {
        let s = parse_structure("1\nProperties=species:S:1:pos:R:3 Config_type=\"\"\nH 0 0 0\n").unwrap();
        assert_eq!(s.config_type(), "");
    }

    #[test]
    fn read_multiple_skips_blank_lines_between_frames() {
        let text = format!("{}\n\n{}", WATER, WATER);
        let frames = read_multiple(&mut Cursor::new(text)).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].species()[0], "O");
    }

    #[test]
    fn truncated_frame_reports_the_missing_line() {
        let text = "2\nProperties=species:S:1:pos:R:3\nH 0 0 0\n";
        match read_multiple(&mut Cursor::new(text)) {
            Err(XyzError::MalformedLine { line, kind }) => {
                assert_eq!(line, 4);
                assert_eq!(kind, XyzParseErrorKind::UnexpectedEof { expected: 2, found: 1 });
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn bad_atom_line_names_its_line_number() {
        let text = format!("{}1\nProperties=species:S:1:pos:R:3\nH 0 zero 0\n", WATER);
        match read_multiple(&mut Cursor::new(text)) {
            Err(XyzError::MalformedLine { line, kind }) => {
                assert_eq!(line, 8);
                assert!(matches!(kind, XyzParseErrorKind::InvalidFloat { .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let short = "1\nProperties=species:S:1:pos:R:3\nH 0 0\n";
        assert!(matches!(
            parse_structure(short),
            Err(XyzError::MalformedLine {
                line: 3,
                kind: XyzParseErrorKind::TooFewColumns { expected: 4, found: 3 }
            })
        ));
    }

    #[test]
    fn invalid_headers_are_rejected() {
        assert!(matches!(
            parse_structure("two\n\nH 0 0 0\n"),
            Err(XyzError::MalformedLine {
                line: 1,
                kind: XyzParseErrorKind::InvalidAtomCount(_)
            })
        ));
        assert!(matches!(
            parse_structure("1\nLattice=\"1 0 0\"\nH 0 0 0\n"),
            Err(XyzError::MalformedLine {
                line: 2,
                kind: XyzParseErrorKind::InvalidLattice(_)
            })
        ));
        assert!(matches!(
            parse_structure("1\nenergy=high\nH 0 0 0\n"),
            Err(XyzError::MalformedLine {
                kind: XyzParseErrorKind::InvalidField { .. },
                ..
            })
        ));
    }

    #[test]
    fn write_then_read_preserves_the_frame() {
        let original = parse_structure(WATER).unwrap();
        let mut buffer = Vec::new();
        write_structure(&original, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Config_type=\"water md\""));
        assert!(text.contains("Properties=species:S:1:pos:R:3:forces:R:3"));

        let reread = parse_structure(&text).unwrap();
        assert_eq!(reread, original);
    }

    #[test]
    fn text_fields_that_cannot_be_quoted_are_refused() {
        let mut s = parse_structure(WATER).unwrap();
        s.set_config_type("a \"b\" c");
        let mut buffer = Vec::new();
        assert!(matches!(
            write_structure(&s, &mut buffer),
            Err(XyzError::UnquotableValue { ref key, .. }) if key == "Config_type"
        ));

        s.set_config_type("a 'b' c");
        s.fields.set_extra("note", FieldValue::Text("two\nlines".into()));
        assert!(matches!(
            write_structure(&s, &mut Vec::new()),
            Err(XyzError::UnquotableValue { ref key, .. }) if key == "note"
        ));

        s.fields.set_extra("note", FieldValue::Text("one line".into()));
        let mut buffer = Vec::new();
        write_structure(&s, &mut buffer).unwrap();
        let reread = parse_structure(&String::from_utf8(buffer).unwrap()).unwrap();
        assert_eq!(reread.config_type(), "a 'b' c");
        assert_eq!(reread.fields.extra("note"), Some(&FieldValue::Text("one line".into())));
    }

    #[test]
    fn structure_without_lattice_writes_no_lattice_key() {
        let s = Structure::new(None, vec!["He".into()], vec![Vector3::new(1e-7, 0.5, 2.0)]).unwrap();
        let mut buffer = Vec::new();
        write_structure(&s, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "1\nProperties=species:S:1:pos:R:3 Config_type=\"\"\nHe 1e-07 0.5 2\n"
        );
    }

    #[test]
    fn path_round_trip_uses_atomic_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.xyz");
        let lattice = Matrix3::from_diagonal(&Vector3::new(3.0, 3.0, 3.0));
        let frames = vec![
            Structure::new(Some(lattice), vec!["Si".into()], vec![Vector3::zeros()]).unwrap(),
            Structure::new(Some(lattice), vec!["Ge".into()], vec![Vector3::new(1.5, 1.5, 1.5)])
                .unwrap(),
        ];
        write_multiple_path(&frames, &path).unwrap();
        assert!(!dir.path().join(".train.xyz.tmp").exists());

        let reread = read_multiple_path(&path).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread[1].species()[0], "Ge");
        assert_eq!(reread[1].positions()[0], Vector3::new(1.5, 1.5, 1.5));
    }

    #[test]
    fn format_g_matches_printf_general_format() {
        assert_eq!(format_g(0.1, 10), "0.1");
        assert_eq!(format_g(1.0, 10), "1");
        assert_eq!(format_g(-2.5e-5, 10), "-2.5e-05");
        assert_eq!(format_g(12345678901.0, 10), "1.23456789e+10");
        assert_eq!(format_g(1.0 / 3.0, 10), "0.3333333333");
        assert_eq!(format_g(123.456, 4), "123.5");
        assert_eq!(format_g(0.0001, 10), "0.0001");
        assert_eq!(format_g(f64::NAN, 10), "nan");
        assert_eq!(format_g(f64::NEG_INFINITY, 10), "-inf");
    }
}
