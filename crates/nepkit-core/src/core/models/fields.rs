/// A free-form global value attached to a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Vector(Vec<f64>),
}

impl FieldValue {
    /// Interprets the value as a numeric vector.
    ///
    /// Text values are split on whitespace and every token must parse as a
    /// float; a single number becomes a one-element vector.
    pub fn to_vector(&self) -> Option<Vec<f64>> {
        match self {
            Self::Number(value) => Some(vec![*value]),
            Self::Vector(values) => Some(values.clone()),
            Self::Text(text) => parse_number_list(text),
        }
    }
}

/// Frame-level metadata with the well-known keys lifted into typed fields.
///
/// Every key that is not one of the named fields is kept, in insertion
/// order, in the `extra` list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalFields {
    pub energy: Option<f64>,
    pub virial: Option<Vec<f64>>,
    pub stress: Option<Vec<f64>>,
    pub pbc: Option<[bool; 3]>,
    /// Free-text grouping tag; empty when the source carried none.
    pub config_type: String,
    extra: Vec<(String, FieldValue)>,
}

impl GlobalFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extra(&self, key: &str) -> Option<&FieldValue> {
        self.extra.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Inserts or replaces an extra field, keeping the original position on replace.
    pub fn set_extra(&mut self, key: &str, value: FieldValue) {
        match self.extra.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.extra.push((key.to_string(), value)),
        }
    }

    pub fn remove_extra(&mut self, key: &str) -> Option<FieldValue> {
        let pos = self.extra.iter().position(|(k, _)| k == key)?;
        Some(self.extra.remove(pos).1)
    }

    pub fn extras(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.extra.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Parses a periodicity flag triple such as `"T T T"` or `"F F T"`.
pub fn parse_pbc(text: &str) -> Option<[bool; 3]> {
    let flags: Vec<bool> = text
        .split_whitespace()
        .map(|token| match token {
            "T" | "t" | "True" | "true" | "1" => Some(true),
            "F" | "f" | "False" | "false" | "0" => Some(false),
            _ => None,
        })
        .collect::<Option<_>>()?;
    match flags.as_slice() {
        [a, b, c] => Some([*a, *b, *c]),
        [single] => Some([*single; 3]),
        _ => None,
    }
}

pub fn format_pbc(pbc: &[bool; 3]) -> String {
    pbc.iter()
        .map(|&flag| if flag { "T" } else { "F" })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses whitespace-separated floats, failing if any token is not a number.
pub fn parse_number_list(text: &str) -> Option<Vec<f64>> {
    text.split_whitespace()
        .map(|token| token.parse::<f64>().ok())
        .collect()
}
