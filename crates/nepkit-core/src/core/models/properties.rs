use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The column type declared for a per-atom property in a `Properties=` schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// `S`: one string token per column.
    Str,
    /// `R`: one real number per column.
    Real,
    /// Any other type code (e.g. `I`, `L`). Values are kept as raw tokens.
    Other(String),
}

impl PropertyKind {
    /// Returns `true` if values of this kind are stored as text tokens.
    pub fn is_textual(&self) -> bool {
        !matches!(self, PropertyKind::Real)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Property type code must not be empty")]
pub struct ParsePropertyKindError;

impl FromStr for PropertyKind {
    type Err = ParsePropertyKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ParsePropertyKindError),
            "S" => Ok(Self::Str),
            "R" => Ok(Self::Real),
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => write!(f, "S"),
            Self::Real => write!(f, "R"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// One entry of the per-atom column schema: `name:kind:count`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
    /// Number of columns this property occupies per atom.
    pub count: usize,
}

impl PropertySpec {
    pub fn new(name: &str, kind: PropertyKind, count: usize) -> Self {
        Self {
            name: name.to_string(),
            kind,
            count,
        }
    }
}

impl fmt::Display for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.kind, self.count)
    }
}

/// Values of one per-atom property, stored row-major (`N × count`).
#[derive(Debug, Clone, PartialEq)]
pub enum AtomArray {
    Real(Vec<f64>),
    Text(Vec<String>),
}

impl AtomArray {
    /// Total number of stored scalars (`N × count`).
    pub fn len(&self) -> usize {
        match self {
            Self::Real(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_real(&self) -> Option<&[f64]> {
        match self {
            Self::Real(values) => Some(values),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            Self::Text(values) => Some(values),
            Self::Real(_) => None,
        }
    }

    /// Returns `true` if the storage variant matches what `kind` requires.
    pub fn matches_kind(&self, kind: &PropertyKind) -> bool {
        match self {
            Self::Real(_) => *kind == PropertyKind::Real,
            Self::Text(_) => kind.is_textual(),
        }
    }

    /// Returns the `row`-th group of `count` real values.
    pub fn real_row(&self, row: usize, count: usize) -> Option<&[f64]> {
        self.as_real()
            .and_then(|values| values.get(row * count..(row + 1) * count))
    }

    /// Gathers the given rows into a new array, preserving `count` columns per row.
    pub(crate) fn select_rows(&self, rows: &[usize], count: usize) -> AtomArray {
        match self {
            Self::Real(values) => Self::Real(
                rows.iter()
                    .flat_map(|&r| values[r * count..(r + 1) * count].iter().copied())
                    .collect(),
            ),
            Self::Text(values) => Self::Text(
                rows.iter()
                    .flat_map(|&r| values[r * count..(r + 1) * count].iter().cloned())
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_kind_parses_known_and_passthrough_codes() {
        assert_eq!("S".parse::<PropertyKind>(), Ok(PropertyKind::Str));
        assert_eq!("R".parse::<PropertyKind>(), Ok(PropertyKind::Real));
        assert_eq!(
            "I".parse::<PropertyKind>(),
            Ok(PropertyKind::Other("I".to_string()))
        );
        assert_eq!("".parse::<PropertyKind>(), Err(ParsePropertyKindError));
    }

    #[test]
    fn property_spec_displays_as_schema_triple() {
        let spec = PropertySpec::new("forces", PropertyKind::Real, 3);
        assert_eq!(spec.to_string(), "forces:R:3");
        let spec = PropertySpec::new("tags", PropertyKind::Other("I".into()), 1);
        assert_eq!(spec.to_string(), "tags:I:1");
    }

    #[test]
    fn atom_array_kind_matching_treats_other_as_text() {
        let real = AtomArray::Real(vec![1.0]);
        let text = AtomArray::Text(vec!["T".into()]);
        assert!(real.matches_kind(&PropertyKind::Real));
        assert!(!real.matches_kind(&PropertyKind::Str));
        assert!(text.matches_kind(&PropertyKind::Str));
        assert!(text.matches_kind(&PropertyKind::Other("L".into())));
        assert!(!text.matches_kind(&PropertyKind::Real));
        assert_eq!(text.as_text(), Some(&["T".to_string()][..]));
        assert_eq!(real.as_text(), None);
    }

    #[test]
    fn real_row_returns_requested_slice() {
        let array = AtomArray::Real(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(array.real_row(1, 3), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(array.real_row(2, 3), None);
        assert_eq!(AtomArray::Text(vec![]).real_row(0, 1), None);
    }

    #[test]
    fn select_rows_keeps_column_groups_together() {
        let array = AtomArray::Real(vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1]);
        assert_eq!(
            array.select_rows(&[2, 0], 2),
            AtomArray::Real(vec![2.0, 2.1, 0.0, 0.1])
        );
        let text = AtomArray::Text(vec!["a".into(), "b".into()]);
        assert_eq!(
            text.select_rows(&[1, 1], 1),
            AtomArray::Text(vec!["b".into(), "b".into()])
        );
    }
}
