use phf::{Map, phf_map};
use thiserror::Error;

/// Static per-element data used by the geometry engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    /// The element symbol with canonical casing (e.g., "Fe").
    pub symbol: &'static str,
    /// The atomic number (Z).
    pub atomic_number: u8,
    /// Single-bond covalent radius in picometers (Cordero et al., 2008).
    pub covalent_radius_pm: f64,
}

impl Element {
    /// Returns the covalent radius converted to Angstroms.
    pub fn covalent_radius(&self) -> f64 {
        self.covalent_radius_pm / 100.0
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElementError {
    #[error("Unknown element symbol: '{0}'")]
    UnknownElement(String),
}

static ELEMENTS: Map<&'static str, Element> = phf_map! {
    "H" => Element { symbol: "H", atomic_number: 1, covalent_radius_pm: 31.0 },
    "He" => Element { symbol: "He", atomic_number: 2, covalent_radius_pm: 28.0 },
    "Li" => Element { symbol: "Li", atomic_number: 3, covalent_radius_pm: 128.0 },
    "Be" => Element { symbol: "Be", atomic_number: 4, covalent_radius_pm: 96.0 },
    "B" => Element { symbol: "B", atomic_number: 5, covalent_radius_pm: 84.0 },
    "C" => Element { symbol: "C", atomic_number: 6, covalent_radius_pm: 76.0 },
    "N" => Element { symbol: "N", atomic_number: 7, covalent_radius_pm: 71.0 },
    "O" => Element { symbol: "O", atomic_number: 8, covalent_radius_pm: 66.0 },
    "F" => Element { symbol: "F", atomic_number: 9, covalent_radius_pm: 57.0 },
    "Ne" => Element { symbol: "Ne", atomic_number: 10, covalent_radius_pm: 58.0 },
    "Na" => Element { symbol: "Na", atomic_number: 11, covalent_radius_pm: 166.0 },
    "Mg" => Element { symbol: "Mg", atomic_number: 12, covalent_radius_pm: 141.0 },
    "Al" => Element { symbol: "Al", atomic_number: 13, covalent_radius_pm: 121.0 },
    "Si" => Element { symbol: "Si", atomic_number: 14, covalent_radius_pm: 111.0 },
    "P" => Element { symbol: "P", atomic_number: 15, covalent_radius_pm: 107.0 },
    "S" => Element { symbol: "S", atomic_number: 16, covalent_radius_pm: 105.0 },
    "Cl" => Element { symbol: "Cl", atomic_number: 17, covalent_radius_pm: 102.0 },
    "Ar" => Element { symbol: "Ar", atomic_number: 18, covalent_radius_pm: 106.0 },
    "K" => Element { symbol: "K", atomic_number: 19, covalent_radius_pm: 203.0 },
    "Ca" => Element { symbol: "Ca", atomic_number: 20, covalent_radius_pm: 176.0 },
    "Sc" => Element { symbol: "Sc", atomic_number: 21, covalent_radius_pm: 170.0 },
    "Ti" => Element { symbol: "Ti", atomic_number: 22, covalent_radius_pm: 160.0 },
    "V" => Element { symbol: "V", atomic_number: 23, covalent_radius_pm: 153.0 },
    "Cr" => Element { symbol: "Cr", atomic_number: 24, covalent_radius_pm: 139.0 },
    "Mn" => Element { symbol: "Mn", atomic_number: 25, covalent_radius_pm: 139.0 },
    "Fe" => Element { symbol: "Fe", atomic_number: 26, covalent_radius_pm: 132.0 },
    "Co" => Element { symbol: "Co", atomic_number: 27, covalent_radius_pm: 126.0 },
    "Ni" => Element { symbol: "Ni", atomic_number: 28, covalent_radius_pm: 124.0 },
    "Cu" => Element { symbol: "Cu", atomic_number: 29, covalent_radius_pm: 132.0 },
    "Zn" => Element { symbol: "Zn", atomic_number: 30, covalent_radius_pm: 122.0 },
    "Ga" => Element { symbol: "Ga", atomic_number: 31, covalent_radius_pm: 122.0 },
    "Ge" => Element { symbol: "Ge", atomic_number: 32, covalent_radius_pm: 120.0 },
    "As" => Element { symbol: "As", atomic_number: 33, covalent_radius_pm: 119.0 },
    "Se" => Element { symbol: "Se", atomic_number: 34, covalent_radius_pm: 120.0 },
    "Br" => Element { symbol: "Br", atomic_number: 35, covalent_radius_pm: 120.0 },
    "Kr" => Element { symbol: "Kr", atomic_number: 36, covalent_radius_pm: 116.0 },
    "Rb" => Element { symbol: "Rb", atomic_number: 37, covalent_radius_pm: 220.0 },
    "Sr" => Element { symbol: "Sr", atomic_number: 38, covalent_radius_pm: 195.0 },
    "Y" => Element { symbol: "Y", atomic_number: 39, covalent_radius_pm: 190.0 },
    "Zr" => Element { symbol: "Zr", atomic_number: 40, covalent_radius_pm: 175.0 },
    "Nb" => Element { symbol: "Nb", atomic_number: 41, covalent_radius_pm: 164.0 },
    "Mo" => Element { symbol: "Mo", atomic_number: 42, covalent_radius_pm: 154.0 },
    "Tc" => Element { symbol: "Tc", atomic_number: 43, covalent_radius_pm: 147.0 },
    "Ru" => Element { symbol: "Ru", atomic_number: 44, covalent_radius_pm: 146.0 },
    "Rh" => Element { symbol: "Rh", atomic_number: 45, covalent_radius_pm: 142.0 },
    "Pd" => Element { symbol: "Pd", atomic_number: 46, covalent_radius_pm: 139.0 },
    "Ag" => Element { symbol: "Ag", atomic_number: 47, covalent_radius_pm: 145.0 },
    "Cd" => Element { symbol: "Cd", atomic_number: 48, covalent_radius_pm: 144.0 },
    "In" => Element { symbol: "In", atomic_number: 49, covalent_radius_pm: 142.0 },
    "Sn" => Element { symbol: "Sn", atomic_number: 50, covalent_radius_pm: 139.0 },
    "Sb" => Element { symbol: "Sb", atomic_number: 51, covalent_radius_pm: 139.0 },
    "Te" => Element { symbol: "Te", atomic_number: 52, covalent_radius_pm: 138.0 },
    "I" => Element { symbol: "I", atomic_number: 53, covalent_radius_pm: 139.0 },
    "Xe" => Element { symbol: "Xe", atomic_number: 54, covalent_radius_pm: 140.0 },
    "Cs" => Element { symbol: "Cs", atomic_number: 55, covalent_radius_pm: 244.0 },
    "Ba" => Element { symbol: "Ba", atomic_number: 56, covalent_radius_pm: 215.0 },
    "La" => Element { symbol: "La", atomic_number: 57, covalent_radius_pm: 207.0 },
    "Ce" => Element { symbol: "Ce", atomic_number: 58, covalent_radius_pm: 204.0 },
    "Pr" => Element { symbol: "Pr", atomic_number: 59, covalent_radius_pm: 203.0 },
    "Nd" => Element { symbol: "Nd", atomic_number: 60, covalent_radius_pm: 201.0 },
    "Pm" => Element { symbol: "Pm", atomic_number: 61, covalent_radius_pm: 199.0 },
    "Sm" => Element { symbol: "Sm", atomic_number: 62, covalent_radius_pm: 198.0 },
    "Eu" => Element { symbol: "Eu", atomic_number: 63, covalent_radius_pm: 198.0 },
    "Gd" => Element { symbol: "Gd", atomic_number: 64, covalent_radius_pm: 196.0 },
    "Tb" => Element { symbol: "Tb", atomic_number: 65, covalent_radius_pm: 194.0 },
    "Dy" => Element { symbol: "Dy", atomic_number: 66, covalent_radius_pm: 192.0 },
    "Ho" => Element { symbol: "Ho", atomic_number: 67, covalent_radius_pm: 192.0 },
    "Er" => Element { symbol: "Er", atomic_number: 68, covalent_radius_pm: 189.0 },
    "Tm" => Element { symbol: "Tm", atomic_number: 69, covalent_radius_pm: 190.0 },
    "Yb" => Element { symbol: "Yb", atomic_number: 70, covalent_radius_pm: 187.0 },
    "Lu" => Element { symbol: "Lu", atomic_number: 71, covalent_radius_pm: 187.0 },
    "Hf" => Element { symbol: "Hf", atomic_number: 72, covalent_radius_pm: 175.0 },
    "Ta" => Element { symbol: "Ta", atomic_number: 73, covalent_radius_pm: 170.0 },
    "W" => Element { symbol: "W", atomic_number: 74, covalent_radius_pm: 162.0 },
    "Re" => Element { symbol: "Re", atomic_number: 75, covalent_radius_pm: 151.0 },
    "Os" => Element { symbol: "Os", atomic_number: 76, covalent_radius_pm: 144.0 },
    "Ir" => Element { symbol: "Ir", atomic_number: 77, covalent_radius_pm: 141.0 },
    "Pt" => Element { symbol: "Pt", atomic_number: 78, covalent_radius_pm: 136.0 },
    "Au" => Element { symbol: "Au", atomic_number: 79, covalent_radius_pm: 136.0 },
    "Hg" => Element { symbol: "Hg", atomic_number: 80, covalent_radius_pm: 132.0 },
    "Tl" => Element { symbol: "Tl", atomic_number: 81, covalent_radius_pm: 145.0 },
    "Pb" => Element { symbol: "Pb", atomic_number: 82, covalent_radius_pm: 146.0 },
    "Bi" => Element { symbol: "Bi", atomic_number: 83, covalent_radius_pm: 148.0 },
    "Po" => Element { symbol: "Po", atomic_number: 84, covalent_radius_pm: 140.0 },
    "At" => Element { symbol: "At", atomic_number: 85, covalent_radius_pm: 150.0 },
    "Rn" => Element { symbol: "Rn", atomic_number: 86, covalent_radius_pm: 150.0 },
    "Fr" => Element { symbol: "Fr", atomic_number: 87, covalent_radius_pm: 260.0 },
    "Ra" => Element { symbol: "Ra", atomic_number: 88, covalent_radius_pm: 221.0 },
    "Ac" => Element { symbol: "Ac", atomic_number: 89, covalent_radius_pm: 215.0 },
    "Th" => Element { symbol: "Th", atomic_number: 90, covalent_radius_pm: 206.0 },
    "Pa" => Element { symbol: "Pa", atomic_number: 91, covalent_radius_pm: 200.0 },
    "U" => Element { symbol: "U", atomic_number: 92, covalent_radius_pm: 196.0 },
    "Np" => Element { symbol: "Np", atomic_number: 93, covalent_radius_pm: 190.0 },
    "Pu" => Element { symbol: "Pu", atomic_number: 94, covalent_radius_pm: 187.0 },
    "Am" => Element { symbol: "Am", atomic_number: 95, covalent_radius_pm: 180.0 },
    "Cm" => Element { symbol: "Cm", atomic_number: 96, covalent_radius_pm: 169.0 },
    "Bk" => Element { symbol: "Bk", atomic_number: 97, covalent_radius_pm: 168.0 },
    "Cf" => Element { symbol: "Cf", atomic_number: 98, covalent_radius_pm: 168.0 },
    "Es" => Element { symbol: "Es", atomic_number: 99, covalent_radius_pm: 165.0 },
    "Fm" => Element { symbol: "Fm", atomic_number: 100, covalent_radius_pm: 167.0 },
    "Md" => Element { symbol: "Md", atomic_number: 101, covalent_radius_pm: 173.0 },
    "No" => Element { symbol: "No", atomic_number: 102, covalent_radius_pm: 176.0 },
    "Lr" => Element { symbol: "Lr", atomic_number: 103, covalent_radius_pm: 161.0 },
    "Rf" => Element { symbol: "Rf", atomic_number: 104, covalent_radius_pm: 157.0 },
    "Db" => Element { symbol: "Db", atomic_number: 105, covalent_radius_pm: 149.0 },
    "Sg" => Element { symbol: "Sg", atomic_number: 106, covalent_radius_pm: 143.0 },
    "Bh" => Element { symbol: "Bh", atomic_number: 107, covalent_radius_pm: 141.0 },
    "Hs" => Element { symbol: "Hs", atomic_number: 108, covalent_radius_pm: 134.0 },
    "Mt" => Element { symbol: "Mt", atomic_number: 109, covalent_radius_pm: 129.0 },
    "Ds" => Element { symbol: "Ds", atomic_number: 110, covalent_radius_pm: 128.0 },
    "Rg" => Element { symbol: "Rg", atomic_number: 111, covalent_radius_pm: 121.0 },
    "Cn" => Element { symbol: "Cn", atomic_number: 112, covalent_radius_pm: 122.0 },
    "Nh" => Element { symbol: "Nh", atomic_number: 113, covalent_radius_pm: 136.0 },
    "Fl" => Element { symbol: "Fl", atomic_number: 114, covalent_radius_pm: 143.0 },
    "Mc" => Element { symbol: "Mc", atomic_number: 115, covalent_radius_pm: 162.0 },
    "Lv" => Element { symbol: "Lv", atomic_number: 116, covalent_radius_pm: 175.0 },
    "Ts" => Element { symbol: "Ts", atomic_number: 117, covalent_radius_pm: 165.0 },
    "Og" => Element { symbol: "Og", atomic_number: 118, covalent_radius_pm: 157.0 },
};

/// Looks up an element by its symbol.
///
/// The symbol is trimmed but otherwise matched exactly, so `"fe"` is not a
/// valid spelling of iron.
///
/// # Errors
///
/// Returns [`ElementError::UnknownElement`] if the symbol is not in the table.
pub fn lookup(symbol: &str) -> Result<&'static Element, ElementError> {
    ELEMENTS
        .get(symbol.trim())
        .ok_or_else(|| ElementError::UnknownElement(symbol.to_string()))
}

pub fn atomic_number(symbol: &str) -> Result<u8, ElementError> {
    lookup(symbol).map(|e| e.atomic_number)
}

pub fn covalent_radius(symbol: &str) -> Result<f64, ElementError> {
    lookup(symbol).map(Element::covalent_radius)
}

/// Resolves the covalent radii (Angstroms) of a whole species list at once.
pub fn covalent_radii<S: AsRef<str>>(species: &[S]) -> Result<Vec<f64>, ElementError> {
    species.iter().map(|s| covalent_radius(s.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_expected_data_for_common_elements() {
        let h = lookup("H").unwrap();
        assert_eq!(h.atomic_number, 1);
        assert_eq!(h.covalent_radius_pm, 31.0);

        let c = lookup("C").unwrap();
        assert_eq!(c.atomic_number, 6);
        assert_eq!(c.symbol, "C");

        assert_eq!(lookup("Og").unwrap().atomic_number, 118);
    }

    #[test]
    fn lookup_trims_whitespace_and_is_case_sensitive() {
        assert!(lookup(" Fe ").is_ok());
        assert!(matches!(lookup("fe"), Err(ElementError::UnknownElement(_))));
    }

    #[test]
    fn lookup_fails_for_unknown_symbol() {
        let err = lookup("Xx").unwrap_err();
        assert_eq!(err, ElementError::UnknownElement("Xx".to_string()));
        assert!(lookup("").is_err());
    }

    #[test]
    fn table_is_complete_and_atomic_numbers_are_unique() {
        assert_eq!(ELEMENTS.len(), 118);
        let mut numbers: Vec<u8> = ELEMENTS.values().map(|e| e.atomic_number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        assert_eq!(numbers.len(), 118);
        for (key, element) in ELEMENTS.entries() {
            assert_eq!(*key, element.symbol);
        }
    }

    #[test]
    fn covalent_radius_is_reported_in_angstroms() {
        assert!((covalent_radius("O").unwrap() - 0.66).abs() < 1e-12);
        assert_eq!(
            covalent_radii(&["H", "C"]).unwrap(),
            vec![0.31, 0.76]
        );
        assert!(covalent_radii(&["H", "Qq"]).is_err());
    }
}
