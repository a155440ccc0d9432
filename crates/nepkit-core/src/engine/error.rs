use thiserror::Error;

use super::batch::CalculationMode;
use crate::core::geometry::GeometryError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Element '{symbol}' in structure {structure} is not supported by the model")]
    UnsupportedElement { symbol: String, structure: usize },

    #[error("Backend returned {found} values of '{quantity}' for structure {structure}, expected {expected}")]
    ShapeMismatch {
        quantity: &'static str,
        structure: usize,
        expected: usize,
        found: usize,
    },

    #[error("Backend failed: {0}")]
    Backend(String),

    #[error("Backend replied to a {mode:?} request with the wrong kind of output")]
    UnexpectedOutput { mode: CalculationMode },

    #[error("Geometry query failed for structure {structure}: {source}")]
    Geometry {
        structure: usize,
        #[source]
        source: GeometryError,
    },
}
