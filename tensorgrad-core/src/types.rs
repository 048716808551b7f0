use std::fmt;

/// Data type of the elements stored in a tensor buffer.
///
/// The engine runs entirely on CPU floats; `F64` exists primarily so the
/// finite-difference gradient checker can work at full precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
        }
    }
}
