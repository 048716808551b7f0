pub mod parameter;

pub use parameter::Parameter;
