pub mod package;
pub mod synth;
pub mod xml;
