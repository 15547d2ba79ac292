pub mod gmail;
pub mod normalizer;
