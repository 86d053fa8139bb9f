//! Internal helpers for package parsing and identifier inflection.

pub(crate) mod string;
pub(crate) mod xml;
pub(crate) mod zip;
