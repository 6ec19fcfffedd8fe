//! Small, dependency-light helpers shared by the catalog, scanner, and HTTP layers.

pub mod dates;
pub mod hashing;
pub mod tokenize;
pub mod url;
