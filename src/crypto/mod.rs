//! Key pairs and signatures.

pub mod key_pair;
