//! Core data types for cgMLST profile assignment.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`AlleleProfile`]: A query profile as submitted, one [`AlleleCode`] per locus
//! - [`ResolvedProfile`]: A profile after checksum resolution, every locus either
//!   a concrete allele or a missing marker
//! - [`ReferenceProfile`]: A sequence type (ST) from the database with its encoded alleles
//! - [`HierCcRow`]: The HierCC cluster codes of a reference ST
//! - [`SequenceType`], [`GapOrigin`], [`GapLimit`]: Identifier and gap handling types
//!
//! ## Allele codes
//!
//! A submitted profile joins one code per locus with `_`:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `17` | Catalogued allele 17 |
//! | `` (empty) or `0` | No determinable call at this locus |
//! | `3f9a0c...` | Content hash of a sequence without a catalogued allele ID |

pub mod profile;
pub mod reference;
pub mod types;

pub use profile::{AlleleCode, AlleleProfile, ResolvedAllele, ResolvedProfile, CODE_DELIMITER};
pub use reference::{HierCcRow, ReferenceProfile};
pub use types::{GapLimit, GapOrigin, SequenceType};
