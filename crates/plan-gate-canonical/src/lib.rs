//! Canonical governance identity.
//!
//! Everything that must be replay-stable in the gate (the schema version, the
//! governance hash, plan identity, locked-section digests) is computed here:
//!
//! - [`canonicalize`] produces RFC 8785 (JCS) bytes for a JSON value: object
//!   keys sorted by UTF-16 code units, no insignificant whitespace, ECMAScript
//!   number formatting, minimal string escaping.
//! - [`digest`] hashes those bytes with the fixed [`DIGEST_ALGORITHM`].
//! - [`parse_strict`] parses JSON text and rejects duplicate object keys, so
//!   two documents that canonicalize identically are structurally equal.
//!
//! Canonicalization is a pure function. Two textually different documents
//! that are structurally equal always produce the same bytes:
//!
//! ```
//! use plan_gate_canonical::{canonicalize, parse_strict};
//!
//! let a = parse_strict(r#"{ "b": [1, 2.0], "a": "x" }"#).unwrap();
//! let b = parse_strict(r#"{"a":"x","b":[1,2]}"#).unwrap();
//! assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
//! assert_eq!(canonicalize(&a).unwrap(), br#"{"a":"x","b":[1,2]}"#.to_vec());
//! ```

pub mod digest;
pub mod error;
pub mod jcs;
pub mod number;
pub mod parse;

pub use digest::{digest, digest_bytes, digest_serializable, Digest, DIGEST_ALGORITHM};
pub use error::CanonicalError;
pub use jcs::{canonical_string, canonicalize, canonicalize_serializable, MAX_DEPTH};
pub use parse::parse_strict;
