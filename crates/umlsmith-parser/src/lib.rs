//! Text handling for umlsmith.
//!
//! Everything in this crate is pure text processing with no network or
//! subprocess access:
//!
//! - [`Normalizer`] reduces CSV, JSON, YAML or free text into
//!   [`Record`](umlsmith_core::record::Record)s.
//! - [`extract_code`] and [`extract_json`] pull fenced blocks out of model
//!   output.
//! - [`extract_graph`] reads components and relations back out of PlantUML
//!   source.
//!
//! # Example
//!
//! ```
//! # use umlsmith_parser::{InputFormat, Normalized, Normalizer, RawInput};
//! let input = RawInput::new(
//!     "inventory.csv",
//!     InputFormat::Csv,
//!     "id,name,depends_on\nA,Alpha,B\nB,Beta,\n",
//! );
//!
//! let Normalized::Records(records) = Normalizer::default().normalize(&input).unwrap() else {
//!     panic!("expected records");
//! };
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].relations()[0].target(), "B");
//! ```

pub mod error;

mod fence;
mod graph;
mod input;
mod normalize;
mod relation;

pub use error::ParseError;
pub use fence::{extract_code, extract_json};
pub use graph::extract_graph;
pub use input::{InputFormat, RawInput};
pub use normalize::{Normalized, Normalizer};
