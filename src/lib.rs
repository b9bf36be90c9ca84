//! # ua-protocol
//!
//! Tag-driven OPC UA binary encoding with a thin async transport.
//!
//! Message types are plain Rust structs declared through [`ua_struct!`]. Each
//! field may carry a directive string that controls its wire shape:
//!
//! - `bits=N` packs the field into N bits shared with its neighbours
//! - `lengthField=X` makes a sequence whose element count lives in field `X`
//! - `switchField=X,switchValue=V` includes the field only while `X == V`
//!
//! A type is resolved once into a [`RecordDescriptor`](crate::core::descriptor::RecordDescriptor),
//! cached process-wide, and then drives every encode and decode of that type.
//!
//! ## Modules
//! - [`core`](crate::core): tag grammar, field resolution, binary codec and chunk framing
//! - [`types`]: built-in types and service request/response shapes
//! - [`protocol`]: HEL/ACK/ERR bodies and type-id framed service messages
//! - [`transport`]: connection and secure channel collaborators
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```rust
//! use ua_protocol::core::codec::{decode, encode};
//! use ua_protocol::ua_struct;
//!
//! ua_struct! {
//!     #[derive(Debug, Clone, Default, PartialEq)]
//!     pub struct Reading {
//!         pub kind: u8,
//!         pub no_of_samples: i32,
//!         #[ua(tag = "lengthField=no_of_samples")]
//!         pub samples: Vec<u16>,
//!         #[ua(tag = "switchField=kind,switchValue=2")]
//!         pub label: String,
//!     }
//! }
//!
//! let reading = Reading {
//!     kind: 2,
//!     no_of_samples: 3,
//!     samples: vec![10, 20, 30],
//!     label: "boiler".into(),
//! };
//! let bytes = encode(&reading).unwrap();
//! assert_eq!(decode::<Reading>(&bytes).unwrap(), reading);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod utils;

#[doc(hidden)]
pub use bytes;

pub use crate::core::codec::{decode, decode_from, encode, Encodable};
pub use crate::core::descriptor::{FieldDescriptor, RecordDescriptor, Structure};
pub use crate::core::tag::{parse_tag, FieldTag};
pub use config::NetworkConfig;
pub use error::{ProtocolError, Result};
