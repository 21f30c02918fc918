//! Core types for ABC bytecode emission.
//!
//! This crate holds the value model shared by the encoder and emitter:
//!
//! - [`Namespace`], [`QName`] and [`TypeName`] - resolved names
//! - [`DefaultValue`] and [`MetadataEntry`] - declaration payloads
//! - [`Decimal128`] - 128-bit decimal constants
//! - [`NumberUsage`] - numeric pragmas
//! - [`EmitterConfig`] - feature flags
//! - [`EmitError`] and [`Diagnostic`] - the two error tiers

mod config;
mod decimal;
pub mod error;
mod names;
mod numbers;
mod values;

pub use config::{EmitterConfig, MAJOR_VERSION, MINOR_VERSION, MINOR_VERSION_WITH_DECIMAL};
pub use decimal::Decimal128;
pub use error::{Diagnostic, EmitError};
pub use names::{Namespace, NamespaceKind, QName, TypeName};
pub use numbers::{DEFAULT_PRECISION, NumberType, NumberUsage, RoundingMode};
pub use values::{DefaultValue, MetadataEntry, MetadataValue};
