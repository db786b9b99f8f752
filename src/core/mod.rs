//! Core value model: errors, collections, typed values, temporal and
//! quantity primitives, the type registry, tracing and cancellation.

pub mod cancellation;
pub mod collection;
pub mod decimal;
pub mod error;
pub mod quantity;
pub mod temporal;
pub mod trace;
pub mod types;
pub mod value;

pub use cancellation::CancellationToken;
pub use collection::Collection;
pub use error::{FhirPathError, Result, SourcePosition};
pub use quantity::{CalendarUnit, Quantity};
pub use temporal::{PrecisionDate, PrecisionDateTime, PrecisionTime, TemporalPrecision};
pub use trace::{CollectingTracer, LogTracer, Tracer};
pub use types::{ClassInfoElement, TypeInfo, TypeRegistry, TypeSpecifier};
pub use value::{Element, FhirPathValue};
