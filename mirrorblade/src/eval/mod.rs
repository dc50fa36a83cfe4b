//! Deterministic numeric evaluators backing the operation surface.
//!
//! Each evaluator owns its own exclusion and state; there is no
//! inter-evaluator locking. The pure-function curves live in
//! [`figure8`]; everything else is an object with explicit configure and
//! snapshot entry points.

pub mod expr;
pub mod figure8;
pub mod infinitizer;
pub mod interfold;
pub mod scooty;
pub mod underfold;

pub use expr::{compile, env_from_json, eval, ExprError, Program};
pub use figure8::{bernoulli, lissajous, lissajous12, Figure8, Figure8Params, Figure8Shape};
pub use infinitizer::{halton, halton23, Infinitizer, JitterParams, JitterState};
pub use interfold::{Interfold, InterfoldParams, InterfoldSnapshot};
pub use scooty::{format_samples, ScootyRing, ScootyStats, DEFAULT_CAPACITY};
pub use underfold::{Crease, Kernel, Underfold, UnderfoldError};
