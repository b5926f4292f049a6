//! Similarity measurement strategies
//!
//! A measurement maps two equal-length sequences to one scalar score where
//! higher means more similar. Implementations are stateless and are called
//! from many workers at once without synchronization.
//!
//! Inputs that cannot be scored (length mismatch, fewer than two values, zero
//! variance) are logged and produce `f64::NAN`. A `NaN` never compares
//! greater than anything, so the matcher can never select it as a best match.
//!
//! # Built-in strategies
//!
//! - **Pearson**: linear correlation, `[-1, 1]`
//! - **Spearman**: rank correlation, `[-1, 1]`
//! - **Dtw**: negated dynamic-time-warping distance on z-normalized inputs

pub mod dtw;
pub mod helpers;
pub mod pearson;
pub mod spearman;

pub use dtw::Dtw;
pub use pearson::Pearson;
pub use spearman::Spearman;

use std::str::FromStr;

use crate::MatchError;

/// Scalar similarity between two sequences
pub trait Measure: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score `a` against `b`; `NaN` when the pair cannot be scored.
    fn measure(&self, a: &[f64], b: &[f64]) -> f64;
}

impl<M: Measure + ?Sized> Measure for &M {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn measure(&self, a: &[f64], b: &[f64]) -> f64 {
        (**self).measure(a, b)
    }
}

impl<M: Measure + ?Sized> Measure for std::sync::Arc<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn measure(&self, a: &[f64], b: &[f64]) -> f64 {
        (**self).measure(a, b)
    }
}

/// Macro to generate the Measurement enum without boilerplate
macro_rules! define_measurements {
    (
        $(
            $variant:ident($measure:ty) => $name:literal
        ),* $(,)?
    ) => {
        /// All builtin measurements - chosen once, dispatched by enum
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum Measurement {
            $($variant($measure)),*
        }

        impl Measure for Measurement {
            #[inline]
            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(m) => Measure::name(m)),*
                }
            }

            #[inline]
            fn measure(&self, a: &[f64], b: &[f64]) -> f64 {
                match self {
                    $(Self::$variant(m) => Measure::measure(m, a, b)),*
                }
            }
        }

        impl FromStr for Measurement {
            type Err = MatchError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($name => Ok(Self::$variant(<$measure>::default())),)*
                    other => Err(MatchError::Config(format!(
                        "unsupported measurement type: {other}"
                    ))),
                }
            }
        }

        impl Measurement {
            /// Names accepted by [`FromStr`]
            pub const NAMES: &'static [&'static str] = &[$($name),*];
        }
    };
}

define_measurements! {
    Pearson(Pearson) => "pearson",
    Spearman(Spearman) => "spearman",
    Dtw(Dtw) => "dtw",
}

impl Measurement {
    pub const fn pearson() -> Self {
        Self::Pearson(Pearson)
    }

    pub const fn spearman() -> Self {
        Self::Spearman(Spearman)
    }

    pub const fn dtw() -> Self {
        Self::Dtw(Dtw { band: None })
    }
}

impl Default for Measurement {
    fn default() -> Self {
        Self::pearson()
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl serde::Serialize for Measurement {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for Measurement {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
