use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// How the mean density of a cell maps onto the stipple diameter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointMapping {
    Linear,
    #[default]
    SquareRoot,
    Exponential,
    Square,
}

impl PointMapping {
    pub const ALL: [PointMapping; 4] = [
        PointMapping::Linear,
        PointMapping::SquareRoot,
        PointMapping::Exponential,
        PointMapping::Square,
    ];

    /// Map a mean density in `[0, 1]` onto `[0, 1]`.
    pub fn apply(&self, density: f64) -> f64 {
        match self {
            PointMapping::Linear => density,
            PointMapping::SquareRoot => density.sqrt(),
            PointMapping::Exponential => 2.0 - 2.0 / (1.0 + density),
            PointMapping::Square => density * density,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PointMapping::Linear => "Linear",
            PointMapping::SquareRoot => "SquareRoot",
            PointMapping::Exponential => "Exponential",
            PointMapping::Square => "Square",
        }
    }
}

impl fmt::Display for PointMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PointMapping {
    type Err = Error;

    /// Accepts a name in any case, or the numeric code `0..=3` in the order of [`Self::ALL`].
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.parse::<usize>() {
            return PointMapping::ALL
                .get(code)
                .copied()
                .ok_or_else(|| Error::UnknownMapping(s.to_owned()));
        }

        PointMapping::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownMapping(s.to_owned()))
    }
}

/// Tunable knobs of a stippling run.
///
/// The serialized field names match the parameter documents written by earlier tools, so
/// existing JSON files load unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Params {
    pub initial_points: usize,
    pub initial_point_size: f64,

    pub adaptive_point_size: bool,
    pub point_size_min: f64,
    pub point_size_max: f64,

    #[serde(rename = "pointSizeMapping")]
    pub mapping: PointMapping,

    pub super_sampling_factor: usize,
    pub max_iterations: usize,

    pub hysteresis: f64,
    pub hysteresis_delta: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            initial_points: 10000,
            initial_point_size: 1.0,
            adaptive_point_size: true,
            point_size_min: 0.6,
            point_size_max: 4.0,
            mapping: PointMapping::SquareRoot,
            super_sampling_factor: 1,
            max_iterations: 42,
            hysteresis: 0.5,
            hysteresis_delta: 0.01,
        }
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be a finite non-negative number, got {value}"
        )))
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        non_negative("initialPointSize", self.initial_point_size)?;
        non_negative("pointSizeMin", self.point_size_min)?;
        non_negative("pointSizeMax", self.point_size_max)?;
        non_negative("hysteresis", self.hysteresis)?;
        non_negative("hysteresisDelta", self.hysteresis_delta)?;

        if self.point_size_min > self.point_size_max {
            return Err(Error::InvalidConfig(format!(
                "pointSizeMin ({}) exceeds pointSizeMax ({})",
                self.point_size_min, self.point_size_max
            )));
        }

        if self.super_sampling_factor == 0 {
            return Err(Error::InvalidConfig(
                "superSamplingFactor must be at least 1".into(),
            ));
        }

        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "maxIterations must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Hysteresis used in iteration `iteration`, widening linearly.
    pub fn hysteresis_at(&self, iteration: usize) -> f64 {
        self.hysteresis + iteration as f64 * self.hysteresis_delta
    }

    /// Target diameter for a cell with the given mean density.
    pub fn diameter(&self, mean_density: f64) -> f64 {
        if !self.adaptive_point_size {
            return self.initial_point_size;
        }

        let norm = self.mapping.apply(mean_density);
        self.point_size_min * (1.0 - norm) + self.point_size_max * norm
    }

    /// Accepted range of accumulated cell density for a stipple of `diameter`.
    pub fn band(&self, diameter: f64, hysteresis: f64) -> Band {
        let point_area = PI * (diameter / 2.0).powi(2);
        let scale = point_area * (self.super_sampling_factor as f64).powi(2);

        Band {
            lower: (1.0 - hysteresis / 2.0) * scale,
            upper: (1.0 + hysteresis / 2.0) * scale,
        }
    }
}

/// Density interval inside which a cell is kept as is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Band {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Merge,
    Keep,
    Split,
}

impl Band {
    pub fn decide(&self, sum_density: f64, area: f64) -> Decision {
        if sum_density < self.lower || area == 0.0 {
            Decision::Merge
        } else if sum_density < self.upper {
            Decision::Keep
        } else {
            Decision::Split
        }
    }
}
