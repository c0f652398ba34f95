//! A validated attenuation value
use crate::constants::{MAX_ATTENUATION_DB, MAX_ATTENUATION_TEXT_LEN, MIN_ATTENUATION_DB};
use crate::Error;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An attenuation, in dB, known to be within
/// [`MIN_ATTENUATION_DB`]..=[`MAX_ATTENUATION_DB`].
///
/// The value is not rounded to the device's 0.25 dB step - the device does
/// that itself.  It is displayed in its shortest decimal form, so `25.0`
/// becomes `25` and `0.25` stays `0.25`, which is the form sent to the
/// device.  Values whose shortest form is too long to send, like `5e-324`,
/// are rejected rather than rounded.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Attenuation(f64);

impl Attenuation {
    /// Create a new [`Attenuation`]
    ///
    /// # Returns
    /// * `Ok(Attenuation)` - if `db` is within range
    /// * `Err(Error::InvalidAttenuation)` - if `db` is out of range, NaN, or
    ///   has too many digits to fit in a command
    pub fn new(db: f64) -> Result<Self, Error> {
        if db > MAX_ATTENUATION_DB {
            Err(Error::InvalidAttenuation {
                message: format!("{db} is too high, max attenuation: {MAX_ATTENUATION_DB}"),
            })
        } else if db < MIN_ATTENUATION_DB {
            Err(Error::InvalidAttenuation {
                message: format!("{db} is too low, min attenuation: {MIN_ATTENUATION_DB}"),
            })
        } else if db.is_nan() {
            Err(Error::InvalidAttenuation {
                message: "value is not a number".into(),
            })
        } else {
            // Normalise -0.0 so it isn't sent as "-0"
            let attenuation = Self(db + 0.0);
            let len = attenuation.to_string().len();
            if len > MAX_ATTENUATION_TEXT_LEN {
                return Err(Error::InvalidAttenuation {
                    message: format!(
                        "{db} has too many digits ({len}), max: {MAX_ATTENUATION_TEXT_LEN}"
                    ),
                });
            }
            Ok(attenuation)
        }
    }

    /// The attenuation in dB
    pub fn db(&self) -> f64 {
        self.0
    }
}

impl FromStr for Attenuation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let db = s
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::InvalidAttenuation {
                message: format!("{s:?} is not a decimal number: {e}"),
            })?;
        Self::new(db)
    }
}

impl TryFrom<f64> for Attenuation {
    type Error = Error;

    fn try_from(db: f64) -> Result<Self, Self::Error> {
        Self::new(db)
    }
}

impl fmt::Display for Attenuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
