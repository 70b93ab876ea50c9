use serde::{Deserialize, Serialize};

use super::ApiError;

/// One prescription as the backend reports it. `refill` and `updated` are
/// kept as the ISO strings the backend produced; the client never invents
/// or recomputes either of them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Prescription {
    pub name: String,
    pub count: f64,
    pub refill: String,
    pub rate: f64,
    pub quantity: f64,
    pub updated: String,
}

/// Body of a create request. Built from raw form input, so both numbers
/// must parse before anything is allowed near the wire.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewPrescription {
    pub quantity: f64,
    pub rate: f64,
}

impl NewPrescription {
    pub fn parse(quantity: &str, rate: &str) -> Result<Self, ApiError> {
        Ok(NewPrescription {
            quantity: parse_number("quantity", quantity)?,
            rate: parse_number("rate", rate)?,
        })
    }
}

/// Body of a partial update. Fields left at `None` are omitted from the
/// serialized JSON entirely, so the backend only sees what changed.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct PrescriptionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

impl PrescriptionPatch {
    /// Parses whichever inputs are non-empty. Both empty is a valid result,
    /// not an error; the synchronizer treats it as "nothing to send".
    pub fn parse(quantity: &str, rate: &str) -> Result<Self, ApiError> {
        let mut patch = PrescriptionPatch::default();
        if !quantity.is_empty() {
            patch.quantity = Some(parse_number("quantity", quantity)?);
        }
        if !rate.is_empty() {
            patch.rate = Some(parse_number("rate", rate)?);
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.rate.is_none()
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, ApiError> {
    value.trim().parse().map_err(|_| ApiError::Validation {
        field,
        value: value.to_string(),
    })
}
