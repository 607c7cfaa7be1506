use serde::{Deserialize, Serialize};

use super::fields::FieldContainer;
use super::specification::LiveDataSpecification;

/// A sequenced, fully normalized update ready for delivery
///
/// `sequence_number` is 0-based and strictly increasing per distributor. It is
/// only assigned to updates that are actually delivered, so extinguished or
/// rejected ticks leave no gaps in the numbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedUpdate {
    pub sequence_number: u64,
    pub specification: LiveDataSpecification,
    pub fields: FieldContainer,
}

impl NormalizedUpdate {
    pub fn new(sequence_number: u64, specification: LiveDataSpecification, fields: FieldContainer) -> Self {
        Self {
            sequence_number,
            specification,
            fields,
        }
    }
}
