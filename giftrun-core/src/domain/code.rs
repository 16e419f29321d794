//! Redemption code domain type

use serde::{Deserialize, Serialize};

/// A voucher redemption code extracted from a PDF attachment
///
/// Produced by the document code extractor, consumed exactly once by the
/// redemption loop, in extraction order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionCode(String);

impl RedemptionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RedemptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
