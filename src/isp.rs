//! ISP information for the client connection
//!
//! The backend's IP endpoint reports the caller's ISP. Lookup is best-effort:
//! any failure falls back to the `Unknown ISP` placeholder so a run is never
//! blocked by it.

use crate::defaults::UNKNOWN_ISP;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ISP description as reported by the backend and echoed back with results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IspInfo {
    #[serde(rename = "processedString")]
    pub processed_string: String,
    #[serde(rename = "rawIspInfo", default, skip_serializing_if = "Option::is_none")]
    pub raw_isp_info: Option<Value>,
}

impl IspInfo {
    pub fn new<S: Into<String>>(processed_string: S) -> Self {
        Self {
            processed_string: processed_string.into(),
            raw_isp_info: None,
        }
    }

    /// Placeholder used when the lookup fails
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ISP)
    }

    pub fn is_unknown(&self) -> bool {
        self.processed_string == UNKNOWN_ISP && self.raw_isp_info.is_none()
    }

    /// Parse the IP endpoint's JSON body.
    ///
    /// Older backends send `isp` instead of `processedString`; a body with
    /// neither (or an empty value) keeps the placeholder text.
    pub fn from_response(body: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(body)?;
        if !data.is_object() {
            return Err(AppError::parse("ISP response is not a JSON object"));
        }

        let processed_string = ["processedString", "isp"]
            .iter()
            .filter_map(|key| data.get(*key).and_then(Value::as_str))
            .find(|value| !value.is_empty())
            .unwrap_or(UNKNOWN_ISP)
            .to_string();

        let raw_isp_info = data
            .get("rawIspInfo")
            .filter(|raw| raw.is_object())
            .cloned();

        Ok(Self {
            processed_string,
            raw_isp_info,
        })
    }

    /// JSON form submitted in the `ispinfo` telemetry field
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for IspInfo {
    fn default() -> Self {
        Self::unknown()
    }
}
