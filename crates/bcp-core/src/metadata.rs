// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::borrow::Cow;

/// Schema version for run metadata and serialized reports.
pub const RUN_METADATA_SCHEMA_VERSION: u32 = 1;

/// Structured metadata captured from a sampler execution.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RunMetadata {
    pub n: usize,
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub runtime_ms: Option<u64>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
    pub algorithm: Cow<'static, str>,
    pub seed: Option<u64>,
    pub thread_count: Option<usize>,
    #[cfg(feature = "serde")]
    pub params_json: Option<serde_json::Value>,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            n: 0,
            schema_version: RUN_METADATA_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            runtime_ms: None,
            notes: vec![],
            warnings: vec![],
            algorithm: Cow::Borrowed(""),
            seed: None,
            thread_count: None,
            #[cfg(feature = "serde")]
            params_json: None,
        }
    }
}
