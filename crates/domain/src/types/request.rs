//! Computation requests

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ParamValue;

/// Identifies one strategy run: which strategy, with what parameters, over
/// which dataset
///
/// Fields are private so a request cannot change after it has been
/// fingerprinted. Parameters are held in a `BTreeMap`, so insertion order
/// never matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationRequest {
    strategy_identifier: String,
    #[serde(default)]
    parameters: BTreeMap<String, ParamValue>,
    dataset_fingerprint: String,
}

impl ComputationRequest {
    pub fn new(
        strategy_identifier: impl Into<String>,
        parameters: BTreeMap<String, ParamValue>,
        dataset_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            strategy_identifier: strategy_identifier.into(),
            parameters,
            dataset_fingerprint: dataset_fingerprint.into(),
        }
    }

    /// Start building a request for `strategy_identifier`
    pub fn builder(strategy_identifier: impl Into<String>) -> ComputationRequestBuilder {
        ComputationRequestBuilder {
            strategy_identifier: strategy_identifier.into(),
            parameters: BTreeMap::new(),
            dataset_fingerprint: String::new(),
        }
    }

    pub fn strategy_identifier(&self) -> &str {
        &self.strategy_identifier
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    pub fn dataset_fingerprint(&self) -> &str {
        &self.dataset_fingerprint
    }
}

/// Builder for [`ComputationRequest`]
#[derive(Debug, Clone)]
pub struct ComputationRequestBuilder {
    strategy_identifier: String,
    parameters: BTreeMap<String, ParamValue>,
    dataset_fingerprint: String,
}

impl ComputationRequestBuilder {
    /// Set a parameter, replacing any earlier value for the same key
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn params<K, V, I>(mut self, params: I) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.parameters.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn dataset(mut self, dataset_fingerprint: impl Into<String>) -> Self {
        self.dataset_fingerprint = dataset_fingerprint.into();
        self
    }

    /// Finish the request
    ///
    /// Field validation happens when the request is fingerprinted.
    pub fn build(self) -> ComputationRequest {
        ComputationRequest {
            strategy_identifier: self.strategy_identifier,
            parameters: self.parameters,
            dataset_fingerprint: self.dataset_fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_order_does_not_matter() {
        let a = ComputationRequest::builder("sma_crossover")
            .param("fast", 10)
            .param("slow", 20)
            .dataset("prices-2024")
            .build();
        let b = ComputationRequest::builder("sma_crossover")
            .dataset("prices-2024")
            .params([("slow", 20), ("fast", 10)])
            .build();

        assert_eq!(a, b);
        assert_eq!(a.strategy_identifier(), "sma_crossover");
        assert_eq!(a.parameter("fast"), Some(&ParamValue::Int(10)));
        assert_eq!(a.dataset_fingerprint(), "prices-2024");
    }

    #[test]
    fn deserializes_from_json() {
        let request: ComputationRequest = serde_json::from_str(
            r#"{"strategy_identifier":"rsi","parameters":{"period":14},"dataset_fingerprint":"d1"}"#,
        )
        .unwrap();
        assert_eq!(request.parameter("period"), Some(&ParamValue::Int(14)));
    }
}
