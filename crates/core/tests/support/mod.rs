//! Shared fixtures for core integration tests

#![allow(dead_code)]

pub mod storage;

use serde::{Deserialize, Serialize};
use zrata_domain::ComputationRequest;

/// Result shape returned by the fake strategy runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub strategy: String,
    pub trades: u32,
    pub total_return: f64,
    pub equity_curve: Vec<f64>,
}

pub fn sma_request(fast: i64, slow: i64) -> ComputationRequest {
    ComputationRequest::builder("sma_crossover")
        .param("fast", fast)
        .param("slow", slow)
        .dataset("prices-2024-csv")
        .build()
}

pub fn sample_summary() -> BacktestSummary {
    BacktestSummary {
        strategy: "sma_crossover".to_owned(),
        trades: 4,
        total_return: 0.0731,
        equity_curve: vec![10_000.0, 10_120.5, 9_980.25, 10_731.0],
    }
}
