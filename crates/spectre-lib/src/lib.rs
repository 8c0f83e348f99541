//! Core engine for gcpspectre, a GCP resource waste auditor
//!
//! This crate provides:
//! - Listing/monitoring ports and their REST implementations
//! - The eleven per-resource-class scanners
//! - Multi-project scan orchestration with bounded concurrency
//! - The offline pricing table
//! - Post-scan analysis and report envelope assembly

pub mod analyzer;
pub mod gcp;
pub mod models;
pub mod pricing;
pub mod report;
pub mod scanner;

pub use analyzer::{analyze, AnalysisResult, AnalyzerConfig, Summary};
pub use models::{
    ExcludeConfig, Finding, FindingKind, MetadataValue, ResourceKind, ScanConfig, ScanProgress,
    ScanResult, Severity,
};
pub use report::{compute_exit_code, ReportData, ScanError, Target};
pub use scanner::{MultiProjectScanner, ProgressFn, ResourceScanner};
