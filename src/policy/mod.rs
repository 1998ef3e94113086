//! Collector policies the inspector understands.
//!
//! Only concurrent mark-sweep is supported.

pub mod cms;
