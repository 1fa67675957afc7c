//! Input advisories. Operator values are never rejected, only flagged.

pub mod input;
