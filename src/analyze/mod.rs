// src/analyze/mod.rs

//! Semantic change analysis for live redefinitions.
//!
//! An analyzer looks at the old and new representation of one unit and says
//! whether the difference needs reconciling. Analyzers are pure: the same
//! pair always produces the same verdict, and nothing is cached between
//! calls.
//!
//! Callers should go through [`verdict`], which turns an analyzer error into
//! "reconcile" so a real change is never dropped because we failed to parse
//! something.

pub mod classfile;

use std::fmt::Debug;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::types::AnalyzerKind;

pub use classfile::{class_name, ClassShape, MemberShape};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("not a class file (magic {0:#010x})")]
    BadMagic(u32),

    #[error("class file truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstant { tag: u8, index: u16 },

    #[error("constant pool entry {index} is not a {expected}")]
    BadConstant { index: u16, expected: &'static str },

    #[error("malformed class file: {0}")]
    Malformed(String),
}

/// Decides whether a change between two representations of the same unit
/// requires reconciliation.
///
/// Either side may be absent (first observation, or the old bytes were not
/// supplied by the host).
pub trait ChangeAnalyzer: Send + Sync + Debug {
    fn should_reconcile(
        &self,
        old: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool, AnalyzerError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Every change reconciles.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReconcile;

impl ChangeAnalyzer for AlwaysReconcile {
    fn should_reconcile(&self, _old: Option<&[u8]>, _new: Option<&[u8]>) -> Result<bool, AnalyzerError> {
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "always"
    }
}

/// Reconcile whenever the bytes differ at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteEquality;

impl ChangeAnalyzer for ByteEquality {
    fn should_reconcile(&self, old: Option<&[u8]>, new: Option<&[u8]>) -> Result<bool, AnalyzerError> {
        Ok(match (old, new) {
            (Some(old), Some(new)) => old != new,
            (None, None) => false,
            _ => true,
        })
    }

    fn name(&self) -> &'static str {
        "bytes"
    }
}

/// Reconcile only when the class's outward structure changed.
///
/// Method bodies, line numbers and other debug attributes are ignored; see
/// [`ClassShape`] for what counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassShapeAnalyzer;

impl ChangeAnalyzer for ClassShapeAnalyzer {
    fn should_reconcile(&self, old: Option<&[u8]>, new: Option<&[u8]>) -> Result<bool, AnalyzerError> {
        let (old, new) = match (old, new) {
            (Some(old), Some(new)) => (old, new),
            (None, None) => return Ok(false),
            _ => return Ok(true),
        };
        if old == new {
            return Ok(false);
        }
        Ok(ClassShape::parse(old)? != ClassShape::parse(new)?)
    }

    fn name(&self) -> &'static str {
        "class-shape"
    }
}

pub fn build_analyzer(kind: AnalyzerKind) -> Arc<dyn ChangeAnalyzer> {
    match kind {
        AnalyzerKind::Always => Arc::new(AlwaysReconcile),
        AnalyzerKind::Bytes => Arc::new(ByteEquality),
        AnalyzerKind::ClassShape => Arc::new(ClassShapeAnalyzer),
    }
}

/// Run `analyzer`, failing open on error.
pub fn verdict(analyzer: &dyn ChangeAnalyzer, old: Option<&[u8]>, new: Option<&[u8]>) -> bool {
    match analyzer.should_reconcile(old, new) {
        Ok(v) => v,
        Err(err) => {
            debug!(
                analyzer = analyzer.name(),
                error = %err,
                "analysis failed; reconciling anyway"
            );
            true
        }
    }
}
