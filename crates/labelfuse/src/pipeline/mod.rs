//! High-level reconciliation pipeline.
//!
//! This module is the glue layer that wires the fusion stages together per
//! frame:
//! denoise -> ROI crop -> (semantic mask + instance growth || flow predictor)
//! -> flow fusion -> duplicate suppression -> expansion -> mask clipping
//! -> skeleton -> re-embedding.
//!
//! Algorithmic primitives live in `crate::fusion` and `crate::grid`. The
//! pipeline layer owns stage boundaries, call order and data flow; which
//! stages ran is recorded in [`StagePresence`].
//!
//! Time-lapse layouts reconcile every frame independently in parallel, then
//! stack the frames and optionally link identities across them.

mod frame;
mod instance;
mod result;
mod run;

pub use result::{ReconcileResult, ReconcileSummary, StagePresence};

pub(crate) use run::reconcile;
