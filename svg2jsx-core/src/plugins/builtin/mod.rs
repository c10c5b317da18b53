//! Built-in passes
//!
//! Names and parameters follow SVGO so existing `svgo.json` files keep
//! working.

mod ids;
mod remove;
mod structure;
mod values;

use serde_json::Value;
use std::sync::Arc;

use super::{Params, Plugin};

pub use ids::CleanupIds;
pub use remove::{
    RemoveAttrs, RemoveComments, RemoveDesc, RemoveDimensions, RemoveDoctype,
    RemoveEditorsNsData, RemoveEmptyAttrs, RemoveEmptyContainers, RemoveMetadata, RemoveTitle,
    RemoveUselessDefs, RemoveXmlProcInst,
};
pub use structure::{CollapseGroups, SortAttrs};
pub use values::{CleanupAttrs, CleanupNumericValues, ConvertColors, ConvertPathData};

/// Every built-in pass.
pub fn all() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(RemoveDoctype),
        Arc::new(RemoveXmlProcInst),
        Arc::new(RemoveComments),
        Arc::new(RemoveMetadata),
        Arc::new(RemoveEditorsNsData),
        Arc::new(CleanupAttrs),
        Arc::new(RemoveTitle),
        Arc::new(RemoveDesc),
        Arc::new(RemoveUselessDefs),
        Arc::new(RemoveEmptyAttrs),
        Arc::new(CleanupNumericValues),
        Arc::new(ConvertColors),
        Arc::new(ConvertPathData),
        Arc::new(CleanupIds),
        Arc::new(CollapseGroups),
        Arc::new(RemoveEmptyContainers),
        Arc::new(RemoveDimensions),
        Arc::new(RemoveAttrs),
        Arc::new(SortAttrs),
    ]
}

fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}
