use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, LayoutResult};

/// A layer-renaming function.
///
/// A destination of `None` discards the layer: its geometry is dropped from the output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerMap {
    /// Every name passes through unchanged.
    #[default]
    Identity,
    /// Every name maps to the same destination.
    Constant(Option<String>),
    /// Explicit lookup. Names not in the table are an error.
    Table(BTreeMap<String, Option<String>>),
}

impl LayerMap {
    pub fn identity() -> Self {
        Self::Identity
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Self::Constant(Some(name.into()))
    }

    pub fn discard_all() -> Self {
        Self::Constant(None)
    }

    pub fn table<K, V>(entries: impl IntoIterator<Item = (K, Option<V>)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Table(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        )
    }

    /// Single-entry table renaming `from` to `to`.
    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::table([(from.into(), Some(to.into()))])
    }

    /// Map a layer name. `Ok(None)` means the layer is discarded.
    pub fn lookup(&self, name: &str) -> LayoutResult<Option<String>> {
        match self {
            Self::Identity => Ok(Some(name.to_string())),
            Self::Constant(dest) => Ok(dest.clone()),
            Self::Table(table) => table
                .get(name)
                .cloned()
                .ok_or_else(|| LayoutError::UnknownLayer(name.to_string())),
        }
    }

    /// Compose `self` (applied first) with `above` (applied second).
    pub fn compose(&self, above: &LayerMap) -> LayoutResult<LayerMap> {
        match (self, above) {
            (below, Self::Identity) => Ok(below.clone()),
            (_, Self::Constant(dest)) => Ok(Self::Constant(dest.clone())),
            (Self::Identity, Self::Table(table)) => Ok(Self::Table(table.clone())),
            (Self::Constant(None), Self::Table(_)) => Ok(Self::Constant(None)),
            (Self::Constant(Some(src)), Self::Table(table)) => match table.get(src) {
                Some(dest) => Ok(Self::Constant(dest.clone())),
                None => Err(LayoutError::UnknownLayer(src.clone())),
            },
            (Self::Table(inner), Self::Table(outer)) => {
                // Entries whose destination the outer table doesn't know are kept as-is.
                let merged = inner
                    .iter()
                    .map(|(k, v)| {
                        let dest = match v {
                            Some(name) => outer.get(name).cloned().unwrap_or_else(|| v.clone()),
                            None => None,
                        };
                        (k.clone(), dest)
                    })
                    .collect();
                Ok(Self::Table(merged))
            }
        }
    }
}
