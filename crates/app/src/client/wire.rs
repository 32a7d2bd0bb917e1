//! Solver wire format

use lading::{
    placements::{Origin, PlacedBox, UnfulfilledEntry},
    solver::{DemandItem, PlacementResult, SolveRequest},
};
use serde::{Deserialize, Serialize};

/// Request body for the calculate endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct CalculateRequest<'a> {
    pub(crate) bin_size: [u32; 3],
    pub(crate) items: Vec<WireItem<'a>>,
    pub(crate) prefilled: Vec<WireBox<'a>>,
    pub(crate) phase: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireItem<'a> {
    name: &'a str,
    w: u32,
    h: u32,
    d: u32,
    count: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireBox<'a> {
    name: &'a str,
    pos: [u32; 3],
    dim: [u32; 3],
}

impl<'a> From<&'a SolveRequest> for CalculateRequest<'a> {
    fn from(request: &'a SolveRequest) -> Self {
        Self {
            bin_size: request.container.dimensions(),
            items: request.items.iter().map(WireItem::from).collect(),
            prefilled: request
                .obstacles
                .iter()
                .map(|placed| WireBox {
                    name: placed.name(),
                    pos: placed.position(),
                    dim: placed.dimensions(),
                })
                .collect(),
            phase: request.phase.as_str(),
        }
    }
}

impl<'a> From<&'a DemandItem> for WireItem<'a> {
    fn from(item: &'a DemandItem) -> Self {
        Self {
            name: &item.name,
            w: item.width,
            h: item.height,
            d: item.depth,
            count: item.count,
        }
    }
}

/// Successful response body.
#[derive(Debug, Deserialize)]
pub(crate) struct CalculateResponse {
    pub(crate) status: String,

    #[serde(default)]
    pub(crate) items: Vec<PlacedItem>,

    #[serde(default)]
    pub(crate) unpacked: Vec<UnpackedItem>,

    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlacedItem {
    name: String,
    pos: [u32; 3],
    dim: [u32; 3],
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnpackedItem {
    name: String,
    left: u32,
    total: u32,
}

/// Error body returned with 4xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) detail: String,
}

impl CalculateResponse {
    /// Convert into placements tagged with `origin`.
    pub(crate) fn into_result(self, origin: Origin) -> PlacementResult {
        PlacementResult {
            placements: self
                .items
                .into_iter()
                .map(|item| PlacedBox::new(item.name, item.pos, item.dim, origin))
                .collect(),
            unfulfilled: self
                .unpacked
                .into_iter()
                .map(|entry| UnfulfilledEntry {
                    name: entry.name,
                    requested_total: entry.total,
                    leftover_count: entry.left,
                })
                .collect(),
        }
    }
}
