//! Spatial operations: H3-based vehicle indexing for candidate retrieval.
//!
//! This module provides:
//!
//! - **SpatialIndex**: H3 cell -> vehicle mappings for radius queries without
//!   scanning the whole fleet
//! - **Grid disk queries**: cells covering a metric radius, LRU cached
//!
//! Resolution 9 (~174 m average edge) suits city-scale dispatch.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::OnceLock;

use h3o::{CellIndex, Resolution};
use lru::LruCache;
use parking_lot::Mutex;

use crate::geo::GeoPoint;
use crate::model::VehicleId;

pub const INDEX_RESOLUTION: Resolution = Resolution::Nine;

/// Average hexagon edge length at [`INDEX_RESOLUTION`], in kilometres.
const CELL_EDGE_KM: f64 = 0.174;

/// Largest grid disk walked; wider queries scan every indexed vehicle instead.
pub const MAX_DISK_RINGS: u32 = 200;

/// Ring count `k` whose grid disk covers `radius_m` around any point of the origin cell.
pub fn rings_for_radius(radius_m: f64) -> u32 {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return 0;
    }
    // Adjacent cell centres sit sqrt(3) * edge apart; one extra ring covers
    // points near the origin cell's boundary.
    let spacing_km = 3f64.sqrt() * CELL_EDGE_KM;
    ((radius_m / 1000.0) / spacing_km).ceil() as u32 + 1
}

/// Grid disk cache keyed by (origin, k).
struct GridDiskCache {
    cache: Mutex<LruCache<(CellIndex, u32), Vec<CellIndex>>>,
}

impl GridDiskCache {
    fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(1_000).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn get_or_compute(&self, origin: CellIndex, k: u32) -> Vec<CellIndex> {
        self.cache
            .lock()
            .get_or_insert((origin, k), || origin.grid_disk::<Vec<_>>(k))
            .clone()
    }
}

static GRID_DISK_CACHE: OnceLock<GridDiskCache> = OnceLock::new();

/// Get grid disk with caching.
pub fn grid_disk_cached(origin: CellIndex, k: u32) -> Vec<CellIndex> {
    GRID_DISK_CACHE
        .get_or_init(GridDiskCache::new)
        .get_or_compute(origin, k)
}

/// Spatial index for vehicle lookups by H3 cell.
///
/// Updated incrementally as vehicles register and move.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    vehicles_by_cell: HashMap<CellIndex, Vec<VehicleId>>,
    /// Reverse mapping: vehicle -> current cell (for efficient updates).
    vehicle_to_cell: HashMap<VehicleId, CellIndex>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `vehicle` at the cell containing `location`. Returns false if the
    /// point cannot be mapped to a cell.
    pub fn insert(&mut self, vehicle: VehicleId, location: GeoPoint) -> bool {
        let Some(cell) = location.to_cell(INDEX_RESOLUTION) else {
            return false;
        };
        self.remove(vehicle);
        self.vehicles_by_cell.entry(cell).or_default().push(vehicle);
        self.vehicle_to_cell.insert(vehicle, cell);
        true
    }

    pub fn remove(&mut self, vehicle: VehicleId) {
        if let Some(cell) = self.vehicle_to_cell.remove(&vehicle) {
            if let Some(vehicles) = self.vehicles_by_cell.get_mut(&cell) {
                vehicles.retain(|&v| v != vehicle);
                if vehicles.is_empty() {
                    self.vehicles_by_cell.remove(&cell);
                }
            }
        }
    }

    /// Move a vehicle to a new location (no-op when the cell is unchanged).
    pub fn update_position(&mut self, vehicle: VehicleId, location: GeoPoint) -> bool {
        let Some(new_cell) = location.to_cell(INDEX_RESOLUTION) else {
            return false;
        };
        if self.vehicle_to_cell.get(&vehicle) == Some(&new_cell) {
            return true;
        }
        self.insert(vehicle, location)
    }

    pub fn cell_of(&self, vehicle: VehicleId) -> Option<CellIndex> {
        self.vehicle_to_cell.get(&vehicle).copied()
    }

    /// Vehicles in cells that may lie within `radius_m` of `point`.
    /// Callers still filter by exact distance.
    pub fn vehicles_near(&self, point: GeoPoint, radius_m: f64) -> Vec<VehicleId> {
        let Some(origin) = point.to_cell(INDEX_RESOLUTION) else {
            return Vec::new();
        };
        let k = rings_for_radius(radius_m);
        if k > MAX_DISK_RINGS {
            return self.vehicle_to_cell.keys().copied().collect();
        }
        let cells = grid_disk_cached(origin, k);
        let mut result = Vec::new();
        for cell in &cells {
            if let Some(vehicles) = self.vehicles_by_cell.get(cell) {
                result.extend(vehicles.iter().copied());
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.vehicle_to_cell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicle_to_cell.is_empty()
    }
}
