#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Every tunable constant used by the batch passes and the turn planner. The defaults were tuned
/// by eye on real sites.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub markers: MarkerConfig,
    pub polygons: PolygonConfig,
    pub planner: PlannerConfig,
}

#[cfg(feature = "serde")]
impl Config {
    /// Parse a (possibly partial) JSON document. Missing fields keep their defaults.
    pub fn from_json(input: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(input)?)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MarkerConfig {
    /// Corners farther than this from every intersection or location aren't candidates.
    pub proximity_threshold_m: f64,
    /// Tried in order; the first tolerance that yields 4 corners wins.
    pub angle_tolerance_ladder: Vec<f64>,
    /// Neighbor geometry is widened by this much before measuring how much of an edge overlaps it.
    pub overlap_tolerance_m: f64,
    /// Corners closer than this are treated as the same position.
    pub dedup_precision_m: f64,
    /// When the arc-length midpoint of the primary edge misses the overlapping stretch, move the
    /// side-center to the middle of that stretch instead.
    pub snap_to_overlap: bool,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_m: 5.0,
            angle_tolerance_ladder: vec![3.0, 5.0, 10.0, 15.0],
            overlap_tolerance_m: 1.0,
            dedup_precision_m: 0.01,
            snap_to_overlap: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PolygonConfig {
    pub nearby_distance_m: f64,
    /// How much centerline to keep on each side of the projected intersection center
    pub slice_half_length_m: f64,
    pub default_road_width_m: f64,
    /// Road widths are multiplied by this before buffering slices
    pub width_factor: f64,
    /// The union is grown outward by this fraction of the widest contributing road
    pub expansion_factor: f64,
    pub blunt_angle_degrees: f64,
    /// Only corners this close to the intersection center get rounded
    pub rounding_radius_m: f64,
    pub fillet_disk_radius_m: f64,
    pub fillet_radius_m: f64,
    /// Road headings within this many degrees (folded to 0-180) count as one axis
    pub axis_tolerance_degrees: f64,
    pub miter_threshold_m: f64,
    pub branches: BranchConfig,
}

impl Default for PolygonConfig {
    fn default() -> Self {
        Self {
            nearby_distance_m: 30.0,
            slice_half_length_m: 25.0,
            default_road_width_m: 10.0,
            width_factor: 1.1,
            expansion_factor: 0.05,
            blunt_angle_degrees: 150.0,
            rounding_radius_m: 25.0,
            fillet_disk_radius_m: 10.0,
            fillet_radius_m: 6.0,
            axis_tolerance_degrees: 15.0,
            miter_threshold_m: 10.0,
            branches: BranchConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BranchConfig {
    pub enabled: bool,
    pub ray_count: usize,
    pub ray_length_m: f64,
    /// Local maxima of the hit-distance profile must exceed this percentile (0 to 1)
    pub percentile: f64,
    pub min_branch_separation_degrees: f64,
    pub corner_snap_distance_m: f64,
    pub corner_snap_angle_tolerance_degrees: f64,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ray_count: 360,
            ray_length_m: 200.0,
            percentile: 0.6,
            min_branch_separation_degrees: 30.0,
            corner_snap_distance_m: 5.0,
            corner_snap_angle_tolerance_degrees: 15.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlannerConfig {
    pub iteration_cap: usize,
    pub bezier_samples: usize,
    pub dubins_step_m: f64,
    /// Control arms are never shorter than this times the minimum turning radius
    pub min_control_radius_factor: f64,
    /// Each adjustment moves a control point this fraction of the way to the centroid...
    pub pull_fraction: f64,
    /// ... but never more than this many meters
    pub max_pull_step_m: f64,
    pub leak_tolerance_floor_sqm: f64,
    pub leak_tolerance_width_factor: f64,
    pub strict_tolerance_sqm: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            iteration_cap: 8,
            bezier_samples: 50,
            dubins_step_m: 1.0,
            min_control_radius_factor: 0.5,
            pull_fraction: 0.25,
            max_pull_step_m: 5.0,
            leak_tolerance_floor_sqm: 25.0,
            leak_tolerance_width_factor: 1.2,
            strict_tolerance_sqm: 0.1,
        }
    }
}

impl PlannerConfig {
    /// The leaked area a vehicle of this width may have outside the intersection and still be
    /// acceptable.
    pub fn leak_tolerance(&self, vehicle_width_m: f64) -> f64 {
        self.leak_tolerance_floor_sqm
            .max(self.leak_tolerance_width_factor * vehicle_width_m * vehicle_width_m)
    }
}
