mod batch;
mod bezier;
mod buffer_linestring;
mod config;
mod corners;
mod dubins;
mod intersection_polygon;
mod network;
mod planner;
mod projection;
mod ring;
mod store;
mod vehicle;

pub use self::batch::{run_marker_pass, run_polygon_pass, BatchSummary};
pub use self::bezier::{bezier_point, sample_bezier};
pub use self::buffer_linestring::buffer_linestring;
pub use self::config::{BranchConfig, Config, MarkerConfig, PlannerConfig, PolygonConfig};
pub use self::corners::{
    extract_all_markers, extract_markers, CornerMarker, CornerSelection, DegradedReason,
    MarkerQuality, NeighborIndex, RoadMarkers, SideCenterMarker, SideCenterSource, SideRole,
};
pub use self::dubins::{dubins_path, pose_along, sample_dubins, DubinsPath, DubinsWord, Pose};
pub use self::intersection_polygon::{
    build_intersection_polygon, build_intersection_polygons, extract_branches, BranchCenter,
    IntersectionPolygon, PolygonOutcome, RejectReason,
};
pub use self::network::{
    EntityRef, Intersection, IntersectionID, Location, LocationID, Neighbor, Road, RoadGeometry,
    RoadID, RoadNetwork,
};
pub use self::planner::{
    estimate_heading, plan_turn, ClearanceReport, PlanOutcome, ReferencePath, SmoothCurve,
    TurnPath, TurnPlanner, TurnRequest, TurnStatus,
};
pub use self::projection::{reproject_geometry, Projection, Reproject};
pub use self::store::{Datastore, MarkerID, MemoryStore};
pub use self::vehicle::{VehicleProfile, VehicleProfiles, VehicleRegistry};
