use std::collections::BTreeMap;

use anyhow::Result;
use geo::{Centroid, Coord, Geometry, LineString, Point, Polygon};
use log::info;

use crate::projection::{reproject_geometry, Projection, Reproject};
use crate::ring::distance_to_polyline;
use crate::store::Datastore;

/// Every road, intersection, and location for one unit of work, all in one planar frame
pub struct RoadNetwork {
    pub roads: BTreeMap<RoadID, Road>,
    pub intersections: BTreeMap<IntersectionID, Intersection>,
    pub locations: BTreeMap<LocationID, Location>,
    /// How the stored geometry was brought into this frame
    pub projection: Projection,
}

// These come from the datastore and don't represent array indices
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct RoadID(pub usize);
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct IntersectionID(pub usize);
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct LocationID(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum RoadGeometry {
    Centerline(LineString),
    /// The closed outline of the road surface
    Footprint(Polygon),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Road {
    pub id: RoadID,
    pub name: Option<String>,
    pub geometry: RoadGeometry,
    pub width: Option<f64>,
    pub declared_length: Option<f64>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
}

impl Road {
    pub fn new(id: RoadID, geometry: RoadGeometry) -> Self {
        Self {
            id,
            name: None,
            geometry,
            width: None,
            declared_length: None,
            from_location: None,
            to_location: None,
        }
    }

    pub fn centerline(&self) -> Option<&LineString> {
        match self.geometry {
            RoadGeometry::Centerline(ref ls) => Some(ls),
            RoadGeometry::Footprint(_) => None,
        }
    }

    pub fn footprint(&self) -> Option<&Polygon> {
        match self.geometry {
            RoadGeometry::Footprint(ref poly) => Some(poly),
            RoadGeometry::Centerline(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    pub id: IntersectionID,
    pub name: String,
    pub center: Point,
    /// Empty when the datastore doesn't declare them; nearby roads are found by proximity then
    pub connected_roads: Vec<RoadID>,
    /// Starts as a coarse placeholder and gets replaced by the computed polygon
    pub geometry: Option<Polygon>,
}

impl Intersection {
    /// Use the placeholder polygon's centroid as the approximate center.
    pub fn from_placeholder(
        id: IntersectionID,
        name: String,
        placeholder: Polygon,
    ) -> Option<Self> {
        let center = placeholder.centroid()?;
        Some(Self {
            id,
            name,
            center,
            connected_roads: Vec::new(),
            geometry: Some(placeholder),
        })
    }
}

/// A named place on the site, like a dump, stockpile, or crusher
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub id: LocationID,
    pub name: String,
    pub geometry: Geometry,
}

/// Identifies a non-road entity that a road corner can be close to
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityRef {
    Intersection(IntersectionID, String),
    Location(LocationID, String),
}

impl EntityRef {
    pub fn name(&self) -> &str {
        match self {
            EntityRef::Intersection(_, name) | EntityRef::Location(_, name) => name,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Neighbor {
    pub entity: EntityRef,
    pub geometry: Geometry,
}

impl RoadNetwork {
    /// Read everything from the datastore. Geographic stores get projected into the UTM zone of the
    /// first road (or intersection, if there are no roads).
    pub fn load<S: Datastore + ?Sized>(store: &S) -> Result<Self> {
        let roads = store.roads()?;
        let intersections = store.intersections()?;
        let locations = store.locations()?;
        info!(
            "Loaded {} roads, {} intersections, {} locations",
            roads.len(),
            intersections.len(),
            locations.len()
        );

        let first: Option<Geometry> = if let Some(road) = roads.first() {
            Some(match road.geometry {
                RoadGeometry::Centerline(ref ls) => ls.clone().into(),
                RoadGeometry::Footprint(ref poly) => poly.clone().into(),
            })
        } else {
            intersections.first().map(|i| i.center.into())
        };
        let projection = match first {
            Some(geometry) if store.is_geographic() => Projection::from_geometry(&geometry)?,
            _ => Projection::Identity,
        };

        let mut network = Self::from_planar(roads, intersections, locations);
        network.projection = projection;
        for r in network.roads.values_mut() {
            projection.to_local_in_place(r);
        }
        for i in network.intersections.values_mut() {
            projection.to_local_in_place(i);
        }
        for l in network.locations.values_mut() {
            projection.to_local_in_place(l);
        }
        Ok(network)
    }

    /// Build from records that are already planar.
    pub fn from_planar(
        roads: Vec<Road>,
        intersections: Vec<Intersection>,
        locations: Vec<Location>,
    ) -> Self {
        Self {
            roads: roads.into_iter().map(|r| (r.id, r)).collect(),
            intersections: intersections.into_iter().map(|i| (i.id, i)).collect(),
            locations: locations.into_iter().map(|l| (l.id, l)).collect(),
            projection: Projection::Identity,
        }
    }

    /// Every intersection and location, as candidates for a road's corners to be near.
    /// Intersections use their polygon when one exists, otherwise their center.
    pub fn neighbors(&self) -> Vec<Neighbor> {
        let mut result = Vec::new();
        for i in self.intersections.values() {
            result.push(Neighbor {
                entity: EntityRef::Intersection(i.id, i.name.clone()),
                geometry: match i.geometry {
                    Some(ref poly) => poly.clone().into(),
                    None => i.center.into(),
                },
            });
        }
        for l in self.locations.values() {
            result.push(Neighbor {
                entity: EntityRef::Location(l.id, l.name.clone()),
                geometry: l.geometry.clone(),
            });
        }
        result
    }

    /// Roads with a centerline passing within `max_dist` of a point
    pub fn roads_near(&self, pt: Coord, max_dist: f64) -> Vec<&Road> {
        self.roads
            .values()
            .filter(|r| {
                r.centerline()
                    .map(|ls| distance_to_polyline(&ls.0, pt) <= max_dist)
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl Reproject for Road {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord) {
        match self.geometry {
            RoadGeometry::Centerline(ref mut ls) => reproject_geometry(ls, f),
            RoadGeometry::Footprint(ref mut poly) => reproject_geometry(poly, f),
        }
    }
}

impl Reproject for Intersection {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord) {
        reproject_geometry(&mut self.center, f);
        if let Some(ref mut poly) = self.geometry {
            reproject_geometry(poly, f);
        }
    }
}

impl Reproject for Location {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord) {
        reproject_geometry(&mut self.geometry, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, line_string, point, polygon};

    fn network() -> RoadNetwork {
        let mut haul = Road::new(
            RoadID(1),
            RoadGeometry::Centerline(line_string![(x: 0., y: 0.), (x: 100., y: 0.)]),
        );
        haul.width = Some(12.0);
        let spur = Road::new(
            RoadID(2),
            RoadGeometry::Centerline(line_string![(x: 0., y: 50.), (x: 100., y: 50.)]),
        );
        let intersection = Intersection::from_placeholder(
            IntersectionID(7),
            "north junction".to_string(),
            polygon![(x: 40., y: -10.), (x: 60., y: -10.), (x: 60., y: 10.), (x: 40., y: 10.)],
        )
        .unwrap();
        let dump = Location {
            id: LocationID(3),
            name: "waste dump".to_string(),
            geometry: point!(x: 200., y: 0.).into(),
        };
        RoadNetwork::from_planar(vec![haul, spur], vec![intersection], vec![dump])
    }

    #[test]
    fn test_roads_near() {
        let network = network();
        let near: Vec<RoadID> = network
            .roads_near(coord! { x: 50., y: 5. }, 10.0)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(near, vec![RoadID(1)]);
    }

    #[test]
    fn test_neighbors_and_lookup() {
        let network = network();
        let neighbors = network.neighbors();
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].entity.name(), "north junction");
        assert!(matches!(neighbors[0].geometry, Geometry::Polygon(_)));

        let i = &network.intersections[&IntersectionID(7)];
        assert_eq!(i.name, "north junction");
        assert_eq!(i.center, point!(x: 50., y: 0.));
    }
}
