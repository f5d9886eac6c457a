use anyhow::{bail, Result};
use geo::{Coord, CoordsIter, MapCoordsInPlace};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Converts between WGS84 lon/lat and a local metric plane. Every geometric operation in this
/// crate happens in one such plane per unit of work.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    /// Transverse Mercator in one UTM zone
    Utm { zone: u8, north: bool },
    /// The input is already planar and in meters
    Identity,
}

/// Anything holding coordinates that need to move between frames.
pub trait Reproject {
    fn reproject(&mut self, f: &dyn Fn(Coord) -> Coord);
}

/// Apply `f` to every coordinate of a `geo` geometry.
pub fn reproject_geometry<G: MapCoordsInPlace<f64>>(geometry: &mut G, f: &dyn Fn(Coord) -> Coord) {
    geometry.map_coords_in_place(|c| f(c));
}

impl Projection {
    /// Pick the UTM zone containing a lon/lat point.
    pub fn utm_for(lon: f64, lat: f64) -> Result<Self> {
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            bail!("({lon}, {lat}) isn't a WGS84 coordinate");
        }
        let zone = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
        Ok(Projection::Utm {
            zone,
            north: lat >= 0.0,
        })
    }

    /// Pick the plane from the mean coordinate of some geographic input.
    pub fn from_geometry<G: CoordsIter<Scalar = f64>>(geometry: &G) -> Result<Self> {
        let mut sum = Coord { x: 0.0, y: 0.0 };
        let mut count = 0;
        for c in geometry.coords_iter() {
            sum = sum + c;
            count += 1;
        }
        if count == 0 {
            bail!("can't choose a projection for empty geometry");
        }
        Self::utm_for(sum.x / count as f64, sum.y / count as f64)
    }

    pub fn to_local(&self, pt: Coord) -> Coord {
        match self {
            Projection::Utm { zone, north } => utm_forward(*zone, *north, pt),
            Projection::Identity => pt,
        }
    }

    pub fn to_wgs84(&self, pt: Coord) -> Coord {
        match self {
            Projection::Utm { zone, north } => utm_inverse(*zone, *north, pt),
            Projection::Identity => pt,
        }
    }

    pub fn to_local_in_place<R: Reproject + ?Sized>(&self, item: &mut R) {
        if *self != Projection::Identity {
            item.reproject(&|c| self.to_local(c));
        }
    }

    pub fn to_wgs84_in_place<R: Reproject + ?Sized>(&self, item: &mut R) {
        if *self != Projection::Identity {
            item.reproject(&|c| self.to_wgs84(c));
        }
    }
}

struct Series {
    n: f64,
    big_a: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

fn series() -> Series {
    let n = WGS84_F / (2.0 - WGS84_F);
    let n2 = n * n;
    let n3 = n2 * n;
    Series {
        n,
        big_a: WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
        alpha: [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
            61.0 * n3 / 240.0,
        ],
        beta: [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
            n2 / 48.0 + n3 / 15.0,
            17.0 * n3 / 480.0,
        ],
        delta: [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
            56.0 * n3 / 15.0,
        ],
    }
}

fn central_meridian(zone: u8) -> f64 {
    (f64::from(zone) - 1.0) * 6.0 - 180.0 + 3.0
}

fn utm_forward(zone: u8, north: bool, pt: Coord) -> Coord {
    let s = series();
    let lat = pt.y.to_radians();
    let dlon = (pt.x - central_meridian(zone)).to_radians();

    let k = 2.0 * s.n.sqrt() / (1.0 + s.n);
    let t = (lat.sin().atanh() - k * (k * lat.sin()).atanh()).sinh();
    let xi_prime = t.atan2(dlon.cos());
    let eta_prime = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

    let mut xi = xi_prime;
    let mut eta = eta_prime;
    for (j, alpha) in s.alpha.iter().enumerate() {
        let j2 = 2.0 * (j as f64 + 1.0);
        xi += alpha * (j2 * xi_prime).sin() * (j2 * eta_prime).cosh();
        eta += alpha * (j2 * xi_prime).cos() * (j2 * eta_prime).sinh();
    }

    let false_northing = if north { 0.0 } else { FALSE_NORTHING_SOUTH };
    Coord {
        x: FALSE_EASTING + K0 * s.big_a * eta,
        y: false_northing + K0 * s.big_a * xi,
    }
}

fn utm_inverse(zone: u8, north: bool, pt: Coord) -> Coord {
    let s = series();
    let false_northing = if north { 0.0 } else { FALSE_NORTHING_SOUTH };
    let xi = (pt.y - false_northing) / (K0 * s.big_a);
    let eta = (pt.x - FALSE_EASTING) / (K0 * s.big_a);

    let mut xi_prime = xi;
    let mut eta_prime = eta;
    for (j, beta) in s.beta.iter().enumerate() {
        let j2 = 2.0 * (j as f64 + 1.0);
        xi_prime -= beta * (j2 * xi).sin() * (j2 * eta).cosh();
        eta_prime -= beta * (j2 * xi).cos() * (j2 * eta).sinh();
    }

    let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
    let mut lat = chi;
    for (j, delta) in s.delta.iter().enumerate() {
        let j2 = 2.0 * (j as f64 + 1.0);
        lat += delta * (j2 * chi).sin();
    }
    let dlon = eta_prime.sinh().atan2(xi_prime.cos());

    Coord {
        x: central_meridian(zone) + dlon.to_degrees(),
        y: lat.to_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, point};

    #[test]
    fn test_zone_choice() {
        assert_eq!(
            Projection::utm_for(116.4, -22.7).unwrap(),
            Projection::Utm {
                zone: 50,
                north: false
            }
        );
        assert_eq!(
            Projection::from_geometry(&point!(x: -0.1, y: 51.5)).unwrap(),
            Projection::Utm {
                zone: 30,
                north: true
            }
        );
        assert!(Projection::utm_for(200.0, 0.0).is_err());
    }

    #[test]
    fn test_central_meridian_on_equator() {
        let proj = Projection::Utm {
            zone: 31,
            north: true,
        };
        let pt = proj.to_local(coord! { x: 3.0, y: 0.0 });
        assert!((pt.x - 500_000.0).abs() < 1e-6);
        assert!(pt.y.abs() < 1e-6);
    }

    #[test]
    fn test_round_trip() {
        let proj = Projection::utm_for(118.6, -23.4).unwrap();
        for (lon, lat) in [(118.6, -23.4), (119.9, -23.0), (117.1, -22.1)] {
            let local = proj.to_local(coord! { x: lon, y: lat });
            let back = proj.to_wgs84(local);
            assert!((back.x - lon).abs() < 1e-8, "{back:?}");
            assert!((back.y - lat).abs() < 1e-8, "{back:?}");
        }
    }

    #[test]
    fn test_distances_are_metric() {
        // 0.001 degrees of latitude is about 110.6 m
        let proj = Projection::utm_for(118.6, -23.4).unwrap();
        let a = proj.to_local(coord! { x: 118.6, y: -23.400 });
        let b = proj.to_local(coord! { x: 118.6, y: -23.401 });
        let dist = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
        assert!((dist - 110.6).abs() < 1.0, "{dist}");
    }
}
