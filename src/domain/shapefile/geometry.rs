//! Conversion of shapefile shapes into GeoJSON geometry objects.
//!
//! The GeoJSON text is handed to PostGIS (`ST_GeomFromGeoJSON`) on insert, so only
//! geometry objects are produced here, never features.

use serde_json::{json, Value as JsonValue};
use shapefile::{Point, PointM, PointZ, PolygonRing, Shape};

trait Position {
    fn position(&self) -> JsonValue;
}

impl Position for Point {
    fn position(&self) -> JsonValue {
        json!([self.x, self.y])
    }
}

impl Position for PointM {
    fn position(&self) -> JsonValue {
        json!([self.x, self.y])
    }
}

impl Position for PointZ {
    fn position(&self) -> JsonValue {
        json!([self.x, self.y, self.z])
    }
}

fn line<P: Position>(points: &[P]) -> JsonValue {
    JsonValue::Array(points.iter().map(Position::position).collect())
}

fn multi_point<P: Position>(points: &[P]) -> JsonValue {
    json!({ "type": "MultiPoint", "coordinates": line(points) })
}

fn polyline<P: Position>(parts: &[Vec<P>]) -> JsonValue {
    match parts {
        [single] => json!({ "type": "LineString", "coordinates": line(single) }),
        _ => json!({
            "type": "MultiLineString",
            "coordinates": parts.iter().map(|p| line(p)).collect::<Vec<_>>(),
        }),
    }
}

/// Groups rings into polygons: every outer ring opens a polygon and the inner rings
/// that follow it are its holes.
fn polygon<P: Position>(rings: &[PolygonRing<P>]) -> JsonValue {
    let mut polygons: Vec<Vec<JsonValue>> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push(vec![line(points)]),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some(current) => current.push(line(points)),
                None => polygons.push(vec![line(points)]),
            },
        }
    }

    if polygons.len() == 1 {
        json!({ "type": "Polygon", "coordinates": polygons.remove(0) })
    } else {
        json!({ "type": "MultiPolygon", "coordinates": polygons })
    }
}

/// Converts a shape into a GeoJSON geometry. Null shapes yield `None`.
pub fn shape_to_geojson(shape: &Shape) -> crate::Result<Option<JsonValue>> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => json!({ "type": "Point", "coordinates": p.position() }),
        Shape::PointM(p) => json!({ "type": "Point", "coordinates": p.position() }),
        Shape::PointZ(p) => json!({ "type": "Point", "coordinates": p.position() }),
        Shape::Multipoint(mp) => multi_point(mp.points()),
        Shape::MultipointM(mp) => multi_point(mp.points()),
        Shape::MultipointZ(mp) => multi_point(mp.points()),
        Shape::Polyline(pl) => polyline(pl.parts()),
        Shape::PolylineM(pl) => polyline(pl.parts()),
        Shape::PolylineZ(pl) => polyline(pl.parts()),
        Shape::Polygon(pg) => polygon(pg.rings()),
        Shape::PolygonM(pg) => polygon(pg.rings()),
        Shape::PolygonZ(pg) => polygon(pg.rings()),
        other => {
            return Err(crate::Error::Decode(format!(
                "unsupported shape type {:?}",
                other.shapetype()
            )))
        }
    };
    Ok(Some(geometry))
}
