//! Moteur géométrique basé sur `geo`

use geo::{unary_union, BooleanOps, Geometry, HasDimensions, MultiPolygon, Polygon, Validation};

use super::GeometryEngine;

/// Validité OGC et buffer nul via `geo`
///
/// Le buffer de distance nulle est calculé par polygone : enveloppe extérieure
/// dissoute moins l'union des trous, puis union des résultats. Un trou hors de
/// son enveloppe ne retire rien. Les parties linéaires ou ponctuelles ont un
/// buffer nul vide.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

impl GeometryEngine for GeoEngine {
    fn is_valid(&self, geometry: &Geometry) -> bool {
        geometry.is_valid()
    }

    fn buffer_zero(&self, geometry: &Geometry) -> Option<Geometry> {
        let mut polygons = Vec::new();
        collect_polygons(geometry, &mut polygons);
        if polygons.is_empty() {
            return None;
        }

        let pieces: Vec<MultiPolygon> = polygons.iter().map(subtract_holes).collect();
        let dissolved: MultiPolygon = unary_union(&pieces);
        let mut parts: Vec<Polygon> = dissolved.0.into_iter().filter(|p| !p.is_empty()).collect();

        match parts.len() {
            0 => None,
            1 => parts.pop().map(Geometry::Polygon),
            _ => Some(Geometry::MultiPolygon(MultiPolygon::new(parts))),
        }
    }
}

fn subtract_holes(polygon: &Polygon) -> MultiPolygon {
    let shell = Polygon::new(polygon.exterior().clone(), vec![]);
    if polygon.interiors().is_empty() {
        return unary_union([&shell]);
    }

    let holes: Vec<Polygon> = polygon
        .interiors()
        .iter()
        .map(|ring| Polygon::new(ring.clone(), vec![]))
        .collect();
    shell.difference(&unary_union(&holes))
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<Polygon>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                collect_polygons(g, out);
            }
        }
        Geometry::Point(_)
        | Geometry::Line(_)
        | Geometry::LineString(_)
        | Geometry::MultiPoint(_)
        | Geometry::MultiLineString(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, Area, Contains};

    fn bowtie() -> Geometry {
        Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ])
    }

    #[test]
    fn test_valid_square() {
        let square = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]);
        assert!(GeoEngine.is_valid(&square));
    }

    #[test]
    fn test_bowtie_repaired() {
        let engine = GeoEngine;
        let geom = bowtie();
        assert!(!engine.is_valid(&geom));

        let repaired = engine.buffer_zero(&geom).expect("repair should produce polygons");
        assert!(engine.is_valid(&repaired));
        assert!(!repaired.is_empty());
    }

    #[test]
    fn test_lines_have_empty_buffer() {
        let line = Geometry::LineString(line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 1.0)]);
        assert!(GeoEngine.buffer_zero(&line).is_none());
        assert!(GeoEngine
            .buffer_zero(&Geometry::Point(point!(x: 0.0, y: 0.0)))
            .is_none());
    }

    fn square_with_hole(hole: [(f64, f64); 2]) -> Geometry {
        let [(x0, y0), (x1, y1)] = hole;
        Geometry::Polygon(polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 4.0, y: 0.0),
                (x: 4.0, y: 4.0),
                (x: 0.0, y: 4.0),
                (x: 0.0, y: 0.0),
            ],
            interiors: [[
                (x: x0, y: y0),
                (x: x1, y: y0),
                (x: x1, y: y1),
                (x: x0, y: y1),
                (x: x0, y: y0),
            ]],
        ))
    }

    #[test]
    fn test_hole_outside_shell_removed() {
        let engine = GeoEngine;
        let geom = square_with_hole([(10.0, 10.0), (12.0, 12.0)]);
        assert!(!engine.is_valid(&geom));

        let repaired = engine.buffer_zero(&geom).unwrap();
        assert!(engine.is_valid(&repaired));
        assert!(matches!(repaired, Geometry::Polygon(_)));
        assert!((repaired.unsigned_area() - 16.0).abs() < 1e-9);
        assert!(!repaired.contains(&point!(x: 11.0, y: 11.0)));
    }

    #[test]
    fn test_hole_crossing_shell_subtracted() {
        let engine = GeoEngine;
        let geom = square_with_hole([(3.0, 1.0), (6.0, 3.0)]);
        assert!(!engine.is_valid(&geom));

        let repaired = engine.buffer_zero(&geom).unwrap();
        assert!(engine.is_valid(&repaired));
        assert!((repaired.unsigned_area() - 14.0).abs() < 1e-9);
        assert!(!repaired.contains(&point!(x: 3.5, y: 2.0)));
        assert!(!repaired.contains(&point!(x: 5.0, y: 2.0)));
    }

    #[test]
    fn test_self_intersecting_shell_keeps_hole() {
        let engine = GeoEngine;
        // deux triangles de 9 qui se touchent en (3, 3), trou de 1 dans celui de droite
        let geom = Geometry::Polygon(polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 6.0, y: 6.0),
                (x: 6.0, y: 0.0),
                (x: 0.0, y: 6.0),
                (x: 0.0, y: 0.0),
            ],
            interiors: [[
                (x: 4.5, y: 2.5),
                (x: 5.5, y: 2.5),
                (x: 5.5, y: 3.5),
                (x: 4.5, y: 3.5),
                (x: 4.5, y: 2.5),
            ]],
        ));
        assert!(!engine.is_valid(&geom));

        let repaired = engine.buffer_zero(&geom).unwrap();
        assert!(engine.is_valid(&repaired));
        assert!((repaired.unsigned_area() - 17.0).abs() < 1e-9);
        assert!(!repaired.contains(&point!(x: 5.0, y: 3.0)));
        assert!(repaired.contains(&point!(x: 5.8, y: 3.0)));
    }

    #[test]
    fn test_island_inside_other_hole_kept() {
        let engine = GeoEngine;
        let island = polygon![
            (x: 1.5, y: 1.5),
            (x: 2.5, y: 1.5),
            (x: 2.5, y: 2.5),
            (x: 1.5, y: 2.5),
            (x: 1.5, y: 1.5),
        ];
        let Geometry::Polygon(holed) = square_with_hole([(1.0, 1.0), (3.0, 3.0)]) else {
            unreachable!()
        };
        let geom = Geometry::MultiPolygon(MultiPolygon::new(vec![holed, island]));

        let repaired = engine.buffer_zero(&geom).unwrap();
        assert!(engine.is_valid(&repaired));
        assert!((repaired.unsigned_area() - 13.0).abs() < 1e-9);
        assert!(repaired.contains(&point!(x: 2.0, y: 2.0)));
    }
}
