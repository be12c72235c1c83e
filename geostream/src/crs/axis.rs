//! Correction de l'ordre des axes (longitude-latitude canonique)
//!
//! Pas de reprojection générale ici : l'échange x/y est une transformation pure
//! des coordonnées, sans changement de datum.

use geo::{Coord, Geometry, MapCoordsInPlace};
use tracing::{debug, info, warn};

use super::{Crs, CrsProvider};
use crate::stream::{FeatureCursor, FeatureStream, MappedCursor};
use crate::types::{Feature, Schema, Value};
use crate::Result;

/// Échange x et y de toutes les coordonnées, dans toutes les parties
pub fn swap_axes(geometry: &mut Geometry) {
    geometry.map_coords_in_place(|Coord { x, y }| Coord { x: y, y: x });
}

/// Décorateur qui impose un CRS au schéma sans toucher aux coordonnées
pub struct ForceCrs<S> {
    inner: S,
    schema: Schema,
}

impl<S: FeatureStream> ForceCrs<S> {
    pub fn new(inner: S, crs: &Crs) -> Self {
        let schema = inner.schema().force_crs(crs);
        Self { inner, schema }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: FeatureStream> FeatureStream for ForceCrs<S> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
        self.inner.open()
    }
}

/// Décorateur qui échange les axes de chaque feature tirée
///
/// Le schéma republie le CRS canonique. Toute géométrie est lue dans le CRS
/// source et échangée, sauf celles déjà annotées avec le CRS canonique. Une
/// annotation conservée est réécrite vers le CRS canonique.
pub struct AxisSwap<S> {
    inner: S,
    schema: Schema,
    source: Crs,
    target: Crs,
}

impl<S: FeatureStream> AxisSwap<S> {
    pub fn new(inner: S, source: Crs, target: Crs) -> Self {
        let schema = inner.schema().force_crs(&target);
        Self {
            inner,
            schema,
            source,
            target,
        }
    }

    pub fn source(&self) -> &Crs {
        &self.source
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    fn swap_feature(&self, mut feature: Feature) -> Feature {
        for value in &mut feature.values {
            let Value::Geometry(geom) = value else {
                continue;
            };

            match &geom.crs {
                Some(crs) if crs.equals_ignore_metadata(&self.target) => {}
                annotation => {
                    if let Some(crs) = annotation {
                        if !crs.equals_ignore_metadata(&self.source) {
                            debug!(
                                feature = %feature.id.as_deref().unwrap_or("<no id>"),
                                crs = %crs,
                                "Geometry in foreign CRS read as source CRS"
                            );
                        }
                    }
                    let annotated = annotation.is_some();
                    swap_axes(&mut geom.geometry);
                    if annotated {
                        geom.crs = Some(self.target.clone());
                    }
                }
            }
        }
        feature
    }
}

impl<S: FeatureStream> FeatureStream for AxisSwap<S> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
        let cursor = self.inner.open()?;
        Ok(Box::new(MappedCursor::new(cursor, move |feature| {
            Ok(self.swap_feature(feature))
        })))
    }
}

/// Aligne un flux sur la variante longitude-latitude de son CRS
///
/// - sans CRS : flux inchangé ;
/// - schéma sans CRS natif : le CRS est imposé (coordonnées intactes) ;
/// - code introuvable ou variante canonique indécodable : on s'arrête là ;
/// - variante canonique différente : échange paresseux des axes.
pub fn correct_axis_order<'a, S, P>(
    stream: S,
    crs: Option<&Crs>,
    provider: &P,
) -> Box<dyn FeatureStream + 'a>
where
    S: FeatureStream + 'a,
    P: CrsProvider + ?Sized,
{
    let Some(crs) = crs else {
        return Box::new(stream);
    };

    let stream: Box<dyn FeatureStream + 'a> = if stream.schema().crs().is_none() {
        debug!(crs = %crs, "Forcing CRS onto collection");
        Box::new(ForceCrs::new(stream, crs))
    } else {
        Box::new(stream)
    };

    let Some(code) = provider.lookup_code(crs) else {
        debug!(crs = %crs, "No registry code for CRS, axis order left as is");
        return stream;
    };

    let canonical = match provider.decode(crs.authority(), code, true) {
        Ok(canonical) => canonical,
        Err(e) => {
            warn!(crs = %crs, error = %e, "Cannot build longitude-first CRS, axis order left as is");
            return stream;
        }
    };

    if provider.equals_ignore_metadata(crs, &canonical) {
        return stream;
    }

    info!(from = %crs, to = %canonical, "Swapping axis order");
    Box::new(AxisSwap::new(stream, crs.clone(), canonical))
}
