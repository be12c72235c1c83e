//! Flux de features : schéma + passes d'itération redémarrables et fermables
//!
//! Chaque passe possède son curseur en exclusivité. [`FeaturePass`] garantit la
//! fermeture du curseur sur tous les chemins de sortie : fermeture explicite via
//! [`FeaturePass::close`] (l'erreur est remontée), sinon au `Drop` (l'erreur est
//! journalisée pour ne pas masquer une erreur déjà en cours).

pub mod memory;

pub use memory::MemoryFeatureStream;

use tracing::warn;

use crate::types::{Feature, Schema};
use crate::Result;

/// Curseur d'une passe d'itération
pub trait FeatureCursor {
    /// Feature suivante, `Ok(None)` en fin de passe
    fn next_feature(&mut self) -> Result<Option<Feature>>;

    /// Libère les ressources de la passe
    fn close(&mut self) -> Result<()>;
}

/// Collection de features consommable en plusieurs passes indépendantes
pub trait FeatureStream {
    fn schema(&self) -> &Schema;

    /// Ouvre un curseur brut ; préférer [`FeatureStream::features`]
    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>>;

    /// Ouvre une nouvelle passe, fermée automatiquement au plus tard au `Drop`
    fn features(&self) -> Result<FeaturePass<'_>> {
        Ok(FeaturePass::new(self.open()?))
    }
}

impl<S: FeatureStream + ?Sized> FeatureStream for Box<S> {
    fn schema(&self) -> &Schema {
        (**self).schema()
    }

    fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
        (**self).open()
    }
}

/// Passe d'itération à acquisition scopée
pub struct FeaturePass<'a> {
    cursor: Option<Box<dyn FeatureCursor + 'a>>,
}

impl<'a> FeaturePass<'a> {
    pub fn new(cursor: Box<dyn FeatureCursor + 'a>) -> Self {
        Self {
            cursor: Some(cursor),
        }
    }

    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    /// Ferme la passe et remonte l'éventuelle erreur de fermeture
    pub fn close(mut self) -> Result<()> {
        match self.cursor.take() {
            Some(mut cursor) => cursor.close(),
            None => Ok(()),
        }
    }

    /// Ferme la passe après un traitement
    ///
    /// Une erreur de traitement reste prioritaire : l'erreur de fermeture est
    /// alors seulement journalisée. Sinon l'erreur de fermeture est remontée.
    pub fn finish<T>(self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.close()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(close_err) = self.close() {
                    warn!(error = %close_err, "Failed to close feature pass after error");
                }
                Err(e)
            }
        }
    }
}

impl Iterator for FeaturePass<'_> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        cursor.next_feature().transpose()
    }
}

impl Drop for FeaturePass<'_> {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close() {
                warn!(error = %e, "Failed to close feature pass");
            }
        }
    }
}

/// Curseur décorateur appliquant une transformation à chaque feature tirée
///
/// La fermeture est déléguée au curseur amont.
pub struct MappedCursor<'a, F> {
    inner: Box<dyn FeatureCursor + 'a>,
    map: F,
}

impl<'a, F> MappedCursor<'a, F>
where
    F: FnMut(Feature) -> Result<Feature>,
{
    pub fn new(inner: Box<dyn FeatureCursor + 'a>, map: F) -> Self {
        Self { inner, map }
    }
}

impl<F> FeatureCursor for MappedCursor<'_, F>
where
    F: FnMut(Feature) -> Result<Feature>,
{
    fn next_feature(&mut self) -> Result<Option<Feature>> {
        match self.inner.next_feature()? {
            Some(feature) => (self.map)(feature).map(Some),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// Matérialise toutes les features d'une passe
pub fn collect_features<S: FeatureStream + ?Sized>(stream: &S) -> Result<Vec<Feature>> {
    let mut pass = stream.features()?;
    let result = pass.by_ref().collect::<Result<Vec<_>>>();
    pass.finish(result)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Flux instrumenté pour les tests : compte les ouvertures/fermetures et
    //! injecte des erreurs.

    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::PipelineError;

    #[derive(Debug, Default)]
    pub struct Counters {
        pub opened: Cell<usize>,
        pub closed: Cell<usize>,
        pub pulled: Cell<usize>,
    }

    pub struct InstrumentedStream {
        pub schema: Schema,
        pub features: Vec<Feature>,
        pub counters: Rc<Counters>,
        pub fail_close: bool,
        pub fail_at: Option<usize>,
    }

    impl InstrumentedStream {
        pub fn new(schema: Schema, features: Vec<Feature>) -> Self {
            Self {
                schema,
                features,
                counters: Rc::new(Counters::default()),
                fail_close: false,
                fail_at: None,
            }
        }
    }

    struct InstrumentedCursor<'a> {
        stream: &'a InstrumentedStream,
        position: usize,
    }

    impl FeatureCursor for InstrumentedCursor<'_> {
        fn next_feature(&mut self) -> Result<Option<Feature>> {
            if self.stream.fail_at == Some(self.position) {
                return Err(PipelineError::cursor("read failure"));
            }
            let feature = self.stream.features.get(self.position).cloned();
            if feature.is_some() {
                self.position += 1;
                let counters = &self.stream.counters;
                counters.pulled.set(counters.pulled.get() + 1);
            }
            Ok(feature)
        }

        fn close(&mut self) -> Result<()> {
            let counters = &self.stream.counters;
            counters.closed.set(counters.closed.get() + 1);
            if self.stream.fail_close {
                Err(PipelineError::cursor("close failure"))
            } else {
                Ok(())
            }
        }
    }

    impl FeatureStream for InstrumentedStream {
        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn open(&self) -> Result<Box<dyn FeatureCursor + '_>> {
            self.counters.opened.set(self.counters.opened.get() + 1);
            Ok(Box::new(InstrumentedCursor {
                stream: self,
                position: 0,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::InstrumentedStream;
    use super::*;
    use crate::types::{AttributeDescriptor, Value, ValueType};

    fn stream(n: usize) -> InstrumentedStream {
        let schema = Schema::new(
            "numbers",
            vec![AttributeDescriptor::new("n", ValueType::Integer)],
            None,
        )
        .unwrap();
        let features = (0..n as i64)
            .map(|i| Feature::new(Some(i.to_string()), vec![Value::Integer(i)]))
            .collect();
        InstrumentedStream::new(schema, features)
    }

    #[test]
    fn test_pass_closed_on_drop() {
        let s = stream(3);
        {
            let mut pass = s.features().unwrap();
            assert!(pass.next().is_some());
        }
        assert_eq!(s.counters.closed.get(), 1);
    }

    #[test]
    fn test_explicit_close_reports_error() {
        let mut s = stream(1);
        s.fail_close = true;
        let pass = s.features().unwrap();
        assert!(pass.close().is_err());
        assert_eq!(s.counters.closed.get(), 1);
    }

    #[test]
    fn test_finish_keeps_primary_error() {
        let mut s = stream(2);
        s.fail_close = true;
        s.fail_at = Some(1);

        let err = collect_features(&s).unwrap_err();
        assert!(err.to_string().contains("read failure"));
        assert_eq!(s.counters.closed.get(), 1);
    }

    #[test]
    fn test_restartable() {
        let s = stream(4);
        assert_eq!(collect_features(&s).unwrap().len(), 4);
        assert_eq!(collect_features(&s).unwrap().len(), 4);
        assert_eq!(s.counters.opened.get(), 2);
        assert_eq!(s.counters.closed.get(), 2);
    }

    #[test]
    fn test_boxed_stream() {
        let boxed: Box<dyn FeatureStream> = Box::new(stream(2));
        assert_eq!(boxed.schema().len(), 1);
        assert_eq!(collect_features(&boxed).unwrap().len(), 2);
    }
}
