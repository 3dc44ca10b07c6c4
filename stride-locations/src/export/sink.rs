//! Destinations de sortie des features
//!
//! Une destination est ouverte par un [`SinkProvider`] avec le schéma, le type
//! de géométrie et le CRS déclaré, puis reçoit les enregistrements un par un.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use stride::{Crs, OutputRecord, Schema, StrideError};

/// Type de géométrie déclaré par la destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
}

impl GeometryKind {
    /// Nom du type PostGIS / GeoJSON
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
        }
    }
}

/// Identifiant de la sortie produite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkHandle {
    /// Fichier écrit sur disque
    File(PathBuf),
    /// Table PostGIS `schema.table`
    Table { schema: String, table: String },
    /// Destination en mémoire
    Memory,
}

impl fmt::Display for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkHandle::File(path) => write!(f, "{}", path.display()),
            SinkHandle::Table { schema, table } => write!(f, "{}.{}", schema, table),
            SinkHandle::Memory => write!(f, "memory"),
        }
    }
}

/// Destination ouverte, recevant les features
pub trait FeatureSink {
    /// Ajoute un enregistrement (attributs dans l'ordre du schéma)
    fn add_feature(&mut self, record: &OutputRecord) -> Result<(), StrideError>;

    /// Termine l'écriture et retourne l'identifiant de la sortie
    fn finish(self: Box<Self>) -> Result<SinkHandle, StrideError>;
}

/// Fabrique de destinations
pub trait SinkProvider {
    /// Ouvre une destination ; un échec doit être un [`StrideError::SinkUnavailable`]
    fn open(
        &mut self,
        schema: &Schema,
        kind: GeometryKind,
        crs: Crs,
    ) -> Result<Box<dyn FeatureSink>, StrideError>;
}

/// Contenu d'une destination en mémoire
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Nombre d'ouvertures de la destination
    pub opened: usize,
    /// CRS déclaré à l'ouverture
    pub crs: Option<Crs>,
    /// Noms des colonnes déclarées
    pub field_names: Vec<String>,
    pub records: Vec<OutputRecord>,
    pub finished: bool,
}

/// Destination en mémoire (tests, intégration dans un hôte)
///
/// Le contenu est partagé : un clone du provider permet de relire les
/// enregistrements après l'exécution.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    store: Rc<RefCell<MemoryStore>>,
    fail_open: Option<String>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider dont l'ouverture échoue toujours
    pub fn failing(reason: &str) -> Self {
        Self {
            store: Rc::default(),
            fail_open: Some(reason.to_string()),
        }
    }

    /// Accès au contenu partagé
    pub fn store(&self) -> std::cell::Ref<'_, MemoryStore> {
        self.store.borrow()
    }
}

impl SinkProvider for MemoryProvider {
    fn open(
        &mut self,
        schema: &Schema,
        _kind: GeometryKind,
        crs: Crs,
    ) -> Result<Box<dyn FeatureSink>, StrideError> {
        if let Some(reason) = &self.fail_open {
            return Err(StrideError::SinkUnavailable(reason.clone()));
        }

        {
            let mut store = self.store.borrow_mut();
            store.opened += 1;
            store.crs = Some(crs);
            store.field_names = schema.fields.iter().map(|f| f.name.clone()).collect();
            store.records.clear();
            store.finished = false;
        }

        Ok(Box::new(MemorySink {
            store: Rc::clone(&self.store),
        }))
    }
}

struct MemorySink {
    store: Rc<RefCell<MemoryStore>>,
}

impl FeatureSink for MemorySink {
    fn add_feature(&mut self, record: &OutputRecord) -> Result<(), StrideError> {
        self.store.borrow_mut().records.push(record.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<SinkHandle, StrideError> {
        self.store.borrow_mut().finished = true;
        Ok(SinkHandle::Memory)
    }
}
