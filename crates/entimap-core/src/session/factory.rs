use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::backing::{BackingStore, ConnectionDescriptor, StoreConnector};
use crate::errors::{MapError, Result};
use crate::registry::EntityRegistry;
use crate::resolver::{MappingResolver, StorageShape};

use super::Session;

/// Opens sessions against one store for one sealed registry
///
/// Every entity is resolved when the factory is built, so configuration
/// errors never reach a session.
pub struct SessionFactory<C: StoreConnector> {
    resolver: MappingResolver,
    shapes: Vec<Arc<StorageShape>>,
    by_entity: Arc<HashMap<String, Arc<StorageShape>>>,
    connector: C,
    descriptor: ConnectionDescriptor,
}

impl<C: StoreConnector> SessionFactory<C> {
    /// # Errors
    ///
    /// `RegistryNotSealed`, or the first configuration error found while
    /// resolving the registered entities.
    pub fn new(
        registry: Arc<EntityRegistry>,
        connector: C,
        descriptor: ConnectionDescriptor,
    ) -> Result<Self> {
        if !registry.is_sealed() {
            return Err(MapError::RegistryNotSealed);
        }

        let resolver = MappingResolver::new(registry);
        let shapes = resolver.resolve_all()?;
        let by_entity = shapes
            .iter()
            .map(|shape| (shape.entity.clone(), shape.clone()))
            .collect();

        Ok(Self {
            resolver,
            shapes,
            by_entity: Arc::new(by_entity),
            connector,
            descriptor,
        })
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        self.resolver.registry()
    }

    pub fn resolver(&self) -> &MappingResolver {
        &self.resolver
    }

    /// Resolved shapes in registration order
    pub fn shapes(&self) -> &[Arc<StorageShape>] {
        &self.shapes
    }

    /// Connect, make sure the schema exists and open a session
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` when connecting or creating the schema fails.
    pub fn open_session(&self) -> Result<Session<C::Store>> {
        let start = Instant::now();
        crate::log_op_start!("open_session", entities = self.shapes.len());

        match self.connect() {
            Ok(session) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                crate::log_op_end!(
                    "open_session",
                    duration_ms = duration_ms,
                    session_id = %session.id()
                );
                Ok(session)
            }
            Err(e) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                crate::log_op_error!("open_session", e.clone(), duration_ms = duration_ms);
                Err(e)
            }
        }
    }

    fn connect(&self) -> Result<Session<C::Store>> {
        let mut store = self
            .connector
            .connect(&self.descriptor)
            .map_err(|cause| MapError::StoreUnavailable { cause })?;
        store
            .ensure_schema(&self.shapes)
            .map_err(|cause| MapError::StoreUnavailable { cause })?;
        Ok(Session::new(store, self.by_entity.clone()))
    }
}

impl<C: StoreConnector> std::fmt::Debug for SessionFactory<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("entities", &self.shapes.len())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
