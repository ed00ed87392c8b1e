//! Mediador do subsistema de configuração.
//!
//! O terminal e o armazenamento interno nunca se referenciam: o terminal
//! chama [`ConfigMediator::notify`] e o [`ConfigManager`] repassa ao store
//! num único salto síncrono. Não há fila nem broadcast.

use crate::metadata::LoggerMetadata;
use crate::storage::{ByteStore, MetadataStore, StorageError};
use tracing::{debug, warn};

/// Status inteiro de sucesso.
pub const STATUS_OK: u8 = 1;

/// Status inteiro de falha.
pub const STATUS_FAILED: u8 = 0;

/// Componentes do subsistema de configuração.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigComponent {
    Terminal,
    InternalStorage,
}

/// Eventos tratados pelo mediador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediatorEvent<'a> {
    /// Recarregar os metadados do store.
    UpdateMetadata,
    /// Persistir o registro serializado.
    MetadataUpdated(&'a str),
}

/// Resposta síncrona do mediador.
#[derive(Debug)]
pub enum MediatorReply {
    /// Metadados recarregados (cópia do registro em memória).
    Refreshed(LoggerMetadata),
    Committed,
    Failed(StorageError),
    /// Evento não suportado para o remetente.
    Unsupported,
}

impl MediatorReply {
    /// Status inteiro (`1` = sucesso).
    pub fn status(&self) -> u8 {
        match self {
            Self::Refreshed(_) | Self::Committed => STATUS_OK,
            Self::Failed(_) | Self::Unsupported => STATUS_FAILED,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == STATUS_OK
    }
}

/// Ponto único de entrada entre componentes de configuração.
pub trait ConfigMediator {
    fn notify(&mut self, sender: ConfigComponent, event: MediatorEvent<'_>) -> MediatorReply;
}

/// Mediador concreto: liga o terminal ao armazenamento interno.
#[derive(Debug)]
pub struct ConfigManager<S: ByteStore> {
    storage: MetadataStore<S>,
}

impl<S: ByteStore> ConfigManager<S> {
    pub fn new(storage: MetadataStore<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &MetadataStore<S> {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut MetadataStore<S> {
        &mut self.storage
    }
}

impl<S: ByteStore> ConfigMediator for ConfigManager<S> {
    fn notify(&mut self, sender: ConfigComponent, event: MediatorEvent<'_>) -> MediatorReply {
        if sender != ConfigComponent::Terminal {
            debug!("Evento {event:?} de {sender:?} ignorado");
            return MediatorReply::Unsupported;
        }

        match event {
            MediatorEvent::UpdateMetadata => match self.storage.retrieve_metadata() {
                Ok(metadata) => MediatorReply::Refreshed(metadata.clone()),
                Err(e) => {
                    warn!("Falha ao recarregar metadados: {e}");
                    MediatorReply::Failed(e)
                }
            },
            MediatorEvent::MetadataUpdated(record) => match self.storage.store_metadata(record) {
                Ok(()) => MediatorReply::Committed,
                Err(e) => {
                    warn!("Falha ao gravar metadados: {e}");
                    MediatorReply::Failed(e)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const FILE: &str = "metadata.txt";

    fn manager(store: MemoryStore) -> ConfigManager<MemoryStore> {
        let mut storage = MetadataStore::new(store, FILE);
        storage.init_fs().unwrap();
        ConfigManager::new(storage)
    }

    #[test]
    fn refresh_returns_stored_record() {
        let mut cm = manager(MemoryStore::with_file(FILE, b"alpha;0;2;3;4\n"));
        let reply = cm.notify(ConfigComponent::Terminal, MediatorEvent::UpdateMetadata);
        assert_eq!(reply.status(), STATUS_OK);
        match reply {
            MediatorReply::Refreshed(m) => assert_eq!(m.name, "alpha"),
            other => panic!("resposta inesperada: {other:?}"),
        }
    }

    #[test]
    fn refresh_failure_reports_zero() {
        let mut cm = manager(MemoryStore::new());
        let reply = cm.notify(ConfigComponent::Terminal, MediatorEvent::UpdateMetadata);
        assert_eq!(reply.status(), STATUS_FAILED);
    }

    #[test]
    fn commit_replaces_record() {
        let mut cm = manager(MemoryStore::with_file(FILE, b"alpha;0;2;3;4\n"));
        let reply = cm.notify(
            ConfigComponent::Terminal,
            MediatorEvent::MetadataUpdated("beta;3;9;8;7"),
        );
        assert!(reply.is_success());
        assert_eq!(
            cm.storage().store().contents(FILE),
            Some(b"beta;3;9;8;7\n".as_slice())
        );
        assert!(cm.storage_mut().take_changed());
    }

    #[test]
    fn commit_failure_reports_zero() {
        let mut store = MemoryStore::new();
        store.fail_writes = true;
        let mut cm = manager(store);
        let reply = cm.notify(
            ConfigComponent::Terminal,
            MediatorEvent::MetadataUpdated("beta;3;9;8;7"),
        );
        assert_eq!(reply.status(), STATUS_FAILED);
    }

    #[test]
    fn storage_sender_is_not_relayed() {
        let mut cm = manager(MemoryStore::new());
        let reply = cm.notify(ConfigComponent::InternalStorage, MediatorEvent::UpdateMetadata);
        assert!(matches!(reply, MediatorReply::Unsupported));
    }
}
