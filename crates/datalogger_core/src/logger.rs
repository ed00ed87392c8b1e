//! Observador de gravação: acrescenta cada registro a um arquivo no
//! armazenamento externo.
//!
//! O nome do arquivo depende do nome do dispositivo e do período de criação:
//!
//! | Período  | Arquivo                |
//! |----------|------------------------|
//! | diário   | `nome_YYYYMMDD.csv`    |
//! | semanal  | `nome_YYYY-Www.csv`    |
//! | mensal   | `nome_YYYYMM.csv`      |
//! | anual    | `nome_YYYY.csv`        |
//! | único    | `nome.csv`             |

use crate::clock::Clock;
use crate::metadata::{FileCreationPeriod, LoggerMetadata};
use crate::pipeline::{Observer, RecordSlot};
use crate::storage::{ByteStore, OpenMode, StorageError, write_file};
use chrono::{Datelike, NaiveDate};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Nome do arquivo de medições para `date`.
pub fn rotation_file_name(name: &str, period: FileCreationPeriod, date: NaiveDate) -> String {
    let base = sanitize(name);
    match period {
        FileCreationPeriod::Daily => format!("{base}_{}.csv", date.format("%Y%m%d")),
        FileCreationPeriod::Weekly => {
            let week = date.iso_week();
            format!("{base}_{:04}-W{:02}.csv", week.year(), week.week())
        }
        FileCreationPeriod::Monthly => format!("{base}_{}.csv", date.format("%Y%m")),
        FileCreationPeriod::Yearly => format!("{base}_{}.csv", date.format("%Y")),
        FileCreationPeriod::Once => format!("{base}.csv"),
    }
}

/// Troca por `_` tudo que não cabe num nome de arquivo portátil.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "logger".to_string()
    } else {
        cleaned
    }
}

/// Gerenciador de gravação de medições.
pub struct LoggerManager<S: ByteStore> {
    store: S,
    clock: Arc<dyn Clock>,
    name: String,
    period: FileCreationPeriod,
    slot: Rc<RecordSlot>,
}

impl<S: ByteStore> LoggerManager<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, metadata: &LoggerMetadata) -> Self {
        Self {
            store,
            clock,
            name: metadata.name.clone(),
            period: metadata.file_creation_period,
            slot: Rc::new(RecordSlot::new()),
        }
    }

    /// Monta o armazenamento externo.
    pub fn init(&mut self) -> Result<(), StorageError> {
        self.store.mount()?;
        info!("Logger pronto ({}, {})", self.name, self.period.label());
        Ok(())
    }

    /// Handle a registrar no pipeline.
    pub fn observer(&self) -> Rc<dyn Observer> {
        self.slot.clone()
    }

    /// Adota nome e período de um registro de metadados recém-gravado.
    pub fn apply_metadata(&mut self, metadata: &LoggerMetadata) {
        if self.name != metadata.name || self.period != metadata.file_creation_period {
            debug!(
                "Logger reconfigurado: {} ({})",
                metadata.name,
                metadata.file_creation_period.label()
            );
        }
        self.name = metadata.name.clone();
        self.period = metadata.file_creation_period;
    }

    pub fn has_pending(&self) -> bool {
        self.slot.has_data()
    }

    /// Arquivo de destino para o instante atual do relógio.
    pub fn current_file_name(&self) -> String {
        rotation_file_name(&self.name, self.period, self.clock.now().date())
    }

    /// Grava o registro pendente, se houver.
    ///
    /// Retorna o arquivo gravado. Tenta acrescentar e, se o arquivo não
    /// existir, cria.
    pub fn handler(&mut self) -> Result<Option<String>, StorageError> {
        let Some(record) = self.slot.take() else {
            return Ok(None);
        };
        let path = self.current_file_name();
        let data = record.as_str().as_bytes();

        match write_file(&mut self.store, &path, OpenMode::Append, data) {
            Ok(_) => debug!("Registro acrescentado a {path}"),
            Err(StorageError::Open { .. }) => {
                write_file(&mut self.store, &path, OpenMode::Write, data).inspect_err(|e| {
                    warn!("Arquivo {path} não pôde ser aberto nem criado: {e}");
                })?;
                info!("Arquivo de medições criado: {path}");
            }
            Err(e) => {
                warn!("Falha ao acrescentar em {path}: {e}");
                return Err(e);
            }
        }
        Ok(Some(path))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
