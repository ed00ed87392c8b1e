//! Pipeline de dados de sensores (processing manager).
//!
//! Um ciclo de medição é sempre:
//!
//! ```text
//! take_measurements → format_data → notify_observers
//! ```
//!
//! O registro formatado fica na caixa de correio (mailbox). Cada observador
//! recebe um [`SampleRecord`] imutável e compartilhado: guardar uma cópia do
//! handle mantém aquela versão estável mesmo depois que o próximo ciclo
//! substituir a mailbox.
//!
//! Layout do registro (versão [`RECORD_FORMAT_VERSION`]):
//!
//! ```text
//! 1;DD/MM/YYYY HH:MM:SS;temp;umidade;chuva;vento\n
//! ```

use crate::clock::Clock;
use crate::sensors::{RawSample, SensorBank};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Máximo de observadores registrados.
pub const MAX_OBSERVERS: usize = 10;

/// Capacidade da mailbox (bytes).
pub const MAILBOX_CAPACITY: usize = 1024;

/// Versão do layout de texto do registro.
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Erros do pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Limite de observadores atingido ({MAX_OBSERVERS})")]
    ObserverCapacity,

    #[error("Registro excede a mailbox ({0} bytes, máximo {MAILBOX_CAPACITY})")]
    RecordTooLong(usize),
}

/// Registro formatado de um ciclo, compartilhado sem cópia entre observadores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord(Arc<str>);

impl SampleRecord {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Consumidor notificado de forma síncrona a cada novo registro.
///
/// `update` roda dentro do ciclo de medição: deve apenas registrar a
/// disponibilidade (e guardar o handle), deixando o trabalho pesado para a
/// própria tarefa do observador no superloop.
pub trait Observer {
    fn update(&self, record: &SampleRecord);
}

/// Caixa de entrada de um observador: guarda o último registro notificado
/// até a tarefa do observador consumi-lo.
#[derive(Debug, Default)]
pub struct RecordSlot {
    pending: RefCell<Option<SampleRecord>>,
}

impl RecordSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Há registro não consumido.
    pub fn has_data(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Consome o registro pendente.
    pub fn take(&self) -> Option<SampleRecord> {
        self.pending.borrow_mut().take()
    }
}

impl Observer for RecordSlot {
    fn update(&self, record: &SampleRecord) {
        // Registro não consumido é substituído pelo mais recente
        self.pending.replace(Some(record.clone()));
    }
}

/// Formata as leituras no layout versionado.
pub fn format_record(timestamp: &str, raw: &RawSample) -> String {
    fn field<T: fmt::Display>(value: Option<T>) -> String {
        value.map(|v| v.to_string()).unwrap_or_default()
    }

    format!(
        "{RECORD_FORMAT_VERSION};{timestamp};{};{};{};{}\n",
        field(raw.temperature.map(|t| format!("{t:.2}"))),
        field(raw.humidity),
        field(raw.rain_mm),
        field(raw.wind_speed),
    )
}

/// Dono dos sensores, da mailbox e da lista de observadores.
pub struct ProcessingManager {
    clock: Arc<dyn Clock>,
    sensors: SensorBank,
    observers: Vec<Rc<dyn Observer>>,
    raw: RawSample,
    timestamp: String,
    mailbox: Option<SampleRecord>,
}

impl ProcessingManager {
    pub fn new(clock: Arc<dyn Clock>, sensors: SensorBank) -> Self {
        Self {
            clock,
            sensors,
            observers: Vec::with_capacity(MAX_OBSERVERS),
            raw: RawSample::default(),
            timestamp: String::new(),
            mailbox: None,
        }
    }

    /// Registra um observador (ordem de registro = ordem de notificação).
    pub fn set_observer(&mut self, observer: Rc<dyn Observer>) -> Result<(), PipelineError> {
        if self.observers.len() >= MAX_OBSERVERS {
            return Err(PipelineError::ObserverCapacity);
        }
        self.observers.push(observer);
        Ok(())
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Lê os sensores e o timestamp do relógio.
    pub fn take_measurements(&mut self) {
        self.timestamp = self.clock.get_timestamp();
        self.raw = self.sensors.sample();
        debug!("Medição em {}: {:?}", self.timestamp, self.raw);
    }

    /// Serializa a última medição na mailbox.
    pub fn format_data(&mut self) -> Result<&SampleRecord, PipelineError> {
        let text = format_record(&self.timestamp, &self.raw);
        if text.len() > MAILBOX_CAPACITY {
            return Err(PipelineError::RecordTooLong(text.len()));
        }
        Ok(self.mailbox.insert(SampleRecord(Arc::from(text))))
    }

    /// Notifica todos os observadores, em ordem de registro.
    ///
    /// Retorna quantos foram notificados (zero se a mailbox estiver vazia).
    pub fn notify_observers(&self) -> usize {
        let Some(record) = &self.mailbox else {
            warn!("Notificação sem registro formatado");
            return 0;
        };
        for observer in &self.observers {
            observer.update(record);
        }
        self.observers.len()
    }

    /// Ciclo completo de medição.
    pub fn run_cycle(&mut self) -> Result<usize, PipelineError> {
        self.take_measurements();
        self.format_data()?;
        Ok(self.notify_observers())
    }

    /// Último registro formatado.
    pub fn mailbox(&self) -> Option<&SampleRecord> {
        self.mailbox.as_ref()
    }

    pub fn last_sample(&self) -> &RawSample {
        &self.raw
    }
}
