//! # Datalogger Core
//!
//! Plano de controle do datalogger de campo genLogger: escalonador
//! cooperativo, pipeline de medições, terminal de configuração e ciclo de
//! vida dos metadados persistidos.
//!
//! ## Módulos
//! - [`metadata`] – Registro de configuração `nome;arquivo;transmissão;medição;relatório`
//! - [`validation`] – Validadores das entradas do terminal
//! - [`clock`] – Relógio de calendário (RTC) e relógio fixo para testes
//! - [`storage`] – Store de bytes e persistência dos metadados
//! - [`scheduler`] – Ticks, flags de execução e SysTick simulado
//! - [`sensors`] – Sensores meteorológicos e estação simulada
//! - [`pipeline`] – Medição → formatação → notificação de observadores
//! - [`mediator`] – Mediador entre terminal e armazenamento interno
//! - [`terminal`] – Máquina de estados do terminal serial
//! - [`logger`] – Observador que grava medições em arquivos rotativos
//! - [`network`] – Observador que envia medições via HTTP
//! - [`config`] – Configuração de execução via TOML

pub mod metadata;
pub mod validation;
pub mod clock;
pub mod storage;
pub mod scheduler;
pub mod sensors;
pub mod pipeline;
pub mod mediator;
pub mod terminal;
pub mod logger;
pub mod network;
pub mod config;

// Re-exports convenientes
pub use clock::{Clock, SimulatedRtc};
pub use config::FirmwareConfig;
pub use mediator::{ConfigManager, ConfigMediator};
pub use metadata::{DEFAULT_RECORD, FileCreationPeriod, LoggerMetadata};
pub use pipeline::{Observer, ProcessingManager, SampleRecord};
pub use scheduler::{Scheduler, TaskControl, TickSimulator};
pub use storage::{ByteStore, FileStore, MetadataStore};
pub use terminal::{Signal, TerminalState, TerminalStateMachine};
