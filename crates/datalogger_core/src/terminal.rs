//! Máquina de estados do terminal serial.
//!
//! Teclas viram sinais, sinais são despachados ao estado ativo e o resultado
//! ([`TerminalEvent`]) decide se há transição. Numa transição o handler
//! despacha `Exit` ao estado antigo e `Entry` ao novo dentro da mesma chamada.
//!
//! ```text
//!            I                    C
//!   DeviceInfo ◄──── Init ────► DeviceConfig
//!        │     ────►     ◄────       │
//!        └──── B ───────────── B ────┘
//! ```
//!
//! Edições vão para uma cópia em memória (`staged`) e só chegam ao store com
//! `S`, via mediador.

use crate::clock::Clock;
use crate::mediator::{ConfigComponent, ConfigMediator, MediatorEvent, MediatorReply};
use crate::metadata::LoggerMetadata;
use crate::validation::{self, ValidationError};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const RULE: &str = "#############################";

/// Estados do terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Init,
    DeviceInfo,
    DeviceConfig,
}

impl TerminalState {
    pub const ALL: [Self; 3] = [Self::Init, Self::DeviceInfo, Self::DeviceConfig];
}

/// Sinais do terminal: entrada/saída de estado e teclas reconhecidas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Entry,
    Exit,
    KeyI,
    KeyC,
    KeyB,
    KeyN,
    KeyT,
    KeyF,
    KeyM,
    KeyP,
    KeyR,
    KeyS,
    /// Linha livre (carrega payload)
    Enter,
}

impl Signal {
    pub const ALL: [Self; 13] = [
        Self::Entry,
        Self::Exit,
        Self::KeyI,
        Self::KeyC,
        Self::KeyB,
        Self::KeyN,
        Self::KeyT,
        Self::KeyF,
        Self::KeyM,
        Self::KeyP,
        Self::KeyR,
        Self::KeyS,
        Self::Enter,
    ];

    /// Tecla única reconhecida (sem distinção de caixa).
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_uppercase() {
            'I' => Some(Self::KeyI),
            'C' => Some(Self::KeyC),
            'B' => Some(Self::KeyB),
            'N' => Some(Self::KeyN),
            'T' => Some(Self::KeyT),
            'F' => Some(Self::KeyF),
            'M' => Some(Self::KeyM),
            'P' => Some(Self::KeyP),
            'R' => Some(Self::KeyR),
            'S' => Some(Self::KeyS),
            _ => None,
        }
    }
}

/// Converte uma linha digitada em sinal + payload.
///
/// Uma linha com uma única tecla reconhecida vira o sinal da tecla; qualquer
/// outra coisa vira `Enter` com a linha como payload (`None` se vazia).
pub fn parse_input(line: &str) -> (Signal, Option<&str>) {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut chars = line.trim().chars();
    if let (Some(key), None) = (chars.next(), chars.next()) {
        if let Some(signal) = Signal::from_key(key) {
            return (signal, None);
        }
    }
    if line.trim().is_empty() {
        (Signal::Enter, None)
    } else {
        (Signal::Enter, Some(line))
    }
}

/// Resultado do despacho de um sinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalEvent {
    Handled,
    Ignored,
    Transition,
}

/// Campo aguardando valor após a tecla de edição.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingField {
    Name,
    TimeDate,
    FilePeriod,
    MeasurementPeriod,
    TransmissionPeriod,
    ReportPeriod,
}

impl PendingField {
    fn from_signal(signal: Signal) -> Option<Self> {
        match signal {
            Signal::KeyN => Some(Self::Name),
            Signal::KeyT => Some(Self::TimeDate),
            Signal::KeyF => Some(Self::FilePeriod),
            Signal::KeyM => Some(Self::MeasurementPeriod),
            Signal::KeyP => Some(Self::TransmissionPeriod),
            Signal::KeyR => Some(Self::ReportPeriod),
            _ => None,
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            Self::Name => "Digite o nome do dispositivo",
            Self::TimeDate => "Digite hora e data no formato HH:MM:SS DD/MM/YYYY",
            Self::FilePeriod => {
                "Digite o período de arquivo: 0 diário, 1 semanal, 2 mensal, 3 anual, 4 único"
            }
            Self::MeasurementPeriod => "Digite o período de medição (minutos)",
            Self::TransmissionPeriod => "Digite o período de transmissão (minutos)",
            Self::ReportPeriod => "Digite o período de relatório (minutos)",
        }
    }
}

/// Sessão do terminal: estado ativo, campo pendente e cópia de edição.
pub struct TerminalStateMachine<W: Write> {
    active_state: TerminalState,
    pending: Option<PendingField>,
    staged: LoggerMetadata,
    clock: Arc<dyn Clock>,
    out: W,
}

impl<W: Write> TerminalStateMachine<W> {
    /// `metadata` semeia a cópia de edição (normalmente o registro do boot).
    pub fn new(clock: Arc<dyn Clock>, metadata: LoggerMetadata, out: W) -> Self {
        Self {
            active_state: TerminalState::Init,
            pending: None,
            staged: metadata,
            clock,
            out,
        }
    }

    /// Define o estado inicial e imprime o banner.
    pub fn init(&mut self, state: TerminalState) {
        self.active_state = state;
        self.pending = None;
        self.print_banner();
    }

    pub fn active_state(&self) -> TerminalState {
        self.active_state
    }

    pub fn pending_field(&self) -> Option<PendingField> {
        self.pending
    }

    pub fn staged(&self) -> &LoggerMetadata {
        &self.staged
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Despacha um sinal ao estado ativo e executa a transição, se houver.
    pub fn handler(
        &mut self,
        signal: Signal,
        payload: Option<&str>,
        mediator: &mut dyn ConfigMediator,
    ) -> TerminalEvent {
        let current = self.active_state;
        let event = self.dispatch(current, signal, payload, mediator);

        if event == TerminalEvent::Transition {
            let next = self.active_state;
            debug!("Terminal: {current:?} → {next:?}");
            self.dispatch(current, Signal::Exit, None, mediator);
            // Entry não pode pedir outra transição
            if self.dispatch(next, Signal::Entry, None, mediator) == TerminalEvent::Transition {
                warn!("Transição pedida em Entry de {next:?} ignorada");
                self.active_state = next;
            }
        }

        let _ = self.out.flush();
        event
    }

    fn dispatch(
        &mut self,
        state: TerminalState,
        signal: Signal,
        payload: Option<&str>,
        mediator: &mut dyn ConfigMediator,
    ) -> TerminalEvent {
        match state {
            TerminalState::Init => self.init_state(signal),
            TerminalState::DeviceInfo => self.info_state(signal, mediator),
            TerminalState::DeviceConfig => self.config_state(signal, payload, mediator),
        }
    }

    // ──────────────────────────────────────────
    // Estados
    // ──────────────────────────────────────────

    fn init_state(&mut self, signal: Signal) -> TerminalEvent {
        match signal {
            Signal::Entry => {
                self.print_help();
                TerminalEvent::Handled
            }
            Signal::Exit => self.leave(),
            Signal::KeyI => self.transition(TerminalState::DeviceInfo),
            Signal::KeyC => self.transition(TerminalState::DeviceConfig),
            _ => TerminalEvent::Ignored,
        }
    }

    fn info_state(&mut self, signal: Signal, mediator: &mut dyn ConfigMediator) -> TerminalEvent {
        match signal {
            Signal::Entry => {
                match self.refresh(mediator) {
                    Some(metadata) => self.print_metadata(&metadata),
                    None => {
                        self.say("Erro ao ler metadados do armazenamento");
                        let staged = self.staged.clone();
                        self.print_metadata(&staged);
                    }
                }
                TerminalEvent::Handled
            }
            Signal::Exit => self.leave(),
            Signal::KeyB => self.transition(TerminalState::Init),
            _ => TerminalEvent::Ignored,
        }
    }

    fn config_state(
        &mut self,
        signal: Signal,
        payload: Option<&str>,
        mediator: &mut dyn ConfigMediator,
    ) -> TerminalEvent {
        match signal {
            Signal::Entry => {
                if let Some(metadata) = self.refresh(mediator) {
                    self.staged = metadata;
                }
                self.print_config_help();
                TerminalEvent::Handled
            }
            Signal::Exit => self.leave(),
            Signal::KeyB => self.transition(TerminalState::Init),
            Signal::KeyN
            | Signal::KeyT
            | Signal::KeyF
            | Signal::KeyM
            | Signal::KeyP
            | Signal::KeyR => {
                if let Some(field) = PendingField::from_signal(signal) {
                    self.pending = Some(field);
                    self.say(field.prompt());
                }
                TerminalEvent::Handled
            }
            Signal::Enter => {
                let Some(field) = self.pending else {
                    self.say("Selecione um campo antes de digitar um valor");
                    return TerminalEvent::Ignored;
                };
                let Some(input) = payload else {
                    self.say("Dado inválido, digite novamente");
                    return TerminalEvent::Handled;
                };
                match self.apply_field(field, input) {
                    Ok(()) => self.pending = None,
                    Err(e) => {
                        info!("Entrada rejeitada para {field:?}: {e}");
                        self.say(&format!("Dado inválido ({e}), digite novamente"));
                    }
                }
                TerminalEvent::Handled
            }
            Signal::KeyS => {
                self.say("Gravando configuração na memória...");
                let record = self.staged.to_record();
                let reply = mediator.notify(
                    ConfigComponent::Terminal,
                    MediatorEvent::MetadataUpdated(&record),
                );
                if reply.is_success() {
                    self.say("Configuração salva!");
                } else {
                    self.say("Erro ao gravar na memória");
                }
                TerminalEvent::Handled
            }
            Signal::KeyI | Signal::KeyC => TerminalEvent::Ignored,
        }
    }

    fn transition(&mut self, next: TerminalState) -> TerminalEvent {
        self.active_state = next;
        TerminalEvent::Transition
    }

    fn leave(&mut self) -> TerminalEvent {
        self.pending = None;
        let _ = write!(self.out, "{CLEAR_SCREEN}");
        TerminalEvent::Handled
    }

    /// Pede ao mediador o registro atual do store.
    fn refresh(&mut self, mediator: &mut dyn ConfigMediator) -> Option<LoggerMetadata> {
        match mediator.notify(ConfigComponent::Terminal, MediatorEvent::UpdateMetadata) {
            MediatorReply::Refreshed(metadata) => Some(metadata),
            _ => None,
        }
    }

    /// Valida `input` e grava no campo da cópia de edição.
    fn apply_field(&mut self, field: PendingField, input: &str) -> Result<(), ValidationError> {
        match field {
            PendingField::Name => {
                self.staged.name = validation::validate_name(input)?;
                self.say("Nome copiado, digite S para salvar");
            }
            PendingField::TimeDate => {
                let dt = validation::parse_time_and_date(input)?;
                self.clock.set_date(dt.day, dt.month, dt.year)?;
                self.clock.set_time(dt.hour, dt.minute, dt.second)?;
                self.say("RTC configurado");
            }
            PendingField::FilePeriod => {
                self.staged.file_creation_period = validation::parse_file_period(input)?;
                self.say("Período de arquivo copiado, digite S para salvar");
            }
            PendingField::MeasurementPeriod => {
                self.staged.measurement_period = validation::parse_minutes(input)?;
                self.say("Período de medição copiado, digite S para salvar");
            }
            PendingField::TransmissionPeriod => {
                self.staged.transmission_period = validation::parse_minutes(input)?;
                self.say("Período de transmissão copiado, digite S para salvar");
            }
            PendingField::ReportPeriod => {
                self.staged.report_period = validation::parse_minutes(input)?;
                self.say("Período de relatório copiado, digite S para salvar");
            }
        }
        Ok(())
    }

    // ──────────────────────────────────────────
    // Telas
    // ──────────────────────────────────────────

    fn say(&mut self, line: &str) {
        let _ = write!(self.out, "{line}\r\n");
    }

    fn print_banner(&mut self) {
        let _ = write!(
            self.out,
            "{RULE}\r\ngenLogger versão: {FIRMWARE_VERSION}\r\n{RULE}\r\n"
        );
    }

    fn print_help(&mut self) {
        let _ = write!(
            self.out,
            "{RULE}\r\nMenu de ajuda:\r\n{RULE}\r\n\
             I - Informações do dispositivo\r\n\
             C - Configurar dispositivo\r\n\
             {RULE}\r\n"
        );
    }

    fn print_config_help(&mut self) {
        let s = &self.staged;
        let _ = write!(
            self.out,
            "{RULE}\r\nMenu de configuração\r\n{RULE}\r\n\
             N - Nome do dispositivo ({})\r\n\
             T - Hora e data\r\n\
             F - Período de arquivo ({})\r\n\
             M - Período de medição ({} min)\r\n\
             P - Período de transmissão ({} min)\r\n\
             R - Período de relatório ({} min)\r\n\
             S - Gravar configuração\r\n\
             B - Voltar\r\n\
             {RULE}\r\n",
            s.name,
            s.file_creation_period.label(),
            s.measurement_period,
            s.transmission_period,
            s.report_period,
        );
    }

    fn print_metadata(&mut self, metadata: &LoggerMetadata) {
        let time = self.clock.get_time();
        let date = self.clock.get_date();
        let _ = write!(
            self.out,
            "{RULE}\r\n\
             Nome do dispositivo: {}\r\n\
             Hora: {time}\r\n\
             Data: {date}\r\n\
             Período de arquivo: {}\r\n\
             Período de medição: {} min\r\n\
             Período de transmissão: {} min\r\n\
             Período de relatório: {} min\r\n\
             Versão do firmware: {FIRMWARE_VERSION}\r\n\
             B - Voltar\r\n\
             {RULE}\r\n",
            metadata.name,
            metadata.file_creation_period.label(),
            metadata.measurement_period,
            metadata.transmission_period,
            metadata.report_period,
        );
    }
}
