//! Relógio de calendário (RTC).
//!
//! Strings de largura fixa:
//! - hora: `HH:MM:SS`
//! - data: `DD/MM/YYYY`
//! - timestamp: `DD/MM/YYYY HH:MM:SS`

use crate::validation::ValidationError;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Mutex;

pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Colaborador de relógio usado pelo terminal e pelo pipeline.
pub trait Clock: Send + Sync {
    /// Data e hora atuais do dispositivo.
    fn now(&self) -> NaiveDateTime;

    /// Ajusta a hora mantendo a data.
    fn set_time(&self, hour: u32, minute: u32, second: u32) -> Result<(), ValidationError>;

    /// Ajusta a data mantendo a hora.
    fn set_date(&self, day: u32, month: u32, year: i32) -> Result<(), ValidationError>;

    fn get_time(&self) -> String {
        self.now().format(TIME_FORMAT).to_string()
    }

    fn get_date(&self) -> String {
        self.now().format(DATE_FORMAT).to_string()
    }

    fn get_timestamp(&self) -> String {
        self.now().format(TIMESTAMP_FORMAT).to_string()
    }
}

fn checked_time(hour: u32, minute: u32, second: u32) -> Result<NaiveTime, ValidationError> {
    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or(ValidationError::TimeOutOfRange(hour, minute, second))
}

fn checked_date(day: u32, month: u32, year: i32) -> Result<NaiveDate, ValidationError> {
    if !(0..=9999).contains(&year) {
        return Err(ValidationError::DateOutOfRange(day, month, year));
    }
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(ValidationError::DateOutOfRange(day, month, year))
}

// ──────────────────────────────────────────────
// RTC simulado (host)
// ──────────────────────────────────────────────

/// RTC do host: relógio local mais um deslocamento ajustável.
#[derive(Debug)]
pub struct SimulatedRtc {
    offset: Mutex<Duration>,
}

impl Default for SimulatedRtc {
    fn default() -> Self {
        Self {
            offset: Mutex::new(Duration::zero()),
        }
    }
}

impl SimulatedRtc {
    pub fn new() -> Self {
        Self::default()
    }

    fn offset(&self) -> Duration {
        self.offset.lock().map(|o| *o).unwrap_or_else(|e| *e.into_inner())
    }

    fn set_target(&self, target: NaiveDateTime) {
        let delta = target - Local::now().naive_local();
        match self.offset.lock() {
            Ok(mut offset) => *offset = delta,
            Err(poisoned) => *poisoned.into_inner() = delta,
        }
    }
}

impl Clock for SimulatedRtc {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local() + self.offset()
    }

    fn set_time(&self, hour: u32, minute: u32, second: u32) -> Result<(), ValidationError> {
        let time = checked_time(hour, minute, second)?;
        self.set_target(self.now().date().and_time(time));
        Ok(())
    }

    fn set_date(&self, day: u32, month: u32, year: i32) -> Result<(), ValidationError> {
        let date = checked_date(day, month, year)?;
        self.set_target(date.and_time(self.now().time()));
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Relógio fixo (testes e reprodução)
// ──────────────────────────────────────────────

/// Relógio parado: só muda via `set_*`.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    /// Atalho para `DD/MM/YYYY HH:MM:SS`.
    pub fn at(timestamp: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
            .ok()
            .map(Self::new)
    }

    fn update(&self, f: impl FnOnce(&mut NaiveDateTime)) {
        match self.current.lock() {
            Ok(mut current) => f(&mut *current),
            Err(poisoned) => f(&mut *poisoned.into_inner()),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.current
            .lock()
            .map(|c| *c)
            .unwrap_or_else(|e| *e.into_inner())
    }

    fn set_time(&self, hour: u32, minute: u32, second: u32) -> Result<(), ValidationError> {
        let time = checked_time(hour, minute, second)?;
        self.update(|current| *current = current.date().and_time(time));
        Ok(())
    }

    fn set_date(&self, day: u32, month: u32, year: i32) -> Result<(), ValidationError> {
        let date = checked_date(day, month, year)?;
        self.update(|current| *current = date.and_time(current.time()));
        Ok(())
    }
}
