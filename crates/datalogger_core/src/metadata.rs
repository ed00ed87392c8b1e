//! Metadados persistidos do logger.
//!
//! O registro ocupa uma única linha de texto, campos separados por `;`:
//!
//! ```text
//! ┌──────┬──────────────┬─────────────┬─────────────┬─────────────┐
//! │ nome │ per. arquivo │ transmissão │ medição     │ relatório   │
//! │      │ (código 0–4) │ (minutos)   │ (minutos)   │ (minutos)   │
//! └──────┴──────────────┴─────────────┴─────────────┴─────────────┘
//! ```
//!
//! O parser é tolerante: um campo numérico inválido ou ausente mantém o valor
//! anterior em memória.

use std::fmt;

/// Tamanho do buffer de nome no dispositivo (inclui o terminador nulo).
pub const LOGGER_NAME_LEN: usize = 96;

/// Maior nome armazenável.
pub const MAX_NAME_BYTES: usize = LOGGER_NAME_LEN - 1;

/// Maior período configurável (uma semana).
pub const MAX_PERIOD_MINUTES: u32 = 10_080;

/// Campos de um registro completo.
pub const RECORD_FIELDS: usize = 5;

/// Menor quantidade de campos para o registro ser aceito.
pub const MIN_RECORD_FIELDS: usize = 1;

pub const FIELD_SEPARATOR: char = ';';

/// Registro gravado quando o armazenamento está vazio.
pub const DEFAULT_RECORD: &str = "defaultLogger;1;1;1;1";

/// Erros ao interpretar um registro.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("Registro com poucos campos ({found}, mínimo {MIN_RECORD_FIELDS})")]
    TooFewFields { found: usize },
}

/// Período de criação de arquivos de medição.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCreationPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Once,
}

impl FileCreationPeriod {
    pub const fn code(self) -> u8 {
        match self {
            Self::Daily => 0,
            Self::Weekly => 1,
            Self::Monthly => 2,
            Self::Yearly => 3,
            Self::Once => 4,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Daily),
            1 => Some(Self::Weekly),
            2 => Some(Self::Monthly),
            3 => Some(Self::Yearly),
            4 => Some(Self::Once),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Daily => "diário",
            Self::Weekly => "semanal",
            Self::Monthly => "mensal",
            Self::Yearly => "anual",
            Self::Once => "arquivo único",
        }
    }
}

/// Configuração persistida do dispositivo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerMetadata {
    /// Nome do dispositivo (≤ [`MAX_NAME_BYTES`])
    pub name: String,
    pub file_creation_period: FileCreationPeriod,
    /// Período de transmissão (minutos)
    pub transmission_period: u32,
    /// Período de medição (minutos)
    pub measurement_period: u32,
    /// Período de relatório (minutos)
    pub report_period: u32,
}

impl Default for LoggerMetadata {
    fn default() -> Self {
        Self {
            name: "defaultLogger".into(),
            file_creation_period: FileCreationPeriod::Weekly,
            transmission_period: 1,
            measurement_period: 1,
            report_period: 1,
        }
    }
}

impl LoggerMetadata {
    /// Serializa no formato persistido (sem quebra de linha).
    pub fn to_record(&self) -> String {
        self.to_string()
    }

    /// Constrói a partir de um registro, partindo dos valores padrão.
    pub fn from_record(record: &str) -> Result<Self, MetadataError> {
        let mut metadata = Self::default();
        metadata.apply_record(record)?;
        Ok(metadata)
    }

    /// Aplica um registro sobre os valores atuais, campo a campo.
    ///
    /// Campos ausentes ou que falham na conversão mantêm o valor anterior.
    /// Retorna a quantidade de campos presentes no registro.
    pub fn apply_record(&mut self, record: &str) -> Result<usize, MetadataError> {
        let line = record
            .split(['\n', '\0'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('\r');

        let fields: Vec<&str> = if line.trim().is_empty() {
            Vec::new()
        } else {
            line.split(FIELD_SEPARATOR).take(RECORD_FIELDS).collect()
        };

        if fields.len() < MIN_RECORD_FIELDS {
            return Err(MetadataError::TooFewFields {
                found: fields.len(),
            });
        }

        let name = fields[0].trim();
        if !name.is_empty() {
            self.name = truncate_name(name);
        }

        if let Some(period) = fields
            .get(1)
            .and_then(|f| f.trim().parse::<u8>().ok())
            .and_then(FileCreationPeriod::from_code)
        {
            self.file_creation_period = period;
        }

        let periods = [
            &mut self.transmission_period,
            &mut self.measurement_period,
            &mut self.report_period,
        ];
        for (slot, field) in periods.into_iter().zip(fields.iter().skip(2)) {
            if let Ok(value) = field.trim().parse::<u32>() {
                *slot = value;
            }
        }

        Ok(fields.len())
    }
}

impl fmt::Display for LoggerMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.name,
            self.file_creation_period.code(),
            self.transmission_period,
            self.measurement_period,
            self.report_period,
            sep = FIELD_SEPARATOR
        )
    }
}

/// Corta o nome em [`MAX_NAME_BYTES`] respeitando limites de caractere.
fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_BYTES {
        return name.to_string();
    }
    let mut end = MAX_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_default_record() {
        assert_eq!(LoggerMetadata::default().to_record(), DEFAULT_RECORD);
        assert_eq!(
            LoggerMetadata::from_record(DEFAULT_RECORD).unwrap(),
            LoggerMetadata::default()
        );
    }

    #[test]
    fn record_roundtrip() {
        let original = LoggerMetadata {
            name: "station-7".into(),
            file_creation_period: FileCreationPeriod::Monthly,
            transmission_period: 15,
            measurement_period: 5,
            report_period: MAX_PERIOD_MINUTES,
        };
        let parsed = LoggerMetadata::from_record(&format!("{}\n", original.to_record())).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn boundary_values_roundtrip() {
        // 47 × 'é' (2 bytes) + 'x' = 95 bytes
        let long_name = format!("{}x", "é".repeat(47));
        assert_eq!(long_name.len(), MAX_NAME_BYTES);

        for code in 0..=4u8 {
            let period = FileCreationPeriod::from_code(code).unwrap();
            for minutes in [0, MAX_PERIOD_MINUTES] {
                let original = LoggerMetadata {
                    name: long_name.clone(),
                    file_creation_period: period,
                    transmission_period: minutes,
                    measurement_period: minutes,
                    report_period: minutes,
                };
                let parsed = LoggerMetadata::from_record(&original.to_record()).unwrap();
                assert_eq!(parsed, original);
                assert_eq!(parsed.file_creation_period.code(), code);
            }
        }
        assert_eq!(FileCreationPeriod::from_code(5), None);
    }

    #[test]
    fn partial_record_keeps_previous_values() {
        let mut metadata = LoggerMetadata {
            name: "old".into(),
            file_creation_period: FileCreationPeriod::Daily,
            transmission_period: 10,
            measurement_period: 20,
            report_period: 30,
        };
        let seen = metadata.apply_record("stationX;2").unwrap();
        assert_eq!(seen, 2);
        assert_eq!(metadata.name, "stationX");
        assert_eq!(metadata.file_creation_period, FileCreationPeriod::Monthly);
        assert_eq!(metadata.transmission_period, 10);
        assert_eq!(metadata.measurement_period, 20);
        assert_eq!(metadata.report_period, 30);
    }

    #[test]
    fn bad_numeric_field_keeps_previous_value() {
        let mut metadata = LoggerMetadata::default();
        metadata.apply_record("abc;9;x;7;-3\r\n").unwrap();
        assert_eq!(metadata.name, "abc");
        assert_eq!(metadata.file_creation_period, FileCreationPeriod::Weekly);
        assert_eq!(metadata.transmission_period, 1);
        assert_eq!(metadata.measurement_period, 7);
        assert_eq!(metadata.report_period, 1);
    }

    #[test]
    fn empty_record_is_rejected() {
        let mut metadata = LoggerMetadata::default();
        assert_eq!(
            metadata.apply_record("\n"),
            Err(MetadataError::TooFewFields { found: 0 })
        );
        assert_eq!(metadata, LoggerMetadata::default());
    }

    #[test]
    fn long_name_is_truncated() {
        let record = format!("{};1;1;1;1", "é".repeat(60));
        let metadata = LoggerMetadata::from_record(&record).unwrap();
        assert!(metadata.name.len() <= MAX_NAME_BYTES);
        assert!(metadata.name.chars().all(|c| c == 'é'));
    }
}
