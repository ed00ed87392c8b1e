//! Validadores das entradas digitadas no terminal.
//!
//! Nenhum validador altera estado: o chamador só escreve na cópia de edição
//! quando recebe `Ok`.

use crate::metadata::{FileCreationPeriod, MAX_NAME_BYTES, MAX_PERIOD_MINUTES};

/// Erros de validação de entrada do usuário.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Entrada vazia")]
    Empty,

    #[error("Nome muito longo ({0} bytes, máximo {MAX_NAME_BYTES})")]
    NameTooLong(usize),

    #[error("Caractere inválido no nome: {0:?}")]
    InvalidNameChar(char),

    #[error("Valor numérico inválido: {0:?}")]
    NotANumber(String),

    #[error("Período fora do intervalo: {0} (0–{MAX_PERIOD_MINUTES} minutos)")]
    PeriodOutOfRange(u64),

    #[error("Código de período de arquivo inválido: {0} (0–4)")]
    InvalidFileCode(u64),

    #[error("Formato inválido, esperado HH:MM:SS DD/MM/YYYY")]
    TimeFormat,

    #[error("Hora fora do intervalo: {0:02}:{1:02}:{2:02}")]
    TimeOutOfRange(u32, u32, u32),

    #[error("Data fora do intervalo: {0:02}/{1:02}/{2:04}")]
    DateOutOfRange(u32, u32, i32),
}

/// Hora e data digitadas pelo usuário, já com faixas básicas verificadas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeInput {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

/// Valida o nome do dispositivo.
///
/// O nome vai para o registro delimitado por `;`, então separadores e
/// caracteres de controle são recusados.
pub fn validate_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(ValidationError::NameTooLong(name.len()));
    }
    if let Some(c) = name.chars().find(|c| *c == ';' || c.is_control()) {
        return Err(ValidationError::InvalidNameChar(c));
    }
    Ok(name.to_string())
}

/// Valida um período em minutos (transmissão, medição ou relatório).
pub fn parse_minutes(input: &str) -> Result<u32, ValidationError> {
    let value = parse_unsigned(input)?;
    if value > u64::from(MAX_PERIOD_MINUTES) {
        return Err(ValidationError::PeriodOutOfRange(value));
    }
    Ok(value as u32)
}

/// Valida o código do período de criação de arquivos.
pub fn parse_file_period(input: &str) -> Result<FileCreationPeriod, ValidationError> {
    let code = parse_unsigned(input)?;
    u8::try_from(code)
        .ok()
        .and_then(FileCreationPeriod::from_code)
        .ok_or(ValidationError::InvalidFileCode(code))
}

/// Interpreta `HH:MM:SS DD/MM/YYYY`.
///
/// Aceita campos com um dígito (`1:05:09 2/3/2024`). A validade do dia no
/// calendário (ex.: 31/02) fica a cargo do relógio.
pub fn parse_time_and_date(input: &str) -> Result<DateTimeInput, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut parts = input.split_whitespace();
    let (Some(time), Some(date), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ValidationError::TimeFormat);
    };

    let [hour, minute, second] = split_fields::<3>(time, ':', 2)?;
    let [day, month, year] = split_fields::<3>(date, '/', 4)?;

    if hour > 23 || minute > 59 || second > 59 {
        return Err(ValidationError::TimeOutOfRange(hour, minute, second));
    }
    if day == 0 || day > 31 || month == 0 || month > 12 || year > 9999 {
        return Err(ValidationError::DateOutOfRange(day, month, year as i32));
    }

    Ok(DateTimeInput {
        hour,
        minute,
        second,
        day,
        month,
        year: year as i32,
    })
}

fn parse_unsigned(input: &str) -> Result<u64, ValidationError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NotANumber(text.to_string()));
    }
    text.parse::<u64>()
        .map_err(|_| ValidationError::NotANumber(text.to_string()))
}

/// Separa `N` campos numéricos; o último campo aceita até `last_width` dígitos,
/// os demais até 2.
fn split_fields<const N: usize>(
    text: &str,
    sep: char,
    last_width: usize,
) -> Result<[u32; N], ValidationError> {
    let mut out = [0u32; N];
    let mut count = 0;
    for (i, field) in text.split(sep).enumerate() {
        if i >= N {
            return Err(ValidationError::TimeFormat);
        }
        let width = if i == N - 1 { last_width } else { 2 };
        if field.is_empty() || field.len() > width || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::TimeFormat);
        }
        out[i] = field.parse().map_err(|_| ValidationError::TimeFormat)?;
        count += 1;
    }
    if count != N {
        return Err(ValidationError::TimeFormat);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_time_and_date() {
        let dt = parse_time_and_date("14:30:45 23/05/2025").unwrap();
        assert_eq!((dt.hour, dt.minute, dt.second), (14, 30, 45));
        assert_eq!((dt.day, dt.month, dt.year), (23, 5, 2025));

        let dt = parse_time_and_date("01:05:09 02/03/2024").unwrap();
        assert_eq!((dt.hour, dt.minute, dt.second), (1, 5, 9));
        assert_eq!((dt.day, dt.month, dt.year), (2, 3, 2024));
    }

    #[test]
    fn rejects_malformed_time_and_date() {
        assert_eq!(
            parse_time_and_date("14-30-45 23-05-2025"),
            Err(ValidationError::TimeFormat)
        );
        assert_eq!(
            parse_time_and_date("14:30 23/05/2025"),
            Err(ValidationError::TimeFormat)
        );
        assert!(matches!(
            parse_time_and_date("25:70:99 32/13/2025"),
            Err(ValidationError::TimeOutOfRange(25, 70, 99))
        ));
        assert_eq!(parse_time_and_date(""), Err(ValidationError::Empty));
        assert_eq!(
            parse_time_and_date("12:00:00 01/01/2025 extra"),
            Err(ValidationError::TimeFormat)
        );
    }

    #[test]
    fn rejects_out_of_range_date() {
        assert!(matches!(
            parse_time_and_date("12:00:00 00/05/2025"),
            Err(ValidationError::DateOutOfRange(0, 5, 2025))
        ));
    }

    #[test]
    fn name_rules() {
        assert_eq!(validate_name("  station1 ").unwrap(), "station1");
        assert_eq!(validate_name(""), Err(ValidationError::Empty));
        assert_eq!(
            validate_name("a;b"),
            Err(ValidationError::InvalidNameChar(';'))
        );
        let long = "x".repeat(MAX_NAME_BYTES + 1);
        assert_eq!(
            validate_name(&long),
            Err(ValidationError::NameTooLong(MAX_NAME_BYTES + 1))
        );
        assert!(validate_name(&"x".repeat(MAX_NAME_BYTES)).is_ok());
    }

    #[test]
    fn minutes_rules() {
        assert_eq!(parse_minutes("15"), Ok(15));
        assert_eq!(parse_minutes("0"), Ok(0));
        assert!(matches!(parse_minutes("-1"), Err(ValidationError::NotANumber(_))));
        assert!(matches!(parse_minutes("1.5"), Err(ValidationError::NotANumber(_))));
        assert!(matches!(
            parse_minutes("99999"),
            Err(ValidationError::PeriodOutOfRange(99999))
        ));
    }

    #[test]
    fn file_period_codes() {
        assert_eq!(parse_file_period("0"), Ok(FileCreationPeriod::Daily));
        assert_eq!(parse_file_period("4"), Ok(FileCreationPeriod::Once));
        assert_eq!(parse_file_period("5"), Err(ValidationError::InvalidFileCode(5)));
        assert_eq!(
            parse_file_period("300"),
            Err(ValidationError::InvalidFileCode(300))
        );
    }
}
