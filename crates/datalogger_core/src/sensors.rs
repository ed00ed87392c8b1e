//! Colaboradores de sensores.
//!
//! Cada leitura retorna `None` quando o sensor não está disponível; o
//! pipeline grava campo vazio nesse caso.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait Thermometer {
    /// Temperatura (°C)
    fn read_temperature(&mut self) -> Option<f32>;
}

pub trait Hygrometer {
    /// Umidade relativa (%)
    fn read_humidity(&mut self) -> Option<u8>;
}

pub trait Pluviometer {
    /// Chuva acumulada desde a última leitura (mm)
    fn read_rain(&mut self) -> Option<u16>;
}

pub trait Anemometer {
    /// Velocidade do vento (m/s)
    fn read_wind_speed(&mut self) -> Option<u16>;
}

/// Leituras brutas de um ciclo de medição.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    pub temperature: Option<f32>,
    pub humidity: Option<u8>,
    pub rain_mm: Option<u16>,
    pub wind_speed: Option<u16>,
}

/// Conjunto de sensores configurados no dispositivo.
#[derive(Default)]
pub struct SensorBank {
    thermometer: Option<Box<dyn Thermometer + Send>>,
    hygrometer: Option<Box<dyn Hygrometer + Send>>,
    pluviometer: Option<Box<dyn Pluviometer + Send>>,
    anemometer: Option<Box<dyn Anemometer + Send>>,
}

impl SensorBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thermometer(mut self, sensor: impl Thermometer + Send + 'static) -> Self {
        self.thermometer = Some(Box::new(sensor));
        self
    }

    pub fn with_hygrometer(mut self, sensor: impl Hygrometer + Send + 'static) -> Self {
        self.hygrometer = Some(Box::new(sensor));
        self
    }

    pub fn with_pluviometer(mut self, sensor: impl Pluviometer + Send + 'static) -> Self {
        self.pluviometer = Some(Box::new(sensor));
        self
    }

    pub fn with_anemometer(mut self, sensor: impl Anemometer + Send + 'static) -> Self {
        self.anemometer = Some(Box::new(sensor));
        self
    }

    /// Lê todos os sensores configurados.
    pub fn sample(&mut self) -> RawSample {
        RawSample {
            temperature: self.thermometer.as_mut().and_then(|s| s.read_temperature()),
            humidity: self.hygrometer.as_mut().and_then(|s| s.read_humidity()),
            rain_mm: self.pluviometer.as_mut().and_then(|s| s.read_rain()),
            wind_speed: self.anemometer.as_mut().and_then(|s| s.read_wind_speed()),
        }
    }

    /// Quantidade de sensores configurados.
    pub fn len(&self) -> usize {
        usize::from(self.thermometer.is_some())
            + usize::from(self.hygrometer.is_some())
            + usize::from(self.pluviometer.is_some())
            + usize::from(self.anemometer.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ──────────────────────────────────────────────
// Estação simulada (build de host)
// ──────────────────────────────────────────────

/// Estação meteorológica simulada com passeio aleatório semeado.
#[derive(Debug, Clone)]
pub struct SimulatedWeather {
    rng: StdRng,
    temperature: f32,
    humidity: f32,
}

impl SimulatedWeather {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            temperature: 22.0,
            humidity: 55.0,
        }
    }
}

impl Thermometer for SimulatedWeather {
    fn read_temperature(&mut self) -> Option<f32> {
        self.temperature = (self.temperature + self.rng.gen_range(-0.5..=0.5)).clamp(-40.0, 85.0);
        Some(self.temperature)
    }
}

impl Hygrometer for SimulatedWeather {
    fn read_humidity(&mut self) -> Option<u8> {
        self.humidity = (self.humidity + self.rng.gen_range(-2.0..=2.0)).clamp(0.0, 100.0);
        Some(self.humidity.round() as u8)
    }
}

impl Pluviometer for SimulatedWeather {
    fn read_rain(&mut self) -> Option<u16> {
        // Maioria dos ciclos sem chuva
        if self.rng.gen_bool(0.8) {
            Some(0)
        } else {
            Some(self.rng.gen_range(1..=12))
        }
    }
}

impl Anemometer for SimulatedWeather {
    fn read_wind_speed(&mut self) -> Option<u16> {
        Some(self.rng.gen_range(0..=25))
    }
}
