//! Termômetro do host via `sysinfo`.

use datalogger_core::sensors::Thermometer;
use sysinfo::Components;
use tracing::debug;

/// Lê a maior temperatura plausível entre os componentes do host.
pub struct HostThermometer {
    components: Components,
}

impl HostThermometer {
    pub fn new() -> Self {
        let components = Components::new_with_refreshed_list();
        debug!("Componentes térmicos do host: {}", components.iter().count());
        Self { components }
    }
}

impl Default for HostThermometer {
    fn default() -> Self {
        Self::new()
    }
}

impl Thermometer for HostThermometer {
    fn read_temperature(&mut self) -> Option<f32> {
        self.components.refresh(true);
        hottest(self.components.iter().filter_map(|c| c.temperature()))
    }
}

/// Maior leitura entre 0 e 150 °C; sensores com valores absurdos são ignorados.
fn hottest(readings: impl Iterator<Item = f32>) -> Option<f32> {
    readings
        .filter(|t| t.is_finite() && *t > 0.0 && *t < 150.0)
        .fold(None, |best: Option<f32>, t| Some(best.map_or(t, |b| b.max(t))))
}
