//! # genLogger Firmware (host)
//!
//! Build de host do datalogger: SysTick simulado em thread, terminal serial
//! sobre stdin/stdout, medições gravadas em diretório e enviadas via HTTP.
//!
//! ## Uso
//! ```bash
//! datalogger                       # usa config.toml ao lado do executável
//! RUST_LOG=debug datalogger        # log detalhado
//! ```

mod app;
mod host_sensors;
mod serial;
mod transport;

use app::{App, AppError, Peripherals};
use crossbeam_channel::RecvTimeoutError;
use datalogger_core::clock::{Clock, SimulatedRtc};
use datalogger_core::config::FirmwareConfig;
use datalogger_core::scheduler::TickSimulator;
use datalogger_core::sensors::{SensorBank, SimulatedWeather};
use datalogger_core::storage::FileStore;
use host_sensors::HostThermometer;
use std::io::BufReader;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use transport::TcpHttpTransport;

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = FirmwareConfig::default_path();
    let config = FirmwareConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!("Configuração inválida: {problem}");
        }
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Erro fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &FirmwareConfig) -> Result<(), AppError> {
    let tick = Duration::from_millis(config.scheduler.tick_ms);
    let clock: Arc<dyn Clock> = Arc::new(SimulatedRtc::new());
    let seed = u64::from(std::process::id());

    let sensors = SensorBank::new()
        .with_thermometer(HostThermometer::new())
        .with_hygrometer(SimulatedWeather::new(seed))
        .with_pluviometer(SimulatedWeather::new(seed.wrapping_add(1)))
        .with_anemometer(SimulatedWeather::new(seed.wrapping_add(2)));

    let peripherals = Peripherals {
        internal: FileStore::new(config.storage.internal_dir.clone()),
        external: FileStore::new(config.storage.external_dir.clone()),
        transport: config
            .network
            .enabled
            .then(|| TcpHttpTransport::new(Duration::from_millis(config.network.timeout_ms))),
        clock,
        sensors,
        console: std::io::stdout(),
    };
    let mut app = App::boot(config, peripherals)?;

    // ── Threads ──
    let _systick = TickSimulator::start(app.scheduler(), tick)?;
    let serial = serial::spawn_reader(BufReader::new(std::io::stdin()))?;

    info!(
        "Superloop iniciado (tick {} ms, metadados em {})",
        config.scheduler.tick_ms,
        config.storage.internal_dir.display()
    );

    // ── Superloop ──
    let mut serial_open = true;
    loop {
        let line = if serial_open {
            match serial.recv_timeout(tick) {
                Ok(line) => Some(line),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Terminal serial desconectado; seguindo sem entrada");
                    serial_open = false;
                    None
                }
            }
        } else {
            std::thread::sleep(tick);
            None
        };

        app.run_once(line.as_deref());
    }
}
