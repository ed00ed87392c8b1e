//! Contexto da aplicação: dono de todos os componentes do firmware.
//!
//! Cada iteração do superloop roda as quatro tarefas sempre na mesma ordem:
//!
//! ```text
//! configuração → medição → logger → rede
//! ```

use datalogger_core::clock::Clock;
use datalogger_core::config::FirmwareConfig;
use datalogger_core::logger::LoggerManager;
use datalogger_core::mediator::ConfigManager;
use datalogger_core::metadata::LoggerMetadata;
use datalogger_core::network::HttpClient;
use datalogger_core::network::HttpTransport;
use datalogger_core::pipeline::{PipelineError, ProcessingManager};
use datalogger_core::scheduler::{
    Scheduler, SchedulerError, TaskControl, minutes_to_ticks, ms_to_ticks,
};
use datalogger_core::sensors::SensorBank;
use datalogger_core::storage::{ByteStore, MetadataStore, StorageError};
use datalogger_core::terminal::{self, Signal, TerminalState, TerminalStateMachine};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Erros fatais de inicialização.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Armazenamento: {0}")]
    Storage(#[from] StorageError),

    #[error("Escalonador: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Erro de E/S: {0}")]
    Io(#[from] std::io::Error),
}

/// Colaboradores externos entregues ao boot.
pub struct Peripherals<I, E, T, W> {
    /// Store interno (metadados)
    pub internal: I,
    /// Store externo (medições)
    pub external: E,
    /// `None` desativa a tarefa de rede
    pub transport: Option<T>,
    pub clock: Arc<dyn Clock>,
    pub sensors: SensorBank,
    /// Saída do terminal
    pub console: W,
}

pub struct App<I: ByteStore, E: ByteStore, T: HttpTransport, W: Write> {
    tick_ms: u64,
    scheduler: Arc<Scheduler>,
    measurement: Arc<TaskControl>,
    config_manager: ConfigManager<I>,
    terminal: TerminalStateMachine<W>,
    processing: ProcessingManager,
    logger: LoggerManager<E>,
    network: Option<HttpClient<T>>,
}

impl<I: ByteStore, E: ByteStore, T: HttpTransport, W: Write> App<I, E, T, W> {
    /// Sequência de boot. Qualquer erro aqui é fatal.
    pub fn boot(
        config: &FirmwareConfig,
        peripherals: Peripherals<I, E, T, W>,
    ) -> Result<Self, AppError> {
        let Peripherals {
            internal,
            external,
            transport,
            clock,
            sensors,
            console,
        } = peripherals;
        let tick_ms = config.scheduler.tick_ms;

        // ── Armazenamento interno + metadados ──
        let mut storage = MetadataStore::new(internal, config.storage.metadata_file.clone());
        storage.init_fs()?;
        let metadata = storage.boot()?.clone();
        let mut config_manager = ConfigManager::new(storage);

        // ── Terminal ──
        let mut terminal = TerminalStateMachine::new(clock.clone(), metadata.clone(), console);
        terminal.init(TerminalState::Init);
        terminal.handler(Signal::Entry, None, &mut config_manager);

        // ── Pipeline e observadores ──
        let mut processing = ProcessingManager::new(clock.clone(), sensors);

        let mut logger = LoggerManager::new(external, clock, &metadata);
        logger.init()?;
        processing.set_observer(logger.observer())?;

        let network = match transport {
            Some(transport) if config.network.enabled => {
                let timeout = ms_to_ticks(config.network.timeout_ms, tick_ms);
                let client = HttpClient::new(transport, config.network.server_url.clone(), timeout);
                processing.set_observer(client.observer())?;
                info!("Rede ativa → {}", client.url());
                Some(client)
            }
            _ => {
                info!("Rede desativada");
                None
            }
        };

        // ── Escalonador ──
        let measurement = Arc::new(TaskControl::new(
            "medição",
            minutes_to_ticks(metadata.measurement_period, tick_ms),
        ));
        let mut scheduler = Scheduler::new();
        scheduler.register(Arc::clone(&measurement))?;
        // Primeira medição logo após o boot
        measurement.trigger();

        info!(
            "Boot concluído: {} (medição a cada {} min)",
            metadata.name, metadata.measurement_period
        );

        Ok(Self {
            tick_ms,
            scheduler: Arc::new(scheduler),
            measurement,
            config_manager,
            terminal,
            processing,
            logger,
            network,
        })
    }

    /// Uma iteração do superloop.
    pub fn run_once(&mut self, line: Option<&str>) {
        self.configuration_task(line);
        self.measurement_task();
        self.logger_task();
        self.network_task();
    }

    /// Entrada do terminal e propagação de metadados recém-gravados.
    pub fn configuration_task(&mut self, line: Option<&str>) {
        if let Some(line) = line {
            let (signal, payload) = terminal::parse_input(line);
            let event = self.terminal.handler(signal, payload, &mut self.config_manager);
            debug!("Terminal: {signal:?} → {event:?}");
        }

        if self.config_manager.storage_mut().take_changed() {
            let metadata = self.config_manager.storage().metadata().clone();
            self.apply_metadata(&metadata);
        }
    }

    pub fn measurement_task(&mut self) {
        if !self.measurement.take() {
            return;
        }
        match self.processing.run_cycle() {
            Ok(notified) => debug!("Medição notificada a {notified} observadores"),
            Err(e) => warn!("Falha no ciclo de medição: {e}"),
        }
    }

    pub fn logger_task(&mut self) {
        if !self.logger.has_pending() {
            return;
        }
        if let Err(e) = self.logger.handler() {
            warn!("Falha ao gravar medição: {e}");
        }
    }

    pub fn network_task(&mut self) {
        let Some(client) = self.network.as_mut() else {
            return;
        };
        if !client.has_pending() {
            return;
        }
        if let Err(e) = client.post_sensor_data(self.scheduler.as_ref()) {
            warn!("Envio não realizado: {e}");
        }
    }

    fn apply_metadata(&mut self, metadata: &LoggerMetadata) {
        let period = minutes_to_ticks(metadata.measurement_period, self.tick_ms);
        if self.measurement.period() != period {
            info!(
                "Período de medição: {} min ({period} ticks)",
                metadata.measurement_period
            );
            self.measurement.set_period(period);
        }
        self.logger.apply_metadata(metadata);
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    #[cfg(test)]
    pub fn measurement(&self) -> &TaskControl {
        &self.measurement
    }

    #[cfg(test)]
    pub fn metadata(&self) -> &LoggerMetadata {
        self.config_manager.storage().metadata()
    }

    #[cfg(test)]
    pub fn terminal(&self) -> &TerminalStateMachine<W> {
        &self.terminal
    }

    #[cfg(test)]
    pub fn processing(&self) -> &ProcessingManager {
        &self.processing
    }

    #[cfg(test)]
    pub fn logger(&self) -> &LoggerManager<E> {
        &self.logger
    }

    #[cfg(test)]
    pub fn network(&self) -> Option<&HttpClient<T>> {
        self.network.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalogger_core::clock::FixedClock;
    use datalogger_core::metadata::DEFAULT_RECORD;
    use datalogger_core::network::{NetworkError, PostStatus};
    use datalogger_core::sensors::SimulatedWeather;
    use datalogger_core::storage::MemoryStore;

    /// Transporte que aceita tudo na primeira consulta.
    #[derive(Default)]
    struct Accepting {
        bodies: Vec<String>,
    }

    impl HttpTransport for Accepting {
        fn start_post(&mut self, _url: &str, body: &str) -> Result<(), NetworkError> {
            self.bodies.push(body.to_string());
            Ok(())
        }

        fn poll(&mut self) -> PostStatus {
            PostStatus::Completed(200)
        }
    }

    type TestApp = App<MemoryStore, MemoryStore, Accepting, Vec<u8>>;

    fn boot_with(internal: MemoryStore, transport: Option<Accepting>) -> TestApp {
        let peripherals = Peripherals {
            internal,
            external: MemoryStore::new(),
            transport,
            clock: Arc::new(FixedClock::at("07/03/2025 10:00:00").unwrap()),
            sensors: SensorBank::new()
                .with_thermometer(SimulatedWeather::new(1))
                .with_hygrometer(SimulatedWeather::new(2)),
            console: Vec::new(),
        };
        App::boot(&FirmwareConfig::default(), peripherals).unwrap()
    }

    fn console(app: &TestApp) -> String {
        String::from_utf8_lossy(app.terminal().output()).into_owned()
    }

    #[test]
    fn boot_without_record_creates_default() {
        let app = boot_with(MemoryStore::new(), None);
        assert_eq!(app.metadata().to_record(), DEFAULT_RECORD);
        // 1 minuto com tick de 1 ms
        assert_eq!(app.measurement().period(), 60_000);
        assert!(console(&app).contains("Menu de ajuda"));
    }

    #[test]
    fn boot_fails_when_store_cannot_mount() {
        let mut internal = MemoryStore::new();
        internal.fail_mount = true;
        let peripherals: Peripherals<_, _, Accepting, _> = Peripherals {
            internal,
            external: MemoryStore::new(),
            transport: None,
            clock: Arc::new(FixedClock::at("07/03/2025 10:00:00").unwrap()),
            sensors: SensorBank::new(),
            console: Vec::new(),
        };
        assert!(matches!(
            App::boot(&FirmwareConfig::default(), peripherals),
            Err(AppError::Storage(_))
        ));
    }

    #[test]
    fn first_iteration_measures_logs_and_posts() {
        let mut app = boot_with(MemoryStore::new(), Some(Accepting::default()));
        app.run_once(None);

        let record = app.processing().mailbox().unwrap().to_string();
        let file = app
            .logger()
            .store()
            .contents("defaultLogger_2025-W10.csv")
            .unwrap();
        assert_eq!(std::str::from_utf8(file).unwrap(), record);

        let network = app.network().unwrap();
        assert_eq!(network.transport().bodies, vec![record]);
    }

    #[test]
    fn measurement_waits_for_period() {
        let mut app = boot_with(MemoryStore::with_file("metadata.txt", b"st;1;1;1;1\n"), None);
        app.run_once(None);
        app.run_once(None);
        assert_eq!(app.logger().store().file_names().len(), 1);

        let scheduler = app.scheduler();
        for _ in 0..59_999 {
            scheduler.on_tick();
        }
        assert!(!app.measurement().is_pending());
        scheduler.on_tick();
        assert!(app.measurement().is_pending());

        app.run_once(None);
        let file = app.logger().store().contents("st_2025-W10.csv").unwrap();
        assert_eq!(std::str::from_utf8(file).unwrap().lines().count(), 2);
    }

    #[test]
    fn terminal_rename_reaches_info_screen_and_logger() {
        let mut app = boot_with(MemoryStore::new(), None);
        for line in ["C\n", "N\n", "station1\n", "S\n", "B\n", "I\n"] {
            app.run_once(Some(line));
        }

        assert!(console(&app).contains("Nome do dispositivo: station1"));
        assert_eq!(app.metadata().name, "station1");

        app.measurement().trigger();
        app.run_once(None);
        assert!(
            app.logger()
                .store()
                .contents("station1_2025-W10.csv")
                .is_some()
        );
    }

    #[test]
    fn saved_measurement_period_reschedules_task() {
        let mut app = boot_with(MemoryStore::new(), None);
        for line in ["C", "M", "0", "S"] {
            app.run_once(Some(line));
        }
        assert_eq!(app.measurement().period(), 0);

        let scheduler = app.scheduler();
        for _ in 0..120_000 {
            scheduler.on_tick();
        }
        assert!(!app.measurement().is_pending());
    }

    #[test]
    fn disabled_network_ignores_transport() {
        let mut config = FirmwareConfig::default();
        config.network.enabled = false;
        let peripherals = Peripherals {
            internal: MemoryStore::new(),
            external: MemoryStore::new(),
            transport: Some(Accepting::default()),
            clock: Arc::new(FixedClock::at("07/03/2025 10:00:00").unwrap()),
            sensors: SensorBank::new(),
            console: Vec::new(),
        };
        let app: TestApp = App::boot(&config, peripherals).unwrap();
        assert!(app.network().is_none());
        assert_eq!(app.processing().observer_count(), 1);
    }
}
