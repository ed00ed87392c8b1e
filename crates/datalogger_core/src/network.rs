//! Observador de rede: envia o último registro ao servidor via HTTP POST.
//!
//! O transporte é não bloqueante (`start_post` + `poll`); o cliente faz a
//! espera limitada contando ticks do escalonador. Em timeout o envio é
//! abortado e reportado, sem nova tentativa imediata: o próximo disparo da
//! tarefa é a nova tentativa.

use crate::pipeline::{Observer, RecordSlot, SampleRecord};
use crate::scheduler::TickSource;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Intervalo entre consultas ao transporte.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Erros de rede.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Nenhum registro disponível para envio")]
    NoData,

    #[error("URL inválida: {0}")]
    InvalidUrl(String),

    #[error("Falha de conexão: {0}")]
    Connect(String),

    #[error("Erro de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("Servidor respondeu {0}")]
    Status(u16),

    #[error("Timeout após {0} ticks")]
    Timeout(u64),
}

/// Estado de um POST em andamento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostStatus {
    InProgress,
    /// Resposta recebida com o código HTTP.
    Completed(u16),
    Failed(String),
}

/// Transporte HTTP não bloqueante.
pub trait HttpTransport {
    /// Inicia a conexão e o envio do corpo.
    fn start_post(&mut self, url: &str, body: &str) -> Result<(), NetworkError>;

    /// Avança o envio sem bloquear.
    fn poll(&mut self) -> PostStatus;

    /// Descarta o envio em andamento.
    fn abort(&mut self) {}
}

/// Cliente HTTP do datalogger.
pub struct HttpClient<T: HttpTransport> {
    transport: T,
    url: String,
    timeout_ticks: u64,
    slot: Rc<RecordSlot>,
    last_sent: Option<SampleRecord>,
}

impl<T: HttpTransport> HttpClient<T> {
    pub fn new(transport: T, url: impl Into<String>, timeout_ticks: u64) -> Self {
        Self {
            transport,
            url: url.into(),
            timeout_ticks,
            slot: Rc::new(RecordSlot::new()),
            last_sent: None,
        }
    }

    /// Handle a registrar no pipeline.
    pub fn observer(&self) -> Rc<dyn Observer> {
        self.slot.clone()
    }

    pub fn has_pending(&self) -> bool {
        self.slot.has_data()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Último registro aceito pelo servidor.
    pub fn last_sent(&self) -> Option<&SampleRecord> {
        self.last_sent.as_ref()
    }

    /// Envia o registro pendente e espera a resposta até o prazo.
    pub fn post_sensor_data(&mut self, ticks: &dyn TickSource) -> Result<(), NetworkError> {
        let record = self.slot.take().ok_or(NetworkError::NoData)?;
        self.transport.start_post(&self.url, record.as_str())?;

        let started = ticks.get_ticks();
        let deadline = started.saturating_add(self.timeout_ticks);
        debug!("POST {} iniciado no tick {started}", self.url);

        loop {
            match self.transport.poll() {
                PostStatus::InProgress => {}
                PostStatus::Completed(code) if (200..300).contains(&code) => {
                    info!("Registro enviado ({code})");
                    self.last_sent = Some(record);
                    return Ok(());
                }
                PostStatus::Completed(code) => {
                    warn!("Servidor rejeitou o registro: {code}");
                    return Err(NetworkError::Status(code));
                }
                PostStatus::Failed(reason) => {
                    warn!("Falha no envio: {reason}");
                    return Err(NetworkError::Connect(reason));
                }
            }

            let now = ticks.get_ticks();
            if now >= deadline {
                self.transport.abort();
                warn!("Timeout no envio para {}", self.url);
                return Err(NetworkError::Timeout(now - started));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::pipeline::ProcessingManager;
    use crate::sensors::{SensorBank, SimulatedWeather};
    use std::cell::Cell;
    use std::sync::Arc;

    /// Relógio de ticks que avança a cada consulta.
    struct SteppingTicks(Cell<u64>);

    impl TickSource for SteppingTicks {
        fn get_ticks(&self) -> u64 {
            let now = self.0.get();
            self.0.set(now + 1);
            now
        }
    }

    /// Transporte roteirizado: `InProgress` por `delay` consultas, depois `result`.
    struct Scripted {
        delay: usize,
        result: PostStatus,
        polls: usize,
        bodies: Vec<String>,
        aborted: bool,
        refuse: bool,
    }

    impl Scripted {
        fn new(delay: usize, result: PostStatus) -> Self {
            Self {
                delay,
                result,
                polls: 0,
                bodies: Vec::new(),
                aborted: false,
                refuse: false,
            }
        }
    }

    impl HttpTransport for Scripted {
        fn start_post(&mut self, _url: &str, body: &str) -> Result<(), NetworkError> {
            if self.refuse {
                return Err(NetworkError::Connect("recusado".into()));
            }
            self.polls = 0;
            self.bodies.push(body.to_string());
            Ok(())
        }

        fn poll(&mut self) -> PostStatus {
            self.polls += 1;
            if self.polls > self.delay {
                self.result.clone()
            } else {
                PostStatus::InProgress
            }
        }

        fn abort(&mut self) {
            self.aborted = true;
        }
    }

    fn notify(client: &HttpClient<Scripted>) -> ProcessingManager {
        let clock = Arc::new(FixedClock::at("01/01/2025 00:00:00").unwrap());
        let mut pm = ProcessingManager::new(
            clock,
            SensorBank::new().with_anemometer(SimulatedWeather::new(9)),
        );
        pm.set_observer(client.observer()).unwrap();
        pm.run_cycle().unwrap();
        pm
    }

    #[test]
    fn posts_latest_record() {
        let transport = Scripted::new(3, PostStatus::Completed(200));
        let mut client = HttpClient::new(transport, "http://x", 100);
        let pm = notify(&client);
        let ticks = SteppingTicks(Cell::new(0));

        client.post_sensor_data(&ticks).unwrap();

        assert_eq!(client.transport().bodies, vec![pm.mailbox().unwrap().to_string()]);
        assert_eq!(client.last_sent(), pm.mailbox());
        assert!(!client.has_pending());
    }

    #[test]
    fn nothing_to_send() {
        let transport = Scripted::new(0, PostStatus::Completed(200));
        let mut client = HttpClient::new(transport, "http://x", 10);
        let ticks = SteppingTicks(Cell::new(0));
        assert!(matches!(client.post_sensor_data(&ticks), Err(NetworkError::NoData)));
    }

    #[test]
    fn times_out_against_ticks() {
        let transport = Scripted::new(usize::MAX, PostStatus::Completed(200));
        let mut client = HttpClient::new(transport, "http://x", 5);
        let _pm = notify(&client);
        let ticks = SteppingTicks(Cell::new(100));

        let result = client.post_sensor_data(&ticks);
        assert!(matches!(result, Err(NetworkError::Timeout(n)) if n >= 5));
        assert!(client.transport().aborted);
        assert!(client.last_sent().is_none());
    }

    #[test]
    fn non_2xx_is_failure() {
        let transport = Scripted::new(0, PostStatus::Completed(503));
        let mut client = HttpClient::new(transport, "http://x", 10);
        let _pm = notify(&client);
        let ticks = SteppingTicks(Cell::new(0));
        assert!(matches!(client.post_sensor_data(&ticks), Err(NetworkError::Status(503))));
    }

    #[test]
    fn connect_failure_drops_record() {
        let mut transport = Scripted::new(0, PostStatus::Completed(200));
        transport.refuse = true;
        let mut client = HttpClient::new(transport, "http://x", 10);
        let _pm = notify(&client);
        let ticks = SteppingTicks(Cell::new(0));

        assert!(matches!(client.post_sensor_data(&ticks), Err(NetworkError::Connect(_))));
        // Sem retentativa imediata
        assert!(matches!(client.post_sensor_data(&ticks), Err(NetworkError::NoData)));
    }
}
