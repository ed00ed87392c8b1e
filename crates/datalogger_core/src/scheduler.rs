//! Escalonador cooperativo baseado em flags.
//!
//! A fonte de tick (interrupção na placa, thread de 1 ms no host) chama
//! [`Scheduler::on_tick`], que incrementa um contador monotônico e, para cada
//! tarefa cujo período divide o contador, levanta a flag de execução. O
//! superloop consulta as flags em ordem fixa:
//!
//! ```text
//! configuração → medição → logger → rede
//! ```
//!
//! A ordem é parte do contrato: uma tarefa lenta atrasa todas as seguintes.
//! Flags não acumulam; um ciclo perdido é simplesmente perdido.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Máximo de tarefas periódicas registradas.
pub const MAX_TASKS: usize = 4;

pub const MS_IN_ONE_MINUTE: u64 = 60_000;

/// Erros do escalonador.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Limite de tarefas atingido ({MAX_TASKS})")]
    TaskCapacity,

    #[error("Período de tick inválido: 0 ms")]
    ZeroTick,

    #[error("Falha ao criar thread de tick: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Descritor de tarefa: período em ticks e flag de execução.
///
/// O escalonador só levanta a flag; quem a consome é a tarefa.
#[derive(Debug)]
pub struct TaskControl {
    name: &'static str,
    period: AtomicU64,
    run: AtomicBool,
}

impl TaskControl {
    /// `period_ticks == 0` desativa a tarefa.
    pub fn new(name: &'static str, period_ticks: u64) -> Self {
        Self {
            name,
            period: AtomicU64::new(period_ticks),
            run: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> u64 {
        self.period.load(Ordering::Relaxed)
    }

    pub fn set_period(&self, period_ticks: u64) {
        self.period.store(period_ticks, Ordering::Relaxed);
    }

    /// Flag levantada e ainda não consumida.
    pub fn is_pending(&self) -> bool {
        self.run.load(Ordering::Acquire)
    }

    /// Levanta a flag fora do tick (ex.: medição imediata no boot).
    pub fn trigger(&self) {
        self.run.store(true, Ordering::Release);
    }

    /// Consome a flag: retorna `true` uma única vez por disparo.
    pub fn take(&self) -> bool {
        self.run.swap(false, Ordering::AcqRel)
    }

    fn on_tick(&self, ticks: u64) {
        let period = self.period();
        if period != 0 && ticks % period == 0 {
            self.run.store(true, Ordering::Release);
        }
    }
}

/// Fonte de ticks para prazos (timeouts).
pub trait TickSource {
    fn get_ticks(&self) -> u64;
}

/// Contador de ticks e lista de tarefas.
#[derive(Debug, Default)]
pub struct Scheduler {
    ticks: AtomicU64,
    tasks: Vec<Arc<TaskControl>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra uma tarefa. Só é possível antes de compartilhar o escalonador.
    pub fn register(&mut self, task: Arc<TaskControl>) -> Result<(), SchedulerError> {
        if self.tasks.len() >= MAX_TASKS {
            return Err(SchedulerError::TaskCapacity);
        }
        debug!("Tarefa registrada: {} ({} ticks)", task.name(), task.period());
        self.tasks.push(task);
        Ok(())
    }

    /// Um tick de hardware.
    pub fn on_tick(&self) {
        let ticks = self.ticks.fetch_add(1, Ordering::AcqRel) + 1;
        for task in &self.tasks {
            task.on_tick(ticks);
        }
    }

    /// Ticks desde o início; base para timeouts.
    pub fn get_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn tasks(&self) -> &[Arc<TaskControl>] {
        &self.tasks
    }
}

impl TickSource for Scheduler {
    fn get_ticks(&self) -> u64 {
        Scheduler::get_ticks(self)
    }
}

/// Converte minutos em ticks para um tick de `tick_ms`.
pub fn minutes_to_ticks(minutes: u32, tick_ms: u64) -> u64 {
    if tick_ms == 0 {
        return 0;
    }
    u64::from(minutes) * MS_IN_ONE_MINUTE / tick_ms
}

/// Converte milissegundos em ticks (mínimo 1 quando `ms > 0`).
pub fn ms_to_ticks(ms: u64, tick_ms: u64) -> u64 {
    if tick_ms == 0 {
        return 0;
    }
    let ticks = ms / tick_ms;
    if ms > 0 { ticks.max(1) } else { 0 }
}

// ──────────────────────────────────────────────
// Simulação do SysTick (host)
// ──────────────────────────────────────────────

/// Thread que chama [`Scheduler::on_tick`] a cada `tick`.
#[derive(Debug)]
pub struct TickSimulator {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TickSimulator {
    pub fn start(scheduler: Arc<Scheduler>, tick: Duration) -> Result<Self, SchedulerError> {
        if tick.is_zero() {
            return Err(SchedulerError::ZeroTick);
        }
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("systick".into())
            .spawn(move || {
                let mut next = Instant::now() + tick;
                while flag.load(Ordering::Acquire) {
                    scheduler.on_tick();
                    let now = Instant::now();
                    if next > now {
                        std::thread::sleep(next - now);
                    }
                    next += tick;
                }
            })?;

        info!("SysTick simulado iniciado ({} µs)", tick.as_micros());
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TickSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}
