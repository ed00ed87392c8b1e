//! Thread da porta serial: lê linhas da entrada e entrega ao superloop.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// Linhas pendentes antes de começar a descartar.
const SERIAL_QUEUE: usize = 16;

/// Inicia a thread leitora sobre `input`. Retorna o receiver do channel.
///
/// O channel fecha quando a entrada termina (EOF).
pub fn spawn_reader<R>(input: R) -> std::io::Result<Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = bounded::<String>(SERIAL_QUEUE);

    std::thread::Builder::new()
        .name("serial-reader".into())
        .spawn(move || reader_loop(input, &tx))?;

    Ok(rx)
}

fn reader_loop<R: BufRead>(mut input: R, tx: &Sender<String>) {
    let mut line = String::new();
    loop {
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => {
                info!("Entrada serial encerrada");
                return;
            }
            Ok(_) => {
                // Non-blocking send: se o superloop está ocupado, descarta
                if tx.try_send(line.clone()).is_err() {
                    debug!("Fila serial cheia, descartando linha");
                }
            }
            Err(e) => {
                warn!("Erro ao ler entrada serial: {e}");
                return;
            }
        }
    }
}
