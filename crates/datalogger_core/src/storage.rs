//! Armazenamento de bytes (colaborador externo) e ciclo de vida dos metadados.
//!
//! [`ByteStore`] abstrai o sistema de arquivos do dispositivo (LittleFS na
//! placa, diretório comum no host). [`MetadataStore`] é o componente de
//! armazenamento interno: monta o store, carrega o registro no boot (criando o
//! padrão se necessário) e regrava o registro inteiro a cada commit.

use crate::metadata::{DEFAULT_RECORD, LoggerMetadata, MetadataError};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maior registro de metadados lido do store.
pub const METADATA_BUFF_SIZE: usize = 256;

/// Modo de abertura de arquivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Cria ou trunca.
    Write,
    /// Acrescenta; falha se o arquivo não existir.
    Append,
}

/// Erros de armazenamento.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Falha ao montar o armazenamento: {0}")]
    Mount(String),

    #[error("Armazenamento não montado")]
    NotMounted,

    #[error("Falha ao abrir {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Nenhum arquivo aberto")]
    NotOpen,

    #[error("Erro de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arquivo vazio: {0}")]
    Empty(String),

    #[error("Registro inválido: {0}")]
    Parse(#[from] MetadataError),

    #[error("Registro de metadados não é UTF-8")]
    Encoding,
}

/// Contrato mínimo do sistema de arquivos: um arquivo aberto por vez.
pub trait ByteStore {
    fn mount(&mut self) -> Result<(), StorageError>;
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<(), StorageError>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;
    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError>;
    fn close(&mut self) -> Result<(), StorageError>;
}

/// Grava `data` em `path` de uma vez (open → write → close).
pub fn write_file(
    store: &mut dyn ByteStore,
    path: &str,
    mode: OpenMode,
    data: &[u8],
) -> Result<usize, StorageError> {
    store.open(path, mode)?;
    let written = store.write(data);
    let closed = store.close();
    let written = written?;
    closed?;
    Ok(written)
}

// ──────────────────────────────────────────────
// Store em diretório (host)
// ──────────────────────────────────────────────

/// Store sobre um diretório do host.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    mounted: bool,
    file: Option<File>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounted: false,
            file: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ByteStore for FileStore {
    fn mount(&mut self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| StorageError::Mount(format!("{}: {e}", self.root.display())))?;
        self.mounted = true;
        debug!("FileStore montado em {}", self.root.display());
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<(), StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        let full = self.root.join(path);
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true),
        };
        let file = options.open(&full).map_err(|e| StorageError::Open {
            path: full.display().to_string(),
            reason: e.to_string(),
        })?;
        self.file = Some(file);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let file = self.file.as_mut().ok_or(StorageError::NotOpen)?;
        Ok(file.read(buf)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        let file = self.file.as_mut().ok_or(StorageError::NotOpen)?;
        file.write_all(data)?;
        Ok(data.len())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        let mut file = self.file.take().ok_or(StorageError::NotOpen)?;
        file.flush()?;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Store em memória (testes)
// ──────────────────────────────────────────────

/// Store em memória com injeção de falhas.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: HashMap<String, Vec<u8>>,
    mounted: bool,
    open: Option<(String, OpenMode, usize)>,
    /// Faz `mount` falhar
    pub fail_mount: bool,
    /// Faz `write` falhar
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cria o store já com um arquivo.
    pub fn with_file(path: &str, contents: &[u8]) -> Self {
        let mut store = Self::default();
        store.files.insert(path.to_string(), contents.to_vec());
        store
    }

    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn file_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.files.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl ByteStore for MemoryStore {
    fn mount(&mut self) -> Result<(), StorageError> {
        if self.fail_mount {
            return Err(StorageError::Mount("falha simulada".into()));
        }
        self.mounted = true;
        Ok(())
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<(), StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        match mode {
            OpenMode::Read | OpenMode::Append if !self.files.contains_key(path) => {
                return Err(StorageError::Open {
                    path: path.to_string(),
                    reason: "arquivo inexistente".into(),
                });
            }
            OpenMode::Write => {
                self.files.insert(path.to_string(), Vec::new());
            }
            _ => {}
        }
        self.open = Some((path.to_string(), mode, 0));
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let (path, _, cursor) = self.open.as_mut().ok_or(StorageError::NotOpen)?;
        let data = self.files.get(path.as_str()).ok_or(StorageError::NotOpen)?;
        let remaining = data.len().saturating_sub(*cursor);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&data[*cursor..*cursor + n]);
        *cursor += n;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io(std::io::Error::other("falha simulada")));
        }
        let (path, mode, _) = self.open.as_ref().ok_or(StorageError::NotOpen)?;
        if *mode == OpenMode::Read {
            return Err(StorageError::Io(std::io::Error::other(
                "arquivo aberto somente para leitura",
            )));
        }
        let file = self.files.entry(path.clone()).or_default();
        file.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.open.take().map(|_| ()).ok_or(StorageError::NotOpen)
    }
}

/// Primeira linha do buffer lido, decodificada.
///
/// Bytes após `\n`/`\0` não são decodificados. Um caractere cortado no fim do
/// buffer é descartado.
fn first_line(raw: &[u8]) -> Result<&str, StorageError> {
    let line = raw
        .iter()
        .position(|b| *b == b'\n' || *b == 0)
        .map_or(raw, |end| &raw[..end]);
    match std::str::from_utf8(line) {
        Ok(text) => Ok(text),
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&line[..e.valid_up_to()]).map_err(|_| StorageError::Encoding)
        }
        Err(_) => Err(StorageError::Encoding),
    }
}

// ──────────────────────────────────────────────
// Componente de armazenamento interno
// ──────────────────────────────────────────────

/// Dono do registro de metadados em memória e do seu arquivo no store.
#[derive(Debug)]
pub struct MetadataStore<S: ByteStore> {
    store: S,
    file_name: String,
    metadata: LoggerMetadata,
    changed: bool,
}

impl<S: ByteStore> MetadataStore<S> {
    pub fn new(store: S, file_name: impl Into<String>) -> Self {
        Self {
            store,
            file_name: file_name.into(),
            metadata: LoggerMetadata::default(),
            changed: false,
        }
    }

    /// Monta o store subjacente.
    pub fn init_fs(&mut self) -> Result<(), StorageError> {
        self.store.mount()
    }

    /// Carregamento de boot.
    ///
    /// Se o registro não existir ou não puder ser lido, grava
    /// [`DEFAULT_RECORD`] e o adota. Falhar ao gravar o padrão é fatal.
    pub fn boot(&mut self) -> Result<&LoggerMetadata, StorageError> {
        let loaded = self.retrieve_metadata().map(|_| ());
        match loaded {
            Ok(()) => {
                info!(
                    "Metadados carregados de {}: {}",
                    self.file_name, self.metadata
                );
            }
            Err(e) => {
                warn!("Metadados indisponíveis ({e}); criando registro padrão");
                self.store_metadata(DEFAULT_RECORD)?;
                info!("Registro padrão criado: {DEFAULT_RECORD}");
            }
        }
        Ok(&self.metadata)
    }

    /// Relê o registro do store.
    ///
    /// Campos inválidos mantêm o valor anterior; só falha com arquivo
    /// inexistente, vazio, ilegível ou com menos campos que o mínimo.
    pub fn retrieve_metadata(&mut self) -> Result<&LoggerMetadata, StorageError> {
        let mut buf = [0u8; METADATA_BUFF_SIZE];
        self.store.open(&self.file_name, OpenMode::Read)?;
        let read = self.store.read(&mut buf);
        let closed = self.store.close();
        let len = read?;
        closed?;

        if len == 0 {
            return Err(StorageError::Empty(self.file_name.clone()));
        }
        let text = first_line(&buf[..len])?;
        let fields = self.metadata.apply_record(text)?;
        debug!("Registro lido com {fields} campos");

        self.changed = true;
        Ok(&self.metadata)
    }

    /// Substitui o registro no store e adota o novo conteúdo.
    ///
    /// O buffer é validado antes de tocar no store.
    pub fn store_metadata(&mut self, record: &str) -> Result<(), StorageError> {
        let mut next = self.metadata.clone();
        next.apply_record(record)?;

        let line = format!("{}\n", next.to_record());
        write_file(&mut self.store, &self.file_name, OpenMode::Write, line.as_bytes())?;

        self.metadata = next;
        self.changed = true;
        info!("Metadados gravados: {}", self.metadata);
        Ok(())
    }

    pub fn metadata(&self) -> &LoggerMetadata {
        &self.metadata
    }

    /// Lê e limpa a flag de alteração.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Período de medição em minutos.
    pub fn measurement_period(&self) -> u32 {
        self.metadata.measurement_period
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
