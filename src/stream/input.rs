//! Reading type records from a session.

use std::io::{self, Read};

use crate::descriptor::TypeDescriptor;
use crate::error::{ResolveError, ResolveResult};
use crate::loader::LoaderHandle;
use crate::resolver::{ResolveHooks, TypeResolver};
use crate::stream::header::{read_header, BASE_WIRE_HANDLE, TC_CLASSDESC, TC_PROXYCLASSDESC, TC_REFERENCE};

/// Limits applied while decoding records.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum interfaces in one proxy record.
    pub max_proxy_interfaces: usize,
    /// Maximum encoded length of a type name, in bytes.
    pub max_name_len: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_proxy_interfaces: 65_535,
            max_name_len: usize::from(u16::MAX),
        }
    }
}

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// What a handle refers to.
enum Slot {
    Resolved(TypeDescriptor),
    /// The record was read but its name(s) did not resolve.
    Failed(Vec<String>),
}

/// A deserialization session whose type records are resolved through hooks.
///
/// Each class or proxy record is assigned the next handle, starting at
/// [`BASE_WIRE_HANDLE`], whether or not it resolves; later back-references
/// to that handle return the same descriptor (or the same `TypeNotFound`)
/// without consulting the hooks again.
pub struct ObjectInput<R, H = TypeResolver> {
    reader: CountingReader<R>,
    hooks: H,
    config: StreamConfig,
    handles: Vec<Slot>,
}

impl<R: Read> ObjectInput<R, TypeResolver> {
    /// Opens a session reading from `source` and resolving through `loader`.
    ///
    /// Blocks until the stream header has been read.
    ///
    /// # Errors
    /// Any error reading or verifying the header.
    pub fn open(source: R, loader: LoaderHandle) -> io::Result<Self> {
        Self::with_hooks(source, TypeResolver::new(loader), StreamConfig::default())
    }

    /// The loader the session's resolver is bound to.
    #[must_use]
    pub fn loader(&self) -> &LoaderHandle {
        self.hooks.loader()
    }
}

impl<R: Read, H: ResolveHooks> ObjectInput<R, H> {
    /// Opens a session with explicit hooks and limits.
    ///
    /// # Errors
    /// Any error reading or verifying the header.
    pub fn with_hooks(source: R, hooks: H, config: StreamConfig) -> io::Result<Self> {
        let mut reader = CountingReader {
            inner: source,
            position: 0,
        };
        read_header(&mut reader)?;
        Ok(Self {
            reader,
            hooks,
            config,
            handles: Vec::new(),
        })
    }

    /// The resolution hooks.
    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Bytes consumed so far, header included.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.reader.position
    }

    /// Number of handles assigned in this session, failed records included.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Releases the underlying source.
    pub fn into_inner(self) -> R {
        self.reader.inner
    }

    /// Reads one type record and resolves it.
    ///
    /// # Errors
    /// Resolution errors from the hooks, or `Io` for read failures and
    /// malformed records (`InvalidData`).
    pub fn read_type(&mut self) -> ResolveResult<TypeDescriptor> {
        let start = self.reader.position;
        let tag = self.read_u8()?;
        match tag {
            TC_CLASSDESC => {
                let name = self.read_name()?;
                let resolved = self.hooks.resolve_type(&name);
                self.assign(resolved, vec![name])
            }
            TC_PROXYCLASSDESC => {
                let count = self.read_i32()?;
                let count = usize::try_from(count)
                    .ok()
                    .filter(|&n| n <= self.config.max_proxy_interfaces)
                    .ok_or_else(|| invalid(format!("invalid proxy interface count {count}")))?;
                let mut names = Vec::with_capacity(count);
                for _ in 0..count {
                    names.push(self.read_name()?);
                }
                let resolved = self.hooks.resolve_proxy_type(&names);
                self.assign(resolved, names)
            }
            TC_REFERENCE => {
                let handle = self.read_u32()?;
                let slot = handle
                    .checked_sub(BASE_WIRE_HANDLE)
                    .and_then(|idx| self.handles.get(idx as usize))
                    .ok_or_else(|| ResolveError::Io(invalid(format!("invalid handle 0x{handle:X}"))))?;
                match slot {
                    Slot::Resolved(ty) => Ok(ty.clone()),
                    Slot::Failed(names) => Err(ResolveError::TypeNotFound {
                        names: names.clone(),
                        source: Some(format!("handle 0x{handle:X} refers to a type that failed to resolve").into()),
                    }),
                }
            }
            other => {
                tracing::warn!(position = start, tag = other, "unexpected type record tag");
                Err(ResolveError::Io(invalid(format!(
                    "unexpected type code 0x{other:02X} at offset {start}"
                ))))
            }
        }
    }

    fn assign(&mut self, resolved: ResolveResult<TypeDescriptor>, names: Vec<String>) -> ResolveResult<TypeDescriptor> {
        let handle = BASE_WIRE_HANDLE as usize + self.handles.len();
        match resolved {
            Ok(ty) => {
                tracing::trace!(handle, name = ty.name(), "assigned handle");
                self.handles.push(Slot::Resolved(ty.clone()));
                Ok(ty)
            }
            Err(err) => {
                tracing::debug!(handle, names = ?names, error = %err, "reserved handle for unresolved record");
                self.handles.push(Slot::Failed(names));
                Err(err)
            }
        }
    }

    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.reader.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_name(&mut self) -> io::Result<String> {
        let mut len = [0u8; 2];
        self.reader.read_exact(&mut len)?;
        let len = usize::from(u16::from_be_bytes(len));
        if len > self.config.max_name_len {
            return Err(invalid(format!(
                "type name of {len} bytes exceeds limit of {}",
                self.config.max_name_len
            )));
        }
        let mut bytes = vec![0u8; len];
        self.reader.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|e| invalid(format!("type name is not UTF-8: {e}")))
    }
}
