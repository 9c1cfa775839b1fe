//! Writing type records.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::stream::header::{write_header, BASE_WIRE_HANDLE, TC_CLASSDESC, TC_PROXYCLASSDESC, TC_REFERENCE};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RecordKey {
    Type(String),
    Proxy(Vec<String>),
}

/// Writes the records `ObjectInput` reads.
///
/// Repeated records are replaced by back-references to the handle assigned
/// the first time, so a reader resolves each distinct name only once.
pub struct ObjectOutput<W> {
    sink: W,
    handles: HashMap<RecordKey, u32>,
}

impl<W: Write> ObjectOutput<W> {
    /// Starts a stream, writing the header immediately.
    ///
    /// # Errors
    /// Any error of the sink.
    pub fn new(mut sink: W) -> io::Result<Self> {
        write_header(&mut sink)?;
        Ok(Self {
            sink,
            handles: HashMap::new(),
        })
    }

    /// Writes a plain type record (or a reference to it). Returns its handle.
    ///
    /// Nothing is written when the name cannot be encoded.
    ///
    /// # Errors
    /// `InvalidInput` if the name is too long to encode, or any sink error.
    pub fn write_type(&mut self, name: &str) -> io::Result<u32> {
        let key = RecordKey::Type(name.to_string());
        if let Some(&handle) = self.handles.get(&key) {
            self.write_reference(handle)?;
            return Ok(handle);
        }
        let mut record = vec![TC_CLASSDESC];
        encode_name(&mut record, name)?;
        self.sink.write_all(&record)?;
        Ok(self.assign(key))
    }

    /// Writes a proxy record (or a reference to it). Returns its handle.
    ///
    /// Nothing is written when a name or the count cannot be encoded.
    ///
    /// # Errors
    /// `InvalidInput` if a name or the interface count cannot be encoded, or
    /// any sink error.
    pub fn write_proxy<S: AsRef<str>>(&mut self, interfaces: &[S]) -> io::Result<u32> {
        let names: Vec<String> = interfaces.iter().map(|s| s.as_ref().to_string()).collect();
        let key = RecordKey::Proxy(names.clone());
        if let Some(&handle) = self.handles.get(&key) {
            self.write_reference(handle)?;
            return Ok(handle);
        }

        let count = i32::try_from(names.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many proxy interfaces"))?;
        let mut record = vec![TC_PROXYCLASSDESC];
        record.extend_from_slice(&count.to_be_bytes());
        for name in &names {
            encode_name(&mut record, name)?;
        }
        self.sink.write_all(&record)?;
        Ok(self.assign(key))
    }

    /// Writes a raw back-reference.
    ///
    /// # Errors
    /// Any sink error.
    pub fn write_reference(&mut self, handle: u32) -> io::Result<()> {
        self.sink.write_all(&[TC_REFERENCE])?;
        self.sink.write_all(&handle.to_be_bytes())
    }

    /// Flushes and releases the sink.
    ///
    /// # Errors
    /// Any error flushing the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn assign(&mut self, key: RecordKey) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let handle = BASE_WIRE_HANDLE + self.handles.len() as u32;
        self.handles.insert(key, handle);
        handle
    }
}

fn encode_name(record: &mut Vec<u8>, name: &str) -> io::Result<()> {
    let len = u16::try_from(name.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("type name of {} bytes", name.len())))?;
    record.extend_from_slice(&len.to_be_bytes());
    record.extend_from_slice(name.as_bytes());
    Ok(())
}
