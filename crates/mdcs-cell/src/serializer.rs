//! Wire encoding for counter cells and tombstones.
//!
//! ```text
//! counter cell: name | context | write_timestamp (i64 BE) | last_delete (i64 BE)
//! tombstone:    name | marked_for_delete_at (i64 BE) | local_deletion_time (i32 BE)
//! name:         len (u16 BE) | bytes
//! context:      len (u32 BE) | CounterContext bytes
//! ```
//!
//! The [`Cell`] envelope prefixes either body with a one-byte mask.

use crate::cell::{Cell, CellName, CounterCell, Tombstone};
use crate::error::{CellError, Result};
use mdcs_counter::CounterContext;
use serde::{Deserialize, Serialize};

pub const DELETION_MASK: u8 = 0x01;
pub const COUNTER_MASK: u8 = 0x04;

/// Longest name the u16 length prefix can carry.
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// Where the bytes being decoded came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecodeMode {
    /// Written by this process; local-pending markers are ours.
    #[default]
    Local,
    /// Received from another replica. Its local-pending markers were minted
    /// by another process and are cleared as soon as the context is read.
    FromRemote,
}

/// Encodes and decodes cells.
pub struct CellSerializer;

impl CellSerializer {
    /// Encode a counter cell body, without the envelope mask.
    pub fn encode_counter(cell: &CounterCell) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::counter_size(cell));
        Self::write_counter(cell, &mut buf)?;
        Ok(buf)
    }

    /// Append a counter cell body to `buf`.
    pub fn write_counter(cell: &CounterCell, buf: &mut Vec<u8>) -> Result<()> {
        write_name(cell.name(), buf)?;
        let context_len = u32::try_from(cell.context().encoded_len())
            .map_err(|_| CellError::MalformedCell("context too large".to_string()))?;
        buf.extend_from_slice(&context_len.to_be_bytes());
        cell.context().write_to(buf);
        buf.extend_from_slice(&cell.write_timestamp().to_be_bytes());
        buf.extend_from_slice(&cell.timestamp_of_last_delete().to_be_bytes());
        Ok(())
    }

    /// Decode a counter cell body, rejecting trailing bytes.
    pub fn decode_counter(data: &[u8], mode: DecodeMode) -> Result<CounterCell> {
        let mut reader = Reader::new(data);
        let cell = read_counter(&mut reader, mode)?;
        reader.finish()?;
        Ok(cell)
    }

    /// Encoded size of a counter cell body.
    pub fn counter_size(cell: &CounterCell) -> usize {
        2 + cell.name().len() + 4 + cell.context().encoded_len() + 8 + 8
    }

    /// Encode either variant behind its mask byte.
    pub fn encode(cell: &Cell) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match cell {
            Cell::Counter(counter) => {
                buf.reserve(1 + Self::counter_size(counter));
                buf.push(COUNTER_MASK);
                Self::write_counter(counter, &mut buf)?;
            }
            Cell::Tombstone(tombstone) => {
                buf.push(DELETION_MASK);
                write_name(tombstone.name(), &mut buf)?;
                buf.extend_from_slice(&tombstone.marked_for_delete_at().to_be_bytes());
                buf.extend_from_slice(&tombstone.local_deletion_time().to_be_bytes());
            }
        }
        Ok(buf)
    }

    /// Decode a masked cell, rejecting trailing bytes.
    pub fn decode(data: &[u8], mode: DecodeMode) -> Result<Cell> {
        let mut reader = Reader::new(data);
        let cell = match reader.read_u8()? {
            COUNTER_MASK => Cell::Counter(read_counter(&mut reader, mode)?),
            DELETION_MASK => {
                let name = read_name(&mut reader)?;
                let marked_for_delete_at = reader.read_i64()?;
                let local_deletion_time = reader.read_i32()?;
                Cell::Tombstone(Tombstone::new(name, local_deletion_time, marked_for_delete_at))
            }
            mask => {
                return Err(CellError::MalformedCell(format!(
                    "unknown cell mask {:#04x}",
                    mask
                )))
            }
        };
        reader.finish()?;
        Ok(cell)
    }
}

fn write_name(name: &CellName, buf: &mut Vec<u8>) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(CellError::MalformedCell(format!(
            "name of {} bytes exceeds {}",
            name.len(),
            MAX_NAME_LEN
        )));
    }
    buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    Ok(())
}

fn read_name(reader: &mut Reader<'_>) -> Result<CellName> {
    let len = reader.read_u16()? as usize;
    Ok(CellName::new(reader.take(len)?))
}

fn read_counter(reader: &mut Reader<'_>, mode: DecodeMode) -> Result<CounterCell> {
    let name = read_name(reader)?;
    let context_len = reader.read_u32()? as usize;
    let mut context = CounterContext::from_bytes(reader.take(context_len)?)?;
    if mode == DecodeMode::FromRemote && context.has_local_shards() {
        tracing::debug!(
            cell = %name,
            cleared = context.local_count(),
            "clearing remote local-pending shards"
        );
        context = context.clear_all_local();
    }
    let write_timestamp = reader.read_i64()?;
    let timestamp_of_last_delete = reader.read_i64()?;
    Ok(CounterCell::new(name, context, write_timestamp)
        .with_timestamp_of_last_delete(timestamp_of_last_delete))
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(CellError::MalformedCell(format!(
                "needed {} bytes at offset {}, only {} left",
                len,
                self.pos,
                self.data.len() - self.pos
            ))),
        }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    fn finish(self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(CellError::MalformedCell(format!(
                "{} trailing bytes",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}
