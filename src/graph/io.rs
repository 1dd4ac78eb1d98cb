use std::collections::HashMap;
use std::io::{ self, Read, Write };

use num_traits::NumCast;

use crate::{
  error::{ Error, Result },
  storage::Storage,
  scalar::Real,
};

use super::csr::CsrSnapshot;


// "FRGE"
const MAGIC: u32 = 0x4652_4745;
const VERSION: u32 = 1;

impl<T: Real> CsrSnapshot<T> {
  /// Serialize in the fixed little-endian layout: magic, version,
  /// node and edge counts, `row_ptr`, `col_idx`, weights as binary32,
  /// timestamps, then the id table as varint-length-prefixed UTF-8.

  pub fn save(&self, writer: &mut impl Write) -> Result<()> {
    write_u32(writer, MAGIC)?;
    write_u32(writer, VERSION)?;
    write_u32(writer, self.node_count() as u32)?;
    write_u32(writer, self.edge_count() as u32)?;

    for &value in &self.row_ptr {
      write_u32(writer, value)?;
    }
    for &value in &self.col_idx {
      write_u32(writer, value)?;
    }
    {
      let weights = self.weights.data();
      for &weight in weights.iter() {
        let weight: f32 = NumCast::from(weight).unwrap();
        writer.write_all(&weight.to_le_bytes())?;
      }
    }
    for &stamp in &self.last_modified {
      writer.write_all(&stamp.to_le_bytes())?;
    }
    for id in &self.index_to_id {
      write_varint(writer, id.len() as u32)?;
      writer.write_all(id.as_bytes())?;
    }
    Ok(())
  }

  /// Deserialize a snapshot written by [save](CsrSnapshot::save).

  pub fn load(reader: &mut impl Read) -> Result<Self> {
    let magic = read_u32(reader)?;
    if magic != MAGIC {
      return Err(Error::InvalidMagic(magic));
    }
    let version = read_u32(reader)?;
    if version != VERSION {
      return Err(Error::UnsupportedVersion(version));
    }

    let nodes = read_u32(reader)? as usize;
    let edges = read_u32(reader)? as usize;

    let mut row_ptr = Vec::with_capacity(nodes + 1);
    for _ in 0..nodes + 1 {
      row_ptr.push(read_u32(reader)?);
    }
    let mut col_idx = Vec::with_capacity(edges);
    for _ in 0..edges {
      col_idx.push(read_u32(reader)?);
    }
    let mut weights = Vec::with_capacity(edges);
    for _ in 0..edges {
      let mut buffer = [0u8; 4];
      reader.read_exact(&mut buffer)?;
      let weight: T = NumCast::from(f32::from_le_bytes(buffer)).unwrap();
      weights.push(weight);
    }
    let mut last_modified = Vec::with_capacity(edges);
    for _ in 0..edges {
      let mut buffer = [0u8; 8];
      reader.read_exact(&mut buffer)?;
      last_modified.push(i64::from_le_bytes(buffer));
    }

    let mut index_to_id = Vec::with_capacity(nodes);
    for _ in 0..nodes {
      let len = read_varint(reader)? as usize;
      let mut bytes = vec![0u8; len];
      reader.read_exact(&mut bytes)?;
      let id = String::from_utf8(bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e) )?;
      index_to_id.push(id);
    }
    let id_to_index: HashMap<String, u32> = index_to_id.iter()
      .enumerate()
      .map(|(index, id)| (id.clone(), index as u32) )
      .collect();

    Ok(Self {
      row_ptr,
      col_idx,
      weights: Storage::from_vec(weights),
      last_modified,
      id_to_index,
      index_to_id,
    })
  }
}

fn write_u32(writer: &mut impl Write, value: u32) -> Result<()> {
  writer.write_all(&value.to_le_bytes())?;
  Ok(())
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
  let mut buffer = [0u8; 4];
  reader.read_exact(&mut buffer)?;
  Ok(u32::from_le_bytes(buffer))
}

// 7-bit variable-length unsigned encoding, low groups first

fn write_varint(writer: &mut impl Write, mut value: u32) -> Result<()> {
  while value >= 0x80 {
    writer.write_all(&[(value as u8 & 0x7f) | 0x80])?;
    value >>= 7;
  }
  writer.write_all(&[value as u8])?;
  Ok(())
}

fn read_varint(reader: &mut impl Read) -> Result<u32> {
  let mut value = 0u32;
  let mut shift = 0;
  loop {
    let mut buffer = [0u8; 1];
    reader.read_exact(&mut buffer)?;
    let byte = buffer[0];
    value |= <u32 as From<u8>>::from(byte & 0x7f) << shift;
    if byte & 0x80 == 0 {
      return Ok(value);
    }
    shift += 7;
    if shift > 28 {
      return Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflows u32").into());
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::graph::Graph;

  fn sample() -> CsrSnapshot<f32> {
    let graph = Graph::new();
    for id in ["alpha", "beta", "gamma"] {
      graph.get_or_add_node(id, ()).unwrap();
    }
    graph.accumulate_edge("alpha", "beta", 1.25, 100).unwrap();
    graph.accumulate_edge("beta", "gamma", 2.5, 200).unwrap();
    graph.compile_csr()
  }

  #[test]
  fn round_trip() {
    let original = sample();
    let mut bytes = vec![];
    original.save(&mut bytes).unwrap();

    let loaded = CsrSnapshot::<f32>::load(&mut bytes.as_slice()).unwrap();
    assert_eq!(loaded.row_ptr(), original.row_ptr());
    assert_eq!(loaded.col_idx(), original.col_idx());
    assert_eq!(loaded.weights_vec(), original.weights_vec());
    assert_eq!(loaded.last_modified(), original.last_modified());
    assert_eq!(loaded.index_to_id, original.index_to_id);
    assert_eq!(loaded.topology_hash(), original.topology_hash());
  }

  #[test]
  fn header_layout() {
    let mut bytes = vec![];
    sample().save(&mut bytes).unwrap();
    assert_eq!(&bytes[0..4], &0x4652_4745u32.to_le_bytes());
    assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
    assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
    assert_eq!(&bytes[12..16], &4u32.to_le_bytes());
  }

  #[test]
  fn rejects_bad_magic() {
    let mut bytes = vec![];
    sample().save(&mut bytes).unwrap();
    bytes[0] ^= 0xff;
    assert!(matches!(
      CsrSnapshot::<f32>::load(&mut bytes.as_slice()),
      Err(Error::InvalidMagic(_)),
    ));
  }

  #[test]
  fn rejects_unknown_version() {
    let mut bytes = vec![];
    sample().save(&mut bytes).unwrap();
    bytes[4..8].copy_from_slice(&9u32.to_le_bytes());
    assert!(matches!(
      CsrSnapshot::<f32>::load(&mut bytes.as_slice()),
      Err(Error::UnsupportedVersion(9)),
    ));
  }

  #[test]
  fn varint_boundaries() {
    for value in [0u32, 1, 127, 128, 300, 16_383, 16_384, u32::MAX] {
      let mut bytes = vec![];
      write_varint(&mut bytes, value).unwrap();
      assert_eq!(read_varint(&mut bytes.as_slice()).unwrap(), value);
    }
  }
}
