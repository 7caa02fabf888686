//! Read-side decoding of the doc-values layouts.
//!
//! Mirrors the write side: given the layout tag recorded in field metadata
//! and the sealed stream bytes, validates the framing and decodes every
//! document's value. Each function consumes its streams exactly; trailing
//! bytes are treated as corruption.

use tessera_common::{Result, error::Error, verify_data};
use tessera_format::packed::PackedReader;
use tessera_format::stream;
use tessera_io::SliceReader;

use crate::layout::DocValuesLayout;
use crate::numeric::{VAR_INTS_FIXED_64, VAR_INTS_PACKED};
use crate::writer::{DATA_STREAM_CODEC, DOC_VALUES_FORMAT_VERSION, INDEX_STREAM_CODEC};

/// A decoded sorted field: the dictionary in lexicographic order and one
/// ordinal per document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedDocValues {
    pub dictionary: Vec<Vec<u8>>,
    pub ordinals: Vec<u32>,
}

impl SortedDocValues {
    /// The value of one document.
    pub fn value(&self, doc: u32) -> &[u8] {
        &self.dictionary[self.ordinals[doc as usize] as usize]
    }
}

/// Decodes a numeric field from its data stream.
pub fn read_numeric(
    dat: &[u8],
    doc_count: u32,
    layout: DocValuesLayout,
    element: &str,
) -> Result<Vec<i64>> {
    let mut reader = open_data(dat, element)?;
    let values = match layout {
        DocValuesLayout::Fixed8 => {
            read_value_size(&mut reader, 1)?;
            read_fixed_values(&mut reader, doc_count, |r| Ok(i64::from(r.read_i8()?)))?
        }
        DocValuesLayout::Fixed16 => {
            read_value_size(&mut reader, 2)?;
            read_fixed_values(&mut reader, doc_count, |r| Ok(i64::from(r.read_i16_le()?)))?
        }
        DocValuesLayout::Fixed32 => {
            read_value_size(&mut reader, 4)?;
            read_fixed_values(&mut reader, doc_count, |r| Ok(i64::from(r.read_i32_le()?)))?
        }
        DocValuesLayout::VarInts => match reader.read_u8()? {
            VAR_INTS_PACKED => {
                let min = reader.read_i64_le()?;
                let zero_default = reader.read_i64_le()?;
                verify_data!(zero_default, zero_default == 0i64.wrapping_sub(min));
                let packed = PackedReader::parse(&mut reader)?;
                verify_data!(value_count, packed.len() == u64::from(doc_count));
                packed.iter().map(|raw| min.wrapping_add(raw as i64)).collect()
            }
            VAR_INTS_FIXED_64 => {
                read_fixed_values(&mut reader, doc_count, |r| r.read_i64_le())?
            }
            mode => {
                return Err(Error::invalid_format(format!("var-int mode {mode}")));
            }
        },
        other => {
            return Err(Error::invalid_arg(
                "layout",
                format!("{other:?} is not a numeric layout"),
            ));
        }
    };
    verify_data!(stream, reader.remaining() == 0);
    Ok(values)
}

/// Decodes a binary field. Straight and deref layouts decode directly;
/// sorted layouts decode through their dictionary.
pub fn read_binary(
    dat: &[u8],
    idx: Option<&[u8]>,
    doc_count: u32,
    layout: DocValuesLayout,
    element: &str,
) -> Result<Vec<Vec<u8>>> {
    match layout {
        DocValuesLayout::BytesFixedStraight => {
            let mut data = open_data(dat, element)?;
            let stride = data.read_u32_le()? as usize;
            let mut values = Vec::with_capacity(doc_count as usize);
            for _ in 0..doc_count {
                values.push(data.read_bytes(stride)?.to_vec());
            }
            verify_data!(stream, data.remaining() == 0);
            Ok(values)
        }
        DocValuesLayout::BytesVarStraight => {
            let mut data = open_data(dat, element)?;
            let mut index = open_index(require_index(idx)?, element)?;
            let total_len = index.read_vlong()?;
            let addresses = PackedReader::parse(&mut index)?;
            verify_data!(address_count, addresses.len() == u64::from(doc_count) + 1);
            verify_data!(total_len, addresses.get(u64::from(doc_count)) == total_len);
            verify_data!(stream, index.remaining() == 0);

            let bytes = data.read_bytes(total_len as usize)?;
            verify_data!(stream, data.remaining() == 0);
            let mut values = Vec::with_capacity(doc_count as usize);
            for doc in 0..u64::from(doc_count) {
                let start = addresses.get(doc);
                let end = addresses.get(doc + 1);
                verify_data!(addresses, start <= end && end <= total_len);
                values.push(bytes[start as usize..end as usize].to_vec());
            }
            Ok(values)
        }
        DocValuesLayout::BytesFixedDeref => {
            let (dictionary, ordinals) =
                read_fixed_dict(dat, require_index(idx)?, doc_count, element)?;
            Ok(ordinals
                .into_iter()
                .map(|ord| dictionary[ord as usize].clone())
                .collect())
        }
        DocValuesLayout::BytesVarDeref => {
            let mut data = open_data(dat, element)?;
            let mut index = open_index(require_index(idx)?, element)?;
            let total_len = index.read_vlong()?;
            let addresses = PackedReader::parse(&mut index)?;
            verify_data!(address_count, addresses.len() == u64::from(doc_count));
            verify_data!(stream, index.remaining() == 0);

            let bytes = data.read_bytes(total_len as usize)?;
            verify_data!(stream, data.remaining() == 0);
            let mut values = Vec::with_capacity(doc_count as usize);
            for address in addresses.iter() {
                values.push(read_prefixed_entry(bytes, address)?.to_vec());
            }
            Ok(values)
        }
        DocValuesLayout::BytesFixedSorted | DocValuesLayout::BytesVarSorted => {
            let sorted = read_sorted(dat, require_index(idx)?, doc_count, layout, element)?;
            Ok(sorted
                .ordinals
                .iter()
                .map(|&ord| sorted.dictionary[ord as usize].clone())
                .collect())
        }
        other => Err(Error::invalid_arg(
            "layout",
            format!("{other:?} is not a binary layout"),
        )),
    }
}

/// Decodes a sorted field into its dictionary and per-document ordinals.
pub fn read_sorted(
    dat: &[u8],
    idx: &[u8],
    doc_count: u32,
    layout: DocValuesLayout,
    element: &str,
) -> Result<SortedDocValues> {
    match layout {
        DocValuesLayout::BytesFixedSorted => {
            let (dictionary, ordinals) = read_fixed_dict(dat, idx, doc_count, element)?;
            Ok(SortedDocValues {
                dictionary,
                ordinals,
            })
        }
        DocValuesLayout::BytesVarSorted => {
            let mut data = open_data(dat, element)?;
            let mut index = open_index(idx, element)?;
            let total_len = index.read_vlong()?;
            let addresses = PackedReader::parse(&mut index)?;
            verify_data!(address_count, !addresses.is_empty());
            let value_count = addresses.len() - 1;
            verify_data!(value_count, value_count <= u64::from(u32::MAX));
            verify_data!(total_len, addresses.get(value_count) == total_len);
            let ords = PackedReader::parse(&mut index)?;
            verify_data!(ordinal_count, ords.len() == u64::from(doc_count));
            verify_data!(stream, index.remaining() == 0);

            let bytes = data.read_bytes(total_len as usize)?;
            verify_data!(stream, data.remaining() == 0);
            let mut dictionary = Vec::with_capacity(value_count as usize);
            for entry in 0..value_count {
                let start = addresses.get(entry);
                let end = addresses.get(entry + 1);
                verify_data!(addresses, start <= end && end <= total_len);
                dictionary.push(bytes[start as usize..end as usize].to_vec());
            }
            let mut ordinals = Vec::with_capacity(doc_count as usize);
            for ord in ords.iter() {
                verify_data!(ordinal, ord < value_count);
                ordinals.push(ord as u32);
            }
            Ok(SortedDocValues {
                dictionary,
                ordinals,
            })
        }
        other => Err(Error::invalid_arg(
            "layout",
            format!("{other:?} is not a sorted layout"),
        )),
    }
}

fn open_data<'a>(buf: &'a [u8], element: &str) -> Result<SliceReader<'a>> {
    stream::open_stream(buf, DATA_STREAM_CODEC, DOC_VALUES_FORMAT_VERSION, element)
}

fn open_index<'a>(buf: &'a [u8], element: &str) -> Result<SliceReader<'a>> {
    stream::open_stream(buf, INDEX_STREAM_CODEC, DOC_VALUES_FORMAT_VERSION, element)
}

fn require_index(idx: Option<&[u8]>) -> Result<&[u8]> {
    idx.ok_or_else(|| Error::invalid_arg("idx", "layout requires an index stream"))
}

fn read_value_size(reader: &mut SliceReader<'_>, expected: u32) -> Result<()> {
    let size = reader.read_u32_le()?;
    verify_data!(value_size, size == expected);
    Ok(())
}

fn read_fixed_values(
    reader: &mut SliceReader<'_>,
    doc_count: u32,
    mut read_one: impl FnMut(&mut SliceReader<'_>) -> Result<i64>,
) -> Result<Vec<i64>> {
    let mut values = Vec::with_capacity(doc_count as usize);
    for _ in 0..doc_count {
        values.push(read_one(reader)?);
    }
    Ok(values)
}

/// Shared by the fixed deref and fixed sorted layouts, which write identical
/// streams.
fn read_fixed_dict(
    dat: &[u8],
    idx: &[u8],
    doc_count: u32,
    element: &str,
) -> Result<(Vec<Vec<u8>>, Vec<u32>)> {
    let mut data = open_data(dat, element)?;
    let stride = data.read_u32_le()? as usize;

    let mut index = open_index(idx, element)?;
    let value_count = index.read_u32_le()?;
    let ords = PackedReader::parse(&mut index)?;
    verify_data!(ordinal_count, ords.len() == u64::from(doc_count));
    verify_data!(stream, index.remaining() == 0);

    let mut dictionary = Vec::with_capacity(value_count as usize);
    for _ in 0..value_count {
        dictionary.push(data.read_bytes(stride)?.to_vec());
    }
    verify_data!(stream, data.remaining() == 0);

    let mut ordinals = Vec::with_capacity(doc_count as usize);
    for ord in ords.iter() {
        verify_data!(ordinal, ord < u64::from(value_count));
        ordinals.push(ord as u32);
    }
    Ok((dictionary, ordinals))
}

/// Parses one length-prefixed dictionary entry at `address`: one prefix byte
/// below 128, two with the high bit set otherwise.
fn read_prefixed_entry(bytes: &[u8], address: u64) -> Result<&[u8]> {
    let mut reader = SliceReader::new(bytes);
    reader.seek(address)?;
    let first = reader.read_u8()?;
    let len = if first & 0x80 == 0 {
        usize::from(first)
    } else {
        usize::from(first & 0x7F) << 8 | usize::from(reader.read_u8()?)
    };
    reader.read_bytes(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tessera_format::{MemorySegmentStore, StreamFactory, StreamWriter};
    use tessera_io::IndexOutput;

    fn sealed(codec: &str, payload: &[u8]) -> Vec<u8> {
        let store = MemorySegmentStore::new();
        let mut writer = StreamWriter::open(
            store.create_stream(0, "dat").unwrap(),
            codec,
            DOC_VALUES_FORMAT_VERSION,
        )
        .unwrap();
        writer.write_all(payload).unwrap();
        writer.seal().unwrap();
        store.sealed_stream(0, "dat").unwrap()
    }

    #[test]
    fn test_layout_family_mismatch_rejected() {
        let dat = sealed(DATA_STREAM_CODEC, &[]);
        let idx = sealed(INDEX_STREAM_CODEC, &[]);
        assert!(read_numeric(&dat, 0, DocValuesLayout::BytesVarSorted, "f").is_err());
        assert!(read_binary(&dat, Some(&idx), 0, DocValuesLayout::Fixed8, "f").is_err());
        assert!(read_sorted(&dat, &idx, 0, DocValuesLayout::Fixed16, "f").is_err());
    }

    #[test]
    fn test_missing_index_stream_rejected() {
        let dat = sealed(DATA_STREAM_CODEC, &[]);
        let err = read_binary(&dat, None, 0, DocValuesLayout::BytesVarStraight, "f").unwrap_err();
        assert!(err.to_string().contains("index stream"));
    }

    #[test]
    fn test_unknown_var_int_mode_rejected() {
        let dat = sealed(DATA_STREAM_CODEC, &[9]);
        let err = read_numeric(&dat, 0, DocValuesLayout::VarInts, "f").unwrap_err();
        assert!(err.to_string().contains("var-int mode 9"));
    }

    #[test]
    fn test_doc_count_mismatch_detected() {
        // value size 1, then two 8-bit values
        let dat = sealed(DATA_STREAM_CODEC, &[1, 0, 0, 0, 7, 8]);
        assert_eq!(
            read_numeric(&dat, 2, DocValuesLayout::Fixed8, "f").unwrap(),
            [7, 8]
        );
        assert!(read_numeric(&dat, 3, DocValuesLayout::Fixed8, "f").is_err());
        assert!(read_numeric(&dat, 1, DocValuesLayout::Fixed8, "f").is_err());
    }

    #[test]
    fn test_prefixed_entry_parsing() {
        let mut bytes = vec![3, b'a', b'b', b'c'];
        bytes.push(0x80 | 0x01);
        bytes.push(0x2C);
        bytes.extend(std::iter::repeat_n(0x55, 300));

        assert_eq!(read_prefixed_entry(&bytes, 0).unwrap(), b"abc");
        assert_eq!(read_prefixed_entry(&bytes, 4).unwrap(), vec![0x55; 300]);
        // a prefix whose declared length overruns the buffer
        assert!(read_prefixed_entry(&bytes, bytes.len() as u64 - 1).is_err());
        assert!(read_prefixed_entry(&bytes, bytes.len() as u64 + 1).is_err());
    }
}
