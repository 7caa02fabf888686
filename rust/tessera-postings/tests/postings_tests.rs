use tessera_format::{
    CodecConfig, FieldInfo, IndexOptions, MemorySegmentStore, SegmentWriteContext,
    segment::{FREQUENCIES_SUFFIX, POSITIONS_SUFFIX},
};
use tessera_postings::{
    FieldPostingsWriter, Position, Posting, PostingsReader, SkipListReader, TermMetadata,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PosSpec {
    position: u32,
    payload: Vec<u8>,
    offsets: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DocSpec {
    doc_id: u32,
    term_freq: u32,
    positions: Vec<PosSpec>,
}

fn random_payload(rng: &mut fastrand::Rng) -> Vec<u8> {
    // mostly a repeated length, so runs exercise the length-unchanged path;
    // occasionally empty or oversized
    let len = match rng.u32(0..10) {
        0 => 0,
        1 => 300,
        2 => rng.usize(1..=12),
        _ => 3,
    };
    (0..len).map(|_| rng.u8(..)).collect()
}

fn generate_docs(rng: &mut fastrand::Rng, field: &FieldInfo, count: usize) -> Vec<DocSpec> {
    let mut docs = Vec::with_capacity(count);
    let mut doc_id = rng.u32(0..3);
    for n in 0..count {
        if n > 0 {
            doc_id += rng.u32(1..=5);
        }
        let term_freq = if field.index_options.has_freqs() {
            rng.u32(1..=6)
        } else {
            1
        };
        let mut positions = Vec::new();
        if field.index_options.has_positions() {
            let mut position = rng.u32(0..4);
            let mut offset_start = 0u32;
            for i in 0..term_freq {
                if i > 0 {
                    position += rng.u32(1..=9);
                }
                let payload = if field.store_payloads {
                    random_payload(rng)
                } else {
                    Vec::new()
                };
                let offsets = if field.index_options.has_offsets() {
                    offset_start += rng.u32(0..=7);
                    let len = rng.u32(0..=10);
                    Some((offset_start, offset_start + len))
                } else {
                    None
                };
                positions.push(PosSpec {
                    position,
                    payload,
                    offsets,
                });
            }
        }
        docs.push(DocSpec {
            doc_id,
            term_freq,
            positions,
        });
    }
    docs
}

fn write_term(writer: &mut FieldPostingsWriter, docs: &[DocSpec]) -> TermMetadata {
    let store_payloads = writer.field().store_payloads;
    writer.start_term();
    for doc in docs {
        writer.start_doc(doc.doc_id, doc.term_freq).unwrap();
        for pos in &doc.positions {
            let payload = store_payloads.then_some(pos.payload.as_slice());
            writer.add_position(pos.position, payload, pos.offsets).unwrap();
        }
        writer.finish_doc().unwrap();
    }
    writer.finish_term().unwrap()
}

fn expected_postings(field: &FieldInfo, docs: &[DocSpec]) -> Vec<Posting> {
    docs.iter()
        .map(|doc| Posting {
            doc_id: doc.doc_id,
            term_freq: doc.term_freq,
            positions: doc
                .positions
                .iter()
                .map(|pos| Position {
                    position: pos.position,
                    payload: if field.store_payloads {
                        pos.payload.clone()
                    } else {
                        Vec::new()
                    },
                    offsets: pos.offsets,
                })
                .collect(),
        })
        .collect()
}

fn decode_term(
    store: &MemorySegmentStore,
    field: &FieldInfo,
    config: &CodecConfig,
    meta: &TermMetadata,
) -> Vec<Posting> {
    let freq = store
        .sealed_stream(field.ordinal, FREQUENCIES_SUFFIX)
        .unwrap();
    let prox = field
        .index_options
        .has_positions()
        .then(|| store.sealed_stream(field.ordinal, POSITIONS_SUFFIX).unwrap());
    let mut reader = PostingsReader::new(&freq, prox.as_deref(), field, config, meta).unwrap();
    let mut postings = Vec::new();
    while let Some(posting) = reader.next().unwrap() {
        postings.push(posting);
    }
    postings
}

fn field_shapes() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("docs", 0, IndexOptions::Docs),
        FieldInfo::new("freqs", 1, IndexOptions::DocsAndFreqs),
        FieldInfo::new("pos", 2, IndexOptions::DocsAndFreqsAndPositions),
        FieldInfo::new("pos_pay", 3, IndexOptions::DocsAndFreqsAndPositions).with_payloads(),
        FieldInfo::new("off", 4, IndexOptions::DocsAndFreqsAndPositionsAndOffsets),
        FieldInfo::new("off_pay", 5, IndexOptions::DocsAndFreqsAndPositionsAndOffsets)
            .with_payloads(),
    ]
}

#[test]
fn test_posting_round_trip_across_field_shapes() {
    let mut rng = fastrand::Rng::with_seed(0x5EED_0001);
    let config = CodecConfig::default();
    for field in field_shapes() {
        let store = MemorySegmentStore::new();
        let context = SegmentWriteContext::new(10_000, &store);
        let mut writer = FieldPostingsWriter::open(&context, &field, &config).unwrap();

        let terms: Vec<Vec<DocSpec>> = (0..3)
            .map(|_| generate_docs(&mut rng, &field, 120))
            .collect();
        let metas: Vec<TermMetadata> = terms.iter().map(|t| write_term(&mut writer, t)).collect();
        writer.seal().unwrap();

        for (docs, meta) in terms.iter().zip(&metas) {
            assert_eq!(meta.doc_freq as usize, docs.len());
            let decoded = decode_term(&store, &field, &config, meta);
            assert_eq!(
                decoded,
                expected_postings(&field, docs),
                "round trip failed for field '{}'",
                field.name
            );
        }
    }
}

#[test]
fn test_zero_and_large_payloads_round_trip() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions).with_payloads();
    let config = CodecConfig::default();
    let store = MemorySegmentStore::new();
    let context = SegmentWriteContext::new(100, &store);
    let mut writer = FieldPostingsWriter::open(&context, &field, &config).unwrap();

    let payloads: [&[u8]; 6] = [b"", b"", b"abcde", b"abcde", &[0x55; 4096], b""];
    let docs: Vec<DocSpec> = payloads
        .iter()
        .enumerate()
        .map(|(i, payload)| DocSpec {
            doc_id: i as u32 * 7,
            term_freq: 1,
            positions: vec![PosSpec {
                position: 2,
                payload: payload.to_vec(),
                offsets: None,
            }],
        })
        .collect();
    // first docID may be 0
    let meta = write_term(&mut writer, &docs);
    writer.seal().unwrap();

    let decoded = decode_term(&store, &field, &config, &meta);
    assert_eq!(decoded, expected_postings(&field, &docs));
    assert_eq!(decoded[4].positions[0].payload.len(), 4096);
}

#[test]
fn test_skip_entries_every_sixteen_documents() {
    // 1000 documents with frequency 1 must produce ceil(1000/16) = 63
    // level-0 entries whose doc deltas sum to the final docID
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let config = CodecConfig::default();
    let store = MemorySegmentStore::new();
    let context = SegmentWriteContext::new(1001, &store);
    let mut writer = FieldPostingsWriter::open(&context, &field, &config).unwrap();

    let docs: Vec<DocSpec> = (1..=1000)
        .map(|doc_id| DocSpec {
            doc_id,
            term_freq: 1,
            positions: Vec::new(),
        })
        .collect();
    let meta = write_term(&mut writer, &docs);
    writer.seal().unwrap();

    assert_eq!(meta.doc_freq, 1000);
    assert!(meta.skip_offset.is_some());

    let freq = store.sealed_stream(0, FREQUENCIES_SUFFIX).unwrap();
    let levels = SkipListReader::decode(&freq, &field, &config, &meta).unwrap();
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0].len(), 63);
    assert_eq!(levels[1].len(), 3);

    // accumulated deltas of the last level-0 entry equal the final docID
    assert_eq!(levels[0].last().unwrap().doc_id, 1000);
    // cadence entries record the docID before each 16th document
    assert_eq!(levels[0][0].doc_id, 15);
    assert_eq!(levels[0][1].doc_id, 31);
    // promoted entries pair with every 16th level-0 entry
    for (i, entry) in levels[1].iter().enumerate() {
        let child = levels[0][(i + 1) * 16 - 1].end_offset;
        assert_eq!(entry.child_ptr, Some(child));
        assert_eq!(entry.doc_id, levels[0][(i + 1) * 16 - 1].doc_id);
    }
}

#[test]
fn test_skip_entries_are_valid_jump_targets() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositionsAndOffsets)
        .with_payloads();
    let config = CodecConfig::default();
    let store = MemorySegmentStore::new();
    let context = SegmentWriteContext::new(10_000, &store);
    let mut writer = FieldPostingsWriter::open(&context, &field, &config).unwrap();

    let mut rng = fastrand::Rng::with_seed(0x5EED_0002);
    let docs = generate_docs(&mut rng, &field, 200);
    let meta = write_term(&mut writer, &docs);
    writer.seal().unwrap();

    let freq = store.sealed_stream(0, FREQUENCIES_SUFFIX).unwrap();
    let prox = store.sealed_stream(0, POSITIONS_SUFFIX).unwrap();

    // posting boundaries with the length state in effect before each one
    struct Boundary {
        freq_ptr: u64,
        prox_ptr: u64,
        doc_id: u32,
        payload_len: Option<u32>,
        offset_len: Option<u32>,
    }
    let mut reader = PostingsReader::new(&freq, Some(&prox), &field, &config, &meta).unwrap();
    let mut boundaries = Vec::new();
    let mut payload_len = None;
    let mut offset_len = None;
    while reader.freq_position() < meta.freq_start + meta.skip_offset.unwrap() {
        let freq_ptr = reader.freq_position();
        let prox_ptr = reader.prox_position().unwrap();
        let posting = reader.next().unwrap().unwrap();
        boundaries.push(Boundary {
            freq_ptr,
            prox_ptr,
            doc_id: posting.doc_id,
            payload_len,
            offset_len,
        });
        for pos in &posting.positions {
            payload_len = Some(pos.payload.len() as u32);
            offset_len = pos.offsets.map(|(start, end)| end - start);
        }
    }
    assert_eq!(boundaries.len(), docs.len());

    let levels = SkipListReader::decode(&freq, &field, &config, &meta).unwrap();
    assert!(!levels.is_empty());
    for entries in &levels {
        let mut prev: Option<&tessera_postings::SkipEntry> = None;
        for entry in entries {
            if let Some(prev) = prev {
                assert!(entry.doc_id > prev.doc_id);
                assert!(entry.freq_ptr > prev.freq_ptr);
                assert!(entry.prox_ptr > prev.prox_ptr);
            }
            // the pointer lands exactly on a posting boundary, and the
            // posting there has a docID at or past the entry's
            let target = boundaries
                .iter()
                .find(|b| b.freq_ptr == entry.freq_ptr)
                .expect("skip pointer must land on a posting boundary");
            assert!(target.doc_id >= entry.doc_id);
            assert_eq!(target.prox_ptr, entry.prox_ptr);
            assert_eq!(target.payload_len, entry.payload_len);
            assert_eq!(target.offset_len, entry.offset_len);
            prev = Some(entry);
        }
    }
}

#[test]
fn test_no_skip_data_below_minimum_doc_freq() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let config = CodecConfig::default();
    let store = MemorySegmentStore::new();
    let context = SegmentWriteContext::new(100, &store);
    let mut writer = FieldPostingsWriter::open(&context, &field, &config).unwrap();

    let docs: Vec<DocSpec> = (0..15)
        .map(|i| DocSpec {
            doc_id: i * 2,
            term_freq: 1,
            positions: Vec::new(),
        })
        .collect();
    let meta = write_term(&mut writer, &docs);
    writer.seal().unwrap();

    assert_eq!(meta.skip_offset, None);
    let freq = store.sealed_stream(0, FREQUENCIES_SUFFIX).unwrap();
    let levels = SkipListReader::decode(&freq, &field, &config, &meta).unwrap();
    assert!(levels.is_empty());
}

#[test]
fn test_closing_skip_entry_reaches_the_final_document() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let config = CodecConfig::default();
    let store = MemorySegmentStore::new();
    let context = SegmentWriteContext::new(1000, &store);
    let mut writer = FieldPostingsWriter::open(&context, &field, &config).unwrap();

    let docs: Vec<DocSpec> = (0..20)
        .map(|i| DocSpec {
            doc_id: i * 3 + 1,
            term_freq: 2,
            positions: Vec::new(),
        })
        .collect();
    let meta = write_term(&mut writer, &docs);
    writer.seal().unwrap();

    let freq = store.sealed_stream(0, FREQUENCIES_SUFFIX).unwrap();
    let levels = SkipListReader::decode(&freq, &field, &config, &meta).unwrap();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0].len(), 2);
    assert_eq!(levels[0][0].doc_id, docs[14].doc_id);
    assert_eq!(levels[0][1].doc_id, docs[19].doc_id);
}

#[test]
fn test_custom_skip_interval() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let config = CodecConfig {
        skip_interval: 4,
        skip_minimum: 4,
        ..CodecConfig::default()
    };
    let store = MemorySegmentStore::new();
    let context = SegmentWriteContext::new(100, &store);
    let mut writer = FieldPostingsWriter::open(&context, &field, &config).unwrap();

    let docs: Vec<DocSpec> = (0..10)
        .map(|i| DocSpec {
            doc_id: i * 5 + 2,
            term_freq: 1,
            positions: Vec::new(),
        })
        .collect();
    let meta = write_term(&mut writer, &docs);
    writer.seal().unwrap();

    let freq = store.sealed_stream(0, FREQUENCIES_SUFFIX).unwrap();
    let levels = SkipListReader::decode(&freq, &field, &config, &meta).unwrap();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0].len(), 3);
    assert_eq!(levels[0][0].doc_id, docs[2].doc_id);
    assert_eq!(levels[0][1].doc_id, docs[6].doc_id);
    assert_eq!(levels[0][2].doc_id, docs[9].doc_id);
}

#[test]
fn test_terms_share_streams_without_interference() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions).with_payloads();
    let config = CodecConfig::default();
    let store = MemorySegmentStore::new();
    let context = SegmentWriteContext::new(2000, &store);
    let mut writer = FieldPostingsWriter::open(&context, &field, &config).unwrap();

    let mut rng = fastrand::Rng::with_seed(0x5EED_0003);
    // a term large enough to flush skip data, surrounded by small terms
    let term_a = generate_docs(&mut rng, &field, 5);
    let term_b = generate_docs(&mut rng, &field, 150);
    let term_c = generate_docs(&mut rng, &field, 9);

    let meta_a = write_term(&mut writer, &term_a);
    let meta_b = write_term(&mut writer, &term_b);
    let meta_c = write_term(&mut writer, &term_c);
    writer.seal().unwrap();

    assert!(meta_a.skip_offset.is_none());
    assert!(meta_b.skip_offset.is_some());
    assert!(meta_c.freq_start > meta_b.freq_start);

    for (docs, meta) in [(&term_a, &meta_a), (&term_b, &meta_b), (&term_c, &meta_c)] {
        assert_eq!(
            decode_term(&store, &field, &config, meta),
            expected_postings(&field, docs)
        );
    }
}
