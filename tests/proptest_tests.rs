//! Property-based tests using proptest.
//!
//! Random sequences of journal operations are committed and checked against
//! a simple in-memory model of what the archive should contain.

use proptest::prelude::*;
use zipsession::{ArchiveSession, CompressionMethod, EntrySource, OpenOptions};

mod common;

#[derive(Debug, Clone)]
enum Op {
    Add(String, Vec<u8>),
    Remove(usize),
    Rename(usize, String),
    Replace(usize, Vec<u8>),
}

fn name_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z0-9]{1,8}", 1..3).prop_map(|parts| parts.join("/"))
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (name_strategy(), proptest::collection::vec(any::<u8>(), 0..2048))
            .prop_map(|(n, d)| Op::Add(n, d)),
        (0usize..16).prop_map(Op::Remove),
        (0usize..16, name_strategy()).prop_map(|(i, n)| Op::Rename(i, n)),
        (0usize..16, proptest::collection::vec(any::<u8>(), 0..2048))
            .prop_map(|(i, d)| Op::Replace(i, d)),
    ]
}

fn method_strategy() -> impl Strategy<Value = CompressionMethod> {
    let mut methods = vec![CompressionMethod::Store];
    if cfg!(feature = "deflate") {
        methods.push(CompressionMethod::Deflate);
    }
    if cfg!(feature = "bzip2") {
        methods.push(CompressionMethod::Bzip2);
    }
    proptest::sample::select(methods)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever survives a commit reads back byte-for-byte, in index order.
    #[test]
    fn journal_replay_matches_model(
        method in method_strategy(),
        ops in proptest::collection::vec(op_strategy(), 1..24),
    ) {
        let base = common::archive_bytes(method, &[("base0", b"zero"), ("base1", b"one")]);
        let mut session = ArchiveSession::open_buffer(base, OpenOptions::new()).unwrap();

        // (name, data) per index; None once removed
        let mut model: Vec<Option<(String, Vec<u8>)>> = vec![
            Some(("base0".into(), b"zero".to_vec())),
            Some(("base1".into(), b"one".to_vec())),
        ];

        for op in ops {
            match op {
                Op::Add(name, data) => {
                    let index = session
                        .add(name.as_bytes(), EntrySource::Buffer(data.clone()), method)
                        .unwrap();
                    prop_assert_eq!(index, model.len());
                    model.push(Some((name, data)));
                }
                Op::Remove(i) => {
                    let live = model.get(i).is_some_and(Option::is_some);
                    prop_assert_eq!(session.remove(i).is_ok(), live);
                    if live {
                        model[i] = None;
                    }
                }
                Op::Rename(i, name) => {
                    let result = session.rename(i, name.as_bytes());
                    match model.get_mut(i) {
                        Some(Some(entry)) => {
                            prop_assert!(result.is_ok());
                            entry.0 = name;
                        }
                        _ => prop_assert!(result.is_err()),
                    }
                }
                Op::Replace(i, data) => {
                    let result = session.replace(i, EntrySource::Buffer(data.clone()));
                    match model.get_mut(i) {
                        Some(Some(entry)) => {
                            prop_assert!(result.is_ok());
                            entry.1 = data;
                        }
                        _ => prop_assert!(result.is_err()),
                    }
                }
            }
        }

        prop_assert_eq!(session.count(), model.len());
        let (_, bytes) = session.close_to_vec(None).unwrap();

        let mut session = ArchiveSession::open_buffer(bytes, OpenOptions::new()).unwrap();
        let expected: Vec<(Vec<u8>, Vec<u8>)> = model
            .into_iter()
            .flatten()
            .map(|(n, d)| (n.into_bytes(), d))
            .collect();
        prop_assert_eq!(session.count(), expected.len());
        prop_assert_eq!(common::contents(&mut session), expected);
    }

    /// Epoch seconds survive the DOS conversion to two-second precision.
    #[test]
    fn dos_time_roundtrip(secs in zipsession::timestamp::DOS_EPOCH..0xF000_0000u32) {
        let dos = zipsession::timestamp::DosDateTime::from_epoch(secs);
        let back = dos.to_epoch();
        prop_assert!(back <= secs && secs - back <= 1);
    }
}
