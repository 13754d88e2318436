//! Integration tests for the transport over real streams.

use std::path::Path;
use std::time::Duration;

use patchbay_ipc::{Endpoint, Message, Selector, TransportError, read_frame, spawn_editor, write_frame};
use proptest::prelude::*;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_full_session_over_pair() {
    let (editor, host) = Endpoint::pair().unwrap();

    host.send(&Message::open("0")).unwrap();
    host.send(&Message::load_state("0", patchbay_core::encode_state("#X obj 0 0 dac~;\n")))
        .unwrap();

    let open = editor.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(open.selector, Selector::Open);
    let state = editor.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(state.patch_text().unwrap(), "#X obj 0 0 dac~;\n");

    editor
        .send(&Message::save_state("0", "#X obj 0 0 dac~;\n"))
        .unwrap();
    editor
        .send(&Message::load("0", Path::new("/tmp/patchbay/lib/t0_1.so")))
        .unwrap();

    let saved = host.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(saved.selector, Selector::SaveState);
    let load = host.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(
        load.module_path().unwrap(),
        Path::new("/tmp/patchbay/lib/t0_1.so")
    );
}

#[cfg(unix)]
#[test]
fn test_spawned_child_echo_is_filtered() {
    // `cat` echoes frames back. Open returns to the host, which drops it as
    // misdirected.
    let process = spawn_editor(Path::new("cat"), &[]).unwrap();
    let host = process.endpoint().unwrap();

    host.send(&Message::open("0")).unwrap();
    assert_eq!(host.recv_timeout(Duration::from_millis(200)).unwrap(), None);

    let status = process.shutdown(WAIT).unwrap();
    assert!(status.success());
}

#[cfg(unix)]
#[test]
fn test_child_exit_is_transport_lost() {
    let process = spawn_editor(Path::new("true"), &[]).unwrap();
    let host = process.endpoint().unwrap();
    assert!(matches!(
        host.recv_timeout(WAIT),
        Err(TransportError::TransportLost)
    ));
    assert!(host.is_lost());
}

fn selector() -> impl Strategy<Value = Selector> {
    prop::sample::select(Selector::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn frames_decode_back_in_sequence(
        msgs in prop::collection::vec((".{0,12}", selector(), ".{0,40}"), 1..12)
    ) {
        let msgs: Vec<Message> = msgs
            .into_iter()
            .map(|(target, sel, payload)| {
                let payload = sel.has_payload().then_some(payload);
                Message::new(target, sel, payload).unwrap()
            })
            .collect();

        let mut buf = Vec::new();
        for msg in &msgs {
            write_frame(&mut buf, msg).unwrap();
        }
        let mut cursor = std::io::Cursor::new(buf);
        for msg in &msgs {
            let got = read_frame(&mut cursor).unwrap();
            prop_assert_eq!(got.as_ref(), Some(msg));
        }
        prop_assert!(read_frame(&mut cursor).unwrap().is_none());
    }
}
