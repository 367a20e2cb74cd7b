//! Denials are reported through `tracing`.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use tracing::Level;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn with_capture(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    captured.text()
}

#[test]
fn test_denials_are_logged() {
    let client = common::client();
    let user = client.query("User").only(&["name"]).first().unwrap().unwrap();

    let output = with_capture(|| {
        assert!(user.get("email").is_err());
        assert!(user.related("role").is_err());
    });
    assert!(output.contains("field access denied"), "{output}");
    assert!(output.contains("relation access denied"), "{output}");
    assert!(output.contains("P1101"), "{output}");
}

#[test]
fn test_denial_logging_can_be_silenced() {
    let client = common::client();
    client.settings().set_log_denials(false);
    let user = client.query("User").only(&["name"]).first().unwrap().unwrap();

    let output = with_capture(|| {
        assert!(user.get("email").is_err());
    });
    assert!(!output.contains("denied"), "{output}");
}
