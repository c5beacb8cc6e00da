//! Native Library Tests
//!
//! Exercise a real libpam when the host has one; every test returns early
//! otherwise.

use pam_bridge::{
    BinaryConversationHandler, BinaryPrompt, ConversationHandler, Item, PamLibrary, ReturnCode,
    Style, Transaction,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn libpam_available() -> bool {
    match PamLibrary::global() {
        Ok(_) => true,
        Err(e) => {
            eprintln!("skipping: {e}");
            false
        }
    }
}

fn start(service: &str, user: Option<&str>) -> Option<Transaction> {
    if !libpam_available() {
        return None;
    }
    match Transaction::start_func(service, user, |_: Style, _: &str| Ok(String::new())) {
        Ok(tx) => Some(tx),
        Err(e) => {
            eprintln!("skipping: pam_start failed: {e}");
            None
        }
    }
}

struct Binary;

impl ConversationHandler for Binary {
    fn respond(&self, _: Style, _: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }

    fn as_binary(&self) -> Option<&dyn BinaryConversationHandler> {
        Some(self)
    }
}

impl BinaryConversationHandler for Binary {
    fn respond_binary(&self, prompt: &BinaryPrompt) -> anyhow::Result<BinaryPrompt> {
        Ok(prompt.clone())
    }
}

/// Text handler that counts how often it is dropped
struct Counted(Arc<AtomicUsize>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl ConversationHandler for Counted {
    fn respond(&self, _: Style, _: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

fn counted() -> (Counted, Arc<AtomicUsize>) {
    let drops = Arc::new(AtomicUsize::new(0));
    (Counted(Arc::clone(&drops)), drops)
}

#[test]
fn test_items() {
    let Some(tx) = start("pam-bridge-test", Some("alice")) else {
        return;
    };

    assert_eq!(tx.get_item(Item::Service).unwrap(), "pam-bridge-test");
    assert_eq!(tx.get_item(Item::User).unwrap(), "alice");

    tx.set_item(Item::Tty, "pts/7").unwrap();
    assert_eq!(tx.get_item(Item::Tty).unwrap(), "pts/7");
    assert_eq!(tx.status(), ReturnCode::Success);

    tx.end().unwrap();
}

#[test]
fn test_environment() {
    let Some(tx) = start("pam-bridge-test", None) else {
        return;
    };

    tx.put_env("PAM_BRIDGE_TEST=1").unwrap();
    tx.put_env("PAM_BRIDGE_OTHER=a=b").unwrap();
    assert_eq!(tx.get_env("PAM_BRIDGE_TEST").as_deref(), Some("1"));

    let env = tx.get_env_list().unwrap();
    assert_eq!(env.get("PAM_BRIDGE_OTHER").map(String::as_str), Some("a=b"));

    tx.put_env("PAM_BRIDGE_TEST").unwrap();
    assert_eq!(tx.get_env("PAM_BRIDGE_TEST"), None);
}

#[test]
fn test_end_releases_handler_once() {
    if !libpam_available() {
        return;
    }
    let (handler, drops) = counted();
    let tx = match Transaction::start("pam-bridge-test", Some("alice"), handler) {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("skipping: pam_start failed: {e}");
            return;
        }
    };
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    tx.end().unwrap();
    // Dropping the consumed transaction must not release the handler again.
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_releases_handler_once() {
    if !libpam_available() {
        return;
    }
    let (handler, drops) = counted();
    let tx = match Transaction::start("pam-bridge-test", None, handler) {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("skipping: pam_start failed: {e}");
            return;
        }
    };
    tx.set_item(Item::Rhost, "localhost").unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(tx);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_start_names_service() {
    if !pam_bridge::has_start_confdir() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent");
    let (handler, drops) = counted();

    match Transaction::start_confdir("pam-bridge-test", None, handler, &missing) {
        Err(e) => {
            assert!(
                e.to_string()
                    .starts_with("pam_start failed for service \"pam-bridge-test\": "),
                "unexpected message: {e}"
            );
            // The handler token is released on the failure path too.
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
        Ok(_) => eprintln!("skipping: pam_start_confdir accepted a missing directory"),
    }
}

#[test]
fn test_start_confdir_capability() {
    if !libpam_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let result = Transaction::start_confdir("pam-bridge-test", None, Binary, dir.path());
    if !pam_bridge::has_start_confdir() || !pam_bridge::has_binary_prompt() {
        assert_eq!(result.err().map(|e| e.code()), Some(ReturnCode::SystemErr));
        return;
    }
    // An empty confdir may still be rejected by the library itself.
    if let Err(e) = result {
        eprintln!("pam_start_confdir failed: {e}");
    }
}
