//! Handler Invocation Tests
//!
//! How module handler outcomes become native codes and messages.

use anyhow::Context;
use insta::assert_snapshot;
use pam_bridge::testing::MockBackend;
use pam_bridge::{Flags, Item, ModuleTransaction, ReturnCode, TransactionError};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn service(name: &str) -> MockBackend {
    MockBackend::new().with_item(Item::Service, name)
}

fn fail_with(
    code: ReturnCode,
) -> impl Fn(&ModuleTransaction<'_>, Flags, &[String]) -> anyhow::Result<()> {
    move |_: &ModuleTransaction<'_>, _: Flags, _: &[String]| -> anyhow::Result<()> {
        Err(code.into())
    }
}

// ===== Message Qualification =====

#[test]
fn test_ignore_is_never_qualified() {
    let mock = service("login");
    let tx = ModuleTransaction::new(&mock);
    let handler = fail_with(ReturnCode::Ignore);

    let err = tx.invoke_handler(Some(&handler), Flags::NONE, &[]).unwrap_err();
    assert_eq!(err.code(), ReturnCode::Ignore);
    assert_snapshot!(err.to_string(), @"The return value should be ignored by PAM dispatch");
}

#[test]
fn test_native_code_is_qualified_with_service() {
    let mock = service("login");
    let tx = ModuleTransaction::new(&mock);
    let handler = fail_with(ReturnCode::AuthErr);

    let err = tx.invoke_handler(Some(&handler), Flags::NONE, &[]).unwrap_err();
    assert_eq!(err.code(), ReturnCode::AuthErr);
    assert_snapshot!(err.to_string(), @"login failed: Authentication failure");
}

#[test]
fn test_foreign_error_is_system_error() {
    let mock = service("sudo");
    let tx = ModuleTransaction::new(&mock);
    let handler = |_: &ModuleTransaction<'_>, _: Flags, _: &[String]| -> anyhow::Result<()> {
        std::fs::read("/nonexistent/pam-bridge/secret").context("reading secret")?;
        Ok(())
    };

    let err = tx.invoke_handler(Some(&handler), Flags::NONE, &[]).unwrap_err();
    assert_eq!(err.code(), ReturnCode::SystemErr);
    assert_snapshot!(err.to_string(), @"sudo failed: reading secret: System error");
}

#[test]
fn test_wrapped_code_found_by_chain_inspection() {
    let mock = service("sshd");
    let tx = ModuleTransaction::new(&mock);
    let handler = |_: &ModuleTransaction<'_>, _: Flags, _: &[String]| -> anyhow::Result<()> {
        Err(TransactionError::wrap(ReturnCode::UserUnknown, "no such account: mallory").into())
    };

    let err = tx.invoke_handler(Some(&handler), Flags::NONE, &[]).unwrap_err();
    assert_eq!(ReturnCode::find_in(&err), Some(ReturnCode::UserUnknown));
    assert_snapshot!(
        err.to_string(),
        @"sshd failed: no such account: mallory: User not known to the underlying authentication module"
    );
}

#[rstest]
#[case(ReturnCode::AuthErr)]
#[case(ReturnCode::CredInsufficient)]
#[case(ReturnCode::MaxTries)]
#[case(ReturnCode::AcctExpired)]
#[case(ReturnCode::Ignore)]
fn test_code_is_recorded(#[case] code: ReturnCode) {
    let mock = service("login");
    let tx = ModuleTransaction::new(&mock);
    let handler = fail_with(code);

    let err = tx.invoke_handler(Some(&handler), Flags::NONE, &[]).unwrap_err();
    assert_eq!(err.code(), code);
    assert_eq!(tx.status(), code);
}

// ===== Status Register =====

#[test]
fn test_success_overwrites_earlier_failure() {
    let mock = service("login");
    let tx = ModuleTransaction::new(&mock);

    let failing = fail_with(ReturnCode::AuthErr);
    tx.invoke_handler(Some(&failing), Flags::NONE, &[]).unwrap_err();
    assert_eq!(tx.status(), ReturnCode::AuthErr);

    let succeeding =
        |_: &ModuleTransaction<'_>, _: Flags, _: &[String]| -> anyhow::Result<()> { Ok(()) };
    tx.invoke_handler(Some(&succeeding), Flags::NONE, &[]).unwrap();
    assert_eq!(tx.status(), ReturnCode::Success);
}

#[test]
fn test_unset_service_leaves_message_unqualified() {
    let mock = MockBackend::new();
    let tx = ModuleTransaction::new(&mock);
    let handler = fail_with(ReturnCode::PermDenied);

    let err = tx.invoke_handler(Some(&handler), Flags::NONE, &[]).unwrap_err();
    assert_snapshot!(err.to_string(), @"Permission denied");
}

#[test]
fn test_service_lookup_failure_leaves_message_unqualified() {
    // Every backend call fails, including the service item lookup.
    let mock = service("login").failing(ReturnCode::BufErr);
    let tx = ModuleTransaction::new(&mock);
    let handler = fail_with(ReturnCode::PermDenied);

    let err = tx.invoke_handler(Some(&handler), Flags::NONE, &[]).unwrap_err();
    assert_eq!(err.code(), ReturnCode::PermDenied);
    assert_eq!(tx.status(), ReturnCode::PermDenied);
    assert_snapshot!(err.to_string(), @"Permission denied");
}
