//! Conversation Tests
//!
//! Module-side prompts answered by an application handler. The mock
//! backend routes every round trip through the native trampoline.

use pam_bridge::testing::MockBackend;
use pam_bridge::{
    BinaryConversationHandler, BinaryPrompt, ConvRequest, ConvResponse, ConversationFunc,
    ConversationHandler, ModuleTransaction, ReturnCode, Style,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Echoes prompts back and counts calls
struct Scripted {
    calls: Arc<AtomicUsize>,
}

impl ConversationHandler for Scripted {
    fn respond(&self, style: Style, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match style {
            Style::PromptEchoOn if prompt == "Username: " => Ok("alice".to_string()),
            Style::PromptEchoOff => Ok("correct horse".to_string()),
            Style::ErrorMsg | Style::TextInfo => Ok(String::new()),
            _ => anyhow::bail!("unexpected prompt {prompt:?}"),
        }
    }
}

/// Answers binary prompts with the payload's length
struct Measuring;

impl ConversationHandler for Measuring {
    fn respond(&self, _: Style, _: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }

    fn as_binary(&self) -> Option<&dyn BinaryConversationHandler> {
        Some(self)
    }
}

impl BinaryConversationHandler for Measuring {
    fn respond_binary(&self, prompt: &BinaryPrompt) -> anyhow::Result<BinaryPrompt> {
        let len = prompt.data().len() as u32;
        Ok(BinaryPrompt::new(prompt.control(), len.to_be_bytes().to_vec()))
    }
}

fn scripted() -> (MockBackend, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mock = MockBackend::new().with_conversation(Scripted {
        calls: Arc::clone(&calls),
    });
    (mock, calls)
}

// ===== Single Requests =====

#[test]
fn test_username_prompt() {
    let (mock, calls) = scripted();
    let tx = ModuleTransaction::new(&mock);

    let response = tx
        .start_conv(ConvRequest::text(Style::PromptEchoOn, "Username: "))
        .unwrap();
    assert_eq!(
        response,
        ConvResponse::Text {
            style: Style::PromptEchoOn,
            text: "alice".to_string(),
        }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(tx.status(), ReturnCode::Success);
}

#[test]
fn test_string_conv() {
    let (mock, _) = scripted();
    let tx = ModuleTransaction::new(&mock);

    let password = tx.start_string_conv(Style::PromptEchoOff, "Password: ").unwrap();
    assert_eq!(password, "correct horse");

    let user = tx
        .start_string_conv_fmt(Style::PromptEchoOn, format_args!("{}: ", "Username"))
        .unwrap();
    assert_eq!(user, "alice");
}

#[test]
fn test_informational_message_reads_empty() {
    let (mock, _) = scripted();
    let tx = ModuleTransaction::new(&mock);

    let text = tx
        .start_string_conv(Style::TextInfo, "Your password expires soon")
        .unwrap();
    assert_eq!(text, "");
}

// ===== Batches =====

#[test]
fn test_batch_keeps_order_and_styles() {
    let (mock, calls) = scripted();
    let tx = ModuleTransaction::new(&mock);

    let responses = tx
        .start_conv_multi(&[
            ConvRequest::text(Style::TextInfo, "Welcome"),
            ConvRequest::text(Style::PromptEchoOn, "Username: "),
            ConvRequest::text(Style::PromptEchoOff, "Password: "),
        ])
        .unwrap();

    let styles: Vec<_> = responses.iter().map(ConvResponse::style).collect();
    assert_eq!(
        styles,
        vec![Style::TextInfo, Style::PromptEchoOn, Style::PromptEchoOff]
    );
    let texts: Vec<_> = responses.iter().filter_map(ConvResponse::text).collect();
    assert_eq!(texts, vec!["", "alice", "correct horse"]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[rstest]
#[case(0)]
#[case(33)]
#[case(100)]
fn test_batch_size_rejected_before_native_call(#[case] size: usize) {
    let (mock, calls) = scripted();
    let tx = ModuleTransaction::new(&mock);
    let requests = vec![ConvRequest::text(Style::TextInfo, "hi"); size];

    let err = tx.start_conv_multi(&requests).unwrap_err();
    assert_eq!(err.code(), ReturnCode::ConvErr);
    assert_eq!(tx.status(), ReturnCode::ConvErr);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_full_batch_is_accepted() {
    let (mock, calls) = scripted();
    let tx = ModuleTransaction::new(&mock);
    let requests = vec![ConvRequest::text(Style::TextInfo, "hi"); 32];

    assert_eq!(tx.start_conv_multi(&requests).unwrap().len(), 32);
    assert_eq!(calls.load(Ordering::SeqCst), 32);
}

#[test]
fn test_handler_failure_yields_no_responses() {
    let (mock, _) = scripted();
    let tx = ModuleTransaction::new(&mock);

    let err = tx
        .start_conv_multi(&[
            ConvRequest::text(Style::PromptEchoOn, "Username: "),
            ConvRequest::text(Style::PromptEchoOn, "Favourite colour: "),
        ])
        .unwrap_err();
    assert_eq!(err.code(), ReturnCode::ConvErr);
    assert_eq!(tx.status(), ReturnCode::ConvErr);
}

// ===== Failure Modes =====

#[test]
fn test_missing_conversation() {
    let mock = MockBackend::new();
    let tx = ModuleTransaction::new(&mock);

    let err = tx
        .start_string_conv(Style::PromptEchoOn, "Username: ")
        .unwrap_err();
    assert_eq!(err.code(), ReturnCode::ConvErr);
}

#[test]
fn test_binary_style_through_string_entry() {
    let (mock, calls) = scripted();
    let tx = ModuleTransaction::new(&mock);

    let err = tx
        .start_string_conv(Style::BinaryPrompt, "raw")
        .unwrap_err();
    assert_eq!(err.code(), ReturnCode::ConvErr);
    assert_eq!(tx.status(), ReturnCode::ConvErr);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_binary_to_text_only_handler() {
    let (mock, _) = scripted();
    let tx = ModuleTransaction::new(&mock);

    let err = tx
        .start_binary_conv(BinaryPrompt::new(1, b"challenge".to_vec()))
        .unwrap_err();
    assert_eq!(err.code(), ReturnCode::ConvErr);
}

// ===== Binary Prompts =====

#[test]
fn test_binary_roundtrip() {
    let mock = MockBackend::new().with_conversation(Measuring);
    let tx = ModuleTransaction::new(&mock);

    let reply = tx
        .start_binary_conv(BinaryPrompt::new(0x10, b"nonce-1234".to_vec()))
        .unwrap();
    assert_eq!(reply.control(), 0x10);
    assert_eq!(reply.data(), &10u32.to_be_bytes());
}

#[test]
fn test_mixed_batch() {
    let mock = MockBackend::new().with_conversation(Measuring);
    let tx = ModuleTransaction::new(&mock);

    let responses = tx
        .start_conv_multi(&[
            ConvRequest::text(Style::TextInfo, "starting"),
            ConvRequest::binary(BinaryPrompt::new(2, vec![0; 3])),
        ])
        .unwrap();
    assert_eq!(responses[0].text(), Some(""));
    assert_eq!(
        responses[1].binary().map(BinaryPrompt::data),
        Some(&3u32.to_be_bytes()[..])
    );
}

// ===== get_user =====

#[test]
fn test_get_user_prompts_through_conversation() {
    let (mock, calls) = scripted();
    let tx = ModuleTransaction::new(&mock);

    assert_eq!(tx.get_user(Some("Username: ")).unwrap(), "alice");
    // Known now, no second prompt.
    assert_eq!(tx.get_user(Some("Username: ")).unwrap(), "alice");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_closure_handler() {
    let mock = MockBackend::new().with_conversation(ConversationFunc(
        |_: Style, prompt: &str| -> anyhow::Result<String> { Ok(prompt.len().to_string()) },
    ));
    let tx = ModuleTransaction::new(&mock);
    assert_eq!(
        tx.start_string_conv(Style::PromptEchoOn, "four").unwrap(),
        "4"
    );
}
