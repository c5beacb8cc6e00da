//! Module-side conversations
//!
//! Prompts are marshalled into one native message array, the application's
//! conversation function is called once, and the response array is decoded
//! using the style of the request at each position.

use super::{BinaryPrompt, ConvRequest, ConvResponse};
use crate::error::{Result, ReturnCode, TransactionError};
use crate::ffi::marshal::{string_from_ptr, MessageArrayBuilder, NativeResponses, ResponseKind};
use crate::ffi::sys;
use crate::module::ModuleTransaction;
use crate::types::Style;
use std::fmt;
use std::os::raw::c_int;
use std::ptr;

fn conv_err(cause: impl Into<crate::error::Cause>) -> TransactionError {
    TransactionError::wrap(ReturnCode::ConvErr, cause)
}

impl ModuleTransaction<'_> {
    /// Send a batch of prompts in a single round trip
    ///
    /// Batches must hold between 1 and `PAM_MAX_NUM_MSG` requests. On
    /// success there is exactly one response per request, in order.
    pub fn start_conv_multi(&self, requests: &[ConvRequest]) -> Result<Vec<ConvResponse>> {
        self.settle(self.converse(requests))
    }

    /// Send one prompt
    pub fn start_conv(&self, request: ConvRequest) -> Result<ConvResponse> {
        let mut responses = self.start_conv_multi(std::slice::from_ref(&request))?;
        match responses.pop() {
            Some(response) => Ok(response),
            None => self.settle(Err(conv_err("no response"))),
        }
    }

    /// Send one text prompt and return the answer
    pub fn start_string_conv(&self, style: Style, prompt: &str) -> Result<String> {
        if !style.is_text() {
            return self.settle(Err(conv_err(format!("{style:?} is not a text style"))));
        }
        let response = self.start_conv(ConvRequest::text(style, prompt))?;
        Ok(response.into_text().unwrap_or_default())
    }

    /// [`Self::start_string_conv`] with a formatted prompt
    pub fn start_string_conv_fmt(&self, style: Style, args: fmt::Arguments<'_>) -> Result<String> {
        self.start_string_conv(style, &args.to_string())
    }

    /// Send one binary prompt and return the decoded reply
    pub fn start_binary_conv(&self, prompt: BinaryPrompt) -> Result<BinaryPrompt> {
        let response = self.start_conv(ConvRequest::binary(prompt))?;
        match response.into_binary() {
            Some(reply) => Ok(reply),
            None => self.settle(Err(conv_err("expected a binary response"))),
        }
    }

    fn converse(&self, requests: &[ConvRequest]) -> Result<Vec<ConvResponse>> {
        if requests.is_empty() {
            return Err(conv_err("no requests defined"));
        }
        if requests.len() > sys::PAM_MAX_NUM_MSG {
            return Err(conv_err(format!(
                "too many requests {} > {}",
                requests.len(),
                sys::PAM_MAX_NUM_MSG
            )));
        }

        let mut builder = MessageArrayBuilder::new();
        let mut kinds = Vec::with_capacity(requests.len());
        for request in requests {
            match request {
                ConvRequest::Text { style, prompt } => {
                    if !style.is_text() {
                        return Err(conv_err(format!("{style:?} is not a text style")));
                    }
                    builder.text(*style, prompt).map_err(conv_err)?;
                    kinds.push(ResponseKind::Text);
                }
                ConvRequest::Binary(prompt) => {
                    builder.binary(prompt.encode()?);
                    kinds.push(ResponseKind::Binary);
                }
            }
        }
        let mut messages = builder.build();

        let conv = self
            .backend()
            .conversation()
            .map_err(TransactionError::from_raw)?;
        let (conv_fn, appdata) = conv
            .and_then(|conv| conv.conv.map(|f| (f, conv.appdata_ptr)))
            .ok_or_else(|| conv_err("no conversation function registered"))?;

        let mut raw = ptr::null_mut();
        // Safety: messages stay alive for the whole call and raw is a valid
        // out-pointer; whatever comes back is owned by `responses`.
        let status = unsafe {
            conv_fn(
                messages.len() as c_int,
                messages.as_native(),
                &mut raw,
                appdata,
            )
        };
        let responses = unsafe { NativeResponses::from_raw(raw, kinds) };
        if status != sys::PAM_SUCCESS {
            return Err(TransactionError::from_raw(status));
        }
        if responses.is_null() {
            return Err(conv_err("conversation returned no responses"));
        }
        tracing::debug!(count = requests.len(), "conversation completed");

        requests
            .iter()
            .enumerate()
            .map(|(index, request)| decode(&responses, index, request.style()))
            .collect()
    }
}

fn decode(responses: &NativeResponses, index: usize, style: Style) -> Result<ConvResponse> {
    let raw = responses.get(index);
    match style {
        Style::PromptEchoOff | Style::PromptEchoOn | Style::ErrorMsg | Style::TextInfo => {
            // Safety: text responses are NUL-terminated; null reads as "".
            let text = unsafe { string_from_ptr(raw) }.unwrap_or_default();
            Ok(ConvResponse::Text { style, text })
        }
        Style::BinaryPrompt => {
            // Safety: binary responses carry a libpamc frame.
            let reply = unsafe { BinaryPrompt::from_native(raw as *const u8) }?;
            Ok(ConvResponse::Binary(reply))
        }
    }
}
