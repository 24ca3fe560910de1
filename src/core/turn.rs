//! One user prompt and its streamed reply.
//!
//! The orchestrator owns the only write path to a session's continuation
//! token: a completed turn replaces it, a failed turn clears it.

use tracing::{debug, info, warn};

use crate::api::GenerateRequest;
use crate::core::error::{ProtocolError, TurnError};
use crate::core::session::Session;
use crate::core::stream::{RecordStream, TurnStats};
use crate::core::transport::Transport;

/// Receives reply text as it arrives.
pub trait FragmentSink {
    fn on_fragment(&mut self, fragment: &str);
}

impl<F> FragmentSink for F
where
    F: FnMut(&str),
{
    fn on_fragment(&mut self, fragment: &str) {
        self(fragment)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    pub reply: String,
    pub stats: Option<TurnStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Blank input; nothing was sent.
    Skipped,
    Completed(CompletedTurn),
}

pub fn build_request(session: &Session, user_text: &str) -> GenerateRequest {
    GenerateRequest {
        model: session.model().to_string(),
        prompt: user_text.to_string(),
        stream: true,
        system: Some(session.system_preamble().to_string()),
        context: session.continuation_token().map(<[i64]>::to_vec),
    }
}

pub async fn run_turn<T, S>(
    session: &mut Session,
    transport: &T,
    user_text: &str,
    sink: &mut S,
) -> Result<TurnOutcome, TurnError>
where
    T: Transport + ?Sized,
    S: FragmentSink + ?Sized,
{
    if user_text.trim().is_empty() {
        return Ok(TurnOutcome::Skipped);
    }

    let request = build_request(session, user_text);
    debug!(
        model = %request.model,
        carried_context = request.context.as_ref().map_or(0, Vec::len),
        "starting turn"
    );

    match stream_reply(transport, &request, sink).await {
        Ok((reply, token, stats)) => {
            info!(
                model = %session.model(),
                reply_chars = reply.chars().count(),
                context_len = token.as_ref().map_or(0, Vec::len),
                eval_count = stats.and_then(|s| s.eval_count),
                "turn completed"
            );
            session.replace_token(token);
            Ok(TurnOutcome::Completed(CompletedTurn { reply, stats }))
        }
        Err(err) => {
            warn!(model = %session.model(), error = %err, "turn failed; resetting context");
            session.reset();
            Err(err)
        }
    }
}

async fn stream_reply<T, S>(
    transport: &T,
    request: &GenerateRequest,
    sink: &mut S,
) -> Result<(String, Option<Vec<i64>>, Option<TurnStats>), TurnError>
where
    T: Transport + ?Sized,
    S: FragmentSink + ?Sized,
{
    let mut records = RecordStream::new(transport.open(request).await?);
    let mut reply = String::new();

    while let Some(record) = records.next_record().await? {
        if !record.text_fragment.is_empty() {
            sink.on_fragment(&record.text_fragment);
            reply.push_str(&record.text_fragment);
        }
        if record.is_final {
            return Ok((reply, record.final_token, record.stats));
        }
    }

    Err(ProtocolError::MissingFinal.into())
}
