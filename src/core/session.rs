//! Session orchestration: one user turn in, one assistant turn out.
//!
//! The session owns the transcript store and the completion client for
//! the lifetime of the process. Everything runs on one logical thread;
//! `submit` holds `&mut self` for the whole exchange, so there is never
//! more than one request in flight and the store needs no locking.

use std::error::Error as StdError;
use std::fmt;

use crate::core::chat_stream::{aggregate, CompletionClient, CompletionError, TokenStream};
use crate::core::language::Language;
use crate::core::message::Turn;
use crate::core::model::ModelId;
use crate::core::transcript::{TranscriptError, TranscriptStore};

/// A failure while handling one user message.
///
/// Completion failures are routine and rendered inline; transcript
/// failures put history at risk and stop the session.
#[derive(Debug)]
pub enum SessionError {
    Transcript(TranscriptError),
    Completion(CompletionError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Transcript(source) => source.fmt(f),
            SessionError::Completion(source) => source.fmt(f),
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionError::Transcript(source) => Some(source),
            SessionError::Completion(source) => Some(source),
        }
    }
}

impl From<TranscriptError> for SessionError {
    fn from(value: TranscriptError) -> Self {
        SessionError::Transcript(value)
    }
}

impl From<CompletionError> for SessionError {
    fn from(value: CompletionError) -> Self {
        SessionError::Completion(value)
    }
}

/// One interactive chat session.
pub struct Session {
    store: TranscriptStore,
    client: CompletionClient,
    model: ModelId,
    language: Language,
}

impl Session {
    pub fn new(
        store: TranscriptStore,
        client: CompletionClient,
        model: ModelId,
        language: Language,
    ) -> Self {
        Session {
            store,
            client,
            model,
            language,
        }
    }

    /// Hydrate the transcript from its mirror. Called once at startup;
    /// corrupt persisted state propagates so the caller can refuse to
    /// run rather than overwrite history.
    pub fn hydrate(&mut self) -> Result<&[Turn], TranscriptError> {
        self.store.load()
    }

    /// Handle one user message: record it, stream the completion through
    /// `sink`, record the assembled assistant turn.
    ///
    /// The user turn is appended before the request goes out, so the
    /// transcript reflects the input even when the completion fails. A
    /// failed completion appends no assistant turn at all.
    pub async fn submit<F>(&mut self, text: &str, sink: F) -> Result<(), SessionError>
    where
        F: FnMut(&str),
    {
        self.store.append(Turn::user(text))?;
        let stream = self.client.request(self.model, text, self.language).await?;
        self.complete(stream, sink).await
    }

    /// Drive one token stream to exhaustion and record the result.
    ///
    /// An empty completion still produces an (empty) assistant turn.
    async fn complete<F>(&mut self, stream: TokenStream, sink: F) -> Result<(), SessionError>
    where
        F: FnMut(&str),
    {
        let content = aggregate(stream, sink).await?;
        self.store.append(Turn::assistant(content))?;
        Ok(())
    }

    /// Wipe the history and its on-disk mirror.
    pub fn clear(&mut self) -> Result<(), TranscriptError> {
        self.store.clear()
    }

    pub fn select_model(&mut self, model: ModelId) {
        self.model = model;
    }

    pub fn select_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Base URL of the completion endpoint this session talks to.
    pub fn endpoint(&self) -> &str {
        self.client.base_url()
    }

    pub fn turns(&self) -> &[Turn] {
        self.store.turns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use crate::core::transcript::TRANSCRIPT_FILE;
    use bytes::Bytes;
    use std::path::Path;
    use tempfile::tempdir;

    fn session_in(dir: &Path) -> Session {
        Session::new(
            TranscriptStore::new(dir.join(TRANSCRIPT_FILE)),
            CompletionClient::new("http://localhost:0", "test-key"),
            ModelId::default(),
            Language::default(),
        )
    }

    fn sse_stream(fragments: &[&str]) -> TokenStream {
        let mut chunks: Vec<Bytes> = fragments
            .iter()
            .map(|fragment| {
                Bytes::from(format!(
                    "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n",
                    serde_json::to_string(fragment).unwrap()
                ))
            })
            .collect();
        chunks.push(Bytes::from("data: [DONE]\n"));
        TokenStream::from_chunks(chunks)
    }

    fn failing_stream() -> TokenStream {
        TokenStream::from_chunks(vec![Bytes::from(
            "data: {\"error\":{\"message\":\"invalid api key\"}}\n",
        )])
    }

    #[tokio::test]
    async fn one_exchange_lands_in_memory_and_on_disk() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.hydrate().unwrap();

        session.store.append(Turn::user("Hola")).unwrap();
        let mut fragments = Vec::new();
        session
            .complete(sse_stream(&["¡Hola", "! ¿Cómo", " estás?"]), |fragment| {
                fragments.push(fragment.to_string())
            })
            .await
            .unwrap();

        assert_eq!(fragments, ["¡Hola", "! ¿Cómo", " estás?"]);
        let turns = session.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "Hola");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "¡Hola! ¿Cómo estás?");

        // The mirror reflects the same two entries.
        let mut reloaded = TranscriptStore::new(dir.path().join(TRANSCRIPT_FILE));
        assert_eq!(reloaded.load().unwrap(), session.turns());
    }

    #[tokio::test]
    async fn failed_completion_leaves_only_the_user_turn() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.hydrate().unwrap();

        session.store.append(Turn::user("Hola")).unwrap();
        let result = session.complete(failing_stream(), |_| {}).await;

        assert!(matches!(result, Err(SessionError::Completion(_))));
        assert_eq!(session.turns().len(), 1);
        assert!(session.turns()[0].role.is_user());

        let mut reloaded = TranscriptStore::new(dir.path().join(TRANSCRIPT_FILE));
        assert_eq!(reloaded.load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_completion_appends_an_empty_assistant_turn() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.hydrate().unwrap();

        session.store.append(Turn::user("Hola")).unwrap();
        session.complete(sse_stream(&[]), |_| {}).await.unwrap();

        let turns = session.turns();
        assert_eq!(turns.len(), 2);
        assert!(turns[1].role.is_assistant());
        assert_eq!(turns[1].content, "");
    }

    #[tokio::test]
    async fn hydration_restores_previous_exchanges() {
        let dir = tempdir().unwrap();
        {
            let mut session = session_in(dir.path());
            session.hydrate().unwrap();
            session.store.append(Turn::user("Hola")).unwrap();
            session.complete(sse_stream(&["Buenas"]), |_| {}).await.unwrap();
        }

        let mut session = session_in(dir.path());
        let turns = session.hydrate().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "Buenas");
    }

    #[test]
    fn clear_resets_the_session() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());
        session.store.append(Turn::user("Hola")).unwrap();

        session.clear().unwrap();
        assert!(session.turns().is_empty());
        assert!(!dir.path().join(TRANSCRIPT_FILE).exists());
    }

    #[test]
    fn selection_updates_session_configuration() {
        let dir = tempdir().unwrap();
        let mut session = session_in(dir.path());

        session.select_model(ModelId::Mixtral8x7b);
        session.select_language(Language::French);
        assert_eq!(session.model(), ModelId::Mixtral8x7b);
        assert_eq!(session.language(), Language::French);
    }
}
