//! The form session: one coordinator owning all per-session state.
//!
//! `FormSession` owns the identity, the field registry, the editability gate,
//! the emitter and the reconciler, and implements [`Lifecycle`] so a
//! transport can drive it. Nothing lives in globals.

use crate::diff::{DiffEngine, PrefixSuffixDiff};
use crate::document::CanonicalDocument;
use crate::emitter::{EmitOutcome, LocalChangeEmitter, PatchSink};
use crate::error::FormResult;
use crate::field::{FieldBinding, FieldEvent, FieldId};
use crate::gate::EditGate;
use crate::lifecycle::{AbortInfo, InitInfo, Lifecycle, RemoteInfo, SessionConfig};
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::registry::FieldRegistry;
use crate::session::{KeyGenerator, RandomKeys, SessionIdentity};

/// Notice shown to the user when the transport aborts.
pub const ABORT_NOTICE: &str = "Network Connection Lost";

pub struct FormSession<D = PrefixSuffixDiff> {
    identity: SessionIdentity,
    user_name: String,
    registry: FieldRegistry,
    gate: EditGate,
    emitter: LocalChangeEmitter,
    reconciler: Reconciler<D>,
    share_token: Option<String>,
    abort_notice: Option<String>,
    last_report: Option<ReconcileReport>,
}

impl FormSession<PrefixSuffixDiff> {
    /// Bootstrap from the current share token and enumerate `bindings`.
    pub fn start<I>(token: Option<&str>, bindings: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn FieldBinding>>,
    {
        Self::with_parts(
            token,
            &RandomKeys,
            FieldRegistry::from_bindings(bindings),
            Reconciler::default(),
        )
    }
}

impl<D: DiffEngine> FormSession<D> {
    /// Assemble a session from explicit parts. Every field is disabled until
    /// the readiness pass.
    pub fn with_parts(
        token: Option<&str>,
        keys: &dyn KeyGenerator,
        mut registry: FieldRegistry,
        reconciler: Reconciler<D>,
    ) -> Self {
        let identity = SessionIdentity::bootstrap(token, keys);
        let gate = EditGate::Closed;
        gate.close_fields(&mut registry);

        Self {
            share_token: token.map(|t| t.trim_start_matches('#').to_string()),
            identity,
            user_name: keys.user_name(),
            registry,
            gate,
            emitter: LocalChangeEmitter::new(),
            reconciler,
            abort_notice: None,
            last_report: None,
        }
    }

    /// Configuration bundle for the transport, seeded with the current fields.
    pub fn config(&self, websocket_url: impl Into<String>) -> FormResult<SessionConfig> {
        Ok(SessionConfig {
            initial_state: CanonicalDocument::build(&self.registry).serialize()?,
            websocket_url: websocket_url.into(),
            user_name: self.user_name.clone(),
            channel: self.identity.channel().to_string(),
            crypt_key: self.identity.key().to_string(),
            ..SessionConfig::default()
        })
    }

    /// Route a field-level UI event through the emitter.
    pub fn field_event(
        &mut self,
        id: &FieldId,
        event: FieldEvent,
        sink: &mut dyn PatchSink,
    ) -> FormResult<EmitOutcome> {
        self.emitter
            .on_field_event(&mut self.registry, self.gate, id, event, sink)
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn gate(&self) -> EditGate {
        self.gate
    }

    pub fn emitter(&self) -> &LocalChangeEmitter {
        &self.emitter
    }

    /// Current share token, `#`-prefixed, if there is one.
    pub fn share_token(&self) -> Option<String> {
        self.share_token.as_ref().map(|t| format!("#{t}"))
    }

    pub fn abort_notice(&self) -> Option<&str> {
        self.abort_notice.as_deref()
    }

    pub fn last_report(&self) -> Option<&ReconcileReport> {
        self.last_report.as_ref()
    }

    pub fn snapshot(&self) -> FormResult<String> {
        CanonicalDocument::build(&self.registry).serialize()
    }

    fn reconcile(&mut self, user_document: &str) -> FormResult<()> {
        log::debug!("{user_document}");
        let report = self.reconciler.reconcile(&mut self.registry, user_document)?;
        if !report.missing.is_empty() {
            log::debug!("{} field(s) absent from remote document", report.missing.len());
        }
        self.last_report = Some(report);
        Ok(())
    }
}

impl<D: DiffEngine> Lifecycle for FormSession<D> {
    fn on_init(&mut self, info: &InitInfo<'_>) {
        self.identity.assign_channel(info.channel);
        let token = self.identity.share_token();
        if self.share_token.as_deref() != Some(token.as_str()) {
            log::info!("share token set to #{token}");
            self.share_token = Some(token);
        }
    }

    fn on_local(&mut self, sink: &mut dyn PatchSink) -> FormResult<()> {
        let outcome = self.emitter.on_local(&mut self.registry, self.gate, sink);
        match outcome {
            Ok(_) => Ok(()),
            Err(e) if self.abort_notice.is_some() => {
                log::warn!("dropping local change after abort: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn on_remote(&mut self, info: &RemoteInfo<'_>) -> FormResult<()> {
        if !self.gate.is_open() {
            return Ok(());
        }
        self.reconcile(info.user_document)
    }

    fn on_ready(&mut self, info: &RemoteInfo<'_>) -> FormResult<()> {
        self.reconcile(info.user_document)?;
        log::info!("READY");
        self.gate.open(&mut self.registry);
        Ok(())
    }

    fn on_abort(&mut self, info: &AbortInfo<'_>) {
        log::error!("{ABORT_NOTICE}: {}", info.reason);
        self.abort_notice = Some(ABORT_NOTICE.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldBinding, MemoryField, SelectionRange};
    use crate::session::KeyGenerator;

    struct FixedKeys;

    impl KeyGenerator for FixedKeys {
        fn generate_key(&self) -> String {
            "k3y".to_string()
        }
        fn user_name(&self) -> String {
            "tester".to_string()
        }
    }

    fn session(token: Option<&str>) -> (FormSession, MemoryField, MemoryField) {
        let toggle = MemoryField::checkbox("agree", false);
        let text = MemoryField::text_input("greeting", "hello");
        let mut registry = FieldRegistry::new();
        registry.register_with_id(FieldId::new("toggle"), toggle.boxed()).unwrap();
        registry.register_with_id(FieldId::new("text"), text.boxed()).unwrap();
        let session = FormSession::with_parts(token, &FixedKeys, registry, Reconciler::default());
        (session, toggle, text)
    }

    #[test]
    fn test_fields_disabled_until_ready() {
        let (mut session, toggle, text) = session(None);
        assert!(!toggle.is_enabled());
        assert!(!text.is_enabled());

        session
            .on_ready(&RemoteInfo { user_document: r#"{"toggle":false,"text":"hello"}"# })
            .unwrap();
        assert!(session.gate().is_open());
        assert!(toggle.is_enabled());
        assert!(text.is_enabled());
    }

    #[test]
    fn test_config_bundle() {
        let (session, _, _) = session(None);
        let config = session.config("ws://relay").unwrap();
        assert_eq!(config.initial_state, r#"{"text":"hello","toggle":false}"#);
        assert_eq!(config.channel, "");
        assert_eq!(config.crypt_key, "k3y");
        assert_eq!(config.user_name, "tester");
        assert_eq!(config.websocket_url, "ws://relay");
        assert!((config.transform)(&config.initial_state));
    }

    #[test]
    fn test_remote_before_ready_is_ignored() {
        let (mut session, toggle, _) = session(None);
        session
            .on_remote(&RemoteInfo { user_document: r#"{"toggle":true}"# })
            .unwrap();
        assert!(!toggle.checked());
        assert!(session.last_report().is_none());
    }

    #[test]
    fn test_local_edits_before_ready_produce_nothing() {
        let (mut session, _, text) = session(None);
        let mut sink: Vec<String> = Vec::new();
        text.type_text("typed early", 11);
        session.on_local(&mut sink).unwrap();
        session
            .field_event(&FieldId::new("text"), FieldEvent::KeyUp, &mut sink)
            .unwrap();
        assert!(sink.is_empty());
        assert_eq!(session.emitter().suppressed(), 2);
    }

    #[test]
    fn test_end_to_end_merge() {
        let (mut session, toggle, text) = session(None);
        text.select(SelectionRange::caret(5));
        session
            .on_ready(&RemoteInfo { user_document: r#"{"toggle":true,"text":"help"}"# })
            .unwrap();
        assert!(toggle.checked());
        assert_eq!(text.text(), "help");
        assert_eq!(text.selection(), Some(SelectionRange::caret(4)));
    }

    #[test]
    fn test_abort_sets_notice_without_closing_gate() {
        let (mut session, _, _) = session(None);
        session.on_ready(&RemoteInfo { user_document: "{}" }).unwrap();
        session.on_abort(&AbortInfo { reason: "socket closed" });
        assert_eq!(session.abort_notice(), Some(ABORT_NOTICE));
        assert!(session.gate().is_open());
    }

    #[test]
    fn test_token_rewritten_on_init() {
        let (mut session, _, _) = session(None);
        assert_eq!(session.share_token(), None);
        let channel = "c".repeat(32);
        session.on_init(&InitInfo { channel: &channel });
        assert_eq!(session.share_token(), Some(format!("#{channel}k3y")));
    }
}
