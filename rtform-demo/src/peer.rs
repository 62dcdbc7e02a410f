//! One simulated participant: a form with three fields, its session and its
//! relay client.

use rtform_collab::{RealtimeClient, Relay, RelayResult};
use rtform_core::{FieldBinding, FormSession, MemoryField, SelectionRange};

pub struct DemoPeer {
    pub label: &'static str,
    pub session: FormSession,
    pub client: RealtimeClient,
    pub subscribe: MemoryField,
    pub name: MemoryField,
    pub comments: MemoryField,
}

impl DemoPeer {
    /// Enumerate the form and prepare a client. Nothing is sent yet.
    pub fn new(label: &'static str, relay: &Relay, token: Option<&str>) -> RelayResult<Self> {
        let subscribe = MemoryField::checkbox("subscribe", false);
        let name = MemoryField::text_input("name", "");
        let comments = MemoryField::textarea("comments", "");

        let session = FormSession::start(
            token,
            [subscribe.boxed(), name.boxed(), comments.boxed()],
        );

        let client = RealtimeClient::new(relay.clone(), session.config("ws://in-process")?);
        Ok(Self {
            label,
            session,
            client,
            subscribe,
            name,
            comments,
        })
    }

    pub async fn connect(&mut self) -> RelayResult<()> {
        self.client.connect(&mut self.session).await
    }

    /// Type into `field` and publish the change.
    pub async fn type_into(&mut self, field: Field, text: &str) -> RelayResult<()> {
        let binding = self.field(field);
        binding.type_text(text, text.chars().count());
        self.client.local_change(&mut self.session).await
    }

    pub async fn toggle_subscribe(&mut self, checked: bool) -> RelayResult<()> {
        self.subscribe.click(checked);
        self.client.local_change(&mut self.session).await
    }

    pub fn place_caret(&self, field: Field, offset: usize) {
        self.field(field).select(SelectionRange::caret(offset));
    }

    /// Handle everything the relay has delivered so far.
    pub async fn sync(&mut self) -> RelayResult<usize> {
        self.client.pump(&mut self.session).await
    }

    pub fn describe(&self) -> String {
        format!(
            "{:<5} subscribe={} name={:?} comments={:?} caret={:?}",
            self.label,
            self.subscribe.checked(),
            self.name.text(),
            self.comments.text(),
            self.comments.selection().map(|s| s.start),
        )
    }

    fn field(&self, field: Field) -> &MemoryField {
        match field {
            Field::Name => &self.name,
            Field::Comments => &self.comments,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Field {
    Name,
    Comments,
}
