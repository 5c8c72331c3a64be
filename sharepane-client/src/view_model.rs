use std::time::{Duration, Instant};

use sharepane_core::{
    BackendEvent, DisplayRow, EndpointInfo, MergeStrategy, OutboundCommand, OutboundPayload,
    TransferRecord, UserIntent, VisibilityFilter, encode_send, encode_user_action, merge_with,
    normalize_channel_message, reconcile,
};
use tracing::{debug, info};

use crate::backend::{InvokeError, Invoker};

/// A row the user dismissed, removed once its grace delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToDelete {
    pub id: String,
    pub triggered: Instant,
}

/// UI-side state: everything the backend told us plus what the user staged.
///
/// Only the event-processing task mutates it; rows are recomputed from the
/// stored records on every [`displayed_items`](Self::displayed_items) call.
#[derive(Debug, Default)]
pub struct ViewModel {
    requests: Vec<TransferRecord>,
    endpoints: Vec<EndpointInfo>,
    to_delete: Vec<ToDelete>,
    outbound_payload: Option<OutboundPayload>,
    discovery_running: bool,
    visible: VisibilityFilter,
    merge: MergeStrategy,
}

impl ViewModel {
    pub fn new(visible: VisibilityFilter, merge: MergeStrategy) -> Self {
        Self {
            visible,
            merge,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> &[TransferRecord] {
        &self.requests
    }

    pub fn endpoints(&self) -> &[EndpointInfo] {
        &self.endpoints
    }

    pub fn outbound_payload(&self) -> Option<&OutboundPayload> {
        self.outbound_payload.as_ref()
    }

    pub fn discovery_running(&self) -> bool {
        self.discovery_running
    }

    pub fn pending_removals(&self) -> &[ToDelete] {
        &self.to_delete
    }

    pub fn apply_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Endpoint(info) => self.apply_endpoint(info),
            BackendEvent::Transfer(message) => {
                let next = normalize_channel_message(&message);
                self.apply_record(next);
            }
        }
    }

    fn apply_endpoint(&mut self, info: EndpointInfo) {
        let idx = self.endpoints.iter().position(|el| el.id == info.id);
        match (idx, info.present) {
            (Some(idx), Some(false)) => {
                debug!(id = %info.id, "endpoint gone");
                self.endpoints.remove(idx);
            }
            (None, Some(false)) => {}
            (Some(idx), _) => self.endpoints[idx] = info,
            (None, _) => {
                debug!(id = %info.id, name = ?info.name, "endpoint discovered");
                self.endpoints.push(info);
            }
        }
    }

    fn apply_record(&mut self, next: TransferRecord) {
        match self.requests.iter_mut().find(|el| el.id == next.id) {
            Some(prev) => *prev = merge_with(self.merge, prev, &next),
            None => {
                debug!(id = %next.id, state = ?next.state, "new transfer");
                self.requests.push(next);
            }
        }
    }

    pub fn displayed_items(&self) -> Vec<DisplayRow> {
        reconcile(&self.endpoints, &self.requests, &self.visible)
    }

    pub fn displayed_is_empty(&self) -> bool {
        self.displayed_items().is_empty()
    }

    /// Drops a transfer record. Returns `false` if the id was unknown.
    pub fn remove_request(&mut self, id: &str) -> bool {
        self.to_delete.retain(|el| el.id != id);
        match self.requests.iter().position(|el| el.id == id) {
            Some(idx) => {
                self.requests.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn schedule_removal(&mut self, id: &str, now: Instant) {
        if self.to_delete.iter().any(|el| el.id == id) {
            return;
        }
        self.to_delete.push(ToDelete {
            id: id.to_owned(),
            triggered: now,
        });
    }

    /// Removes every dismissed record whose delay has elapsed and returns their ids.
    pub fn sweep_removals(&mut self, now: Instant, delay: Duration) -> Vec<String> {
        let (due, pending): (Vec<ToDelete>, Vec<ToDelete>) = self
            .to_delete
            .drain(..)
            .partition(|el| now.saturating_duration_since(el.triggered) >= delay);
        self.to_delete = pending;

        let mut removed = Vec::with_capacity(due.len());
        for el in due {
            if self.remove_request(&el.id) {
                removed.push(el.id);
            }
        }
        removed
    }

    pub async fn stage_payload(
        &mut self,
        invoker: &impl Invoker,
        payload: OutboundPayload,
    ) -> Result<(), InvokeError> {
        if !self.discovery_running {
            invoker.invoke(OutboundCommand::StartDiscovery).await?;
            self.discovery_running = true;
        }
        self.outbound_payload = Some(payload);
        Ok(())
    }

    /// Stops discovery and forgets the staged payload and the endpoint list.
    /// Local state is only reset once the backend accepted the stop command.
    pub async fn clear_sending(&mut self, invoker: &impl Invoker) -> Result<(), InvokeError> {
        invoker.invoke(OutboundCommand::StopDiscovery).await?;
        self.outbound_payload = None;
        self.discovery_running = false;
        self.endpoints.clear();
        Ok(())
    }

    /// Sends the staged payload to a discovered endpoint. `Ok(false)` means
    /// there was nothing to send and no command went out.
    pub async fn send_info(&self, invoker: &impl Invoker, id: &str) -> Result<bool, InvokeError> {
        let Some(endpoint) = self.endpoints.iter().find(|el| el.id == id) else {
            debug!(id, "send to unknown endpoint ignored");
            return Ok(false);
        };

        let Some(command) = encode_send(endpoint, self.outbound_payload.as_ref()) else {
            debug!(id, "nothing to send");
            return Ok(false);
        };

        info!(id, "sending payload");
        invoker.invoke(command).await?;
        Ok(true)
    }

    pub async fn send_cmd(
        &self,
        invoker: &impl Invoker,
        id: &str,
        intent: UserIntent,
    ) -> Result<(), InvokeError> {
        info!(id, ?intent, "transfer action");
        invoker.invoke(encode_user_action(id, intent)).await
    }
}
