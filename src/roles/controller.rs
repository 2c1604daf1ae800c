use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::collaborators::Collaborators;
use crate::cluster::events::RolesUpdate;
use crate::membership::types::Role;

enum RoleCommand {
    Apply(RolesUpdate),
    Shutdown,
}

/// Cheap cloneable handle the cluster service uses to push role changes at
/// the controller task. Sends never block the dispatch loop.
#[derive(Clone)]
pub struct RoleControllerHandle {
    tx: UnboundedSender<RoleCommand>,
}

impl RoleControllerHandle {
    pub fn apply(&self, update: RolesUpdate) {
        let _ = self.tx.send(RoleCommand::Apply(update));
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(RoleCommand::Shutdown);
    }

    /// A handle wired to nothing. Role changes are discarded.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// Applies role transitions to the external collaborators, one at a time,
/// in the order the cluster service emitted them.
pub struct RoleController {
    collaborators: Collaborators,
    current: BTreeSet<Role>,
    broker: Option<Ipv4Addr>,
    gateway: Option<Ipv4Addr>,
    rx: UnboundedReceiver<RoleCommand>,
}

impl RoleController {
    pub fn spawn(collaborators: Collaborators) -> RoleControllerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            collaborators,
            current: BTreeSet::new(),
            broker: None,
            gateway: None,
            rx,
        };
        tokio::spawn(controller.run());
        RoleControllerHandle { tx }
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                RoleCommand::Apply(update) => self.apply(update).await,
                RoleCommand::Shutdown => {
                    self.stop_all().await;
                    break;
                }
            }
        }
        tracing::debug!("Role controller stopped");
    }

    async fn apply(&mut self, update: RolesUpdate) {
        if update.roles == self.current
            && update.broker == self.broker
            && update.gateway == self.gateway
        {
            tracing::debug!("Role set unchanged, collaborators left alone");
            return;
        }

        tracing::info!(
            "Applying role transition {:?} -> {:?} (announced by {})",
            self.current,
            update.roles,
            update.source
        );

        let keeps_broker = update.roles.contains(&Role::MessageBroker);
        let keeps_gateway = update.roles.contains(&Role::Gateway);
        let keeps_editing = update.roles.contains(&Role::Editing);
        let broker_moved = update.broker != self.broker;

        // Stop phase. Each stop completes before anything new starts.
        if self.current.contains(&Role::MessageBroker) && !keeps_broker {
            if let Err(e) = self.collaborators.broker_server.stop().await {
                tracing::error!("Failed to stop broker server: {}", e);
            }
        }
        if self.current.contains(&Role::Gateway) && !keeps_gateway {
            if let Err(e) = self.collaborators.gateway.stop().await {
                tracing::error!("Failed to stop gateway: {}", e);
            }
        }
        if self.current.contains(&Role::Editing) && !keeps_editing {
            if let Err(e) = self.collaborators.editing.stop().await {
                tracing::error!("Failed to stop editing server: {}", e);
            }
        }
        if self.broker.is_some() && broker_moved {
            if let Err(e) = self.collaborators.broker_client.stop().await {
                tracing::error!("Failed to stop broker client: {}", e);
            }
        }

        // Start phase. A failed start is logged and the logical role is kept;
        // restarting the collaborator is the operator's call.
        if keeps_broker && !self.current.contains(&Role::MessageBroker) {
            if let Err(e) = self.collaborators.broker_server.start().await {
                tracing::error!("Failed to start broker server: {}", e);
            }
        }
        if keeps_gateway && !self.current.contains(&Role::Gateway) {
            if let Err(e) = self.collaborators.gateway.start().await {
                tracing::error!("Failed to start gateway: {}", e);
            }
        }
        if broker_moved {
            if let Some(broker) = update.broker {
                if let Err(e) = self.collaborators.broker_client.start(broker).await {
                    tracing::error!("Failed to connect broker client to {}: {}", broker, e);
                }
            }
        }
        if keeps_editing && !self.current.contains(&Role::Editing) {
            if let Err(e) = self.collaborators.editing.start(update.gateway).await {
                tracing::error!("Failed to start editing server: {}", e);
            }
        }

        self.current = update.roles;
        self.broker = update.broker;
        self.gateway = update.gateway;
    }

    async fn stop_all(&mut self) {
        if self.current.contains(&Role::Editing) {
            let _ = self.collaborators.editing.stop().await;
        }
        if self.broker.is_some() {
            let _ = self.collaborators.broker_client.stop().await;
        }
        if self.current.contains(&Role::Gateway) {
            let _ = self.collaborators.gateway.stop().await;
        }
        if self.current.contains(&Role::MessageBroker) {
            let _ = self.collaborators.broker_server.stop().await;
        }
        self.current.clear();
        self.broker = None;
        self.gateway = None;
    }
}
