use std::collections::HashMap;

use tracing::warn;

use crate::{
    error::NotificationResult,
    models::{
        event::DomainEvent,
        notification_type::{NotificationType, NotificationTypeDefinition},
        tenant::TenantId,
    },
};

/// Configuration document as returned by the configuration service: type id
/// to type definition.
pub type NotificationTypeDefinitions = HashMap<String, NotificationTypeDefinition>;

/// Notification types resolved for one tenant. Tenant types sharing an id
/// with a core type customize that core type instead of replacing it.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfiguration {
    tenant_id: Option<TenantId>,
    types: Vec<NotificationType>,
}

impl NotificationConfiguration {
    pub fn new(
        tenant_types: Vec<NotificationType>,
        core_types: Vec<NotificationType>,
        tenant_id: Option<TenantId>,
    ) -> Self {
        let mut core_by_id: HashMap<String, NotificationType> = core_types
            .into_iter()
            .map(|notification_type| (notification_type.id().to_string(), notification_type))
            .collect();

        let mut tenant_resolved: Vec<NotificationType> = tenant_types
            .into_iter()
            .map(|tenant_type| match core_by_id.remove(tenant_type.id()) {
                Some(core_type) => core_type.override_with(&tenant_type),
                None => tenant_type,
            })
            .collect();
        tenant_resolved.sort_by(|a, b| a.id().cmp(b.id()));

        let mut core_resolved: Vec<NotificationType> = core_by_id.into_values().collect();
        core_resolved.sort_by(|a, b| a.id().cmp(b.id()));

        let types = tenant_resolved
            .into_iter()
            .chain(core_resolved)
            .map(|notification_type| match &tenant_id {
                Some(tenant_id) => notification_type.with_tenant(tenant_id.clone()),
                None => notification_type,
            })
            .collect();

        Self { tenant_id, types }
    }

    /// Builds configuration from raw documents. Invalid definitions are
    /// logged and left out so one bad type does not block the others.
    pub fn from_definitions(
        tenant_definitions: Option<NotificationTypeDefinitions>,
        core_definitions: Option<NotificationTypeDefinitions>,
        tenant_id: Option<TenantId>,
    ) -> Self {
        let tenant_types = convert_definitions(tenant_definitions.unwrap_or_default());
        let core_types = convert_definitions(core_definitions.unwrap_or_default());

        Self::new(tenant_types, core_types, tenant_id)
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn notification_types(&self) -> &[NotificationType] {
        &self.types
    }

    pub fn get_notification_type(&self, id: &str) -> Option<&NotificationType> {
        self.types.iter().find(|notification_type| notification_type.id() == id)
    }

    pub fn get_event_notification_types(&self, event: &DomainEvent) -> Vec<&NotificationType> {
        self.types
            .iter()
            .filter(|notification_type| notification_type.is_bound_to(event))
            .collect()
    }
}

fn convert_definitions(definitions: NotificationTypeDefinitions) -> Vec<NotificationType> {
    definitions
        .into_iter()
        .filter_map(|(key, mut definition)| {
            if definition.id.is_empty() {
                definition.id = key.clone();
            }

            let converted: NotificationResult<NotificationType> = definition.try_into();
            match converted {
                Ok(notification_type) => Some(notification_type),
                Err(e) => {
                    warn!(type_id = %key, error = %e, "Skipping invalid notification type");
                    None
                }
            }
        })
        .collect()
}
