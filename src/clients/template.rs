use chrono::DateTime;
use handlebars::{Handlebars, handlebars_helper, no_escape};
use tracing::debug;

use crate::{
    error::NotificationResult,
    models::template::{Message, Template, TemplateContext},
    services::TemplateService,
    utils::is_html_document,
};

handlebars_helper!(format_date: |value: str| {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|_| value.to_string())
});

/// Renders notification templates with Handlebars. Template context exposes
/// `event`, `subscriber` and `tenant`.
pub struct HandlebarsTemplateService {
    html: Handlebars<'static>,
    text: Handlebars<'static>,
}

impl HandlebarsTemplateService {
    pub fn new() -> Self {
        let mut html = Handlebars::new();
        html.register_helper("formatDate", Box::new(format_date));

        let mut text = Handlebars::new();
        text.register_escape_fn(no_escape);
        text.register_helper("formatDate", Box::new(format_date));

        Self { html, text }
    }
}

impl Default for HandlebarsTemplateService {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateService for HandlebarsTemplateService {
    fn generate_message(
        &self,
        template: &Template,
        context: &TemplateContext<'_>,
    ) -> NotificationResult<Message> {
        debug!(
            event = %context.event.key(),
            subscriber_id = %context.subscriber.id,
            "Rendering template"
        );

        // Only full HTML documents get escaped values; subjects and text
        // bodies are rendered verbatim.
        let body_registry = if is_html_document(&template.body) {
            &self.html
        } else {
            &self.text
        };

        let subject = self.text.render_template(&template.subject, context)?;
        let body = body_registry.render_template(&template.body, context)?;

        Ok(Message { subject, body })
    }
}
