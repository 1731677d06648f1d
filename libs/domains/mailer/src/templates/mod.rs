//! Email template rendering engine.
//!
//! Handlebars templates are compiled once at startup. Each template has an
//! embedded default which a `<name>.hbs` file in the template directory
//! replaces.

use crate::error::{MailError, MailResult};
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};
use tracing::{debug, info};

/// Templates known to the mailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum MailTemplate {
    Message,
    Welcome,
    Reset,
    PasswordChanged,
    Subscribe,
}

impl MailTemplate {
    /// File name looked up in the template directory.
    pub fn file_name(&self) -> String {
        format!("{}.hbs", self.as_ref())
    }

    fn default_source(&self) -> &'static str {
        match self {
            MailTemplate::Message => MESSAGE_TEMPLATE,
            MailTemplate::Welcome => WELCOME_TEMPLATE,
            MailTemplate::Reset => RESET_TEMPLATE,
            MailTemplate::PasswordChanged => PASSWORD_CHANGED_TEMPLATE,
            MailTemplate::Subscribe => SUBSCRIBE_TEMPLATE,
        }
    }
}

/// Template engine for rendering email bodies.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// Create an engine with the built-in templates.
    pub fn new() -> MailResult<Self> {
        let mut handlebars = Handlebars::new();

        for template in MailTemplate::iter() {
            handlebars
                .register_template_string(template.as_ref(), template.default_source())
                .map_err(|e| {
                    MailError::TemplateError(format!("Failed to register {}: {}", template, e))
                })?;
        }

        Ok(Self { handlebars })
    }

    /// Create an engine whose templates may be overridden from `dir`.
    ///
    /// Templates without a file in `dir` keep their built-in source.
    pub fn from_dir(dir: impl AsRef<Path>) -> MailResult<Self> {
        let dir = dir.as_ref();
        let mut engine = Self::new()?;
        let mut overridden = 0;

        for template in MailTemplate::iter() {
            let path = dir.join(template.file_name());
            if !path.is_file() {
                continue;
            }

            let source = std::fs::read_to_string(&path)?;
            engine.register(template, &source)?;
            debug!(template = %template, path = %path.display(), "Loaded template override");
            overridden += 1;
        }

        info!(dir = %dir.display(), overridden, "Templates loaded");
        Ok(engine)
    }

    /// Replace the source of one template.
    pub fn register(&mut self, template: MailTemplate, source: &str) -> MailResult<()> {
        self.handlebars
            .register_template_string(template.as_ref(), source)
            .map_err(|e| MailError::TemplateError(format!("Failed to register {}: {}", template, e)))
    }

    /// Render a template against the given data.
    pub fn render<T: Serialize>(&self, template: MailTemplate, data: &T) -> MailResult<String> {
        Ok(self.handlebars.render(template.as_ref(), data)?)
    }
}

// ============================================================================
// Built-in templates
// ============================================================================

const MESSAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>New message on NodeNA</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #2c3e50;">You have a new message</h1>
    <p>Hi {{to.name}},</p>
    <p><strong>{{#if from.name}}{{from.name}}{{else}}{{from.email}}{{/if}}</strong> has sent you a message on NodeNA:</p>
    {{#if subject}}<p><em>{{subject}}</em></p>{{/if}}
    <blockquote style="border-left: 4px solid #3498db; margin: 0; padding: 10px 16px; background: #f7f9fa;">{{message}}</blockquote>
    <p>Reply to this email to answer {{#if from.name}}{{from.name}}{{else}}them{{/if}} directly.</p>
    <p>The NodeNA Team</p>
</body>
</html>
"#;

const WELCOME_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Welcome to NodeNA</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #2c3e50;">Welcome to NodeNA{{#if to.name}}, {{to.name}}{{/if}}!</h1>
    <p>Thanks for joining the NodeNA community.</p>
    {{#if verifyURL}}
    <p>Please confirm your email address to activate your account:</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{{verifyURL}}" style="background-color: #3498db; color: white; padding: 12px 30px; text-decoration: none; border-radius: 5px;">Verify Email</a>
    </p>
    {{/if}}
    <p>The NodeNA Team</p>
</body>
</html>
"#;

const RESET_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Reset your password</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #2c3e50;">Reset your password</h1>
    <p>Hi {{to.name}},</p>
    <p>We received a request to reset the password for your NodeNA account.</p>
    {{#if resetURL}}
    <p style="text-align: center; margin: 30px 0;">
        <a href="{{resetURL}}" style="background-color: #e74c3c; color: white; padding: 12px 30px; text-decoration: none; border-radius: 5px;">Reset Password</a>
    </p>
    {{else}}
    <p>Your reset code is <strong>{{to.resetPasswordToken}}</strong>.</p>
    {{/if}}
    <p>If you didn't request this, you can safely ignore this email.</p>
    <p>The NodeNA Team</p>
</body>
</html>
"#;

const PASSWORD_CHANGED_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Your password has been changed</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #2c3e50;">Your password has been changed</h1>
    <p>Hi {{to.name}},</p>
    <p>This is a confirmation that the password for your NodeNA account {{to.email}} has just been changed.</p>
    <p>If you did not make this change, reset your password immediately and contact us.</p>
    <p>The NodeNA Team</p>
</body>
</html>
"#;

const SUBSCRIBE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Confirm Subscription</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #2c3e50;">Confirm your subscription</h1>
    <p>Hi {{#if to.name}}{{to.name}}{{else}}there{{/if}},</p>
    <p>Please confirm that you want to receive the NodeNA newsletter at {{to.email}}.</p>
    {{#if confirmURL}}
    <p style="text-align: center; margin: 30px 0;">
        <a href="{{confirmURL}}" style="background-color: #27ae60; color: white; padding: 12px 30px; text-decoration: none; border-radius: 5px;">Confirm Subscription</a>
    </p>
    {{/if}}
    <p>If you didn't sign up, just ignore this email.</p>
    <p>The NodeNA Team</p>
</body>
</html>
"#;
