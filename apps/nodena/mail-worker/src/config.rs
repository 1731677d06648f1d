//! Mail worker settings loaded from the environment.

use core_config::redis::RedisConfig;
use core_config::{
    ConfigError, Environment, FromEnv, env_optional, env_or_default, env_parse, env_parse_optional,
};
use domain_mailer::{MailQueue, ProviderKind};
use queue_worker::{QueueDef, WorkerConfig};
use std::path::PathBuf;

/// Everything the worker needs to start.
#[derive(Debug, Clone)]
pub struct MailWorkerSettings {
    pub environment: Environment,
    pub redis: RedisConfig,
    pub worker: WorkerConfig,
    pub provider: ProviderKind,
    /// Directory with `<template>.hbs` overrides.
    pub template_dir: Option<PathBuf>,
}

/// Mailgun in production, log output everywhere else.
pub fn default_provider(environment: &Environment) -> ProviderKind {
    if environment.is_production() {
        ProviderKind::Mailgun
    } else {
        ProviderKind::Log
    }
}

impl FromEnv for MailWorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();

        let mut worker = WorkerConfig::new(
            env_or_default("MAIL_QUEUE_NAME", MailQueue::QUEUE_NAME),
            env_or_default("MAIL_CHANNEL", MailQueue::CHANNEL),
        )
        .with_max_retries(env_parse("MAIL_MAX_RETRIES", 0)?)
        .with_retry_delay_ms(env_parse("MAIL_RETRY_DELAY_MS", 500)?);
        worker.dead_letter_queue = env_optional("MAIL_DEAD_LETTER_QUEUE");
        worker.dead_letter_max_length = env_parse_optional("MAIL_DEAD_LETTER_MAX_LEN")?;

        Ok(Self {
            provider: env_parse("MAIL_PROVIDER", default_provider(&environment))?,
            redis: RedisConfig::from_env()?,
            template_dir: env_optional("MAIL_TEMPLATE_DIR").map(PathBuf::from),
            environment,
            worker,
        })
    }
}
