//! Queue definitions for the mailer domain.

use queue_worker::QueueDef;

/// Mail jobs queue definition.
///
/// Request handlers publish on the `email` channel, the mail worker appends
/// each payload to `mailQueue` and drains it.
pub struct MailQueue;

impl QueueDef for MailQueue {
    const QUEUE_NAME: &'static str = "mailQueue";

    const CHANNEL: &'static str = "email";
}
