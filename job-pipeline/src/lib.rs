//! The job lifecycle core: create a job record in the external store,
//! dispatch its text to the external processing webhook, poll for the
//! result, and degrade to a local rule-based anonymizer when the webhook
//! stays silent.

pub mod controller;
pub mod dispatch;
pub mod fallback;
pub mod gateway;
