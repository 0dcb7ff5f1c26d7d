use serde_json::Value;
use signalwatch_core::{ExternalChannelId, VerificationFlow};

use crate::cli::ConfirmArgs;
use crate::error::CliError;

pub fn run(args: &ConfirmArgs, flow: &VerificationFlow) -> Result<Value, CliError> {
    let message = start_message(&args.payload);
    let outcome =
        flow.confirm_start_message(&message, ExternalChannelId::new(args.channel_id.trim()))?;
    Ok(serde_json::to_value(outcome)?)
}

/// Bot message equivalent to `payload`.
fn start_message(payload: &str) -> String {
    let payload = payload.trim();
    if payload.starts_with("/start") {
        payload.to_string()
    } else {
        format!("/start {payload}")
    }
}
