//! Ad-hoc command dispatch.
//!
//! `tool_activate` / `tool_deactivate` go to the first capability the active
//! adapter exposes, in [`TOOL_PROBE_ORDER`].  Any other command name is
//! passed to the adapter's raw channel, if it has one.

use armbridge_hal::{Capability, RobotAdapter};
use armbridge_types::{BridgeError, CommandOutcome};
use serde_json::Value;
use tracing::debug;

/// Capabilities tried for tool commands, first match wins.
pub const TOOL_PROBE_ORDER: [Capability; 4] = [
    Capability::Pen,
    Capability::Gripper,
    Capability::Tool,
    Capability::Raw,
];

pub const TOOL_ACTIVATE: &str = "tool_activate";
pub const TOOL_DEACTIVATE: &str = "tool_deactivate";

/// # Errors
///
/// [`BridgeError::UnsupportedOperation`] when the adapter exposes none of
/// the capabilities the command needs; otherwise whatever the capability
/// call returns.
pub async fn run_command(
    adapter: &mut dyn RobotAdapter,
    command: &str,
    params: &Value,
) -> Result<CommandOutcome, BridgeError> {
    match command {
        TOOL_ACTIVATE => toggle_tool(adapter, command, params, true).await,
        TOOL_DEACTIVATE => toggle_tool(adapter, command, params, false).await,
        other => match adapter.raw() {
            Some(raw) => send_raw(raw, other, params).await,
            None => Err(BridgeError::UnsupportedOperation(format!(
                "Unknown command: {other}"
            ))),
        },
    }
}

async fn toggle_tool(
    adapter: &mut dyn RobotAdapter,
    command: &str,
    params: &Value,
    active: bool,
) -> Result<CommandOutcome, BridgeError> {
    let verb = if active { "activated" } else { "deactivated" };
    let named = params.get("tool").and_then(Value::as_str);

    for capability in TOOL_PROBE_ORDER {
        debug!(%capability, command, "probing");
        match capability {
            Capability::Pen => {
                if let Some(pen) = adapter.pen() {
                    pen.set_pen(active).await?;
                    return Ok(CommandOutcome::message(format!("Pen {verb}")));
                }
            }
            Capability::Gripper => {
                if let Some(gripper) = adapter.gripper() {
                    gripper.set_gripper(active).await?;
                    return Ok(CommandOutcome::message(format!("Gripper {verb}")));
                }
            }
            Capability::Tool => {
                if let Some(tool) = adapter.tool() {
                    tool.set_tool(named.unwrap_or("pen"), active).await?;
                    return Ok(CommandOutcome::message(format!(
                        "{} {verb}",
                        named.unwrap_or("tool")
                    )));
                }
            }
            Capability::Raw => {
                if let Some(raw) = adapter.raw() {
                    return send_raw(raw, command, params).await;
                }
            }
        }
    }

    let action = if active { "activation" } else { "deactivation" };
    Err(BridgeError::UnsupportedOperation(format!(
        "{} does not support tool {action}",
        adapter.robot_type()
    )))
}

async fn send_raw(
    raw: &mut dyn armbridge_hal::RawCommand,
    command: &str,
    params: &Value,
) -> Result<CommandOutcome, BridgeError> {
    let result = raw.send_raw(command, params).await?;
    Ok(CommandOutcome {
        message: format!("Raw command sent: {command}"),
        result: Some(result),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use armbridge_hal::AdapterConfig;
    use armbridge_hal::adapters::custom::SimulatedArm;
    use armbridge_hal::adapters::dobot::Dobot;
    use armbridge_hal::sim::ScriptedSdk;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn probe_order_is_pen_gripper_tool_raw() {
        assert_eq!(
            TOOL_PROBE_ORDER,
            [
                Capability::Pen,
                Capability::Gripper,
                Capability::Tool,
                Capability::Raw
            ]
        );
    }

    #[tokio::test]
    async fn pen_wins_on_dobot() {
        let sdk = ScriptedSdk::new();
        let mut dobot = Dobot::new("COM3", Arc::new(sdk.clone()), &AdapterConfig::default());
        dobot.connect().await.unwrap();

        let outcome = run_command(&mut dobot, TOOL_ACTIVATE, &Value::Null)
            .await
            .unwrap();
        assert_eq!(outcome.message, "Pen activated");
        assert_eq!(sdk.commands().last().map(String::as_str), Some("tool"));
    }

    #[tokio::test]
    async fn named_tool_on_custom() {
        let mut arm = SimulatedArm::new(&AdapterConfig::default());
        arm.connect().await.unwrap();

        let outcome = run_command(&mut arm, TOOL_DEACTIVATE, &json!({ "tool": "laser" }))
            .await
            .unwrap();
        assert_eq!(outcome.message, "laser deactivated");

        let outcome = run_command(&mut arm, TOOL_ACTIVATE, &json!({}))
            .await
            .unwrap();
        assert_eq!(outcome.message, "tool activated");
        assert_eq!(arm.active_tool(), Some("pen"));
    }

    #[tokio::test]
    async fn other_commands_go_to_raw() {
        let mut arm = SimulatedArm::new(&AdapterConfig::default());
        arm.connect().await.unwrap();

        let outcome = run_command(&mut arm, "blink", &json!({ "n": 2 }))
            .await
            .unwrap();
        assert_eq!(outcome.message, "Raw command sent: blink");
        assert_eq!(outcome.result.unwrap()["echo"], "blink");
    }

    #[tokio::test]
    async fn unknown_command_without_raw_is_unsupported() {
        let sdk = ScriptedSdk::new();
        let mut dobot = Dobot::new("COM3", Arc::new(sdk), &AdapterConfig::default());
        dobot.connect().await.unwrap();

        let err = run_command(&mut dobot, "dance", &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedOperation(_)));
    }
}
