//! Built-in demo tools.

use rand::Rng;

use super::tool::FunctionTool;
use super::types::ToolParameters;

/// Simulate rolling a D6 die. Demonstrates tool calls in a chat session.
pub fn d6_tool() -> FunctionTool {
    FunctionTool::new(
        "get_random_D6_dice_value",
        "Return a random integer between 1 and 6 inclusive (simulate rolling a D6)",
        ToolParameters::empty(),
        |_args, _ctx| async {
            let value = rand::thread_rng().gen_range(1..=6);
            Ok(value.to_string())
        },
    )
}
