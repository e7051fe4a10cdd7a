use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    },
};
use diagram_common::{ChatTurn, GenerationContext, Role};

use super::RepairRequest;

const RESPONSE_FORMAT: &str = "Respond with a single JSON object of the form \
{\"diagram\": \"<mermaid source>\", \"explanation\": \"<short answer for the user>\"}. \
Do not wrap the JSON in prose.";

const DRAFT_SYSTEM: &str = "You turn descriptions into Mermaid diagrams. \
The diagram source must be valid Mermaid syntax without code fences.";

const REPAIR_SYSTEM: &str = "You fix Mermaid diagrams that failed to render. \
Return the corrected diagram source without code fences.";

const PRESERVE_TYPE: &str = "Keep the diagram type exactly as it is (do not turn a flowchart into \
a sequence diagram or chart) and make the smallest edit that resolves the error.";

fn system(text: String) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    Ok(ChatCompletionRequestSystemMessageArgs::default()
        .content(text)
        .build()?
        .into())
}

fn user(text: String) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(text)
        .build()?
        .into())
}

fn turn(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    match turn.role {
        Role::User => user(turn.content.clone()),
        Role::Assistant => Ok(ChatCompletionRequestAssistantMessageArgs::default()
            .content(turn.content.clone())
            .build()?
            .into()),
    }
}

/// System prompt, prior turns, then the current request
pub fn draft_messages(context: &GenerationContext) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut messages = Vec::with_capacity(context.history.len() + 2);
    messages.push(system(format!("{DRAFT_SYSTEM} {RESPONSE_FORMAT}"))?);
    for prior in &context.history {
        messages.push(turn(prior)?);
    }

    let request = if context.has_current_diagram() {
        format!(
            "Current diagram:\n{}\n\nRequest: {}",
            context.current_diagram, context.prompt
        )
    } else {
        context.prompt.clone()
    };
    messages.push(user(request)?);

    Ok(messages)
}

pub fn repair_messages(request: &RepairRequest<'_>) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut instructions = format!("{REPAIR_SYSTEM} {RESPONSE_FORMAT}");
    if request.preserve_diagram_type {
        instructions.push(' ');
        instructions.push_str(PRESERVE_TYPE);
    }

    let mut messages = Vec::with_capacity(request.context.history.len() + 2);
    messages.push(system(instructions)?);
    for prior in &request.context.history {
        messages.push(turn(prior)?);
    }
    messages.push(user(format!(
        "Original request: {}\n\nDiagram:\n{}\n\nRender error:\n{}",
        request.context.prompt, request.prior_diagram, request.error
    ))?);

    Ok(messages)
}
