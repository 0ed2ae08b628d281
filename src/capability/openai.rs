//! OpenAI-backed completion and speech.

use super::{CapabilityResult, CompletionProvider, SpeechSynthesizer, ToolInvocation, ToolSpec};
use crate::config::SpeechSettings;
use crate::error::CapabilityError;
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionNamedToolChoice, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, CreateSpeechRequestArgs, FunctionName, FunctionObject,
    SpeechModel, Voice,
};
use async_openai::Client;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument};

const COMPLETION: &str = "completion";
const SPEECH: &str = "speech";

/// Chat-completions adapter.
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: create_client(api_key),
            model: model.to_string(),
        }
    }

    async fn send(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tool: Option<&ToolSpec>,
    ) -> CapabilityResult<async_openai::types::ChatCompletionResponseMessage> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);

        if let Some(tool) = tool {
            args.tools(vec![ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: tool.name.clone(),
                    description: Some(tool.description.clone()),
                    parameters: Some(tool.parameters.clone()),
                    strict: None,
                },
            }])
            .tool_choice(ChatCompletionToolChoiceOption::Named(
                ChatCompletionNamedToolChoice {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionName {
                        name: tool.name.clone(),
                    },
                },
            ));
        }

        let request = args
            .build()
            .map_err(|e| CapabilityError::service(COMPLETION, format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CapabilityError::service(COMPLETION, format!("Chat API error: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| CapabilityError::malformed(COMPLETION, "no choices in response"))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system_prompt: &str) -> CapabilityResult<String> {
        let message = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| CapabilityError::service(COMPLETION, e))?;

        let reply = self.send(vec![message.into()], None).await?;
        let content = reply.content.unwrap_or_default();
        debug!("Completion returned {} chars", content.len());
        Ok(content)
    }

    #[instrument(skip_all, fields(model = %self.model, tool = %tool.name))]
    async fn complete_with_tool(
        &self,
        user_message: &str,
        tool: &ToolSpec,
    ) -> CapabilityResult<Option<ToolInvocation>> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| CapabilityError::service(COMPLETION, e))?;

        let reply = self.send(vec![message.into()], Some(tool)).await?;

        Ok(reply
            .tool_calls
            .and_then(|calls| calls.into_iter().next())
            .map(|call| ToolInvocation {
                name: call.function.name,
                arguments: call.function.arguments,
            }))
    }
}

/// Text-to-speech adapter.
pub struct OpenAiSpeech {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiSpeech {
    pub fn new(api_key: Option<&str>, settings: &SpeechSettings) -> Self {
        Self {
            client: create_client(api_key),
            model: parse_model(&settings.model),
            voice: parse_voice(&settings.voice),
        }
    }
}

fn parse_model(name: &str) -> SpeechModel {
    match name {
        "tts-1-hd" => SpeechModel::Tts1Hd,
        _ => SpeechModel::Tts1,
    }
}

fn parse_voice(name: &str) -> Voice {
    match name.to_lowercase().as_str() {
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        _ => Voice::Alloy,
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    #[instrument(skip_all, fields(chars = text.len()))]
    async fn synthesize_speech(&self, text: &str) -> CapabilityResult<Bytes> {
        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .voice(self.voice.clone())
            .model(self.model.clone())
            .build()
            .map_err(|e| CapabilityError::service(SPEECH, format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| CapabilityError::service(SPEECH, format!("Speech API error: {}", e)))?;

        if response.bytes.is_empty() {
            return Err(CapabilityError::malformed(SPEECH, "empty audio body"));
        }

        Ok(response.bytes)
    }
}
